pub mod capability;
pub mod envelope;
pub mod error;

pub use capability::Capability;
pub use envelope::Envelope;
pub use error::WorkerError;
