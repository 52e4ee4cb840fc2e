use futures::future::BoxFuture;
use futures::FutureExt;
use keyring::Entry;

use crate::constants::{ANONYMOUS_PRINCIPAL, KEYRING_SERVICE};

/// Keyring account the principal is stored under
const PRINCIPAL_ACCOUNT: &str = "principal";

/// An authenticated caller, identified by its principal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    principal: String,
}

impl Identity {
    pub fn new(principal: impl Into<String>) -> Self {
        Self {
            principal: principal.into(),
        }
    }

    pub fn principal(&self) -> &str {
        &self.principal
    }

    pub fn is_anonymous(&self) -> bool {
        self.principal == ANONYMOUS_PRINCIPAL
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("Keyring task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Not a signed-in principal: {0:?}")]
    NotSignedIn(String),
}

/// Resolves the identity the worker acts as. `None` means nobody is signed in.
pub trait IdentityProvider: Send + Sync {
    fn identity(&self) -> BoxFuture<'_, Result<Option<Identity>, IdentityError>>;
}

/// Resolve through `provider`, folding the anonymous principal into `None`.
pub async fn resolve_identity(
    provider: &dyn IdentityProvider,
) -> Result<Option<Identity>, IdentityError> {
    let identity = provider.identity().await?;
    Ok(identity.filter(|id| !id.is_anonymous()))
}

/// Always answers with the same identity.
pub struct StaticIdentityProvider {
    identity: Option<Identity>,
}

impl StaticIdentityProvider {
    pub fn new(identity: Option<Identity>) -> Self {
        Self { identity }
    }

    pub fn principal(principal: impl Into<String>) -> Self {
        Self::new(Some(Identity::new(principal)))
    }

    pub fn anonymous() -> Self {
        Self::principal(ANONYMOUS_PRINCIPAL)
    }
}

impl IdentityProvider for StaticIdentityProvider {
    fn identity(&self) -> BoxFuture<'_, Result<Option<Identity>, IdentityError>> {
        let identity = self.identity.clone();
        async move { Ok(identity) }.boxed()
    }
}

/// Reads the principal stored in the OS keyring (Keychain on macOS, the
/// Secret Service on Linux, Credential Manager on Windows).
#[derive(Debug, Clone)]
pub struct KeyringIdentityProvider {
    service: String,
}

impl Default for KeyringIdentityProvider {
    fn default() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }
}

impl KeyringIdentityProvider {
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self) -> Result<Entry, IdentityError> {
        Ok(Entry::new(&self.service, PRINCIPAL_ACCOUNT)?)
    }

    /// Remember `principal` as the identity to sign in with. Blank and
    /// anonymous principals are refused before the keyring is touched.
    pub fn store(&self, principal: &str) -> Result<Identity, IdentityError> {
        let identity = Identity::new(principal.trim());
        if identity.principal().is_empty() || identity.is_anonymous() {
            return Err(IdentityError::NotSignedIn(principal.to_string()));
        }
        self.entry()?.set_password(identity.principal())?;
        Ok(identity)
    }

    /// Forgetting a principal that was never stored is not an error.
    pub fn clear(&self) -> Result<(), IdentityError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Blocking read of the stored identity.
    pub fn load(&self) -> Result<Option<Identity>, IdentityError> {
        match self.entry()?.get_password() {
            Ok(principal) => Ok(Some(Identity::new(principal))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl IdentityProvider for KeyringIdentityProvider {
    fn identity(&self) -> BoxFuture<'_, Result<Option<Identity>, IdentityError>> {
        let provider = self.clone();
        async move {
            // Keyring access is blocking
            tokio::task::spawn_blocking(move || provider.load()).await?
        }
        .boxed()
    }
}
