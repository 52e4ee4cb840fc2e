use std::sync::Arc;

use serde_json::json;

use super::{call_typed, ServiceCaller, ServiceError};

/// Client for the presence service.
#[derive(Clone)]
pub struct OnlineClient {
    caller: Arc<dyn ServiceCaller>,
    canister_id: String,
}

impl OnlineClient {
    pub fn new(caller: Arc<dyn ServiceCaller>, canister_id: impl Into<String>) -> Self {
        Self {
            caller,
            canister_id: canister_id.into(),
        }
    }

    pub async fn mark_as_online(&self) -> Result<(), ServiceError> {
        let _: serde_json::Value =
            call_typed(self.caller.as_ref(), &self.canister_id, "mark_as_online", &json!({}))
                .await?;
        Ok(())
    }
}
