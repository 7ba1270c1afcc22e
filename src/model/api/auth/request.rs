use serde::{Deserialize, Serialize};

/// A request to open a session with a token issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRequest {
    pub token: String,
}
