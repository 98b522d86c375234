//! Wire types for the `SayHello` call
//!
//! The request/response pair the dispatcher speaks, kept free of any
//! transport so the same types serve JSON over HTTP or an RPC layer.

use serde::{Deserialize, Serialize};

/// Input of `SayHello`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloRequest {
    #[serde(default)]
    pub name: String,
}

/// Output of `SayHello`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelloResponse {
    pub message: String,
}

/// Error body returned by the API routes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
