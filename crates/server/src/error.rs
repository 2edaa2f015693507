//! Errors raised by the tool layer itself, before or after the coordinator runs.

use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Tool arguments that do not describe a request.
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Tool output could not be encoded.
    #[error("SERIALIZE_FAILED: {0}")]
    Serialize(String),

    /// The server was started without a replay queue.
    #[error("REPLAY_DISABLED: no replay queue is attached")]
    ReplayDisabled,
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let code = match &err {
            ToolError::InvalidInput(_) => -32602,
            ToolError::Serialize(_) => -32603,
            ToolError::ReplayDisabled => -32030,
        };

        McpError { code: ErrorCode(code), message: err.to_string().into(), data: None }
    }
}
