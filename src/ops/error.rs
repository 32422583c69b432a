use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("Store operation failed: {0}")]
    Store(String),
    #[error("Instagram lookup failed: {0}")]
    Lookup(String),
    #[error("Automation operation failed: {0}")]
    Automation(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}

impl ToolError {
    pub fn store(err: anyhow::Error) -> Self {
        Self::Store(format!("{:#}", err))
    }

    pub fn lookup(err: anyhow::Error) -> Self {
        Self::Lookup(format!("{:#}", err))
    }

    pub fn automation(err: anyhow::Error) -> Self {
        Self::Automation(format!("{:#}", err))
    }
}
