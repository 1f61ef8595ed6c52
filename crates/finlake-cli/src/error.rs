use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] finlake_core::ValidationError),

    #[error("command error: {0}")]
    Command(String),

    #[error(transparent)]
    Pipeline(#[from] finlake_core::PipelineError),

    #[error(transparent)]
    Warehouse(#[from] finlake_core::WarehouseError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::Command(_) => 10,
            Self::Pipeline(_) | Self::Warehouse(_) => 3,
            Self::Serialization(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
