use thiserror::Error;

pub type Result<T> = std::result::Result<T, SettingsError>;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("performance_issue_same and performance_issue_unique are mutually exclusive")]
    ConflictingIssueModes,

    #[error(
        "performance_issue_same_index {index} must be below performance_sample_count_override {limit}"
    )]
    SameIndexOutOfRange { index: u64, limit: u64 },

    #[error("derived {field} is invalid: {value}")]
    InvalidDerivedValue { field: &'static str, value: String },

    #[error("invalid settings: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl SettingsError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConflictingIssueModes => "conflicting_issue_modes",
            Self::SameIndexOutOfRange { .. } => "same_index_out_of_range",
            Self::InvalidDerivedValue { .. } => "invalid_derived_value",
            Self::Config(_) => "invalid_settings",
            Self::Io(_) => "io_error",
            Self::Yaml(_) => "yaml_error",
            Self::Json(_) => "json_error",
        }
    }
}
