use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfileError {
    #[error("Profile JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error reading profile: {0}")]
    Io(#[from] std::io::Error),

    #[error("Metadata field '{0}' is reserved for occurrences")]
    ReservedMetadataField(String),

    #[error("Duplicate document id: {0}")]
    DuplicateDocument(String),

    #[error("Unknown component type '{tag}' referenced by '{referenced_by}'")]
    UnknownComponentType { tag: String, referenced_by: String },

    #[error("Invalid options for component '{tag}': {reason}")]
    ComponentOptions { tag: String, reason: String },

    #[error("No profile_path configured in settings")]
    NotConfigured,
}

pub type ProfileResult<T> = Result<T, ProfileError>;
