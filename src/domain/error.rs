use thiserror::Error;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("unknown language `{value}`")]
    UnknownLanguage { value: String },
}

impl DomainError {
    pub fn unknown_language(value: impl Into<String>) -> Self {
        Self::UnknownLanguage {
            value: value.into(),
        }
    }
}
