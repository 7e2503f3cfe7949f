#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Language '{0}' is not supported")]
    UnsupportedLanguage(String),

    #[error("Validation failed: {0}")]
    Validation(String),
}
