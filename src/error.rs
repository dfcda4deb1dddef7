use thiserror::Error;

/// Everything that can go wrong between a form submission and a rendered result.
///
/// None of these are fatal: the orchestration layer turns each one into a
/// message on the display state and the user can resubmit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexicaError {
    /// Bad word, context, tone or key shape. Raised before any network call.
    #[error("{0}")]
    Validation(String),

    #[error("An API key is required to contact the language model.")]
    MissingCredential,

    /// Upstream failure; the provider's own message is passed through.
    #[error("{0}")]
    Provider(String),

    #[error("The model response did not match the {schema} schema: {detail}")]
    SchemaMismatch { schema: &'static str, detail: String },

    #[error("The model returned no output.")]
    EmptyOutput,

    /// A suggestion was requested without a matching prior search.
    #[error("{0}")]
    StaleContext(String),
}

impl LexicaError {
    pub fn validation(message: impl Into<String>) -> Self {
        LexicaError::Validation(message.into())
    }

    pub fn provider(message: impl Into<String>) -> Self {
        LexicaError::Provider(message.into())
    }

    /// Short machine-readable name, used in logs and the JSON API.
    pub fn kind(&self) -> &'static str {
        match self {
            LexicaError::Validation(_) => "validation",
            LexicaError::MissingCredential => "missing_credential",
            LexicaError::Provider(_) => "provider",
            LexicaError::SchemaMismatch { .. } => "schema_mismatch",
            LexicaError::EmptyOutput => "empty_output",
            LexicaError::StaleContext(_) => "stale_context",
        }
    }
}
