use thiserror::Error;

/// Terminal pipeline failures, surfaced to the caller with no draft. Display
/// strings are short and non-technical; they go to end users verbatim.
#[derive(Debug, Error)]
pub enum ParseError {
    /// Prompt exceeds the length cap; rejected before any model call.
    #[error("Prompt is too long.")]
    PromptTooLong,

    /// The request body (or defaults document) is not valid JSON.
    #[error("Invalid JSON payload.")]
    InvalidPayload(#[source] serde_json::Error),

    /// The caller exhausted its request window.
    #[error("Too many requests. Please try again shortly.")]
    RateLimited { retry_after_secs: u64 },

    /// No API key; the model is required for non-empty prompts.
    #[error("Gemini API key is required to generate invoices.")]
    ModelNotConfigured,

    /// The model call failed or timed out. Not masked with a fallback.
    #[error("Gemini could not generate the invoice.")]
    ModelTransport(anyhow::Error),
}

/// Advisory conditions recovered locally: the caller still receives a
/// complete draft, built from the deterministic fallback path.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParseWarning {
    EmptyModelOutput,
    UnreadableModelOutput,
}

impl ParseWarning {
    #[must_use]
    pub fn message(&self) -> &'static str {
        match self {
            Self::EmptyModelOutput => {
                "Gemini returned an empty response. We generated a draft using defaults."
            }
            Self::UnreadableModelOutput => {
                "Gemini returned an unreadable response. We generated a draft using defaults."
            }
        }
    }
}

impl std::fmt::Display for ParseWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}
