mod model;
mod normalize;
mod prompts;

pub use model::{candidate_text, GeminiClient, TextModel};
pub use normalize::{compose_fallback, extract_json_object, normalize_invoice};
pub use prompts::{build_prompt, render_template, EXTRACTION_PROMPT};

use crate::error::{ParseError, ParseWarning};
use crate::invoice::{InvoiceDefaults, InvoiceDraft};
use crate::progress::ConsoleProgress;
use crate::ratelimit::{RateLimitPolicy, RateLimitStore};

/// Prompts longer than this are rejected before any model call.
pub const MAX_PROMPT_CHARS: usize = 2000;

pub struct ParseRequest {
    pub prompt: String,
    pub defaults: Option<InvoiceDefaults>,
    /// Rate-limit key (e.g. the caller's client address). None skips the check.
    pub client_key: Option<String>,
}

impl ParseRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            defaults: None,
            client_key: None,
        }
    }

    #[must_use]
    pub fn with_defaults(mut self, defaults: InvoiceDefaults) -> Self {
        self.defaults = Some(defaults);
        self
    }

    #[must_use]
    pub fn with_client_key(mut self, key: impl Into<String>) -> Self {
        self.client_key = Some(key.into());
        self
    }
}

#[derive(Debug)]
pub struct ParseOutcome {
    pub invoice: InvoiceDraft,
    pub warning: Option<ParseWarning>,
}

/// Sequences one parse request: validate input, short-circuit empty input,
/// call the model, salvage/normalize the response. Stateless per request; the
/// rate-limit store is the only shared state, and it is injected.
pub struct ParsePipeline {
    model: Option<Box<dyn TextModel>>,
    limiter: Option<(Box<dyn RateLimitStore>, RateLimitPolicy)>,
    progress: ConsoleProgress,
}

impl ParsePipeline {
    pub fn new(model: Option<Box<dyn TextModel>>, progress: ConsoleProgress) -> Self {
        Self {
            model,
            limiter: None,
            progress,
        }
    }

    #[must_use]
    pub fn with_rate_limiter(
        mut self,
        store: Box<dyn RateLimitStore>,
        policy: RateLimitPolicy,
    ) -> Self {
        self.limiter = Some((store, policy));
        self
    }

    pub fn parse(&self, request: &ParseRequest) -> Result<ParseOutcome, ParseError> {
        if let (Some((store, policy)), Some(key)) =
            (self.limiter.as_ref(), request.client_key.as_deref())
        {
            let decision = store.check(key, *policy);
            if !decision.allowed {
                return Err(ParseError::RateLimited {
                    retry_after_secs: decision.retry_after_secs,
                });
            }
        }

        let prompt = request.prompt.trim();
        if prompt.chars().count() > MAX_PROMPT_CHARS {
            return Err(ParseError::PromptTooLong);
        }
        let defaults = request.defaults.as_ref();

        if prompt.is_empty() {
            return Ok(ParseOutcome {
                invoice: compose_fallback("", defaults),
                warning: None,
            });
        }

        let Some(model) = self.model.as_deref() else {
            return Err(ParseError::ModelNotConfigured);
        };

        self.progress.info(format!("Model: {}", model.name()));
        let reply = model
            .generate(&build_prompt(prompt, defaults))
            .map_err(ParseError::ModelTransport)?;
        let reply = reply.trim();

        if reply.is_empty() {
            return Ok(self.recover(prompt, defaults, ParseWarning::EmptyModelOutput));
        }
        match extract_json_object(reply) {
            Ok(parsed) => Ok(ParseOutcome {
                invoice: normalize_invoice(&parsed, prompt, defaults),
                warning: None,
            }),
            Err(_) => Ok(self.recover(prompt, defaults, ParseWarning::UnreadableModelOutput)),
        }
    }

    fn recover(
        &self,
        prompt: &str,
        defaults: Option<&InvoiceDefaults>,
        warning: ParseWarning,
    ) -> ParseOutcome {
        self.progress.warn(warning.message());
        ParseOutcome {
            invoice: compose_fallback(prompt, defaults),
            warning: Some(warning),
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::anyhow;

    use crate::error::{ParseError, ParseWarning};
    use crate::progress::ConsoleProgress;
    use crate::ratelimit::{MemoryRateLimiter, RateLimitPolicy};

    use super::{ParsePipeline, ParseRequest, TextModel};

    enum Script {
        Reply(&'static str),
        Fail,
    }

    struct ScriptedModel(Script);

    impl TextModel for ScriptedModel {
        fn name(&self) -> &str {
            "scripted"
        }

        fn generate(&self, _prompt: &str) -> anyhow::Result<String> {
            match &self.0 {
                Script::Reply(text) => Ok((*text).to_string()),
                Script::Fail => Err(anyhow!("connection refused")),
            }
        }
    }

    fn pipeline(script: Option<Script>) -> ParsePipeline {
        let model: Option<Box<dyn TextModel>> =
            script.map(|s| Box::new(ScriptedModel(s)) as Box<dyn TextModel>);
        ParsePipeline::new(model, ConsoleProgress::new(false))
    }

    #[test]
    fn empty_prompt_short_circuits_without_a_model() {
        let outcome = pipeline(None)
            .parse(&ParseRequest::new("   "))
            .expect("fallback draft");
        assert!(outcome.warning.is_none());
        assert_eq!(outcome.invoice.lines.len(), 1);
        assert_eq!(outcome.invoice.lines[0].description, "Services rendered");
        assert_eq!(outcome.invoice.lines[0].quantity, 1);
        assert_eq!(outcome.invoice.lines[0].rate, 1200.0);
    }

    #[test]
    fn missing_model_is_terminal_for_non_empty_prompts() {
        let err = pipeline(None)
            .parse(&ParseRequest::new("bill Acme $500"))
            .unwrap_err();
        assert!(matches!(err, ParseError::ModelNotConfigured));
    }

    #[test]
    fn transport_failure_is_terminal_with_no_draft() {
        let err = pipeline(Some(Script::Fail))
            .parse(&ParseRequest::new("bill Acme $500"))
            .unwrap_err();
        assert!(matches!(err, ParseError::ModelTransport(_)));
    }

    #[test]
    fn over_long_prompt_is_rejected_before_the_model_runs() {
        let prompt = "a".repeat(2001);
        let err = pipeline(Some(Script::Fail))
            .parse(&ParseRequest::new(prompt))
            .unwrap_err();
        assert!(matches!(err, ParseError::PromptTooLong));

        let at_limit = "a".repeat(2000);
        let err = pipeline(None).parse(&ParseRequest::new(at_limit)).unwrap_err();
        assert!(matches!(err, ParseError::ModelNotConfigured));
    }

    #[test]
    fn empty_reply_recovers_with_a_warning() {
        let outcome = pipeline(Some(Script::Reply("  ")))
            .parse(&ParseRequest::new("2 x strategy sessions @ $850"))
            .expect("draft");
        assert_eq!(outcome.warning, Some(ParseWarning::EmptyModelOutput));
        assert_eq!(outcome.invoice.lines[0].description, "strategy sessions");
        assert_eq!(outcome.invoice.lines[0].rate, 850.0);
    }

    #[test]
    fn unreadable_reply_recovers_with_a_distinct_warning() {
        let outcome = pipeline(Some(Script::Reply("not json")))
            .parse(&ParseRequest::new("invoice to Acme, due by Friday for $300"))
            .expect("draft");
        assert_eq!(outcome.warning, Some(ParseWarning::UnreadableModelOutput));
        assert_eq!(outcome.invoice.to.name, "Acme");
        assert_eq!(outcome.invoice.lines[0].rate, 300.0);
    }

    #[test]
    fn valid_reply_normalizes_without_warning() {
        let reply = r#"{"invoiceNumber":"INV-9","currency":"EUR","lines":[{"description":"design","quantity":2,"rate":400}]}"#;
        let outcome = pipeline(Some(Script::Reply(reply)))
            .parse(&ParseRequest::new("two design days"))
            .expect("draft");
        assert!(outcome.warning.is_none());
        assert_eq!(outcome.invoice.invoice_number, "INV-9");
        assert_eq!(outcome.invoice.currency, "EUR");
        assert_eq!(outcome.invoice.lines[0].description, "design");
        assert_eq!(outcome.invoice.lines[0].id, "1");
    }

    #[test]
    fn rate_limit_denial_carries_retry_after() {
        let policy = RateLimitPolicy {
            max_requests: 1,
            ..Default::default()
        };
        let pipeline = pipeline(Some(Script::Reply("{}")))
            .with_rate_limiter(Box::new(MemoryRateLimiter::new()), policy);
        let request = ParseRequest::new("bill Acme").with_client_key("parse:1.2.3.4");
        assert!(pipeline.parse(&request).is_ok());
        match pipeline.parse(&request).unwrap_err() {
            ParseError::RateLimited { retry_after_secs } => assert!(retry_after_secs >= 1),
            other => panic!("expected RateLimited, got {other:?}"),
        }
    }
}
