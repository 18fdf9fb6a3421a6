use anyhow::{anyhow, Context};
use serde_json::{json, Value};

use crate::config::ResolvedModel;

/// The pipeline's single suspension point. Implementations must settle within
/// a bounded time; the orchestrator performs no retries.
pub trait TextModel: Send + Sync {
    fn name(&self) -> &str;
    fn generate(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Blocking client for the Gemini `generateContent` endpoint.
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl GeminiClient {
    pub fn new(resolved: &ResolvedModel, api_key: String) -> anyhow::Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .timeout(resolved.timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            http,
            endpoint: resolved.endpoint.trim_end_matches('/').to_string(),
            api_key,
            model: resolved.model.clone(),
            temperature: resolved.temperature,
        })
    }
}

impl TextModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn generate(&self, prompt: &str) -> anyhow::Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.endpoint, self.model
        );
        let body = json!({
            "contents": [
                { "role": "user", "parts": [ { "text": prompt } ] }
            ],
            "generationConfig": {
                "temperature": self.temperature,
                "responseMimeType": "application/json"
            }
        });

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .context("model request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(anyhow!(
                "model request rejected ({status}): {}",
                truncate(&detail, 240)
            ));
        }

        let payload: Value = response.json().context("model response is not JSON")?;
        Ok(candidate_text(&payload))
    }
}

/// Concatenate the text parts of the first candidate. Missing pieces yield an
/// empty string, which the orchestrator treats as an empty model output.
pub fn candidate_text(payload: &Value) -> String {
    let parts = payload
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array);
    let Some(parts) = parts else {
        return String::new();
    };
    parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join("")
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let cut: String = text.chars().take(max_chars).collect();
    format!("{cut}…")
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::candidate_text;

    #[test]
    fn candidate_text_joins_parts() {
        let payload = json!({
            "candidates": [
                { "content": { "parts": [ { "text": "{\"a\":" }, { "text": "1}" } ] } }
            ]
        });
        assert_eq!(candidate_text(&payload), "{\"a\":1}");
    }

    #[test]
    fn candidate_text_is_empty_for_blocked_or_missing_candidates() {
        assert_eq!(candidate_text(&json!({})), "");
        assert_eq!(candidate_text(&json!({"candidates": []})), "");
        let no_parts = json!({"candidates": [{"finishReason": "SAFETY"}]});
        assert_eq!(candidate_text(&no_parts), "");
    }
}
