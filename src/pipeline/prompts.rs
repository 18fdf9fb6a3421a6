use crate::invoice::InvoiceDefaults;

/// Instruction payload sent to the model. The field set is fixed; the
/// normalizer tolerates anything the model actually returns.
pub const EXTRACTION_PROMPT: &str = r#"You are an expert invoicing assistant. Convert the user sentence into a JSON invoice.
Return ONLY valid JSON with this shape:
{
  "invoiceNumber": "string",
  "issuedOn": "YYYY-MM-DD",
  "dueDate": "string",
  "from": {
    "name": "string",
    "company": "string",
    "email": "string",
    "addressLine1": "string",
    "addressLine2": "string",
    "city": "string",
    "state": "string",
    "postalCode": "string",
    "country": "string"
  },
  "to": {
    "name": "string",
    "company": "string",
    "email": "string",
    "addressLine1": "string",
    "addressLine2": "string",
    "city": "string",
    "state": "string",
    "postalCode": "string",
    "country": "string"
  },
  "currency": "USD",
  "taxRate": number,
  "customCharges": [
    { "label": "string", "amount": number }
  ],
  "notes": "string",
  "lines": [
    { "description": "string", "quantity": number, "rate": number }
  ]
}
If missing, infer sensible defaults. Use USD if currency is unknown.
Prefer the values in DEFAULTS when the sentence is silent on a field.

DEFAULTS:
{{defaults_json}}

User input: {{user_input}}"#;

pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (k, v) in vars {
        let pat = format!("{{{{{k}}}}}");
        out = out.replace(&pat, v);
    }
    out
}

/// Build the full model prompt: role, required schema, defaults hint (`{}`
/// when absent), and the raw user sentence verbatim.
pub fn build_prompt(raw_text: &str, defaults: Option<&InvoiceDefaults>) -> String {
    let defaults_json = defaults
        .and_then(|d| serde_json::to_string(d).ok())
        .unwrap_or_else(|| "{}".to_string());
    render_template(
        EXTRACTION_PROMPT,
        &[("defaults_json", &defaults_json), ("user_input", raw_text)],
    )
}

#[cfg(test)]
mod tests {
    use crate::invoice::InvoiceDefaults;

    use super::{build_prompt, render_template};

    #[test]
    fn render_replaces_every_placeholder() {
        let out = render_template("a={{a}} b={{b}} a={{a}}", &[("a", "1"), ("b", "2")]);
        assert_eq!(out, "a=1 b=2 a=1");
    }

    #[test]
    fn prompt_embeds_sentence_and_empty_defaults() {
        let prompt = build_prompt("2 x strategy sessions @ $850", None);
        assert!(prompt.contains("User input: 2 x strategy sessions @ $850"));
        assert!(prompt.contains("DEFAULTS:\n{}"));
        assert!(prompt.contains("\"customCharges\""));
        assert!(prompt.contains("\"taxRate\""));
    }

    #[test]
    fn prompt_serializes_supplied_defaults() {
        let defaults = InvoiceDefaults {
            currency: Some("EUR".to_string()),
            ..Default::default()
        };
        let prompt = build_prompt("bill Acme", Some(&defaults));
        assert!(prompt.contains(r#""currency":"EUR""#));
    }
}
