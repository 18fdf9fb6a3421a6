use anyhow::Context;
use serde::Deserialize;
use serde_json::Value;

use crate::extract::{extract_client, extract_due_date, parse_lines};
use crate::invoice::{
    next_invoice_number, round2, today, CustomCharge, InvoiceDefaults, InvoiceDraft, InvoiceLine,
    Party, BUSINESS_COMPANY, BUSINESS_EMAIL, BUSINESS_NAME, DEFAULT_CHARGE_LABEL,
    DEFAULT_CURRENCY, DEFAULT_LINE_DESCRIPTION, DEFAULT_NOTES,
};

/// Parse a model reply as a JSON object, skipping any prose prefix before the
/// first brace. Trailing prose after the object is ignored.
pub fn extract_json_object(text: &str) -> anyhow::Result<Value> {
    let start = text.find('{').context("no_json_object_start")?;
    let mut de = serde_json::Deserializer::from_str(&text[start..]);
    let value = Value::deserialize(&mut de).context("json_parse_failed")?;
    Ok(value)
}

/// Build a complete draft with no model output: extractors plus defaults only.
pub fn compose_fallback(raw_text: &str, defaults: Option<&InvoiceDefaults>) -> InvoiceDraft {
    normalize_invoice(&Value::Null, raw_text, defaults)
}

/// The single authority turning (possibly malformed model output, raw text,
/// user defaults) into a valid draft. Total and idempotent: never fails,
/// always returns a fully-populated invoice.
pub fn normalize_invoice(
    model_output: &Value,
    raw_text: &str,
    defaults: Option<&InvoiceDefaults>,
) -> InvoiceDraft {
    InvoiceDraft {
        invoice_number: non_empty_str(model_output.get("invoiceNumber"))
            .or_else(|| defaults.and_then(|d| trimmed_opt(d.invoice_number.as_deref())))
            .unwrap_or_else(next_invoice_number),
        // Draft-created-now semantics: the model never controls this field.
        issued_on: today(),
        due_date: defaults
            .and_then(|d| trimmed_opt(d.due_date.as_deref()))
            .or_else(|| non_empty_str(model_output.get("dueDate")))
            .unwrap_or_else(|| extract_due_date(raw_text)),
        from: normalize_from(model_output.get("from"), defaults),
        to: normalize_to(model_output.get("to"), raw_text),
        currency: non_empty_str(model_output.get("currency"))
            .or_else(|| defaults.and_then(|d| trimmed_opt(d.currency.as_deref())))
            .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        tax_rate: coerce_number(model_output.get("taxRate"))
            .or_else(|| defaults.and_then(|d| d.tax_rate))
            .unwrap_or(0.0),
        custom_charges: normalize_charges(model_output.get("customCharges"), defaults),
        notes: non_empty_str(model_output.get("notes"))
            .or_else(|| defaults.and_then(|d| trimmed_opt(d.notes.as_deref())))
            .unwrap_or_else(|| DEFAULT_NOTES.to_string()),
        lines: normalize_lines(model_output.get("lines"), raw_text),
    }
}

/// Model lines win only when present and non-empty; otherwise the text
/// extractor runs. Positional ids discard anything upstream supplied.
fn normalize_lines(model_lines: Option<&Value>, raw_text: &str) -> Vec<InvoiceLine> {
    if let Some(items) = model_lines.and_then(Value::as_array).filter(|a| !a.is_empty()) {
        return items
            .iter()
            .enumerate()
            .map(|(idx, item)| InvoiceLine {
                id: (idx + 1).to_string(),
                description: non_empty_str(item.get("description"))
                    .unwrap_or_else(|| DEFAULT_LINE_DESCRIPTION.to_string()),
                quantity: coerce_quantity(item.get("quantity")).unwrap_or(1),
                rate: round2(coerce_number(item.get("rate")).unwrap_or(0.0)),
            })
            .collect();
    }
    // Extracted rates are already rounded; do not round again.
    parse_lines(raw_text)
        .into_iter()
        .enumerate()
        .map(|(idx, line)| InvoiceLine {
            id: (idx + 1).to_string(),
            description: line.description,
            quantity: line.quantity,
            rate: line.rate,
        })
        .collect()
}

fn normalize_charges(
    model_charges: Option<&Value>,
    defaults: Option<&InvoiceDefaults>,
) -> Vec<CustomCharge> {
    if let Some(items) = model_charges.and_then(Value::as_array) {
        return items
            .iter()
            .enumerate()
            .map(|(idx, item)| CustomCharge {
                id: (idx + 1).to_string(),
                label: non_empty_str(item.get("label"))
                    .unwrap_or_else(|| DEFAULT_CHARGE_LABEL.to_string()),
                amount: round2(coerce_number(item.get("amount")).unwrap_or(0.0)),
            })
            .collect();
    }
    let Some(charges) = defaults.and_then(|d| d.custom_charges.as_ref()) else {
        return Vec::new();
    };
    charges
        .iter()
        .enumerate()
        .map(|(idx, charge)| CustomCharge {
            id: (idx + 1).to_string(),
            label: trimmed_opt(Some(charge.label.as_str()))
                .unwrap_or_else(|| DEFAULT_CHARGE_LABEL.to_string()),
            amount: round2(charge.amount),
        })
        .collect()
}

/// Issuer party: model value, then user defaults, then the static business
/// identity (name/company/email only; address fields stay empty).
fn normalize_from(model_from: Option<&Value>, defaults: Option<&InvoiceDefaults>) -> Party {
    let fallback = defaults
        .and_then(|d| d.from.clone())
        .unwrap_or_default();
    let pick = |key: &str| non_empty_str(model_from.and_then(|m| m.get(key)));
    Party {
        name: pick("name")
            .or_else(|| trimmed_opt(Some(fallback.name.as_str())))
            .unwrap_or_else(|| BUSINESS_NAME.to_string()),
        company: pick("company")
            .or_else(|| trimmed_opt(Some(fallback.company.as_str())))
            .unwrap_or_else(|| BUSINESS_COMPANY.to_string()),
        email: pick("email")
            .or_else(|| trimmed_opt(Some(fallback.email.as_str())))
            .unwrap_or_else(|| BUSINESS_EMAIL.to_string()),
        address_line1: pick("addressLine1")
            .or_else(|| trimmed_opt(Some(fallback.address_line1.as_str())))
            .unwrap_or_default(),
        address_line2: pick("addressLine2")
            .or_else(|| trimmed_opt(Some(fallback.address_line2.as_str())))
            .unwrap_or_default(),
        city: pick("city")
            .or_else(|| trimmed_opt(Some(fallback.city.as_str())))
            .unwrap_or_default(),
        state: pick("state")
            .or_else(|| trimmed_opt(Some(fallback.state.as_str())))
            .unwrap_or_default(),
        postal_code: pick("postalCode")
            .or_else(|| trimmed_opt(Some(fallback.postal_code.as_str())))
            .unwrap_or_default(),
        country: pick("country")
            .or_else(|| trimmed_opt(Some(fallback.country.as_str())))
            .unwrap_or_default(),
    }
}

/// Counterparty: user defaults never apply here, only model output and the
/// client extractor (for the name).
fn normalize_to(model_to: Option<&Value>, raw_text: &str) -> Party {
    let pick = |key: &str| non_empty_str(model_to.and_then(|m| m.get(key)));
    Party {
        name: pick("name").unwrap_or_else(|| extract_client(raw_text)),
        company: pick("company").unwrap_or_default(),
        email: pick("email").unwrap_or_default(),
        address_line1: pick("addressLine1").unwrap_or_default(),
        address_line2: pick("addressLine2").unwrap_or_default(),
        city: pick("city").unwrap_or_default(),
        state: pick("state").unwrap_or_default(),
        postal_code: pick("postalCode").unwrap_or_default(),
        country: pick("country").unwrap_or_default(),
    }
}

fn non_empty_str(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn trimmed_opt(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn coerce_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn coerce_quantity(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
