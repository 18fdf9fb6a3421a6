use chrono::Local;
use rand::Rng;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_DUE_TERMS: &str = "Net 14";
pub const DEFAULT_CLIENT_NAME: &str = "Client";
pub const DEFAULT_LINE_DESCRIPTION: &str = "Services rendered";
pub const DEFAULT_CHARGE_LABEL: &str = "Custom charge";
pub const DEFAULT_NOTES: &str =
    "Payment is due within the agreed terms. Thank you for choosing Magic Invoice.";

pub const BUSINESS_NAME: &str = "You";
pub const BUSINESS_COMPANY: &str = "Magic Invoice Studio";
pub const BUSINESS_EMAIL: &str = "hello@magicinvoice.ai";

pub const INVOICE_PREFIX: &str = "MI";

/// Either side of an invoice. Every field is optional in practice; unknown
/// fields stay empty strings so the wire shape is always fully populated.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Party {
    pub name: String,
    pub company: String,
    pub email: String,
    pub address_line1: String,
    pub address_line2: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub country: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceLine {
    pub id: String,
    pub description: String,
    pub quantity: i64,
    pub rate: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CustomCharge {
    pub id: String,
    pub label: String,
    pub amount: f64,
}

/// A fully-normalized invoice draft, ready for display or persistence.
/// Constructed only by the normalizer; never partially populated.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceDraft {
    pub invoice_number: String,
    pub issued_on: String,
    pub due_date: String,
    pub from: Party,
    pub to: Party,
    pub currency: String,
    pub tax_rate: f64,
    pub custom_charges: Vec<CustomCharge>,
    pub notes: String,
    pub lines: Vec<InvoiceLine>,
}

/// Caller-supplied hints merged during normalization. Matches the `defaults`
/// object of the parse request; every field may be omitted.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InvoiceDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub invoice_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_charges: Option<Vec<CustomCharge>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<Party>,
}

/// Round a monetary value to 2 decimal places. Applied exactly once, at
/// line/charge construction.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Today's date as `YYYY-MM-DD` (draft-created-now semantics).
pub fn today() -> String {
    Local::now().format("%Y-%m-%d").to_string()
}

/// Generate an invoice number: `MI-<YYYYMMDD>-<3-digit suffix>`.
pub fn next_invoice_number() -> String {
    let stamp = Local::now().format("%Y%m%d");
    let suffix: u32 = rand::thread_rng().gen_range(100..=999);
    format!("{INVOICE_PREFIX}-{stamp}-{suffix}")
}
