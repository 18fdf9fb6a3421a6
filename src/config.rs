use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use serde::Deserialize;

use crate::invoice::{CustomCharge, InvoiceDefaults, Party};
use crate::ratelimit::RateLimitPolicy;

pub const CONFIG_FILENAME: &str = "magic-invoice.toml";
pub const CONFIG_ENV: &str = "MAGIC_INVOICE_CONFIG";
pub const API_KEY_ENV: &str = "GEMINI_API_KEY";

pub const DEFAULT_MODEL_NAME: &str = "gemini-2.5-flash";
pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelSection,
    #[serde(default)]
    pub limits: LimitsSection,
    #[serde(default)]
    pub defaults: DefaultsSection,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ModelSection {
    /// Inline key; takes precedence over the environment lookup.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the key (default: GEMINI_API_KEY).
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Upstream call deadline; past it the call counts as a transport failure.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub temperature: Option<f32>,
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
    pub temperature: f32,
}

impl ModelSection {
    pub fn resolve(&self) -> ResolvedModel {
        let api_key = self
            .api_key
            .clone()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .or_else(|| {
                let var = self.api_key_env.as_deref().unwrap_or(API_KEY_ENV);
                std::env::var(var)
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            });
        ResolvedModel {
            api_key,
            model: self
                .model
                .clone()
                .unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string()),
            endpoint: self
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string()),
            timeout: Duration::from_secs(self.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        }
    }
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct LimitsSection {
    #[serde(default)]
    pub window_secs: Option<u64>,
    #[serde(default)]
    pub max_requests: Option<u32>,
}

impl LimitsSection {
    pub fn policy(&self) -> RateLimitPolicy {
        let base = RateLimitPolicy::default();
        RateLimitPolicy {
            window: self
                .window_secs
                .map(Duration::from_secs)
                .unwrap_or(base.window),
            max_requests: self.max_requests.unwrap_or(base.max_requests),
        }
    }
}

/// User defaults expressed in config-file terms (snake_case TOML keys).
#[derive(Clone, Debug, Deserialize, Default)]
pub struct DefaultsSection {
    #[serde(default)]
    pub invoice_number: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub tax_rate: Option<f64>,
    #[serde(default)]
    pub custom_charges: Vec<ChargeSection>,
    #[serde(default)]
    pub from: Option<PartySection>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct ChargeSection {
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub amount: Option<f64>,
}

#[derive(Clone, Debug, Deserialize, Default)]
pub struct PartySection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address_line1: Option<String>,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
}

impl DefaultsSection {
    /// Convert to the wire-shape defaults object, or None when nothing is set.
    pub fn to_defaults(&self) -> Option<InvoiceDefaults> {
        let empty = self.invoice_number.is_none()
            && self.due_date.is_none()
            && self.currency.is_none()
            && self.notes.is_none()
            && self.tax_rate.is_none()
            && self.custom_charges.is_empty()
            && self.from.is_none();
        if empty {
            return None;
        }
        let custom_charges = if self.custom_charges.is_empty() {
            None
        } else {
            Some(
                self.custom_charges
                    .iter()
                    .map(|c| CustomCharge {
                        id: String::new(),
                        label: c.label.clone().unwrap_or_default(),
                        amount: c.amount.unwrap_or(0.0),
                    })
                    .collect(),
            )
        };
        Some(InvoiceDefaults {
            invoice_number: self.invoice_number.clone(),
            due_date: self.due_date.clone(),
            currency: self.currency.clone(),
            notes: self.notes.clone(),
            tax_rate: self.tax_rate,
            custom_charges,
            from: self.from.as_ref().map(|f| Party {
                name: f.name.clone().unwrap_or_default(),
                company: f.company.clone().unwrap_or_default(),
                email: f.email.clone().unwrap_or_default(),
                address_line1: f.address_line1.clone().unwrap_or_default(),
                address_line2: f.address_line2.clone().unwrap_or_default(),
                city: f.city.clone().unwrap_or_default(),
                state: f.state.clone().unwrap_or_default(),
                postal_code: f.postal_code.clone().unwrap_or_default(),
                country: f.country.clone().unwrap_or_default(),
            }),
        })
    }
}

pub fn find_file_upwards(start_dir: &Path, filename: &str, max_levels: usize) -> Option<PathBuf> {
    let mut dir = start_dir;
    for _ in 0..=max_levels {
        let candidate = dir.join(filename);
        if candidate.exists() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}

pub fn find_default_config() -> Option<PathBuf> {
    if let Ok(p) = std::env::var(CONFIG_ENV) {
        let p = PathBuf::from(p);
        if p.exists() {
            return Some(p);
        }
    }
    if let Ok(cwd) = std::env::current_dir() {
        if let Some(p) = find_file_upwards(&cwd, CONFIG_FILENAME, 8) {
            return Some(p);
        }
    }
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            if let Some(p) = find_file_upwards(dir, CONFIG_FILENAME, 8) {
                return Some(p);
            }
        }
    }
    None
}

pub fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read config: {}", path.display()))?;
    let cfg: AppConfig = toml::from_str(&text).context("parse config toml")?;
    Ok(cfg)
}

pub fn init_default_config(dir: &Path, force: bool) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create config dir: {}", dir.display()))?;
    let cfg_path = dir.join(CONFIG_FILENAME);
    if cfg_path.exists() && !force {
        return Ok(cfg_path);
    }
    std::fs::write(&cfg_path, DEFAULT_CONFIG_TOML)
        .with_context(|| format!("write config: {}", cfg_path.display()))?;
    Ok(cfg_path)
}

const DEFAULT_CONFIG_TOML: &str = r#"[model]
# API key is read from this environment variable when api_key is unset.
api_key_env = "GEMINI_API_KEY"
# api_key = ""
model = "gemini-2.5-flash"
endpoint = "https://generativelanguage.googleapis.com"
timeout_secs = 30
temperature = 0.2

[limits]
window_secs = 60
max_requests = 20

[defaults]
# Hints merged into every draft; model output wins where the precedence
# rules say so (due_date is the exception: this value outranks the model).
# invoice_number = "ACME-0042"
# due_date = "Net 30"
# currency = "USD"
# notes = "Bank transfer preferred."
# tax_rate = 8.5

# [defaults.from]
# name = "You"
# company = "Magic Invoice Studio"
# email = "hello@magicinvoice.ai"

# [[defaults.custom_charges]]
# label = "Rush fee"
# amount = 150.0
"#;
