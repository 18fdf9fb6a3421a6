use std::io::Read;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use magic_invoice::config::{find_default_config, init_default_config, load_config, AppConfig};
use magic_invoice::error::ParseError;
use magic_invoice::invoice::InvoiceDefaults;
use magic_invoice::pipeline::{compose_fallback, GeminiClient, ParsePipeline, ParseRequest, TextModel};
use magic_invoice::progress::ConsoleProgress;

#[derive(Parser, Debug)]
#[command(name = "magic-invoice")]
#[command(about = "Draft a structured invoice from a free-text sentence (Gemini + deterministic fallback)", long_about = None)]
struct Args {
    /// Free-text invoice description (reads stdin when omitted)
    #[arg(value_name = "PROMPT")]
    prompt: Option<String>,

    /// Config file path (default: search for magic-invoice.toml upwards)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Defaults JSON file (same shape as the parse request "defaults" object)
    #[arg(long, value_name = "JSON")]
    defaults: Option<PathBuf>,

    /// Model name override
    #[arg(long)]
    model: Option<String>,

    /// Skip the model call and build the draft from the deterministic parser
    #[arg(long)]
    offline: bool,

    /// Write the draft JSON here instead of stdout
    #[arg(short, long, value_name = "JSON")]
    output: Option<PathBuf>,

    /// Generate a default config file, then exit
    #[arg(long)]
    init_config: bool,

    /// Directory to write the config file (default: current directory)
    #[arg(long, value_name = "DIR")]
    init_config_dir: Option<PathBuf>,

    /// Overwrite an existing config file when used with --init-config
    #[arg(long)]
    force: bool,

    /// Suppress progress output on stderr
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let progress = ConsoleProgress::new(!args.quiet);

    if args.init_config {
        let dir = args
            .init_config_dir
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")));
        let cfg_path = init_default_config(&dir, args.force).context("init default config")?;
        eprintln!("Wrote config: {}", cfg_path.display());
        return Ok(());
    }

    let cfg_file = args.config.clone().or_else(find_default_config);
    let mut cfg = AppConfig::default();
    if let Some(p) = cfg_file.as_ref() {
        cfg = load_config(p)?;
        progress.info(format!("Config: {}", p.display()));
    }
    if let Some(model) = args.model.clone() {
        cfg.model.model = Some(model);
    }

    let prompt = match args.prompt.clone() {
        Some(p) => p,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("read prompt from stdin")?;
            buf
        }
    };

    let defaults = match args.defaults.as_ref() {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read defaults: {}", path.display()))?;
            let parsed: InvoiceDefaults =
                serde_json::from_str(&text).map_err(ParseError::InvalidPayload)?;
            Some(parsed)
        }
        None => cfg.defaults.to_defaults(),
    };

    let invoice;
    if args.offline {
        invoice = compose_fallback(prompt.trim(), defaults.as_ref());
    } else {
        let resolved = cfg.model.resolve();
        let model: Option<Box<dyn TextModel>> = match resolved.api_key.clone() {
            Some(key) => Some(Box::new(GeminiClient::new(&resolved, key)?)),
            None => None,
        };
        let pipeline = ParsePipeline::new(model, progress);
        let mut request = ParseRequest::new(prompt);
        if let Some(d) = defaults {
            request = request.with_defaults(d);
        }
        let outcome = pipeline.parse(&request)?;
        invoice = outcome.invoice;
    }

    let json = serde_json::to_string_pretty(&invoice).context("serialize invoice")?;
    match args.output.as_ref() {
        Some(path) => std::fs::write(path, json.as_bytes())
            .with_context(|| format!("write output: {}", path.display()))?,
        None => println!("{json}"),
    }
    Ok(())
}
