use clap::{Parser, Subcommand};
use ldap_controls::{
    decode_controls, Config, ControlRegistry, DecodedControl, GenericControl, JsonDecodeOptions,
    CONTROLS_TAG,
};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use anyhow::{bail, Context, Result};

#[derive(Parser)]
#[command(name = "ldap-controls")]
#[command(about = "Decode LDAP controls from JSON or BER and print their canonical forms")]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Reject unrecognized fields inside value-json (overrides config)
    #[arg(long, global = true)]
    strict: bool,

    /// Reject unrecognized top-level fields of a control object (overrides config)
    #[arg(long, global = true)]
    strict_top_level: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Print decode metrics (Prometheus text format) after the command
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode a JSON control object, or an array of them, from a file ("-" for stdin)
    Json {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Decode a [0] controls list or a single control SEQUENCE given as hex
    Ber {
        #[arg(long, value_name = "HEX")]
        hex: String,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };

    let log_level = if args.debug {
        "debug".to_string()
    } else {
        config.log_level.clone().unwrap_or_else(|| "info".to_string())
    };
    tracing_subscriber::fmt()
        .with_env_filter(format!("ldap_controls={},info", log_level))
        .with_writer(std::io::stderr)
        .init();

    let mut options = config.json_options();
    options.strict |= args.strict;
    options.strict_top_level |= args.strict_top_level;

    let registry = if config.registry.register_defaults {
        ControlRegistry::with_defaults()
    } else {
        ControlRegistry::new()
    };
    debug!(oids = ?registry.registered_oids(), "Control registry ready");

    match &args.command {
        Command::Json { file } => run_json(&registry, file, &options)?,
        Command::Ber { hex } => run_ber(&registry, hex)?,
    }

    if args.metrics {
        print!("{}", registry.metrics().render());
    }

    Ok(())
}

fn run_json(registry: &ControlRegistry, file: &Path, options: &JsonDecodeOptions) -> Result<()> {
    let content = if file.as_os_str() == "-" {
        std::io::read_to_string(std::io::stdin()).context("Failed to read stdin")?
    } else {
        fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))?
    };
    let document: Value = serde_json::from_str(&content).context("Input is not valid JSON")?;

    let objects = match document {
        Value::Array(items) => items,
        other => vec![other],
    };
    info!("Decoding {} JSON control(s)", objects.len());

    for (i, object) in objects.iter().enumerate() {
        let decoded = registry
            .decode_json(object, options)
            .with_context(|| format!("Control #{} could not be decoded", i))?;
        print_control(&decoded)?;
    }
    Ok(())
}

fn run_ber(registry: &ControlRegistry, input: &str) -> Result<()> {
    let cleaned: String = input.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let data = hex::decode(&cleaned).context("Input is not valid hex")?;
    let controls = match data.first() {
        Some(&CONTROLS_TAG) => decode_controls(&data).context("Invalid controls list")?,
        Some(_) => vec![GenericControl::decode_ber(&data).context("Invalid control")?],
        None => bail!("No BER data given"),
    };
    info!("Decoding {} BER control(s)", controls.len());

    for decoded in registry.decode_all(controls).context("Control could not be decoded")? {
        print_control(&decoded)?;
    }
    Ok(())
}

fn print_control(decoded: &DecodedControl) -> Result<()> {
    println!("{}", decoded);
    println!("{}", serde_json::to_string_pretty(&decoded.to_json())?);
    Ok(())
}
