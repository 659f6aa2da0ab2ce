use anyhow::Context;
use bigsister_bridge::{
    envelope, load_params, InvocationBridge, EXIT_INVOCATION_ERROR, EXIT_OK, MANAGER_KIND,
};
use bigsister_core::{AppConfig, SelfTestPolicy};
use clap::{Args, Parser};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "bigsister")]
#[command(version, about = "Run BigSister forensic features and print JSON envelopes")]
struct Cli {
    #[command(flatten)]
    mode: Mode,

    /// Feature ID to run
    #[arg(long)]
    feature: Option<String>,

    /// Option ID within the feature
    #[arg(long)]
    option: Option<String>,

    /// Parameters as a JSON object
    #[arg(long, default_value = "{}")]
    params: String,

    /// Read parameters from a JSON file instead of --params
    #[arg(long)]
    params_file: Option<PathBuf>,

    /// Configuration file (defaults to the per-user config)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Expose the debug flag to features and log verbosely
    #[arg(long)]
    debug: bool,

    /// Load features whose self-test fails
    #[arg(long)]
    advisory_self_test: bool,
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct Mode {
    /// List features and their options
    #[arg(long)]
    list: bool,

    /// Run a feature
    #[arg(long)]
    run: bool,
}

/// Initialize tracing on stderr; stdout carries only JSON.
fn init_tracing(debug: bool) {
    let default = if debug { "info,bigsister=debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => AppConfig::load().context("loading config")?,
    };
    let mut config = config.with_env_overrides();

    if cli.debug {
        config.general.debug = true;
    }
    if cli.advisory_self_test {
        config.manager.self_test = SelfTestPolicy::Advisory;
    }
    Ok(config)
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let config = load_config(&cli)?;
    let debug = config.general.debug;
    let bridge = InvocationBridge::from_config(&config, &bigsister_tools::builtin_catalog());

    if cli.mode.list {
        print_json(&bridge.list())?;
        bridge.shutdown();
        return Ok(ExitCode::from(EXIT_OK));
    }

    let params = match load_params(&cli.params, cli.params_file.as_deref()) {
        Ok(params) => params,
        Err(e) => {
            tracing::warn!(error = %e, "rejecting malformed params");
            print_json(&Value::Object(envelope::failure(e.to_string())))?;
            bridge.shutdown();
            return Ok(ExitCode::from(e.exit_code()));
        }
    };

    let feature = cli.feature.as_deref().unwrap_or_default();
    let mut result = bridge.invoke(feature, cli.option.as_deref(), &params);
    let ok = envelope::is_ok(&result);
    result.insert(
        "_meta".to_string(),
        json!({
            "manager": MANAGER_KIND,
            "version": env!("CARGO_PKG_VERSION"),
            "debug": debug,
        }),
    );

    print_json(&Value::Object(result))?;
    bridge.shutdown();

    Ok(ExitCode::from(if ok { EXIT_OK } else { EXIT_INVOCATION_ERROR }))
}
