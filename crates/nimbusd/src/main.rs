//! nimbusd — the nimbus daemon.
//!
//! - `watch`: run the hardware and image watchdogs against a provider listing
//!   and log every problem they report
//! - `create-instance`: run one create-instance job and print its outcome
//! - `import`: load a model snapshot into the store
//!
//! # Usage
//!
//! ```text
//! nimbusd --config /etc/nimbus/nimbus.toml watch --snapshot provider.json
//! nimbusd --config /etc/nimbus/nimbus.toml create-instance --instance i-web
//! nimbusd --config /etc/nimbus/nimbus.toml import --model model.json
//! ```

mod job_mode;
mod watch_mode;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use nimbus_core::NimbusConfig;
use nimbus_state::{ModelSnapshot, StateStore};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nimbusd", about = "nimbus daemon")]
struct Cli {
    /// Path to nimbus.toml. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, value_enum, default_value = "text", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile provider listings against the model until Ctrl-C.
    Watch {
        /// Provider listing exported as JSON, re-read every cycle.
        #[arg(long)]
        snapshot: PathBuf,
    },

    /// Deploy one component instance onto its virtual machine.
    CreateInstance {
        /// Model id of the instance.
        #[arg(long)]
        instance: String,
    },

    /// Import a model snapshot (JSON) into the store.
    Import {
        #[arg(long)]
        model: PathBuf,
    },
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,nimbusd=debug,nimbus=debug"));
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => subscriber.init(),
        LogFormat::Json => subscriber.json().init(),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<NimbusConfig> {
    match path {
        Some(path) => NimbusConfig::from_file(path),
        None => Ok(NimbusConfig::default()),
    }
}

pub(crate) fn open_store(config: &NimbusConfig) -> anyhow::Result<StateStore> {
    let path = &config.state.path;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let store = StateStore::open(path).with_context(|| format!("opening {}", path.display()))?;
    info!(path = %path.display(), "model store opened");
    Ok(store)
}

fn import(config: &NimbusConfig, model: &Path) -> anyhow::Result<()> {
    let content =
        std::fs::read(model).with_context(|| format!("reading {}", model.display()))?;
    let snapshot: ModelSnapshot = serde_json::from_slice(&content)
        .with_context(|| format!("parsing {}", model.display()))?;
    let store = open_store(config)?;
    let count = store.import(&snapshot)?;
    info!(count, model = %model.display(), "model imported");
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Watch { snapshot } => watch_mode::run(&config, snapshot).await,
        Command::CreateInstance { instance } => job_mode::create_instance(&config, &instance).await,
        Command::Import { model } => import(&config, &model),
    }
}
