use anyhow::Result;
use archd::config::ServerConfig;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "archd", version, about = "Archive manipulation server")]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "ARCHD_CONFIG")]
    config: Option<PathBuf>,

    /// Host to bind
    #[arg(long)]
    bind: Option<String>,

    /// Preferred port; repeat to give fallbacks
    #[arg(short, long = "port")]
    ports: Vec<u16>,

    /// Path to the native RAR tool
    #[arg(long, env = "ARCHD_RAR_BINARY")]
    rar_binary: Option<PathBuf>,

    /// Disable ANSI colors in responses
    #[arg(long)]
    no_color: bool,

    /// Debug logging; takes precedence over RUST_LOG
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply(self, mut config: ServerConfig) -> ServerConfig {
        if let Some(bind) = self.bind {
            config.bind = bind;
        }
        if !self.ports.is_empty() {
            config.ports = self.ports;
        }
        if let Some(rar) = self.rar_binary {
            config.rar_binary = rar;
        }
        if self.no_color {
            config.color = false;
        }
        config
    }
}

/// `-v` wins over RUST_LOG; RUST_LOG wins over the default
fn log_filter(verbose: bool) -> EnvFilter {
    if verbose {
        EnvFilter::new("archd=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("archd=info"))
    }
}

fn init_tracing(verbose: bool) {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(verbose))
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = ServerConfig::load(cli.config.as_deref())?;
    let config = cli.apply(config);

    // Responses go to sockets, not our terminal, so decide colors explicitly
    colored::control::set_override(config.color);

    tracing::debug!(config = ?config, "starting");

    tokio::select! {
        result = archd::server::run(&config) => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted, shutting down");
            Ok(())
        }
    }
}
