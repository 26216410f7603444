mod console;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use lanchat_core::config::Config;
use lanchat_core::core_chat::{ChatSession, SessionEnd};
use lanchat_core::core_net::JoinTarget;
use lanchat_core::logging::{init_logging_with_config, LogConfig, LogLevel};
use lanchat_core::shutdown::{install_signal_handlers, ShutdownCoordinator};
use tracing::info;

use console::ConsoleFrontend;

#[derive(Parser, Debug)]
#[command(name = "lanchat")]
#[command(author, version, about = "Chat with everyone on your LAN", long_about = None)]
#[command(group(ArgGroup::new("mode").required(true).args(["host", "join"])))]
struct Args {
    /// Host a session on the configured port
    #[arg(long)]
    host: bool,

    /// Join a session at address:port
    #[arg(short, long, value_name = "ADDRESS:PORT")]
    join: Option<JoinTarget>,

    /// Display name (defaults to identity.default_name)
    #[arg(short, long)]
    name: Option<String>,

    /// TOML configuration file; LANCHAT_* variables are used when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(short, long)]
    log_level: Option<LogLevel>,

    /// Enable JSON formatted logging
    #[arg(long)]
    json_logs: bool,
}

impl Args {
    fn load_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)
                .with_context(|| format!("couldn't load configuration from {}", path.display()))?,
            None => Config::from_env().context("invalid LANCHAT_* environment configuration")?,
        };

        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if self.json_logs {
            config.logging.json_format = true;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = args.load_config()?;

    init_logging_with_config(LogConfig::from(&config.logging))?;
    lanchat_core::metrics::init_metrics();

    let name = args
        .name
        .clone()
        .unwrap_or_else(|| config.identity.default_name.clone());

    let shutdown = Arc::new(ShutdownCoordinator::new());
    install_signal_handlers(shutdown.clone());
    let mut shutdown_listener = shutdown.subscribe();

    let input = console::spawn_stdin_reader(shutdown.clone());
    let mut frontend = ConsoleFrontend::new(input, std::io::stdout());

    let mut session = match &args.join {
        Some(target) => ChatSession::join(&config, target, name.as_str())
            .await
            .with_context(|| format!("couldn't join {}", target))?,
        None => {
            let session = ChatSession::host(&config, name.as_str(), &mut frontend)
                .await
                .context("couldn't start hosting")?;
            if let Some(addr) = session.local_addr() {
                frontend.notice(&format!("hosting on port {} as {}", addr.port(), name));
            }
            session
        }
    };

    info!(%name, host = session.is_host(), "session started");

    match session.run(&mut frontend, &mut shutdown_listener).await {
        SessionEnd::HostGone => println!("The host has disconnected."),
        SessionEnd::Shutdown(reason) => info!(?reason, "session ended"),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_mode() {
        let args = Args::try_parse_from(["lanchat", "--host", "--name", "Hana"]).unwrap();
        assert!(args.host);
        assert!(args.join.is_none());
        assert_eq!(args.name.as_deref(), Some("Hana"));
    }

    #[test]
    fn test_join_mode() {
        let args = Args::try_parse_from(["lanchat", "--join", "192.168.1.20:6969", "-l", "debug"]).unwrap();
        assert_eq!(args.join, Some(JoinTarget::new("192.168.1.20", 6969)));
        assert_eq!(args.log_level, Some(LogLevel::Debug));
    }

    #[test]
    fn test_mode_is_required_and_exclusive() {
        assert!(Args::try_parse_from(["lanchat"]).is_err());
        assert!(Args::try_parse_from(["lanchat", "--host", "--join", "10.0.0.1:6969"]).is_err());
    }

    #[test]
    fn test_bad_join_target_is_rejected() {
        let err = Args::try_parse_from(["lanchat", "--join", "10.0.0.1"]).unwrap_err();
        assert!(err.to_string().contains("join target must be formatted as address:port"));
    }

    #[test]
    fn test_flags_override_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lanchat.toml");
        std::fs::write(&path, "[logging]\nlevel = \"error\"\n").unwrap();

        let args = Args::try_parse_from([
            "lanchat",
            "--host",
            "--config",
            path.to_str().unwrap(),
            "--log-level",
            "trace",
            "--json-logs",
        ])
        .unwrap();
        let config = args.load_config().unwrap();

        assert_eq!(config.logging.level, LogLevel::Trace);
        assert!(config.logging.json_format);
        assert_eq!(config.network.listen_port, 6969);
    }
}
