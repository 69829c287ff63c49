//! CLI entry point for peek.
//!
//! Watches one file and serves a live view of it: every browser tab pointed
//! at the server shows the file's current contents and follows every save.
//!
//! # Usage
//!
//! ```bash
//! peek [OPTIONS] <FILE>
//!
//! # Serve drawing.svg on port 8080
//! peek drawing.svg
//!
//! # Serve on another port, with a custom viewer
//! PORT=3000 peek --assets ./viewer drawing.svg
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

use std::future::Future;
use std::net::IpAddr;
use std::sync::Arc;

use camino::Utf8PathBuf;
use clap::Parser;
use peek_core::{Config, WatchedPath};
use peek_server::{AppState, start};
use peek_watcher::{ChangeNotification, ChangeSource, FileWatcher, Notifier, WatchError};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Serve a live view of FILE over WebSockets.
///
/// Every connected viewer receives the full file contents on connect and
/// again whenever the file is written or replaced.
#[derive(Parser)]
#[command(name = "peek", version, about, long_about = None)]
struct Cli {
    /// File to watch. It does not need to exist yet, but its directory must.
    file: Utf8PathBuf,

    /// Port to listen on [default: 8080].
    #[arg(short, long, env = "PORT")]
    port: Option<u16>,

    /// Address to bind [default: 0.0.0.0].
    #[arg(long, env = "PEEK_BIND")]
    bind: Option<IpAddr>,

    /// Close each viewer connection after this many seconds [default: 600].
    #[arg(long)]
    session_timeout_secs: Option<u64>,

    /// Serve the viewer from this directory instead of the built-in page.
    #[arg(long, env = "PEEK_ASSETS")]
    assets: Option<Utf8PathBuf>,

    /// JSON configuration file. Flags and environment variables override it.
    #[arg(short, long)]
    config: Option<Utf8PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
}

// =============================================================================
// INITIALIZATION FUNCTIONS
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
/// Noisy crates like `hyper` and `mio` are filtered to `warn` level.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!(
            "{level},hyper=warn,mio=warn,notify=warn,tower_http=warn"
        ))
    });

    // Check if colors should be disabled (flag or NO_COLOR env var)
    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi))
        .with(filter)
        .init();
}

/// Builds a [`Config`] from the optional config file and CLI arguments.
///
/// # Errors
///
/// Returns an error if the config file cannot be read or parsed, or if the
/// resulting configuration is invalid.
fn build_config(cli: &Cli) -> color_eyre::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)?,
        None => Config::default(),
    };

    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if let Some(bind) = cli.bind {
        config.server.bind_addr = bind;
    }
    if let Some(secs) = cli.session_timeout_secs {
        config.server.session_timeout_ms = secs.saturating_mul(1000);
    }
    if cli.assets.is_some() {
        config.server.assets_dir.clone_from(&cli.assets);
    }

    if let Some(dir) = &config.server.assets_dir {
        if !dir.is_dir() {
            return Err(color_eyre::eyre::eyre!(
                "Assets path is not a directory: {dir}"
            ));
        }
    }

    config.validate()?;
    Ok(config)
}

// =============================================================================
// SERVE
// =============================================================================

/// Watches the file and serves viewers until SIGINT/SIGTERM.
///
/// # Errors
///
/// Returns an error if the path cannot be resolved, the watch cannot be
/// established, or the listener cannot bind.
async fn run(cli: &Cli, config: Config) -> color_eyre::Result<()> {
    let watched = Arc::new(WatchedPath::resolve(&cli.file)?);
    info!(file = watched.file_name(), dir = %watched.dir(), "Watching file");

    let shutdown = CancellationToken::new();
    let notifier = Notifier::new(config.watch.broadcast_capacity);

    let watcher = FileWatcher::new(&watched, &config.watch)?;
    let initial = ChangeNotification::initial(watched.file().to_owned());
    let mut source = ChangeSource::new(watcher, notifier.clone(), initial).spawn(shutdown.clone());

    let state = AppState::new(
        Arc::clone(&watched),
        notifier,
        config.server.session_timeout(),
        shutdown.clone(),
    );
    let server = start(&config.server, state).await?;
    info!(url = %format!("http://{}/", server.local_addr()), "Viewer ready");

    let stopped = wait_for_stop(wait_for_signal(&shutdown), &mut source).await;
    shutdown.cancel();
    server.wait().await?;

    // After a signal the source has not been polled to completion yet.
    stopped?;
    source.await??;

    info!("Shut down");
    Ok(())
}

/// Waits for `signal`, or for the change source to end first.
///
/// The source only ends on its own when the watcher fails; viewers would then
/// never see another change, so that is an error even if the source returned
/// `Ok`.
async fn wait_for_stop<F>(
    signal: F,
    source: &mut JoinHandle<Result<(), WatchError>>,
) -> color_eyre::Result<()>
where
    F: Future<Output = color_eyre::Result<()>>,
{
    tokio::select! {
        result = signal => result,
        ended = source => {
            ended??;
            Err(color_eyre::eyre::eyre!("Change source stopped before shutdown"))
        }
    }
}

/// Resolves on SIGINT, on SIGTERM (Unix), or when `shutdown` is cancelled.
async fn wait_for_signal(shutdown: &CancellationToken) -> color_eyre::Result<()> {
    // Handle SIGTERM for graceful shutdown on Unix
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received SIGINT, shutting down");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down");
            }
            () = shutdown.cancelled() => {}
        }
    }

    #[cfg(not(unix))]
    {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received Ctrl-C, shutting down");
            }
            () = shutdown.cancelled() => {}
        }
    }

    Ok(())
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    // 1. Install color-eyre FIRST (before any potential panics)
    color_eyre::install()?;

    // 2. Parse CLI arguments (usage errors exit here)
    let cli = Cli::parse();

    // 3. Initialize tracing (handles --no-color for log output)
    init_tracing(cli.verbose, cli.no_color);

    // 4. Build configuration, then serve
    let result = match build_config(&cli) {
        Ok(config) => run(&cli, config).await,
        Err(e) => Err(e),
    };

    if let Err(e) = &result {
        error!(error = %e, "Fatal error");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use std::time::Duration;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("peek").chain(args.iter().copied()))
            .expect("Failed to parse arguments")
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_file_argument_is_required() {
        let err = Cli::try_parse_from(["peek"]).err().expect("should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::MissingRequiredArgument);
    }

    #[test]
    fn test_extra_positional_is_rejected() {
        assert!(Cli::try_parse_from(["peek", "a.svg", "b.svg"]).is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = parse(&["--port", "3000", "--session-timeout-secs", "5", "a.svg"]);
        let config = build_config(&cli).expect("config");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.session_timeout(), Duration::from_secs(5));
        assert_eq!(config.watch.broadcast_capacity, 16);
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::TempDir::new().expect("Failed to create temp directory");
        let path = dir.path().join("peek.json");
        std::fs::write(
            &path,
            r#"{ "server": { "port": 9000, "session_timeout_ms": 1000 } }"#,
        )
        .expect("Failed to write config");
        let path = path.to_str().expect("utf8");

        let from_file = build_config(&parse(&["--config", path, "a.svg"])).expect("config");
        assert_eq!(from_file.server.port, 9000);
        assert_eq!(from_file.server.session_timeout_ms, 1000);

        let overridden =
            build_config(&parse(&["--config", path, "--port", "9001", "a.svg"])).expect("config");
        assert_eq!(overridden.server.port, 9001);
        assert_eq!(overridden.server.session_timeout_ms, 1000);
    }

    #[test]
    fn test_zero_timeout_is_rejected() {
        let cli = parse(&["--session-timeout-secs", "0", "a.svg"]);
        assert!(build_config(&cli).is_err());
    }

    #[test]
    fn test_assets_must_be_directory() {
        let cli = parse(&["--assets", "/definitely/not/here", "a.svg"]);
        assert!(build_config(&cli).is_err());
    }

    #[tokio::test]
    async fn test_failed_change_source_is_fatal() {
        let mut source = tokio::spawn(async { Err(WatchError::ChannelClosed) });
        let result = wait_for_stop(std::future::pending(), &mut source).await;
        let err = result.err().expect("should fail");
        assert!(err.to_string().contains("closed"));
    }

    #[tokio::test]
    async fn test_change_source_ending_early_is_fatal() {
        let mut source = tokio::spawn(async { Ok(()) });
        let result = wait_for_stop(std::future::pending(), &mut source).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_signal_stops_while_source_runs() {
        let mut source = tokio::spawn(std::future::pending::<Result<(), WatchError>>());
        let result = wait_for_stop(async { Ok(()) }, &mut source).await;
        assert!(result.is_ok());
        source.abort();
    }
}
