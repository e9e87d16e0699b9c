//! Command line front end. Results are printed as pretty JSON on stdout.

use crate::app::App;
use crate::auth::{CredentialProvider, StaticToken, StoredToken, TokenFile};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::runner::Phase;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Manage the LoliaFRP tunnel client
#[derive(Parser, Debug)]
#[command(name = "shizuku", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show installed and latest tunnel client versions
    Status,
    /// Install or update the tunnel client (Ctrl+C cancels)
    Install,
    /// Remove the installed tunnel client
    Remove,
    /// Show or set the download mirror
    Mirror(MirrorArgs),
    /// Run the tunnel client in the foreground (Ctrl+C stops)
    Run(RunArgs),
    /// Show the current user
    User,
    /// Show traffic usage
    Traffic(TrafficArgs),
    /// List tunnels with recent traffic
    Tunnels(TunnelsArgs),
    /// List nodes
    Nodes,
    /// Print the rendered client config for a tunnel
    #[command(name = "config")]
    ClientConfig(ClientConfigArgs),
    /// Show the account dashboard
    Dashboard,
    /// Store an access token
    Login(LoginArgs),
    /// Forget the stored access token
    Logout,
}

#[derive(Args, Debug)]
pub struct MirrorArgs {
    /// Mirror base URL, prepended to every download URL
    #[arg(conflicts_with = "clear")]
    pub url: Option<String>,

    /// Download directly from the release host
    #[arg(long)]
    pub clear: bool,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Tunnel name (defaults to the first tunnel of the account)
    pub tunnel: Option<String>,
}

#[derive(Args, Debug)]
pub struct TrafficArgs {
    /// Days of daily history
    #[arg(long, default_value_t = 7)]
    pub days: i32,
}

#[derive(Args, Debug)]
pub struct TunnelsArgs {
    #[arg(long, default_value_t = 1)]
    pub page: u32,

    #[arg(long, default_value_t = 20)]
    pub limit: u32,

    /// Traffic window in days
    #[arg(long, default_value_t = 7)]
    pub days: i32,
}

#[derive(Args, Debug)]
pub struct ClientConfigArgs {
    pub tunnel: String,
}

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Access token issued by the center
    #[arg(long)]
    pub token: String,

    /// Expiry as milliseconds since the epoch
    #[arg(long)]
    pub expires_at: Option<u64>,
}

/// Pick the credential source: `LOLIA_ACCESS_TOKEN` first, then the token file.
fn credentials(config: &Config) -> Arc<dyn CredentialProvider> {
    match StaticToken::from_env() {
        Some(token) => Arc::new(token),
        None => Arc::new(TokenFile::new(config.token_path())),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Run a parsed command line.
pub async fn run(cli: Cli) -> ExitCode {
    match run_inner(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            if e.is_unauthorized() {
                eprintln!("Your session was rejected. Run 'shizuku login --token <TOKEN>' to sign in again.");
            }
            ExitCode::FAILURE
        }
    }
}

async fn run_inner(cli: Cli) -> Result<()> {
    let config = Config::load().map_err(|e| Error::Config(e.to_string()))?;

    // Token commands never touch the network.
    match &cli.command {
        Commands::Login(args) => return login(&config, args),
        Commands::Logout => {
            TokenFile::new(config.token_path()).clear()?;
            eprintln!("Logged out");
            return Ok(());
        }
        _ => {}
    }

    let shutdown = CancellationToken::new();
    let app = App::new(config.clone(), credentials(&config), shutdown.clone())?;
    let center = app.center();

    let result = match cli.command {
        Commands::Status => print_json(&app.installer().get_status().await?),
        Commands::Install => install(&app).await,
        Commands::Remove => {
            app.installer().remove()?;
            print_json(&app.installer().get_status().await?)
        }
        Commands::Mirror(args) => {
            let mirror_url = if args.clear {
                app.installer().set_mirror_url("")?
            } else if let Some(url) = args.url {
                app.installer().set_mirror_url(&url)?
            } else {
                app.installer().mirror_url()?
            };
            print_json(&serde_json::json!({ "mirror_url": mirror_url }))
        }
        Commands::Run(args) => run_foreground(&app, args.tunnel.as_deref()).await,
        Commands::User => print_json(&center.user_info().await?),
        Commands::Traffic(args) => {
            let usage = center.traffic_stats().await?;
            let daily = center.traffic_daily(args.days).await?;
            print_json(&serde_json::json!({ "usage": usage, "daily": daily }))
        }
        Commands::Tunnels(args) => print_json(
            &center
                .tunnels_overview(args.page, args.limit, args.days)
                .await?,
        ),
        Commands::Nodes => print_json(&center.nodes().await?),
        Commands::ClientConfig(args) => {
            let rendered = center.client_config(&args.tunnel).await?;
            println!("{}", rendered.config);
            Ok(())
        }
        Commands::Dashboard => print_json(&center.dashboard().await?),
        Commands::Login(_) | Commands::Logout => Ok(()),
    };

    shutdown.cancel();
    result
}

fn login(config: &Config, args: &LoginArgs) -> Result<()> {
    let token = args.token.trim();
    if token.is_empty() {
        return Err(Error::Config("Token must not be empty".to_string()));
    }

    let store = TokenFile::new(config.token_path());
    store.save(&StoredToken {
        access_token: token.to_string(),
        refresh_token: None,
        expires_at: args.expires_at,
    })?;
    eprintln!("Token saved to {}", store.path().display());
    Ok(())
}

async fn install(app: &App) -> Result<()> {
    let installer = app.installer();
    let install = installer.install_or_update();
    tokio::pin!(install);

    let result = tokio::select! {
        result = &mut install => result,
        _ = tokio::signal::ctrl_c() => {
            installer.cancel();
            install.await
        }
    };
    print_json(&result?)
}

async fn run_foreground(app: &App, tunnel: Option<&str>) -> Result<()> {
    let supervisor = app.supervisor();
    let status = supervisor.start(tunnel).await?;
    eprintln!(
        "Running {} (pid {}), Ctrl+C to stop",
        status.tunnel_name,
        status.pid.unwrap_or_default()
    );

    let mut phases = supervisor.subscribe();
    let status = tokio::select! {
        _ = tokio::signal::ctrl_c() => supervisor.stop().await,
        _ = phases.wait_for(|p| *p == Phase::Stopped) => supervisor.status(),
    };
    print_json(&status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_status() {
        let cli = Cli::try_parse_from(["shizuku", "status"]).unwrap();
        assert!(matches!(cli.command, Commands::Status));
    }

    #[test]
    fn test_command_is_required() {
        assert!(Cli::try_parse_from(["shizuku"]).is_err());
    }

    #[test]
    fn test_parse_run_with_and_without_tunnel() {
        let cli = Cli::try_parse_from(["shizuku", "run", "web"]).unwrap();
        if let Commands::Run(args) = cli.command {
            assert_eq!(args.tunnel.as_deref(), Some("web"));
        } else {
            panic!("Expected Run command");
        }

        let cli = Cli::try_parse_from(["shizuku", "run"]).unwrap();
        assert!(matches!(cli.command, Commands::Run(RunArgs { tunnel: None })));
    }

    #[test]
    fn test_parse_mirror() {
        let cli = Cli::try_parse_from(["shizuku", "mirror", "https://ghproxy.example"]).unwrap();
        if let Commands::Mirror(args) = cli.command {
            assert_eq!(args.url.as_deref(), Some("https://ghproxy.example"));
            assert!(!args.clear);
        } else {
            panic!("Expected Mirror command");
        }

        assert!(Cli::try_parse_from(["shizuku", "mirror", "https://x", "--clear"]).is_err());
    }

    #[test]
    fn test_parse_tunnels_defaults() {
        let cli = Cli::try_parse_from(["shizuku", "tunnels", "--limit", "50"]).unwrap();
        if let Commands::Tunnels(args) = cli.command {
            assert_eq!(args.page, 1);
            assert_eq!(args.limit, 50);
            assert_eq!(args.days, 7);
        } else {
            panic!("Expected Tunnels command");
        }
    }

    #[test]
    fn test_parse_config_and_login() {
        let cli = Cli::try_parse_from(["shizuku", "config", "web"]).unwrap();
        assert!(matches!(cli.command, Commands::ClientConfig(ref a) if a.tunnel == "web"));

        let cli = Cli::try_parse_from(["shizuku", "login", "--token", "abc"]).unwrap();
        if let Commands::Login(args) = cli.command {
            assert_eq!(args.token, "abc");
            assert!(args.expires_at.is_none());
        } else {
            panic!("Expected Login command");
        }

        assert!(Cli::try_parse_from(["shizuku", "login"]).is_err());
    }

    #[test]
    fn test_login_writes_token_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config {
            data_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        login(
            &config,
            &LoginArgs {
                token: " abc ".into(),
                expires_at: None,
            },
        )
        .unwrap();

        let stored = TokenFile::new(config.token_path()).load().unwrap().unwrap();
        assert_eq!(stored.access_token, "abc");

        let err = login(
            &config,
            &LoginArgs {
                token: "  ".into(),
                expires_at: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
