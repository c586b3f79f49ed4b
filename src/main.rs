mod output;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use directories::ProjectDirs;
use figment::Profile;
use oa_session::{ClientConfig, Credentials, FileStorage, OaClient, SessionError};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oa-session")]
#[command(about = "Sign in to the OA platform and manage the local session")]
struct Cli {
    /// Config file (default: platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Config profile, overrides OA_PROFILE
    #[arg(long, global = true)]
    profile: Option<String>,

    /// Session file, overrides storage_path
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and store the session
    Login {
        #[arg(short, long)]
        username: String,
        /// Prompted for when omitted
        #[arg(short, long)]
        password: Option<String>,
    },
    /// End the session (server + local)
    Logout,
    /// Show whether a session is held
    Status,
    /// Show the stored user profile
    Whoami {
        /// Refetch the profile from the auth service first
        #[arg(long)]
        refresh: bool,
    },
    /// Trade the refresh token for a new access token
    Refresh,
    /// List granted permission codes
    Perms,
    /// Exit non-zero unless the permission code is granted
    Check { code: String },
    /// Ask the auth service whether the token is still valid
    Validate,
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write a starter config file
    Init {
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration
    Show,
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "oa-session")
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("oa_session=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config_path = cli
        .config
        .clone()
        .or_else(|| project_dirs().map(|d| d.config_dir().join("config.toml")));

    if let Commands::Config(ConfigCommand::Init { force }) = &cli.command {
        let path = config_path.context("no config directory on this platform, pass --config")?;
        return write_config_template(path, *force).await;
    }

    let config = match &cli.profile {
        Some(name) => ClientConfig::load_profile(config_path.as_deref(), Profile::new(name)),
        None => ClientConfig::load(config_path.as_deref()),
    }
    .context("loading configuration")?;

    if let Commands::Config(ConfigCommand::Show) = &cli.command {
        print!("{}", toml::to_string_pretty(&config)?);
        return Ok(());
    }

    let store_path = cli
        .store
        .clone()
        .or_else(|| config.storage_path.clone())
        .or_else(|| project_dirs().map(|d| d.data_dir().join("session.json")))
        .context("no data directory on this platform, pass --store")?;

    let storage = Arc::new(FileStorage::open(&store_path).await);
    let client = OaClient::connect(&config, storage, Arc::new(output::ConsoleNotifier))
        .await
        .context("building HTTP client")?;

    run(cli.command, &client).await
}

async fn run(command: Commands, client: &OaClient) -> Result<()> {
    let session = client.session();

    match command {
        Commands::Login { username, password } => {
            let password = match password {
                Some(p) => p,
                None => {
                    eprint!("Password: ");
                    console::Term::stderr()
                        .read_secure_line()
                        .context("reading password")?
                }
            };
            let pb = output::spinner("Signing in...");
            match session.login(&Credentials::new(username, password)).await {
                Ok(()) => {
                    let name = session.snapshot().username().unwrap_or("?").to_string();
                    output::spinner_success(&pb, &format!("Signed in as {}", style(name).bold()));
                }
                Err(e) => {
                    output::spinner_error(&pb, &e);
                    bail!("login failed");
                }
            }
        }

        Commands::Logout => {
            let pb = output::spinner("Signing out...");
            session.logout().await;
            output::spinner_success(&pb, "Signed out");
        }

        Commands::Status => {
            let snapshot = session.snapshot();
            if !snapshot.is_authenticated() {
                println!("{}", style("logged out").dim());
                return Ok(());
            }
            println!(
                "{} as {}",
                style("logged in").green(),
                snapshot.username().unwrap_or("?")
            );
            println!("permissions: {}", snapshot.permissions.len());
            println!(
                "refresh token: {}",
                if snapshot.refresh_token.is_empty() { "no" } else { "yes" }
            );
            if let Some(exp) = session.token_expires_at() {
                println!("token expires at: {} (unix)", exp);
            }
        }

        Commands::Whoami { refresh } => {
            require_login(client)?;
            let user = if refresh {
                client.auth().fetch_user_info().await.map_err(reported)?
            } else {
                session.user()
            };
            println!("{}", serde_json::to_string_pretty(&user)?);
        }

        Commands::Refresh => {
            let pb = output::spinner("Refreshing session...");
            match session.refresh_session().await {
                Ok(_) => output::spinner_success(&pb, "Session refreshed"),
                Err(e) => {
                    output::spinner_error(&pb, &e);
                    bail!("refresh failed");
                }
            }
        }

        Commands::Perms => {
            require_login(client)?;
            for code in session.permissions() {
                println!("{}", code);
            }
        }

        Commands::Check { code } => {
            if let Err(e) = session.require_perm(&code) {
                bail!(e);
            }
            println!("{} {}", style("granted").green(), code);
        }

        Commands::Validate => {
            require_login(client)?;
            let valid = client.auth().validate_token().await.map_err(reported)?;
            if !valid {
                bail!("token rejected by the auth service");
            }
            println!("{}", style("token valid").green());
        }

        // handled before the client is built
        Commands::Config(_) => {}
    }

    Ok(())
}

fn require_login(client: &OaClient) -> Result<()> {
    if !client.session().is_authenticated() {
        bail!("not logged in, run `oa-session login` first");
    }
    Ok(())
}

/// The notifier already printed the message
fn reported(err: SessionError) -> anyhow::Error {
    anyhow::Error::new(err).context("request failed")
}

async fn write_config_template(path: PathBuf, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let template = ClientConfig::template().context("rendering config template")?;
    tokio::fs::write(&path, template)
        .await
        .with_context(|| format!("writing {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(())
}
