use anyhow::{Context, Result};
use cart_auth::{HmacSessionVerifier, SessionVerifier};
use cart_core::Identity;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cart")]
#[command(about = "Cart service operator CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Session token utilities
    Session {
        #[command(subcommand)]
        cmd: SessionCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    /// Check connectivity and whether the cart table exists.
    Status,

    /// Apply SQL migrations.
    Migrate,
}

#[derive(Subcommand)]
enum SessionCmd {
    /// Mint a session token for a user, signed with JWTSECRET.
    Mint {
        /// User id carried in the token
        #[arg(long)]
        user_id: i64,

        /// Lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl_secs: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::dotenv();

    // stdout carries command output; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let lookup = |key: &str| std::env::var(key).ok();

    match cli.cmd {
        Commands::Db { cmd } => {
            let file = cart_config::load_file_config(&lookup)?;
            let settings = cart_config::resolve_db(&file, &lookup)?;
            let pool = cart_db::connect(&settings).await?;
            match cmd {
                DbCmd::Status => {
                    let s = cart_db::status(&pool).await?;
                    println!("db_ok={} has_cart_table={}", s.ok, s.has_cart_table);
                }
                DbCmd::Migrate => {
                    cart_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
            pool.close().await;
        }

        Commands::Session { cmd } => match cmd {
            SessionCmd::Mint { user_id, ttl_secs } => {
                if ttl_secs <= 0 {
                    anyhow::bail!("--ttl-secs must be > 0 (got {ttl_secs})");
                }
                let Some(ttl) = chrono::TimeDelta::try_seconds(ttl_secs) else {
                    anyhow::bail!("--ttl-secs out of range (got {ttl_secs})");
                };
                let secret = cart_config::resolve_session_secret(&lookup)?;
                let sessions = HmacSessionVerifier::new(secret.expose());
                let token = sessions
                    .mint(Identity { id: user_id }, ttl)
                    .context("mint session token")?;

                // Round-trip before printing so a bad key never yields a token.
                sessions.verify(&token).context("verify minted token")?;
                println!("{token}");
            }
        },
    }

    Ok(())
}
