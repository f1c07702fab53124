//! Issue an API key from the command line.
//!
//! Every key management endpoint needs an API key itself, so the first key
//! of an account is created here. The token is printed to stdout once and
//! cannot be recovered afterwards.
//!
//! ```text
//! issue-key alice --name "Reader app" --expires-in-days 90
//! ```

use chrono::{Duration, Utc};
use clap::Parser;
use readlater_server::{
    config::Config,
    db,
    services::api_key_service::ApiKeyService,
    store::PgApiKeyStore,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "issue-key", about = "Issue an API key for an account")]
struct Args {
    /// Account username; created if it does not exist
    username: String,

    /// Label for the key
    #[arg(long, default_value = "CLI key")]
    name: String,

    /// Expire the key this many days from now (never expires if omitted)
    #[arg(long)]
    expires_in_days: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = Config::from_env()?;

    let pool = db::create_pool(&config.database_url, 1).await?;
    db::run_migrations(&pool).await?;

    let store = Arc::new(PgApiKeyStore::new(pool));
    let account = store.ensure_account(&args.username).await?;

    let expires_at = args
        .expires_in_days
        .map(|days| {
            Duration::try_days(days)
                .and_then(|delta| Utc::now().checked_add_signed(delta))
                .ok_or_else(|| anyhow::anyhow!("--expires-in-days is out of range"))
        })
        .transpose()?;

    let issued = ApiKeyService::new(store)
        .issue(account.id, &args.name, expires_at)
        .await?;

    tracing::info!(account_id = %account.id, api_key_id = %issued.credential.id(), "issued API key");
    println!("{}", issued.token);

    Ok(())
}
