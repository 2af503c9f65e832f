//! Demo: store one user from a background worker and log every row.
//!
//! Usage: `user-database-demo [config.toml]`. Without a config file the
//! store lives under `./data`.

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;
use user_database::{
    AppContext, AsyncUserRepository, BackgroundRepository, DatabaseHandle, UserRecord,
};

fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("user_database=debug,user=info")),
        )
        .init();
}

fn load_context() -> Result<AppContext> {
    match std::env::args().nth(1) {
        Some(path) => {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("reading config {path}"))?;
            AppContext::from_toml_str(&raw).with_context(|| format!("parsing config {path}"))
        }
        None => Ok(AppContext::new("data")),
    }
}

fn main() -> Result<()> {
    init_logging();

    let context = load_context()?;
    let db = DatabaseHandle::get(&context).context("opening user database")?;
    let users = BackgroundRepository::new(db.repository()).context("starting store worker")?;

    futures::executor::block_on(async {
        users
            .insert(UserRecord::new("Rute", "rute@gmail.com"))
            .await
            .context("inserting user")?;

        for user in users.get_all_users().await.context("listing users")? {
            tracing::info!(target: "user", "{user}");
        }
        Ok::<_, anyhow::Error>(())
    })
}
