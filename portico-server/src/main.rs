use clap::Parser;
use portico_server::Registry;
use portico_server::config::{Config, Storage};
use portico_server::db::Db;
use portico_server::db::repo::account::AccountRepo;
use portico_server::db::repo::account_db::AccountRepository;
use portico_server::db::repo::account_mem::MemoryAccountRepo;
use portico_server::net::http;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Debug, Parser)]
#[command(name = "portico", version, about = "Account registration and profile API")]
struct Args {
    /// TOML configuration file. Environment variables (and `.env`) are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing()?;

    let args = Args::parse();
    let cfg = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::from_env()?,
    };

    let accounts: Arc<dyn AccountRepo> = match cfg.storage {
        Storage::Postgres => {
            // Setup database and run migrations if needed
            let db = Db::new(&cfg.database_url)?;
            db.init().await?;
            Arc::new(AccountRepository::new(Arc::new(db)))
        }
        Storage::Memory => {
            tracing::warn!("using in-memory account storage, accounts are lost on restart");
            Arc::new(MemoryAccountRepo::new())
        }
    };

    let addr: SocketAddr = cfg.http_addr.parse()?;
    let registry = Arc::new(Registry::new(cfg, accounts));

    http::serve(addr, registry).await?;
    Ok(())
}

fn init_tracing() -> anyhow::Result<()> {
    use tracing_subscriber::{EnvFilter, prelude::*};

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(false);
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info,portico_server=debug"))?;

    tracing_subscriber::registry().with(filter).with(fmt_layer).try_init()?;
    Ok(())
}
