use affiliate_ledger::{
    admin::AdminCommand,
    config::{database, settings},
    core::{
        affiliate::AffiliateService,
        attribution::MemoryAttributionStore,
        identity::{Identity, MemoryDirectory},
    },
    errors::Result,
};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // 2. Load .env file, non-fatal since env vars can be set externally
    dotenv().ok();

    // 3. Parse the command before touching the database
    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = AdminCommand::parse(&args)
        .inspect_err(|e| error!("Invalid command: {}", e))?;

    // 4. Load settings (site URL, payment credentials, accounts)
    let settings = settings::load_default_settings()
        .inspect_err(|e| error!("Failed to load settings: {}", e))?;

    // 5. Initialize database
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    database::create_tables(&db).await?;
    info!("Database initialized successfully.");

    let directory: MemoryDirectory = settings
        .accounts
        .iter()
        .cloned()
        .map(Identity::from)
        .collect();
    let service = AffiliateService::new(
        db,
        MemoryAttributionStore::new(),
        directory,
        settings.site.base_url.clone(),
    );

    // 6. Run the command
    let outcome = command.execute(&service).await;
    service.close().await?;

    let output = outcome.inspect_err(|e| error!("Command failed: {}", e))?;
    println!("{output}");
    Ok(())
}
