use std::sync::Arc;

use tracing::{error, info, warn};

use clouddrive::config::StorageBackend;
use clouddrive::{
    BlobStore, Config, Database, FileManager, HttpBlobStore, IntentJournal, LocalBlobStore,
    ManagerConfig, SqliteMetadataStore, WebServer,
};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = clouddrive::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        clouddrive::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> clouddrive::Result<()> {
    config.validate()?;

    info!("clouddrive {}", env!("CARGO_PKG_VERSION"));

    let db = Database::open(&config.database.path).await?;
    let metadata = SqliteMetadataStore::open(db, config.database.collection.clone()).await?;

    let (blobs, blob_dir): (Arc<dyn BlobStore>, _) = match config.storage.backend {
        StorageBackend::Local => {
            let store = LocalBlobStore::new(&config.storage.path, &config.storage.public_base_url)?;
            let dir = store.base_path().to_path_buf();
            (Arc::new(store), Some(dir))
        }
        StorageBackend::Http => {
            let store = HttpBlobStore::new(
                &config.storage.endpoint,
                config.storage.bucket.clone(),
                config.storage.public_base_url.clone(),
            )?;
            info!(bucket = store.bucket(), "Using HTTP object store");
            (Arc::new(store), None)
        }
    };

    let mut manager = FileManager::new(
        blobs,
        Arc::new(metadata),
        ManagerConfig::from(&config.files),
    );

    if config.journal.enabled {
        manager = manager.with_journal(IntentJournal::open(&config.journal.path)?);
    } else {
        warn!("Intent journal disabled; interrupted operations will not be recovered");
    }

    let report = manager.recover().await?;
    if report.failed > 0 {
        warn!(failed = report.failed, "Some intents could not be recovered");
    }

    let mut server = WebServer::new(&config.server, Arc::new(manager))?;
    if let Some(dir) = blob_dir {
        server = server.with_blob_dir(dir);
    }

    info!(
        "Server configured on {}:{}",
        config.server.host, config.server.port
    );
    server.run().await?;
    Ok(())
}
