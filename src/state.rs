//! Shared application state: the engine objects built once in `lib::run`
//! and passed to both the HTTP façades and the scheduler as one `Arc`,
//! a single `SharedState` struct rather than a grab bag of globals.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::availability::Prober;
use crate::clients::metadata::MetadataClient;
use crate::config::Config;
use crate::db::Store;
use crate::domain::Site;
use crate::resolver::Resolver;
use crate::runner::RunnerDeps;
use crate::scheduler::Scheduler;
use crate::specials::SpecialsMapper;

#[derive(Clone)]
pub struct SharedState {
    pub config: Config,
    pub store: Store,
    pub client: reqwest::Client,
    pub resolver: Arc<Resolver>,
    pub prober: Arc<Prober>,
    pub specials: Arc<SpecialsMapper>,
    pub scheduler: Arc<Scheduler>,
    pub metadata: Arc<MetadataClient>,
}

impl SharedState {
    pub async fn new(config: Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("AniBridge/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("failed to build shared HTTP client")?;

        std::fs::create_dir_all(&config.general.data_dir)
            .context("failed to create DataDir")?;
        std::fs::create_dir_all(&config.general.download_dir)
            .context("failed to create DownloadDir")?;

        let db_path = PathBuf::from(&config.general.data_dir).join("anibridge.db");
        let db_url = format!("sqlite:{}", db_path.display());
        let store = Store::new(&db_url).await.context("failed to open job store")?;

        let enabled_sites: Vec<Site> = config
            .catalog
            .sites
            .iter()
            .filter_map(|host| host.parse::<Site>().ok())
            .collect();
        let sites_in_priority_order = if enabled_sites.is_empty() {
            Site::all().to_vec()
        } else {
            enabled_sites
        };

        let resolver = Arc::new(
            Resolver::new(client.clone(), sites_in_priority_order)
                .with_debug_scores(config.engine.debug_scores),
        );

        let prober = Arc::new(
            Prober::new(client.clone(), store.clone(), config.engine.provider_order.clone())
                .with_ttl(chrono::Duration::hours(config.engine.availability_ttl_hours)),
        );

        let metadata = Arc::new(MetadataClient::new(
            config.engine.metadata_base_url.clone(),
            config.engine.metadata_api_key.clone(),
        ));
        let specials = Arc::new(SpecialsMapper::new(client.clone(), Arc::clone(&metadata)));

        let deps = RunnerDeps {
            client: client.clone(),
            store: store.clone(),
            prober: Arc::clone(&prober),
            download_dir: PathBuf::from(&config.general.download_dir),
            strm_proxy_mode: config.strm.proxy_mode,
            strm_proxy_secret: config.strm.secret.clone(),
            token_ttl_seconds: config.strm.token_ttl_seconds,
            public_base_url: config.strm.public_base_url.clone(),
            chunk_size_bytes: config.engine.chunk_size_bytes,
        };
        let scheduler = Arc::new(Scheduler::new(
            store.clone(),
            deps,
            config.engine.max_concurrency,
            config.engine.downloads_ttl_hours,
        ));

        Ok(Self {
            config,
            store,
            client,
            resolver,
            prober,
            specials,
            scheduler,
            metadata,
        })
    }
}
