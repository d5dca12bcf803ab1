//! Application state: backends and transfer components, wired once at
//! startup and shared across handlers.

use anyhow::Result;
use cirrus_core::Config;
use cirrus_db::{MemoryMetadataStore, MetadataStore, PgMetadataStore};
use cirrus_storage::{create_storage, Storage};
use cirrus_transfer::{
    DownloadStreamer, FfmpegFrameDecoder, FolderUploadCoordinator, PreviewChain, PreviewPolicy,
    UploadPipeline,
};
use std::sync::Arc;

pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub store: Arc<dyn MetadataStore>,
    pub pipeline: Arc<UploadPipeline>,
    pub folders: FolderUploadCoordinator,
    pub downloads: Arc<DownloadStreamer>,
    pub previews: Arc<PreviewChain>,
}

impl AppState {
    /// Wire backends and transfer components from configuration.
    pub async fn from_config(config: Config) -> Result<Arc<Self>> {
        let storage = create_storage(&config).await?;

        let store: Arc<dyn MetadataStore> = match config.database_url.as_deref() {
            Some(url) => {
                let pg = PgMetadataStore::connect(url, config.db_max_connections).await?;
                tracing::info!("Connected to Postgres metadata store");
                Arc::new(pg)
            }
            None => {
                tracing::warn!("DATABASE_URL not set, using in-memory metadata store");
                Arc::new(MemoryMetadataStore::new())
            }
        };

        Ok(Self::new(config, storage, store))
    }

    pub fn new(config: Config, storage: Arc<dyn Storage>, store: Arc<dyn MetadataStore>) -> Arc<Self> {
        let pipeline = Arc::new(UploadPipeline::new(storage.clone(), store.clone()));
        let previews = Arc::new(PreviewChain::new(
            storage.clone(),
            store.clone(),
            Arc::new(FfmpegFrameDecoder::new(config.ffmpeg_path.clone())),
            PreviewPolicy::from(&config),
        ));
        let folders = FolderUploadCoordinator::new(
            pipeline.clone(),
            previews.clone(),
            config.batch_inactivity_timeout,
        );
        let downloads = Arc::new(DownloadStreamer::new(
            storage.clone(),
            store.clone(),
            config.stream_idle_timeout,
        ));

        Arc::new(AppState {
            config,
            storage,
            store,
            pipeline,
            folders,
            downloads,
            previews,
        })
    }
}
