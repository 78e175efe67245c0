//! Wiring: opens the database, builds the stores, the compositor and the
//! pipeline, and hands them to the Telegram adapter.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use wmbot_compositor::FfmpegCompositor;
use wmbot_core::config::WmbotConfig;
use wmbot_pipeline::{Dispatcher, Pipeline, WorkerPool};
use wmbot_storage::{StorageLayout, WatermarkStore, WorkspaceManager};
use wmbot_telegram::{BotTransfer, TelegramAdapter};
use wmbot_usage::UsageLedger;

pub struct App {
    pub adapter: TelegramAdapter,
    pub pool: WorkerPool,
}

impl App {
    pub fn build(config: &WmbotConfig) -> anyhow::Result<Self> {
        // SQLite usage counter
        let db_path = &config.database.path;
        ensure_parent_dir(db_path)?;
        info!(path = %db_path, "opening SQLite database");

        let db = rusqlite::Connection::open(db_path)?;
        db.execute_batch("PRAGMA journal_mode=WAL;")?;
        wmbot_usage::db::init_db(&db)?;
        let ledger = Arc::new(UsageLedger::new(db));

        // per-chat directories
        let layout = StorageLayout::new(&config.storage.root);
        std::fs::create_dir_all(layout.root())?;
        info!(root = %layout.root().display(), "storage ready");

        let bot = TelegramAdapter::bot(&config.telegram)?;
        let transfer = Arc::new(BotTransfer::new(bot.clone()));
        let compositor = Arc::new(FfmpegCompositor::from_config(&config.compositor));

        let pipeline = Arc::new(Pipeline::new(
            WorkspaceManager::new(layout.clone()),
            Arc::new(WatermarkStore::new(layout)),
            compositor,
            transfer.clone(),
            ledger,
        ));
        let pool = WorkerPool::new(config.pool.workers);
        info!(workers = pool.size(), "worker pool ready");

        let dispatcher = Dispatcher::new(pipeline, transfer.clone(), transfer, pool.clone());

        Ok(Self {
            adapter: TelegramAdapter::new(bot, dispatcher),
            pool,
        })
    }
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) -> std::io::Result<()> {
    match Path::new(path).parent() {
        Some(parent) if !parent.as_os_str().is_empty() => std::fs::create_dir_all(parent),
        _ => Ok(()),
    }
}
