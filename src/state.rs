//! Shared application state

use std::sync::Arc;

use crate::config::Config;
use crate::files::FileStore;
use crate::workers::WorkerPool;

/// Cheaply cloneable handle to everything the routes share.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: Config,
    files: FileStore,
    workers: WorkerPool,
}

impl AppState {
    pub fn new(config: Config) -> std::io::Result<Self> {
        let files = FileStore::new(&config.files)?;
        let workers = WorkerPool::new(config.workers.count);
        Ok(AppState {
            inner: Arc::new(AppStateInner {
                config,
                files,
                workers,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    pub fn files(&self) -> &FileStore {
        &self.inner.files
    }

    pub fn workers(&self) -> &WorkerPool {
        &self.inner.workers
    }
}
