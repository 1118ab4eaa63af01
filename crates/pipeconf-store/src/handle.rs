//! Async, shareable handle over a [`ConfigStore`].
//!
//! Git work is blocking, so every call runs on the blocking pool. Writers
//! (checkin, merge, reset) take the write lock and readers share the read
//! lock. GC holds neither: it only needs the object database, so it runs on
//! its own git handle under the maintenance mutex. Writers take that mutex
//! too, before the write lock, so a pruning GC never races a commit and a
//! writer queued behind GC never stalls history reads.

use std::sync::{Arc, Mutex, RwLock};

use crate::error::StoreError;
use crate::revision::ConfigRevision;
use crate::settings::StoreSettings;
use crate::store::{collect_garbage, ConfigStore};
use crate::Result;

#[derive(Debug, Clone)]
pub struct SharedConfigStore {
    inner: Arc<RwLock<ConfigStore>>,
    maintenance: Arc<Mutex<()>>,
}

impl SharedConfigStore {
    pub fn new(store: ConfigStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
            maintenance: Arc::new(Mutex::new(())),
        }
    }

    async fn read<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&ConfigStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || {
            let store = inner.read().map_err(|_| StoreError::LockPoisoned)?;
            f(&store)
        })
        .await?
    }

    async fn write<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut ConfigStore) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let maintenance = Arc::clone(&self.maintenance);
        tokio::task::spawn_blocking(move || {
            let _gc = maintenance.lock().map_err(|_| StoreError::LockPoisoned)?;
            let mut store = inner.write().map_err(|_| StoreError::LockPoisoned)?;
            f(&mut store)
        })
        .await?
    }

    async fn maintain(&self, settings: Option<StoreSettings>) -> Result<bool> {
        let inner = Arc::clone(&self.inner);
        let maintenance = Arc::clone(&self.maintenance);
        tokio::task::spawn_blocking(move || {
            let (git, settings) = {
                let store = inner.read().map_err(|_| StoreError::LockPoisoned)?;
                let settings = settings.unwrap_or_else(|| store.settings().clone());
                (store.maintenance_git(), settings)
            };
            let _gc = maintenance.lock().map_err(|_| StoreError::LockPoisoned)?;
            collect_garbage(&git, &settings)
        })
        .await?
    }

    pub async fn initialize(&self) -> Result<()> {
        self.write(|s| s.initialize()).await
    }

    pub async fn checkin(&self, revision: ConfigRevision) -> Result<Option<String>> {
        self.write(move |s| s.checkin(&revision)).await
    }

    pub async fn merge_with_latest(
        &self,
        candidate: ConfigRevision,
        base_md5: impl Into<String>,
    ) -> Result<String> {
        let base_md5 = base_md5.into();
        self.write(move |s| s.merge_with_latest(&candidate, &base_md5))
            .await
    }

    pub async fn get_revision(&self, key: impl Into<String>) -> Result<Option<ConfigRevision>> {
        let key = key.into();
        self.read(move |s| s.get_revision(&key)).await
    }

    pub async fn current_revision(&self) -> Result<Option<ConfigRevision>> {
        self.read(|s| s.current_revision()).await
    }

    pub async fn get_commits(&self, count: usize, offset: usize) -> Result<Vec<ConfigRevision>> {
        self.read(move |s| s.get_commits(count, offset)).await
    }

    pub async fn commit_count(&self) -> Result<u64> {
        self.read(|s| s.commit_count()).await
    }

    pub async fn config_changes_for(
        &self,
        newer_md5: impl Into<String>,
        older_md5: impl Into<String>,
    ) -> Result<String> {
        let (newer, older) = (newer_md5.into(), older_md5.into());
        self.read(move |s| s.config_changes_for(&newer, &older))
            .await
    }

    pub async fn garbage_collect(&self) -> Result<bool> {
        self.maintain(None).await
    }

    /// Run GC with settings read just now rather than at open time.
    pub async fn garbage_collect_with(&self, settings: StoreSettings) -> Result<bool> {
        self.maintain(Some(settings)).await
    }

    pub async fn loose_object_count(&self) -> Result<u64> {
        self.read(|s| s.loose_object_count()).await
    }

    pub async fn branches(&self) -> Result<Vec<String>> {
        self.read(|s| s.branches()).await
    }
}
