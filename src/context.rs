//! Application context, built once at startup and shared by every component.

use crate::api::{CompressionApi, HttpCompressionApi};
use crate::config::{self, CompressioConfig};
use crate::download::DownloadClient;
use crate::error::Result;
use crate::history::HistoryStore;
use crate::i18n::Language;
use crate::notify::{ConsoleNotifier, Notifier};
use crate::orchestrator::Orchestrator;
use crate::quota::{QuotaPolicy, SessionQuota, Unlimited};
use crate::storage::LocalStore;
use crate::user;
use std::sync::Arc;
use tracing::debug;

pub struct AppContext<A: CompressionApi> {
    pub config: CompressioConfig,
    pub store: Arc<LocalStore>,
    pub api: Arc<A>,
    pub history: HistoryStore,
    pub notifier: Arc<dyn Notifier>,
    pub quota: Arc<dyn QuotaPolicy>,
    pub language: Language,
}

impl AppContext<HttpCompressionApi> {
    /// Context backed by the real API and the store under the config directory
    pub fn from_config(config: CompressioConfig) -> Result<Self> {
        config::ensure_config_dir()?;
        let store = Arc::new(LocalStore::open(config::get_store_file_path()?)?);
        let api = Arc::new(HttpCompressionApi::from_config(&config)?);
        Ok(Self::new(config, store, api, Arc::new(ConsoleNotifier)))
    }
}

impl<A: CompressionApi> AppContext<A> {
    pub fn new(
        config: CompressioConfig,
        store: Arc<LocalStore>,
        api: Arc<A>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let language = Language::load(&store);
        let quota = select_quota(&config, &store);
        Self {
            history: HistoryStore::new(store.clone()),
            config,
            store,
            api,
            notifier,
            quota,
            language,
        }
    }

    pub fn orchestrator(&self) -> Orchestrator<A> {
        Orchestrator::new(
            self.api.clone(),
            self.history.clone(),
            self.notifier.clone(),
            self.quota.clone(),
            self.language,
        )
    }

    pub fn download_client(&self) -> DownloadClient<A> {
        DownloadClient::new(
            self.api.clone(),
            self.notifier.clone(),
            self.config.download_dir(),
            self.language,
        )
    }
}

/// Signed-in users are never limited; anonymous use honours `anonymousLimit`
fn select_quota(config: &CompressioConfig, store: &Arc<LocalStore>) -> Arc<dyn QuotaPolicy> {
    if user::current_user(store).is_some() {
        debug!("Signed-in user, compression quota disabled");
        return Arc::new(Unlimited);
    }
    match config.anonymous_limit {
        Some(limit) => {
            debug!(limit, "Anonymous compression quota active");
            Arc::new(SessionQuota::new(store.clone(), limit))
        }
        None => Arc::new(Unlimited),
    }
}
