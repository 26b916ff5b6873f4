//! Application state: configuration plus the repository provider every
//! service call resolves its tenant-scoped stores through.
//!
//! The state is passed explicitly to the router and to each service function;
//! there is no process-wide singleton, so tests can build isolated instances.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{load_app_config_from_env, AppConfig};
use crate::repo::{InMemoryRepositories, RepositoryProvider};
use crate::seeds::{seed_questions, DEMO_GROUP};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub repos: Arc<dyn RepositoryProvider>,
}

impl AppState {
    /// Build state from env: load config, register tenants, seed the in-memory stores.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let config = load_app_config_from_env().unwrap_or_default();

        let mut groups = config.groups.clone();
        if !groups.iter().any(|g| g == DEMO_GROUP) {
            groups.push(DEMO_GROUP.to_string());
        }

        // Config-bank questions first, then the built-in demo bank.
        let mut questions = config.bank_questions();
        questions.extend(seed_questions());
        info!(
            target: "intelliq_backend",
            groups = groups.len(),
            questions = questions.len(),
            max_sets = config.generation.max_sets,
            call_timeout_ms = config.storage.call_timeout_ms,
            "Startup inventory"
        );

        let repos = InMemoryRepositories::new(&groups, questions);
        Self::with_repositories(config, Arc::new(repos))
    }

    pub fn with_repositories(config: AppConfig, repos: Arc<dyn RepositoryProvider>) -> Self {
        Self {
            config: Arc::new(config),
            repos,
        }
    }
}
