//! Process-wide wiring shared by the commands.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use enom_api::ApiClient;
use enom_common::{AppDirs, EnomConfig, HttpContext};
use enom_login::{CredentialStore, InitOutcome};
use tracing::debug;

pub struct AppContext {
    pub config: EnomConfig,
    pub http: HttpContext,
    pub store: Arc<CredentialStore>,
}

impl AppContext {
    /// Resolve directories, read the config and open the credential store.
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let dirs = AppDirs::new().context("Could not determine the enom home directory")?;
        dirs.ensure_dirs().with_context(|| {
            format!("Failed to create enom home at {}", dirs.data_dir.display())
        })?;

        let config = match config_path {
            Some(path) => EnomConfig::load_from(path)?,
            None => EnomConfig::load(&dirs.config_file())?,
        };
        let http = HttpContext::new(&config.api).map_err(|e| anyhow!(e))?;
        let store = Arc::new(CredentialStore::from_config(
            dirs.data_dir.clone(),
            &config.storage,
        ));
        debug!(home = %dirs.data_dir.display(), "Loaded app context");

        Ok(Self {
            config,
            http,
            store,
        })
    }

    /// Load whatever session is available, falling back to a guest one.
    pub async fn init_session(&self) -> InitOutcome {
        let outcome = self.store.init(&self.http, &self.config.api).await;
        debug!(?outcome, "Session initialised");
        outcome
    }

    /// Client over the built-in endpoint table. Needs a Tokio runtime.
    pub fn api_client(&self) -> ApiClient {
        ApiClient::new(&self.http, &self.config, self.store.clone())
    }
}
