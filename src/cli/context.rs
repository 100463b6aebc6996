//! Wiring shared by every command that talks to the server.

use std::error::Error;
use std::sync::Arc;

use crate::api::ApiClient;
use crate::core::cache::ConversationCache;
use crate::core::chat::ChatSession;
use crate::core::config::Config;
use crate::core::session::SessionController;
use crate::core::storage::SessionStorage;

pub struct ClientContext {
    pub config: Config,
    pub api: Arc<ApiClient>,
    pub session: Arc<SessionController<ApiClient>>,
    storage: Arc<dyn SessionStorage>,
}

impl ClientContext {
    pub fn open() -> Result<Self, Box<dyn Error>> {
        let config = Config::load()?;
        Self::from_config(config)
    }

    pub fn from_config(config: Config) -> Result<Self, Box<dyn Error>> {
        let settings = config.api_settings()?;
        let storage: Arc<dyn SessionStorage> = Arc::from(config.storage_backend().open()?);
        let api = Arc::new(ApiClient::new(&settings, Arc::clone(&storage))?);
        let session = Arc::new(SessionController::new(
            Arc::clone(&api),
            api.credentials().clone(),
        ));
        Ok(Self {
            config,
            api,
            session,
            storage,
        })
    }

    pub fn chat(&self) -> ChatSession<ApiClient> {
        ChatSession::new(
            Arc::clone(&self.api),
            ConversationCache::new(Arc::clone(&self.storage)),
        )
    }

    /// Resolve the stored session; exits with a hint when nobody is signed in.
    pub async fn require_login(&self) -> crate::api::models::User {
        let snapshot = self.session.mount().await;
        match snapshot.user {
            Some(user) if snapshot.is_authenticated() => user,
            _ => {
                eprintln!("❌ Not signed in. Run `parlor login` first.");
                std::process::exit(1);
            }
        }
    }
}
