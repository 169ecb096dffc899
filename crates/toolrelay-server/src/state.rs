use std::sync::Arc;
use std::time::Duration;

use toolrelay::dispatcher::Dispatcher;
use toolrelay::providers::configs::Profile;
use toolrelay::search::TavilyClient;
use tracing::info;

use crate::configuration::Settings;

/// Shared application state, read-only across requests
#[derive(Clone)]
pub struct AppState {
    pub profile: Arc<Profile>,
    pub search: Option<TavilyClient>,
    pub dispatcher: Dispatcher,
    pub provider_timeout: Duration,
}

impl AppState {
    pub fn new(settings: &Settings) -> anyhow::Result<Self> {
        let search = match settings.profile.tavily_api_key() {
            Some(key) => Some(TavilyClient::new(
                key,
                settings.search.endpoint.clone(),
                Duration::from_secs(settings.search.timeout_secs),
            )?),
            None => {
                info!("no search key configured, web_search disabled");
                None
            }
        };

        Ok(Self {
            profile: Arc::new(settings.profile.clone()),
            search,
            dispatcher: Dispatcher::new(settings.tools.timeout())?,
            provider_timeout: settings.provider.timeout(),
        })
    }
}
