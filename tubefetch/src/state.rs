use std::sync::Arc;

use yt_dlp::ProcessRunner;

use crate::config::Config;
use crate::credentials::CredentialChain;
use crate::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub engine: Arc<dyn ProcessRunner>,
    pub credentials: Arc<CredentialChain>,
    pub rate_limiter: Arc<RateLimiter>
}

impl AppState {
    pub fn new(config: Config, engine: Arc<dyn ProcessRunner>) -> Self {
        let credentials = CredentialChain::from_config(&config);
        let rate_limiter = RateLimiter::new(config.rate_limit_window, config.rate_limit_max);
        Self {
            config: Arc::new(config),
            engine,
            credentials: Arc::new(credentials),
            rate_limiter: Arc::new(rate_limiter)
        }
    }
}
