use std::{sync::Arc, time::Duration};

use platform::{Platform, RestPlatform};
use reqwest::Client;

use super::{config::Config, error::AppError, mail::Mailer, reviews::ReviewsCache};

const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(15);

pub struct State {
    pub config: Config,
    pub platform: Arc<dyn Platform>,
    pub http: Client,
    pub reviews: ReviewsCache,
    pub mailer: Mailer,
}

impl State {
    pub async fn new(config: Config) -> Result<Arc<Self>, AppError> {
        let platform = RestPlatform::new(
            &config.platform_url,
            &config.platform_anon_key,
            &config.platform_service_key,
        )?;

        let reviews = match &config.redis_url {
            Some(redis_url) => ReviewsCache::redis(redis_url).await?,
            None => ReviewsCache::memory(),
        };

        Self::assemble(config, Arc::new(platform), reviews)
    }

    /// State over an arbitrary platform with an in-process reviews cache.
    pub fn with_platform(config: Config, platform: Arc<dyn Platform>) -> Result<Arc<Self>, AppError> {
        Self::assemble(config, platform, ReviewsCache::memory())
    }

    fn assemble(
        config: Config,
        platform: Arc<dyn Platform>,
        reviews: ReviewsCache,
    ) -> Result<Arc<Self>, AppError> {
        let http = Client::builder().timeout(OUTBOUND_TIMEOUT).build()?;
        let mailer = Mailer::new(&config, http.clone());

        Ok(Arc::new(Self {
            config,
            platform,
            http,
            reviews,
            mailer,
        }))
    }
}
