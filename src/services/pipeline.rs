// Pipeline assembly
// Wires config, provider client, caches and throttle into ready-to-use services

use std::sync::Arc;
use tracing::info;

use crate::models::HumanizationOptions;
use crate::services::assist::ContentAssistant;
use crate::services::cache::FingerprintCache;
use crate::services::config_store::AppConfig;
use crate::services::detection::{DetectionService, DetectionThrottle};
use crate::services::error::HumanizeResult;
use crate::services::humanize::Orchestrator;
use crate::services::providers::ProviderClient;
use crate::services::remote::{RewriteService, ScoreService};

pub struct Pipeline {
    pub orchestrator: Orchestrator,
    pub assistant: Option<ContentAssistant>,
    /// Request defaults from the `humanization` config section.
    pub defaults: HumanizationOptions,
}

impl Pipeline {
    /// Local heuristics only. Nothing here needs credentials or network.
    pub fn local(config: &AppConfig) -> Self {
        let detection = Self::configure_detection(DetectionService::local_only(), config);
        Self {
            orchestrator: Self::configure_orchestrator(Orchestrator::local_only().with_detection(detection), config),
            assistant: None,
            defaults: config.humanization.options(),
        }
    }

    /// Remote-capable pipeline over arbitrary services.
    pub fn with_remote(
        config: &AppConfig,
        rewrite: Arc<dyn RewriteService>,
        score: Arc<dyn ScoreService>,
    ) -> Self {
        let throttle = Arc::new(DetectionThrottle::new(config.remote.detection_spacing()));
        let detection = Self::configure_detection(DetectionService::new(score, throttle), config);
        let orchestrator = Self::configure_orchestrator(Orchestrator::new(rewrite.clone(), detection), config);
        let assistant = ContentAssistant::new(rewrite)
            .with_cache(FingerprintCache::new(config.cache.ttl()))
            .with_timeout(config.remote.timeout())
            .with_max_input_chars(config.remote.max_input_chars);

        Self {
            orchestrator,
            assistant: Some(assistant),
            defaults: config.humanization.options(),
        }
    }

    /// Remote-capable pipeline over the configured provider. Fails with
    /// `MissingCredential` when no API key can be found.
    pub fn from_config(config: &AppConfig) -> HumanizeResult<Self> {
        let client = Arc::new(ProviderClient::from_config(config)?);
        info!("[PIPELINE] remote provider={} model={}", config.remote.provider, client.model());
        Ok(Self::with_remote(config, client.clone(), client))
    }

    pub fn detection(&self) -> &DetectionService {
        self.orchestrator.detection()
    }

    fn configure_detection(detection: DetectionService, config: &AppConfig) -> DetectionService {
        detection
            .with_caches(
                FingerprintCache::new(config.cache.ttl()),
                FingerprintCache::new(config.cache.ttl()),
            )
            .with_timeout(config.remote.timeout())
            .with_excerpt_chars(config.cache.excerpt_chars)
            .with_max_input_chars(config.remote.max_input_chars)
    }

    fn configure_orchestrator(orchestrator: Orchestrator, config: &AppConfig) -> Orchestrator {
        orchestrator
            .with_rewrite_cache(FingerprintCache::new(config.cache.ttl()))
            .with_timeout(config.remote.timeout())
            .with_excerpt_chars(config.cache.excerpt_chars)
            .with_max_input_chars(config.remote.max_input_chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_pipeline_uses_config() {
        let mut config = AppConfig::default();
        config.cache.ttl_secs = 30;
        config.humanization.iterations = 5;
        let pipeline = Pipeline::local(&config);

        assert!(pipeline.assistant.is_none());
        assert!(!pipeline.detection().has_remote());
        assert_eq!(pipeline.defaults.iterations, 5);
        assert_eq!(pipeline.orchestrator.rewrite_cache().ttl(), std::time::Duration::from_secs(30));
    }
}
