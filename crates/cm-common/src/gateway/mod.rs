//! Request validation, engine dispatch under a timeout, and concurrent
//! health aggregation.

pub mod validation;

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use crate::api::{EngineInfo, EngineStatus, HealthResponse, MatchRequest, MatchResponse};
use crate::catalog::ProviderCatalog;
use crate::engines::EngineAdapter;
use crate::matching::MAX_TOP_K;
use crate::registry::EngineRegistry;

pub use validation::{FieldError, ValidationErrors, validate};

pub const DEFAULT_ENGINE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_HEALTH_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Engine used when a request names none. `None` picks the first registered.
    pub default_engine: Option<String>,
    pub engine_timeout: Duration,
    pub health_timeout: Duration,
    pub max_top_k: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            default_engine: None,
            engine_timeout: DEFAULT_ENGINE_TIMEOUT,
            health_timeout: DEFAULT_HEALTH_TIMEOUT,
            max_top_k: MAX_TOP_K,
        }
    }
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(ValidationErrors),
    #[error("unknown engine {requested:?}; available: {}", .available.join(", "))]
    UnknownEngine {
        requested: String,
        available: Vec<String>,
    },
    #[error("engine {engine} timed out after {timeout_ms}ms")]
    EngineTimeout { engine: String, timeout_ms: u64 },
    #[error("engine {engine} failed: {message}")]
    EngineExecution { engine: String, message: String },
    #[error("no matching engines are registered")]
    NoEngines,
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Shared, read-only context for every request: engines, providers, limits.
#[derive(Debug, Clone)]
pub struct Gateway {
    registry: Arc<EngineRegistry>,
    catalog: Arc<ProviderCatalog>,
    config: GatewayConfig,
}

impl Gateway {
    /// Fails only when a configured default engine is not registered.
    pub fn new(
        registry: Arc<EngineRegistry>,
        catalog: Arc<ProviderCatalog>,
        config: GatewayConfig,
    ) -> Result<Self, GatewayError> {
        if let Some(name) = config.default_engine.as_deref() {
            if registry.get(name).is_none() {
                return Err(GatewayError::UnknownEngine {
                    requested: name.to_string(),
                    available: registry.names(),
                });
            }
        }
        Ok(Self {
            registry,
            catalog,
            config,
        })
    }

    pub fn registry(&self) -> &EngineRegistry {
        &self.registry
    }

    pub fn catalog(&self) -> &ProviderCatalog {
        &self.catalog
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    /// Named engine, else the configured default, else the first registered.
    pub fn select_engine(&self, requested: Option<&str>) -> Result<Arc<dyn EngineAdapter>, GatewayError> {
        let name = requested.or(self.config.default_engine.as_deref());
        match name {
            Some(name) => self.registry.get(name).ok_or_else(|| GatewayError::UnknownEngine {
                requested: name.to_string(),
                available: self.registry.names(),
            }),
            None => self.registry.default_engine().ok_or(GatewayError::NoEngines),
        }
    }

    /// Validate, dispatch and time one match. `engine_override` (from the
    /// query string) wins over the body's `engine` field.
    pub async fn run_match(
        &self,
        mut request: MatchRequest,
        engine_override: Option<String>,
    ) -> Result<MatchResponse, GatewayError> {
        let requested = engine_override
            .or(request.engine.take())
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty());

        let query = validate(request, self.config.max_top_k).map_err(|errors| {
            info!(fields = ?errors.fields(), "match_request_invalid");
            GatewayError::Validation(errors)
        })?;
        let engine = self.select_engine(requested.as_deref())?;
        let engine_name = engine.name();
        let catalog = Arc::clone(&self.catalog);
        let timeout = self.config.engine_timeout;

        let started = Instant::now();
        let task = tokio::task::spawn_blocking(move || engine.match_query(&query, catalog.providers()));
        let outcome = match tokio::time::timeout(timeout, task).await {
            Err(_) => {
                warn!(engine = engine_name, timeout_ms = millis(timeout), "engine_timeout");
                return Err(GatewayError::EngineTimeout {
                    engine: engine_name.to_string(),
                    timeout_ms: millis(timeout),
                });
            }
            Ok(Err(join_error)) => {
                error!(engine = engine_name, error = %join_error, "engine_task_failed");
                return Err(GatewayError::EngineExecution {
                    engine: engine_name.to_string(),
                    message: "engine task aborted".to_string(),
                });
            }
            Ok(Ok(Err(engine_error))) => {
                error!(engine = engine_name, error = %engine_error, "engine_execution_failed");
                return Err(GatewayError::EngineExecution {
                    engine: engine_name.to_string(),
                    message: engine_error.to_string(),
                });
            }
            Ok(Ok(Ok(outcome))) => outcome,
        };
        let latency_ms = millis(started.elapsed());

        info!(
            engine = engine_name,
            count = outcome.count,
            candidates = outcome.candidates,
            latency_ms,
            "match_completed"
        );

        Ok(MatchResponse {
            engine: engine_name.to_string(),
            latency_ms,
            count: outcome.count,
            results: outcome.results,
        })
    }

    /// Probe every engine concurrently, each under its own `timeout`.
    /// A slow or panicking engine is reported as failing without delaying
    /// the others. Results keep registration order.
    pub async fn check_engines(&self, timeout: Duration) -> Vec<EngineStatus> {
        let mut probes = JoinSet::new();
        for (index, engine) in self.registry.engines().iter().enumerate() {
            let engine = Arc::clone(engine);
            probes.spawn(async move {
                let name = engine.name().to_string();
                let probe = tokio::task::spawn_blocking(move || engine.health());
                let status = match tokio::time::timeout(timeout, probe).await {
                    Ok(Ok(health)) => EngineStatus {
                        name,
                        ok: health.ok,
                        message: health.message,
                    },
                    Ok(Err(_)) => EngineStatus {
                        name,
                        ok: false,
                        message: "health check aborted".to_string(),
                    },
                    Err(_) => EngineStatus {
                        name,
                        ok: false,
                        message: format!("health check timed out after {}ms", millis(timeout)),
                    },
                };
                (index, status)
            });
        }

        let mut statuses = Vec::with_capacity(self.registry.len());
        while let Some(joined) = probes.join_next().await {
            match joined {
                Ok(entry) => statuses.push(entry),
                Err(err) => error!(error = %err, "engine_health_probe_failed"),
            }
        }
        statuses.sort_by_key(|(index, _)| *index);

        let statuses = statuses.into_iter().map(|(_, status)| status).collect::<Vec<_>>();
        for status in statuses.iter().filter(|s| !s.ok) {
            warn!(engine = %status.name, message = %status.message, "engine_unhealthy");
        }
        statuses
    }

    pub async fn health(&self) -> HealthResponse {
        let statuses = self.check_engines(self.config.health_timeout).await;
        HealthResponse::new(self.catalog.len(), statuses)
    }

    pub async fn engine_infos(&self, timeout: Duration) -> Vec<EngineInfo> {
        let has_providers = !self.catalog.is_empty();
        self.check_engines(timeout)
            .await
            .into_iter()
            .map(|status| EngineInfo::from_status(status, has_providers))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Provider;
    use crate::corrections::ServiceTag;
    use crate::engines::fixtures::provider;
    use crate::engines::{ENGINE_BASIC, EngineError, EngineHealth};
    use crate::matching::{MatchOutcome, Query};

    struct SlowEngine {
        delay: Duration,
    }

    impl EngineAdapter for SlowEngine {
        fn name(&self) -> &'static str {
            "engine-slow"
        }

        fn match_query(&self, _query: &Query, _providers: &[Provider]) -> Result<MatchOutcome, EngineError> {
            std::thread::sleep(self.delay);
            Ok(MatchOutcome {
                count: 0,
                results: Vec::new(),
                candidates: 0,
            })
        }

        fn health(&self) -> EngineHealth {
            std::thread::sleep(self.delay);
            EngineHealth::ok("eventually")
        }
    }

    struct FailingEngine;

    impl EngineAdapter for FailingEngine {
        fn name(&self) -> &'static str {
            "engine-failing"
        }

        fn match_query(&self, _query: &Query, _providers: &[Provider]) -> Result<MatchOutcome, EngineError> {
            Err(EngineError::Internal("corrupt provider record".into()))
        }

        fn health(&self) -> EngineHealth {
            EngineHealth::failing("model not loaded")
        }
    }

    fn catalog() -> Arc<ProviderCatalog> {
        Arc::new(ProviderCatalog::new(vec![
            provider("ta-1", "Tel Aviv", &[ServiceTag::WoundCare]),
            provider("ta-2", "Tel Aviv", &[ServiceTag::WoundCare]),
            provider("hf-1", "Haifa", &[ServiceTag::Medication]),
        ]))
    }

    fn gateway(registry: EngineRegistry, config: GatewayConfig) -> Gateway {
        Gateway::new(Arc::new(registry), catalog(), config).unwrap()
    }

    fn builtin() -> Gateway {
        gateway(EngineRegistry::builtin(), GatewayConfig::default())
    }

    #[tokio::test]
    async fn dispatches_to_default_engine() {
        let response = builtin()
            .run_match(
                MatchRequest {
                    city: Some("Tel Aviv".into()),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap();
        assert_eq!(response.engine, ENGINE_BASIC);
        assert_eq!(response.count, 2);
    }

    #[tokio::test]
    async fn query_string_engine_wins_over_body() {
        let response = builtin()
            .run_match(
                MatchRequest {
                    engine: Some("engine-basic".into()),
                    ..Default::default()
                },
                Some("engine-fuzzy".into()),
            )
            .await
            .unwrap();
        assert_eq!(response.engine, "engine-fuzzy");
    }

    #[tokio::test]
    async fn unknown_engine_lists_available_names() {
        let err = builtin()
            .run_match(MatchRequest::default(), Some("foo".into()))
            .await
            .unwrap_err();
        match err {
            GatewayError::UnknownEngine { requested, available } => {
                assert_eq!(requested, "foo");
                assert_eq!(available, vec!["engine-basic", "engine-fuzzy", "engine-hebrew-nlp"]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_an_engine() {
        let registry = EngineRegistry::with_engines(vec![Arc::new(FailingEngine)]);
        let err = gateway(registry, GatewayConfig::default())
            .run_match(
                MatchRequest {
                    top_k: Some(1000),
                    ..Default::default()
                },
                None,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::Validation(ref e) if e.fields() == vec!["topK"]));
    }

    #[tokio::test]
    async fn slow_engine_surfaces_as_timeout() {
        let registry = EngineRegistry::with_engines(vec![Arc::new(SlowEngine {
            delay: Duration::from_millis(300),
        })]);
        let config = GatewayConfig {
            engine_timeout: Duration::from_millis(20),
            ..GatewayConfig::default()
        };
        let err = gateway(registry, config)
            .run_match(MatchRequest::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GatewayError::EngineTimeout { ref engine, timeout_ms: 20 } if engine == "engine-slow"
        ));
    }

    #[tokio::test]
    async fn engine_failure_is_attributed() {
        let registry = EngineRegistry::with_engines(vec![Arc::new(FailingEngine)]);
        let err = gateway(registry, GatewayConfig::default())
            .run_match(MatchRequest::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::EngineExecution { ref engine, .. } if engine == "engine-failing"));
    }

    #[tokio::test]
    async fn empty_registry_has_no_engines() {
        let err = gateway(EngineRegistry::default(), GatewayConfig::default())
            .run_match(MatchRequest::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::NoEngines));
    }

    #[test]
    fn unknown_default_engine_is_rejected_at_construction() {
        let config = GatewayConfig {
            default_engine: Some("engine-missing".into()),
            ..GatewayConfig::default()
        };
        let result = Gateway::new(Arc::new(EngineRegistry::builtin()), catalog(), config);
        assert!(matches!(result, Err(GatewayError::UnknownEngine { .. })));
    }

    #[tokio::test]
    async fn slow_health_check_does_not_block_the_others() {
        let registry = EngineRegistry::with_engines(vec![
            Arc::new(SlowEngine {
                delay: Duration::from_millis(500),
            }),
            Arc::new(FailingEngine),
            Arc::new(crate::engines::BasicEngine::new()),
        ]);
        let gw = gateway(registry, GatewayConfig::default());

        let started = Instant::now();
        let statuses = gw.check_engines(Duration::from_millis(50)).await;
        assert!(started.elapsed() < Duration::from_millis(400));

        let names = statuses.iter().map(|s| s.name.as_str()).collect::<Vec<_>>();
        assert_eq!(names, vec!["engine-slow", "engine-failing", "engine-basic"]);
        assert!(!statuses[0].ok);
        assert!(statuses[0].message.contains("timed out"));
        assert!(!statuses[1].ok);
        assert!(statuses[2].ok);
    }

    #[tokio::test]
    async fn health_reports_catalog_size_and_engine_count() {
        let health = builtin().health().await;
        assert!(health.ok);
        assert_eq!(health.engines, 3);
        assert_eq!(health.nurses_loaded, 3);
    }

    #[tokio::test]
    async fn engines_are_unconfigured_without_providers() {
        let gw = Gateway::new(
            Arc::new(EngineRegistry::builtin()),
            Arc::new(ProviderCatalog::empty()),
            GatewayConfig::default(),
        )
        .unwrap();
        let infos = gw.engine_infos(Duration::from_secs(1)).await;
        assert_eq!(infos.len(), 3);
        assert!(infos.iter().all(|info| info.healthy && !info.configured));
    }

    #[tokio::test]
    async fn repeated_requests_return_identical_results() {
        let gw = builtin();
        let request = MatchRequest {
            services_query: vec!["wound".into()],
            urgent: Some(true),
            ..Default::default()
        };
        for engine in ["engine-basic", "engine-fuzzy", "engine-hebrew-nlp"] {
            let first = gw.run_match(request.clone(), Some(engine.into())).await.unwrap();
            let second = gw.run_match(request.clone(), Some(engine.into())).await.unwrap();
            assert_eq!(first.results, second.results, "{engine} is not deterministic");
        }
    }
}
