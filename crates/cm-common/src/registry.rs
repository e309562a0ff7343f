use std::sync::Arc;

use tracing::{info, warn};

use crate::engines::{BUILTIN_ENGINES, EngineAdapter, EngineError, create_engine};

/// A named constructor for one engine.
#[derive(Clone, Copy)]
pub struct EngineLoader {
    pub name: &'static str,
    pub load: fn() -> Result<Arc<dyn EngineAdapter>, EngineError>,
}

/// Engines available to the gateway, in registration order.
///
/// Assembled once at startup and immutable afterwards.
#[derive(Clone, Default)]
pub struct EngineRegistry {
    engines: Vec<Arc<dyn EngineAdapter>>,
}

impl std::fmt::Debug for EngineRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineRegistry").field("engines", &self.names()).finish()
    }
}

fn load_basic() -> Result<Arc<dyn EngineAdapter>, EngineError> {
    create_engine(crate::engines::ENGINE_BASIC)
}

fn load_fuzzy() -> Result<Arc<dyn EngineAdapter>, EngineError> {
    create_engine(crate::engines::ENGINE_FUZZY)
}

fn load_hebrew_nlp() -> Result<Arc<dyn EngineAdapter>, EngineError> {
    create_engine(crate::engines::ENGINE_HEBREW_NLP)
}

pub const BUILTIN_LOADERS: &[EngineLoader] = &[
    EngineLoader {
        name: crate::engines::ENGINE_BASIC,
        load: load_basic,
    },
    EngineLoader {
        name: crate::engines::ENGINE_FUZZY,
        load: load_fuzzy,
    },
    EngineLoader {
        name: crate::engines::ENGINE_HEBREW_NLP,
        load: load_hebrew_nlp,
    },
];

impl EngineRegistry {
    /// Every built-in engine.
    pub fn builtin() -> Self {
        debug_assert_eq!(BUILTIN_LOADERS.len(), BUILTIN_ENGINES.len());
        Self::from_loaders(BUILTIN_LOADERS)
    }

    /// Run each loader. A loader that fails is logged and left out; the rest
    /// still register. Duplicate names keep the first registration.
    pub fn from_loaders(loaders: &[EngineLoader]) -> Self {
        let mut registry = Self::default();
        for loader in loaders {
            match (loader.load)() {
                Ok(engine) => registry.push(engine),
                Err(err) => warn!(engine = loader.name, error = %err, "engine_load_failed"),
            }
        }
        info!(engines = ?registry.names(), "engine_registry_ready");
        registry
    }

    /// Registry over explicit engine instances (fakes in tests, custom builds).
    pub fn with_engines(engines: Vec<Arc<dyn EngineAdapter>>) -> Self {
        let mut registry = Self::default();
        for engine in engines {
            registry.push(engine);
        }
        registry
    }

    fn push(&mut self, engine: Arc<dyn EngineAdapter>) {
        if self.get(engine.name()).is_some() {
            warn!(engine = engine.name(), "engine_duplicate_name_skipped");
            return;
        }
        self.engines.push(engine);
    }

    /// Keep only the named engines, preserving registration order.
    pub fn retain(mut self, allowed: &[String]) -> Self {
        for name in allowed {
            if self.get(name).is_none() {
                warn!(engine = %name, "engine_allow_list_unknown_name");
            }
        }
        self.engines
            .retain(|engine| allowed.iter().any(|name| name == engine.name()));
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn EngineAdapter>> {
        self.engines
            .iter()
            .find(|engine| engine.name() == name)
            .cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.engines.iter().map(|engine| engine.name().to_string()).collect()
    }

    /// First registered engine.
    pub fn default_engine(&self) -> Option<Arc<dyn EngineAdapter>> {
        self.engines.first().cloned()
    }

    pub fn engines(&self) -> &[Arc<dyn EngineAdapter>] {
        &self.engines
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::{ENGINE_BASIC, ENGINE_FUZZY, ENGINE_HEBREW_NLP};

    fn broken() -> Result<Arc<dyn EngineAdapter>, EngineError> {
        Err(EngineError::Internal("model file missing".into()))
    }

    #[test]
    fn builtin_registers_all_engines_in_order() {
        let registry = EngineRegistry::builtin();
        assert_eq!(
            registry.names(),
            vec![ENGINE_BASIC, ENGINE_FUZZY, ENGINE_HEBREW_NLP]
        );
        assert_eq!(registry.default_engine().unwrap().name(), ENGINE_BASIC);
    }

    #[test]
    fn failing_loader_does_not_block_the_others() {
        let loaders = [
            EngineLoader {
                name: "engine-broken",
                load: broken,
            },
            BUILTIN_LOADERS[1],
        ];
        let registry = EngineRegistry::from_loaders(&loaders);
        assert_eq!(registry.names(), vec![ENGINE_FUZZY]);
        assert!(registry.get("engine-broken").is_none());
    }

    #[test]
    fn duplicate_names_keep_the_first() {
        let loaders = [BUILTIN_LOADERS[0], BUILTIN_LOADERS[0]];
        assert_eq!(EngineRegistry::from_loaders(&loaders).len(), 1);
    }

    #[test]
    fn retain_applies_allow_list() {
        let registry = EngineRegistry::builtin().retain(&[ENGINE_HEBREW_NLP.to_string(), "nope".to_string()]);
        assert_eq!(registry.names(), vec![ENGINE_HEBREW_NLP]);
    }
}
