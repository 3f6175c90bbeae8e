//! Provider registry — id → adapter, built from config at startup and
//! immutable for the process lifetime.

use std::collections::HashMap;
use std::sync::Arc;

use al_domain::config::{LlmConfig, ProviderKind};
use al_domain::error::{Error, Result};

use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    default_model: String,
}

impl ProviderRegistry {
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        for cfg in &config.providers {
            if providers.contains_key(&cfg.id) {
                return Err(Error::Config(format!("duplicate provider id '{}'", cfg.id)));
            }
            let provider: Arc<dyn LlmProvider> = match cfg.kind {
                ProviderKind::OpenaiCompat => Arc::new(OpenAiCompatProvider::from_config(cfg)?),
            };
            providers.insert(cfg.id.clone(), provider);
        }
        Ok(Self {
            providers,
            default_model: config.default_model.clone(),
        })
    }

    /// Build an empty registry with a default model spec; providers are
    /// added with [`ProviderRegistry::insert`]. Used by embedders and
    /// tests that bring their own adapters.
    pub fn with_default_model(default_model: impl Into<String>) -> Self {
        Self {
            providers: HashMap::new(),
            default_model: default_model.into(),
        }
    }

    /// Register a provider under an id, replacing any existing one.
    pub fn insert(&mut self, id: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(id.into(), provider);
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(id).cloned()
    }

    /// Resolve a model spec ("provider_id/model" or bare model on the
    /// default provider) to a provider and model name.
    pub fn resolve(&self, spec: Option<&str>) -> Result<(Arc<dyn LlmProvider>, String)> {
        let spec = spec.unwrap_or(&self.default_model);

        if let Some((provider_id, model)) = spec.split_once('/') {
            if let Some(p) = self.get(provider_id) {
                return Ok((p, model.to_string()));
            }
        }

        // Bare model name: use the default provider if the default model
        // spec names one, else any single registered provider.
        if let Some((provider_id, _)) = self.default_model.split_once('/') {
            if let Some(p) = self.get(provider_id) {
                return Ok((p, spec.to_string()));
            }
        }
        if self.providers.len() == 1 {
            let p = self.providers.values().next().cloned().unwrap();
            return Ok((p, spec.to_string()));
        }

        Err(Error::Config(format!(
            "cannot resolve model spec '{spec}': no matching provider configured"
        )))
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use al_domain::config::ProviderConfig;

    fn config_with(ids: &[&str]) -> LlmConfig {
        let mut config = LlmConfig::default();
        config.providers = ids
            .iter()
            .map(|id| ProviderConfig {
                id: id.to_string(),
                kind: ProviderKind::OpenaiCompat,
                base_url: "https://api.example.com/v1".into(),
                api_key_env: "AL_TEST_NO_SUCH_KEY".into(),
                default_model: None,
            })
            .collect();
        config.default_model = format!("{}/gpt-4o", ids.first().unwrap_or(&"openai"));
        config
    }

    #[test]
    fn resolves_provider_slash_model() {
        let registry = ProviderRegistry::from_config(&config_with(&["openai", "local"])).unwrap();
        let (provider, model) = registry.resolve(Some("local/llama-3")).unwrap();
        assert_eq!(provider.provider_id(), "local");
        assert_eq!(model, "llama-3");
    }

    #[test]
    fn resolves_default_when_unspecified() {
        let registry = ProviderRegistry::from_config(&config_with(&["openai"])).unwrap();
        let (provider, model) = registry.resolve(None).unwrap();
        assert_eq!(provider.provider_id(), "openai");
        assert_eq!(model, "gpt-4o");
    }

    #[test]
    fn bare_model_uses_default_provider() {
        let registry = ProviderRegistry::from_config(&config_with(&["openai"])).unwrap();
        let (provider, model) = registry.resolve(Some("gpt-4o-mini")).unwrap();
        assert_eq!(provider.provider_id(), "openai");
        assert_eq!(model, "gpt-4o-mini");
    }

    #[test]
    fn duplicate_provider_id_rejected() {
        let config = config_with(&["openai", "openai"]);
        assert!(ProviderRegistry::from_config(&config).is_err());
    }

    #[test]
    fn empty_registry_cannot_resolve() {
        let registry = ProviderRegistry::from_config(&LlmConfig::default()).unwrap();
        assert!(registry.is_empty());
        assert!(registry.resolve(None).is_err());
    }
}
