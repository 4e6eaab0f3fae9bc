//! Entity Registration
//!
//! Modules contribute entity types and named configurations. Configurations
//! are created through factories registered under an identifier.

use crate::TenantError;
use crate::model::{EntityType, ModelBuilder};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Supplies the entity types and configuration identifiers of a model
pub trait EntityTypeProvider: Send + Sync {
    /// Entity types to attach, in order
    fn entity_types(&self) -> Vec<EntityType>;

    /// Configuration identifiers to apply, in order
    fn entity_type_configurations(&self) -> Vec<String>;
}

/// Fixed list of registrations
#[derive(Debug, Clone, Default)]
pub struct StaticEntityTypeProvider {
    entity_types: Vec<EntityType>,
    configurations: Vec<String>,
}

impl StaticEntityTypeProvider {
    /// Create an empty provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity type
    pub fn with_entity(mut self, entity: EntityType) -> Self {
        self.entity_types.push(entity);
        self
    }

    /// Add a configuration identifier
    pub fn with_configuration(mut self, id: impl Into<String>) -> Self {
        self.configurations.push(id.into());
        self
    }
}

impl EntityTypeProvider for StaticEntityTypeProvider {
    fn entity_types(&self) -> Vec<EntityType> {
        self.entity_types.clone()
    }

    fn entity_type_configurations(&self) -> Vec<String> {
        self.configurations.clone()
    }
}

/// Mapping configuration applied to a model under construction
pub trait EntityTypeConfiguration: Send + Sync {
    /// Apply the mapping
    fn configure(&self, model: &mut ModelBuilder);
}

impl<F> EntityTypeConfiguration for F
where
    F: Fn(&mut ModelBuilder) + Send + Sync,
{
    fn configure(&self, model: &mut ModelBuilder) {
        self(model)
    }
}

type ConfigurationFactory = Arc<dyn Fn() -> Box<dyn EntityTypeConfiguration> + Send + Sync>;

/// Registry of configuration factories keyed by identifier
#[derive(Clone, Default)]
pub struct ConfigurationRegistry {
    factories: HashMap<String, ConfigurationFactory>,
}

impl ConfigurationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory, replacing any previous one with the same identifier
    ///
    /// # Examples
    ///
    /// ```
    /// use trellis_tenancy::{ConfigurationRegistry, EntityTypeConfiguration, ModelBuilder};
    ///
    /// struct PostMap;
    ///
    /// impl EntityTypeConfiguration for PostMap {
    ///     fn configure(&self, model: &mut ModelBuilder) {
    ///         if let Some(post) = model.entity_mut("Post") {
    ///             post.table = "Posts".to_string();
    ///         }
    ///     }
    /// }
    ///
    /// let registry = ConfigurationRegistry::new().with("PostMap", || Box::new(PostMap));
    /// assert!(registry.contains("PostMap"));
    /// ```
    pub fn register<F>(&mut self, id: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn EntityTypeConfiguration> + Send + Sync + 'static,
    {
        self.factories.insert(id.into(), Arc::new(factory));
    }

    /// Builder form of [`register`](Self::register)
    pub fn with<F>(mut self, id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Box<dyn EntityTypeConfiguration> + Send + Sync + 'static,
    {
        self.register(id, factory);
        self
    }

    /// Instantiate the configuration registered under `id`
    pub fn create(&self, id: &str) -> Result<Box<dyn EntityTypeConfiguration>, TenantError> {
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| TenantError::UnknownConfiguration(id.to_string()))?;
        Ok(factory())
    }

    /// Whether `id` is registered
    pub fn contains(&self, id: &str) -> bool {
        self.factories.contains_key(id)
    }

    /// Number of registered factories
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl fmt::Debug for ConfigurationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut ids: Vec<&String> = self.factories.keys().collect();
        ids.sort();
        f.debug_struct("ConfigurationRegistry")
            .field("ids", &ids)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rename_posts(model: &mut ModelBuilder) {
        if let Some(post) = model.entity_mut("Post") {
            post.table = "Posts".to_string();
        }
    }

    #[test]
    fn test_static_provider_preserves_order() {
        let provider = StaticEntityTypeProvider::new()
            .with_entity(EntityType::new("Post"))
            .with_entity(EntityType::new("Tag"))
            .with_configuration("PostMap");

        let names: Vec<String> = provider.entity_types().into_iter().map(|e| e.name).collect();
        assert_eq!(names, vec!["Post".to_string(), "Tag".to_string()]);
        assert_eq!(provider.entity_type_configurations(), vec!["PostMap".to_string()]);
    }

    #[test]
    fn test_registry_creates_configuration() {
        let registry = ConfigurationRegistry::new().with("PostMap", || Box::new(rename_posts));

        let mut model = ModelBuilder::new();
        model.attach(EntityType::new("Post"));
        registry.create("PostMap").unwrap().configure(&mut model);

        assert_eq!(model.find("Post").unwrap().table, "Posts");
    }

    #[test]
    fn test_registry_unknown_id() {
        let registry = ConfigurationRegistry::new();
        let result = registry.create("Missing");
        assert!(matches!(result, Err(TenantError::UnknownConfiguration(id)) if id == "Missing"));
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ConfigurationRegistry::new();
        registry.register("Map", || Box::new(rename_posts));
        registry.register("Map", || Box::new(|_: &mut ModelBuilder| {}));

        assert_eq!(registry.len(), 1);
        let mut model = ModelBuilder::new();
        model.attach(EntityType::new("Post"));
        registry.create("Map").unwrap().configure(&mut model);
        assert_eq!(model.find("Post").unwrap().table, "Post");
    }
}
