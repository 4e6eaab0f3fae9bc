//! Data Model
//!
//! Entity types, the mutable [`ModelBuilder`] used while a model is being
//! assembled, and the immutable [`CompiledModel`] shared through the cache.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Mapping of one entity type to its table
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityType {
    /// Type identity, unique within a model
    pub name: String,

    /// Table name
    pub table: String,

    /// Storage schema; set by customization
    pub schema: Option<String>,

    /// Key columns
    pub key: Vec<String>,
}

impl EntityType {
    /// Create an entity type mapped to a table of the same name
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            schema: None,
            key: Vec::new(),
        }
    }

    /// Set table name
    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    /// Add a key column
    pub fn with_key(mut self, column: impl Into<String>) -> Self {
        self.key.push(column.into());
        self
    }

    /// `schema.table`, or just `table` without a schema
    pub fn qualified_table(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.table),
            None => self.table.clone(),
        }
    }
}

/// Identity of a base (uncustomized) model.
///
/// Two bases are the same model when they come from the same context and
/// the same entity registrations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelIdentity {
    context: String,
    fingerprint: String,
}

impl ModelIdentity {
    /// Create an identity from its parts
    pub fn new(context: impl Into<String>, fingerprint: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            fingerprint: fingerprint.into(),
        }
    }

    /// Fingerprint a context's registrations
    ///
    /// # Examples
    ///
    /// ```
    /// use trellis_tenancy::{EntityType, ModelIdentity};
    ///
    /// let entities = vec![EntityType::new("Post")];
    /// let a = ModelIdentity::fingerprint("Cms", &entities, &[]);
    /// let b = ModelIdentity::fingerprint("Cms", &entities, &[]);
    /// assert_eq!(a, b);
    /// ```
    pub fn fingerprint(context: &str, entities: &[EntityType], configurations: &[String]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(context.as_bytes());

        for entity in entities {
            hasher.update([0x1e_u8]);
            hasher.update(entity.name.as_bytes());
            hasher.update([0x1f_u8]);
            hasher.update(entity.table.as_bytes());
            for column in &entity.key {
                hasher.update([0x1f_u8]);
                hasher.update(column.as_bytes());
            }
        }

        for configuration in configurations {
            hasher.update([0x1d_u8]);
            hasher.update(configuration.as_bytes());
        }

        Self::new(context, hex::encode(hasher.finalize()))
    }

    /// Context name
    pub fn context(&self) -> &str {
        &self.context
    }

    /// Hex fingerprint
    pub fn fingerprint_hex(&self) -> &str {
        &self.fingerprint
    }
}

impl fmt::Display for ModelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short = self.fingerprint.get(..12).unwrap_or(&self.fingerprint);
        write!(f, "{}@{}", self.context, short)
    }
}

/// Model under construction
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    entities: Vec<EntityType>,
    configurations: Vec<String>,
    schema: Option<String>,
}

impl ModelBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach an entity type.
    ///
    /// Attaching a name that is already present is skipped and returns
    /// `false`; it is never an error.
    pub fn attach(&mut self, entity: EntityType) -> bool {
        if self.find(&entity.name).is_some() {
            return false;
        }
        self.entities.push(entity);
        true
    }

    /// Find an entity type by name
    pub fn find(&self, name: &str) -> Option<&EntityType> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Mutable access to an entity type
    pub fn entity_mut(&mut self, name: &str) -> Option<&mut EntityType> {
        self.entities.iter_mut().find(|e| e.name == name)
    }

    /// Entity types in attach order
    pub fn entities(&self) -> &[EntityType] {
        &self.entities
    }

    /// Record that a configuration was applied
    pub fn record_configuration(&mut self, id: impl Into<String>) {
        self.configurations.push(id.into());
    }

    /// Place every entity type in `schema`
    pub fn set_schema(&mut self, schema: &str) {
        for entity in &mut self.entities {
            entity.schema = Some(schema.to_string());
        }
        self.schema = Some(schema.to_string());
    }

    /// Freeze the model
    pub fn build(self, identity: ModelIdentity) -> CompiledModel {
        CompiledModel {
            identity,
            schema: self.schema,
            entities: self.entities,
            configurations: self.configurations,
        }
    }
}

/// Immutable, customized model shared by every shell with the same cache key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledModel {
    identity: ModelIdentity,
    schema: Option<String>,
    entities: Vec<EntityType>,
    configurations: Vec<String>,
}

impl CompiledModel {
    /// Identity of the base model this was built from
    pub fn identity(&self) -> &ModelIdentity {
        &self.identity
    }

    /// Schema applied by customization
    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Entity types in attach order
    pub fn entities(&self) -> &[EntityType] {
        &self.entities
    }

    /// Find an entity type by name
    pub fn find(&self, name: &str) -> Option<&EntityType> {
        self.entities.iter().find(|e| e.name == name)
    }

    /// Applied configuration identifiers, in order
    pub fn configurations(&self) -> &[String] {
        &self.configurations
    }
}
