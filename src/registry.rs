// 📜 Entity Registry - World entities with provenance and mutability
//
// "Canon is a VALUE that may only grow more certain"
//
// Problem solved:
// - One authoritative set of characters, places, factions and items per world
// - Facts that come from an authoritative source (world genesis, canon import)
//   are frozen: they can never be updated or deleted through normal operations
// - Locally authored facts stay revisable until canon overrides them via merge

use crate::error::{CanonError, Result};
use crate::merge::{self, CanonRecord, MergeReport};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

// ============================================================================
// ENTITY TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    /// A person, creature or other acting being
    Character,

    /// A geographic location
    Place,

    /// An organization, order or governing body
    Faction,

    /// An artifact or object
    Item,
}

impl EntityType {
    pub const ALL: [EntityType; 4] = [
        EntityType::Character,
        EntityType::Place,
        EntityType::Faction,
        EntityType::Item,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Character => "character",
            EntityType::Place => "place",
            EntityType::Faction => "faction",
            EntityType::Item => "item",
        }
    }

    /// Pluralized name, used as the key of `count_by_type`
    pub fn plural(&self) -> &'static str {
        match self {
            EntityType::Character => "characters",
            EntityType::Place => "places",
            EntityType::Faction => "factions",
            EntityType::Item => "items",
        }
    }
}

// ============================================================================
// ENTITY
// ============================================================================

/// A named world entity.
///
/// `name` is the identity within a registry. `source` is informational
/// provenance ("world-genesis", "project-local", "canon-import") and is carried
/// through merges. Once `immutable` is set the entity is canon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub entity_type: EntityType,
    pub role: String,
    pub description: String,
    pub source: String,
    #[serde(default)]
    pub immutable: bool,
}

impl Entity {
    /// Create a new mutable entity. Fails if `name` is empty.
    pub fn new(
        name: impl Into<String>,
        entity_type: EntityType,
        role: impl Into<String>,
        description: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Self> {
        let entity = Entity {
            name: name.into(),
            entity_type,
            role: role.into(),
            description: description.into(),
            source: source.into(),
            immutable: false,
        };
        entity.check_name()?;
        Ok(entity)
    }

    /// Builder: set the immutability flag
    pub fn with_immutable(mut self, immutable: bool) -> Self {
        self.immutable = immutable;
        self
    }

    /// Whitespace-only names count as empty
    fn check_name(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CanonError::InvalidEntity("Entity name cannot be empty".to_string()));
        }
        Ok(())
    }
}

impl CanonRecord for Entity {
    const KIND: &'static str = "entity";

    fn key(&self) -> &str {
        &self.name
    }

    fn is_immutable(&self) -> bool {
        self.immutable
    }

    fn validate(&self) -> Result<()> {
        self.check_name()
    }
}

// ============================================================================
// ENTITY UPDATE
// ============================================================================

/// Partial update: only `Some` fields are applied.
///
/// Type and immutability are not updatable; promotion to canon happens only
/// through `EntityRegistry::merge`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityUpdate {
    pub role: Option<String>,
    pub description: Option<String>,
    pub source: Option<String>,
}

impl EntityUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    fn apply_to(self, entity: &mut Entity) {
        if let Some(role) = self.role {
            entity.role = role;
        }
        if let Some(description) = self.description {
            entity.description = description;
        }
        if let Some(source) = self.source {
            entity.source = source;
        }
    }
}

// ============================================================================
// REGISTRY SNAPSHOT
// ============================================================================

/// Serializable projection of a registry: `{"entities": [...]}` in insertion order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub entities: Vec<Entity>,
}

// ============================================================================
// ENTITY REGISTRY
// ============================================================================

/// Authoritative in-memory set of world entities, keyed by name.
///
/// Not internally synchronized: callers serialize mutating calls.
#[derive(Debug, Clone, Default)]
pub struct EntityRegistry {
    /// Insertion-ordered, unique by name
    entities: Vec<Entity>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a registry from a persisted snapshot.
    ///
    /// Records are known-unique, so duplicate checks are bypassed; a repeated
    /// name replaces the earlier record. Empty names still fail.
    pub fn from_snapshot(snapshot: RegistrySnapshot) -> Result<Self> {
        let mut registry = EntityRegistry::new();
        for entity in snapshot.entities {
            entity.check_name()?;
            match registry.position(&entity.name) {
                Some(i) => registry.entities[i] = entity,
                None => registry.entities.push(entity),
            }
        }
        Ok(registry)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entities.iter().position(|e| e.name == name)
    }

    fn position_typed(&self, name: &str, entity_type: EntityType) -> Option<usize> {
        self.entities
            .iter()
            .position(|e| e.name == name && e.entity_type == entity_type)
    }

    /// Add a new entity. Names are unique regardless of type.
    pub fn create(&mut self, entity: Entity) -> Result<&Entity> {
        entity.check_name()?;
        if self.contains(&entity.name) {
            return Err(CanonError::DuplicateEntity(entity.name));
        }

        debug!(
            "Created {} {} (source: {}, immutable: {})",
            entity.entity_type.as_str(),
            entity.name,
            entity.source,
            entity.immutable
        );
        self.entities.push(entity);
        Ok(&self.entities[self.entities.len() - 1])
    }

    pub fn get_by_name(&self, name: &str) -> Option<&Entity> {
        self.entities.iter().find(|e| e.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// All entities of a type, in insertion order
    pub fn get_by_type(&self, entity_type: EntityType) -> Vec<&Entity> {
        self.entities
            .iter()
            .filter(|e| e.entity_type == entity_type)
            .collect()
    }

    pub fn get_by_immutability(&self, immutable: bool) -> Vec<&Entity> {
        self.entities
            .iter()
            .filter(|e| e.immutable == immutable)
            .collect()
    }

    /// Apply a partial update to a mutable entity
    pub fn update(&mut self, name: &str, entity_type: EntityType, update: EntityUpdate) -> Result<&Entity> {
        let i = self
            .position_typed(name, entity_type)
            .ok_or_else(|| CanonError::not_found("Entity", name))?;

        if self.entities[i].immutable {
            return Err(CanonError::immutable("update", "entity", name));
        }

        update.apply_to(&mut self.entities[i]);
        debug!("Updated entity {}", name);
        Ok(&self.entities[i])
    }

    /// Remove a mutable entity. Returns false if no such entity exists.
    pub fn delete(&mut self, name: &str, entity_type: EntityType) -> Result<bool> {
        let i = match self.position_typed(name, entity_type) {
            Some(i) => i,
            None => return Ok(false),
        };

        if self.entities[i].immutable {
            return Err(CanonError::immutable("delete", "entity", name));
        }

        self.entities.remove(i);
        debug!("Deleted entity {}", name);
        Ok(true)
    }

    /// Merge imported entities; immutable provenance wins over mutable.
    pub fn merge(&mut self, imported: Vec<Entity>, deduplicate: bool) -> MergeReport {
        merge::merge_into(&mut self.entities, imported, deduplicate)
    }

    pub fn count(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Counts keyed by pluralized type name; every type is present
    pub fn count_by_type(&self) -> BTreeMap<&'static str, usize> {
        let mut counts: BTreeMap<&'static str, usize> =
            EntityType::ALL.iter().map(|t| (t.plural(), 0)).collect();
        for entity in &self.entities {
            *counts.entry(entity.entity_type.plural()).or_insert(0) += 1;
        }
        counts
    }

    pub fn all(&self) -> &[Entity] {
        &self.entities
    }

    pub fn to_snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            entities: self.entities.clone(),
        }
    }

    /// JSON form of `to_snapshot`: `{"entities": [...]}`
    pub fn to_dict(&self) -> serde_json::Value {
        serde_json::json!({ "entities": self.entities })
    }
}

// ============================================================================
// TESTS
// ============================================================================
