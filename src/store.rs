//! Annotation store
//!
//! The decoder writes into an [`AnnotationSink`] using block-local node names
//! (`"sentence"`, `"1"`, `"3-4"`, ...). The encoder reads from an
//! [`AnnotationSource`] using store-assigned [`UnitId`]s and interned
//! [`KeyId`]s. [`MemoryStore`] implements both.

use crate::model::{FeatureKey, RawValue, Tier, UnitId, UnitType, Value, ValueType};
use lasso::{Rodeo, Spur};
use rustc_hash::FxHashMap;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Error raised by the store while committing a block
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Cannot change type of '{name}' from {existing} to {requested}")]
    TypeConflict {
        name: String,
        existing: UnitType,
        requested: UnitType,
    },

    #[error("Unknown unit: {0}")]
    UnknownUnit(UnitId),
}

/// Opaque identifier of an interned [`FeatureKey`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyId(u32);

/// Write interface used by the decoder
///
/// Operations between two `end_block` calls belong to one block; node names
/// are only meaningful within that block.
pub trait AnnotationSink {
    /// Declare the type of a node
    fn set_type(&mut self, name: &str, unit_type: UnitType) -> Result<(), StoreError>;

    /// Declare the parent of a node
    fn set_parent(&mut self, child: &str, parent: &str);

    /// Set a feature, overwriting any earlier value for (node, tier, feature)
    fn set_feature(&mut self, name: &str, tier: Tier, feature: &str, value: RawValue);

    /// Add a directed relation between two nodes
    fn add_relation(&mut self, from: &str, to: &str);

    /// Commit everything written since the previous block
    fn end_block(&mut self) -> Result<(), StoreError>;

    /// Drop everything written since the previous block
    fn discard_block(&mut self);

    /// Number of blocks committed so far
    fn committed_blocks(&self) -> usize;
}

/// A unit returned by [`AnnotationSource::iter_units`]
#[derive(Debug, Clone, PartialEq)]
pub struct UnitRecord {
    pub id: UnitId,
    /// Values for the requested keys this unit carries, in request order
    pub features: Vec<(KeyId, Value)>,
}

impl UnitRecord {
    pub fn get(&self, key: KeyId) -> Option<&Value> {
        self.features
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v)
    }
}

/// Query interface used by the encoder
pub trait AnnotationSource {
    /// Distinct feature keys appearing in any of the given tiers
    fn feature_keys(&self, tiers: &[Tier]) -> BTreeMap<KeyId, FeatureKey>;

    /// Units of a type, optionally restricted to children of `parent`
    fn iter_units<'a>(
        &'a self,
        unit_type: UnitType,
        keys: &'a [KeyId],
        parent: Option<UnitId>,
    ) -> Box<dyn Iterator<Item = UnitRecord> + 'a>;
}

#[derive(Debug)]
struct Unit {
    unit_type: UnitType,
    parent: Option<UnitId>,
    features: FxHashMap<KeyId, Value>,
}

#[derive(Debug, Default)]
struct PendingNode {
    unit_type: Option<UnitType>,
    parent: Option<Spur>,
    // (tier, feature name) -> value, in first-write order
    features: Vec<(Tier, Spur, RawValue)>,
}

#[derive(Debug, Default)]
struct PendingBlock {
    order: Vec<Spur>,
    nodes: FxHashMap<Spur, PendingNode>,
    relations: Vec<(Spur, Spur)>,
}

impl PendingBlock {
    fn node(&mut self, name: Spur) -> &mut PendingNode {
        let order = &mut self.order;
        self.nodes.entry(name).or_insert_with(|| {
            order.push(name);
            PendingNode::default()
        })
    }

    fn is_empty(&self) -> bool {
        self.order.is_empty() && self.relations.is_empty()
    }

    fn clear(&mut self) {
        self.order.clear();
        self.nodes.clear();
        self.relations.clear();
    }
}

/// In-memory annotation graph
#[derive(Debug, Default)]
pub struct MemoryStore {
    units: Vec<Unit>,
    keys: Vec<FeatureKey>,
    key_ids: FxHashMap<FeatureKey, KeyId>,
    relations: Vec<(UnitId, UnitId)>,
    names: Rodeo,
    pending: PendingBlock,
    blocks: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of committed units
    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn unit_type(&self, id: UnitId) -> Result<UnitType, StoreError> {
        Ok(self.unit(id)?.unit_type)
    }

    pub fn parent(&self, id: UnitId) -> Result<Option<UnitId>, StoreError> {
        Ok(self.unit(id)?.parent)
    }

    /// Look up a committed feature by tier and name, regardless of type
    pub fn feature(&self, id: UnitId, tier: Tier, name: &str) -> Option<&Value> {
        let unit = self.units.get(id.0 as usize)?;
        unit.features.iter().find_map(|(key, value)| {
            let k = &self.keys[key.0 as usize];
            (k.tier == tier && k.name == name).then_some(value)
        })
    }

    /// Targets of all relations starting at `from`
    pub fn relations_from(&self, from: UnitId) -> Vec<UnitId> {
        self.relations
            .iter()
            .filter(|(f, _)| *f == from)
            .map(|(_, t)| *t)
            .collect()
    }

    /// All committed units of a type, in creation order
    pub fn units_of_type(&self, unit_type: UnitType) -> Vec<UnitId> {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.unit_type == unit_type)
            .map(|(i, _)| UnitId(i as u32))
            .collect()
    }

    /// Children of `parent` with the given type, in creation order
    pub fn children(&self, parent: UnitId, unit_type: UnitType) -> Vec<UnitId> {
        self.units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.unit_type == unit_type && u.parent == Some(parent))
            .map(|(i, _)| UnitId(i as u32))
            .collect()
    }

    /// Find the child of `parent` whose `UD:id` is `id`
    pub fn find_by_ud_id(&self, parent: UnitId, unit_type: UnitType, id: &str) -> Option<UnitId> {
        self.children(parent, unit_type).into_iter().find(|&u| {
            self.feature(u, Tier::UD, "id")
                .and_then(|v| v.as_str())
                .is_some_and(|v| v == id)
        })
    }

    /// Interned id of a feature key, if any unit carries it
    pub fn key_id(&self, key: &FeatureKey) -> Option<KeyId> {
        self.key_ids.get(key).copied()
    }

    fn unit(&self, id: UnitId) -> Result<&Unit, StoreError> {
        self.units
            .get(id.0 as usize)
            .ok_or(StoreError::UnknownUnit(id))
    }

    fn intern_key(&mut self, key: FeatureKey) -> KeyId {
        if let Some(id) = self.key_ids.get(&key) {
            return *id;
        }
        let id = KeyId(self.keys.len() as u32);
        self.keys.push(key.clone());
        self.key_ids.insert(key, id);
        id
    }

    fn sort_value(&self, unit: &Unit, index_key: Option<KeyId>) -> i64 {
        index_key
            .and_then(|k| unit.features.get(&k))
            .and_then(|v| v.as_int())
            .unwrap_or(i64::MAX)
    }
}

impl AnnotationSink for MemoryStore {
    fn set_type(&mut self, name: &str, unit_type: UnitType) -> Result<(), StoreError> {
        let spur = self.names.get_or_intern(name);
        let node = self.pending.node(spur);
        match node.unit_type {
            Some(existing) if existing != unit_type => Err(StoreError::TypeConflict {
                name: name.to_string(),
                existing,
                requested: unit_type,
            }),
            _ => {
                node.unit_type = Some(unit_type);
                Ok(())
            }
        }
    }

    fn set_parent(&mut self, child: &str, parent: &str) {
        let child = self.names.get_or_intern(child);
        let parent = self.names.get_or_intern(parent);
        self.pending.node(child).parent = Some(parent);
        self.pending.node(parent);
    }

    fn set_feature(&mut self, name: &str, tier: Tier, feature: &str, value: RawValue) {
        let spur = self.names.get_or_intern(name);
        let feature = self.names.get_or_intern(feature);
        let features = &mut self.pending.node(spur).features;
        match features
            .iter()
            .position(|(t, f, _)| *t == tier && *f == feature)
        {
            Some(i) => features[i].2 = value,
            None => features.push((tier, feature, value)),
        }
    }

    fn add_relation(&mut self, from: &str, to: &str) {
        let from = self.names.get_or_intern(from);
        let to = self.names.get_or_intern(to);
        self.pending.relations.push((from, to));
    }

    fn end_block(&mut self) -> Result<(), StoreError> {
        self.blocks += 1;
        if self.pending.is_empty() {
            return Ok(());
        }
        let mut block = std::mem::take(&mut self.pending);

        // Allocate ids for typed nodes in first-seen order
        let mut ids: FxHashMap<Spur, UnitId> = FxHashMap::default();
        for name in &block.order {
            if block.nodes[name].unit_type.is_some() {
                ids.insert(*name, UnitId((self.units.len() + ids.len()) as u32));
            }
        }

        for name in &block.order {
            let Some(node) = block.nodes.remove(name) else {
                continue;
            };
            let Some(unit_type) = node.unit_type else {
                debug!(name = self.names.resolve(name), "dropping untyped node");
                continue;
            };
            let parent = node.parent.and_then(|p| ids.get(&p).copied());

            let mut features = FxHashMap::default();
            for (tier, feature, value) in node.features {
                let feature = self.names.resolve(&feature).to_string();
                let value_type = value.value_type();
                let resolved = value.try_map_ref(|target| {
                    self.names.get(&target).and_then(|spur| ids.get(&spur).copied())
                });
                let Some(resolved) = resolved else {
                    warn!(
                        node = self.names.resolve(name),
                        tier = tier.as_str(),
                        feature = %feature,
                        "dropping reference to unknown node"
                    );
                    continue;
                };
                let key = self.intern_key(FeatureKey {
                    tier,
                    name: feature,
                    value_type,
                });
                features.insert(key, resolved);
            }

            self.units.push(Unit {
                unit_type,
                parent,
                features,
            });
        }

        for (from, to) in block.relations.drain(..) {
            match (ids.get(&from), ids.get(&to)) {
                (Some(f), Some(t)) => self.relations.push((*f, *t)),
                _ => debug!(
                    from = self.names.resolve(&from),
                    to = self.names.resolve(&to),
                    "dropping relation with unknown endpoint"
                ),
            }
        }

        block.clear();
        self.pending = block;
        Ok(())
    }

    fn discard_block(&mut self) {
        self.pending.clear();
    }

    fn committed_blocks(&self) -> usize {
        self.blocks
    }
}

impl AnnotationSource for MemoryStore {
    fn feature_keys(&self, tiers: &[Tier]) -> BTreeMap<KeyId, FeatureKey> {
        self.keys
            .iter()
            .enumerate()
            .filter(|(_, k)| tiers.contains(&k.tier))
            .map(|(i, k)| (KeyId(i as u32), k.clone()))
            .collect()
    }

    fn iter_units<'a>(
        &'a self,
        unit_type: UnitType,
        keys: &'a [KeyId],
        parent: Option<UnitId>,
    ) -> Box<dyn Iterator<Item = UnitRecord> + 'a> {
        let index_key = self
            .key_ids
            .get(&FeatureKey::new(Tier::Meta, "index", ValueType::Int))
            .copied();

        let mut selected: Vec<(i64, usize)> = self
            .units
            .iter()
            .enumerate()
            .filter(|(_, u)| u.unit_type == unit_type)
            .filter(|(_, u)| parent.is_none() || u.parent == parent)
            .map(|(i, u)| (self.sort_value(u, index_key), i))
            .collect();
        selected.sort_unstable();

        Box::new(selected.into_iter().map(move |(_, i)| {
            let unit = &self.units[i];
            let features = keys
                .iter()
                .filter_map(|k| unit.features.get(k).map(|v| (*k, v.clone())))
                .collect();
            UnitRecord {
                id: UnitId(i as u32),
                features,
            }
        }))
    }
}
