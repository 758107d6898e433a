use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::geometry::{Aabb, Quat, Vec3};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptId(pub String);

impl ConceptId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConceptId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConceptId {
    fn from(value: &str) -> Self {
        ConceptId(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MagnetId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConceptKind {
    Image,
    Video,
    Audio,
    Object3d,
}

/// One memorizable item. All concepts are pre-instantiated hidden at session
/// start; "spawning" reveals and repositions, it never destroys, so the
/// stable id survives anchor reassociation across reloads.
#[derive(Debug, Clone, PartialEq)]
pub struct ConceptEntity {
    pub id: ConceptId,
    pub kind: ConceptKind,
    pub position: Vec3,
    pub facing: Quat,
    pub model_rotation: Quat,
    pub size: Vec3,
    pub visible: bool,
    pub manipulable: bool,
    pub anchor: Option<Uuid>,
    pub moved_once: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Magnet {
    pub id: MagnetId,
    pub position: Vec3,
    pub size: Vec3,
    pub active: bool,
    pub manipulable: bool,
    pub anchor: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub position: Vec3,
    pub size: Vec3,
    pub anchor: Option<Uuid>,
}

impl Table {
    pub fn bounds(&self) -> Aabb {
        Aabb::from_center_size(
            self.position + Vec3::new(0.0, self.size.y / 2.0, 0.0),
            self.size,
        )
    }

    /// Reference point used for the magnet exclusion test: the table top.
    pub fn top(&self) -> Vec3 {
        self.position + Vec3::new(0.0, self.size.y, 0.0)
    }
}

#[derive(Debug, Clone)]
pub struct ConceptSeed {
    pub id: ConceptId,
    pub kind: ConceptKind,
}

const CONCEPT_SIZE: f32 = 0.4;
const MAGNET_SIZE: f32 = 0.12;
const TABLE_SIZE: Vec3 = Vec3 {
    x: 1.0,
    y: 0.5,
    z: 0.6,
};

/// Catalog of concepts plus the live magnet arena and table instance.
/// Magnets are addressed by stable `MagnetId` handles, never by live-object
/// identity, so slot state survives persistence/reload cycles.
#[derive(Debug, Default)]
pub struct ObjectRegistry {
    concepts: HashMap<ConceptId, ConceptEntity>,
    spawn_order: Vec<ConceptId>,
    concepts_in_scene: Vec<ConceptId>,
    magnets: BTreeMap<MagnetId, Magnet>,
    next_magnet_id: u64,
    table: Option<Table>,
}

impl ObjectRegistry {
    pub fn from_catalog(seeds: Vec<ConceptSeed>) -> Self {
        let mut concepts = HashMap::with_capacity(seeds.len());
        let mut spawn_order = Vec::with_capacity(seeds.len());
        for seed in seeds {
            if concepts.contains_key(&seed.id) {
                warn!(concept = %seed.id, "duplicate concept id in catalog, keeping the first");
                continue;
            }
            spawn_order.push(seed.id.clone());
            concepts.insert(
                seed.id.clone(),
                ConceptEntity {
                    id: seed.id,
                    kind: seed.kind,
                    position: Vec3::ZERO,
                    facing: Quat::IDENTITY,
                    model_rotation: Quat::IDENTITY,
                    size: Vec3::new(CONCEPT_SIZE, CONCEPT_SIZE, CONCEPT_SIZE),
                    visible: false,
                    manipulable: false,
                    anchor: None,
                    moved_once: false,
                },
            );
        }
        Self {
            concepts,
            spawn_order,
            concepts_in_scene: Vec::new(),
            magnets: BTreeMap::new(),
            next_magnet_id: 0,
            table: None,
        }
    }

    pub fn concepts_count(&self) -> usize {
        self.spawn_order.len()
    }

    pub fn spawn_order(&self) -> &[ConceptId] {
        &self.spawn_order
    }

    pub fn concepts_in_scene(&self) -> &[ConceptId] {
        &self.concepts_in_scene
    }

    pub fn concept(&self, id: &ConceptId) -> Option<&ConceptEntity> {
        self.concepts.get(id)
    }

    pub fn concept_mut(&mut self, id: &ConceptId) -> Option<&mut ConceptEntity> {
        self.concepts.get_mut(id)
    }

    /// First concept in canonical upload order that is not yet in the scene.
    pub fn next_unspawned_concept(&self) -> Option<&ConceptId> {
        self.spawn_order
            .iter()
            .find(|id| !self.concepts_in_scene.contains(id))
    }

    /// Reveals a hidden concept at a pose. Returns false for unknown ids.
    pub fn enable_concept(&mut self, id: &ConceptId, position: Vec3, facing: Quat) -> bool {
        let Some(concept) = self.concepts.get_mut(id) else {
            warn!(concept = %id, "enable requested for unknown concept");
            return false;
        };
        concept.visible = true;
        concept.position = position;
        concept.facing = facing;
        debug!(concept = %id, "concept enabled");
        true
    }

    pub fn disable_concept(&mut self, id: &ConceptId) {
        if let Some(concept) = self.concepts.get_mut(id) {
            concept.visible = false;
            concept.manipulable = false;
        }
    }

    pub fn register_concept_in_scene(&mut self, id: ConceptId) {
        if !self.concepts_in_scene.contains(&id) {
            self.concepts_in_scene.push(id);
        }
    }

    /// Clears the in-scene list. The entities themselves stay in the catalog
    /// (hidden), ready to be revealed again.
    pub fn reset_concepts_in_scene(&mut self) {
        for id in std::mem::take(&mut self.concepts_in_scene) {
            if let Some(concept) = self.concepts.get_mut(&id) {
                concept.visible = false;
                concept.manipulable = false;
                concept.anchor = None;
            }
        }
    }

    pub fn spawn_magnet(&mut self, position: Vec3) -> MagnetId {
        let id = MagnetId(self.next_magnet_id);
        self.next_magnet_id = self.next_magnet_id.saturating_add(1);
        self.magnets.insert(
            id,
            Magnet {
                id,
                position,
                size: Vec3::new(MAGNET_SIZE, MAGNET_SIZE, MAGNET_SIZE),
                active: true,
                manipulable: true,
                anchor: None,
            },
        );
        debug!(magnet = id.0, "magnet spawned");
        id
    }

    pub fn remove_magnet(&mut self, id: MagnetId) -> Option<Magnet> {
        self.magnets.remove(&id)
    }

    pub fn clear_magnets(&mut self) {
        self.magnets.clear();
    }

    pub fn magnet(&self, id: MagnetId) -> Option<&Magnet> {
        self.magnets.get(&id)
    }

    pub fn magnet_mut(&mut self, id: MagnetId) -> Option<&mut Magnet> {
        self.magnets.get_mut(&id)
    }

    pub fn magnets(&self) -> impl Iterator<Item = &Magnet> {
        self.magnets.values()
    }

    /// Snapshot of live magnet handles in id (spawn) order; callers iterate
    /// this while mutating the arena.
    pub fn magnet_ids(&self) -> Vec<MagnetId> {
        self.magnets.keys().copied().collect()
    }

    pub fn magnets_in_scene_count(&self) -> usize {
        self.magnets.len()
    }

    pub fn place_table(&mut self, position: Vec3) {
        self.table = Some(Table {
            position,
            size: TABLE_SIZE,
            anchor: None,
        });
    }

    pub fn table(&self) -> Option<&Table> {
        self.table.as_ref()
    }

    pub fn table_mut(&mut self) -> Option<&mut Table> {
        self.table.as_mut()
    }

    pub fn clear_table(&mut self) {
        self.table = None;
    }

    pub fn table_size(&self) -> Vec3 {
        TABLE_SIZE
    }
}
