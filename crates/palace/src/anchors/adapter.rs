use std::collections::HashMap;

use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{AnchorDescriptor, AnchorState, AnchorStore, ObjectKind, Pose};
use crate::geometry::Quat;
use crate::persist::PersistenceGateway;
use crate::registry::{ConceptId, MagnetId, ObjectRegistry};

/// The store rejects erase calls above 32 ids; stay under it.
pub const ERASE_BATCH_LIMIT: usize = 30;
/// The store rejects load calls above 50 ids; stay under it.
pub const LOAD_BATCH_LIMIT: usize = 45;
/// Bounded wait for a fresh anchor to localize before its save is abandoned
/// and the runtime anchor discarded.
pub const SAVE_LOCALIZE_TIMEOUT_SECONDS: f32 = 10.0;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoundObject {
    Magnet(MagnetId),
    Concept(ConceptId),
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaterializedObject {
    Magnet(MagnetId),
    Concept(ConceptId),
    Table,
}

#[derive(Debug)]
struct PendingSave {
    uuid: Uuid,
    descriptor: AnchorDescriptor,
    object: BoundObject,
    waited_seconds: f32,
}

/// Bridge between the in-scene object graph and the anchor store.
///
/// Owns the uuid -> descriptor map for every experience, the list of anchors
/// currently materialized in the scene, and the queue of freshly created
/// anchors waiting to localize before they can be saved. Store failures stop
/// here: callers observe counts and `are_anchors_ready`, never errors.
pub struct AnchorBinder {
    bindings: HashMap<String, HashMap<Uuid, AnchorDescriptor>>,
    current_experience: String,
    materialized: Vec<Uuid>,
    pending_saves: Vec<PendingSave>,
    rotations: HashMap<String, [f32; 4]>,
}

impl AnchorBinder {
    pub fn new(
        mut bindings: HashMap<String, HashMap<Uuid, AnchorDescriptor>>,
        current_experience: impl Into<String>,
        rotations: HashMap<String, [f32; 4]>,
    ) -> Self {
        let current_experience = current_experience.into();
        bindings.entry(current_experience.clone()).or_default();
        info!(
            experience = %current_experience,
            records = bindings[&current_experience].len(),
            "anchor binder ready"
        );
        Self {
            bindings,
            current_experience,
            materialized: Vec::new(),
            pending_saves: Vec::new(),
            rotations,
        }
    }

    pub fn current_experience(&self) -> &str {
        &self.current_experience
    }

    pub fn persisted_count(&self) -> usize {
        self.current_records().len()
    }

    pub fn materialized_count(&self) -> usize {
        self.materialized.len()
    }

    pub fn pending_save_count(&self) -> usize {
        self.pending_saves.len()
    }

    pub fn current_records(&self) -> &HashMap<Uuid, AnchorDescriptor> {
        self.bindings
            .get(&self.current_experience)
            .expect("current experience entry exists by construction")
    }

    pub fn rotation_for(&self, concept: &str) -> Option<[f32; 4]> {
        self.rotations.get(concept).copied()
    }

    /// True iff every persisted record of the current experience is
    /// materialized in the scene. The only cross-process synchronization
    /// primitive; localization has no batch completion signal, so callers
    /// poll this.
    pub fn are_anchors_ready(&self) -> bool {
        let persisted = self.persisted_count();
        let materialized = self.materialized.len();
        debug!(persisted, materialized, "anchors ready check");
        persisted == materialized
    }

    /// Requests localization of every persisted record of the current
    /// experience, in uuid order, chunked to the store's load limit. Chunk
    /// failures are logged and the remaining chunks still run.
    pub fn request_load_all(&mut self, store: &mut dyn AnchorStore) {
        let mut uuids: Vec<Uuid> = self.current_records().keys().copied().collect();
        uuids.sort();
        if uuids.is_empty() {
            debug!("no anchors to load");
            return;
        }

        for chunk in uuids.chunks(LOAD_BATCH_LIMIT) {
            match store.load_unbound(chunk) {
                Ok(unbound) => {
                    debug!(requested = chunk.len(), found = unbound.len(), "anchors loaded");
                    for anchor in unbound {
                        store.localize(anchor);
                    }
                }
                Err(error) => {
                    warn!(error = %error, "anchor load chunk failed");
                }
            }
        }
    }

    /// Per-tick work: drains localization completions into the registry and
    /// advances pending saves. Returns what materialized this tick.
    pub fn tick(
        &mut self,
        dt_seconds: f32,
        store: &mut dyn AnchorStore,
        registry: &mut ObjectRegistry,
        gateway: &mut dyn PersistenceGateway,
    ) -> Vec<MaterializedObject> {
        let mut appeared = Vec::new();

        for outcome in store.poll_localized() {
            let Some(pose) = outcome.pose else {
                warn!(uuid = %outcome.uuid, "anchor failed to localize, skipping it");
                continue;
            };
            let Some(descriptor) = self.current_records().get(&outcome.uuid).cloned() else {
                warn!(uuid = %outcome.uuid, "localized anchor has no record, skipping it");
                continue;
            };
            if let Some(object) = self.materialize(outcome.uuid, &descriptor, pose, registry) {
                self.materialized.push(outcome.uuid);
                appeared.push(object);
            }
        }

        self.advance_pending_saves(dt_seconds, store, registry, gateway);
        appeared
    }

    fn materialize(
        &self,
        uuid: Uuid,
        descriptor: &AnchorDescriptor,
        pose: Pose,
        registry: &mut ObjectRegistry,
    ) -> Option<MaterializedObject> {
        match descriptor.object_kind {
            ObjectKind::Concept => {
                let Some(raw_id) = descriptor.concept_id.as_deref() else {
                    warn!(%uuid, "concept record is missing its concept id");
                    return None;
                };
                let id = ConceptId::from(raw_id);
                if !registry.enable_concept(&id, pose.position, pose.rotation) {
                    return None;
                }
                let saved_rotation = self.rotations.get(raw_id).copied();
                if let Some(concept) = registry.concept_mut(&id) {
                    concept.anchor = Some(uuid);
                    if let Some(rotation) = saved_rotation {
                        concept.model_rotation = Quat::from_array(rotation);
                        debug!(concept = %id, "concept rotation restored");
                    }
                }
                registry.register_concept_in_scene(id.clone());
                debug!(concept = %id, "concept materialized");
                Some(MaterializedObject::Concept(id))
            }
            ObjectKind::Magnet => {
                let magnet_id = registry.spawn_magnet(pose.position);
                if let Some(magnet) = registry.magnet_mut(magnet_id) {
                    magnet.anchor = Some(uuid);
                }
                debug!(magnet = magnet_id.0, "magnet materialized");
                Some(MaterializedObject::Magnet(magnet_id))
            }
            ObjectKind::Table => {
                registry.place_table(pose.position);
                if let Some(table) = registry.table_mut() {
                    table.anchor = Some(uuid);
                }
                debug!("table materialized");
                Some(MaterializedObject::Table)
            }
        }
    }

    fn advance_pending_saves(
        &mut self,
        dt_seconds: f32,
        store: &mut dyn AnchorStore,
        registry: &mut ObjectRegistry,
        gateway: &mut dyn PersistenceGateway,
    ) {
        let mut still_pending = Vec::new();
        for mut pending in std::mem::take(&mut self.pending_saves) {
            match store.anchor_state(pending.uuid) {
                AnchorState::Localized => {
                    self.materialized.push(pending.uuid);
                    match store.save_anchor(pending.uuid) {
                        Ok(()) => {
                            self.bindings
                                .get_mut(&self.current_experience)
                                .expect("current experience entry exists by construction")
                                .insert(pending.uuid, pending.descriptor.clone());
                            set_object_anchor(registry, &pending.object, Some(pending.uuid));
                            self.persist_dictionary(gateway);
                            debug!(uuid = %pending.uuid, "anchor saved");
                        }
                        Err(error) => {
                            self.materialized.retain(|uuid| *uuid != pending.uuid);
                            store.discard_anchor(pending.uuid);
                            warn!(
                                error = %error,
                                "anchor save failed, object left without persistence"
                            );
                        }
                    }
                }
                AnchorState::Pending => {
                    pending.waited_seconds += dt_seconds;
                    if pending.waited_seconds >= SAVE_LOCALIZE_TIMEOUT_SECONDS {
                        store.discard_anchor(pending.uuid);
                        warn!(
                            uuid = %pending.uuid,
                            "anchor never localized within the save window, discarded"
                        );
                    } else {
                        still_pending.push(pending);
                    }
                }
                AnchorState::Missing => {
                    warn!(uuid = %pending.uuid, "runtime anchor vanished before save");
                }
            }
        }
        self.pending_saves = still_pending;
    }

    /// Creates a runtime anchor for an object and queues its save. No-op if
    /// the object already has (or is waiting on) an anchor.
    pub fn attach_anchor(
        &mut self,
        object: BoundObject,
        registry: &ObjectRegistry,
        store: &mut dyn AnchorStore,
    ) {
        if object_anchor(registry, &object).is_some()
            || self.pending_saves.iter().any(|pending| pending.object == object)
        {
            debug!("object already has an anchor");
            return;
        }
        let Some(pose) = object_pose(registry, &object) else {
            warn!("anchor requested for an object that is not in the scene");
            return;
        };
        let descriptor = descriptor_for(&object);
        let uuid = store.create_anchor(pose);
        debug!(uuid = %uuid, "anchor attach queued");
        self.pending_saves.push(PendingSave {
            uuid,
            descriptor,
            object,
            waited_seconds: 0.0,
        });
    }

    /// Anchors cannot move underneath a grabbed object: grabbing erases the
    /// persisted record and destroys the runtime anchor. The record is only
    /// unmapped after the store confirmed the erase, so the local map never
    /// runs ahead of the remote one.
    pub fn movement_started(
        &mut self,
        object: &BoundObject,
        registry: &mut ObjectRegistry,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        if let Some(index) = self
            .pending_saves
            .iter()
            .position(|pending| pending.object == *object)
        {
            let pending = self.pending_saves.remove(index);
            store.discard_anchor(pending.uuid);
            debug!(uuid = %pending.uuid, "pending anchor save cancelled by grab");
            return;
        }

        let Some(uuid) = object_anchor(registry, object) else {
            debug!("object grabbed with no anchor");
            return;
        };

        self.materialized.retain(|materialized| *materialized != uuid);
        match store.erase_anchors(&[uuid]) {
            Ok(()) => {
                self.bindings
                    .get_mut(&self.current_experience)
                    .expect("current experience entry exists by construction")
                    .remove(&uuid);
                self.persist_dictionary(gateway);
                debug!(uuid = %uuid, "anchor erased for movement");
            }
            Err(error) => {
                warn!(error = %error, "anchor erase failed, record kept for retry");
            }
        }
        store.discard_anchor(uuid);
        set_object_anchor(registry, object, None);
    }

    /// Movement ended: the object re-anchors at its new pose.
    pub fn movement_ended(
        &mut self,
        object: BoundObject,
        registry: &ObjectRegistry,
        store: &mut dyn AnchorStore,
    ) {
        self.attach_anchor(object, registry, store);
    }

    /// Destroys runtime anchors without touching persisted records. Used
    /// when entering the play phases, where objects move freely and are
    /// restored from records afterwards.
    pub fn release_runtime_anchors(
        &mut self,
        objects: &[BoundObject],
        registry: &mut ObjectRegistry,
        store: &mut dyn AnchorStore,
    ) {
        for object in objects {
            if let Some(index) = self
                .pending_saves
                .iter()
                .position(|pending| pending.object == *object)
            {
                let pending = self.pending_saves.remove(index);
                store.discard_anchor(pending.uuid);
            }
            let Some(uuid) = object_anchor(registry, object) else {
                continue;
            };
            self.materialized.retain(|materialized| *materialized != uuid);
            store.discard_anchor(uuid);
            set_object_anchor(registry, object, None);
        }
    }

    /// Erases records and destroys the objects (concepts are hidden, not
    /// destroyed; their identity must survive). Erase runs in ordered chunks
    /// and failed chunks keep their records mapped.
    pub fn erase_and_destroy_objects(
        &mut self,
        objects: &[BoundObject],
        registry: &mut ObjectRegistry,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        let mut uuids = Vec::new();
        for object in objects {
            if let Some(uuid) = object_anchor(registry, object) {
                if !self.current_records().contains_key(&uuid) {
                    warn!(uuid = %uuid, "anchor not mapped in the current experience");
                }
                self.materialized.retain(|materialized| *materialized != uuid);
                store.discard_anchor(uuid);
                set_object_anchor(registry, object, None);
                uuids.push(uuid);
            } else {
                debug!("object has no anchor to erase");
            }
        }

        for object in objects {
            match object {
                BoundObject::Concept(id) => registry.disable_concept(id),
                BoundObject::Magnet(id) => {
                    registry.remove_magnet(*id);
                }
                BoundObject::Table => registry.clear_table(),
            }
        }

        let experience = self.current_experience.clone();
        self.erase_record_chunks(&experience, &uuids, store, gateway);
    }

    /// Erases persisted records of one kind from the current experience.
    /// Only valid while those records have no materialized runtime object.
    pub fn erase_records_of_kind(
        &mut self,
        kind: ObjectKind,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        let mut uuids: Vec<Uuid> = self
            .current_records()
            .iter()
            .filter(|(_, descriptor)| descriptor.object_kind == kind)
            .map(|(uuid, _)| *uuid)
            .collect();
        uuids.sort();
        let experience = self.current_experience.clone();
        self.erase_record_chunks(&experience, &uuids, store, gateway);
    }

    /// Debug operation: erase every record of one experience. Returns the
    /// number of chunks that failed.
    pub fn erase_all_for_experience(
        &mut self,
        experience: &str,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) -> usize {
        let mut uuids: Vec<Uuid> = self
            .bindings
            .get(experience)
            .map(|records| records.keys().copied().collect())
            .unwrap_or_default();
        uuids.sort();
        self.erase_record_chunks(experience, &uuids, store, gateway)
    }

    /// Debug operation: erase everything, experience by experience, with an
    /// aggregated failure summary instead of fire-and-forget.
    pub fn erase_all_experiences(
        &mut self,
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) {
        let mut experiences: Vec<String> = self.bindings.keys().cloned().collect();
        experiences.sort();
        let mut failed_chunks = 0usize;
        for experience in experiences {
            failed_chunks += self.erase_all_for_experience(&experience, store, gateway);
        }
        if failed_chunks > 0 {
            warn!(failed_chunks, "erase of all experiences completed with failures");
        } else {
            info!("all experiences erased");
        }
    }

    fn erase_record_chunks(
        &mut self,
        experience: &str,
        uuids: &[Uuid],
        store: &mut dyn AnchorStore,
        gateway: &mut dyn PersistenceGateway,
    ) -> usize {
        let mut failed_chunks = 0usize;
        for chunk in uuids.chunks(ERASE_BATCH_LIMIT) {
            match store.erase_anchors(chunk) {
                Ok(()) => {
                    if let Some(records) = self.bindings.get_mut(experience) {
                        for uuid in chunk {
                            records.remove(uuid);
                        }
                    }
                    self.persist_dictionary(gateway);
                    debug!(erased = chunk.len(), "anchor erase chunk done");
                }
                Err(error) => {
                    failed_chunks += 1;
                    warn!(error = %error, "anchor erase chunk failed, records kept");
                }
            }
        }
        failed_chunks
    }

    /// Remembers a 3D concept's model rotation and pushes it through the
    /// gateway.
    pub fn save_rotation(
        &mut self,
        concept: &str,
        rotation: [f32; 4],
        gateway: &mut dyn PersistenceGateway,
    ) {
        self.rotations.insert(concept.to_string(), rotation);
        if let Err(error) =
            gateway.persist_rotation(&self.current_experience, concept, rotation)
        {
            warn!(error = %error, "rotation save failed");
        }
    }

    fn persist_dictionary(&self, gateway: &mut dyn PersistenceGateway) {
        if let Err(error) = gateway.persist_anchor_data(&self.bindings) {
            warn!(error = %error, "anchor dictionary save failed");
        }
    }
}

fn object_anchor(registry: &ObjectRegistry, object: &BoundObject) -> Option<Uuid> {
    match object {
        BoundObject::Magnet(id) => registry.magnet(*id).and_then(|magnet| magnet.anchor),
        BoundObject::Concept(id) => registry.concept(id).and_then(|concept| concept.anchor),
        BoundObject::Table => registry.table().and_then(|table| table.anchor),
    }
}

fn set_object_anchor(registry: &mut ObjectRegistry, object: &BoundObject, anchor: Option<Uuid>) {
    match object {
        BoundObject::Magnet(id) => {
            if let Some(magnet) = registry.magnet_mut(*id) {
                magnet.anchor = anchor;
            }
        }
        BoundObject::Concept(id) => {
            if let Some(concept) = registry.concept_mut(id) {
                concept.anchor = anchor;
            }
        }
        BoundObject::Table => {
            if let Some(table) = registry.table_mut() {
                table.anchor = anchor;
            }
        }
    }
}

fn object_pose(registry: &ObjectRegistry, object: &BoundObject) -> Option<Pose> {
    match object {
        BoundObject::Magnet(id) => registry.magnet(*id).map(|magnet| Pose::at(magnet.position)),
        BoundObject::Concept(id) => registry.concept(id).map(|concept| Pose {
            position: concept.position,
            rotation: concept.facing,
        }),
        BoundObject::Table => registry.table().map(|table| Pose::at(table.position)),
    }
}

fn descriptor_for(object: &BoundObject) -> AnchorDescriptor {
    match object {
        BoundObject::Magnet(_) => AnchorDescriptor::magnet(),
        BoundObject::Concept(id) => AnchorDescriptor::concept(id.as_str()),
        BoundObject::Table => AnchorDescriptor::table(),
    }
}
