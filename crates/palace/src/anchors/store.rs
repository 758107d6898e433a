use std::collections::{HashMap, HashSet};

use tracing::debug;
use uuid::Uuid;

use super::{AnchorStoreError, Pose};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorState {
    Pending,
    Localized,
    Missing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnboundAnchor {
    pub uuid: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalizeOutcome {
    pub uuid: Uuid,
    pub pose: Option<Pose>,
}

/// Boundary to the external anchor persistence/localization service.
///
/// Persist/erase/load calls complete synchronously per chunk but may fail
/// totally; localization is asynchronous per anchor: callers request it and
/// drain completions on later ticks. The service clock advances via `tick`
/// so an in-process backend can model latency.
pub trait AnchorStore {
    /// Attaches a fresh runtime anchor at a pose. Localization of the new
    /// anchor may take time; poll `anchor_state` before saving.
    fn create_anchor(&mut self, pose: Pose) -> Uuid;

    fn anchor_state(&self, uuid: Uuid) -> AnchorState;

    /// Destroys the runtime anchor component without touching persisted
    /// records.
    fn discard_anchor(&mut self, uuid: Uuid);

    fn save_anchor(&mut self, uuid: Uuid) -> Result<(), AnchorStoreError>;

    fn erase_anchors(&mut self, uuids: &[Uuid]) -> Result<(), AnchorStoreError>;

    fn load_unbound(&mut self, uuids: &[Uuid]) -> Result<Vec<UnboundAnchor>, AnchorStoreError>;

    fn localize(&mut self, anchor: UnboundAnchor);

    fn poll_localized(&mut self) -> Vec<LocalizeOutcome>;

    fn tick(&mut self) {}
}

#[derive(Debug)]
struct RuntimeAnchor {
    pose: Pose,
    remaining_ticks: u32,
}

/// In-process anchor backend. Serves as the desktop-mode store and as the
/// test double: localization latency and per-call failures are injectable.
#[derive(Debug, Default)]
pub struct InMemoryAnchorStore {
    persisted: HashMap<Uuid, Pose>,
    runtime: HashMap<Uuid, RuntimeAnchor>,
    localize_queue: Vec<(Uuid, u32)>,
    completed: Vec<LocalizeOutcome>,
    create_localize_delay_ticks: u32,
    localize_delay_ticks: u32,
    fail_localize: HashSet<Uuid>,
    fail_save: HashSet<Uuid>,
    fail_next_erases: u32,
    fail_next_loads: u32,
    load_batch_sizes: Vec<usize>,
    erase_batch_sizes: Vec<usize>,
}

impl InMemoryAnchorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_localize_delay(mut self, ticks: u32) -> Self {
        self.localize_delay_ticks = ticks;
        self
    }

    pub fn with_create_localize_delay(mut self, ticks: u32) -> Self {
        self.create_localize_delay_ticks = ticks;
        self
    }

    pub fn fail_localization_of(&mut self, uuid: Uuid) {
        self.fail_localize.insert(uuid);
    }

    pub fn fail_save_of(&mut self, uuid: Uuid) {
        self.fail_save.insert(uuid);
    }

    pub fn fail_next_erases(&mut self, calls: u32) {
        self.fail_next_erases = calls;
    }

    pub fn fail_next_loads(&mut self, calls: u32) {
        self.fail_next_loads = calls;
    }

    pub fn persisted_count(&self) -> usize {
        self.persisted.len()
    }

    pub fn contains_persisted(&self, uuid: Uuid) -> bool {
        self.persisted.contains_key(&uuid)
    }

    pub fn runtime_count(&self) -> usize {
        self.runtime.len()
    }

    /// Seeds a persisted record directly, bypassing the save path. Test and
    /// desktop-session setup hook.
    pub fn seed_persisted(&mut self, uuid: Uuid, pose: Pose) {
        self.persisted.insert(uuid, pose);
    }

    pub fn load_batch_sizes(&self) -> &[usize] {
        &self.load_batch_sizes
    }

    pub fn erase_batch_sizes(&self) -> &[usize] {
        &self.erase_batch_sizes
    }
}

impl AnchorStore for InMemoryAnchorStore {
    fn create_anchor(&mut self, pose: Pose) -> Uuid {
        let uuid = Uuid::new_v4();
        self.runtime.insert(
            uuid,
            RuntimeAnchor {
                pose,
                remaining_ticks: self.create_localize_delay_ticks,
            },
        );
        debug!(%uuid, "runtime anchor created");
        uuid
    }

    fn anchor_state(&self, uuid: Uuid) -> AnchorState {
        match self.runtime.get(&uuid) {
            Some(anchor) if anchor.remaining_ticks == 0 => AnchorState::Localized,
            Some(_) => AnchorState::Pending,
            None => AnchorState::Missing,
        }
    }

    fn discard_anchor(&mut self, uuid: Uuid) {
        self.runtime.remove(&uuid);
    }

    fn save_anchor(&mut self, uuid: Uuid) -> Result<(), AnchorStoreError> {
        if self.fail_save.contains(&uuid) {
            return Err(AnchorStoreError::SaveRejected { uuid });
        }
        let Some(anchor) = self.runtime.get(&uuid) else {
            return Err(AnchorStoreError::UnknownAnchor { uuid });
        };
        self.persisted.insert(uuid, anchor.pose);
        Ok(())
    }

    fn erase_anchors(&mut self, uuids: &[Uuid]) -> Result<(), AnchorStoreError> {
        self.erase_batch_sizes.push(uuids.len());
        if self.fail_next_erases > 0 {
            self.fail_next_erases -= 1;
            return Err(AnchorStoreError::EraseRejected {
                count: uuids.len(),
            });
        }
        for uuid in uuids {
            self.persisted.remove(uuid);
        }
        Ok(())
    }

    fn load_unbound(&mut self, uuids: &[Uuid]) -> Result<Vec<UnboundAnchor>, AnchorStoreError> {
        self.load_batch_sizes.push(uuids.len());
        if self.fail_next_loads > 0 {
            self.fail_next_loads -= 1;
            return Err(AnchorStoreError::LoadRejected {
                count: uuids.len(),
            });
        }
        Ok(uuids
            .iter()
            .filter(|uuid| self.persisted.contains_key(uuid))
            .map(|uuid| UnboundAnchor { uuid: *uuid })
            .collect())
    }

    fn localize(&mut self, anchor: UnboundAnchor) {
        self.localize_queue
            .push((anchor.uuid, self.localize_delay_ticks));
    }

    fn poll_localized(&mut self) -> Vec<LocalizeOutcome> {
        std::mem::take(&mut self.completed)
    }

    fn tick(&mut self) {
        for anchor in self.runtime.values_mut() {
            anchor.remaining_ticks = anchor.remaining_ticks.saturating_sub(1);
        }

        let mut still_waiting = Vec::with_capacity(self.localize_queue.len());
        for (uuid, remaining) in std::mem::take(&mut self.localize_queue) {
            if remaining > 0 {
                still_waiting.push((uuid, remaining - 1));
                continue;
            }
            let pose = if self.fail_localize.contains(&uuid) {
                None
            } else {
                self.persisted.get(&uuid).copied()
            };
            if let Some(pose) = pose {
                self.runtime.insert(
                    uuid,
                    RuntimeAnchor {
                        pose,
                        remaining_ticks: 0,
                    },
                );
            }
            self.completed.push(LocalizeOutcome { uuid, pose });
        }
        self.localize_queue = still_waiting;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec3;

    #[test]
    fn created_anchor_localizes_after_delay() {
        let mut store = InMemoryAnchorStore::new().with_create_localize_delay(2);
        let uuid = store.create_anchor(Pose::at(Vec3::ZERO));
        assert_eq!(store.anchor_state(uuid), AnchorState::Pending);
        store.tick();
        store.tick();
        assert_eq!(store.anchor_state(uuid), AnchorState::Localized);
    }

    #[test]
    fn save_requires_runtime_anchor() {
        let mut store = InMemoryAnchorStore::new();
        let missing = Uuid::new_v4();
        assert!(store.save_anchor(missing).is_err());

        let uuid = store.create_anchor(Pose::at(Vec3::ZERO));
        assert!(store.save_anchor(uuid).is_ok());
        assert!(store.contains_persisted(uuid));
    }

    #[test]
    fn erase_is_idempotent_on_missing_ids() {
        let mut store = InMemoryAnchorStore::new();
        let uuid = store.create_anchor(Pose::at(Vec3::ZERO));
        store.save_anchor(uuid).expect("save");
        assert!(store.erase_anchors(&[uuid]).is_ok());
        assert!(store.erase_anchors(&[uuid]).is_ok());
        assert_eq!(store.persisted_count(), 0);
    }

    #[test]
    fn localization_completes_through_poll() {
        let mut store = InMemoryAnchorStore::new().with_localize_delay(1);
        let uuid = store.create_anchor(Pose::at(Vec3::new(1.0, 0.0, 2.0)));
        store.save_anchor(uuid).expect("save");
        store.discard_anchor(uuid);

        let unbound = store.load_unbound(&[uuid]).expect("load");
        assert_eq!(unbound.len(), 1);
        store.localize(unbound[0]);

        assert!(store.poll_localized().is_empty());
        store.tick();
        store.tick();
        let outcomes = store.poll_localized();
        assert_eq!(outcomes.len(), 1);
        let pose = outcomes[0].pose.expect("pose");
        assert!((pose.position.x - 1.0).abs() < 0.0001);
    }

    #[test]
    fn injected_localization_failure_yields_no_pose() {
        let mut store = InMemoryAnchorStore::new();
        let uuid = store.create_anchor(Pose::at(Vec3::ZERO));
        store.save_anchor(uuid).expect("save");
        store.discard_anchor(uuid);
        store.fail_localization_of(uuid);

        store.localize(UnboundAnchor { uuid });
        store.tick();
        let outcomes = store.poll_localized();
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].pose.is_none());
    }
}
