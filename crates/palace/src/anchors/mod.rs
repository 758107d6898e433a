use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::geometry::{Quat, Vec3};

mod adapter;
mod store;

pub use adapter::{
    AnchorBinder, BoundObject, MaterializedObject, ERASE_BATCH_LIMIT, LOAD_BATCH_LIMIT,
    SAVE_LOCALIZE_TIMEOUT_SECONDS,
};
pub use store::{AnchorState, AnchorStore, InMemoryAnchorStore, LocalizeOutcome, UnboundAnchor};

/// What kind of scene object a persisted anchor record belongs to. The id
/// disambiguates concepts, which all share one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    Magnet,
    Concept,
    Table,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorDescriptor {
    pub object_kind: ObjectKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub concept_id: Option<String>,
}

impl AnchorDescriptor {
    pub fn magnet() -> Self {
        Self {
            object_kind: ObjectKind::Magnet,
            concept_id: None,
        }
    }

    pub fn table() -> Self {
        Self {
            object_kind: ObjectKind::Table,
            concept_id: None,
        }
    }

    pub fn concept(id: impl Into<String>) -> Self {
        Self {
            object_kind: ObjectKind::Concept,
            concept_id: Some(id.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Pose {
    pub fn at(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
        }
    }
}

#[derive(Debug, Error)]
pub enum AnchorStoreError {
    #[error("store rejected save of anchor {uuid}")]
    SaveRejected { uuid: Uuid },
    #[error("store rejected erase of {count} anchors")]
    EraseRejected { count: usize },
    #[error("store rejected load of {count} anchors")]
    LoadRejected { count: usize },
    #[error("anchor {uuid} is not a live runtime anchor")]
    UnknownAnchor { uuid: Uuid },
}
