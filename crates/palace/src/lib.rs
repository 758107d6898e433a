pub mod anchors;
pub mod geometry;
pub mod persist;
pub mod registry;
pub mod room;

pub use anchors::{
    AnchorBinder, AnchorDescriptor, AnchorState, AnchorStore, AnchorStoreError, BoundObject,
    InMemoryAnchorStore, LocalizeOutcome, MaterializedObject, ObjectKind, Pose, UnboundAnchor,
    ERASE_BATCH_LIMIT, LOAD_BATCH_LIMIT, SAVE_LOCALIZE_TIMEOUT_SECONDS,
};
pub use geometry::{
    angle_from_center, bounds_outside_volume, center_of, find_floor_placement,
    find_table_placement, point_in_polygon, polygon_area, positions_are_far, Aabb, Placement,
    PlacementQuery, Quat, UserPose, Vec3, MIN_SEPARATION_DISTANCE,
};
pub use persist::{
    load_standings, save_standings, ExperienceArchive, ExperienceData, FileGateway,
    MemoryGateway, PersistError, PersistenceGateway,
};
pub use registry::{
    ConceptEntity, ConceptId, ConceptKind, ConceptSeed, Magnet, MagnetId, ObjectRegistry, Table,
};
pub use room::{FurnitureVolume, RoomError, RoomLayout};
