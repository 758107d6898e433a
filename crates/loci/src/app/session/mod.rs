use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use palace::anchors::{AnchorStore, BoundObject, ObjectKind};
use palace::geometry::{
    find_floor_placement, find_table_placement, positions_are_far, PlacementQuery, Quat, UserPose,
    Vec3,
};
use palace::persist::{ExperienceData, PersistenceGateway};
use palace::registry::{ConceptId, ConceptKind, ConceptSeed, MagnetId, ObjectRegistry};
use palace::room::RoomLayout;
use palace::AnchorBinder;

const MAIN_PHASE_SECONDS: f32 = 80.0;
const FINAL_COUNTDOWN_FACTOR: f32 = 60.0 / 5.0;
const WRONG_PLACEMENT_DETACH_SECONDS: f32 = 1.3;
const REANCHOR_AFTER_SCATTER_SECONDS: f32 = 0.5;
const DIALOG_AUTO_DISMISS_SECONDS: f32 = 10.0;
const IDLE_PENALTY_WINDOW_SECONDS: f32 = 3.0;
const IDLE_SPIN_DEGREES_PER_SECOND: f32 = 60.0;
const MAGNET_SPAWN_LIFT: f32 = 0.3;
const CONCEPT_SPAWN_LIFT: f32 = 0.2;
const SCORE_PER_RELEASED_MAGNET: i32 = 5;
const WRONG_PLACEMENT_PENALTY: i32 = 5;
const WRONG_PLACEMENT_STREAK_PENALTY: u32 = 2;
const STREAK_RELEASE_STEP: u32 = 4;
const ROTATE_STEP_DEGREES: f32 = 20.0;
const STANDINGS_PAGE_SIZE: usize = 6;
const STANDINGS_NAME_LIMIT: usize = 20;
const GAME_TIME_SOFTNESS: f32 = 2.0;
const GAME_TIME_DISTANCE_REFERENCE: f32 = 1.5;
const GAME_TIME_DISTANCE_BASE: f32 = 1.0;
const GAME_TIME_DISTANCE_SENSITIVITY: f32 = 0.3;
const GAME_TIME_COUNT_REFERENCE: f32 = 6.0;
const GAME_TIME_COUNT_BASE: f32 = 3.0;
const GAME_TIME_COUNT_SENSITIVITY: f32 = 0.3;

include!("types.rs");
include!("timers.rs");
include!("state.rs");
include!("phases.rs");
include!("playing.rs");
include!("util.rs");

#[cfg(test)]
mod tests {
    include!("tests.rs");
}
