use std::env;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::info;
use tracing_subscriber::EnvFilter;

use palace::anchors::InMemoryAnchorStore;
use palace::geometry::{Aabb, UserPose, Vec3};
use palace::persist::{ExperienceArchive, FileGateway};
use palace::registry::{ConceptId, ConceptKind, ConceptSeed};
use palace::room::{FurnitureVolume, RoomLayout};

use super::session::{Session, SessionConfig};

const DATA_DIR_ENV_VAR: &str = "LOCI_DATA_DIR";
const USER_ID_ENV_VAR: &str = "LOCI_USER_ID";
const USER_NAME_ENV_VAR: &str = "LOCI_USER_NAME";
const EXPERIENCE_ID_ENV_VAR: &str = "LOCI_EXPERIENCE_ID";
const EXPERIENCES_FILE: &str = "loci_experiences.json";
const STANDINGS_FILE: &str = "standings.json";

pub(crate) struct SessionWiring {
    pub(crate) session: Session,
    pub(crate) store: InMemoryAnchorStore,
    pub(crate) gateway: FileGateway,
    pub(crate) user: UserPose,
}

/// Thin wiring over file I/O and JSON: resolves the data directory, loads
/// the experiences archive and standings, snapshots the (demo) room scan and
/// concept catalog, and hands everything to the session. The room scan and
/// catalog would come from the device and the content server in production.
pub(crate) fn build_session() -> Result<SessionWiring, String> {
    init_tracing();
    info!("=== Loci Startup ===");

    let data_dir = resolve_data_dir();
    let archive = ExperienceArchive::load(data_dir.join(EXPERIENCES_FILE))
        .map_err(|error| format!("load experiences: {error}"))?;
    let experiences = archive.experiences().clone();
    let mut gateway = FileGateway::new(archive, data_dir.join(STANDINGS_FILE));

    let room = demo_room_scan().map_err(|error| format!("room scan: {error}"))?;
    let user = UserPose {
        position: Vec3::new(0.0, 1.6, 0.0),
        forward: Vec3::FORWARD,
    };
    if !room.is_position_in_room(user.position) {
        return Err(
            "you are not in a scanned room, please scan the room before using the app".to_string(),
        );
    }
    if room.area() == 0.0 {
        return Err("the scanned room has no measured area, redo the space setup".to_string());
    }

    let config = SessionConfig {
        user_id: env::var(USER_ID_ENV_VAR).unwrap_or_else(|_| "UserID".to_string()),
        user_name: env::var(USER_NAME_ENV_VAR).unwrap_or_else(|_| "guest".to_string()),
        experience_id: env::var(EXPERIENCE_ID_ENV_VAR)
            .unwrap_or_else(|_| "ExperienceID".to_string()),
        rng_seed: entropy_seed(),
    };

    let mut store = InMemoryAnchorStore::new();
    let session = Session::begin(
        config,
        room,
        demo_catalog(),
        &experiences,
        &mut store,
        &mut gateway,
    );

    Ok(SessionWiring {
        session,
        store,
        gateway,
        user,
    })
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
}

fn resolve_data_dir() -> PathBuf {
    env::var(DATA_DIR_ENV_VAR)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("saving"))
}

fn entropy_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_nanos() as u64)
        .unwrap_or(0)
}

fn demo_room_scan() -> Result<RoomLayout, palace::room::RoomError> {
    RoomLayout::from_scan(
        vec![
            Vec3::new(-3.0, 0.0, -3.0),
            Vec3::new(3.0, 0.0, -3.0),
            Vec3::new(3.0, 0.0, 3.0),
            Vec3::new(-3.0, 0.0, 3.0),
        ],
        vec![FurnitureVolume {
            label: "COUCH".to_string(),
            bounds: Aabb::from_center_size(
                Vec3::new(-2.2, 0.4, 0.0),
                Vec3::new(1.2, 0.8, 2.0),
            ),
        }],
    )
}

fn demo_catalog() -> Vec<ConceptSeed> {
    vec![
        ConceptSeed {
            id: ConceptId::from("1"),
            kind: ConceptKind::Object3d,
        },
        ConceptSeed {
            id: ConceptId::from("2"),
            kind: ConceptKind::Image,
        },
        ConceptSeed {
            id: ConceptId::from("3"),
            kind: ConceptKind::Image,
        },
        ConceptSeed {
            id: ConceptId::from("4"),
            kind: ConceptKind::Video,
        },
        ConceptSeed {
            id: ConceptId::from("5"),
            kind: ConceptKind::Object3d,
        },
    ]
}
