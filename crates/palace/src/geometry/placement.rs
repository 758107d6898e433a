use rand::Rng;
use tracing::{debug, warn};

use crate::geometry::{Aabb, Vec3};
use crate::room::RoomLayout;

pub const MIN_SEPARATION_DISTANCE: f32 = 0.5;

const SEMICIRCLE_TRIES: u32 = 10;
const SEMICIRCLE_RADIUS_MIN: f32 = 0.3;
const SEMICIRCLE_RADIUS_MAX: f32 = 1.0;
const SEMICIRCLE_ANGLE_DEGREES: f32 = 90.0;
const FLOOR_LIFT: f32 = 0.1;
const TABLE_LIFT: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UserPose {
    pub position: Vec3,
    pub forward: Vec3,
}

impl UserPose {
    pub fn forward_flat(&self) -> Vec3 {
        self.forward.flattened_or(Vec3::FORWARD)
    }
}

pub struct PlacementQuery<'a> {
    pub room: &'a RoomLayout,
    pub object_size: Vec3,
    pub keepout: &'a [Vec3],
    pub table_bounds: Option<Aabb>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    pub position: Vec3,
    pub exhausted: bool,
}

pub fn positions_are_far(a: Vec3, b: Vec3) -> bool {
    a.distance(b) >= MIN_SEPARATION_DISTANCE
}

/// A candidate bounding box is outside a furniture volume only when none of
/// its eight corners lie inside. Large objects may still clip a corner of
/// large furniture; accepted approximation.
pub fn bounds_outside_volume(bounds: &Aabb, volume: &Aabb) -> bool {
    bounds.corners().iter().all(|corner| !volume.contains(*corner))
}

fn sample_semicircle<R: Rng>(rng: &mut R, user: &UserPose, behind: bool) -> Vec3 {
    let base_angle = if behind { 180.0f32 } else { 0.0f32 };
    let angle = base_angle
        + rng.gen_range(-SEMICIRCLE_ANGLE_DEGREES..=SEMICIRCLE_ANGLE_DEGREES);
    let direction = user.forward_flat().rotated_y(angle.to_radians());
    let radius = rng.gen_range(SEMICIRCLE_RADIUS_MIN..=SEMICIRCLE_RADIUS_MAX);
    let offset = direction.scaled(radius);
    Vec3::new(user.position.x + offset.x, 0.0, user.position.z + offset.z)
}

fn floor_candidate_ok(position: Vec3, bounds: &Aabb, query: &PlacementQuery<'_>) -> bool {
    if !query.room.is_position_in_room(position) {
        debug!("placement candidate rejected: out of room outline");
        return false;
    }
    for occupied in query.keepout {
        if !positions_are_far(position, *occupied) {
            debug!("placement candidate rejected: too close to occupied point");
            return false;
        }
    }
    if let Some(table) = &query.table_bounds {
        if table.contains(position) || table.intersects(bounds) {
            debug!("placement candidate rejected: clips the table");
            return false;
        }
    }
    if !query.room.is_bounds_in_room(bounds) {
        debug!("placement candidate rejected: bounds leave the room");
        return false;
    }
    for furniture in query.room.furniture() {
        if !bounds_outside_volume(bounds, &furniture.bounds) {
            debug!(label = %furniture.label, "placement candidate rejected: inside furniture");
            return false;
        }
    }
    true
}

/// Rejection-samples a valid floor position: ten candidates from the
/// forward-facing semicircle, ten from the backward one, then a guaranteed
/// fallback at the user's feet raised to half object height. Never blocks.
pub fn find_floor_placement<R: Rng>(
    rng: &mut R,
    user: &UserPose,
    query: &PlacementQuery<'_>,
) -> Placement {
    let lift = query.object_size.y / 2.0 + FLOOR_LIFT;

    for behind in [false, true] {
        for _ in 0..SEMICIRCLE_TRIES {
            let candidate = sample_semicircle(rng, user, behind).with_y(lift);
            let bounds = Aabb::from_center_size(candidate, query.object_size);
            if floor_candidate_ok(candidate, &bounds, query) {
                debug!(behind, "floor placement found");
                return Placement {
                    position: candidate,
                    exhausted: false,
                };
            }
        }
    }

    warn!("floor placement exhausted its retry budget, falling back to the user position");
    Placement {
        position: user.position.with_y(lift),
        exhausted: true,
    }
}

/// Table placement uses the same semicircle cascade but only room and
/// furniture constraints apply; the accepted point is returned on the floor.
pub fn find_table_placement<R: Rng>(
    rng: &mut R,
    user: &UserPose,
    room: &RoomLayout,
    table_size: Vec3,
) -> Placement {
    for behind in [false, true] {
        for _ in 0..SEMICIRCLE_TRIES {
            let candidate = sample_semicircle(rng, user, behind).with_y(TABLE_LIFT);
            let bounds = Aabb::from_center_size(
                candidate + Vec3::new(0.0, table_size.y / 2.0, 0.0),
                table_size,
            );
            if !room.is_position_in_room(candidate) || !room.is_bounds_in_room(&bounds) {
                continue;
            }
            let clear = room
                .furniture()
                .iter()
                .all(|furniture| bounds_outside_volume(&bounds, &furniture.bounds));
            if clear {
                debug!(behind, "table placement found");
                return Placement {
                    position: candidate.with_y(0.0),
                    exhausted: false,
                };
            }
        }
    }

    warn!("table placement exhausted its retry budget, falling back to the user position");
    Placement {
        position: user.position.with_y(0.0),
        exhausted: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::room::FurnitureVolume;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn ten_by_ten_room() -> RoomLayout {
        RoomLayout::from_scan(
            vec![
                Vec3::new(-5.0, 0.0, -5.0),
                Vec3::new(5.0, 0.0, -5.0),
                Vec3::new(5.0, 0.0, 5.0),
                Vec3::new(-5.0, 0.0, 5.0),
            ],
            Vec::new(),
        )
        .expect("room")
    }

    fn centered_user() -> UserPose {
        UserPose {
            position: Vec3::ZERO,
            forward: Vec3::FORWARD,
        }
    }

    #[test]
    fn placement_never_lands_outside_room_or_near_table() {
        let room = ten_by_ten_room();
        let table_bounds =
            Aabb::from_center_size(Vec3::new(0.0, 0.25, 0.0), Vec3::new(1.0, 0.5, 1.0));
        let mut rng = StdRng::seed_from_u64(7);
        let query = PlacementQuery {
            room: &room,
            object_size: Vec3::new(0.2, 0.2, 0.2),
            keepout: &[],
            table_bounds: Some(table_bounds),
        };

        for _ in 0..100 {
            let placement = find_floor_placement(&mut rng, &centered_user(), &query);
            assert!(room.is_position_in_room(placement.position));
            assert!(!table_bounds.contains(placement.position));
        }
    }

    #[test]
    fn placement_respects_keepout_separation() {
        let room = ten_by_ten_room();
        let keepout = [Vec3::new(0.5, 0.0, 0.5), Vec3::new(-0.5, 0.0, -0.5)];
        let mut rng = StdRng::seed_from_u64(11);
        let query = PlacementQuery {
            room: &room,
            object_size: Vec3::new(0.2, 0.2, 0.2),
            keepout: &keepout,
            table_bounds: None,
        };

        for _ in 0..50 {
            let placement = find_floor_placement(&mut rng, &centered_user(), &query);
            if placement.exhausted {
                continue;
            }
            for occupied in keepout {
                assert!(positions_are_far(placement.position, occupied));
            }
        }
    }

    #[test]
    fn impossible_query_falls_back_to_user_position() {
        // A 1x1 room leaves no valid candidate at sample radius >= 0.3 once
        // the whole floor is covered by furniture.
        let room = RoomLayout::from_scan(
            vec![
                Vec3::new(-0.5, 0.0, -0.5),
                Vec3::new(0.5, 0.0, -0.5),
                Vec3::new(0.5, 0.0, 0.5),
                Vec3::new(-0.5, 0.0, 0.5),
            ],
            vec![FurnitureVolume {
                label: "COUCH".to_string(),
                bounds: Aabb::from_center_size(Vec3::ZERO, Vec3::new(2.0, 2.0, 2.0)),
            }],
        )
        .expect("room");
        let mut rng = StdRng::seed_from_u64(3);
        let query = PlacementQuery {
            room: &room,
            object_size: Vec3::new(0.4, 0.4, 0.4),
            keepout: &[],
            table_bounds: None,
        };

        let placement = find_floor_placement(&mut rng, &centered_user(), &query);
        assert!(placement.exhausted);
        assert!((placement.position.x - 0.0).abs() < 0.0001);
        assert!((placement.position.y - 0.3).abs() < 0.0001);
    }

    #[test]
    fn degenerate_forward_still_samples() {
        let room = ten_by_ten_room();
        let user = UserPose {
            position: Vec3::ZERO,
            forward: Vec3::new(0.0, -1.0, 0.0),
        };
        let mut rng = StdRng::seed_from_u64(5);
        let query = PlacementQuery {
            room: &room,
            object_size: Vec3::new(0.2, 0.2, 0.2),
            keepout: &[],
            table_bounds: None,
        };

        let placement = find_floor_placement(&mut rng, &user, &query);
        assert!(!placement.exhausted);
    }

    #[test]
    fn table_placement_lands_on_floor_inside_room() {
        let room = ten_by_ten_room();
        let mut rng = StdRng::seed_from_u64(9);
        let placement =
            find_table_placement(&mut rng, &centered_user(), &room, Vec3::new(1.0, 0.5, 1.0));
        assert!(!placement.exhausted);
        assert!(room.is_position_in_room(placement.position));
        assert_eq!(placement.position.y, 0.0);
    }

    #[test]
    fn bounds_outside_volume_requires_all_corners_clear() {
        let volume = Aabb::from_center_size(Vec3::ZERO, Vec3::new(2.0, 2.0, 2.0));
        let clipping =
            Aabb::from_center_size(Vec3::new(1.0, 0.0, 0.0), Vec3::new(0.5, 0.5, 0.5));
        let clear = Aabb::from_center_size(Vec3::new(3.0, 0.0, 0.0), Vec3::new(0.5, 0.5, 0.5));
        assert!(!bounds_outside_volume(&clipping, &volume));
        assert!(bounds_outside_volume(&clear, &volume));
    }
}
