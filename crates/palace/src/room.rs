use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info};

use crate::geometry::{point_in_polygon, polygon_area, Aabb, Vec3};

#[derive(Debug, Clone, PartialEq)]
pub struct FurnitureVolume {
    pub label: String,
    pub bounds: Aabb,
}

/// Snapshot of one scanned room: its floor outline and the furniture
/// volumes the scan recognized. Placement queries run against this.
#[derive(Debug, Clone)]
pub struct RoomLayout {
    outline: Vec<Vec3>,
    furniture: Vec<FurnitureVolume>,
    room_code: String,
    area: f32,
}

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("room outline needs at least 3 vertices, got {vertex_count}")]
    DegenerateOutline { vertex_count: usize },
}

impl RoomLayout {
    pub fn from_scan(
        outline: Vec<Vec3>,
        furniture: Vec<FurnitureVolume>,
    ) -> Result<Self, RoomError> {
        if outline.len() < 3 {
            return Err(RoomError::DegenerateOutline {
                vertex_count: outline.len(),
            });
        }

        let area = polygon_area(&outline);
        let room_code = derive_room_code(&outline);
        info!(room_code = %room_code, area, furniture = furniture.len(), "room layout ready");

        Ok(Self {
            outline,
            furniture,
            room_code,
            area,
        })
    }

    /// Stable identifier for this physical room, derived from the scanned
    /// outline so the same room re-keys to the same experiences across runs.
    pub fn room_code(&self) -> &str {
        &self.room_code
    }

    pub fn area(&self) -> f32 {
        self.area
    }

    pub fn outline(&self) -> &[Vec3] {
        &self.outline
    }

    pub fn furniture(&self) -> &[FurnitureVolume] {
        &self.furniture
    }

    pub fn is_position_in_room(&self, position: Vec3) -> bool {
        point_in_polygon(position, &self.outline)
    }

    pub fn is_bounds_in_room(&self, bounds: &Aabb) -> bool {
        for corner in bounds.corners() {
            if !point_in_polygon(corner, &self.outline) {
                debug!("bounds corner outside the room outline");
                return false;
            }
        }
        true
    }
}

fn derive_room_code(outline: &[Vec3]) -> String {
    let mut hasher = Sha256::new();
    for vertex in outline {
        hasher.update(vertex.x.to_le_bytes());
        hasher.update(vertex.y.to_le_bytes());
        hasher.update(vertex.z.to_le_bytes());
    }
    let digest = hasher.finalize();
    let mut code = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        code.push_str(&format!("{byte:02x}"));
    }
    code
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rectangle(width: f32, depth: f32) -> Vec<Vec3> {
        vec![
            Vec3::new(-width / 2.0, 0.0, -depth / 2.0),
            Vec3::new(width / 2.0, 0.0, -depth / 2.0),
            Vec3::new(width / 2.0, 0.0, depth / 2.0),
            Vec3::new(-width / 2.0, 0.0, depth / 2.0),
        ]
    }

    #[test]
    fn area_matches_rectangle() {
        let room = RoomLayout::from_scan(rectangle(4.0, 3.0), Vec::new()).expect("room");
        assert!((room.area() - 12.0).abs() < 0.001);
    }

    #[test]
    fn degenerate_outline_is_rejected() {
        let result = RoomLayout::from_scan(vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)], Vec::new());
        assert!(matches!(
            result,
            Err(RoomError::DegenerateOutline { vertex_count: 2 })
        ));
    }

    #[test]
    fn room_code_is_stable_for_same_outline() {
        let a = RoomLayout::from_scan(rectangle(4.0, 3.0), Vec::new()).expect("room");
        let b = RoomLayout::from_scan(rectangle(4.0, 3.0), Vec::new()).expect("room");
        let c = RoomLayout::from_scan(rectangle(5.0, 3.0), Vec::new()).expect("room");
        assert_eq!(a.room_code(), b.room_code());
        assert_ne!(a.room_code(), c.room_code());
        assert_eq!(a.room_code().len(), 16);
    }

    #[test]
    fn bounds_in_room_checks_all_corners() {
        let room = RoomLayout::from_scan(rectangle(4.0, 4.0), Vec::new()).expect("room");
        let inside = Aabb::from_center_size(Vec3::ZERO, Vec3::new(1.0, 1.0, 1.0));
        let straddling =
            Aabb::from_center_size(Vec3::new(1.8, 0.0, 0.0), Vec3::new(1.0, 1.0, 1.0));
        assert!(room.is_bounds_in_room(&inside));
        assert!(!room.is_bounds_in_room(&straddling));
    }
}
