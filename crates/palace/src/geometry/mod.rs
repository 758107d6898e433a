use serde::{Deserialize, Serialize};

mod placement;

pub use placement::{
    bounds_outside_volume, find_floor_placement, find_table_placement, positions_are_far,
    Placement, PlacementQuery, UserPose, MIN_SEPARATION_DISTANCE,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const FORWARD: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 1.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn distance(self, other: Vec3) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn scaled(self, factor: f32) -> Vec3 {
        Vec3 {
            x: self.x * factor,
            y: self.y * factor,
            z: self.z * factor,
        }
    }

    pub fn normalized_or(self, fallback: Vec3) -> Vec3 {
        let len = self.length();
        if len <= f32::EPSILON {
            return fallback;
        }
        self.scaled(len.recip())
    }

    pub fn with_y(self, y: f32) -> Vec3 {
        Vec3 { y, ..self }
    }

    /// Flattens to the horizontal plane, yielding the fallback when the
    /// projection degenerates (user looking straight up or down).
    pub fn flattened_or(self, fallback: Vec3) -> Vec3 {
        Vec3 {
            x: self.x,
            y: 0.0,
            z: self.z,
        }
        .normalized_or(fallback)
    }

    pub fn rotated_y(self, radians: f32) -> Vec3 {
        let (sin, cos) = radians.sin_cos();
        Vec3 {
            x: self.x * cos + self.z * sin,
            y: self.y,
            z: -self.x * sin + self.z * cos,
        }
    }
}

impl std::ops::Add for Vec3 {
    type Output = Vec3;

    fn add(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.x + other.x,
            y: self.y + other.y,
            z: self.z + other.z,
        }
    }
}

impl std::ops::Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, other: Vec3) -> Vec3 {
        Vec3 {
            x: self.x - other.x,
            y: self.y - other.y,
            z: self.z - other.z,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Quat = Quat {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn from_yaw(radians: f32) -> Self {
        let half = radians * 0.5;
        Quat {
            x: 0.0,
            y: half.sin(),
            z: 0.0,
            w: half.cos(),
        }
    }

    pub fn from_pitch(radians: f32) -> Self {
        let half = radians * 0.5;
        Quat {
            x: half.sin(),
            y: 0.0,
            z: 0.0,
            w: half.cos(),
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    pub fn from_array(values: [f32; 4]) -> Self {
        Quat {
            x: values[0],
            y: values[1],
            z: values[2],
            w: values[3],
        }
    }
}

impl std::ops::Mul for Quat {
    type Output = Quat;

    fn mul(self, rhs: Quat) -> Quat {
        Quat {
            x: self.w * rhs.x + self.x * rhs.w + self.y * rhs.z - self.z * rhs.y,
            y: self.w * rhs.y - self.x * rhs.z + self.y * rhs.w + self.z * rhs.x,
            z: self.w * rhs.z + self.x * rhs.y - self.y * rhs.x + self.z * rhs.w,
            w: self.w * rhs.w - self.x * rhs.x - self.y * rhs.y - self.z * rhs.z,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center_size(center: Vec3, size: Vec3) -> Self {
        let half = size.scaled(0.5);
        Aabb {
            min: center - half,
            max: center + half,
        }
    }

    pub fn center(&self) -> Vec3 {
        Vec3 {
            x: (self.min.x + self.max.x) * 0.5,
            y: (self.min.y + self.max.y) * 0.5,
            z: (self.min.z + self.max.z) * 0.5,
        }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn contains(&self, point: Vec3) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
            && point.z >= self.min.z
            && point.z <= self.max.z
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn corners(&self) -> [Vec3; 8] {
        let min = self.min;
        let max = self.max;
        [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ]
    }
}

pub fn center_of(points: &[Vec3]) -> Vec3 {
    if points.is_empty() {
        return Vec3::ZERO;
    }
    let mut sum = Vec3::ZERO;
    for point in points {
        sum = sum + *point;
    }
    sum.scaled((points.len() as f32).recip())
}

/// Counterclockwise angle of a point around a center, in [0, 360) degrees on
/// the horizontal plane.
pub fn angle_from_center(position: Vec3, center: Vec3) -> f32 {
    let direction = position - center;
    let angle = direction.z.atan2(direction.x).to_degrees();
    (angle + 360.0) % 360.0
}

/// Shoelace formula over the XZ projection of a closed floor outline.
pub fn polygon_area(outline: &[Vec3]) -> f32 {
    if outline.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0f32;
    for i in 0..outline.len() {
        let current = outline[i];
        let next = outline[(i + 1) % outline.len()];
        sum += current.x * next.z - current.z * next.x;
    }
    sum.abs() * 0.5
}

/// Even-odd point-in-polygon test on the XZ projection; the y coordinate is
/// ignored because rooms are keyed by their floor outline.
pub fn point_in_polygon(point: Vec3, outline: &[Vec3]) -> bool {
    if outline.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = outline.len() - 1;
    for i in 0..outline.len() {
        let a = outline[i];
        let b = outline[j];
        let crosses = (a.z > point.z) != (b.z > point.z);
        if crosses {
            let intersect_x = (b.x - a.x) * (point.z - a.z) / (b.z - a.z) + a.x;
            if point.x < intersect_x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_outline(half: f32) -> Vec<Vec3> {
        vec![
            Vec3::new(-half, 0.0, -half),
            Vec3::new(half, 0.0, -half),
            Vec3::new(half, 0.0, half),
            Vec3::new(-half, 0.0, half),
        ]
    }

    #[test]
    fn polygon_area_of_unit_square() {
        let area = polygon_area(&square_outline(0.5));
        assert!((area - 1.0).abs() < 0.0001);
    }

    #[test]
    fn polygon_area_of_degenerate_outline_is_zero() {
        let outline = vec![Vec3::ZERO, Vec3::new(1.0, 0.0, 0.0)];
        assert_eq!(polygon_area(&outline), 0.0);
    }

    #[test]
    fn point_in_polygon_inside_and_outside() {
        let outline = square_outline(2.0);
        assert!(point_in_polygon(Vec3::new(0.5, 0.0, 0.5), &outline));
        assert!(point_in_polygon(Vec3::new(-1.9, 3.0, 1.9), &outline));
        assert!(!point_in_polygon(Vec3::new(2.5, 0.0, 0.0), &outline));
        assert!(!point_in_polygon(Vec3::new(0.0, 0.0, -2.5), &outline));
    }

    #[test]
    fn rotated_y_quarter_turn_maps_forward_to_side() {
        let rotated = Vec3::FORWARD.rotated_y(std::f32::consts::FRAC_PI_2);
        assert!((rotated.x - 1.0).abs() < 0.0001);
        assert!(rotated.z.abs() < 0.0001);
    }

    #[test]
    fn aabb_corner_count_and_contains() {
        let bounds = Aabb::from_center_size(Vec3::ZERO, Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(bounds.corners().len(), 8);
        assert!(bounds.contains(Vec3::new(0.9, -0.9, 0.0)));
        assert!(!bounds.contains(Vec3::new(1.1, 0.0, 0.0)));
    }

    #[test]
    fn aabb_intersection_is_symmetric() {
        let a = Aabb::from_center_size(Vec3::ZERO, Vec3::new(2.0, 2.0, 2.0));
        let b = Aabb::from_center_size(Vec3::new(1.5, 0.0, 0.0), Vec3::new(2.0, 2.0, 2.0));
        let c = Aabb::from_center_size(Vec3::new(5.0, 0.0, 0.0), Vec3::new(2.0, 2.0, 2.0));
        assert!(a.intersects(&b) && b.intersects(&a));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn angle_from_center_is_counterclockwise_degrees() {
        let center = Vec3::ZERO;
        assert!((angle_from_center(Vec3::new(1.0, 0.0, 0.0), center) - 0.0).abs() < 0.001);
        assert!((angle_from_center(Vec3::new(0.0, 0.0, 1.0), center) - 90.0).abs() < 0.001);
        assert!((angle_from_center(Vec3::new(-1.0, 0.0, 0.0), center) - 180.0).abs() < 0.001);
    }

    #[test]
    fn quat_yaw_round_trips_through_array() {
        let quat = Quat::from_yaw(1.25);
        let restored = Quat::from_array(quat.to_array());
        assert_eq!(quat, restored);
    }

    #[test]
    fn center_of_points_is_mean() {
        let center = center_of(&[Vec3::new(0.0, 0.0, 0.0), Vec3::new(2.0, 0.0, 4.0)]);
        assert!((center.x - 1.0).abs() < 0.0001);
        assert!((center.z - 2.0).abs() < 0.0001);
    }
}
