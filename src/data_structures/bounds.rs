//! Axis aligned bounding boxes used to frame the camera around a model.

use cgmath::{EuclideanSpace, Matrix4, Point3, Transform, Vector3};

/// An axis aligned bounding box.
///
/// A freshly created box is *empty* (min at +inf, max at -inf) so that
/// extending it with the first point yields a zero sized box at that point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Point3<f32>,
    pub max: Point3<f32>,
}

impl Aabb {
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f32::INFINITY, f32::INFINITY, f32::INFINITY),
            max: Point3::new(f32::NEG_INFINITY, f32::NEG_INFINITY, f32::NEG_INFINITY),
        }
    }

    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Point3<f32>>,
    {
        points.into_iter().fold(Self::empty(), |mut aabb, p| {
            aabb.extend(p);
            aabb
        })
    }

    pub fn is_empty(&self) -> bool {
        self.max.x < self.min.x || self.max.y < self.min.y || self.max.z < self.min.z
    }

    pub fn extend(&mut self, p: Point3<f32>) {
        self.min = Point3::new(self.min.x.min(p.x), self.min.y.min(p.y), self.min.z.min(p.z));
        self.max = Point3::new(self.max.x.max(p.x), self.max.y.max(p.y), self.max.z.max(p.z));
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        if other.is_empty() {
            return *self;
        }
        let mut out = *self;
        out.extend(other.min);
        out.extend(other.max);
        out
    }

    pub fn corners(&self) -> [Point3<f32>; 8] {
        let (a, b) = (self.min, self.max);
        [
            Point3::new(a.x, a.y, a.z),
            Point3::new(b.x, a.y, a.z),
            Point3::new(a.x, b.y, a.z),
            Point3::new(b.x, b.y, a.z),
            Point3::new(a.x, a.y, b.z),
            Point3::new(b.x, a.y, b.z),
            Point3::new(a.x, b.y, b.z),
            Point3::new(b.x, b.y, b.z),
        ]
    }

    /// Box enclosing all eight corners after applying `matrix`.
    pub fn transformed(&self, matrix: &Matrix4<f32>) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        Aabb::from_points(self.corners().into_iter().map(|c| matrix.transform_point(c)))
    }

    pub fn center(&self) -> Point3<f32> {
        self.min.midpoint(self.max)
    }

    pub fn size(&self) -> Vector3<f32> {
        if self.is_empty() {
            return Vector3::new(0.0, 0.0, 0.0);
        }
        self.max - self.min
    }

    pub fn max_dimension(&self) -> f32 {
        let size = self.size();
        size.x.max(size.y).max(size.z)
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use cgmath::{Deg, Matrix4};

    use super::*;

    #[test]
    fn new_box_is_empty_and_has_no_size() {
        let aabb = Aabb::empty();
        assert!(aabb.is_empty());
        assert_eq!(aabb.size(), Vector3::new(0.0, 0.0, 0.0));
        assert_eq!(aabb.max_dimension(), 0.0);
    }

    #[test]
    fn single_point_gives_degenerate_but_non_empty_box() {
        let aabb = Aabb::from_points([Point3::new(1.0, 2.0, 3.0)]);
        assert!(!aabb.is_empty());
        assert_eq!(aabb.center(), Point3::new(1.0, 2.0, 3.0));
        assert_eq!(aabb.max_dimension(), 0.0);
    }

    #[test]
    fn center_and_size_of_door_shaped_box() {
        let aabb = Aabb::from_points([Point3::new(-0.5, 0.0, -0.05), Point3::new(0.5, 2.0, 0.05)]);
        assert_eq!(aabb.center(), Point3::new(0.0, 1.0, 0.0));
        let size = aabb.size();
        assert!((size.x - 1.0).abs() < 1e-6);
        assert!((size.y - 2.0).abs() < 1e-6);
        assert_eq!(aabb.max_dimension(), 2.0);
    }

    #[test]
    fn union_ignores_empty_boxes() {
        let a = Aabb::from_points([Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)]);
        assert_eq!(a.union(&Aabb::empty()), a);
        assert_eq!(Aabb::empty().union(&a), a);

        let b = Aabb::from_points([Point3::new(-2.0, 0.5, 0.5)]);
        let both = a.union(&b);
        assert_eq!(both.min, Point3::new(-2.0, 0.0, 0.0));
        assert_eq!(both.max, Point3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn rotated_box_grows_to_enclose_corners() {
        let unit = Aabb::from_points([Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0)]);
        let rotated = unit.transformed(&Matrix4::from_angle_y(Deg(45.0)));
        let half_diagonal = 2.0_f32.sqrt();
        assert!((rotated.max.x - half_diagonal).abs() < 1e-5);
        assert!((rotated.max.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn translated_box_moves_center() {
        let unit = Aabb::from_points([Point3::new(0.0, 0.0, 0.0), Point3::new(1.0, 1.0, 1.0)]);
        let moved = unit.transformed(&Matrix4::from_translation([5.0, 0.0, 0.0].into()));
        assert_eq!(moved.center(), Point3::new(5.5, 0.5, 0.5));
    }
}
