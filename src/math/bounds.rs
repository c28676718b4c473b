use glam::{Mat4, Vec3};

/// Axis-aligned bounding box.
///
/// An *empty* box has `minimum > maximum` on every axis; including any point
/// into it yields a degenerate box around that point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds3 {
    pub minimum: Vec3,
    pub maximum: Vec3,
}

impl Bounds3 {
    /// Creates a box from explicit corners.
    #[inline]
    #[must_use]
    pub const fn new(minimum: Vec3, maximum: Vec3) -> Self {
        Self { minimum, maximum }
    }

    /// The empty box, the identity element of [`Bounds3::include`].
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            minimum: Vec3::splat(f32::MAX),
            maximum: Vec3::splat(-f32::MAX),
        }
    }

    /// Builds the tightest box around a set of points.
    #[must_use]
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut bounds = Self::empty();
        for &p in points {
            bounds.include_point(p);
        }
        bounds
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.minimum.x > self.maximum.x
            || self.minimum.y > self.maximum.y
            || self.minimum.z > self.maximum.z
    }

    #[inline]
    pub fn include_point(&mut self, point: Vec3) {
        self.minimum = self.minimum.min(point);
        self.maximum = self.maximum.max(point);
    }

    /// Grows this box to also enclose `other`. Empty boxes are ignored.
    #[inline]
    pub fn include(&mut self, other: &Bounds3) {
        if other.is_empty() {
            return;
        }
        self.minimum = self.minimum.min(other.minimum);
        self.maximum = self.maximum.max(other.maximum);
    }

    #[inline]
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.minimum + self.maximum) * 0.5
    }

    /// Full edge lengths.
    #[inline]
    #[must_use]
    pub fn dimensions(&self) -> Vec3 {
        self.maximum - self.minimum
    }

    /// Half edge lengths.
    #[inline]
    #[must_use]
    pub fn extents(&self) -> Vec3 {
        self.dimensions() * 0.5
    }

    /// Product of the three extents. Used to compare how tightly two boxes fit.
    #[inline]
    #[must_use]
    pub fn extent_volume(&self) -> f32 {
        let e = self.extents();
        e.x * e.y * e.z
    }

    /// The 8 corner points.
    ///
    /// Order: min, (max.x, min.y, min.z), (min.x, max.y, min.z),
    /// (max.x, max.y, min.z), then the same four on the `max.z` plane, ending
    /// with max.
    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        let (lo, hi) = (self.minimum, self.maximum);
        [
            lo,
            Vec3::new(hi.x, lo.y, lo.z),
            Vec3::new(lo.x, hi.y, lo.z),
            Vec3::new(hi.x, hi.y, lo.z),
            Vec3::new(lo.x, lo.y, hi.z),
            Vec3::new(hi.x, lo.y, hi.z),
            Vec3::new(lo.x, hi.y, hi.z),
            hi,
        ]
    }

    /// Transforms the box by `matrix` and re-fits an axis-aligned box around
    /// the 8 transformed corners. Empty boxes stay empty.
    #[must_use]
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        if self.is_empty() {
            return *self;
        }

        let mut out = Self::empty();
        for corner in self.corners() {
            out.include_point(matrix.transform_point3(corner));
        }
        out
    }

    /// In-place variant of [`Bounds3::transformed`].
    #[inline]
    pub fn transform(&mut self, matrix: &Mat4) {
        *self = self.transformed(matrix);
    }
}

impl Default for Bounds3 {
    fn default() -> Self {
        Self::empty()
    }
}
