use glam::{Mat3, Mat4, Quat, Vec3};

use crate::math;
use crate::scene::transform::calculate_transform_matrix;

/// Pixel rectangle a camera renders into.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    /// Square viewport at the origin, as used for shadow maps.
    #[must_use]
    pub fn square(size: f32) -> Self {
        Self::new(0.0, 0.0, size, size)
    }

    /// Width over height. Degenerate heights yield 1.
    #[inline]
    #[must_use]
    pub fn aspect_ratio(&self) -> f32 {
        if self.height.abs() <= f32::EPSILON {
            1.0
        } else {
            self.width / self.height
        }
    }
}

/// A render camera.
///
/// Cameras here are not graph nodes: a view camera is placed with
/// [`Camera::look_at`] or [`Camera::set_global_transform`], and shadow cameras
/// are produced by the shadow fitter. Forward is the local -Z axis.
#[derive(Debug, Clone)]
pub struct Camera {
    pub position: Vec3,
    pub rotation: Quat,
    pub pivot: Vec3,

    // === Projection ===
    /// Field of view in radians. Vertical unless `fov_horizontal` is set.
    pub fov: f32,
    pub fov_horizontal: bool,
    pub clip_near: f32,
    pub clip_far: f32,
    pub orthographic: bool,

    // Cached matrices, written by `calculate_global_variables`.
    pub(crate) global_transform: Mat4,
    pub(crate) projection: Mat4,
}

impl Camera {
    #[must_use]
    pub fn new_perspective(fov_degrees: f32, clip_near: f32, clip_far: f32) -> Self {
        Self {
            fov: fov_degrees.to_radians(),
            clip_near,
            clip_far,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn new_orthographic(clip_near: f32, clip_far: f32) -> Self {
        Self {
            orthographic: true,
            clip_near,
            clip_far,
            ..Self::default()
        }
    }

    // ========================================================================
    // Placement
    // ========================================================================

    /// Places the camera at `eye` looking towards `target`.
    ///
    /// If `up` is parallel to the view direction, +X is used as the up hint
    /// instead. A zero-length direction keeps the current rotation.
    pub fn look_at(&mut self, eye: Vec3, up: Vec3, target: Vec3) {
        self.position = eye;

        let Some(forward) = (target - eye).try_normalize() else {
            return;
        };

        let mut right = forward.cross(up);
        if right.length_squared() < 1e-8 {
            right = forward.cross(Vec3::X);
        }
        let right = right.normalize();
        let new_up = right.cross(forward).normalize();

        let basis = Mat3::from_cols(right, new_up, -forward);
        self.rotation = Quat::from_mat3(&basis).normalize();
    }

    /// Overrides the world transform directly, e.g. from a graph node.
    /// Position and rotation are re-derived from it.
    pub fn set_global_transform(&mut self, transform: Mat4) {
        let (_, rotation, translation) = transform.to_scale_rotation_translation();
        self.position = translation;
        self.rotation = rotation;
        self.pivot = Vec3::ZERO;
        self.global_transform = transform;
    }

    // ========================================================================
    // Projection
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn aspect_ratio(&self, viewport: &Viewport) -> f32 {
        viewport.aspect_ratio()
    }

    /// Vertical field of view for `viewport`, converting a horizontal FOV if needed.
    #[must_use]
    pub fn vertical_fov(&self, viewport: &Viewport) -> f32 {
        if self.fov_horizontal {
            2.0 * ((self.fov * 0.5).tan() / viewport.aspect_ratio()).atan()
        } else {
            self.fov
        }
    }

    /// Rebuilds the world transform from position/rotation/pivot and the
    /// projection for `viewport`.
    ///
    /// Orthographic cameras map the viewport's half extents directly, so the
    /// viewport is a world-space size rather than a pixel size.
    pub fn calculate_global_variables(&mut self, viewport: &Viewport) {
        self.global_transform =
            calculate_transform_matrix(self.position, Vec3::ONE, self.pivot, self.rotation);
        self.projection = self.calculate_projection(viewport);
    }

    #[must_use]
    fn calculate_projection(&self, viewport: &Viewport) -> Mat4 {
        if self.orthographic {
            let half_width = viewport.width * 0.5;
            let half_height = viewport.height * 0.5;
            Mat4::orthographic_rh(
                -half_width,
                half_width,
                -half_height,
                half_height,
                self.clip_near,
                self.clip_far,
            )
        } else {
            Mat4::perspective_rh(
                self.vertical_fov(viewport),
                viewport.aspect_ratio(),
                self.clip_near,
                self.clip_far,
            )
        }
    }

    // ========================================================================
    // Getters
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn global_transform(&self) -> &Mat4 {
        &self.global_transform
    }

    #[inline]
    #[must_use]
    pub fn projection(&self) -> &Mat4 {
        &self.projection
    }

    #[inline]
    #[must_use]
    pub fn global_pos(&self) -> Vec3 {
        math::translation(&self.global_transform)
    }

    /// World-space forward direction (global -Z).
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        (-self.global_transform.z_axis.truncate()).normalize_or_zero()
    }

    /// World to view matrix.
    #[must_use]
    pub fn view(&self) -> Mat4 {
        self.global_transform.inverse()
    }

    #[must_use]
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view()
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            pivot: Vec3::ZERO,
            fov: 60.0_f32.to_radians(),
            fov_horizontal: false,
            clip_near: 0.1,
            clip_far: 1000.0,
            orthographic: false,
            global_transform: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}
