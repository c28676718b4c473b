//! Shadow Utilities
//!
//! Pure camera-fitting functions used while preparing shadow passes.
//!
//! # Provided Functions
//!
//! - View frustum corners in world space
//! - Light-oriented bounding boxes of point sets
//! - Orthographic (directional) and perspective (spot/area/point) shadow cameras
//! - The six cube-face cameras of an omnidirectional shadow

use glam::{Mat3, Quat, Vec3};

use crate::math::{self, Bounds3};
use crate::scene::camera::{Camera, Viewport};
use crate::scene::light::{Light, LightKind};

/// Smallest half extent of a fitted orthographic box. Keeps degenerate
/// scenes (a single point, a flat plane) from producing a zero-sized viewport.
pub const MIN_SHADOW_EXTENT: f32 = 1e-3;

/// Field of view of every perspective shadow camera.
pub const SHADOW_CAMERA_FOV_DEGREES: f32 = 90.0;

// ============================================================================
// Frustum Bounds
// ============================================================================

/// World-space corners of `camera`'s view frustum and their centroid.
///
/// Corners come in near/far pairs along the four frustum edges: top-left,
/// top-right, bottom-right, bottom-left (as seen by the camera), i.e.
/// `[tl_near, tl_far, tr_near, tr_far, br_near, br_far, bl_near, bl_far]`.
#[must_use]
pub fn compute_frustum_bounds(camera: &Camera, viewport: &Viewport) -> (Vec3, [Vec3; 8]) {
    let transform = camera.global_transform();
    let cam_x = transform.x_axis.truncate();
    let cam_y = transform.y_axis.truncate();
    let cam_z = transform.z_axis.truncate();

    let tan_fov = (camera.vertical_fov(viewport) * 0.5).tan();
    let as_tan_fov = tan_fov * viewport.aspect_ratio();

    // RH: the camera looks down -Z.
    let edges = [
        -as_tan_fov * cam_x + tan_fov * cam_y - cam_z,
        as_tan_fov * cam_x + tan_fov * cam_y - cam_z,
        as_tan_fov * cam_x - tan_fov * cam_y - cam_z,
        -as_tan_fov * cam_x - tan_fov * cam_y - cam_z,
    ];

    let origin = camera.global_pos();
    let mut corners = [Vec3::ZERO; 8];
    for (i, edge) in edges.iter().enumerate() {
        corners[i * 2] = origin + *edge * camera.clip_near;
        corners[i * 2 + 1] = origin + *edge * camera.clip_far;
    }

    (centroid(&corners), corners)
}

#[inline]
fn centroid(points: &[Vec3; 8]) -> Vec3 {
    points.iter().copied().sum::<Vec3>() * 0.125
}

// ============================================================================
// Light-Space Bounding Box
// ============================================================================

/// Bounding box of `points` measured along a light basis.
///
/// The result's x/y/z axes are `right`/`up`/`forward`: each component is the
/// min/max of the points' dot product with that axis.
#[must_use]
pub fn calculate_shadow_camera_bounding_box(
    points: &[Vec3; 8],
    forward: Vec3,
    up: Vec3,
    right: Vec3,
) -> Bounds3 {
    let basis = Mat3::from_cols(right, up, forward).transpose();
    let mut bounds = Bounds3::empty();
    for &p in points {
        bounds.include_point(basis * p);
    }
    bounds
}

/// Orthonormal `(right, up)` for a light looking along `forward`.
///
/// World +Y is the up hint, switching to +X when `forward` is (nearly) vertical.
#[must_use]
pub fn light_basis(forward: Vec3) -> (Vec3, Vec3) {
    let right = if math::fuzzy_eq(forward.y.abs(), 1.0) {
        forward.cross(Vec3::X)
    } else {
        forward.cross(Vec3::Y)
    }
    .normalize();
    let up = right.cross(forward).normalize();
    (right, up)
}

/// The 8 corners of a scene bounding box, in the order the fitter expects.
#[inline]
#[must_use]
pub fn scene_points_from_bounds(bounds: &Bounds3) -> [Vec3; 8] {
    bounds.corners()
}

// ============================================================================
// Shadow Camera Setup
// ============================================================================

/// A shadow camera together with the viewport its projection was built for.
///
/// For orthographic cameras the viewport holds the world-space width/height
/// of the fitted box, not the pixel size of the map.
#[derive(Debug, Clone)]
pub struct ShadowCamera {
    pub camera: Camera,
    pub viewport: Viewport,
}

/// Builds the camera a light renders its 2D shadow map with.
///
/// Directional lights get an orthographic camera fitted to the view frustum,
/// or to `scene_points` when those give a strictly smaller box (the frustum
/// box wins ties). The camera sits at the chosen box's centroid, pulled back
/// along the light direction by the view camera's near clip distance.
///
/// Other lights get a 90 degree perspective camera at the light, looking
/// along the light direction (point lights look at the world origin).
#[must_use]
pub fn setup_camera_for_shadow_map(
    viewport: &Viewport,
    view_camera: &Camera,
    light: &Light,
    scene_points: Option<&[Vec3; 8]>,
) -> ShadowCamera {
    let map_size = light.shadow_map_size() as f32;
    let mut shadow_viewport = Viewport::square(map_size);

    let mut camera = Camera {
        clip_near: 1.0,
        clip_far: light.shadow_map_far,
        fov: SHADOW_CAMERA_FOV_DEGREES.to_radians(),
        pivot: light.pivot,
        orthographic: light.kind == LightKind::Directional,
        ..Camera::default()
    };

    let light_dir = match light.direction().try_normalize() {
        Some(dir) => dir,
        None => {
            log::warn!("Shadow-casting light has no direction; assuming -Z");
            Vec3::NEG_Z
        }
    };
    let mut light_pos = light.global_pos();
    let mut fitted_rotation = None;

    if light.kind == LightKind::Directional {
        let (frustum_center, frustum_points) = compute_frustum_bounds(view_camera, viewport);

        let forward = light_dir;
        let (right, up) = light_basis(forward);

        let mut bounds = calculate_shadow_camera_bounding_box(&frustum_points, forward, up, right);
        let mut center = frustum_center;

        if let Some(points) = scene_points {
            let scene_bounds = calculate_shadow_camera_bounding_box(points, forward, up, right);
            if scene_bounds.extent_volume() < bounds.extent_volume() {
                bounds = scene_bounds;
                center = centroid(points);
            }
        }

        let extents = bounds.extents().max(Vec3::splat(MIN_SHADOW_EXTENT));
        shadow_viewport.width = extents.x * 2.0;
        shadow_viewport.height = extents.y * 2.0;
        camera.clip_near = -extents.z * 2.0;
        camera.clip_far = extents.z * 2.0;

        light_pos = center;
        // Oriented along the basis the box was measured in.
        fitted_rotation = Some(Quat::from_mat3(&Mat3::from_cols(right, up, -forward)).normalize());
    }

    light_pos -= light_dir * view_camera.clip_near;

    if let Some(rotation) = fitted_rotation {
        camera.position = light_pos;
        camera.rotation = rotation;
    } else if light.kind == LightKind::Point {
        camera.look_at(light_pos, Vec3::Y, Vec3::ZERO);
    } else {
        camera.look_at(light_pos, Vec3::Y, light_pos + light_dir);
    }

    camera.calculate_global_variables(&shadow_viewport);

    ShadowCamera {
        camera,
        viewport: shadow_viewport,
    }
}

// ============================================================================
// Cube Faces
// ============================================================================

/// Cube-map face, in layer order.
///
/// Each face camera looks along its axis with the conventional cube-map up
/// vector: -Y for the four side faces, +Z for +Y and -Z for -Y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PosX = 0,
    NegX = 1,
    PosY = 2,
    NegY = 3,
    PosZ = 4,
    NegZ = 5,
}

impl CubeFace {
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PosX,
        CubeFace::NegX,
        CubeFace::PosY,
        CubeFace::NegY,
        CubeFace::PosZ,
        CubeFace::NegZ,
    ];

    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// View direction of the face camera.
    #[must_use]
    pub const fn direction(self) -> Vec3 {
        match self {
            Self::PosX => Vec3::X,
            Self::NegX => Vec3::NEG_X,
            Self::PosY => Vec3::Y,
            Self::NegY => Vec3::NEG_Y,
            Self::PosZ => Vec3::Z,
            Self::NegZ => Vec3::NEG_Z,
        }
    }

    #[must_use]
    pub const fn up(self) -> Vec3 {
        match self {
            Self::PosY => Vec3::Z,
            Self::NegY => Vec3::NEG_Z,
            _ => Vec3::NEG_Y,
        }
    }

    /// Camera rotation mapping local -Z onto [`CubeFace::direction`].
    #[must_use]
    pub fn rotation(self) -> Quat {
        let forward = self.direction();
        let up = self.up();
        let right = forward.cross(up);
        Quat::from_mat3(&Mat3::from_cols(right, up, -forward))
    }

    /// Index of the render target this face is drawn into.
    ///
    /// When the framebuffer is not Y-up, +Y and -Y trade places.
    #[must_use]
    pub const fn render_target_index(self, y_up_in_framebuffer: bool) -> usize {
        match (self, y_up_in_framebuffer) {
            (Self::PosY, false) => Self::NegY as usize,
            (Self::NegY, false) => Self::PosY as usize,
            _ => self as usize,
        }
    }
}

/// The six perspective cameras of an omnidirectional shadow, in
/// [`CubeFace::ALL`] order.
///
/// All share the light's position, a 90 degree FOV, near 1 and
/// far `max(2, light.shadow_map_far)`.
#[must_use]
pub fn setup_cube_shadow_cameras(light: &Light) -> [Camera; 6] {
    debug_assert!(
        light.kind != LightKind::Directional,
        "directional lights use a 2D shadow map"
    );

    let viewport = Viewport::square(light.shadow_map_size() as f32);
    let position = light.global_pos();

    CubeFace::ALL.map(|face| {
        let mut camera = Camera {
            orthographic: false,
            pivot: light.pivot,
            clip_near: 1.0,
            clip_far: light.shadow_map_far.max(2.0),
            fov: SHADOW_CAMERA_FOV_DEGREES.to_radians(),
            position,
            rotation: face.rotation(),
            ..Camera::default()
        };
        camera.calculate_global_variables(&viewport);
        camera
    })
}
