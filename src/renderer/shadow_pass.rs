//! Shadow Preparation
//!
//! Per-frame glue between the scene and the [`ShadowMapManager`]: requests an
//! entry for every shadow-casting light, then fits the light cameras and
//! stores their matrices on the entries for the depth passes and materials.

use glam::{Mat4, Vec2};

use crate::math::Bounds3;
use crate::renderer::backend::ShadowBackend;
use crate::renderer::shadow_map::{ShadowMapManager, ShadowMapMode};
use crate::renderer::shadow_utils::{
    scene_points_from_bounds, setup_camera_for_shadow_map, setup_cube_shadow_cameras,
};
use crate::scene::camera::{Camera, Viewport};
use crate::scene::light::{Light, LightKind};

/// Maps clip-space depth to `[0, 1]` as `(d + x) * y`.
///
/// Zero-to-one clip depth (wgpu, Vulkan, Metal, D3D) needs no change;
/// OpenGL's `[-1, 1]` is shifted and halved.
#[inline]
#[must_use]
pub fn depth_adjust(clip_depth_zero_to_one: bool) -> Vec2 {
    if clip_depth_zero_to_one {
        Vec2::new(0.0, 1.0)
    } else {
        Vec2::new(1.0, 0.5)
    }
}

/// Shadow technique used for a light kind.
#[inline]
#[must_use]
pub fn shadow_map_mode_for(kind: LightKind) -> ShadowMapMode {
    match kind {
        LightKind::Directional => ShadowMapMode::Vsm,
        LightKind::Point | LightKind::Spot | LightKind::Area => ShadowMapMode::Cube,
    }
}

/// Requests a shadow map entry for every shadow-casting light.
///
/// The light's position in `lights` is its light index. Returns the number
/// of entries requested.
pub fn prepare_shadow_maps<B: ShadowBackend>(
    manager: &mut ShadowMapManager<B>,
    lights: &[Light],
) -> usize {
    let mut requested = 0;
    for (index, light) in lights.iter().enumerate() {
        if !light.casts_shadows {
            continue;
        }
        let size = light.shadow_map_size();
        let name = format!("shadow map {index}");
        manager.add_shadow_map_entry(
            index as u32,
            size,
            size,
            shadow_map_mode_for(light.kind),
            &name,
        );
        requested += 1;
    }
    requested
}

/// Fits the shadow cameras of every valid entry and stores their matrices.
///
/// `scene_bounds` (world space) lets directional lights fit the whole scene
/// when that is tighter than the view frustum. Entries whose resources
/// failed to allocate are skipped.
pub fn update_shadow_matrices<B: ShadowBackend>(
    manager: &mut ShadowMapManager<B>,
    viewport: &Viewport,
    camera: &Camera,
    lights: &[Light],
    scene_bounds: Option<&Bounds3>,
) {
    let scene_points = scene_bounds
        .filter(|b| !b.is_empty())
        .map(scene_points_from_bounds);

    for entry in manager.entries_mut() {
        if !entry.is_valid() {
            continue;
        }
        let Some(light) = lights.get(entry.light_index() as usize) else {
            log::warn!("Shadow map entry for missing light {}", entry.light_index());
            continue;
        };

        match entry.mode() {
            ShadowMapMode::Vsm => {
                let fitted =
                    setup_camera_for_shadow_map(viewport, camera, light, scene_points.as_ref());
                entry.light_vp = fitted.camera.view_projection();
                entry.light_view = fitted.camera.view();
            }
            ShadowMapMode::Cube => {
                let cameras = setup_cube_shadow_cameras(light);
                entry.light_vp = Mat4::IDENTITY;
                entry.light_view = Mat4::IDENTITY;
                for (face, face_camera) in cameras.iter().enumerate() {
                    entry.light_cube_view[face] = face_camera.view();
                    entry.light_cube_vp[face] = face_camera.view_projection();
                }
            }
        }
    }
}
