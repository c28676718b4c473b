//! Shadow rendering support
//!
//! - `shadow_utils`: stateless shadow camera fitting
//! - `shadow_map`: per-light GPU resources and their reuse rules
//! - `shadow_pass`: per-frame preparation glue
//! - `backend`: the GPU capability contract, implemented for wgpu in `wgpu_backend`

pub mod backend;
pub mod settings;
pub mod shadow_map;
pub mod shadow_pass;
pub mod shadow_utils;
pub mod tracked;
pub mod wgpu_backend;

pub use backend::{
    ColorAttachment, DepthStencilDesc, RenderPassKey, RenderTargetDesc, ShadowBackend,
    ShadowTextureDesc, TextureKind,
};
pub use settings::ShadowSettings;
pub use shadow_map::{ShadowMapEntry, ShadowMapManager, ShadowMapMode};
pub use shadow_pass::{depth_adjust, prepare_shadow_maps, update_shadow_matrices};
pub use shadow_utils::{
    CubeFace, ShadowCamera, calculate_shadow_camera_bounding_box, compute_frustum_bounds,
    scene_points_from_bounds, setup_camera_for_shadow_map, setup_cube_shadow_cameras,
};
pub use tracked::Tracked;
pub use wgpu_backend::{RenderPassLayout, WgpuRenderTarget, WgpuShadowBackend};
