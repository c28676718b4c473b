//! Shadow Map Manager Tests
//!
//! Tests for:
//! - First allocation of VSM and CUBE entries
//! - Resource reuse on identical requests
//! - Reallocation on size or mode change (old resources released exactly once)
//! - Format fallback and capability fallbacks (cube blur)
//! - Creation failures degrading to invalid entries
//! - Teardown and per-frame preparation glue

mod common;

use glam::{Mat4, Vec3};

use common::{ResourceKind, TrackingBackend, default_manager, init_logger, manager_with};
use umbra::math::Bounds3;
use umbra::renderer::{
    ShadowMapEntry, ShadowMapMode, ShadowSettings, TextureKind, depth_adjust, prepare_shadow_maps,
    update_shadow_matrices,
};
use umbra::scene::{Camera, Light, Viewport};

// ============================================================================
// Helpers
// ============================================================================

/// Ids of every GPU object held by an entry.
fn resource_ids(entry: &ShadowMapEntry<TrackingBackend>) -> Vec<u64> {
    let mut ids = Vec::new();
    ids.extend(entry.depth_map().map(|t| t.id));
    ids.extend(entry.depth_copy().map(|t| t.id));
    ids.extend(entry.depth_cube().map(|t| t.id));
    ids.extend(entry.cube_copy().map(|t| t.id));
    ids.extend(entry.depth_stencil().map(|b| b.id));
    ids.extend(entry.render_targets().iter().map(|t| t.id));
    if let Some((x, y)) = entry.blur_targets() {
        ids.push(x.id);
        ids.push(y.id);
    }
    ids
}

const D2: ResourceKind = ResourceKind::Texture(TextureKind::D2);
const CUBE: ResourceKind = ResourceKind::Texture(TextureKind::Cube);

// ============================================================================
// First Allocation
// ============================================================================

#[test]
fn vsm_entry_allocates_map_copy_depth_stencil_and_targets() {
    init_logger();
    let (mut manager, ledger) = default_manager();

    let entry = manager.add_shadow_map_entry(0, 1024, 1024, ShadowMapMode::Vsm, "sun");
    assert!(entry.is_valid());
    assert_eq!(entry.mode(), ShadowMapMode::Vsm);
    assert_eq!(entry.size(), (1024, 1024));
    assert_eq!(entry.format(), Some(wgpu::TextureFormat::R16Float));
    assert!(entry.depth_cube().is_none());
    assert!(entry.cube_copy().is_none());

    let map = entry.depth_map().expect("depth map");
    let copy = entry.depth_copy().expect("depth copy");
    let depth_stencil = entry.depth_stencil().expect("depth stencil");
    assert_eq!((map.width, map.height), (1024, 1024));
    assert_eq!(map.format, copy.format);

    assert_eq!(entry.render_targets().len(), 1);
    let target = &entry.render_targets()[0];
    assert_eq!(target.attachments, vec![(map.id, 0)]);
    assert_eq!(target.depth_stencil, Some(depth_stencil.id));

    // X pass writes the copy, Y pass writes back into the map.
    let (x_pass, y_pass) = entry.blur_targets().expect("blur targets");
    assert_eq!(x_pass.attachments, vec![(copy.id, 0)]);
    assert_eq!(y_pass.attachments, vec![(map.id, 0)]);
    assert_eq!(x_pass.depth_stencil, None);

    let ledger = ledger.borrow();
    assert_eq!(ledger.created_count(D2), 2);
    assert_eq!(ledger.created_count(ResourceKind::RenderBuffer), 1);
    assert_eq!(ledger.created_count(ResourceKind::RenderTarget), 3);
    assert_eq!(ledger.created_count(ResourceKind::RenderPass), 2);
}

#[test]
fn cube_entry_allocates_six_face_targets() {
    init_logger();
    let (mut manager, ledger) = default_manager();

    let entry = manager.add_shadow_map_entry(3, 512, 512, ShadowMapMode::Cube, "bulb");
    assert!(entry.is_valid());
    assert!(entry.depth_map().is_none());

    let cube = entry.depth_cube().expect("depth cube");
    let copy = entry.cube_copy().expect("cube copy");
    assert_eq!(cube.kind, TextureKind::Cube);
    let depth_stencil = entry.depth_stencil().expect("depth stencil");
    assert_eq!((depth_stencil.width, depth_stencil.height), (512, 512));

    assert_eq!(entry.render_targets().len(), 6);
    for (face, target) in entry.render_targets().iter().enumerate() {
        assert_eq!(target.attachments, vec![(cube.id, face as u32)]);
        assert_eq!(target.depth_stencil, Some(depth_stencil.id));
    }

    let (x_pass, y_pass) = entry.blur_targets().expect("cube blur targets");
    let expected_x: Vec<(u64, u32)> = (0..6).map(|layer| (copy.id, layer)).collect();
    let expected_y: Vec<(u64, u32)> = (0..6).map(|layer| (cube.id, layer)).collect();
    assert_eq!(x_pass.attachments, expected_x);
    assert_eq!(y_pass.attachments, expected_y);

    let ledger = ledger.borrow();
    assert_eq!(ledger.created_count(CUBE), 2);
    assert_eq!(ledger.created_count(ResourceKind::RenderTarget), 8);
}

// ============================================================================
// Reuse
// ============================================================================

#[test]
fn identical_request_reuses_every_handle() {
    let (mut manager, ledger) = default_manager();

    let first = resource_ids(manager.add_shadow_map_entry(0, 1024, 1024, ShadowMapMode::Vsm, "sun"));
    let created_before = ledger.borrow().created.len();

    let second = resource_ids(manager.add_shadow_map_entry(0, 1024, 1024, ShadowMapMode::Vsm, "sun"));

    assert_eq!(first, second);
    assert_eq!(ledger.borrow().created.len(), created_before);
    assert!(ledger.borrow().released.is_empty());
    assert_eq!(manager.shadow_map_entry_count(), 1);
}

#[test]
fn identical_cube_request_reuses_every_handle() {
    let (mut manager, ledger) = default_manager();

    let first = resource_ids(manager.add_shadow_map_entry(1, 256, 256, ShadowMapMode::Cube, "bulb"));
    let second = resource_ids(manager.add_shadow_map_entry(1, 256, 256, ShadowMapMode::Cube, "bulb"));

    assert_eq!(first, second);
    assert!(ledger.borrow().released.is_empty());
}

#[test]
fn render_pass_descriptors_are_shared_between_entries() {
    let (mut manager, ledger) = default_manager();

    manager.add_shadow_map_entry(0, 1024, 1024, ShadowMapMode::Vsm, "a");
    manager.add_shadow_map_entry(1, 512, 512, ShadowMapMode::Vsm, "b");

    assert_eq!(ledger.borrow().created_count(ResourceKind::RenderPass), 2);

    let a = manager.shadow_map_entry(0).unwrap().render_pass_desc().unwrap().id;
    let b = manager.shadow_map_entry(1).unwrap().render_pass_desc().unwrap().id;
    assert_eq!(a, b);
}

// ============================================================================
// Reallocation
// ============================================================================

#[test]
fn size_change_releases_old_resources_exactly_once() {
    let (mut manager, ledger) = default_manager();

    let old = resource_ids(manager.add_shadow_map_entry(0, 512, 512, ShadowMapMode::Vsm, "sun"));
    let new = resource_ids(manager.add_shadow_map_entry(0, 1024, 1024, ShadowMapMode::Vsm, "sun"));

    assert!(old.iter().all(|id| !new.contains(id)));

    let ledger = ledger.borrow();
    for id in &old {
        assert_eq!(ledger.release_count(*id), 1, "resource {id} not released exactly once");
    }
    assert!(ledger.double_releases.is_empty());
    assert_eq!(ledger.live_count(D2), 2);
    assert_eq!(ledger.live_count(ResourceKind::RenderBuffer), 1);
    assert_eq!(ledger.live_count(ResourceKind::RenderTarget), 3);

    let entry = manager.shadow_map_entry(0).unwrap();
    assert_eq!(entry.size(), (1024, 1024));
    assert_eq!(entry.depth_map().unwrap().width, 1024);
}

#[test]
fn vsm_to_cube_switch_replaces_resources() {
    let (mut manager, ledger) = default_manager();

    let old = resource_ids(manager.add_shadow_map_entry(0, 512, 512, ShadowMapMode::Vsm, "light"));
    let entry = manager.add_shadow_map_entry(0, 512, 512, ShadowMapMode::Cube, "light");

    assert_eq!(entry.mode(), ShadowMapMode::Cube);
    assert!(entry.is_valid());
    assert!(entry.depth_map().is_none());
    assert!(entry.depth_copy().is_none());
    assert!(entry.depth_cube().is_some());
    assert_eq!(entry.render_targets().len(), 6);

    let ledger = ledger.borrow();
    for id in &old {
        assert_eq!(ledger.release_count(*id), 1);
    }
    assert_eq!(ledger.live_count(D2), 0);
    assert_eq!(ledger.live_count(CUBE), 2);
}

#[test]
fn cube_to_vsm_switch_replaces_resources() {
    let (mut manager, ledger) = default_manager();

    let old = resource_ids(manager.add_shadow_map_entry(2, 256, 256, ShadowMapMode::Cube, "light"));
    let entry = manager.add_shadow_map_entry(2, 256, 256, ShadowMapMode::Vsm, "light");

    assert_eq!(entry.mode(), ShadowMapMode::Vsm);
    assert!(entry.is_valid());
    assert!(entry.depth_cube().is_none());
    assert!(entry.cube_copy().is_none());
    assert_eq!(entry.render_targets().len(), 1);

    let ledger = ledger.borrow();
    for id in &old {
        assert_eq!(ledger.release_count(*id), 1);
    }
    assert_eq!(ledger.live_count(CUBE), 0);
    assert_eq!(ledger.live_count(D2), 2);
}

// ============================================================================
// Lookup
// ============================================================================

#[test]
fn entries_are_found_by_light_index_not_position() {
    let (mut manager, _ledger) = default_manager();

    manager.add_shadow_map_entry(7, 256, 256, ShadowMapMode::Vsm, "seven");
    manager.add_shadow_map_entry(2, 512, 512, ShadowMapMode::Cube, "two");

    assert_eq!(manager.shadow_map_entry(7).unwrap().size(), (256, 256));
    assert_eq!(manager.shadow_map_entry(2).unwrap().mode(), ShadowMapMode::Cube);
    assert!(manager.shadow_map_entry(0).is_none());
    assert!(manager.shadow_map_entry(1).is_none());

    manager.shadow_map_entry_mut(7).unwrap().light_vp = Mat4::from_scale(Vec3::splat(2.0));
    assert_eq!(
        manager.shadow_map_entry(7).unwrap().light_vp,
        Mat4::from_scale(Vec3::splat(2.0))
    );
    assert_eq!(manager.entries().count(), 2);
}

// ============================================================================
// Capability Fallbacks
// ============================================================================

#[test]
fn falls_back_to_r16_unorm_when_r16_float_unsupported() {
    let mut backend = TrackingBackend::new();
    backend.supported_formats = vec![wgpu::TextureFormat::R16Unorm];
    let (mut manager, _ledger) = manager_with(backend, ShadowSettings::default());

    let entry = manager.add_shadow_map_entry(0, 128, 128, ShadowMapMode::Vsm, "sun");
    assert!(entry.is_valid());
    assert_eq!(entry.format(), Some(wgpu::TextureFormat::R16Unorm));
    assert_eq!(entry.depth_map().unwrap().format, wgpu::TextureFormat::R16Unorm);
}

#[test]
fn no_supported_format_leaves_entry_invalid() {
    init_logger();
    let mut backend = TrackingBackend::new();
    backend.supported_formats.clear();
    let (mut manager, ledger) = manager_with(backend, ShadowSettings::default());

    let entry = manager.add_shadow_map_entry(0, 128, 128, ShadowMapMode::Vsm, "sun");
    assert!(!entry.is_valid());
    assert!(entry.format().is_none());
    assert!(ledger.borrow().created.is_empty());
}

#[test]
fn cube_blur_skipped_below_six_color_attachments() {
    init_logger();
    let mut backend = TrackingBackend::new();
    backend.max_color_attachments = 4;
    let (mut manager, _ledger) = manager_with(backend, ShadowSettings::default());

    let entry = manager.add_shadow_map_entry(0, 256, 256, ShadowMapMode::Cube, "a");
    assert!(entry.is_valid(), "cube shadows still render without blur");
    assert!(entry.blur_targets().is_none());
    assert!(entry.blur_render_pass_desc().is_none());

    // Second cube entry takes the same fallback without failing.
    let entry = manager.add_shadow_map_entry(1, 256, 256, ShadowMapMode::Cube, "b");
    assert!(entry.is_valid());
    assert!(entry.blur_targets().is_none());

    // VSM blur only needs one attachment.
    let entry = manager.add_shadow_map_entry(2, 256, 256, ShadowMapMode::Vsm, "c");
    assert!(entry.blur_targets().is_some());
}

#[test]
fn blur_disabled_in_settings_creates_no_blur_targets() {
    let settings = ShadowSettings {
        enable_blur: false,
        ..Default::default()
    };
    let (mut manager, ledger) = manager_with(TrackingBackend::new(), settings);

    let entry = manager.add_shadow_map_entry(0, 256, 256, ShadowMapMode::Vsm, "sun");
    assert!(entry.is_valid());
    assert!(entry.blur_targets().is_none());
    assert_eq!(ledger.borrow().created_count(ResourceKind::RenderTarget), 1);
}

// ============================================================================
// Creation Failures
// ============================================================================

#[test]
fn texture_failure_degrades_to_invalid_entry_without_leaks() {
    init_logger();
    let mut backend = TrackingBackend::new();
    backend.fail_textures = true;
    let (mut manager, ledger) = manager_with(backend, ShadowSettings::default());

    let entry = manager.add_shadow_map_entry(0, 1024, 1024, ShadowMapMode::Vsm, "sun");
    assert!(!entry.is_valid());
    assert!(entry.depth_map().is_none());
    assert!(entry.render_targets().is_empty());
    assert!(entry.blur_targets().is_none());

    // Same request again: no retry churn.
    let created = ledger.borrow().created.len();
    manager.add_shadow_map_entry(0, 1024, 1024, ShadowMapMode::Vsm, "sun");
    assert_eq!(ledger.borrow().created.len(), created);

    drop(manager);
    let ledger = ledger.borrow();
    assert!(ledger.live.is_empty(), "leaked: {:?}", ledger.live);
    assert!(ledger.double_releases.is_empty());
}

#[test]
fn render_target_failure_keeps_textures_but_is_invalid() {
    init_logger();
    let mut backend = TrackingBackend::new();
    backend.fail_render_targets = true;
    let (mut manager, ledger) = manager_with(backend, ShadowSettings::default());

    let entry = manager.add_shadow_map_entry(0, 256, 256, ShadowMapMode::Cube, "bulb");
    assert!(!entry.is_valid());
    assert!(entry.depth_cube().is_some());
    assert!(entry.render_targets().is_empty());

    drop(manager);
    assert!(ledger.borrow().live.is_empty());
}

#[test]
fn incompatible_render_pass_discards_target() {
    init_logger();
    let mut backend = TrackingBackend::new();
    backend.incompatible_passes = true;
    let (mut manager, ledger) = manager_with(backend, ShadowSettings::default());

    let entry = manager.add_shadow_map_entry(0, 256, 256, ShadowMapMode::Vsm, "sun");
    assert!(!entry.is_valid());
    assert!(entry.render_targets().is_empty());
    assert_eq!(ledger.borrow().live_count(ResourceKind::RenderTarget), 2, "only blur targets remain");
}

// ============================================================================
// Teardown
// ============================================================================

#[test]
fn release_with_no_entries_is_safe() {
    let (mut manager, ledger) = default_manager();
    manager.release_cached_resources();
    manager.release_cached_resources();
    assert!(ledger.borrow().released.is_empty());
    assert!(ledger.borrow().double_releases.is_empty());
}

#[test]
fn release_cached_resources_frees_everything_once() {
    let (mut manager, ledger) = default_manager();
    manager.add_shadow_map_entry(0, 512, 512, ShadowMapMode::Vsm, "a");
    manager.add_shadow_map_entry(1, 512, 512, ShadowMapMode::Cube, "b");

    manager.release_cached_resources();
    assert_eq!(manager.shadow_map_entry_count(), 0);
    {
        let ledger = ledger.borrow();
        assert!(ledger.live.is_empty());
        assert!(ledger.double_releases.is_empty());
    }

    // Drop after an explicit release must not free anything twice.
    drop(manager);
    assert!(ledger.borrow().double_releases.is_empty());
}

#[test]
fn dropping_manager_releases_all_entries() {
    let (mut manager, ledger) = default_manager();
    manager.add_shadow_map_entry(0, 512, 512, ShadowMapMode::Vsm, "a");
    manager.add_shadow_map_entry(4, 128, 128, ShadowMapMode::Cube, "b");
    manager.add_shadow_map_entry(4, 256, 256, ShadowMapMode::Cube, "b");

    drop(manager);

    let ledger = ledger.borrow();
    assert!(ledger.live.is_empty(), "leaked: {:?}", ledger.live);
    assert!(ledger.double_releases.is_empty());
    assert_eq!(ledger.released.len(), ledger.created.len());
}

// ============================================================================
// Preparation Glue
// ============================================================================

#[test]
fn depth_adjust_maps_clip_depth_to_unit_range() {
    let zero_to_one = depth_adjust(true);
    let minus_one_to_one = depth_adjust(false);

    assert_eq!((0.5 + zero_to_one.x) * zero_to_one.y, 0.5);
    assert_eq!((-1.0 + minus_one_to_one.x) * minus_one_to_one.y, 0.0);
    assert_eq!((1.0 + minus_one_to_one.x) * minus_one_to_one.y, 1.0);
}

#[test]
fn prepare_shadow_maps_picks_mode_and_size_per_light() {
    let (mut manager, _ledger) = default_manager();
    let lights = vec![
        Light::new_directional(Vec3::new(0.0, -1.0, -1.0)).with_shadows(10, 100.0),
        Light::new_point(Vec3::new(0.0, 3.0, 0.0)),
        Light::new_point(Vec3::new(0.0, 3.0, 0.0)).with_shadows(8, 50.0),
        Light::new_spot(Vec3::ZERO, Vec3::NEG_Z).with_shadows(9, 50.0),
    ];

    assert_eq!(prepare_shadow_maps(&mut manager, &lights), 3);
    assert_eq!(manager.shadow_map_entry_count(), 3);

    let sun = manager.shadow_map_entry(0).unwrap();
    assert_eq!(sun.mode(), ShadowMapMode::Vsm);
    assert_eq!(sun.size(), (1024, 1024));

    assert!(manager.shadow_map_entry(1).is_none());

    let point = manager.shadow_map_entry(2).unwrap();
    assert_eq!(point.mode(), ShadowMapMode::Cube);
    assert_eq!(point.size(), (256, 256));

    assert_eq!(manager.shadow_map_entry(3).unwrap().mode(), ShadowMapMode::Cube);
}

#[test]
fn prepare_every_frame_is_churn_free() {
    let (mut manager, ledger) = default_manager();
    let lights = vec![Light::new_directional(Vec3::NEG_Y).with_shadows(9, 100.0)];

    prepare_shadow_maps(&mut manager, &lights);
    let created = ledger.borrow().created.len();
    for _ in 0..10 {
        prepare_shadow_maps(&mut manager, &lights);
    }
    assert_eq!(ledger.borrow().created.len(), created);
}

#[test]
fn update_shadow_matrices_fills_light_and_cube_matrices() {
    let (mut manager, _ledger) = default_manager();
    let lights = vec![
        Light::new_directional(Vec3::new(0.3, -1.0, -0.2)).with_shadows(10, 100.0),
        Light::new_point(Vec3::new(1.0, 4.0, 0.0)).with_shadows(8, 25.0),
    ];
    prepare_shadow_maps(&mut manager, &lights);

    let viewport = Viewport::new(0.0, 0.0, 1280.0, 720.0);
    let mut camera = Camera::new_perspective(60.0, 0.1, 100.0);
    camera.look_at(Vec3::new(0.0, 2.0, 10.0), Vec3::Y, Vec3::ZERO);
    camera.calculate_global_variables(&viewport);
    let scene = Bounds3::new(Vec3::splat(-1.0), Vec3::splat(1.0));

    update_shadow_matrices(&mut manager, &viewport, &camera, &lights, Some(&scene));

    let sun = manager.shadow_map_entry(0).unwrap();
    assert_ne!(sun.light_vp, Mat4::IDENTITY);
    assert!(sun.light_vp.is_finite());
    assert!(sun.light_view.is_finite());

    let point = manager.shadow_map_entry(1).unwrap();
    assert_eq!(point.light_view, Mat4::IDENTITY);
    for face in 0..6 {
        let view = point.light_cube_view[face];
        assert!(view.is_finite());
        // Every face view maps the light position to the view origin.
        let origin = view.transform_point3(Vec3::new(1.0, 4.0, 0.0));
        assert!(origin.length() < 1e-4, "face {face}: {origin}");
        assert_ne!(point.light_cube_vp[face], Mat4::IDENTITY);
    }
}

#[test]
fn update_shadow_matrices_skips_invalid_entries() {
    let mut backend = TrackingBackend::new();
    backend.fail_textures = true;
    let (mut manager, _ledger) = manager_with(backend, ShadowSettings::default());
    let lights = vec![Light::new_directional(Vec3::NEG_Y).with_shadows(9, 100.0)];
    prepare_shadow_maps(&mut manager, &lights);

    let viewport = Viewport::new(0.0, 0.0, 800.0, 600.0);
    let mut camera = Camera::default();
    camera.calculate_global_variables(&viewport);
    update_shadow_matrices(&mut manager, &viewport, &camera, &lights, None);

    assert_eq!(manager.shadow_map_entry(0).unwrap().light_vp, Mat4::IDENTITY);
}
