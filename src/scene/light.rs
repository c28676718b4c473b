use glam::{Mat4, Vec3};

use crate::math;
use crate::scene::node::Node;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
    Area,
}

/// Light data consumed by shadow preparation.
///
/// The world placement is copied from the light's graph node once its
/// global values are resolved (see [`Light::sync_from_node`]).
#[derive(Debug, Clone)]
pub struct Light {
    pub kind: LightKind,
    pub global_transform: Mat4,
    pub pivot: Vec3,

    // === Shadow parameters ===
    pub casts_shadows: bool,
    /// Shadow map edge length as a power-of-two exponent.
    pub shadow_map_res: u32,
    pub shadow_map_far: f32,
    pub shadow_filter: f32,
    pub shadow_bias: f32,
}

impl Light {
    #[must_use]
    pub fn new(kind: LightKind) -> Self {
        Self {
            kind,
            global_transform: Mat4::IDENTITY,
            pivot: Vec3::ZERO,
            casts_shadows: false,
            shadow_map_res: 9,
            shadow_map_far: 5000.0,
            shadow_filter: 35.0,
            shadow_bias: 0.0,
        }
    }

    #[must_use]
    pub fn new_directional(direction: Vec3) -> Self {
        let mut light = Self::new(LightKind::Directional);
        light.global_transform = look_along(Vec3::ZERO, direction);
        light
    }

    #[must_use]
    pub fn new_point(position: Vec3) -> Self {
        let mut light = Self::new(LightKind::Point);
        light.global_transform = Mat4::from_translation(position);
        light
    }

    #[must_use]
    pub fn new_spot(position: Vec3, direction: Vec3) -> Self {
        let mut light = Self::new(LightKind::Spot);
        light.global_transform = look_along(position, direction);
        light
    }

    /// Enables shadow casting with a `1 << resolution_exponent` map.
    #[must_use]
    pub fn with_shadows(mut self, resolution_exponent: u32, shadow_map_far: f32) -> Self {
        self.casts_shadows = true;
        self.shadow_map_res = resolution_exponent;
        self.shadow_map_far = shadow_map_far;
        self
    }

    /// Copies world placement from the resolved graph node carrying this light.
    pub fn sync_from_node(&mut self, node: &Node) {
        self.global_transform = *node.global_transform();
        self.pivot = node.pivot();
    }

    #[inline]
    #[must_use]
    pub fn global_pos(&self) -> Vec3 {
        math::translation(&self.global_transform)
    }

    /// World-space direction the light shines along (global -Z).
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        (-self.global_transform.z_axis.truncate()).normalize_or_zero()
    }

    /// Shadow map edge length in pixels.
    #[inline]
    #[must_use]
    pub fn shadow_map_size(&self) -> u32 {
        1u32 << self.shadow_map_res.min(31)
    }
}

/// World transform at `position` whose -Z axis points along `direction`.
fn look_along(position: Vec3, direction: Vec3) -> Mat4 {
    let Some(forward) = direction.try_normalize() else {
        return Mat4::from_translation(position);
    };
    let hint = if forward.y.abs() > 0.999 { Vec3::X } else { Vec3::Y };
    Mat4::look_to_rh(position, forward, hint).inverse()
}
