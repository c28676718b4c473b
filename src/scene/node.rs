use bitflags::bitflags;
use glam::{Mat3, Mat4, Vec3};

use crate::math;
use crate::scene::NodeHandle;
use crate::scene::transform::Transform;

/// What a node represents to the renderer.
///
/// Only [`NodeKind::Layer`] and [`NodeKind::Model`] change graph behavior:
/// layers are render-pass roots that neither reparent their children nor
/// contribute a transform, and models carry renderable bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum NodeKind {
    #[default]
    Node,
    Layer,
    Model,
    Light,
    Camera,
}

bitflags! {
    /// Local state, derived global state and dirty bits of a node.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NodeFlags: u32 {
        const ACTIVE = 1 << 0;
        const PICKABLE = 1 << 1;
        const GLOBALLY_ACTIVE = 1 << 2;
        const GLOBALLY_PICKABLE = 1 << 3;

        const TRANSFORM_DIRTY = 1 << 4;
        const OPACITY_DIRTY = 1 << 5;
        const ACTIVE_DIRTY = 1 << 6;
        const PICKABLE_DIRTY = 1 << 7;
        const SUB_NODE_DIRTY = 1 << 8;

        /// Any cached global value is stale.
        const GLOBAL_VALUES_DIRTY = Self::TRANSFORM_DIRTY.bits()
            | Self::OPACITY_DIRTY.bits()
            | Self::ACTIVE_DIRTY.bits()
            | Self::PICKABLE_DIRTY.bits();

        const DIRTY_MASK = Self::GLOBAL_VALUES_DIRTY.bits() | Self::SUB_NODE_DIRTY.bits();
    }
}

/// State the owner sets directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalState {
    Active,
    Pickable,
}

impl LocalState {
    #[inline]
    #[must_use]
    pub const fn flag(self) -> NodeFlags {
        match self {
            Self::Active => NodeFlags::ACTIVE,
            Self::Pickable => NodeFlags::PICKABLE,
        }
    }

    /// Dirty bit raised when this state flips.
    #[inline]
    #[must_use]
    pub const fn dirty_flag(self) -> NodeFlags {
        match self {
            Self::Active => NodeFlags::ACTIVE_DIRTY,
            Self::Pickable => NodeFlags::PICKABLE_DIRTY,
        }
    }
}

/// State derived from the local state and the parent's global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalState {
    Active,
    Pickable,
}

impl GlobalState {
    #[inline]
    #[must_use]
    pub const fn flag(self) -> NodeFlags {
        match self {
            Self::Active => NodeFlags::GLOBALLY_ACTIVE,
            Self::Pickable => NodeFlags::GLOBALLY_PICKABLE,
        }
    }
}

/// A scene-graph node.
///
/// # Hierarchy
///
/// Nodes live in a [`SceneGraph`](crate::scene::SceneGraph) arena and refer to
/// each other through [`NodeHandle`]s. `parent` and `instance_root` are
/// non-owning relations; the arena owns every node.
///
/// # Cached values
///
/// `global_transform`, `global_opacity`, the instance transforms and the
/// global state bits are only trustworthy while
/// [`NodeFlags::GLOBAL_VALUES_DIRTY`] is clear. Resolve them with
/// [`SceneGraph::calculate_global_variables`](crate::scene::SceneGraph::calculate_global_variables).
#[derive(Debug, Clone)]
pub struct Node {
    pub kind: NodeKind,

    // === Local properties ===
    pub(crate) transform: Transform,
    pub(crate) local_opacity: f32,
    /// Optimization hint for the renderer, never interpreted here.
    pub static_flags: u32,

    pub(crate) flags: NodeFlags,

    // === Cached values ===
    pub(crate) local_transform: Mat4,
    pub(crate) global_transform: Mat4,
    pub(crate) local_instance_transform: Mat4,
    pub(crate) global_instance_transform: Mat4,
    pub(crate) global_opacity: f32,

    // === Hierarchy ===
    pub(crate) parent: Option<NodeHandle>,
    pub(crate) children: Vec<NodeHandle>,
    pub(crate) instance_root: Option<NodeHandle>,

    /// Depth-first index assigned by the renderer's traversal.
    pub dfs_index: u32,
    pub debug_name: Option<String>,
}

impl Node {
    /// Creates a node of the given kind: locally active and fully dirty.
    #[must_use]
    pub fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            transform: Transform::new(),
            local_opacity: 1.0,
            static_flags: 0,
            flags: NodeFlags::GLOBAL_VALUES_DIRTY | NodeFlags::ACTIVE,
            local_transform: Mat4::IDENTITY,
            global_transform: Mat4::IDENTITY,
            local_instance_transform: Mat4::IDENTITY,
            global_instance_transform: Mat4::IDENTITY,
            global_opacity: 1.0,
            parent: None,
            children: Vec::new(),
            instance_root: None,
            dfs_index: 0,
            debug_name: None,
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.debug_name = Some(name.into());
        self
    }

    // ========================================================================
    // Flags
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn flags(&self) -> NodeFlags {
        self.flags
    }

    /// True if any bit of `flag` is set.
    #[inline]
    #[must_use]
    pub fn is_dirty(&self, flag: NodeFlags) -> bool {
        self.flags.intersects(flag & NodeFlags::DIRTY_MASK)
    }

    #[inline]
    pub fn clear_dirty(&mut self, flag: NodeFlags) {
        self.flags.remove(flag & NodeFlags::DIRTY_MASK);
    }

    #[inline]
    #[must_use]
    pub fn local_state(&self, state: LocalState) -> bool {
        self.flags.contains(state.flag())
    }

    #[inline]
    #[must_use]
    pub fn global_state(&self, state: GlobalState) -> bool {
        self.flags.contains(state.flag())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<NodeHandle> {
        self.parent
    }

    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeHandle] {
        &self.children
    }

    #[inline]
    #[must_use]
    pub fn last_child(&self) -> Option<NodeHandle> {
        self.children.last().copied()
    }

    #[inline]
    #[must_use]
    pub fn instance_root(&self) -> Option<NodeHandle> {
        self.instance_root
    }

    #[inline]
    #[must_use]
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    #[inline]
    #[must_use]
    pub fn pivot(&self) -> Vec3 {
        self.transform.pivot
    }

    #[inline]
    #[must_use]
    pub fn local_opacity(&self) -> f32 {
        self.local_opacity
    }

    #[inline]
    #[must_use]
    pub fn global_opacity(&self) -> f32 {
        self.global_opacity
    }

    #[inline]
    #[must_use]
    pub fn local_transform(&self) -> &Mat4 {
        &self.local_transform
    }

    #[inline]
    #[must_use]
    pub fn global_transform(&self) -> &Mat4 {
        &self.global_transform
    }

    #[inline]
    #[must_use]
    pub fn local_instance_transform(&self) -> &Mat4 {
        &self.local_instance_transform
    }

    #[inline]
    #[must_use]
    pub fn global_instance_transform(&self) -> &Mat4 {
        &self.global_instance_transform
    }

    // ========================================================================
    // Derived world-space values
    // ========================================================================

    /// World-space position (translation of the global transform).
    #[inline]
    #[must_use]
    pub fn global_pos(&self) -> Vec3 {
        math::translation(&self.global_transform)
    }

    /// World-space forward direction: the global -Z axis, normalized.
    #[must_use]
    pub fn direction(&self) -> Vec3 {
        (-self.global_transform.z_axis.truncate()).normalize_or_zero()
    }

    /// Forward direction that stays correct under non-uniform scale.
    #[must_use]
    pub fn scaling_correct_direction(&self) -> Vec3 {
        (math::normal_matrix(&self.global_transform) * Vec3::NEG_Z).normalize_or_zero()
    }

    /// Pivot point transformed to world space.
    #[must_use]
    pub fn global_pivot(&self) -> Vec3 {
        self.global_transform.transform_point3(self.transform.pivot)
    }

    #[must_use]
    pub fn calculate_normal_matrix(&self) -> Mat3 {
        math::normal_matrix(&self.global_transform)
    }

    /// Returns `(view_projection * global, normal matrix)`.
    #[must_use]
    pub fn calculate_mvp_and_normal_matrix(&self, view_projection: &Mat4) -> (Mat4, Mat3) {
        (*view_projection * self.global_transform, self.calculate_normal_matrix())
    }

    /// Component-wise `x * |x|`, used for distance-sorting keys that keep sign.
    #[inline]
    #[must_use]
    pub fn signed_squared(value: Vec3) -> Vec3 {
        value * value.abs()
    }
}

impl Default for Node {
    fn default() -> Self {
        Self::new(NodeKind::Node)
    }
}
