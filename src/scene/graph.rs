//! Scene Graph
//!
//! Arena of [`Node`]s plus every operation that touches more than one node:
//! dirty propagation, hierarchy edits, global value resolution and bounds.
//!
//! Traversals use explicit stacks instead of recursion so that deep
//! hierarchies cannot overflow the call stack.

use glam::{Mat4, Quat, Vec3};
use slotmap::SlotMap;
use smallvec::{SmallVec, smallvec};

use crate::math::{self, Bounds3};
use crate::scene::NodeHandle;
use crate::scene::node::{LocalState, Node, NodeFlags, NodeKind};
use crate::scene::transform::Transform;

/// Supplies renderable bounds for model nodes.
pub trait BoundsProvider {
    /// Local-space bounds of the geometry attached to `model`.
    fn model_bounds(&self, model: NodeHandle, node: &Node) -> Bounds3;
}

impl<F> BoundsProvider for F
where
    F: Fn(NodeHandle, &Node) -> Bounds3,
{
    fn model_bounds(&self, model: NodeHandle, node: &Node) -> Bounds3 {
        self(model, node)
    }
}

/// Reports a broken calling contract: panics in debug builds, logs and
/// returns `false` otherwise. Callers must check before mutating anything.
fn contract_violation(message: &str) -> bool {
    if cfg!(debug_assertions) {
        panic!("{message}");
    }
    log::warn!("Scene graph contract violation: {message}");
    false
}

/// Values a child reads from its parent while resolving.
struct ParentValues {
    kind: NodeKind,
    flags: NodeFlags,
    global_transform: Mat4,
    global_opacity: f32,
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    nodes: SlotMap<NodeHandle, Node>,
}

impl SceneGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: SlotMap::with_capacity_and_key(capacity),
        }
    }

    // ========================================================================
    // Arena
    // ========================================================================

    /// Inserts a detached node. Its `parent` and `children` are reset so the
    /// arena never starts with half-linked nodes.
    pub fn insert(&mut self, mut node: Node) -> NodeHandle {
        node.parent = None;
        node.children.clear();
        self.nodes.insert(node)
    }

    pub fn create_node(&mut self, kind: NodeKind) -> NodeHandle {
        self.insert(Node::new(kind))
    }

    /// Removes a node from the arena.
    ///
    /// Unlinking is a separate step: the node must already be detached
    /// (no parent, no children), otherwise `None` is returned and nothing
    /// changes. Layers that still list the node drop it, and nodes that use
    /// it as their instance root lose that relation.
    ///
    /// Finding those references scans the whole arena, so removing N nodes
    /// one by one costs O(N²).
    pub fn remove_node(&mut self, handle: NodeHandle) -> Option<Node> {
        let node = self.nodes.get(handle)?;
        if node.parent.is_some() || !node.children.is_empty() {
            log::warn!(
                "Refusing to remove node {:?} ({}) that is still linked into the graph",
                handle,
                node.debug_name.as_deref().unwrap_or("unnamed")
            );
            return None;
        }

        let removed = self.nodes.remove(handle)?;

        let mut orphaned_instances: SmallVec<[NodeHandle; 8]> = SmallVec::new();
        for (h, other) in &mut self.nodes {
            if other.kind == NodeKind::Layer {
                other.children.retain(|&c| c != handle);
            }
            if other.instance_root == Some(handle) {
                other.instance_root = None;
                orphaned_instances.push(h);
            }
        }
        for h in orphaned_instances {
            self.mark_dirty(h, NodeFlags::TRANSFORM_DIRTY);
        }

        Some(removed)
    }

    #[inline]
    #[must_use]
    pub fn get(&self, handle: NodeHandle) -> Option<&Node> {
        self.nodes.get(handle)
    }

    /// Mutable access to a node's plain fields (`static_flags`, `dfs_index`,
    /// `debug_name`). Properties that feed global values go through the
    /// setters below so they can mark the node dirty.
    #[inline]
    pub fn get_mut(&mut self, handle: NodeHandle) -> Option<&mut Node> {
        self.nodes.get_mut(handle)
    }

    #[inline]
    #[must_use]
    pub fn contains(&self, handle: NodeHandle) -> bool {
        self.nodes.contains_key(handle)
    }

    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeHandle, &Node)> {
        self.nodes.iter()
    }

    /// Child handles of `handle`, in insertion order.
    pub fn children(&self, handle: NodeHandle) -> impl Iterator<Item = NodeHandle> + '_ {
        self.nodes
            .get(handle)
            .map(|n| n.children.as_slice())
            .unwrap_or_default()
            .iter()
            .copied()
    }

    #[must_use]
    pub fn last_child(&self, handle: NodeHandle) -> Option<NodeHandle> {
        self.nodes.get(handle).and_then(Node::last_child)
    }

    // ========================================================================
    // Dirty Propagation
    // ========================================================================

    /// Sets the dirty bits in `flag` on `handle`.
    ///
    /// Bits that are already set are skipped. If any newly set bit belongs to
    /// [`NodeFlags::GLOBAL_VALUES_DIRTY`], every descendant is marked with
    /// `flag` too.
    pub fn mark_dirty(&mut self, handle: NodeHandle, flag: NodeFlags) {
        let flag = flag & NodeFlags::DIRTY_MASK;
        if flag.is_empty() {
            return;
        }

        let mut stack: SmallVec<[NodeHandle; 32]> = smallvec![handle];
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get_mut(current) else {
                continue;
            };

            let missing = flag - node.flags;
            if missing.is_empty() {
                continue;
            }
            node.flags.insert(missing);

            if missing.intersects(NodeFlags::GLOBAL_VALUES_DIRTY) {
                stack.extend(node.children.iter().copied());
            }
        }
    }

    pub fn clear_dirty(&mut self, handle: NodeHandle, flag: NodeFlags) {
        if let Some(node) = self.nodes.get_mut(handle) {
            node.clear_dirty(flag);
        }
    }

    /// Sets a local state bit. Returns `true` if the state changed, in which
    /// case the matching dirty bit is marked.
    pub fn set_state(&mut self, handle: NodeHandle, state: LocalState, on: bool) -> bool {
        let Some(node) = self.nodes.get_mut(handle) else {
            return false;
        };
        if node.local_state(state) == on {
            return false;
        }
        node.flags.set(state.flag(), on);
        self.mark_dirty(handle, state.dirty_flag());
        true
    }

    // ========================================================================
    // Global Values
    // ========================================================================

    /// Resolves the global transform, opacity and state of `handle`.
    ///
    /// Dirty ancestors are resolved first, so callers do not need to visit
    /// nodes in depth order. Returns `true` if the node was dirty and is
    /// locally active. Calling it on a clean node does no work.
    pub fn calculate_global_variables(&mut self, handle: NodeHandle) -> bool {
        let Some(node) = self.nodes.get(handle) else {
            return false;
        };
        if !node.is_dirty(NodeFlags::GLOBAL_VALUES_DIRTY) {
            return false;
        }
        let locally_active = node.local_state(LocalState::Active);

        // Chain of dirty nodes from `handle` up to the first clean ancestor.
        let mut chain: SmallVec<[NodeHandle; 16]> = smallvec![handle];
        let mut cursor = node.parent;
        while let Some(parent) = cursor {
            match self.nodes.get(parent) {
                Some(p) if p.is_dirty(NodeFlags::GLOBAL_VALUES_DIRTY) => {
                    // Parent links are acyclic; add_child rejects cycles.
                    chain.push(parent);
                    cursor = p.parent;
                }
                _ => break,
            }
        }

        for &current in chain.iter().rev() {
            self.resolve_node(current);
        }

        locally_active
    }

    /// Resolves one dirty node whose parent is already clean.
    fn resolve_node(&mut self, handle: NodeHandle) {
        let Some(node) = self.nodes.get(handle) else {
            return;
        };

        let parent = node.parent.and_then(|p| {
            self.nodes.get(p).map(|pn| ParentValues {
                kind: pn.kind,
                flags: pn.flags,
                global_transform: pn.global_transform,
                global_opacity: pn.global_opacity,
            })
        });

        // Case 2 reads other nodes, so gather it before borrowing mutably.
        let instance_from_root = match (&parent, node.instance_root) {
            (Some(_), Some(root)) if root != handle => self
                .nodes
                .get(root)
                .map(|r| (r.global_instance_transform, self.accumulate_instance_local(handle, root))),
            _ => None,
        };

        let Some(node) = self.nodes.get_mut(handle) else {
            return;
        };

        node.global_opacity = node.local_opacity;
        node.global_transform = node.local_transform;

        if let Some(parent) = parent {
            let globally_active = node.flags.contains(NodeFlags::ACTIVE)
                && parent.flags.contains(NodeFlags::GLOBALLY_ACTIVE);
            let globally_pickable = node.flags.contains(NodeFlags::PICKABLE)
                || parent.flags.contains(NodeFlags::GLOBALLY_PICKABLE);
            node.flags.set(NodeFlags::GLOBALLY_ACTIVE, globally_active);
            node.flags.set(NodeFlags::GLOBALLY_PICKABLE, globally_pickable);

            node.global_opacity *= parent.global_opacity;

            // Layers are render-pass roots, not spatial ancestors.
            if globally_active && parent.kind != NodeKind::Layer {
                node.global_transform = parent.global_transform * node.local_transform;

                if node.instance_root == Some(handle) {
                    node.global_instance_transform = parent.global_transform;
                    node.local_instance_transform = node.local_transform;
                } else if let Some((root_global, accumulated)) = instance_from_root {
                    node.global_instance_transform = root_global;
                    node.local_instance_transform = accumulated;
                } else {
                    let mut local = node.local_transform;
                    let translation = math::translation(&local);
                    local.w_axis = glam::Vec4::W;
                    node.local_instance_transform = local;
                    node.global_instance_transform =
                        parent.global_transform * Mat4::from_translation(translation);
                }
            }
        } else {
            let active = node.flags.contains(NodeFlags::ACTIVE);
            let pickable = node.flags.contains(NodeFlags::PICKABLE);
            node.flags.set(NodeFlags::GLOBALLY_ACTIVE, active);
            node.flags.set(NodeFlags::GLOBALLY_PICKABLE, pickable);
            node.local_instance_transform = node.local_transform;
            node.global_instance_transform = Mat4::IDENTITY;
        }

        node.clear_dirty(NodeFlags::GLOBAL_VALUES_DIRTY);
    }

    /// Product of local transforms from `handle` up to (and including the
    /// instance-local transform of) `root`.
    ///
    /// O(depth) per call. If `root` is not an ancestor the whole chain is used.
    fn accumulate_instance_local(&self, handle: NodeHandle, root: NodeHandle) -> Mat4 {
        let Some(node) = self.nodes.get(handle) else {
            return Mat4::IDENTITY;
        };

        let mut accumulated = node.local_transform;
        let mut cursor = node.parent;
        let mut reached_root = false;
        while let Some(current) = cursor {
            let Some(p) = self.nodes.get(current) else {
                break;
            };
            if current == root {
                accumulated = p.local_instance_transform * accumulated;
                reached_root = true;
                break;
            }
            accumulated = p.local_transform * accumulated;
            cursor = p.parent;
        }

        if !reached_root {
            log::debug!("Instance root {root:?} is not an ancestor of {handle:?}");
        }
        accumulated
    }

    // ========================================================================
    // Hierarchy
    // ========================================================================

    /// True if `ancestor` is reached by following `node`'s parent links.
    /// Layer listings are not parent links and are never followed.
    #[must_use]
    pub fn is_descendant_of(&self, node: NodeHandle, ancestor: NodeHandle) -> bool {
        let mut cursor = self.nodes.get(node).and_then(|n| n.parent);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.nodes.get(current).and_then(|n| n.parent);
        }
        false
    }

    /// Appends `child` to `parent`'s child list.
    ///
    /// A non-Layer parent takes ownership of the link: the child is detached
    /// from its previous parent first. A Layer only lists the child, so the
    /// same node may appear under several layers. The child's global values
    /// are marked dirty.
    pub fn add_child(&mut self, parent: NodeHandle, child: NodeHandle) -> bool {
        let Some(parent_kind) = self.nodes.get(parent).map(|n| n.kind) else {
            return contract_violation("add_child: parent is not in the graph");
        };
        if !self.nodes.contains_key(child) {
            return contract_violation("add_child: child is not in the graph");
        }
        if parent == child {
            return contract_violation("add_child: a node cannot be its own child");
        }
        if self.is_descendant_of(parent, child) {
            return contract_violation("add_child: the link would create a cycle");
        }

        if parent_kind == NodeKind::Layer {
            if self.nodes[parent].children.contains(&child) {
                return true;
            }
        } else {
            if let Some(old_parent) = self.nodes[child].parent
                && let Some(old) = self.nodes.get_mut(old_parent)
            {
                old.children.retain(|&c| c != child);
            }
            self.nodes[child].parent = Some(parent);
        }

        self.nodes[parent].children.push(child);
        self.mark_dirty(child, NodeFlags::GLOBAL_VALUES_DIRTY);
        true
    }

    /// Appends `child` to a Layer without touching the child's parent.
    pub fn add_children_to_layer(&mut self, layer: NodeHandle, child: NodeHandle) -> bool {
        match self.nodes.get(layer).map(|n| n.kind) {
            Some(NodeKind::Layer) => self.add_child(layer, child),
            Some(_) => contract_violation("add_children_to_layer: target is not a Layer"),
            None => contract_violation("add_children_to_layer: layer is not in the graph"),
        }
    }

    /// Unlinks `child` from `parent`.
    ///
    /// For a non-Layer parent `child` must be one of its children. Only a
    /// non-Layer removal clears the child's parent link, since a Layer never
    /// set it.
    pub fn remove_child(&mut self, parent: NodeHandle, child: NodeHandle) -> bool {
        let Some(parent_node) = self.nodes.get(parent) else {
            return contract_violation("remove_child: parent is not in the graph");
        };
        let is_layer = parent_node.kind == NodeKind::Layer;
        let listed = parent_node.children.contains(&child);
        let linked = self.nodes.get(child).is_some_and(|c| c.parent == Some(parent));

        if is_layer {
            if !listed {
                return contract_violation("remove_child: node is not listed by this layer");
            }
        } else if !linked {
            return contract_violation("remove_child: node is not a child of this parent");
        }

        self.nodes[parent].children.retain(|&c| c != child);
        if !is_layer && let Some(c) = self.nodes.get_mut(child) {
            c.parent = None;
        }
        self.mark_dirty(child, NodeFlags::GLOBAL_VALUES_DIRTY);
        true
    }

    /// Detaches `handle` from its parent and orphans all of its children.
    ///
    /// Children stay in the arena with no parent; their global values are
    /// marked dirty.
    pub fn remove_from_graph(&mut self, handle: NodeHandle) {
        let Some(node) = self.nodes.get(handle) else {
            return;
        };

        if let Some(parent) = node.parent {
            if self.nodes.contains_key(parent) {
                self.remove_child(parent, handle);
            } else if let Some(n) = self.nodes.get_mut(handle) {
                n.parent = None;
            }
        }

        let children = self
            .nodes
            .get_mut(handle)
            .map(|n| std::mem::take(&mut n.children))
            .unwrap_or_default();
        for child in children {
            if let Some(c) = self.nodes.get_mut(child)
                && c.parent == Some(handle)
            {
                c.parent = None;
            }
            self.mark_dirty(child, NodeFlags::GLOBAL_VALUES_DIRTY);
        }
    }

    /// Sets (or clears) the instance root used for instancing transforms.
    pub fn set_instance_root(&mut self, handle: NodeHandle, root: Option<NodeHandle>) {
        let Some(node) = self.nodes.get_mut(handle) else {
            return;
        };
        if node.instance_root == root {
            return;
        }
        node.instance_root = root;
        self.mark_dirty(handle, NodeFlags::TRANSFORM_DIRTY);
    }

    // ========================================================================
    // Local Properties
    // ========================================================================

    /// Applies `edit` to the node's TRS. On change, rebuilds the local matrix
    /// and marks the transform dirty.
    fn edit_transform(&mut self, handle: NodeHandle, edit: impl FnOnce(&mut Transform)) -> bool {
        let Some(node) = self.nodes.get_mut(handle) else {
            return false;
        };
        let before = node.transform;
        edit(&mut node.transform);
        if node.transform == before {
            return false;
        }
        node.local_transform = node.transform.matrix();
        self.mark_dirty(handle, NodeFlags::TRANSFORM_DIRTY);
        true
    }

    pub fn set_position(&mut self, handle: NodeHandle, position: Vec3) -> bool {
        self.edit_transform(handle, |t| t.position = position)
    }

    pub fn set_rotation(&mut self, handle: NodeHandle, rotation: Quat) -> bool {
        self.edit_transform(handle, |t| t.rotation = rotation)
    }

    pub fn set_scale(&mut self, handle: NodeHandle, scale: Vec3) -> bool {
        self.edit_transform(handle, |t| t.scale = scale)
    }

    pub fn set_pivot(&mut self, handle: NodeHandle, pivot: Vec3) -> bool {
        self.edit_transform(handle, |t| t.pivot = pivot)
    }

    pub fn set_transform(&mut self, handle: NodeHandle, transform: Transform) -> bool {
        self.edit_transform(handle, |t| *t = transform)
    }

    /// Stores `matrix` as the local transform and decomposes it into TRS.
    ///
    /// The pivot is cleared. The matrix itself is kept verbatim, so any shear
    /// survives in `local_transform` even though the TRS cannot express it.
    pub fn set_local_transform_from_matrix(&mut self, handle: NodeHandle, matrix: Mat4) {
        let Some(node) = self.nodes.get_mut(handle) else {
            return;
        };
        node.transform = Transform::from_matrix(&matrix);
        node.local_transform = matrix;
        self.mark_dirty(handle, NodeFlags::TRANSFORM_DIRTY);
    }

    pub fn set_local_opacity(&mut self, handle: NodeHandle, opacity: f32) -> bool {
        let Some(node) = self.nodes.get_mut(handle) else {
            return false;
        };
        if node.local_opacity == opacity {
            return false;
        }
        node.local_opacity = opacity;
        self.mark_dirty(handle, NodeFlags::OPACITY_DIRTY);
        true
    }

    // ========================================================================
    // Bounds
    // ========================================================================

    /// Bounds of `handle` in its own local space, optionally including all
    /// descendants.
    #[must_use]
    pub fn get_bounds(
        &self,
        handle: NodeHandle,
        provider: &dyn BoundsProvider,
        include_children: bool,
    ) -> Bounds3 {
        self.get_bounds_filtered(handle, provider, include_children, None)
    }

    /// Like [`SceneGraph::get_bounds`], but `filter` decides which children
    /// (and therefore which subtrees) contribute.
    #[must_use]
    pub fn get_bounds_filtered(
        &self,
        handle: NodeHandle,
        provider: &dyn BoundsProvider,
        include_children: bool,
        filter: Option<&dyn Fn(NodeHandle, &Node) -> bool>,
    ) -> Bounds3 {
        let mut bounds = Bounds3::empty();
        let Some(node) = self.nodes.get(handle) else {
            return bounds;
        };

        if node.kind == NodeKind::Model {
            bounds.include(&provider.model_bounds(handle, node));
        }
        if include_children {
            bounds.include(&self.get_child_bounds(handle, provider, filter));
        }
        bounds
    }

    /// Union of all children's bounds, each transformed by that child's
    /// local transform into `handle`'s space.
    #[must_use]
    pub fn get_child_bounds(
        &self,
        handle: NodeHandle,
        provider: &dyn BoundsProvider,
        filter: Option<&dyn Fn(NodeHandle, &Node) -> bool>,
    ) -> Bounds3 {
        let mut bounds = Bounds3::empty();
        for child in self.children(handle) {
            let Some(child_node) = self.nodes.get(child) else {
                continue;
            };
            if filter.is_some_and(|f| !f(child, child_node)) {
                continue;
            }

            // A Layer listed under another node contributes only itself.
            let expand = child_node.kind != NodeKind::Layer;
            let child_bounds = self.get_bounds_filtered(child, provider, expand, filter);
            if !child_bounds.is_empty() {
                bounds.include(&child_bounds.transformed(&child_node.local_transform));
            }
        }
        bounds
    }
}
