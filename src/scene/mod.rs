//! Scene graph module
//!
//! - Node: per-node data, state and dirty flags
//! - SceneGraph: node arena, dirty propagation, hierarchy and global values
//! - Transform: TRS + pivot component
//! - Camera: render camera and viewport
//! - Light: light data for shadow preparation

pub mod camera;
pub mod graph;
pub mod light;
pub mod node;
pub mod transform;

pub use camera::{Camera, Viewport};
pub use graph::{BoundsProvider, SceneGraph};
pub use light::{Light, LightKind};
pub use node::{GlobalState, LocalState, Node, NodeFlags, NodeKind};
pub use transform::{Transform, calculate_transform_matrix};

use slotmap::new_key_type;

new_key_type! {
    /// Stable handle to a node in a [`SceneGraph`].
    pub struct NodeHandle;
}
