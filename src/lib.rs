//! Scene-graph and shadow-preparation core of a real-time 3D renderer.
//!
//! - [`scene`]: node arena with dirty propagation, global transform/opacity
//!   resolution and instancing transforms
//! - [`renderer`]: shadow camera fitting and the GPU lifecycle of shadow maps
//!
//! Everything runs single-threaded on the frame-preparation path.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod math;
pub mod renderer;
pub mod scene;

pub use errors::{Result, UmbraError};
pub use math::Bounds3;
pub use renderer::{
    CubeFace, ShadowBackend, ShadowMapEntry, ShadowMapManager, ShadowMapMode, ShadowSettings,
    WgpuShadowBackend,
};
pub use scene::{Camera, Light, LightKind, Node, NodeFlags, NodeHandle, NodeKind, SceneGraph, Viewport};
