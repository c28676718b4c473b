//! Shadow Settings
//!
//! Configuration for shadow-map resource allocation.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use umbra::renderer::{ShadowMapManager, ShadowSettings};
//!
//! // Defaults: R16Float maps (R16Unorm fallback) with two-pass blur.
//! let manager = ShadowMapManager::new(backend, ShadowSettings::default());
//!
//! // Hard shadows without the blur render targets
//! let settings = ShadowSettings {
//!     enable_blur: false,
//!     ..Default::default()
//! };
//! ```

/// Shadow-map allocation settings.
#[derive(Debug, Clone, PartialEq)]
pub struct ShadowSettings {
    /// Allocate the two blur render targets per entry (X pass then Y pass).
    ///
    /// Cube entries additionally need at least 6 simultaneous color
    /// attachments; on devices below that their blur is skipped regardless.
    pub enable_blur: bool,

    /// Color format for depth maps and their blur copies.
    pub preferred_format: wgpu::TextureFormat,

    /// Used when `preferred_format` is not renderable on the device.
    pub fallback_format: wgpu::TextureFormat,

    /// Format of the throwaway depth-stencil buffer shared by an entry's targets.
    pub depth_stencil_format: wgpu::TextureFormat,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            enable_blur: true,
            preferred_format: wgpu::TextureFormat::R16Float,
            fallback_format: wgpu::TextureFormat::R16Unorm,
            depth_stencil_format: wgpu::TextureFormat::Depth24PlusStencil8,
        }
    }
}
