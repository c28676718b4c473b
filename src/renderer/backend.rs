//! GPU Capability Contract
//!
//! The minimum a graphics backend must offer for shadow maps: 2D and cube
//! textures, a depth-stencil buffer, render targets over texture layers,
//! render-pass descriptors and a couple of capability queries.
//!
//! [`WgpuShadowBackend`](crate::renderer::WgpuShadowBackend) is the production
//! implementation. Tests provide a tracking double.

use crate::errors::Result;

/// Texture shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    D2,
    /// Six square layers, one per cube face.
    Cube,
}

impl TextureKind {
    #[inline]
    #[must_use]
    pub const fn layer_count(self) -> u32 {
        match self {
            Self::D2 => 1,
            Self::Cube => 6,
        }
    }
}

/// Color texture that shadow passes render into and later sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowTextureDesc<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub kind: TextureKind,
}

/// Render-only depth-stencil buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DepthStencilDesc<'a> {
    pub label: &'a str,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
}

/// Shape of a render pass: everything a descriptor depends on.
///
/// Used as the cache key for descriptors, so equal keys share one descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RenderPassKey {
    pub color_format: wgpu::TextureFormat,
    pub color_attachments: u32,
    pub depth_stencil_format: Option<wgpu::TextureFormat>,
}

/// One color attachment: a single layer of a texture.
#[derive(Debug)]
pub struct ColorAttachment<'a, T> {
    pub texture: &'a T,
    pub layer: u32,
}

impl<T> Clone for ColorAttachment<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ColorAttachment<'_, T> {}

/// Everything needed to build a render target.
pub struct RenderTargetDesc<'a, T, RB, RP> {
    pub label: &'a str,
    pub color_attachments: &'a [ColorAttachment<'a, T>],
    pub depth_stencil: Option<&'a RB>,
    pub render_pass: &'a RP,
}

/// GPU operations required by the [`ShadowMapManager`](crate::renderer::ShadowMapManager).
///
/// Creation reports failures as [`UmbraError`](crate::errors::UmbraError).
/// Each created object is handed back through exactly one `release_*` call.
pub trait ShadowBackend {
    type Texture;
    type RenderBuffer;
    type RenderTarget;
    type RenderPassDesc: Clone;

    // === Capabilities ===

    /// Whether `format` can be both rendered to and sampled as `kind`.
    fn is_texture_format_supported(&self, format: wgpu::TextureFormat, kind: TextureKind) -> bool;

    /// Maximum simultaneous color attachments of one render target.
    fn max_color_attachments(&self) -> u32;

    // === Creation ===

    fn create_texture(&mut self, desc: &ShadowTextureDesc<'_>) -> Result<Self::Texture>;

    fn create_depth_stencil(&mut self, desc: &DepthStencilDesc<'_>) -> Result<Self::RenderBuffer>;

    fn create_render_pass_descriptor(&mut self, key: &RenderPassKey) -> Result<Self::RenderPassDesc>;

    fn create_render_target(
        &mut self,
        desc: &RenderTargetDesc<'_, Self::Texture, Self::RenderBuffer, Self::RenderPassDesc>,
    ) -> Result<Self::RenderTarget>;

    /// Whether `target` can be rendered with pipelines built for `pass`.
    fn is_render_pass_compatible(&self, pass: &Self::RenderPassDesc, target: &Self::RenderTarget) -> bool;

    // === Release ===

    fn release_texture(&mut self, texture: Self::Texture);

    fn release_render_buffer(&mut self, buffer: Self::RenderBuffer);

    fn release_render_target(&mut self, target: Self::RenderTarget);

    fn release_render_pass_descriptor(&mut self, pass: Self::RenderPassDesc);
}
