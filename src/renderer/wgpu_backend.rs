//! wgpu implementation of [`ShadowBackend`].
//!
//! wgpu reports most creation errors through the device's uncaptured error
//! handler instead of return values, so every request is validated against
//! the device limits and format capabilities before it reaches wgpu.

use smallvec::SmallVec;

use crate::errors::{Result, UmbraError};
use crate::renderer::backend::{
    DepthStencilDesc, RenderPassKey, RenderTargetDesc, ShadowBackend, ShadowTextureDesc,
    TextureKind,
};
use crate::renderer::tracked::Tracked;

/// Attachment layout of a render pass.
///
/// wgpu has no render pass object; pipelines are built against these formats
/// and a target is compatible when its attachments match them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RenderPassLayout {
    pub color_formats: SmallVec<[wgpu::TextureFormat; 6]>,
    pub depth_stencil_format: Option<wgpu::TextureFormat>,
}

/// Views bound as attachments of one shadow render pass.
#[derive(Debug)]
pub struct WgpuRenderTarget {
    pub color_views: SmallVec<[Tracked<wgpu::TextureView>; 6]>,
    pub depth_stencil_view: Option<Tracked<wgpu::TextureView>>,
    pub layout: RenderPassLayout,
    pub width: u32,
    pub height: u32,
}

impl WgpuRenderTarget {
    /// Color attachments for `wgpu::RenderPassDescriptor`, cleared to white
    /// (the farthest depth).
    #[must_use]
    pub fn color_attachments(&self) -> SmallVec<[Option<wgpu::RenderPassColorAttachment<'_>>; 6]> {
        self.color_views
            .iter()
            .map(|view| {
                Some(wgpu::RenderPassColorAttachment {
                    view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect()
    }

    #[must_use]
    pub fn depth_stencil_attachment(&self) -> Option<wgpu::RenderPassDepthStencilAttachment<'_>> {
        self.depth_stencil_view
            .as_ref()
            .map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(0),
                    store: wgpu::StoreOp::Discard,
                }),
            })
    }
}

pub struct WgpuShadowBackend {
    device: wgpu::Device,
    limits: wgpu::Limits,
}

impl WgpuShadowBackend {
    #[must_use]
    pub fn new(device: &wgpu::Device) -> Self {
        Self {
            device: device.clone(),
            limits: device.limits(),
        }
    }

    #[must_use]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    /// View sampling a whole shadow texture: 2D for maps, cube for cube maps.
    #[must_use]
    pub fn sampling_view(texture: &Tracked<wgpu::Texture>) -> Tracked<wgpu::TextureView> {
        let dimension = if texture.depth_or_array_layers() == 6 {
            wgpu::TextureViewDimension::Cube
        } else {
            wgpu::TextureViewDimension::D2
        };
        Tracked::new(texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("shadow sampling view"),
            dimension: Some(dimension),
            ..Default::default()
        }))
    }

    fn check_size(&self, purpose: &str, width: u32, height: u32) -> Result<()> {
        if width == 0 || height == 0 {
            return Err(UmbraError::ResourceCreation {
                purpose: purpose.to_string(),
                width,
                height,
                reason: "zero-sized texture".to_string(),
            });
        }
        let max = self.limits.max_texture_dimension_2d;
        let size = width.max(height);
        if size > max {
            return Err(UmbraError::TextureTooLarge { size, max });
        }
        Ok(())
    }

    fn format_usable(&self, format: wgpu::TextureFormat, usage: wgpu::TextureUsages) -> bool {
        if !self.device.features().contains(format.required_features()) {
            return false;
        }
        format
            .guaranteed_format_features(self.device.features())
            .allowed_usages
            .contains(usage)
    }
}

const SHADOW_TEXTURE_USAGE: wgpu::TextureUsages =
    wgpu::TextureUsages::RENDER_ATTACHMENT.union(wgpu::TextureUsages::TEXTURE_BINDING);

impl ShadowBackend for WgpuShadowBackend {
    type Texture = Tracked<wgpu::Texture>;
    type RenderBuffer = Tracked<wgpu::Texture>;
    type RenderTarget = WgpuRenderTarget;
    type RenderPassDesc = RenderPassLayout;

    fn is_texture_format_supported(&self, format: wgpu::TextureFormat, kind: TextureKind) -> bool {
        if kind == TextureKind::Cube && self.limits.max_texture_array_layers < 6 {
            return false;
        }
        self.format_usable(format, SHADOW_TEXTURE_USAGE)
    }

    fn max_color_attachments(&self) -> u32 {
        self.limits.max_color_attachments
    }

    fn create_texture(&mut self, desc: &ShadowTextureDesc<'_>) -> Result<Self::Texture> {
        self.check_size(desc.label, desc.width, desc.height)?;
        if !self.is_texture_format_supported(desc.format, desc.kind) {
            return Err(UmbraError::UnsupportedTextureFormat(desc.format));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: desc.kind.layer_count(),
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: SHADOW_TEXTURE_USAGE,
            view_formats: &[],
        });
        Ok(Tracked::new(texture))
    }

    fn create_depth_stencil(&mut self, desc: &DepthStencilDesc<'_>) -> Result<Self::RenderBuffer> {
        self.check_size(desc.label, desc.width, desc.height)?;
        if !desc.format.is_depth_stencil_format()
            || !self.format_usable(desc.format, wgpu::TextureUsages::RENDER_ATTACHMENT)
        {
            return Err(UmbraError::UnsupportedTextureFormat(desc.format));
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width: desc.width,
                height: desc.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        Ok(Tracked::new(texture))
    }

    fn create_render_pass_descriptor(&mut self, key: &RenderPassKey) -> Result<Self::RenderPassDesc> {
        if key.color_attachments == 0 {
            return Err(UmbraError::InvalidRenderTarget(
                "render pass without color attachments".to_string(),
            ));
        }
        if key.color_attachments > self.limits.max_color_attachments {
            return Err(UmbraError::TooManyColorAttachments {
                requested: key.color_attachments,
                max: self.limits.max_color_attachments,
            });
        }

        Ok(RenderPassLayout {
            color_formats: (0..key.color_attachments).map(|_| key.color_format).collect(),
            depth_stencil_format: key.depth_stencil_format,
        })
    }

    fn create_render_target(
        &mut self,
        desc: &RenderTargetDesc<'_, Self::Texture, Self::RenderBuffer, Self::RenderPassDesc>,
    ) -> Result<Self::RenderTarget> {
        let Some(first) = desc.color_attachments.first() else {
            return Err(UmbraError::InvalidRenderTarget(format!(
                "'{}' has no color attachments",
                desc.label
            )));
        };
        let requested = desc.color_attachments.len() as u32;
        if requested > self.limits.max_color_attachments {
            return Err(UmbraError::TooManyColorAttachments {
                requested,
                max: self.limits.max_color_attachments,
            });
        }

        let (width, height) = (first.texture.width(), first.texture.height());
        let mut color_views = SmallVec::new();
        let mut color_formats = SmallVec::new();
        for attachment in desc.color_attachments {
            let texture = attachment.texture;
            if attachment.layer >= texture.depth_or_array_layers() {
                return Err(UmbraError::InvalidRenderTarget(format!(
                    "'{}' attaches layer {} of a {}-layer texture",
                    desc.label,
                    attachment.layer,
                    texture.depth_or_array_layers()
                )));
            }
            color_views.push(Tracked::new(texture.create_view(&wgpu::TextureViewDescriptor {
                label: Some(desc.label),
                dimension: Some(wgpu::TextureViewDimension::D2),
                base_array_layer: attachment.layer,
                array_layer_count: Some(1),
                ..Default::default()
            })));
            color_formats.push(texture.format());
        }

        let depth_stencil_view = desc.depth_stencil.map(|depth| {
            Tracked::new(depth.create_view(&wgpu::TextureViewDescriptor {
                label: Some(desc.label),
                ..Default::default()
            }))
        });

        Ok(WgpuRenderTarget {
            color_views,
            depth_stencil_view,
            layout: RenderPassLayout {
                color_formats,
                depth_stencil_format: desc.depth_stencil.map(|depth| depth.format()),
            },
            width,
            height,
        })
    }

    fn is_render_pass_compatible(&self, pass: &Self::RenderPassDesc, target: &Self::RenderTarget) -> bool {
        *pass == target.layout
    }

    fn release_texture(&mut self, texture: Self::Texture) {
        texture.destroy();
    }

    fn release_render_buffer(&mut self, buffer: Self::RenderBuffer) {
        buffer.destroy();
    }

    fn release_render_target(&mut self, target: Self::RenderTarget) {
        // Views keep no memory of their own once the texture is destroyed.
        drop(target);
    }

    fn release_render_pass_descriptor(&mut self, _pass: Self::RenderPassDesc) {}
}
