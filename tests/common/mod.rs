//! Resource-tracking `ShadowBackend` test double.
//!
//! Every created object gets a unique id recorded in a shared [`Ledger`];
//! releases remove it again. Double releases and leaks are observable after
//! the manager owning the backend is gone.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use umbra::errors::{Result, UmbraError};
use umbra::renderer::{
    DepthStencilDesc, RenderPassKey, RenderTargetDesc, ShadowBackend, ShadowMapManager,
    ShadowSettings, ShadowTextureDesc, TextureKind,
};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Texture(TextureKind),
    RenderBuffer,
    RenderTarget,
    RenderPass,
}

#[derive(Debug, Default)]
pub struct Ledger {
    next_id: u64,
    pub live: HashMap<u64, ResourceKind>,
    pub created: Vec<(u64, ResourceKind)>,
    pub released: Vec<u64>,
    pub double_releases: Vec<u64>,
}

impl Ledger {
    fn create(&mut self, kind: ResourceKind) -> u64 {
        self.next_id += 1;
        let id = self.next_id;
        self.live.insert(id, kind);
        self.created.push((id, kind));
        id
    }

    fn release(&mut self, id: u64) {
        if self.live.remove(&id).is_some() {
            self.released.push(id);
        } else {
            self.double_releases.push(id);
        }
    }

    pub fn created_count(&self, kind: ResourceKind) -> usize {
        self.created.iter().filter(|(_, k)| *k == kind).count()
    }

    pub fn live_count(&self, kind: ResourceKind) -> usize {
        self.live.values().filter(|k| **k == kind).count()
    }

    pub fn release_count(&self, id: u64) -> usize {
        self.released.iter().filter(|r| **r == id).count()
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct TestTexture {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub format: wgpu::TextureFormat,
    pub kind: TextureKind,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TestRenderBuffer {
    pub id: u64,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, PartialEq, Eq)]
pub struct TestRenderTarget {
    pub id: u64,
    /// `(texture id, layer)` per color attachment.
    pub attachments: Vec<(u64, u32)>,
    pub depth_stencil: Option<u64>,
    pub pass: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestRenderPass {
    pub id: u64,
    pub key: RenderPassKey,
}

pub struct TrackingBackend {
    pub ledger: Rc<RefCell<Ledger>>,
    pub max_color_attachments: u32,
    pub supported_formats: Vec<wgpu::TextureFormat>,
    pub fail_textures: bool,
    pub fail_depth_stencil: bool,
    pub fail_render_targets: bool,
    pub incompatible_passes: bool,
}

impl TrackingBackend {
    pub fn new() -> Self {
        Self {
            ledger: Rc::new(RefCell::new(Ledger::default())),
            max_color_attachments: 8,
            supported_formats: vec![
                wgpu::TextureFormat::R16Float,
                wgpu::TextureFormat::R16Unorm,
            ],
            fail_textures: false,
            fail_depth_stencil: false,
            fail_render_targets: false,
            incompatible_passes: false,
        }
    }

    /// A backend plus a handle to its ledger that outlives the manager.
    pub fn with_ledger() -> (Self, Rc<RefCell<Ledger>>) {
        let backend = Self::new();
        let ledger = Rc::clone(&backend.ledger);
        (backend, ledger)
    }

    fn failure(purpose: &str, width: u32, height: u32) -> UmbraError {
        UmbraError::ResourceCreation {
            purpose: purpose.to_string(),
            width,
            height,
            reason: "injected failure".to_string(),
        }
    }
}

impl ShadowBackend for TrackingBackend {
    type Texture = TestTexture;
    type RenderBuffer = TestRenderBuffer;
    type RenderTarget = TestRenderTarget;
    type RenderPassDesc = TestRenderPass;

    fn is_texture_format_supported(&self, format: wgpu::TextureFormat, _kind: TextureKind) -> bool {
        self.supported_formats.contains(&format)
    }

    fn max_color_attachments(&self) -> u32 {
        self.max_color_attachments
    }

    fn create_texture(&mut self, desc: &ShadowTextureDesc<'_>) -> Result<Self::Texture> {
        if self.fail_textures {
            return Err(Self::failure(desc.label, desc.width, desc.height));
        }
        let id = self.ledger.borrow_mut().create(ResourceKind::Texture(desc.kind));
        Ok(TestTexture {
            id,
            width: desc.width,
            height: desc.height,
            format: desc.format,
            kind: desc.kind,
        })
    }

    fn create_depth_stencil(&mut self, desc: &DepthStencilDesc<'_>) -> Result<Self::RenderBuffer> {
        if self.fail_depth_stencil {
            return Err(Self::failure(desc.label, desc.width, desc.height));
        }
        let id = self.ledger.borrow_mut().create(ResourceKind::RenderBuffer);
        Ok(TestRenderBuffer {
            id,
            width: desc.width,
            height: desc.height,
        })
    }

    fn create_render_pass_descriptor(&mut self, key: &RenderPassKey) -> Result<Self::RenderPassDesc> {
        let id = self.ledger.borrow_mut().create(ResourceKind::RenderPass);
        Ok(TestRenderPass { id, key: *key })
    }

    fn create_render_target(
        &mut self,
        desc: &RenderTargetDesc<'_, Self::Texture, Self::RenderBuffer, Self::RenderPassDesc>,
    ) -> Result<Self::RenderTarget> {
        if self.fail_render_targets {
            return Err(Self::failure(desc.label, 0, 0));
        }
        if desc.color_attachments.len() as u32 > self.max_color_attachments {
            return Err(UmbraError::TooManyColorAttachments {
                requested: desc.color_attachments.len() as u32,
                max: self.max_color_attachments,
            });
        }
        let id = self.ledger.borrow_mut().create(ResourceKind::RenderTarget);
        Ok(TestRenderTarget {
            id,
            attachments: desc
                .color_attachments
                .iter()
                .map(|a| (a.texture.id, a.layer))
                .collect(),
            depth_stencil: desc.depth_stencil.map(|d| d.id),
            pass: desc.render_pass.id,
        })
    }

    fn is_render_pass_compatible(&self, pass: &Self::RenderPassDesc, target: &Self::RenderTarget) -> bool {
        !self.incompatible_passes && pass.id == target.pass
    }

    fn release_texture(&mut self, texture: Self::Texture) {
        self.ledger.borrow_mut().release(texture.id);
    }

    fn release_render_buffer(&mut self, buffer: Self::RenderBuffer) {
        self.ledger.borrow_mut().release(buffer.id);
    }

    fn release_render_target(&mut self, target: Self::RenderTarget) {
        self.ledger.borrow_mut().release(target.id);
    }

    fn release_render_pass_descriptor(&mut self, pass: Self::RenderPassDesc) {
        self.ledger.borrow_mut().release(pass.id);
    }
}

pub fn manager_with(
    backend: TrackingBackend,
    settings: ShadowSettings,
) -> (ShadowMapManager<TrackingBackend>, Rc<RefCell<Ledger>>) {
    let ledger = Rc::clone(&backend.ledger);
    (ShadowMapManager::new(backend, settings), ledger)
}

pub fn default_manager() -> (ShadowMapManager<TrackingBackend>, Rc<RefCell<Ledger>>) {
    manager_with(TrackingBackend::new(), ShadowSettings::default())
}
