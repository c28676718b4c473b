//! Shadow Map Manager
//!
//! Owns the GPU resources of every shadow-casting light and decides when they
//! can be reused and when they must be rebuilt.
//!
//! # Entry lifecycle
//!
//! | Existing entry | Request            | Result                          |
//! |----------------|--------------------|---------------------------------|
//! | none           | any                | allocate                        |
//! | VSM            | CUBE               | release VSM, allocate CUBE      |
//! | CUBE           | VSM                | release CUBE, allocate VSM      |
//! | same mode      | different size     | release, reallocate             |
//! | same mode      | same size          | reuse, refresh mode tag only    |
//!
//! Creation failures are logged and leave the affected resources `None`.
//! Renderers must check [`ShadowMapEntry::is_valid`] before drawing into an
//! entry; an invalid entry means "no shadow for this light".

use glam::Mat4;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::errors::UmbraError;
use crate::renderer::backend::{
    ColorAttachment, DepthStencilDesc, RenderPassKey, RenderTargetDesc, ShadowBackend,
    ShadowTextureDesc, TextureKind,
};
use crate::renderer::settings::ShadowSettings;

/// Shadow technique of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShadowMapMode {
    /// Variance shadow map: one blurred 2D depth map.
    Vsm,
    /// Omnidirectional shadow: a 6-face depth cube map.
    Cube,
}

impl ShadowMapMode {
    #[inline]
    #[must_use]
    pub const fn texture_kind(self) -> TextureKind {
        match self {
            Self::Vsm => TextureKind::D2,
            Self::Cube => TextureKind::Cube,
        }
    }

    /// Render targets of the depth pass: one per face.
    #[inline]
    #[must_use]
    pub const fn render_target_count(self) -> usize {
        match self {
            Self::Vsm => 1,
            Self::Cube => 6,
        }
    }
}

/// GPU resources and light matrices of one shadow-casting light.
pub struct ShadowMapEntry<B: ShadowBackend> {
    light_index: u32,
    mode: ShadowMapMode,
    width: u32,
    height: u32,
    format: Option<wgpu::TextureFormat>,

    // === VSM ===
    depth_map: Option<B::Texture>,
    depth_copy: Option<B::Texture>,

    // === CUBE ===
    depth_cube: Option<B::Texture>,
    cube_copy: Option<B::Texture>,

    depth_stencil: Option<B::RenderBuffer>,
    render_targets: SmallVec<[B::RenderTarget; 6]>,
    render_pass_desc: Option<B::RenderPassDesc>,

    /// `[0]` is the X pass (map -> copy), `[1]` the Y pass (copy -> map).
    blur_render_targets: [Option<B::RenderTarget>; 2],
    blur_render_pass_desc: Option<B::RenderPassDesc>,

    // === Light matrices, written during shadow preparation ===
    pub light_vp: Mat4,
    pub light_view: Mat4,
    pub light_cube_view: [Mat4; 6],
    pub light_cube_vp: [Mat4; 6],
}

impl<B: ShadowBackend> ShadowMapEntry<B> {
    fn new(light_index: u32, width: u32, height: u32, mode: ShadowMapMode) -> Self {
        Self {
            light_index,
            mode,
            width,
            height,
            format: None,
            depth_map: None,
            depth_copy: None,
            depth_cube: None,
            cube_copy: None,
            depth_stencil: None,
            render_targets: SmallVec::new(),
            render_pass_desc: None,
            blur_render_targets: [None, None],
            blur_render_pass_desc: None,
            light_vp: Mat4::IDENTITY,
            light_view: Mat4::IDENTITY,
            light_cube_view: [Mat4::IDENTITY; 6],
            light_cube_vp: [Mat4::IDENTITY; 6],
        }
    }

    #[inline]
    #[must_use]
    pub fn light_index(&self) -> u32 {
        self.light_index
    }

    #[inline]
    #[must_use]
    pub fn mode(&self) -> ShadowMapMode {
        self.mode
    }

    #[inline]
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Color format picked at allocation, `None` if no candidate was supported.
    #[inline]
    #[must_use]
    pub fn format(&self) -> Option<wgpu::TextureFormat> {
        self.format
    }

    #[inline]
    #[must_use]
    pub fn depth_map(&self) -> Option<&B::Texture> {
        self.depth_map.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn depth_copy(&self) -> Option<&B::Texture> {
        self.depth_copy.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn depth_cube(&self) -> Option<&B::Texture> {
        self.depth_cube.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn cube_copy(&self) -> Option<&B::Texture> {
        self.cube_copy.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn depth_stencil(&self) -> Option<&B::RenderBuffer> {
        self.depth_stencil.as_ref()
    }

    /// Depth-pass render targets, one per face ([`CubeFace`](crate::renderer::CubeFace) order for cubes).
    #[inline]
    #[must_use]
    pub fn render_targets(&self) -> &[B::RenderTarget] {
        &self.render_targets
    }

    #[inline]
    #[must_use]
    pub fn render_pass_desc(&self) -> Option<&B::RenderPassDesc> {
        self.render_pass_desc.as_ref()
    }

    #[inline]
    #[must_use]
    pub fn blur_render_pass_desc(&self) -> Option<&B::RenderPassDesc> {
        self.blur_render_pass_desc.as_ref()
    }

    /// The `(x_pass, y_pass)` blur targets, if both exist.
    #[must_use]
    pub fn blur_targets(&self) -> Option<(&B::RenderTarget, &B::RenderTarget)> {
        match &self.blur_render_targets {
            [Some(x), Some(y)] => Some((x, y)),
            _ => None,
        }
    }

    /// True when every resource the depth pass needs exists.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        let textures = match self.mode {
            ShadowMapMode::Vsm => self.depth_map.is_some() && self.depth_copy.is_some(),
            ShadowMapMode::Cube => self.depth_cube.is_some() && self.cube_copy.is_some(),
        };
        textures
            && self.depth_stencil.is_some()
            && self.render_pass_desc.is_some()
            && self.render_targets.len() == self.mode.render_target_count()
    }

    /// Hands every GPU object back to the backend. Descriptors are shared
    /// through the manager's cache and are only dropped here.
    fn release_resources(&mut self, backend: &mut B) {
        for texture in [
            self.depth_map.take(),
            self.depth_copy.take(),
            self.depth_cube.take(),
            self.cube_copy.take(),
        ]
        .into_iter()
        .flatten()
        {
            backend.release_texture(texture);
        }

        for target in self.render_targets.drain(..) {
            backend.release_render_target(target);
        }
        for target in self.blur_render_targets.iter_mut().filter_map(Option::take) {
            backend.release_render_target(target);
        }

        if let Some(buffer) = self.depth_stencil.take() {
            backend.release_render_buffer(buffer);
        }

        self.render_pass_desc = None;
        self.blur_render_pass_desc = None;
        self.format = None;
    }
}

/// Per-light shadow-map resources.
///
/// Entries are keyed by light index and kept in a small list that is scanned
/// linearly; scenes are expected to have tens of shadow lights at most.
pub struct ShadowMapManager<B: ShadowBackend> {
    backend: B,
    settings: ShadowSettings,
    entries: Vec<ShadowMapEntry<B>>,
    /// Descriptors shared by all entries with the same pass shape.
    pass_cache: FxHashMap<RenderPassKey, B::RenderPassDesc>,
    cube_blur_fallback_logged: bool,
}

impl<B: ShadowBackend> ShadowMapManager<B> {
    pub fn new(backend: B, settings: ShadowSettings) -> Self {
        Self {
            backend,
            settings,
            entries: Vec::new(),
            pass_cache: FxHashMap::default(),
            cube_blur_fallback_logged: false,
        }
    }

    #[inline]
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    #[inline]
    #[must_use]
    pub fn settings(&self) -> &ShadowSettings {
        &self.settings
    }

    // ========================================================================
    // Entry Lookup
    // ========================================================================

    #[must_use]
    pub fn shadow_map_entry(&self, light_index: u32) -> Option<&ShadowMapEntry<B>> {
        self.entries.iter().find(|e| e.light_index == light_index)
    }

    pub fn shadow_map_entry_mut(&mut self, light_index: u32) -> Option<&mut ShadowMapEntry<B>> {
        self.entries.iter_mut().find(|e| e.light_index == light_index)
    }

    #[inline]
    #[must_use]
    pub fn shadow_map_entry_count(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = &ShadowMapEntry<B>> {
        self.entries.iter()
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut ShadowMapEntry<B>> {
        self.entries.iter_mut()
    }

    // ========================================================================
    // Allocation
    // ========================================================================

    /// Makes sure `light_index` has resources for `mode` at `width`x`height`.
    ///
    /// Existing resources are kept when mode and size are unchanged, and
    /// released then rebuilt otherwise. Never fails: creation errors are
    /// logged and leave the entry invalid.
    pub fn add_shadow_map_entry(
        &mut self,
        light_index: u32,
        width: u32,
        height: u32,
        mode: ShadowMapMode,
        debug_name: &str,
    ) -> &mut ShadowMapEntry<B> {
        let position = match self.entries.iter().position(|e| e.light_index == light_index) {
            Some(i) => {
                let entry = &mut self.entries[i];
                if entry.mode != mode || entry.width != width || entry.height != height {
                    log::debug!(
                        "Reallocating shadow map '{debug_name}' (light {light_index}): {:?} {}x{} -> {mode:?} {width}x{height}",
                        entry.mode,
                        entry.width,
                        entry.height,
                    );
                    entry.release_resources(&mut self.backend);
                    entry.width = width;
                    entry.height = height;
                    entry.mode = mode;
                    self.allocate(i, debug_name);
                }
                // Same shape: nothing to rebuild.
                self.entries[i].mode = mode;
                i
            }
            None => {
                self.entries
                    .push(ShadowMapEntry::new(light_index, width, height, mode));
                let i = self.entries.len() - 1;
                self.allocate(i, debug_name);
                i
            }
        };

        &mut self.entries[position]
    }

    fn allocate(&mut self, index: usize, debug_name: &str) {
        let Self {
            backend,
            settings,
            entries,
            pass_cache,
            cube_blur_fallback_logged,
        } = self;
        let entry = &mut entries[index];

        let kind = entry.mode.texture_kind();
        let Some(format) = choose_format(backend, settings, kind) else {
            log::warn!(
                "No renderable shadow map format for '{debug_name}' ({:?} and {:?} unsupported); shadows disabled for light {}",
                settings.preferred_format,
                settings.fallback_format,
                entry.light_index
            );
            return;
        };
        entry.format = Some(format);

        let (width, height) = (entry.width, entry.height);
        let texture_desc = |label: &'static str| ShadowTextureDesc {
            label,
            width,
            height,
            format,
            kind,
        };

        // Primary map and its blur ping-pong copy.
        let (primary_label, copy_label) = match entry.mode {
            ShadowMapMode::Vsm => ("shadow depth map", "shadow depth copy"),
            ShadowMapMode::Cube => ("shadow depth cube", "shadow cube copy"),
        };
        let primary = report(
            backend.create_texture(&texture_desc(primary_label)),
            debug_name,
            primary_label,
            width,
            height,
        );
        let copy = report(
            backend.create_texture(&texture_desc(copy_label)),
            debug_name,
            copy_label,
            width,
            height,
        );

        entry.depth_stencil = report(
            backend.create_depth_stencil(&DepthStencilDesc {
                label: "shadow depth stencil",
                width,
                height,
                format: settings.depth_stencil_format,
            }),
            debug_name,
            "shadow depth stencil",
            width,
            height,
        );

        // Depth pass: one single-attachment target per face.
        let pass_key = RenderPassKey {
            color_format: format,
            color_attachments: 1,
            depth_stencil_format: Some(settings.depth_stencil_format),
        };
        entry.render_pass_desc = cached_pass(backend, pass_cache, &pass_key, debug_name);

        if let (Some(map), Some(depth_stencil), Some(pass)) =
            (&primary, &entry.depth_stencil, &entry.render_pass_desc)
        {
            for layer in 0..kind.layer_count() {
                let attachments = [ColorAttachment {
                    texture: map,
                    layer,
                }];
                let target = backend.create_render_target(&RenderTargetDesc {
                    label: "shadow render target",
                    color_attachments: &attachments[..],
                    depth_stencil: Some(depth_stencil),
                    render_pass: pass,
                });
                match report(target, debug_name, "shadow render target", width, height) {
                    Some(target) if backend.is_render_pass_compatible(pass, &target) => {
                        entry.render_targets.push(target);
                    }
                    Some(target) => {
                        log::warn!(
                            "Shadow render target for '{debug_name}' is incompatible with its render pass"
                        );
                        backend.release_render_target(target);
                        break;
                    }
                    None => break,
                }
            }
        }

        // Blur passes.
        let blur_attachments = kind.layer_count();
        let blur_possible = match entry.mode {
            ShadowMapMode::Vsm => true,
            ShadowMapMode::Cube => {
                let supported = backend.max_color_attachments() >= blur_attachments;
                if !supported && !*cube_blur_fallback_logged {
                    log::info!(
                        "Device supports {} color attachments, cube shadow blur needs {blur_attachments}; skipping cube shadow blur",
                        backend.max_color_attachments()
                    );
                    *cube_blur_fallback_logged = true;
                }
                supported
            }
        };

        if settings.enable_blur && blur_possible {
            let blur_key = RenderPassKey {
                color_format: format,
                color_attachments: blur_attachments,
                depth_stencil_format: None,
            };
            entry.blur_render_pass_desc = cached_pass(backend, pass_cache, &blur_key, debug_name);

            if let (Some(map), Some(copy), Some(pass)) =
                (&primary, &copy, &entry.blur_render_pass_desc)
            {
                // X pass writes the copy, Y pass writes back into the map.
                for (slot, destination) in [copy, map].into_iter().enumerate() {
                    let attachments: SmallVec<[ColorAttachment<'_, B::Texture>; 6]> = (0
                        ..blur_attachments)
                        .map(|layer| ColorAttachment {
                            texture: destination,
                            layer,
                        })
                        .collect();
                    let target = backend.create_render_target(&RenderTargetDesc {
                        label: "shadow blur render target",
                        color_attachments: attachments.as_slice(),
                        depth_stencil: None,
                        render_pass: pass,
                    });
                    entry.blur_render_targets[slot] =
                        report(target, debug_name, "shadow blur render target", width, height);
                }
            }
        }

        match entry.mode {
            ShadowMapMode::Vsm => {
                entry.depth_map = primary;
                entry.depth_copy = copy;
            }
            ShadowMapMode::Cube => {
                entry.depth_cube = primary;
                entry.cube_copy = copy;
            }
        }
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Releases every entry and cached descriptor. Safe with no entries.
    pub fn release_cached_resources(&mut self) {
        for mut entry in self.entries.drain(..) {
            entry.release_resources(&mut self.backend);
        }
        for (_, pass) in self.pass_cache.drain() {
            self.backend.release_render_pass_descriptor(pass);
        }
    }
}

impl<B: ShadowBackend> Drop for ShadowMapManager<B> {
    fn drop(&mut self) {
        self.release_cached_resources();
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn choose_format<B: ShadowBackend>(
    backend: &B,
    settings: &ShadowSettings,
    kind: TextureKind,
) -> Option<wgpu::TextureFormat> {
    [settings.preferred_format, settings.fallback_format]
        .into_iter()
        .find(|&format| backend.is_texture_format_supported(format, kind))
}

/// Looks up (or creates and caches) the descriptor for `key`.
fn cached_pass<B: ShadowBackend>(
    backend: &mut B,
    cache: &mut FxHashMap<RenderPassKey, B::RenderPassDesc>,
    key: &RenderPassKey,
    debug_name: &str,
) -> Option<B::RenderPassDesc> {
    if let Some(pass) = cache.get(key) {
        return Some(pass.clone());
    }
    match backend.create_render_pass_descriptor(key) {
        Ok(pass) => {
            cache.insert(*key, pass.clone());
            Some(pass)
        }
        Err(err) => {
            log::warn!("Failed to create render pass descriptor for '{debug_name}': {err}");
            None
        }
    }
}

/// Converts a creation result into an `Option`, logging the failure.
fn report<T>(
    result: Result<T, UmbraError>,
    debug_name: &str,
    purpose: &str,
    width: u32,
    height: u32,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            log::warn!("Failed to create {purpose} ({width}x{height}) for '{debug_name}': {err}");
            None
        }
    }
}
