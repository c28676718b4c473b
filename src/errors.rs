//! Error Types
//!
//! This module defines the error types used throughout the crate.
//!
//! # Overview
//!
//! The main error type [`UmbraError`] covers the failure modes of GPU
//! resource creation for shadow maps. Scene-graph operations never fail in
//! the error sense: contract violations are caught by debug assertions and
//! reported as a `false` return in release builds.
//!
//! Errors produced by a [`ShadowBackend`](crate::renderer::ShadowBackend) are
//! consumed by the [`ShadowMapManager`](crate::renderer::ShadowMapManager),
//! which logs them and degrades the affected light to "no shadow" instead of
//! propagating them further.

use thiserror::Error;

/// The main error type for the crate.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UmbraError {
    // ========================================================================
    // GPU Resource Errors
    // ========================================================================
    /// A texture, render buffer or render target could not be created.
    #[error("Failed to create {purpose} ({width}x{height}): {reason}")]
    ResourceCreation {
        /// What the resource was for (e.g. "shadow depth map").
        purpose: String,
        /// Requested width in pixels.
        width: u32,
        /// Requested height in pixels.
        height: u32,
        /// Backend-provided reason.
        reason: String,
    },

    /// The requested texture format cannot be rendered to and sampled on this device.
    #[error("Texture format {0:?} is not supported for shadow rendering")]
    UnsupportedTextureFormat(wgpu::TextureFormat),

    /// A texture dimension exceeds the device limit.
    #[error("Texture size {size} exceeds device limit {max}")]
    TextureTooLarge {
        /// Requested edge length.
        size: u32,
        /// Device limit.
        max: u32,
    },

    /// A render target was requested with more color attachments than the device supports.
    #[error("Render target needs {requested} color attachments, device supports {max}")]
    TooManyColorAttachments {
        /// Requested attachment count.
        requested: u32,
        /// Device limit.
        max: u32,
    },

    /// A render target description was inconsistent (e.g. no attachments).
    #[error("Invalid render target: {0}")]
    InvalidRenderTarget(String),
}

/// Alias for `Result<T, UmbraError>`.
pub type Result<T> = std::result::Result<T, UmbraError>;
