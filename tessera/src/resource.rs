// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::hash::{Hash, Hasher};
use std::num::NonZeroU64;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use crate::render_step::RenderStep;
use crate::resource_provider::{BackendHandle, ResourceProvider};
use crate::{Error, Result};

/// Process-unique identifier of a GPU resource or proxy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub NonZeroU64);

impl ResourceId {
    pub fn next() -> Self {
        // We initialize with 1 so that the conversion below succeeds
        static ID_COUNTER: AtomicU64 = AtomicU64::new(1);
        let id = ID_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(NonZeroU64::new(id).unwrap_or(NonZeroU64::MIN))
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    R8Unorm,
    B5G6R5Unorm,
    Rgba8Unorm,
    Bgra8Unorm,
    Depth24PlusStencil8,
}

impl TextureFormat {
    pub fn bytes_per_pixel(self) -> u32 {
        match self {
            Self::R8Unorm => 1,
            Self::B5G6R5Unorm => 2,
            Self::Rgba8Unorm | Self::Bgra8Unorm | Self::Depth24PlusStencil8 => 4,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FilterMode {
    Nearest,
    Linear,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum TileMode {
    #[default]
    Clamp,
    Repeat,
    Mirror,
    Decal,
}

/// Sampling state for one sampled texture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SamplerDesc {
    pub filter: FilterMode,
    /// Tile modes in x and y.
    pub tile_modes: [TileMode; 2],
}

impl SamplerDesc {
    pub fn new(filter: FilterMode, tile_modes: [TileMode; 2]) -> Self {
        Self { filter, tile_modes }
    }

    pub fn clamped(filter: FilterMode) -> Self {
        Self::new(filter, [TileMode::Clamp; 2])
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum LoadOp {
    Load,
    #[default]
    Clear,
    Discard,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum StoreOp {
    #[default]
    Store,
    Discard,
}

/// Attachment configuration of the render pass a draw pass is executed in.
///
/// Pipelines are compiled against it, so it is part of the pipeline cache key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RenderPassDesc {
    pub color_format: TextureFormat,
    pub depth_stencil_format: Option<TextureFormat>,
    pub sample_count: u32,
    pub load_op: LoadOp,
    pub store_op: StoreOp,
}

impl Default for RenderPassDesc {
    fn default() -> Self {
        Self {
            color_format: TextureFormat::Rgba8Unorm,
            depth_stencil_format: Some(TextureFormat::Depth24PlusStencil8),
            sample_count: 1,
            load_op: LoadOp::Clear,
            store_op: StoreOp::Store,
        }
    }
}

/// Identifies a graphics pipeline: one render step combined with one paint shader.
///
/// Two descriptors are equal when they name the same render step and paint, which is what lets
/// a draw pass intern them.
#[derive(Clone, Debug)]
pub struct GraphicsPipelineDesc {
    render_step: Arc<RenderStep>,
    paint_id: Option<u32>,
}

impl GraphicsPipelineDesc {
    pub fn new(render_step: Arc<RenderStep>, paint_id: Option<u32>) -> Self {
        Self {
            render_step,
            paint_id,
        }
    }

    pub fn render_step(&self) -> &Arc<RenderStep> {
        &self.render_step
    }

    /// The paint shader, present only for steps that perform shading.
    pub fn paint_id(&self) -> Option<u32> {
        self.paint_id
    }

    pub fn label(&self) -> String {
        match self.paint_id {
            Some(paint) => format!("{} + paint {paint}", self.render_step.name()),
            None => self.render_step.name().to_string(),
        }
    }
}

impl PartialEq for GraphicsPipelineDesc {
    fn eq(&self, other: &Self) -> bool {
        self.render_step.id() == other.render_step.id() && self.paint_id == other.paint_id
    }
}

impl Eq for GraphicsPipelineDesc {}

impl Hash for GraphicsPipelineDesc {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.render_step.id().hash(state);
        self.paint_id.hash(state);
    }
}

/// A backend texture.
#[derive(Debug)]
pub struct Texture {
    id: ResourceId,
    handle: BackendHandle,
    dimensions: (u32, u32),
    format: TextureFormat,
    label: String,
}

impl Texture {
    pub fn new(
        handle: BackendHandle,
        dimensions: (u32, u32),
        format: TextureFormat,
        label: impl Into<String>,
    ) -> Self {
        Self {
            id: ResourceId::next(),
            handle,
            dimensions,
            format,
            label: label.into(),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn handle(&self) -> BackendHandle {
        self.handle
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}

/// A backend sampler.
#[derive(Debug)]
pub struct Sampler {
    id: ResourceId,
    handle: BackendHandle,
    desc: SamplerDesc,
}

impl Sampler {
    pub fn new(handle: BackendHandle, desc: SamplerDesc) -> Self {
        Self {
            id: ResourceId::next(),
            handle,
            desc,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn handle(&self) -> BackendHandle {
        self.handle
    }

    pub fn desc(&self) -> &SamplerDesc {
        &self.desc
    }
}

/// A compiled backend pipeline.
#[derive(Debug)]
pub struct GraphicsPipeline {
    id: ResourceId,
    handle: BackendHandle,
    label: String,
    render_step_id: u32,
    paint_id: Option<u32>,
}

impl GraphicsPipeline {
    pub fn new(handle: BackendHandle, desc: &GraphicsPipelineDesc) -> Self {
        Self {
            id: ResourceId::next(),
            handle,
            label: desc.label(),
            render_step_id: desc.render_step.id(),
            paint_id: desc.paint_id,
        }
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn handle(&self) -> BackendHandle {
        self.handle
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn render_step_id(&self) -> u32 {
        self.render_step_id
    }

    pub fn paint_id(&self) -> Option<u32> {
        self.paint_id
    }
}

/// A texture whose backend object is created on first use.
///
/// Proxies are shared between the atlas that owns them, the draw passes that sample them and
/// the render pass that targets them. Once instantiated, every holder sees the same texture.
#[derive(Debug)]
pub struct TextureProxy {
    id: ResourceId,
    dimensions: (u32, u32),
    format: TextureFormat,
    label: String,
    texture: OnceLock<Arc<Texture>>,
}

impl TextureProxy {
    pub fn new(dimensions: (u32, u32), format: TextureFormat, label: impl Into<String>) -> Self {
        Self {
            id: ResourceId::next(),
            dimensions,
            format,
            label: label.into(),
            texture: OnceLock::new(),
        }
    }

    /// Creates a proxy for an existing texture, such as a surface.
    pub fn wrap(texture: Arc<Texture>) -> Self {
        let proxy = Self::new(texture.dimensions(), texture.format(), texture.label());
        // The lock was just created, so this cannot fail.
        let _ = proxy.texture.set(texture);
        proxy
    }

    pub fn id(&self) -> ResourceId {
        self.id
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.dimensions
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn is_instantiated(&self) -> bool {
        self.texture.get().is_some()
    }

    pub fn texture(&self) -> Option<&Arc<Texture>> {
        self.texture.get()
    }

    /// Returns the backing texture, creating it through `provider` if needed.
    pub fn instantiate(&self, provider: &mut dyn ResourceProvider) -> Result<Arc<Texture>> {
        if let Some(texture) = self.texture.get() {
            return Ok(texture.clone());
        }
        let texture = provider
            .create_texture(self.dimensions, self.format, &self.label)
            .ok_or_else(|| Error::TextureInstantiation(self.label.clone()))?;
        Ok(self.texture.get_or_init(|| texture).clone())
    }
}
