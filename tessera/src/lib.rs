// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tessera turns an ordered list of draws into an immutable, backend-agnostic GPU command list.
//!
//! Each draw names a [`Renderer`], which is a short sequence of [`RenderStep`]s. A
//! [`DrawPass`] assigns every step a graphics pipeline descriptor, sorts the steps so that
//! compatible work is batched without changing the compositing order, writes vertex, instance
//! and uniform data through a [`DrawWriter`], and records bind and draw [`Command`]s.
//!
//! GPU objects are never created while a pass is built. [`DrawPass::prepare_resources`]
//! resolves pipelines, textures and samplers through a [`ResourceProvider`] exactly once,
//! and [`DrawPass::add_resource_refs`] keeps them alive for as long as a submitted
//! [`CommandBuffer`] may still use them.
//!
//! Paths are filled with tessellated wedges, see [`tessera_encoding`], and text is drawn from
//! glyph atlases owned by the [`AtlasManager`].
//!
//! ```ignore
//! let mut recorder = Recorder::new(RecorderOptions::default())?;
//! let renderer = recorder.renderer_provider().convex_tessellated_wedges();
//! let mut draws = DrawList::new();
//! draws.record_draw(renderer, Transform::IDENTITY, Geometry::Shape(path), clip, order, paint);
//! let mut pass = recorder.make_draw_pass(draws, target, (LoadOp::Clear, StoreOp::Store), [0.0; 4]);
//! pass.prepare_resources(&mut resource_cache, &render_pass_desc)?;
//! ```

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![allow(missing_docs, reason = "We have many as-yet undocumented items.")]
#![allow(
    missing_debug_implementations,
    clippy::cast_possible_truncation,
    clippy::missing_assert_message,
    clippy::shadow_unrelated,
    reason = "Deferred"
)]

mod atlas;
mod block_list;
mod buffer_manager;
mod command_buffer;
mod commands;
mod draw_list;
mod draw_pass;
mod draw_writer;
mod pipeline_data;
mod recorder;
mod render_step;
mod renderer;
mod resource;
mod resource_provider;
mod text;

#[cfg(feature = "wgpu")]
mod wgpu_conversions;

use thiserror::Error;

pub use peniko;
pub use peniko::kurbo;
/// Geometry encoding, re-exported so that callers can build paths and transforms.
pub use tessera_encoding as encoding;
pub use tessera_encoding::{Path, Transform, TransformType, Verb};

pub use atlas::{
    AtlasConfig, AtlasError, AtlasLocator, AtlasManager, AtlasUpload, GlyphKey, MaskFormat,
    MAX_ATLAS_PAGES,
};
pub use block_list::BlockList;
pub use buffer_manager::{BindBufferInfo, BufferId, BufferType, DrawBufferManager};
pub use command_buffer::{CommandBuffer, FenceId, SubmissionQueue, TrackedResource};
pub use commands::{Command, CommandList, ScissorRect, UniformSlot};
pub use draw_list::{Clip, Draw, DrawList, DrawOrder, DrawParams, Geometry, PaintParams};
pub use draw_pass::DrawPass;
pub use draw_writer::{DrawWriter, MAX_QUADS_PER_DRAW};
pub use pipeline_data::{
    PipelineDataGatherer, SlType, TextureBinding, TextureDataBlock, Uniform, UniformDataBlock,
    UniformValue,
};
pub use recorder::{Recorder, RecorderOptions};
pub use render_step::{
    Attribute, CompareOp, DepthStencilFlags, DepthStencilSettings, PrimitiveType, RenderStep,
    RenderStepFlags, RenderStepKind, StencilFaceOps, StencilOp, VertexAttribType, WedgeVariant,
};
pub use renderer::{Renderer, RendererProvider, MAX_RENDER_STEPS};
pub use resource::{
    FilterMode, GraphicsPipeline, GraphicsPipelineDesc, LoadOp, RenderPassDesc, ResourceId,
    Sampler, SamplerDesc, StoreOp, Texture, TextureFormat, TextureProxy, TileMode,
};
pub use resource_provider::{Backend, BackendHandle, ResourceCache, ResourceProvider};
pub use text::{Glyph, GlyphRegenerator, SubRun, SubRunData, SubRunKind, TextVertex};

/// Errors that can occur in Tessera.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// The backend could not create a graphics pipeline.
    #[error("Couldn't create graphics pipeline for '{0}'")]
    PipelineCreation(String),
    /// A sampled texture could not be instantiated.
    #[error("Couldn't instantiate texture '{0}'")]
    TextureInstantiation(String),
    /// The backend could not create a sampler.
    #[error("Couldn't create sampler {0:?}")]
    SamplerCreation(SamplerDesc),
    /// A draw pass was used before its resources were prepared.
    #[error("Draw pass resources have not been prepared")]
    Unprepared,
    /// Glyph atlas failure.
    #[error("Atlas error")]
    Atlas(#[from] AtlasError),
}

pub(crate) type Result<T, E = Error> = std::result::Result<T, E>;

static_assertions::assert_impl_all!(DrawPass: Send);
static_assertions::assert_impl_all!(Recorder: Send);
