// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tessera tests.
//!
//! Provides a [`MockBackend`] that hands out fake handles, counts what it creates and can be
//! told to fail, plus helpers for building draws.

// LINEBENDER LINT SET - lib.rs - v2
// See https://linebender.org/wiki/canonical-lints/
// These lints aren't included in Cargo.toml because they
// shouldn't apply to examples and tests
#![warn(unused_crate_dependencies)]
#![warn(clippy::print_stdout, clippy::print_stderr)]
// Targeting e.g. 32-bit means structs containing usize can give false positives for 64-bit.
#![cfg_attr(target_pointer_width = "64", warn(clippy::trivially_copy_pass_by_ref))]
// END LINEBENDER LINT SET
#![allow(
    missing_debug_implementations,
    unreachable_pub,
    missing_docs,
    clippy::missing_assert_message,
    clippy::allow_attributes_without_reason
)]

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tessera::kurbo::Rect;
use tessera::{
    Backend, BackendHandle, BindBufferInfo, Clip, Command, DrawPass, GraphicsPipelineDesc,
    MaskFormat, Path, Recorder, RecorderOptions, RenderPassDesc, ResourceCache, SamplerDesc,
    ScissorRect, TextureFormat, TextureProxy,
};

/// A [`Backend`] that creates nothing.
#[derive(Default)]
pub struct MockBackend {
    next_handle: u64,
    pub pipelines_created: usize,
    pub textures_created: usize,
    pub samplers_created: usize,
    pub fail_pipelines: bool,
    pub fail_textures: bool,
    pub fail_samplers: bool,
}

impl MockBackend {
    fn handle(&mut self) -> BackendHandle {
        self.next_handle += 1;
        BackendHandle(self.next_handle)
    }
}

impl Backend for MockBackend {
    fn create_graphics_pipeline(
        &mut self,
        _desc: &GraphicsPipelineDesc,
        _render_pass: &RenderPassDesc,
    ) -> Option<BackendHandle> {
        if self.fail_pipelines {
            return None;
        }
        self.pipelines_created += 1;
        Some(self.handle())
    }

    fn create_texture(
        &mut self,
        _dimensions: (u32, u32),
        _format: TextureFormat,
        _label: &str,
    ) -> Option<BackendHandle> {
        if self.fail_textures {
            return None;
        }
        self.textures_created += 1;
        Some(self.handle())
    }

    fn create_sampler(&mut self, _desc: &SamplerDesc) -> Option<BackendHandle> {
        if self.fail_samplers {
            return None;
        }
        self.samplers_created += 1;
        Some(self.handle())
    }
}

pub const WIDTH: u32 = 256;
pub const HEIGHT: u32 = 256;

pub fn resource_cache() -> ResourceCache<MockBackend> {
    ResourceCache::new(MockBackend::default())
}

pub fn recorder() -> Result<Recorder> {
    Ok(Recorder::new(RecorderOptions::default())?)
}

/// A multisampled pass with a depth-stencil attachment, compatible with every render step.
pub fn render_pass() -> RenderPassDesc {
    RenderPassDesc {
        color_format: TextureFormat::Rgba8Unorm,
        depth_stencil_format: Some(TextureFormat::Depth24PlusStencil8),
        sample_count: 4,
        ..RenderPassDesc::default()
    }
}

pub fn target() -> Arc<TextureProxy> {
    Arc::new(TextureProxy::new(
        (WIDTH, HEIGHT),
        TextureFormat::Rgba8Unorm,
        "target",
    ))
}

pub fn full_clip() -> Clip {
    Clip::new(ScissorRect::new(0, 0, WIDTH, HEIGHT))
}

/// A right triangle with its right angle at `(x, y)`.
pub fn triangle(x: f64, y: f64, size: f64) -> Arc<Path> {
    let mut path = Path::new();
    path.move_to((x, y))
        .line_to((x + size, y))
        .line_to((x, y + size))
        .close();
    Arc::new(path)
}

pub fn rect(rect: Rect) -> Arc<Path> {
    let mut path = Path::new();
    path.move_to((rect.x0, rect.y0))
        .line_to((rect.x1, rect.y0))
        .line_to((rect.x1, rect.y1))
        .line_to((rect.x0, rect.y1))
        .close();
    Arc::new(path)
}

/// A square glyph mask of `size` pixels.
pub fn mask(format: MaskFormat, size: u16) -> Arc<[u8]> {
    let len = usize::from(size) * usize::from(size) * format.bytes_per_pixel() as usize;
    Arc::from(vec![0xff; len])
}

/// Reads the `f32` at `offset` of every `stride` sized record in a bound buffer range.
pub fn read_f32s(
    recorder: &Recorder,
    info: BindBufferInfo,
    stride: usize,
    offset: usize,
) -> Result<Vec<f32>> {
    let data = recorder
        .buffer_manager()
        .data(info.buffer)
        .ok_or_else(|| anyhow!("no buffer {:?}", info.buffer))?;
    let start = info.offset as usize;
    let range = data
        .get(start..start + info.size as usize)
        .ok_or_else(|| anyhow!("range out of bounds"))?;
    Ok(range
        .chunks_exact(stride)
        .map(|record| {
            let b = &record[offset..offset + 4];
            f32::from_ne_bytes([b[0], b[1], b[2], b[3]])
        })
        .collect())
}

/// The instance (or, if there are none, vertex) ranges bound before each draw command.
pub fn draw_buffers(pass: &DrawPass) -> Vec<BindBufferInfo> {
    let mut bound = None;
    let mut out = Vec::new();
    for command in pass.commands() {
        if let Command::BindDrawBuffers {
            vertices,
            instances,
            ..
        } = command
        {
            bound = (*instances).or(*vertices);
        } else if command.is_draw() {
            out.extend(bound);
        }
    }
    out
}

/// Texture indices of every `BindTexturesAndSamplers` command, in order.
pub fn texture_binds(pass: &DrawPass) -> Vec<Vec<u32>> {
    pass.commands()
        .filter_map(|command| match command {
            Command::BindTexturesAndSamplers {
                texture_indices, ..
            } => Some(texture_indices.to_vec()),
            _ => None,
        })
        .collect()
}
