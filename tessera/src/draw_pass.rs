// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use peniko::kurbo::Rect;
use smallvec::SmallVec;

use crate::block_list::BlockList;
use crate::buffer_manager::{BindBufferInfo, BufferType};
use crate::command_buffer::{CommandBuffer, TrackedResource};
use crate::commands::{Command, CommandList, ScissorRect, UniformSlot};
use crate::draw_list::DrawList;
use crate::draw_writer::DrawWriter;
use crate::pipeline_data::{PipelineDataGatherer, TextureDataBlock, UniformDataBlock};
use crate::recorder::Recorder;
use crate::render_step::DepthStencilFlags;
use crate::resource::{
    GraphicsPipeline, GraphicsPipelineDesc, LoadOp, RenderPassDesc, Sampler, SamplerDesc,
    StoreOp, Texture, TextureProxy,
};
use crate::resource_provider::ResourceProvider;
use crate::{Error, Result};

/// Interns values, handing out dense indices in insertion order.
struct IndexCache<T> {
    indices: HashMap<T, u32>,
    items: BlockList<T>,
}

impl<T: Clone + Eq + Hash> IndexCache<T> {
    fn new() -> Self {
        Self {
            indices: HashMap::new(),
            items: BlockList::new(),
        }
    }

    fn insert(&mut self, item: T) -> u32 {
        if let Some(index) = self.indices.get(&item) {
            return *index;
        }
        let index = self.items.push(item.clone()) as u32;
        self.indices.insert(item, index);
        index
    }

    fn get(&self, index: u32) -> Option<&T> {
        self.items.get(index as usize)
    }

    fn len(&self) -> usize {
        self.items.len()
    }

    fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.items.iter()
    }
}

/// Order in which render steps are executed.
///
/// Depth comes first, so painter's order is kept between draws of different depths. Within a
/// depth, steps run in renderer order and are then grouped by state to maximize batching.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct SortKey {
    depth: u16,
    step_index: u8,
    pipeline: u32,
    uniforms: Option<u32>,
    textures: Option<u32>,
    draw_index: u32,
    ssbo_index: u32,
}

/// Textures and samplers referenced by a pass, deduplicated.
#[derive(Default)]
struct SampledResources {
    textures: Vec<Arc<TextureProxy>>,
    samplers: Vec<SamplerDesc>,
}

impl SampledResources {
    fn bind_command(&mut self, block: &TextureDataBlock) -> Command {
        let mut texture_indices = SmallVec::new();
        let mut sampler_indices = SmallVec::new();
        for binding in block.bindings() {
            let texture = match self
                .textures
                .iter()
                .position(|t| t.id() == binding.proxy.id())
            {
                Some(index) => index,
                None => {
                    self.textures.push(binding.proxy.clone());
                    self.textures.len() - 1
                }
            };
            let sampler = match self.samplers.iter().position(|s| *s == binding.sampler) {
                Some(index) => index,
                None => {
                    self.samplers.push(binding.sampler);
                    self.samplers.len() - 1
                }
            };
            texture_indices.push(texture as u32);
            sampler_indices.push(sampler as u32);
        }
        Command::BindTexturesAndSamplers {
            texture_indices,
            sampler_indices,
        }
    }
}

/// An immutable, sorted list of commands drawing into one render target.
///
/// A pass is built from a [`DrawList`] by [`DrawPass::make`]. Building writes all vertex and
/// uniform data, but creates no GPU objects: the pass only records descriptors for the
/// pipelines, textures and samplers it uses. [`prepare_resources`](Self::prepare_resources)
/// turns them into shared resources before the pass is added to a [`CommandBuffer`].
pub struct DrawPass {
    commands: CommandList,
    target: Arc<TextureProxy>,
    ops: (LoadOp, StoreOp),
    clear_color: [f32; 4],
    bounds: Rect,
    requires_msaa: bool,
    depth_stencil_flags: DepthStencilFlags,
    vertex_buffer_size: usize,
    uniform_buffer_size: usize,

    pipeline_descs: Vec<GraphicsPipelineDesc>,
    sampled_textures: Vec<Arc<TextureProxy>>,
    sampler_descs: Vec<SamplerDesc>,

    full_pipelines: Vec<Arc<GraphicsPipeline>>,
    textures: Vec<Arc<Texture>>,
    samplers: Vec<Arc<Sampler>>,
    prepared: bool,
}

impl DrawPass {
    /// Sorts the draws of `draw_list`, writes their data with the recorder's buffer and atlas
    /// managers and records the commands that draw them into `target`.
    pub fn make(
        recorder: &mut Recorder,
        draw_list: DrawList,
        target: Arc<TextureProxy>,
        ops: (LoadOp, StoreOp),
        clear_color: [f32; 4],
    ) -> Self {
        let step_count = draw_list.render_step_count();
        let draws = draw_list.into_draws();
        let (buffers, atlas) = recorder.managers_mut();

        let mut pipelines = IndexCache::new();
        let mut paint_blocks: Vec<IndexCache<UniformDataBlock>> = Vec::new();
        let mut uniform_blocks = IndexCache::new();
        let mut texture_blocks = IndexCache::new();
        let mut keys = Vec::with_capacity(step_count);
        let mut bounds: Option<Rect> = None;
        let mut requires_msaa = false;
        let mut depth_stencil_flags = DepthStencilFlags::empty();

        for (draw_index, draw) in draws.iter().enumerate() {
            for (step_index, step) in draw.renderer.steps().iter().enumerate() {
                let paint = draw.paint.as_ref().filter(|_| step.performs_shading());
                let desc = GraphicsPipelineDesc::new(step.clone(), paint.map(|p| p.shader_id));
                let pipeline = pipelines.insert(desc);
                if paint_blocks.len() <= pipeline as usize {
                    paint_blocks.push(IndexCache::new());
                }
                let ssbo_index = match paint {
                    Some(paint) => paint_blocks[pipeline as usize].insert(paint.uniform_block()),
                    None => 0,
                };

                let mut gatherer = PipelineDataGatherer::new(atlas, step.uniforms());
                step.write_uniforms_and_textures(&draw.params, &mut gatherer);
                let (uniforms, textures) = gatherer.finish();

                keys.push(SortKey {
                    depth: draw.params.order().depth(),
                    step_index: step_index as u8,
                    pipeline,
                    uniforms: uniforms.map(|u| uniform_blocks.insert(u)),
                    textures: textures.map(|t| texture_blocks.insert(t)),
                    draw_index: draw_index as u32,
                    ssbo_index,
                });
                requires_msaa |= step.requires_msaa();
                depth_stencil_flags |= step.depth_stencil_flags();
            }
            let draw_bounds = draw.params.draw_bounds();
            bounds = Some(bounds.map_or(draw_bounds, |b| b.union(draw_bounds)));
        }
        let (width, height) = target.dimensions();
        let target_rect = Rect::new(0.0, 0.0, f64::from(width), f64::from(height));
        let bounds = bounds.map_or(Rect::ZERO, |b| b.intersect(target_rect));

        keys.sort_unstable();

        // Paint records are stored back to back, one storage block per pipeline. The ssbo index
        // is a record index, so every record of a pipeline is padded to the same stride.
        let mut uniform_buffer_size = 0;
        let paint_bindings: Vec<Option<BindBufferInfo>> = paint_blocks
            .iter()
            .map(|blocks| {
                let stride = blocks.iter().map(UniformDataBlock::len).max()?;
                if blocks.iter().any(|b| b.len() != stride) {
                    log::debug!("Paint records of one pipeline differ in size, padding to {stride}");
                }
                let mut data = Vec::with_capacity(stride * blocks.len());
                for block in blocks.iter() {
                    data.extend_from_slice(block.as_bytes());
                    data.resize(data.len() + stride - block.len(), 0);
                }
                uniform_buffer_size += data.len();
                Some(buffers.append(BufferType::Storage, &data))
            })
            .collect();
        let uniform_bindings: Vec<BindBufferInfo> = uniform_blocks
            .iter()
            .map(|block| {
                uniform_buffer_size += block.len();
                buffers.append(BufferType::Uniform, block.as_bytes())
            })
            .collect();

        let mut commands = CommandList::new();
        let mut sampled = SampledResources::default();
        let mut writer = DrawWriter::new(&mut commands, buffers, atlas);
        let mut last_pipeline = None;
        let mut last_uniforms = None;
        let mut bound_textures: Option<TextureDataBlock> = None;
        let mut last_scissor: Option<ScissorRect> = None;

        for key in &keys {
            let draw = &draws[key.draw_index as usize];
            let step = &draw.renderer.steps()[key.step_index as usize];
            let textures = key.textures.and_then(|i| texture_blocks.get(i));

            let pipeline_change = last_pipeline != Some(key.pipeline);
            let uniform_change = key.uniforms.is_some() && key.uniforms != last_uniforms;
            let texture_change = textures.is_some_and(|t| {
                pipeline_change || !bound_textures.as_ref().is_some_and(|b| t.is_prefix_of(b))
            });
            let scissor = draw.params.clip().scissor();
            let scissor_change = last_scissor != Some(scissor);

            if pipeline_change {
                writer.new_pipeline_state(step.primitive_type());
                writer.push_state_command(Command::BindGraphicsPipeline {
                    pipeline_index: key.pipeline,
                });
                if let Some(info) = paint_bindings[key.pipeline as usize] {
                    writer.push_state_command(Command::BindUniformBuffer {
                        info,
                        slot: UniformSlot::Paint,
                    });
                }
                last_pipeline = Some(key.pipeline);
                last_uniforms = None;
                bound_textures = None;
            } else if uniform_change || texture_change || scissor_change {
                writer.flush();
            }
            if uniform_change {
                if let Some(info) = key.uniforms.map(|i| uniform_bindings[i as usize]) {
                    writer.push_state_command(Command::BindUniformBuffer {
                        info,
                        slot: UniformSlot::RenderStep,
                    });
                }
                last_uniforms = key.uniforms;
            }
            if let Some(textures) = textures.filter(|_| texture_change) {
                writer.push_state_command(sampled.bind_command(textures));
                bound_textures = Some(textures.clone());
            }
            if scissor_change {
                writer.push_state_command(Command::SetScissor(scissor));
                last_scissor = Some(scissor);
            }

            let complete = step.write_vertices(&mut writer, &draw.params, key.ssbo_index);

            if step.has_textures() {
                // Writing glyphs can add atlas pages. The pending draw then needs the larger
                // binding, which also satisfies the draws batched before it.
                let mut gatherer = PipelineDataGatherer::new(writer.atlas_manager(), step.uniforms());
                step.write_uniforms_and_textures(&draw.params, &mut gatherer);
                let (_, textures) = gatherer.finish();
                if let Some(textures) = textures {
                    let satisfied = bound_textures
                        .as_ref()
                        .is_some_and(|b| textures.is_prefix_of(b));
                    if !satisfied {
                        debug_assert!(bound_textures
                            .as_ref()
                            .map_or(true, |b| b.is_prefix_of(&textures)));
                        log::debug!(
                            "Atlas grew to {} pages while drawing, rebinding",
                            textures.len()
                        );
                        writer.push_state_command(sampled.bind_command(&textures));
                        bound_textures = Some(textures);
                    }
                }
            }
            if !complete {
                // A cut short draw is emitted on its own, after any rebinding above.
                writer.flush();
            }
        }
        writer.flush();
        let vertex_buffer_size = writer.bytes_written();

        log::debug!(
            "Built draw pass for '{}': {} draws, {} steps, {} pipelines, {} commands",
            target.label(),
            draws.len(),
            keys.len(),
            pipelines.len(),
            commands.len()
        );

        Self {
            commands,
            target,
            ops,
            clear_color,
            bounds,
            requires_msaa,
            depth_stencil_flags,
            vertex_buffer_size,
            uniform_buffer_size,
            pipeline_descs: pipelines.iter().cloned().collect(),
            sampled_textures: sampled.textures,
            sampler_descs: sampled.samplers,
            full_pipelines: Vec::new(),
            textures: Vec::new(),
            samplers: Vec::new(),
            prepared: false,
        }
    }

    /// Device-space bounds of everything drawn, clipped to the target.
    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn target(&self) -> &Arc<TextureProxy> {
        &self.target
    }

    pub fn ops(&self) -> (LoadOp, StoreOp) {
        self.ops
    }

    pub fn clear_color(&self) -> [f32; 4] {
        self.clear_color
    }

    /// Whether any draw reads the target while writing it. No render step does.
    pub fn requires_dst_texture(&self) -> bool {
        false
    }

    pub fn requires_msaa(&self) -> bool {
        self.requires_msaa
    }

    pub fn depth_stencil_flags(&self) -> DepthStencilFlags {
        self.depth_stencil_flags
    }

    /// Bytes of vertex and instance data written for this pass, excluding static buffers.
    pub fn vertex_buffer_size(&self) -> usize {
        self.vertex_buffer_size
    }

    /// Bytes of render step uniforms and paint storage written for this pass.
    pub fn uniform_buffer_size(&self) -> usize {
        self.uniform_buffer_size
    }

    pub fn pipeline_descs(&self) -> &[GraphicsPipelineDesc] {
        &self.pipeline_descs
    }

    pub fn sampled_textures(&self) -> &[Arc<TextureProxy>] {
        &self.sampled_textures
    }

    pub fn sampler_descs(&self) -> &[SamplerDesc] {
        &self.sampler_descs
    }

    /// The pipeline bound by `BindGraphicsPipeline { pipeline_index: index }`.
    ///
    /// Only available once resources are prepared.
    pub fn pipeline(&self, index: usize) -> Option<&Arc<GraphicsPipeline>> {
        self.full_pipelines.get(index)
    }

    pub fn texture(&self, index: usize) -> Option<&Arc<Texture>> {
        self.textures.get(index)
    }

    pub fn sampler(&self, index: usize) -> Option<&Arc<Sampler>> {
        self.samplers.get(index)
    }

    pub fn commands(&self) -> std::slice::Iter<'_, Command> {
        self.commands.commands()
    }

    pub fn is_prepared(&self) -> bool {
        self.prepared
    }

    /// Resolves every pipeline, texture and sampler the commands refer to.
    ///
    /// This happens once; later calls return immediately. On failure nothing is retained and
    /// the pass stays unprepared.
    pub fn prepare_resources(
        &mut self,
        provider: &mut dyn ResourceProvider,
        render_pass: &RenderPassDesc,
    ) -> Result<()> {
        if self.prepared {
            return Ok(());
        }
        match self.resolve_resources(provider, render_pass) {
            Ok(()) => {
                log::debug!(
                    "Prepared {} pipelines, {} textures and {} samplers for '{}'",
                    self.full_pipelines.len(),
                    self.textures.len(),
                    self.samplers.len(),
                    self.target.label()
                );
                self.prepared = true;
                Ok(())
            }
            Err(err) => {
                log::warn!("Failed to prepare draw pass: {err}");
                self.full_pipelines.clear();
                self.textures.clear();
                self.samplers.clear();
                Err(err)
            }
        }
    }

    fn resolve_resources(
        &mut self,
        provider: &mut dyn ResourceProvider,
        render_pass: &RenderPassDesc,
    ) -> Result<()> {
        self.full_pipelines.reserve(self.pipeline_descs.len());
        for desc in &self.pipeline_descs {
            let pipeline = provider
                .find_or_create_graphics_pipeline(desc, render_pass)
                .ok_or_else(|| Error::PipelineCreation(desc.label()))?;
            self.full_pipelines.push(pipeline);
        }
        self.target.instantiate(provider)?;
        for proxy in &self.sampled_textures {
            self.textures.push(proxy.instantiate(provider)?);
        }
        for desc in &self.sampler_descs {
            let sampler = provider
                .find_or_create_compatible_sampler(desc)
                .ok_or(Error::SamplerCreation(*desc))?;
            self.samplers.push(sampler);
        }
        Ok(())
    }

    /// Makes `command_buffer` retain every resource of the pass.
    pub fn add_resource_refs(&self, command_buffer: &mut CommandBuffer) {
        for pipeline in &self.full_pipelines {
            command_buffer.track_resource(TrackedResource::Pipeline(pipeline.clone()));
        }
        for texture in &self.textures {
            command_buffer.track_resource(TrackedResource::Texture(texture.clone()));
        }
        for sampler in &self.samplers {
            command_buffer.track_resource(TrackedResource::Sampler(sampler.clone()));
        }
    }
}
