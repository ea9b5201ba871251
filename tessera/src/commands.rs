// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use smallvec::SmallVec;

use crate::buffer_manager::BindBufferInfo;
use crate::render_step::PrimitiveType;

/// Which uniform binding a [`Command::BindUniformBuffer`] targets.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UniformSlot {
    /// Per-draw uniforms written by the render step.
    RenderStep,
    /// The storage block of paint parameters shared by every draw using a pipeline. Draws
    /// select their record with the SSBO index in their vertex data.
    Paint,
}

/// Integer scissor rectangle in device pixels.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ScissorRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl ScissorRect {
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// Single command of a draw pass, executed by the backend in order.
///
/// Pipelines, textures and samplers are referenced by index into the vectors of the
/// [`DrawPass`](crate::DrawPass) that recorded them.
#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    BindGraphicsPipeline {
        pipeline_index: u32,
    },
    BindUniformBuffer {
        info: BindBufferInfo,
        slot: UniformSlot,
    },
    /// Binds the vertex, instance and index buffers used by the following draws.
    BindDrawBuffers {
        vertices: Option<BindBufferInfo>,
        instances: Option<BindBufferInfo>,
        indices: Option<BindBufferInfo>,
    },
    BindTexturesAndSamplers {
        texture_indices: SmallVec<[u32; 4]>,
        sampler_indices: SmallVec<[u32; 4]>,
    },
    SetScissor(ScissorRect),
    Draw {
        ty: PrimitiveType,
        base_vertex: u32,
        vertex_count: u32,
    },
    DrawIndexed {
        ty: PrimitiveType,
        base_index: u32,
        index_count: u32,
        base_vertex: u32,
    },
    DrawInstanced {
        ty: PrimitiveType,
        base_vertex: u32,
        vertex_count: u32,
        base_instance: u32,
        instance_count: u32,
    },
    DrawIndexedInstanced {
        ty: PrimitiveType,
        base_index: u32,
        index_count: u32,
        base_vertex: u32,
        base_instance: u32,
        instance_count: u32,
    },
}

impl Command {
    /// Returns true for the draw variants.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Self::Draw { .. }
                | Self::DrawIndexed { .. }
                | Self::DrawInstanced { .. }
                | Self::DrawIndexedInstanced { .. }
        )
    }
}

/// Append-only list of [`Command`]s.
#[derive(Clone, Debug, Default)]
pub struct CommandList {
    commands: Vec<Command>,
}

impl CommandList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn last(&self) -> Option<&Command> {
        self.commands.last()
    }

    /// Iterates over the commands in execution order. Each call starts from the beginning.
    pub fn commands(&self) -> std::slice::Iter<'_, Command> {
        self.commands.iter()
    }
}
