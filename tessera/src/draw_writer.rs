// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::atlas::AtlasManager;
use crate::buffer_manager::{BindBufferInfo, BufferType, DrawBufferManager};
use crate::commands::{Command, CommandList};
use crate::render_step::PrimitiveType;

/// Most quads drawn by a single indexed draw, and the size of the shared quad index buffer.
pub const MAX_QUADS_PER_DRAW: usize = 2048;

/// Writes the shared quad index buffer: `(0, 1, 2, 2, 1, 3)` offset by four per quad.
pub(crate) fn write_quad_indices(out: &mut Vec<u8>) {
    out.reserve(MAX_QUADS_PER_DRAW * 6 * 2);
    for quad in 0..MAX_QUADS_PER_DRAW as u16 {
        for index in [0, 1, 2, 2, 1, 3] {
            out.extend_from_slice(&(quad * 4 + index).to_ne_bytes());
        }
    }
}

/// Geometry accumulated since the last flush.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
enum Pending {
    #[default]
    None,
    /// Instances of a template. The template is drawn from `vertices` and `indices` when
    /// present, and is otherwise generated from the vertex index alone.
    Instances {
        vertices: Option<BindBufferInfo>,
        indices: Option<BindBufferInfo>,
        template_count: u32,
        instance_count: u32,
    },
    /// Four vertices per quad, indexed with the shared quad index buffer.
    Quads {
        indices: BindBufferInfo,
        quad_count: usize,
    },
}

/// Batches the vertex data of consecutive draws with compatible state into shared draw calls.
///
/// Render steps append their data through the writer; the writer emits `BindDrawBuffers` and
/// a draw command whenever the batch is flushed. A flush happens when the pipeline state
/// changes, when a draw needs different template buffers, and on demand.
pub struct DrawWriter<'a> {
    commands: &'a mut CommandList,
    buffers: &'a mut DrawBufferManager,
    atlas: &'a mut AtlasManager,
    primitive: PrimitiveType,
    data: Vec<u8>,
    pending: Pending,
    bytes_written: usize,
}

impl<'a> DrawWriter<'a> {
    pub fn new(
        commands: &'a mut CommandList,
        buffers: &'a mut DrawBufferManager,
        atlas: &'a mut AtlasManager,
    ) -> Self {
        Self {
            commands,
            buffers,
            atlas,
            primitive: PrimitiveType::Triangles,
            data: Vec::new(),
            pending: Pending::None,
            bytes_written: 0,
        }
    }

    /// Flushes pending draws and switches to a new pipeline.
    pub fn new_pipeline_state(&mut self, primitive: PrimitiveType) {
        self.flush();
        self.primitive = primitive;
    }

    /// Records a state command without flushing.
    ///
    /// The command applies to the pending draw as well, so it must be compatible with it.
    pub fn push_state_command(&mut self, command: Command) {
        debug_assert!(!command.is_draw());
        self.commands.push(command);
    }

    pub fn buffer_manager(&mut self) -> &mut DrawBufferManager {
        self.buffers
    }

    pub fn atlas_manager(&self) -> &AtlasManager {
        self.atlas
    }

    pub fn atlas_manager_mut(&mut self) -> &mut AtlasManager {
        self.atlas
    }

    /// Total vertex and instance bytes written by flushed draws.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written
    }

    /// Appends instances of a template.
    ///
    /// `write` appends the instance data and returns the number of instances it wrote along
    /// with the number of template vertices (or indices) they need. The batch is drawn with
    /// the largest template count of its instances.
    pub fn write_instances(
        &mut self,
        vertices: Option<BindBufferInfo>,
        indices: Option<BindBufferInfo>,
        write: impl FnOnce(&mut Vec<u8>) -> (u32, u32),
    ) {
        match self.pending {
            Pending::Instances {
                vertices: v,
                indices: i,
                ..
            } if v == vertices && i == indices => {}
            Pending::None => {}
            _ => self.flush(),
        }
        let (count, template) = write(&mut self.data);
        if count == 0 {
            return;
        }
        self.pending = match self.pending {
            Pending::Instances {
                template_count,
                instance_count,
                ..
            } => Pending::Instances {
                vertices,
                indices,
                template_count: template_count.max(template),
                instance_count: instance_count + count,
            },
            _ => Pending::Instances {
                vertices,
                indices,
                template_count: template,
                instance_count: count,
            },
        };
    }

    /// Appends `quad_count` quads of four vertices each.
    pub fn append_quads(&mut self, indices: BindBufferInfo, vertices: &[u8], quad_count: usize) {
        if quad_count == 0 {
            return;
        }
        let quad_count = match self.pending {
            Pending::Quads {
                indices: i,
                quad_count: pending,
            } if i == indices => pending + quad_count,
            Pending::None => quad_count,
            _ => {
                self.flush();
                quad_count
            }
        };
        self.data.extend_from_slice(vertices);
        self.pending = Pending::Quads {
            indices,
            quad_count,
        };
    }

    /// Emits the pending batch, if any.
    pub fn flush(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        if pending == Pending::None {
            return;
        }
        let data = self.buffers.append(BufferType::Vertex, &self.data);
        self.bytes_written += self.data.len();
        self.data.clear();
        let ty = self.primitive;
        match pending {
            Pending::None => {}
            Pending::Instances {
                vertices,
                indices,
                template_count,
                instance_count,
            } => {
                self.commands.push(Command::BindDrawBuffers {
                    vertices,
                    instances: Some(data),
                    indices,
                });
                self.commands.push(match indices {
                    Some(_) => Command::DrawIndexedInstanced {
                        ty,
                        base_index: 0,
                        index_count: template_count,
                        base_vertex: 0,
                        base_instance: 0,
                        instance_count,
                    },
                    None => Command::DrawInstanced {
                        ty,
                        base_vertex: 0,
                        vertex_count: template_count,
                        base_instance: 0,
                        instance_count,
                    },
                });
            }
            Pending::Quads {
                indices,
                quad_count,
            } => {
                self.commands.push(Command::BindDrawBuffers {
                    vertices: Some(data),
                    instances: None,
                    indices: Some(indices),
                });
                let mut first = 0;
                while first < quad_count {
                    let count = (quad_count - first).min(MAX_QUADS_PER_DRAW);
                    self.commands.push(Command::DrawIndexed {
                        ty,
                        base_index: 0,
                        index_count: (count * 6) as u32,
                        base_vertex: (first * 4) as u32,
                    });
                    first += count;
                }
            }
        }
    }
}
