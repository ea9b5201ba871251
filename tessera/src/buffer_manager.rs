// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::HashMap;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BufferType {
    Vertex,
    Index,
    Uniform,
    Storage,
}

impl BufferType {
    const COUNT: usize = 4;

    /// Required alignment of bindings into a buffer of this type.
    pub fn alignment(self) -> usize {
        match self {
            Self::Vertex | Self::Index => 4,
            Self::Uniform | Self::Storage => 256,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Vertex => "vertices",
            Self::Index => "indices",
            Self::Uniform => "uniforms",
            Self::Storage => "storage",
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// A byte range of a buffer, as bound by a command.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BindBufferInfo {
    pub buffer: BufferId,
    pub offset: u64,
    pub size: u64,
}

struct StagingBuffer {
    ty: BufferType,
    label: &'static str,
    data: Vec<u8>,
    capacity: usize,
}

/// CPU staging for the buffers referenced by draw commands.
///
/// Data is appended to the current buffer of each type until it would exceed
/// `max_buffer_size`, at which point a new buffer is started. Appended ranges never move, so
/// [`BindBufferInfo`]s stay valid until [`reset`](Self::reset). Static buffers, such as the
/// fixed-count tessellation templates, are written once and shared by label.
pub struct DrawBufferManager {
    max_buffer_size: usize,
    buffers: Vec<StagingBuffer>,
    current: [Option<usize>; BufferType::COUNT],
    static_buffers: HashMap<&'static str, BindBufferInfo>,
}

impl DrawBufferManager {
    pub fn new(max_buffer_size: usize) -> Self {
        Self {
            max_buffer_size: max_buffer_size.max(256),
            buffers: Vec::new(),
            current: [None; BufferType::COUNT],
            static_buffers: HashMap::new(),
        }
    }

    /// Copies `bytes` into a buffer of type `ty`.
    pub fn append(&mut self, ty: BufferType, bytes: &[u8]) -> BindBufferInfo {
        let slot = ty as usize;
        let align = ty.alignment();
        if let Some(index) = self.current[slot] {
            let buffer = &mut self.buffers[index];
            let offset = buffer.data.len().next_multiple_of(align);
            if offset + bytes.len() <= buffer.capacity {
                buffer.data.resize(offset, 0);
                buffer.data.extend_from_slice(bytes);
                return BindBufferInfo {
                    buffer: BufferId(index as u32),
                    offset: offset as u64,
                    size: bytes.len() as u64,
                };
            }
        }
        let capacity = self.max_buffer_size.max(bytes.len());
        let index = self.push_buffer(ty, ty.label(), bytes.to_vec(), capacity);
        self.current[slot] = Some(index);
        BindBufferInfo {
            buffer: BufferId(index as u32),
            offset: 0,
            size: bytes.len() as u64,
        }
    }

    /// Returns the static buffer named `label`, creating it with `write` on first use.
    pub fn get_static_buffer(
        &mut self,
        ty: BufferType,
        label: &'static str,
        write: impl FnOnce(&mut Vec<u8>),
    ) -> BindBufferInfo {
        if let Some(info) = self.static_buffers.get(label) {
            return *info;
        }
        let mut data = Vec::new();
        write(&mut data);
        let size = data.len();
        let index = self.push_buffer(ty, label, data, size);
        let info = BindBufferInfo {
            buffer: BufferId(index as u32),
            offset: 0,
            size: size as u64,
        };
        log::debug!("Created static {ty:?} buffer '{label}' ({size} bytes)");
        self.static_buffers.insert(label, info);
        info
    }

    fn push_buffer(
        &mut self,
        ty: BufferType,
        label: &'static str,
        data: Vec<u8>,
        capacity: usize,
    ) -> usize {
        self.buffers.push(StagingBuffer {
            ty,
            label,
            data,
            capacity,
        });
        self.buffers.len() - 1
    }

    pub fn buffer_count(&self) -> usize {
        self.buffers.len()
    }

    /// Contents of a buffer, for upload by the backend.
    pub fn data(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(id.0 as usize).map(|b| b.data.as_slice())
    }

    pub fn buffer_type(&self, id: BufferId) -> Option<BufferType> {
        self.buffers.get(id.0 as usize).map(|b| b.ty)
    }

    pub fn label(&self, id: BufferId) -> Option<&'static str> {
        self.buffers.get(id.0 as usize).map(|b| b.label)
    }

    /// Bytes used by buffers of type `ty`, including static buffers and alignment padding.
    pub fn bytes_used(&self, ty: BufferType) -> usize {
        self.buffers
            .iter()
            .filter(|b| b.ty == ty)
            .map(|b| b.data.len())
            .sum()
    }

    /// Drops every buffer. Previously returned bindings become invalid.
    pub fn reset(&mut self) {
        self.buffers.clear();
        self.current = [None; BufferType::COUNT];
        self.static_buffers.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_are_aligned() {
        let mut manager = DrawBufferManager::new(1024);
        let a = manager.append(BufferType::Uniform, &[1; 10]);
        let b = manager.append(BufferType::Uniform, &[2; 10]);
        assert_eq!(a.buffer, b.buffer);
        assert_eq!(b.offset, 256);
        let v = manager.append(BufferType::Vertex, &[3; 6]);
        let w = manager.append(BufferType::Vertex, &[4; 4]);
        assert_ne!(v.buffer, a.buffer);
        assert_eq!(w.offset, 8);
        assert_eq!(manager.data(w.buffer).unwrap()[8..], [4; 4]);
    }

    #[test]
    fn full_buffers_are_chunked() {
        let mut manager = DrawBufferManager::new(256);
        let a = manager.append(BufferType::Vertex, &[0; 200]);
        let b = manager.append(BufferType::Vertex, &[0; 200]);
        assert_ne!(a.buffer, b.buffer);
        assert_eq!(b.offset, 0);
        // Oversized data gets a dedicated buffer.
        let c = manager.append(BufferType::Vertex, &[0; 1000]);
        assert_eq!(c.size, 1000);
        assert_eq!(manager.buffer_count(), 3);
    }

    #[test]
    fn static_buffers_are_created_once() {
        let mut manager = DrawBufferManager::new(256);
        let mut calls = 0;
        let a = manager.get_static_buffer(BufferType::Index, "quad", |out| {
            calls += 1;
            out.extend_from_slice(&[0, 1, 2, 3]);
        });
        let b = manager.get_static_buffer(BufferType::Index, "quad", |_| calls += 1);
        assert_eq!(a, b);
        assert_eq!(calls, 1);
        assert_eq!(manager.label(a.buffer), Some("quad"));
    }
}
