// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use crate::wangs_formula::MAX_RESOLVE_LEVEL;

/// Static vertex and index data for drawing wedge patches as fixed-count instances.
///
/// Each instance is one patch. Its vertices are `(resolve level, index)` pairs: the fan vertex
/// is `(-1, -1)`, and a curve vertex `(level, n)` sits at `t = n / 2^level` on the patch. The
/// index buffer starts with the fan triangle, then lists the curve triangles in middle-out
/// order, so drawing the first `index_count(level)` indices tessellates a curve into
/// `2^level` segments.
pub struct FixedCountWedges;

impl FixedCountWedges {
    pub const VERTEX_COUNT: usize = 2 + (1 << MAX_RESOLVE_LEVEL);
    pub const VERTEX_BUFFER_SIZE: usize = Self::VERTEX_COUNT * 2 * 4;
    pub const INDEX_BUFFER_SIZE: usize = Self::index_count(MAX_RESOLVE_LEVEL) as usize * 2;

    /// Number of indices needed to draw a wedge at `resolve_level`.
    pub const fn index_count(resolve_level: u32) -> u32 {
        3 << resolve_level
    }

    /// Estimated number of patches for a path with `verb_count` verbs.
    ///
    /// Leaves room for closing lines and a modest amount of chopping.
    pub const fn prealloc_count(verb_count: usize) -> usize {
        (verb_count * 5 + 3) / 4
    }

    pub fn write_vertex_buffer(out: &mut Vec<u8>) {
        let mut vertices: Vec<[f32; 2]> = Vec::with_capacity(Self::VERTEX_COUNT);
        vertices.push([-1.0, -1.0]);
        vertices.push([0.0, 0.0]);
        vertices.push([0.0, 1.0]);
        for level in 1..=MAX_RESOLVE_LEVEL {
            for n in (1..1_u32 << level).step_by(2) {
                vertices.push([level as f32, n as f32]);
            }
        }
        debug_assert_eq!(vertices.len(), Self::VERTEX_COUNT);
        out.extend_from_slice(bytemuck::cast_slice(&vertices));
    }

    pub fn write_index_buffer(out: &mut Vec<u8>) {
        let mut indices: Vec<u16> = Vec::with_capacity(Self::INDEX_BUFFER_SIZE / 2);
        indices.extend([0, 1, 2]);
        for level in 1..=MAX_RESOLVE_LEVEL {
            for i in 0..1_u32 << (level - 1) {
                indices.extend([
                    t_vertex(2 * i, level),
                    t_vertex(2 * i + 1, level),
                    t_vertex(2 * i + 2, level),
                ]);
            }
        }
        debug_assert_eq!(indices.len() * 2, Self::INDEX_BUFFER_SIZE);
        out.extend_from_slice(bytemuck::cast_slice(&indices));
    }
}

/// Index of the curve vertex `(level, n)` for odd `n`.
const fn vertex_index(level: u32, n: u32) -> u16 {
    (2 + (1 << (level - 1)) + (n - 1) / 2) as u16
}

/// Index of the vertex at `t = num / 2^level`.
fn t_vertex(mut num: u32, mut level: u32) -> u16 {
    while level > 0 && num % 2 == 0 {
        num /= 2;
        level -= 1;
    }
    if level == 0 {
        1 + num as u16
    } else {
        vertex_index(level, num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_vertices() -> Vec<[f32; 2]> {
        let mut bytes = Vec::new();
        FixedCountWedges::write_vertex_buffer(&mut bytes);
        bytes
            .chunks_exact(8)
            .map(|c| {
                let x = f32::from_ne_bytes(c[..4].try_into().unwrap());
                let y = f32::from_ne_bytes(c[4..].try_into().unwrap());
                [x, y]
            })
            .collect()
    }

    fn decode_indices() -> Vec<u16> {
        let mut bytes = Vec::new();
        FixedCountWedges::write_index_buffer(&mut bytes);
        bytes
            .chunks_exact(2)
            .map(|c| u16::from_ne_bytes([c[0], c[1]]))
            .collect()
    }

    #[test]
    fn buffer_sizes() {
        assert_eq!(FixedCountWedges::VERTEX_COUNT, 34);
        assert_eq!(decode_vertices().len(), 34);
        assert_eq!(decode_indices().len(), 96);
        assert_eq!(FixedCountWedges::INDEX_BUFFER_SIZE, 192);
    }

    #[test]
    fn prealloc() {
        assert_eq!(FixedCountWedges::prealloc_count(0), 0);
        assert_eq!(FixedCountWedges::prealloc_count(1), 2);
        assert_eq!(FixedCountWedges::prealloc_count(4), 5);
    }

    #[test]
    fn index_counts() {
        assert_eq!(FixedCountWedges::index_count(0), 3);
        assert_eq!(FixedCountWedges::index_count(1), 6);
        assert_eq!(FixedCountWedges::index_count(5), 96);
    }

    #[test]
    fn indices_reference_valid_vertices() {
        let vertices = decode_vertices();
        let indices = decode_indices();
        assert_eq!(&indices[..3], &[0, 1, 2]);
        assert!(indices.iter().all(|&i| (i as usize) < vertices.len()));
        // Every level's triangles use vertices no finer than that level.
        let mut start = 3;
        for level in 1..=MAX_RESOLVE_LEVEL {
            let end = FixedCountWedges::index_count(level) as usize;
            for &i in &indices[start..end] {
                assert!(vertices[i as usize][0] <= level as f32);
            }
            start = end;
        }
    }

    #[test]
    fn middle_out_first_triangle() {
        let vertices = decode_vertices();
        let indices = decode_indices();
        // t = 0, t = 1/2, t = 1
        assert_eq!(vertices[indices[3] as usize], [0.0, 0.0]);
        assert_eq!(vertices[indices[4] as usize], [1.0, 1.0]);
        assert_eq!(vertices[indices[5] as usize], [0.0, 1.0]);
    }
}
