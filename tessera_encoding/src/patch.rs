// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use bitflags::bitflags;
use peniko::kurbo::Point;

use crate::math::point_to_f32;
use crate::wangs_formula::{self, VectorXform, MAX_RESOLVE_LEVEL, MAX_SEGMENTS_P4, PRECISION};

bitflags! {
    /// Optional per-patch attributes that follow the four control points.
    ///
    /// Attributes are written in declaration order, so the stride of a patch depends only on
    /// which flags are set.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct PatchAttribs: u8 {
        /// Wedge fan point, two floats.
        const FAN_POINT = 1 << 0;
        /// Paint depth used as the device z value, one float.
        const PAINT_DEPTH = 1 << 1;
        /// Index of the paint uniform block, one unsigned int.
        const SSBO_INDEX = 1 << 2;
    }
}

/// Size in bytes of a patch carrying `attribs`.
pub fn patch_stride(attribs: PatchAttribs) -> usize {
    let mut stride = 4 * 2 * 4;
    if attribs.contains(PatchAttribs::FAN_POINT) {
        stride += 2 * 4;
    }
    if attribs.contains(PatchAttribs::PAINT_DEPTH) {
        stride += 4;
    }
    if attribs.contains(PatchAttribs::SSBO_INDEX) {
        stride += 4;
    }
    stride
}

/// Curves are chopped in half at most this many times before being written at the maximum
/// resolve level regardless of their segment count.
const MAX_CHOP_DEPTH: u32 = 8;

/// Writes path segments as fixed-size patches into a byte buffer.
///
/// Every segment becomes one patch of four control points followed by the attributes
/// selected at construction:
///
/// - lines are written as `(p0, p0, p1, p1)`,
/// - quadratics are elevated to the equivalent cubic,
/// - conics store their weight in `p3.x` and infinity in `p3.y`,
/// - cubics are written as is.
///
/// Curves that need more parametric segments than the fixed-count index buffer provides are
/// chopped in half until they fit. The writer remembers the largest resolve level it wrote so
/// the draw can size its instance template.
pub struct PatchWriter<'a> {
    attribs: PatchAttribs,
    out: &'a mut Vec<u8>,
    fan_point: [f32; 2],
    depth: f32,
    ssbo_index: u32,
    xform: VectorXform,
    max_scale: f32,
    count: usize,
    resolve_level: u32,
}

impl<'a> PatchWriter<'a> {
    pub fn new(attribs: PatchAttribs, out: &'a mut Vec<u8>, reserve_count: usize) -> Self {
        out.reserve(reserve_count * patch_stride(attribs));
        Self {
            attribs,
            out,
            fan_point: [0.0; 2],
            depth: 0.0,
            ssbo_index: 0,
            xform: VectorXform::IDENTITY,
            max_scale: 1.0,
            count: 0,
            resolve_level: 0,
        }
    }

    pub fn attribs(&self) -> PatchAttribs {
        self.attribs
    }

    pub fn stride(&self) -> usize {
        patch_stride(self.attribs)
    }

    pub fn update_fan_point_attrib(&mut self, fan_point: Point) {
        debug_assert!(self.attribs.contains(PatchAttribs::FAN_POINT));
        self.fan_point = point_to_f32(fan_point);
    }

    pub fn update_paint_depth_attrib(&mut self, depth: f32) {
        debug_assert!(self.attribs.contains(PatchAttribs::PAINT_DEPTH));
        self.depth = depth;
    }

    pub fn update_ssbo_index_attrib(&mut self, ssbo_index: u32) {
        debug_assert!(self.attribs.contains(PatchAttribs::SSBO_INDEX));
        self.ssbo_index = ssbo_index;
    }

    /// Sets the local-to-device vector transform used to estimate segment counts.
    ///
    /// `max_scale` is the transform's largest scale factor. When the transform has
    /// perspective, the estimate also considers the untransformed curve scaled by it, since the
    /// 2x2 part alone ignores the projective divide.
    pub fn set_shader_transform(&mut self, xform: VectorXform, max_scale: f32) {
        self.xform = xform;
        self.max_scale = max_scale;
    }

    /// Number of patches written so far.
    pub fn patch_count(&self) -> usize {
        self.count
    }

    /// Largest resolve level of any patch written so far.
    pub fn resolve_level(&self) -> u32 {
        self.resolve_level
    }

    pub fn write_line(&mut self, p0: Point, p1: Point) {
        let (p0, p1) = (point_to_f32(p0), point_to_f32(p1));
        self.write_patch([p0, p0, p1, p1], 0);
    }

    pub fn write_quadratic(&mut self, pts: &[Point]) {
        let p = [pts[0], pts[1], pts[2]].map(point_to_f32);
        self.quadratic(p, 0);
    }

    pub fn write_conic(&mut self, pts: &[Point], w: f32) {
        let p = [pts[0], pts[1], pts[2]].map(point_to_f32);
        self.conic(p, w, 0);
    }

    pub fn write_cubic(&mut self, pts: &[Point]) {
        let p = [pts[0], pts[1], pts[2], pts[3]].map(point_to_f32);
        self.cubic(p, 0);
    }

    fn quadratic(&mut self, p: [[f32; 2]; 3], depth: u32) {
        let n4 = self.estimate_p4(|x| wangs_formula::quadratic_p4(PRECISION, &p, x));
        if n4 > MAX_SEGMENTS_P4 && depth < MAX_CHOP_DEPTH {
            let (a, b) = chop_quadratic(p);
            self.quadratic(a, depth + 1);
            self.quadratic(b, depth + 1);
            return;
        }
        let c1 = lerp(p[0], p[1], 2.0 / 3.0);
        let c2 = lerp(p[2], p[1], 2.0 / 3.0);
        self.write_patch([p[0], c1, c2, p[2]], wangs_formula::resolve_level_p4(n4));
    }

    fn conic(&mut self, p: [[f32; 2]; 3], w: f32, depth: u32) {
        let n4 = self.estimate_p4(|x| {
            let n2 = wangs_formula::conic_p2(PRECISION, &p, w, x);
            n2 * n2
        });
        if n4 > MAX_SEGMENTS_P4 && depth < MAX_CHOP_DEPTH {
            let (a, b, w) = chop_conic(p, w);
            self.conic(a, w, depth + 1);
            self.conic(b, w, depth + 1);
            return;
        }
        if !(w.is_finite() && p.iter().flatten().all(|v| v.is_finite())) {
            return;
        }
        self.emit(
            [p[0], p[1], p[2], [w, f32::INFINITY]],
            wangs_formula::resolve_level_p4(n4),
        );
    }

    fn cubic(&mut self, p: [[f32; 2]; 4], depth: u32) {
        let n4 = self.estimate_p4(|x| wangs_formula::cubic_p4(PRECISION, &p, x));
        if n4 > MAX_SEGMENTS_P4 && depth < MAX_CHOP_DEPTH {
            let (a, b) = chop_cubic(p);
            self.cubic(a, depth + 1);
            self.cubic(b, depth + 1);
            return;
        }
        self.write_patch(p, wangs_formula::resolve_level_p4(n4));
    }

    /// Segment count to the fourth power under the current shader transform.
    fn estimate_p4(&self, n4: impl Fn(&VectorXform) -> f32) -> f32 {
        let transformed = n4(&self.xform);
        if !self.xform.has_perspective() {
            return transformed;
        }
        // n^4 grows with the square of a uniform scale.
        let scaled = n4(&VectorXform::IDENTITY) * self.max_scale * self.max_scale;
        transformed.max(scaled)
    }

    fn write_patch(&mut self, p: [[f32; 2]; 4], resolve_level: u32) {
        if p.iter().flatten().all(|v| v.is_finite()) {
            self.emit(p, resolve_level);
        }
    }

    fn emit(&mut self, p: [[f32; 2]; 4], resolve_level: u32) {
        self.out.extend_from_slice(bytemuck::cast_slice(&p));
        if self.attribs.contains(PatchAttribs::FAN_POINT) {
            self.out.extend_from_slice(bytemuck::bytes_of(&self.fan_point));
        }
        if self.attribs.contains(PatchAttribs::PAINT_DEPTH) {
            self.out.extend_from_slice(bytemuck::bytes_of(&self.depth));
        }
        if self.attribs.contains(PatchAttribs::SSBO_INDEX) {
            self.out.extend_from_slice(bytemuck::bytes_of(&self.ssbo_index));
        }
        self.count += 1;
        self.resolve_level = self.resolve_level.max(resolve_level.min(MAX_RESOLVE_LEVEL));
    }
}

#[inline]
fn lerp(a: [f32; 2], b: [f32; 2], t: f32) -> [f32; 2] {
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t]
}

fn chop_quadratic(p: [[f32; 2]; 3]) -> ([[f32; 2]; 3], [[f32; 2]; 3]) {
    let ab = lerp(p[0], p[1], 0.5);
    let bc = lerp(p[1], p[2], 0.5);
    let mid = lerp(ab, bc, 0.5);
    ([p[0], ab, mid], [mid, bc, p[2]])
}

fn chop_cubic(p: [[f32; 2]; 4]) -> ([[f32; 2]; 4], [[f32; 2]; 4]) {
    let ab = lerp(p[0], p[1], 0.5);
    let bc = lerp(p[1], p[2], 0.5);
    let cd = lerp(p[2], p[3], 0.5);
    let abc = lerp(ab, bc, 0.5);
    let bcd = lerp(bc, cd, 0.5);
    let mid = lerp(abc, bcd, 0.5);
    ([p[0], ab, abc, mid], [mid, bcd, cd, p[3]])
}

/// Splits a conic at `t = 0.5`. Both halves share the returned weight.
fn chop_conic(p: [[f32; 2]; 3], w: f32) -> ([[f32; 2]; 3], [[f32; 2]; 3], f32) {
    let scale = 1.0 / (1.0 + w);
    let c0 = [(p[0][0] + w * p[1][0]) * scale, (p[0][1] + w * p[1][1]) * scale];
    let c1 = [(w * p[1][0] + p[2][0]) * scale, (w * p[1][1] + p[2][1]) * scale];
    let mid = [
        (p[0][0] + 2.0 * w * p[1][0] + p[2][0]) * 0.5 * scale,
        (p[0][1] + 2.0 * w * p[1][1] + p[2][1]) * 0.5 * scale,
    ];
    let w = ((1.0 + w) * 0.5).sqrt();
    ([p[0], c0, mid], [mid, c1, p[2]], w)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEDGE_ATTRIBS: PatchAttribs = PatchAttribs::FAN_POINT
        .union(PatchAttribs::PAINT_DEPTH)
        .union(PatchAttribs::SSBO_INDEX);

    fn floats(bytes: &[u8]) -> Vec<f32> {
        bytes
            .chunks_exact(4)
            .map(|c| f32::from_ne_bytes(c.try_into().unwrap()))
            .collect()
    }

    #[test]
    fn strides() {
        assert_eq!(patch_stride(PatchAttribs::empty()), 32);
        assert_eq!(patch_stride(PatchAttribs::FAN_POINT), 40);
        assert_eq!(patch_stride(WEDGE_ATTRIBS), 48);
    }

    #[test]
    fn line_layout() {
        let mut out = Vec::new();
        let mut writer = PatchWriter::new(WEDGE_ATTRIBS, &mut out, 1);
        writer.update_fan_point_attrib(Point::new(5.0, 6.0));
        writer.update_paint_depth_attrib(0.5);
        writer.update_ssbo_index_attrib(7);
        writer.write_line(Point::new(1.0, 2.0), Point::new(3.0, 4.0));
        assert_eq!(writer.patch_count(), 1);
        assert_eq!(writer.resolve_level(), 0);
        assert_eq!(out.len(), 48);
        assert_eq!(
            floats(&out[..44]),
            [1.0, 2.0, 1.0, 2.0, 3.0, 4.0, 3.0, 4.0, 5.0, 6.0, 0.5]
        );
        let ssbo: u32 = bytemuck::pod_read_unaligned(&out[44..48]);
        assert_eq!(ssbo, 7);
    }

    #[test]
    fn quadratic_is_elevated() {
        let mut out = Vec::new();
        let mut writer = PatchWriter::new(PatchAttribs::empty(), &mut out, 1);
        writer.write_quadratic(&[
            Point::new(0.0, 0.0),
            Point::new(3.0, 3.0),
            Point::new(6.0, 0.0),
        ]);
        assert_eq!(floats(&out), [0.0, 0.0, 2.0, 2.0, 4.0, 2.0, 6.0, 0.0]);
    }

    #[test]
    fn conic_tags_weight() {
        let mut out = Vec::new();
        let mut writer = PatchWriter::new(PatchAttribs::empty(), &mut out, 1);
        writer.write_conic(
            &[Point::new(0.0, 0.0), Point::new(1.0, 1.0), Point::new(2.0, 0.0)],
            0.5,
        );
        let f = floats(&out);
        assert_eq!(f[6], 0.5);
        assert_eq!(f[7], f32::INFINITY);
    }

    #[test]
    fn huge_curves_are_chopped() {
        let mut out = Vec::new();
        let mut writer = PatchWriter::new(PatchAttribs::empty(), &mut out, 1);
        writer.write_cubic(&[
            Point::new(0.0, 0.0),
            Point::new(0.0, 20000.0),
            Point::new(20000.0, 20000.0),
            Point::new(20000.0, 0.0),
        ]);
        let patches = writer.patch_count();
        assert!(patches > 1);
        assert_eq!(writer.resolve_level(), MAX_RESOLVE_LEVEL);
        drop(writer);
        assert_eq!(out.len(), patches * 32);
    }

    #[test]
    fn non_finite_patches_are_dropped() {
        let mut out = Vec::new();
        let mut writer = PatchWriter::new(PatchAttribs::empty(), &mut out, 1);
        writer.write_line(Point::new(f64::NAN, 0.0), Point::new(1.0, 1.0));
        writer.write_cubic(&[
            Point::new(0.0, 0.0),
            Point::new(f64::INFINITY, 0.0),
            Point::new(1.0, 0.0),
            Point::new(2.0, 0.0),
        ]);
        assert_eq!(writer.patch_count(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn perspective_widens_estimate() {
        use crate::math::Transform;
        let pts = [
            Point::new(0.0, 0.0),
            Point::new(10.0, 40.0),
            Point::new(30.0, 40.0),
            Point::new(40.0, 0.0),
        ];
        let persp = Transform::from_row_major([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.25]);
        let mut flat_out = Vec::new();
        let mut flat = PatchWriter::new(PatchAttribs::empty(), &mut flat_out, 1);
        flat.set_shader_transform(VectorXform::IDENTITY, 1.0);
        flat.write_cubic(&pts);
        let flat_level = flat.resolve_level();

        let mut persp_out = Vec::new();
        let mut projected = PatchWriter::new(PatchAttribs::empty(), &mut persp_out, 1);
        projected.set_shader_transform(VectorXform::from_transform(&persp), 16.0);
        projected.write_cubic(&pts);
        assert!(projected.resolve_level() > flat_level);
    }

    #[test]
    fn conic_chop_preserves_midpoint() {
        let p = [[0.0, 0.0], [1.0, 1.0], [2.0, 0.0]];
        let w = std::f32::consts::FRAC_1_SQRT_2;
        let (a, b, w2) = chop_conic(p, w);
        assert_eq!(a[2], b[0]);
        assert!((a[2][0] - 1.0).abs() < 1e-6);
        assert!(w2 > w && w2 < 1.0);
    }
}
