// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Wang's formula: an upper bound on the number of evenly spaced parametric segments a
//! polynomial curve needs so that its polyline stays within `1 / precision` of the curve.
//!
//! The `_p4` variants return the fourth power of the segment count (and `conic_p2` the square),
//! which avoids square roots until a resolve level is actually needed.

use crate::math::Transform;

/// Tessellation precision, in segments per pixel of deviation. Four means a quarter pixel.
pub const PRECISION: f32 = 4.0;

/// Largest supported resolve level. A curve at this level is drawn with 32 line segments.
pub const MAX_RESOLVE_LEVEL: u32 = 5;

/// Segment count to the fourth power that still fits in [`MAX_RESOLVE_LEVEL`].
pub const MAX_SEGMENTS_P4: f32 = ((1 << MAX_RESOLVE_LEVEL) as f32)
    * ((1 << MAX_RESOLVE_LEVEL) as f32)
    * ((1 << MAX_RESOLVE_LEVEL) as f32)
    * ((1 << MAX_RESOLVE_LEVEL) as f32);

#[inline]
fn length_term_p2(degree: u32) -> f32 {
    ((degree * degree) * ((degree - 1) * (degree - 1))) as f32 / 64.0
}

/// The 2x2 linear part of a transform, applied to control point differences.
///
/// Wang's formula only depends on second differences of the control points, which are
/// unaffected by translation. Projective transforms are approximated by their 2x2 part; the
/// perspective flag lets callers widen the estimate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct VectorXform {
    m: [f32; 4],
    perspective: bool,
}

impl Default for VectorXform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl VectorXform {
    pub const IDENTITY: Self = Self {
        m: [1.0, 0.0, 0.0, 1.0],
        perspective: false,
    };

    pub fn from_transform(transform: &Transform) -> Self {
        let m = transform.matrix();
        Self {
            m: [m[0], m[1], m[3], m[4]],
            perspective: transform.has_perspective(),
        }
    }

    pub fn has_perspective(&self) -> bool {
        self.perspective
    }

    #[inline]
    pub fn apply(&self, v: [f32; 2]) -> [f32; 2] {
        [
            self.m[0] * v[0] + self.m[1] * v[1],
            self.m[2] * v[0] + self.m[3] * v[1],
        ]
    }
}

#[inline]
fn dot(a: [f32; 2], b: [f32; 2]) -> f32 {
    a[0] * b[0] + a[1] * b[1]
}

#[inline]
fn second_difference(p0: [f32; 2], p1: [f32; 2], p2: [f32; 2]) -> [f32; 2] {
    [p0[0] - 2.0 * p1[0] + p2[0], p0[1] - 2.0 * p1[1] + p2[1]]
}

pub fn quadratic_p4(precision: f32, p: &[[f32; 2]; 3], xform: &VectorXform) -> f32 {
    let v = xform.apply(second_difference(p[0], p[1], p[2]));
    dot(v, v) * length_term_p2(2) * precision * precision
}

pub fn cubic_p4(precision: f32, p: &[[f32; 2]; 4], xform: &VectorXform) -> f32 {
    let v1 = xform.apply(second_difference(p[0], p[1], p[2]));
    let v2 = xform.apply(second_difference(p[1], p[2], p[3]));
    dot(v1, v1).max(dot(v2, v2)) * length_term_p2(3) * precision * precision
}

/// Squared segment count for a conic section.
///
/// See "Wang's formula for rational quadratic Bézier curves" by Zheng and Sederberg. The points
/// are centered on their bounding box first, since the bound depends on their magnitude.
pub fn conic_p2(precision: f32, p: &[[f32; 2]; 3], w: f32, xform: &VectorXform) -> f32 {
    let mut p = p.map(|q| xform.apply(q));
    let min = [
        p[0][0].min(p[1][0]).min(p[2][0]),
        p[0][1].min(p[1][1]).min(p[2][1]),
    ];
    let max = [
        p[0][0].max(p[1][0]).max(p[2][0]),
        p[0][1].max(p[1][1]).max(p[2][1]),
    ];
    let center = [(min[0] + max[0]) * 0.5, (min[1] + max[1]) * 0.5];
    for q in &mut p {
        q[0] -= center[0];
        q[1] -= center[1];
    }
    let max_len = dot(p[0], p[0]).max(dot(p[1], p[1])).max(dot(p[2], p[2])).sqrt();
    let dp = [
        p[0][0] - 2.0 * w * p[1][0] + p[2][0],
        p[0][1] - 2.0 * w * p[1][1] + p[2][1],
    ];
    let dw = (2.0 - 2.0 * w).abs();
    let rp_minus_1 = (max_len * precision - 1.0).max(0.0);
    let numer = dot(dp, dp).sqrt() * precision + rp_minus_1 * dw;
    let min_w = w.min(1.0);
    numer / min_w
}

/// `ceil(log2(x))`, or zero for `x <= 1` and NaN.
pub fn nextlog2(x: f32) -> u32 {
    if !(x > 1.0) {
        return 0;
    }
    // Rounding the mantissa up to the next power of two leaves ceil(log2) in the exponent.
    let bits = x.to_bits() + ((1 << 23) - 1);
    (bits >> 23).saturating_sub(127)
}

/// `ceil(log16(x))`, i.e. `ceil(log2(x^(1/4)))`.
pub fn nextlog16(x: f32) -> u32 {
    (nextlog2(x) + 3) >> 2
}

/// Resolve level (log2 of the segment count) for a segment count raised to the fourth power.
pub fn resolve_level_p4(n4: f32) -> u32 {
    nextlog16(n4).min(MAX_RESOLVE_LEVEL)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nextlog_boundaries() {
        assert_eq!(nextlog2(0.0), 0);
        assert_eq!(nextlog2(1.0), 0);
        assert_eq!(nextlog2(1.5), 1);
        assert_eq!(nextlog2(2.0), 1);
        assert_eq!(nextlog2(2.01), 2);
        assert_eq!(nextlog2(f32::NAN), 0);
        assert_eq!(nextlog16(16.0), 1);
        assert_eq!(nextlog16(17.0), 2);
        assert_eq!(nextlog16(256.0), 2);
    }

    #[test]
    fn flat_curves_need_one_segment() {
        let line_like = [[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]];
        assert_eq!(quadratic_p4(PRECISION, &line_like, &VectorXform::IDENTITY), 0.0);
        let cubic = [[0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [3.0, 0.0]];
        assert_eq!(cubic_p4(PRECISION, &cubic, &VectorXform::IDENTITY), 0.0);
    }

    #[test]
    fn scale_grows_segment_count() {
        let quad = [[0.0, 0.0], [50.0, 100.0], [100.0, 0.0]];
        let small = quadratic_p4(PRECISION, &quad, &VectorXform::IDENTITY);
        let xform = VectorXform::from_transform(&Transform::scale(4.0, 4.0));
        let large = quadratic_p4(PRECISION, &quad, &xform);
        // n^4 grows with the square of the scale.
        assert!((large / small - 16.0).abs() < 1e-3);
        assert!(resolve_level_p4(large) > resolve_level_p4(small));
    }

    #[test]
    fn resolve_level_is_clamped() {
        assert_eq!(resolve_level_p4(f32::INFINITY), MAX_RESOLVE_LEVEL);
        assert_eq!(resolve_level_p4(MAX_SEGMENTS_P4), MAX_RESOLVE_LEVEL);
    }

    #[test]
    fn unit_weight_conic_matches_quadratic_order() {
        let pts = [[0.0, 0.0], [50.0, 100.0], [100.0, 0.0]];
        let n2 = conic_p2(PRECISION, &pts, 1.0, &VectorXform::IDENTITY);
        let n4 = quadratic_p4(PRECISION, &pts, &VectorXform::IDENTITY);
        // With w == 1 the rational term vanishes and the bound is twice the quadratic's.
        assert!((n2 * n2 / n4 - 16.0).abs() < 1e-2);
    }
}
