// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::ops::Mul;

use peniko::kurbo::{self, Point, Rect};

/// Classification of a [`Transform`], ordered from least to most general.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TransformType {
    Identity,
    Translate,
    ScaleTranslate,
    Affine,
    Perspective,
}

/// Projective 3x3 transformation matrix.
///
/// Stored row-major, so a point maps as `x' = m[0] * x + m[1] * y + m[2]` and likewise for `y'`
/// and the homogeneous `w'`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Transform {
    matrix: [f32; 9],
    ty: TransformType,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    /// Identity transform.
    pub const IDENTITY: Self = Self {
        matrix: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
        ty: TransformType::Identity,
    };

    /// Creates a transform from a row-major 3x3 matrix.
    pub fn from_row_major(matrix: [f32; 9]) -> Self {
        Self {
            matrix,
            ty: classify(&matrix),
        }
    }

    /// Creates a transform from a kurbo affine matrix.
    pub fn from_kurbo(transform: &kurbo::Affine) -> Self {
        let c = transform.as_coeffs().map(|x| x as f32);
        Self::from_row_major([c[0], c[2], c[4], c[1], c[3], c[5], 0.0, 0.0, 1.0])
    }

    pub fn translate(tx: f32, ty: f32) -> Self {
        Self::from_row_major([1.0, 0.0, tx, 0.0, 1.0, ty, 0.0, 0.0, 1.0])
    }

    pub fn scale(sx: f32, sy: f32) -> Self {
        Self::from_row_major([sx, 0.0, 0.0, 0.0, sy, 0.0, 0.0, 0.0, 1.0])
    }

    pub fn matrix(&self) -> &[f32; 9] {
        &self.matrix
    }

    pub fn transform_type(&self) -> TransformType {
        self.ty
    }

    pub fn has_perspective(&self) -> bool {
        self.ty == TransformType::Perspective
    }

    pub fn is_finite(&self) -> bool {
        self.matrix.iter().all(|v| v.is_finite())
    }

    /// Maps a point, including the perspective divide.
    pub fn map_point(&self, p: Point) -> Point {
        let m = &self.matrix;
        let (x, y) = (p.x as f32, p.y as f32);
        let mx = m[0] * x + m[1] * y + m[2];
        let my = m[3] * x + m[4] * y + m[5];
        if self.ty != TransformType::Perspective {
            return Point::new(mx as f64, my as f64);
        }
        let w = m[6] * x + m[7] * y + m[8];
        let w = if w == 0.0 { f32::EPSILON } else { w };
        Point::new((mx / w) as f64, (my / w) as f64)
    }

    /// Maps a rectangle to the bounds of its transformed corners.
    pub fn map_rect(&self, rect: Rect) -> Rect {
        if self.ty == TransformType::Identity {
            return rect;
        }
        let p0 = self.map_point(Point::new(rect.x0, rect.y0));
        let p1 = self.map_point(Point::new(rect.x1, rect.y0));
        let p2 = self.map_point(Point::new(rect.x0, rect.y1));
        let p3 = self.map_point(Point::new(rect.x1, rect.y1));
        Rect::from_points(p0, p1).union_pt(p2).union_pt(p3)
    }

    /// Largest singular value of the upper-left 2x2 part of the matrix.
    ///
    /// For perspective transforms this ignores the projective row entirely, so it is only an
    /// approximation of how much local distances grow in device space.
    pub fn max_scale_factor(&self) -> f32 {
        let m = &self.matrix;
        let (a, b, c, d) = (m[0], m[1], m[3], m[4]);
        let p = a * a + c * c;
        let q = b * b + d * d;
        let r = a * b + c * d;
        let diff = p - q;
        let root = (diff * diff + 4.0 * r * r).sqrt();
        ((p + q + root) * 0.5).sqrt()
    }

    /// Returns the matrix as a column-major 4x4 matrix suitable for a `mat4x4<f32>` uniform.
    pub fn to_col_major_4x4(&self) -> [f32; 16] {
        let m = &self.matrix;
        [
            m[0], m[3], 0.0, m[6], //
            m[1], m[4], 0.0, m[7], //
            0.0, 0.0, 1.0, 0.0, //
            m[2], m[5], 0.0, m[8],
        ]
    }

    /// Returns `self * other`, which applies `other` first.
    pub fn concat(&self, other: &Self) -> Self {
        *self * *other
    }
}

impl Mul for Transform {
    type Output = Self;

    #[inline]
    fn mul(self, other: Self) -> Self {
        let a = &self.matrix;
        let b = &other.matrix;
        let mut out = [0.0; 9];
        for row in 0..3 {
            for col in 0..3 {
                out[row * 3 + col] = a[row * 3] * b[col]
                    + a[row * 3 + 1] * b[3 + col]
                    + a[row * 3 + 2] * b[6 + col];
            }
        }
        Self::from_row_major(out)
    }
}

fn classify(m: &[f32; 9]) -> TransformType {
    if m[6] != 0.0 || m[7] != 0.0 || m[8] != 1.0 {
        TransformType::Perspective
    } else if m[1] != 0.0 || m[3] != 0.0 {
        TransformType::Affine
    } else if m[0] != 1.0 || m[4] != 1.0 {
        TransformType::ScaleTranslate
    } else if m[2] != 0.0 || m[5] != 0.0 {
        TransformType::Translate
    } else {
        TransformType::Identity
    }
}

pub fn point_to_f32(point: Point) -> [f32; 2] {
    [point.x as f32, point.y as f32]
}

#[cfg(test)]
mod tests {
    use super::*;
    use peniko::kurbo::Affine;

    #[test]
    fn classification() {
        assert_eq!(Transform::IDENTITY.transform_type(), TransformType::Identity);
        assert_eq!(
            Transform::translate(2.0, 0.0).transform_type(),
            TransformType::Translate
        );
        assert_eq!(
            Transform::scale(2.0, 3.0).transform_type(),
            TransformType::ScaleTranslate
        );
        assert_eq!(
            Transform::from_kurbo(&Affine::rotate(0.5)).transform_type(),
            TransformType::Affine
        );
        let persp = Transform::from_row_major([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.001, 0.0, 1.0]);
        assert!(persp.has_perspective());
    }

    #[test]
    fn kurbo_round_trip_point() {
        let affine = Affine::new([2.0, 0.5, -1.0, 3.0, 10.0, 20.0]);
        let t = Transform::from_kurbo(&affine);
        let p = Point::new(3.0, -4.0);
        let expected = affine * p;
        let actual = t.map_point(p);
        assert!((expected - actual).hypot() < 1e-4);
    }

    #[test]
    fn max_scale_of_non_uniform_scale() {
        assert_eq!(Transform::scale(2.0, 5.0).max_scale_factor(), 5.0);
        let rot = Transform::from_kurbo(&Affine::rotate(1.0).then_scale(3.0));
        assert!((rot.max_scale_factor() - 3.0).abs() < 1e-4);
    }

    #[test]
    fn concat_applies_right_first() {
        let t = Transform::translate(10.0, 0.0) * Transform::scale(2.0, 2.0);
        let p = t.map_point(Point::new(1.0, 1.0));
        assert_eq!(p, Point::new(12.0, 2.0));
    }

    #[test]
    fn perspective_divide() {
        let t = Transform::from_row_major([1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 2.0]);
        assert_eq!(t.map_point(Point::new(4.0, 8.0)), Point::new(2.0, 4.0));
    }

    #[test]
    fn col_major_layout() {
        let m = Transform::translate(5.0, 6.0).to_col_major_4x4();
        assert_eq!(&m[12..16], &[5.0, 6.0, 0.0, 1.0]);
        assert_eq!(m[0], 1.0);
        assert_eq!(m[5], 1.0);
    }
}
