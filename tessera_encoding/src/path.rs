// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use peniko::kurbo::{BezPath, PathEl, Point, Rect};

/// Path verb.
///
/// Every verb except [`Verb::Move`] and [`Verb::Close`] implicitly starts at the end point of
/// the previous verb.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Move,
    Line,
    Quad,
    Conic,
    Cubic,
    Close,
}

impl Verb {
    /// Number of points stored for this verb, not counting the shared start point.
    pub const fn point_count(self) -> usize {
        match self {
            Self::Move | Self::Line => 1,
            Self::Quad | Self::Conic => 2,
            Self::Cubic => 3,
            Self::Close => 0,
        }
    }
}

/// A sequence of contours made of lines, quadratics, conics and cubics.
///
/// Unlike [`BezPath`], a path can hold rational quadratics (conics), which are needed to represent
/// circular and elliptical arcs exactly.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    verbs: Vec<Verb>,
    points: Vec<Point>,
    weights: Vec<f32>,
    /// Index into `points` of the start of the current contour.
    contour_start: Option<usize>,
    /// Set after a close, so that the next segment begins a new contour at the old start point.
    needs_move: bool,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn move_to(&mut self, p: impl Into<Point>) -> &mut Self {
        let p = p.into();
        if self.verbs.last() == Some(&Verb::Move) {
            // Consecutive moves collapse into the last one.
            if let Some(last) = self.points.last_mut() {
                *last = p;
            }
        } else {
            self.verbs.push(Verb::Move);
            self.points.push(p);
        }
        self.contour_start = Some(self.points.len() - 1);
        self.needs_move = false;
        self
    }

    pub fn line_to(&mut self, p: impl Into<Point>) -> &mut Self {
        self.inject_move();
        self.verbs.push(Verb::Line);
        self.points.push(p.into());
        self
    }

    pub fn quad_to(&mut self, p1: impl Into<Point>, p2: impl Into<Point>) -> &mut Self {
        self.inject_move();
        self.verbs.push(Verb::Quad);
        self.points.extend([p1.into(), p2.into()]);
        self
    }

    /// Appends a rational quadratic with the given weight.
    ///
    /// A weight of one is an ordinary quadratic. Non-positive or non-finite weights degrade the
    /// conic to a line.
    pub fn conic_to(&mut self, p1: impl Into<Point>, p2: impl Into<Point>, weight: f32) -> &mut Self {
        if !(weight > 0.0 && weight.is_finite()) {
            return self.line_to(p2);
        }
        if weight == 1.0 {
            return self.quad_to(p1, p2);
        }
        self.inject_move();
        self.verbs.push(Verb::Conic);
        self.points.extend([p1.into(), p2.into()]);
        self.weights.push(weight);
        self
    }

    pub fn cubic_to(
        &mut self,
        p1: impl Into<Point>,
        p2: impl Into<Point>,
        p3: impl Into<Point>,
    ) -> &mut Self {
        self.inject_move();
        self.verbs.push(Verb::Cubic);
        self.points.extend([p1.into(), p2.into(), p3.into()]);
        self
    }

    pub fn close(&mut self) -> &mut Self {
        if matches!(self.verbs.last(), Some(v) if *v != Verb::Close) {
            self.verbs.push(Verb::Close);
            self.needs_move = true;
        }
        self
    }

    fn inject_move(&mut self) {
        match self.contour_start {
            None => {
                self.move_to(Point::ZERO);
            }
            Some(start) if self.needs_move => {
                let p = self.points[start];
                self.move_to(p);
            }
            Some(_) => {}
        }
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn weights(&self) -> &[f32] {
        &self.weights
    }

    pub fn verb_count(&self) -> usize {
        self.verbs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.verbs.is_empty()
    }

    /// Bounds of all points, including control points.
    pub fn bounds(&self) -> Rect {
        let mut points = self.points.iter();
        let Some(first) = points.next() else {
            return Rect::ZERO;
        };
        points.fold(Rect::from_points(*first, *first), |r, p| r.union_pt(*p))
    }

    /// Iterates over `(verb, points, conic weight)` triples.
    ///
    /// The point slice of every verb other than [`Verb::Move`] begins with the shared start
    /// point, so a line yields two points and a cubic four. Close yields an empty slice.
    pub fn iter(&self) -> PathIter<'_> {
        PathIter {
            path: self,
            verb_ix: 0,
            point_ix: 0,
            weight_ix: 0,
        }
    }
}

impl From<&BezPath> for Path {
    fn from(bez: &BezPath) -> Self {
        let mut path = Self::new();
        for el in bez.elements() {
            match *el {
                PathEl::MoveTo(p) => path.move_to(p),
                PathEl::LineTo(p) => path.line_to(p),
                PathEl::QuadTo(p1, p2) => path.quad_to(p1, p2),
                PathEl::CurveTo(p1, p2, p3) => path.cubic_to(p1, p2, p3),
                PathEl::ClosePath => path.close(),
            };
        }
        path
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = (Verb, &'a [Point], Option<f32>);
    type IntoIter = PathIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the segments of a [`Path`].
#[derive(Clone)]
pub struct PathIter<'a> {
    path: &'a Path,
    verb_ix: usize,
    point_ix: usize,
    weight_ix: usize,
}

impl<'a> Iterator for PathIter<'a> {
    type Item = (Verb, &'a [Point], Option<f32>);

    fn next(&mut self) -> Option<Self::Item> {
        let verb = *self.path.verbs.get(self.verb_ix)?;
        self.verb_ix += 1;
        let n = verb.point_count();
        let points = match verb {
            Verb::Move => &self.path.points[self.point_ix..self.point_ix + 1],
            Verb::Close => &self.path.points[..0],
            _ => &self.path.points[self.point_ix - 1..self.point_ix + n],
        };
        self.point_ix += n;
        let weight = if verb == Verb::Conic {
            self.weight_ix += 1;
            Some(self.path.weights[self.weight_ix - 1])
        } else {
            None
        };
        Some((verb, points, weight))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn implicit_move_after_close() {
        let mut path = Path::new();
        path.move_to((1.0, 1.0))
            .line_to((5.0, 1.0))
            .close()
            .line_to((3.0, 3.0));
        assert_eq!(
            path.verbs(),
            &[Verb::Move, Verb::Line, Verb::Close, Verb::Move, Verb::Line]
        );
        let (_, pts, _) = path.iter().nth(4).unwrap();
        assert_eq!(pts, &[Point::new(1.0, 1.0), Point::new(3.0, 3.0)]);
    }

    #[test]
    fn segments_share_start_point() {
        let mut path = Path::new();
        path.move_to((0.0, 0.0))
            .quad_to((1.0, 2.0), (2.0, 0.0))
            .conic_to((3.0, 2.0), (4.0, 0.0), 0.5)
            .cubic_to((5.0, 1.0), (6.0, 1.0), (7.0, 0.0));
        let segs: Vec<_> = path.iter().collect();
        assert_eq!(segs[1].1.len(), 3);
        assert_eq!(segs[2].1[0], Point::new(2.0, 0.0));
        assert_eq!(segs[2].2, Some(0.5));
        assert_eq!(segs[3].1.len(), 4);
        assert_eq!(segs[3].1[0], Point::new(4.0, 0.0));
    }

    #[test]
    fn unit_weight_conic_is_quad() {
        let mut path = Path::new();
        path.move_to((0.0, 0.0)).conic_to((1.0, 1.0), (2.0, 0.0), 1.0);
        assert_eq!(path.verbs(), &[Verb::Move, Verb::Quad]);
        assert!(path.weights().is_empty());
    }

    #[test]
    fn from_bez_path() {
        let mut bez = BezPath::new();
        bez.move_to((0.0, 0.0));
        bez.line_to((10.0, 0.0));
        bez.curve_to((10.0, 5.0), (5.0, 10.0), (0.0, 10.0));
        bez.close_path();
        let path = Path::from(&bez);
        assert_eq!(path.verb_count(), 4);
        assert_eq!(path.bounds(), Rect::new(0.0, 0.0, 10.0, 10.0));
    }
}
