// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use peniko::kurbo::{Point, Vec2};

use crate::path::{Path, PathIter, Verb};

/// Walks a path one contour at a time, computing the midpoint of each contour.
///
/// The midpoint is the mean of the contour's on-curve end points, including the start point
/// again if the contour does not end where it began. It is used as the fan point of wedges.
/// Contours without any geometry (for example a lone move) are skipped.
pub struct MidpointContourParser<'a> {
    path: &'a Path,
    iter: PathIter<'a>,
    current: Option<PathIter<'a>>,
    midpoint: Point,
}

impl<'a> MidpointContourParser<'a> {
    pub fn new(path: &'a Path) -> Self {
        Self {
            path,
            iter: path.iter(),
            current: None,
            midpoint: Point::ZERO,
        }
    }

    /// Advances to the next contour with geometry, returning `false` once the path is done.
    pub fn parse_next_contour(&mut self) -> bool {
        loop {
            let contour_start = self.iter.clone();
            let Some((verb, pts, _)) = self.iter.next() else {
                self.current = None;
                return false;
            };
            if verb != Verb::Move {
                // Paths always begin contours with a move.
                continue;
            }
            let start = pts[0];
            let mut sum = Vec2::ZERO;
            let mut weight = 0_u32;
            let mut last = start;
            loop {
                let lookahead = self.iter.clone();
                match self.iter.next() {
                    None => break,
                    Some((Verb::Move, _, _)) => {
                        self.iter = lookahead;
                        break;
                    }
                    Some((Verb::Close, _, _)) => {}
                    Some((_, pts, _)) => {
                        last = pts[pts.len() - 1];
                        sum += last.to_vec2();
                        weight += 1;
                    }
                }
            }
            if weight == 0 {
                continue;
            }
            if last != start {
                sum += start.to_vec2();
                weight += 1;
            }
            self.midpoint = (sum / weight as f64).to_point();
            self.current = Some(contour_start);
            return true;
        }
    }

    /// Midpoint of the current contour.
    pub fn current_midpoint(&self) -> Point {
        self.midpoint
    }

    /// Segments of the current contour, beginning with its move.
    pub fn current_contour(&self) -> ContourIter<'a> {
        ContourIter {
            iter: self.current.clone().unwrap_or_else(|| self.path.iter()),
            started: self.current.is_none(),
        }
    }
}

/// Iterator over the verbs of a single contour.
pub struct ContourIter<'a> {
    iter: PathIter<'a>,
    /// Set once the leading move has been yielded.
    started: bool,
}

impl<'a> Iterator for ContourIter<'a> {
    type Item = (Verb, &'a [Point], Option<f32>);

    fn next(&mut self) -> Option<Self::Item> {
        let lookahead = self.iter.clone();
        let item = self.iter.next()?;
        if item.0 == Verb::Move {
            if self.started {
                self.iter = lookahead;
                return None;
            }
            self.started = true;
        }
        Some(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_empty_contours() {
        let mut path = Path::new();
        path.move_to((0.0, 0.0));
        path.move_to((5.0, 5.0)).close();
        path.move_to((0.0, 0.0)).line_to((4.0, 0.0)).line_to((4.0, 4.0));
        let mut parser = MidpointContourParser::new(&path);
        assert!(parser.parse_next_contour());
        // (4, 0), (4, 4) and the implicit return to (0, 0).
        assert_eq!(parser.current_midpoint(), Point::new(8.0 / 3.0, 4.0 / 3.0));
        assert_eq!(parser.current_contour().count(), 3);
        assert!(!parser.parse_next_contour());
    }

    #[test]
    fn closed_contour_does_not_repeat_start() {
        let mut path = Path::new();
        path.move_to((0.0, 0.0))
            .line_to((2.0, 0.0))
            .line_to((2.0, 2.0))
            .line_to((0.0, 0.0));
        let mut parser = MidpointContourParser::new(&path);
        assert!(parser.parse_next_contour());
        assert_eq!(parser.current_midpoint(), Point::new(4.0 / 3.0, 2.0 / 3.0));
    }

    #[test]
    fn multiple_contours() {
        let mut path = Path::new();
        path.move_to((0.0, 0.0)).line_to((1.0, 0.0)).close();
        path.move_to((10.0, 10.0)).quad_to((11.0, 12.0), (12.0, 10.0));
        let mut parser = MidpointContourParser::new(&path);
        let mut contours = 0;
        while parser.parse_next_contour() {
            let verbs: Vec<_> = parser.current_contour().map(|(v, _, _)| v).collect();
            assert_eq!(verbs[0], Verb::Move);
            contours += 1;
        }
        assert_eq!(contours, 2);
    }
}
