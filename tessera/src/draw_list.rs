// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;

use peniko::kurbo::Rect;
use tessera_encoding::{Path, Transform};

use crate::commands::ScissorRect;
use crate::pipeline_data::UniformDataBlock;
use crate::renderer::Renderer;
use crate::text::SubRunData;

/// Painter's order of a draw.
///
/// Every draw gets a depth, and later draws must have greater depths. The depth is written
/// as the z value of the draw's vertices, so depth testing keeps later draws on top even
/// though a [`DrawPass`](crate::DrawPass) sorts draws of equal depth by pipeline. Draws that
/// share a depth must therefore not overlap.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DrawOrder {
    depth: u16,
}

impl DrawOrder {
    pub fn new(depth: u16) -> Self {
        Self { depth }
    }

    pub fn depth(self) -> u16 {
        self.depth
    }

    /// The depth normalized to `[0, 1]`.
    pub fn depth_as_float(self) -> f32 {
        f32::from(self.depth) / f32::from(u16::MAX)
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct Clip {
    scissor: ScissorRect,
}

impl Clip {
    pub fn new(scissor: ScissorRect) -> Self {
        Self { scissor }
    }

    /// The smallest scissor containing `rect`.
    pub fn from_rect(rect: Rect) -> Self {
        let rect = rect.expand();
        let x0 = rect.x0.max(0.0) as u32;
        let y0 = rect.y0.max(0.0) as u32;
        let x1 = (rect.x1.max(0.0) as u32).max(x0);
        let y1 = (rect.y1.max(0.0) as u32).max(y0);
        Self::new(ScissorRect::new(x0, y0, x1 - x0, y1 - y0))
    }

    pub fn scissor(&self) -> ScissorRect {
        self.scissor
    }

    pub fn rect(&self) -> Rect {
        let s = self.scissor;
        Rect::new(
            f64::from(s.x),
            f64::from(s.y),
            f64::from(s.x + s.width),
            f64::from(s.y + s.height),
        )
    }
}

/// What a draw renders.
#[derive(Clone, Debug)]
pub enum Geometry {
    Shape(Arc<Path>),
    SubRun(SubRunData),
}

impl Geometry {
    /// Bounds before the draw's transform is applied.
    pub fn local_bounds(&self) -> Rect {
        match self {
            Self::Shape(path) => path.bounds(),
            Self::SubRun(data) => data.sub_run().local_bounds(data.range()),
        }
    }

    pub fn device_bounds(&self, transform: &Transform) -> Rect {
        match self {
            Self::Shape(path) => transform.map_rect(path.bounds()),
            Self::SubRun(data) => data.sub_run().device_bounds(data.range(), transform),
        }
    }
}

/// Everything a render step needs to know about one draw.
#[derive(Clone, Debug)]
pub struct DrawParams {
    transform: Transform,
    geometry: Geometry,
    clip: Clip,
    order: DrawOrder,
    draw_bounds: Rect,
}

impl DrawParams {
    pub fn new(transform: Transform, geometry: Geometry, clip: Clip, order: DrawOrder) -> Self {
        let draw_bounds = geometry
            .device_bounds(&transform)
            .intersect(clip.rect());
        Self {
            transform,
            geometry,
            clip,
            order,
            draw_bounds,
        }
    }

    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn clip(&self) -> &Clip {
        &self.clip
    }

    pub fn order(&self) -> DrawOrder {
        self.order
    }

    /// Device-space bounds of the draw, clipped to its scissor.
    pub fn draw_bounds(&self) -> Rect {
        self.draw_bounds
    }
}

/// Resolved paint of a draw: the id of its compiled shader and that shader's uniform values.
///
/// Draws whose paints have the same shader share a pipeline, and their uniforms are stored
/// in one storage block per pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct PaintParams {
    pub shader_id: u32,
    pub uniforms: Vec<f32>,
}

impl PaintParams {
    pub fn new(shader_id: u32, uniforms: Vec<f32>) -> Self {
        Self {
            shader_id,
            uniforms,
        }
    }

    /// A solid color paint.
    pub fn solid(shader_id: u32, color: [f32; 4]) -> Self {
        Self::new(shader_id, color.to_vec())
    }

    pub(crate) fn uniform_block(&self) -> UniformDataBlock {
        UniformDataBlock::from_bytes(bytemuck::cast_slice(self.uniforms.as_slice()).to_vec())
    }
}

#[derive(Clone, Debug)]
pub struct Draw {
    pub renderer: Arc<Renderer>,
    pub params: DrawParams,
    pub paint: Option<PaintParams>,
}

/// Draws in painter's order, waiting to be turned into a [`DrawPass`](crate::DrawPass).
#[derive(Clone, Debug, Default)]
pub struct DrawList {
    draws: Vec<Draw>,
    render_step_count: usize,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a draw.
    ///
    /// Draws with a non-finite transform, or that cover no pixels after clipping, are
    /// dropped.
    pub fn record_draw(
        &mut self,
        renderer: &Arc<Renderer>,
        transform: Transform,
        geometry: Geometry,
        clip: Clip,
        order: DrawOrder,
        paint: Option<PaintParams>,
    ) {
        if !transform.is_finite() {
            log::trace!("Dropping {} draw with non-finite transform", renderer.name());
            return;
        }
        let params = DrawParams::new(transform, geometry, clip, order);
        let bounds = params.draw_bounds();
        if !(bounds.width() > 0.0 && bounds.height() > 0.0) {
            log::trace!("Dropping {} draw with empty bounds", renderer.name());
            return;
        }
        self.render_step_count += renderer.steps().len();
        self.draws.push(Draw {
            renderer: renderer.clone(),
            params,
            paint,
        });
    }

    pub fn draw_count(&self) -> usize {
        self.draws.len()
    }

    /// Number of render steps over all draws.
    pub fn render_step_count(&self) -> usize {
        self.render_step_count
    }

    pub fn is_empty(&self) -> bool {
        self.draws.is_empty()
    }

    pub fn draws(&self) -> &[Draw] {
        &self.draws
    }

    pub(crate) fn into_draws(self) -> Vec<Draw> {
        self.draws
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RendererProvider;

    fn square(x: f64, y: f64, size: f64) -> Arc<Path> {
        let mut path = Path::new();
        path.move_to((x, y))
            .line_to((x + size, y))
            .line_to((x + size, y + size))
            .line_to((x, y + size))
            .close();
        Arc::new(path)
    }

    #[test]
    fn depth_is_normalized() {
        assert_eq!(DrawOrder::new(0).depth_as_float(), 0.0);
        assert_eq!(DrawOrder::new(u16::MAX).depth_as_float(), 1.0);
        assert!(DrawOrder::new(1) > DrawOrder::new(0));
    }

    #[test]
    fn clip_rounds_out() {
        let clip = Clip::from_rect(Rect::new(0.5, 1.5, 10.2, 20.0));
        assert_eq!(clip.scissor(), ScissorRect::new(0, 1, 11, 19));
        assert_eq!(Clip::from_rect(Rect::new(-5.0, -5.0, -1.0, 4.0)).scissor().width, 0);
    }

    #[test]
    fn bounds_are_transformed_and_clipped() {
        let params = DrawParams::new(
            Transform::translate(10.0, 0.0),
            Geometry::Shape(square(0.0, 0.0, 20.0)),
            Clip::new(ScissorRect::new(0, 0, 25, 100)),
            DrawOrder::new(1),
        );
        assert_eq!(params.draw_bounds(), Rect::new(10.0, 0.0, 25.0, 20.0));
    }

    #[test]
    fn degenerate_draws_are_dropped() {
        let provider = RendererProvider::new();
        let renderer = provider.convex_tessellated_wedges();
        let clip = Clip::new(ScissorRect::new(0, 0, 100, 100));
        let mut list = DrawList::new();
        // Outside the clip.
        list.record_draw(
            renderer,
            Transform::IDENTITY,
            Geometry::Shape(square(200.0, 0.0, 10.0)),
            clip,
            DrawOrder::new(1),
            None,
        );
        list.record_draw(
            renderer,
            Transform::scale(f32::NAN, 1.0),
            Geometry::Shape(square(0.0, 0.0, 10.0)),
            clip,
            DrawOrder::new(2),
            None,
        );
        assert!(list.is_empty());
        list.record_draw(
            renderer,
            Transform::IDENTITY,
            Geometry::Shape(square(0.0, 0.0, 10.0)),
            clip,
            DrawOrder::new(3),
            None,
        );
        assert_eq!(list.draw_count(), 1);
        assert_eq!(list.render_step_count(), 1);
    }
}
