// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;

use peniko::Fill;
use smallvec::SmallVec;

use crate::render_step::{DepthStencilFlags, RenderStep, WedgeVariant};

/// Most render steps a renderer may have.
pub const MAX_RENDER_STEPS: usize = 4;

/// A named sequence of render steps that together draw one kind of geometry.
///
/// Steps execute in order for each draw, for example stenciling a path and then covering it.
#[derive(Debug)]
pub struct Renderer {
    name: String,
    steps: SmallVec<[Arc<RenderStep>; MAX_RENDER_STEPS]>,
    depth_stencil_flags: DepthStencilFlags,
    requires_msaa: bool,
}

impl Renderer {
    fn new(name: impl Into<String>, steps: &[&Arc<RenderStep>]) -> Self {
        debug_assert!(!steps.is_empty() && steps.len() <= MAX_RENDER_STEPS);
        let steps: SmallVec<[Arc<RenderStep>; MAX_RENDER_STEPS]> =
            steps.iter().map(|s| Arc::clone(s)).collect();
        let depth_stencil_flags = steps
            .iter()
            .fold(DepthStencilFlags::empty(), |f, s| f | s.depth_stencil_flags());
        let requires_msaa = steps.iter().any(|s| s.requires_msaa());
        Self {
            name: name.into(),
            steps,
            depth_stencil_flags,
            requires_msaa,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn steps(&self) -> &[Arc<RenderStep>] {
        &self.steps
    }

    pub fn depth_stencil_flags(&self) -> DepthStencilFlags {
        self.depth_stencil_flags
    }

    pub fn requires_msaa(&self) -> bool {
        self.requires_msaa
    }
}

/// Creates every render step and renderer once and hands out shared references.
#[derive(Debug)]
pub struct RendererProvider {
    steps: Vec<Arc<RenderStep>>,
    convex_wedges: Arc<Renderer>,
    stencil_wedges: [Arc<Renderer>; 2],
    text_direct: Arc<Renderer>,
    text_sdf: [Arc<Renderer>; 2],
}

impl RendererProvider {
    pub fn new() -> Self {
        let mut steps = Vec::new();
        let mut add = |make: &dyn Fn(u32) -> RenderStep| {
            let step = Arc::new(make(steps.len() as u32));
            steps.push(step.clone());
            step
        };
        let convex = add(&|id| RenderStep::tessellate_wedges(id, WedgeVariant::Convex));
        let winding = add(&|id| RenderStep::tessellate_wedges(id, WedgeVariant::Winding));
        let even_odd = add(&|id| RenderStep::tessellate_wedges(id, WedgeVariant::EvenOdd));
        let cover = add(&RenderStep::cover_bounds);
        let direct = add(&RenderStep::text_direct);
        let sdf = add(&|id| RenderStep::text_sdf(id, false));
        let sdf_lcd = add(&|id| RenderStep::text_sdf(id, true));

        Self {
            convex_wedges: Arc::new(Renderer::new("ConvexTessellatedWedges", &[&convex])),
            stencil_wedges: [
                Arc::new(Renderer::new(
                    "StencilTessellatedWedges[winding]",
                    &[&winding, &cover],
                )),
                Arc::new(Renderer::new(
                    "StencilTessellatedWedges[evenodd]",
                    &[&even_odd, &cover],
                )),
            ],
            text_direct: Arc::new(Renderer::new("TextDirect", &[&direct])),
            text_sdf: [
                Arc::new(Renderer::new("TextSDF[a8]", &[&sdf])),
                Arc::new(Renderer::new("TextSDF[lcd]", &[&sdf_lcd])),
            ],
            steps,
        }
    }

    /// Fills convex paths in a single pass.
    pub fn convex_tessellated_wedges(&self) -> &Arc<Renderer> {
        &self.convex_wedges
    }

    /// Fills arbitrary paths by stenciling wedges and then covering their bounds.
    pub fn stencil_tessellated_wedges(&self, fill: Fill) -> &Arc<Renderer> {
        match fill {
            Fill::NonZero => &self.stencil_wedges[0],
            Fill::EvenOdd => &self.stencil_wedges[1],
        }
    }

    pub fn text_direct(&self) -> &Arc<Renderer> {
        &self.text_direct
    }

    pub fn text_sdf(&self, lcd: bool) -> &Arc<Renderer> {
        &self.text_sdf[usize::from(lcd)]
    }

    /// Every render step, indexed by id.
    pub fn render_steps(&self) -> &[Arc<RenderStep>] {
        &self.steps
    }

    pub fn lookup_render_step(&self, id: u32) -> Option<&Arc<RenderStep>> {
        self.steps.get(id as usize)
    }
}

impl Default for RendererProvider {
    fn default() -> Self {
        Self::new()
    }
}
