// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render steps: the GPU pipeline stages that draws are decomposed into.

mod cover_bounds;
mod tessellate_wedges;
mod text_direct;
mod text_sdf;

use bitflags::bitflags;

use crate::draw_list::DrawParams;
use crate::draw_writer::DrawWriter;
use crate::pipeline_data::{PipelineDataGatherer, SlType, Uniform};

bitflags! {
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RenderStepFlags: u8 {
        /// The step can only be drawn into a multisampled target.
        const REQUIRES_MSAA = 1 << 0;
        /// The step writes color, so its pipeline includes the paint's shader.
        const PERFORMS_SHADING = 1 << 1;
        /// The step samples textures.
        const HAS_TEXTURES = 1 << 2;
        /// The step computes its own coverage, which is combined with the paint.
        const EMITS_COVERAGE = 1 << 3;
    }
}

bitflags! {
    /// Attachments a step, and therefore its render pass, needs.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct DepthStencilFlags: u8 {
        const DEPTH = 1 << 0;
        const STENCIL = 1 << 1;
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Triangles,
    TriangleStrip,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum VertexAttribType {
    Float,
    Float2,
    Float4,
    UInt,
    UShort2,
}

impl VertexAttribType {
    pub fn size(self) -> usize {
        match self {
            Self::Float | Self::UInt | Self::UShort2 => 4,
            Self::Float2 => 8,
            Self::Float4 => 16,
        }
    }
}

/// A vertex or instance attribute: its name in the shader, its memory layout and its
/// shading-language type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Attribute {
    pub name: &'static str,
    pub ty: VertexAttribType,
    pub sl_type: SlType,
}

impl Attribute {
    pub const fn new(name: &'static str, ty: VertexAttribType, sl_type: SlType) -> Self {
        Self { name, ty, sl_type }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Always,
    Never,
    Less,
    LessEqual,
    Equal,
    Greater,
    GreaterEqual,
    NotEqual,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum StencilOp {
    Keep,
    Zero,
    Replace,
    Invert,
    IncWrap,
    DecWrap,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct StencilFaceOps {
    pub stencil_fail: StencilOp,
    pub depth_fail: StencilOp,
    pub pass: StencilOp,
    pub compare: CompareOp,
    pub read_mask: u32,
    pub write_mask: u32,
}

impl StencilFaceOps {
    pub const UNUSED: Self = Self {
        stencil_fail: StencilOp::Keep,
        depth_fail: StencilOp::Keep,
        pass: StencilOp::Keep,
        compare: CompareOp::Always,
        read_mask: 0xffff_ffff,
        write_mask: 0xffff_ffff,
    };
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DepthStencilSettings {
    pub front_stencil: StencilFaceOps,
    pub back_stencil: StencilFaceOps,
    pub stencil_reference: u32,
    pub stencil_test: bool,
    pub depth_compare: CompareOp,
    pub depth_test: bool,
    pub depth_write: bool,
}

impl DepthStencilSettings {
    /// Depth-tested shading without stencil. Later draws have greater depth, so they pass
    /// over earlier ones and block earlier ones drawn after them.
    pub const DIRECT_SHADING: Self = Self {
        front_stencil: StencilFaceOps::UNUSED,
        back_stencil: StencilFaceOps::UNUSED,
        stencil_reference: 0,
        stencil_test: false,
        depth_compare: CompareOp::Greater,
        depth_test: true,
        depth_write: true,
    };

    pub fn flags(&self) -> DepthStencilFlags {
        let mut flags = DepthStencilFlags::empty();
        if self.depth_test || self.depth_write {
            flags |= DepthStencilFlags::DEPTH;
        }
        if self.stencil_test {
            flags |= DepthStencilFlags::STENCIL;
        }
        flags
    }
}

/// Variants of the tessellated wedge step.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum WedgeVariant {
    /// Shades directly. Only correct for convex paths.
    Convex,
    /// Accumulates nonzero winding in the stencil buffer.
    Winding,
    /// Accumulates even-odd parity in the stencil buffer.
    EvenOdd,
}

/// The closed set of render step variants.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RenderStepKind {
    TessellateWedges(WedgeVariant),
    /// Covers the bounds of a path that was stenciled by a previous step.
    CoverBounds,
    TextDirect,
    TextSdf { lcd: bool },
}

/// One GPU pipeline stage of a [`Renderer`](crate::Renderer), with the CPU logic that feeds it.
///
/// Steps are created once by the [`RendererProvider`](crate::RendererProvider) and never
/// change. The attribute layouts, uniform schema and depth-stencil state are fixed per
/// variant; [`write_vertices`](Self::write_vertices) and
/// [`write_uniforms_and_textures`](Self::write_uniforms_and_textures) must agree with them.
#[derive(Debug)]
pub struct RenderStep {
    id: u32,
    name: String,
    kind: RenderStepKind,
    flags: RenderStepFlags,
    primitive: PrimitiveType,
    depth_stencil: DepthStencilSettings,
    vertex_attrs: &'static [Attribute],
    instance_attrs: &'static [Attribute],
    uniforms: &'static [Uniform],
    vertex_stride: usize,
    instance_stride: usize,
}

impl RenderStep {
    #[allow(clippy::too_many_arguments, reason = "Mirrors the step descriptor")]
    fn new(
        id: u32,
        name: &str,
        variant: &str,
        kind: RenderStepKind,
        flags: RenderStepFlags,
        uniforms: &'static [Uniform],
        primitive: PrimitiveType,
        depth_stencil: DepthStencilSettings,
        vertex_attrs: &'static [Attribute],
        instance_attrs: &'static [Attribute],
    ) -> Self {
        let stride = |attrs: &[Attribute]| attrs.iter().map(|a| a.ty.size()).sum();
        let name = if variant.is_empty() {
            name.to_string()
        } else {
            format!("{name}[{variant}]")
        };
        Self {
            id,
            name,
            kind,
            flags,
            primitive,
            depth_stencil,
            vertex_attrs,
            instance_attrs,
            uniforms,
            vertex_stride: stride(vertex_attrs),
            instance_stride: stride(instance_attrs),
        }
    }

    pub(crate) fn tessellate_wedges(id: u32, variant: WedgeVariant) -> Self {
        tessellate_wedges::new(id, variant)
    }

    pub(crate) fn cover_bounds(id: u32) -> Self {
        cover_bounds::new(id)
    }

    pub(crate) fn text_direct(id: u32) -> Self {
        text_direct::new(id)
    }

    pub(crate) fn text_sdf(id: u32, lcd: bool) -> Self {
        text_sdf::new(id, lcd)
    }

    /// Unique id assigned by the provider.
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> RenderStepKind {
        self.kind
    }

    pub fn flags(&self) -> RenderStepFlags {
        self.flags
    }

    pub fn requires_msaa(&self) -> bool {
        self.flags.contains(RenderStepFlags::REQUIRES_MSAA)
    }

    pub fn performs_shading(&self) -> bool {
        self.flags.contains(RenderStepFlags::PERFORMS_SHADING)
    }

    pub fn has_textures(&self) -> bool {
        self.flags.contains(RenderStepFlags::HAS_TEXTURES)
    }

    pub fn emits_coverage(&self) -> bool {
        self.flags.contains(RenderStepFlags::EMITS_COVERAGE)
    }

    pub fn primitive_type(&self) -> PrimitiveType {
        self.primitive
    }

    pub fn depth_stencil_settings(&self) -> &DepthStencilSettings {
        &self.depth_stencil
    }

    pub fn depth_stencil_flags(&self) -> DepthStencilFlags {
        self.depth_stencil.flags()
    }

    pub fn vertex_attributes(&self) -> &'static [Attribute] {
        self.vertex_attrs
    }

    pub fn instance_attributes(&self) -> &'static [Attribute] {
        self.instance_attrs
    }

    pub fn uniforms(&self) -> &'static [Uniform] {
        self.uniforms
    }

    pub fn vertex_stride(&self) -> usize {
        self.vertex_stride
    }

    pub fn instance_stride(&self) -> usize {
        self.instance_stride
    }

    /// WGSL statements computing `devPosition` from the step's attributes and uniforms.
    ///
    /// The text is spliced into a vertex entry point that declares every attribute and
    /// uniform under its schema name.
    pub fn vertex_source(&self) -> &'static str {
        match self.kind {
            RenderStepKind::TessellateWedges(_) => tessellate_wedges::VERTEX_SOURCE,
            RenderStepKind::CoverBounds => cover_bounds::VERTEX_SOURCE,
            RenderStepKind::TextDirect => text_direct::VERTEX_SOURCE,
            RenderStepKind::TextSdf { .. } => text_sdf::VERTEX_SOURCE,
        }
    }

    /// Appends the vertex and instance data of one draw.
    ///
    /// `ssbo_index` selects the draw's record in the pipeline's paint storage block. Returns
    /// `false` if the draw was cut short (text that no longer fits in the atlas). The caller
    /// must then flush the writer once the pending work's bindings are current, so that the
    /// partial draw is emitted on its own.
    pub fn write_vertices(
        &self,
        writer: &mut DrawWriter<'_>,
        params: &DrawParams,
        ssbo_index: u32,
    ) -> bool {
        match self.kind {
            RenderStepKind::TessellateWedges(_) => {
                tessellate_wedges::write_vertices(self, writer, params, ssbo_index);
                true
            }
            RenderStepKind::CoverBounds => {
                cover_bounds::write_vertices(self, writer, params, ssbo_index);
                true
            }
            RenderStepKind::TextDirect | RenderStepKind::TextSdf { .. } => {
                text_direct::write_vertices(self, writer, params, ssbo_index)
            }
        }
    }

    /// Writes the draw's uniforms, in schema order, and registers the textures it samples.
    pub fn write_uniforms_and_textures(
        &self,
        params: &DrawParams,
        gatherer: &mut PipelineDataGatherer<'_>,
    ) {
        match self.kind {
            RenderStepKind::TessellateWedges(_) | RenderStepKind::CoverBounds => {
                gatherer.write(params.transform().to_col_major_4x4());
            }
            RenderStepKind::TextDirect => {
                text_direct::write_uniforms_and_textures(params, gatherer);
            }
            RenderStepKind::TextSdf { lcd } => {
                text_sdf::write_uniforms_and_textures(lcd, params, gatherer);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_encoding::{patch_stride, PatchAttribs};

    #[test]
    fn wedge_instance_stride_matches_patches() {
        let step = RenderStep::tessellate_wedges(0, WedgeVariant::Convex);
        let attribs =
            PatchAttribs::FAN_POINT | PatchAttribs::PAINT_DEPTH | PatchAttribs::SSBO_INDEX;
        assert_eq!(step.instance_stride(), patch_stride(attribs));
        assert_eq!(step.vertex_stride(), 8);
    }

    #[test]
    fn wedge_variants() {
        let convex = RenderStep::tessellate_wedges(0, WedgeVariant::Convex);
        assert!(convex.performs_shading());
        assert!(convex.requires_msaa());
        assert_eq!(convex.depth_stencil_flags(), DepthStencilFlags::DEPTH);
        assert_eq!(convex.name(), "TessellateWedgesRenderStep[convex]");

        let winding = RenderStep::tessellate_wedges(1, WedgeVariant::Winding);
        assert!(!winding.performs_shading());
        assert_eq!(winding.depth_stencil_flags(), DepthStencilFlags::all());
        let front = winding.depth_stencil_settings().front_stencil;
        let back = winding.depth_stencil_settings().back_stencil;
        assert_eq!(front.pass, StencilOp::IncWrap);
        assert_eq!(back.pass, StencilOp::DecWrap);

        let even_odd = RenderStep::tessellate_wedges(2, WedgeVariant::EvenOdd);
        assert_eq!(even_odd.depth_stencil_settings().front_stencil.write_mask, 1);
    }

    #[test]
    fn text_steps() {
        let direct = RenderStep::text_direct(0);
        assert!(direct.has_textures() && direct.performs_shading() && direct.emits_coverage());
        assert_eq!(direct.vertex_stride(), 20);
        assert_eq!(
            *direct.depth_stencil_settings(),
            DepthStencilSettings::DIRECT_SHADING
        );
        let sdf = RenderStep::text_sdf(1, true);
        assert_eq!(sdf.vertex_stride(), 20);
        assert_eq!(sdf.uniforms().len(), 3);
        assert_eq!(sdf.uniforms()[2].ty, SlType::Float3);
    }

    #[test]
    fn cover_bounds_is_stencil_tested() {
        let cover = RenderStep::cover_bounds(0);
        assert_eq!(cover.primitive_type(), PrimitiveType::TriangleStrip);
        assert_eq!(cover.vertex_stride(), 0);
        assert_eq!(cover.instance_stride(), 24);
        let ds = cover.depth_stencil_settings();
        assert!(ds.stencil_test);
        assert_eq!(ds.front_stencil.compare, CompareOp::NotEqual);
    }

    #[test]
    fn vertex_sources_use_declared_attributes() {
        let steps = [
            RenderStep::tessellate_wedges(0, WedgeVariant::Convex),
            RenderStep::cover_bounds(1),
            RenderStep::text_direct(2),
            RenderStep::text_sdf(3, false),
        ];
        for step in &steps {
            let source = step.vertex_source();
            assert!(source.contains("devPosition"), "{}", step.name());
            assert!(source.contains("depth"), "{}", step.name());
            if step.has_textures() {
                assert!(source.contains(">> 13u"), "{}", step.name());
                assert!(source.contains("texCoords"), "{}", step.name());
            }
        }
    }
}
