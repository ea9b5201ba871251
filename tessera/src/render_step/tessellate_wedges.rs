// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Fills paths by tessellating every segment into a triangle fan around its contour's
//! midpoint.

use tessera_encoding::wangs_formula::VectorXform;
use tessera_encoding::{FixedCountWedges, MidpointContourParser, PatchAttribs, PatchWriter, Verb};

use super::{
    Attribute, CompareOp, DepthStencilSettings, PrimitiveType, RenderStep, RenderStepFlags,
    RenderStepKind, StencilFaceOps, StencilOp, VertexAttribType, WedgeVariant,
};
use crate::buffer_manager::BufferType;
use crate::draw_list::{DrawParams, Geometry};
use crate::draw_writer::DrawWriter;
use crate::pipeline_data::{SlType, Uniform};

const UNIFORMS: &[Uniform] = &[Uniform::new("localToDevice", SlType::Float4x4)];

const VERTEX_ATTRS: &[Attribute] = &[Attribute::new(
    "resolveLevel_and_idx",
    VertexAttribType::Float2,
    SlType::Float2,
)];

const INSTANCE_ATTRS: &[Attribute] = &[
    Attribute::new("p01", VertexAttribType::Float4, SlType::Float4),
    Attribute::new("p23", VertexAttribType::Float4, SlType::Float4),
    Attribute::new("fanPointAttrib", VertexAttribType::Float2, SlType::Float2),
    Attribute::new("depth", VertexAttribType::Float, SlType::Float),
    Attribute::new("ssboIndex", VertexAttribType::UInt, SlType::UInt),
];

const PATCH_ATTRIBS: PatchAttribs = PatchAttribs::FAN_POINT
    .union(PatchAttribs::PAINT_DEPTH)
    .union(PatchAttribs::SSBO_INDEX);

pub(super) const VERTEX_SOURCE: &str = "\
    var localCoord: vec2<f32>;
    if resolveLevel_and_idx.x < 0.0 {
        localCoord = fanPointAttrib;
    } else {
        localCoord = tessellate_curve(p01, p23, resolveLevel_and_idx);
    }
    var devPosition = localToDevice * vec4<f32>(localCoord, 0.0, 1.0);
    stepLocalCoords = localCoord;
    devPosition.z = depth;
";

const WINDING_FRONT: StencilFaceOps = StencilFaceOps {
    pass: StencilOp::IncWrap,
    ..StencilFaceOps::UNUSED
};

const WINDING_BACK: StencilFaceOps = StencilFaceOps {
    pass: StencilOp::DecWrap,
    ..StencilFaceOps::UNUSED
};

const EVEN_ODD: StencilFaceOps = StencilFaceOps {
    pass: StencilOp::Invert,
    write_mask: 0x1,
    ..StencilFaceOps::UNUSED
};

fn stencil_pass(face: StencilFaceOps, back: StencilFaceOps) -> DepthStencilSettings {
    DepthStencilSettings {
        front_stencil: face,
        back_stencil: back,
        stencil_reference: 0,
        stencil_test: true,
        depth_compare: CompareOp::Greater,
        depth_test: true,
        depth_write: false,
    }
}

pub(super) fn new(id: u32, variant: WedgeVariant) -> RenderStep {
    let (name, flags, depth_stencil) = match variant {
        WedgeVariant::Convex => (
            "convex",
            RenderStepFlags::REQUIRES_MSAA | RenderStepFlags::PERFORMS_SHADING,
            DepthStencilSettings::DIRECT_SHADING,
        ),
        WedgeVariant::Winding => (
            "winding",
            RenderStepFlags::REQUIRES_MSAA,
            stencil_pass(WINDING_FRONT, WINDING_BACK),
        ),
        WedgeVariant::EvenOdd => (
            "evenodd",
            RenderStepFlags::REQUIRES_MSAA,
            stencil_pass(EVEN_ODD, EVEN_ODD),
        ),
    };
    RenderStep::new(
        id,
        "TessellateWedgesRenderStep",
        name,
        RenderStepKind::TessellateWedges(variant),
        flags,
        UNIFORMS,
        PrimitiveType::Triangles,
        depth_stencil,
        VERTEX_ATTRS,
        INSTANCE_ATTRS,
    )
}

pub(super) fn write_vertices(
    step: &RenderStep,
    writer: &mut DrawWriter<'_>,
    params: &DrawParams,
    ssbo_index: u32,
) {
    let Geometry::Shape(path) = params.geometry() else {
        debug_assert!(false, "{} can only draw shapes", step.name());
        return;
    };
    let vertices = writer.buffer_manager().get_static_buffer(
        BufferType::Vertex,
        "FixedCountWedges vertices",
        FixedCountWedges::write_vertex_buffer,
    );
    let indices = writer.buffer_manager().get_static_buffer(
        BufferType::Index,
        "FixedCountWedges indices",
        FixedCountWedges::write_index_buffer,
    );
    let transform = params.transform();
    let depth = params.order().depth_as_float();
    writer.write_instances(Some(vertices), Some(indices), |out| {
        let reserve = FixedCountWedges::prealloc_count(path.verb_count());
        let mut patches = PatchWriter::new(PATCH_ATTRIBS, out, reserve);
        patches.set_shader_transform(
            VectorXform::from_transform(transform),
            transform.max_scale_factor(),
        );
        patches.update_paint_depth_attrib(depth);
        patches.update_ssbo_index_attrib(ssbo_index);

        let mut parser = MidpointContourParser::new(path);
        while parser.parse_next_contour() {
            patches.update_fan_point_attrib(parser.current_midpoint());
            let mut start = None;
            let mut last = None;
            for (verb, pts, weight) in parser.current_contour() {
                match verb {
                    Verb::Move => {
                        start = Some(pts[0]);
                        last = start;
                    }
                    Verb::Line => patches.write_line(pts[0], pts[1]),
                    Verb::Quad => patches.write_quadratic(pts),
                    Verb::Conic => patches.write_conic(pts, weight.unwrap_or(1.0)),
                    Verb::Cubic => patches.write_cubic(pts),
                    Verb::Close => {}
                }
                if let Some(end) = pts.last() {
                    last = Some(*end);
                }
            }
            // Every contour is implicitly closed for filling.
            if let (Some(start), Some(last)) = (start, last) {
                if start != last {
                    patches.write_line(last, start);
                }
            }
        }
        let template = FixedCountWedges::index_count(patches.resolve_level());
        (patches.patch_count() as u32, template)
    });
}
