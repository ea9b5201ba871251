// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{
    Attribute, CompareOp, DepthStencilSettings, PrimitiveType, RenderStep, RenderStepFlags,
    RenderStepKind, StencilFaceOps, StencilOp, VertexAttribType,
};
use crate::draw_list::DrawParams;
use crate::draw_writer::DrawWriter;
use crate::pipeline_data::{SlType, Uniform};

const UNIFORMS: &[Uniform] = &[Uniform::new("localToDevice", SlType::Float4x4)];

const INSTANCE_ATTRS: &[Attribute] = &[
    Attribute::new("bounds", VertexAttribType::Float4, SlType::Float4),
    Attribute::new("depth", VertexAttribType::Float, SlType::Float),
    Attribute::new("ssboIndex", VertexAttribType::UInt, SlType::UInt),
];

pub(super) const VERTEX_SOURCE: &str = "\
    let corner = vec2<f32>(f32(vertexIndex & 1u), f32(vertexIndex >> 1u));
    let localCoord = mix(bounds.xy, bounds.zw, corner);
    var devPosition = localToDevice * vec4<f32>(localCoord, 0.0, 1.0);
    stepLocalCoords = localCoord;
    devPosition.z = depth;
";

/// Passes where the stencil is nonzero and resets it, so the next stenciled draw starts
/// from a clean buffer.
const COVER: StencilFaceOps = StencilFaceOps {
    stencil_fail: StencilOp::Keep,
    depth_fail: StencilOp::Zero,
    pass: StencilOp::Zero,
    compare: CompareOp::NotEqual,
    read_mask: 0xffff_ffff,
    write_mask: 0xffff_ffff,
};

const COVER_PASS: DepthStencilSettings = DepthStencilSettings {
    front_stencil: COVER,
    back_stencil: COVER,
    stencil_reference: 0,
    stencil_test: true,
    depth_compare: CompareOp::Greater,
    depth_test: true,
    depth_write: true,
};

pub(super) fn new(id: u32) -> RenderStep {
    RenderStep::new(
        id,
        "CoverBoundsRenderStep",
        "",
        RenderStepKind::CoverBounds,
        RenderStepFlags::PERFORMS_SHADING,
        UNIFORMS,
        PrimitiveType::TriangleStrip,
        COVER_PASS,
        &[],
        INSTANCE_ATTRS,
    )
}

pub(super) fn write_vertices(
    _step: &RenderStep,
    writer: &mut DrawWriter<'_>,
    params: &DrawParams,
    ssbo_index: u32,
) {
    let bounds = params.geometry().local_bounds();
    let depth = params.order().depth_as_float();
    writer.write_instances(None, None, |out| {
        let rect = [bounds.x0, bounds.y0, bounds.x1, bounds.y1].map(|v| v as f32);
        out.extend_from_slice(bytemuck::bytes_of(&rect));
        out.extend_from_slice(bytemuck::bytes_of(&depth));
        out.extend_from_slice(bytemuck::bytes_of(&ssbo_index));
        (1, 4)
    });
}
