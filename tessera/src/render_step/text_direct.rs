// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::{
    Attribute, DepthStencilSettings, PrimitiveType, RenderStep, RenderStepFlags, RenderStepKind,
    VertexAttribType,
};
use crate::atlas::MaskFormat;
use crate::draw_list::{DrawParams, Geometry};
use crate::draw_writer::DrawWriter;
use crate::pipeline_data::{PipelineDataGatherer, SlType, Uniform};
use crate::resource::{FilterMode, SamplerDesc};
use crate::text;

const UNIFORMS: &[Uniform] = &[Uniform::new("atlasSizeInv", SlType::Float2)];

/// Shared by both text steps, see [`TextVertex`](crate::TextVertex).
pub(super) const VERTEX_ATTRS: &[Attribute] = &[
    Attribute::new("position", VertexAttribType::Float2, SlType::Float2),
    Attribute::new("depth", VertexAttribType::Float, SlType::Float),
    Attribute::new("ssboIndex", VertexAttribType::UInt, SlType::UInt),
    Attribute::new("texCoords", VertexAttribType::UShort2, SlType::UShort2),
];

pub(super) const VERTEX_SOURCE: &str = "\
    let page = texCoords.x >> 13u;
    let unormTexCoords = vec2<f32>(f32(texCoords.x & 0x1fffu), f32(texCoords.y));
    textureCoords = unormTexCoords * atlasSizeInv;
    texIndex = f32(page);
    let devPosition = vec4<f32>(position, depth, 1.0);
    stepLocalCoords = position;
";

pub(super) fn new(id: u32) -> RenderStep {
    RenderStep::new(
        id,
        "BitmapTextRenderStep",
        "",
        RenderStepKind::TextDirect,
        RenderStepFlags::PERFORMS_SHADING
            | RenderStepFlags::HAS_TEXTURES
            | RenderStepFlags::EMITS_COVERAGE,
        UNIFORMS,
        PrimitiveType::Triangles,
        DepthStencilSettings::DIRECT_SHADING,
        VERTEX_ATTRS,
        &[],
    )
}

/// Writes glyph quads for both direct and distance field sub-runs.
pub(super) fn write_vertices(
    step: &RenderStep,
    writer: &mut DrawWriter<'_>,
    params: &DrawParams,
    ssbo_index: u32,
) -> bool {
    let Geometry::SubRun(data) = params.geometry() else {
        debug_assert!(false, "{} can only draw sub-runs", step.name());
        return true;
    };
    text::fill_vertex_data(
        data,
        writer,
        params.transform(),
        params.order().depth_as_float(),
        ssbo_index,
    )
}

pub(super) fn write_uniforms_and_textures(
    params: &DrawParams,
    gatherer: &mut PipelineDataGatherer<'_>,
) {
    let Geometry::SubRun(data) = params.geometry() else {
        debug_assert!(false, "direct text can only draw sub-runs");
        return;
    };
    write_atlas(data.sub_run().format(), FilterMode::Nearest, gatherer);
}

/// Writes `atlasSizeInv` and binds every page of the atlas for `format`.
pub(super) fn write_atlas(
    format: MaskFormat,
    filter: FilterMode,
    gatherer: &mut PipelineDataGatherer<'_>,
) {
    let proxies = gatherer.atlas_manager().proxies(format);
    // All pages of an atlas have the same size.
    let (width, height) = proxies.first().map_or((1, 1), |p| p.dimensions());
    gatherer.write([1.0 / width as f32, 1.0 / height as f32]);
    for proxy in proxies {
        gatherer.add_texture(proxy, SamplerDesc::clamped(filter));
    }
}
