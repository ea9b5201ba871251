// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use super::text_direct::{write_atlas, VERTEX_ATTRS};
use super::{DepthStencilSettings, PrimitiveType, RenderStep, RenderStepFlags, RenderStepKind};
use crate::draw_list::{DrawParams, Geometry};
use crate::pipeline_data::{PipelineDataGatherer, SlType, Uniform};
use crate::resource::FilterMode;

const UNIFORMS_A8: &[Uniform] = &[
    Uniform::new("localToDevice", SlType::Float4x4),
    Uniform::new("atlasSizeInv", SlType::Float2),
    Uniform::new("distanceAdjust", SlType::Float),
];

const UNIFORMS_LCD: &[Uniform] = &[
    Uniform::new("localToDevice", SlType::Float4x4),
    Uniform::new("atlasSizeInv", SlType::Float2),
    Uniform::new("distanceAdjust", SlType::Float3),
];

pub(super) const VERTEX_SOURCE: &str = "\
    let page = texCoords.x >> 13u;
    let unormTexCoords = vec2<f32>(f32(texCoords.x & 0x1fffu), f32(texCoords.y));
    textureCoords = unormTexCoords * atlasSizeInv;
    texIndex = f32(page);
    var devPosition = localToDevice * vec4<f32>(position, 0.0, 1.0);
    devPosition.z = depth;
    stepLocalCoords = position;
";

pub(super) fn new(id: u32, lcd: bool) -> RenderStep {
    let (variant, uniforms) = if lcd {
        ("lcd", UNIFORMS_LCD)
    } else {
        ("a8", UNIFORMS_A8)
    };
    RenderStep::new(
        id,
        "SDFTextRenderStep",
        variant,
        RenderStepKind::TextSdf { lcd },
        RenderStepFlags::PERFORMS_SHADING
            | RenderStepFlags::HAS_TEXTURES
            | RenderStepFlags::EMITS_COVERAGE,
        uniforms,
        PrimitiveType::Triangles,
        DepthStencilSettings::DIRECT_SHADING,
        VERTEX_ATTRS,
        &[],
    )
}

pub(super) fn write_uniforms_and_textures(
    lcd: bool,
    params: &DrawParams,
    gatherer: &mut PipelineDataGatherer<'_>,
) {
    let Geometry::SubRun(data) = params.geometry() else {
        debug_assert!(false, "distance field text can only draw sub-runs");
        return;
    };
    let sub_run = data.sub_run();
    gatherer.write(params.transform().to_col_major_4x4());
    write_atlas(sub_run.format(), FilterMode::Linear, gatherer);
    let adjust = sub_run.distance_adjust();
    if lcd {
        gatherer.write(adjust);
    } else {
        gatherer.write(adjust[0]);
    }
}
