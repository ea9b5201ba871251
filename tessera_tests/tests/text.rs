// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tests of atlas-backed text drawing.

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tessera::{
    AtlasConfig, Command, DrawList, DrawOrder, DrawPass, FilterMode, Geometry, Glyph, LoadOp,
    MaskFormat, PaintParams, Recorder, RecorderOptions, SamplerDesc, StoreOp, SubRun, SubRunData,
    Transform,
};
use tessera_tests::{
    draw_buffers, full_clip, mask, render_pass, resource_cache, target, texture_binds,
};

/// Pages that each hold exactly one 64x64 glyph.
fn small_atlas(max_pages: usize, initial_pages: usize) -> Result<Recorder> {
    Ok(Recorder::new(RecorderOptions {
        atlas: AtlasConfig {
            page_size: 64,
            max_pages,
            initial_pages,
            padding: 0,
        },
        ..RecorderOptions::default()
    })?)
}

fn big_glyphs(count: u32) -> Vec<Glyph> {
    (0..count)
        .map(|i| {
            Glyph::new(i, (f64::from(i) * 70.0, 100.0), (0, -64), (64, 64))
                .with_mask(mask(MaskFormat::A8, 64))
        })
        .collect()
}

fn text_pass(recorder: &mut Recorder, sub_run: SubRun, sdf: bool) -> DrawPass {
    let provider = recorder.renderer_provider().clone();
    let renderer = if sdf {
        provider.text_sdf(false)
    } else {
        provider.text_direct()
    };
    let mut draws = DrawList::new();
    draws.record_draw(
        renderer,
        Transform::IDENTITY,
        Geometry::SubRun(SubRunData::whole(Arc::new(sub_run))),
        full_clip(),
        DrawOrder::new(1),
        Some(PaintParams::solid(3, [0.0, 0.0, 0.0, 1.0])),
    );
    recorder.make_draw_pass(draws, target(), (LoadOp::Clear, StoreOp::Store), [1.0; 4])
}

/// The `u` texture coordinate of every vertex of a text draw.
fn tex_coord_u(recorder: &Recorder, pass: &DrawPass) -> Result<Vec<u16>> {
    let info = draw_buffers(pass)
        .first()
        .copied()
        .ok_or_else(|| anyhow!("no text draw"))?;
    let data = recorder
        .buffer_manager()
        .data(info.buffer)
        .ok_or_else(|| anyhow!("no vertex buffer"))?;
    let start = info.offset as usize;
    let vertices = &data[start..start + info.size as usize];
    Ok(vertices
        .chunks_exact(20)
        .map(|vertex| u16::from_ne_bytes([vertex[16], vertex[17]]))
        .collect())
}

#[test]
fn atlas_growth_rebinds_textures() -> Result<()> {
    let mut recorder = small_atlas(3, 2)?;
    let sub_run = SubRun::direct(MaskFormat::A8, 0, big_glyphs(3));
    let pass = text_pass(&mut recorder, sub_run, false);

    // The third glyph adds a page after the first binding was recorded.
    assert_eq!(texture_binds(&pass), [vec![0_u32, 1], vec![0, 1, 2]]);
    assert_eq!(pass.sampled_textures().len(), 3);
    assert_eq!(
        pass.sampler_descs(),
        [SamplerDesc::clamped(FilterMode::Nearest)]
    );

    // Both binds come before the single draw, which keeps all three glyphs.
    let commands: Vec<_> = pass.commands().collect();
    let last_bind = commands
        .iter()
        .rposition(|c| matches!(c, Command::BindTexturesAndSamplers { .. }));
    let draw = commands.iter().position(|c| c.is_draw());
    assert!(last_bind < draw);
    let draws: Vec<_> = commands.iter().filter(|c| c.is_draw()).collect();
    assert_eq!(draws.len(), 1);
    assert!(matches!(
        draws[0],
        Command::DrawIndexed {
            index_count: 18,
            base_vertex: 0,
            ..
        }
    ));
    assert_eq!(recorder.atlas_manager_mut().take_uploads().len(), 3);
    Ok(())
}

#[test]
fn growth_is_bound_before_a_cut_short_draw() -> Result<()> {
    let mut recorder = small_atlas(3, 2)?;
    // The third glyph adds the last page and the fourth no longer fits.
    let sub_run = SubRun::direct(MaskFormat::A8, 0, big_glyphs(4));
    let pass = text_pass(&mut recorder, sub_run, false);

    assert_eq!(texture_binds(&pass), [vec![0_u32, 1], vec![0, 1, 2]]);
    let mut bound_pages = 0;
    let mut draws = Vec::new();
    for command in pass.commands() {
        match command {
            Command::BindTexturesAndSamplers {
                texture_indices, ..
            } => bound_pages = texture_indices.len(),
            c if c.is_draw() => draws.push((c.clone(), bound_pages)),
            _ => {}
        }
    }
    assert_eq!(draws.len(), 1);
    assert!(matches!(
        draws[0].0,
        Command::DrawIndexed {
            index_count: 18,
            ..
        }
    ));
    assert_eq!(draws[0].1, 3);
    Ok(())
}

#[test]
fn tex_coords_carry_the_page() -> Result<()> {
    let mut recorder = small_atlas(3, 2)?;
    let sub_run = SubRun::direct(MaskFormat::A8, 0, big_glyphs(3));
    let pass = text_pass(&mut recorder, sub_run, false);

    let u = tex_coord_u(&recorder, &pass)?;
    assert_eq!(u.len(), 12);
    for (glyph, corners) in u.chunks_exact(4).enumerate() {
        let page = (glyph as u16) << 13;
        // Left corners start at x = 0, right ones end at x = 64.
        assert_eq!(corners, [page, page, page | 64, page | 64]);
    }
    Ok(())
}

#[test]
fn exhausted_atlas_drops_remaining_glyphs() -> Result<()> {
    let mut recorder = small_atlas(1, 1)?;
    let sub_run = SubRun::direct(MaskFormat::A8, 0, big_glyphs(3));
    let pass = text_pass(&mut recorder, sub_run, false);

    let draws: Vec<_> = pass.commands().filter(|c| c.is_draw()).collect();
    assert_eq!(draws.len(), 1);
    assert!(matches!(
        draws[0],
        Command::DrawIndexed { index_count: 6, .. }
    ));
    assert_eq!(pass.vertex_buffer_size(), 4 * 20);
    assert_eq!(recorder.atlas_manager().page_count(MaskFormat::A8), 1);
    Ok(())
}

#[test]
fn sdf_text_samples_linearly() -> Result<()> {
    let mut recorder = small_atlas(3, 1)?;
    let glyphs = (0..2)
        .map(|i| {
            Glyph::new(i, (f64::from(i) * 20.0, 40.0), (0, -16), (16, 16))
                .with_mask(mask(MaskFormat::A8, 16))
        })
        .collect();
    let sub_run = SubRun::sdf(false, 0, glyphs, 0.5).with_distance_adjust([0.1, 0.0, 0.0]);
    let mut pass = text_pass(&mut recorder, sub_run, true);

    assert_eq!(
        pass.sampler_descs(),
        [SamplerDesc::clamped(FilterMode::Linear)]
    );
    assert_eq!(texture_binds(&pass), [vec![0_u32]]);
    assert!(matches!(
        pass.commands().find(|c| c.is_draw()),
        Some(Command::DrawIndexed { index_count: 12, .. })
    ));

    let mut cache = resource_cache();
    pass.prepare_resources(&mut cache, &render_pass())?;
    assert!(pass.texture(0).is_some());
    assert!(pass.sampler(0).is_some());
    // The atlas page and the render target.
    assert_eq!(cache.backend().textures_created, 2);
    assert_eq!(cache.backend().samplers_created, 1);
    Ok(())
}

#[test]
fn sampler_failure_leaves_pass_unprepared() -> Result<()> {
    let mut recorder = small_atlas(1, 1)?;
    let sub_run = SubRun::direct(MaskFormat::A8, 0, big_glyphs(1));
    let mut pass = text_pass(&mut recorder, sub_run, false);

    let mut cache = resource_cache();
    cache.backend_mut().fail_samplers = true;
    assert!(pass.prepare_resources(&mut cache, &render_pass()).is_err());
    assert!(!pass.is_prepared());
    assert!(pass.texture(0).is_none());

    cache.backend_mut().fail_samplers = false;
    pass.prepare_resources(&mut cache, &render_pass())?;
    assert!(pass.sampler(0).is_some());
    Ok(())
}
