// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Glyph runs and the vertex data of text draws.

use std::ops::Range;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use peniko::kurbo::{Point, Rect};
use tessera_encoding::Transform;

use crate::atlas::{AtlasLocator, AtlasManager, GlyphKey, MaskFormat};
use crate::buffer_manager::BufferType;
use crate::draw_writer::{write_quad_indices, DrawWriter};

/// How the glyphs of a sub-run are rasterized and positioned.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SubRunKind {
    /// Masks rasterized at device resolution and drawn pixel aligned.
    Direct,
    /// Signed distance fields drawn under an arbitrary transform.
    Sdf { lcd: bool },
}

/// A glyph of a sub-run.
#[derive(Clone, Debug)]
pub struct Glyph {
    pub id: u32,
    /// Pen position of the glyph, in source space.
    pub origin: Point,
    /// Offset of the mask's top left corner from the origin, in strike space.
    pub left: i16,
    pub top: i16,
    pub width: u16,
    pub height: u16,
    /// Rasterized mask, uploaded the first time the glyph is added to an atlas.
    pub mask: Option<Arc<[u8]>>,
}

impl Glyph {
    pub fn new(id: u32, origin: impl Into<Point>, offset: (i16, i16), size: (u16, u16)) -> Self {
        Self {
            id,
            origin: origin.into(),
            left: offset.0,
            top: offset.1,
            width: size.0,
            height: size.1,
            mask: None,
        }
    }

    #[must_use]
    pub fn with_mask(mut self, mask: Arc<[u8]>) -> Self {
        self.mask = Some(mask);
        self
    }

    /// Whether the glyph has no visible pixels, as for a space.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A run of glyphs sharing a strike and a mask format.
#[derive(Clone, Debug)]
pub struct SubRun {
    kind: SubRunKind,
    format: MaskFormat,
    strike: u32,
    glyphs: Vec<Glyph>,
    strike_to_source_scale: f32,
    distance_adjust: [f32; 3],
}

impl SubRun {
    pub fn direct(format: MaskFormat, strike: u32, glyphs: Vec<Glyph>) -> Self {
        Self {
            kind: SubRunKind::Direct,
            format,
            strike,
            glyphs,
            strike_to_source_scale: 1.0,
            distance_adjust: [0.0; 3],
        }
    }

    /// A distance field run whose strike is `1 / strike_to_source_scale` times the size of
    /// the source text.
    pub fn sdf(lcd: bool, strike: u32, glyphs: Vec<Glyph>, strike_to_source_scale: f32) -> Self {
        Self {
            kind: SubRunKind::Sdf { lcd },
            format: MaskFormat::A8,
            strike,
            glyphs,
            strike_to_source_scale,
            distance_adjust: [0.0; 3],
        }
    }

    /// Sets the offset applied to distances before they are turned into coverage, per color
    /// channel for LCD text.
    #[must_use]
    pub fn with_distance_adjust(mut self, adjust: [f32; 3]) -> Self {
        self.distance_adjust = adjust;
        self
    }

    pub fn kind(&self) -> SubRunKind {
        self.kind
    }

    pub fn format(&self) -> MaskFormat {
        self.format
    }

    pub fn strike(&self) -> u32 {
        self.strike
    }

    pub fn glyphs(&self) -> &[Glyph] {
        &self.glyphs
    }

    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }

    pub fn strike_to_source_scale(&self) -> f32 {
        self.strike_to_source_scale
    }

    pub fn distance_adjust(&self) -> [f32; 3] {
        self.distance_adjust
    }

    /// Rectangle covered by `glyph`, in device space for direct runs and in source space for
    /// distance field runs.
    fn glyph_rect(&self, glyph: &Glyph, transform: &Transform) -> Rect {
        let (left, top) = (f64::from(glyph.left), f64::from(glyph.top));
        let (width, height) = (f64::from(glyph.width), f64::from(glyph.height));
        match self.kind {
            SubRunKind::Direct => {
                let p = transform.map_point(glyph.origin);
                let (x, y) = (p.x.round() + left, p.y.round() + top);
                Rect::new(x, y, x + width, y + height)
            }
            SubRunKind::Sdf { .. } => {
                let scale = f64::from(self.strike_to_source_scale);
                let (x, y) = (glyph.origin.x + left * scale, glyph.origin.y + top * scale);
                Rect::new(x, y, x + width * scale, y + height * scale)
            }
        }
    }

    /// Device-space bounds of the glyphs in `range`.
    pub fn device_bounds(&self, range: Range<usize>, transform: &Transform) -> Rect {
        let rects = self.glyphs[range]
            .iter()
            .filter(|g| !g.is_empty())
            .map(|g| self.glyph_rect(g, transform));
        let bounds = rects.reduce(|a, b| a.union(b)).unwrap_or(Rect::ZERO);
        match self.kind {
            SubRunKind::Direct => bounds,
            SubRunKind::Sdf { .. } => transform.map_rect(bounds),
        }
    }

    /// Source-space bounds of the glyphs in `range`.
    ///
    /// Direct glyphs are still snapped to whole pixels.
    pub fn local_bounds(&self, range: Range<usize>) -> Rect {
        self.device_bounds(range, &Transform::IDENTITY)
    }
}

/// The part of a [`SubRun`] drawn by one draw.
#[derive(Clone, Debug)]
pub struct SubRunData {
    sub_run: Arc<SubRun>,
    start_glyph: usize,
    glyph_count: usize,
}

impl SubRunData {
    /// Draws `range` of the sub-run's glyphs, clamped to the glyphs that exist.
    pub fn new(sub_run: Arc<SubRun>, range: Range<usize>) -> Self {
        let end = range.end.min(sub_run.glyph_count());
        let start_glyph = range.start.min(end);
        Self {
            sub_run,
            start_glyph,
            glyph_count: end - start_glyph,
        }
    }

    pub fn whole(sub_run: Arc<SubRun>) -> Self {
        let count = sub_run.glyph_count();
        Self::new(sub_run, 0..count)
    }

    pub fn sub_run(&self) -> &Arc<SubRun> {
        &self.sub_run
    }

    pub fn start_glyph(&self) -> usize {
        self.start_glyph
    }

    pub fn glyph_count(&self) -> usize {
        self.glyph_count
    }

    pub fn range(&self) -> Range<usize> {
        self.start_glyph..self.start_glyph + self.glyph_count
    }
}

/// Vertex of a glyph quad.
///
/// `tex_coords` holds the unnormalized atlas position. The atlas page is packed into the
/// high bits of `u`, which leaves 13 bits for the coordinate itself.
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct TextVertex {
    pub position: [f32; 2],
    pub depth: f32,
    pub ssbo_index: u32,
    pub tex_coords: [u16; 2],
}

static_assertions::const_assert_eq!(std::mem::size_of::<TextVertex>(), 20);

const PAGE_SHIFT: u32 = 13;

/// Ensures the glyphs of a sub-run are resident in the atlas.
pub struct GlyphRegenerator<'a> {
    sub_run: &'a SubRun,
    atlas: &'a mut AtlasManager,
    locators: Vec<AtlasLocator>,
}

impl<'a> GlyphRegenerator<'a> {
    pub fn new(sub_run: &'a SubRun, atlas: &'a mut AtlasManager) -> Self {
        Self {
            sub_run,
            atlas,
            locators: Vec::new(),
        }
    }

    /// Adds glyphs `begin..end` to the atlas, stopping at the first one that doesn't fit.
    ///
    /// Returns whether every glyph was placed and how many were, counted from `begin`.
    /// [`locators`](Self::locators) then holds their locations. Empty glyphs are not
    /// allocated and get a zero sized locator.
    pub fn regenerate(&mut self, begin: usize, end: usize) -> (bool, usize) {
        self.locators.clear();
        let format = self.sub_run.format();
        for glyph in &self.sub_run.glyphs()[begin..end] {
            if glyph.is_empty() {
                self.locators.push(AtlasLocator::default());
                continue;
            }
            let key = GlyphKey {
                strike: self.sub_run.strike(),
                glyph: glyph.id,
            };
            let width = u32::from(glyph.width);
            let height = u32::from(glyph.height);
            match self
                .atlas
                .add_glyph(format, key, width, height, glyph.mask.as_ref())
            {
                Ok(locator) => self.locators.push(locator),
                Err(err) => {
                    log::debug!("Glyph {} of strike {}: {err}", glyph.id, key.strike);
                    return (false, self.locators.len());
                }
            }
        }
        (true, self.locators.len())
    }

    pub fn locators(&self) -> &[AtlasLocator] {
        &self.locators
    }
}

/// Writes four vertices per visible glyph of `data`, drawn as indexed quads.
///
/// If the atlas runs out of space only the glyphs placed so far are written, the rest of the
/// run is dropped and `false` is returned. The caller flushes the partial draw after binding
/// every atlas page it may sample.
pub(crate) fn fill_vertex_data(
    data: &SubRunData,
    writer: &mut DrawWriter<'_>,
    transform: &Transform,
    depth: f32,
    ssbo_index: u32,
) -> bool {
    let sub_run = data.sub_run();
    let range = data.range();
    let (ok, placed, vertices) = {
        let mut regenerator = GlyphRegenerator::new(sub_run, writer.atlas_manager_mut());
        let (ok, placed) = regenerator.regenerate(range.start, range.end);
        let glyphs = &sub_run.glyphs()[range.start..range.start + placed];
        let mut vertices = Vec::with_capacity(placed * 4);
        for (glyph, locator) in glyphs.iter().zip(regenerator.locators()) {
            if glyph.is_empty() {
                continue;
            }
            let rect = sub_run.glyph_rect(glyph, transform);
            let page = locator.page << PAGE_SHIFT;
            let u0 = (u32::from(locator.x) | page) as u16;
            let u1 = ((u32::from(locator.x) + u32::from(locator.width)) | page) as u16;
            let v0 = locator.y;
            let v1 = locator.y + locator.height;
            let corners = [
                (rect.x0, rect.y0, u0, v0),
                (rect.x0, rect.y1, u0, v1),
                (rect.x1, rect.y0, u1, v0),
                (rect.x1, rect.y1, u1, v1),
            ];
            vertices.extend(corners.map(|(x, y, u, v)| TextVertex {
                position: [x as f32, y as f32],
                depth,
                ssbo_index,
                tex_coords: [u, v],
            }));
        }
        (ok, placed, vertices)
    };
    if !vertices.is_empty() {
        let indices = writer.buffer_manager().get_static_buffer(
            BufferType::Index,
            "QuadIndexBuffer",
            write_quad_indices,
        );
        writer.append_quads(indices, bytemuck::cast_slice(&vertices), vertices.len() / 4);
    }
    if !ok {
        log::warn!(
            "Glyph atlas is full, dropping {} of {} glyphs",
            range.len() - placed,
            range.len()
        );
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atlas::AtlasConfig;

    fn glyphs(count: u32, size: u16) -> Vec<Glyph> {
        (0..count)
            .map(|i| Glyph::new(i, (f64::from(i) * 10.0, 20.0), (0, -(size as i16)), (size, size)))
            .collect()
    }

    #[test]
    fn regenerate_stops_when_atlas_is_full() {
        let mut atlas = AtlasManager::new(AtlasConfig {
            page_size: 64,
            max_pages: 1,
            initial_pages: 1,
            padding: 0,
        })
        .unwrap();
        let sub_run = SubRun::direct(MaskFormat::A8, 0, glyphs(3, 64));
        let mut regenerator = GlyphRegenerator::new(&sub_run, &mut atlas);
        assert_eq!(regenerator.regenerate(0, 3), (false, 1));
        assert_eq!(regenerator.locators().len(), 1);
        // The glyph that is already resident can still be placed.
        assert_eq!(regenerator.regenerate(0, 1), (true, 1));
    }

    #[test]
    fn empty_glyphs_are_not_allocated() {
        let mut atlas = AtlasManager::new(AtlasConfig::default()).unwrap();
        let mut run = glyphs(2, 8);
        run[0].width = 0;
        let sub_run = SubRun::direct(MaskFormat::A8, 0, run);
        let mut regenerator = GlyphRegenerator::new(&sub_run, &mut atlas);
        assert_eq!(regenerator.regenerate(0, 2), (true, 2));
        assert_eq!(regenerator.locators()[0], AtlasLocator::default());
        assert!(atlas
            .find_glyph(MaskFormat::A8, GlyphKey { strike: 0, glyph: 0 })
            .is_none());
    }

    #[test]
    fn direct_glyphs_are_pixel_aligned() {
        let sub_run = SubRun::direct(MaskFormat::A8, 0, glyphs(2, 8));
        let transform = Transform::translate(0.4, 0.6);
        let bounds = sub_run.device_bounds(0..2, &transform);
        assert_eq!(bounds, Rect::new(0.0, 13.0, 18.0, 21.0));
    }

    #[test]
    fn sdf_bounds_are_scaled() {
        let sub_run = SubRun::sdf(false, 0, glyphs(1, 8), 0.5);
        assert_eq!(sub_run.local_bounds(0..1), Rect::new(0.0, 16.0, 4.0, 20.0));
        let bounds = sub_run.device_bounds(0..1, &Transform::scale(2.0, 2.0));
        assert_eq!(bounds, Rect::new(0.0, 32.0, 8.0, 40.0));
    }

    #[test]
    fn sub_run_data_is_clamped() {
        let sub_run = Arc::new(SubRun::direct(MaskFormat::A8, 0, glyphs(4, 8)));
        let data = SubRunData::new(sub_run.clone(), 2..10);
        assert_eq!(data.range(), 2..4);
        assert_eq!(SubRunData::new(sub_run, 6..8).glyph_count(), 0);
    }
}
