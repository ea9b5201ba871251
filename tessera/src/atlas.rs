// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Glyph atlases.
//!
//! Each mask format has its own atlas made of up to [`MAX_ATLAS_PAGES`] square pages. Pages are
//! packed with a guillotine allocator and backed by lazily instantiated texture proxies. An
//! atlas only grows while it is in use, so the proxy list for a format is append-only and
//! draws prepared against an older list remain valid against a newer one.

use std::collections::HashMap;
use std::sync::Arc;

use guillotiere::{size2, AtlasAllocator};
use thiserror::Error;

use crate::resource::{TextureFormat, TextureProxy};

/// Largest number of pages per atlas. Text vertices select the page with two bits.
pub const MAX_ATLAS_PAGES: usize = 4;

/// Largest page dimension. Packed texture coordinates keep 13 bits for the position.
pub const MAX_PAGE_SIZE: u32 = 4096;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MaskFormat {
    /// 8-bit coverage.
    A8,
    /// Per-channel (LCD) coverage.
    A565,
    /// Color glyphs.
    Argb,
}

impl MaskFormat {
    const ALL: [Self; 3] = [Self::A8, Self::A565, Self::Argb];

    fn index(self) -> usize {
        match self {
            Self::A8 => 0,
            Self::A565 => 1,
            Self::Argb => 2,
        }
    }

    pub fn texture_format(self) -> TextureFormat {
        match self {
            Self::A8 => TextureFormat::R8Unorm,
            Self::A565 => TextureFormat::B5G6R5Unorm,
            Self::Argb => TextureFormat::Rgba8Unorm,
        }
    }

    pub fn bytes_per_pixel(self) -> u32 {
        self.texture_format().bytes_per_pixel()
    }
}

/// Atlas configuration.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct AtlasConfig {
    /// Width and height of each page. Clamped to [`MAX_PAGE_SIZE`].
    pub page_size: u32,
    /// Pages per format. Clamped to [`MAX_ATLAS_PAGES`].
    pub max_pages: usize,
    /// Pages created up front for each format. At least one.
    pub initial_pages: usize,
    /// Empty border kept around each glyph, in pixels.
    pub padding: u32,
}

impl Default for AtlasConfig {
    fn default() -> Self {
        Self {
            page_size: 2048,
            max_pages: MAX_ATLAS_PAGES,
            initial_pages: 1,
            padding: 1,
        }
    }
}

impl AtlasConfig {
    fn validated(self) -> Result<Self, AtlasError> {
        if self.page_size == 0 {
            return Err(AtlasError::InvalidConfig("page size must be non-zero"));
        }
        if self.max_pages == 0 {
            return Err(AtlasError::InvalidConfig("at least one page is required"));
        }
        let max_pages = self.max_pages.min(MAX_ATLAS_PAGES);
        Ok(Self {
            page_size: self.page_size.min(MAX_PAGE_SIZE),
            max_pages,
            initial_pages: self.initial_pages.clamp(1, max_pages),
            padding: self.padding.min(self.page_size / 4),
        })
    }
}

/// Errors that can occur during atlas operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AtlasError {
    /// The glyph is larger than an atlas page.
    #[error("Glyph too large ({width}x{height}) for atlas")]
    GlyphTooLarge { width: u32, height: u32 },
    /// Every page is full and no more pages may be added.
    #[error("All {0} atlas pages are full")]
    Exhausted(usize),
    #[error("Invalid atlas configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Identifies a glyph mask: a glyph of a particular strike (font, size and rendering options).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct GlyphKey {
    pub strike: u32,
    pub glyph: u32,
}

/// Where a glyph mask lives in an atlas.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct AtlasLocator {
    pub page: u32,
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
}

/// Pixels to copy into an atlas page before the draws that sample it execute.
#[derive(Clone, Debug)]
pub struct AtlasUpload {
    pub proxy: Arc<TextureProxy>,
    pub locator: AtlasLocator,
    pub data: Arc<[u8]>,
}

struct DrawAtlas {
    format: MaskFormat,
    pages: Vec<AtlasAllocator>,
    proxies: Vec<Arc<TextureProxy>>,
    glyphs: HashMap<GlyphKey, AtlasLocator>,
}

impl DrawAtlas {
    fn new(format: MaskFormat, config: &AtlasConfig) -> Self {
        let mut atlas = Self {
            format,
            pages: Vec::new(),
            proxies: Vec::new(),
            glyphs: HashMap::new(),
        };
        for _ in 0..config.initial_pages {
            atlas.add_page(config.page_size);
        }
        atlas
    }

    fn add_page(&mut self, page_size: u32) {
        let label = format!("{:?} atlas page {}", self.format, self.pages.len());
        self.pages
            .push(AtlasAllocator::new(size2(page_size as i32, page_size as i32)));
        self.proxies.push(Arc::new(TextureProxy::new(
            (page_size, page_size),
            self.format.texture_format(),
            label,
        )));
    }

    fn allocate(&mut self, page: usize, width: u32, height: u32, padding: u32) -> Option<AtlasLocator> {
        let size = size2((width + 2 * padding) as i32, (height + 2 * padding) as i32);
        let allocation = self.pages[page].allocate(size)?;
        let min = allocation.rectangle.min;
        Some(AtlasLocator {
            page: page as u32,
            x: (min.x as u32 + padding) as u16,
            y: (min.y as u32 + padding) as u16,
            width: width as u16,
            height: height as u16,
        })
    }
}

/// Owns the glyph atlases of a [`Recorder`](crate::Recorder).
pub struct AtlasManager {
    config: AtlasConfig,
    atlases: Vec<DrawAtlas>,
    uploads: Vec<AtlasUpload>,
}

impl AtlasManager {
    pub fn new(config: AtlasConfig) -> Result<Self, AtlasError> {
        let config = config.validated()?;
        let atlases = MaskFormat::ALL
            .iter()
            .map(|format| DrawAtlas::new(*format, &config))
            .collect();
        Ok(Self {
            config,
            atlases,
            uploads: Vec::new(),
        })
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    /// Texture proxies of every page of the atlas for `format`, in page order.
    ///
    /// The list only grows, so it may be longer when queried again later.
    pub fn proxies(&self, format: MaskFormat) -> &[Arc<TextureProxy>] {
        &self.atlases[format.index()].proxies
    }

    pub fn page_count(&self, format: MaskFormat) -> usize {
        self.atlases[format.index()].pages.len()
    }

    pub fn find_glyph(&self, format: MaskFormat, key: GlyphKey) -> Option<AtlasLocator> {
        self.atlases[format.index()].glyphs.get(&key).copied()
    }

    /// Places a glyph mask in the atlas for `format`, returning where it lives.
    ///
    /// Glyphs that are already present are returned as is. Otherwise the pages are tried in
    /// order and a new page is added when all of them are full. `mask`, if given, is queued for
    /// upload.
    pub fn add_glyph(
        &mut self,
        format: MaskFormat,
        key: GlyphKey,
        width: u32,
        height: u32,
        mask: Option<&Arc<[u8]>>,
    ) -> Result<AtlasLocator, AtlasError> {
        let config = self.config;
        let atlas = &mut self.atlases[format.index()];
        if let Some(locator) = atlas.glyphs.get(&key) {
            return Ok(*locator);
        }
        let padded = |v: u32| v + 2 * config.padding;
        if padded(width) > config.page_size || padded(height) > config.page_size {
            return Err(AtlasError::GlyphTooLarge { width, height });
        }
        let mut locator = None;
        for page in 0..atlas.pages.len() {
            locator = atlas.allocate(page, width, height, config.padding);
            if locator.is_some() {
                break;
            }
        }
        if locator.is_none() && atlas.pages.len() < config.max_pages {
            atlas.add_page(config.page_size);
            log::debug!(
                "Grew {format:?} atlas to {} pages",
                atlas.pages.len()
            );
            locator = atlas.allocate(atlas.pages.len() - 1, width, height, config.padding);
        }
        let Some(locator) = locator else {
            return Err(AtlasError::Exhausted(atlas.pages.len()));
        };
        atlas.glyphs.insert(key, locator);
        if let Some(data) = mask {
            self.uploads.push(AtlasUpload {
                proxy: atlas.proxies[locator.page as usize].clone(),
                locator,
                data: data.clone(),
            });
        }
        Ok(locator)
    }

    /// Takes the glyph uploads queued since the last call.
    pub fn take_uploads(&mut self) -> Vec<AtlasUpload> {
        std::mem::take(&mut self.uploads)
    }

    /// Forgets every glyph of `format`, keeping its pages.
    ///
    /// Only call this once no pending draw refers to the old locations.
    pub fn evict_all(&mut self, format: MaskFormat) {
        let atlas = &mut self.atlases[format.index()];
        atlas.glyphs.clear();
        for page in &mut atlas.pages {
            page.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> AtlasConfig {
        AtlasConfig {
            page_size: 64,
            max_pages: 3,
            initial_pages: 2,
            padding: 0,
        }
    }

    #[test]
    fn config_is_clamped() {
        let manager = AtlasManager::new(AtlasConfig {
            page_size: 10_000,
            max_pages: 9,
            initial_pages: 0,
            padding: 1,
        })
        .unwrap();
        assert_eq!(manager.config().page_size, MAX_PAGE_SIZE);
        assert_eq!(manager.config().max_pages, MAX_ATLAS_PAGES);
        assert_eq!(manager.page_count(MaskFormat::A8), 1);
        assert!(AtlasManager::new(AtlasConfig {
            page_size: 0,
            ..AtlasConfig::default()
        })
        .is_err());
    }

    #[test]
    fn glyphs_are_deduplicated() {
        let mut manager = AtlasManager::new(small_config()).unwrap();
        let key = GlyphKey { strike: 1, glyph: 2 };
        let a = manager.add_glyph(MaskFormat::A8, key, 10, 12, None).unwrap();
        let b = manager.add_glyph(MaskFormat::A8, key, 10, 12, None).unwrap();
        assert_eq!(a, b);
        assert_eq!(manager.find_glyph(MaskFormat::A8, key), Some(a));
        assert_eq!(manager.find_glyph(MaskFormat::Argb, key), None);
    }

    #[test]
    fn grows_then_exhausts() {
        let mut manager = AtlasManager::new(small_config()).unwrap();
        let format = MaskFormat::A8;
        assert_eq!(manager.proxies(format).len(), 2);
        // Each page holds exactly one 64x64 glyph.
        for glyph in 0..3 {
            let locator = manager
                .add_glyph(format, GlyphKey { strike: 0, glyph }, 64, 64, None)
                .unwrap();
            assert_eq!(locator.page, glyph);
        }
        assert_eq!(manager.proxies(format).len(), 3);
        let err = manager
            .add_glyph(format, GlyphKey { strike: 0, glyph: 3 }, 64, 64, None)
            .unwrap_err();
        assert_eq!(err, AtlasError::Exhausted(3));
        assert_eq!(
            manager.add_glyph(format, GlyphKey { strike: 0, glyph: 4 }, 65, 1, None),
            Err(AtlasError::GlyphTooLarge {
                width: 65,
                height: 1
            })
        );
    }

    #[test]
    fn uploads_are_queued() {
        let mut manager = AtlasManager::new(small_config()).unwrap();
        let mask: Arc<[u8]> = Arc::from(vec![255_u8; 16]);
        manager
            .add_glyph(MaskFormat::A8, GlyphKey { strike: 0, glyph: 0 }, 4, 4, Some(&mask))
            .unwrap();
        let uploads = manager.take_uploads();
        assert_eq!(uploads.len(), 1);
        assert_eq!(uploads[0].data.len(), 16);
        assert!(manager.take_uploads().is_empty());
    }
}
