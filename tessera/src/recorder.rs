// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::sync::Arc;

use crate::atlas::{AtlasConfig, AtlasManager};
use crate::buffer_manager::DrawBufferManager;
use crate::draw_list::DrawList;
use crate::draw_pass::DrawPass;
use crate::renderer::RendererProvider;
use crate::resource::{LoadOp, StoreOp, TextureProxy};
use crate::Result;

/// Parameters used in creating a [`Recorder`].
#[derive(Copy, Clone, Debug)]
pub struct RecorderOptions {
    /// Size of each staging buffer. Larger appends get a buffer of their own.
    pub max_buffer_size: usize,
    /// Layout of the glyph atlases.
    pub atlas: AtlasConfig,
}

impl Default for RecorderOptions {
    fn default() -> Self {
        Self {
            max_buffer_size: 1 << 20,
            atlas: AtlasConfig::default(),
        }
    }
}

/// Records draw passes, owning the state they share.
pub struct Recorder {
    renderer_provider: Arc<RendererProvider>,
    atlas_manager: AtlasManager,
    buffer_manager: DrawBufferManager,
}

impl Recorder {
    pub fn new(options: RecorderOptions) -> Result<Self> {
        Ok(Self {
            renderer_provider: Arc::new(RendererProvider::new()),
            atlas_manager: AtlasManager::new(options.atlas)?,
            buffer_manager: DrawBufferManager::new(options.max_buffer_size),
        })
    }

    pub fn renderer_provider(&self) -> &Arc<RendererProvider> {
        &self.renderer_provider
    }

    pub fn atlas_manager(&self) -> &AtlasManager {
        &self.atlas_manager
    }

    pub fn atlas_manager_mut(&mut self) -> &mut AtlasManager {
        &mut self.atlas_manager
    }

    /// Staged buffer data of the passes recorded since the last reset.
    pub fn buffer_manager(&self) -> &DrawBufferManager {
        &self.buffer_manager
    }

    pub(crate) fn managers_mut(&mut self) -> (&mut DrawBufferManager, &mut AtlasManager) {
        (&mut self.buffer_manager, &mut self.atlas_manager)
    }

    /// See [`DrawPass::make`].
    pub fn make_draw_pass(
        &mut self,
        draw_list: DrawList,
        target: Arc<TextureProxy>,
        ops: (LoadOp, StoreOp),
        clear_color: [f32; 4],
    ) -> DrawPass {
        DrawPass::make(self, draw_list, target, ops, clear_color)
    }

    /// Drops all staged buffer data once the passes that used it have been uploaded.
    pub fn reset_buffers(&mut self) {
        self.buffer_manager.reset();
    }
}
