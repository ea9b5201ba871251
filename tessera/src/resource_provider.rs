// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::HashMap;
use std::sync::Arc;

use crate::resource::{
    GraphicsPipeline, GraphicsPipelineDesc, RenderPassDesc, Sampler, SamplerDesc, Texture,
    TextureFormat,
};

/// Opaque handle to an object created by a [`Backend`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BackendHandle(pub u64);

/// Creates backend objects. Returning `None` reports a creation failure.
pub trait Backend {
    fn create_graphics_pipeline(
        &mut self,
        desc: &GraphicsPipelineDesc,
        render_pass: &RenderPassDesc,
    ) -> Option<BackendHandle>;

    fn create_texture(
        &mut self,
        dimensions: (u32, u32),
        format: TextureFormat,
        label: &str,
    ) -> Option<BackendHandle>;

    fn create_sampler(&mut self, desc: &SamplerDesc) -> Option<BackendHandle>;
}

/// Source of the shared GPU resources a draw pass needs.
pub trait ResourceProvider {
    fn find_or_create_graphics_pipeline(
        &mut self,
        desc: &GraphicsPipelineDesc,
        render_pass: &RenderPassDesc,
    ) -> Option<Arc<GraphicsPipeline>>;

    fn create_texture(
        &mut self,
        dimensions: (u32, u32),
        format: TextureFormat,
        label: &str,
    ) -> Option<Arc<Texture>>;

    fn find_or_create_compatible_sampler(&mut self, desc: &SamplerDesc) -> Option<Arc<Sampler>>;
}

#[derive(Hash, PartialEq, Eq)]
struct PipelineKey {
    desc: GraphicsPipelineDesc,
    render_pass: RenderPassDesc,
}

/// [`ResourceProvider`] that caches pipelines and samplers created by a [`Backend`].
///
/// Pipelines are keyed by descriptor and render pass, samplers by descriptor. Textures are not
/// cached; sharing them is the job of [`TextureProxy`](crate::TextureProxy).
pub struct ResourceCache<B> {
    backend: B,
    pipelines: HashMap<PipelineKey, Arc<GraphicsPipeline>>,
    samplers: HashMap<SamplerDesc, Arc<Sampler>>,
}

impl<B: Backend> ResourceCache<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            pipelines: HashMap::new(),
            samplers: HashMap::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn pipeline_count(&self) -> usize {
        self.pipelines.len()
    }

    pub fn sampler_count(&self) -> usize {
        self.samplers.len()
    }

    /// Drops cached objects that nothing outside the cache references.
    pub fn purge_unused(&mut self) {
        self.pipelines.retain(|_, p| Arc::strong_count(p) > 1);
        self.samplers.retain(|_, s| Arc::strong_count(s) > 1);
    }
}

impl<B: Backend> ResourceProvider for ResourceCache<B> {
    fn find_or_create_graphics_pipeline(
        &mut self,
        desc: &GraphicsPipelineDesc,
        render_pass: &RenderPassDesc,
    ) -> Option<Arc<GraphicsPipeline>> {
        let key = PipelineKey {
            desc: desc.clone(),
            render_pass: *render_pass,
        };
        if let Some(pipeline) = self.pipelines.get(&key) {
            return Some(pipeline.clone());
        }
        let Some(handle) = self.backend.create_graphics_pipeline(desc, render_pass) else {
            log::warn!("Backend failed to create pipeline '{}'", desc.label());
            return None;
        };
        let pipeline = Arc::new(GraphicsPipeline::new(handle, desc));
        log::debug!("Created pipeline '{}'", pipeline.label());
        self.pipelines.insert(key, pipeline.clone());
        Some(pipeline)
    }

    fn create_texture(
        &mut self,
        dimensions: (u32, u32),
        format: TextureFormat,
        label: &str,
    ) -> Option<Arc<Texture>> {
        let Some(handle) = self.backend.create_texture(dimensions, format, label) else {
            log::warn!("Backend failed to create texture '{label}' of size {dimensions:?}");
            return None;
        };
        Some(Arc::new(Texture::new(handle, dimensions, format, label)))
    }

    fn find_or_create_compatible_sampler(&mut self, desc: &SamplerDesc) -> Option<Arc<Sampler>> {
        if let Some(sampler) = self.samplers.get(desc) {
            return Some(sampler.clone());
        }
        let Some(handle) = self.backend.create_sampler(desc) else {
            log::warn!("Backend failed to create sampler {desc:?}");
            return None;
        };
        let sampler = Arc::new(Sampler::new(handle, *desc));
        self.samplers.insert(*desc, sampler.clone());
        Some(sampler)
    }
}
