// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bytemuck::Pod;
use smallvec::SmallVec;

use crate::atlas::AtlasManager;
use crate::resource::{SamplerDesc, TextureProxy};

/// Shading-language type of a uniform or vertex attribute.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SlType {
    Float,
    Float2,
    Float3,
    Float4,
    Float4x4,
    Int,
    UInt,
    UShort2,
}

impl SlType {
    pub fn size(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::UInt | Self::UShort2 => 4,
            Self::Float2 => 8,
            Self::Float3 => 12,
            Self::Float4 => 16,
            Self::Float4x4 => 64,
        }
    }

    /// Alignment within a uniform block, following WGSL's host-shareable layout.
    pub fn alignment(self) -> usize {
        match self {
            Self::Float | Self::Int | Self::UInt | Self::UShort2 => 4,
            Self::Float2 => 8,
            Self::Float3 | Self::Float4 | Self::Float4x4 => 16,
        }
    }

    pub fn wgsl_name(self) -> &'static str {
        match self {
            Self::Float => "f32",
            Self::Float2 => "vec2<f32>",
            Self::Float3 => "vec3<f32>",
            Self::Float4 => "vec4<f32>",
            Self::Float4x4 => "mat4x4<f32>",
            Self::Int => "i32",
            Self::UInt => "u32",
            Self::UShort2 => "vec2<u32>",
        }
    }
}

/// A named uniform in a render step's schema.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Uniform {
    pub name: &'static str,
    pub ty: SlType,
}

impl Uniform {
    pub const fn new(name: &'static str, ty: SlType) -> Self {
        Self { name, ty }
    }
}

/// A value that can be written to a uniform block.
pub trait UniformValue: Pod {
    const TYPE: SlType;
}

impl UniformValue for f32 {
    const TYPE: SlType = SlType::Float;
}

impl UniformValue for [f32; 2] {
    const TYPE: SlType = SlType::Float2;
}

impl UniformValue for [f32; 3] {
    const TYPE: SlType = SlType::Float3;
}

impl UniformValue for [f32; 4] {
    const TYPE: SlType = SlType::Float4;
}

impl UniformValue for [f32; 16] {
    const TYPE: SlType = SlType::Float4x4;
}

impl UniformValue for i32 {
    const TYPE: SlType = SlType::Int;
}

impl UniformValue for u32 {
    const TYPE: SlType = SlType::UInt;
}

/// Packed uniform values of one draw, compared by content.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct UniformDataBlock(Vec<u8>);

impl UniformDataBlock {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A texture and the sampler state it is read with.
#[derive(Clone, Debug)]
pub struct TextureBinding {
    pub proxy: Arc<TextureProxy>,
    pub sampler: SamplerDesc,
}

impl PartialEq for TextureBinding {
    fn eq(&self, other: &Self) -> bool {
        self.proxy.id() == other.proxy.id() && self.sampler == other.sampler
    }
}

impl Eq for TextureBinding {}

impl Hash for TextureBinding {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.proxy.id().hash(state);
        self.sampler.hash(state);
    }
}

/// Ordered texture bindings of one draw.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct TextureDataBlock(SmallVec<[TextureBinding; 4]>);

impl TextureDataBlock {
    pub fn bindings(&self) -> &[TextureBinding] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether binding `other` also provides every texture of `self` at the same slot.
    ///
    /// Atlases only ever gain pages, so a binding made after growth satisfies draws prepared
    /// before it.
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        other.0.len() >= self.0.len() && other.0[..self.0.len()] == self.0[..]
    }
}

/// Collects the uniforms and textures a render step writes for one draw.
///
/// In debug builds the gatherer checks that uniforms arrive in exactly the order and with the
/// types of the step's uniform schema, and that none are missing.
pub struct PipelineDataGatherer<'a> {
    atlas: &'a AtlasManager,
    uniforms: Vec<u8>,
    textures: SmallVec<[TextureBinding; 4]>,
    #[cfg(debug_assertions)]
    expected: &'static [Uniform],
    #[cfg(debug_assertions)]
    written: usize,
}

impl<'a> PipelineDataGatherer<'a> {
    pub fn new(atlas: &'a AtlasManager, expected: &'static [Uniform]) -> Self {
        #[cfg(not(debug_assertions))]
        let _ = expected;
        Self {
            atlas,
            uniforms: Vec::new(),
            textures: SmallVec::new(),
            #[cfg(debug_assertions)]
            expected,
            #[cfg(debug_assertions)]
            written: 0,
        }
    }

    /// The atlases that text steps sample from.
    pub fn atlas_manager(&self) -> &'a AtlasManager {
        self.atlas
    }

    pub fn write<T: UniformValue>(&mut self, value: T) {
        #[cfg(debug_assertions)]
        {
            let expected = self.expected.get(self.written);
            debug_assert!(
                expected.is_some_and(|u| u.ty == T::TYPE),
                "uniform #{} written as {:?}, expected {:?}",
                self.written,
                T::TYPE,
                expected
            );
            self.written += 1;
        }
        let offset = self.uniforms.len().next_multiple_of(T::TYPE.alignment());
        self.uniforms.resize(offset, 0);
        self.uniforms.extend_from_slice(bytemuck::bytes_of(&value));
    }

    pub fn add_texture(&mut self, proxy: &Arc<TextureProxy>, sampler: SamplerDesc) {
        self.textures.push(TextureBinding {
            proxy: proxy.clone(),
            sampler,
        });
    }

    /// Finishes gathering, returning the non-empty uniform and texture blocks.
    pub fn finish(self) -> (Option<UniformDataBlock>, Option<TextureDataBlock>) {
        #[cfg(debug_assertions)]
        debug_assert_eq!(
            self.written,
            self.expected.len(),
            "not all declared uniforms were written"
        );
        let uniforms = (!self.uniforms.is_empty()).then(|| UniformDataBlock(self.uniforms));
        let textures = (!self.textures.is_empty()).then(|| TextureDataBlock(self.textures));
        (uniforms, textures)
    }
}
