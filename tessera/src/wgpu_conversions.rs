// Copyright 2024 the Tessera Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Conversions from backend-agnostic descriptors to [`wgpu`] types.

use crate::render_step::{
    CompareOp, DepthStencilSettings, PrimitiveType, StencilFaceOps, StencilOp, VertexAttribType,
};
use crate::resource::{FilterMode, TextureFormat, TileMode};

impl VertexAttribType {
    pub fn to_wgpu(self) -> wgpu::VertexFormat {
        match self {
            Self::Float => wgpu::VertexFormat::Float32,
            Self::Float2 => wgpu::VertexFormat::Float32x2,
            Self::Float4 => wgpu::VertexFormat::Float32x4,
            Self::UInt => wgpu::VertexFormat::Uint32,
            Self::UShort2 => wgpu::VertexFormat::Uint16x2,
        }
    }
}

impl PrimitiveType {
    pub fn to_wgpu(self) -> wgpu::PrimitiveTopology {
        match self {
            Self::Triangles => wgpu::PrimitiveTopology::TriangleList,
            Self::TriangleStrip => wgpu::PrimitiveTopology::TriangleStrip,
        }
    }
}

impl CompareOp {
    pub fn to_wgpu(self) -> wgpu::CompareFunction {
        match self {
            Self::Always => wgpu::CompareFunction::Always,
            Self::Never => wgpu::CompareFunction::Never,
            Self::Less => wgpu::CompareFunction::Less,
            Self::LessEqual => wgpu::CompareFunction::LessEqual,
            Self::Equal => wgpu::CompareFunction::Equal,
            Self::Greater => wgpu::CompareFunction::Greater,
            Self::GreaterEqual => wgpu::CompareFunction::GreaterEqual,
            Self::NotEqual => wgpu::CompareFunction::NotEqual,
        }
    }
}

impl StencilOp {
    pub fn to_wgpu(self) -> wgpu::StencilOperation {
        match self {
            Self::Keep => wgpu::StencilOperation::Keep,
            Self::Zero => wgpu::StencilOperation::Zero,
            Self::Replace => wgpu::StencilOperation::Replace,
            Self::Invert => wgpu::StencilOperation::Invert,
            Self::IncWrap => wgpu::StencilOperation::IncrementWrap,
            Self::DecWrap => wgpu::StencilOperation::DecrementWrap,
        }
    }
}

impl StencilFaceOps {
    pub fn to_wgpu(&self) -> wgpu::StencilFaceState {
        wgpu::StencilFaceState {
            compare: self.compare.to_wgpu(),
            fail_op: self.stencil_fail.to_wgpu(),
            depth_fail_op: self.depth_fail.to_wgpu(),
            pass_op: self.pass.to_wgpu(),
        }
    }
}

impl DepthStencilSettings {
    /// The depth-stencil state of a pipeline rendering to an attachment of `format`.
    ///
    /// wgpu has a single read and write mask for both faces, so the front face's are used.
    pub fn to_wgpu(&self, format: wgpu::TextureFormat) -> wgpu::DepthStencilState {
        let stencil = if self.stencil_test {
            wgpu::StencilState {
                front: self.front_stencil.to_wgpu(),
                back: self.back_stencil.to_wgpu(),
                read_mask: self.front_stencil.read_mask,
                write_mask: self.front_stencil.write_mask,
            }
        } else {
            wgpu::StencilState::default()
        };
        wgpu::DepthStencilState {
            format,
            depth_write_enabled: self.depth_write,
            depth_compare: if self.depth_test {
                self.depth_compare.to_wgpu()
            } else {
                wgpu::CompareFunction::Always
            },
            stencil,
            bias: wgpu::DepthBiasState::default(),
        }
    }
}

impl TextureFormat {
    /// Returns `None` for formats wgpu cannot represent.
    pub fn to_wgpu(self) -> Option<wgpu::TextureFormat> {
        match self {
            Self::R8Unorm => Some(wgpu::TextureFormat::R8Unorm),
            Self::Rgba8Unorm => Some(wgpu::TextureFormat::Rgba8Unorm),
            Self::Bgra8Unorm => Some(wgpu::TextureFormat::Bgra8Unorm),
            Self::Depth24PlusStencil8 => Some(wgpu::TextureFormat::Depth24PlusStencil8),
            Self::B5G6R5Unorm => None,
        }
    }

    pub fn from_wgpu(format: wgpu::TextureFormat) -> Option<Self> {
        match format {
            wgpu::TextureFormat::R8Unorm => Some(Self::R8Unorm),
            wgpu::TextureFormat::Rgba8Unorm => Some(Self::Rgba8Unorm),
            wgpu::TextureFormat::Bgra8Unorm => Some(Self::Bgra8Unorm),
            wgpu::TextureFormat::Depth24PlusStencil8 => Some(Self::Depth24PlusStencil8),
            _ => None,
        }
    }
}

impl TileMode {
    pub fn to_wgpu(self) -> wgpu::AddressMode {
        match self {
            Self::Clamp => wgpu::AddressMode::ClampToEdge,
            Self::Repeat => wgpu::AddressMode::Repeat,
            Self::Mirror => wgpu::AddressMode::MirrorRepeat,
            Self::Decal => wgpu::AddressMode::ClampToBorder,
        }
    }
}

impl FilterMode {
    pub fn to_wgpu(self) -> wgpu::FilterMode {
        match self {
            Self::Nearest => wgpu::FilterMode::Nearest,
            Self::Linear => wgpu::FilterMode::Linear,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::RendererProvider;

    #[test]
    fn stencil_state_round_trips_ops() {
        let provider = RendererProvider::new();
        let winding = &provider.stencil_tessellated_wedges(peniko::Fill::NonZero).steps()[0];
        let state = winding
            .depth_stencil_settings()
            .to_wgpu(wgpu::TextureFormat::Depth24PlusStencil8);
        assert_eq!(state.stencil.front.pass_op, wgpu::StencilOperation::IncrementWrap);
        assert_eq!(state.stencil.back.pass_op, wgpu::StencilOperation::DecrementWrap);
        assert!(!state.depth_write_enabled);
        assert_eq!(TextureFormat::B5G6R5Unorm.to_wgpu(), None);
    }
}
