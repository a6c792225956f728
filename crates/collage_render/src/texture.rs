//! GPU texture payloads

use crate::RenderError;
use collage_asset::{TextureDesc, TextureManager};
use collage_core::ResourceHandle;

/// Texture plus its default view, stored in a [`TextureManager`].
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub format: wgpu::TextureFormat,
}

impl GpuTexture {
    pub fn format_for(desc: &TextureDesc) -> wgpu::TextureFormat {
        if desc.channels == 1 {
            wgpu::TextureFormat::R8Unorm
        } else {
            wgpu::TextureFormat::Rgba8Unorm
        }
    }

    /// Create a sampled texture, optionally filled with tightly packed `pixels`.
    pub fn create(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        desc: &TextureDesc,
        pixels: Option<&[u8]>,
    ) -> Result<Self, RenderError> {
        desc.validate()?;
        if let Some(pixels) = pixels {
            if pixels.len() != desc.byte_len() {
                return Err(RenderError::PixelLength {
                    expected: desc.byte_len(),
                    got: pixels.len(),
                });
            }
        }

        let format = Self::format_for(desc);
        let size = wgpu::Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Layer Texture"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_DST
                | wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });

        if let Some(pixels) = pixels {
            queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                pixels,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(desc.channels * desc.width),
                    rows_per_image: Some(desc.height),
                },
                size,
            );
        }

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Ok(Self {
            texture,
            view,
            format,
        })
    }

    /// 1x1 white texture bound for layers without a texture or mask.
    pub fn white(device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Self, RenderError> {
        Self::create(device, queue, &TextureDesc::rgba(1, 1), Some(&[255; 4]))
    }
}

/// Create a texture on the GPU and register it with `textures`.
pub fn upload_texture(
    textures: &TextureManager<GpuTexture>,
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    desc: TextureDesc,
    pixels: &[u8],
) -> Result<ResourceHandle, RenderError> {
    let texture = GpuTexture::create(device, queue, &desc, Some(pixels))?;
    Ok(textures.add(desc, texture)?)
}
