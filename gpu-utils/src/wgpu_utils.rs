use log::trace;
use thiserror::Error;

/// Device and queue backed by wgpu's noop backend.
/// Resources can be created and written but nothing is ever executed,
/// which is enough to exercise resource bookkeeping in headless tests.
pub struct NoopGpu {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
}

pub async fn noop_wgpu() -> Result<NoopGpu, NoopGpuError> {
    let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
        backends: wgpu::Backends::NOOP,
        backend_options: wgpu::BackendOptions {
            noop: wgpu::NoopBackendOptions { enable: true },
            ..Default::default()
        },
        ..Default::default()
    });

    let adapter = instance
        .enumerate_adapters(wgpu::Backends::NOOP)
        .pop()
        .ok_or(NoopGpuError::AdapterNotFound)?;
    trace!("noop_wgpu: adapter found: {:?}", adapter.get_info().name);

    let (device, queue) = adapter.request_device(&Default::default()).await?;

    Ok(NoopGpu {
        instance,
        adapter,
        device,
        queue,
    })
}

/// Number of bytes a tightly packed image of `size` occupies in `format`.
///
/// Returns `None` for formats without a single block copy size
/// (depth/stencil combinations, multi-planar formats) and on overflow.
pub fn tightly_packed_len(format: wgpu::TextureFormat, size: [u32; 2]) -> Option<usize> {
    let bytes_per_row = tightly_packed_bytes_per_row(format, size[0])?;
    let (_, block_height) = format.block_dimensions();
    let rows = size[1].div_ceil(block_height) as usize;
    (bytes_per_row as usize).checked_mul(rows)
}

/// Bytes in one tightly packed row of blocks that covers `width` texels.
pub fn tightly_packed_bytes_per_row(format: wgpu::TextureFormat, width: u32) -> Option<u32> {
    let block_size = format.block_copy_size(None)?;
    let (block_width, _) = format.block_dimensions();
    width.div_ceil(block_width).checked_mul(block_size)
}

#[derive(Error, Debug)]
pub enum NoopGpuError {
    #[error("No adapter was found for the noop backend")]
    AdapterNotFound,
    #[error("Failed to request device")]
    DeviceRequestFailed(#[from] wgpu::RequestDeviceError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_wgpu_creates_device() {
        let gpu = noop_wgpu().await.unwrap();
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("noop_wgpu_creates_device"),
            size: wgpu::Extent3d {
                width: 4,
                height: 4,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        assert_eq!(texture.width(), 4);
    }

    #[test]
    fn packed_len_for_uncompressed_formats() {
        assert_eq!(
            tightly_packed_len(wgpu::TextureFormat::Rgba8Unorm, [3, 5]),
            Some(3 * 5 * 4)
        );
        assert_eq!(
            tightly_packed_len(wgpu::TextureFormat::R8Unorm, [7, 2]),
            Some(14)
        );
    }

    #[test]
    fn packed_len_rounds_up_to_whole_blocks() {
        // BC1 stores 4x4 texel blocks in 8 bytes.
        assert_eq!(
            tightly_packed_len(wgpu::TextureFormat::Bc1RgbaUnorm, [5, 5]),
            Some(2 * 2 * 8)
        );
    }

    #[test]
    fn packed_len_is_none_for_combined_depth_stencil() {
        assert_eq!(
            tightly_packed_len(wgpu::TextureFormat::Depth24PlusStencil8, [4, 4]),
            None
        );
    }
}
