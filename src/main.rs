//! Headless viewer: renders an OBJ model offscreen and optionally writes the
//! last frame to a PNG.

use std::{path::PathBuf, sync::mpsc};

use anyhow::{ensure, Context, Result};
use cgmath::Vector4;
use clap::Parser;

use deltaviewer::{
    config::ViewerConfig,
    gfx::{camera::CameraMovement, device::WgpuDevice},
    logging::{init_logging, LoggingConfig},
    FrameInput, Viewer,
};

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const FRAME_TIME: f32 = 1.0 / 60.0;

/// Render an OBJ model offscreen
#[derive(Debug, Parser)]
#[command(name = "deltaviewer", version, about)]
struct Args {
    /// OBJ file to load
    model: PathBuf,

    /// Where to write the last frame as PNG
    output: Option<PathBuf>,

    /// Number of frames to render
    #[arg(default_value_t = 3, value_parser = clap::value_parser!(u32).range(1..))]
    frames: u32,
}

fn main() -> Result<()> {
    init_logging(&LoggingConfig::default());
    let args = Args::parse();

    let config = ViewerConfig::default();
    let (width, height) = config.window_size;
    let device = WgpuDevice::new_headless(COLOR_FORMAT, width, height)
        .context("failed to create a headless wgpu device")?;

    let mut viewer = Viewer::new(device, config)?;
    let entities = viewer
        .load_model(&args.model)
        .with_context(|| format!("failed to load {}", args.model.display()))?;
    log::info!("{} parts loaded from {}", entities.len(), args.model.display());

    viewer
        .scene_mut()
        .add_clip_plane(Vector4::new(0.0, -1.0, 0.0, 0.5))?;

    let target = create_target(viewer.device().device(), width, height);
    let view = target.create_view(&wgpu::TextureViewDescriptor::default());

    // Drift forward a little each frame so consecutive frames differ
    let input = FrameInput {
        movements: vec![CameraMovement::Forward],
        mouse_delta: (0.0, 0.0),
    };
    for frame in 0..args.frames {
        viewer.update(FRAME_TIME, &input);
        let stats = viewer.render_frame();
        viewer.device_mut().present(&view);
        log::info!(
            "frame {frame}: {} draws, {} program binds, {} material binds",
            stats.draw_calls,
            stats.program_binds,
            stats.material_binds
        );
    }

    if let Some(output) = &args.output {
        let device = viewer.device();
        let pixels = read_rgba(device.device(), device.queue(), &target, width, height)?;
        image::save_buffer(output, &pixels, width, height, image::ExtendedColorType::Rgba8)
            .with_context(|| format!("failed to write {}", output.display()))?;
        log::info!("Wrote {}", output.display());
    }

    viewer.shutdown();
    Ok(())
}

fn create_target(device: &wgpu::Device, width: u32, height: u32) -> wgpu::Texture {
    device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Offscreen Target"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: COLOR_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
        view_formats: &[],
    })
}

/// Copies `texture` into tightly packed RGBA8 rows.
fn read_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    ensure!(width > 0 && height > 0, "readback size must be positive");

    let tight_row = 4 * width as usize;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT as usize;
    let padded_row = tight_row.div_ceil(align) * align;

    let staging = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Readback Staging"),
        size: (padded_row * height as usize) as wgpu::BufferAddress,
        usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
        mapped_at_creation: false,
    });

    let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
        label: Some("Readback Encoder"),
    });
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &staging,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(padded_row as u32),
                rows_per_image: Some(height),
            },
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );
    queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });
    device
        .poll(wgpu::PollType::Wait)
        .context("device poll failed during readback")?;
    receiver
        .recv()
        .context("map_async callback dropped")?
        .context("failed to map readback buffer")?;

    let data = slice.get_mapped_range();
    let mut pixels = Vec::with_capacity(tight_row * height as usize);
    for row in data.chunks(padded_row) {
        pixels.extend_from_slice(&row[..tight_row]);
    }
    drop(data);
    staging.unmap();

    Ok(pixels)
}
