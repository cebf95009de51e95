//! Single-frame capture from a V4L2 camera.

use anyhow::{Context, Result};
use image::{DynamicImage, RgbImage};
use v4l::buffer::Type;
use v4l::io::mmap::Stream;
use v4l::io::traits::CaptureStream;
use v4l::video::Capture;
use v4l::{Device, Format, FourCC};

const RGB3: &[u8; 4] = b"RGB3";
const YUYV: &[u8; 4] = b"YUYV";
const GREY: &[u8; 4] = b"GREY";

pub struct Camera {
    stream: Stream<'static>,
    width: u32,
    height: u32,
    fourcc: FourCC,
}

impl Camera {
    pub fn open(device: &str) -> Result<Self> {
        let dev = Device::with_path(device).with_context(|| format!("open camera {device}"))?;
        let current = dev.format().context("query camera format")?;

        // RGB first, then YUYV, else whatever the driver keeps.
        let mut fmt = current.clone();
        for fourcc in [RGB3, YUYV] {
            let wanted = Format::new(current.width, current.height, FourCC::new(fourcc));
            if let Ok(applied) = dev.set_format(&wanted) {
                fmt = applied;
                if fmt.fourcc == FourCC::new(fourcc) {
                    break;
                }
            }
        }
        log::debug!(
            "camera {device}: {}x{} {:?}",
            fmt.width,
            fmt.height,
            fmt.fourcc
        );

        let stream = Stream::with_buffers(&dev, Type::VideoCapture, 2).context("start stream")?;
        Ok(Self {
            stream,
            width: fmt.width,
            height: fmt.height,
            fourcc: fmt.fourcc,
        })
    }

    /// Capture one frame after discarding `warmup` frames so auto exposure settles.
    pub fn snapshot(&mut self, warmup: u32) -> Result<DynamicImage> {
        for _ in 0..warmup {
            self.stream.next().context("discard warm-up frame")?;
        }
        let (data, meta) = self.stream.next().context("capture frame")?;
        log::debug!("captured frame seq={} len={}", meta.sequence, data.len());

        let rgb = to_rgb(self.fourcc, self.width, self.height, data)?;
        RgbImage::from_raw(self.width, self.height, rgb)
            .map(DynamicImage::ImageRgb8)
            .ok_or_else(|| {
                anyhow::anyhow!("frame buffer smaller than {}x{}", self.width, self.height)
            })
    }
}

/// Convert a raw capture buffer to packed RGB8.
pub fn to_rgb(fourcc: FourCC, width: u32, height: u32, data: &[u8]) -> Result<Vec<u8>> {
    let pixels = (width * height) as usize;
    let rgb = if fourcc == FourCC::new(RGB3) {
        data.get(..pixels * 3)
            .ok_or_else(|| anyhow::anyhow!("short RGB3 buffer: {} bytes", data.len()))?
            .to_vec()
    } else if fourcc == FourCC::new(YUYV) {
        let packed = data
            .get(..pixels * 2)
            .ok_or_else(|| anyhow::anyhow!("short YUYV buffer: {} bytes", data.len()))?;
        packed.chunks_exact(4).flat_map(yuyv_pair).collect()
    } else if fourcc == FourCC::new(GREY) {
        let luma = data
            .get(..pixels)
            .ok_or_else(|| anyhow::anyhow!("short GREY buffer: {} bytes", data.len()))?;
        luma.iter().flat_map(|&y| [y, y, y]).collect()
    } else {
        anyhow::bail!("unsupported pixel format {fourcc:?}");
    };
    Ok(rgb)
}

// One YUYV macropixel (Y0 U Y1 V) to two RGB pixels, BT.601.
fn yuyv_pair(chunk: &[u8]) -> [u8; 6] {
    let u = chunk[1] as f32 - 128.0;
    let v = chunk[3] as f32 - 128.0;
    let rgb = |y: u8| {
        let y = y as f32;
        [
            saturate(y + 1.402 * v),
            saturate(y - 0.344136 * u - 0.714136 * v),
            saturate(y + 1.772 * u),
        ]
    };
    let [r0, g0, b0] = rgb(chunk[0]);
    let [r1, g1, b1] = rgb(chunk[2]);
    [r0, g0, b0, r1, g1, b1]
}

fn saturate(v: f32) -> u8 {
    v.clamp(0.0, 255.0) as u8
}
