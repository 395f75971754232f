use crate::error::DecodeError;
use ndarray::Array3;

/// Packed 4-byte pixel layouts, named as in GStreamer/PipeWire caps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    Bgrx,
    Bgra,
    Rgbx,
    Rgba,
    Xrgb,
    Argb,
    Xbgr,
    Abgr,
}

impl PixelFormat {
    pub const CHANNELS: usize = 4;

    pub fn from_caps_name(name: &str) -> Option<Self> {
        match name {
            "BGRx" => Some(PixelFormat::Bgrx),
            "BGRA" => Some(PixelFormat::Bgra),
            "RGBx" => Some(PixelFormat::Rgbx),
            "RGBA" => Some(PixelFormat::Rgba),
            "xRGB" => Some(PixelFormat::Xrgb),
            "ARGB" => Some(PixelFormat::Argb),
            "xBGR" => Some(PixelFormat::Xbgr),
            "ABGR" => Some(PixelFormat::Abgr),
            _ => None,
        }
    }

    pub fn caps_name(self) -> &'static str {
        match self {
            PixelFormat::Bgrx => "BGRx",
            PixelFormat::Bgra => "BGRA",
            PixelFormat::Rgbx => "RGBx",
            PixelFormat::Rgba => "RGBA",
            PixelFormat::Xrgb => "xRGB",
            PixelFormat::Argb => "ARGB",
            PixelFormat::Xbgr => "xBGR",
            PixelFormat::Abgr => "ABGR",
        }
    }

    /// Channel index of red, green and blue within one pixel
    pub fn rgb_channels(self) -> [usize; 3] {
        match self {
            PixelFormat::Bgrx | PixelFormat::Bgra => [2, 1, 0],
            PixelFormat::Rgbx | PixelFormat::Rgba => [0, 1, 2],
            PixelFormat::Xrgb | PixelFormat::Argb => [1, 2, 3],
            PixelFormat::Xbgr | PixelFormat::Abgr => [3, 2, 1],
        }
    }
}

/// Raw sample from the capture pipeline before decoding
#[derive(Debug, Clone)]
pub struct RawSample {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Bytes per row; 0 means tightly packed
    pub stride: usize,
    /// Pixel format as caps string (e.g., "BGRx")
    pub format: String,
    pub timestamp_ms: u128,
}

/// A decoded frame: `(height, width, 4)` bytes in `format` channel order
#[derive(Debug, Clone)]
pub struct Frame {
    pub pixels: Array3<u8>,
    pub format: PixelFormat,
    pub timestamp_ms: u128,
}

impl Frame {
    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }
}

pub fn decode_sample(sample: &RawSample) -> Result<Frame, DecodeError> {
    let format = PixelFormat::from_caps_name(&sample.format)
        .ok_or_else(|| DecodeError::UnsupportedFormat(sample.format.clone()))?;
    if sample.width == 0 || sample.height == 0 {
        return Err(DecodeError::EmptyFrame);
    }

    let width = sample.width as usize;
    let height = sample.height as usize;
    let row_bytes = width * PixelFormat::CHANNELS;
    let stride = if sample.stride == 0 {
        row_bytes
    } else {
        sample.stride
    };
    if stride < row_bytes {
        return Err(DecodeError::BadStride { stride, row_bytes });
    }

    let needed = stride * (height - 1) + row_bytes;
    if sample.data.len() < needed {
        return Err(DecodeError::ShortBuffer {
            expected: needed,
            actual: sample.data.len(),
        });
    }

    let packed = if stride == row_bytes {
        sample.data[..row_bytes * height].to_vec()
    } else {
        let mut out = Vec::with_capacity(row_bytes * height);
        for row in sample.data.chunks(stride).take(height) {
            out.extend_from_slice(&row[..row_bytes]);
        }
        out
    };

    let pixels = Array3::from_shape_vec((height, width, PixelFormat::CHANNELS), packed).map_err(
        |_| DecodeError::ShortBuffer {
            expected: needed,
            actual: sample.data.len(),
        },
    )?;

    Ok(Frame {
        pixels,
        format,
        timestamp_ms: sample.timestamp_ms,
    })
}
