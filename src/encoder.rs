//! # GIF Encoder Module
//!
//! Questo modulo è il collaboratore esterno dell'optimizer: dato un insieme di frame,
//! una dimensione di palette e un fattore di scala produce un blob GIF deterministico.
//!
//! ## Responsabilità:
//! - Definisce il trait `FrameEncoder` (il punto di estensione usato dall'optimizer)
//! - Ridimensiona ogni frame con il filtro configurato (`image::imageops::resize`)
//! - Quantizza ogni frame a `palette_size` colori con NeuQuant (`color_quant`)
//! - Scrive il container con il crate `gif` (loop, delay, disposal = background)
//!
//! ## Pipeline per frame:
//! 1. Resize a `max(1, round(dim * scale))` (saltato con scala 1.0)
//! 2. Normalizzazione alpha (0 oppure 255) e scelta dell'indice trasparente
//! 3. NeuQuant con palette locale di `palette_size` entry
//! 4. Scrittura frame con delay in centesimi di secondo
//!
//! L'optimizer osserva solo i byte prodotti, mai gli interni dell'encoder.

use crate::config::Config;
use crate::frames::{Frame, FrameSequence, Repeat};
use color_quant::NeuQuant;
use image::imageops::{self, FilterType};
use std::borrow::Cow;

/// Largest palette a GIF frame can carry
pub const MAX_PALETTE: u16 = 256;

/// Quality parameters of one encode attempt
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EncodeParams {
    /// Number of palette entries kept during quantization
    pub palette_size: u16,
    /// Uniform spatial scale applied to width and height
    pub scale: f64,
}

impl EncodeParams {
    pub fn new(palette_size: u16, scale: f64) -> Self {
        Self { palette_size, scale }
    }

    /// Frame dimensions after scaling, never below one pixel
    pub fn scaled_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        let scale = |dim: u32| ((dim as f64 * self.scale).round() as u32).max(1);
        (scale(width), scale(height))
    }
}

/// Encoded animation produced by one attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedBlob {
    bytes: Vec<u8>,
}

impl EncodedBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Errors raised while producing a candidate
#[derive(thiserror::Error, Debug)]
pub enum EncodeError {
    #[error("GIF encoding error: {0}")]
    Gif(#[from] gif::EncodingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Frame of {width}x{height} exceeds the GIF size limit")]
    DimensionsTooLarge { width: u32, height: u32 },

    #[error("Invalid palette size {0}")]
    InvalidPalette(u16),

    #[error("No frames to encode")]
    NoFrames,

    #[error("{0}")]
    Other(String),
}

/// Produces an encoded blob from frames and quality parameters.
///
/// Implementations must be deterministic: identical inputs give identical bytes.
pub trait FrameEncoder {
    fn encode(&self, frames: &FrameSequence, params: &EncodeParams) -> Result<EncodedBlob, EncodeError>;
}

impl<E: FrameEncoder + ?Sized> FrameEncoder for &E {
    fn encode(&self, frames: &FrameSequence, params: &EncodeParams) -> Result<EncodedBlob, EncodeError> {
        (**self).encode(frames, params)
    }
}

/// Resize + NeuQuant + `gif` writer
#[derive(Debug, Clone)]
pub struct GifFrameEncoder {
    filter: FilterType,
    /// NeuQuant sample factor
    speed: i32,
}

impl Default for GifFrameEncoder {
    fn default() -> Self {
        Self {
            filter: FilterType::Lanczos3,
            speed: 10,
        }
    }
}

impl GifFrameEncoder {
    pub fn new(filter: FilterType, speed: i32) -> Self {
        Self {
            filter,
            speed: speed.clamp(1, 30),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.resize_filter.to_filter_type(), config.quantizer_speed)
    }

    fn quantize_frame(&self, frame: &Frame, width: u32, height: u32, palette_size: u16) -> gif::Frame<'static> {
        let resized = if (width, height) == (frame.width(), frame.height()) {
            Cow::Borrowed(&frame.image)
        } else {
            Cow::Owned(imageops::resize(&frame.image, width, height, self.filter))
        };

        let mut pixels = resized.as_raw().clone();
        let mut has_transparency = false;
        for pixel in pixels.chunks_exact_mut(4) {
            if pixel[3] == 0 {
                pixel.copy_from_slice(&[0, 0, 0, 0]);
                has_transparency = true;
            } else {
                pixel[3] = 0xFF;
            }
        }

        let quantizer = NeuQuant::new(self.speed, palette_size as usize, &pixels);
        let buffer: Vec<u8> = pixels
            .chunks_exact(4)
            .map(|pixel| quantizer.index_of(pixel) as u8)
            .collect();
        let transparent = if has_transparency {
            Some(quantizer.index_of(&[0, 0, 0, 0]) as u8)
        } else {
            None
        };

        gif::Frame {
            width: width as u16,
            height: height as u16,
            delay: (frame.delay_ms / 10).min(u16::MAX as u32) as u16,
            dispose: gif::DisposalMethod::Background,
            transparent,
            palette: Some(quantizer.color_map_rgb()),
            buffer: Cow::Owned(buffer),
            ..gif::Frame::default()
        }
    }
}

impl FrameEncoder for GifFrameEncoder {
    fn encode(&self, frames: &FrameSequence, params: &EncodeParams) -> Result<EncodedBlob, EncodeError> {
        if params.palette_size < 2 || params.palette_size > MAX_PALETTE {
            return Err(EncodeError::InvalidPalette(params.palette_size));
        }

        let (width, height) = frames.dimensions().ok_or(EncodeError::NoFrames)?;
        let (width, height) = params.scaled_dimensions(width, height);
        if width > u16::MAX as u32 || height > u16::MAX as u32 {
            return Err(EncodeError::DimensionsTooLarge { width, height });
        }

        let mut encoder = gif::Encoder::new(Vec::new(), width as u16, height as u16, &[])?;
        encoder.set_repeat(match frames.repeat() {
            Repeat::Infinite => gif::Repeat::Infinite,
            Repeat::Finite(count) => gif::Repeat::Finite(count),
        })?;

        for frame in frames.frames() {
            let gif_frame = self.quantize_frame(frame, width, height, params.palette_size);
            encoder.write_frame(&gif_frame)?;
        }

        Ok(EncodedBlob::new(encoder.into_inner()?))
    }
}
