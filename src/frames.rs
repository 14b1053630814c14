//! # Frame Sequence Module
//!
//! Questo modulo rappresenta l'animazione sorgente come sequenza immutabile di frame RGBA.
//!
//! ## Responsabilità:
//! - Decodifica di un GIF animato tramite il decoder del crate `image`
//! - Composizione dei frame sul canvas completo (gestita dal decoder)
//! - Conservazione di delay per frame, metadati di loop e dimensione sorgente
//!
//! L'optimizer prende in prestito la sequenza in sola lettura e non la modifica mai:
//! ogni tentativo produce un nuovo candidato a partire dagli stessi frame.

use crate::error::OptimizeError;
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Loop behaviour of the animation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Repeat {
    Infinite,
    Finite(u16),
}

impl Default for Repeat {
    fn default() -> Self {
        Self::Infinite
    }
}

/// One composited raster frame
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: RgbaImage,
    /// Display time in milliseconds
    pub delay_ms: u32,
}

impl Frame {
    pub fn new(image: RgbaImage, delay_ms: u32) -> Self {
        Self { image, delay_ms }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Ordered, immutable animation frames plus display metadata
#[derive(Debug, Clone)]
pub struct FrameSequence {
    frames: Vec<Frame>,
    repeat: Repeat,
    source_size: u64,
}

impl FrameSequence {
    /// Build a sequence from already decoded frames
    pub fn new(frames: Vec<Frame>, repeat: Repeat, source_size: u64) -> Self {
        Self {
            frames,
            repeat,
            source_size,
        }
    }

    /// Decode an animated GIF from memory
    pub fn from_gif_bytes(bytes: &[u8]) -> Result<Self, OptimizeError> {
        let decoder = GifDecoder::new(Cursor::new(bytes))?;
        let frames = decoder
            .into_frames()
            .map(|frame| {
                frame.map(|frame| {
                    let (numer, denom) = frame.delay().numer_denom_ms();
                    let delay_ms = if denom == 0 { 0 } else { numer / denom };
                    Frame::new(frame.into_buffer(), delay_ms)
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!("Decoded {} frames ({} bytes)", frames.len(), bytes.len());

        // The decoder does not expose the NETSCAPE loop count; GIFs meant for
        // sharing loop forever in practice.
        Ok(Self::new(frames, Repeat::Infinite, bytes.len() as u64))
    }

    /// Decode an animated GIF from disk
    pub async fn from_gif_file(path: &Path) -> Result<Self, OptimizeError> {
        let bytes = tokio::fs::read(path).await?;
        Self::from_gif_bytes(&bytes)
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn repeat(&self) -> Repeat {
        self.repeat
    }

    /// Byte length of the container the frames were decoded from
    pub fn source_size(&self) -> u64 {
        self.source_size
    }

    /// Canvas size, taken from the first frame
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.frames.first().map(|f| (f.width(), f.height()))
    }
}
