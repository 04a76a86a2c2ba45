//! QR code styling and rendering
//!
//! A [`QrStyle`] carries the operator's colors and preview size; the
//! [`QrEncoder`] paints the code (and an optional centered logo) at 1× for
//! previews or 2× for exports.

mod encoder;

pub use encoder::QrEncoder;

use crate::error::{Error, Result};
use image::Rgb;
use serde::{Deserialize, Serialize};

/// Smallest accepted preview size in pixels
pub const MIN_SIZE: u32 = 128;
/// Largest accepted preview size in pixels
pub const MAX_SIZE: u32 = 1024;
/// Preview size used when none is given
pub const DEFAULT_SIZE: u32 = 256;
/// Export rasters are this many times the preview size
pub const EXPORT_SCALE: u32 = 2;

/// Default foreground color
pub const DEFAULT_FOREGROUND: &str = "#000000";
/// Default background color
pub const DEFAULT_BACKGROUND: &str = "#ffffff";

/// Colors and size of a rendered code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrStyle {
    /// Dark module color
    pub foreground: [u8; 3],
    /// Light module color
    pub background: [u8; 3],
    /// Preview side length in pixels
    pub size: u32,
}

impl Default for QrStyle {
    fn default() -> Self {
        Self {
            foreground: [0, 0, 0],
            background: [255, 255, 255],
            size: DEFAULT_SIZE,
        }
    }
}

impl QrStyle {
    /// Build a style from `#RRGGBB` / `#RGB` colors and a pixel size.
    pub fn from_hex(foreground: &str, background: &str, size: u32) -> Result<Self> {
        if !(MIN_SIZE..=MAX_SIZE).contains(&size) {
            return Err(Error::Validation(format!(
                "Size must be between {MIN_SIZE} and {MAX_SIZE} pixels, got {size}"
            )));
        }
        Ok(Self {
            foreground: parse_color(foreground)?,
            background: parse_color(background)?,
            size,
        })
    }

    pub(crate) fn foreground_pixel(&self) -> Rgb<u8> {
        Rgb(self.foreground)
    }

    pub(crate) fn background_pixel(&self) -> Rgb<u8> {
        Rgb(self.background)
    }
}

/// Parse a CSS-style hex color (`#1e40af`, `1e40af` or `#fff`).
pub fn parse_color(value: &str) -> Result<[u8; 3]> {
    let hex_digits = value.trim().trim_start_matches('#');
    let expanded: String = match hex_digits.len() {
        3 => hex_digits.chars().flat_map(|c| [c, c]).collect(),
        6 => hex_digits.to_string(),
        _ => {
            return Err(Error::Validation(format!(
                "Color '{value}' must be #RRGGBB or #RGB"
            )));
        }
    };

    let bytes = hex::decode(expanded)?;
    let mut rgb = [0u8; 3];
    rgb.copy_from_slice(&bytes);
    Ok(rgb)
}

/// Format an RGB triple as lowercase `#rrggbb`.
pub fn format_color(rgb: [u8; 3]) -> String {
    format!("#{}", hex::encode(rgb))
}
