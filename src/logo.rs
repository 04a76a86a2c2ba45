//! Logo intake: validation, compression and data-URL hand-off
//!
//! A logo is accepted when it is an image MIME type, at most 5 MB, and between
//! 100 and 2000 pixels on each side. Accepted logos are shrunk to at most
//! 1000 pixels and roughly half a megabyte, then delivered to the owner's
//! callback as a `data:` URL. Rejections are messages, not errors.

use crate::error::{Error, Result};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader, Rgb, RgbImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};

/// Largest accepted upload
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
/// Smallest accepted width or height
pub const MIN_DIMENSION: u32 = 100;
/// Largest accepted width or height
pub const MAX_DIMENSION: u32 = 2000;
/// Longest side after compression
pub const TARGET_DIMENSION: u32 = 1000;
/// Size the compressor aims for
pub const TARGET_BYTES: usize = 512 * 1024;

const JPEG_QUALITY_STEPS: [u8; 6] = [90, 80, 70, 60, 50, 40];

/// A dropped or picked file
#[derive(Debug, Clone)]
pub struct LogoFile {
    /// Declared MIME type
    pub mime: String,
    /// Raw file contents
    pub bytes: Vec<u8>,
}

impl LogoFile {
    /// Wrap in-memory contents with a declared MIME type.
    pub fn new(mime: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime: mime.into(),
            bytes,
        }
    }

    /// Read a file from disk, deriving the MIME type from its extension or contents.
    pub fn from_path(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        let by_extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(ImageFormat::from_extension)
            .map(|format| format.to_mime_type());
        let mime = by_extension
            .or_else(|| {
                image::guess_format(&bytes)
                    .ok()
                    .map(|format| format.to_mime_type())
            })
            .unwrap_or("application/octet-stream");
        Ok(Self::new(mime, bytes))
    }
}

/// What happened to an upload or removal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoOutcome {
    /// The callback received a data URL
    Accepted,
    /// The file was refused; the message is meant for the operator
    Rejected(String),
    /// Another upload is still being processed
    Busy,
    /// The callback received `None`
    Removed,
}

type LogoCallback = Box<dyn Fn(Option<String>) + Send + Sync>;

/// Accepts one logo upload at a time and reports the result through a callback
pub struct LogoIntake {
    busy: AtomicBool,
    on_change: LogoCallback,
}

impl LogoIntake {
    /// Create an intake that calls `on_change` with `Some(data_url)` on acceptance and
    /// `None` on removal.
    pub fn new(on_change: impl Fn(Option<String>) + Send + Sync + 'static) -> Self {
        Self {
            busy: AtomicBool::new(false),
            on_change: Box::new(on_change),
        }
    }

    /// Whether an upload is being processed
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Validate and compress `file` off the async runtime, then notify the callback.
    pub async fn upload(&self, file: LogoFile) -> LogoOutcome {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("Logo upload ignored, another upload is in flight");
            return LogoOutcome::Busy;
        }
        let _guard = BusyGuard(&self.busy);

        let processed = tokio::task::spawn_blocking(move || process(&file))
            .await
            .unwrap_or_else(|e| Err(format!("Logo processing failed: {e}")));

        match processed {
            Ok(data_url) => {
                tracing::info!(data_url_len = data_url.len(), "Logo accepted");
                (self.on_change)(Some(data_url));
                LogoOutcome::Accepted
            }
            Err(message) => {
                tracing::info!(%message, "Logo rejected");
                LogoOutcome::Rejected(message)
            }
        }
    }

    /// Drop the current logo.
    pub fn remove(&self) -> LogoOutcome {
        (self.on_change)(None);
        LogoOutcome::Removed
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Validate then compress, returning a data URL or a user-facing rejection.
pub fn process(file: &LogoFile) -> std::result::Result<String, String> {
    let image = validate(file)?;
    let (mime, bytes) = compress(&image, &file.mime)
        .map_err(|e| format!("Could not compress the logo: {e}"))?;
    Ok(encode_data_url(mime, &bytes))
}

/// Check type, byte size and pixel dimensions, decoding the image on success.
pub fn validate(file: &LogoFile) -> std::result::Result<DynamicImage, String> {
    if !file.mime.starts_with("image/") {
        return Err("Please upload an image file (PNG, JPEG, GIF or WebP)".to_string());
    }
    if file.bytes.len() > MAX_UPLOAD_BYTES {
        return Err("Logo must be smaller than 5MB".to_string());
    }

    let unreadable = || "Could not read the image file".to_string();
    let (width, height) = ImageReader::new(Cursor::new(&file.bytes))
        .with_guessed_format()
        .map_err(|_| unreadable())?
        .into_dimensions()
        .map_err(|_| unreadable())?;

    if width < MIN_DIMENSION || height < MIN_DIMENSION {
        return Err(format!(
            "Logo is too small: minimum size is {MIN_DIMENSION}x{MIN_DIMENSION} pixels \
             (got {width}x{height})"
        ));
    }
    if width > MAX_DIMENSION || height > MAX_DIMENSION {
        return Err(format!(
            "Logo is too large: maximum size is {MAX_DIMENSION}x{MAX_DIMENSION} pixels \
             (got {width}x{height})"
        ));
    }

    image::load_from_memory(&file.bytes).map_err(|_| unreadable())
}

/// Shrink to [`TARGET_DIMENSION`] and re-encode towards [`TARGET_BYTES`].
///
/// PNG sources stay PNG when they fit; everything else (and oversized PNGs)
/// becomes JPEG at decreasing quality. The smallest attempt is kept if none fits.
pub fn compress(image: &DynamicImage, source_mime: &str) -> Result<(&'static str, Vec<u8>)> {
    let resized = if image.width().max(image.height()) > TARGET_DIMENSION {
        image.resize(TARGET_DIMENSION, TARGET_DIMENSION, FilterType::Lanczos3)
    } else {
        image.clone()
    };

    if source_mime == "image/png" {
        let mut png = Vec::new();
        resized.write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;
        if png.len() <= TARGET_BYTES {
            return Ok(("image/png", png));
        }
    }

    let flattened = flatten_on_white(&resized);
    let mut smallest: Option<Vec<u8>> = None;
    for quality in JPEG_QUALITY_STEPS {
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, quality).encode_image(&flattened)?;
        if jpeg.len() <= TARGET_BYTES {
            return Ok(("image/jpeg", jpeg));
        }
        if smallest.as_ref().is_none_or(|best| jpeg.len() < best.len()) {
            smallest = Some(jpeg);
        }
    }

    smallest
        .map(|jpeg| ("image/jpeg", jpeg))
        .ok_or_else(|| Error::Image("no JPEG encoding attempted".to_string()))
}

fn flatten_on_white(image: &DynamicImage) -> RgbImage {
    let rgba = image.to_rgba8();
    RgbImage::from_fn(rgba.width(), rgba.height(), |x, y| {
        let [r, g, b, a] = rgba.get_pixel(x, y).0;
        let alpha = u16::from(a);
        let over_white = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgb([over_white(r), over_white(g), over_white(b)])
    })
}

/// `data:<mime>;base64,<payload>`
pub fn encode_data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

/// Decode a base64 `data:` URL back into an image.
pub fn decode_data_url(data_url: &str) -> Result<DynamicImage> {
    let rest = data_url
        .strip_prefix("data:")
        .ok_or_else(|| Error::Image("logo is not a data URL".to_string()))?;
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::Image("malformed data URL".to_string()))?;
    if !header.ends_with(";base64") {
        return Err(Error::Image("data URL is not base64 encoded".to_string()));
    }
    let bytes = STANDARD
        .decode(payload)
        .map_err(|e| Error::Image(format!("invalid base64 in data URL: {e}")))?;
    Ok(image::load_from_memory(&bytes)?)
}
