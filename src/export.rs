//! File export of rasterized codes
//!
//! PNG and JPEG are written as-is; PDF wraps the raster into a single
//! US-Letter page, centered inside half-inch margins.

use crate::error::{Error, Result};
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, Stream, dictionary};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Letter page width in inches
pub const PAGE_WIDTH_IN: f32 = 8.5;
/// Letter page height in inches
pub const PAGE_HEIGHT_IN: f32 = 11.0;
/// Margin on every side in inches
pub const PAGE_MARGIN_IN: f32 = 0.5;

const POINTS_PER_INCH: f32 = 72.0;
const JPEG_QUALITY: u8 = 100;

/// Supported download formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Lossless PNG
    Png,
    /// JPEG at maximum quality
    Jpeg,
    /// Single-page US-Letter PDF
    Pdf,
}

impl ExportFormat {
    /// Fixed output file name
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Png => "qr-code.png",
            Self::Jpeg => "qr-code.jpg",
            Self::Pdf => "qr-code.pdf",
        }
    }

    /// Parse a format identifier (case-insensitive).
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "pdf" => Some(Self::Pdf),
            _ => None,
        }
    }
}

impl FromStr for ExportFormat {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        Self::parse(value)
            .ok_or_else(|| format!("Unsupported format '{value}', expected png, jpeg or pdf"))
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Pdf => "pdf",
        })
    }
}

/// Where the image sits on the PDF page, in inches from the bottom-left corner
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PdfPlacement {
    /// Left edge
    pub x: f32,
    /// Bottom edge
    pub y: f32,
    /// Drawn width
    pub width: f32,
    /// Drawn height
    pub height: f32,
}

impl PdfPlacement {
    /// Fit a `width`×`height` pixel image into the margin box, preserving aspect
    /// ratio, and center it on the page.
    pub fn for_image(width: u32, height: u32) -> Self {
        let max_width = PAGE_WIDTH_IN - 2.0 * PAGE_MARGIN_IN;
        let max_height = PAGE_HEIGHT_IN - 2.0 * PAGE_MARGIN_IN;
        let aspect = width.max(1) as f32 / height.max(1) as f32;

        let (drawn_width, drawn_height) = if aspect > max_width / max_height {
            (max_width, max_width / aspect)
        } else {
            (max_height * aspect, max_height)
        };

        Self {
            x: (PAGE_WIDTH_IN - drawn_width) / 2.0,
            y: (PAGE_HEIGHT_IN - drawn_height) / 2.0,
            width: drawn_width,
            height: drawn_height,
        }
    }
}

/// Encode `image` in `format`.
pub fn encode(image: &RgbImage, format: ExportFormat) -> Result<Vec<u8>> {
    match format {
        ExportFormat::Png => {
            let mut bytes = Vec::new();
            image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
            Ok(bytes)
        }
        ExportFormat::Jpeg => encode_jpeg(image),
        ExportFormat::Pdf => encode_pdf(image),
    }
}

/// Encode `image` and write it as `format.file_name()` under `dir`.
pub fn write(image: &RgbImage, format: ExportFormat, dir: &Path) -> Result<PathBuf> {
    let bytes = encode(image, format)?;
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format.file_name());
    std::fs::write(&path, &bytes)?;
    tracing::info!(path = %path.display(), bytes = bytes.len(), %format, "Exported QR code");
    Ok(path)
}

fn encode_jpeg(image: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode_image(image)?;
    Ok(bytes)
}

fn encode_pdf(image: &RgbImage) -> Result<Vec<u8>> {
    let placement = PdfPlacement::for_image(image.width(), image.height());
    let jpeg = encode_jpeg(image)?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(image.width()),
            "Height" => i64::from(image.height()),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));

    let pt = |inches: f32| Object::Real(inches * POINTS_PER_INCH);
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    pt(placement.width),
                    Object::Integer(0),
                    Object::Integer(0),
                    pt(placement.height),
                    pt(placement.x),
                    pt(placement.y),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
        "MediaBox" => vec![
            Object::Integer(0),
            Object::Integer(0),
            pt(PAGE_WIDTH_IN),
            pt(PAGE_HEIGHT_IN),
        ],
    });

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| Error::Pdf(format!("Failed to write PDF: {e}")))?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn landscape_images_fill_the_margin_width() {
        let placement = PdfPlacement::for_image(800, 400);
        assert!(close(placement.width, 7.5));
        assert!(close(placement.height, 3.75));
        assert!(close(placement.x, 0.5));
        assert!(close(placement.y, (11.0 - 3.75) / 2.0));
    }

    #[test]
    fn square_images_are_width_bound() {
        let placement = PdfPlacement::for_image(600, 600);
        assert!(close(placement.width, 7.5));
        assert!(close(placement.height, 7.5));
        assert!(close(placement.y, 1.75));
    }

    #[test]
    fn tall_images_fill_the_margin_height() {
        let placement = PdfPlacement::for_image(300, 1000);
        assert!(close(placement.height, 10.0));
        assert!(close(placement.width, 3.0));
        assert!(close(placement.x, 2.75));
        assert!(close(placement.y, 0.5));
    }

    #[test]
    fn format_names_are_fixed() {
        assert_eq!(ExportFormat::Png.file_name(), "qr-code.png");
        assert_eq!(ExportFormat::Jpeg.file_name(), "qr-code.jpg");
        assert_eq!(ExportFormat::Pdf.file_name(), "qr-code.pdf");
        assert_eq!("JPG".parse::<ExportFormat>(), Ok(ExportFormat::Jpeg));
        assert!("gif".parse::<ExportFormat>().is_err());
    }

    #[test]
    fn pdf_has_one_letter_page() {
        let image = RgbImage::from_pixel(640, 480, Rgb([10, 20, 30]));
        let bytes = encode(&image, ExportFormat::Pdf).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 1);
    }

    #[test]
    fn raster_formats_decode() {
        let image = RgbImage::from_pixel(64, 32, Rgb([255, 255, 255]));
        for format in [ExportFormat::Png, ExportFormat::Jpeg] {
            let bytes = encode(&image, format).unwrap();
            let decoded = image::load_from_memory(&bytes).unwrap();
            assert_eq!((decoded.width(), decoded.height()), (64, 32));
        }
    }

    #[test]
    fn write_uses_fixed_name() {
        let dir = tempfile::tempdir().unwrap();
        let image = RgbImage::from_pixel(16, 16, Rgb([0, 0, 0]));
        let path = write(&image, ExportFormat::Png, dir.path()).unwrap();
        assert_eq!(path, dir.path().join("qr-code.png"));
        assert!(path.exists());
    }
}
