//! QR code encoder

use crate::error::Result;
use crate::qr::{EXPORT_SCALE, QrStyle};
use image::imageops::{self, FilterType};
use image::{DynamicImage, Rgb, RgbImage};
use qrcode::{EcLevel, QrCode};

/// Logo side as a fraction of the code side
const LOGO_FRACTION: u32 = 5;

/// White border around exported rasters, as a fraction of the code side
const CARD_PADDING_FRACTION: u32 = 8;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Paints styled QR codes
pub struct QrEncoder {
    style: QrStyle,
    logo: Option<DynamicImage>,
}

impl QrEncoder {
    /// Create an encoder for the given style, without a logo
    pub fn new(style: QrStyle) -> Self {
        Self { style, logo: None }
    }

    /// Overlay `logo` in the center of every rendered code
    pub fn with_logo(mut self, logo: Option<DynamicImage>) -> Self {
        self.logo = logo;
        self
    }

    /// Error correction level; a logo covers modules, so it gets the highest level.
    pub fn ecc_level(&self) -> EcLevel {
        if self.logo.is_some() {
            EcLevel::H
        } else {
            EcLevel::M
        }
    }

    /// Render `data` as a square of `style.size * scale` pixels.
    pub fn render(&self, data: &str, scale: u32) -> Result<RgbImage> {
        let code = QrCode::with_error_correction_level(data.as_bytes(), self.ecc_level())?;
        let side = self.style.size * scale.max(1);
        let background = self.style.background_pixel();

        let mut modules = code
            .render::<Rgb<u8>>()
            .dark_color(self.style.foreground_pixel())
            .light_color(background)
            .quiet_zone(false)
            .max_dimensions(side, side)
            .build();

        // Dense codes overflow small sides even at one pixel per module.
        if modules.width() > side || modules.height() > side {
            modules = imageops::resize(&modules, side, side, FilterType::Nearest);
        }

        let mut canvas = RgbImage::from_pixel(side, side, background);
        let x = (side - modules.width()) / 2;
        let y = (side - modules.height()) / 2;
        imageops::replace(&mut canvas, &modules, i64::from(x), i64::from(y));

        if let Some(logo) = &self.logo {
            self.overlay_logo(&mut canvas, logo);
        }

        tracing::debug!(
            side,
            version = ?code.version(),
            has_logo = self.logo.is_some(),
            "Rendered QR code"
        );

        Ok(canvas)
    }

    /// Full-resolution export raster: the code at 2× on a forced white card.
    pub fn rasterize(&self, data: &str) -> Result<RgbImage> {
        let code = self.render(data, EXPORT_SCALE)?;
        let padding = code.width() / CARD_PADDING_FRACTION;
        let mut card = RgbImage::from_pixel(
            code.width() + 2 * padding,
            code.height() + 2 * padding,
            WHITE,
        );
        imageops::replace(&mut card, &code, i64::from(padding), i64::from(padding));
        Ok(card)
    }

    fn overlay_logo(&self, canvas: &mut RgbImage, logo: &DynamicImage) {
        let side = canvas.width();
        let box_side = (side / LOGO_FRACTION).max(1);
        let fitted = logo
            .resize(box_side, box_side, FilterType::Lanczos3)
            .to_rgba8();

        let x0 = (side - fitted.width()) / 2;
        let y0 = (canvas.height() - fitted.height()) / 2;
        let background = self.style.background_pixel();

        // Excavate the modules under the logo first.
        for y in y0..y0 + fitted.height() {
            for x in x0..x0 + fitted.width() {
                canvas.put_pixel(x, y, background);
            }
        }

        for (dx, dy, pixel) in fitted.enumerate_pixels() {
            let [r, g, b, a] = pixel.0;
            let under = canvas.get_pixel(x0 + dx, y0 + dy).0;
            let blend = |src: u8, dst: u8| -> u8 {
                let alpha = u16::from(a);
                ((u16::from(src) * alpha + u16::from(dst) * (255 - alpha)) / 255) as u8
            };
            canvas.put_pixel(
                x0 + dx,
                y0 + dy,
                Rgb([blend(r, under[0]), blend(g, under[1]), blend(b, under[2])]),
            );
        }
    }
}
