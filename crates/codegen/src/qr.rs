use std::io::Cursor;

use image::{ImageBuffer, ImageFormat, Luma};
use qrcode::{Color, EcLevel, QrCode};

use crate::error::CodegenError;
use crate::link::scan_url;

/// Side of one QR module in pixels.
pub const MODULE_PIXELS: u32 = 10;
/// Light border around the symbol, in modules.
pub const QUIET_ZONE_MODULES: u32 = 4;

/// A rendered batch label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanLabel {
    pub batch_code: String,
    pub url: String,
    pub png: Vec<u8>,
}

/// Encode the scan link for `batch_code` as a PNG QR code (error correction
/// level L).
pub fn generate(batch_code: &str, base_url: &str) -> Result<ScanLabel, CodegenError> {
    let url = scan_url(batch_code, base_url);
    let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::L)?;
    let png = render_png(&code)?;
    tracing::debug!(batch = batch_code, %url, bytes = png.len(), "rendered label");
    Ok(ScanLabel {
        batch_code: batch_code.to_string(),
        url,
        png,
    })
}

fn render_png(code: &QrCode) -> Result<Vec<u8>, CodegenError> {
    let width = code.width() as u32;
    let colors = code.to_colors();
    let side = (width + 2 * QUIET_ZONE_MODULES) * MODULE_PIXELS;

    let img: ImageBuffer<Luma<u8>, Vec<u8>> = ImageBuffer::from_fn(side, side, |x, y| {
        let mx = x / MODULE_PIXELS;
        let my = y / MODULE_PIXELS;
        let inside = (QUIET_ZONE_MODULES..QUIET_ZONE_MODULES + width).contains(&mx)
            && (QUIET_ZONE_MODULES..QUIET_ZONE_MODULES + width).contains(&my);
        let dark = inside && {
            let idx = (my - QUIET_ZONE_MODULES) * width + (mx - QUIET_ZONE_MODULES);
            colors[idx as usize] == Color::Dark
        };
        Luma([if dark { 0 } else { 255 }])
    });

    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png)?;
    Ok(buf.into_inner())
}
