//! QR rendering of session URLs for terminal display.
//!
//! A phone on the same network can scan the code and open the session's
//! landing page in a browser.
//!
//! ## Example
//!
//! ```rust,ignore
//! use lanshare_core::qr;
//!
//! let ascii = qr::generate_ascii("http://192.168.1.20:52530")?;
//! println!("{ascii}");
//! ```

use qrcode::render::unicode;
use qrcode::{EcLevel, QrCode};

use crate::error::{Error, Result};

/// Render `url` as a QR code made of Unicode half blocks.
///
/// # Errors
///
/// Returns an error if the data does not fit in a QR code.
pub fn generate_ascii(url: &str) -> Result<String> {
    let qr_code = QrCode::with_error_correction_level(url, EcLevel::M)
        .map_err(|e| Error::Internal(format!("Failed to generate QR code: {e}")))?;

    let rendered = qr_code
        .render::<unicode::Dense1x2>()
        .dark_color(unicode::Dense1x2::Light)
        .light_color(unicode::Dense1x2::Dark)
        .build();

    Ok(rendered)
}
