//! Label generation for batches.
//!
//! A batch label is a QR code encoding the batch's scan link. Scanning it
//! opens the stage-entry flow for that batch without a login.

mod bundle;
mod error;
mod link;
mod qr;

pub use bundle::{label_bundle, label_file_stem};
pub use error::CodegenError;
pub use link::{scan_url, ScanLink, SCAN_ACTION};
pub use qr::{generate, ScanLabel, MODULE_PIXELS, QUIET_ZONE_MODULES};
