use elvtrace_core::batch::normalize_code;
use elvtrace_core::encoding::percent_encode;

/// Value of the `action` parameter that routes to stage entry.
pub const SCAN_ACTION: &str = "scan";

/// `{base_url}/?code={code}&action=scan`. A trailing `/` on `base_url` is
/// dropped.
pub fn scan_url(batch_code: &str, base_url: &str) -> String {
    format!(
        "{}/?code={}&action={}",
        base_url.trim_end_matches('/'),
        percent_encode(batch_code),
        SCAN_ACTION
    )
}

/// A deep link parsed back from request parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanLink {
    pub batch_code: String,
}

impl ScanLink {
    /// `Some` only when both parameters are present, the code is not blank
    /// and the action is `scan`.
    pub fn from_query(code: Option<&str>, action: Option<&str>) -> Option<ScanLink> {
        let code = normalize_code(code?);
        if code.is_empty() || action? != SCAN_ACTION {
            return None;
        }
        Some(ScanLink { batch_code: code })
    }
}
