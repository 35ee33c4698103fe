//! Android system property lookup through the `getprop` binary.

use std::process::{Command, Stdio};

pub const PROP_DEVICE: &str = "ro.product.device";
pub const PROP_BUILD_DATE_UTC: &str = "ro.build.date.utc";

/// Read a system property, `None` when the binary is missing, fails, or the
/// property is unset.
pub fn get_prop(key: &str) -> Option<String> {
    let output = Command::new("getprop")
        .arg(key)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}
