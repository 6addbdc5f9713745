/// Epoch milliseconds.
///
/// Uses the browser clock on wasm; native builds (unit tests) fall back to
/// the system clock.
#[cfg(target_arch = "wasm32")]
pub(crate) fn now_ms() -> i64 {
    js_sys::Date::now().round() as i64
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn now_ms() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Side-channel error reporting for failures that are handled by a state
/// transition rather than propagated (e.g. a failed remote sync call).
#[cfg(target_arch = "wasm32")]
pub(crate) fn report_error(context: &str, message: &str) {
    web_sys::console::error_1(&format!("{context}: {message}").into());
}

#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn report_error(context: &str, message: &str) {
    eprintln!("{context}: {message}");
}

/// True if `contentpath` is the given path or nested somewhere under it.
/// Paths are dotted segment strings, so `abc` must not match `abcdef`.
pub(crate) fn content_path_is_under(contentpath: &str, base: &str) -> bool {
    contentpath == base || contentpath.starts_with(&format!("{base}."))
}
