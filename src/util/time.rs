/// Current time in milliseconds. Only differences between two readings are meaningful.
#[cfg(not(target_arch = "wasm32"))]
pub fn now_millis() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
        * 1000.0
}

/// Current time in milliseconds. Only differences between two readings are meaningful.
#[cfg(target_arch = "wasm32")]
pub fn now_millis() -> f64 {
    web_sys::window()
        .and_then(|window| window.performance())
        .map(|perf| perf.now())
        .unwrap_or(0.0)
}

/// Milliseconds elapsed since `start`, never negative.
pub fn elapsed_since(start: f64, now: f64) -> f64 {
    (now - start).max(0.0)
}
