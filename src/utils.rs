#[macro_export]
macro_rules! debug_if {
    ($cond:expr, $($arg:tt)+) => {
        {
            if $cond {
                tracing::debug!($($arg)+)
            }
        }
    };
}

/// Percent of `done` out of `total`, `None` when the total is unknown or zero.
pub fn progress_percent(done: u64, total: Option<u64>) -> Option<f64> {
    match total {
        Some(total) if total > 0 => Some((done as f64 / total as f64 * 100.0).min(100.0)),
        _ => None,
    }
}
