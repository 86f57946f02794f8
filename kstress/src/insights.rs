//! Insights - Observability for kstress.
//!
//! Stressors log through `tracing`; the binary installs a subscriber.
//!
//! # Usage
//!
//! ```rust,ignore
//! kstress::insights::init_logging(tracing::Level::DEBUG);
//! let _guard = kstress::insights::stressor_span("rename", 0).entered();
//! ```

use tracing::{ Level, Span };

/// Install a stderr fmt subscriber (call once at startup).
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_logging(level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .is_ok()
}

/// Map a `-v` count to a log level
pub fn level_for_verbosity(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Span wrapping one stressor instance
pub fn stressor_span(name: &'static str, instance: u32) -> Span {
    tracing::info_span!("stressor", name, instance)
}

/// Record the outcome of a negative-test probe
#[inline]
pub fn record_probe(probe: &'static str, rejected: bool) {
    tracing::trace!(probe, rejected, "probe");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_verbosity() {
        assert_eq!(level_for_verbosity(0), Level::WARN);
        assert_eq!(level_for_verbosity(2), Level::DEBUG);
        assert_eq!(level_for_verbosity(9), Level::TRACE);
    }

    #[test]
    fn test_span_and_probe_compile() {
        let _guard = stressor_span("msg", 3).entered();
        record_probe("renameat bad fd", true);
    }
}
