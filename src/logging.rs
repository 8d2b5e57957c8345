//! Logging sink abstraction.
//!
//! The filter-set builder reports diagnostics (suspicious filters, DSL
//! activity) through an injected sink rather than a process-global logger.
//! The default sink forwards to [`tracing`], so the hosting application
//! controls formatting and level filtering through its subscriber; a typical
//! host installs `tracing_subscriber::fmt()` on stderr with a `WARN` filter.

use std::sync::Arc;

/// A leveled message sink for builder diagnostics.
///
/// Implementations must be cheap to call; the builder emits at most a few
/// messages per filter.
pub trait LogSink: Send + Sync {
    /// Records a debug-level message.
    fn debug(&self, message: &str);

    /// Records a warning-level message.
    fn warn(&self, message: &str);
}

/// Default sink that forwards to the `tracing` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn debug(&self, message: &str) {
        tracing::debug!("{message}");
    }

    fn warn(&self, message: &str) {
        tracing::warn!("{message}");
    }
}

/// Returns the sink used when the caller does not inject one.
pub(crate) fn default_sink() -> Arc<dyn LogSink> {
    Arc::new(TracingSink)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::LogSink;
    use std::sync::Mutex;

    /// Records messages in memory so tests can assert on them.
    #[derive(Default)]
    pub struct MemorySink {
        pub warnings: Mutex<Vec<String>>,
        pub debugs: Mutex<Vec<String>>,
    }

    impl LogSink for MemorySink {
        fn debug(&self, message: &str) {
            self.debugs.lock().unwrap().push(message.to_string());
        }

        fn warn(&self, message: &str) {
            self.warnings.lock().unwrap().push(message.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::MemorySink;
    use super::*;

    #[test]
    fn memory_sink_records_levels_separately() {
        let sink = MemorySink::default();
        sink.debug("building filter");
        sink.warn("filter has no conditions");

        assert_eq!(sink.debugs.lock().unwrap().as_slice(), ["building filter"]);
        assert_eq!(
            sink.warnings.lock().unwrap().as_slice(),
            ["filter has no conditions"]
        );
    }

    #[test]
    fn tracing_sink_is_callable_without_subscriber() {
        // Messages go nowhere without a subscriber installed; must not panic.
        let sink = TracingSink;
        sink.debug("debug");
        sink.warn("warn");
    }
}
