//! Fault sink - the single funnel through which transport faults are
//! reported to the owning connection.
//!
//! Every transport-facing failure (timeout, cancellation, I/O error) passes
//! through [`FaultSink::report`]. The first fault is recorded and the
//! construction-time callback fires exactly once; overlapping failures from
//! concurrent operations still yield a single "broken" transition. The sink
//! never retries and knows nothing about reconnection.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::WireError;

/// Category of the fault that broke a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultReason {
    /// A transport write exceeded the configured deadline.
    Timeout,
    /// The caller's cancellation signal fired mid-write.
    Cancelled,
    /// The transport raised an I/O error.
    Io,
}

impl fmt::Display for FaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FaultReason::Timeout => f.write_str("timeout"),
            FaultReason::Cancelled => f.write_str("cancelled"),
            FaultReason::Io => f.write_str("io failure"),
        }
    }
}

/// First fault recorded against the connection.
struct Recorded {
    reason: FaultReason,
    detail: String,
}

type FaultCallback = Box<dyn Fn(FaultReason) + Send + Sync>;

struct Inner {
    recorded: OnceLock<Recorded>,
    callback: Option<FaultCallback>,
}

/// Cheaply cloneable handle recording the first transport fault.
///
/// One clone lives inside the write buffer, another with the owning
/// connection so it can observe breakage.
#[derive(Clone)]
pub struct FaultSink {
    inner: Arc<Inner>,
}

impl FaultSink {
    /// Create a sink with no notification callback.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                recorded: OnceLock::new(),
                callback: None,
            }),
        }
    }

    /// Create a sink that invokes `callback` when the first fault is recorded.
    pub fn with_callback<F>(callback: F) -> Self
    where
        F: Fn(FaultReason) + Send + Sync + 'static,
    {
        Self {
            inner: Arc::new(Inner {
                recorded: OnceLock::new(),
                callback: Some(Box::new(callback)),
            }),
        }
    }

    /// Report a transport fault.
    ///
    /// The first report records the fault, fires the callback, and hands the
    /// original error back for propagation. Every later report returns
    /// [`WireError::Broken`] carrying the first recorded fault instead.
    pub fn report(&self, err: WireError) -> WireError {
        let reason = match &err {
            WireError::Timeout => FaultReason::Timeout,
            WireError::Cancelled => FaultReason::Cancelled,
            _ => FaultReason::Io,
        };

        let mut first = false;
        self.inner.recorded.get_or_init(|| {
            first = true;
            Recorded {
                reason,
                detail: err.to_string(),
            }
        });

        if first {
            if let Some(callback) = &self.inner.callback {
                callback(reason);
            }
            err
        } else {
            // A racing report got there first; surface its fault.
            match self.broken_error() {
                Some(broken) => broken,
                None => err,
            }
        }
    }

    /// Whether a fault has been recorded.
    #[inline]
    pub fn is_broken(&self) -> bool {
        self.inner.recorded.get().is_some()
    }

    /// Category of the recorded fault, if any.
    pub fn reason(&self) -> Option<FaultReason> {
        self.inner.recorded.get().map(|r| r.reason)
    }

    /// The [`WireError::Broken`] to return from operations on a broken buffer.
    pub fn broken_error(&self) -> Option<WireError> {
        self.inner.recorded.get().map(|r| WireError::Broken {
            reason: r.reason,
            detail: r.detail.clone(),
        })
    }
}

impl Default for FaultSink {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FaultSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultSink")
            .field("broken", &self.is_broken())
            .field("reason", &self.reason())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_new_sink_not_broken() {
        let sink = FaultSink::new();
        assert!(!sink.is_broken());
        assert!(sink.reason().is_none());
        assert!(sink.broken_error().is_none());
    }

    #[test]
    fn test_first_report_returns_original_error() {
        let sink = FaultSink::new();
        let err = sink.report(WireError::Timeout);
        assert!(matches!(err, WireError::Timeout));
        assert!(sink.is_broken());
        assert_eq!(sink.reason(), Some(FaultReason::Timeout));
    }

    #[test]
    fn test_second_report_returns_broken_with_first_reason() {
        let sink = FaultSink::new();
        let _ = sink.report(WireError::Timeout);

        let err = sink.report(WireError::Cancelled);
        assert!(matches!(
            err,
            WireError::Broken {
                reason: FaultReason::Timeout,
                ..
            }
        ));
        // Still the first reason.
        assert_eq!(sink.reason(), Some(FaultReason::Timeout));
    }

    #[test]
    fn test_callback_fires_exactly_once() {
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = count.clone();
        let sink = FaultSink::with_callback(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        let _ = sink.report(WireError::Timeout);
        let _ = sink.report(WireError::Cancelled);
        let _ = sink.report(WireError::Io(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "pipe closed",
        )));

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_clones_share_state() {
        let sink = FaultSink::new();
        let other = sink.clone();

        let _ = sink.report(WireError::Cancelled);
        assert!(other.is_broken());
        assert_eq!(other.reason(), Some(FaultReason::Cancelled));
    }

    #[test]
    fn test_io_fault_reason() {
        let sink = FaultSink::new();
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let _ = sink.report(WireError::Io(io));
        assert_eq!(sink.reason(), Some(FaultReason::Io));

        let detail = match sink.broken_error() {
            Some(WireError::Broken { detail, .. }) => detail,
            other => panic!("expected Broken, got {:?}", other),
        };
        assert!(detail.contains("reset by peer"));
    }
}
