//! Objective guard and diagnostics sinks.
//!
//! Line searches inside optimization drivers cannot cope with an objective of
//! `inf` or `NaN`. The guard replaces such totals, and any total evaluated on
//! an inverted configuration (det F ≤ 0 at some point), with a large finite
//! sentinel that is worse than every physically valid state.
//!
//! The range of det F observed during one evaluation can be forwarded to an
//! injected [`DiagnosticsSink`]. Reporting never influences the returned value.

use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// Sentinel returned in place of non-finite or inverted objective values.
pub const DEFAULT_SENTINEL: f64 = 1e10;

/// Observed range of det F over the points of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeterminantRange {
    pub min: f64,
    pub max: f64,
}

impl DeterminantRange {
    /// Empty range; merging any sample replaces it.
    pub fn empty() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min > self.max
    }

    pub fn include(&mut self, determinant: f64) {
        // NaN compares false both ways; record it as inverted.
        if determinant.is_nan() {
            self.min = f64::NAN;
            return;
        }
        self.min = if self.min.is_nan() { self.min } else { self.min.min(determinant) };
        self.max = self.max.max(determinant);
    }

    pub fn merge(self, other: Self) -> Self {
        let min = if self.min.is_nan() || other.min.is_nan() {
            f64::NAN
        } else {
            self.min.min(other.min)
        };
        Self {
            min,
            max: self.max.max(other.max),
        }
    }

    /// True if some visited point had det F ≤ 0 (or an undefined determinant).
    pub fn has_inversion(&self) -> bool {
        self.min.is_nan() || (!self.is_empty() && self.min <= 0.0)
    }
}

impl Default for DeterminantRange {
    fn default() -> Self {
        Self::empty()
    }
}

/// Quadrature-summed energy together with the determinant range that produced it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnergySample {
    pub total: f64,
    pub determinants: DeterminantRange,
}

impl EnergySample {
    pub fn zero() -> Self {
        Self {
            total: 0.0,
            determinants: DeterminantRange::empty(),
        }
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            total: self.total + other.total,
            determinants: self.determinants.merge(other.determinants),
        }
    }
}

/// Observational events emitted while evaluating callbacks.
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// det F range seen during one objective evaluation
    DeterminantRange(DeterminantRange),
    /// The raw objective was replaced by the sentinel
    SentinelApplied { raw: f64, sentinel: f64 },
}

/// Consumer of diagnostics. Implementations must tolerate concurrent calls.
pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, diagnostic: &Diagnostic);

    fn name(&self) -> &str;
}

/// Collects diagnostics in memory, for tests and inspection.
#[derive(Debug, Default)]
pub struct VecSink {
    events: Mutex<Vec<Diagnostic>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded events.
    pub fn events(&self) -> Vec<Diagnostic> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl DiagnosticsSink for VecSink {
    fn record(&self, diagnostic: &Diagnostic) {
        if let Ok(mut events) = self.events.lock() {
            events.push(diagnostic.clone());
        }
    }

    fn name(&self) -> &str {
        "vec_sink"
    }
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&self, diagnostic: &Diagnostic) {
        match diagnostic {
            Diagnostic::DeterminantRange(range) => {
                tracing::debug!(j_min = range.min, j_max = range.max, "J_range");
            }
            Diagnostic::SentinelApplied { raw, sentinel } => {
                tracing::warn!(raw = *raw, sentinel = *sentinel, "objective replaced by sentinel");
            }
        }
    }

    fn name(&self) -> &str {
        "tracing_sink"
    }
}

/// Clamp applied to every objective value handed to a driver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveGuard {
    pub sentinel: f64,
}

impl Default for ObjectiveGuard {
    fn default() -> Self {
        Self {
            sentinel: DEFAULT_SENTINEL,
        }
    }
}

impl ObjectiveGuard {
    pub fn new(sentinel: f64) -> Self {
        assert!(sentinel.is_finite(), "objective sentinel must be finite");
        Self { sentinel }
    }

    /// True if `value` is this guard's sentinel rather than a real energy.
    pub fn is_clamped(&self, value: f64) -> bool {
        value == self.sentinel
    }

    /// Guarded objective value for `sample`.
    pub fn apply(&self, sample: &EnergySample, sink: Option<&dyn DiagnosticsSink>) -> f64 {
        if let Some(sink) = sink {
            sink.record(&Diagnostic::DeterminantRange(sample.determinants));
        }
        if sample.total.is_finite() && !sample.determinants.has_inversion() {
            return sample.total;
        }
        if let Some(sink) = sink {
            sink.record(&Diagnostic::SentinelApplied {
                raw: sample.total,
                sentinel: self.sentinel,
            });
        }
        self.sentinel
    }
}
