//! Metrics helpers and per-source refresh bookkeeping.

// std
#[cfg(feature = "prometheus")] use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
// crates.io
use metrics::Label;
#[cfg(feature = "prometheus")]
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use serde::Serialize;
use smallvec::SmallVec;
// self
use crate::_prelude::*;

type LabelSet = SmallVec<[Label; 2]>;

const METRIC_REFRESH_TOTAL: &str = "jwks_mesh_refresh_total";
const METRIC_REFRESH_DURATION: &str = "jwks_mesh_refresh_duration_seconds";
const METRIC_REFRESH_ERRORS: &str = "jwks_mesh_refresh_errors_total";
const METRIC_MERGE_TOTAL: &str = "jwks_mesh_merge_total";
const METRIC_PUBLISHED_KEYS: &str = "jwks_mesh_published_keys";
const METRIC_VERIFY_TOTAL: &str = "jwks_mesh_verify_total";

/// Shared Prometheus handle installed by [`install_default_exporter`].
#[cfg(feature = "prometheus")]
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Thread-safe refresh counters for a single key source.
#[derive(Debug, Default)]
pub struct SourceMetrics {
	refresh_successes: AtomicU64,
	refresh_errors: AtomicU64,
	consecutive_errors: AtomicU64,
	last_refresh_micros: AtomicU64,
}
impl SourceMetrics {
	/// Create a new accumulator.
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	/// Record a successful refresh and its latency.
	pub fn record_refresh_success(&self, duration: Duration) {
		self.refresh_successes.fetch_add(1, Ordering::Relaxed);
		self.consecutive_errors.store(0, Ordering::Relaxed);
		self.last_refresh_micros.store(duration.as_micros() as u64, Ordering::Relaxed);
	}

	/// Record a failed refresh.
	pub fn record_refresh_error(&self) {
		self.refresh_errors.fetch_add(1, Ordering::Relaxed);
		self.consecutive_errors.fetch_add(1, Ordering::Relaxed);
	}

	/// Take a point-in-time snapshot for diagnostics.
	pub fn snapshot(&self) -> SourceMetricsSnapshot {
		SourceMetricsSnapshot {
			refresh_successes: self.refresh_successes.load(Ordering::Relaxed),
			refresh_errors: self.refresh_errors.load(Ordering::Relaxed),
			consecutive_errors: self.consecutive_errors.load(Ordering::Relaxed),
			last_refresh_micros: match self.last_refresh_micros.load(Ordering::Relaxed) {
				0 => None,
				value => Some(value),
			},
		}
	}
}

/// Read-only snapshot of per-source refresh counters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SourceMetricsSnapshot {
	/// Count of successful refreshes.
	pub refresh_successes: u64,
	/// Count of failed refreshes.
	pub refresh_errors: u64,
	/// Failures since the last success.
	pub consecutive_errors: u64,
	/// Microsecond latency of the most recent successful refresh.
	pub last_refresh_micros: Option<u64>,
}

/// Install the default Prometheus recorder backed by `metrics`.
///
/// Multiple invocations are safe; subsequent calls become no-ops once the recorder is installed.
#[cfg(feature = "prometheus")]
pub fn install_default_exporter() -> Result<()> {
	if PROMETHEUS_HANDLE.get().is_some() {
		return Ok(());
	}

	let handle = PrometheusBuilder::new()
		.install_recorder()
		.map_err(|err| Error::Metrics(err.to_string()))?;
	let _ = PROMETHEUS_HANDLE.set(handle);

	Ok(())
}

/// Access the global Prometheus exporter handle when installed.
#[cfg(feature = "prometheus")]
pub fn prometheus_handle() -> Option<&'static PrometheusHandle> {
	PROMETHEUS_HANDLE.get()
}

/// Record a successful refresh along with its latency.
pub fn record_refresh_success(source: &str, duration: Duration) {
	metrics::counter!(METRIC_REFRESH_TOTAL, status_labels(source, "success").iter()).increment(1);
	metrics::histogram!(METRIC_REFRESH_DURATION, source_labels(source).iter())
		.record(duration.as_secs_f64());
}

/// Record a failed refresh.
pub fn record_refresh_error(source: &str) {
	metrics::counter!(METRIC_REFRESH_TOTAL, status_labels(source, "error").iter()).increment(1);
	metrics::counter!(METRIC_REFRESH_ERRORS, source_labels(source).iter()).increment(1);
}

/// Record a published merge and the size of the resulting key set.
pub fn record_merge(key_count: usize) {
	metrics::counter!(METRIC_MERGE_TOTAL).increment(1);
	metrics::gauge!(METRIC_PUBLISHED_KEYS).set(key_count as f64);
}

/// Record a verification outcome (`"verified"` or a rejection label).
pub fn record_verification(outcome: &'static str) {
	metrics::counter!(METRIC_VERIFY_TOTAL, "outcome" => outcome).increment(1);
}

fn source_labels(source: &str) -> LabelSet {
	let mut labels = LabelSet::new();

	labels.push(Label::new("source", source.to_owned()));

	labels
}

fn status_labels(source: &str, status: &'static str) -> LabelSet {
	let mut labels = source_labels(source);

	labels.push(Label::new("status", status));

	labels
}
