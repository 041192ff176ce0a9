//! One-shot readiness gate fed by every refresh loop.

// std
use std::sync::atomic::{AtomicUsize, Ordering};
// crates.io
use serde::Serialize;
use tokio::sync::watch;
// self
use crate::_prelude::*;

/// Observable readiness of a manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ReadinessState {
	/// Not every source has loaded yet.
	Pending,
	/// Every source has loaded at least once.
	Ready,
	/// The manager stopped before becoming ready.
	Failed(String),
}

#[derive(Debug)]
pub(crate) struct Readiness {
	tx: watch::Sender<ReadinessState>,
}
impl Readiness {
	pub(crate) fn new() -> Self {
		Self { tx: watch::Sender::new(ReadinessState::Pending) }
	}

	pub(crate) fn state(&self) -> ReadinessState {
		self.tx.borrow().clone()
	}

	/// Transition out of `Pending`; later transitions are ignored.
	pub(crate) fn resolve(&self, next: ReadinessState) -> bool {
		self.tx.send_if_modified(|state| {
			if *state == ReadinessState::Pending {
				*state = next;

				true
			} else {
				false
			}
		})
	}

	pub(crate) async fn wait(&self) -> Result<()> {
		let mut rx = self.tx.subscribe();
		let state = rx
			.wait_for(|state| *state != ReadinessState::Pending)
			.await
			.map_err(|_| Error::ManagerFailed("Readiness channel closed.".into()))?
			.clone();

		match state {
			ReadinessState::Ready => Ok(()),
			ReadinessState::Failed(reason) => Err(Error::ManagerFailed(reason)),
			ReadinessState::Pending => Err(Error::ManagerFailed("Readiness still pending.".into())),
		}
	}
}

/// Counts sources down to zero, then marks the gate ready.
#[derive(Debug)]
pub(crate) struct LoadBarrier {
	remaining: AtomicUsize,
}
impl LoadBarrier {
	pub(crate) fn new(sources: usize) -> Self {
		Self { remaining: AtomicUsize::new(sources) }
	}

	/// Record one source's first load. Returns `true` for the last arrival.
	pub(crate) fn arrive(&self) -> bool {
		self.remaining.fetch_sub(1, Ordering::AcqRel) == 1
	}
}
