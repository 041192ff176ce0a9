//! Per-source refresh state machine.

// self
use crate::config::RefreshPolicy;

/// Lifecycle of one source's refresh loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefreshPhase {
	/// No successful refresh yet; failures count against the warm-up budget.
	WarmingUp {
		/// Consecutive failures so far.
		failures: u32,
	},
	/// Loaded at least once; failures are transient and retried forever.
	Steady {
		/// Consecutive failures since the last success.
		failures: u32,
	},
}
impl RefreshPhase {
	/// Apply a successful refresh. Returns `true` for the first success.
	pub fn succeed(&mut self) -> bool {
		let first = matches!(self, RefreshPhase::WarmingUp { .. });

		*self = RefreshPhase::Steady { failures: 0 };

		first
	}

	/// Apply a failed refresh and decide what the loop does next.
	pub fn fail(&mut self, policy: &RefreshPolicy) -> FailureAction {
		match self {
			RefreshPhase::WarmingUp { failures } => {
				*failures = failures.saturating_add(1);

				if *failures > policy.warmup_error_budget {
					FailureAction::GiveUp
				} else {
					FailureAction::Retry(policy.retry_interval)
				}
			},
			RefreshPhase::Steady { failures } => {
				*failures = failures.saturating_add(1);

				FailureAction::Retry(policy.retry_interval)
			},
		}
	}

	/// Consecutive failures in the current phase.
	pub fn failures(&self) -> u32 {
		match self {
			RefreshPhase::WarmingUp { failures } | RefreshPhase::Steady { failures } => *failures,
		}
	}
}
impl Default for RefreshPhase {
	fn default() -> Self {
		RefreshPhase::WarmingUp { failures: 0 }
	}
}

/// What a refresh loop does after a failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureAction {
	/// Try again after the given delay.
	Retry(std::time::Duration),
	/// Stop the loop and fail the manager.
	GiveUp,
}
