//! Artificial per-send delay injection (spec §4.3), used only for testing
//! retransmission and duplicate handling. Bypassed entirely when absent.

use std::time::Duration;

use rand::Rng;

/// Produces a (non-negative) duration on each call. No ordering
/// constraints between calls are required.
pub trait DelayGenerator: Send + Sync {
	fn next_delay(&self) -> Duration;
}

pub struct ConstantDelay(pub Duration);

impl DelayGenerator for ConstantDelay {
	fn next_delay(&self) -> Duration {
		self.0
	}
}

pub struct UniformRandomDelay {
	pub lo: Duration,
	pub hi: Duration,
}

impl DelayGenerator for UniformRandomDelay {
	fn next_delay(&self) -> Duration {
		if self.hi <= self.lo {
			return self.lo;
		}
		let lo_ms = self.lo.as_millis() as u64;
		let hi_ms = self.hi.as_millis() as u64;
		let millis = rand::thread_rng().gen_range(lo_ms..=hi_ms);
		Duration::from_millis(millis)
	}
}
