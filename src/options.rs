//! The engine's capacity schedule and the creation-time options builder.
//!
//! The builder shape (chained setters returning `Self`, consumed by a
//! `create`-style entry point) is grounded on `database::Options`
//! (`key_bytes`/`index_bits`/`path`, consumed by `Options::open`).

/// Which probe sequence a table uses once capacity is fixed at creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProbeFamily {
	/// Step of 1 per collision.
	Linear,
	/// A secondary hash supplies the step (double hashing).
	Double,
	/// Doubling capacity schedule with a linear step.
	Exponential,
}

/// Precomputed monotone capacity schedule. Kept small and explicit rather
/// than computed on the fly, mirroring explicit size-class
/// table in `datum_size.rs`.
const CAPACITY_SCHEDULE: &[usize] = &[
	8, 16, 32, 64, 128, 256, 512, 1024, 2048, 4096, 8192, 16384, 32768, 65536, 131072, 262144,
	524288, 1048576, 1 << 21, 1 << 22, 1 << 23, 1 << 24, 1 << 25, 1 << 26, 1 << 27, 1 << 28,
	1 << 29, 1 << 30,
];

/// The smallest schedule entry that can hold `min_capacity` elements.
pub fn capacity_at_least(min_capacity: usize) -> usize {
	CAPACITY_SCHEDULE
		.iter()
		.copied()
		.find(|&c| c >= min_capacity)
		.unwrap_or_else(|| panic!("capacity {} exceeds the schedule's ceiling", min_capacity))
}

/// The next capacity after `current` in the schedule.
pub fn next_capacity(current: usize) -> usize {
	CAPACITY_SCHEDULE
		.iter()
		.copied()
		.find(|&c| c > current)
		.unwrap_or_else(|| panic!("capacity schedule exhausted beyond {}", current))
}

/// Creation-time options for a [`crate::engine::HashEngine`].
#[derive(Clone, Debug)]
pub struct EngineOptions {
	pub(crate) capacity_hint: usize,
	pub(crate) probe_family: ProbeFamily,
	pub(crate) load_factor: f64,
}

impl Default for EngineOptions {
	fn default() -> Self {
		Self {
			capacity_hint: 0,
			probe_family: ProbeFamily::Linear,
			load_factor: 0.75,
		}
	}
}

impl EngineOptions {
	pub fn new() -> Self {
		Self::default()
	}

	/// A capacity hint for the initial allocation; 0 means "use the
	/// default" (the schedule's smallest entry).
	pub fn capacity(mut self, capacity_hint: usize) -> Self {
		self.capacity_hint = capacity_hint;
		self
	}

	pub fn probe_family(mut self, family: ProbeFamily) -> Self {
		self.probe_family = family;
		self
	}

	/// Lowers the load-factor bound that triggers growth (the
	/// "aggressive-growth" flag from a hash engine instance).
	pub fn aggressive_growth(mut self) -> Self {
		self.load_factor = 0.5;
		self
	}

	pub(crate) fn initial_capacity(&self) -> usize {
		capacity_at_least(self.capacity_hint.max(1))
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn capacity_schedule_is_monotone_and_covers_small_hints() {
		assert_eq!(capacity_at_least(0), 8);
		assert_eq!(capacity_at_least(1), 8);
		assert_eq!(capacity_at_least(9), 16);
		assert_eq!(capacity_at_least(100), 128);
	}

	#[test]
	fn next_capacity_strictly_increases() {
		let c = capacity_at_least(4);
		assert!(next_capacity(c) > c);
	}

	#[test]
	fn builder_defaults_match_the_nominal_load_factor() {
		let o = EngineOptions::new();
		assert_eq!(o.load_factor, 0.75);
		assert_eq!(o.probe_family, ProbeFamily::Linear);
	}

	#[test]
	fn aggressive_growth_lowers_the_bound() {
		let o = EngineOptions::new().aggressive_growth();
		assert!(o.load_factor < 0.75);
	}
}
