//! A polymorphic hashing container kernel: one open-addressed hash engine
//! wearing three shapes (dictionary, set, bag), plus the object runtime
//! (type registry, packed header, lock-free retain/release) that backs
//! every container and may also back an individual element.

pub mod bag;
pub mod bridge;
pub mod callbacks;
pub mod dictionary;
mod engine;
pub mod error;
pub mod extern_count;
pub mod header;
pub mod object;
pub mod options;
pub mod registry;
pub mod set;

pub use bag::Bag;
pub use callbacks::{DynCallbacks, ElementOps, SpecialBits};
pub use dictionary::Dictionary;
pub use engine::{HashEngine, Shape};
pub use error::Error;
pub use header::ObjectHeader;
pub use object::Handle;
pub use options::{EngineOptions, ProbeFamily};
pub use registry::{RuntimeType, TypeId};
pub use set::Set;

#[cfg(test)]
mod tests {
	use super::*;

	fn init() {
		let _ = pretty_env_logger::try_init();
	}

	#[test]
	fn dictionary_set_then_get() {
		init();
		let mut d: Dictionary<String, i32> = Dictionary::new();
		d.set("a".to_string(), 1);
		assert_eq!(d.get(&"a".to_string()), Some(&1));
	}

	#[test]
	fn set_grows_to_a_hundred_distinct_keys() {
		init();
		let mut s: Set<i32> = Set::new();
		for i in 0..100 {
			s.add(i);
		}
		assert_eq!(s.len(), 100);
	}

	#[test]
	fn bag_tracks_count_of_value() {
		init();
		let mut b: Bag<i32> = Bag::new();
		b.add(1);
		b.add(1);
		b.add(2);
		assert_eq!(b.count_of(&1), 2);
	}

	#[test]
	fn copy_of_a_thousand_entries_then_mutate_original() {
		init();
		let mut d: Dictionary<i32, i32> = Dictionary::new();
		for i in 0..1000 {
			d.add(i, i);
		}
		let snapshot = d.copy();
		for i in 0..1000 {
			d.remove(&i);
		}
		assert!(d.is_empty());
		assert_eq!(snapshot.len(), 1000);
	}

	#[test]
	fn retain_five_then_release_six_tears_down_exactly_once() {
		init();
		struct Droppable(std::rc::Rc<std::cell::Cell<u32>>);
		impl RuntimeType for Droppable {
			const NAME: &'static str = "Droppable";
			fn finalize(&mut self) {
				self.0.set(self.0.get() + 1);
			}
		}

		let drops = std::rc::Rc::new(std::cell::Cell::new(0));
		let h = Handle::new(Droppable(drops.clone()));
		let mut clones: Vec<_> = (0..5).map(|_| h.clone()).collect();
		assert_eq!(h.retain_count(), 6);
		clones.pop(); // one of the 6 references goes away
		drop(clones);
		assert_eq!(drops.get(), 0);
		drop(h);
		assert_eq!(drops.get(), 1);
	}
}
