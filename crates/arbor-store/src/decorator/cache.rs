use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;

use super::FeatureSlot;

/// Bounded per-feature cache shared by the caching decorators.
///
/// A read that misses takes a [`Ticket`] before asking the inner store and
/// may only fill the cache if no write started or finished in between.
/// Writes bracket the inner call with [`SlotCache::begin`] and
/// [`SlotCache::finish`]; a write overlapped by a later one drops its slots
/// instead of updating them.
pub(crate) struct SlotCache<V> {
    state: Mutex<State<V>>,
}

struct State<V> {
    entries: LruCache<FeatureSlot, V>,
    generation: u64,
    writes: usize,
}

/// Cache generation observed before a read of the inner store.
#[must_use]
pub(crate) struct Ticket(u64);

/// A write in flight.
#[must_use]
pub(crate) struct Write {
    generation: u64,
    target: FeatureSlot,
    displaced: Vec<FeatureSlot>,
}

impl<V> SlotCache<V> {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            state: Mutex::new(State {
                entries: LruCache::new(capacity),
                generation: 0,
                writes: 0,
            }),
        }
    }

    /// Look `key` up; on a miss, return the ticket for a later fill.
    pub fn read<R>(&self, key: &FeatureSlot, hit: impl FnOnce(&V) -> Option<R>) -> Result<R, Ticket> {
        let mut state = self.state.lock();
        let generation = state.generation;
        state.entries.get(key).and_then(hit).ok_or(Ticket(generation))
    }

    pub fn ticket(&self) -> Ticket {
        Ticket(self.state.lock().generation)
    }

    /// Merge a value read from the inner store into the entry for `key`,
    /// unless a write raced the read.
    pub fn fill_with(
        &self,
        key: FeatureSlot,
        ticket: Ticket,
        init: impl FnOnce() -> V,
        update: impl FnOnce(&mut V),
    ) -> bool {
        let mut state = self.state.lock();
        if state.generation != ticket.0 || state.writes > 0 {
            return false;
        }
        update(state.entries.get_or_insert_mut(key, init));
        true
    }

    /// Store a value read from the inner store, unless a write raced the read.
    pub fn fill(&self, key: FeatureSlot, ticket: Ticket, value: V) -> bool {
        let mut state = self.state.lock();
        if state.generation != ticket.0 || state.writes > 0 {
            return false;
        }
        state.entries.put(key, value);
        true
    }

    pub fn begin(&self, target: FeatureSlot, displaced: Vec<FeatureSlot>) -> Write {
        let mut state = self.state.lock();
        state.generation += 1;
        state.writes += 1;
        Write {
            generation: state.generation,
            target,
            displaced,
        }
    }

    /// End a successful write. Displaced slots are dropped; `update` then
    /// runs on the target only if no other write began meanwhile, otherwise
    /// the target is dropped too.
    pub fn finish(&self, write: Write, update: impl FnOnce(&mut LruCache<FeatureSlot, V>, FeatureSlot)) {
        let mut state = self.state.lock();
        state.writes -= 1;
        for slot in &write.displaced {
            state.entries.pop(slot);
        }
        if state.generation == write.generation {
            update(&mut state.entries, write.target);
        } else {
            state.entries.pop(&write.target);
        }
        state.generation += 1;
    }

    /// End a write by dropping every slot it touched.
    pub fn discard(&self, write: Write) {
        let mut state = self.state.lock();
        state.writes -= 1;
        state.entries.pop(&write.target);
        for slot in &write.displaced {
            state.entries.pop(slot);
        }
        state.generation += 1;
    }

    pub fn clear(&self) {
        self.state.lock().entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arbor_types::Id;

    fn key() -> FeatureSlot {
        (Id::generate(), "children".to_string())
    }

    fn cached(cache: &SlotCache<usize>, slot: &FeatureSlot) -> Option<usize> {
        cache.read(slot, |v| Some(*v)).ok()
    }

    #[test]
    fn fill_after_write_is_refused() {
        let cache = SlotCache::<usize>::new(4);
        let slot = key();
        let ticket = cache.read(&slot, |v| Some(*v)).unwrap_err();
        let write = cache.begin(slot.clone(), Vec::new());
        cache.finish(write, |_, _| {});
        assert!(!cache.fill(slot.clone(), ticket, 7));
        assert_eq!(cached(&cache, &slot), None);
    }

    #[test]
    fn fill_during_write_is_refused() {
        let cache = SlotCache::<usize>::new(4);
        let slot = key();
        let write = cache.begin(slot.clone(), Vec::new());
        let ticket = cache.ticket();
        assert!(!cache.fill(slot.clone(), ticket, 7));
        cache.finish(write, |_, _| {});
        assert_eq!(cached(&cache, &slot), None);
    }

    #[test]
    fn overlapped_write_drops_its_slot() {
        let cache = SlotCache::<usize>::new(4);
        let slot = key();
        assert!(cache.fill(slot.clone(), cache.ticket(), 1));

        let first = cache.begin(slot.clone(), Vec::new());
        let second = cache.begin(slot.clone(), Vec::new());
        cache.finish(second, |entries, target| {
            entries.put(target, 3);
        });
        assert_eq!(cached(&cache, &slot), Some(3));
        cache.finish(first, |entries, target| {
            entries.put(target, 2);
        });
        assert_eq!(cached(&cache, &slot), None);
    }

    #[test]
    fn displaced_slots_are_dropped() {
        let cache = SlotCache::<usize>::new(4);
        let (target, old) = (key(), key());
        assert!(cache.fill(old.clone(), cache.ticket(), 2));
        let write = cache.begin(target.clone(), vec![old.clone()]);
        cache.finish(write, |entries, target| {
            entries.put(target, 1);
        });
        assert_eq!(cached(&cache, &old), None);
        assert_eq!(cached(&cache, &target), Some(1));
    }
}
