use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A device resource that can be freed explicitly.
pub trait Destroy {
    fn destroy(&self);
}

impl Destroy for wgpu::Texture {
    fn destroy(&self) {
        wgpu::Texture::destroy(self);
    }
}

struct Slot<R> {
    resource: R,
    last_use: u64,
}

/// Owns every texture of the GPU backend. Each queue submission gets an
/// epoch; resources are stamped with the last epoch that reads or writes
/// them, and a released resource is only destroyed once its epoch has been
/// reported retired by a work-done callback.
pub struct ResourceArena<R: Destroy> {
    next_id: u64,
    slots: HashMap<u64, Slot<R>>,
    pending: Vec<u64>,
    submitted: u64,
    retired: Arc<AtomicU64>,
}

impl<R: Destroy> Default for ResourceArena<R> {
    fn default() -> Self {
        Self {
            next_id: 1,
            slots: HashMap::new(),
            pending: Vec::new(),
            submitted: 0,
            retired: Arc::new(AtomicU64::new(0)),
        }
    }
}

impl<R: Destroy> ResourceArena<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, resource: R) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.slots.insert(
            id,
            Slot {
                resource,
                last_use: 0,
            },
        );
        id
    }

    pub fn get(&self, id: u64) -> Option<&R> {
        self.slots.get(&id).map(|slot| &slot.resource)
    }

    /// Opens the epoch for the next queue submission.
    pub fn begin_submission(&mut self) -> u64 {
        self.submitted += 1;
        self.submitted
    }

    pub fn stamp(&mut self, id: u64, epoch: u64) {
        if let Some(slot) = self.slots.get_mut(&id) {
            slot.last_use = slot.last_use.max(epoch);
        }
    }

    pub fn submitted_epoch(&self) -> u64 {
        self.submitted
    }

    pub fn retired_epoch(&self) -> u64 {
        self.retired.load(Ordering::Acquire)
    }

    /// Shared counter handed to work-done callbacks.
    pub fn retire_marker(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.retired)
    }

    pub fn mark_retired(&self, epoch: u64) {
        self.retired.fetch_max(epoch, Ordering::AcqRel);
    }

    /// Moves a resource to the pending-destroy set. Unknown ids are ignored.
    pub fn release(&mut self, id: u64) {
        if self.slots.contains_key(&id) && !self.pending.contains(&id) {
            self.pending.push(id);
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn live_len(&self) -> usize {
        self.slots.len()
    }

    /// Destroys pending resources whose last use has retired.
    pub fn reclaim(&mut self) -> usize {
        let retired = self.retired_epoch();
        let (ready, waiting): (Vec<u64>, Vec<u64>) = self.pending.drain(..).partition(|id| {
            self.slots
                .get(id)
                .map_or(true, |slot| slot.last_use <= retired)
        });
        self.pending = waiting;
        ready.into_iter().filter(|id| self.destroy(*id)).count()
    }

    /// Destroys every pending resource regardless of epoch.
    pub fn reclaim_all(&mut self) -> usize {
        let ids: Vec<u64> = self.pending.drain(..).collect();
        ids.into_iter().filter(|id| self.destroy(*id)).count()
    }

    fn destroy(&mut self, id: u64) -> bool {
        match self.slots.remove(&id) {
            Some(slot) => {
                slot.resource.destroy();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Fake(Rc<Cell<u32>>);

    impl Destroy for Fake {
        fn destroy(&self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn released_resource_waits_for_its_epoch() {
        let destroyed = Rc::new(Cell::new(0));
        let mut arena = ResourceArena::new();
        let a = arena.insert(Fake(destroyed.clone()));
        let b = arena.insert(Fake(destroyed.clone()));

        let e1 = arena.begin_submission();
        arena.stamp(a, e1);
        let e2 = arena.begin_submission();
        arena.stamp(b, e2);

        arena.release(a);
        arena.release(b);
        assert_eq!(arena.reclaim(), 0);

        arena.mark_retired(e1);
        assert_eq!(arena.reclaim(), 1);
        assert!(arena.get(a).is_none());
        assert!(arena.get(b).is_some());

        arena.mark_retired(e2);
        assert_eq!(arena.reclaim(), 1);
        assert_eq!(destroyed.get(), 2);
        assert_eq!(arena.live_len(), 0);
    }

    #[test]
    fn retired_epoch_never_moves_backwards() {
        let arena: ResourceArena<Fake> = ResourceArena::new();
        arena.mark_retired(5);
        arena.mark_retired(3);
        assert_eq!(arena.retired_epoch(), 5);
    }

    #[test]
    fn live_resources_are_not_reclaimed() {
        let destroyed = Rc::new(Cell::new(0));
        let mut arena = ResourceArena::new();
        let source = arena.insert(Fake(destroyed.clone()));
        let e = arena.begin_submission();
        arena.stamp(source, e);
        arena.mark_retired(e);
        assert_eq!(arena.reclaim(), 0);
        assert!(arena.get(source).is_some());
    }

    #[test]
    fn reclaim_all_ignores_epochs() {
        let destroyed = Rc::new(Cell::new(0));
        let mut arena = ResourceArena::new();
        let a = arena.insert(Fake(destroyed.clone()));
        let e = arena.begin_submission();
        arena.stamp(a, e);
        arena.release(a);
        arena.release(a);
        assert_eq!(arena.pending_len(), 1);
        assert_eq!(arena.reclaim_all(), 1);
        assert_eq!(destroyed.get(), 1);
    }
}
