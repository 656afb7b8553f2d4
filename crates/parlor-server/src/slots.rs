/// Pool of free seat indices in `[0, capacity)`, kept sorted ascending so
/// `acquire` always hands out the lowest free seat. Together with the
/// slots currently assigned to players, the pool partitions the full
/// range at all times.
#[derive(Debug)]
pub struct SlotAllocator {
    capacity: u8,
    free: Vec<u8>,
}

impl SlotAllocator {
    pub fn new(capacity: u8) -> Self {
        Self {
            capacity,
            free: (0..capacity).collect(),
        }
    }

    /// Take the lowest free slot. The caller checks capacity first; an
    /// empty pool degrades to slot 0 rather than panicking.
    pub fn acquire(&mut self) -> u8 {
        if self.free.is_empty() {
            tracing::warn!("slot pool exhausted, falling back to slot 0");
            return 0;
        }
        self.free.remove(0)
    }

    /// Return a slot to the pool. Out-of-range or already-free slots are
    /// rejected; release happens exactly once per occupied slot.
    pub fn release(&mut self, slot: u8) {
        if slot >= self.capacity {
            tracing::warn!(slot, "ignoring release of out-of-range slot");
            return;
        }
        match self.free.binary_search(&slot) {
            Ok(_) => tracing::warn!(slot, "ignoring double release of slot"),
            Err(pos) => self.free.insert(pos, slot),
        }
    }

    pub fn free_slots(&self) -> &[u8] {
        &self.free
    }
}
