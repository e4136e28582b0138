/// An array-backed binary min-heap of carrier event times.
///
/// `position[c]` is the slot of carrier `c` in `entries`, so the key of any carrier can be
/// changed in `O(log n)`.
#[derive(Debug, Clone, Default)]
pub struct CarrierHeap {
    entries: Vec<HeapEntry>,
    position: Vec<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct HeapEntry {
    time: f64,
    carrier: usize,
}

impl CarrierHeap {
    /// An empty heap with room for `n` carriers.
    pub fn with_capacity(n: usize) -> Self {
        Self {
            entries: Vec::with_capacity(n),
            position: Vec::with_capacity(n),
        }
    }

    /// Remove all carriers.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.position.clear();
    }

    /// Number of carriers in the heap.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the heap is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert `carrier`, which must not be in the heap yet.
    pub fn push(&mut self, carrier: usize, time: f64) {
        if self.position.len() <= carrier {
            self.position.resize(carrier + 1, usize::MAX);
        }
        let slot = self.entries.len();
        self.entries.push(HeapEntry { time, carrier });
        self.position[carrier] = slot;
        self.sift_up(slot);
    }

    /// The carrier with the earliest event and its time.
    pub fn peek(&self) -> Option<(usize, f64)> {
        self.entries.first().map(|e| (e.carrier, e.time))
    }

    /// Remove and return the carrier with the earliest event.
    pub fn pop_min(&mut self) -> Option<(usize, f64)> {
        if self.entries.is_empty() {
            return None;
        }
        let last = self.entries.len() - 1;
        self.swap(0, last);
        let min = self.entries.pop()?;
        self.position[min.carrier] = usize::MAX;
        if !self.entries.is_empty() {
            self.sift_down(0);
        }
        Some((min.carrier, min.time))
    }

    /// Event time of `carrier`.
    pub fn time_of(&self, carrier: usize) -> f64 {
        self.entries[self.position[carrier]].time
    }

    /// Change the event time of `carrier` and restore heap order.
    pub fn update_key(&mut self, carrier: usize, time: f64) {
        let slot = self.position[carrier];
        let old = self.entries[slot].time;
        self.entries[slot].time = time;
        if time < old {
            self.sift_up(slot);
        } else {
            self.sift_down(slot);
        }
    }

    /// Subtract `delta` from every key. Order is unaffected.
    pub fn shift_keys(&mut self, delta: f64) {
        self.entries.iter_mut().for_each(|e| e.time -= delta);
    }

    /// Move the entry at `slot` down until both children are later.
    pub fn sift_down(&mut self, mut slot: usize) {
        let n = self.entries.len();
        loop {
            let left = 2 * slot + 1;
            let right = left + 1;
            let mut smallest = slot;
            if left < n && self.entries[left].time < self.entries[smallest].time {
                smallest = left;
            }
            if right < n && self.entries[right].time < self.entries[smallest].time {
                smallest = right;
            }
            if smallest == slot {
                break;
            }
            self.swap(slot, smallest);
            slot = smallest;
        }
    }

    fn sift_up(&mut self, mut slot: usize) {
        while slot > 0 {
            let parent = (slot - 1) / 2;
            if self.entries[slot].time < self.entries[parent].time {
                self.swap(slot, parent);
                slot = parent;
            } else {
                break;
            }
        }
    }

    fn swap(&mut self, a: usize, b: usize) {
        self.entries.swap(a, b);
        self.position[self.entries[a].carrier] = a;
        self.position[self.entries[b].carrier] = b;
    }

    /// Check the heap property and the position table.
    pub fn verify(&self) -> bool {
        let ordered = (1..self.entries.len())
            .all(|i| self.entries[(i - 1) / 2].time <= self.entries[i].time);
        let indexed = self
            .entries
            .iter()
            .enumerate()
            .all(|(slot, e)| self.position[e.carrier] == slot);
        ordered && indexed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn pops_in_order() {
        let mut rng = SmallRng::seed_from_u64(1234);
        let mut heap = CarrierHeap::with_capacity(50);
        let mut times: Vec<f64> = (0..50).map(|_| rng.gen()).collect();
        times
            .iter()
            .enumerate()
            .for_each(|(c, t)| heap.push(c, *t));
        assert!(heap.verify());

        for _ in 0..200 {
            let c = rng.gen_range(0..50);
            let t: f64 = rng.gen();
            heap.update_key(c, t);
            times[c] = t;
            assert!(heap.verify());
        }
        let (c, t) = heap.peek().unwrap();
        assert_eq!(heap.time_of(c), t);

        let mut popped = vec![];
        while let Some((c, t)) = heap.pop_min() {
            assert_eq!(times[c], t);
            popped.push(t);
        }
        assert!(popped.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(popped.len(), 50);
    }

    #[test]
    fn infinite_keys_sink() {
        let mut heap = CarrierHeap::default();
        heap.push(0, 1.0);
        heap.push(1, 2.0);
        heap.update_key(0, f64::INFINITY);
        assert_eq!(heap.peek(), Some((1, 2.0)));
        heap.shift_keys(1.5);
        assert_eq!(heap.peek(), Some((1, 0.5)));
        assert!(heap.verify());
    }
}
