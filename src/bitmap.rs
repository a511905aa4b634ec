use bitvec::prelude::*;

/// One allocation bit per inode or data-block slot, held in memory for the
/// session and persisted as raw bytes in its own disk region.
pub struct BitMap {
    bits: BitVec<u8, Lsb0>,
    /// slots that may be handed out; the region can hold more bits than this
    capacity: usize,
}

impl BitMap {
    /// An all-free map backed by `blks` blocks of `sz_blk` bytes.
    pub fn new(blks: usize, sz_blk: usize, capacity: usize) -> Self {
        Self::from_bytes(vec![0u8; blks * sz_blk], capacity)
    }

    pub fn from_bytes(bytes: Vec<u8>, capacity: usize) -> Self {
        let capacity = capacity.min(bytes.len() * 8);
        Self {
            bits: BitVec::from_vec(bytes),
            capacity,
        }
    }

    /// The region image to write back.
    pub fn as_bytes(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Lowest free slot below the capacity (first fit).
    pub fn find_first_free(&self) -> Option<usize> {
        self.bits[..self.capacity].first_zero()
    }

    pub fn clear(&mut self, index: usize) {
        assert!(index < self.capacity, "bit {index} beyond capacity");
        self.bits.set(index, false);
    }

    pub fn test(&self, index: usize) -> bool {
        index < self.capacity && self.bits[index]
    }

    /// Claim the first free slot.
    pub fn alloc(&mut self) -> Option<usize> {
        let index = self.find_first_free()?;
        self.bits.set(index, true);
        Some(index)
    }

    /// Release a claimed slot.
    pub fn dealloc(&mut self, index: usize) {
        assert!(self.test(index), "freeing free bit {index}");
        self.bits.set(index, false);
    }

    pub fn count_used(&self) -> usize {
        self.bits[..self.capacity].count_ones()
    }

    pub fn count_free(&self) -> usize {
        self.capacity - self.count_used()
    }
}
