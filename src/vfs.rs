//! In-memory tree: an arena of dentries addressed by generational ids, and a
//! cache of inodes addressed by `ino`. Dentries never own inodes; they name
//! them by number and the cache hands them out.

use super::*;
use inode::{Dentry, MInode};

use std::collections::HashMap;

/// Stable handle of a dentry. A stale handle (its slot reused after a delete)
/// never resolves, thanks to the generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DentryId {
    index: u32,
    gen: u32,
}

struct Slot {
    gen: u32,
    dentry: Option<Dentry>,
}

#[derive(Default)]
pub struct DentryTable {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl DentryTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, dentry: Dentry) -> DentryId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.dentry = Some(dentry);
            return DentryId {
                index,
                gen: slot.gen,
            };
        }
        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            gen: 0,
            dentry: Some(dentry),
        });
        DentryId { index, gen: 0 }
    }

    pub fn remove(&mut self, id: DentryId) -> Option<Dentry> {
        let slot = self.slots.get_mut(id.index as usize)?;
        if slot.gen != id.gen {
            return None;
        }
        let dentry = slot.dentry.take()?;
        slot.gen = slot.gen.wrapping_add(1);
        self.free.push(id.index);
        Some(dentry)
    }

    pub fn get(&self, id: DentryId) -> Option<&Dentry> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.gen == id.gen)
            .and_then(|slot| slot.dentry.as_ref())
    }

    pub fn get_mut(&mut self, id: DentryId) -> Option<&mut Dentry> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.gen == id.gen)
            .and_then(|slot| slot.dentry.as_mut())
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.dentry.is_some()).count()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
    }
}

/// Resident inodes keyed by `ino`.
///
/// Directory inodes stay for the whole session since they carry the child
/// lists the arena hangs off. Regular files and symlinks count against
/// `capacity`; once it is exceeded the least recently used clean ones are
/// dropped and read again on next access.
pub struct InodeCache {
    capacity: usize,
    tick: u64,
    map: HashMap<u32, (MInode, u64)>,
}

impl InodeCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            tick: 0,
            map: HashMap::new(),
        }
    }

    fn touch(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    pub fn contains(&self, ino: u32) -> bool {
        self.map.contains_key(&ino)
    }

    pub fn insert(&mut self, inode: MInode) {
        let tick = self.touch();
        self.map.insert(inode.ino, (inode, tick));
    }

    pub fn remove(&mut self, ino: u32) -> Option<MInode> {
        self.map.remove(&ino).map(|(inode, _)| inode)
    }

    pub fn get(&mut self, ino: u32) -> Option<&MInode> {
        let tick = self.touch();
        self.map.get_mut(&ino).map(|(inode, used)| {
            *used = tick;
            &*inode
        })
    }

    pub fn get_mut(&mut self, ino: u32) -> Option<&mut MInode> {
        let tick = self.touch();
        self.map.get_mut(&ino).map(|(inode, used)| {
            *used = tick;
            inode
        })
    }

    /// Look without refreshing recency.
    pub fn peek(&self, ino: u32) -> Option<&MInode> {
        self.map.get(&ino).map(|(inode, _)| inode)
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    fn leaves(&self) -> usize {
        self.map.values().filter(|(inode, _)| !inode.is_dir()).count()
    }

    pub fn mark_all_clean(&mut self) {
        for (inode, _) in self.map.values_mut() {
            inode.dirty = false;
        }
    }

    /// Drop clean leaves, oldest first, until the leaf count is within
    /// capacity. Returns the evicted inode numbers.
    pub fn shrink(&mut self) -> Vec<u32> {
        let excess = self.leaves().saturating_sub(self.capacity);
        if excess == 0 {
            return Vec::new();
        }
        let mut victims: Vec<(u64, u32)> = self
            .map
            .values()
            .filter(|(inode, _)| !inode.is_dir() && !inode.dirty)
            .map(|(inode, used)| (*used, inode.ino))
            .collect();
        victims.sort_unstable();
        victims.truncate(excess);
        victims
            .into_iter()
            .map(|(_, ino)| {
                self.map.remove(&ino);
                ino
            })
            .collect()
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.tick = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use inode::FileKind;

    fn leaf(ino: u32, id: DentryId) -> MInode {
        let mut inode = MInode::new(ino, FileKind::File, id, [0; DATA_PER_FILE], 16);
        inode.dirty = false;
        inode
    }

    #[test]
    fn stale_dentry_id_does_not_resolve() {
        let mut table = DentryTable::new();
        let a = table.insert(Dentry::new("a", FileKind::File, 1, None));
        assert_eq!(table.remove(a).unwrap().name, "a");
        let b = table.insert(Dentry::new("b", FileKind::File, 2, None));
        assert!(table.get(a).is_none());
        assert_eq!(table.get(b).unwrap().name, "b");
        assert!(table.remove(a).is_none());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn shrink_evicts_least_recent_clean_leaves() {
        let mut table = DentryTable::new();
        let id = table.insert(Dentry::new("x", FileKind::File, 0, None));
        let mut cache = InodeCache::new(2);
        for ino in 1..=4 {
            cache.insert(leaf(ino, id));
        }
        cache.get(1);
        cache.get_mut(3).unwrap().dirty = true;

        let evicted = cache.shrink();
        assert_eq!(evicted, vec![2, 4]);
        assert!(cache.contains(1) && cache.contains(3));
    }

    #[test]
    fn directories_and_dirty_leaves_stay() {
        let mut table = DentryTable::new();
        let id = table.insert(Dentry::new("d", FileKind::Directory, 0, None));
        let mut cache = InodeCache::new(0);
        let mut dir = MInode::new(0, FileKind::Directory, id, [0; DATA_PER_FILE], 0);
        dir.dirty = false;
        cache.insert(dir);
        let mut dirty = leaf(1, id);
        dirty.dirty = true;
        cache.insert(dirty);

        assert!(cache.shrink().is_empty());
        assert_eq!(cache.len(), 2);
        cache.mark_all_clean();
        assert_eq!(cache.shrink(), vec![1]);
    }
}
