//! The mounted session: super block mirror, both bitmaps and the in-memory
//! tree, built by `mount` and torn down by `unmount`.

use super::*;
use bitmap::BitMap;
use block_device::{BlockDevice, FileDisk};
use disk::{decode, encode, from_fixed, to_fixed, DentryD, InodeD, SuperBlockD};
use driver::Driver;
use inode::{Attr, Dentry, FileKind, MInode};
use layout::Layout;
use trans::Trans;
use vfs::{DentryId, DentryTable, InodeCache};

use log::{debug, info, warn};
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountState {
    Unmounted,
    Mounting,
    Mounted,
    Unmounting,
}

/// Outcome of walking a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lookup {
    /// the target if found, otherwise the deepest entry the walk reached
    pub dentry: DentryId,
    pub is_find: bool,
    pub is_root: bool,
    /// components consumed to reach `dentry`
    pub depth: usize,
    /// components in the path
    pub total: usize,
}

pub struct MyFs {
    driver: Driver,
    layout: Layout,
    sz_usage: usize,
    map_inode: BitMap,
    map_data: BitMap,
    dentries: DentryTable,
    inodes: InodeCache,
    root: DentryId,
    state: MountState,
}

/// Split a path into its non-empty components.
pub fn components(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// last component of `path`
pub fn get_fname(path: &str) -> Option<&str> {
    components(path).pop()
}

pub(crate) fn check_name(fname: &str) -> Result<()> {
    if fname == "." || fname == ".." {
        return Err(FsError::InvalidArgument("reserved file name"));
    }
    if fname.len() > MAX_FILE_NAME {
        return Err(FsError::NameTooLong);
    }
    Ok(())
}

impl MyFs {
    /// Open a file-backed device and mount it.
    pub fn open<P: AsRef<Path>>(device: P, sz_io: usize, options: &MountOptions) -> Result<Self> {
        let disk = FileDisk::open(device, sz_io)?;
        Self::mount(Arc::new(disk), options)
    }

    /// Mount `blk_dev`, formatting it first if it carries no valid super block.
    pub fn mount(blk_dev: Arc<dyn BlockDevice>, options: &MountOptions) -> Result<Self> {
        let driver = Driver::new(blk_dev);
        let sz_disk = driver.sz_disk();
        let sz_io = driver.sz_io();
        info!("mounting: sz_disk: {sz_disk}, sz_io: {sz_io}");
        if sz_io == 0 || sz_disk < 2 * sz_io {
            return Err(FsError::InvalidArgument("device too small"));
        }

        let mut raw = vec![0u8; SuperBlockD::SIZE];
        driver.read(SUPER_OFS, &mut raw)?;
        let super_d: SuperBlockD = decode(&raw)?;
        let is_init = super_d.magic_num != MAGIC;

        let (layout, sz_usage, map_inode, map_data) = if is_init {
            info!("no valid super block, formatting a fresh layout");
            let layout = Layout::plan(sz_disk, sz_io)?;
            let map_inode = BitMap::new(layout.map_inode_blks, layout.sz_blk, layout.max_ino);
            let map_data = BitMap::new(layout.map_data_blks, layout.sz_blk, layout.max_data());
            (layout, 0, map_inode, map_data)
        } else {
            let layout = Layout::from_super(&super_d, sz_disk, sz_io)?;
            let map_inode = Self::read_map(
                &driver,
                layout.map_inode_offset,
                layout.blks_sz(layout.map_inode_blks),
                layout.max_ino,
            )?;
            let map_data = Self::read_map(
                &driver,
                layout.map_data_offset,
                layout.blks_sz(layout.map_data_blks),
                layout.max_data(),
            )?;
            (layout, super_d.sz_usage.max(0) as usize, map_inode, map_data)
        };
        debug!("layout: {layout:?}");

        let mut dentries = DentryTable::new();
        let root = dentries.insert(Dentry::new("/", FileKind::Directory, ROOT_INO, None));
        let mut fs = MyFs {
            driver,
            layout,
            sz_usage,
            map_inode,
            map_data,
            dentries,
            inodes: InodeCache::new(options.cache_capacity),
            root,
            state: MountState::Mounting,
        };

        if is_init {
            let (ino, block_pointer) = fs.alloc_inode()?;
            if ino != ROOT_INO {
                return Err(FsError::Corruption {
                    offset: fs.layout.map_inode_offset,
                    detail: format!("fresh inode map handed out {ino} for the root"),
                });
            }
            fs.inodes.insert(MInode::new(
                ino,
                FileKind::Directory,
                root,
                block_pointer,
                fs.layout.file_capacity(),
            ));
            fs.update_usage();
            let mut trans = Trans::begin();
            fs.sync_inode(ROOT_INO, &mut trans)?;
            fs.log_super(&mut trans)?;
            trans.commit(&fs.driver)?;
            fs.inodes.remove(ROOT_INO);
        } else if !fs.map_inode.test(ROOT_INO as usize) {
            return Err(FsError::Corruption {
                offset: fs.layout.map_inode_offset,
                detail: "root inode is not allocated".to_string(),
            });
        }

        fs.read_inode(root, ROOT_INO)?;
        fs.state = MountState::Mounted;
        info!(
            "mounted: max_ino: {}, data blocks: {}, inodes used: {}",
            fs.layout.max_ino,
            fs.layout.max_data(),
            fs.map_inode.count_used()
        );
        Ok(fs)
    }

    fn read_map(driver: &Driver, offset: usize, len: usize, capacity: usize) -> Result<BitMap> {
        let mut bytes = vec![0u8; len];
        driver.read(offset, &mut bytes)?;
        Ok(BitMap::from_bytes(bytes, capacity))
    }

    /// Persist the whole resident tree, super block and bitmaps, then drop
    /// the in-memory state. Unmounting an unmounted session is a no-op.
    pub fn unmount(&mut self) -> Result<()> {
        if self.state != MountState::Mounted {
            return Ok(());
        }
        self.state = MountState::Unmounting;
        if let Err(e) = self.flush() {
            self.state = MountState::Mounted;
            return Err(e);
        }
        self.map_inode = BitMap::from_bytes(Vec::new(), 0);
        self.map_data = BitMap::from_bytes(Vec::new(), 0);
        self.inodes.clear();
        self.dentries.clear();
        self.state = MountState::Unmounted;
        info!("unmounted");
        Ok(())
    }

    /// Persist everything without unmounting.
    pub fn sync(&mut self) -> Result<()> {
        self.ensure_mounted()?;
        self.flush()?;
        self.shrink_cache();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let mut trans = Trans::begin();
        self.sync_inode(ROOT_INO, &mut trans)?;
        self.log_super(&mut trans)?;
        trans.commit(&self.driver)?;
        self.inodes.mark_all_clean();
        Ok(())
    }

    fn log_super(&self, trans: &mut Trans) -> Result<()> {
        let super_d = self.layout.to_super(self.sz_usage)?;
        trans.log_write(SUPER_OFS, encode(&super_d)?);
        trans.log_write(self.layout.map_inode_offset, self.map_inode.as_bytes().to_vec());
        trans.log_write(self.layout.map_data_offset, self.map_data.as_bytes().to_vec());
        Ok(())
    }

    pub(crate) fn ensure_mounted(&self) -> Result<()> {
        match self.state {
            MountState::Mounted => Ok(()),
            _ => Err(FsError::NotMounted),
        }
    }

    pub fn state(&self) -> MountState {
        self.state
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// bytes held by allocated inodes and data blocks
    pub fn usage(&self) -> usize {
        self.sz_usage
    }

    pub fn root(&self) -> DentryId {
        self.root
    }

    pub fn inode_bitmap(&self) -> &[u8] {
        self.map_inode.as_bytes()
    }

    pub fn data_bitmap(&self) -> &[u8] {
        self.map_data.as_bytes()
    }

    pub fn entry(&self, id: DentryId) -> Option<&Dentry> {
        self.dentries.get(id)
    }

    pub(crate) fn dentry(&self, id: DentryId) -> Result<&Dentry> {
        self.dentries.get(id).ok_or(FsError::NotFound)
    }

    fn update_usage(&mut self) {
        self.sz_usage = self
            .layout
            .blks_sz(self.map_inode.count_used() + self.map_data.count_used());
    }

    pub(crate) fn shrink_cache(&mut self) {
        let evicted = self.inodes.shrink();
        if !evicted.is_empty() {
            debug!("evicted inodes {evicted:?}");
        }
    }

    /// Claim one inode bit and `DATA_PER_FILE` data bits, or none at all.
    fn alloc_inode(&mut self) -> Result<(u32, [u32; DATA_PER_FILE])> {
        let ino = self.map_inode.alloc().ok_or(FsError::NoSpace)?;
        let mut block_pointer = [0u32; DATA_PER_FILE];
        for i in 0..DATA_PER_FILE {
            match self.map_data.alloc() {
                Some(bno) => block_pointer[i] = bno as u32,
                None => {
                    for bno in &block_pointer[..i] {
                        self.map_data.dealloc(*bno as usize);
                    }
                    self.map_inode.dealloc(ino);
                    return Err(FsError::NoSpace);
                }
            }
        }
        Ok((ino as u32, block_pointer))
    }

    /// Make sure the inode named by `id` is resident; returns its number.
    pub(crate) fn ensure_inode(&mut self, id: DentryId) -> Result<u32> {
        let ino = self.dentry(id)?.ino;
        if !self.inodes.contains(ino) {
            self.read_inode(id, ino)?;
        }
        Ok(ino)
    }

    pub(crate) fn inode(&mut self, id: DentryId) -> Result<&MInode> {
        let ino = self.ensure_inode(id)?;
        self.inodes.get(ino).ok_or(FsError::NotFound)
    }

    pub(crate) fn inode_mut(&mut self, id: DentryId) -> Result<&mut MInode> {
        let ino = self.ensure_inode(id)?;
        self.inodes.get_mut(ino).ok_or(FsError::NotFound)
    }

    /// Deserialize inode `ino` and attach it to `id`. Directory children come
    /// back as dentries whose inodes are read on first descent.
    fn read_inode(&mut self, id: DentryId, ino: u32) -> Result<()> {
        let offset = self.layout.ino_ofs(ino);
        if ino as usize >= self.layout.max_ino {
            return Err(FsError::Corruption {
                offset,
                detail: format!("ino {ino} beyond max_ino {}", self.layout.max_ino),
            });
        }
        let mut raw = vec![0u8; InodeD::SIZE];
        self.driver.read(offset, &mut raw)?;
        let d_inode: InodeD = decode(&raw)?;

        let kind = self.dentry(id)?.kind;
        if d_inode.ino != ino as i32 || d_inode.ftype != kind {
            return Err(FsError::Corruption {
                offset,
                detail: format!(
                    "expected {kind:?} inode {ino}, found {:?} inode {}",
                    d_inode.ftype, d_inode.ino
                ),
            });
        }
        if d_inode
            .block_pointer
            .iter()
            .any(|bno| *bno < 0 || *bno as usize >= self.map_data.capacity())
        {
            return Err(FsError::Corruption {
                offset,
                detail: format!("block pointers {:?} out of range", d_inode.block_pointer),
            });
        }

        let max_size = match kind {
            FileKind::File => self.layout.file_capacity(),
            FileKind::Symlink => MAX_FILE_NAME,
            FileKind::Directory => usize::MAX,
        };
        if d_inode.size < 0 || d_inode.size as usize > max_size {
            return Err(FsError::Corruption {
                offset,
                detail: format!("size {} out of range for {kind:?}", d_inode.size),
            });
        }

        let mut inode = MInode::from_disk(&d_inode, id).ok_or_else(|| FsError::Corruption {
            offset,
            detail: "symlink target is not utf-8".to_string(),
        })?;
        match inode.kind {
            FileKind::Directory => {
                let dir_cnt = d_inode.dir_cnt;
                if dir_cnt < 0 || dir_cnt as usize > self.layout.dir_capacity() {
                    return Err(FsError::Corruption {
                        offset,
                        detail: format!("dir_cnt {dir_cnt} out of range"),
                    });
                }
                // every name is checked before any child enters the arena
                let mut subs = Vec::with_capacity(dir_cnt as usize);
                for (sub_ofs, sub) in self.read_dentries(&inode.block_pointer, dir_cnt as usize)? {
                    if sub.valid == 0 {
                        continue;
                    }
                    let fname = from_fixed(&sub.fname).ok_or_else(|| FsError::Corruption {
                        offset: sub_ofs,
                        detail: format!("name of entry for inode {} is not utf-8", sub.ino),
                    })?;
                    subs.push((fname, sub));
                }
                for (fname, sub) in subs {
                    let sub_dentry = self.dentries.insert(Dentry::new(
                        &fname,
                        sub.ftype,
                        sub.ino as u32,
                        Some(id),
                    ));
                    inode.dentrys.push(sub_dentry);
                }
            }
            FileKind::File => {
                let sz_blk = self.layout.sz_blk;
                inode.data = vec![0u8; self.layout.file_capacity()];
                for (chunk, bno) in inode.data.chunks_mut(sz_blk).zip(inode.block_pointer) {
                    self.driver.read(self.layout.data_ofs(bno), chunk)?;
                }
            }
            FileKind::Symlink => {}
        }
        debug!(
            "read inode {ino}: {:?}, size {}, {} children",
            inode.kind,
            inode.size,
            inode.dir_cnt()
        );
        self.inodes.insert(inode);
        Ok(())
    }

    /// Unpack `dir_cnt` records from a directory's blocks, block by block,
    /// each with its byte offset.
    fn read_dentries(
        &self,
        block_pointer: &[u32; DATA_PER_FILE],
        dir_cnt: usize,
    ) -> Result<Vec<(usize, DentryD)>> {
        let per_blk = dentries_per_block(self.layout.sz_blk);
        let mut records = Vec::with_capacity(dir_cnt);
        let mut block = vec![0u8; self.layout.sz_blk];
        for bno in block_pointer {
            if records.len() == dir_cnt {
                break;
            }
            let blk_ofs = self.layout.data_ofs(*bno);
            self.driver.read(blk_ofs, &mut block)?;
            let take = per_blk.min(dir_cnt - records.len());
            for (i, raw) in block.chunks(DentryD::SIZE).take(take).enumerate() {
                records.push((blk_ofs + i * DentryD::SIZE, decode::<DentryD>(raw)?));
            }
        }
        Ok(records)
    }

    /// Serialize inode `ino` and, for a directory, its entries and every
    /// resident child, depth first, into `trans`.
    fn sync_inode(&self, ino: u32, trans: &mut Trans) -> Result<()> {
        let inode = self.inodes.peek(ino).ok_or(FsError::NotFound)?;
        trans.log_write(self.layout.ino_ofs(ino), encode(&inode.to_disk()?)?);

        match inode.kind {
            FileKind::Directory => {
                if inode.dir_cnt() > self.layout.dir_capacity() {
                    warn!(
                        "dir {:?} (inode {ino}): {} entries exceed {} slots",
                        self.dentry(inode.dentry).map(|d| d.name.as_str()).unwrap_or("?"),
                        inode.dir_cnt(),
                        self.layout.dir_capacity()
                    );
                    return Err(FsError::NoSpace);
                }
                let per_blk = dentries_per_block(self.layout.sz_blk);
                for (i, sub) in inode.dentrys.iter().enumerate() {
                    let dentry = self.dentry(*sub)?;
                    let dentry_d = DentryD {
                        fname: to_fixed(&dentry.name)?,
                        ftype: dentry.kind,
                        ino: dentry.ino as i32,
                        valid: 1,
                    };
                    let offset = self.layout.data_ofs(inode.block_pointer[i / per_blk])
                        + (i % per_blk) * DentryD::SIZE;
                    trans.log_write(offset, encode(&dentry_d)?);

                    if self.inodes.contains(dentry.ino) {
                        self.sync_inode(dentry.ino, trans)?;
                    }
                }
            }
            FileKind::File => {
                for (chunk, bno) in inode.data.chunks(self.layout.sz_blk).zip(inode.block_pointer) {
                    trans.log_write(self.layout.data_ofs(bno), chunk.to_vec());
                }
            }
            FileKind::Symlink => {}
        }
        Ok(())
    }

    /// Walk `path` from the root, reading inodes on the way.
    pub fn lookup(&mut self, path: &str) -> Result<Lookup> {
        self.ensure_mounted()?;
        let fnames = components(path);
        let total = fnames.len();
        if total == 0 {
            return Ok(Lookup {
                dentry: self.root,
                is_find: true,
                is_root: true,
                depth: 0,
                total,
            });
        }

        let mut cursor = self.root;
        for (lvl, fname) in fnames.iter().enumerate() {
            let ino = self.ensure_inode(cursor)?;
            let inode = self.inodes.peek(ino).ok_or(FsError::NotFound)?;
            if !inode.is_dir() {
                debug!("[lookup] {path}: component {lvl} is not a dir");
                return Ok(Lookup {
                    dentry: cursor,
                    is_find: false,
                    is_root: false,
                    depth: lvl,
                    total,
                });
            }
            let hit = inode.dentrys.iter().copied().find(|sub| {
                self.dentries
                    .get(*sub)
                    .is_some_and(|dentry| dentry.name == *fname)
            });
            match hit {
                Some(sub) => cursor = sub,
                None => {
                    debug!("[lookup] {path}: not found {fname}");
                    return Ok(Lookup {
                        dentry: cursor,
                        is_find: false,
                        is_root: false,
                        depth: lvl,
                        total,
                    });
                }
            }
        }

        self.ensure_inode(cursor)?;
        Ok(Lookup {
            dentry: cursor,
            is_find: true,
            is_root: false,
            depth: total,
            total,
        })
    }

    /// Resolve `path` to an existing entry.
    pub(crate) fn find(&mut self, path: &str) -> Result<Lookup> {
        let found = self.lookup(path)?;
        if !found.is_find {
            return Err(FsError::NotFound);
        }
        Ok(found)
    }

    /// Resolve the directory a new entry at `path` would go into.
    pub(crate) fn find_parent(&mut self, path: &str) -> Result<(DentryId, String)> {
        let found = self.lookup(path)?;
        if found.is_find {
            return Err(FsError::AlreadyExists);
        }
        if !self.inode(found.dentry)?.is_dir() {
            return Err(FsError::Unsupported);
        }
        if found.depth + 1 != found.total {
            return Err(FsError::NotFound);
        }
        let fname = get_fname(path).ok_or(FsError::InvalidArgument("empty path"))?;
        check_name(fname)?;
        Ok((found.dentry, fname.to_string()))
    }

    /// Create a `kind` entry at `path` with a fresh inode and its data blocks.
    pub fn create(&mut self, path: &str, kind: FileKind) -> Result<DentryId> {
        self.ensure_mounted()?;
        let (parent, fname) = match self.find_parent(path) {
            Ok(found) => found,
            Err(e) => {
                warn!("[create] {path}: {e}");
                return Err(e);
            }
        };
        if self.inode(parent)?.dir_cnt() >= self.layout.dir_capacity() {
            warn!("[create] {path}: parent directory is full");
            return Err(FsError::NoSpace);
        }

        let (ino, block_pointer) = self.alloc_inode()?;
        let dentry = self
            .dentries
            .insert(Dentry::new(&fname, kind, ino, Some(parent)));
        self.inodes.insert(MInode::new(
            ino,
            kind,
            dentry,
            block_pointer,
            self.layout.file_capacity(),
        ));
        self.inode_mut(parent)?.alloc_dentry(dentry);
        self.update_usage();
        debug!("[create] {path}: {kind:?} inode {ino}, blocks {block_pointer:?}");
        self.shrink_cache();
        Ok(dentry)
    }

    pub fn mkdir(&mut self, path: &str) -> Result<DentryId> {
        self.create(path, FileKind::Directory)
    }

    pub fn mknod(&mut self, path: &str) -> Result<DentryId> {
        self.create(path, FileKind::File)
    }

    /// Reclaim the inode behind `id`, children first, then detach `id` from
    /// its parent. Each inode clears only its own bits.
    fn drop_inode(&mut self, id: DentryId) -> Result<()> {
        if id == self.root {
            return Err(FsError::InvalidArgument("cannot drop the root inode"));
        }
        let ino = self.ensure_inode(id)?;
        let children = self.inodes.peek(ino).map(|inode| inode.dentrys.clone());
        for sub in children.unwrap_or_default() {
            self.drop_inode(sub)?;
        }

        let inode = self.inodes.remove(ino).ok_or(FsError::NotFound)?;
        self.map_inode.clear(ino as usize);
        for bno in inode.block_pointer {
            self.map_data.clear(bno as usize);
        }
        debug!("dropped inode {ino} ({:?})", self.dentry(inode.dentry)?.name);
        if let Some(parent) = self.dentry(id)?.parent {
            let parent_ino = self.dentry(parent)?.ino;
            if let Some(parent_inode) = self.inodes.get_mut(parent_ino) {
                parent_inode.drop_dentry(id);
            }
        }
        self.dentries.remove(id);
        Ok(())
    }

    /// Delete `path` and everything below it.
    pub fn remove(&mut self, path: &str) -> Result<()> {
        let found = self.find(path)?;
        if found.is_root {
            return Err(FsError::InvalidArgument("cannot remove the root"));
        }
        self.drop_inode(found.dentry)?;
        self.update_usage();
        debug!("[remove] {path}");
        Ok(())
    }

    pub fn unlink(&mut self, path: &str) -> Result<()> {
        let found = self.find(path)?;
        if self.inode(found.dentry)?.is_dir() {
            return Err(FsError::IsDirectory);
        }
        self.remove(path)
    }

    pub fn rmdir(&mut self, path: &str) -> Result<()> {
        let found = self.find(path)?;
        if found.is_root {
            return Err(FsError::InvalidArgument("cannot remove the root"));
        }
        let inode = self.inode(found.dentry)?;
        if !inode.is_dir() {
            return Err(FsError::NotDirectory);
        }
        if inode.dir_cnt() > 0 {
            return Err(FsError::NotEmpty);
        }
        self.remove(path)
    }

    /// Move the entry at `from` to `to`. `to` must not exist yet.
    pub fn rename(&mut self, from: &str, to: &str) -> Result<()> {
        let src = self.find(from)?;
        if src.is_root {
            return Err(FsError::InvalidArgument("cannot rename the root"));
        }
        let (new_parent, fname) = self.find_parent(to)?;
        let mut cursor = Some(new_parent);
        while let Some(id) = cursor {
            if id == src.dentry {
                return Err(FsError::InvalidArgument("cannot move a directory below itself"));
            }
            cursor = self.dentry(id)?.parent;
        }

        let old_parent = self.dentry(src.dentry)?.parent.ok_or(FsError::NotFound)?;
        if old_parent != new_parent
            && self.inode(new_parent)?.dir_cnt() >= self.layout.dir_capacity()
        {
            return Err(FsError::NoSpace);
        }
        self.inode_mut(old_parent)?.drop_dentry(src.dentry);
        self.inode_mut(new_parent)?.alloc_dentry(src.dentry);
        if let Some(dentry) = self.dentries.get_mut(src.dentry) {
            dentry.name = fname;
            dentry.parent = Some(new_parent);
        }
        debug!("[rename] {from} -> {to}");
        Ok(())
    }

    pub fn getattr(&mut self, path: &str) -> Result<Attr> {
        let found = self.find(path)?;
        let sz_blk = self.layout.sz_blk;
        let inode = self.inode(found.dentry)?;
        let size = match inode.kind {
            FileKind::Directory => inode.dir_cnt() * DentryD::SIZE,
            _ => inode.size,
        };
        let mut attr = Attr {
            ino: inode.ino,
            kind: inode.kind,
            size: size as u64,
            dir_cnt: inode.dir_cnt(),
            nlink: if inode.is_dir() { 2 } else { 1 },
            blocks: (round_up(size, sz_blk) / sz_blk) as u64,
            blksize: sz_blk as u32,
        };
        if found.is_root {
            attr.size = self.sz_usage as u64;
            attr.blocks = (self.layout.sz_disk / sz_blk) as u64;
        }
        self.shrink_cache();
        Ok(attr)
    }

    /// The `index`-th child of the directory at `path`, newest first.
    pub fn list_children(&mut self, path: &str, index: usize) -> Result<Option<Dentry>> {
        let found = self.find(path)?;
        let inode = self.inode(found.dentry)?;
        if !inode.is_dir() {
            return Err(FsError::NotDirectory);
        }
        let sub = inode.dentrys.get(index).copied();
        Ok(sub.and_then(|sub| self.dentries.get(sub).cloned()))
    }

    /// Every child of the directory at `path`, newest first.
    pub fn readdir(&mut self, path: &str) -> Result<Vec<Dentry>> {
        let found = self.find(path)?;
        let inode = self.inode(found.dentry)?;
        if !inode.is_dir() {
            return Err(FsError::NotDirectory);
        }
        let subs = inode.dentrys.clone();
        Ok(subs
            .into_iter()
            .filter_map(|sub| self.dentries.get(sub).cloned())
            .collect())
    }

    /// Inode number and data blocks owned by `path`.
    pub fn block_map(&mut self, path: &str) -> Result<(u32, [u32; DATA_PER_FILE])> {
        let found = self.find(path)?;
        let inode = self.inode(found.dentry)?;
        Ok((inode.ino, inode.block_pointer))
    }

    #[cfg(test)]
    pub(crate) fn dir_capacity(&self) -> usize {
        self.layout.dir_capacity()
    }

    pub(crate) fn map_free(&self) -> (usize, usize) {
        (self.map_inode.count_free(), self.map_data.count_free())
    }

    #[cfg(test)]
    pub(crate) fn dentries_mut(&mut self) -> &mut DentryTable {
        &mut self.dentries
    }
}
