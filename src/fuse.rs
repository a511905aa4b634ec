//! `fuser` front end. The kernel talks in inode numbers, the engine in
//! paths, so the adaptor remembers the path of every inode it has handed
//! out, together with the kernel's lookup count, until the kernel forgets
//! it. Kernel inode numbers are engine inode numbers plus one.

use super::*;
use fs::MyFs;
use inode::Attr;

use fuser::{
    FileAttr, FileType, Filesystem, KernelConfig, MountOption, ReplyAttr, ReplyCreate, ReplyData,
    ReplyDirectory, ReplyEmpty, ReplyEntry, ReplyStatfs, ReplyWrite, Request, TimeOrNow,
};
use libc::c_int;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::Path;
use std::time::{Duration, SystemTime};

const TTL: Duration = Duration::from_secs(1);

pub const FUSE_ROOT_ID: u64 = 1;

/// A path handed to the kernel and the number of lookups it holds on it.
struct Known {
    path: String,
    nlookup: u64,
}

pub struct MyFsFuse {
    fs: MyFs,
    paths: HashMap<u64, Known>,
}

pub fn to_fuse_ino(ino: u32) -> u64 {
    ino as u64 + 1
}

/// Join a directory path and an entry name.
pub fn join(dir: &str, name: &str) -> String {
    if dir == "/" {
        format!("/{name}")
    } else {
        format!("{dir}/{name}")
    }
}

impl MyFsFuse {
    pub fn new(fs: MyFs) -> Self {
        let mut paths = HashMap::new();
        paths.insert(
            FUSE_ROOT_ID,
            Known {
                path: "/".to_string(),
                nlookup: 0,
            },
        );
        Self { fs, paths }
    }

    fn path(&self, ino: u64) -> Result<String> {
        self.paths
            .get(&ino)
            .map(|known| known.path.clone())
            .ok_or(FsError::NotFound)
    }

    fn child_path(&self, parent: u64, name: &OsStr) -> Result<String> {
        let name = name
            .to_str()
            .ok_or(FsError::InvalidArgument("file name is not utf-8"))?;
        Ok(join(&self.path(parent)?, name))
    }

    fn stat(&mut self, path: &str) -> Result<FileAttr> {
        let attr: Attr = self.fs.getattr(path)?;
        Ok(FileAttr::from(&attr))
    }

    /// Stat `path` for an entry reply: the kernel now holds one more lookup
    /// on the inode. A reused inode number takes the new path.
    fn lookup_entry(&mut self, path: &str) -> Result<FileAttr> {
        let attr = self.stat(path)?;
        let known = self.paths.entry(attr.ino).or_insert(Known {
            path: String::new(),
            nlookup: 0,
        });
        known.path = path.to_string();
        known.nlookup += 1;
        Ok(attr)
    }

    /// Drop `nlookup` kernel references; the path goes with the last one.
    /// The root is never forgotten.
    fn forget_ino(&mut self, ino: u64, nlookup: u64) {
        if ino == FUSE_ROOT_ID {
            return;
        }
        if let Some(known) = self.paths.get_mut(&ino) {
            known.nlookup = known.nlookup.saturating_sub(nlookup);
            if known.nlookup == 0 {
                debug!("[forget] ino {ino}: {}", known.path);
                self.paths.remove(&ino);
            }
        }
    }

    /// Re-key remembered paths after a rename.
    fn move_tree(&mut self, from: &str, to: &str) {
        let prefix = format!("{from}/");
        for known in self.paths.values_mut() {
            if known.path == from {
                known.path = to.to_string();
            } else if let Some(rest) = known.path.strip_prefix(&prefix) {
                known.path = join(to, rest);
            }
        }
    }

    fn entry_reply(&mut self, op: &str, path: Result<String>, reply: ReplyEntry) {
        match path.and_then(|path| self.lookup_entry(&path)) {
            Ok(attr) => reply.entry(&TTL, &attr, 0),
            Err(e) => {
                debug!("[{op}] {e}");
                reply.error(e.errno());
            }
        }
    }

    fn empty_reply(op: &str, res: Result<()>, reply: ReplyEmpty) {
        match res {
            Ok(()) => reply.ok(),
            Err(e) => {
                warn!("[{op}] {e}");
                reply.error(e.errno());
            }
        }
    }
}

impl Filesystem for MyFsFuse {
    fn init(&mut self, _req: &Request<'_>, _config: &mut KernelConfig) -> std::result::Result<(), c_int> {
        info!("fuse session started");
        Ok(())
    }

    fn destroy(&mut self) {
        if let Err(e) = self.fs.unmount() {
            error!("unmount failed: {e}");
        }
    }

    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        let path = self.child_path(parent, name);
        self.entry_reply("lookup", path, reply);
    }

    fn forget(&mut self, _req: &Request<'_>, ino: u64, nlookup: u64) {
        self.forget_ino(ino, nlookup);
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        match self.path(ino).and_then(|path| self.stat(&path)) {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        _atime: Option<TimeOrNow>,
        _mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let res = self.path(ino).and_then(|path| {
            if let Some(size) = size {
                self.fs.truncate(&path, size as usize)?;
            }
            self.stat(&path)
        });
        match res {
            Ok(attr) => reply.attr(&TTL, &attr),
            Err(e) => {
                warn!("[setattr] ino {ino}: {e}");
                reply.error(e.errno());
            }
        }
    }

    fn readlink(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyData) {
        match self.path(ino).and_then(|path| self.fs.readlink(&path)) {
            Ok(target) => reply.data(target.as_bytes()),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        if mode & libc::S_IFMT != libc::S_IFREG {
            reply.error(libc::ENOSYS);
            return;
        }
        let path = self
            .child_path(parent, name)
            .and_then(|path| self.fs.mknod(&path).map(|_| path));
        self.entry_reply("mknod", path, reply);
    }

    fn mkdir(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        reply: ReplyEntry,
    ) {
        let path = self
            .child_path(parent, name)
            .and_then(|path| self.fs.mkdir(&path).map(|_| path));
        self.entry_reply("mkdir", path, reply);
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let res = self
            .child_path(parent, name)
            .and_then(|path| self.fs.unlink(&path));
        Self::empty_reply("unlink", res, reply);
    }

    fn rmdir(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        let res = self
            .child_path(parent, name)
            .and_then(|path| self.fs.rmdir(&path));
        Self::empty_reply("rmdir", res, reply);
    }

    fn symlink(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        link_name: &OsStr,
        target: &Path,
        reply: ReplyEntry,
    ) {
        let path = self.child_path(parent, link_name).and_then(|path| {
            let target = target
                .to_str()
                .ok_or(FsError::InvalidArgument("link target is not utf-8"))?;
            self.fs.symlink(&path, target)?;
            Ok(path)
        });
        self.entry_reply("symlink", path, reply);
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        let res = self.child_path(parent, name).and_then(|from| {
            let to = self.child_path(newparent, newname)?;
            self.fs.rename(&from, &to)?;
            self.move_tree(&from, &to);
            Ok(())
        });
        Self::empty_reply("rename", res, reply);
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let res = self
            .path(ino)
            .and_then(|path| self.fs.read(&path, offset.max(0) as usize, size as usize));
        match res {
            Ok(buf) => reply.data(&buf),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let res = self
            .path(ino)
            .and_then(|path| self.fs.write(&path, offset.max(0) as usize, data));
        match res {
            Ok(written) => reply.written(written as u32),
            Err(e) => {
                warn!("[write] ino {ino}: {e}");
                reply.error(e.errno());
            }
        }
    }

    fn fsync(&mut self, _req: &Request<'_>, _ino: u64, _fh: u64, _datasync: bool, reply: ReplyEmpty) {
        Self::empty_reply("fsync", self.fs.sync(), reply);
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let res = self
            .path(ino)
            .and_then(|path| self.fs.readdir(&path));
        let children = match res {
            Ok(found) => found,
            Err(e) => {
                reply.error(e.errno());
                return;
            }
        };

        let mut entries = vec![
            (ino, FileType::Directory, ".".to_string()),
            (ino, FileType::Directory, "..".to_string()),
        ];
        for child in children {
            entries.push((to_fuse_ino(child.ino), child.kind.into(), child.name));
        }
        for (i, (ino, kind, name)) in entries.into_iter().enumerate().skip(offset.max(0) as usize) {
            if reply.add(ino, (i + 1) as i64, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn statfs(&mut self, _req: &Request<'_>, _ino: u64, reply: ReplyStatfs) {
        match self.fs.statfs() {
            Ok(st) => reply.statfs(
                st.blocks,
                st.bfree,
                st.bfree,
                st.files,
                st.ffree,
                st.bsize,
                st.namelen,
                st.bsize,
            ),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, _mask: i32, reply: ReplyEmpty) {
        let res = self.path(ino).and_then(|path| self.fs.access(&path));
        Self::empty_reply("access", res, reply);
    }

    fn create(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        _mode: u32,
        _umask: u32,
        _flags: i32,
        reply: ReplyCreate,
    ) {
        let res = self.child_path(parent, name).and_then(|path| {
            self.fs.mknod(&path)?;
            self.lookup_entry(&path)
        });
        match res {
            Ok(attr) => reply.created(&TTL, &attr, 0, 0, 0),
            Err(e) => {
                warn!("[create] {e}");
                reply.error(e.errno());
            }
        }
    }
}

/// Serve `fs` at `mountpoint` until the kernel session ends.
pub fn serve<P: AsRef<Path>>(fs: MyFs, mountpoint: P, auto_unmount: bool) -> Result<()> {
    let mut options = vec![MountOption::FSName("myfs".to_string())];
    if auto_unmount {
        options.push(MountOption::AutoUnmount);
    }
    info!("serving on {}", mountpoint.as_ref().display());
    fuser::mount2(MyFsFuse::new(fs), mountpoint, &options)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use block_device::MemDisk;
    use std::sync::Arc;

    fn adaptor() -> MyFsFuse {
        let disk = MemDisk::new(512 * 1024, 512);
        MyFsFuse::new(MyFs::mount(Arc::new(disk), &MountOptions::default()).unwrap())
    }

    #[test]
    fn join_paths() {
        assert_eq!(join("/", "a"), "/a");
        assert_eq!(join("/a", "b"), "/a/b");
    }

    #[test]
    fn lookup_remembers_shifted_ino() {
        let mut fuse = adaptor();
        fuse.fs.mkdir("/d").unwrap();
        let attr = fuse.lookup_entry("/d").unwrap();
        assert_eq!(attr.ino, 2);
        assert_eq!(fuse.path(2).unwrap(), "/d");
        assert_eq!(fuse.stat("/").unwrap().ino, FUSE_ROOT_ID);
    }

    #[test]
    fn stat_and_readdir_paths_are_not_retained() {
        let mut fuse = adaptor();
        for i in 0..10 {
            fuse.fs.mknod(&format!("/f{i}")).unwrap();
            fuse.stat(&format!("/f{i}")).unwrap();
        }
        assert_eq!(fuse.paths.len(), 1);
    }

    #[test]
    fn forget_drops_path_with_last_lookup() {
        let mut fuse = adaptor();
        fuse.fs.mkdir("/d").unwrap();
        fuse.lookup_entry("/d").unwrap();
        fuse.lookup_entry("/d").unwrap();
        fuse.forget_ino(2, 1);
        assert_eq!(fuse.path(2).unwrap(), "/d");
        fuse.forget_ino(2, 1);
        assert!(matches!(fuse.path(2), Err(FsError::NotFound)));
        assert_eq!(fuse.paths.len(), 1);

        fuse.forget_ino(2, 1);
        fuse.forget_ino(FUSE_ROOT_ID, 5);
        assert_eq!(fuse.path(FUSE_ROOT_ID).unwrap(), "/");
    }

    #[test]
    fn reused_ino_survives_a_stale_forget() {
        let mut fuse = adaptor();
        fuse.fs.mknod("/x").unwrap();
        assert_eq!(fuse.lookup_entry("/x").unwrap().ino, 2);
        fuse.fs.unlink("/x").unwrap();
        fuse.fs.mknod("/y").unwrap();
        assert_eq!(fuse.lookup_entry("/y").unwrap().ino, 2);
        // the kernel drops its reference to the old /x
        fuse.forget_ino(2, 1);
        assert_eq!(fuse.path(2).unwrap(), "/y");
    }

    #[test]
    fn rename_rekeys_subtree() {
        let mut fuse = adaptor();
        fuse.fs.mkdir("/a").unwrap();
        fuse.fs.mknod("/a/f").unwrap();
        let a = fuse.lookup_entry("/a").unwrap().ino;
        let f = fuse.lookup_entry("/a/f").unwrap().ino;
        fuse.fs.rename("/a", "/b").unwrap();
        fuse.move_tree("/a", "/b");
        assert_eq!(fuse.path(a).unwrap(), "/b");
        assert_eq!(fuse.path(f).unwrap(), "/b/f");
        assert_eq!(fuse.path(FUSE_ROOT_ID).unwrap(), "/");
    }
}
