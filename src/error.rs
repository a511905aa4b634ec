//! Errors surfaced by the engine.
//!
//! Each variant maps to exactly one errno through [`FsError::errno`], which is
//! what the FUSE adaptor hands back to the kernel.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    /// The block device failed a read or write.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A fixed-size record could not be encoded or decoded.
    #[error("record codec error: {0}")]
    Codec(#[from] bincode::Error),

    /// A record decoded fine but its contents contradict the layout.
    #[error("corrupt record at offset {offset}: {detail}")]
    Corruption { offset: usize, detail: String },

    #[error("no such file or directory")]
    NotFound,

    #[error("file exists")]
    AlreadyExists,

    /// The node type cannot take this operation, e.g. a child under a regular file.
    #[error("operation not supported by this node")]
    Unsupported,

    /// A bitmap is exhausted or a directory outgrew its preallocated blocks.
    #[error("no space left on device")]
    NoSpace,

    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("not a directory")]
    NotDirectory,

    #[error("is a directory")]
    IsDirectory,

    #[error("directory not empty")]
    NotEmpty,

    #[error("file name too long")]
    NameTooLong,

    #[error("filesystem is not mounted")]
    NotMounted,
}

impl FsError {
    pub fn errno(&self) -> libc::c_int {
        match self {
            FsError::Io(_) => libc::EIO,
            FsError::Codec(_) => libc::EIO,
            FsError::Corruption { .. } => libc::EIO,
            FsError::NotFound => libc::ENOENT,
            FsError::AlreadyExists => libc::EEXIST,
            FsError::Unsupported => libc::ENXIO,
            FsError::NoSpace => libc::ENOSPC,
            FsError::InvalidArgument(_) => libc::EINVAL,
            FsError::NotDirectory => libc::ENOTDIR,
            FsError::IsDirectory => libc::EISDIR,
            FsError::NotEmpty => libc::ENOTEMPTY,
            FsError::NameTooLong => libc::ENAMETOOLONG,
            FsError::NotMounted => libc::ENODEV,
        }
    }
}

pub type Result<T> = std::result::Result<T, FsError>;
