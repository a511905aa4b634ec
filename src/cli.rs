use clap::Parser;
use myfs_fuse::{DEFAULT_CACHE_CAPACITY, DEFAULT_IO_SZ};
use std::path::PathBuf;

/// Mount a myfs disk image through FUSE.
#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// disk image backing the file system
    #[arg(short, long)]
    pub device: PathBuf,
    /// create a zero-filled image of this many bytes if `device` is missing
    #[arg(short, long)]
    pub size: Option<usize>,
    /// device io unit in bytes; a block is two of them
    #[arg(long, default_value_t = DEFAULT_IO_SZ, value_parser = parse_io_size)]
    pub io_size: usize,
    /// resident regular-file inodes kept before eviction
    #[arg(long, default_value_t = DEFAULT_CACHE_CAPACITY)]
    pub cache_capacity: usize,
    /// let the kernel unmount when the process exits
    #[arg(long)]
    pub auto_unmount: bool,
    /// where to mount
    pub mountpoint: PathBuf,
}

fn parse_io_size(s: &str) -> Result<usize, String> {
    match s.parse::<usize>() {
        Ok(0) => Err("io unit must be at least one byte".to_string()),
        Ok(n) => Ok(n),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["myfs-fuse", "-d", "disk.img", "/mnt/myfs"]);
        assert_eq!(
            cli,
            Cli {
                device: PathBuf::from("disk.img"),
                size: None,
                io_size: DEFAULT_IO_SZ,
                cache_capacity: DEFAULT_CACHE_CAPACITY,
                auto_unmount: false,
                mountpoint: PathBuf::from("/mnt/myfs"),
            }
        );
    }

    #[test]
    fn long_form() {
        let cli = Cli::parse_from([
            "myfs-fuse",
            "--device",
            "disk.img",
            "--size",
            "4194304",
            "--io-size",
            "1024",
            "--cache-capacity",
            "8",
            "--auto-unmount",
            "mnt",
        ]);
        assert_eq!(cli.size, Some(4 * 1024 * 1024));
        assert_eq!(cli.io_size, 1024);
        assert_eq!(cli.cache_capacity, 8);
        assert!(cli.auto_unmount);
    }

    #[test]
    fn zero_io_size_is_refused() {
        let res = Cli::try_parse_from(["myfs-fuse", "-d", "disk.img", "--io-size", "0", "mnt"]);
        assert!(res.is_err());
    }

    #[test]
    fn mountpoint_is_required() {
        assert!(Cli::try_parse_from(["myfs-fuse", "-d", "disk.img"]).is_err());
    }
}
