mod cli;

use std::sync::Arc;

use clap::Parser;
use log::{error, info};
use myfs_fuse::{fuse, FileDisk, MountOptions, MyFs};

pub use self::cli::Cli;

fn run(cli: Cli) -> myfs_fuse::Result<()> {
    let disk = match cli.size {
        Some(size) if !cli.device.exists() => {
            info!("creating {} ({size} bytes)", cli.device.display());
            FileDisk::create(&cli.device, size, cli.io_size)?
        }
        _ => FileDisk::open(&cli.device, cli.io_size)?,
    };
    let options = MountOptions {
        cache_capacity: cli.cache_capacity,
    };
    let fs = MyFs::mount(Arc::new(disk), &options)?;
    fuse::serve(fs, &cli.mountpoint, cli.auto_unmount)
}

fn main() {
    env_logger::init();

    if let Err(e) = run(Cli::parse()) {
        error!("{e}");
        std::process::exit(1);
    }
}
