use std::fs::{File, OpenOptions};
use std::io;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg, OFlag};

use crate::core::{GenericError, GenericResult};

pub fn acquire_lock<P: AsRef<Path>>(path: P) -> GenericResult<Flock<File>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| format!(
        "Unable to open {:?}: {}", path, e))?;

    Flock::lock(file, FlockArg::LockExclusiveNonblock).map_err(|(_file, err)| -> GenericError {
        if err == Errno::EAGAIN {
            format!("Unable to acquire an exclusive lock on {:?}: it's already locked by another process", path).into()
        } else {
            format!("Unable to flock() {:?}: {}", path, err).into()
        }
    })
}

pub fn fsync_directory(path: &Path) -> io::Result<()> {
    let mut open_options = OpenOptions::new();
    open_options.read(true).custom_flags(OFlag::O_NOFOLLOW.bits());
    open_options.open(path)?.sync_all()
}
