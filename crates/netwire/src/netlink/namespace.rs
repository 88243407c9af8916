//! Network namespace utilities.
//!
//! Entering a namespace with `setns(2)` affects only the calling thread.
//! [`NamespaceGuard`] switches back when dropped, including on early return
//! and unwinding, so [`execute_in`] always leaves the thread where it found
//! it.
//!
//! ```ignore
//! use netwire::netlink::namespace;
//!
//! let names = namespace::execute_in("/var/run/netns/blue", || {
//!     std::fs::read_to_string("/proc/self/net/dev")
//! })?;
//! ```

use std::fs::File;
use std::os::unix::fs::MetadataExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::{Path, PathBuf};

use super::error::{Error, Result};

/// The runtime directory where named network namespaces are stored.
pub const NETNS_RUN_DIR: &str = "/var/run/netns";

/// A handle to an open namespace file.
#[derive(Debug)]
pub struct NamespaceFd {
    file: File,
}

impl AsRawFd for NamespaceFd {
    fn as_raw_fd(&self) -> RawFd {
        self.file.as_raw_fd()
    }
}

/// Open a namespace reference such as `/proc/<pid>/ns/net` or
/// `/var/run/netns/<name>`.
pub fn open_path<P: AsRef<Path>>(path: P) -> Result<NamespaceFd> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|_| Error::NamespaceNotFound {
        path: path.to_path_buf(),
    })?;
    Ok(NamespaceFd { file })
}

/// Kernel identity (nsfs inode number) of a namespace reference.
pub fn namespace_inode<P: AsRef<Path>>(path: P) -> Result<u64> {
    let path = path.as_ref();
    std::fs::metadata(path)
        .map(|m| m.ino())
        .map_err(|_| Error::NamespaceNotFound {
            path: path.to_path_buf(),
        })
}

/// Switch the calling thread into the namespace behind `fd`.
pub fn enter_fd(fd: RawFd) -> Result<NamespaceGuard> {
    let original = File::open("/proc/thread-self/ns/net")?;

    // SAFETY: setns only reads the fd; an invalid fd yields EBADF.
    let ret = unsafe { libc::setns(fd, libc::CLONE_NEWNET) };
    if ret < 0 {
        return Err(Error::Io(std::io::Error::last_os_error()));
    }

    Ok(NamespaceGuard {
        original: Some(original),
    })
}

/// Switch the calling thread into the namespace at `path`.
pub fn enter_path<P: AsRef<Path>>(path: P) -> Result<NamespaceGuard> {
    let target = open_path(path)?;
    enter_fd(target.as_raw_fd())
}

/// Run `op` with the calling thread inside the namespace at `path`.
pub fn execute_in<P, T, F>(path: P, op: F) -> Result<T>
where
    P: AsRef<Path>,
    F: FnOnce() -> T,
{
    let guard = enter_path(path)?;
    let out = op();
    guard.restore()?;
    Ok(out)
}

/// Restores the thread's original namespace when dropped.
#[derive(Debug)]
pub struct NamespaceGuard {
    original: Option<File>,
}

impl NamespaceGuard {
    /// Restore explicitly, surfacing the error.
    pub fn restore(mut self) -> Result<()> {
        match self.original.take() {
            Some(file) => switch_back(&file),
            None => Ok(()),
        }
    }
}

fn switch_back(original: &File) -> Result<()> {
    // SAFETY: original was opened from /proc/thread-self/ns/net.
    let ret = unsafe { libc::setns(original.as_raw_fd(), libc::CLONE_NEWNET) };
    if ret < 0 {
        return Err(Error::Io(std::io::Error::last_os_error()));
    }
    Ok(())
}

impl Drop for NamespaceGuard {
    fn drop(&mut self) {
        if let Some(file) = self.original.take()
            && let Err(e) = switch_back(&file)
        {
            tracing::error!("failed to restore network namespace: {e}");
        }
    }
}

/// Named namespaces in `dir` (normally [`NETNS_RUN_DIR`]), sorted by name.
pub fn list_named<P: AsRef<Path>>(dir: P) -> Result<Vec<(String, PathBuf)>> {
    let entries = match std::fs::read_dir(dir.as_ref()) {
        Ok(d) => d,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(Error::Io(e)),
    };

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry?;
        names.push((entry.file_name().to_string_lossy().into_owned(), entry.path()));
    }

    names.sort();
    Ok(names)
}
