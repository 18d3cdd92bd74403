//! Advisory locking of a dataset cache.
//!
//! The lock lives on a sibling `<stem>.lock` file so the cache file itself can
//! be renamed while locked. The holder writes its process id into the lock
//! file; a contended `acquire` reports it.

use std::fs::{File, OpenOptions};
use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Write};
use std::path::{Path, PathBuf};
use std::process;

/// Exclusive lock on one cache, released on drop.
#[derive(Debug)]
pub struct FileLock {
    _file: File,
    path: PathBuf,
}

impl FileLock {
    /// Takes the lock at `lock_path` without waiting.
    ///
    /// # Errors
    /// - `ErrorKind::WouldBlock` if the cache is already open elsewhere
    /// - any I/O error from creating the lock file
    pub fn acquire(lock_path: &Path) -> IoResult<Self> {
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(lock_path)?;

        if !sys::try_lock_exclusive(&file)? {
            let holder = match read_holder(&mut file) {
                Some(pid) => format!("process {pid}"),
                None => "another process".to_string(),
            };
            return Err(IoError::new(
                ErrorKind::WouldBlock,
                format!("cache lock {} is held by {holder}", lock_path.display()),
            ));
        }

        file.set_len(0)?;
        file.write_all(process::id().to_string().as_bytes())?;
        file.flush()?;

        Ok(Self {
            _file: file,
            path: lock_path.to_path_buf(),
        })
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn read_holder(file: &mut File) -> Option<u32> {
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    contents.trim().parse().ok()
}

#[cfg(unix)]
mod sys {
    use std::fs::File;
    use std::io::{Error as IoError, Result as IoResult};
    use std::os::unix::io::AsRawFd;

    /// Returns false if the lock is held elsewhere.
    pub(super) fn try_lock_exclusive(file: &File) -> IoResult<bool> {
        // SAFETY: the descriptor stays valid for the duration of the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
        if rc == 0 {
            return Ok(true);
        }

        let err = IoError::last_os_error();
        if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
            Ok(false)
        } else {
            Err(err)
        }
    }
}

#[cfg(windows)]
mod sys {
    use std::fs::File;
    use std::io::{Error as IoError, Result as IoResult};
    use std::os::windows::io::AsRawHandle;

    use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
    use windows_sys::Win32::Storage::FileSystem::{
        LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY,
    };
    use windows_sys::Win32::System::IO::OVERLAPPED;

    /// Returns false if the lock is held elsewhere.
    pub(super) fn try_lock_exclusive(file: &File) -> IoResult<bool> {
        let handle = file.as_raw_handle() as HANDLE;
        // SAFETY: the handle stays valid for the call and OVERLAPPED is plain data.
        let ok = unsafe {
            let mut overlapped: OVERLAPPED = std::mem::zeroed();
            LockFileEx(
                handle,
                LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
                0,
                1,
                0,
                &mut overlapped,
            )
        };
        if ok != 0 {
            return Ok(true);
        }

        let err = IoError::last_os_error();
        #[allow(clippy::cast_possible_wrap)]
        let contended = err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32);
        if contended {
            Ok(false)
        } else {
            Err(err)
        }
    }
}

#[cfg(not(any(unix, windows)))]
mod sys {
    use std::fs::File;
    use std::io::{Error as IoError, ErrorKind, Result as IoResult};

    pub(super) fn try_lock_exclusive(_file: &File) -> IoResult<bool> {
        Err(IoError::new(
            ErrorKind::Unsupported,
            "cache locking is not supported on this platform",
        ))
    }
}
