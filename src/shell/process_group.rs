//! Process-group termination.
//!
//! Spawned commands lead their own process group (`process_group(0)` at
//! spawn), so killing the group also reaches pipelines and background jobs
//! the shell started.

use std::io;

/// Send SIGKILL to every process in the group led by `pgid` (best-effort).
///
/// A group that has already exited is not an error.
#[cfg(unix)]
pub fn kill_process_group(pgid: u32) -> io::Result<()> {
    let Ok(pgid) = libc::pid_t::try_from(pgid) else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("process group id out of range: {pgid}"),
        ));
    };

    // SAFETY: killpg has no memory-safety preconditions; a stale id only
    // yields ESRCH.
    let result = unsafe { libc::killpg(pgid, libc::SIGKILL) };
    if result == -1 {
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(libc::ESRCH) {
            return Err(err);
        }
    }
    Ok(())
}

/// No process groups off Unix; the caller falls back to killing the child.
#[cfg(not(unix))]
pub fn kill_process_group(_pgid: u32) -> io::Result<()> {
    Ok(())
}
