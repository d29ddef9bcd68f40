//! Per-process resource accounting
//!
//! Reaps a child process with `wait4` so the kernel hands back that child's own
//! rusage record. `getrusage(RUSAGE_CHILDREN)` would mix in siblings running on
//! other workers.

use std::io;
use std::process::{Child, ExitStatus};
use std::time::Duration;

/// Resource usage of a single reaped child process
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResourceUsage {
    pub user_time: Duration,
    pub system_time: Duration,
    /// Peak resident set size in KiB
    pub max_rss_kib: u64,
    pub minor_faults: u64,
    pub major_faults: u64,
    pub voluntary_switches: u64,
    pub involuntary_switches: u64,
}

/// Exit status of a reaped child together with its resource usage
#[derive(Debug, Clone, Copy)]
pub struct ChildOutcome {
    pub status: ExitStatus,
    /// Platform wait status as returned by the kernel
    pub raw_status: i32,
    pub usage: ResourceUsage,
}

#[cfg(unix)]
fn timeval_to_duration(tv: libc::timeval) -> Duration {
    Duration::from_secs(tv.tv_sec.max(0) as u64) + Duration::from_micros(tv.tv_usec.max(0) as u64)
}

#[cfg(unix)]
impl From<&libc::rusage> for ResourceUsage {
    fn from(ru: &libc::rusage) -> Self {
        Self {
            user_time: timeval_to_duration(ru.ru_utime),
            system_time: timeval_to_duration(ru.ru_stime),
            max_rss_kib: ru.ru_maxrss.max(0) as u64,
            minor_faults: ru.ru_minflt.max(0) as u64,
            major_faults: ru.ru_majflt.max(0) as u64,
            voluntary_switches: ru.ru_nvcsw.max(0) as u64,
            involuntary_switches: ru.ru_nivcsw.max(0) as u64,
        }
    }
}

/// Block until `child` exits and collect its exit status and resource usage
///
/// The child is reaped here; it must not be waited on again afterwards.
#[cfg(unix)]
pub fn wait_with_usage(child: &mut Child) -> io::Result<ChildOutcome> {
    use std::os::unix::process::ExitStatusExt;

    let pid = child.id() as libc::pid_t;
    let mut raw_status: libc::c_int = 0;
    // SAFETY: rusage is plain old data; wait4 fills it in before we read it.
    let mut ru: libc::rusage = unsafe { std::mem::zeroed() };

    loop {
        // SAFETY: pid belongs to a child we spawned and have not reaped yet;
        // both out-pointers refer to live stack locals.
        let ret = unsafe { libc::wait4(pid, &mut raw_status, 0, &mut ru) };
        if ret == pid {
            break;
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }

    Ok(ChildOutcome {
        status: ExitStatus::from_raw(raw_status),
        raw_status,
        usage: ResourceUsage::from(&ru),
    })
}

/// Fallback without per-child accounting: CPU times are reported as zero.
#[cfg(not(unix))]
pub fn wait_with_usage(child: &mut Child) -> io::Result<ChildOutcome> {
    let status = child.wait()?;
    Ok(ChildOutcome {
        status,
        raw_status: status.code().unwrap_or(-1),
        usage: ResourceUsage::default(),
    })
}
