use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::{Child, Command};

pub(crate) const TERMINATE_GRACE: Duration = Duration::from_secs(2);

/// Puts the child in its own session so signals reach everything it forks.
/// The session leader's pid doubles as the process group id.
#[cfg(unix)]
pub(crate) fn apply_process_group(cmd: &mut Command) {
    unsafe {
        cmd.pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub(crate) fn apply_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn signal_group(pgid: Option<u32>, signal: i32) {
    if let Some(pgid) = pgid {
        unsafe {
            libc::kill(-(pgid as i32), signal);
        }
    }
}

/// Kills whatever the script left running in its group after it exited.
pub(crate) fn kill_group(pgid: Option<u32>) {
    #[cfg(unix)]
    signal_group(pgid, libc::SIGKILL);
    #[cfg(not(unix))]
    let _ = pgid;
}

/// Sends SIGTERM to the child's group, escalating to SIGKILL if it is still
/// alive after the grace period.
pub(crate) async fn terminate_child(child: &mut Child, pgid: Option<u32>) -> Option<ExitStatus> {
    #[cfg(unix)]
    {
        signal_group(pgid, libc::SIGTERM);
        if let Ok(status) = tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
            kill_group(pgid);
            return status.ok();
        }
        signal_group(pgid, libc::SIGKILL);
    }
    #[cfg(not(unix))]
    let _ = pgid;
    let _ = child.kill().await;
    match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
        Ok(status) => status.ok(),
        Err(_) => None,
    }
}
