//! Shared subprocess management utilities.

/// RAII guard that kills a child process (and its process group on Unix) on drop.
///
/// Wrap a spawned `tokio::process::Child` immediately after `spawn()` to ensure
/// cleanup if the owning future is cancelled. Call `disarm()` after the process
/// exits normally to prevent the kill.
pub struct ChildGuard {
    child: Option<tokio::process::Child>,
}

impl ChildGuard {
    #[must_use]
    pub fn new(child: tokio::process::Child) -> Self {
        Self { child: Some(child) }
    }

    pub fn child_mut(&mut self) -> &mut tokio::process::Child {
        self.child.as_mut().expect("child present")
    }

    pub fn disarm(&mut self) {
        self.child = None;
    }

    /// Polite termination: SIGTERM to the process group on Unix so the tool
    /// can flush partial output. Falls back to a hard kill elsewhere.
    pub fn terminate(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                unsafe {
                    if libc::killpg(pid as i32, libc::SIGTERM) == -1 {
                        let _ = child.start_kill();
                    }
                }
                return;
            }
            let _ = child.start_kill();
        }
        #[cfg(not(unix))]
        {
            let _ = child.start_kill();
        }
    }

    /// Forceful termination of the whole process group.
    pub fn kill(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                unsafe {
                    if libc::killpg(pid as i32, libc::SIGKILL) == -1 {
                        let _ = child.start_kill();
                    }
                }
                return;
            }
            let _ = child.start_kill();
        }
        #[cfg(not(unix))]
        {
            let _ = child.start_kill();
        }
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                unsafe {
                    if libc::killpg(pid as i32, libc::SIGKILL) == -1 {
                        let _ = child.start_kill();
                    }
                }
            }
            let _ = child.try_wait();
        }
        #[cfg(not(unix))]
        {
            let _ = child.start_kill();
            let _ = child.try_wait();
        }
    }
}

/// Put the child process in its own session (Unix only) so the entire process
/// group can be signalled via `killpg`. Scanners spawn their own helpers
/// (semgrep workers, trivy db updates); signalling only the leader would
/// orphan those.
#[cfg(unix)]
pub fn set_new_session(cmd: &mut tokio::process::Command) {
    use std::os::unix::process::CommandExt;
    unsafe {
        cmd.as_std_mut().pre_exec(|| {
            if libc::setsid() == -1 {
                return Err(std::io::Error::last_os_error());
            }
            // Linux-only: ensure the child dies if the orchestrator dies
            // (kill -9 / crash / power loss).
            #[cfg(target_os = "linux")]
            if libc::prctl(libc::PR_SET_PDEATHSIG, libc::SIGKILL) == -1 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
pub fn set_new_session(_cmd: &mut tokio::process::Command) {}
