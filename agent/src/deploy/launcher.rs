//! Detached service launch

use std::path::PathBuf;

use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

use crate::models::deployment::ProcessHandle;

/// PID echoed by the start command: the last non-blank line of its stdout
pub fn parse_pid(stdout: &str) -> Option<u32> {
    stdout
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .and_then(|line| line.parse::<u32>().ok())
        .filter(|pid| *pid > 0)
}

/// Handle for a service launched by the Starting stage
pub fn process_handle(stdout: &str, log_path: PathBuf) -> ProcessHandle {
    ProcessHandle {
        pid: parse_pid(stdout),
        log_path,
    }
}

/// Whether a process with this PID exists and has not exited
pub fn is_process_alive(pid: u32) -> bool {
    let pid = Pid::from_u32(pid);
    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    match sys.process(pid) {
        Some(process) => !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead),
        None => false,
    }
}
