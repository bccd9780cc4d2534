//! Starts the daemon as a detached child of the current executable.

use std::env;
use std::ffi::{OsStr, OsString};
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, info};

use super::probe::socket_is_reachable;
use super::{LaunchError, PROCESS_TARGET};

/// Number of times the control socket is probed after spawning.
pub const MAX_SOCKET_CHECKS: u32 = 10;
/// Delay between socket probes.
pub const SOCKET_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Everything needed to start a detached daemon.
#[derive(Debug, Clone)]
pub struct DaemonLaunch {
    /// Socket the daemon will listen on.
    pub socket: Utf8PathBuf,
    /// Arguments passed after `--daemon`.
    pub arguments: Vec<OsString>,
    /// Binary to run instead of the current executable.
    pub binary: Option<OsString>,
}

/// Spawns a detached daemon and waits until its control socket answers.
///
/// Refuses to start when a daemon already answers on the socket. Returns the
/// child's process id; the child itself is released, not waited on.
pub fn start_forked_daemon(launch: &DaemonLaunch) -> Result<u32, LaunchError> {
    if socket_is_reachable(&launch.socket)? {
        return Err(LaunchError::AlreadyRunning {
            socket: launch.socket.clone(),
        });
    }
    let binary = resolve_daemon_binary(launch.binary.as_deref())?;
    debug!(target: PROCESS_TARGET, binary = ?binary, "resolved daemon binary");

    let child = daemon_command(&binary, &launch.arguments)
        .spawn()
        .map_err(|source| LaunchError::Spawn {
            binary: binary.clone(),
            source,
        })?;
    let pid = child.id();
    drop(child);
    info!(target: PROCESS_TARGET, pid, "daemon process detached");

    wait_for_socket(&launch.socket, MAX_SOCKET_CHECKS, SOCKET_CHECK_INTERVAL)?;
    Ok(pid)
}

fn resolve_daemon_binary(binary_override: Option<&OsStr>) -> Result<OsString, LaunchError> {
    match binary_override {
        Some(binary) => Ok(binary.to_owned()),
        None => env::current_exe()
            .map(OsString::from)
            .map_err(|source| LaunchError::CurrentExe { source }),
    }
}

fn daemon_command(binary: &OsStr, arguments: &[OsString]) -> Command {
    let mut command = Command::new(binary);
    command
        .arg("--daemon")
        .args(arguments)
        .stdin(Stdio::inherit())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    detach(&mut command);
    command
}

fn detach(command: &mut Command) {
    use nix::unistd::{getgid, getuid, setsid};
    use std::os::unix::process::CommandExt;

    command.uid(getuid().as_raw()).gid(getgid().as_raw());
    // SAFETY: `setsid` is async-signal-safe and touches no parent state.
    unsafe {
        command.pre_exec(|| {
            setsid()?;
            Ok(())
        });
    }
}

/// Probes `socket` up to `attempts` times, `interval` apart.
pub fn wait_for_socket(
    socket: &Utf8Path,
    attempts: u32,
    interval: Duration,
) -> Result<(), LaunchError> {
    for attempt in 1..=attempts {
        if socket_is_reachable(socket)? {
            debug!(target: PROCESS_TARGET, attempt, "control socket is reachable");
            return Ok(());
        }
        if attempt < attempts {
            thread::sleep(interval);
        }
    }
    Err(LaunchError::StartupTimeout {
        socket: socket.to_path_buf(),
        attempts,
    })
}
