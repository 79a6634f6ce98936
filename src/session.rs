//! Terminal emulator session on a private pty.
//!
//! [`TermSession::open`] opens a pty pair, spawns the configured terminal
//! emulator with the pty *master* on fd 3 (the urxvt `-pty-fd` contract;
//! note this is the inverse of spawning a child on the slave), waits until
//! the emulator attaches, and opens a [`Screen`] on the slave device. A
//! monitor thread owns the child, records how it exits and wakes the screen
//! so a blocked event read never outlives the emulator.
//!
//! Teardown order matters and is encoded in the field order of
//! [`TermSession`]: the screen restores the device and closes its fd, then
//! the session's own slave fd closes, which is what makes a still-running
//! emulator exit. [`TermSession::close`] additionally collects the
//! monitor's verdict and reports an abnormal emulator exit; merely dropping
//! the session performs the same release steps and leaves the monitor to
//! finish on its own, so nothing leaks on early returns or panics.

use crate::config::{EmulatorConfig, SessionConfig};
use crate::screen::{Screen, ScreenError};
use crate::traits::Outcome;
use crate::tty::{self, PtyPair};

use log::debug;
use thiserror::Error;

use std::io;
use std::os::fd::{AsRawFd, OwnedFd, RawFd};
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("pty setup failed: {0}")]
    Pty(#[source] io::Error),
    #[error("failed to spawn {program}: {source}")]
    Spawn { program: String, source: io::Error },
    #[error("failed to watch emulator: {0}")]
    Child(#[source] io::Error),
    #[error("emulator did not attach to the pty within {0:?}")]
    StartTimeout(Duration),
    #[error("emulator exited: {0}")]
    EmulatorExit(String),
    #[error(transparent)]
    Screen(#[from] ScreenError),
}

/// A running emulator bound to a pty, with a [`Screen`] on the slave side.
pub struct TermSession {
    // Field order is release order: screen first, then the slave fd whose
    // close tells the emulator to exit.
    screen: Screen,
    slave: OwnedFd,
    exit_rx: mpsc::Receiver<Option<SessionError>>,
    monitor: thread::JoinHandle<()>,
}

/// The fd number the emulator expects the pty master on (`-pty-fd 3`).
const EMULATOR_PTY_FD: RawFd = 3;

impl TermSession {
    /// Spawns the emulator and blocks until it has attached to the pty.
    ///
    /// `cols`/`rows` size the emulator window (`-geometry`); `mouse`
    /// enables pointer reporting on the hosted screen.
    pub fn open(
        emulator: &EmulatorConfig,
        timing: &SessionConfig,
        title: &str,
        cols: u16,
        rows: u16,
        mouse: bool,
    ) -> Result<TermSession, SessionError> {
        let pty = PtyPair::open().map_err(SessionError::Pty)?;
        let mut child = spawn_emulator(emulator, &pty, title, cols, rows)?;
        // The emulator holds its own copy of the master now.
        drop(pty.master);

        if let Err(err) = wait_attached(pty.slave.as_raw_fd(), &mut child, timing) {
            kill_and_reap(&mut child);
            return Err(err);
        }
        debug!(
            "emulator {} attached to {} ({}x{} cells)",
            emulator.program, pty.slave_path, cols, rows
        );

        let screen = match Screen::open(&pty.slave_path, mouse) {
            Ok(screen) => screen,
            Err(err) => {
                kill_and_reap(&mut child);
                return Err(err.into());
            }
        };

        // The monitor owns the child from here. The channel is buffered,
        // so the verdict is delivered even if close comes much later, and
        // the send never blocks.
        let (exit_tx, exit_rx) = mpsc::channel();
        let interrupter = screen.interrupter();
        let program = emulator.program.clone();
        let monitor = thread::spawn(move || {
            let verdict = match child.wait() {
                Ok(status) if status.success() => None,
                Ok(status) => Some(SessionError::EmulatorExit(status.to_string())),
                Err(err) => Some(SessionError::Child(err)),
            };
            match &verdict {
                Some(err) => debug!("{program} monitor: {err}"),
                None => debug!("{program} exited cleanly"),
            }
            let _ = exit_tx.send(verdict);
            interrupter.interrupt();
        });

        Ok(TermSession {
            screen,
            slave: pty.slave,
            exit_rx,
            monitor,
        })
    }

    /// The screen hosted in the spawned emulator.
    pub fn screen_mut(&mut self) -> &mut Screen {
        &mut self.screen
    }

    /// Releases the session in order and reports how the emulator exited.
    ///
    /// Always returns: the emulator having exited already just means the
    /// monitor's verdict is waiting in the channel.
    pub fn close(self) -> Result<(), SessionError> {
        let TermSession {
            screen,
            slave,
            exit_rx,
            monitor,
        } = self;
        drop(screen);
        drop(slave);
        let verdict = exit_rx.recv().unwrap_or(None);
        let _ = monitor.join();
        match verdict {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Reconciles a finished UI run with [`TermSession::close`]'s verdict.
///
/// A confirmed or close-requested selection stands even when the emulator
/// exited abnormally behind it; the exit error is returned alongside for the
/// caller to log. A cancelled or failed run yields to the exit error, which
/// is the root cause whenever the emulator died mid-session.
pub fn settle_outcome<C, E>(
    result: Result<Outcome<C>, E>,
    closed: Result<(), SessionError>,
) -> Result<(Outcome<C>, Option<SessionError>), SessionError>
where
    SessionError: From<E>,
{
    match result {
        Ok(Outcome::Cancelled) => {
            closed?;
            Ok((Outcome::Cancelled, None))
        }
        Ok(outcome) => Ok((outcome, closed.err())),
        Err(err) => {
            closed?;
            Err(SessionError::from(err))
        }
    }
}

fn spawn_emulator(
    emulator: &EmulatorConfig,
    pty: &PtyPair,
    title: &str,
    cols: u16,
    rows: u16,
) -> Result<Child, SessionError> {
    let mut cmd = Command::new(&emulator.program);
    cmd.arg("-pty-fd")
        .arg(EMULATOR_PTY_FD.to_string())
        .arg("-title")
        .arg(title)
        .arg("-geometry")
        .arg(format!("{cols}x{rows}"))
        .args(&emulator.args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    let master_fd = pty.master.as_raw_fd();
    unsafe {
        // Runs in the forked child just before exec.
        cmd.pre_exec(move || {
            if master_fd == EMULATOR_PTY_FD {
                // Already in place; just let it survive the exec.
                let flags = libc::fcntl(EMULATOR_PTY_FD, libc::F_GETFD);
                if flags < 0
                    || libc::fcntl(EMULATOR_PTY_FD, libc::F_SETFD, flags & !libc::FD_CLOEXEC) < 0
                {
                    return Err(io::Error::last_os_error());
                }
            } else if libc::dup2(master_fd, EMULATOR_PTY_FD) < 0 {
                // dup2 clears close-on-exec on the new fd.
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }
    cmd.spawn().map_err(|source| SessionError::Spawn {
        program: emulator.program.clone(),
        source,
    })
}

/// Probes the slave's winsize until the emulator sets one. Bounded by the
/// configured timeout, and bails out early if the child dies first.
fn wait_attached(
    slave: RawFd,
    child: &mut Child,
    timing: &SessionConfig,
) -> Result<(), SessionError> {
    let deadline = Instant::now() + timing.start_timeout();
    loop {
        match tty::winsize(slave) {
            Ok((_, rows)) if rows > 0 => return Ok(()),
            Ok(_) => {}
            // The probe ioctl reports EIO once every master fd is closed.
            // Ours was dropped right after the spawn, so the emulator's
            // copy is gone too: reap it and report how it went.
            Err(err) if err.raw_os_error() == Some(libc::EIO) => {
                let _ = child.kill();
                let status = child.wait().map_err(SessionError::Child)?;
                return Err(SessionError::EmulatorExit(status.to_string()));
            }
            Err(err) => return Err(SessionError::Pty(err)),
        }
        if let Some(status) = child.try_wait().map_err(SessionError::Child)? {
            return Err(SessionError::EmulatorExit(status.to_string()));
        }
        if Instant::now() >= deadline {
            return Err(SessionError::StartTimeout(timing.start_timeout()));
        }
        thread::sleep(timing.poll_interval());
    }
}

fn kill_and_reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

//  Tests

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    static STUB_ID: AtomicU32 = AtomicU32::new(0);

    /// Writes an executable stub standing in for the emulator.
    fn stub_emulator(body: &str) -> PathBuf {
        let id = STUB_ID.fetch_add(1, Ordering::Relaxed);
        let path = std::env::temp_dir().join(format!(
            "wmsel-stub-{}-{}.sh",
            std::process::id(),
            id
        ));
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn stub_config(path: &PathBuf) -> EmulatorConfig {
        EmulatorConfig {
            program: path.to_string_lossy().into_owned(),
            args: vec![],
        }
    }

    fn short_timing() -> SessionConfig {
        SessionConfig {
            start_timeout_ms: 2000,
            poll_interval_ms: 2,
        }
    }

    // A stand-in that behaves like a real emulator: it sizes the pty pair
    // through its copy of the master on fd 3, then waits for one byte of
    // output before exiting.
    const ATTACHING_STUB: &str = "stty rows 14 columns 28 <&3\ndd bs=1 count=1 <&3 >/dev/null 2>&1";

    #[test]
    fn open_fails_when_the_emulator_dies_immediately() {
        let stub = stub_emulator("exit 7");
        let err = TermSession::open(&stub_config(&stub), &short_timing(), "t", 28, 14, false)
            .err()
            .unwrap();
        let _ = std::fs::remove_file(&stub);
        match err {
            SessionError::EmulatorExit(status) => assert!(status.contains('7'), "{status}"),
            other => panic!("expected EmulatorExit, got {other}"),
        }
    }

    #[test]
    fn open_times_out_when_the_emulator_never_attaches() {
        let stub = stub_emulator("sleep 5");
        let timing = SessionConfig {
            start_timeout_ms: 60,
            poll_interval_ms: 2,
        };
        let started = Instant::now();
        let err = TermSession::open(&stub_config(&stub), &timing, "t", 28, 14, false)
            .err()
            .unwrap();
        let _ = std::fs::remove_file(&stub);
        assert!(matches!(err, SessionError::StartTimeout(_)), "{err}");
        // The child was killed rather than awaited for its full sleep.
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn open_fails_for_a_missing_program() {
        let config = EmulatorConfig {
            program: "/nonexistent/wmsel-no-such-emulator".to_owned(),
            args: vec![],
        };
        let err = TermSession::open(&config, &short_timing(), "t", 28, 14, false)
            .err()
            .unwrap();
        assert!(matches!(err, SessionError::Spawn { .. }), "{err}");
    }

    #[test]
    fn session_opens_and_closes_cleanly() {
        let stub = stub_emulator(ATTACHING_STUB);
        let mut session =
            TermSession::open(&stub_config(&stub), &short_timing(), "t", 28, 14, false).unwrap();
        assert_eq!(session.screen_mut().size(), (28, 14));
        let result = session.close();
        let _ = std::fs::remove_file(&stub);
        result.unwrap();
    }

    #[test]
    fn close_reports_an_abnormal_emulator_exit() {
        let stub = stub_emulator(&format!("{ATTACHING_STUB}\nexit 3"));
        let session =
            TermSession::open(&stub_config(&stub), &short_timing(), "t", 28, 14, false).unwrap();
        let err = session.close().err().unwrap();
        let _ = std::fs::remove_file(&stub);
        match err {
            SessionError::EmulatorExit(status) => assert!(status.contains('3'), "{status}"),
            other => panic!("expected EmulatorExit, got {other}"),
        }
    }

    #[test]
    fn monitor_interrupts_a_blocked_event_read() {
        let stub = stub_emulator(ATTACHING_STUB);
        let mut session =
            TermSession::open(&stub_config(&stub), &short_timing(), "t", 28, 14, false).unwrap();
        // The stub exits as soon as the screen's setup bytes reach it, so a
        // blocking read here must be woken rather than hang.
        let ev = session.screen_mut().next_event().unwrap();
        assert_eq!(ev, crate::screen::event::InputEvent::Interrupted);
        session.close().unwrap();
        let _ = std::fs::remove_file(&stub);
    }

    //  Outcome settlement

    #[test]
    fn settle_keeps_a_user_decision_over_an_abnormal_exit() {
        let closed = Err(SessionError::EmulatorExit("exit status: 2".to_owned()));
        let result: Result<_, ScreenError> = Ok(Outcome::Confirmed(7u32));
        let (outcome, exit) = settle_outcome(result, closed).unwrap();
        assert_eq!(outcome, Outcome::Confirmed(7));
        assert!(matches!(exit, Some(SessionError::EmulatorExit(_))));
    }

    #[test]
    fn settle_surfaces_the_exit_error_for_a_cancelled_run() {
        let closed = Err(SessionError::EmulatorExit("signal: 9".to_owned()));
        let result: Result<Outcome<u32>, ScreenError> = Ok(Outcome::Cancelled);
        let err = settle_outcome(result, closed).err().unwrap();
        assert!(matches!(err, SessionError::EmulatorExit(_)));
    }

    #[test]
    fn settle_prefers_the_exit_error_over_a_loop_error() {
        let closed = Err(SessionError::EmulatorExit("exit status: 1".to_owned()));
        let result: Result<Outcome<u32>, ScreenError> = Err(ScreenError::NoSize);
        let err = settle_outcome(result, closed).err().unwrap();
        assert!(matches!(err, SessionError::EmulatorExit(_)));
    }

    #[test]
    fn settle_with_a_clean_close_passes_results_through() {
        let result: Result<_, ScreenError> = Ok(Outcome::CloseRequested(3u32));
        let (outcome, exit) = settle_outcome(result, Ok(())).unwrap();
        assert_eq!(outcome, Outcome::CloseRequested(3));
        assert!(exit.is_none());
        let result: Result<Outcome<u32>, ScreenError> = Err(ScreenError::NoSize);
        let err = settle_outcome(result, Ok(())).err().unwrap();
        assert!(matches!(err, SessionError::Screen(ScreenError::NoSize)));
    }
}
