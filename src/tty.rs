//! Low-level tty plumbing shared by [`crate::session`] and [`crate::screen`].
//!
//! Thin safe wrappers over the libc calls this crate needs: a pseudo-terminal
//! pair with its slave device path, winsize ioctls, a raw-mode guard, and a
//! self-pipe that can wake a thread blocked in `poll` on terminal input.

use std::ffi::CStr;
use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;
use std::time::Duration;

//  Pty pair

/// A pseudo-terminal master/slave pair.
///
/// The master end is handed to a spawned terminal emulator; the slave is the
/// device this process renders to and reads input from. That is the inverse
/// of the usual arrangement where the child runs on the slave.
pub struct PtyPair {
    pub master: OwnedFd,
    pub slave: OwnedFd,
    /// Filesystem path of the slave device, e.g. `/dev/pts/4`.
    pub slave_path: String,
}

impl PtyPair {
    /// Opens a fresh pty pair and resolves the slave device path.
    pub fn open() -> io::Result<PtyPair> {
        let mut master: libc::c_int = -1;
        let mut slave: libc::c_int = -1;
        let rc = unsafe {
            libc::openpty(
                &mut master,
                &mut slave,
                std::ptr::null_mut(),
                std::ptr::null(),
                std::ptr::null(),
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        // Both fds were just returned by openpty and are owned from here on.
        let master = unsafe { OwnedFd::from_raw_fd(master) };
        let slave = unsafe { OwnedFd::from_raw_fd(slave) };
        // Neither end may leak into spawned children; the session dup2s
        // the master to the fd the emulator expects, which clears the flag
        // on that copy alone.
        set_cloexec(master.as_raw_fd())?;
        set_cloexec(slave.as_raw_fd())?;
        let slave_path = ptsname(master.as_raw_fd())?;
        Ok(PtyPair {
            master,
            slave,
            slave_path,
        })
    }
}

fn set_cloexec(fd: RawFd) -> io::Result<()> {
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFD) };
    if flags < 0 {
        return Err(io::Error::last_os_error());
    }
    if unsafe { libc::fcntl(fd, libc::F_SETFD, flags | libc::FD_CLOEXEC) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

fn ptsname(master: RawFd) -> io::Result<String> {
    let mut buf = [0 as libc::c_char; 128];
    let rc = unsafe { libc::ptsname_r(master, buf.as_mut_ptr(), buf.len()) };
    if rc != 0 {
        // ptsname_r returns the error number itself.
        return Err(io::Error::from_raw_os_error(rc));
    }
    let cstr = unsafe { CStr::from_ptr(buf.as_ptr()) };
    Ok(cstr.to_string_lossy().into_owned())
}

//  Window size

/// Reads the terminal size of `fd` as `(cols, rows)`.
///
/// A slave whose emulator has not attached yet reports `(0, 0)`, which is
/// what the session's readiness wait keys off.
pub fn winsize(fd: RawFd) -> io::Result<(u16, u16)> {
    let mut ws: libc::winsize = unsafe { std::mem::zeroed() };
    let rc = unsafe { libc::ioctl(fd, libc::TIOCGWINSZ, &mut ws) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok((ws.ws_col, ws.ws_row))
}

/// Sets the terminal size of `fd`.
pub fn set_winsize(fd: RawFd, cols: u16, rows: u16) -> io::Result<()> {
    let ws = libc::winsize {
        ws_row: rows,
        ws_col: cols,
        ws_xpixel: 0,
        ws_ypixel: 0,
    };
    let rc = unsafe { libc::ioctl(fd, libc::TIOCSWINSZ, &ws) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

//  Raw mode

/// Puts a terminal into raw mode and restores the saved attributes on drop.
///
/// Restore failures on drop are ignored since the device may already be
/// gone by then (the emulator owning the other end can exit first).
pub struct RawModeGuard {
    fd: RawFd,
    saved: libc::termios,
}

impl RawModeGuard {
    pub fn enable(fd: RawFd) -> io::Result<RawModeGuard> {
        let mut saved: libc::termios = unsafe { std::mem::zeroed() };
        if unsafe { libc::tcgetattr(fd, &mut saved) } != 0 {
            return Err(io::Error::last_os_error());
        }
        let mut raw = saved;
        unsafe { libc::cfmakeraw(&mut raw) };
        if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &raw) } != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(RawModeGuard { fd, saved })
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        unsafe {
            libc::tcsetattr(self.fd, libc::TCSANOW, &self.saved);
        }
    }
}

//  Interrupt pipe

/// Self-pipe whose read end is polled next to the tty.
///
/// Writing a byte to the other end wakes the poller. The pipe is opened
/// non-blocking on both ends so a full pipe never blocks an interrupter
/// and draining never blocks the reader.
pub struct InterruptPipe {
    read: OwnedFd,
    write: Arc<OwnedFd>,
}

/// Cloneable handle that wakes the poller. Safe to use from any thread.
#[derive(Clone)]
pub struct Interrupter {
    write: Arc<OwnedFd>,
}

impl InterruptPipe {
    pub fn new() -> io::Result<InterruptPipe> {
        let mut fds = [0 as libc::c_int; 2];
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC | libc::O_NONBLOCK) };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        let read = unsafe { OwnedFd::from_raw_fd(fds[0]) };
        let write = unsafe { OwnedFd::from_raw_fd(fds[1]) };
        Ok(InterruptPipe {
            read,
            write: Arc::new(write),
        })
    }

    pub fn read_fd(&self) -> RawFd {
        self.read.as_raw_fd()
    }

    pub fn interrupter(&self) -> Interrupter {
        Interrupter {
            write: Arc::clone(&self.write),
        }
    }

    /// Discards all pending wakeup bytes.
    pub fn drain(&self) {
        let mut buf = [0u8; 64];
        loop {
            let n = unsafe { libc::read(self.read.as_raw_fd(), buf.as_mut_ptr().cast(), buf.len()) };
            if n <= 0 {
                break;
            }
        }
    }
}

impl Interrupter {
    /// Wakes the poller. A full pipe already counts as a pending wakeup, so
    /// the result of the write is deliberately not checked.
    pub fn interrupt(&self) {
        let byte = 1u8;
        unsafe {
            libc::write(self.write.as_raw_fd(), (&byte as *const u8).cast(), 1);
        }
    }
}

//  Polling

/// What `poll_input` observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollInput {
    /// The tty has bytes to read (or hung up; the read will tell).
    Tty,
    /// The interrupt pipe was poked.
    Interrupt,
    TimedOut,
}

/// Blocks until the tty or the interrupt pipe becomes readable, or until
/// `timeout` elapses (`None` waits forever). EINTR restarts the wait.
pub fn poll_input(tty: RawFd, intr: RawFd, timeout: Option<Duration>) -> io::Result<PollInput> {
    let timeout_ms: libc::c_int = match timeout {
        Some(t) => t.as_millis().min(i32::MAX as u128) as libc::c_int,
        None => -1,
    };
    loop {
        let mut fds = [
            libc::pollfd {
                fd: tty,
                events: libc::POLLIN,
                revents: 0,
            },
            libc::pollfd {
                fd: intr,
                events: libc::POLLIN,
                revents: 0,
            },
        ];
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, timeout_ms) };
        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(err);
        }
        if rc == 0 {
            return Ok(PollInput::TimedOut);
        }
        // The interrupt side wins so a shutdown request is never starved
        // by a chatty tty.
        if fds[1].revents != 0 {
            return Ok(PollInput::Interrupt);
        }
        return Ok(PollInput::Tty);
    }
}

//  Tests
