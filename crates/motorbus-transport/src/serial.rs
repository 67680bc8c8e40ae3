use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::time::Duration;

use tracing::info;

use crate::error::{Result, TransportError};
use crate::traits::BusStream;

/// Serial line to a bus adapter (CDC-ACM or a USB-serial bridge).
pub struct SerialPort;

impl SerialPort {
    /// Default line speed of the bus adapters.
    pub const DEFAULT_BAUD: u32 = 115_200;

    /// Open a tty in raw mode at the given line speed.
    ///
    /// Reads are non-canonical with `VMIN = 0`, so an expired read timeout
    /// surfaces as a short read instead of blocking forever.
    pub fn open(path: impl AsRef<Path>, baud: u32) -> Result<BusStream> {
        let path = path.as_ref();
        let speed = baud_to_speed(baud)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY)
            .open(path)
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        configure_raw(&file, speed).map_err(|source| TransportError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        info!(?path, baud, "serial port opened");
        Ok(BusStream::from_serial(file))
    }
}

fn baud_to_speed(baud: u32) -> Result<libc::speed_t> {
    let speed = match baud {
        9_600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        other => return Err(TransportError::UnsupportedBaud(other)),
    };
    Ok(speed)
}

fn read_termios(file: &File) -> std::io::Result<libc::termios> {
    // SAFETY: termios is plain old data; all-zero is a valid value to pass to tcgetattr.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };
    // SAFETY: the fd is open for the lifetime of `file` and `tio` is a valid writable pointer.
    let rc = unsafe { libc::tcgetattr(file.as_raw_fd(), &mut tio) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(tio)
}

fn write_termios(file: &File, tio: &libc::termios) -> std::io::Result<()> {
    // SAFETY: the fd is open for the lifetime of `file` and `tio` points to an initialised termios.
    let rc = unsafe { libc::tcsetattr(file.as_raw_fd(), libc::TCSANOW, tio) };
    if rc != 0 {
        return Err(std::io::Error::last_os_error());
    }
    Ok(())
}

fn configure_raw(file: &File, speed: libc::speed_t) -> std::io::Result<()> {
    let mut tio = read_termios(file)?;

    // SAFETY: `tio` was filled by tcgetattr; these calls only rewrite its fields.
    unsafe {
        libc::cfmakeraw(&mut tio);
        if libc::cfsetispeed(&mut tio, speed) != 0 || libc::cfsetospeed(&mut tio, speed) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    tio.c_cflag |= libc::CLOCAL | libc::CREAD;
    tio.c_cc[libc::VMIN] = 0;
    tio.c_cc[libc::VTIME] = 1;

    write_termios(file, &tio)
}

/// Apply a read timeout to a raw-mode tty through `VTIME`.
pub(crate) fn set_read_timeout(file: &File, timeout: Option<Duration>) -> Result<()> {
    let mut tio = read_termios(file)?;
    match timeout {
        Some(timeout) => {
            tio.c_cc[libc::VMIN] = 0;
            tio.c_cc[libc::VTIME] = vtime_for(timeout);
        }
        None => {
            tio.c_cc[libc::VMIN] = 1;
            tio.c_cc[libc::VTIME] = 0;
        }
    }
    write_termios(file, &tio)?;
    Ok(())
}

/// `VTIME` counts tenths of a second in a single byte; round up, clamp to 1..=255.
fn vtime_for(timeout: Duration) -> libc::cc_t {
    let tenths = timeout.as_millis().div_ceil(100).clamp(1, 255);
    tenths as libc::cc_t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vtime_rounds_up_and_clamps() {
        assert_eq!(vtime_for(Duration::from_millis(1)), 1);
        assert_eq!(vtime_for(Duration::from_millis(100)), 1);
        assert_eq!(vtime_for(Duration::from_millis(101)), 2);
        assert_eq!(vtime_for(Duration::from_secs(5)), 50);
        assert_eq!(vtime_for(Duration::from_secs(60)), 255);
    }

    #[test]
    fn unsupported_baud_rejected() {
        assert!(matches!(
            baud_to_speed(12_345),
            Err(TransportError::UnsupportedBaud(12_345))
        ));
        assert!(baud_to_speed(SerialPort::DEFAULT_BAUD).is_ok());
    }

    #[test]
    fn open_missing_device_fails() {
        let err = SerialPort::open("/dev/motorbus-does-not-exist", SerialPort::DEFAULT_BAUD)
            .unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));
    }

    #[test]
    fn open_regular_file_is_not_a_tty() {
        let path = std::env::temp_dir().join(format!("motorbus-not-tty-{}", std::process::id()));
        std::fs::write(&path, b"").unwrap();

        let err = SerialPort::open(&path, SerialPort::DEFAULT_BAUD).unwrap_err();
        assert!(matches!(err, TransportError::Open { .. }));

        let _ = std::fs::remove_file(&path);
    }
}
