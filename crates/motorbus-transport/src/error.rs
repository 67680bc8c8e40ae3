use std::path::PathBuf;

/// Errors that can occur in bus transport operations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TransportError {
    /// Failed to open or configure a serial device.
    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to bind the bridge socket.
    #[error("failed to bind to {path}: {source}")]
    Bind {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to connect to a bridge socket.
    #[error("failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to accept an incoming bridge connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Nothing arrived before the operation timeout elapsed.
    #[error("transport timed out")]
    Timeout,

    /// The requested baud rate has no termios equivalent.
    #[error("unsupported baud rate {0}")]
    UnsupportedBaud(u32),

    /// The socket path is too long for the platform.
    #[error("socket path too long ({len} bytes, max {max}): {path}")]
    PathTooLong {
        path: PathBuf,
        len: usize,
        max: usize,
    },

    /// The peer closed the transport.
    #[error("transport shut down")]
    Shutdown,

    /// No USB device with this vendor/product id is attached.
    #[cfg(feature = "usb")]
    #[error("no usb device {vid:04x}:{pid:04x}")]
    DeviceNotFound { vid: u16, pid: u16 },

    /// A libusb call failed.
    #[cfg(feature = "usb")]
    #[error("usb transfer failed: {0}")]
    Usb(rusb::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
