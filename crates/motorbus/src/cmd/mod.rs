use std::path::PathBuf;
#[cfg(feature = "usb")]
use std::str::FromStr;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use motorbus_bus::{Bus, BusConfig};
use motorbus_frame::{DeviceFamily, FrameConfig, ProtocolRevision, UnitAddress};
use motorbus_transport::{BridgeSocket, SerialPort, Transport};

use crate::exit::{frame_error, transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod color;
pub mod pwm;
pub mod simulate;
pub mod status;
pub mod stop;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Halt every device on the bus.
    Stop(StopArgs),
    /// Query one device's status.
    Status(StatusArgs),
    /// Drive a motor at a raw PWM duty.
    Pwm(PwmArgs),
    /// Set an indicator light's color.
    Color(ColorArgs),
    /// Serve a simulated bus on a bridge socket.
    Simulate(SimulateArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Stop(args) => stop::run(args, format),
        Command::Status(args) => status::run(args, format),
        Command::Pwm(args) => pwm::run(args, format),
        Command::Color(args) => color::run(args, format),
        Command::Simulate(args) => simulate::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, Default, ValueEnum)]
pub enum Revision {
    V1,
    #[default]
    V2,
}

impl From<Revision> for ProtocolRevision {
    fn from(revision: Revision) -> Self {
        match revision {
            Revision::V1 => ProtocolRevision::V1,
            Revision::V2 => ProtocolRevision::V2,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum Family {
    Drive,
    Dual,
    Servo,
    Light,
    Slave,
}

impl From<Family> for DeviceFamily {
    fn from(family: Family) -> Self {
        match family {
            Family::Drive => DeviceFamily::Drive,
            Family::Dual => DeviceFamily::Dual,
            Family::Servo => DeviceFamily::Servo,
            Family::Light => DeviceFamily::Light,
            Family::Slave => DeviceFamily::Slave,
        }
    }
}

/// How to reach the bus.
#[derive(Args, Debug, Clone)]
pub struct BusArgs {
    /// Bridge socket to connect to.
    #[arg(long, env = "MOTORBUS_SOCKET", value_name = "PATH", conflicts_with = "device")]
    pub socket: Option<PathBuf>,
    /// USB bus adapter, claimed directly instead of through a tty.
    #[cfg(feature = "usb")]
    #[arg(long, env = "MOTORBUS_USB", value_name = "VID:PID", conflicts_with_all = ["socket", "device"])]
    pub usb: Option<UsbId>,
    /// Serial device of the bus adapter.
    #[arg(long, env = "MOTORBUS_DEVICE", value_name = "PATH")]
    pub device: Option<PathBuf>,
    /// Serial line speed.
    #[arg(long, env = "MOTORBUS_BAUD", default_value_t = SerialPort::DEFAULT_BAUD)]
    pub baud: u32,
    /// Firmware protocol revision.
    #[arg(long, value_enum, default_value_t = Revision::V2)]
    pub revision: Revision,
    /// Response timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
}

impl BusArgs {
    pub fn config(&self) -> CliResult<BusConfig> {
        Ok(BusConfig {
            frame: FrameConfig {
                revision: self.revision.into(),
            },
            call_timeout: parse_timeout(&self.timeout)?,
            ..BusConfig::default()
        })
    }

    pub fn open(&self) -> CliResult<Bus<Box<dyn Transport>>> {
        self.open_with(self.config()?)
    }

    pub fn open_with(&self, config: BusConfig) -> CliResult<Bus<Box<dyn Transport>>> {
        #[cfg(feature = "usb")]
        if let Some(id) = self.usb {
            let usb = motorbus_transport::UsbBulk::open(id.vid, id.pid, id.interface)
                .map_err(|err| transport_error("usb open failed", err))?;
            return Ok(Bus::with_config(Box::new(usb), config));
        }

        let stream = match (&self.socket, &self.device) {
            (Some(path), _) => BridgeSocket::connect(path)
                .map_err(|err| transport_error("connect failed", err))?,
            (None, Some(path)) => SerialPort::open(path, self.baud)
                .map_err(|err| transport_error("open failed", err))?,
            (None, None) => {
                return Err(CliError::new(
                    USAGE,
                    "no bus given: pass --socket or --device",
                ))
            }
        };
        Ok(Bus::with_config(Box::new(stream), config))
    }
}

/// A USB adapter id, `VID:PID` in hex with an optional `:INTERFACE`.
#[cfg(feature = "usb")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbId {
    pub vid: u16,
    pub pid: u16,
    pub interface: u8,
}

#[cfg(feature = "usb")]
impl FromStr for UsbId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (Some(vid), Some(pid)) = (parts.next(), parts.next()) else {
            return Err(format!("expected VID:PID, got {s:?}"));
        };
        let hex = |part: &str| {
            u16::from_str_radix(part.trim_start_matches("0x"), 16)
                .map_err(|_| format!("invalid usb id {part:?}"))
        };
        let interface = match parts.next() {
            Some(part) => part
                .parse()
                .map_err(|_| format!("invalid usb interface {part:?}"))?,
            None => motorbus_transport::usb::DEFAULT_INTERFACE,
        };
        if parts.next().is_some() {
            return Err(format!("expected VID:PID[:INTERFACE], got {s:?}"));
        }
        Ok(Self {
            vid: hex(vid)?,
            pid: hex(pid)?,
            interface,
        })
    }
}

/// Which device to talk to.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Local address of the controller (0-15).
    #[arg(value_parser = clap::value_parser!(u8).range(0..=15))]
    pub address: u8,
    /// Chained sub-unit behind the controller (0-15).
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=15))]
    pub sub: Option<u8>,
}

impl TargetArgs {
    pub fn unit(&self, family: DeviceFamily) -> CliResult<UnitAddress> {
        let unit = UnitAddress::new(family, self.address)
            .map_err(|err| frame_error("invalid address", err))?;
        match self.sub {
            Some(sub) => unit
                .with_sub_unit(sub)
                .map_err(|err| frame_error("invalid sub-unit", err)),
            None => Ok(unit),
        }
    }
}

#[derive(Args, Debug)]
pub struct StopArgs {
    #[command(flatten)]
    pub bus: BusArgs,
    /// Give up after this many write attempts.
    #[arg(long)]
    pub attempts: Option<usize>,
}

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Device family.
    #[arg(value_enum)]
    pub family: Family,
    #[command(flatten)]
    pub target: TargetArgs,
    #[command(flatten)]
    pub bus: BusArgs,
}

#[derive(Args, Debug)]
pub struct PwmArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// PWM duty.
    pub power: u16,
    /// Run in reverse phase.
    #[arg(long)]
    pub reverse: bool,
    #[command(flatten)]
    pub bus: BusArgs,
}

#[derive(Args, Debug)]
pub struct ColorArgs {
    #[command(flatten)]
    pub target: TargetArgs,
    /// Color code, e.g. "#00FF00".
    pub color: String,
    /// Brightness, 0.0 to 1.0.
    #[arg(long, default_value_t = 1.0)]
    pub brightness: f32,
    /// Blink frequency in Hz (0 for steady).
    #[arg(long, default_value_t = 0.0)]
    pub frequency: f32,
    #[command(flatten)]
    pub bus: BusArgs,
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Socket path to bind.
    pub path: PathBuf,
    /// Emit an unsolicited frame from another device before every reply.
    #[arg(long)]
    pub noise: bool,
    /// Firmware protocol revision to emulate.
    #[arg(long, value_enum, default_value_t = Revision::V2)]
    pub revision: Revision,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "timeout must not be empty"));
    }

    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid timeout value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "timeout must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
