use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use motorbus_frame::{
    encode_response, Color, Command, DeviceFamily, FrameConfig, GenericRecord, Header,
    LightRecord, Payload, ResponseStatus, RxFrame, StatusRecord, TxFrame, RX_SIZE, TX_SIZE,
};
use motorbus_transport::{BridgeSocket, Transport, TransportError};
use tracing::{debug, info, trace, warn};

use crate::cmd::SimulateArgs;
use crate::exit::{transport_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_simulation_summary, OutputFormat};

const POLL: Duration = Duration::from_millis(100);
const WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Address that chatters when noise is on: the light controller at 15.
const NOISE_ADDRESS: u8 = DeviceFamily::Light.tag() | 0x0F;
const SIMULATED_FIRMWARE: f32 = 1.0;
/// Type number a simulated slave reports in its status.
const SLAVE_TYPE: u8 = 1;

#[derive(Debug, Default)]
struct SimDevice {
    angle: i32,
    voltage: bool,
    color: Color,
    frequency: f32,
    data: [u8; 4],
}

/// Device-side behaviour for every unit on a simulated bus.
///
/// Status queries get a status reply, motion commands a completion report.
/// Everything else only updates the unit's state.
pub struct Simulator {
    config: FrameConfig,
    noise: bool,
    devices: HashMap<(u8, u8), SimDevice>,
    commands: u64,
    replies: u64,
    stops: u64,
}

impl Simulator {
    pub fn new(config: FrameConfig, noise: bool) -> Self {
        Self {
            config,
            noise,
            devices: HashMap::new(),
            commands: 0,
            replies: 0,
            stops: 0,
        }
    }

    /// Frames the bus would send back after `frame`, in order.
    pub fn respond(&mut self, frame: &TxFrame) -> Vec<RxFrame> {
        self.commands += 1;
        let header = frame.header();
        let command = match Command::decode(frame) {
            Ok(command) => command,
            Err(err) => {
                warn!(%header, %err, "command ignored");
                return Vec::new();
            }
        };
        let family = command.family();

        if command == Command::StopAll {
            self.stops += 1;
            for device in self.devices.values_mut() {
                device.voltage = false;
            }
            info!("broadcast stop");
            return Vec::new();
        }

        let device = self
            .devices
            .entry((header.address, header.sub_id))
            .or_default();

        let reply = if Command::status(family) == Some(command) {
            Some((ResponseStatus::STATUS, status_payload(family, device)))
        } else {
            apply(command, device).map(|finished| {
                let record = GenericRecord {
                    mode: finished,
                    data: [0; 4],
                };
                (ResponseStatus::SUCCESS, Payload::Generic(record))
            })
        };

        let Some((status, payload)) = reply else {
            return Vec::new();
        };

        let mut frames = Vec::with_capacity(2);
        if self.noise {
            frames.extend(self.encode(Header::new(NOISE_ADDRESS, 0, ResponseStatus::STATUS), &noise_payload()));
        }
        frames.extend(self.encode(Header::new(header.address, header.sub_id, status), &payload));
        self.replies += frames.len() as u64;
        frames
    }

    fn encode(&self, header: Header, payload: &Payload) -> Option<RxFrame> {
        match encode_response(header, payload, &self.config) {
            Ok(frame) => Some(frame),
            Err(err) => {
                warn!(%header, %err, "reply not representable");
                None
            }
        }
    }

    pub fn commands(&self) -> u64 {
        self.commands
    }

    pub fn replies(&self) -> u64 {
        self.replies
    }

    pub fn stops(&self) -> u64 {
        self.stops
    }
}

fn status_payload(family: DeviceFamily, device: &SimDevice) -> Payload {
    match family {
        DeviceFamily::Light => Payload::Light(LightRecord {
            voltage: device.voltage,
            color: device.color,
            frequency: device.frequency,
        }),
        DeviceFamily::Slave => Payload::Generic(GenericRecord {
            mode: SLAVE_TYPE,
            data: device.data,
        }),
        _ => Payload::Status(StatusRecord {
            firmware: SIMULATED_FIRMWARE,
            angle: device.angle,
            limit_switches: [false, false],
        }),
    }
}

fn noise_payload() -> Payload {
    Payload::Light(LightRecord {
        voltage: true,
        color: Color::default(),
        frequency: 0.0,
    })
}

/// Update `device` for a non-status command. Returns the mode to report as
/// finished for commands that complete asynchronously.
fn apply(command: Command, device: &mut SimDevice) -> Option<u8> {
    match command {
        Command::DriveInit => {
            device.angle = 0;
            None
        }
        Command::DriveAngle { angle, .. } => {
            device.angle = angle;
            Some(command.mode())
        }
        Command::DriveSpeed { .. }
        | Command::DriveLimitSwitch { .. }
        | Command::DualLimitSwitch { .. } => Some(command.mode()),
        Command::LightStart => {
            device.voltage = true;
            None
        }
        Command::LightStop => {
            device.voltage = false;
            None
        }
        Command::LightColor { color, frequency } => {
            device.color = color;
            device.frequency = frequency;
            None
        }
        Command::SlaveData(data) => {
            device.data.copy_from_slice(&data[..4]);
            None
        }
        other => {
            trace!(?other, "command needs no reply");
            None
        }
    }
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let bridge =
        BridgeSocket::bind(&args.path).map_err(|err| transport_error("bind failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let config = FrameConfig {
        revision: args.revision.into(),
    };
    let mut simulator = Simulator::new(config, args.noise);
    info!(path = ?bridge.path(), noise = args.noise, "simulated bus ready");

    while running.load(Ordering::SeqCst) {
        let stream = bridge
            .try_accept()
            .map_err(|err| transport_error("accept failed", err))?;
        match stream {
            Some(mut stream) => serve(&mut simulator, &mut stream, &running)?,
            None => std::thread::sleep(POLL),
        }
    }

    print_simulation_summary(
        simulator.commands(),
        simulator.replies(),
        simulator.stops(),
        format,
    );
    Ok(SUCCESS)
}

/// Answer one client until it disconnects, stops taking replies, or the
/// simulator is stopped.
fn serve<T: Transport>(
    simulator: &mut Simulator,
    stream: &mut T,
    running: &AtomicBool,
) -> CliResult<()> {
    let mut buf = [0u8; TX_SIZE];
    while running.load(Ordering::SeqCst) {
        match stream.read_bulk(&mut buf, POLL) {
            Ok(TX_SIZE) => {
                for reply in simulator.respond(&TxFrame::from_bytes(buf)) {
                    match stream.write_bulk(reply.as_bytes(), WRITE_TIMEOUT) {
                        Ok(RX_SIZE) => {}
                        Ok(written) => {
                            warn!(
                                written,
                                expected = RX_SIZE,
                                header = %reply.header(),
                                "reply not taken, dropping client"
                            );
                            return Ok(());
                        }
                        Err(TransportError::Shutdown) => return Ok(()),
                        Err(err) => return Err(transport_error("reply failed", err)),
                    }
                }
            }
            Ok(read) => trace!(read, expected = TX_SIZE, "partial command held for next read"),
            Err(TransportError::Timeout) => continue,
            Err(TransportError::Shutdown) => {
                debug!("bus client disconnected");
                return Ok(());
            }
            Err(err) => return Err(transport_error("read failed", err)),
        }
    }
    Ok(())
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
