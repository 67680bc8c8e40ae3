use std::fmt;

use bytes::{Buf, BufMut};

use crate::address::ProtocolRevision;
use crate::error::{FrameError, Result};
use crate::family::{DeviceFamily, BROADCAST, FAMILY_MASK};
use crate::payload::{
    Color, GenericRecord, LightRecord, Payload, Response, ResponseStatus, StatusRecord,
};

/// Size of a transmit (host to device) frame.
pub const TX_SIZE: usize = 10;

/// Size of a receive (device to host) frame.
pub const RX_SIZE: usize = 8;

/// Header: address (1) + sub-id (1) + mode/status (1) = 3 bytes.
pub const HEADER_SIZE: usize = 3;

/// Header byte offsets.
pub const ADDRESS: usize = 0;
pub const SUB_ID: usize = 1;
pub const MODE: usize = 2;

/// Payload bytes available in a transmit frame.
pub const TX_PAYLOAD_SIZE: usize = TX_SIZE - HEADER_SIZE;

/// Payload bytes available in a receive frame.
pub const RX_PAYLOAD_SIZE: usize = RX_SIZE - HEADER_SIZE;

/// Largest angle magnitude a status record can carry (24 bits).
pub const MAX_STATUS_ANGLE: u32 = 0x00FF_FFFF;

const STATUS_SIGN_BIT: u8 = 0x80;
pub(crate) const FREQUENCY_STEPS: f32 = 4.0;

/// The three header bytes shared by both frame directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Header {
    pub address: u8,
    pub sub_id: u8,
    /// Command mode on transmit, status code on receive.
    pub mode: u8,
}

impl Header {
    pub const fn new(address: u8, sub_id: u8, mode: u8) -> Self {
        Self {
            address,
            sub_id,
            mode,
        }
    }

    /// The family named by the address byte, if it is an addressable one.
    pub fn family(&self) -> Option<DeviceFamily> {
        DeviceFamily::from_address(self.address)
    }

    fn from_bytes(bytes: &[u8]) -> Self {
        Self::new(bytes[ADDRESS], bytes[SUB_ID], bytes[MODE])
    }

    fn write_to(&self, bytes: &mut [u8]) {
        bytes[ADDRESS] = self.address;
        bytes[SUB_ID] = self.sub_id;
        bytes[MODE] = self.mode;
    }
}

impl fmt::Display for Header {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "addr=0x{:02X} sub=0x{:02X} mode={}",
            self.address, self.sub_id, self.mode
        )
    }
}

/// A command frame, exactly [`TX_SIZE`] bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TxFrame([u8; TX_SIZE]);

impl TxFrame {
    pub const fn from_bytes(bytes: [u8; TX_SIZE]) -> Self {
        Self(bytes)
    }

    /// The broadcast frame that halts every device on the bus.
    pub const fn stop_all() -> Self {
        let mut bytes = [0u8; TX_SIZE];
        bytes[ADDRESS] = BROADCAST;
        bytes[SUB_ID] = BROADCAST;
        Self(bytes)
    }

    pub fn header(&self) -> Header {
        Header::from_bytes(&self.0)
    }

    pub fn payload(&self) -> &[u8] {
        &self.0[HEADER_SIZE..]
    }

    pub fn as_bytes(&self) -> &[u8; TX_SIZE] {
        &self.0
    }
}

impl fmt::Debug for TxFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxFrame({:02X?})", self.0)
    }
}

/// A response frame, exactly [`RX_SIZE`] bytes.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct RxFrame([u8; RX_SIZE]);

impl RxFrame {
    pub const fn new(bytes: [u8; RX_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy a frame out of a buffer that must be exactly [`RX_SIZE`] long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let array: [u8; RX_SIZE] = bytes.try_into().map_err(|_| FrameError::BadLength {
            len: bytes.len(),
            expected: RX_SIZE,
        })?;
        Ok(Self(array))
    }

    pub fn header(&self) -> Header {
        Header::from_bytes(&self.0)
    }

    pub fn status(&self) -> ResponseStatus {
        ResponseStatus::from_code(self.0[MODE])
    }

    pub fn payload(&self) -> &[u8] {
        &self.0[HEADER_SIZE..]
    }

    pub fn as_bytes(&self) -> &[u8; RX_SIZE] {
        &self.0
    }
}

impl fmt::Debug for RxFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RxFrame({:02X?})", self.0)
    }
}

/// Codec settings that depend on the firmware on the bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameConfig {
    pub revision: ProtocolRevision,
}

/// One payload field of a command frame, packed in order from byte 3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field<'a> {
    U8(u8),
    /// Big-endian.
    U16(u16),
    /// A single byte holding 0 or 1.
    Flag(bool),
    /// `(value << 1) | flag` in one byte, as early revisions pack mode and phase.
    Packed { value: u8, flag: bool },
    Bytes(&'a [u8]),
    /// `n` zero bytes of padding.
    Zero(usize),
}

impl Field<'_> {
    fn wire_len(&self) -> usize {
        match self {
            Field::U8(_) | Field::Flag(_) | Field::Packed { .. } => 1,
            Field::U16(_) => 2,
            Field::Bytes(bytes) => bytes.len(),
            Field::Zero(n) => *n,
        }
    }
}

/// Pack `fields` after `header` into a transmit frame. Unused bytes are zero.
///
/// Wire format:
/// ```text
/// ┌─────────┬────────┬──────┬──────────────────────────┐
/// │ Address │ Sub-id │ Mode │ Fields (7B, big-endian)  │
/// │ (1B)    │ (1B)   │ (1B) │ zero padded              │
/// └─────────┴────────┴──────┴──────────────────────────┘
/// ```
pub fn encode(header: Header, fields: &[Field<'_>]) -> Result<TxFrame> {
    let size: usize = fields.iter().map(Field::wire_len).sum();
    if size > TX_PAYLOAD_SIZE {
        return Err(FrameError::PayloadTooLarge {
            size,
            max: TX_PAYLOAD_SIZE,
        });
    }

    let mut bytes = [0u8; TX_SIZE];
    header.write_to(&mut bytes);
    let mut dst = &mut bytes[HEADER_SIZE..];
    for field in fields {
        match *field {
            Field::U8(value) => dst.put_u8(value),
            Field::U16(value) => dst.put_u16(value),
            Field::Flag(flag) => dst.put_u8(u8::from(flag)),
            Field::Packed { value, flag } => {
                if value > 0x7F {
                    return Err(FrameError::invalid(format!(
                        "packed value {value} does not fit in 7 bits"
                    )));
                }
                dst.put_u8((value << 1) | u8::from(flag));
            }
            Field::Bytes(raw) => dst.put_slice(raw),
            Field::Zero(n) => dst.put_bytes(0, n),
        }
    }
    Ok(TxFrame(bytes))
}

/// Split a signed value into its sign flag and magnitude.
pub fn to_sign_magnitude(value: i32) -> (bool, u32) {
    (value < 0, value.unsigned_abs())
}

/// Rebuild a signed value from a sign flag and magnitude.
///
/// The sign comes from the flag alone; magnitudes past `i32::MAX` saturate.
pub fn from_sign_magnitude(negative: bool, magnitude: u32) -> i32 {
    let magnitude = i32::try_from(magnitude).unwrap_or(i32::MAX);
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

type Decoder = fn(&[u8], &FrameConfig) -> Payload;

/// Choose the payload decoder for a frame.
///
/// Light and broadcast frames have their own shape whatever the status
/// code; the others only carry a status record when answering a query.
pub fn decoder_for(family: DeviceFamily, status: ResponseStatus) -> Decoder {
    match (family, status) {
        (DeviceFamily::Light | DeviceFamily::Broadcast, _) => decode_light,
        (
            DeviceFamily::Drive | DeviceFamily::Dual | DeviceFamily::Servo,
            ResponseStatus::Status,
        ) => decode_status,
        _ => decode_generic,
    }
}

/// Decode a receive frame into a tagged response.
///
/// Fails with [`FrameError::UnknownFamily`] when the address byte carries a
/// reserved or unassigned family tag.
pub fn decode(frame: &RxFrame, config: &FrameConfig) -> Result<Response> {
    let header = frame.header();
    let family = header
        .family()
        .ok_or(FrameError::UnknownFamily(header.address & FAMILY_MASK))?;
    let status = frame.status();
    let payload = decoder_for(family, status)(frame.payload(), config);
    Ok(Response {
        header,
        status,
        payload,
        frame: *frame,
    })
}

fn decode_status(mut src: &[u8], config: &FrameConfig) -> Payload {
    let firmware = f32::from(src.get_u8()) / config.revision.firmware_scale();
    let flags = src.get_u8();
    let magnitude = src.get_uint(3) as u32;
    Payload::Status(StatusRecord {
        firmware,
        angle: from_sign_magnitude(flags & STATUS_SIGN_BIT != 0, magnitude),
        limit_switches: [flags & 0x01 != 0, flags & 0x02 != 0],
    })
}

fn decode_light(mut src: &[u8], _config: &FrameConfig) -> Payload {
    let voltage = src.get_u8() & 0x01 != 0;
    // Colors travel green first.
    let green = src.get_u8();
    let red = src.get_u8();
    let blue = src.get_u8();
    let frequency = f32::from(src.get_u8()) / FREQUENCY_STEPS;
    Payload::Light(LightRecord {
        voltage,
        color: Color { red, green, blue },
        frequency,
    })
}

fn decode_generic(mut src: &[u8], _config: &FrameConfig) -> Payload {
    let mode = src.get_u8();
    let mut data = [0u8; 4];
    src.copy_to_slice(&mut data);
    Payload::Generic(GenericRecord { mode, data })
}

/// Encode a blink frequency as quarter-hertz steps.
pub fn frequency_steps(frequency: f32) -> Result<u8> {
    let steps = frequency * FREQUENCY_STEPS;
    if !(0.0..=f32::from(u8::MAX)).contains(&steps) {
        return Err(FrameError::invalid(format!(
            "blink frequency {frequency} out of range 0.0..=63.75"
        )));
    }
    Ok(steps.round() as u8)
}

/// Build the frame a device would send for `payload`.
///
/// The device side of [`decode`]: used by the bus simulator and by tests.
pub fn encode_response(
    header: Header,
    payload: &Payload,
    config: &FrameConfig,
) -> Result<RxFrame> {
    let mut bytes = [0u8; RX_SIZE];
    header.write_to(&mut bytes);
    let mut dst = &mut bytes[HEADER_SIZE..];
    match payload {
        Payload::Status(record) => {
            let firmware = (record.firmware * config.revision.firmware_scale()).round();
            if !(0.0..=f32::from(u8::MAX)).contains(&firmware) {
                return Err(FrameError::invalid(format!(
                    "firmware version {} not representable",
                    record.firmware
                )));
            }
            let (negative, magnitude) = to_sign_magnitude(record.angle);
            if magnitude > MAX_STATUS_ANGLE {
                return Err(FrameError::invalid(format!(
                    "angle {} exceeds 24-bit magnitude",
                    record.angle
                )));
            }
            let mut flags = 0u8;
            if record.limit_switches[0] {
                flags |= 0x01;
            }
            if record.limit_switches[1] {
                flags |= 0x02;
            }
            if negative {
                flags |= STATUS_SIGN_BIT;
            }
            dst.put_u8(firmware as u8);
            dst.put_u8(flags);
            dst.put_uint(u64::from(magnitude), 3);
        }
        Payload::Light(record) => {
            dst.put_u8(u8::from(record.voltage));
            dst.put_u8(record.color.green);
            dst.put_u8(record.color.red);
            dst.put_u8(record.color.blue);
            dst.put_u8(frequency_steps(record.frequency)?);
        }
        Payload::Generic(record) => {
            dst.put_u8(record.mode);
            dst.put_slice(&record.data);
        }
    }
    Ok(RxFrame(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::UnitAddress;
    use crate::mode;

    fn config() -> FrameConfig {
        FrameConfig::default()
    }

    #[test]
    fn drive_pwm_frame_layout() {
        let unit = UnitAddress::new(DeviceFamily::Drive, 0x01).unwrap();
        let header = unit.header(ProtocolRevision::V2, mode::drive::PWM);
        let frame = encode(header, &[Field::Flag(false), Field::U16(500)]).unwrap();
        assert_eq!(
            frame.as_bytes(),
            &[0x01, 0x00, mode::drive::PWM, 0x00, 0x01, 0xF4, 0, 0, 0, 0]
        );
    }

    #[test]
    fn fields_pack_big_endian_in_order() {
        let header = Header::new(0x02, 0x00, mode::drive::SPEED);
        let frame = encode(
            header,
            &[
                Field::Flag(true),
                Field::U16(0x1234),
                Field::U16(0xABCD),
                Field::U16(1000),
            ],
        )
        .unwrap();
        assert_eq!(
            frame.payload(),
            &[0x01, 0x12, 0x34, 0xAB, 0xCD, 0x03, 0xE8]
        );
        assert_eq!(frame.header(), header);
    }

    #[test]
    fn zero_padding_and_bytes() {
        let header = Header::new(0x11, 0x00, mode::dual::POWER);
        let frame = encode(header, &[Field::Zero(1), Field::Bytes(&[7, 8])]).unwrap();
        assert_eq!(frame.payload(), &[0, 7, 8, 0, 0, 0, 0]);
    }

    #[test]
    fn packed_field_shares_a_byte() {
        let header = Header::new(0x00, 0x00, 0);
        let frame = encode(header, &[Field::Packed { value: 2, flag: true }]).unwrap();
        assert_eq!(frame.payload()[0], 0b101);

        let err = encode(header, &[Field::Packed { value: 0x80, flag: false }]).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn oversized_payload_rejected() {
        let header = Header::new(0x50, 0x00, mode::slave::DATA);
        let err = encode(header, &[Field::Bytes(&[0; 8])]).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 8, max: 7 }));
        assert!(err.is_invalid_argument());
        assert!(encode(header, &[Field::Bytes(&[0; 7])]).is_ok());
    }

    #[test]
    fn stop_all_frame() {
        assert_eq!(
            TxFrame::stop_all().as_bytes(),
            &[0xF0, 0xF0, 0, 0, 0, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn sign_magnitude_keeps_sign_out_of_band() {
        assert_eq!(to_sign_magnitude(-90), (true, 90));
        assert_eq!(to_sign_magnitude(90), (false, 90));
        assert_eq!(to_sign_magnitude(i32::MIN), (true, 0x8000_0000));
        assert_eq!(from_sign_magnitude(true, 90), -90);
        assert_eq!(from_sign_magnitude(false, 0), 0);
        assert_eq!(from_sign_magnitude(true, u32::MAX), -i32::MAX);
    }

    #[test]
    fn status_record_decodes_sign_from_flag_bit() {
        let frame = RxFrame::new([0x01, 0x00, 0x00, 123, 0x82, 0x00, 0x01, 0x00]);
        let response = decode(&frame, &config()).unwrap();
        assert_eq!(response.status, ResponseStatus::Status);
        assert_eq!(
            response.payload,
            Payload::Status(StatusRecord {
                firmware: 1.23,
                angle: -256,
                limit_switches: [false, true],
            })
        );
    }

    #[test]
    fn firmware_scale_follows_revision() {
        let frame = RxFrame::new([0x10, 0x00, 0x00, 12, 0, 0, 0, 0]);
        let v1 = FrameConfig {
            revision: ProtocolRevision::V1,
        };
        match decode(&frame, &v1).unwrap().payload {
            Payload::Status(record) => assert_eq!(record.firmware, 1.2),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn light_frames_decode_as_light_whatever_the_status() {
        let frame = RxFrame::new([0x40, 0x00, 0x01, 0x01, 10, 20, 30, 2]);
        let response = decode(&frame, &config()).unwrap();
        assert_eq!(response.status, ResponseStatus::Success);
        assert_eq!(
            response.payload,
            Payload::Light(LightRecord {
                voltage: true,
                color: Color::new(20, 10, 30),
                frequency: 0.5,
            })
        );

        let broadcast = RxFrame::new([0xF0, 0xF0, 0x00, 0, 0, 0, 0, 0]);
        assert_eq!(decode(&broadcast, &config()).unwrap().payload.kind(), "light");
    }

    #[test]
    fn finish_frames_decode_as_generic() {
        let frame = RxFrame::new([0x01, 0x00, 0x01, mode::drive::ANGLE, 1, 2, 3, 4]);
        let response = decode(&frame, &config()).unwrap();
        assert_eq!(
            response.payload,
            Payload::Generic(GenericRecord {
                mode: mode::drive::ANGLE,
                data: [1, 2, 3, 4],
            })
        );
    }

    #[test]
    fn slave_status_is_generic() {
        let frame = RxFrame::new([0x52, 0x00, 0x00, 0x07, 0, 0, 0, 9]);
        let response = decode(&frame, &config()).unwrap();
        assert!(matches!(
            response.payload,
            Payload::Generic(GenericRecord { mode: 7, .. })
        ));
    }

    #[test]
    fn unknown_family_is_reported() {
        let frame = RxFrame::new([0x31, 0x00, 0x00, 0, 0, 0, 0, 0]);
        let err = decode(&frame, &config()).unwrap_err();
        assert!(matches!(err, FrameError::UnknownFamily(0x30)));
        assert!(!err.is_invalid_argument());
    }

    #[test]
    fn from_slice_requires_exact_length() {
        assert!(RxFrame::from_slice(&[0; RX_SIZE]).is_ok());
        let err = RxFrame::from_slice(&[0; 5]).unwrap_err();
        assert!(matches!(err, FrameError::BadLength { len: 5, expected: 8 }));
    }

    fn reencode(frame: &RxFrame, config: &FrameConfig) -> RxFrame {
        let response = decode(frame, config).unwrap();
        encode_response(response.header, &response.payload, config).unwrap()
    }

    #[test]
    fn every_firmware_byte_survives_both_revisions() {
        for revision in [ProtocolRevision::V1, ProtocolRevision::V2] {
            let config = FrameConfig { revision };
            for byte in 0..=u8::MAX {
                let frame = RxFrame::new([0x01, 0x00, 0x00, byte, 0, 0, 0, 0]);
                assert_eq!(reencode(&frame, &config), frame, "{revision:?} {byte}");
            }
        }
    }

    #[test]
    fn status_flags_and_angle_edges_survive() {
        let magnitudes = [0u32, 1, MAX_STATUS_ANGLE];
        for flags in 0..=u8::MAX {
            let flags = flags & (STATUS_SIGN_BIT | 0x03);
            for magnitude in magnitudes {
                let [_, hi, mid, lo] = magnitude.to_be_bytes();
                let frame = RxFrame::new([0x12, 0x00, 0x00, 100, flags, hi, mid, lo]);
                let response = decode(&frame, &config()).unwrap();
                let record = response.payload.into_status().unwrap();
                let negative = flags & STATUS_SIGN_BIT != 0;
                assert_eq!(record.angle, from_sign_magnitude(negative, magnitude));
                assert_eq!(record.limit_switches, [flags & 0x01 != 0, flags & 0x02 != 0]);
                assert_eq!(response.frame, frame);

                let again = reencode(&frame, &config());
                if negative && magnitude == 0 {
                    // Minus zero decodes to 0 and comes back unsigned.
                    assert_eq!(again.payload()[1], flags & !STATUS_SIGN_BIT);
                } else {
                    assert_eq!(again, frame);
                }
            }
        }
    }

    #[test]
    fn status_records_at_angle_edges_survive() {
        let max = MAX_STATUS_ANGLE as i32;
        for angle in [0, 1, -1, max, -max] {
            for limit_switches in [[false, false], [true, false], [false, true], [true, true]] {
                let payload = Payload::Status(StatusRecord {
                    firmware: 2.55,
                    angle,
                    limit_switches,
                });
                let header = Header::new(0x03, 0x52, 0);
                let frame = encode_response(header, &payload, &config()).unwrap();
                let response = decode(&frame, &config()).unwrap();
                assert_eq!(response.header, header);
                assert_eq!(response.payload, payload);
            }
        }
    }

    #[test]
    fn every_light_frequency_step_survives() {
        for steps in 0..=u8::MAX {
            for voltage in [0u8, 1] {
                let frame = RxFrame::new([0x41, 0x00, 0x03, voltage, 0, 255, 128, steps]);
                assert_eq!(reencode(&frame, &config()), frame);
                let record = decode(&frame, &config()).unwrap().payload.into_light().unwrap();
                assert_eq!(record.frequency, f32::from(steps) / FREQUENCY_STEPS);
                assert_eq!(record.color, Color::new(255, 0, 128));
            }
        }
    }

    #[test]
    fn generic_records_survive() {
        for mode in 0..=u8::MAX {
            let frame = RxFrame::new([0x20, 0x00, 0x01, mode, 9, 8, 7, 6]);
            assert_eq!(reencode(&frame, &config()), frame);
        }
    }

    #[test]
    fn encode_response_rejects_unrepresentable_records() {
        let header = Header::new(0x01, 0x00, 0);
        let too_far = Payload::Status(StatusRecord {
            firmware: 1.0,
            angle: 0x0100_0000,
            limit_switches: [false, false],
        });
        assert!(encode_response(header, &too_far, &config()).is_err());

        let too_fast = Payload::Light(LightRecord {
            voltage: true,
            color: Color::default(),
            frequency: 64.0,
        });
        assert!(encode_response(Header::new(0x40, 0, 0), &too_fast, &config()).is_err());
    }
}
