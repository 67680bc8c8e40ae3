//! Fixed-size framing and addressing for motor-controller buses.
//!
//! Every command is a 10-byte frame and every response an 8-byte frame,
//! both starting with the same three header bytes:
//! - address: device-family tag (high nibble) and local address (low nibble)
//! - sub-id: 0 for the primary channel, or a chained sub-unit
//! - mode: the command mode, or the response status code
//!
//! Encoding and decoding are pure; nothing here touches a transport.

pub mod address;
pub mod codec;
pub mod command;
pub mod error;
pub mod family;
pub mod mode;
pub mod payload;

pub use address::{ProtocolRevision, UnitAddress};
pub use codec::{
    decode, decoder_for, encode, encode_response, from_sign_magnitude, frequency_steps,
    to_sign_magnitude, Field, FrameConfig, Header, RxFrame, TxFrame, HEADER_SIZE, RX_SIZE,
    TX_PAYLOAD_SIZE, TX_SIZE,
};
pub use command::Command;
pub use error::{FrameError, Result};
pub use family::{family_name, DeviceFamily, BROADCAST, SUB_UNIT_TAG};
pub use mode::mode_name;
pub use payload::{
    Color, GenericRecord, LightRecord, Payload, Response, ResponseStatus, StatusRecord,
};
