//! Command/response frame layout.
//!
//! Every command and response on the link is a packed little-endian frame:
//!
//! ```text
//! command:  [command_id:1][sequence_num:1][data_length:2][data...]
//! response: [response_id:1][status_code:1][sequence_num:1][data_length:2][data...]
//! ```
//!
//! Responses are built in an owned bounded buffer constructed per request and
//! consumed by the link send call; nothing is shared between dispatches.

/// Fixed command header: id, sequence, 16-bit payload length.
pub const COMMAND_HEADER_LEN: usize = 4;

/// Fixed response header: id, status, sequence, 16-bit payload length.
pub const RESPONSE_HEADER_LEN: usize = 5;

/// Response payload capacity. Handlers must never need more.
pub const RESPONSE_DATA_CAPACITY: usize = 256;

/// Total bounded response frame size.
pub const RESPONSE_FRAME_CAPACITY: usize = RESPONSE_HEADER_LEN + RESPONSE_DATA_CAPACITY;

// ---------------------------------------------------------------------------
// Status taxonomy
// ---------------------------------------------------------------------------

/// Response status byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StatusCode {
    Success = 0x00,
    Error = 0x01,
    InvalidCommand = 0x02,
    InvalidParameter = 0x03,
    Busy = 0x04,
    NotSupported = 0x05,
}

impl StatusCode {
    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0x00 => Some(Self::Success),
            0x01 => Some(Self::Error),
            0x02 => Some(Self::InvalidCommand),
            0x03 => Some(Self::InvalidParameter),
            0x04 => Some(Self::Busy),
            0x05 => Some(Self::NotSupported),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Command parsing
// ---------------------------------------------------------------------------

/// A parsed view over an incoming command frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandFrame<'a> {
    pub command_id: u8,
    pub sequence_num: u8,
    pub data: &'a [u8],
}

/// Why a raw frame failed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// Shorter than the fixed header.
    TooShort { got: usize },
    /// `data_length` disagrees with the received byte count.
    LengthMismatch { declared: usize, actual: usize },
}

impl<'a> CommandFrame<'a> {
    /// Validate and parse a raw frame.
    pub fn parse(raw: &'a [u8]) -> Result<Self, FrameError> {
        if raw.len() < COMMAND_HEADER_LEN {
            return Err(FrameError::TooShort { got: raw.len() });
        }

        let declared = u16::from_le_bytes([raw[2], raw[3]]) as usize;
        let actual = raw.len() - COMMAND_HEADER_LEN;
        if declared != actual {
            return Err(FrameError::LengthMismatch { declared, actual });
        }

        Ok(Self {
            command_id: raw[0],
            sequence_num: raw[1],
            data: &raw[COMMAND_HEADER_LEN..],
        })
    }

    /// Encode a command frame (host-side clients and tests).
    pub fn encode(command_id: u8, sequence_num: u8, data: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(COMMAND_HEADER_LEN + data.len());
        out.push(command_id);
        out.push(sequence_num);
        out.extend_from_slice(&(data.len() as u16).to_le_bytes());
        out.extend_from_slice(data);
        out
    }
}

// ---------------------------------------------------------------------------
// Response building
// ---------------------------------------------------------------------------

/// An owned response frame, header maintained as the payload grows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    buf: heapless::Vec<u8, RESPONSE_FRAME_CAPACITY>,
}

impl Response {
    /// A response with an empty payload.
    pub fn new(response_id: u8, status: StatusCode, sequence_num: u8) -> Self {
        let mut buf = heapless::Vec::new();
        let _ = buf.push(response_id);
        let _ = buf.push(status as u8);
        let _ = buf.push(sequence_num);
        let _ = buf.push(0);
        let _ = buf.push(0);
        Self { buf }
    }

    /// A response carrying `payload`. Payloads beyond the fixed capacity are
    /// a handler bug and are truncated.
    pub fn with_payload(
        response_id: u8,
        status: StatusCode,
        sequence_num: u8,
        payload: &[u8],
    ) -> Self {
        let mut resp = Self::new(response_id, status, sequence_num);
        resp.extend_payload(payload);
        resp
    }

    /// Append payload bytes, updating `data_length`. Returns `false` if the
    /// bytes did not fit.
    pub fn extend_payload(&mut self, bytes: &[u8]) -> bool {
        debug_assert!(
            self.buf.len() + bytes.len() <= RESPONSE_FRAME_CAPACITY,
            "response payload overflows the bounded buffer"
        );
        let fitted = self.buf.extend_from_slice(bytes).is_ok();
        let len = (self.buf.len() - RESPONSE_HEADER_LEN) as u16;
        self.buf[3..5].copy_from_slice(&len.to_le_bytes());
        fitted
    }

    pub fn response_id(&self) -> u8 {
        self.buf[0]
    }

    pub fn status(&self) -> u8 {
        self.buf[1]
    }

    pub fn sequence_num(&self) -> u8 {
        self.buf[2]
    }

    pub fn data_length(&self) -> u16 {
        u16::from_le_bytes([self.buf[3], self.buf[4]])
    }

    pub fn payload(&self) -> &[u8] {
        &self.buf[RESPONSE_HEADER_LEN..]
    }

    /// The full frame, ready for the link send call.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }
}
