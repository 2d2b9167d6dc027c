use serde::{Deserialize, Serialize};

/// Command bytes understood by the device firmware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Command {
    MeasurementStart = 0xAB,
    Recalibrate = 0xAC,
    SetSampleRate = 0xAD,
}

impl Command {
    pub fn byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0xAB => Some(Command::MeasurementStart),
            0xAC => Some(Command::Recalibrate),
            0xAD => Some(Command::SetSampleRate),
            _ => None,
        }
    }

    /// Payload bytes following the command byte
    pub fn payload_len(self) -> usize {
        match self {
            Command::MeasurementStart => 4, // u32 sample count
            Command::Recalibrate => 0,
            Command::SetSampleRate => 2, // u16 frequency
        }
    }
}

/// A complete host-to-device command frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Request {
    Recalibrate,
    SetSampleRate(u16),
    MeasurementStart(u32),
}

impl Request {
    pub fn command(&self) -> Command {
        match self {
            Request::Recalibrate => Command::Recalibrate,
            Request::SetSampleRate(_) => Command::SetSampleRate,
            Request::MeasurementStart(_) => Command::MeasurementStart,
        }
    }

    /// Command byte followed by the little-endian payload
    pub fn encode(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(1 + self.command().payload_len());
        bytes.push(self.command().byte());
        match self {
            Request::Recalibrate => {}
            Request::SetSampleRate(frequency) => bytes.extend_from_slice(&frequency.to_le_bytes()),
            Request::MeasurementStart(count) => bytes.extend_from_slice(&count.to_le_bytes()),
        }
        bytes
    }

    /// Decode one frame from the front of `bytes`.
    ///
    /// Returns `Ok(None)` while the frame is incomplete and `Err(byte)` for an
    /// unknown command byte.
    pub fn decode(bytes: &[u8]) -> Result<Option<(Request, usize)>, u8> {
        let Some(&first) = bytes.first() else {
            return Ok(None);
        };
        let command = Command::from_byte(first).ok_or(first)?;
        let len = 1 + command.payload_len();
        if bytes.len() < len {
            return Ok(None);
        }

        let payload = &bytes[1..len];
        let request = match command {
            Command::Recalibrate => Request::Recalibrate,
            Command::SetSampleRate => {
                Request::SetSampleRate(u16::from_le_bytes([payload[0], payload[1]]))
            }
            Command::MeasurementStart => Request::MeasurementStart(u32::from_le_bytes([
                payload[0], payload[1], payload[2], payload[3],
            ])),
        };
        Ok(Some((request, len)))
    }
}
