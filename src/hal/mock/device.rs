use async_trait::async_trait;
use std::collections::VecDeque;

use crate::core::Sample;
use crate::error::{CollectorError, Result};
use crate::hal::{Request, Transport};

/// In-memory stand-in for the photodiode board.
///
/// Command frames written to it are parsed as the firmware would and the
/// replies are queued for the host to read. Synthetic readings model a hand
/// passing over the three diodes one after another.
pub struct SimulatedGestureDevice {
    open: bool,
    resistance: u32,
    sample_rate: u16,
    inbox: Vec<u8>,
    outbox: VecDeque<u8>,
    received: Vec<Request>,
}

impl SimulatedGestureDevice {
    pub fn new() -> Self {
        Self {
            open: true,
            resistance: 22000,
            sample_rate: 100,
            inbox: Vec::new(),
            outbox: VecDeque::new(),
            received: Vec::new(),
        }
    }

    /// Resistance reported on the next recalibration
    pub fn with_resistance(mut self, resistance: u32) -> Self {
        self.resistance = resistance;
        self
    }

    /// Requests received so far, in order
    pub fn received(&self) -> &[Request] {
        &self.received
    }

    pub fn recalibrations(&self) -> usize {
        self.received
            .iter()
            .filter(|r| matches!(r, Request::Recalibrate))
            .count()
    }

    pub fn sample_rate(&self) -> u16 {
        self.sample_rate
    }

    /// Simulate the link dropping
    pub fn disconnect(&mut self) {
        self.open = false;
        self.outbox.clear();
    }

    /// Readings for sample `index` of a `count`-sample window
    pub fn reading(index: u32, count: u32) -> Sample {
        const BASELINE: f64 = 900.0;
        const DEPTH: f64 = 600.0;
        const WIDTH: f64 = 0.08;

        let t = if count > 1 {
            index as f64 / (count - 1) as f64
        } else {
            0.0
        };
        let channel = |center: f64| {
            let x = (t - center) / WIDTH;
            (BASELINE - DEPTH * (-x * x).exp()).round() as u16
        };
        Sample::new(channel(0.25), channel(0.5), channel(0.75))
    }

    fn push_line(&mut self, line: &str) {
        self.outbox.extend(line.as_bytes());
        self.outbox.extend(b"\r\n");
    }

    fn handle(&mut self, request: Request) {
        log::trace!("Simulated device received {:?}", request);
        self.received.push(request);

        match request {
            Request::Recalibrate => {
                let line = self.resistance.to_string();
                self.push_line(&line);
            }
            Request::SetSampleRate(frequency) => {
                self.sample_rate = frequency;
                self.push_line(&format!("Sample rate set to {} Hz", frequency));
            }
            Request::MeasurementStart(count) => {
                for i in 0..count {
                    let sample = Self::reading(i, count);
                    self.outbox.extend(sample.to_le_bytes());
                }
                self.push_line("Measurement done");
            }
        }
    }

    fn process_inbox(&mut self) -> Result<()> {
        loop {
            match Request::decode(&self.inbox) {
                Ok(Some((request, used))) => {
                    self.inbox.drain(..used);
                    self.handle(request);
                }
                Ok(None) => return Ok(()),
                Err(byte) => {
                    self.inbox.clear();
                    return Err(CollectorError::protocol(format!(
                        "Unknown command byte 0x{:02X}",
                        byte
                    )));
                }
            }
        }
    }

    fn starved(&self) -> CollectorError {
        CollectorError::protocol("Simulated device has no pending output")
    }
}

impl Default for SimulatedGestureDevice {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for SimulatedGestureDevice {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.open {
            return Err(CollectorError::TransportClosed);
        }
        self.inbox.extend_from_slice(bytes);
        self.process_inbox()
    }

    async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        if !self.open {
            return Err(CollectorError::TransportClosed);
        }
        if self.outbox.len() < n {
            return Err(self.starved());
        }
        Ok(self.outbox.drain(..n).collect())
    }

    async fn read_line(&mut self) -> Result<String> {
        if !self.open {
            return Err(CollectorError::TransportClosed);
        }
        let end = self
            .outbox
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| self.starved())?;
        let bytes: Vec<u8> = self.outbox.drain(..=end).collect();
        String::from_utf8(bytes)
            .map_err(|e| CollectorError::protocol(format!("Line is not valid UTF-8: {}", e)))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recalibrate_reply() {
        let mut device = SimulatedGestureDevice::new().with_resistance(330000);
        device.write(&Request::Recalibrate.encode()).await.unwrap();
        assert_eq!(device.read_line().await.unwrap(), "330000\r\n");
        assert_eq!(device.recalibrations(), 1);
    }

    #[tokio::test]
    async fn test_split_command_frame() {
        let mut device = SimulatedGestureDevice::new();
        let frame = Request::SetSampleRate(500).encode();
        device.write(&frame[..2]).await.unwrap();
        assert!(device.received().is_empty());
        device.write(&frame[2..]).await.unwrap();
        assert_eq!(device.received(), &[Request::SetSampleRate(500)]);
        assert_eq!(device.sample_rate(), 500);
    }

    #[tokio::test]
    async fn test_unknown_command_rejected() {
        let mut device = SimulatedGestureDevice::new();
        let err = device.write(&[0x01]).await.unwrap_err();
        assert!(matches!(err, CollectorError::Protocol(_)));
    }

    #[test]
    fn test_reading_dips_in_order() {
        let count = 101;
        let first = SimulatedGestureDevice::reading(25, count);
        let last = SimulatedGestureDevice::reading(75, count);
        assert!(first.r0 < first.r2);
        assert!(last.r2 < last.r0);
    }
}
