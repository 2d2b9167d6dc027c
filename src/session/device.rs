use log::{debug, info, warn};
use std::future::Future;
use std::time::{Duration, Instant};

use super::state::{Calibration, SessionState};
use crate::core::{GestureRecord, Sample};
use crate::error::{CollectorError, Result};
use crate::hal::{Request, Transport};

/// Timing diagnostics for one measurement window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeasurementReport {
    pub samples: u32,
    pub sample_rate: u32,
    pub expected: Duration,
    pub elapsed: Duration,
}

impl MeasurementReport {
    /// Samples per second actually delivered by the device
    pub fn achieved_rate(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.samples as f64 / secs
        } else {
            0.0
        }
    }
}

async fn with_deadline<F, R>(deadline: Option<Duration>, fut: F) -> Result<R>
where
    F: Future<Output = Result<R>>,
{
    match deadline {
        Some(d) => tokio::time::timeout(d, fut)
            .await
            .map_err(|_| CollectorError::Timeout(d))?,
        None => fut.await,
    }
}

/// Owns the link to one device and drives the acquisition protocol
pub struct DeviceSession<T: Transport> {
    transport: T,
    state: SessionState,
    read_timeout: Option<Duration>,
}

impl<T: Transport> DeviceSession<T> {
    pub fn new(transport: T) -> Self {
        let state = if transport.is_open() {
            SessionState::Connected(Calibration::Uncalibrated)
        } else {
            SessionState::Disconnected
        };
        Self {
            transport,
            state,
            read_timeout: None,
        }
    }

    /// Fail reads that take longer than `timeout` instead of waiting forever
    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Reuse a resistance measured on an earlier connection
    pub fn with_resistance(mut self, resistance: u32) -> Self {
        if resistance > 0 && matches!(self.state, SessionState::Connected(_)) {
            self.state = SessionState::Connected(Calibration::Calibrated(resistance));
        }
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn calibration(&self) -> Calibration {
        self.state.calibration()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    fn transition(&mut self, next: SessionState) -> Result<()> {
        if !self.state.can_transition_to(&next) {
            return Err(CollectorError::InvalidState(format!(
                "Cannot move from {} to {}",
                self.state.name(),
                next.name()
            )));
        }
        self.state = next;
        Ok(())
    }

    fn ensure_connected(&mut self) -> Result<()> {
        if self.state == SessionState::Disconnected || !self.transport.is_open() {
            self.state = SessionState::Disconnected;
            return Err(CollectorError::TransportClosed);
        }
        Ok(())
    }

    fn observe<R>(&mut self, result: Result<R>) -> Result<R> {
        if matches!(result, Err(CollectorError::TransportClosed)) {
            self.state = SessionState::Disconnected;
        }
        result
    }

    async fn send(&mut self, request: Request) -> Result<()> {
        let result = self.transport.write(&request.encode()).await;
        self.observe(result)
    }

    async fn read_line(&mut self) -> Result<String> {
        let result = with_deadline(self.read_timeout, self.transport.read_line()).await;
        self.observe(result)
    }

    async fn read_sample(&mut self) -> Result<Sample> {
        let result = with_deadline(self.read_timeout, self.transport.read_exact(Sample::WIRE_SIZE)).await;
        let bytes = self.observe(result)?;
        let bytes = <[u8; Sample::WIRE_SIZE]>::try_from(bytes.as_slice()).map_err(|_| {
            CollectorError::protocol(format!("Expected {} sample bytes, got {}", Sample::WIRE_SIZE, bytes.len()))
        })?;
        Ok(Sample::from_le_bytes(bytes))
    }

    /// Ask the device to recalibrate and store the reported resistance
    pub async fn recalibrate(&mut self) -> Result<u32> {
        self.ensure_connected()?;
        info!("Recalibrating light sensitivity of device");

        self.send(Request::Recalibrate).await?;
        let line = self.read_line().await?;
        let reply = line.trim();
        let resistance: u32 = reply
            .parse()
            .map_err(|_| CollectorError::protocol(format!("Invalid resistance reply '{}'", reply)))?;
        if resistance == 0 {
            return Err(CollectorError::protocol("Device reported zero resistance"));
        }

        self.transition(SessionState::Connected(Calibration::Calibrated(resistance)))?;
        info!("Resistance set to {} Ohms", resistance);
        Ok(resistance)
    }

    /// Configure the device sampling frequency (Hz)
    pub async fn set_sample_rate(&mut self, frequency: u32) -> Result<()> {
        let frequency = u16::try_from(frequency)
            .ok()
            .filter(|f| *f > 0)
            .ok_or_else(|| {
                CollectorError::InvalidArgument(format!("Sample rate {} Hz is not in 1..=65535", frequency))
            })?;
        self.ensure_connected()?;
        if !matches!(self.state, SessionState::Connected(_)) {
            return Err(CollectorError::InvalidState(format!(
                "Cannot set sample rate while {}",
                self.state.name()
            )));
        }

        info!("Setting sample frequency to {} Hz", frequency);
        self.send(Request::SetSampleRate(frequency)).await?;
        let ack = self.read_line().await?;
        debug!("[Serial] '{}'", ack.trim());
        Ok(())
    }

    /// Acquire `floor(duration * sample_rate)` samples into a new record.
    ///
    /// Recalibrates first if the session has no calibration yet. Arguments are
    /// validated before anything is sent to the device.
    pub async fn measure(&mut self, duration: f64, sample_rate: u32, log: bool) -> Result<GestureRecord> {
        let (record, _) = self.measure_with_report(duration, sample_rate, log).await?;
        Ok(record)
    }

    pub async fn measure_with_report(
        &mut self,
        duration: f64,
        sample_rate: u32,
        log: bool,
    ) -> Result<(GestureRecord, MeasurementReport)> {
        if !duration.is_finite() || duration < 0.0 {
            return Err(CollectorError::InvalidArgument(format!("Invalid duration {}", duration)));
        }
        if u16::try_from(sample_rate).is_err() {
            return Err(CollectorError::InvalidArgument(format!(
                "Sample rate {} Hz is not in 0..=65535",
                sample_rate
            )));
        }
        self.ensure_connected()?;
        info!("Starting measurement on device");

        let resistance = match self.calibration() {
            Calibration::Calibrated(r) => r,
            Calibration::Uncalibrated => {
                warn!("Resistance is not set. Recalibrating.");
                self.recalibrate().await?
            }
        };

        // A 0 Hz window holds no samples; the device keeps its previous rate
        if sample_rate > 0 {
            self.set_sample_rate(sample_rate).await?;
        }

        let mut record = GestureRecord::new(resistance, sample_rate, duration);
        info!(
            "Sampling for {} seconds at {} Hz. Expecting {} samples. Resistance is {} Ohms.",
            duration, sample_rate, record.samples, resistance
        );

        self.transition(SessionState::Sampling { resistance })?;
        let elapsed = match self.sample_window(&mut record, log).await {
            Ok(elapsed) => elapsed,
            Err(e) => {
                if self.state != SessionState::Disconnected {
                    warn!("Measurement aborted: {}; device output may be out of sync", e);
                    self.state = SessionState::Connected(Calibration::Calibrated(resistance));
                }
                return Err(e);
            }
        };
        self.transition(SessionState::Connected(Calibration::Calibrated(resistance)))?;

        let report = MeasurementReport {
            samples: record.samples,
            sample_rate,
            expected: Duration::from_secs_f64(duration),
            elapsed,
        };
        info!(
            "Measurement took {:.3} seconds (expected {:.3} seconds). Achieved sampling rate of {:.1} Hz (expected {} Hz)",
            report.elapsed.as_secs_f64(),
            duration,
            report.achieved_rate(),
            sample_rate
        );

        Ok((record, report))
    }

    async fn sample_window(&mut self, record: &mut GestureRecord, log: bool) -> Result<Duration> {
        let samples = record.samples;
        self.send(Request::MeasurementStart(samples)).await?;

        let start = Instant::now();
        for i in 0..samples {
            let sample = self.read_sample().await?;
            if log {
                info!("[Measurement {}] {}, {}, {}", i, sample.r0, sample.r1, sample.r2);
            }
            record.push(sample);
        }
        let elapsed = start.elapsed();

        let confirmation = self.read_line().await?;
        debug!("[Serial] '{}'", confirmation.trim());
        Ok(elapsed)
    }

    /// Close the link. Further operations fail with `TransportClosed`.
    pub async fn close(&mut self) -> Result<()> {
        self.state = SessionState::Disconnected;
        self.transport.close().await
    }
}
