use async_trait::async_trait;
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tokio_serial::{DataBits, FlowControl, Parity, SerialPortBuilderExt, SerialStream, StopBits};

use super::traits::Transport;
use crate::error::{CollectorError, Result};

/// Baud rate of the gesture device firmware
pub const DEFAULT_BAUD_RATE: u32 = 19200;

/// Transport over any tokio byte stream (serial port, pty, socket, mock)
pub struct StreamTransport<S> {
    stream: BufStream<S>,
    open: bool,
}

impl<S> StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    pub fn new(stream: S) -> Self {
        Self {
            stream: BufStream::new(stream),
            open: true,
        }
    }

    fn map_io(&mut self, err: io::Error) -> CollectorError {
        match err.kind() {
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => {
                self.open = false;
                CollectorError::TransportClosed
            }
            _ => CollectorError::Io(err),
        }
    }
}

impl StreamTransport<SerialStream> {
    /// Open a serial port (e.g. `/dev/ttyACM0`) as a raw 8N1 line without
    /// flow control. Sample bytes pass through untranslated.
    pub fn open_serial(port: &str, baud_rate: u32) -> Result<Self> {
        let stream = tokio_serial::new(port, baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .open_native_async()
            .map_err(|e| CollectorError::Io(e.into()))?;
        log::info!("Connected to gesture device at {} ({} baud)", port, baud_rate);
        Ok(Self::new(stream))
    }
}

#[async_trait]
impl<S> Transport for StreamTransport<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        if !self.open {
            return Err(CollectorError::TransportClosed);
        }
        if let Err(e) = self.stream.write_all(bytes).await {
            return Err(self.map_io(e));
        }
        if let Err(e) = self.stream.flush().await {
            return Err(self.map_io(e));
        }
        Ok(())
    }

    async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; n];
        match self.stream.read_exact(&mut buf).await {
            Ok(_) => Ok(buf),
            Err(e) => Err(self.map_io(e)),
        }
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut buf = Vec::new();
        let n = match self.stream.read_until(b'\n', &mut buf).await {
            Ok(n) => n,
            Err(e) => return Err(self.map_io(e)),
        };
        if n == 0 || buf.last() != Some(&b'\n') {
            self.open = false;
            return Err(CollectorError::TransportClosed);
        }
        String::from_utf8(buf)
            .map_err(|e| CollectorError::protocol(format!("Line is not valid UTF-8: {}", e)))
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn close(&mut self) -> Result<()> {
        if !self.open {
            return Ok(());
        }
        self.open = false;
        self.stream.shutdown().await?;
        Ok(())
    }
}
