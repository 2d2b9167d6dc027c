use async_trait::async_trait;
use crate::error::Result;

/// Byte-oriented link to the gesture sensing device.
///
/// Reads wait until the requested data arrives; deadlines are applied by the
/// caller, not the transport.
#[async_trait]
pub trait Transport: Send {
    /// Write all bytes. Fails with `TransportClosed` if the link is not open.
    async fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Read exactly `n` bytes
    async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>>;

    /// Read one newline-terminated UTF-8 line, terminator included
    async fn read_line(&mut self) -> Result<String>;

    /// Check if the link is currently open
    fn is_open(&self) -> bool;

    /// Close the link
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Box<T> {
    async fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes).await
    }

    async fn read_exact(&mut self, n: usize) -> Result<Vec<u8>> {
        (**self).read_exact(n).await
    }

    async fn read_line(&mut self) -> Result<String> {
        (**self).read_line().await
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}
