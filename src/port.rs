//! Serial port abstraction for the modem channel

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_serial::{SerialPortBuilderExt, SerialStream};

/// A byte stream the modem can be driven over
pub trait PortStream: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> PortStream for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Factory for opening the modem channel
#[async_trait]
pub trait PortConnector: Send + Sync {
    /// The stream type this connector produces
    type Stream: PortStream;

    /// Attempt to open the port
    async fn connect(&self) -> Result<Self::Stream>;

    /// Human-readable name for this port
    fn name(&self) -> String;
}

/// Opens a local serial device
pub struct SerialConnector {
    path: String,
    baud: u32,
}

impl SerialConnector {
    pub fn new(path: impl Into<String>, baud: u32) -> Self {
        Self {
            path: path.into(),
            baud,
        }
    }
}

#[async_trait]
impl PortConnector for SerialConnector {
    type Stream = SerialStream;

    async fn connect(&self) -> Result<Self::Stream> {
        tokio_serial::new(&self.path, self.baud)
            .open_native_async()
            .with_context(|| format!("opening {} at {} baud", self.path, self.baud))
    }

    fn name(&self) -> String {
        format!("serial:{}:{}", self.path, self.baud)
    }
}
