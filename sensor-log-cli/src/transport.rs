//! A plain-TCP [`Transport`] backed by a tokio socket, the concrete
//! transport a real upload needs in place of the in-memory loopback used by
//! the `s4pp` crate's own tests.

use embedded_io_adapters::tokio_1::FromTokio;
use embedded_io_async::{ErrorType, Read, Write};
use s4pp_transport::Transport;
use tokio::net::TcpStream;

pub struct TcpTransport {
    server: String,
    port: u16,
    stream: Option<FromTokio<TcpStream>>,
}

impl TcpTransport {
    pub fn new(server: impl Into<String>, port: u16) -> Self {
        Self {
            server: server.into(),
            port,
            stream: None,
        }
    }

    fn stream_mut(&mut self) -> Result<&mut FromTokio<TcpStream>, std::io::Error> {
        self.stream
            .as_mut()
            .ok_or_else(|| std::io::Error::other("not connected"))
    }
}

impl ErrorType for TcpTransport {
    type Error = std::io::Error;
}

impl Read for TcpTransport {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.stream_mut()?.read(buf).await
    }
}

impl Write for TcpTransport {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.stream_mut()?.write(buf).await
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.stream_mut()?.flush().await
    }
}

impl Transport for TcpTransport {
    async fn connect(&mut self) -> Result<(), Self::Error> {
        let stream = TcpStream::connect((self.server.as_str(), self.port)).await?;
        self.stream = Some(FromTokio::new(stream));
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), Self::Error> {
        self.stream = None;
        Ok(())
    }
}
