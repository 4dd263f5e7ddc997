//! Transport halves over tokio byte streams
//!
//! USB accessory I/O is supplied by the host. Anything that is
//! `AsyncRead + AsyncWrite` (a TCP socket for wireless projection, an
//! in-memory duplex pipe in tests) can be used through [`StreamTransport`].

use aa_shared::{TransportError, TransportReader, TransportResult, TransportWriter};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Reading half backed by an `AsyncRead`
#[derive(Debug)]
pub struct StreamReader<R> {
    inner: R,
}

/// Writing half backed by an `AsyncWrite`
#[derive(Debug)]
pub struct StreamWriter<W> {
    inner: W,
}

impl<R> TransportReader for StreamReader<R>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    async fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
        self.inner
            .read(buf)
            .await
            .map_err(|e| TransportError::ReadFailed(e.to_string()))
    }
}

impl<W> TransportWriter for StreamWriter<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    async fn write_all(&mut self, data: &[u8]) -> TransportResult<()> {
        self.inner
            .write_all(data)
            .await
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;
        self.inner
            .flush()
            .await
            .map_err(|e| TransportError::WriteFailed(e.to_string()))
    }

    async fn shutdown(&mut self) -> TransportResult<()> {
        self.inner
            .shutdown()
            .await
            .map_err(|e| TransportError::WriteFailed(e.to_string()))
    }
}

/// Splits byte streams into transport halves
pub struct StreamTransport;

impl StreamTransport {
    /// Split any bidirectional stream
    pub fn split<S>(stream: S) -> (StreamReader<ReadHalf<S>>, StreamWriter<WriteHalf<S>>)
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (read, write) = tokio::io::split(stream);
        (StreamReader { inner: read }, StreamWriter { inner: write })
    }

    /// Split an accepted TCP connection
    pub fn from_tcp(stream: TcpStream) -> (StreamReader<OwnedReadHalf>, StreamWriter<OwnedWriteHalf>) {
        if let Err(e) = stream.set_nodelay(true) {
            log::warn!("[Transport] failed to set TCP_NODELAY: {}", e);
        }
        let (read, write) = stream.into_split();
        (StreamReader { inner: read }, StreamWriter { inner: write })
    }
}
