//! # Transport & Cryptor Abstractions
//!
//! The session engine never touches a USB endpoint or a socket directly and
//! never sees key material. Both are supplied by the host through the traits
//! below:
//!
//! - **Interface Segregation**: Separate traits for reading and writing, so the
//!   two halves can live in different tasks
//! - **Dependency Inversion**: The messenger depends on these abstractions,
//!   tests plug in in-memory pipes and a fake cryptor
//!
//! ```text
//! ┌──────────────┐  read()   ┌────────────────┐  decrypt()  ┌───────────┐
//! │  Transport   │──────────►│   Messenger    │◄───────────►│  Cryptor  │
//! │ (USB / TCP)  │◄──────────│ (frames, msgs) │  encrypt()  │ (opaque)  │
//! └──────────────┘ write_all └────────────────┘             └───────────┘
//! ```

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt;
use core::future::Future;

/// Errors raised by a transport half
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The peer closed the connection
    Disconnected,
    /// Read operation failed
    ReadFailed(String),
    /// Write operation failed
    WriteFailed(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Disconnected => write!(f, "transport disconnected"),
            TransportError::ReadFailed(reason) => write!(f, "transport read failed: {}", reason),
            TransportError::WriteFailed(reason) => write!(f, "transport write failed: {}", reason),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransportError {}

/// Result type alias for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Receiving half of a transport
pub trait TransportReader: Send + 'static {
    /// Read available bytes into `buf`
    ///
    /// Returns the number of bytes read; `Ok(0)` means end of stream.
    fn read(&mut self, buf: &mut [u8]) -> impl Future<Output = TransportResult<usize>> + Send;
}

/// Sending half of a transport
pub trait TransportWriter: Send + 'static {
    /// Write the whole buffer
    fn write_all(&mut self, data: &[u8]) -> impl Future<Output = TransportResult<()>> + Send;

    /// Close the sending direction
    fn shutdown(&mut self) -> impl Future<Output = TransportResult<()>> + Send;
}

/// Outcome of one handshake step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStatus {
    /// More round trips are needed
    More,
    /// Handshake finished, records can be encrypted
    Done,
}

/// Errors raised by the cryptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CryptorError {
    /// Initialization failed (certificates, keys)
    Init(String),
    /// Handshake rejected or malformed
    Handshake(String),
    /// Record could not be encrypted
    Encrypt(String),
    /// Record could not be decrypted or authenticated
    Decrypt(String),
}

impl fmt::Display for CryptorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CryptorError::Init(reason) => write!(f, "cryptor init failed: {}", reason),
            CryptorError::Handshake(reason) => write!(f, "handshake failed: {}", reason),
            CryptorError::Encrypt(reason) => write!(f, "encryption failed: {}", reason),
            CryptorError::Decrypt(reason) => write!(f, "decryption failed: {}", reason),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for CryptorError {}

/// Opaque handshake and record layer (TLS in practice)
///
/// Calls are synchronous: the cryptor is a pure byte transformer and the
/// messenger holds it behind a lock only for the duration of one call.
pub trait Cryptor: Send {
    /// Prepare a fresh handshake
    fn init(&mut self) -> Result<(), CryptorError>;

    /// Release key material
    fn deinit(&mut self);

    /// Feed bytes received from the phone (empty on the first step)
    fn advance_handshake(&mut self, input: &[u8]) -> Result<HandshakeStatus, CryptorError>;

    /// Take bytes that must be sent to the phone as the next handshake message
    fn pending_handshake_output(&mut self) -> Result<Vec<u8>, CryptorError>;

    /// Encrypt one frame payload
    fn encrypt(&mut self, plain: &[u8]) -> Result<Vec<u8>, CryptorError>;

    /// Decrypt one frame payload
    fn decrypt(&mut self, cipher: &[u8]) -> Result<Vec<u8>, CryptorError>;

    /// Whether the handshake finished and records can be exchanged
    fn is_active(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::collections::VecDeque;
    use alloc::vec;

    struct ScriptedReader {
        chunks: VecDeque<Vec<u8>>,
    }

    impl TransportReader for ScriptedReader {
        async fn read(&mut self, buf: &mut [u8]) -> TransportResult<usize> {
            match self.chunks.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Ok(0),
            }
        }
    }

    #[derive(Default)]
    struct RecordingWriter {
        written: Vec<u8>,
        closed: bool,
    }

    impl TransportWriter for RecordingWriter {
        async fn write_all(&mut self, data: &[u8]) -> TransportResult<()> {
            if self.closed {
                return Err(TransportError::Disconnected);
            }
            self.written.extend_from_slice(data);
            Ok(())
        }

        async fn shutdown(&mut self) -> TransportResult<()> {
            self.closed = true;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_reader_reports_end_of_stream() {
        let mut reader = ScriptedReader {
            chunks: VecDeque::from(vec![vec![1, 2, 3]]),
        };
        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf).await, Ok(3));
        assert_eq!(&buf[..3], &[1, 2, 3]);
        assert_eq!(reader.read(&mut buf).await, Ok(0));
    }

    #[tokio::test]
    async fn test_writer_after_shutdown() {
        let mut writer = RecordingWriter::default();
        writer.write_all(&[9]).await.unwrap();
        writer.shutdown().await.unwrap();
        assert_eq!(
            writer.write_all(&[10]).await,
            Err(TransportError::Disconnected)
        );
        assert_eq!(writer.written, vec![9]);
    }

    #[test]
    fn test_error_display() {
        let err = TransportError::ReadFailed("reset".into());
        assert_eq!(alloc::format!("{}", err), "transport read failed: reset");
    }
}
