//! # Messenger
//!
//! Multiplexes whole [`Message`]s over one transport.
//!
//! ```text
//!                  ┌──────────── read task ─────────────┐
//!  TransportReader │ FrameDecoder → decrypt → Assembler │──► per-channel queues ──► enqueue_receive()
//!                  └────────────────────────────────────┘
//!                  ┌──────────── write task ────────────┐
//!  TransportWriter │  FIFO → fragment → encrypt → write │◄── enqueue_send()
//!                  └────────────────────────────────────┘
//! ```
//!
//! Per channel, received messages are handed out in arrival order: to the
//! oldest waiting receiver, or buffered until the next `enqueue_receive`.
//! Sends are written in submission order across all channels.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use aa_shared::{
    fragment, ChannelId, Cryptor, EncryptionType, Frame, FrameDecoder, FrameHeader, Message,
    MessageAssembler, TransportError, TransportReader, TransportWriter, MAX_FRAME_PAYLOAD,
};
use log::{debug, error, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::promise::{self, Promise, Resolver};

/// Cryptor shared by the read and write tasks and the session
pub type SharedCryptor = Arc<Mutex<Box<dyn Cryptor>>>;

/// Wrap a cryptor for sharing
pub fn share_cryptor(cryptor: Box<dyn Cryptor>) -> SharedCryptor {
    Arc::new(Mutex::new(cryptor))
}

/// Lock ignoring poisoning; the guarded state stays consistent per call
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

const READ_BUFFER_SIZE: usize = MAX_FRAME_PAYLOAD + 64;

/// Messages kept per channel while nobody receives on it
const MAX_BUFFERED_MESSAGES: usize = 32;

struct Outbound {
    message: Message,
    resolver: Resolver<()>,
}

#[derive(Default)]
struct ChannelQueue {
    waiting: VecDeque<Resolver<Message>>,
    ready: VecDeque<Result<Message>>,
    dropped: u64,
}

/// Receive side state shared with the read task
#[derive(Default)]
struct InboundQueues {
    channels: HashMap<ChannelId, ChannelQueue>,
    /// Set once the stream is unusable; every later receive fails with it
    failure: Option<Error>,
}

impl InboundQueues {
    fn receive(&mut self, channel: ChannelId, resolver: Resolver<Message>) {
        let queue = self.channels.entry(channel).or_default();
        if let Some(result) = queue.ready.pop_front() {
            resolver.complete(result);
        } else if let Some(failure) = &self.failure {
            resolver.reject(failure.clone());
        } else {
            queue.waiting.push_back(resolver);
        }
    }

    fn deliver(&mut self, channel: ChannelId, result: Result<Message>) {
        let queue = self.channels.entry(channel).or_default();
        let mut pending = result;
        while let Some(resolver) = queue.waiting.pop_front() {
            match resolver.try_complete(pending) {
                Ok(()) => return,
                // Receiver gave up, hand the message to the next one
                Err(returned) => pending = returned,
            }
        }
        if queue.ready.len() >= MAX_BUFFERED_MESSAGES {
            queue.ready.pop_front();
            queue.dropped += 1;
            if queue.dropped == 1 {
                warn!("[Messenger] nobody receives on {}, dropping oldest messages", channel);
            } else {
                debug!("[Messenger] dropped {} messages on {}", queue.dropped, channel);
            }
        }
        queue.ready.push_back(pending);
    }

    fn fail_all(&mut self, error: Error) {
        if self.failure.is_none() {
            self.failure = Some(error.clone());
        }
        for queue in self.channels.values_mut() {
            for resolver in queue.waiting.drain(..) {
                resolver.reject(error.clone());
            }
        }
    }
}

struct Inner {
    outbound: mpsc::UnboundedSender<Outbound>,
    inbound: Arc<Mutex<InboundQueues>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        for task in lock(&self.tasks).drain(..) {
            task.abort();
        }
    }
}

/// Handle to the channel multiplexer of one connection
#[derive(Clone)]
pub struct Messenger {
    inner: Arc<Inner>,
}

impl Messenger {
    /// Spawn the read and write tasks; must be called within a tokio runtime
    pub fn spawn<R, W>(reader: R, writer: W, cryptor: SharedCryptor) -> Self
    where
        R: TransportReader,
        W: TransportWriter,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let inbound = Arc::new(Mutex::new(InboundQueues::default()));

        let read_task = tokio::spawn(read_loop(reader, inbound.clone(), cryptor.clone()));
        let write_task = tokio::spawn(write_loop(writer, rx, cryptor));

        Self {
            inner: Arc::new(Inner {
                outbound: tx,
                inbound,
                tasks: Mutex::new(vec![read_task, write_task]),
            }),
        }
    }

    /// Wait for the next complete message on `channel`
    pub fn enqueue_receive(&self, channel: ChannelId) -> Promise<Message> {
        let (resolver, promise) = promise::pair();
        lock(&self.inner.inbound).receive(channel, resolver);
        promise
    }

    /// Queue `message` for sending; resolves once written to the transport
    pub fn enqueue_send(&self, message: Message) -> Promise<()> {
        let (resolver, promise) = promise::pair();
        if let Err(mpsc::error::SendError(outbound)) =
            self.inner.outbound.send(Outbound { message, resolver })
        {
            outbound.resolver.reject(Error::Aborted);
        }
        promise
    }

    /// Abort both I/O tasks and reject everything outstanding with `Aborted`
    pub fn stop(&self) {
        for task in lock(&self.inner.tasks).drain(..) {
            task.abort();
        }
        lock(&self.inner.inbound).fail_all(Error::Aborted);
    }
}

async fn read_loop<R: TransportReader>(
    mut reader: R,
    inbound: Arc<Mutex<InboundQueues>>,
    cryptor: SharedCryptor,
) {
    let mut decoder = FrameDecoder::new();
    let mut assembler = MessageAssembler::new();
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let read = match reader.read(&mut buf).await {
            Ok(0) => Err(TransportError::Disconnected),
            other => other,
        };
        let size = match read {
            Ok(size) => size,
            Err(e) => {
                warn!("[Messenger] receive stopped: {}", e);
                lock(&inbound).fail_all(Error::Transport(e));
                return;
            }
        };
        decoder.extend(&buf[..size]);

        loop {
            let frame = match decoder.next_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(e) => {
                    error!("[Messenger] corrupt frame header: {}", e);
                    lock(&inbound).fail_all(Error::Protocol(e));
                    return;
                }
            };

            let channel = match frame.header.channel_id() {
                Ok(channel) => channel,
                Err(_) => {
                    warn!(
                        "[Messenger] dropping {} byte frame for unknown channel {}",
                        frame.payload.len(),
                        frame.header.channel
                    );
                    continue;
                }
            };

            let payload = match frame.header.encryption {
                EncryptionType::Plain => frame.payload,
                EncryptionType::Encrypted => {
                    let decrypted = lock(&cryptor).decrypt(&frame.payload);
                    match decrypted {
                        Ok(plain) => plain,
                        Err(e) => {
                            warn!("[Messenger] decrypt failed on {}: {}", channel, e);
                            assembler.discard(channel);
                            lock(&inbound).deliver(channel, Err(Error::Handshake(e)));
                            continue;
                        }
                    }
                }
            };

            match assembler.push(channel, &frame.header, frame.total_size, &payload) {
                Ok(Some(message)) => {
                    debug!(
                        "[Messenger] received 0x{:04x} on {} ({} bytes)",
                        message.message_id,
                        channel,
                        message.payload.len()
                    );
                    lock(&inbound).deliver(channel, Ok(message));
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("[Messenger] reassembly failed on {}: {}", channel, e);
                    lock(&inbound).deliver(channel, Err(Error::Protocol(e)));
                }
            }
        }
    }
}

async fn write_loop<W: TransportWriter>(
    mut writer: W,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    cryptor: SharedCryptor,
) {
    let mut failure: Option<Error> = None;

    while let Some(Outbound { message, resolver }) = outbound.recv().await {
        if let Some(error) = &failure {
            resolver.reject(error.clone());
            continue;
        }

        let result = match encode_frames(&message, &cryptor) {
            Ok(bytes) => writer.write_all(&bytes).await.map_err(Error::Transport),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => {
                debug!(
                    "[Messenger] sent 0x{:04x} on {} ({} bytes)",
                    message.message_id,
                    message.channel,
                    message.payload.len()
                );
                resolver.resolve(());
            }
            Err(e) => {
                error!(
                    "[Messenger] send of 0x{:04x} on {} failed: {}",
                    message.message_id, message.channel, e
                );
                if matches!(e, Error::Transport(_)) {
                    failure = Some(e.clone());
                }
                resolver.reject(e);
            }
        }
    }

    let _ = writer.shutdown().await;
}

/// Fragment, encrypt and frame one message
fn encode_frames(message: &Message, cryptor: &SharedCryptor) -> Result<Vec<u8>> {
    let wire = message.to_wire();
    let mut out = Vec::with_capacity(wire.len() + 16);

    for piece in fragment(&wire) {
        let payload = match message.encryption {
            EncryptionType::Plain => piece.data.to_vec(),
            EncryptionType::Encrypted => lock(cryptor).encrypt(piece.data)?,
        };
        let frame = Frame {
            header: FrameHeader::new(
                message.channel,
                piece.frame_type,
                message.encryption,
                message.message_type,
            ),
            total_size: piece.total_size,
            payload,
        };
        frame.encode_into(&mut out)?;
    }

    Ok(out)
}
