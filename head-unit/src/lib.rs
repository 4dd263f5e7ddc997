//! # Android Auto Head Unit Session Engine
//!
//! Drives the car side of a projection session with a phone:
//!
//! - **Messenger**: channel multiplexing, fragmentation and per-frame encryption
//! - **Session**: control channel state machine (version, handshake,
//!   discovery, focus, keepalive, bye-bye)
//! - **Services**: one per data channel, proxying to host devices
//! - **Continuations**: promises resolved on the session actor
//! - **App**: owner of the single live session
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                         Session actor                          │
//! │                                                                │
//! │  mailbox ──► control state machine ──► ServiceRegistry         │
//! │     ▲              │      │               │  audio / video     │
//! │     │              │      └─ Pinger       │  mic / input       │
//! │     │              ▼                      ▼  sensor / bluetooth│
//! │     └──────────── Messenger ◄──────── ServiceContext           │
//! └──────────────────────│─────────────────────────────────────────┘
//!                        ▼
//!            Transport (TCP / USB) + Cryptor
//! ```
//!
//! The host supplies the transport halves, the cryptor and the devices;
//! everything else runs on tokio.

pub mod app;
pub mod config;
pub mod error;
pub mod logging;
pub mod messenger;
pub mod pinger;
pub mod projection;
pub mod promise;
pub mod service;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use app::{App, SessionFactory};
pub use config::Configuration;
pub use error::{Error, Result};
pub use messenger::Messenger;
pub use promise::{Promise, Resolver};
pub use service::{DeviceProvider, Service, ServiceContext, ServiceFactory, ServiceRegistry};
pub use session::{Session, SessionEventHandler, SessionHandle, SessionState};
pub use transport::StreamTransport;

/// Engine version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
