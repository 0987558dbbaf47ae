//! DTLS 1.2 handshake and record engine.
//!
//! The handshake runs as a sequence of flights. Each flight has a generate
//! step producing the packets this side sends, and a parse step that pulls
//! the peer's answer out of the handshake cache and decides the next flight.
//!
//! [`Engine`] is the sans-IO core: feed it datagrams and timeouts, poll it for
//! packets to send and application data to deliver. [`Conn`] drives an engine
//! over any [`DatagramChannel`] with tokio.
//!
//! ```no_run
//! # async fn run() -> Result<(), dtls_flight::Error> {
//! use std::sync::Arc;
//! use dtls_flight::certificate::generate_self_signed_certificate;
//! use dtls_flight::{Config, Conn};
//! use tokio::net::UdpSocket;
//!
//! let socket = UdpSocket::bind("127.0.0.1:0").await?;
//! socket.connect("127.0.0.1:4444").await?;
//!
//! let config = Config::builder()
//!     .certificate(generate_self_signed_certificate()?)
//!     .build()?;
//!
//! let conn = Conn::client(socket, Arc::new(config)).await?;
//! conn.write(b"hello").await?;
//!
//! let mut buf = vec![0; 2048];
//! let n = conn.read(&mut buf).await?;
//! # let _ = n;
//! conn.close().await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]

#[macro_use]
extern crate log;

mod cache;
pub mod certificate;
mod config;
mod conn;
pub mod crypto;
mod engine;
mod error;
mod flight;
mod fragment;
pub mod message;
mod record_layer;
mod rng;
mod state;
mod timer;
mod util;
mod window;

pub use certificate::{CertVerifier, DtlsCertificate};
pub use config::{Config, ConfigBuilder, ExtendedMasterSecretPolicy};
pub use conn::{Conn, DatagramChannel, Status};
pub use crypto::{KeyingMaterial, SrtpProfile};
pub use engine::{Engine, Output};
pub use error::Error;

pub(crate) use rng::SeededRng;
