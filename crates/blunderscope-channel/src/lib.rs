//! Progress delivery channel for Blunderscope analysis sessions.
//!
//! This crate abstracts "push updates from the server about one session"
//! behind a single contract with two interchangeable implementations:
//! - `SseTransport` - a live server-sent-events stream
//! - `PollTransport` - a fixed-interval polling loop
//!
//! A `ProgressChannel` owns the background task driving the configured
//! transport. Transient transport failures are retried after a fixed backoff
//! and never surface to the consumer; only a terminal event (or an exhausted
//! retry bound) ends delivery.
//!
//! # Example
//!
//! ```ignore
//! use blunderscope_channel::{build_transport, ChannelConfig, ProgressChannel};
//! use blunderscope_models::SessionId;
//! use tokio::sync::mpsc;
//! use url::Url;
//!
//! let config = ChannelConfig::default();
//! let base_url = Url::parse("http://localhost:8080/")?;
//! let transport = build_transport(&reqwest::Client::new(), &base_url, &config);
//!
//! let (tx, mut rx) = mpsc::channel(256);
//! let mut channel = ProgressChannel::open(transport, config, SessionId::new(), tx);
//!
//! while let Some(event) = rx.recv().await {
//!     println!("event: {:?}", event);
//!     if event.is_terminal() {
//!         break;
//!     }
//! }
//! channel.close().await;
//! ```

pub mod channel;
pub mod config;
pub mod error;
pub mod poll;
pub mod sse;

pub use channel::{build_transport, AttemptOutcome, EventSink, ProgressChannel, ProgressTransport};
pub use config::{ChannelConfig, TransportKind};
pub use error::{ChannelError, Result};
pub use poll::PollTransport;
pub use sse::SseTransport;
