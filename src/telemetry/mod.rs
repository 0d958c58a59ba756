//! # Telemetry Domain
//!
//! Types and pure logic for sensor telemetry: the raw envelope as it arrives
//! from the broker or the HTTP fallback, the validated [`Reading`], the
//! decoder that turns one into the other, and the bounded ring of recent raw
//! payloads.
//!
//! ```text
//! telemetry/
//! ├── payload.rs      - RawPayload, the opaque inbound envelope
//! ├── reading.rs      - Reading, the validated record
//! ├── decoder.rs      - RawPayload ──► Reading | DecodeError
//! └── ring_buffer.rs  - most-recent-first window of raw payloads
//! ```
//!
//! Nothing in here performs I/O. Storage and fan-out live in
//! [`crate::persistence`] and [`crate::broadcast`].

pub mod decoder;
pub mod payload;
pub mod reading;
pub mod ring_buffer;

pub use decoder::{decode, DecodeError};
pub use payload::RawPayload;
pub use reading::Reading;
pub use ring_buffer::RawRingBuffer;
