//! Live seat availability over server-sent events.

mod sse;
mod tracker;

pub use sse::{SseDecoder, SseEvent};
pub use tracker::{
    EventStream, HttpSeatSource, SeatEvent, SeatEventSource, SeatFeed, SeatTracker, StreamState,
};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Failed to connect: {0}")]
    Connect(String),
    #[error("Stream endpoint returned status {0}")]
    Status(u16),
    #[error("Stream transport error: {0}")]
    Transport(String),
    #[error("Stream ended")]
    Ended,
    #[error("Malformed seat update: {0}")]
    Parse(String),
}

pub type StreamResult<T> = Result<T, StreamError>;
