//! Stream demultiplexing for advisor responses.
//!
//! The advisor answers with a single plain-text body in which prose and tool
//! announcements are interleaved. Two stages turn that body into something a
//! renderer can use:
//!
//! - [`Utf8StreamDecoder`]: bytes to text, tolerant of characters split
//!   across network chunks
//! - [`MarkerScanner`]: text to [`ScanEvent`]s, removing tool marker lines
//!   and reporting them as events in stream order
//!
//! Both stages are plain synchronous state machines; all I/O and
//! cancellation lives in [`crate::chat`].

mod decoder;
mod markers;
mod scanner;

pub use decoder::Utf8StreamDecoder;
pub use markers::{
    Marker, MarkerSyntax, DEFAULT_TOOL_END_TOKEN, DEFAULT_TOOL_START_TOKEN, MARKER_PREFIX,
};
pub use scanner::{MarkerScanner, ScanEvent};
