//! # HTTP Request Handlers
//!
//! One module per endpoint: source upload (ingestion) and generation. Both
//! decode the wire shapes, then run the blocking pipeline on the worker pool
//! so dispatch threads are never tied up in ffmpeg or recognition.

mod generate;
mod source;

pub use generate::generate_output;
pub use source::upload_source;
