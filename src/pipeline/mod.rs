//! # Pipeline Module
//!
//! The two end-to-end flows of the service: ingestion (upload to transcript)
//! and generation (word selection to output media). Both are synchronous and
//! are run on the blocking pool by the HTTP handlers.

pub mod generate;
pub mod ingest;
