//! # Media Module
//!
//! Audio and video plumbing: WAV decode/encode, ffmpeg subprocess wrappers,
//! and the range-splicing reconstruction that builds output clips.

pub mod ffmpeg;
pub mod reconstruct;
pub mod wav;
