//! Voice ingestion.
//!
//! Voice messages arrive as audio bytes downloaded from the chat platform.
//! They are staged to a temporary file, transcribed by the speech-to-text
//! service, and the resulting text enters the message pipeline like any
//! typed message.
//!
//! ```text
//! voice clip → temp file → SpeechToText → text → MessagePipeline
//! ```

pub mod transcriber;

// Re-export key types
pub use transcriber::{Transcriber, TranscriptionError, DEFAULT_AUDIO_SUFFIX};
