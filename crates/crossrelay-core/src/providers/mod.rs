//! HTTP translation and transcription providers.

mod deepl;
mod http_client;
mod whisper;

pub use deepl::DeepLTranslator;
pub use whisper::WhisperTranscriber;
