//! Audio capability: text-to-speech, speech-to-text, and translation.
//!
//! Feature discovery happens via a `supported_features`-style query plus
//! an explicit "unsupported" error for operations a given vendor doesn't
//! implement, rather than a panic or a silent no-op. A missing feature
//! returns `LlmError::InvalidRequest` tagged as unsupported — this crate's
//! error taxonomy is closed at `LlmError`, so every capability module
//! funnels failures through it instead of growing its own.

use std::collections::HashSet;

use async_trait::async_trait;

use crate::error::{LlmError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioFeature {
    TextToSpeech,
    StreamingTextToSpeech,
    SpeechToText,
    AudioTranslation,
    RealtimeAudio,
}

/// Stability/similarity/format knobs a TTS request may carry.
/// Vendors that don't recognize a given knob ignore it rather than error.
#[derive(Debug, Clone, Default)]
pub struct TtsRequest {
    pub text: String,
    pub voice_id: String,
    pub model: Option<String>,
    pub stability: Option<f32>,
    pub similarity_boost: Option<f32>,
    pub output_format: Option<String>,
}

impl TtsRequest {
    pub fn new(text: impl Into<String>, voice_id: impl Into<String>) -> Self {
        TtsRequest {
            text: text.into(),
            voice_id: voice_id.into(),
            model: None,
            stability: None,
            similarity_boost: None,
            output_format: None,
        }
    }
}

/// Per-character start/end timing, surfaced when the vendor supports
/// alignment.
#[derive(Debug, Clone)]
pub struct CharacterAlignment {
    pub character: String,
    pub start_seconds: f64,
    pub end_seconds: f64,
}

#[derive(Debug, Clone)]
pub struct TtsResponse {
    pub audio: Vec<u8>,
    pub mime_type: String,
    pub alignment: Option<Vec<CharacterAlignment>>,
}

#[derive(Debug, Clone, Default)]
pub struct SttRequest {
    pub audio: Vec<u8>,
    pub mime_type: String,
    pub model: Option<String>,
    pub language: Option<String>,
    pub prompt: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SttResponse {
    pub text: String,
    pub language: Option<String>,
    pub duration_seconds: Option<f64>,
}

/// A provider's audio surface. `supported_features` drives
/// discovery; every operation method returns `Unsupported` (via
/// `LlmError::InvalidRequest`) rather than panicking when the feature
/// isn't in that set, so callers can either check first or handle the
/// error uniformly.
#[async_trait]
pub trait AudioCapable: Send + Sync {
    fn supported_features(&self) -> HashSet<AudioFeature>;

    async fn text_to_speech(&self, request: TtsRequest) -> Result<TtsResponse>;

    async fn speech_to_text(&self, request: SttRequest) -> Result<SttResponse>;

    async fn translate_audio(&self, request: SttRequest) -> Result<SttResponse> {
        let _ = request;
        Err(unsupported(AudioFeature::AudioTranslation))
    }
}

pub(crate) fn unsupported(feature: AudioFeature) -> LlmError {
    LlmError::InvalidRequest(format!("{feature:?} is not supported by this provider"))
}

pub(crate) fn require(features: &HashSet<AudioFeature>, feature: AudioFeature) -> Result<()> {
    if features.contains(&feature) {
        Ok(())
    } else {
        Err(unsupported(feature))
    }
}
