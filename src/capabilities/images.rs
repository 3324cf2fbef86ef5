//! Image generation capability: `generate`/`edit`/`variation` over a
//! vendor's image endpoints. Providers publish which sizes/formats they
//! support; this module doesn't validate against that table itself —
//! callers are expected to gate on capability presence and warn rather
//! than refuse — but carries it so a caller can.

use async_trait::async_trait;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct ImageGenerationRequest {
    pub prompt: String,
    pub model: Option<String>,
    pub size: Option<String>,
    pub format: Option<String>,
    pub count: Option<u32>,
}

impl ImageGenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        ImageGenerationRequest {
            prompt: prompt.into(),
            model: None,
            size: None,
            format: None,
            count: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageEditRequest {
    pub image: Vec<u8>,
    pub mask: Option<Vec<u8>>,
    pub prompt: String,
    pub size: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImageVariationRequest {
    pub image: Vec<u8>,
    pub size: Option<String>,
    pub count: Option<u32>,
}

/// A single generated image: either inline bytes or a vendor-hosted URL,
/// never both populated meaningfully at once.
#[derive(Debug, Clone, Default)]
pub struct GeneratedImage {
    pub url: Option<String>,
    pub base64: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ImageGenerationResponse {
    pub images: Vec<GeneratedImage>,
}

#[derive(Debug, Clone)]
pub struct SupportedImageOptions {
    pub sizes: Vec<&'static str>,
    pub formats: Vec<&'static str>,
}

#[async_trait]
pub trait ImageGeneration: Send + Sync {
    fn supported_options(&self) -> SupportedImageOptions;

    async fn generate(&self, request: ImageGenerationRequest) -> Result<ImageGenerationResponse>;

    async fn edit(&self, request: ImageEditRequest) -> Result<ImageGenerationResponse>;

    async fn variation(&self, request: ImageVariationRequest) -> Result<ImageGenerationResponse>;
}
