//! Streaming generation service behind `/generate` and `/sights`.
//!
//! Both operations validate synchronously and then return a lazy text
//! stream. Anything that goes wrong after validation, including image
//! encoding and transport failures on the completions hop, is contained
//! inside the stream: it is logged here and the caller receives exactly one
//! [`INTERNAL_ERROR_NOTICE`] chunk followed by a normal end of stream.

use std::sync::Arc;

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use llmserve_core::{
    CapabilityConfig, ChatMessage, ClientError, CompletionsClient, ContentBlock,
    GenerationError, GenerationRequest, INTERNAL_ERROR_NOTICE, MultimodalEncoder,
};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Text fragments in engine emission order.
pub type TextStream = BoxStream<'static, String>;

#[derive(Debug, Clone)]
pub struct StreamingGenerationService {
    client: Arc<dyn CompletionsClient>,
    capabilities: CapabilityConfig,
}

impl StreamingGenerationService {
    pub fn new(client: Arc<dyn CompletionsClient>, capabilities: &CapabilityConfig) -> Self {
        Self {
            client,
            capabilities: capabilities.clone(),
        }
    }

    /// Upper `max_tokens` bound, also the default when a caller omits it.
    pub const fn max_tokens(&self) -> u32 {
        self.capabilities.max_tokens
    }

    /// Stream a completion for a text-only prompt.
    pub fn generate(&self, prompt: String, max_tokens: u32) -> Result<TextStream, GenerationError> {
        let max_tokens = self.validate(max_tokens)?;
        Ok(self.dispatch(prompt, None, max_tokens))
    }

    /// Stream a completion for a prompt with an optional image.
    ///
    /// With an image the message content is `[image, text]`, otherwise
    /// `[text]`.
    pub fn sights(
        &self,
        prompt: String,
        image: Option<Vec<u8>>,
        max_tokens: u32,
    ) -> Result<TextStream, GenerationError> {
        if !self.capabilities.exposes_sights() {
            return Err(GenerationError::VisionDisabled);
        }
        let max_tokens = self.validate(max_tokens)?;
        Ok(self.dispatch(prompt, image, max_tokens))
    }

    fn validate(&self, max_tokens: u32) -> Result<u32, GenerationError> {
        if !self.capabilities.exposes_generation() {
            return Err(GenerationError::GenerationDisabled);
        }
        self.capabilities.validate_max_tokens(max_tokens)
    }

    fn dispatch(&self, prompt: String, image: Option<Vec<u8>>, max_tokens: u32) -> TextStream {
        let request_id = Uuid::new_v4();
        let options = &self.capabilities.server_options;
        if !options.disable_log_requests {
            info!(
                %request_id,
                max_tokens,
                with_image = image.is_some(),
                prompt = %options.log_excerpt(&prompt),
                "Received generation request"
            );
        }

        let client = Arc::clone(&self.client);
        let model = self.capabilities.model_id.clone();

        async_stream::stream! {
            let started = async {
                let message = build_message(prompt, image.as_deref())?;
                client
                    .stream_chat(GenerationRequest::streaming(model, message, max_tokens))
                    .await
            }
            .await;

            let mut chunks = match started {
                Ok(chunks) => chunks,
                Err(e) => {
                    log_contained(request_id, e);
                    yield INTERNAL_ERROR_NOTICE.to_string();
                    return;
                }
            };

            while let Some(item) = chunks.next().await {
                match item {
                    Ok(chunk) => yield chunk.delta_text,
                    Err(e) => {
                        log_contained(request_id, e);
                        yield INTERNAL_ERROR_NOTICE.to_string();
                        return;
                    }
                }
            }

            debug!(%request_id, "Generation stream finished");
        }
        .boxed()
    }
}

fn build_message(prompt: String, image: Option<&[u8]>) -> Result<ChatMessage, ClientError> {
    let mut content = Vec::with_capacity(2);
    if let Some(bytes) = image {
        let block = MultimodalEncoder::image_block(bytes)
            .map_err(|e| ClientError::Request(format!("image encoding failed: {e}")))?;
        content.push(block);
    }
    content.push(ContentBlock::text(prompt));
    Ok(ChatMessage::user(content))
}

fn log_contained(request_id: Uuid, err: ClientError) {
    let err = anyhow::Error::new(err);
    error!(%request_id, error = format!("{err:#}"), "Generation failed; sent notice to caller");
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use llmserve_core::testing::{ScriptedClient, ScriptedEngine};
    use llmserve_core::{EngineParams, GatewaySettings, InferenceEngine};

    fn capabilities(vision: bool, embeddings: bool) -> CapabilityConfig {
        let engine = ScriptedEngine::new(Vec::<String>::new())
            .with_features(vision, embeddings)
            .with_max_model_len(Some(2048));
        let settings = GatewaySettings {
            engine_config: EngineParams::for_model("mistral"),
            server_config: serde_json::Map::new(),
            service_config: Default::default(),
            vision,
            embeddings,
            mode: None,
            build: None,
            requirements: Vec::new(),
        };
        CapabilityConfig::resolve(&settings, engine.info()).unwrap()
    }

    fn service(client: &Arc<ScriptedClient>, vision: bool) -> StreamingGenerationService {
        StreamingGenerationService::new(client.clone(), &capabilities(vision, false))
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::RgbImage::from_pixel(3, 2, image::Rgb([10, 20, 30]));
        let mut out = std::io::Cursor::new(Vec::new());
        image::DynamicImage::ImageRgb8(img)
            .write_to(&mut out, image::ImageFormat::Png)
            .unwrap();
        out.into_inner()
    }

    #[tokio::test]
    async fn test_generate_relays_deltas_in_order() {
        let client = Arc::new(ScriptedClient::new(["p", "o", "n", "g"]));
        let out: Vec<String> = service(&client, false)
            .generate("ping".into(), 128)
            .unwrap()
            .collect()
            .await;

        assert_eq!(out, vec!["p", "o", "n", "g"]);

        let request = client.last_request().unwrap();
        assert!(request.stream);
        assert_eq!(request.max_tokens, 128);
        assert_eq!(request.model, "mistral");
        assert_eq!(
            request.messages[0].content,
            vec![ContentBlock::text("ping")]
        );
    }

    #[tokio::test]
    async fn test_empty_deltas_are_emitted() {
        let client = Arc::new(ScriptedClient::new(["", "a", ""]));
        let out: Vec<String> = service(&client, false)
            .generate("x".into(), 256)
            .unwrap()
            .collect()
            .await;
        assert_eq!(out, vec!["", "a", ""]);
    }

    #[tokio::test]
    async fn test_out_of_bounds_max_tokens_never_dispatches() {
        let client = Arc::new(ScriptedClient::new(["x"]));
        let svc = service(&client, false);

        for bad in [0, 1, 127, 2049, u32::MAX] {
            assert!(matches!(
                svc.generate("x".into(), bad),
                Err(GenerationError::MaxTokensOutOfRange { .. })
            ));
        }
        assert!(svc.generate("x".into(), 128).is_ok());
        assert!(svc.generate("x".into(), 2048).is_ok());

        // Streams are lazy: nothing is dispatched until polled
        assert_eq!(client.call_count(), 0);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_yields_single_notice() {
        let client = Arc::new(ScriptedClient::new(["a", "b", "c"]).failing_after(2));
        let out: Vec<String> = service(&client, false)
            .generate("x".into(), 128)
            .unwrap()
            .collect()
            .await;

        assert_eq!(out, vec!["a", "b", INTERNAL_ERROR_NOTICE]);
    }

    #[tokio::test]
    async fn test_dispatch_failure_yields_only_notice() {
        let client = Arc::new(ScriptedClient::new(["a"]).failing_on_start());
        let out: Vec<String> = service(&client, false)
            .generate("x".into(), 128)
            .unwrap()
            .collect()
            .await;

        assert_eq!(out, vec![INTERNAL_ERROR_NOTICE]);
    }

    #[tokio::test]
    async fn test_sights_places_image_before_text() {
        let client = Arc::new(ScriptedClient::new(["arr"]));
        let png = png_bytes();

        let out: Vec<String> = service(&client, true)
            .sights("describe".into(), Some(png.clone()), 128)
            .unwrap()
            .collect()
            .await;
        assert_eq!(out, vec!["arr"]);

        let content = client.last_request().unwrap().messages[0].content.clone();
        assert_eq!(content.len(), 2);
        let ContentBlock::ImageRef { data_uri } = &content[0] else {
            panic!("first block should be the image");
        };
        assert_eq!(
            data_uri,
            &format!("data:image/png;base64,{}", STANDARD.encode(&png))
        );
        let payload = data_uri.strip_prefix("data:image/png;base64,").unwrap();
        assert_eq!(STANDARD.decode(payload).unwrap(), png);
        assert_eq!(content[1], ContentBlock::text("describe"));
    }

    #[tokio::test]
    async fn test_sights_without_image_is_text_only() {
        let client = Arc::new(ScriptedClient::new(["ok"]));
        let _: Vec<String> = service(&client, true)
            .sights("hello".into(), None, 128)
            .unwrap()
            .collect()
            .await;

        let content = client.last_request().unwrap().messages[0].content.clone();
        assert_eq!(content, vec![ContentBlock::text("hello")]);
    }

    #[tokio::test]
    async fn test_undecodable_image_is_contained() {
        let client = Arc::new(ScriptedClient::new(["never"]));
        let out: Vec<String> = service(&client, true)
            .sights("x".into(), Some(b"not an image".to_vec()), 128)
            .unwrap()
            .collect()
            .await;

        assert_eq!(out, vec![INTERNAL_ERROR_NOTICE]);
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn test_sights_requires_vision() {
        let client = Arc::new(ScriptedClient::new(["x"]));
        assert!(matches!(
            service(&client, false).sights("x".into(), None, 128),
            Err(GenerationError::VisionDisabled)
        ));
    }

    #[test]
    fn test_embeddings_only_disables_generation() {
        let client = Arc::new(ScriptedClient::new(["x"]));
        let svc = StreamingGenerationService::new(client, &capabilities(false, true));
        assert!(matches!(
            svc.generate("x".into(), 128),
            Err(GenerationError::GenerationDisabled)
        ));
    }
}
