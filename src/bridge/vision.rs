//! Vision-model decision oracle over HTTP.
//!
//! Two wire dialects: Ollama's `/api/chat` and the OpenAI-compatible
//! `/v1/chat/completions`. Frames go up as base64 PNG.

use std::io::Cursor;
use std::time::Duration;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GrayImage, ImageFormat, RgbImage, RgbaImage};
use log::{debug, trace};
use serde_json::{json, Value};

use crate::bridge::DecisionOracle;
use crate::config::{OracleSettings, Provider};
use crate::error::{Error, OracleError};
use crate::navigator::NavigationDecision;
use crate::screen::{Frame, PixelLayout};

pub const SETUP_WIZARD_PROMPT: &str = r#"You are an Android Setup Wizard automation assistant.
Analyze this screenshot and determine:
1. What step of the Setup Wizard is currently displayed?
2. What action should be taken?
3. Is the Setup Wizard complete?

Return ONLY valid JSON:
{"screen_state": "language_selection | wifi_setup | google_login | terms | pin_setup | home | unknown", "completed": false, "action": {"type": "tap | swipe | type | wait", "x": 540, "y": 1200, "text": "", "direction": "up | down | left | right", "wait_seconds": 0}, "confidence": 0.95}"#;

/// [`DecisionOracle`] backed by a vision LLM endpoint.
pub struct VisionOracle {
    agent: ureq::Agent,
    provider: Provider,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl VisionOracle {
    pub fn new(settings: &OracleSettings) -> Result<Self, Error> {
        if settings.model.trim().is_empty() {
            return Err(Error::InvalidConfig("oracle.model is not set".into()));
        }
        if settings.timeout_secs == 0 {
            return Err(Error::InvalidConfig("oracle.timeout_secs must be > 0".into()));
        }
        let timeout = Duration::from_secs(settings.timeout_secs);
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .build();
        Ok(Self {
            agent,
            provider: settings.provider,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    pub fn endpoint(&self) -> String {
        let path = match self.provider {
            Provider::Ollama => "/api/chat",
            Provider::OpenAi => "/v1/chat/completions",
        };
        format!("{}{path}", self.base_url)
    }

    fn request_body(&self, image_b64: &str) -> Value {
        request_body(self.provider, &self.model, SETUP_WIZARD_PROMPT, image_b64)
    }

    /// One round trip; returns the model's raw message text.
    fn chat(&self, image_b64: &str) -> Result<String, OracleError> {
        let url = self.endpoint();
        debug!(
            "vision request to {url} ({} model {})",
            provider_name(self.provider),
            self.model
        );

        let mut req = self.agent.post(&url).set("content-type", "application/json");
        if let Some(key) = self.api_key.as_deref() {
            req = req.set("authorization", &format!("Bearer {key}"));
        }
        let envelope: Value = match req.send_json(self.request_body(image_b64)) {
            Ok(resp) => resp
                .into_json()
                .map_err(|e| OracleError::Envelope(format!("body is not JSON: {e}")))?,
            Err(ureq::Error::Status(code, _)) => {
                return Err(OracleError::Request(format!("{url} returned http {code}")))
            }
            Err(ureq::Error::Transport(e)) => {
                return Err(OracleError::Request(format!("{url}: {e}")))
            }
        };

        let content = message_content(self.provider, &envelope)
            .ok_or_else(|| OracleError::Envelope(envelope.to_string()))?;
        trace!("vision reply: {content}");
        Ok(content.to_string())
    }
}

impl DecisionOracle for VisionOracle {
    fn decide(&mut self, frame: &Frame) -> Result<NavigationDecision, OracleError> {
        let png = encode_png(frame)?;
        let reply = self.chat(&STANDARD.encode(png))?;
        Ok(NavigationDecision::from_response(&reply))
    }
}

fn provider_name(provider: Provider) -> &'static str {
    match provider {
        Provider::Ollama => "ollama",
        Provider::OpenAi => "openai",
    }
}

fn request_body(provider: Provider, model: &str, prompt: &str, image_b64: &str) -> Value {
    match provider {
        Provider::Ollama => json!({
            "model": model,
            "messages": [{"role": "user", "content": prompt, "images": [image_b64]}],
            "stream": false,
        }),
        Provider::OpenAi => json!({
            "model": model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": prompt},
                    {"type": "image_url",
                     "image_url": {"url": format!("data:image/png;base64,{image_b64}")}},
                ],
            }],
        }),
    }
}

fn message_content(provider: Provider, envelope: &Value) -> Option<&str> {
    let message = match provider {
        Provider::Ollama => &envelope["message"],
        Provider::OpenAi => &envelope["choices"][0]["message"],
    };
    message["content"].as_str()
}

/// PNG bytes for `frame`.
pub fn encode_png(frame: &Frame) -> Result<Vec<u8>, OracleError> {
    let (w, h) = (frame.width, frame.height);
    let mismatch = || {
        OracleError::Encode(format!(
            "{w}x{h} {:?} frame has only {} bytes",
            frame.layout,
            frame.data.len()
        ))
    };
    let image = match frame.layout {
        PixelLayout::Gray => {
            let buf = GrayImage::from_raw(w, h, frame.data.clone()).ok_or_else(mismatch)?;
            DynamicImage::ImageLuma8(buf)
        }
        PixelLayout::Rgb => {
            let buf = RgbImage::from_raw(w, h, frame.data.clone()).ok_or_else(mismatch)?;
            DynamicImage::ImageRgb8(buf)
        }
        PixelLayout::Bgr => {
            let rgb = frame
                .data
                .chunks_exact(3)
                .flat_map(|px| [px[2], px[1], px[0]])
                .collect();
            DynamicImage::ImageRgb8(RgbImage::from_raw(w, h, rgb).ok_or_else(mismatch)?)
        }
        PixelLayout::Rgba => {
            let buf = RgbaImage::from_raw(w, h, frame.data.clone()).ok_or_else(mismatch)?;
            DynamicImage::ImageRgba8(buf)
        }
    };

    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .map_err(|e| OracleError::Encode(e.to_string()))?;
    Ok(out.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(provider: Provider) -> OracleSettings {
        OracleSettings {
            provider,
            base_url: "http://vision.local:8080/".into(),
            model: "llava".into(),
            ..OracleSettings::default()
        }
    }

    #[test]
    fn endpoint_per_provider() {
        let ollama = VisionOracle::new(&settings(Provider::Ollama)).unwrap();
        assert_eq!(ollama.endpoint(), "http://vision.local:8080/api/chat");
        let openai = VisionOracle::new(&settings(Provider::OpenAi)).unwrap();
        assert_eq!(openai.endpoint(), "http://vision.local:8080/v1/chat/completions");
    }

    #[test]
    fn model_is_required() {
        let mut s = settings(Provider::Ollama);
        s.model = "  ".into();
        assert!(matches!(VisionOracle::new(&s), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn zero_timeout_rejected() {
        let mut s = settings(Provider::Ollama);
        s.timeout_secs = 0;
        assert!(VisionOracle::new(&s).is_err());
    }

    #[test]
    fn ollama_body_carries_bare_base64() {
        let body = request_body(Provider::Ollama, "llava", "look", "QUJD");
        assert_eq!(body["model"], "llava");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][0]["content"], "look");
        assert_eq!(body["messages"][0]["images"][0], "QUJD");
    }

    #[test]
    fn openai_body_carries_data_url() {
        let body = request_body(Provider::OpenAi, "gpt-4o", "look", "QUJD");
        let content = &body["messages"][0]["content"];
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "look");
        assert_eq!(content[1]["image_url"]["url"], "data:image/png;base64,QUJD");
        assert!(body.get("stream").is_none());
    }

    #[test]
    fn message_content_per_provider() {
        let ollama = json!({"message": {"role": "assistant", "content": "{}"}});
        assert_eq!(message_content(Provider::Ollama, &ollama), Some("{}"));
        let openai = json!({"choices": [{"message": {"content": "ok"}}]});
        assert_eq!(message_content(Provider::OpenAi, &openai), Some("ok"));
        assert_eq!(message_content(Provider::OpenAi, &ollama), None);
        assert_eq!(message_content(Provider::Ollama, &json!({"error": "oom"})), None);
    }

    #[test]
    fn png_keeps_dimensions() {
        let frame = Frame::filled(6, 4, PixelLayout::Rgb, 90);
        let png = encode_png(&frame).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (6, 4));
        assert_eq!(decoded.get_pixel(5, 3).0, [90, 90, 90]);
    }

    #[test]
    fn bgr_frames_are_swapped_to_rgb() {
        let frame = Frame::new(1, 1, PixelLayout::Bgr, vec![10, 20, 30]);
        let png = encode_png(&frame).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded.get_pixel(0, 0).0, [30, 20, 10]);
    }

    #[test]
    fn short_frame_is_an_encode_error() {
        let frame = Frame::new(4, 4, PixelLayout::Rgba, vec![0; 10]);
        assert!(matches!(encode_png(&frame), Err(OracleError::Encode(_))));
    }
}
