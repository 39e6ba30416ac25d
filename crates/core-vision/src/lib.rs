//! Visual verification: pause, look at the screen, ask a vision model.
//!
//! The verifier is read-only with respect to the host: it captures, encodes,
//! asks, parses, and returns a [`VerificationResult`]. It never produces
//! input events and never mutates the execution context; mirroring the
//! verdict into context variables is the executor's job.
//!
//! Failure policy: the primary model gets one shot; any failure (transport,
//! timeout, unparsable reply) falls back to the secondary model once; if
//! both fail the verifier returns an unsafe zero-confidence verdict carrying
//! the error text. It never raises; the executor decides what a failed
//! verification means for the run.
//!
//! Screenshots are owned by the call: encoded, sent, dropped. Nothing here
//! retains a bitmap.

use core_config::VisionConfig;
use core_protocol::VerificationResult;
use core_screen::{CaptureBackend, ScreenError};
use image::{DynamicImage, RgbaImage, codecs::jpeg::JpegEncoder};
use serde::Deserialize;
use std::io::Cursor;
use thiserror::Error;
use tracing::{debug, warn};

mod rest;

pub use rest::RestVision;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("vision API key not set ({0})")]
    MissingApiKey(&'static str),
    #[error("vision HTTP call failed: {0}")]
    Http(String),
    #[error("vision model returned an empty reply")]
    EmptyReply,
    #[error("vision reply not parsable as a verdict: {0}")]
    Malformed(String),
    #[error(transparent)]
    Capture(#[from] ScreenError),
    #[error("screenshot encode failed: {0}")]
    Encode(String),
}

/// One model call: image plus prompt in, raw reply text out. The trait is
/// the test seam; production uses [`RestVision`].
pub trait VisionBackend: Send + Sync {
    fn analyze(&self, model: &str, image_jpeg: &[u8], prompt: &str) -> Result<String, VisionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyKind {
    /// `verify_screen`: free-form state check.
    Screen,
    /// `verify_element`: is a specific element present.
    Element,
    /// `find_element`: locate an element, coordinates required.
    FindElement,
    /// `verify_text`: is specific text visible.
    Text,
}

#[derive(Debug, Clone)]
pub struct VerifyRequest {
    pub kind: VerifyKind,
    /// What the caller is looking at / doing.
    pub context: String,
    /// Success criterion.
    pub expected: String,
    pub confidence_threshold: f64,
    /// Optional capture rectangle (x, y, width, height); full screen when
    /// absent.
    pub region: Option<(u32, u32, u32, u32)>,
}

impl VerifyRequest {
    pub fn screen(context: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            kind: VerifyKind::Screen,
            context: context.into(),
            expected: expected.into(),
            confidence_threshold: 0.8,
            region: None,
        }
    }
}

// Wire shape the model is instructed to reply with. Tolerant of omitted
// optionals; missing verdict fields mean the reply is malformed and the
// fallback model gets its turn.
#[derive(Debug, Deserialize)]
struct VerdictWire {
    safe_to_proceed: bool,
    confidence: f64,
    #[serde(default)]
    analysis: String,
    #[serde(default)]
    updated_coordinates: Option<core_protocol::Point>,
    #[serde(default)]
    suggested_actions: Option<Vec<String>>,
}

/// Extract the verdict JSON from a model reply that may wrap it in prose or
/// a code fence.
fn parse_verdict(reply: &str) -> Result<VerdictWire, VisionError> {
    let start = reply
        .find('{')
        .ok_or_else(|| VisionError::Malformed("no JSON object in reply".to_string()))?;
    let end = reply
        .rfind('}')
        .ok_or_else(|| VisionError::Malformed("unterminated JSON object".to_string()))?;
    if end < start {
        return Err(VisionError::Malformed("unterminated JSON object".to_string()));
    }
    serde_json::from_str(&reply[start..=end]).map_err(|e| VisionError::Malformed(e.to_string()))
}

fn encode_jpeg(image: &RgbaImage) -> Result<Vec<u8>, VisionError> {
    // JPEG has no alpha; convert before encoding.
    let rgb = DynamicImage::ImageRgba8(image.clone()).to_rgb8();
    let mut buf = Cursor::new(Vec::new());
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 80);
    encoder
        .encode_image(&rgb)
        .map_err(|e| VisionError::Encode(e.to_string()))?;
    Ok(buf.into_inner())
}

fn prompt_for(req: &VerifyRequest) -> String {
    let task = match req.kind {
        VerifyKind::Screen => "Decide whether the expected condition holds on this screenshot.",
        VerifyKind::Element => {
            "Decide whether the described UI element is visible on this screenshot."
        }
        VerifyKind::FindElement => {
            "Locate the described UI element on this screenshot. If found, report the \
             center of the element in updated_coordinates as absolute pixel values."
        }
        VerifyKind::Text => "Decide whether the expected text is visible on this screenshot.",
    };
    format!(
        "You are the visual checkpoint of a desktop automation run.\n\
         Context: {}\n\
         Expected: {}\n\
         {}\n\
         Reply with exactly one JSON object, no prose, of the shape:\n\
         {{\"safe_to_proceed\": bool, \"confidence\": number 0..1, \"analysis\": string, \
         \"updated_coordinates\": {{\"x\": int, \"y\": int}} | null, \
         \"suggested_actions\": [string] | null}}",
        req.context, req.expected, task
    )
}

pub struct Verifier {
    cfg: VisionConfig,
    backend: Box<dyn VisionBackend>,
}

impl Verifier {
    /// Production construction: REST backend, key from the environment at
    /// call time.
    pub fn from_config(cfg: VisionConfig) -> Self {
        let backend = RestVision::new(cfg.endpoint.clone(), cfg.timeout_ms);
        Self {
            cfg,
            backend: Box::new(backend),
        }
    }

    pub fn with_backend(cfg: VisionConfig, backend: Box<dyn VisionBackend>) -> Self {
        Self { cfg, backend }
    }

    /// Run one verification. Never fails: every error path degrades to an
    /// unsafe verdict.
    pub fn verify(&self, capture: &dyn CaptureBackend, req: &VerifyRequest) -> VerificationResult {
        let image = match self.capture(capture, req) {
            Ok(img) => img,
            Err(e) => return VerificationResult::failure(format!("capture failed: {e}")),
        };
        let jpeg = match encode_jpeg(&image) {
            Ok(buf) => buf,
            Err(e) => return VerificationResult::failure(format!("encode failed: {e}")),
        };
        drop(image);
        let prompt = prompt_for(req);

        match self.ask(&self.cfg.primary_model, &jpeg, &prompt) {
            Ok(result) => self.finish(result, &self.cfg.primary_model, req),
            Err(primary_err) => {
                warn!(
                    target: "vision",
                    model = %self.cfg.primary_model,
                    error = %primary_err,
                    "primary_model_failed_trying_fallback"
                );
                match self.ask(&self.cfg.fallback_model, &jpeg, &prompt) {
                    Ok(result) => self.finish(result, &self.cfg.fallback_model, req),
                    Err(fallback_err) => VerificationResult::failure(format!(
                        "primary ({}): {primary_err}; fallback ({}): {fallback_err}",
                        self.cfg.primary_model, self.cfg.fallback_model
                    )),
                }
            }
        }
    }

    fn capture(
        &self,
        capture: &dyn CaptureBackend,
        req: &VerifyRequest,
    ) -> Result<RgbaImage, ScreenError> {
        match req.region {
            Some((x, y, w, h)) => capture.capture_region(x, y, w, h),
            None => capture.capture_screen(),
        }
    }

    fn ask(&self, model: &str, jpeg: &[u8], prompt: &str) -> Result<VerdictWire, VisionError> {
        let reply = self.backend.analyze(model, jpeg, prompt)?;
        if reply.trim().is_empty() {
            return Err(VisionError::EmptyReply);
        }
        parse_verdict(&reply)
    }

    fn finish(&self, wire: VerdictWire, model: &str, req: &VerifyRequest) -> VerificationResult {
        let confidence = wire.confidence.clamp(0.0, 1.0);
        // The model's yes still has to clear the caller's confidence bar.
        let safe = wire.safe_to_proceed && confidence >= req.confidence_threshold;
        debug!(
            target: "vision",
            model,
            safe,
            confidence,
            threshold = req.confidence_threshold,
            has_coordinates = wire.updated_coordinates.is_some(),
            "verdict"
        );
        VerificationResult {
            safe_to_proceed: safe,
            confidence,
            analysis: wire.analysis,
            updated_coordinates: wire.updated_coordinates,
            suggested_actions: wire.suggested_actions,
            model_used: model.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_protocol::Point;
    use image::Rgba;
    use std::sync::Mutex;

    struct FakeCapture;

    impl CaptureBackend for FakeCapture {
        fn capture_screen(&self) -> Result<RgbaImage, ScreenError> {
            Ok(RgbaImage::from_pixel(32, 32, Rgba([1, 2, 3, 255])))
        }
        fn capture_region(
            &self,
            _x: u32,
            _y: u32,
            w: u32,
            h: u32,
        ) -> Result<RgbaImage, ScreenError> {
            Ok(RgbaImage::from_pixel(w, h, Rgba([1, 2, 3, 255])))
        }
        fn capture_window(&self) -> Result<RgbaImage, ScreenError> {
            self.capture_screen()
        }
        fn dimensions(&self) -> Result<(u32, u32), ScreenError> {
            Ok((32, 32))
        }
        fn window_titles(&self) -> Result<Vec<String>, ScreenError> {
            Ok(vec![])
        }
        fn active_window_title(&self) -> Result<Option<String>, ScreenError> {
            Ok(None)
        }
    }

    /// Scripted backend: replies per model name, records calls.
    struct Scripted {
        calls: Mutex<Vec<String>>,
        primary: Result<String, ()>,
        fallback: Result<String, ()>,
    }

    impl VisionBackend for Scripted {
        fn analyze(&self, model: &str, _jpeg: &[u8], _prompt: &str) -> Result<String, VisionError> {
            self.calls.lock().unwrap().push(model.to_string());
            let scripted = if self.calls.lock().unwrap().len() == 1 {
                &self.primary
            } else {
                &self.fallback
            };
            scripted
                .clone()
                .map_err(|_| VisionError::Http("scripted failure".to_string()))
        }
    }

    fn verifier(primary: Result<String, ()>, fallback: Result<String, ()>) -> Verifier {
        Verifier::with_backend(
            VisionConfig::default(),
            Box::new(Scripted {
                calls: Mutex::new(Vec::new()),
                primary,
                fallback,
            }),
        )
    }

    #[test]
    fn primary_verdict_parses_with_coordinates() {
        let v = verifier(
            Ok(r#"{"safe_to_proceed": true, "confidence": 0.93,
                   "analysis": "search box focused",
                   "updated_coordinates": {"x": 100, "y": 200}}"#
                .to_string()),
            Err(()),
        );
        let out = v.verify(&FakeCapture, &VerifyRequest::screen("ctx", "exp"));
        assert!(out.safe_to_proceed);
        assert_eq!(out.updated_coordinates, Some(Point { x: 100, y: 200 }));
        assert_eq!(out.model_used, VisionConfig::default().primary_model);
    }

    #[test]
    fn fenced_reply_is_tolerated() {
        let v = verifier(
            Ok("```json\n{\"safe_to_proceed\": true, \"confidence\": 0.9, \"analysis\": \"ok\"}\n```"
                .to_string()),
            Err(()),
        );
        let out = v.verify(&FakeCapture, &VerifyRequest::screen("c", "e"));
        assert!(out.safe_to_proceed);
    }

    #[test]
    fn malformed_primary_falls_back() {
        let v = verifier(
            Ok("the screen looks fine to me".to_string()),
            Ok(r#"{"safe_to_proceed": false, "confidence": 0.7, "analysis": "wrong page"}"#
                .to_string()),
        );
        let out = v.verify(&FakeCapture, &VerifyRequest::screen("c", "e"));
        assert!(!out.safe_to_proceed);
        assert_eq!(out.model_used, VisionConfig::default().fallback_model);
        assert!((out.confidence - 0.7).abs() < 1e-9);
    }

    #[test]
    fn both_models_failing_degrades_to_unsafe_verdict() {
        let v = verifier(Err(()), Err(()));
        let out = v.verify(&FakeCapture, &VerifyRequest::screen("c", "e"));
        assert!(!out.safe_to_proceed);
        assert_eq!(out.confidence, 0.0);
        assert!(out.analysis.contains("scripted failure"));
    }

    #[test]
    fn confidence_below_threshold_is_not_safe() {
        let v = verifier(
            Ok(r#"{"safe_to_proceed": true, "confidence": 0.5, "analysis": "maybe"}"#.to_string()),
            Err(()),
        );
        let out = v.verify(&FakeCapture, &VerifyRequest::screen("c", "e"));
        assert!(!out.safe_to_proceed, "0.5 < default threshold 0.8");
        assert!((out.confidence - 0.5).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_confidence_is_clamped() {
        let v = verifier(
            Ok(r#"{"safe_to_proceed": true, "confidence": 3.2, "analysis": "sure"}"#.to_string()),
            Err(()),
        );
        let out = v.verify(&FakeCapture, &VerifyRequest::screen("c", "e"));
        assert_eq!(out.confidence, 1.0);
        assert!(out.safe_to_proceed);
    }
}
