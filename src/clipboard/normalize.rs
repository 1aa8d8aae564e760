//! Turn raw clipboard snapshots into captures
//!
//! Precedence: plain text, then rich text reduced to plain text, then
//! images re-encoded to canonical PNG. A snapshot with none of these
//! captures nothing.

use super::rich_text::{html_to_text, rtf_to_text};
use crate::imaging::canonical_png;
use crate::models::Capture;

/// One representation offered by the clipboard
#[derive(Debug, Clone, PartialEq)]
pub enum Representation {
    PlainText(String),
    Html(String),
    Rtf(Vec<u8>),
    /// Encoded image in any format the decoder understands
    Image(Vec<u8>),
}

/// Everything the clipboard offered for a single change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawSnapshot {
    pub representations: Vec<Representation>,
}

impl RawSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, representation: Representation) -> Self {
        self.representations.push(representation);
        self
    }

    /// Build a single-representation snapshot from a MIME type and payload
    ///
    /// Returns None for MIME types that map to no representation, or text
    /// payloads that are not valid UTF-8.
    pub fn from_mime(mime: &str, bytes: Vec<u8>) -> Option<Self> {
        let essence = mime
            .split(';')
            .next()
            .unwrap_or("")
            .trim()
            .to_ascii_lowercase();

        let representation = match essence.as_str() {
            "text/html" => Representation::Html(String::from_utf8(bytes).ok()?),
            "text/rtf" | "application/rtf" | "text/richtext" => Representation::Rtf(bytes),
            "text" | "string" | "utf8_string" | "text/plain" => {
                Representation::PlainText(String::from_utf8(bytes).ok()?)
            }
            m if m.starts_with("image/") => Representation::Image(bytes),
            _ => {
                log::debug!("Ignoring clipboard content of type {}", mime);
                return None;
            }
        };

        Some(Self::new().with(representation))
    }

    fn plain_text(&self) -> Option<String> {
        self.representations.iter().find_map(|r| match r {
            Representation::PlainText(text) if !text.is_empty() => Some(text.clone()),
            _ => None,
        })
    }

    fn rich_text(&self) -> Option<String> {
        self.representations.iter().find_map(|r| {
            let text = match r {
                Representation::Html(html) => html_to_text(html),
                Representation::Rtf(rtf) => rtf_to_text(rtf),
                _ => return None,
            };
            (!text.is_empty()).then_some(text)
        })
    }

    fn image(&self) -> Option<Vec<u8>> {
        self.representations.iter().find_map(|r| match r {
            Representation::Image(bytes) => canonical_png(bytes),
            _ => None,
        })
    }
}

/// Normalize a snapshot into a capture, tagging it with its source application
pub fn normalize(
    snapshot: &RawSnapshot,
    source_app_id: Option<String>,
    source_app_name: Option<String>,
) -> Option<Capture> {
    let capture = if let Some(text) = snapshot.plain_text() {
        Capture::text(text)
    } else if let Some(text) = snapshot.rich_text() {
        Capture::text(text)
    } else if let Some(png) = snapshot.image() {
        Capture::image(png)
    } else {
        log::debug!("Snapshot yielded no text or decodable image, skipping");
        return None;
    };

    Some(capture.with_source(source_app_id, source_app_name))
}
