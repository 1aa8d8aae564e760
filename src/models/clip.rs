use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Kind of payload a clip carries
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// SHA-256 digest of the canonical payload bytes, hex-encoded
///
/// Text is hashed over its UTF-8 bytes, images over their canonical PNG
/// encoding. Equal hash plus equal content type is treated as identity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ContentHash(String);

impl ContentHash {
    /// Hash raw payload bytes
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        ContentHash(hex::encode(digest))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Reference to a payload held by a blob store
///
/// Normally the blob's file name (`<hash>.png`). Histories written by older
/// versions may hold an absolute path instead, which stores honour as-is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(transparent)]
pub struct BlobRef(String);

impl BlobRef {
    pub fn new(key: impl Into<String>) -> Self {
        BlobRef(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Payload of a capture
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureContent {
    Text(String),
    /// Canonical PNG bytes
    Image(Vec<u8>),
}

/// A normalized clipboard snapshot ready for insertion into history
#[derive(Debug, Clone, PartialEq)]
pub struct Capture {
    pub content: CaptureContent,
    pub content_hash: ContentHash,
    pub source_app_id: Option<String>,
    pub source_app_name: Option<String>,
}

impl Capture {
    /// Text capture, hashed over the UTF-8 bytes
    pub fn text(text: impl Into<String>) -> Self {
        let text = text.into();
        let content_hash = ContentHash::of(text.as_bytes());
        Capture {
            content: CaptureContent::Text(text),
            content_hash,
            source_app_id: None,
            source_app_name: None,
        }
    }

    /// Image capture from already-canonical PNG bytes
    pub fn image(png: Vec<u8>) -> Self {
        let content_hash = ContentHash::of(&png);
        Capture {
            content: CaptureContent::Image(png),
            content_hash,
            source_app_id: None,
            source_app_name: None,
        }
    }

    pub fn with_source(mut self, app_id: Option<String>, app_name: Option<String>) -> Self {
        self.source_app_id = app_id;
        self.source_app_name = app_name;
        self
    }

    pub fn content_type(&self) -> ContentType {
        match self.content {
            CaptureContent::Text(_) => ContentType::Text,
            CaptureContent::Image(_) => ContentType::Image,
        }
    }

    pub fn text_content(&self) -> Option<&str> {
        match &self.content {
            CaptureContent::Text(text) => Some(text),
            CaptureContent::Image(_) => None,
        }
    }

    pub fn image_bytes(&self) -> Option<&[u8]> {
        match &self.content {
            CaptureContent::Image(bytes) => Some(bytes),
            CaptureContent::Text(_) => None,
        }
    }

    /// Deduplication key
    pub fn key(&self) -> (ContentType, &ContentHash) {
        (self.content_type(), &self.content_hash)
    }
}

/// A durable history record, one per logically distinct clip
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Stable across re-captures of the same content
    pub id: Uuid,
    /// Time of the most recent occurrence (refreshed on duplicate)
    pub created_at: DateTime<Utc>,
    #[serde(alias = "type")]
    pub content_type: ContentType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, alias = "imagePath", skip_serializing_if = "Option::is_none")]
    pub image_ref: Option<BlobRef>,
    #[serde(default, alias = "sourceAppBundleId", skip_serializing_if = "Option::is_none")]
    pub source_app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_app_name: Option<String>,
    #[serde(alias = "hash")]
    pub content_hash: ContentHash,
}

impl HistoryEntry {
    /// Deduplication key
    pub fn key(&self) -> (ContentType, &ContentHash) {
        (self.content_type, &self.content_hash)
    }

    pub fn is_image(&self) -> bool {
        self.content_type == ContentType::Image
    }

    /// Case-insensitive match against an already trimmed, lowercased needle
    ///
    /// Text entries match by substring. Image entries match only the literal
    /// token "image".
    pub fn matches_needle(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return true;
        }
        match &self.text {
            Some(text) => text.to_lowercase().contains(needle),
            None => self.is_image() && needle == "image",
        }
    }

    /// Get a preview string (first line, truncated for display)
    pub fn preview(&self, max_chars: usize) -> String {
        match (&self.text, self.content_type) {
            (Some(text), _) => {
                let line = text.lines().next().unwrap_or("");
                if line.chars().count() > max_chars {
                    let cut: String = line.chars().take(max_chars).collect();
                    format!("{}...", cut)
                } else {
                    line.to_string()
                }
            }
            (None, ContentType::Image) if self.image_ref.is_some() => "[Image]".to_string(),
            (None, ContentType::Image) => "[Image: payload missing]".to_string(),
            (None, ContentType::Text) => String::new(),
        }
    }
}

/// Playable content for an entry, handed to the activation collaborator
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedContent {
    Text(String),
    /// PNG bytes read back from the blob store
    Image(Vec<u8>),
    /// The entry exists but its image payload is gone
    MissingImage,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(content_type: ContentType, text: Option<&str>) -> HistoryEntry {
        HistoryEntry {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            content_type,
            text: text.map(str::to_string),
            image_ref: None,
            source_app_id: None,
            source_app_name: None,
            content_hash: ContentHash::of(text.unwrap_or("").as_bytes()),
        }
    }

    #[test]
    fn test_content_hash_is_sha256_hex() {
        let hash = ContentHash::of(b"hello");
        assert_eq!(
            hash.as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(hash, ContentHash::of(b"hello"));
        assert_ne!(hash, ContentHash::of(b"Hello"));
    }

    #[test]
    fn test_capture_text_hashes_utf8() {
        let capture = Capture::text("héllo");
        assert_eq!(capture.content_type(), ContentType::Text);
        assert_eq!(capture.content_hash, ContentHash::of("héllo".as_bytes()));
        assert_eq!(capture.text_content(), Some("héllo"));
        assert!(capture.image_bytes().is_none());
    }

    #[test]
    fn test_matches_needle() {
        let text = entry(ContentType::Text, Some("Black Cat"));
        assert!(text.matches_needle("cat"));
        assert!(text.matches_needle(""));
        assert!(!text.matches_needle("dog"));

        let image = entry(ContentType::Image, None);
        assert!(image.matches_needle("image"));
        assert!(!image.matches_needle("ima"));
        assert!(!image.matches_needle("cat"));

        // Text that mentions images matches by substring, not by the token rule
        let mention = entry(ContentType::Text, Some("an image of a cat"));
        assert!(mention.matches_needle("image"));
    }

    #[test]
    fn test_preview() {
        let text = entry(ContentType::Text, Some("first line\nsecond"));
        assert_eq!(text.preview(50), "first line");
        assert_eq!(text.preview(5), "first...");

        let image = entry(ContentType::Image, None);
        assert_eq!(image.preview(50), "[Image: payload missing]");
    }

    #[test]
    fn test_entry_json_uses_camel_case() {
        let mut e = entry(ContentType::Image, None);
        e.image_ref = Some(BlobRef::new("abc.png"));
        let json = serde_json::to_value(&e).unwrap();
        assert_eq!(json["contentType"], "image");
        assert_eq!(json["imageRef"], "abc.png");
        assert!(json.get("text").is_none());
        assert!(json.get("sourceAppId").is_none());
        assert!(json["createdAt"].is_string());
    }

    #[test]
    fn test_entry_accepts_legacy_keys() {
        let json = r#"{
            "id": "8c1a3f2e-4b5d-4e6f-9a0b-1c2d3e4f5a6b",
            "createdAt": "2024-05-01T10:00:00Z",
            "type": "image",
            "imagePath": "/tmp/old/abc.png",
            "sourceAppBundleId": "org.gnome.Nautilus",
            "hash": "abc"
        }"#;
        let e: HistoryEntry = serde_json::from_str(json).unwrap();
        assert_eq!(e.content_type, ContentType::Image);
        assert_eq!(e.image_ref, Some(BlobRef::new("/tmp/old/abc.png")));
        assert_eq!(e.source_app_id.as_deref(), Some("org.gnome.Nautilus"));
        assert_eq!(e.content_hash.as_str(), "abc");
    }
}
