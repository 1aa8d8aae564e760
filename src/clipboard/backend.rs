use anyhow::Result;

/// Trait for clipboard backend abstraction
/// Backend is write-only: used to put a selected clip back on the clipboard
/// Clipboard monitoring is handled separately via watcher processes
pub trait ClipboardBackend: Send + Sync {
    /// Write text to clipboard
    fn write_text(&self, text: &str) -> Result<()>;

    /// Write image to clipboard (PNG format)
    fn write_image(&self, data: &[u8]) -> Result<()>;

    /// Simulate the paste shortcut in the focused window after `delay_ms`
    fn paste_from_clipboard(&self, delay_ms: u64) -> Result<()>;

    /// Check if this backend supports image operations
    fn supports_images(&self) -> bool;

    /// Get the backend name (for logging/debugging)
    fn name(&self) -> &'static str;
}
