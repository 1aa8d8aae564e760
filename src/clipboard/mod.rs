pub mod backend;
pub mod focus;
pub mod normalize;
pub mod rich_text;
pub mod watch;
pub mod wayland;

use anyhow::{Result, anyhow, bail};
use std::env;

use crate::models::ResolvedContent;

pub use backend::ClipboardBackend;
pub use normalize::{RawSnapshot, Representation, normalize};
pub use wayland::WaylandBackend;

/// Create a clipboard backend based on the current display server
/// Detects Wayland via WAYLAND_DISPLAY environment variable
/// Returns error if no supported display server is detected
pub fn create_backend() -> Result<Box<dyn ClipboardBackend>> {
    if env::var("WAYLAND_DISPLAY").is_ok() {
        log::info!("Detected Wayland display server");
        let backend = WaylandBackend::new()?;
        return Ok(Box::new(backend));
    }

    if env::var("DISPLAY").is_ok() {
        return Err(anyhow!(
            "X11 detected but not supported. Wayland support only (set WAYLAND_DISPLAY)"
        ));
    }

    Err(anyhow!(
        "No supported display server detected. Set WAYLAND_DISPLAY for Wayland"
    ))
}

/// Put resolved content on the clipboard and optionally paste it
///
/// `paste_delay_ms` of `None` only writes the clipboard.
pub fn activate(
    backend: &dyn ClipboardBackend,
    content: &ResolvedContent,
    paste_delay_ms: Option<u64>,
) -> Result<()> {
    match content {
        ResolvedContent::Text(text) => backend.write_text(text)?,
        ResolvedContent::Image(png) => {
            if !backend.supports_images() {
                bail!("{} backend cannot write images", backend.name());
            }
            backend.write_image(png)?;
        }
        ResolvedContent::MissingImage => bail!("Image payload is missing; nothing to paste"),
    }

    if let Some(delay) = paste_delay_ms {
        backend.paste_from_clipboard(delay)?;
    }

    Ok(())
}
