use anyhow::{Context, Result, anyhow};
use std::io::Write;
use std::process::{Command, Stdio};

use super::backend::ClipboardBackend;

/// Wayland clipboard backend using wl-clipboard tools
/// Requires wl-copy; pasting additionally requires wtype
pub struct WaylandBackend;

impl WaylandBackend {
    /// Create a new Wayland clipboard backend
    pub fn new() -> Result<Self> {
        // Verify wl-copy is available
        Command::new("wl-copy")
            .arg("--version")
            .output()
            .context("wl-copy not found. Install wl-clipboard package")?;

        log::debug!("WaylandBackend initialized successfully");
        Ok(WaylandBackend)
    }

    /// Pipe `data` into `wl-copy --type <mime>`
    fn copy(&self, mime: &str, data: &[u8]) -> Result<()> {
        let mut child = Command::new("wl-copy")
            .arg("--type")
            .arg(mime)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to spawn wl-copy for {}", mime))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(data)
                .context("Failed to write to wl-copy stdin")?;
        }

        let status = child.wait().context("Failed to wait for wl-copy")?;
        if !status.success() {
            return Err(anyhow!("wl-copy failed with status: {}", status));
        }

        log::debug!("Wrote {} bytes of {} to clipboard", data.len(), mime);
        Ok(())
    }
}

impl ClipboardBackend for WaylandBackend {
    fn write_text(&self, text: &str) -> Result<()> {
        self.copy("text/plain;charset=utf-8", text.as_bytes())
    }

    fn write_image(&self, data: &[u8]) -> Result<()> {
        self.copy("image/png", data)
    }

    fn paste_from_clipboard(&self, delay_ms: u64) -> Result<()> {
        // Detached so the caller can exit and return focus before the keystroke
        let cmd = format!(
            "sleep {} && exec wtype -M ctrl v -m ctrl",
            delay_ms as f64 / 1000.0
        );

        Command::new("sh")
            .arg("-c")
            .arg(&cmd)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .context("Failed to spawn wtype for Ctrl-V. Make sure wtype is installed.")?;

        log::debug!("Scheduled Ctrl-V paste via wtype after {}ms delay", delay_ms);
        Ok(())
    }

    fn supports_images(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "Wayland"
    }
}
