use anyhow::{Context, Result, bail};
use std::ffi::OsString;
use std::fs::OpenOptions;
use std::os::unix::process::CommandExt;
use std::path::Path;
use std::process::{Command, Stdio};

use super::normalize::RawSnapshot;

/// Plain text offers, most preferred first
const PLAIN_TEXT_TYPES: &[&str] = &[
    "text/plain;charset=utf-8",
    "text/plain",
    "UTF8_STRING",
    "STRING",
    "TEXT",
];

const HTML_TYPES: &[&str] = &["text/html"];

const RTF_TYPES: &[&str] = &["text/rtf", "application/rtf", "text/richtext"];

/// Arguments for `wl-paste` so each clipboard change runs `<exe> capture`
fn watcher_args(exe: &Path) -> Vec<OsString> {
    vec![
        "--watch".into(),
        exe.as_os_str().to_owned(),
        "capture".into(),
    ]
}

/// Start watching the clipboard
///
/// Spawns a single detached `wl-paste --watch` process. Each clipboard
/// change runs `clipstash capture`, which reads every useful offer into one
/// snapshot and submits the normalized result to the history engine.
pub fn start_watcher() -> Result<()> {
    let exe = std::env::current_exe().context("Failed to get current executable path")?;
    log::info!("Starting clipboard watcher");

    let dev_null = OpenOptions::new()
        .write(true)
        .open("/dev/null")
        .context("Failed to open /dev/null")?;

    // process_group(0) detaches the watcher from the parent's session
    Command::new("wl-paste")
        .args(watcher_args(&exe))
        .stdin(Stdio::null())
        .stdout(dev_null.try_clone()?)
        .stderr(dev_null)
        .process_group(0)
        .spawn()
        .context("Failed to spawn clipboard watcher")?;

    log::info!("Clipboard watcher started in background");
    Ok(())
}

/// Pick the offers to fetch from the types the clipboard advertises
///
/// At most one of each kind: plain text, HTML, RTF, image. PNG is preferred
/// over other image types.
pub fn select_offers<'a>(offered: &[&'a str]) -> Vec<&'a str> {
    let first_of = |candidates: &[&str]| {
        candidates.iter().find_map(|want| {
            offered
                .iter()
                .copied()
                .find(|have| have.eq_ignore_ascii_case(want))
        })
    };

    let image = offered
        .iter()
        .copied()
        .find(|t| t.eq_ignore_ascii_case("image/png"))
        .or_else(|| {
            offered
                .iter()
                .copied()
                .find(|t| t.to_ascii_lowercase().starts_with("image/"))
        });

    [
        first_of(PLAIN_TEXT_TYPES),
        first_of(HTML_TYPES),
        first_of(RTF_TYPES),
        image,
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// Read the current clipboard into a snapshot holding every useful offer
pub fn read_snapshot() -> Result<RawSnapshot> {
    let listed = wl_paste(&["--list-types"])?;
    let listed = String::from_utf8_lossy(&listed);
    let offered: Vec<&str> = listed
        .lines()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect();

    let mut snapshot = RawSnapshot::new();
    for mime in select_offers(&offered) {
        let bytes = match wl_paste(&["--no-newline", "--type", mime]) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Failed to read {} from clipboard: {:#}", mime, e);
                continue;
            }
        };
        if bytes.is_empty() {
            continue;
        }
        if let Some(part) = RawSnapshot::from_mime(mime, bytes) {
            snapshot.representations.extend(part.representations);
        }
    }

    log::debug!(
        "Read {} of {} clipboard offers",
        snapshot.representations.len(),
        offered.len()
    );
    Ok(snapshot)
}

fn wl_paste(args: &[&str]) -> Result<Vec<u8>> {
    let output = Command::new("wl-paste")
        .args(args)
        .stdin(Stdio::null())
        .output()
        .context("Failed to run wl-paste. Install wl-clipboard package")?;

    if !output.status.success() {
        bail!(
            "wl-paste {} failed: {}",
            args.join(" "),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(output.stdout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::Representation;

    #[test]
    fn test_watcher_args() {
        let args: Vec<String> = watcher_args(Path::new("/usr/bin/clipstash"))
            .into_iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(args, vec!["--watch", "/usr/bin/clipstash", "capture"]);
    }

    #[test]
    fn test_select_offers_from_browser_copy() {
        let offered = [
            "text/html",
            "text/_moz_htmlcontext",
            "UTF8_STRING",
            "text/plain;charset=utf-8",
            "image/jpeg",
            "image/png",
        ];
        assert_eq!(
            select_offers(&offered),
            vec!["text/plain;charset=utf-8", "text/html", "image/png"]
        );
    }

    #[test]
    fn test_select_offers_rich_text_only() {
        assert_eq!(
            select_offers(&["application/rtf", "application/x-private"]),
            vec!["application/rtf"]
        );
        assert_eq!(select_offers(&["image/bmp"]), vec!["image/bmp"]);
        assert!(select_offers(&["application/x-private"]).is_empty());
    }

    #[test]
    fn test_text_and_image_offers_make_one_capture() {
        let mut snapshot = RawSnapshot::new();
        for (mime, bytes) in [
            ("text/plain", b"caption".to_vec()),
            ("image/png", b"not decoded".to_vec()),
        ] {
            let part = RawSnapshot::from_mime(mime, bytes).unwrap();
            snapshot.representations.extend(part.representations);
        }

        assert!(matches!(
            snapshot.representations[1],
            Representation::Image(_)
        ));
        let capture = crate::clipboard::normalize(&snapshot, None, None).unwrap();
        assert_eq!(capture.text_content(), Some("caption"));
    }

    #[test]
    fn test_every_selectable_offer_maps_to_a_snapshot() {
        let offered: Vec<&str> = PLAIN_TEXT_TYPES
            .iter()
            .chain(HTML_TYPES)
            .chain(RTF_TYPES)
            .copied()
            .chain(["image/png"])
            .collect();
        for mime in offered {
            assert!(
                RawSnapshot::from_mime(mime, b"x".to_vec()).is_some(),
                "{} is not understood",
                mime
            );
        }
    }
}
