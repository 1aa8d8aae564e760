//! Best-effort lookup of the application that owns keyboard focus
//!
//! Wayland has no portable way to ask which window is focused, so this only
//! answers on compositors with an IPC tool for it (Hyprland, Sway). Clips
//! captured elsewhere carry no source application.

use serde_json::Value;
use std::env;
use std::process::{Command, Stdio};

/// Application id (desktop-file style) of the focused window, if known
pub fn focused_app_id() -> Option<String> {
    if env::var_os("HYPRLAND_INSTANCE_SIGNATURE").is_some() {
        let json = ipc_output("hyprctl", &["activewindow", "-j"])?;
        return hyprland_active_class(&json);
    }

    if env::var_os("SWAYSOCK").is_some() {
        let json = ipc_output("swaymsg", &["-t", "get_tree"])?;
        return sway_focused_app(&json);
    }

    None
}

fn ipc_output(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .inspect_err(|e| log::debug!("{} unavailable: {}", program, e))
        .ok()?;

    if !output.status.success() {
        log::debug!("{} exited with {}", program, output.status);
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

/// `class` of `hyprctl activewindow -j`
pub fn hyprland_active_class(json: &str) -> Option<String> {
    let window: Value = serde_json::from_str(json).ok()?;
    non_empty(window.get("class"))
}

/// `app_id` (or the X11 class under XWayland) of the focused node in a sway tree
pub fn sway_focused_app(json: &str) -> Option<String> {
    let tree: Value = serde_json::from_str(json).ok()?;
    let node = find_focused(&tree)?;

    non_empty(node.get("app_id")).or_else(|| {
        non_empty(
            node.get("window_properties")
                .and_then(|props| props.get("class")),
        )
    })
}

fn find_focused(node: &Value) -> Option<&Value> {
    if node.get("focused").and_then(Value::as_bool) == Some(true) {
        return Some(node);
    }

    ["nodes", "floating_nodes"]
        .iter()
        .filter_map(|key| node.get(*key).and_then(Value::as_array))
        .flatten()
        .find_map(find_focused)
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
