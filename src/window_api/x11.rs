use std::process::Command;

use anyhow::{bail, Context, Result};
use tracing::{debug, error, instrument};

use super::{ForegroundSnapshot, WindowProbe};

/// The root window reports `0x0` for `_NET_ACTIVE_WINDOW` while no window has been activated yet.
const NO_WINDOW_SENTINEL: &str = "0x0";

/// Reads the active window through external `xprop` property-inspection calls against the window
/// manager's root window. The calls are synchronous and block the polling loop for their
/// duration, an accepted cost at a one second cadence.
pub struct X11WindowProbe;

impl X11WindowProbe {
    pub fn new() -> Self {
        Self
    }
}

impl Default for X11WindowProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowProbe for X11WindowProbe {
    #[instrument(skip(self))]
    fn current(&mut self) -> ForegroundSnapshot {
        match get_active() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Failed to query window properties {e:?}");
                ForegroundSnapshot::unset()
            }
        }
    }
}

fn get_active() -> Result<ForegroundSnapshot> {
    let root = xprop(&["-root", "_NET_ACTIVE_WINDOW"])?;
    let Some(window_id) = parse_active_window_id(&root) else {
        debug!("Root window reported no active window");
        return Ok(ForegroundSnapshot::unset());
    };
    if window_id == NO_WINDOW_SENTINEL {
        // The window has not finished loading.
        return Ok(ForegroundSnapshot::unset());
    }

    let name = xprop(&["-id", &window_id, "WM_NAME"])?;
    let class = xprop(&["-id", &window_id, "WM_CLASS"])?;

    Ok(ForegroundSnapshot {
        window: parse_window_name(&name).map(Into::into),
        program: parse_window_class(&class).map(Into::into),
    })
}

fn xprop(args: &[&str]) -> Result<String> {
    let output = Command::new("xprop")
        .args(args)
        .output()
        .context("Failed to run xprop")?;
    if !output.status.success() {
        bail!("xprop {args:?} exited with {}", output.status);
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// `_NET_ACTIVE_WINDOW(WINDOW): window id # 0x3c00007` -> `0x3c00007`
fn parse_active_window_id(line: &str) -> Option<String> {
    line.split_whitespace()
        .last()
        .filter(|id| id.starts_with("0x"))
        .map(str::to_owned)
}

/// `WM_NAME(UTF8_STRING) = "bash in hello"` -> `bash in hello`
fn parse_window_name(line: &str) -> Option<&str> {
    quoted_values(line).next().filter(|name| !name.is_empty())
}

/// `WM_CLASS(STRING) = "navigator", "Firefox"` -> `Firefox`
///
/// The first segment is the instance name, the second carries the human-readable class.
fn parse_window_class(line: &str) -> Option<&str> {
    quoted_values(line).nth(1).filter(|class| !class.is_empty())
}

fn quoted_values(line: &str) -> impl Iterator<Item = &str> {
    let rest = line.split_once('=').map_or("", |(_, rest)| rest);
    rest.split('"').skip(1).step_by(2)
}

#[cfg(test)]
mod tests {
    use super::{parse_active_window_id, parse_window_class, parse_window_name};

    #[test]
    fn test_parse_active_window_id() {
        assert_eq!(
            parse_active_window_id("_NET_ACTIVE_WINDOW(WINDOW): window id # 0x3c00007"),
            Some("0x3c00007".to_owned())
        );
        assert_eq!(
            parse_active_window_id("_NET_ACTIVE_WINDOW(WINDOW): window id # 0x0"),
            Some("0x0".to_owned())
        );
        assert_eq!(
            parse_active_window_id("_NET_ACTIVE_WINDOW:  not found."),
            None
        );
    }

    #[test]
    fn test_parse_window_name() {
        assert_eq!(
            parse_window_name("WM_NAME(UTF8_STRING) = \"bash in hello\""),
            Some("bash in hello")
        );
        assert_eq!(parse_window_name("WM_NAME(UTF8_STRING) = \"\""), None);
        assert_eq!(parse_window_name("WM_NAME:  not found."), None);
    }

    #[test]
    fn test_parse_window_class() {
        assert_eq!(
            parse_window_class("WM_CLASS(STRING) = \"navigator\", \"Firefox\""),
            Some("Firefox")
        );
        assert_eq!(
            parse_window_class("WM_CLASS(STRING) = \"navigator\""),
            None
        );
        assert_eq!(parse_window_class("WM_CLASS:  not found."), None);
    }
}
