//! Contains logic for reading the foreground state from different environments.
//! [GenericWindowProbe] and [GenericUrlProbe] are the main artifacts of this module, selecting a
//! platform implementation once at startup.

#[cfg(target_os = "macos")]
pub mod darwin;
#[cfg(feature = "win")]
pub mod win;
#[cfg(feature = "x11")]
pub mod x11;

#[cfg(feature = "win")]
extern crate windows;

use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use tracing::{debug, error};

/// What a single foreground lookup saw. Fields a probe could not resolve stay unset, a probe miss
/// is not an error.
#[derive(Debug, Clone, Default)]
pub struct ForegroundSnapshot {
    /// Name of the window. For example 'bash in hello' or 'Document 1' or 'Vibing in YouTube -
    /// Chrome'
    pub window: Option<Arc<str>>,
    /// Display name of the owning program. For example 'Google Chrome'
    pub program: Option<Arc<str>>,
}

impl ForegroundSnapshot {
    pub fn unset() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.window.is_some() && self.program.is_some()
    }
}

/// Intended to serve as a contract every platform must implement. A failed lookup degrades to an
/// unset snapshot, it never raises to the caller.
#[cfg_attr(test, automock)]
pub trait WindowProbe {
    fn current(&mut self) -> ForegroundSnapshot;
}

/// Resolves the active url and its domain for a known-browser program, `(None, None)` for
/// everything else. Comparatively expensive, so it is queried once per session close rather than
/// once per tick.
#[cfg_attr(test, automock)]
pub trait UrlProbe {
    fn current(&mut self, program: &str) -> (Option<Arc<str>>, Option<Arc<str>>);
}

/// Browser display names the url probe understands.
pub const KNOWN_BROWSERS: [&str; 3] = ["Google Chrome", "Microsoft Edge", "Firefox"];

pub fn is_known_browser(program: &str) -> bool {
    KNOWN_BROWSERS.iter().any(|browser| program == *browser)
}

/// Derives the domain from a url by stripping the scheme and the path.
pub fn domain_of(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    let domain = rest.split(['/', '?']).next().unwrap_or(rest);
    (!domain.is_empty()).then_some(domain)
}

/// Fallback probe for platforms without an implementation.
pub struct UnknownWindowProbe;

impl WindowProbe for UnknownWindowProbe {
    fn current(&mut self) -> ForegroundSnapshot {
        error!("Current platform is not supported, no window data will be collected");
        ForegroundSnapshot::unset()
    }
}

/// Url lookup for platforms where it is not implemented.
pub struct NullUrlProbe;

impl UrlProbe for NullUrlProbe {
    fn current(&mut self, program: &str) -> (Option<Arc<str>>, Option<Arc<str>>) {
        debug!("Url lookup is not implemented on this platform, skipping {program}");
        (None, None)
    }
}

/// Serves as a cross-compatible [WindowProbe] implementation.
pub struct GenericWindowProbe {
    inner: Box<dyn WindowProbe>,
}

impl GenericWindowProbe {
    pub fn new() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                Self {
                    inner: Box::new(win::WindowsWindowProbe::new()),
                }
            }
            else if #[cfg(feature = "x11")] {
                Self {
                    inner: Box::new(x11::X11WindowProbe::new()),
                }
            }
            else if #[cfg(target_os = "macos")] {
                Self {
                    inner: Box::new(darwin::DarwinWindowProbe::new()),
                }
            }
            else {
                Self {
                    inner: Box::new(UnknownWindowProbe),
                }
            }
        }
    }
}

impl Default for GenericWindowProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowProbe for GenericWindowProbe {
    fn current(&mut self) -> ForegroundSnapshot {
        self.inner.current()
    }
}

/// Serves as a cross-compatible [UrlProbe] implementation.
pub struct GenericUrlProbe {
    inner: Box<dyn UrlProbe>,
}

impl GenericUrlProbe {
    pub fn new() -> Self {
        cfg_if::cfg_if! {
            if #[cfg(feature = "win")] {
                Self {
                    inner: Box::new(win::WindowsUrlProbe::new()),
                }
            }
            else {
                Self {
                    inner: Box::new(NullUrlProbe),
                }
            }
        }
    }
}

impl Default for GenericUrlProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlProbe for GenericUrlProbe {
    fn current(&mut self, program: &str) -> (Option<Arc<str>>, Option<Arc<str>>) {
        self.inner.current(program)
    }
}
