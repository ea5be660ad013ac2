use std::{ffi::c_void, path::Path, sync::Arc};

use anyhow::{anyhow, bail, Result};
use sysinfo::Pid;
use tracing::{debug, error};
use windows::{
    core::{PCWSTR, VARIANT},
    Win32::{
        Foundation::HWND,
        Storage::FileSystem::{GetFileVersionInfoSizeW, GetFileVersionInfoW, VerQueryValueW},
        System::Com::{
            CoCreateInstance, CoInitializeEx, CLSCTX_INPROC_SERVER, COINIT_APARTMENTTHREADED,
        },
        UI::{
            Accessibility::{
                CUIAutomation, IUIAutomation, TreeScope_Descendants, UIA_ControlTypePropertyId,
                UIA_EditControlTypeId, UIA_NamePropertyId, UIA_ValueValuePropertyId,
            },
            WindowsAndMessaging::{GetForegroundWindow, GetWindowTextW, GetWindowThreadProcessId},
        },
    },
};

use super::{domain_of, is_known_browser, ForegroundSnapshot, UrlProbe, WindowProbe};

/// Title of the overlay surface that Alt+Tab and similar switchers bring to the foreground.
const TASK_SWITCHING_OVERLAY: &str = "Task Switching";

/// Accessible name of the address bar control in chromium-style browsers.
const OMNIBOX_TITLE: &str = "Address and search bar";

#[tracing::instrument]
fn get_active() -> Result<ForegroundSnapshot> {
    let window = unsafe { GetForegroundWindow() };

    if window.is_invalid() {
        return Err(anyhow!("Failed to get foreground window"));
    }

    let mut id = 0u32;
    unsafe { GetWindowThreadProcessId(window, Some(&mut id)) };
    if id == 0 {
        bail!("Failed to resolve the owning process of the foreground window");
    }

    // Only one active instance of a process is considered. A window whose process is already gone
    // was not interacted with by the user.
    let system = sysinfo::System::new_all();
    let Some(process) = system.process(Pid::from_u32(id)) else {
        return Ok(ForegroundSnapshot::unset());
    };

    let mut text: [u16; 4096] = [0; 4096];
    let title = unsafe { get_window_title(window, &mut text) };
    // Skip program-switching overlays invoked with Alt+Tab.
    let title = Some(title).filter(|t| !t.is_empty() && t != TASK_SWITCHING_OVERLAY);

    // The program display name comes from the executable's version resource.
    let program = process.exe().and_then(|exe| {
        file_description(exe)
            .inspect_err(|e| error!("Could not resolve program name from {exe:?}: {e:?}"))
            .ok()
    });

    Ok(ForegroundSnapshot {
        window: title.map(Into::into),
        program: program.map(Into::into),
    })
}

unsafe fn get_window_title(window_handle: HWND, text: &mut [u16]) -> String {
    let len = unsafe { GetWindowTextW(window_handle, text) };
    String::from_utf16_lossy(&text[..len as usize])
}

/// Reads the FileDescription string from an executable's embedded version resource. The language
/// block is picked from the first entry of the translation table.
fn file_description(path: &Path) -> Result<String> {
    let wide = wide_null(&path.to_string_lossy());
    let path_ptr = PCWSTR::from_raw(wide.as_ptr());

    unsafe {
        let size = GetFileVersionInfoSizeW(path_ptr, None);
        if size == 0 {
            bail!("Executable carries no version resource");
        }
        let mut data = vec![0u8; size as usize];
        GetFileVersionInfoW(path_ptr, 0, size, data.as_mut_ptr() as *mut c_void)?;

        let translation = query_value(&data, "\\VarFileInfo\\Translation")?;
        if translation.len < 4 {
            bail!("Version resource has an empty translation table");
        }
        let lang = *(translation.ptr as *const u16);
        let page = *(translation.ptr as *const u16).add(1);

        let query = format!("\\StringFileInfo\\{lang:04X}{page:04X}\\FileDescription");
        let description = query_value(&data, &query)?;
        // For string values the reported length is in characters and includes the terminator.
        let chars = std::slice::from_raw_parts(
            description.ptr as *const u16,
            description.len.saturating_sub(1) as usize,
        );
        Ok(String::from_utf16_lossy(chars))
    }
}

struct VersionValue {
    ptr: *const c_void,
    len: u32,
}

unsafe fn query_value(data: &[u8], query: &str) -> Result<VersionValue> {
    let query_w = wide_null(query);
    let mut ptr: *mut c_void = std::ptr::null_mut();
    let mut len = 0u32;
    let found = unsafe {
        VerQueryValueW(
            data.as_ptr() as *const c_void,
            PCWSTR::from_raw(query_w.as_ptr()),
            &mut ptr,
            &mut len,
        )
    };
    if !found.as_bool() || ptr.is_null() {
        bail!("Version resource query {query} returned nothing");
    }
    Ok(VersionValue { ptr, len })
}

fn wide_null(value: &str) -> Vec<u16> {
    value.encode_utf16().chain(std::iter::once(0)).collect()
}

pub struct WindowsWindowProbe {}

impl WindowsWindowProbe {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for WindowsWindowProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowProbe for WindowsWindowProbe {
    fn current(&mut self) -> ForegroundSnapshot {
        match get_active() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                error!("Failed to get active window {e:?}");
                ForegroundSnapshot::unset()
            }
        }
    }
}

/// Reads the address bar of the foreground browser window through UI Automation.
pub struct WindowsUrlProbe {
    automation: Option<IUIAutomation>,
}

impl WindowsUrlProbe {
    pub fn new() -> Self {
        let automation = unsafe {
            let _ = CoInitializeEx(None, COINIT_APARTMENTTHREADED);
            CoCreateInstance(&CUIAutomation, None, CLSCTX_INPROC_SERVER)
                .inspect_err(|e| error!("Failed to initialize UI automation {e:?}"))
                .ok()
        };
        Self { automation }
    }

    fn read_address_bar(&self) -> Result<Option<String>> {
        let Some(automation) = &self.automation else {
            bail!("UI automation is unavailable");
        };
        let window = unsafe { GetForegroundWindow() };
        if window.is_invalid() {
            // The browser window is already gone, nothing to read.
            return Ok(None);
        }
        unsafe {
            let root = automation.ElementFromHandle(window)?;
            let name = automation
                .CreatePropertyCondition(UIA_NamePropertyId, &VARIANT::from(OMNIBOX_TITLE))?;
            let edit = automation.CreatePropertyCondition(
                UIA_ControlTypePropertyId,
                &VARIANT::from(UIA_EditControlTypeId.0),
            )?;
            let condition = automation.CreateAndCondition(&name, &edit)?;
            let Ok(omnibox) = root.FindFirst(TreeScope_Descendants, &condition) else {
                // No address bar below this window, e.g. a dialog carrying the browser's title.
                return Ok(None);
            };
            let value = omnibox.GetCurrentPropertyValue(UIA_ValueValuePropertyId)?;
            let text = value.to_string();
            if text.is_empty() {
                return Ok(None);
            }
            // The omnibox hides the scheme.
            Ok(Some(if text.contains("://") {
                text
            } else {
                format!("https://{text}")
            }))
        }
    }
}

impl Default for WindowsUrlProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl UrlProbe for WindowsUrlProbe {
    fn current(&mut self, program: &str) -> (Option<Arc<str>>, Option<Arc<str>>) {
        if !is_known_browser(program) {
            return (None, None);
        }
        match self.read_address_bar() {
            Ok(Some(url)) => {
                let domain = domain_of(&url).map(Into::into);
                (Some(url.into()), domain)
            }
            Ok(None) => {
                debug!("No address bar found on the foreground window");
                (None, None)
            }
            Err(e) => {
                error!("Failed to read the active url {e:?}");
                (None, None)
            }
        }
    }
}
