//! Thin owned wrapper over registry keys.

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;

use windows::core::PCWSTR;
use windows::Win32::Foundation::WIN32_ERROR;
use windows::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExW, RegGetValueW, RegSetValueExW, HKEY, KEY_READ,
    KEY_WRITE, REG_DWORD, REG_OPTION_NON_VOLATILE, REG_SZ, RRF_RT_REG_DWORD, RRF_RT_REG_SZ,
};

pub use windows::Win32::System::Registry::{HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE};

fn wide(s: &str) -> Vec<u16> {
    OsStr::new(s).encode_wide().chain(std::iter::once(0)).collect()
}

/// An open key, closed on drop.
pub struct RegKey(HKEY);

impl Drop for RegKey {
    fn drop(&mut self) {
        let _ = unsafe { RegCloseKey(self.0) };
    }
}

impl RegKey {
    /// Open `subkey` under `root` for reading and writing, creating it
    /// when missing.
    pub fn create(root: HKEY, subkey: &str) -> Result<Self, WIN32_ERROR> {
        let subkey_w = wide(subkey);
        let mut key = HKEY::default();
        let rc = unsafe {
            RegCreateKeyExW(
                root,
                PCWSTR(subkey_w.as_ptr()),
                0,
                PCWSTR::null(),
                REG_OPTION_NON_VOLATILE,
                KEY_READ | KEY_WRITE,
                None,
                &mut key,
                None,
            )
        };
        if rc.is_ok() {
            Ok(Self(key))
        } else {
            Err(rc)
        }
    }

    pub fn get_dword(&self, name: &str) -> Option<u32> {
        read_dword(self.0, None, name)
    }

    pub fn get_string(&self, name: &str) -> Option<String> {
        read_string(self.0, None, name)
    }

    pub fn set_dword(&self, name: &str, value: u32) -> Result<(), WIN32_ERROR> {
        let name_w = wide(name);
        let rc = unsafe {
            RegSetValueExW(self.0, PCWSTR(name_w.as_ptr()), 0, REG_DWORD, Some(&value.to_le_bytes()))
        };
        if rc.is_ok() {
            Ok(())
        } else {
            Err(rc)
        }
    }

    pub fn set_string(&self, name: &str, value: &str) -> Result<(), WIN32_ERROR> {
        let name_w = wide(name);
        let bytes: Vec<u8> = wide(value).iter().flat_map(|c| c.to_le_bytes()).collect();
        let rc = unsafe { RegSetValueExW(self.0, PCWSTR(name_w.as_ptr()), 0, REG_SZ, Some(&bytes)) };
        if rc.is_ok() {
            Ok(())
        } else {
            Err(rc)
        }
    }
}

/// A `REG_DWORD` value of `root\subkey`.
pub fn read_dword(root: HKEY, subkey: Option<&str>, name: &str) -> Option<u32> {
    let subkey_w = subkey.map(wide);
    let name_w = wide(name);
    let mut value = 0u32;
    let mut size = std::mem::size_of::<u32>() as u32;
    let rc = unsafe {
        RegGetValueW(
            root,
            subkey_w.as_ref().map_or(PCWSTR::null(), |s| PCWSTR(s.as_ptr())),
            PCWSTR(name_w.as_ptr()),
            RRF_RT_REG_DWORD,
            None,
            Some(&mut value as *mut u32 as *mut _),
            Some(&mut size),
        )
    };
    rc.is_ok().then_some(value)
}

/// A string value of `root\subkey`. `REG_EXPAND_SZ` values come back with
/// environment variables expanded.
pub fn read_string(root: HKEY, subkey: Option<&str>, name: &str) -> Option<String> {
    let subkey_w = subkey.map(wide);
    let subkey_p = subkey_w.as_ref().map_or(PCWSTR::null(), |s| PCWSTR(s.as_ptr()));
    let name_w = wide(name);
    // RRF_RT_REG_SZ also accepts REG_EXPAND_SZ and expands it
    let flags = RRF_RT_REG_SZ;

    // Ask for the size first
    let mut size = 0u32;
    let rc = unsafe { RegGetValueW(root, subkey_p, PCWSTR(name_w.as_ptr()), flags, None, None, Some(&mut size)) };
    if rc.is_err() || size == 0 {
        return None;
    }
    let mut buf = vec![0u16; (size as usize).div_ceil(2)];
    let rc = unsafe {
        RegGetValueW(
            root,
            subkey_p,
            PCWSTR(name_w.as_ptr()),
            flags,
            None,
            Some(buf.as_mut_ptr().cast()),
            Some(&mut size),
        )
    };
    if rc.is_err() {
        return None;
    }
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    Some(String::from_utf16_lossy(&buf[..len]))
}
