//! Persisted preferences: layout settings and the button order.
//!
//! Values live in a small key/value store, the registry on Windows or a
//! TOML file elsewhere. They are read once at startup and written after
//! every change to the bar.

use crate::settings::{AutoHide, Edge, Settings};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const KEY_LARGE_ICONS: &str = "UseLargeIcons";
pub const KEY_LARGE_MENUS: &str = "UseLargeMenus";
pub const KEY_ON_TOP: &str = "AlwaysOnTop";
pub const KEY_AUTO_HIDE: &str = "AutoHide";
pub const KEY_LOCATION: &str = "Location";
pub const KEY_BUTTONS: &str = "Buttons";

#[derive(Debug, Error)]
pub enum PrefsError {
    #[error("Failed to access preferences file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse preferences file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Failed to serialize preferences: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Registry error {code:#x} on {key}")]
    Registry { key: String, code: u32 },
}

pub trait PreferenceStore {
    fn get_int(&self, key: &str, default: i64) -> i64;
    fn set_int(&mut self, key: &str, value: i64) -> Result<(), PrefsError>;
    fn get_string(&self, key: &str, default: &str) -> String;
    fn set_string(&mut self, key: &str, value: &str) -> Result<(), PrefsError>;

    /// Make earlier `set_*` calls durable.
    fn flush(&mut self) -> Result<(), PrefsError> {
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
enum PrefValue {
    Int(i64),
    Text(String),
}

/// Preferences in a TOML file.
#[derive(Debug, Default)]
pub struct FileStore {
    path: PathBuf,
    values: BTreeMap<String, PrefValue>,
    dirty: bool,
}

impl FileStore {
    /// Open `path`, starting empty when it does not exist yet.
    pub fn open(path: &Path) -> Result<Self, PrefsError> {
        let values = match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => return Err(PrefsError::Io { path: path.to_path_buf(), source }),
        };
        Ok(Self { path: path.to_path_buf(), values, dirty: false })
    }

    /// `launchbar.toml` next to the executable.
    pub fn default_path() -> PathBuf {
        let exe_dir = std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."));
        exe_dir.join("launchbar.toml")
    }

    fn set(&mut self, key: &str, value: PrefValue) {
        if self.values.get(key) != Some(&value) {
            self.values.insert(key.to_string(), value);
            self.dirty = true;
        }
    }
}

impl PreferenceStore for FileStore {
    fn get_int(&self, key: &str, default: i64) -> i64 {
        match self.values.get(key) {
            Some(PrefValue::Int(v)) => *v,
            _ => default,
        }
    }

    fn set_int(&mut self, key: &str, value: i64) -> Result<(), PrefsError> {
        self.set(key, PrefValue::Int(value));
        Ok(())
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        match self.values.get(key) {
            Some(PrefValue::Text(v)) => v.clone(),
            _ => default.to_string(),
        }
    }

    fn set_string(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.set(key, PrefValue::Text(value.to_string()));
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PrefsError> {
        if !self.dirty {
            return Ok(());
        }
        let content = toml::to_string_pretty(&self.values)?;
        std::fs::write(&self.path, content)
            .map_err(|source| PrefsError::Io { path: self.path.clone(), source })?;
        self.dirty = false;
        log::debug!("Saved preferences to {}", self.path.display());
        Ok(())
    }
}

/// Preferences under `HKEY_CURRENT_USER\Software\<name>`.
#[cfg(windows)]
pub struct RegistryStore {
    key: crate::registry::RegKey,
    name: String,
}

#[cfg(windows)]
impl RegistryStore {
    pub fn open(name: &str) -> Result<Self, PrefsError> {
        let subkey = format!("Software\\{name}");
        let key = crate::registry::RegKey::create(crate::registry::HKEY_CURRENT_USER, &subkey)
            .map_err(|e| PrefsError::Registry { key: subkey.clone(), code: e.0 })?;
        Ok(Self { key, name: subkey })
    }

    fn error(&self, value: &str, code: windows::Win32::Foundation::WIN32_ERROR) -> PrefsError {
        PrefsError::Registry { key: format!("{}\\{value}", self.name), code: code.0 }
    }
}

#[cfg(windows)]
impl PreferenceStore for RegistryStore {
    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.key.get_dword(key).map_or(default, |v| v as i32 as i64)
    }

    fn set_int(&mut self, key: &str, value: i64) -> Result<(), PrefsError> {
        self.key
            .set_dword(key, value as i32 as u32)
            .map_err(|e| self.error(key, e))
    }

    fn get_string(&self, key: &str, default: &str) -> String {
        self.key.get_string(key).unwrap_or_else(|| default.to_string())
    }

    fn set_string(&mut self, key: &str, value: &str) -> Result<(), PrefsError> {
        self.key
            .set_string(key, value)
            .map_err(|e| self.error(key, e))
    }
}

/// Overwrite `settings` with the stored values, keeping the current value
/// for anything not stored.
pub fn load_settings(store: &dyn PreferenceStore, settings: &mut Settings) {
    let flag = |key, current: bool| store.get_int(key, current as i64) != 0;
    settings.large_icons = flag(KEY_LARGE_ICONS, settings.large_icons);
    settings.large_menus = flag(KEY_LARGE_MENUS, settings.large_menus);
    settings.on_top = flag(KEY_ON_TOP, settings.on_top);
    settings.auto_hide = AutoHide::from_index(store.get_int(KEY_AUTO_HIDE, settings.auto_hide.index()));
    settings.edge = Edge::from_index(store.get_int(KEY_LOCATION, settings.edge.index()));
}

/// The stored button order, `;`-separated file names.
pub fn load_order(store: &dyn PreferenceStore) -> String {
    store.get_string(KEY_BUTTONS, "")
}

pub fn save(store: &mut dyn PreferenceStore, settings: &Settings, order: &str) -> Result<(), PrefsError> {
    store.set_int(KEY_LARGE_ICONS, settings.large_icons as i64)?;
    store.set_int(KEY_LARGE_MENUS, settings.large_menus as i64)?;
    store.set_int(KEY_ON_TOP, settings.on_top as i64)?;
    store.set_int(KEY_AUTO_HIDE, settings.auto_hide.index())?;
    store.set_int(KEY_LOCATION, settings.edge.index())?;
    store.set_string(KEY_BUTTONS, order)?;
    store.flush()
}
