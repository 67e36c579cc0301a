//! Configuration file: a fixed list of buttons instead of a mirrored
//! directory.
//!
//! ```text
//! # comment
//! POSITION=2
//! Notepad;notepad.exe
//! Log;notepad.exe;%TEMP%\app.log;C:\icons\log.ico;0
//! ```

use crate::settings::Settings;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

const FIELD_SEP: char = ';';

/// One button line: `tooltip;command;params;iconFile;iconIndex`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigEntry {
    pub tool_tip: Option<String>,
    pub command: PathBuf,
    pub params: String,
    pub icon_file: Option<PathBuf>,
    pub icon_index: i32,
}

/// Read `path`, applying settings lines to `settings` and returning the
/// button lines whose command could be located.
pub fn load(path: &Path, settings: &mut Settings) -> Result<Vec<ConfigEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    Ok(parse(&content, settings, locate_file))
}

pub fn parse(
    content: &str,
    settings: &mut Settings,
    locate: impl Fn(&str) -> Option<PathBuf>,
) -> Vec<ConfigEntry> {
    let mut entries = Vec::new();
    for (number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if settings.apply(line) {
            continue;
        }

        let line = expand_env_vars(line);
        let mut fields = line.split(FIELD_SEP).map(str::trim);
        let tool_tip = fields.next().filter(|s| !s.is_empty()).map(str::to_string);
        let command = fields.next().unwrap_or("");
        if command.is_empty() {
            log::warn!("Config line {}: no command", number + 1);
            continue;
        }
        let Some(command) = locate(command) else {
            log::warn!("Config line {}: cannot find {command}", number + 1);
            continue;
        };
        let params = fields.next().unwrap_or("").to_string();
        let icon_file = fields.next().filter(|s| !s.is_empty()).map(PathBuf::from);
        let icon_index = fields.next().and_then(|s| s.parse().ok()).unwrap_or(0);

        entries.push(ConfigEntry { tool_tip, command, params, icon_file, icon_index });
    }
    entries
}

/// Replace `%NAME%` references with environment values. Unknown names
/// and lone `%` signs are kept as written.
pub fn expand_env_vars(s: &str) -> String {
    expand_with(s, |name| std::env::var(name).ok())
}

fn expand_with(s: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('%') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        match after.find('%') {
            Some(end) if end > 0 => {
                let name = &after[..end];
                match lookup(name) {
                    Some(value) => out.push_str(&value),
                    None => {
                        out.push('%');
                        out.push_str(name);
                        out.push('%');
                    }
                }
                rest = &after[end + 1..];
            }
            _ => {
                out.push('%');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// `command` as given when it exists, otherwise the first match in a
/// `PATH` directory.
pub fn locate_file(command: &str) -> Option<PathBuf> {
    let path = Path::new(command);
    if path.exists() {
        return Some(path.to_path_buf());
    }
    if path.components().count() != 1 {
        return None;
    }
    let search = std::env::var_os("PATH")?;
    std::env::split_paths(&search)
        .map(|dir| dir.join(command))
        .find(|candidate| candidate.is_file())
}
