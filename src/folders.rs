//! Well-known shell folders.

use std::path::{Path, PathBuf};

const QUICK_LAUNCH: &str = "Microsoft\\Internet Explorer\\Quick Launch";

#[cfg(windows)]
const EXPLORER_KEY: &str = "Software\\Microsoft\\Windows\\CurrentVersion\\Explorer";

/// A folder from the Explorer shell folder table. Per-user folders come
/// from `User Shell Folders`, all-users folders from the machine-wide
/// `Shell Folders`.
#[cfg(windows)]
fn shell_folder(name: &str, all_users: bool) -> Option<PathBuf> {
    use crate::registry::{read_string, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE};
    let (root, table) = if all_users {
        (HKEY_LOCAL_MACHINE, "Shell Folders")
    } else {
        (HKEY_CURRENT_USER, "User Shell Folders")
    };
    let subkey = format!("{EXPLORER_KEY}\\{table}");
    read_string(root, Some(&subkey), name)
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
}

#[cfg(not(windows))]
fn shell_folder(_name: &str, _all_users: bool) -> Option<PathBuf> {
    None
}

/// The roaming application data folder.
pub fn app_data_dir() -> Option<PathBuf> {
    shell_folder("AppData", false).or_else(dirs::config_dir)
}

/// The Quick Launch folder, the default source of the bar.
pub fn quick_launch_dir() -> Option<PathBuf> {
    app_data_dir().map(|d| quick_launch_under(&d))
}

fn quick_launch_under(app_data: &Path) -> PathBuf {
    QUICK_LAUNCH.split('\\').fold(app_data.to_path_buf(), |p, part| p.join(part))
}

pub fn start_menu_dir(all_users: bool) -> Option<PathBuf> {
    let name = if all_users { "Common Start Menu" } else { "Start Menu" };
    shell_folder(name, all_users)
}

/// Folder whose shortcuts run at logon.
pub fn startup_dir(all_users: bool) -> Option<PathBuf> {
    let name = if all_users { "Common Startup" } else { "Startup" };
    shell_folder(name, all_users)
}

/// Folders and files the bar uses besides its own folder.
#[derive(Debug, Clone, Default)]
pub struct Places {
    /// Shown when no folder is given on the command line.
    pub quick_launch: Option<PathBuf>,
    /// The all-users Start Menu.
    pub start_menu: Option<PathBuf>,
    /// The per-user Start Menu, merged into menus of the all-users one.
    pub user_start_menu: Option<PathBuf>,
    /// Per-user Startup folder, home of the autostart shortcut.
    pub startup: Option<PathBuf>,
    /// The running executable.
    pub app: Option<PathBuf>,
}

impl Places {
    pub fn detect() -> Places {
        Places {
            quick_launch: quick_launch_dir(),
            start_menu: start_menu_dir(true),
            user_start_menu: start_menu_dir(false),
            startup: startup_dir(false),
            app: std::env::current_exe().ok(),
        }
    }
}
