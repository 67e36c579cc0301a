//! LaunchBar core: a strip of launcher buttons mirroring a directory.
//!
//! Everything in this crate is platform independent except the Windows
//! shell and registry back ends, which compile only on Windows. The GUI
//! front end lives in the `launchbar` binary.

pub mod alert;
pub mod bar;
pub mod buttons;
pub mod cli;
pub mod config;
pub mod folders;
pub mod icon;
pub mod layout;
pub mod menu;
pub mod prefs;
#[cfg(windows)]
pub mod registry;
pub mod settings;
pub mod shell;
pub mod watcher;

pub use alert::{fatal, show_message, Severity};
pub use bar::{BarEvent, Effect, LaunchBar};
pub use buttons::{ButtonList, EntryId, LaunchEntry};
pub use cli::Invocation;
pub use folders::Places;
pub use layout::{Layout, Rect};
pub use menu::MenuNode;
pub use settings::{AutoHide, Edge, Settings};
pub use shell::{Shell, SystemShell};

/// Name used for window titles, registry keys and the shortcut created in
/// the Startup folder.
pub const PROG_NAME: &str = "LaunchBar";

/// Case-insensitive path equality, the way the Windows file system compares.
pub fn same_path(a: &std::path::Path, b: &std::path::Path) -> bool {
    let a = a.to_string_lossy();
    let b = b.to_string_lossy();
    let a = a.trim_end_matches(['\\', '/']);
    let b = b.trim_end_matches(['\\', '/']);
    a.eq_ignore_ascii_case(b) || a.to_lowercase() == b.to_lowercase()
}
