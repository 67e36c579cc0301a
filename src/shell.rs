//! Shell adapter: everything the bar needs to know about files.
//!
//! [`Shell`] has filesystem-backed default methods for the plain queries;
//! shortcut handling, icon extraction and launching are provided by
//! [`SystemShell`], which talks to the Windows shell on Windows and falls
//! back to process spawning and drawn icons elsewhere.

use crate::icon::{load_icon_file, IconPair};
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

#[cfg(windows)]
mod win32;

/// Extension of shell shortcut files.
pub const SHORTCUT_EXT: &str = "lnk";

/// Window state requested for a launched program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShowMode {
    #[default]
    Normal,
    Minimized,
    Maximized,
}

/// What a `.lnk` file points at.
#[derive(Debug, Clone, Default)]
pub struct ShortcutInfo {
    pub target: PathBuf,
    pub description: String,
    pub icons: IconPair,
    /// "Run" setting stored in the shortcut.
    pub show_mode: ShowMode,
}

/// Optional properties written into a new shortcut.
#[derive(Debug, Clone, Default)]
pub struct ShortcutOptions {
    pub description: Option<String>,
    pub icon: Option<(PathBuf, i32)>,
}

pub trait Shell {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_hidden(&self, path: &Path) -> bool {
        #[cfg(windows)]
        {
            use std::os::windows::fs::MetadataExt;
            const FILE_ATTRIBUTE_HIDDEN: u32 = 0x2;
            std::fs::metadata(path)
                .map(|m| m.file_attributes() & FILE_ATTRIBUTE_HIDDEN != 0)
                .unwrap_or(false)
        }
        #[cfg(not(windows))]
        {
            path.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with('.'))
        }
    }

    fn modified(&self, path: &Path) -> Option<SystemTime> {
        std::fs::metadata(path).and_then(|m| m.modified()).ok()
    }

    /// Entries of `dir` in name order. Unreadable directories are empty.
    fn enumerate(&self, dir: &Path) -> Vec<PathBuf> {
        let Ok(read) = std::fs::read_dir(dir) else {
            log::debug!("Cannot enumerate {}", dir.display());
            return Vec::new();
        };
        let mut paths: Vec<PathBuf> = read.filter_map(|e| e.ok()).map(|e| e.path()).collect();
        paths.sort_by_key(|p| p.file_name().map(|n| n.to_string_lossy().to_lowercase()));
        paths
    }

    fn is_shortcut(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(SHORTCUT_EXT))
    }

    fn is_executable(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| ["exe", "com", "bat", "cmd"].iter().any(|x| e.eq_ignore_ascii_case(x)))
    }

    /// Target, description and icons of a shortcut, or `None` when `path`
    /// cannot be read as one.
    fn resolve_shortcut(&self, path: &Path) -> Option<ShortcutInfo>;

    fn create_shortcut(&self, link: &Path, target: &Path, options: &ShortcutOptions) -> Result<()>;

    /// Shell icons of a file or directory. Empty when none can be extracted.
    fn icons_for(&self, path: &Path) -> IconPair;

    /// Icons stored in an icon resource file.
    fn icons_from_file(&self, file: &Path, index: i32) -> IconPair {
        load_icon_file(file, index.max(0) as usize).unwrap_or_else(|e| {
            log::debug!("{e:#}");
            IconPair::default()
        })
    }

    /// Open `path` with the optional `verb` ("runas", "properties", ...).
    fn launch(&self, path: &Path, params: &str, verb: Option<&str>, show: ShowMode) -> Result<()>;

    /// Move a file or directory to the recycle bin.
    fn delete_to_trash(&self, path: &Path) -> Result<()>;

    /// Open Explorer with `path` selected.
    fn reveal(&self, path: &Path) -> Result<()>;

    fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        std::fs::copy(from, to)
            .with_context(|| format!("Failed to copy {} to {}", from.display(), to.display()))?;
        Ok(())
    }

    fn create_dir(&self, path: &Path) -> Result<()> {
        std::fs::create_dir(path)
            .with_context(|| format!("Failed to create folder: {}", path.display()))
    }
}

/// The path a launch of `path` ends up at: the shortcut target for
/// shortcuts, the path itself otherwise. `None` for unreadable shortcuts.
pub fn true_target(shell: &dyn Shell, path: &Path) -> Option<PathBuf> {
    if shell.is_shortcut(path) {
        shell.resolve_shortcut(path).map(|info| info.target)
    } else {
        Some(path.to_path_buf())
    }
}

/// Label shown for a shortcut: its name, then the description on a second
/// line. Names starting with two digits are ordering prefixes, so only the
/// description is shown for them.
pub fn shortcut_tool_tip(link: &Path, description: &str) -> String {
    let name = file_stem(link);
    if description.is_empty() {
        return name;
    }
    let mut chars = name.chars();
    let numbered = matches!((chars.next(), chars.next()), (Some(a), Some(b)) if a.is_ascii_digit() && b.is_ascii_digit());
    if numbered {
        description.to_string()
    } else {
        format!("{name}\n{description}")
    }
}

pub fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name(path))
}

/// Put a shortcut to `source` into `dir`: shortcuts are copied, anything
/// else gets a new `<stem>.lnk`. Returns the path of the shortcut.
pub fn file_to_shortcut(shell: &dyn Shell, source: &Path, dir: &Path) -> Result<PathBuf> {
    if shell.is_shortcut(source) {
        let link = dir.join(file_name(source));
        shell.copy_file(source, &link)?;
        Ok(link)
    } else {
        let link = dir.join(format!("{}.{SHORTCUT_EXT}", file_stem(source)));
        shell.create_shortcut(&link, source, &ShortcutOptions::default())?;
        Ok(link)
    }
}

/// The real shell of the host system.
#[derive(Debug, Default)]
pub struct SystemShell;

impl SystemShell {
    pub fn new() -> Self {
        #[cfg(windows)]
        win32::init_com();
        Self
    }
}

#[cfg(windows)]
impl Shell for SystemShell {
    fn is_executable(&self, path: &Path) -> bool {
        win32::is_executable(path)
    }

    fn resolve_shortcut(&self, path: &Path) -> Option<ShortcutInfo> {
        win32::resolve_shortcut(path)
            .map_err(|e| log::debug!("{e:#}"))
            .ok()
    }

    fn create_shortcut(&self, link: &Path, target: &Path, options: &ShortcutOptions) -> Result<()> {
        win32::create_shortcut(link, target, options)
    }

    fn icons_for(&self, path: &Path) -> IconPair {
        win32::file_icons(path)
    }

    fn icons_from_file(&self, file: &Path, index: i32) -> IconPair {
        let ext = file.extension().and_then(|e| e.to_str()).unwrap_or("");
        if ext.eq_ignore_ascii_case("ico") || ext.eq_ignore_ascii_case("png") {
            return load_icon_file(file, index.max(0) as usize).unwrap_or_default();
        }
        win32::extract_icons(file, index)
    }

    fn launch(&self, path: &Path, params: &str, verb: Option<&str>, show: ShowMode) -> Result<()> {
        win32::shell_execute(path, params, verb, show)
    }

    fn delete_to_trash(&self, path: &Path) -> Result<()> {
        win32::delete_to_trash(path)
    }

    fn reveal(&self, path: &Path) -> Result<()> {
        use std::os::windows::process::CommandExt;
        std::process::Command::new("explorer")
            .raw_arg(format!("/select,\"{}\"", path.display()))
            .creation_flags(0x08000000) // CREATE_NO_WINDOW
            .spawn()
            .context("Failed to start explorer")?;
        Ok(())
    }
}

#[cfg(not(windows))]
impl Shell for SystemShell {
    fn resolve_shortcut(&self, _path: &Path) -> Option<ShortcutInfo> {
        None
    }

    fn create_shortcut(&self, link: &Path, _target: &Path, _options: &ShortcutOptions) -> Result<()> {
        anyhow::bail!("Shortcuts are not supported on this platform: {}", link.display())
    }

    fn icons_for(&self, _path: &Path) -> IconPair {
        IconPair::default()
    }

    fn launch(&self, path: &Path, params: &str, verb: Option<&str>, _show: ShowMode) -> Result<()> {
        if let Some(verb) = verb {
            anyhow::bail!("Verb '{verb}' is not supported on this platform");
        }
        let args = shell_words::split(params)
            .with_context(|| format!("Failed to parse parameters: {params}"))?;
        std::process::Command::new(path)
            .args(args)
            .spawn()
            .with_context(|| format!("Failed to launch {}", path.display()))?;
        Ok(())
    }

    fn delete_to_trash(&self, path: &Path) -> Result<()> {
        let result = if path.is_dir() {
            std::fs::remove_dir_all(path)
        } else {
            std::fs::remove_file(path)
        };
        result.with_context(|| format!("Failed to delete {}", path.display()))
    }

    fn reveal(&self, path: &Path) -> Result<()> {
        anyhow::bail!("Cannot reveal {} on this platform", path.display())
    }
}

/// Test double: `.lnk` files are text files whose first line is the target
/// and whose optional second and third lines are the description and
/// `min`/`max`. Launches are recorded instead of run.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct Launch {
        pub path: PathBuf,
        pub params: String,
        pub verb: Option<String>,
        pub show: ShowMode,
    }

    #[derive(Debug, Clone, Default)]
    pub struct FakeShell {
        pub launches: Rc<RefCell<Vec<Launch>>>,
        pub trashed: Rc<RefCell<Vec<PathBuf>>>,
        pub revealed: Rc<RefCell<Vec<PathBuf>>>,
    }

    impl FakeShell {
        pub fn write_shortcut(link: &Path, target: &Path) {
            std::fs::write(link, target.to_string_lossy().as_bytes()).unwrap();
        }
    }

    impl Shell for FakeShell {
        fn resolve_shortcut(&self, path: &Path) -> Option<ShortcutInfo> {
            let text = std::fs::read_to_string(path).ok()?;
            let mut lines = text.lines();
            let target = PathBuf::from(lines.next()?.trim());
            let description = lines.next().unwrap_or("").trim().to_string();
            let show_mode = match lines.next().map(str::trim) {
                Some("min") => ShowMode::Minimized,
                Some("max") => ShowMode::Maximized,
                _ => ShowMode::Normal,
            };
            Some(ShortcutInfo { target, description, icons: IconPair::default(), show_mode })
        }

        fn create_shortcut(&self, link: &Path, target: &Path, options: &ShortcutOptions) -> Result<()> {
            let mut text = target.to_string_lossy().into_owned();
            if let Some(desc) = &options.description {
                text.push('\n');
                text.push_str(desc);
            }
            std::fs::write(link, text)?;
            Ok(())
        }

        fn icons_for(&self, _path: &Path) -> IconPair {
            IconPair::default()
        }

        fn launch(&self, path: &Path, params: &str, verb: Option<&str>, show: ShowMode) -> Result<()> {
            self.launches.borrow_mut().push(Launch {
                path: path.to_path_buf(),
                params: params.to_string(),
                verb: verb.map(str::to_string),
                show,
            });
            Ok(())
        }

        fn delete_to_trash(&self, path: &Path) -> Result<()> {
            self.trashed.borrow_mut().push(path.to_path_buf());
            if path.is_dir() {
                std::fs::remove_dir_all(path)?;
            } else {
                std::fs::remove_file(path)?;
            }
            Ok(())
        }

        fn reveal(&self, path: &Path) -> Result<()> {
            self.revealed.borrow_mut().push(path.to_path_buf());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::FakeShell;
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_tool_tip_with_description() {
        let link = Path::new("C:\\QL\\Editor.lnk");
        assert_eq!(shortcut_tool_tip(link, ""), "Editor");
        assert_eq!(shortcut_tool_tip(link, "Edit text"), "Editor\nEdit text");
    }

    #[test]
    fn test_tool_tip_numbered_name_shows_description_only() {
        let link = Path::new("C:\\QL\\01 Editor.lnk");
        assert_eq!(shortcut_tool_tip(link, "Edit text"), "Edit text");
        assert_eq!(shortcut_tool_tip(link, ""), "01 Editor");
    }

    #[test]
    fn test_enumerate_sorted_case_insensitive() {
        let dir = TempDir::new().unwrap();
        for name in ["b.txt", "A.txt", "c"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }
        let names: Vec<_> = FakeShell::default()
            .enumerate(dir.path())
            .iter()
            .map(|p| file_name(p))
            .collect();
        assert_eq!(names, ["A.txt", "b.txt", "c"]);
    }

    #[test]
    fn test_enumerate_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(FakeShell::default().enumerate(&dir.path().join("gone")).is_empty());
    }

    #[test]
    fn test_is_shortcut_and_executable() {
        let shell = FakeShell::default();
        assert!(shell.is_shortcut(Path::new("x.LNK")));
        assert!(!shell.is_shortcut(Path::new("x.lnk.txt")));
        assert!(shell.is_executable(Path::new("tool.Exe")));
        assert!(!shell.is_executable(Path::new("notes.txt")));
    }

    #[test]
    fn test_true_target() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("tool.exe");
        std::fs::write(&target, "").unwrap();
        let link = dir.path().join("Tool.lnk");
        FakeShell::write_shortcut(&link, &target);

        let shell = FakeShell::default();
        assert_eq!(true_target(&shell, &link), Some(target.clone()));
        assert_eq!(true_target(&shell, &target), Some(target));
        assert_eq!(true_target(&shell, &dir.path().join("bad.lnk")), None);
    }

    #[test]
    fn test_file_to_shortcut_copies_or_creates() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        let shell = FakeShell::default();

        let doc = src.path().join("report.txt");
        std::fs::write(&doc, "").unwrap();
        let created = file_to_shortcut(&shell, &doc, dst.path()).unwrap();
        assert_eq!(created, dst.path().join("report.lnk"));
        assert_eq!(true_target(&shell, &created), Some(doc));

        let link = src.path().join("Tool.lnk");
        FakeShell::write_shortcut(&link, Path::new("C:\\tool.exe"));
        let copied = file_to_shortcut(&shell, &link, dst.path()).unwrap();
        assert_eq!(copied, dst.path().join("Tool.lnk"));
        assert!(copied.exists());
    }
}
