//! The ordered list of launch buttons and its synchronisation with the bar
//! directory.

use crate::icon::IconPair;
use crate::menu::{build_menu, MenuNode, MenuSources};
use crate::same_path;
use crate::shell::{file_name, shortcut_tool_tip, true_target, Shell, ShowMode};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

/// Default number of buttons a bar holds.
pub const MAX_BUTTONS: usize = 100;

/// Separator of the persisted button order.
pub const ORDER_SEP: char = ';';

/// Identity of a button that survives reordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntryId(u64);

#[derive(Debug, Clone)]
pub struct LaunchEntry {
    pub id: EntryId,
    /// File, shortcut or folder the button launches.
    pub command: PathBuf,
    pub params: String,
    pub tool_tip: String,
    pub icons: IconPair,
    /// Cascading menu of folder buttons.
    pub menu: Option<MenuNode>,
    pub show_mode: ShowMode,
}

impl LaunchEntry {
    pub fn has_menu(&self) -> bool {
        self.menu.is_some()
    }
}

/// Optional details of a new button. Anything left out is looked up from
/// the file itself.
#[derive(Debug, Clone, Default)]
pub struct AddOptions {
    pub position: Option<usize>,
    pub params: String,
    pub icon: Option<(PathBuf, i32)>,
    pub tool_tip: Option<String>,
    /// Ignored for shortcuts, which carry their own.
    pub show_mode: ShowMode,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddRefused {
    #[error("{} does not exist", .0.display())]
    Missing(PathBuf),
    #[error("{} is hidden", .0.display())]
    Hidden(PathBuf),
    #[error("the bar already holds {0} buttons")]
    Full(usize),
}

/// What a [`ButtonList::reconcile`] pass changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub added: usize,
    pub removed: usize,
    pub refreshed: usize,
}

impl SyncReport {
    pub fn changed(&self) -> bool {
        self.added + self.removed + self.refreshed > 0
    }
}

#[derive(Debug)]
pub struct ButtonList {
    entries: Vec<LaunchEntry>,
    capacity: usize,
    last_sync: SystemTime,
    next_id: u64,
}

impl Default for ButtonList {
    fn default() -> Self {
        Self::with_capacity(MAX_BUTTONS)
    }
}

impl ButtonList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
            last_sync: SystemTime::now(),
            next_id: 1,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, index: usize) -> Option<&LaunchEntry> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LaunchEntry> {
        self.entries.iter()
    }

    /// Insert a button for `path`. The list is left untouched when the
    /// path is refused.
    pub fn add(
        &mut self,
        shell: &dyn Shell,
        sources: &MenuSources,
        path: &Path,
        options: AddOptions,
    ) -> Result<EntryId, AddRefused> {
        if !shell.exists(path) {
            return Err(AddRefused::Missing(path.to_path_buf()));
        }
        if shell.is_hidden(path) {
            return Err(AddRefused::Hidden(path.to_path_buf()));
        }
        if self.entries.len() >= self.capacity {
            return Err(AddRefused::Full(self.capacity));
        }

        let (tool_tip, icons, link_show) = describe(shell, path, options.icon.as_ref());
        let menu = folder_menu(shell, sources, path);
        let id = EntryId(self.next_id);
        self.next_id += 1;

        let entry = LaunchEntry {
            id,
            command: path.to_path_buf(),
            params: options.params,
            tool_tip: options.tool_tip.unwrap_or(tool_tip),
            icons,
            menu,
            show_mode: link_show.unwrap_or(options.show_mode),
        };
        let position = options.position.unwrap_or(self.entries.len()).min(self.entries.len());
        self.entries.insert(position, entry);
        log::debug!("Added button {} at {position}", path.display());
        Ok(id)
    }

    pub fn remove(&mut self, index: usize) -> Option<LaunchEntry> {
        (index < self.entries.len()).then(|| self.entries.remove(index))
    }

    /// Move the button at `from` to `to`, shifting the buttons in between
    /// by one. `to` is clamped to the last position. Returns the final
    /// position, or `None` when `from` is out of range.
    pub fn reorder(&mut self, from: usize, to: usize) -> Option<usize> {
        if from >= self.entries.len() {
            return None;
        }
        let to = to.min(self.entries.len() - 1);
        if from < to {
            self.entries[from..=to].rotate_left(1);
        } else {
            self.entries[to..=from].rotate_right(1);
        }
        Some(to)
    }

    /// Bring the list in line with `dir`: drop buttons whose file is gone,
    /// refresh shortcuts and folders changed since the last pass, rebuild
    /// every folder menu and append buttons for new files.
    pub fn reconcile(&mut self, shell: &dyn Shell, sources: &MenuSources, dir: &Path) -> SyncReport {
        let mut report = SyncReport::default();
        let since = self.last_sync;
        let now = SystemTime::now();

        let before = self.entries.len();
        self.entries.retain(|e| shell.exists(&e.command));
        report.removed = before - self.entries.len();

        for entry in &mut self.entries {
            let changed = shell.modified(&entry.command).is_some_and(|m| m > since);
            if changed && (shell.is_shortcut(&entry.command) || shell.is_dir(&entry.command)) {
                let (tool_tip, icons, link_show) = describe(shell, &entry.command, None);
                entry.tool_tip = tool_tip;
                entry.icons = icons;
                if let Some(show) = link_show {
                    entry.show_mode = show;
                }
                report.refreshed += 1;
            }
            // Folder contents can change without touching the folder itself
            if entry.menu.is_some() {
                entry.menu = folder_menu(shell, sources, &entry.command);
            }
        }

        for path in shell.enumerate(dir) {
            if self.index_of_file_name(&file_name(&path)).is_some() {
                continue;
            }
            match self.add(shell, sources, &path, AddOptions::default()) {
                Ok(_) => report.added += 1,
                Err(e) => log::debug!("Not adding {}: {e}", path.display()),
            }
        }

        self.last_sync = now;
        if report.changed() {
            log::info!(
                "Synchronised with {}: {} added, {} removed, {} refreshed",
                dir.display(),
                report.added,
                report.removed,
                report.refreshed
            );
        }
        report
    }

    pub fn index_of_command(&self, path: &Path) -> Option<usize> {
        self.entries.iter().position(|e| same_path(&e.command, path))
    }

    pub fn index_of_id(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    fn index_of_file_name(&self, name: &str) -> Option<usize> {
        self.entries
            .iter()
            .position(|e| file_name(&e.command).to_lowercase() == name.to_lowercase())
    }

    /// The persisted order: file names joined by `;`, with a trailing `;`.
    pub fn order_string(&self) -> String {
        self.entries
            .iter()
            .map(|e| format!("{}{ORDER_SEP}", file_name(&e.command)))
            .collect()
    }

    /// Add `dir/name` for each name of a persisted order. Names that can no
    /// longer be added are skipped. Returns the number of buttons added.
    pub fn load_order(&mut self, shell: &dyn Shell, sources: &MenuSources, dir: &Path, order: &str) -> usize {
        let mut added = 0;
        for name in order.split(ORDER_SEP).map(str::trim).filter(|n| !n.is_empty()) {
            if self.index_of_file_name(name).is_some() {
                continue;
            }
            match self.add(shell, sources, &dir.join(name), AddOptions::default()) {
                Ok(_) => added += 1,
                Err(e) => log::debug!("Skipping saved button {name}: {e}"),
            }
        }
        added
    }
}

/// Tool tip and icons for a button on `path`, plus the show mode stored in
/// shortcuts.
fn describe(shell: &dyn Shell, path: &Path, icon: Option<&(PathBuf, i32)>) -> (String, IconPair, Option<ShowMode>) {
    let is_dir = shell.is_dir(path);
    if shell.is_shortcut(path) {
        if let Some(info) = shell.resolve_shortcut(path) {
            let target_is_dir = shell.is_dir(&info.target);
            let tool_tip = shortcut_tool_tip(path, &info.description);
            return (tool_tip, info.icons.or_fallback(target_is_dir), Some(info.show_mode));
        }
    }
    let icons = match icon {
        Some((file, index)) => shell.icons_from_file(file, *index),
        None => shell.icons_for(path),
    };
    let icons = if icons.is_empty() { shell.icons_for(path) } else { icons };
    (file_name(path), icons.or_fallback(is_dir), None)
}

/// Menu of a button whose true target is a folder.
fn folder_menu(shell: &dyn Shell, sources: &MenuSources, path: &Path) -> Option<MenuNode> {
    let target = true_target(shell, path)?;
    shell
        .is_dir(&target)
        .then(|| build_menu(shell, &target, sources))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::testing::FakeShell;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, "").unwrap();
        path
    }

    fn names(list: &ButtonList) -> Vec<String> {
        list.iter().map(|e| file_name(&e.command)).collect()
    }

    fn add(list: &mut ButtonList, path: &Path) -> Result<EntryId, AddRefused> {
        list.add(&FakeShell::default(), &MenuSources::default(), path, AddOptions::default())
    }

    #[test]
    fn test_add_missing_leaves_list_unchanged() {
        let dir = TempDir::new().unwrap();
        let mut list = ButtonList::new();
        add(&mut list, &touch(dir.path(), "a.exe")).unwrap();

        let missing = dir.path().join("missing.exe");
        assert_eq!(add(&mut list, &missing), Err(AddRefused::Missing(missing)));
        assert_eq!(names(&list), ["a.exe"]);
    }

    #[test]
    fn test_add_respects_capacity() {
        let dir = TempDir::new().unwrap();
        let mut list = ButtonList::with_capacity(2);
        add(&mut list, &touch(dir.path(), "a.exe")).unwrap();
        add(&mut list, &touch(dir.path(), "b.exe")).unwrap();
        assert_eq!(add(&mut list, &touch(dir.path(), "c.exe")), Err(AddRefused::Full(2)));
        assert_eq!(list.len(), 2);
    }

    #[cfg(not(windows))]
    #[test]
    fn test_add_hidden_is_refused() {
        let dir = TempDir::new().unwrap();
        let mut list = ButtonList::new();
        let hidden = touch(dir.path(), ".secret");
        assert_eq!(add(&mut list, &hidden), Err(AddRefused::Hidden(hidden)));
    }

    #[test]
    fn test_add_inserts_at_position() {
        let dir = TempDir::new().unwrap();
        let mut list = ButtonList::new();
        add(&mut list, &touch(dir.path(), "a.exe")).unwrap();
        add(&mut list, &touch(dir.path(), "b.exe")).unwrap();
        let options = AddOptions { position: Some(1), ..Default::default() };
        list.add(&FakeShell::default(), &MenuSources::default(), &touch(dir.path(), "c.exe"), options)
            .unwrap();
        let options = AddOptions { position: Some(99), ..Default::default() };
        list.add(&FakeShell::default(), &MenuSources::default(), &touch(dir.path(), "d.exe"), options)
            .unwrap();
        assert_eq!(names(&list), ["a.exe", "c.exe", "b.exe", "d.exe"]);
    }

    #[test]
    fn test_add_describes_entry() {
        let dir = TempDir::new().unwrap();
        let mut list = ButtonList::new();
        let tool = touch(dir.path(), "tool.exe");
        let link = dir.path().join("Tool.lnk");
        std::fs::write(&link, format!("{}\nBuild things", tool.display())).unwrap();
        let folder = dir.path().join("Games");
        std::fs::create_dir(&folder).unwrap();
        touch(&folder, "chess.exe");

        add(&mut list, &tool).unwrap();
        add(&mut list, &link).unwrap();
        add(&mut list, &folder).unwrap();

        assert_eq!(list.get(0).unwrap().tool_tip, "tool.exe");
        assert!(!list.get(0).unwrap().has_menu());
        assert_eq!(list.get(1).unwrap().tool_tip, "Tool\nBuild things");
        let menu = list.get(2).unwrap().menu.as_ref().unwrap();
        assert_eq!(menu.children.as_ref().unwrap()[0].label, "chess");
        assert!(list.get(0).unwrap().icons.small.is_some());
    }

    #[test]
    fn test_add_with_overrides() {
        let dir = TempDir::new().unwrap();
        let mut list = ButtonList::new();
        let options = AddOptions {
            params: "-v".into(),
            tool_tip: Some("Verbose".into()),
            ..Default::default()
        };
        list.add(&FakeShell::default(), &MenuSources::default(), &touch(dir.path(), "x.exe"), options)
            .unwrap();
        let entry = list.get(0).unwrap();
        assert_eq!(entry.tool_tip, "Verbose");
        assert_eq!(entry.params, "-v");
    }

    #[test]
    fn test_reorder_rotates_and_round_trips() {
        let dir = TempDir::new().unwrap();
        let mut list = ButtonList::new();
        for name in ["a", "b", "c", "d", "e"] {
            add(&mut list, &touch(dir.path(), name)).unwrap();
        }
        let original = names(&list);

        assert_eq!(list.reorder(1, 3), Some(3));
        assert_eq!(names(&list), ["a", "c", "d", "b", "e"]);
        list.reorder(3, 1);
        assert_eq!(names(&list), original);

        list.reorder(4, 0);
        assert_eq!(names(&list), ["e", "a", "b", "c", "d"]);
        list.reorder(0, 4);
        assert_eq!(names(&list), original);
    }

    #[test]
    fn test_reorder_clamps_target() {
        let dir = TempDir::new().unwrap();
        let mut list = ButtonList::new();
        for name in ["a", "b", "c"] {
            add(&mut list, &touch(dir.path(), name)).unwrap();
        }
        assert_eq!(list.reorder(0, 3), Some(2));
        assert_eq!(names(&list), ["b", "c", "a"]);
        assert_eq!(list.reorder(7, 0), None);
    }

    #[test]
    fn test_reconcile_adds_removes_and_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let shell = FakeShell::default();
        let sources = MenuSources::default();
        let mut list = ButtonList::new();
        touch(dir.path(), "a.exe");
        touch(dir.path(), "b.exe");

        let first = list.reconcile(&shell, &sources, dir.path());
        assert_eq!(first.added, 2);
        assert_eq!(names(&list), ["a.exe", "b.exe"]);

        let second = list.reconcile(&shell, &sources, dir.path());
        assert_eq!((second.added, second.removed), (0, 0));
        assert_eq!(names(&list), ["a.exe", "b.exe"]);

        std::fs::remove_file(dir.path().join("a.exe")).unwrap();
        touch(dir.path(), "c.exe");
        let third = list.reconcile(&shell, &sources, dir.path());
        assert_eq!((third.added, third.removed), (1, 1));
        assert_eq!(names(&list), ["b.exe", "c.exe"]);
    }

    #[test]
    fn test_reconcile_removes_consecutive_missing_entries() {
        let dir = TempDir::new().unwrap();
        let shell = FakeShell::default();
        let sources = MenuSources::default();
        let mut list = ButtonList::new();
        for name in ["a", "b", "c"] {
            touch(dir.path(), name);
        }
        list.reconcile(&shell, &sources, dir.path());
        std::fs::remove_file(dir.path().join("a")).unwrap();
        std::fs::remove_file(dir.path().join("b")).unwrap();

        let report = list.reconcile(&shell, &sources, dir.path());
        assert_eq!(report.removed, 2);
        assert_eq!(names(&list), ["c"]);
    }

    #[test]
    fn test_reconcile_rebuilds_folder_menus() {
        let dir = TempDir::new().unwrap();
        let shell = FakeShell::default();
        let sources = MenuSources::default();
        let folder = dir.path().join("Tools");
        std::fs::create_dir(&folder).unwrap();
        let mut list = ButtonList::new();
        list.reconcile(&shell, &sources, dir.path());
        assert_eq!(list.get(0).unwrap().menu.as_ref().unwrap().descendant_count(), 0);

        touch(&folder, "hammer.exe");
        list.reconcile(&shell, &sources, dir.path());
        assert_eq!(list.get(0).unwrap().menu.as_ref().unwrap().descendant_count(), 1);
    }

    #[test]
    fn test_reconcile_refreshes_modified_shortcut() {
        let dir = TempDir::new().unwrap();
        let programs = TempDir::new().unwrap();
        let shell = FakeShell::default();
        let sources = MenuSources::default();
        let tool = touch(programs.path(), "tool.exe");
        let link = dir.path().join("Tool.lnk");
        std::fs::write(&link, format!("{}\nOld", tool.display())).unwrap();

        let mut list = ButtonList::new();
        list.reconcile(&shell, &sources, dir.path());
        assert_eq!(list.get(0).unwrap().tool_tip, "Tool\nOld");
        assert_eq!(list.get(0).unwrap().show_mode, ShowMode::Normal);

        std::fs::write(&link, format!("{}\nNew\nmax", tool.display())).unwrap();
        // Coarse filesystem clocks may stamp the write before the last pass
        std::fs::File::options()
            .write(true)
            .open(&link)
            .unwrap()
            .set_modified(SystemTime::now())
            .unwrap();
        let report = list.reconcile(&shell, &sources, dir.path());
        assert_eq!(report.refreshed, 1);
        let entry = list.get(0).unwrap();
        assert_eq!(entry.tool_tip, "Tool\nNew");
        assert_eq!(entry.show_mode, ShowMode::Maximized);

        let report = list.reconcile(&shell, &sources, dir.path());
        assert_eq!(report, SyncReport::default());
    }

    #[test]
    fn test_shortcut_show_mode_beats_option() {
        let dir = TempDir::new().unwrap();
        let tool = touch(dir.path(), "tool.exe");
        let link = dir.path().join("Tool.lnk");
        std::fs::write(&link, format!("{}\n\nmin", tool.display())).unwrap();
        let mut list = ButtonList::new();

        let options = AddOptions { show_mode: ShowMode::Maximized, ..Default::default() };
        list.add(&FakeShell::default(), &MenuSources::default(), &link, options.clone()).unwrap();
        list.add(&FakeShell::default(), &MenuSources::default(), &tool, options).unwrap();
        assert_eq!(list.get(0).unwrap().show_mode, ShowMode::Minimized);
        assert_eq!(list.get(1).unwrap().show_mode, ShowMode::Maximized);
    }

    #[test]
    fn test_order_string_and_load_order() {
        let dir = TempDir::new().unwrap();
        let shell = FakeShell::default();
        let sources = MenuSources::default();
        for name in ["a.exe", "b.exe", "c.exe"] {
            touch(dir.path(), name);
        }
        let mut list = ButtonList::new();
        let added = list.load_order(&shell, &sources, dir.path(), "c.exe;gone.exe;a.exe;");
        assert_eq!(added, 2);
        assert_eq!(list.order_string(), "c.exe;a.exe;");

        // The rest of the directory is appended on the next pass
        list.reconcile(&shell, &sources, dir.path());
        assert_eq!(names(&list), ["c.exe", "a.exe", "b.exe"]);
    }

    #[test]
    fn test_lookups() {
        let dir = TempDir::new().unwrap();
        let mut list = ButtonList::new();
        let a = touch(dir.path(), "A.exe");
        let id_a = add(&mut list, &a).unwrap();
        let id_b = add(&mut list, &touch(dir.path(), "b.exe")).unwrap();

        let upper = PathBuf::from(a.to_string_lossy().to_uppercase());
        assert_eq!(list.index_of_command(&a), Some(0));
        assert_eq!(list.index_of_command(&upper), Some(0));
        assert_eq!(list.index_of_id(id_b), Some(1));
        list.reorder(1, 0);
        assert_eq!(list.index_of_id(id_a), Some(1));
        assert!(list.remove(5).is_none());
        assert!(list.remove(0).is_some());
        assert_eq!(list.index_of_id(id_b), None);
    }
}
