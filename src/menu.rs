//! Cascading folder menus.
//!
//! A folder button opens a menu tree mirroring its directory. Trees are
//! rebuilt from disk whenever the bar refreshes and are never patched in
//! place.

use crate::icon::IconPair;
use crate::same_path;
use crate::shell::{file_stem, Shell};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

/// Deepest folder nesting mirrored into a menu.
pub const MAX_MENU_DEPTH: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuNode {
    pub label: String,
    /// Path launched when the item is chosen. For shortcuts to folders this
    /// is the folder itself.
    pub target: PathBuf,
    pub icons: IconPair,
    /// Items of a folder. `None` for files, and for folders nested too deep
    /// or looping back to an ancestor.
    pub children: Option<Vec<MenuNode>>,
}

impl MenuNode {
    pub fn is_folder(&self) -> bool {
        self.children.is_some()
    }

    /// Number of nodes below this one.
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .flatten()
            .map(|c| 1 + c.descendant_count())
            .sum()
    }
}

/// Pairs of folders whose menus are shown merged, such as the per-user and
/// the all-users Start Menu.
#[derive(Debug, Clone, Default)]
pub struct MenuSources {
    pairs: Vec<(PathBuf, PathBuf)>,
}

impl MenuSources {
    /// Merge `a` and `b` whenever either of them is opened as a menu.
    pub fn register(&mut self, a: impl Into<PathBuf>, b: impl Into<PathBuf>) {
        let (a, b) = (a.into(), b.into());
        if same_path(&a, &b) {
            return;
        }
        self.pairs.push((b.clone(), a.clone()));
        self.pairs.push((a, b));
    }

    pub fn counterpart(&self, dir: &Path) -> Option<&Path> {
        self.pairs
            .iter()
            .find(|(from, _)| same_path(from, dir))
            .map(|(_, to)| to.as_path())
    }
}

/// Menu tree for the folder `dir`. Returns the folder node itself, labelled
/// with the folder name.
pub fn build_menu(shell: &dyn Shell, dir: &Path, sources: &MenuSources) -> MenuNode {
    let mut ancestors = vec![dir.to_path_buf()];
    let children = build_level(shell, dir, None, sources, &mut ancestors);
    MenuNode {
        label: file_stem(dir),
        target: dir.to_path_buf(),
        icons: shell.icons_for(dir),
        children: Some(children),
    }
}

fn build_level(
    shell: &dyn Shell,
    dir: &Path,
    secondary: Option<PathBuf>,
    sources: &MenuSources,
    ancestors: &mut Vec<PathBuf>,
) -> Vec<MenuNode> {
    let mut paths = shell.enumerate(dir);
    // Folders of the secondary source that share a name with a primary
    // entry, keyed by lowercase stem
    let mut nested: HashMap<String, PathBuf> = HashMap::new();

    let secondary = secondary.or_else(|| sources.counterpart(dir).map(Path::to_path_buf));
    if let Some(secondary) = secondary {
        let mut seen: HashSet<String> = paths.iter().map(|p| file_stem(p).to_lowercase()).collect();
        for path in shell.enumerate(&secondary) {
            let key = file_stem(&path).to_lowercase();
            if seen.insert(key.clone()) {
                paths.push(path);
            } else if shell.is_dir(&path) {
                nested.insert(key, path);
            }
        }
    }

    // Stable: equal names keep primary-before-secondary order
    paths.sort_by(|a, b| {
        shell
            .is_dir(b)
            .cmp(&shell.is_dir(a))
            .then_with(|| file_stem(a).to_lowercase().cmp(&file_stem(b).to_lowercase()))
    });

    let mut items = Vec::with_capacity(paths.len());
    for path in paths {
        if shell.is_hidden(&path) {
            continue;
        }
        let label = file_stem(&path);
        let (target, icons) = if shell.is_shortcut(&path) {
            let Some(info) = shell.resolve_shortcut(&path) else {
                continue;
            };
            if !shell.exists(&info.target) {
                log::debug!("Skipping {}: target is gone", path.display());
                continue;
            }
            let target = if shell.is_dir(&info.target) { info.target } else { path.clone() };
            (target, info.icons)
        } else {
            let icons = shell.icons_for(&path);
            (path.clone(), icons)
        };

        let children = if shell.is_dir(&target) {
            if ancestors.len() >= MAX_MENU_DEPTH || ancestors.iter().any(|a| same_path(a, &target)) {
                // Kept as a plain item that opens the folder
                log::debug!("Not descending into {}", target.display());
                items.push(MenuNode { label, target, icons, children: None });
                continue;
            }
            ancestors.push(target.clone());
            let merged = nested.remove(&label.to_lowercase());
            let sub = build_level(shell, &target, merged, sources, ancestors);
            ancestors.pop();
            Some(sub)
        } else {
            None
        };

        items.push(MenuNode { label, target, icons, children });
    }
    items
}
