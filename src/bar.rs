//! The bar controller.
//!
//! [`LaunchBar`] owns all state of a running bar. The front end turns
//! window, menu and watcher input into [`BarEvent`]s, hands them to
//! [`LaunchBar::handle`] one at a time and carries out the returned
//! [`Effect`].

use crate::alert::Severity;
use crate::buttons::{AddOptions, ButtonList, LaunchEntry};
use crate::cli::Invocation;
use crate::config;
use crate::folders::Places;
use crate::layout::{Layout, Rect};
use crate::menu::{MenuNode, MenuSources};
use crate::prefs::{self, PreferenceStore};
use crate::settings::Settings;
use crate::shell::{file_to_shortcut, true_target, Shell, ShortcutOptions, ShowMode, SHORTCUT_EXT};
use crate::PROG_NAME;
use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

/// Stem of the shortcut to the all-users Start Menu kept in the bar folder.
pub const START_MENU_LINK: &str = "Start Menu";

/// Where the buttons come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Source {
    /// A watched folder, one button per entry.
    Directory(PathBuf),
    /// A fixed list read once from a configuration file.
    ConfigFile(PathBuf),
}

impl Source {
    /// Folders are shown as they are, anything else is read as a
    /// configuration file. No target means the Quick Launch folder.
    pub fn resolve(shell: &dyn Shell, target: Option<&Path>, places: &Places) -> Result<Source> {
        match target {
            Some(path) if shell.is_dir(path) => Ok(Source::Directory(path.to_path_buf())),
            Some(path) => Ok(Source::ConfigFile(path.to_path_buf())),
            None => {
                let dir = places
                    .quick_launch
                    .clone()
                    .context("Quick Launch folder is not configured")?;
                if !shell.is_dir(&dir) {
                    bail!("Directory not found: {}", dir.display());
                }
                Ok(Source::Directory(dir))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BarEvent {
    /// A button was clicked.
    Activate(usize),
    /// An item of a cascading menu was chosen.
    LaunchMenuItem(PathBuf),
    /// Files dropped on the bar outside of any button.
    DropOnBar(Vec<PathBuf>),
    /// A file dropped on a button.
    DropOnEntry { index: usize, file: PathBuf },
    /// A button dragged to a window coordinate.
    MoveEntry { from: usize, x: i32, y: i32 },
    /// The bar folder changed, or the user asked for a refresh.
    Refresh,
    ApplySettings { settings: Settings, autostart: bool },
    /// Put a shortcut to `file` into the bar folder, or into `folder`.
    AddShortcut { file: PathBuf, folder: Option<PathBuf> },
    /// Create a subfolder of the bar folder, or of `parent`.
    CreateFolder { parent: Option<PathBuf>, name: String },
    Delete(PathBuf),
    Properties(PathBuf),
    /// Show the target of a button in Explorer.
    Explore(PathBuf),
    RunAsAdmin(PathBuf),
    ExploreBarDir,
    AddStartMenuLink,
    Help,
    WorkAreaChanged(Rect),
    /// Periodic auto-hide check. `pointer` is in screen coordinates.
    Tick { pointer: (i32, i32), foreground: bool },
    PointerEntered,
    /// Click on the bar outside of any button.
    Clicked,
}

/// What the front end has to do after an event.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    None,
    /// Size, position or buttons changed: move the window and redraw.
    Relayout,
    /// Pop up the cascading menu of a button.
    OpenMenu(usize),
    MainMenu,
    Notify(Severity, String),
}

pub const HELP_URL: &str = "http://www.lerup.com/LaunchBar";

pub struct LaunchBar {
    shell: Box<dyn Shell>,
    prefs: Option<Box<dyn PreferenceStore>>,
    places: Places,
    settings: Settings,
    source: Source,
    buttons: ButtonList,
    sources: MenuSources,
    work_area: Rect,
    layout: Layout,
    hidden: bool,
}

impl LaunchBar {
    /// Build the bar for `invocation`. `prefs` is only consulted for folder
    /// bars started without settings on the command line. Errors here are
    /// configuration errors and should end the process.
    pub fn start(
        shell: Box<dyn Shell>,
        invocation: Invocation,
        prefs: Option<Box<dyn PreferenceStore>>,
        places: Places,
        work_area: Rect,
    ) -> Result<LaunchBar> {
        let source = Source::resolve(shell.as_ref(), invocation.target.as_deref(), &places)?;
        let mut settings = invocation.settings;
        let mut prefs = if invocation.settings_given { None } else { prefs };

        let mut sources = MenuSources::default();
        if let (Some(all), Some(user)) = (&places.start_menu, &places.user_start_menu) {
            sources.register(all.clone(), user.clone());
        }

        let mut buttons = ButtonList::new();
        match &source {
            Source::Directory(dir) => {
                if let Some(store) = prefs.as_deref() {
                    prefs::load_settings(store, &mut settings);
                    let order = prefs::load_order(store);
                    buttons.load_order(shell.as_ref(), &sources, dir, &order);
                }
                buttons.reconcile(shell.as_ref(), &sources, dir);
            }
            Source::ConfigFile(path) => {
                prefs = None;
                for entry in config::load(path, &mut settings)? {
                    let options = AddOptions {
                        params: entry.params,
                        icon: entry.icon_file.map(|f| (f, entry.icon_index)),
                        tool_tip: entry.tool_tip,
                        ..Default::default()
                    };
                    if let Err(e) = buttons.add(shell.as_ref(), &sources, &entry.command, options) {
                        log::warn!("Skipping {}: {e}", entry.command.display());
                    }
                }
            }
        }

        let layout = Layout::compute(&settings, buttons.len(), work_area);
        log::info!("Started with {} buttons from {source:?}", buttons.len());
        Ok(LaunchBar {
            shell,
            prefs,
            places,
            settings,
            source,
            buttons,
            sources,
            work_area,
            layout,
            hidden: false,
        })
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn entries(&self) -> impl Iterator<Item = &LaunchEntry> {
        self.buttons.iter()
    }

    pub fn entry(&self, index: usize) -> Option<&LaunchEntry> {
        self.buttons.get(index)
    }

    pub fn menu(&self, index: usize) -> Option<&MenuNode> {
        self.buttons.get(index).and_then(|e| e.menu.as_ref())
    }

    pub fn shell(&self) -> &dyn Shell {
        self.shell.as_ref()
    }

    /// The watched folder, `None` for configuration file bars.
    pub fn bar_dir(&self) -> Option<&Path> {
        match &self.source {
            Source::Directory(dir) => Some(dir),
            Source::ConfigFile(_) => None,
        }
    }

    pub fn is_config_mode(&self) -> bool {
        self.bar_dir().is_none()
    }

    /// Preferences are persisted and autostart can be changed.
    pub fn uses_prefs(&self) -> bool {
        self.prefs.is_some()
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Screen rectangle the window should occupy right now.
    pub fn window_bounds(&self) -> Rect {
        if self.hidden {
            self.layout.hidden_bounds()
        } else {
            self.layout.bounds
        }
    }

    fn autostart_link(&self) -> Option<PathBuf> {
        let dir = self.places.startup.as_ref()?;
        Some(dir.join(format!("{PROG_NAME}.{SHORTCUT_EXT}")))
    }

    pub fn autostart_enabled(&self) -> bool {
        self.autostart_link().is_some_and(|l| self.shell.exists(&l))
    }

    fn start_menu_link(&self) -> Option<PathBuf> {
        Some(self.bar_dir()?.join(format!("{START_MENU_LINK}.{SHORTCUT_EXT}")))
    }

    /// The Start Menu shortcut can be added: the bar shows a folder that
    /// does not hold one yet.
    pub fn can_add_start_menu_link(&self) -> bool {
        self.places.start_menu.is_some()
            && self.start_menu_link().is_some_and(|l| !self.shell.exists(&l))
    }

    pub fn handle(&mut self, event: BarEvent) -> Effect {
        log::debug!("{event:?}");
        match event {
            BarEvent::Activate(index) => self.activate(index),
            BarEvent::LaunchMenuItem(path) => self.launch(&path, "", None, ShowMode::Normal),
            BarEvent::DropOnBar(files) => self.drop_on_bar(&files),
            BarEvent::DropOnEntry { index, file } => self.drop_on_entry(index, &file),
            BarEvent::MoveEntry { from, x, y } => self.move_entry(from, x, y),
            BarEvent::Refresh => self.refresh(),
            BarEvent::ApplySettings { settings, autostart } => self.apply_settings(settings, autostart),
            BarEvent::AddShortcut { file, folder } => match folder {
                Some(folder) => self.shortcut_into(&file, &folder),
                None => self.drop_on_bar(&[file]),
            },
            BarEvent::CreateFolder { parent, name } => self.create_folder(parent.as_deref(), &name),
            BarEvent::Delete(path) => self.delete(&path),
            BarEvent::Properties(path) => self.launch(&path, "", Some("properties"), ShowMode::Normal),
            BarEvent::Explore(path) => self.explore(&path),
            BarEvent::RunAsAdmin(path) => self.launch(&path, "", Some("runas"), ShowMode::Normal),
            BarEvent::ExploreBarDir => match self.bar_dir().map(Path::to_path_buf) {
                Some(dir) => self.launch(&dir, "", None, ShowMode::Normal),
                None => Effect::None,
            },
            BarEvent::AddStartMenuLink => self.add_start_menu_link(),
            BarEvent::Help => self.launch(Path::new(HELP_URL), "", None, ShowMode::Normal),
            BarEvent::WorkAreaChanged(area) => {
                self.work_area = area;
                self.relayout()
            }
            BarEvent::Tick { pointer, foreground } => self.tick(pointer, foreground),
            BarEvent::PointerEntered => self.pointer_entered(),
            BarEvent::Clicked => self.clicked(),
        }
    }

    fn relayout(&mut self) -> Effect {
        self.layout = Layout::compute(&self.settings, self.buttons.len(), self.work_area);
        Effect::Relayout
    }

    fn save_prefs(&mut self) {
        let Some(store) = self.prefs.as_deref_mut() else {
            return;
        };
        if let Err(e) = prefs::save(store, &self.settings, &self.buttons.order_string()) {
            log::warn!("Failed to save preferences: {e}");
        }
    }

    fn launch(&self, path: &Path, params: &str, verb: Option<&str>, show: ShowMode) -> Effect {
        if let Err(e) = self.shell.launch(path, params, verb, show) {
            log::warn!("{e:#}");
        }
        Effect::None
    }

    fn activate(&self, index: usize) -> Effect {
        let Some(entry) = self.buttons.get(index) else {
            return Effect::None;
        };
        if entry.has_menu() {
            Effect::OpenMenu(index)
        } else {
            self.launch(&entry.command, &entry.params, None, entry.show_mode)
        }
    }

    fn refresh(&mut self) -> Effect {
        let Some(dir) = self.bar_dir().map(Path::to_path_buf) else {
            return Effect::None;
        };
        let report = self.buttons.reconcile(self.shell.as_ref(), &self.sources, &dir);
        if report.added + report.removed > 0 {
            self.save_prefs();
            return self.relayout();
        }
        if report.refreshed > 0 {
            Effect::Relayout
        } else {
            Effect::None
        }
    }

    /// Shortcuts for `files` in the bar folder. The buttons appear with the
    /// following refresh.
    fn drop_on_bar(&mut self, files: &[PathBuf]) -> Effect {
        let Some(dir) = self.bar_dir().map(Path::to_path_buf) else {
            return Effect::None;
        };
        for file in files {
            if let Err(e) = file_to_shortcut(self.shell.as_ref(), file, &dir) {
                log::warn!("{e:#}");
            }
        }
        self.refresh()
    }

    fn shortcut_into(&mut self, file: &Path, folder: &Path) -> Effect {
        if self.is_config_mode() {
            return Effect::None;
        }
        if let Err(e) = file_to_shortcut(self.shell.as_ref(), file, folder) {
            log::warn!("{e:#}");
            return Effect::None;
        }
        self.refresh()
    }

    fn drop_on_entry(&mut self, index: usize, file: &Path) -> Effect {
        let Some(entry) = self.buttons.get(index) else {
            return self.drop_on_bar(&[file.to_path_buf()]);
        };

        if entry.has_menu() {
            // Folder button: the shortcut goes into the folder
            let Some(folder) = true_target(self.shell.as_ref(), &entry.command) else {
                return Effect::None;
            };
            return self.shortcut_into(file, &folder);
        }

        if self.shell.is_shortcut(file) || self.shell.is_executable(file) {
            return self.insert_shortcut(index, file);
        }

        // Anything else is a document for the program on the button
        let params = format!("\"{}\"", file.display());
        let (command, show) = (entry.command.clone(), entry.show_mode);
        self.launch(&command, &params, None, show)
    }

    /// Shortcut to `file` in the bar folder with its button at `index`.
    fn insert_shortcut(&mut self, index: usize, file: &Path) -> Effect {
        let Some(dir) = self.bar_dir().map(Path::to_path_buf) else {
            return Effect::None;
        };
        let link = match file_to_shortcut(self.shell.as_ref(), file, &dir) {
            Ok(link) => link,
            Err(e) => {
                log::warn!("{e:#}");
                return Effect::None;
            }
        };
        match self.buttons.index_of_command(&link) {
            Some(existing) => {
                // Taking it out first shifts the later buttons down by one
                let to = if existing < index { index - 1 } else { index };
                self.buttons.reorder(existing, to);
            }
            None => {
                let options = AddOptions { position: Some(index), ..Default::default() };
                if let Err(e) = self.buttons.add(self.shell.as_ref(), &self.sources, &link, options) {
                    log::warn!("{e}");
                    return Effect::None;
                }
            }
        }
        self.save_prefs();
        self.relayout()
    }

    fn move_entry(&mut self, from: usize, x: i32, y: i32) -> Effect {
        let to = self.layout.position_for(x, y);
        match self.buttons.reorder(from, to) {
            Some(to) if to != from => {
                self.save_prefs();
                self.relayout()
            }
            _ => Effect::None,
        }
    }

    fn apply_settings(&mut self, settings: Settings, autostart: bool) -> Effect {
        self.settings = settings;
        if !settings.auto_hide.enabled() {
            self.hidden = false;
        }
        if self.uses_prefs() {
            self.set_autostart(autostart);
        }
        self.save_prefs();
        self.relayout()
    }

    fn set_autostart(&self, enabled: bool) {
        let Some(link) = self.autostart_link() else {
            return;
        };
        let exists = self.shell.exists(&link);
        if enabled && !exists {
            let Some(app) = &self.places.app else {
                return;
            };
            let options = ShortcutOptions {
                description: Some(format!("{PROG_NAME} quick launch bar")),
                ..Default::default()
            };
            match self.shell.create_shortcut(&link, app, &options) {
                Ok(()) => log::info!("Created {}", link.display()),
                Err(e) => log::warn!("{e:#}"),
            }
        } else if !enabled && exists {
            if let Err(e) = std::fs::remove_file(&link) {
                log::warn!("Failed to remove {}: {e}", link.display());
            }
        }
    }

    fn create_folder(&mut self, parent: Option<&Path>, name: &str) -> Effect {
        let parent = match parent {
            Some(p) => p.to_path_buf(),
            None => match self.bar_dir() {
                Some(dir) => dir.to_path_buf(),
                None => return Effect::None,
            },
        };
        let name = name.trim();
        if name.is_empty() || name.contains(['\\', '/', ':', '*', '?', '"', '<', '>', '|']) {
            return Effect::Notify(Severity::Error, format!("Invalid folder name: {name}"));
        }
        if let Err(e) = self.shell.create_dir(&parent.join(name)) {
            return Effect::Notify(Severity::Error, format!("{e:#}"));
        }
        self.refresh()
    }

    fn delete(&mut self, path: &Path) -> Effect {
        if let Err(e) = self.shell.delete_to_trash(path) {
            log::info!("{e:#}");
            return Effect::None;
        }
        self.refresh()
    }

    fn explore(&self, path: &Path) -> Effect {
        let target = true_target(self.shell.as_ref(), path).unwrap_or_else(|| path.to_path_buf());
        if let Err(e) = self.shell.reveal(&target) {
            log::warn!("{e:#}");
        }
        Effect::None
    }

    fn add_start_menu_link(&mut self) -> Effect {
        if !self.can_add_start_menu_link() {
            return Effect::None;
        }
        let (Some(link), Some(start_menu)) = (self.start_menu_link(), self.places.start_menu.clone()) else {
            return Effect::None;
        };
        let options = ShortcutOptions {
            icon: self.places.app.clone().map(|app| (app, 0)),
            ..Default::default()
        };
        if let Err(e) = self.shell.create_shortcut(&link, &start_menu, &options) {
            return Effect::Notify(Severity::Error, format!("{e:#}"));
        }
        self.refresh()
    }

    fn tick(&mut self, pointer: (i32, i32), foreground: bool) -> Effect {
        if !self.settings.auto_hide.enabled() || self.hidden || foreground {
            return Effect::None;
        }
        if self.layout.bounds.contains(pointer.0, pointer.1) {
            return Effect::None;
        }
        self.hidden = true;
        Effect::Relayout
    }

    fn pointer_entered(&mut self) -> Effect {
        if self.hidden && self.settings.auto_hide == crate::settings::AutoHide::OnHover {
            self.hidden = false;
            return Effect::Relayout;
        }
        Effect::None
    }

    fn clicked(&mut self) -> Effect {
        if self.hidden {
            self.hidden = false;
            return Effect::Relayout;
        }
        Effect::MainMenu
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::{FileStore, KEY_BUTTONS, KEY_LOCATION};
    use crate::settings::{AutoHide, Edge};
    use crate::shell::file_name;
    use crate::shell::testing::FakeShell;
    use tempfile::TempDir;

    const WORK_AREA: Rect = Rect { x: 0, y: 0, width: 1920, height: 1040 };

    struct Fixture {
        tmp: TempDir,
        shell: FakeShell,
    }

    impl Fixture {
        fn new() -> Fixture {
            let tmp = TempDir::new().unwrap();
            for dir in ["bar", "other", "startup", "start"] {
                std::fs::create_dir(tmp.path().join(dir)).unwrap();
            }
            Fixture { tmp, shell: FakeShell::default() }
        }

        fn path(&self, rel: &str) -> PathBuf {
            self.tmp.path().join(rel)
        }

        fn touch(&self, rel: &str) -> PathBuf {
            let path = self.path(rel);
            std::fs::write(&path, "").unwrap();
            path
        }

        fn places(&self) -> Places {
            Places {
                quick_launch: Some(self.path("bar")),
                start_menu: Some(self.path("start")),
                user_start_menu: None,
                startup: Some(self.path("startup")),
                app: Some(self.path("launchbar.exe")),
            }
        }

        fn prefs_path(&self) -> PathBuf {
            self.path("prefs.toml")
        }

        fn store(&self) -> FileStore {
            FileStore::open(&self.prefs_path()).unwrap()
        }

        fn start_with(&self, invocation: Invocation) -> Result<LaunchBar> {
            LaunchBar::start(
                Box::new(self.shell.clone()),
                invocation,
                Some(Box::new(self.store())),
                self.places(),
                WORK_AREA,
            )
        }

        fn start(&self) -> LaunchBar {
            self.start_with(Invocation::default()).unwrap()
        }
    }

    fn names(bar: &LaunchBar) -> Vec<String> {
        bar.entries().map(|e| file_name(&e.command)).collect()
    }

    #[test]
    fn test_start_mirrors_quick_launch_in_saved_order() {
        let fx = Fixture::new();
        for name in ["a.exe", "b.exe", "c.exe"] {
            fx.touch(&format!("bar/{name}"));
        }
        let mut store = fx.store();
        store.set_string(KEY_BUTTONS, "c.exe;a.exe;").unwrap();
        store.set_int(KEY_LOCATION, 2).unwrap();
        store.flush().unwrap();

        let bar = fx.start();
        assert_eq!(bar.source(), &Source::Directory(fx.path("bar")));
        assert_eq!(names(&bar), ["c.exe", "a.exe", "b.exe"]);
        assert_eq!(bar.settings().edge, Edge::Top);
        assert_eq!(bar.layout().count(), 3);
        assert!(bar.uses_prefs());
    }

    #[test]
    fn test_command_line_settings_bypass_prefs() {
        let fx = Fixture::new();
        let mut store = fx.store();
        store.set_int(KEY_LOCATION, 1).unwrap();
        store.flush().unwrap();

        let bar = fx.start_with(Invocation::parse(["LARGE=1"])).unwrap();
        assert!(!bar.uses_prefs());
        assert!(bar.settings().large_icons);
        assert_eq!(bar.settings().edge, Edge::Right);
    }

    #[test]
    fn test_missing_sources_are_errors() {
        let fx = Fixture::new();
        std::fs::remove_dir(fx.path("bar")).unwrap();
        assert!(fx.start_with(Invocation::default()).is_err());

        let missing = fx.path("nowhere.txt").display().to_string();
        assert!(fx.start_with(Invocation::parse([missing])).is_err());
    }

    #[test]
    fn test_config_file_bar() {
        let fx = Fixture::new();
        let tool = fx.touch("other/tool.exe");
        let config = fx.path("bar.txt");
        std::fs::write(
            &config,
            format!("# tools\nPOSITION=4\nBuild;{};--all\n;{}\n", tool.display(), fx.path("missing.exe").display()),
        )
        .unwrap();

        let mut bar = fx.start_with(Invocation::parse([config.display().to_string()])).unwrap();
        assert!(bar.is_config_mode());
        assert!(!bar.uses_prefs());
        assert_eq!(bar.settings().edge, Edge::Bottom);
        assert_eq!(names(&bar), ["tool.exe"]);
        assert_eq!(bar.entry(0).unwrap().tool_tip, "Build");

        bar.handle(BarEvent::Activate(0));
        let launches = fx.shell.launches.borrow();
        assert_eq!(launches[0].path, tool);
        assert_eq!(launches[0].params, "--all");
        drop(launches);

        // Nothing is ever written next to a configuration file
        assert_eq!(bar.handle(BarEvent::DropOnBar(vec![tool])), Effect::None);
        assert_eq!(bar.handle(BarEvent::Refresh), Effect::None);
        assert_eq!(bar.entries().count(), 1);
    }

    #[test]
    fn test_activate_folder_opens_menu() {
        let fx = Fixture::new();
        std::fs::create_dir(fx.path("bar/Games")).unwrap();
        fx.touch("bar/Games/chess.exe");
        let mut bar = fx.start();

        assert_eq!(bar.handle(BarEvent::Activate(0)), Effect::OpenMenu(0));
        assert_eq!(bar.menu(0).unwrap().descendant_count(), 1);
        assert_eq!(bar.handle(BarEvent::Activate(5)), Effect::None);

        bar.handle(BarEvent::LaunchMenuItem(fx.path("bar/Games/chess.exe")));
        assert_eq!(fx.shell.launches.borrow()[0].path, fx.path("bar/Games/chess.exe"));
    }

    #[test]
    fn test_drop_on_bar_creates_shortcut_button() {
        let fx = Fixture::new();
        fx.touch("bar/a.exe");
        let tool = fx.touch("other/tool.exe");
        let mut bar = fx.start();

        assert_eq!(bar.handle(BarEvent::DropOnBar(vec![tool.clone()])), Effect::Relayout);
        assert_eq!(names(&bar), ["a.exe", "tool.lnk"]);
        let link = fx.path("bar/tool.lnk");
        assert_eq!(true_target(&fx.shell, &link), Some(tool));
        assert_eq!(fx.store().get_string(KEY_BUTTONS, ""), "a.exe;tool.lnk;");
    }

    #[test]
    fn test_drop_executable_on_button_inserts_before_it() {
        let fx = Fixture::new();
        fx.touch("bar/a.exe");
        fx.touch("bar/b.exe");
        let tool = fx.touch("other/tool.exe");
        let mut bar = fx.start();

        bar.handle(BarEvent::DropOnEntry { index: 1, file: tool });
        assert_eq!(names(&bar), ["a.exe", "tool.lnk", "b.exe"]);

        // The watcher's refresh does not append it a second time
        bar.handle(BarEvent::Refresh);
        assert_eq!(names(&bar), ["a.exe", "tool.lnk", "b.exe"]);
        assert_eq!(fx.store().get_string(KEY_BUTTONS, ""), "a.exe;tool.lnk;b.exe;");
    }

    #[test]
    fn test_drop_existing_shortcut_lands_before_target_button() {
        let fx = Fixture::new();
        let tool = fx.touch("other/tool.exe");
        FakeShell::write_shortcut(&fx.path("bar/tool.lnk"), &tool);
        fx.touch("bar/a.exe");
        fx.touch("bar/b.exe");
        let mut store = fx.store();
        store.set_string(KEY_BUTTONS, "tool.lnk;a.exe;b.exe;").unwrap();
        store.flush().unwrap();
        let mut bar = fx.start();

        bar.handle(BarEvent::DropOnEntry { index: 2, file: tool.clone() });
        assert_eq!(names(&bar), ["a.exe", "tool.lnk", "b.exe"]);

        bar.handle(BarEvent::DropOnEntry { index: 0, file: tool });
        assert_eq!(names(&bar), ["tool.lnk", "a.exe", "b.exe"]);
        assert_eq!(fx.store().get_string(KEY_BUTTONS, ""), "tool.lnk;a.exe;b.exe;");
    }

    #[test]
    fn test_shortcut_button_launches_with_its_show_mode() {
        let fx = Fixture::new();
        let tool = fx.touch("other/tool.exe");
        std::fs::write(fx.path("bar/Tool.lnk"), format!("{}\n\nmin", tool.display())).unwrap();
        let mut bar = fx.start();

        bar.handle(BarEvent::Activate(0));
        let launches = fx.shell.launches.borrow();
        assert_eq!(launches[0].path, fx.path("bar/Tool.lnk"));
        assert_eq!(launches[0].show, ShowMode::Minimized);
    }

    #[test]
    fn test_drop_document_on_button_opens_it_with_the_program() {
        let fx = Fixture::new();
        let editor = fx.touch("bar/edit.exe");
        let doc = fx.touch("other/notes.txt");
        let mut bar = fx.start();

        assert_eq!(bar.handle(BarEvent::DropOnEntry { index: 0, file: doc.clone() }), Effect::None);
        let launches = fx.shell.launches.borrow();
        assert_eq!(launches[0].path, editor);
        assert_eq!(launches[0].params, format!("\"{}\"", doc.display()));
    }

    #[test]
    fn test_drop_on_folder_button_adds_to_its_menu() {
        let fx = Fixture::new();
        std::fs::create_dir(fx.path("bar/Games")).unwrap();
        let chess = fx.touch("other/chess.exe");
        let mut bar = fx.start();
        assert_eq!(bar.menu(0).unwrap().descendant_count(), 0);

        bar.handle(BarEvent::DropOnEntry { index: 0, file: chess });
        assert!(fx.path("bar/Games/chess.lnk").exists());
        let menu = bar.menu(0).unwrap();
        assert_eq!(menu.children.as_ref().unwrap()[0].label, "chess");
        assert_eq!(names(&bar), ["Games"]);
    }

    #[test]
    fn test_move_entry_reorders_and_saves() {
        let fx = Fixture::new();
        for name in ["a", "b", "c"] {
            fx.touch(&format!("bar/{name}"));
        }
        let mut bar = fx.start();
        let (x, first_y) = bar.layout().first;
        let pitch = bar.layout().pitch;

        let effect = bar.handle(BarEvent::MoveEntry { from: 0, x, y: first_y + 2 * pitch });
        assert_eq!(effect, Effect::Relayout);
        assert_eq!(names(&bar), ["b", "c", "a"]);
        assert_eq!(fx.store().get_string(KEY_BUTTONS, ""), "b;c;a;");

        assert_eq!(bar.handle(BarEvent::MoveEntry { from: 2, x, y: first_y + 2 * pitch }), Effect::None);
    }

    #[test]
    fn test_auto_hide_on_hover() {
        let fx = Fixture::new();
        fx.touch("bar/a.exe");
        let mut bar = fx.start();
        let mut settings = *bar.settings();
        settings.auto_hide = AutoHide::OnHover;
        bar.handle(BarEvent::ApplySettings { settings, autostart: false });

        let inside = (bar.layout().bounds.x + 1, bar.layout().bounds.y + 1);
        assert_eq!(bar.handle(BarEvent::Tick { pointer: inside, foreground: false }), Effect::None);
        assert_eq!(bar.handle(BarEvent::Tick { pointer: (0, 500), foreground: true }), Effect::None);
        assert_eq!(bar.handle(BarEvent::Tick { pointer: (0, 500), foreground: false }), Effect::Relayout);
        assert!(bar.is_hidden());
        assert_eq!(bar.window_bounds(), bar.layout().hidden_bounds());

        assert_eq!(bar.handle(BarEvent::PointerEntered), Effect::Relayout);
        assert!(!bar.is_hidden());
        assert_eq!(bar.window_bounds(), bar.layout().bounds);
    }

    #[test]
    fn test_auto_hide_on_click() {
        let fx = Fixture::new();
        let mut bar = fx.start();
        let mut settings = *bar.settings();
        settings.auto_hide = AutoHide::OnClick;
        bar.handle(BarEvent::ApplySettings { settings, autostart: false });

        assert_eq!(bar.handle(BarEvent::Clicked), Effect::MainMenu);
        bar.handle(BarEvent::Tick { pointer: (0, 500), foreground: false });
        assert!(bar.is_hidden());
        assert_eq!(bar.handle(BarEvent::PointerEntered), Effect::None);
        assert_eq!(bar.handle(BarEvent::Clicked), Effect::Relayout);
        assert!(!bar.is_hidden());
    }

    #[test]
    fn test_auto_hide_off_never_hides() {
        let fx = Fixture::new();
        let mut bar = fx.start();
        assert_eq!(bar.handle(BarEvent::Tick { pointer: (0, 500), foreground: false }), Effect::None);
        assert!(!bar.is_hidden());
    }

    #[test]
    fn test_apply_settings_persists_and_toggles_autostart() {
        let fx = Fixture::new();
        let mut bar = fx.start();
        assert!(!bar.autostart_enabled());

        let mut settings = *bar.settings();
        settings.edge = Edge::Left;
        settings.large_icons = true;
        assert_eq!(bar.handle(BarEvent::ApplySettings { settings, autostart: true }), Effect::Relayout);
        assert!(bar.autostart_enabled());
        assert_eq!(bar.layout().icon_size, 32);
        assert_eq!(bar.layout().bounds.x, 0);
        assert_eq!(fx.store().get_int(KEY_LOCATION, 0), 1);

        bar.handle(BarEvent::ApplySettings { settings, autostart: false });
        assert!(!bar.autostart_enabled());
    }

    #[test]
    fn test_create_folder() {
        let fx = Fixture::new();
        let mut bar = fx.start();

        assert_eq!(
            bar.handle(BarEvent::CreateFolder { parent: None, name: "Tools".into() }),
            Effect::Relayout
        );
        assert!(fx.path("bar/Tools").is_dir());
        assert!(bar.entry(0).unwrap().has_menu());

        let bad = bar.handle(BarEvent::CreateFolder { parent: None, name: "a/b".into() });
        assert!(matches!(bad, Effect::Notify(Severity::Error, _)));
        let dup = bar.handle(BarEvent::CreateFolder { parent: None, name: "Tools".into() });
        assert!(matches!(dup, Effect::Notify(Severity::Error, _)));

        bar.handle(BarEvent::CreateFolder { parent: Some(fx.path("bar/Tools")), name: "Sub".into() });
        assert_eq!(bar.menu(0).unwrap().descendant_count(), 1);
    }

    #[test]
    fn test_delete_removes_button() {
        let fx = Fixture::new();
        let a = fx.touch("bar/a.exe");
        fx.touch("bar/b.exe");
        let mut bar = fx.start();

        assert_eq!(bar.handle(BarEvent::Delete(a.clone())), Effect::Relayout);
        assert_eq!(names(&bar), ["b.exe"]);
        assert_eq!(*fx.shell.trashed.borrow(), [a]);
    }

    #[test]
    fn test_delete_folder_menu_item_rebuilds_menu() {
        let fx = Fixture::new();
        std::fs::create_dir(fx.path("bar/Games")).unwrap();
        let chess = fx.touch("bar/Games/chess.exe");
        fx.touch("bar/Games/go.exe");
        let mut bar = fx.start();
        assert_eq!(bar.menu(0).unwrap().descendant_count(), 2);

        bar.handle(BarEvent::Delete(chess.clone()));
        assert_eq!(*fx.shell.trashed.borrow(), [chess]);
        let menu = bar.menu(0).unwrap();
        assert_eq!(menu.children.as_ref().unwrap()[0].label, "go");
        assert_eq!(names(&bar), ["Games"]);
    }

    #[test]
    fn test_shell_verbs() {
        let fx = Fixture::new();
        let tool = fx.touch("other/tool.exe");
        let link = fx.path("bar/tool.lnk");
        FakeShell::write_shortcut(&link, &tool);
        let mut bar = fx.start();

        bar.handle(BarEvent::Explore(link.clone()));
        assert_eq!(*fx.shell.revealed.borrow(), [tool]);

        bar.handle(BarEvent::RunAsAdmin(link.clone()));
        bar.handle(BarEvent::Properties(link.clone()));
        bar.handle(BarEvent::ExploreBarDir);
        let launches = fx.shell.launches.borrow();
        let verbs: Vec<_> = launches.iter().map(|l| l.verb.as_deref()).collect();
        assert_eq!(verbs, [Some("runas"), Some("properties"), None]);
        assert_eq!(launches[2].path, fx.path("bar"));
    }

    #[test]
    fn test_add_start_menu_link_once() {
        let fx = Fixture::new();
        let mut bar = fx.start();
        assert!(bar.can_add_start_menu_link());

        assert_eq!(bar.handle(BarEvent::AddStartMenuLink), Effect::Relayout);
        let link = fx.path("bar/Start Menu.lnk");
        assert_eq!(true_target(&fx.shell, &link), Some(fx.path("start")));
        assert!(!bar.can_add_start_menu_link());
        // Points at a folder, so the button carries a menu
        assert!(bar.entry(0).unwrap().has_menu());
        assert_eq!(bar.handle(BarEvent::AddStartMenuLink), Effect::None);
    }

    #[test]
    fn test_work_area_change_moves_bar() {
        let fx = Fixture::new();
        let mut bar = fx.start();
        let area = Rect::new(0, 0, 1280, 720);
        assert_eq!(bar.handle(BarEvent::WorkAreaChanged(area)), Effect::Relayout);
        assert_eq!(bar.layout().bounds.right(), 1280);
    }
}
