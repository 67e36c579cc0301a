//! The bar window: winit event loop, painting, pointer handling and the
//! glue between Win32 menus/dialogs and [`LaunchBar`].

use crate::context_menu::{self, EntryAction, FolderChoice, MainAction, MainMenuOptions};
use crate::dialogs::{self, SettingsForm};
use crate::renderer::{PointerState, Renderer};
use crate::tooltip::Tooltip;
use anyhow::{Context, Result};
use launchbar::prefs::{FileStore, PreferenceStore, RegistryStore};
use launchbar::shell::true_target;
use launchbar::watcher::{DirWatcher, QUIET_PERIOD};
use launchbar::{fatal, show_message, BarEvent, Effect, Invocation, LaunchBar, Places, Rect, Severity, SystemShell};
use raw_window_handle::{HasWindowHandle, RawWindowHandle};
use softbuffer::Surface;
use std::num::NonZeroU32;
use std::os::windows::process::CommandExt;
use std::path::PathBuf;
use std::process::Command;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tray_icon::menu::{Menu, MenuEvent, MenuId, MenuItem};
use tray_icon::{TrayIcon, TrayIconBuilder};
use windows::Win32::Foundation::{HWND, POINT, RECT};
use windows::Win32::Graphics::Gdi::ScreenToClient;
use windows::Win32::UI::WindowsAndMessaging::{
    GetCursorPos, GetForegroundWindow, SystemParametersInfoW, SPI_GETWORKAREA,
    SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS,
};
use winit::application::ApplicationHandler;
use winit::dpi::{PhysicalPosition, PhysicalSize};
use winit::event::{ElementState, MouseButton, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy};
use winit::platform::windows::WindowAttributesExtWindows;
use winit::window::{Window, WindowId, WindowLevel};

/// Auto-hide and work area checks run this often.
const TICK_INTERVAL: Duration = Duration::from_secs(1);
/// Pointer travel that turns a press on a button into a drag.
const DRAG_THRESHOLD: i32 = 4;
const CREATE_NO_WINDOW: u32 = 0x08000000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserEvent {
    /// The bar folder changed on disk.
    DirChanged,
}

/// A left press on a button that has not been released yet.
#[derive(Debug, Clone, Copy)]
struct Press {
    index: usize,
    at: (i32, i32),
    dragging: bool,
}

struct BarApp {
    bar: LaunchBar,
    proxy: EventLoopProxy<UserEvent>,
    window: Option<Rc<Window>>,
    surface: Option<Surface<Rc<Window>, Rc<Window>>>,
    renderer: Renderer,
    tooltip: Option<Tooltip>,
    _watcher: Option<DirWatcher>,
    _tray: Option<TrayIcon>,
    quit_id: Option<MenuId>,
    cursor: (i32, i32),
    hovered: Option<usize>,
    press: Option<Press>,
    last_tick: Instant,
    work_area: Rect,
}

/// Work area of the primary monitor, the screen minus the taskbar.
fn work_area() -> Rect {
    let mut rect = RECT::default();
    let ok = unsafe {
        SystemParametersInfoW(
            SPI_GETWORKAREA,
            0,
            Some(&mut rect as *mut RECT as *mut _),
            SYSTEM_PARAMETERS_INFO_UPDATE_FLAGS(0),
        )
    };
    if let Err(e) = ok {
        log::warn!("Failed to read the work area: {e}");
    }
    Rect::new(rect.left, rect.top, rect.right - rect.left, rect.bottom - rect.top)
}

fn cursor_pos() -> (i32, i32) {
    let mut point = POINT::default();
    let _ = unsafe { GetCursorPos(&mut point) };
    (point.x, point.y)
}

/// Registry preferences, or a file next to the executable when the
/// registry cannot be opened.
fn open_prefs() -> Option<Box<dyn PreferenceStore>> {
    match RegistryStore::open(launchbar::PROG_NAME) {
        Ok(store) => return Some(Box::new(store)),
        Err(e) => log::warn!("{e}"),
    }
    let path = FileStore::default_path();
    match FileStore::open(&path) {
        Ok(store) => Some(Box::new(store)),
        Err(e) => {
            log::warn!("{e}");
            None
        }
    }
}

fn create_tray_icon() -> Result<tray_icon::Icon, tray_icon::BadIcon> {
    const SIZE: usize = 32;
    let mut rgba = vec![0u8; SIZE * SIZE * 4];

    // A vertical strip of three buttons
    let (r, g, b) = (0x3A, 0x6E, 0xA5);
    let square_size = 8;
    let gap = 2;
    let start_x = (SIZE - square_size) / 2;
    let start_y = (SIZE - (square_size * 3 + gap * 2)) / 2;

    for i in 0..3 {
        let sy = start_y + i * (square_size + gap);
        for dy in 0..square_size {
            for dx in 0..square_size {
                let idx = ((sy + dy) * SIZE + start_x + dx) * 4;
                let is_corner = (dx == 0 || dx == square_size - 1) && (dy == 0 || dy == square_size - 1);
                if !is_corner {
                    rgba[idx..idx + 4].copy_from_slice(&[r, g, b, 255]);
                }
            }
        }
    }

    tray_icon::Icon::from_rgba(rgba, SIZE as u32, SIZE as u32)
}

impl BarApp {
    fn new(bar: LaunchBar, proxy: EventLoopProxy<UserEvent>, work_area: Rect) -> Self {
        Self {
            bar,
            proxy,
            window: None,
            surface: None,
            renderer: Renderer::new(),
            tooltip: None,
            _watcher: None,
            _tray: None,
            quit_id: None,
            cursor: (0, 0),
            hovered: None,
            press: None,
            last_tick: Instant::now(),
            work_area,
        }
    }

    fn hwnd(&self) -> Option<HWND> {
        let window = self.window.as_ref()?;
        match window.window_handle().map(|h| h.as_raw()) {
            Ok(RawWindowHandle::Win32(h)) => Some(HWND(h.hwnd.get() as *mut _)),
            _ => None,
        }
    }

    fn start_watching(&mut self) {
        let Some(dir) = self.bar.bar_dir() else {
            return;
        };
        let proxy = self.proxy.clone();
        match DirWatcher::start(dir, QUIET_PERIOD, move || {
            let _ = proxy.send_event(UserEvent::DirChanged);
        }) {
            Ok(watcher) => self._watcher = Some(watcher),
            Err(e) => log::warn!("{e:#}"),
        }
    }

    fn setup_tray(&mut self) {
        let menu = Menu::new();
        let quit = MenuItem::new(format!("Exit {}", launchbar::PROG_NAME), true, None);
        let qid = quit.id().clone();
        let _ = menu.append(&quit);

        match create_tray_icon() {
            Ok(icon) => match TrayIconBuilder::new()
                .with_menu(Box::new(menu))
                .with_tooltip(launchbar::PROG_NAME)
                .with_icon(icon)
                .build()
            {
                Ok(tray) => {
                    self._tray = Some(tray);
                    self.quit_id = Some(qid);
                }
                Err(e) => log::warn!("Failed to create tray icon: {e}"),
            },
            Err(e) => log::warn!("Failed to create tray icon: {e}"),
        }
    }

    fn redraw(&mut self) {
        let pointer = PointerState {
            hovered: self.hovered,
            pressed: self.press.filter(|p| !p.dragging).map(|p| p.index),
            drop_at: self.drop_indicator(),
        };
        let Some(window) = &self.window else { return };
        let Some(surface) = &mut self.surface else { return };
        let size = window.inner_size();
        let (Some(w), Some(h)) = (NonZeroU32::new(size.width), NonZeroU32::new(size.height)) else {
            return;
        };
        if let Err(e) = surface.resize(w, h) {
            log::warn!("Failed to resize surface: {e}");
            return;
        }
        let mut buffer = match surface.buffer_mut() {
            Ok(buffer) => buffer,
            Err(e) => {
                log::warn!("Failed to get frame buffer: {e}");
                return;
            }
        };
        self.renderer.render(&mut buffer, w.get() as usize, h.get() as usize, &self.bar, pointer);
        let _ = buffer.present();
    }

    /// Where a dragged button would land: its top left corner follows the
    /// pointer.
    fn drag_origin(&self) -> (i32, i32) {
        let half = self.bar.layout().button_size / 2;
        (self.cursor.0 - half, self.cursor.1 - half)
    }

    fn drop_indicator(&self) -> Option<usize> {
        let press = self.press.filter(|p| p.dragging)?;
        let layout = self.bar.layout();
        let (x, y) = self.drag_origin();
        let to = layout.position_for(x, y).min(layout.count().saturating_sub(1));
        Some(if to > press.index { to + 1 } else { to })
    }

    /// Move and resize the window to what the bar currently wants.
    fn relayout(&mut self) {
        self.hovered = None;
        self.press = None;
        if let Some(tooltip) = &mut self.tooltip {
            tooltip.hide();
        }
        let Some(window) = &self.window else { return };
        let bounds = self.bar.window_bounds();
        window.set_outer_position(PhysicalPosition::new(bounds.x, bounds.y));
        let _ = window.request_inner_size(PhysicalSize::new(bounds.width.max(1) as u32, bounds.height.max(1) as u32));
        window.set_window_level(if self.bar.settings().on_top {
            WindowLevel::AlwaysOnTop
        } else {
            WindowLevel::Normal
        });
        window.request_redraw();
    }

    fn dispatch(&mut self, event: BarEvent, event_loop: &ActiveEventLoop) {
        let effect = self.bar.handle(event);
        self.apply_effect(effect, event_loop);
    }

    fn apply_effect(&mut self, effect: Effect, event_loop: &ActiveEventLoop) {
        match effect {
            Effect::None => {}
            Effect::Relayout => self.relayout(),
            Effect::OpenMenu(index) => self.open_folder_menu(index, event_loop),
            Effect::MainMenu => self.main_menu(event_loop),
            Effect::Notify(severity, text) => show_message(severity, &text),
        }
    }

    /// Button rectangle in screen coordinates.
    fn screen_rect(&self, index: usize) -> Option<Rect> {
        let window = self.window.as_ref()?;
        let r = *self.bar.layout().buttons.get(index)?;
        let origin = window.outer_position().unwrap_or_default();
        Some(Rect::new(origin.x + r.x, origin.y + r.y, r.width, r.height))
    }

    fn open_folder_menu(&mut self, index: usize, event_loop: &ActiveEventLoop) {
        let (Some(hwnd), Some(button)) = (self.hwnd(), self.screen_rect(index)) else {
            return;
        };
        if let Some(tooltip) = &mut self.tooltip {
            tooltip.hide();
        }
        let Some(node) = self.bar.menu(index) else { return };
        let settings = self.bar.settings();
        let config_mode = self.bar.is_config_mode();
        let chosen = context_menu::show_folder_menu(hwnd, node, button, settings.edge, settings.large_menus, config_mode);
        match chosen {
            Some(FolderChoice::Launch(path)) => self.dispatch(BarEvent::LaunchMenuItem(path), event_loop),
            Some(FolderChoice::Item { target, action }) => self.entry_action(hwnd, target, action, event_loop),
            None => {}
        }
    }

    fn main_menu(&mut self, event_loop: &ActiveEventLoop) {
        let Some(hwnd) = self.hwnd() else { return };
        let (x, y) = cursor_pos();
        let options = MainMenuOptions {
            config_mode: self.bar.is_config_mode(),
            can_add_start_menu_link: self.bar.can_add_start_menu_link(),
        };
        match context_menu::show_main_menu(hwnd, x, y, options) {
            MainAction::None => {}
            MainAction::Help => self.dispatch(BarEvent::Help, event_loop),
            MainAction::About => show_message(
                Severity::Info,
                &format!("{} {}\nA quick launch bar for your desktop.", launchbar::PROG_NAME, env!("CARGO_PKG_VERSION")),
            ),
            MainAction::Settings => self.edit_settings(hwnd, event_loop),
            MainAction::NewShortcut => {
                if let Some(file) = context_menu::pick_shortcut_target() {
                    self.dispatch(BarEvent::AddShortcut { file, folder: None }, event_loop);
                }
            }
            MainAction::NewFolder => self.new_folder(hwnd, None, event_loop),
            MainAction::Refresh => self.dispatch(BarEvent::Refresh, event_loop),
            MainAction::ExploreBarDir => self.dispatch(BarEvent::ExploreBarDir, event_loop),
            MainAction::AddStartMenuLink => self.dispatch(BarEvent::AddStartMenuLink, event_loop),
            MainAction::Run => {
                let _ = Command::new("rundll32")
                    .args(["shell32.dll,#61"])
                    .creation_flags(CREATE_NO_WINDOW)
                    .spawn();
            }
            MainAction::Exit => event_loop.exit(),
        }
    }

    fn entry_menu(&mut self, index: usize, event_loop: &ActiveEventLoop) {
        let Some(hwnd) = self.hwnd() else { return };
        let Some(entry) = self.bar.entry(index) else { return };
        let command = entry.command.clone();
        let is_folder = entry.has_menu();
        let (x, y) = cursor_pos();

        let action = context_menu::show_entry_menu(hwnd, x, y, is_folder, self.bar.is_config_mode());
        self.entry_action(hwnd, command, action, event_loop);
    }

    /// Run a command from the menu of a button or of a folder menu item.
    fn entry_action(&mut self, hwnd: HWND, command: PathBuf, action: EntryAction, event_loop: &ActiveEventLoop) {
        match action {
            EntryAction::None => {}
            EntryAction::Delete => self.dispatch(BarEvent::Delete(command), event_loop),
            EntryAction::Properties => self.dispatch(BarEvent::Properties(command), event_loop),
            EntryAction::Explore => self.dispatch(BarEvent::Explore(command), event_loop),
            EntryAction::RunAsAdmin => self.dispatch(BarEvent::RunAsAdmin(command), event_loop),
            EntryAction::NewShortcut => {
                let folder = true_target(self.bar.shell(), &command);
                if let (Some(folder), Some(file)) = (folder, context_menu::pick_shortcut_target()) {
                    self.dispatch(BarEvent::AddShortcut { file, folder: Some(folder) }, event_loop);
                }
            }
            EntryAction::NewFolder => {
                let folder = true_target(self.bar.shell(), &command);
                if folder.is_some() {
                    self.new_folder(hwnd, folder, event_loop);
                }
            }
        }
    }

    fn edit_settings(&mut self, hwnd: HWND, event_loop: &ActiveEventLoop) {
        let form = SettingsForm {
            settings: *self.bar.settings(),
            autostart: self.bar.autostart_enabled(),
            autostart_available: self.bar.uses_prefs(),
        };
        if let Some((settings, autostart)) = dialogs::show_settings(hwnd, form) {
            self.dispatch(BarEvent::ApplySettings { settings, autostart }, event_loop);
        }
    }

    fn new_folder(&mut self, hwnd: HWND, parent: Option<PathBuf>, event_loop: &ActiveEventLoop) {
        if let Some(name) = dialogs::prompt_name(hwnd, "New Folder", "Folder name:") {
            self.dispatch(BarEvent::CreateFolder { parent, name }, event_loop);
        }
    }

    fn update_hover(&mut self) {
        let hovered = if self.bar.is_hidden() {
            None
        } else {
            self.bar.layout().hit_test(self.cursor.0, self.cursor.1)
        };
        if hovered == self.hovered {
            return;
        }
        self.hovered = hovered;

        let tip = hovered.and_then(|i| Some((self.bar.entry(i)?.tool_tip.clone(), self.screen_rect(i)?)));
        let edge = self.bar.settings().edge;
        if let Some(tooltip) = &mut self.tooltip {
            match tip {
                Some((text, anchor)) if self.press.is_none() => tooltip.show(&text, anchor, edge),
                _ => tooltip.hide(),
            }
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    fn on_left_release(&mut self, event_loop: &ActiveEventLoop) {
        let press = self.press.take();
        if self.bar.is_hidden() {
            self.dispatch(BarEvent::Clicked, event_loop);
            return;
        }
        match press {
            Some(Press { index, dragging: true, .. }) => {
                let (x, y) = self.drag_origin();
                self.dispatch(BarEvent::MoveEntry { from: index, x, y }, event_loop);
            }
            Some(Press { index, .. }) if self.hovered == Some(index) => {
                self.dispatch(BarEvent::Activate(index), event_loop);
            }
            Some(_) => {}
            None => self.dispatch(BarEvent::Clicked, event_loop),
        }
        if let Some(window) = &self.window {
            window.request_redraw();
        }
    }

    /// Files dropped from Explorer. Where they landed is read from the
    /// cursor since no pointer events arrive during the drag.
    fn on_drop(&mut self, file: PathBuf, event_loop: &ActiveEventLoop) {
        let Some(hwnd) = self.hwnd() else { return };
        let (x, y) = cursor_pos();
        let mut point = POINT { x, y };
        let _ = unsafe { ScreenToClient(hwnd, &mut point) };
        let event = match self.bar.layout().hit_test(point.x, point.y) {
            Some(index) if !self.bar.is_hidden() => BarEvent::DropOnEntry { index, file },
            _ => BarEvent::DropOnBar(vec![file]),
        };
        self.dispatch(event, event_loop);
    }

    fn tick(&mut self, event_loop: &ActiveEventLoop) {
        self.last_tick = Instant::now();

        let area = work_area();
        if area != self.work_area && area.width > 0 && area.height > 0 {
            self.work_area = area;
            self.dispatch(BarEvent::WorkAreaChanged(area), event_loop);
        }

        // No hiding while a button is held
        if self.press.is_some() {
            return;
        }
        let foreground = self.hwnd().is_some_and(|h| unsafe { GetForegroundWindow() } == h);
        self.dispatch(BarEvent::Tick { pointer: cursor_pos(), foreground }, event_loop);
    }
}

impl ApplicationHandler<UserEvent> for BarApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        let bounds = self.bar.window_bounds();
        let level = if self.bar.settings().on_top { WindowLevel::AlwaysOnTop } else { WindowLevel::Normal };
        let attrs = Window::default_attributes()
            .with_title(launchbar::PROG_NAME)
            .with_inner_size(PhysicalSize::new(bounds.width.max(1) as u32, bounds.height.max(1) as u32))
            .with_position(PhysicalPosition::new(bounds.x, bounds.y))
            .with_decorations(false)
            .with_resizable(false)
            .with_window_level(level)
            .with_skip_taskbar(true);

        let window = match event_loop.create_window(attrs) {
            Ok(window) => Rc::new(window),
            Err(e) => fatal(&format!("Failed to create the bar window: {e}")),
        };
        let surface = softbuffer::Context::new(window.clone()).and_then(|ctx| Surface::new(&ctx, window.clone()));
        match surface {
            Ok(surface) => self.surface = Some(surface),
            Err(e) => fatal(&format!("Failed to create the drawing surface: {e}")),
        }
        self.window = Some(window);

        self.tooltip = Tooltip::new();
        self.setup_tray();
        self.start_watching();
        self.redraw();
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: UserEvent) {
        match event {
            UserEvent::DirChanged => self.dispatch(BarEvent::Refresh, event_loop),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => event_loop.exit(),

            WindowEvent::RedrawRequested => self.redraw(),

            WindowEvent::Resized(_) => {
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            WindowEvent::CursorEntered { .. } => self.dispatch(BarEvent::PointerEntered, event_loop),

            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = (position.x as i32, position.y as i32);
                if let Some(press) = &mut self.press {
                    let (dx, dy) = (self.cursor.0 - press.at.0, self.cursor.1 - press.at.1);
                    if !press.dragging && (dx.abs() > DRAG_THRESHOLD || dy.abs() > DRAG_THRESHOLD) {
                        press.dragging = true;
                        if let Some(tooltip) = &mut self.tooltip {
                            tooltip.hide();
                        }
                    }
                    if press.dragging {
                        if let Some(window) = &self.window {
                            window.request_redraw();
                        }
                    }
                }
                self.update_hover();
            }

            WindowEvent::CursorLeft { .. } => {
                self.hovered = None;
                if let Some(tooltip) = &mut self.tooltip {
                    tooltip.hide();
                }
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }

            WindowEvent::MouseInput { state: ElementState::Pressed, button: MouseButton::Left, .. } => {
                if let Some(index) = self.hovered {
                    self.press = Some(Press { index, at: self.cursor, dragging: false });
                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
            }

            WindowEvent::MouseInput { state: ElementState::Released, button: MouseButton::Left, .. } => {
                self.on_left_release(event_loop);
            }

            WindowEvent::MouseInput { state: ElementState::Released, button: MouseButton::Right, .. } => {
                self.press = None;
                if self.bar.is_hidden() {
                    return;
                }
                match self.hovered {
                    Some(index) => self.entry_menu(index, event_loop),
                    None => self.main_menu(event_loop),
                }
            }

            WindowEvent::DroppedFile(path) => self.on_drop(path, event_loop),

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if let Ok(event) = MenuEvent::receiver().try_recv() {
            if Some(&event.id) == self.quit_id.as_ref() {
                event_loop.exit();
                return;
            }
        }

        if self.last_tick.elapsed() >= TICK_INTERVAL {
            self.tick(event_loop);
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(self.last_tick + TICK_INTERVAL));
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // Stop the watcher before the proxy's loop goes away
        self._watcher = None;
        log::info!("Exiting");
    }
}

/// Start the bar for this process's command line and run until exit.
/// Configuration errors end the process with a message box.
pub fn run() -> Result<()> {
    let invocation = Invocation::from_env();
    let work_area = work_area();
    let prefs = if invocation.settings_given { None } else { open_prefs() };
    let bar = match LaunchBar::start(Box::new(SystemShell::new()), invocation, prefs, Places::detect(), work_area) {
        Ok(bar) => bar,
        Err(e) => fatal(&format!("{e:#}")),
    };

    let event_loop = EventLoop::<UserEvent>::with_user_event()
        .build()
        .context("Failed to create the event loop")?;
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = BarApp::new(bar, event_loop.create_proxy(), work_area);
    event_loop.run_app(&mut app)?;
    Ok(())
}
