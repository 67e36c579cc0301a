//! Modal dialogs: bar settings and the folder name prompt.

use launchbar::{AutoHide, Edge, Settings};
use std::cell::RefCell;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{BOOL, HINSTANCE, HWND, LPARAM, LRESULT, WPARAM};
use windows::Win32::Graphics::Gdi::{UpdateWindow, HBRUSH};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::Input::KeyboardAndMouse::{EnableWindow, SetFocus};
use windows::Win32::UI::WindowsAndMessaging::*;

const ID_OK: i32 = 1;
const ID_CANCEL: i32 = 2;

// Settings controls; the edge radios are ID_EDGE_BASE + Edge::index()
const ID_EDGE_BASE: i32 = 200;
const ID_LARGE_ICONS: i32 = 210;
const ID_LARGE_MENUS: i32 = 211;
const ID_ON_TOP: i32 = 212;
const ID_AUTO_HIDE: i32 = 213;
const ID_SHOW_ON_CLICK: i32 = 214;
const ID_AUTOSTART: i32 = 215;

const ID_NAME_EDIT: i32 = 301;

// Style constants
const BS_DEFPUSHBUTTON: u32 = 0x0001;
const BS_AUTOCHECKBOX: u32 = 0x0003;
const BS_GROUPBOX: u32 = 0x0007;
const BS_AUTORADIOBUTTON: u32 = 0x0009;
const ES_AUTOHSCROLL: u32 = 0x0080;
const COLOR_BTNFACE: u32 = 15;
const BST_CHECKED: usize = 1;

/// Values the settings dialog starts from.
#[derive(Debug, Clone, Copy)]
pub struct SettingsForm {
    pub settings: Settings,
    pub autostart: bool,
    /// Autostart is only offered to bars that persist preferences.
    pub autostart_available: bool,
}

thread_local! {
    static SETTINGS_FORM: RefCell<Option<SettingsForm>> = const { RefCell::new(None) };
    static SETTINGS_RESULT: RefCell<Option<(Settings, bool)>> = const { RefCell::new(None) };
    static NAME_PROMPT: RefCell<String> = const { RefCell::new(String::new()) };
    static NAME_RESULT: RefCell<Option<String>> = const { RefCell::new(None) };
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

unsafe fn hinstance() -> HINSTANCE {
    GetModuleHandleW(PCWSTR::null()).unwrap_or_default().into()
}

/// Register `class`, create the dialog window centred on screen and pump
/// messages until it is destroyed. `owner` is disabled meanwhile.
unsafe fn run_modal(
    owner: HWND,
    class: &str,
    title: &str,
    width: i32,
    height: i32,
    proc: unsafe extern "system" fn(HWND, u32, WPARAM, LPARAM) -> LRESULT,
) {
    let hinstance = hinstance();
    let class_name = wide(class);
    let wc = WNDCLASSEXW {
        cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
        style: CS_HREDRAW | CS_VREDRAW,
        lpfnWndProc: Some(proc),
        hInstance: hinstance,
        hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
        hbrBackground: HBRUSH((COLOR_BTNFACE + 1) as *mut _),
        lpszClassName: PCWSTR(class_name.as_ptr()),
        ..Default::default()
    };
    // Fails harmlessly when the class is already registered
    RegisterClassExW(&wc);

    let x = (GetSystemMetrics(SM_CXSCREEN) - width) / 2;
    let y = (GetSystemMetrics(SM_CYSCREEN) - height) / 2;
    let title = wide(title);
    let Ok(hwnd) = CreateWindowExW(
        WS_EX_DLGMODALFRAME | WS_EX_TOPMOST,
        PCWSTR(class_name.as_ptr()),
        PCWSTR(title.as_ptr()),
        WS_POPUP | WS_CAPTION | WS_SYSMENU,
        x,
        y,
        width,
        height,
        owner,
        HMENU::default(),
        hinstance,
        None,
    ) else {
        return;
    };

    let _ = EnableWindow(owner, BOOL::from(false));
    let _ = ShowWindow(hwnd, SW_SHOW);
    let _ = UpdateWindow(hwnd);
    let _ = SetForegroundWindow(hwnd);

    let mut msg = MSG::default();
    while IsWindow(hwnd).as_bool() && GetMessageW(&mut msg, None, 0, 0).into() {
        if !IsDialogMessageW(hwnd, &msg).as_bool() {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    let _ = EnableWindow(owner, BOOL::from(true));
    let _ = SetForegroundWindow(owner);
}

unsafe fn control(
    parent: HWND,
    class: &str,
    text: &str,
    style: u32,
    ex_style: WINDOW_EX_STYLE,
    rect: (i32, i32, i32, i32),
    id: i32,
) -> HWND {
    let class = wide(class);
    let text = wide(text);
    CreateWindowExW(
        ex_style,
        PCWSTR(class.as_ptr()),
        PCWSTR(text.as_ptr()),
        WS_CHILD | WS_VISIBLE | WINDOW_STYLE(style),
        rect.0,
        rect.1,
        rect.2,
        rect.3,
        parent,
        HMENU(id as isize as *mut _),
        hinstance(),
        None,
    )
    .unwrap_or_default()
}

unsafe fn ok_cancel(hwnd: HWND, y: i32, right: i32) {
    let tab = WS_TABSTOP.0;
    control(hwnd, "BUTTON", "OK", tab | BS_DEFPUSHBUTTON, WINDOW_EX_STYLE(0), (right - 180, y, 85, 26), ID_OK);
    control(hwnd, "BUTTON", "Cancel", tab, WINDOW_EX_STYLE(0), (right - 90, y, 85, 26), ID_CANCEL);
}

unsafe fn set_checked(hwnd: HWND, id: i32, checked: bool) {
    if let Ok(ctrl) = GetDlgItem(hwnd, id) {
        SendMessageW(ctrl, BM_SETCHECK, WPARAM(if checked { BST_CHECKED } else { 0 }), LPARAM(0));
    }
}

unsafe fn is_checked(hwnd: HWND, id: i32) -> bool {
    match GetDlgItem(hwnd, id) {
        Ok(ctrl) => SendMessageW(ctrl, BM_GETCHECK, WPARAM(0), LPARAM(0)).0 as usize == BST_CHECKED,
        Err(_) => false,
    }
}

unsafe fn set_enabled(hwnd: HWND, id: i32, enabled: bool) {
    if let Ok(ctrl) = GetDlgItem(hwnd, id) {
        let _ = EnableWindow(ctrl, BOOL::from(enabled));
    }
}

unsafe fn get_edit_text(hwnd: HWND, id: i32) -> String {
    let Ok(ctrl) = GetDlgItem(hwnd, id) else { return String::new() };
    let len = GetWindowTextLengthW(ctrl) as usize;
    if len == 0 {
        return String::new();
    }
    let mut buf: Vec<u16> = vec![0; len + 1];
    GetWindowTextW(ctrl, &mut buf);
    String::from_utf16_lossy(&buf[..len])
}

fn auto_hide_from(enabled: bool, on_click: bool) -> AutoHide {
    match (enabled, on_click) {
        (false, _) => AutoHide::Off,
        (true, false) => AutoHide::OnHover,
        (true, true) => AutoHide::OnClick,
    }
}

/// Show the settings dialog. Returns the new settings and whether the bar
/// should start with Windows, or `None` when cancelled.
pub fn show_settings(owner: HWND, form: SettingsForm) -> Option<(Settings, bool)> {
    SETTINGS_FORM.with(|cell| *cell.borrow_mut() = Some(form));
    SETTINGS_RESULT.with(|cell| *cell.borrow_mut() = None);

    let title = format!("{} Settings", launchbar::PROG_NAME);
    unsafe { run_modal(owner, "LaunchBarSettings", &title, 340, 330, settings_proc) };

    SETTINGS_RESULT.with(|cell| cell.borrow_mut().take())
}

unsafe extern "system" fn settings_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    match msg {
        WM_CREATE => {
            create_settings_controls(hwnd);
            if let Some(form) = SETTINGS_FORM.with(|cell| *cell.borrow()) {
                populate_settings(hwnd, form);
            }
            LRESULT(0)
        }
        WM_COMMAND => {
            let id = (wparam.0 & 0xFFFF) as i32;
            match id {
                ID_AUTO_HIDE => set_enabled(hwnd, ID_SHOW_ON_CLICK, is_checked(hwnd, ID_AUTO_HIDE)),
                ID_OK => {
                    let result = read_settings(hwnd);
                    SETTINGS_RESULT.with(|cell| *cell.borrow_mut() = Some(result));
                    let _ = DestroyWindow(hwnd);
                }
                ID_CANCEL => {
                    let _ = DestroyWindow(hwnd);
                }
                _ => {}
            }
            LRESULT(0)
        }
        WM_CLOSE => {
            let _ = DestroyWindow(hwnd);
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

unsafe fn create_settings_controls(hwnd: HWND) {
    let none = WINDOW_EX_STYLE(0);
    let tab = WS_TABSTOP.0;

    control(hwnd, "BUTTON", "Position", BS_GROUPBOX, none, (10, 8, 305, 70), -1);
    let labels = ["Left", "Top", "Right", "Bottom"];
    for (i, (edge, label)) in Edge::ALL.iter().zip(labels).enumerate() {
        let mut style = BS_AUTORADIOBUTTON | tab;
        if i == 0 {
            style |= WS_GROUP.0;
        }
        let x = 25 + (i as i32 % 2) * 140;
        let y = 28 + (i as i32 / 2) * 22;
        control(hwnd, "BUTTON", label, style, none, (x, y, 120, 20), ID_EDGE_BASE + edge.index() as i32);
    }

    let checks = [
        (ID_LARGE_ICONS, "Large icons"),
        (ID_LARGE_MENUS, "Large menu icons"),
        (ID_ON_TOP, "Always on top"),
        (ID_AUTO_HIDE, "Auto hide"),
        (ID_SHOW_ON_CLICK, "Show only when clicked"),
        (ID_AUTOSTART, "Start with Windows"),
    ];
    let mut y = 90;
    for (n, (id, label)) in checks.into_iter().enumerate() {
        let mut style = BS_AUTOCHECKBOX | tab;
        if n == 0 {
            style |= WS_GROUP.0;
        }
        let x = if id == ID_SHOW_ON_CLICK { 40 } else { 20 };
        control(hwnd, "BUTTON", label, style, none, (x, y, 260, 20), id);
        y += 24;
    }

    ok_cancel(hwnd, y + 12, 325);
}

unsafe fn populate_settings(hwnd: HWND, form: SettingsForm) {
    let s = form.settings;
    set_checked(hwnd, ID_EDGE_BASE + s.edge.index() as i32, true);
    set_checked(hwnd, ID_LARGE_ICONS, s.large_icons);
    set_checked(hwnd, ID_LARGE_MENUS, s.large_menus);
    set_checked(hwnd, ID_ON_TOP, s.on_top);
    set_checked(hwnd, ID_AUTO_HIDE, s.auto_hide.enabled());
    set_checked(hwnd, ID_SHOW_ON_CLICK, s.auto_hide == AutoHide::OnClick);
    set_enabled(hwnd, ID_SHOW_ON_CLICK, s.auto_hide.enabled());
    set_checked(hwnd, ID_AUTOSTART, form.autostart);
    set_enabled(hwnd, ID_AUTOSTART, form.autostart_available);
}

unsafe fn read_settings(hwnd: HWND) -> (Settings, bool) {
    let form = SETTINGS_FORM.with(|cell| *cell.borrow());
    let mut settings = form.map(|f| f.settings).unwrap_or_default();
    if let Some(edge) = Edge::ALL.into_iter().find(|e| is_checked(hwnd, ID_EDGE_BASE + e.index() as i32)) {
        settings.edge = edge;
    }
    settings.large_icons = is_checked(hwnd, ID_LARGE_ICONS);
    settings.large_menus = is_checked(hwnd, ID_LARGE_MENUS);
    settings.on_top = is_checked(hwnd, ID_ON_TOP);
    settings.auto_hide = auto_hide_from(is_checked(hwnd, ID_AUTO_HIDE), is_checked(hwnd, ID_SHOW_ON_CLICK));
    (settings, is_checked(hwnd, ID_AUTOSTART))
}

/// Ask for a name, e.g. of a new folder. Returns `None` when cancelled or
/// left empty.
pub fn prompt_name(owner: HWND, title: &str, prompt: &str) -> Option<String> {
    NAME_PROMPT.with(|cell| *cell.borrow_mut() = prompt.to_string());
    NAME_RESULT.with(|cell| *cell.borrow_mut() = None);

    unsafe { run_modal(owner, "LaunchBarPrompt", title, 360, 150, prompt_proc) };

    NAME_RESULT
        .with(|cell| cell.borrow_mut().take())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

unsafe extern "system" fn prompt_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    match msg {
        WM_CREATE => {
            let none = WINDOW_EX_STYLE(0);
            let prompt = NAME_PROMPT.with(|cell| cell.borrow().clone());
            control(hwnd, "STATIC", &prompt, 0, none, (12, 12, 320, 18), -1);
            let edit = control(
                hwnd,
                "EDIT",
                "",
                WS_TABSTOP.0 | ES_AUTOHSCROLL,
                WS_EX_CLIENTEDGE,
                (12, 34, 320, 24),
                ID_NAME_EDIT,
            );
            ok_cancel(hwnd, 70, 340);
            let _ = SetFocus(edit);
            LRESULT(0)
        }
        WM_COMMAND => {
            match (wparam.0 & 0xFFFF) as i32 {
                ID_OK => {
                    let name = get_edit_text(hwnd, ID_NAME_EDIT);
                    NAME_RESULT.with(|cell| *cell.borrow_mut() = Some(name));
                    let _ = DestroyWindow(hwnd);
                }
                ID_CANCEL => {
                    let _ = DestroyWindow(hwnd);
                }
                _ => {}
            }
            LRESULT(0)
        }
        WM_CLOSE => {
            let _ = DestroyWindow(hwnd);
            LRESULT(0)
        }
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}
