//! Popup menus: the bar menu, the button menu and cascading folder menus,
//! plus the file picker used by "New Shortcut".
//!
//! Right clicks inside a folder menu reach the bar window as
//! `WM_MENURBUTTONUP`, so the window is subclassed while the menu is open.

use launchbar::icon::{Icon, LARGE_ICON_SIZE, SMALL_ICON_SIZE};
use launchbar::{Edge, MenuNode, Rect};
use std::cell::RefCell;
use std::ffi::c_void;
use std::path::PathBuf;
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Foundation::{HANDLE, HWND, LPARAM, LRESULT, POINT, TRUE, WPARAM};
use windows::Win32::Graphics::Gdi::{
    CreateDIBSection, DeleteObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HBITMAP, HDC,
};
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, CoUninitialize, CLSCTX_INPROC_SERVER, COINIT_APARTMENTTHREADED,
};
use windows::Win32::UI::Shell::{
    DefSubclassProc, FileOpenDialog, IFileDialog, IShellItem, RemoveWindowSubclass, SetWindowSubclass,
    FOS_FILEMUSTEXIST, FOS_NODEREFERENCELINKS, FOS_PATHMUSTEXIST, SIGDN_FILESYSPATH,
};
use windows::Win32::UI::WindowsAndMessaging::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MainAction {
    None,
    Help,
    About,
    Settings,
    NewShortcut,
    NewFolder,
    Refresh,
    ExploreBarDir,
    AddStartMenuLink,
    Run,
    Exit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryAction {
    None,
    Delete,
    Properties,
    Explore,
    RunAsAdmin,
    NewShortcut,
    NewFolder,
}

/// Outcome of a folder menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderChoice {
    /// An item was chosen.
    Launch(PathBuf),
    /// A command from the right-click menu of an item.
    Item { target: PathBuf, action: EntryAction },
}

/// What the bar menu offers.
#[derive(Debug, Clone, Copy)]
pub struct MainMenuOptions {
    /// Folder-only commands are left out.
    pub config_mode: bool,
    pub can_add_start_menu_link: bool,
}

const ID_HELP: u32 = 1001;
const ID_ABOUT: u32 = 1002;
const ID_SETTINGS: u32 = 1003;
const ID_NEW_SHORTCUT: u32 = 1004;
const ID_NEW_FOLDER: u32 = 1005;
const ID_REFRESH: u32 = 1006;
const ID_EXPLORE_BAR: u32 = 1007;
const ID_START_MENU_LINK: u32 = 1008;
const ID_RUN: u32 = 1009;
const ID_EXIT: u32 = 1010;

const ID_DELETE: u32 = 1101;
const ID_PROPERTIES: u32 = 1102;
const ID_EXPLORE: u32 = 1103;
const ID_RUN_AS_ADMIN: u32 = 1104;
const ID_ENTRY_NEW_SHORTCUT: u32 = 1105;
const ID_ENTRY_NEW_FOLDER: u32 = 1106;

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

unsafe fn append(hmenu: HMENU, flags: MENU_ITEM_FLAGS, id: u32, text: &str) {
    let text = wide(text);
    let _ = AppendMenuW(hmenu, MF_STRING | flags, id as usize, PCWSTR(text.as_ptr()));
}

unsafe fn separator(hmenu: HMENU) {
    let _ = AppendMenuW(hmenu, MF_SEPARATOR, 0, PCWSTR::null());
}

/// Run a popup menu and return the chosen command id, 0 when dismissed.
unsafe fn track(hmenu: HMENU, hwnd: HWND, flags: TRACK_POPUP_MENU_FLAGS, x: i32, y: i32) -> u32 {
    // Required so the menu closes when the user clicks elsewhere
    let _ = SetForegroundWindow(hwnd);
    let cmd = TrackPopupMenu(hmenu, flags | TPM_RETURNCMD | TPM_RIGHTBUTTON | TPM_NONOTIFY, x, y, 0, hwnd, None);
    let _ = PostMessageW(hwnd, WM_NULL, None, None);
    cmd.0 as u32
}

/// Bar menu, shown for right clicks off the buttons and left clicks on
/// the bar itself.
pub fn show_main_menu(hwnd: HWND, x: i32, y: i32, options: MainMenuOptions) -> MainAction {
    unsafe {
        let Ok(hmenu) = CreatePopupMenu() else {
            return MainAction::None;
        };

        append(hmenu, MF_ENABLED, ID_HELP, "Help");
        append(hmenu, MF_ENABLED, ID_ABOUT, &format!("About {}...", launchbar::PROG_NAME));
        separator(hmenu);
        append(hmenu, MF_ENABLED, ID_SETTINGS, "Settings...");
        if !options.config_mode {
            append(hmenu, MF_ENABLED, ID_NEW_SHORTCUT, "New Shortcut...");
            append(hmenu, MF_ENABLED, ID_NEW_FOLDER, "New Folder...");
            append(hmenu, MF_ENABLED, ID_REFRESH, "Refresh");
            append(hmenu, MF_ENABLED, ID_EXPLORE_BAR, "Explore Bar Folder");
            let state = if options.can_add_start_menu_link { MF_ENABLED } else { MF_GRAYED };
            append(hmenu, state, ID_START_MENU_LINK, "Add Start Menu Button");
        }
        separator(hmenu);
        append(hmenu, MF_ENABLED, ID_RUN, "Run...");
        separator(hmenu);
        append(hmenu, MF_ENABLED, ID_EXIT, "Exit");

        let cmd = track(hmenu, hwnd, TPM_LEFTALIGN, x, y);
        let _ = DestroyMenu(hmenu);

        match cmd {
            ID_HELP => MainAction::Help,
            ID_ABOUT => MainAction::About,
            ID_SETTINGS => MainAction::Settings,
            ID_NEW_SHORTCUT => MainAction::NewShortcut,
            ID_NEW_FOLDER => MainAction::NewFolder,
            ID_REFRESH => MainAction::Refresh,
            ID_EXPLORE_BAR => MainAction::ExploreBarDir,
            ID_START_MENU_LINK => MainAction::AddStartMenuLink,
            ID_RUN => MainAction::Run,
            ID_EXIT => MainAction::Exit,
            _ => MainAction::None,
        }
    }
}

/// Button menu. Folder buttons also get commands that add to the folder.
pub fn show_entry_menu(hwnd: HWND, x: i32, y: i32, is_folder: bool, config_mode: bool) -> EntryAction {
    entry_menu(hwnd, x, y, is_folder, config_mode, TPM_LEFTALIGN)
}

fn entry_menu(
    hwnd: HWND,
    x: i32,
    y: i32,
    is_folder: bool,
    config_mode: bool,
    flags: TRACK_POPUP_MENU_FLAGS,
) -> EntryAction {
    unsafe {
        let Ok(hmenu) = CreatePopupMenu() else {
            return EntryAction::None;
        };

        append(hmenu, MF_ENABLED, ID_PROPERTIES, "Properties");
        append(hmenu, MF_ENABLED, ID_EXPLORE, "Explore");
        append(hmenu, MF_ENABLED, ID_RUN_AS_ADMIN, "Run as Administrator");
        if is_folder && !config_mode {
            separator(hmenu);
            append(hmenu, MF_ENABLED, ID_ENTRY_NEW_SHORTCUT, "New Shortcut...");
            append(hmenu, MF_ENABLED, ID_ENTRY_NEW_FOLDER, "New Folder...");
        }
        if !config_mode {
            separator(hmenu);
            append(hmenu, MF_ENABLED, ID_DELETE, "Delete");
        }

        let cmd = track(hmenu, hwnd, flags, x, y);
        let _ = DestroyMenu(hmenu);

        match cmd {
            ID_DELETE => EntryAction::Delete,
            ID_PROPERTIES => EntryAction::Properties,
            ID_EXPLORE => EntryAction::Explore,
            ID_RUN_AS_ADMIN => EntryAction::RunAsAdmin,
            ID_ENTRY_NEW_SHORTCUT => EntryAction::NewShortcut,
            ID_ENTRY_NEW_FOLDER => EntryAction::NewFolder,
            _ => EntryAction::None,
        }
    }
}

/// Anchor point and alignment that open a menu beside `button` (screen
/// coordinates), away from the docked edge.
fn menu_anchor(button: Rect, edge: Edge) -> (i32, i32, TRACK_POPUP_MENU_FLAGS) {
    match edge {
        Edge::Left => (button.right(), button.y, TPM_LEFTALIGN | TPM_TOPALIGN),
        Edge::Right => (button.x, button.y, TPM_RIGHTALIGN | TPM_TOPALIGN),
        Edge::Top => (button.x, button.bottom(), TPM_LEFTALIGN | TPM_TOPALIGN),
        Edge::Bottom => (button.x, button.y, TPM_LEFTALIGN | TPM_BOTTOMALIGN),
    }
}

/// A folder menu item, found again through the item data when it is right
/// clicked.
#[derive(Debug, Clone)]
struct ItemRef {
    target: PathBuf,
    is_folder: bool,
}

/// Builds a cascading menu from a [`MenuNode`] tree. Every item carries
/// its 1-based index into `items` as item data; leaf items use it as their
/// command id as well.
struct FolderMenu {
    items: Vec<ItemRef>,
    bitmaps: Vec<HBITMAP>,
    icon_size: u32,
}

impl FolderMenu {
    unsafe fn fill(&mut self, hmenu: HMENU, node: &MenuNode) {
        let children = node.children.as_deref().unwrap_or_default();
        if children.is_empty() {
            append(hmenu, MF_GRAYED, 0, "(empty)");
            return;
        }

        for (pos, child) in children.iter().enumerate() {
            // A lone '&' would become a mnemonic
            let mut label = wide(&child.label.replace('&', "&&"));
            self.items.push(ItemRef { target: child.target.clone(), is_folder: child.is_folder() });
            let id = self.items.len();
            let mut mii = MENUITEMINFOW {
                cbSize: std::mem::size_of::<MENUITEMINFOW>() as u32,
                fMask: MIIM_STRING | MIIM_ID | MIIM_DATA,
                dwTypeData: PWSTR(label.as_mut_ptr()),
                dwItemData: id,
                ..Default::default()
            };

            let icon = child.icons.pick(self.icon_size, child.is_folder());
            if let Some(bitmap) = icon_bitmap(&icon) {
                self.bitmaps.push(bitmap);
                mii.fMask |= MIIM_BITMAP;
                mii.hbmpItem = bitmap;
            }

            if child.is_folder() {
                let Ok(submenu) = CreatePopupMenu() else {
                    continue;
                };
                self.fill(submenu, child);
                mii.fMask |= MIIM_SUBMENU;
                mii.hSubMenu = submenu;
            } else {
                mii.wID = id as u32;
            }

            if let Err(e) = InsertMenuItemW(hmenu, pos as u32, TRUE, &mii) {
                log::debug!("Menu item {}: {e}", child.label);
            }
        }
    }
}

/// The folder menu currently open on this thread.
struct Tracking {
    items: Vec<ItemRef>,
    config_mode: bool,
    picked: Option<FolderChoice>,
}

thread_local! {
    static TRACKING: RefCell<Option<Tracking>> = const { RefCell::new(None) };
}

const SUBCLASS_ID: usize = 0x4C42;

/// Index into `items` from the 1-based item data.
fn item_index(data: usize) -> Option<usize> {
    data.checked_sub(1)
}

unsafe fn item_at(hmenu: HMENU, pos: u32) -> Option<ItemRef> {
    let mut mii = MENUITEMINFOW {
        cbSize: std::mem::size_of::<MENUITEMINFOW>() as u32,
        fMask: MIIM_DATA,
        ..Default::default()
    };
    GetMenuItemInfoW(hmenu, pos, TRUE, &mut mii).ok()?;
    let index = item_index(mii.dwItemData)?;
    TRACKING.with_borrow(|t| t.as_ref()?.items.get(index).cloned())
}

unsafe extern "system" fn menu_owner_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
    _id: usize,
    _data: usize,
) -> LRESULT {
    if msg != WM_MENURBUTTONUP {
        return DefSubclassProc(hwnd, msg, wparam, lparam);
    }

    let Some(item) = item_at(HMENU(lparam.0 as *mut c_void), wparam.0 as u32) else {
        return LRESULT(0);
    };
    let config_mode = TRACKING.with_borrow(|t| t.as_ref().is_some_and(|t| t.config_mode));
    let mut point = POINT::default();
    let _ = GetCursorPos(&mut point);

    let action = entry_menu(hwnd, point.x, point.y, item.is_folder, config_mode, TPM_LEFTALIGN | TPM_RECURSE);
    if action != EntryAction::None {
        TRACKING.with_borrow_mut(|t| {
            if let Some(t) = t {
                t.picked = Some(FolderChoice::Item { target: item.target, action });
            }
        });
        // Close the whole cascade, the command runs once it is gone
        let _ = EndMenu();
    }
    LRESULT(0)
}

/// Show the menu of a folder button. Returns the chosen file, or the
/// command picked from the right-click menu of an item.
pub fn show_folder_menu(
    hwnd: HWND,
    node: &MenuNode,
    button: Rect,
    edge: Edge,
    large: bool,
    config_mode: bool,
) -> Option<FolderChoice> {
    let mut menu = FolderMenu {
        items: Vec::new(),
        bitmaps: Vec::new(),
        icon_size: if large { LARGE_ICON_SIZE } else { SMALL_ICON_SIZE },
    };

    unsafe {
        let hmenu = CreatePopupMenu().ok()?;
        menu.fill(hmenu, node);
        TRACKING.set(Some(Tracking { items: menu.items, config_mode, picked: None }));
        let subclassed = SetWindowSubclass(hwnd, Some(menu_owner_proc), SUBCLASS_ID, 0).as_bool();
        if !subclassed {
            log::warn!("Item menus are unavailable: failed to subclass the bar window");
        }

        let (x, y, align) = menu_anchor(button, edge);
        let _ = SetForegroundWindow(hwnd);
        let cmd = TrackPopupMenu(hmenu, align | TPM_RETURNCMD | TPM_LEFTBUTTON, x, y, 0, hwnd, None);
        let _ = PostMessageW(hwnd, WM_NULL, None, None);

        if subclassed {
            let _ = RemoveWindowSubclass(hwnd, Some(menu_owner_proc), SUBCLASS_ID);
        }
        let _ = DestroyMenu(hmenu);
        for bitmap in menu.bitmaps.drain(..) {
            let _ = DeleteObject(bitmap);
        }

        let tracking = TRACKING.take()?;
        if let Some(picked) = tracking.picked {
            return Some(picked);
        }
        let index = item_index(cmd.0 as usize)?;
        let item = tracking.items.into_iter().nth(index)?;
        Some(FolderChoice::Launch(item.target))
    }
}

fn premultiply(argb: u32) -> u32 {
    let a = argb >> 24;
    let scale = |shift: u32| (((argb >> shift) & 0xFF) * a / 255) << shift;
    (a << 24) | scale(16) | scale(8) | scale(0)
}

/// 32bpp premultiplied DIB for a menu item image.
unsafe fn icon_bitmap(icon: &Icon) -> Option<HBITMAP> {
    let size = icon.size();
    let bmi = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biWidth: size as i32,
            biHeight: -(size as i32), // top-down
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    };

    let mut bits: *mut c_void = std::ptr::null_mut();
    let bitmap = CreateDIBSection(HDC::default(), &bmi, DIB_RGB_COLORS, &mut bits, HANDLE::default(), 0).ok()?;
    if bits.is_null() {
        let _ = DeleteObject(bitmap);
        return None;
    }

    // ARGB words are BGRA bytes in memory, the layout a DIB expects
    let dst = std::slice::from_raw_parts_mut(bits.cast::<u32>(), (size * size) as usize);
    for (d, &s) in dst.iter_mut().zip(icon.pixels()) {
        *d = premultiply(s);
    }
    Some(bitmap)
}

/// Pick the file a new shortcut should point at.
pub fn pick_shortcut_target() -> Option<PathBuf> {
    pick_file(
        "New Shortcut",
        &[("Programs", "*.exe;*.lnk;*.bat;*.cmd"), ("All Files", "*.*")],
    )
}

fn pick_file(title: &str, filters: &[(&str, &str)]) -> Option<PathBuf> {
    unsafe {
        let _ = CoInitializeEx(None, COINIT_APARTMENTTHREADED);

        let dialog: IFileDialog = match CoCreateInstance(&FileOpenDialog, None, CLSCTX_INPROC_SERVER) {
            Ok(d) => d,
            Err(_) => {
                CoUninitialize();
                return None;
            }
        };

        // Shortcuts are returned as themselves, not their targets
        if let Ok(opts) = dialog.GetOptions() {
            let _ = dialog.SetOptions(opts | FOS_FILEMUSTEXIST | FOS_PATHMUSTEXIST | FOS_NODEREFERENCELINKS);
        }

        let title_wide = wide(title);
        let _ = dialog.SetTitle(PCWSTR(title_wide.as_ptr()));

        let filter_strings: Vec<(Vec<u16>, Vec<u16>)> =
            filters.iter().map(|(name, pattern)| (wide(name), wide(pattern))).collect();
        let filter_specs: Vec<_> = filter_strings
            .iter()
            .map(|(name, pattern)| windows::Win32::UI::Shell::Common::COMDLG_FILTERSPEC {
                pszName: PCWSTR(name.as_ptr()),
                pszSpec: PCWSTR(pattern.as_ptr()),
            })
            .collect();
        if !filter_specs.is_empty() {
            let _ = dialog.SetFileTypes(&filter_specs);
        }

        let result = if dialog.Show(HWND::default()).is_ok() {
            dialog.GetResult().ok().and_then(|item: IShellItem| {
                item.GetDisplayName(SIGDN_FILESYSPATH).ok().map(|path| {
                    let path_str = path.to_string().unwrap_or_default();
                    windows::Win32::System::Com::CoTaskMemFree(Some(path.0 as *const _));
                    PathBuf::from(path_str)
                })
            })
        } else {
            None
        };

        CoUninitialize();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchbar::icon::IconPair;

    fn node(target: &str, children: Option<Vec<MenuNode>>) -> MenuNode {
        MenuNode {
            label: target.rsplit('\\').next().unwrap_or(target).to_string(),
            target: PathBuf::from(target),
            icons: IconPair::default(),
            children,
        }
    }

    #[test]
    fn test_menu_items_map_back_to_nodes() {
        let root = node(
            r"C:\Tools",
            Some(vec![
                node(r"C:\Tools\Sub", Some(vec![node(r"C:\Tools\Sub\inner.lnk", None)])),
                node(r"C:\Tools\tool.lnk", None),
            ]),
        );
        let mut menu = FolderMenu { items: Vec::new(), bitmaps: Vec::new(), icon_size: SMALL_ICON_SIZE };

        unsafe {
            let hmenu = CreatePopupMenu().unwrap();
            menu.fill(hmenu, &root);
            TRACKING.set(Some(Tracking { items: menu.items.clone(), config_mode: false, picked: None }));

            let sub = item_at(hmenu, 0).unwrap();
            assert!(sub.is_folder);
            assert_eq!(sub.target, PathBuf::from(r"C:\Tools\Sub"));
            let inner = item_at(GetSubMenu(hmenu, 0), 0).unwrap();
            assert_eq!(inner.target, PathBuf::from(r"C:\Tools\Sub\inner.lnk"));
            let tool = item_at(hmenu, 1).unwrap();
            assert!(!tool.is_folder);
            // Leaf command ids index the same list
            assert_eq!(GetMenuItemID(hmenu, 1), 3);
            assert!(item_at(hmenu, 2).is_none());

            TRACKING.take();
            let _ = DestroyMenu(hmenu);
            for bitmap in menu.bitmaps {
                let _ = DeleteObject(bitmap);
            }
        }
    }

    #[test]
    fn test_empty_folder_item_is_inert() {
        let mut menu = FolderMenu { items: Vec::new(), bitmaps: Vec::new(), icon_size: SMALL_ICON_SIZE };
        unsafe {
            let hmenu = CreatePopupMenu().unwrap();
            menu.fill(hmenu, &node(r"C:\Empty", Some(Vec::new())));
            TRACKING.set(Some(Tracking { items: Vec::new(), config_mode: false, picked: None }));
            assert_eq!(GetMenuItemCount(hmenu), 1);
            assert!(item_at(hmenu, 0).is_none());
            TRACKING.take();
            let _ = DestroyMenu(hmenu);
        }
        assert_eq!(item_index(0), None);
    }

    #[test]
    fn test_menu_opens_away_from_docked_edge() {
        let button = Rect::new(1890, 100, 22, 22);
        let (x, y, align) = menu_anchor(button, Edge::Right);
        assert_eq!((x, y), (1890, 100));
        assert_eq!(align, TPM_RIGHTALIGN | TPM_TOPALIGN);

        let (x, y, align) = menu_anchor(Rect::new(20, 1010, 22, 22), Edge::Bottom);
        assert_eq!((x, y), (20, 1010));
        assert_eq!(align, TPM_LEFTALIGN | TPM_BOTTOMALIGN);
    }

    #[test]
    fn test_premultiply() {
        assert_eq!(premultiply(0xFF336699), 0xFF336699);
        assert_eq!(premultiply(0x00FFFFFF), 0);
        assert_eq!(premultiply(0x80FF0000), 0x80800000);
    }
}
