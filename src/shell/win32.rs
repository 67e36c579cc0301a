//! Windows shell calls behind [`SystemShell`](super::SystemShell).
//!
//! Shortcuts go through IShellLinkW/IPersistFile. Icon handles returned by
//! the shell are converted to owned [`Icon`] pixels and destroyed straight
//! away by [`IconHandle`].

use super::{ShortcutInfo, ShortcutOptions, ShowMode};
use crate::config::expand_env_vars;
use crate::icon::{rgba_to_argb, Icon, IconPair};
use anyhow::{anyhow, Context, Result};
use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use windows::core::{Interface, GUID, PCWSTR};
use windows::Win32::Foundation::TRUE;
use windows::Win32::Graphics::Gdi::{
    CreateCompatibleDC, DeleteDC, DeleteObject, GetDIBits, BITMAPINFO, BITMAPINFOHEADER, BI_RGB,
    DIB_RGB_COLORS, HBITMAP, HDC,
};
use windows::Win32::Storage::FileSystem::FILE_FLAGS_AND_ATTRIBUTES;
use windows::Win32::System::Com::{
    CoCreateInstance, CoInitializeEx, IPersistFile, CLSCTX_INPROC_SERVER,
    COINIT_APARTMENTTHREADED, STGM_READ,
};
use windows::Win32::UI::Shell::{
    ExtractIconExW, IShellLinkW, SHFileOperationW, SHGetFileInfoW, ShellExecuteExW,
    FOF_ALLOWUNDO, FO_DELETE, SEE_MASK_INVOKEIDLIST, SEE_MASK_NOASYNC, SHELLEXECUTEINFOW,
    SHFILEINFOW, SHFILEOPSTRUCTW, SHGFI_EXETYPE, SHGFI_FLAGS, SHGFI_ICON, SHGFI_LARGEICON, SHGFI_SMALLICON,
};
use windows::Win32::UI::WindowsAndMessaging::{
    DestroyIcon, GetIconInfo, HICON, ICONINFO, SHOW_WINDOW_CMD, SW_SHOWMAXIMIZED, SW_SHOWMINNOACTIVE,
    SW_SHOWMINIMIZED, SW_SHOWNORMAL,
};

const CLSID_SHELL_LINK: GUID = GUID::from_u128(0x00021401_0000_0000_C000_000000000046);

pub fn init_com() {
    // Repeated initialisation on the same thread is harmless
    let _ = unsafe { CoInitializeEx(None, COINIT_APARTMENTTHREADED) };
}

fn wide(s: &OsStr) -> Vec<u16> {
    s.encode_wide().chain(std::iter::once(0)).collect()
}

fn wstr_to_string(buf: &[u16]) -> String {
    let len = buf.iter().position(|&c| c == 0).unwrap_or(buf.len());
    String::from_utf16_lossy(&buf[..len])
}

/// Owns an HICON and destroys it on drop.
struct IconHandle(HICON);

impl Drop for IconHandle {
    fn drop(&mut self) {
        if !self.0.is_invalid() {
            let _ = unsafe { DestroyIcon(self.0) };
        }
    }
}

impl IconHandle {
    fn to_icon(&self) -> Option<Icon> {
        if self.0.is_invalid() {
            return None;
        }
        unsafe { hicon_pixels(self.0) }
    }
}

pub fn is_executable(path: &Path) -> bool {
    let path_w = wide(path.as_os_str());
    let kind = unsafe {
        SHGetFileInfoW(PCWSTR(path_w.as_ptr()), FILE_FLAGS_AND_ATTRIBUTES(0), None, 0, SHGFI_EXETYPE)
    };
    kind != 0
}

pub fn resolve_shortcut(path: &Path) -> Result<ShortcutInfo> {
    unsafe {
        let link: IShellLinkW = CoCreateInstance(&CLSID_SHELL_LINK, None, CLSCTX_INPROC_SERVER)
            .context("Failed to create ShellLink")?;
        let persist: IPersistFile = link.cast().context("Failed to get IPersistFile")?;
        let path_w = wide(path.as_os_str());
        persist
            .Load(PCWSTR(path_w.as_ptr()), STGM_READ)
            .with_context(|| format!("Failed to load shortcut: {}", path.display()))?;

        let mut buf = [0u16; 1024];
        link.GetPath(&mut buf, std::ptr::null_mut(), 0)
            .with_context(|| format!("Shortcut has no target: {}", path.display()))?;
        let target = PathBuf::from(expand_env_vars(&wstr_to_string(&buf)));

        let mut desc = [0u16; 1024];
        let description = match link.GetDescription(&mut desc) {
            Ok(()) => wstr_to_string(&desc),
            Err(_) => String::new(),
        };

        let mut icon_buf = [0u16; 1024];
        let mut icon_index = 0i32;
        let icon_file = match link.GetIconLocation(&mut icon_buf, &mut icon_index) {
            Ok(()) => expand_env_vars(&wstr_to_string(&icon_buf)),
            Err(_) => String::new(),
        };

        let mut icons = if !icon_file.is_empty() {
            extract_icons(Path::new(&icon_file), icon_index.max(0))
        } else if !target.as_os_str().is_empty() {
            file_icons(&target)
        } else {
            IconPair::default()
        };
        if icons.is_empty() {
            icons = file_icons(path);
        }
        let show_mode = link.GetShowCmd().map_or(ShowMode::Normal, mode_of);
        Ok(ShortcutInfo { target, description, icons, show_mode })
    }
}

pub fn create_shortcut(link_path: &Path, target: &Path, options: &ShortcutOptions) -> Result<()> {
    unsafe {
        let link: IShellLinkW = CoCreateInstance(&CLSID_SHELL_LINK, None, CLSCTX_INPROC_SERVER)
            .context("Failed to create ShellLink")?;
        let target_w = wide(target.as_os_str());
        link.SetPath(PCWSTR(target_w.as_ptr()))?;
        if let Some((file, index)) = &options.icon {
            let w = wide(file.as_os_str());
            link.SetIconLocation(PCWSTR(w.as_ptr()), *index)?;
        }
        if let Some(desc) = &options.description {
            let w = wide(OsStr::new(desc));
            link.SetDescription(PCWSTR(w.as_ptr()))?;
        }
        link.SetShowCmd(SW_SHOWNORMAL)?;

        let persist: IPersistFile = link.cast().context("Failed to get IPersistFile")?;
        let link_w = wide(link_path.as_os_str());
        persist
            .Save(PCWSTR(link_w.as_ptr()), TRUE)
            .with_context(|| format!("Failed to save shortcut: {}", link_path.display()))?;
    }
    Ok(())
}

/// Large and small shell icons of any file or folder.
pub fn file_icons(path: &Path) -> IconPair {
    let path_w = wide(path.as_os_str());
    let get = |size_flag: SHGFI_FLAGS| unsafe {
        let mut info = SHFILEINFOW::default();
        let ok = SHGetFileInfoW(
            PCWSTR(path_w.as_ptr()),
            FILE_FLAGS_AND_ATTRIBUTES(0),
            Some(&mut info),
            std::mem::size_of::<SHFILEINFOW>() as u32,
            SHGFI_ICON | size_flag,
        );
        if ok == 0 {
            return None;
        }
        IconHandle(info.hIcon).to_icon()
    };
    IconPair { large: get(SHGFI_LARGEICON), small: get(SHGFI_SMALLICON) }
}

/// Icons stored at `index` in an executable, library or icon file.
pub fn extract_icons(file: &Path, index: i32) -> IconPair {
    let file_w = wide(file.as_os_str());
    let mut large = HICON::default();
    let mut small = HICON::default();
    let count = unsafe {
        ExtractIconExW(PCWSTR(file_w.as_ptr()), index, Some(&mut large), Some(&mut small), 1)
    };
    let (large, small) = (IconHandle(large), IconHandle(small));
    if count == 0 || count == u32::MAX {
        log::debug!("No icon {index} in {}", file.display());
        return IconPair::default();
    }
    IconPair { large: large.to_icon(), small: small.to_icon() }
}

pub fn shell_execute(path: &Path, params: &str, verb: Option<&str>, show: ShowMode) -> Result<()> {
    let file_w = wide(path.as_os_str());
    let params_w = wide(OsStr::new(params));
    let verb_w = verb.map(|v| wide(OsStr::new(v)));
    // URLs and bare program names have no usable parent folder
    let dir_w = path.parent().filter(|d| d.is_dir()).map(|d| wide(d.as_os_str()));

    let mut info = SHELLEXECUTEINFOW {
        cbSize: std::mem::size_of::<SHELLEXECUTEINFOW>() as u32,
        fMask: SEE_MASK_NOASYNC | SEE_MASK_INVOKEIDLIST,
        lpVerb: verb_w.as_ref().map_or(PCWSTR::null(), |v| PCWSTR(v.as_ptr())),
        lpFile: PCWSTR(file_w.as_ptr()),
        lpParameters: if params.is_empty() { PCWSTR::null() } else { PCWSTR(params_w.as_ptr()) },
        lpDirectory: dir_w.as_ref().map_or(PCWSTR::null(), |d| PCWSTR(d.as_ptr())),
        nShow: show_command(show).0,
        ..Default::default()
    };
    unsafe { ShellExecuteExW(&mut info) }
        .with_context(|| format!("Failed to open {}", path.display()))
}

pub fn delete_to_trash(path: &Path) -> Result<()> {
    // SHFileOperation wants a double-terminated list
    let mut from = wide(path.as_os_str());
    from.push(0);
    let mut op = SHFILEOPSTRUCTW {
        wFunc: FO_DELETE,
        pFrom: PCWSTR(from.as_ptr()),
        fFlags: FOF_ALLOWUNDO.0 as u16,
        ..Default::default()
    };
    let rc = unsafe { SHFileOperationW(&mut op) };
    if rc != 0 {
        return Err(anyhow!("Failed to delete {} (error {rc:#x})", path.display()));
    }
    if op.fAnyOperationsAborted.as_bool() {
        return Err(anyhow!("Deleting {} was cancelled", path.display()));
    }
    Ok(())
}

fn show_command(show: ShowMode) -> SHOW_WINDOW_CMD {
    match show {
        ShowMode::Normal => SW_SHOWNORMAL,
        ShowMode::Minimized => SW_SHOWMINNOACTIVE,
        ShowMode::Maximized => SW_SHOWMAXIMIZED,
    }
}

fn mode_of(cmd: SHOW_WINDOW_CMD) -> ShowMode {
    match cmd {
        SW_SHOWMINNOACTIVE | SW_SHOWMINIMIZED => ShowMode::Minimized,
        SW_SHOWMAXIMIZED => ShowMode::Maximized,
        _ => ShowMode::Normal,
    }
}

/// Read the colour bitmap of an icon as straight-alpha ARGB. Icons without
/// an alpha channel take their transparency from the mask.
unsafe fn hicon_pixels(hicon: HICON) -> Option<Icon> {
    let mut info = ICONINFO::default();
    GetIconInfo(hicon, &mut info).ok()?;
    let (color, mask) = (info.hbmColor, info.hbmMask);
    let result = read_icon_bitmaps(color, mask);
    if !color.is_invalid() {
        let _ = DeleteObject(color);
    }
    if !mask.is_invalid() {
        let _ = DeleteObject(mask);
    }
    result
}

unsafe fn read_icon_bitmaps(color: HBITMAP, mask: HBITMAP) -> Option<Icon> {
    if color.is_invalid() {
        return None;
    }
    let hdc = CreateCompatibleDC(HDC::default());
    if hdc.is_invalid() {
        return None;
    }

    let mut bmi = BITMAPINFO {
        bmiHeader: BITMAPINFOHEADER {
            biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
            biPlanes: 1,
            biBitCount: 32,
            biCompression: BI_RGB.0,
            ..Default::default()
        },
        ..Default::default()
    };
    // First call only fills in the dimensions
    GetDIBits(hdc, color, 0, 0, None, &mut bmi, DIB_RGB_COLORS);
    let width = bmi.bmiHeader.biWidth.unsigned_abs();
    let height = bmi.bmiHeader.biHeight.unsigned_abs();
    if width == 0 || width != height {
        let _ = DeleteDC(hdc);
        return None;
    }

    let read = |bmp: HBITMAP, bmi: &mut BITMAPINFO| -> Option<Vec<u8>> {
        bmi.bmiHeader.biHeight = -(height as i32); // top-down
        bmi.bmiHeader.biBitCount = 32;
        bmi.bmiHeader.biCompression = BI_RGB.0;
        bmi.bmiHeader.biSizeImage = width * height * 4;
        let mut buf = vec![0u8; (width * height * 4) as usize];
        let lines = GetDIBits(hdc, bmp, 0, height, Some(buf.as_mut_ptr().cast()), bmi, DIB_RGB_COLORS);
        (lines > 0).then_some(buf)
    };

    let bgra = read(color, &mut bmi);
    let mask_bits = if mask.is_invalid() { None } else { read(mask, &mut bmi) };
    let _ = DeleteDC(hdc);
    let mut bgra = bgra?;

    let has_alpha = bgra.chunks_exact(4).any(|px| px[3] != 0);
    if !has_alpha {
        for (i, px) in bgra.chunks_exact_mut(4).enumerate() {
            // Black in the mask is opaque
            let opaque = mask_bits.as_ref().map_or(true, |m| m[i * 4] == 0);
            px[3] = if opaque { 255 } else { 0 };
        }
    }

    // BGRA bytes to RGBA for the shared converter
    for px in bgra.chunks_exact_mut(4) {
        px.swap(0, 2);
    }
    Icon::from_argb(width, rgba_to_argb(&bgra))
}
