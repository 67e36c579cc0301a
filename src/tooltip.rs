//! Tooltip popup shown beside the hovered button.

use launchbar::{Edge, Rect};
use std::cell::RefCell;
use std::sync::Once;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{COLORREF, HWND, LPARAM, LRESULT, RECT, WPARAM};
use windows::Win32::Graphics::Gdi::*;
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::UI::WindowsAndMessaging::*;

static REGISTER_CLASS: Once = Once::new();
const TOOLTIP_CLASS: &str = "LaunchBarTooltip";
/// Distance between the bar and the tooltip.
const GAP: i32 = 4;
const PADDING: i32 = 4;
const TEXT_FORMAT: DRAW_TEXT_FORMAT = DRAW_TEXT_FORMAT(DT_LEFT.0 | DT_NOPREFIX.0 | DT_EXPANDTABS.0);

thread_local! {
    static TOOLTIP_FONT: RefCell<HFONT> = const { RefCell::new(HFONT(std::ptr::null_mut())) };
}

pub struct Tooltip {
    hwnd: HWND,
    visible: bool,
    current_text: String,
    font: HFONT,
}

fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(std::iter::once(0)).collect()
}

unsafe extern "system" fn tooltip_wnd_proc(hwnd: HWND, msg: u32, wparam: WPARAM, lparam: LPARAM) -> LRESULT {
    match msg {
        WM_PAINT => {
            let mut ps = PAINTSTRUCT::default();
            let hdc = BeginPaint(hwnd, &mut ps);

            let mut rect = RECT::default();
            let _ = GetClientRect(hwnd, &mut rect);

            let bg_brush = CreateSolidBrush(COLORREF(GetSysColor(COLOR_INFOBK)));
            FillRect(hdc, &rect, bg_brush);
            let _ = DeleteObject(bg_brush);
            FrameRect(hdc, &rect, GetSysColorBrush(COLOR_WINDOWFRAME));

            let len = GetWindowTextLengthW(hwnd);
            if len > 0 {
                let mut buf = vec![0u16; (len + 1) as usize];
                let copied = GetWindowTextW(hwnd, &mut buf);
                buf.truncate(copied.max(0) as usize);

                let font = TOOLTIP_FONT.with(|f| *f.borrow());
                let old_font = SelectObject(hdc, font);
                let _ = SetBkMode(hdc, TRANSPARENT);
                let _ = SetTextColor(hdc, COLORREF(GetSysColor(COLOR_INFOTEXT)));

                let mut text_rect = rect;
                text_rect.left += PADDING;
                text_rect.top += PADDING / 2;
                text_rect.right -= PADDING;
                let _ = DrawTextW(hdc, &mut buf, &mut text_rect, TEXT_FORMAT);
                SelectObject(hdc, old_font);
            }

            let _ = EndPaint(hwnd, &ps);
            LRESULT(0)
        }
        WM_ERASEBKGND => LRESULT(1),
        _ => DefWindowProcW(hwnd, msg, wparam, lparam),
    }
}

fn register_class() {
    REGISTER_CLASS.call_once(|| unsafe {
        let class_name = wide(TOOLTIP_CLASS);
        let hinstance = GetModuleHandleW(PCWSTR::null()).unwrap_or_default();

        let wc = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            style: CS_HREDRAW | CS_VREDRAW | CS_DROPSHADOW,
            lpfnWndProc: Some(tooltip_wnd_proc),
            hInstance: hinstance.into(),
            hCursor: LoadCursorW(None, IDC_ARROW).unwrap_or_default(),
            lpszClassName: PCWSTR(class_name.as_ptr()),
            hbrBackground: HBRUSH(std::ptr::null_mut()),
            ..Default::default()
        };

        RegisterClassExW(&wc);
    });
}

/// Top left corner for a `width` x `height` tip next to `anchor`, on the
/// side of the bar facing the desktop.
fn place(anchor: Rect, edge: Edge, width: i32, height: i32) -> (i32, i32) {
    match edge {
        Edge::Left => (anchor.right() + GAP, anchor.y),
        Edge::Right => (anchor.x - width - GAP, anchor.y),
        Edge::Top => (anchor.x, anchor.bottom() + GAP),
        Edge::Bottom => (anchor.x, anchor.y - height - GAP),
    }
}

impl Tooltip {
    pub fn new() -> Option<Self> {
        register_class();

        unsafe {
            let class_name = wide(TOOLTIP_CLASS);
            let hinstance = GetModuleHandleW(PCWSTR::null()).ok()?;

            let hwnd = CreateWindowExW(
                WS_EX_TOPMOST | WS_EX_TOOLWINDOW | WS_EX_NOACTIVATE,
                PCWSTR(class_name.as_ptr()),
                PCWSTR::null(),
                WS_POPUP,
                0,
                0,
                0,
                0,
                None,
                None,
                hinstance,
                None,
            )
            .ok()?;

            let font_name = wide("Segoe UI");
            let font = CreateFontW(
                -12,
                0,
                0,
                0,
                FW_NORMAL.0 as i32,
                0,
                0,
                0,
                DEFAULT_CHARSET.0 as u32,
                OUT_DEFAULT_PRECIS.0 as u32,
                CLIP_DEFAULT_PRECIS.0 as u32,
                CLEARTYPE_QUALITY.0 as u32,
                (DEFAULT_PITCH.0 | FF_DONTCARE.0) as u32,
                PCWSTR(font_name.as_ptr()),
            );
            TOOLTIP_FONT.with(|f| *f.borrow_mut() = font);

            Some(Self {
                hwnd,
                visible: false,
                current_text: String::new(),
                font,
            })
        }
    }

    /// Show `text` next to `anchor`, a button rectangle in screen
    /// coordinates. Lines are separated by `\n`.
    pub fn show(&mut self, text: &str, anchor: Rect, edge: Edge) {
        if text.is_empty() {
            self.hide();
            return;
        }
        if self.visible && text == self.current_text {
            return;
        }
        self.current_text = text.to_string();

        unsafe {
            let text_wide = wide(text);
            let _ = SetWindowTextW(self.hwnd, PCWSTR(text_wide.as_ptr()));

            let mut measure: Vec<u16> = text.encode_utf16().collect();
            let mut bounds = RECT::default();
            let hdc = GetDC(self.hwnd);
            let old_font = SelectObject(hdc, self.font);
            let _ = DrawTextW(hdc, &mut measure, &mut bounds, TEXT_FORMAT | DT_CALCRECT);
            SelectObject(hdc, old_font);
            let _ = ReleaseDC(self.hwnd, hdc);

            let width = bounds.right - bounds.left + 2 * PADDING;
            let height = bounds.bottom - bounds.top + PADDING;
            let (x, y) = place(anchor, edge, width, height);
            let _ = SetWindowPos(self.hwnd, HWND_TOPMOST, x, y, width, height, SWP_NOACTIVATE);

            if self.visible {
                let _ = InvalidateRect(self.hwnd, None, true);
            } else {
                let _ = ShowWindow(self.hwnd, SW_SHOWNOACTIVATE);
                self.visible = true;
            }
        }
    }

    pub fn hide(&mut self) {
        if self.visible {
            unsafe {
                let _ = ShowWindow(self.hwnd, SW_HIDE);
            }
            self.visible = false;
            self.current_text.clear();
        }
    }
}

impl Drop for Tooltip {
    fn drop(&mut self) {
        unsafe {
            let _ = DeleteObject(self.font);
            let _ = DestroyWindow(self.hwnd);
        }
    }
}
