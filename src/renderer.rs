//! Software rendering of the bar into a softbuffer frame.

use launchbar::icon::Icon;
use launchbar::layout::{Layout, Rect, EDGE_OFFSET, END_OFFSET};
use launchbar::{Edge, LaunchBar, LaunchEntry};
use windows::Win32::Graphics::Gdi::{
    GetSysColor, COLOR_3DDKSHADOW, COLOR_3DFACE, COLOR_3DHIGHLIGHT, COLOR_3DSHADOW, COLOR_HIGHLIGHT,
};

/// What the pointer is doing, as far as painting is concerned.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointerState {
    pub hovered: Option<usize>,
    pub pressed: Option<usize>,
    /// Insertion index while a button is being dragged.
    pub drop_at: Option<usize>,
}

pub struct Renderer {
    face: u32,
    light: u32,
    shadow: u32,
    dark: u32,
    accent: u32,
}

/// System colours come back as `0x00BBGGRR`.
fn sys_color(index: windows::Win32::Graphics::Gdi::SYS_COLOR_INDEX) -> u32 {
    let bgr = unsafe { GetSysColor(index) };
    let (r, g, b) = (bgr & 0xFF, (bgr >> 8) & 0xFF, (bgr >> 16) & 0xFF);
    0xFF000000 | (r << 16) | (g << 8) | b
}

impl Renderer {
    pub fn new() -> Self {
        Self {
            face: sys_color(COLOR_3DFACE),
            light: sys_color(COLOR_3DHIGHLIGHT),
            shadow: sys_color(COLOR_3DSHADOW),
            dark: sys_color(COLOR_3DDKSHADOW),
            accent: sys_color(COLOR_HIGHLIGHT),
        }
    }

    /// Paint the whole window. `width`/`height` are the buffer dimensions,
    /// which lag behind the layout for one frame after a resize.
    pub fn render(&self, buffer: &mut [u32], width: usize, height: usize, bar: &LaunchBar, pointer: PointerState) {
        buffer.fill(self.face);
        let frame = Rect::new(0, 0, width as i32, height as i32);
        self.draw_edge(buffer, width, frame, true);
        if bar.is_hidden() {
            return;
        }

        let layout = bar.layout();
        self.draw_grips(buffer, width, layout, frame);

        for (i, (entry, rect)) in bar.entries().zip(&layout.buttons).enumerate() {
            let pressed = pointer.pressed == Some(i) && pointer.hovered == Some(i);
            if pressed {
                self.draw_edge(buffer, width, *rect, false);
            } else if pointer.hovered == Some(i) && pointer.drop_at.is_none() {
                self.draw_edge(buffer, width, *rect, true);
            }
            self.draw_entry(buffer, width, layout, entry, *rect, pressed);
        }

        if let Some(index) = pointer.drop_at {
            self.draw_drop_indicator(buffer, width, layout, index);
        }
    }

    fn draw_entry(&self, buffer: &mut [u32], width: usize, layout: &Layout, entry: &LaunchEntry, rect: Rect, pressed: bool) {
        let size = layout.icon_size;
        let inset = (layout.button_size - size as i32) / 2 + pressed as i32;
        let (x, y) = (rect.x + inset, rect.y + inset);
        match icon_for(entry, size) {
            Some(icon) => draw_icon_bilinear(buffer, width, icon.pixels(), icon.size(), x, y, size),
            None => self.draw_placeholder(buffer, width, x, y, size),
        }
        if entry.has_menu() {
            self.draw_menu_marker(buffer, width, rect);
        }
    }

    /// One-pixel 3D frame: raised puts the light colour top and left.
    fn draw_edge(&self, buffer: &mut [u32], width: usize, r: Rect, raised: bool) {
        let (tl, br) = if raised { (self.light, self.shadow) } else { (self.shadow, self.light) };
        fill(buffer, width, Rect::new(r.x, r.y, r.width, 1), tl);
        fill(buffer, width, Rect::new(r.x, r.y, 1, r.height), tl);
        fill(buffer, width, Rect::new(r.x, r.bottom() - 1, r.width, 1), br);
        fill(buffer, width, Rect::new(r.right() - 1, r.y, 1, r.height), br);
    }

    /// Etched grip lines in the empty stretch at each end of the bar.
    fn draw_grips(&self, buffer: &mut [u32], width: usize, layout: &Layout, frame: Rect) {
        let across = EDGE_OFFSET + 2;
        let along = EDGE_OFFSET + END_OFFSET / 2 - 1;
        let vertical = layout.edge.is_vertical();
        for start in [along, if vertical { frame.height } else { frame.width } - along - 2] {
            let (light, dark) = if vertical {
                (
                    Rect::new(across, start, frame.width - 2 * across, 1),
                    Rect::new(across, start + 1, frame.width - 2 * across, 1),
                )
            } else {
                (
                    Rect::new(start, across, 1, frame.height - 2 * across),
                    Rect::new(start + 1, across, 1, frame.height - 2 * across),
                )
            };
            fill(buffer, width, dark, self.shadow);
            fill(buffer, width, light, self.light);
        }
    }

    /// Small triangle in the bottom right corner of folder buttons.
    fn draw_menu_marker(&self, buffer: &mut [u32], width: usize, rect: Rect) {
        for row in 0..3 {
            let y = rect.bottom() - 3 + row;
            let len = row + 1;
            fill(buffer, width, Rect::new(rect.right() - 2 - len, y - 1, len, 1), self.dark);
        }
    }

    fn draw_drop_indicator(&self, buffer: &mut [u32], width: usize, layout: &Layout, index: usize) {
        let line = 2;
        let (x, y) = layout.first;
        let offset = index as i32 * layout.pitch - line / 2 - 1;
        let r = match layout.edge {
            Edge::Left | Edge::Right => Rect::new(x, y + offset, layout.button_size, line),
            Edge::Top | Edge::Bottom => Rect::new(x + offset, y, line, layout.button_size),
        };
        fill(buffer, width, r, self.accent);
    }

    fn draw_placeholder(&self, buffer: &mut [u32], width: usize, x: i32, y: i32, size: u32) {
        let color = (self.shadow & 0x00FFFFFF) | 0x80000000;
        let radius = (size / 6) as i32;
        let sz = size as i32;
        for iy in 0..sz {
            for ix in 0..sz {
                let dx = if ix < radius { radius - ix } else if ix >= sz - radius { ix - (sz - radius - 1) } else { 0 };
                let dy = if iy < radius { radius - iy } else if iy >= sz - radius { iy - (sz - radius - 1) } else { 0 };
                if dx * dx + dy * dy <= radius * radius {
                    blend_at(buffer, width, x + ix, y + iy, color);
                }
            }
        }
    }
}

/// The stored icon closest to `size`; scaling happens while drawing.
fn icon_for(entry: &LaunchEntry, size: u32) -> Option<&Icon> {
    let icons = &entry.icons;
    let (preferred, other) = if size > icons.small.as_ref().map_or(0, Icon::size) {
        (&icons.large, &icons.small)
    } else {
        (&icons.small, &icons.large)
    };
    preferred.as_ref().or(other.as_ref())
}

fn fill(buffer: &mut [u32], width: usize, r: Rect, color: u32) {
    let height = (buffer.len() / width.max(1)) as i32;
    let x0 = r.x.clamp(0, width as i32);
    let x1 = r.right().clamp(0, width as i32);
    if x1 <= x0 {
        return;
    }
    for y in r.y.max(0)..r.bottom().min(height) {
        let row = y as usize * width;
        buffer[row + x0 as usize..row + x1 as usize].fill(color);
    }
}

fn blend_at(buffer: &mut [u32], width: usize, x: i32, y: i32, color: u32) {
    if x < 0 || y < 0 || x as usize >= width {
        return;
    }
    let idx = y as usize * width + x as usize;
    if let Some(px) = buffer.get_mut(idx) {
        *px = alpha_blend(*px, color);
    }
}

fn draw_icon_bilinear(buffer: &mut [u32], buf_width: usize, pixels: &[u32], src_size: u32, x: i32, y: i32, dst_size: u32) {
    let scale = src_size as f32 / dst_size as f32;
    let src_w = src_size as usize;

    for iy in 0..dst_size {
        for ix in 0..dst_size {
            let pixel = if src_size == dst_size {
                pixels[(iy * src_size + ix) as usize]
            } else {
                let src_xf = ix as f32 * scale;
                let src_yf = iy as f32 * scale;
                let x0 = src_xf as usize;
                let y0 = src_yf as usize;
                let x1 = (x0 + 1).min(src_w - 1);
                let y1 = (y0 + 1).min(src_w - 1);
                let fx = src_xf - x0 as f32;
                let fy = src_yf - y0 as f32;

                let p00 = pixels.get(y0 * src_w + x0).copied().unwrap_or(0);
                let p10 = pixels.get(y0 * src_w + x1).copied().unwrap_or(0);
                let p01 = pixels.get(y1 * src_w + x0).copied().unwrap_or(0);
                let p11 = pixels.get(y1 * src_w + x1).copied().unwrap_or(0);
                bilinear_blend(p00, p10, p01, p11, fx, fy)
            };
            if pixel >> 24 != 0 {
                blend_at(buffer, buf_width, x + ix as i32, y + iy as i32, pixel);
            }
        }
    }
}

fn bilinear_blend(p00: u32, p10: u32, p01: u32, p11: u32, fx: f32, fy: f32) -> u32 {
    let blend_channel = |shift: u32| -> u32 {
        let c00 = ((p00 >> shift) & 0xFF) as f32;
        let c10 = ((p10 >> shift) & 0xFF) as f32;
        let c01 = ((p01 >> shift) & 0xFF) as f32;
        let c11 = ((p11 >> shift) & 0xFF) as f32;

        let top = c00 + (c10 - c00) * fx;
        let bot = c01 + (c11 - c01) * fx;
        (top + (bot - top) * fy) as u32
    };

    (blend_channel(24) << 24) | (blend_channel(16) << 16) | (blend_channel(8) << 8) | blend_channel(0)
}

fn alpha_blend(dst: u32, src: u32) -> u32 {
    let sa = (src >> 24) & 0xFF;
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return src;
    }

    let da = (dst >> 24) & 0xFF;
    let sr = (src >> 16) & 0xFF;
    let sg = (src >> 8) & 0xFF;
    let sb = src & 0xFF;
    let dr = (dst >> 16) & 0xFF;
    let dg = (dst >> 8) & 0xFF;
    let db = dst & 0xFF;

    let out_a = sa + da * (255 - sa) / 255;
    if out_a == 0 {
        return 0;
    }

    let out_r = (sr * sa + dr * da * (255 - sa) / 255) / out_a;
    let out_g = (sg * sa + dg * da * (255 - sa) / 255) / out_a;
    let out_b = (sb * sa + db * da * (255 - sa) / 255) / out_a;

    (out_a << 24) | (out_r << 16) | (out_g << 8) | out_b
}
