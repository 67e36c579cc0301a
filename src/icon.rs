//! Owned icon bitmaps.
//!
//! Icons are kept as straight-alpha ARGB pixels (`0xAARRGGBB`), the format
//! the bar renderer blends. Shell handles are converted on extraction and
//! released immediately, so dropping an [`Icon`] is all the cleanup needed.

use anyhow::{Context, Result};
use std::io::{BufReader, Seek, SeekFrom};
use std::path::Path;

/// Icon edge length of small (bar and menu) icons.
pub const SMALL_ICON_SIZE: u32 = 16;
/// Icon edge length of large icons.
pub const LARGE_ICON_SIZE: u32 = 32;

#[derive(Clone, PartialEq, Eq)]
pub struct Icon {
    size: u32,
    pixels: Vec<u32>,
}

impl std::fmt::Debug for Icon {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Icon").field("size", &self.size).finish()
    }
}

impl Icon {
    /// Wrap a square ARGB buffer. Returns `None` when the buffer does not
    /// match `size * size`.
    pub fn from_argb(size: u32, pixels: Vec<u32>) -> Option<Self> {
        (size > 0 && pixels.len() == (size * size) as usize).then_some(Self { size, pixels })
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Nearest-size copy used when an icon must be shown at a size it was
    /// not extracted at.
    pub fn resized(&self, size: u32) -> Icon {
        if size == self.size || size == 0 {
            return self.clone();
        }
        let img = image::RgbaImage::from_fn(self.size, self.size, |x, y| {
            let p = self.pixels[(y * self.size + x) as usize];
            image::Rgba([(p >> 16) as u8, (p >> 8) as u8, p as u8, (p >> 24) as u8])
        });
        let filter = if size < self.size {
            image::imageops::FilterType::Lanczos3
        } else {
            image::imageops::FilterType::CatmullRom
        };
        let scaled = image::imageops::resize(&img, size, size, filter);
        Icon { size, pixels: rgba_to_argb(scaled.as_raw()) }
    }

    /// Drawn replacement for files whose icon cannot be extracted.
    pub fn fallback_file(size: u32) -> Icon {
        let mut pixels = vec![0u32; (size * size) as usize];
        let margin = size / 6;
        let fold = size / 4;
        for y in 0..size {
            for x in 0..size {
                let inside = x >= margin + 1 && x < size - margin && y >= 1 && y < size - 1;
                if !inside {
                    continue;
                }
                let edge = x == margin + 1 || x == size - margin - 1 || y == 1 || y == size - 2;
                // Dog-ear in the top right corner
                let corner_x = size - margin - fold;
                if x >= corner_x && y < 1 + fold && (x - corner_x) > (y - 1) {
                    continue;
                }
                pixels[(y * size + x) as usize] = if edge { 0xFF6B6B6B } else { 0xFFF4F4F4 };
            }
        }
        Icon { size, pixels }
    }

    /// Drawn replacement folder icon.
    pub fn fallback_folder(size: u32) -> Icon {
        let mut pixels = vec![0u32; (size * size) as usize];
        let top = size / 4;
        let tab_w = size * 2 / 5;
        for y in 1..size - 1 {
            for x in 0..size {
                let body = y >= top && y < size - 2;
                let tab = y >= top.saturating_sub(size / 8) && y < top && x < tab_w;
                if !(body || tab) {
                    continue;
                }
                let edge = x == 0 || x == size - 1 || y == size - 3;
                pixels[(y * size + x) as usize] = if edge { 0xFFB08A2E } else { 0xFFF2C94C };
            }
        }
        Icon { size, pixels }
    }
}

/// Large and small variants of the same icon.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IconPair {
    pub large: Option<Icon>,
    pub small: Option<Icon>,
}

impl IconPair {
    pub fn is_empty(&self) -> bool {
        self.large.is_none() && self.small.is_none()
    }

    /// Icon to show at `size`, scaling the other variant or drawing a
    /// fallback when necessary.
    pub fn pick(&self, size: u32, is_dir: bool) -> Icon {
        let exact = [&self.small, &self.large]
            .into_iter()
            .flatten()
            .find(|icon| icon.size() == size);
        if let Some(icon) = exact {
            return icon.clone();
        }
        match self.large.as_ref().or(self.small.as_ref()) {
            Some(icon) => icon.resized(size),
            None if is_dir => Icon::fallback_folder(size),
            None => Icon::fallback_file(size),
        }
    }

    /// Fill in missing variants with drawn fallbacks.
    pub fn or_fallback(mut self, is_dir: bool) -> IconPair {
        if self.large.is_none() {
            self.large = Some(self.pick(LARGE_ICON_SIZE, is_dir));
        }
        if self.small.is_none() {
            self.small = Some(self.pick(SMALL_ICON_SIZE, is_dir));
        }
        self
    }
}

/// Load both icon sizes from an `.ico` or `.png` file. For `.ico` files
/// `index` selects the image entry, largest first.
pub fn load_icon_file(path: &Path, index: usize) -> Result<IconPair> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open icon: {}", path.display()))?;

    let img = if ext == "ico" {
        let mut reader = BufReader::new(file);
        match decode_ico_entry(&mut reader, index) {
            Some(img) => img,
            None => {
                reader.seek(SeekFrom::Start(0))?;
                image::load(reader, image::ImageFormat::Ico)
                    .with_context(|| format!("Failed to decode icon: {}", path.display()))?
                    .to_rgba8()
            }
        }
    } else {
        image::open(path)
            .with_context(|| format!("Failed to load icon: {}", path.display()))?
            .to_rgba8()
    };

    let scale = |size: u32| {
        let scaled = image::imageops::resize(&img, size, size, image::imageops::FilterType::Lanczos3);
        Icon { size, pixels: rgba_to_argb(scaled.as_raw()) }
    };
    Ok(IconPair {
        large: Some(scale(LARGE_ICON_SIZE)),
        small: Some(scale(SMALL_ICON_SIZE)),
    })
}

fn decode_ico_entry<R: std::io::Read + Seek>(reader: &mut R, index: usize) -> Option<image::RgbaImage> {
    let dir = ico::IconDir::read(reader).ok()?;
    let mut entries: Vec<_> = dir.entries().iter().collect();
    entries.sort_by_key(|e| std::cmp::Reverse(e.width() * e.height()));
    let entry = entries.get(index).or_else(|| entries.first())?;
    let decoded = entry.decode().ok()?;
    image::RgbaImage::from_raw(decoded.width(), decoded.height(), decoded.rgba_data().to_vec())
}

/// Convert tightly packed RGBA bytes to ARGB words.
pub fn rgba_to_argb(rgba: &[u8]) -> Vec<u32> {
    rgba.chunks_exact(4)
        .map(|c| {
            let (r, g, b, a) = (c[0] as u32, c[1] as u32, c[2] as u32, c[3] as u32);
            (a << 24) | (r << 16) | (g << 8) | b
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_from_argb_rejects_wrong_length() {
        assert!(Icon::from_argb(4, vec![0; 15]).is_none());
        assert!(Icon::from_argb(4, vec![0; 16]).is_some());
        assert!(Icon::from_argb(0, Vec::new()).is_none());
    }

    #[test]
    fn test_pick_prefers_exact_size() {
        let small = Icon::from_argb(16, vec![0xFF00FF00; 256]).unwrap();
        let large = Icon::from_argb(32, vec![0xFFFF0000; 1024]).unwrap();
        let pair = IconPair { large: Some(large.clone()), small: Some(small.clone()) };
        assert_eq!(pair.pick(16, false), small);
        assert_eq!(pair.pick(32, false), large);
    }

    #[test]
    fn test_pick_scales_or_falls_back() {
        let large = Icon::from_argb(32, vec![0xFFFF0000; 1024]).unwrap();
        let pair = IconPair { large: Some(large), small: None };
        assert_eq!(pair.pick(16, false).size(), 16);

        let empty = IconPair::default();
        assert_eq!(empty.pick(16, true), Icon::fallback_folder(16));
        assert_eq!(empty.pick(32, false), Icon::fallback_file(32));
    }

    #[test]
    fn test_or_fallback_fills_both_sizes() {
        let pair = IconPair::default().or_fallback(false);
        assert_eq!(pair.small.as_ref().map(Icon::size), Some(SMALL_ICON_SIZE));
        assert_eq!(pair.large.as_ref().map(Icon::size), Some(LARGE_ICON_SIZE));
    }

    #[test]
    fn test_load_png_icon() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.png");
        let img = image::RgbaImage::from_pixel(48, 48, image::Rgba([10, 20, 30, 255]));
        img.save(&path).unwrap();

        let pair = load_icon_file(&path, 0).unwrap();
        let small = pair.small.unwrap();
        assert_eq!(small.size(), SMALL_ICON_SIZE);
        assert_eq!(small.pixels()[0], 0xFF0A141E);
    }

    #[test]
    fn test_load_missing_icon_fails() {
        let dir = TempDir::new().unwrap();
        assert!(load_icon_file(&dir.path().join("none.ico"), 0).is_err());
    }
}
