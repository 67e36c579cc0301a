//! Layout and behaviour settings shared by the preference store, the
//! configuration file and the command line.

use serde::{Deserialize, Serialize};

/// Screen edge the bar is docked to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Edge {
    Left,
    Top,
    Right,
    Bottom,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Left, Edge::Top, Edge::Right, Edge::Bottom];

    /// Map the persisted 1-based location number, clamping out-of-range
    /// values into 1..=4.
    pub fn from_index(index: i64) -> Edge {
        match index.clamp(1, 4) {
            1 => Edge::Left,
            2 => Edge::Top,
            3 => Edge::Right,
            _ => Edge::Bottom,
        }
    }

    pub fn index(self) -> i64 {
        match self {
            Edge::Left => 1,
            Edge::Top => 2,
            Edge::Right => 3,
            Edge::Bottom => 4,
        }
    }

    /// Buttons run top to bottom on the left and right edges.
    pub fn is_vertical(self) -> bool {
        matches!(self, Edge::Left | Edge::Right)
    }
}

/// When a collapsed bar comes back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AutoHide {
    Off,
    /// Re-show as soon as the pointer touches the collapsed strip.
    OnHover,
    /// Re-show only when the collapsed strip is clicked.
    OnClick,
}

impl AutoHide {
    pub fn from_index(index: i64) -> AutoHide {
        match index {
            i if i <= 0 => AutoHide::Off,
            1 => AutoHide::OnHover,
            _ => AutoHide::OnClick,
        }
    }

    pub fn index(self) -> i64 {
        match self {
            AutoHide::Off => 0,
            AutoHide::OnHover => 1,
            AutoHide::OnClick => 2,
        }
    }

    pub fn enabled(self) -> bool {
        self != AutoHide::Off
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub edge: Edge,
    pub large_icons: bool,
    pub large_menus: bool,
    pub on_top: bool,
    pub auto_hide: AutoHide,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            edge: Edge::Right,
            large_icons: false,
            large_menus: false,
            on_top: false,
            auto_hide: AutoHide::Off,
        }
    }
}

impl Settings {
    /// Apply a `KEY=value` token such as `POSITION=2`. Returns false, leaving
    /// the settings untouched, when the token is not a recognised setting
    /// with an integer value.
    pub fn apply(&mut self, token: &str) -> bool {
        let Some((key, value)) = token.trim().split_once('=') else {
            return false;
        };
        let Some(value) = leading_int(value) else {
            return false;
        };
        match key {
            "POSITION" => self.edge = Edge::from_index(value),
            "LARGE" => self.large_icons = value != 0,
            "LARGEMENUS" => self.large_menus = value != 0,
            "ONTOP" => self.on_top = value != 0,
            "AUTOHIDE" => self.auto_hide = AutoHide::from_index(value),
            _ => return false,
        }
        true
    }
}

/// Integer prefix of `s`, accepting an optional sign, like `%d` scanning.
fn leading_int(s: &str) -> Option<i64> {
    let s = s.trim_start();
    let digits_start = usize::from(s.starts_with(['-', '+']));
    let end = s[digits_start..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(s.len(), |i| i + digits_start);
    if end == digits_start {
        return None;
    }
    s[..end].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edge_index_is_clamped() {
        assert_eq!(Edge::from_index(0), Edge::Left);
        assert_eq!(Edge::from_index(-7), Edge::Left);
        assert_eq!(Edge::from_index(2), Edge::Top);
        assert_eq!(Edge::from_index(9), Edge::Bottom);
        for edge in Edge::ALL {
            assert_eq!(Edge::from_index(edge.index()), edge);
        }
    }

    #[test]
    fn test_apply_recognised_settings() {
        let mut s = Settings::default();
        assert!(s.apply("POSITION=4"));
        assert!(s.apply("LARGE=1"));
        assert!(s.apply("LARGEMENUS=1"));
        assert!(s.apply("ONTOP=1"));
        assert!(s.apply("AUTOHIDE=2"));
        assert_eq!(
            s,
            Settings {
                edge: Edge::Bottom,
                large_icons: true,
                large_menus: true,
                on_top: true,
                auto_hide: AutoHide::OnClick,
            }
        );
    }

    #[test]
    fn test_apply_rejects_other_tokens() {
        let mut s = Settings::default();
        assert!(!s.apply("C:\\Tools"));
        assert!(!s.apply("POSITION=left"));
        assert!(!s.apply("WIDTH=3"));
        assert!(!s.apply("position=1"));
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn test_apply_accepts_trailing_text_after_number() {
        let mut s = Settings::default();
        assert!(s.apply("POSITION=1 "));
        assert_eq!(s.edge, Edge::Left);
        assert!(s.apply("AUTOHIDE=1x"));
        assert_eq!(s.auto_hide, AutoHide::OnHover);
    }
}
