//! Command line: `[KEY=value ...] [directory | config file]`.

use crate::settings::Settings;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Invocation {
    pub settings: Settings,
    /// At least one setting was given. Such runs leave the preference
    /// store alone.
    pub settings_given: bool,
    /// Directory or configuration file to show. `None` means Quick Launch.
    pub target: Option<PathBuf>,
}

impl Invocation {
    /// Leading words that parse as settings are settings, everything after
    /// the first word that does not is the target. Unquoted paths with
    /// spaces arrive split, so the remainder is joined back with spaces.
    pub fn parse<I, S>(args: I) -> Invocation
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut invocation = Invocation::default();
        let mut rest = Vec::new();
        for arg in args {
            let arg = arg.as_ref();
            if rest.is_empty() && invocation.settings.apply(arg) {
                invocation.settings_given = true;
            } else {
                rest.push(arg.to_string());
            }
        }

        let target = rest.join(" ");
        let target = target.trim().trim_matches('"').trim();
        if !target.is_empty() {
            invocation.target = Some(PathBuf::from(target));
        }
        invocation
    }

    pub fn from_env() -> Invocation {
        Self::parse(std::env::args().skip(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{AutoHide, Edge};

    #[test]
    fn test_no_arguments() {
        let inv = Invocation::parse(Vec::<String>::new());
        assert_eq!(inv, Invocation::default());
        assert!(inv.target.is_none());
    }

    #[test]
    fn test_settings_then_directory() {
        let inv = Invocation::parse(["POSITION=2", "AUTOHIDE=1", "C:\\Tools"]);
        assert!(inv.settings_given);
        assert_eq!(inv.settings.edge, Edge::Top);
        assert_eq!(inv.settings.auto_hide, AutoHide::OnHover);
        assert_eq!(inv.target, Some(PathBuf::from("C:\\Tools")));
    }

    #[test]
    fn test_split_path_is_rejoined_and_unquoted() {
        let inv = Invocation::parse(["\"C:\\My", "Tools\""]);
        assert!(!inv.settings_given);
        assert_eq!(inv.target, Some(PathBuf::from("C:\\My Tools")));
    }

    #[test]
    fn test_setting_after_target_is_part_of_target() {
        let inv = Invocation::parse(["bar.txt", "LARGE=1"]);
        assert!(!inv.settings.large_icons);
        assert_eq!(inv.target, Some(PathBuf::from("bar.txt LARGE=1")));
    }

    #[test]
    fn test_settings_only() {
        let inv = Invocation::parse(["LARGE=1"]);
        assert!(inv.settings_given);
        assert!(inv.settings.large_icons);
        assert!(inv.target.is_none());
    }
}
