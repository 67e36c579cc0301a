//! Modal notifications shown to the user.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
    /// The process exits after the message is acknowledged.
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "Information",
            Severity::Warning => "Warning",
            Severity::Error => "Error",
            Severity::Fatal => "Fatal error",
        };
        f.write_str(s)
    }
}

/// Log `text` and show it in a message box. Does not return for
/// [`Severity::Fatal`].
pub fn show_message(severity: Severity, text: &str) {
    match severity {
        Severity::Info => log::info!("{text}"),
        Severity::Warning => log::warn!("{text}"),
        Severity::Error | Severity::Fatal => log::error!("{text}"),
    }

    #[cfg(windows)]
    message_box(severity, text);

    if severity == Severity::Fatal {
        std::process::exit(1);
    }
}

/// Show `text` as a fatal error and exit.
pub fn fatal(text: &str) -> ! {
    show_message(Severity::Fatal, text);
    std::process::exit(1)
}

#[cfg(windows)]
fn message_box(severity: Severity, text: &str) {
    use windows::core::PCWSTR;
    use windows::Win32::Foundation::HWND;
    use windows::Win32::UI::WindowsAndMessaging::{
        MessageBoxW, MB_ICONERROR, MB_ICONINFORMATION, MB_ICONWARNING, MB_OK, MB_TOPMOST,
    };

    let icon = match severity {
        Severity::Info => MB_ICONINFORMATION,
        Severity::Warning => MB_ICONWARNING,
        Severity::Error | Severity::Fatal => MB_ICONERROR,
    };
    let title: Vec<u16> = format!("{} - {severity}", crate::PROG_NAME)
        .encode_utf16()
        .chain(std::iter::once(0))
        .collect();
    let body: Vec<u16> = text.encode_utf16().chain(std::iter::once(0)).collect();
    unsafe {
        let _ = MessageBoxW(
            HWND::default(),
            PCWSTR(body.as_ptr()),
            PCWSTR(title.as_ptr()),
            MB_OK | MB_TOPMOST | icon,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_labels() {
        assert_eq!(Severity::Warning.to_string(), "Warning");
        assert_eq!(Severity::Fatal.to_string(), "Fatal error");
    }
}
