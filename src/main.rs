#![cfg_attr(windows, windows_subsystem = "windows")]

#[cfg(windows)]
mod app;
#[cfg(windows)]
mod context_menu;
#[cfg(windows)]
mod dialogs;
#[cfg(windows)]
mod renderer;
#[cfg(windows)]
mod tooltip;

#[cfg(windows)]
fn main() -> anyhow::Result<()> {
    env_logger::init();
    app::run()
}

#[cfg(not(windows))]
fn main() {
    env_logger::init();
    log::error!("{} only runs on Windows", launchbar::PROG_NAME);
    std::process::exit(1);
}
