pub mod api;
pub mod config;

use api::GitlabClient;
use config::{ConfigError, ConfigFile, GitlabConfig};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tauri::{
    image::Image,
    menu::{MenuBuilder, MenuItemBuilder},
    tray::TrayIconBuilder,
    AppHandle, Emitter, Manager, WebviewUrl, WebviewWindowBuilder,
};
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};
use tauri_plugin_opener::OpenerExt;

const POLL_INTERVAL_SECS: u64 = 60;
const TRAY_ID: &str = "main-tray";
const SETTINGS_WINDOW: &str = "settings";

pub struct AppState {
    pub config: Mutex<GitlabConfig>,
    pub poll_in_flight: Arc<AtomicBool>,
    pub quitting: Arc<AtomicBool>,
}

#[tauri::command]
fn get_config(state: tauri::State<'_, AppState>) -> GitlabConfig {
    state.config.lock().unwrap().clone()
}

#[tauri::command]
fn save_config(app: AppHandle, token: String, url: String) {
    apply_settings(&app, token, url);
}

#[tauri::command]
fn refresh_now(app: AppHandle) {
    tauri::async_runtime::spawn(async move {
        poll_tasks(&app).await;
    });
}

#[tauri::command]
fn hide_settings(app: AppHandle) {
    if let Some(window) = app.get_webview_window(SETTINGS_WINDOW) {
        let _ = window.hide();
    }
}

fn error_dialog(app: &AppHandle, title: &str, message: &str) {
    app.dialog()
        .message(message)
        .title(title)
        .kind(MessageDialogKind::Error)
        .show(|_| {});
}

fn error_dialog_blocking(app: &AppHandle, title: &str, message: &str) {
    app.dialog()
        .message(message)
        .title(title)
        .kind(MessageDialogKind::Error)
        .blocking_show();
}

/// Config i/o beyond missing/invalid content means the app cannot run at all.
fn fatal_config_error(app: &AppHandle, err: ConfigError) -> ! {
    log::error!("unrecoverable config failure: {err}");
    error_dialog_blocking(
        app,
        "Error",
        "Failed to load config file. Please check file permissions.",
    );
    std::process::exit(1);
}

fn reset_config(app: &AppHandle, path: &Path) -> ConfigFile {
    match config::write_default(path) {
        Ok(file) => file,
        Err(err) => fatal_config_error(app, err),
    }
}

/// Loads the config file, creating a default one when it is missing or
/// unreadable as JSON. Returns the config plus whether the settings window
/// needs to be shown.
fn load_or_reset_config(app: &AppHandle) -> (ConfigFile, bool) {
    let path = match config::default_path() {
        Ok(path) => path,
        Err(err) => fatal_config_error(app, err),
    };

    match config::load(&path) {
        Ok(file) => {
            let needs_setup = !file.gitlab.is_configured();
            (file, needs_setup)
        }
        Err(ConfigError::NotFound) => {
            log::info!("no config file yet, creating default at {}", path.display());
            (reset_config(app, &path), true)
        }
        Err(ConfigError::Parse(err)) => {
            log::warn!("config file is invalid, resetting: {err}");
            error_dialog_blocking(
                app,
                "Configuration Error",
                "Config file is empty or invalid. Please check and correct.",
            );
            (reset_config(app, &path), true)
        }
        Err(err @ ConfigError::Io(_)) => fatal_config_error(app, err),
    }
}

async fn poll_tasks(app: &AppHandle) {
    let state = app.state::<AppState>();

    // Snapshot credentials under the lock, drop it before the request
    let creds = state.config.lock().unwrap().credentials();
    let Some((token, url)) = creds else {
        return;
    };

    if state.poll_in_flight.swap(true, Ordering::SeqCst) {
        log::debug!("previous poll still in flight, skipping tick");
        return;
    }

    let client = GitlabClient::new(&token, &url);
    match client.fetch_assigned_count().await {
        Ok(count) => {
            log::info!("{count} open merge requests assigned");
            if let Some(tray) = app.tray_by_id(TRAY_ID) {
                let _ = tray.set_title(Some(count.to_string()));
                let _ = tray.set_tooltip(Some(format!("GitLab Tasks: {count}")));
            }
            let _ = app.emit("task-count", count);
        }
        Err(err) => {
            // Previous tray title stays; the next tick retries on schedule
            log::warn!("merge request fetch failed: {err}");
            error_dialog(
                app,
                "Task Fetch Error",
                "Failed to fetch tasks. Please check your connection and settings.",
            );
        }
    }

    state.poll_in_flight.store(false, Ordering::SeqCst);
}

fn start_polling_loop(app: &AppHandle) {
    let app_handle = app.clone();
    tauri::async_runtime::spawn(async move {
        loop {
            poll_tasks(&app_handle).await;
            tokio::time::sleep(tokio::time::Duration::from_secs(POLL_INTERVAL_SECS)).await;
        }
    });
}

fn apply_settings(app: &AppHandle, token: String, url: String) {
    let state = app.state::<AppState>();
    let snapshot = {
        let mut cfg = state.config.lock().unwrap();
        cfg.token = Some(token);
        cfg.url = Some(url);
        cfg.clone()
    };

    // A failed write keeps the in-memory config; no retry
    let saved = config::default_path()
        .and_then(|path| config::save(&path, &ConfigFile { gitlab: snapshot }));
    if let Err(err) = saved {
        log::error!("config save failed: {err}");
        error_dialog(
            app,
            "Error",
            "Failed to update config file. Please check file permissions.",
        );
    }

    if let Some(window) = app.get_webview_window(SETTINGS_WINDOW) {
        let _ = window.hide();
    }

    let app = app.clone();
    tauri::async_runtime::spawn(async move {
        poll_tasks(&app).await;
    });
}

fn show_settings(app: &AppHandle) {
    let current = app.state::<AppState>().config.lock().unwrap().clone();
    let _ = app.emit("update-config", &current);

    if let Some(window) = app.get_webview_window(SETTINGS_WINDOW) {
        let _ = window.show();
        let _ = window.set_focus();
    }
}

/// The settings window lives for the whole process: closing it hides it,
/// unless the quitting flag permits real teardown.
fn create_settings_window(app: &AppHandle, quitting: Arc<AtomicBool>) -> tauri::Result<()> {
    let window = WebviewWindowBuilder::new(app, SETTINGS_WINDOW, WebviewUrl::App("settings.html".into()))
        .title("GitLab Tasks")
        .inner_size(400.0, 250.0)
        .resizable(false)
        .center()
        .visible(false)
        .build()?;

    let handle = window.clone();
    window.on_window_event(move |event| {
        if let tauri::WindowEvent::CloseRequested { api, .. } = event {
            if !quitting.load(Ordering::SeqCst) {
                api.prevent_close();
                let _ = handle.hide();
            }
        }
    });

    Ok(())
}

fn build_tray_menu(app: &AppHandle) -> tauri::Result<tauri::menu::Menu<tauri::Wry>> {
    let configure = MenuItemBuilder::with_id("configure", "Configure").build(app)?;
    let open_gitlab = MenuItemBuilder::with_id("open_gitlab", "Open GitLab").build(app)?;
    let quit = MenuItemBuilder::with_id("quit", "Quit").build(app)?;

    MenuBuilder::new(app)
        .item(&configure)
        .item(&open_gitlab)
        .item(&quit)
        .build()
}

fn badge_rgba() -> (Vec<u8>, u32, u32) {
    // Filled circle, GitLab orange; the count next to it comes from the title
    let size = 22u32;
    let fill = (226u8, 67u8, 41u8);
    let center = size as f64 / 2.0;
    let radius = center - 2.0;

    let mut rgba = vec![0u8; (size * size * 4) as usize];
    for py in 0..size {
        for px in 0..size {
            let dx = px as f64 + 0.5 - center;
            let dy = py as f64 + 0.5 - center;
            if dx * dx + dy * dy <= radius * radius {
                let idx = ((py * size + px) * 4) as usize;
                rgba[idx] = fill.0;
                rgba[idx + 1] = fill.1;
                rgba[idx + 2] = fill.2;
                rgba[idx + 3] = 255;
            }
        }
    }

    (rgba, size, size)
}

pub fn run() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    tauri::Builder::default()
        .plugin(tauri_plugin_single_instance::init(|app, _args, _cwd| {
            show_settings(app);
        }))
        .plugin(tauri_plugin_opener::init())
        .plugin(tauri_plugin_dialog::init())
        .setup(|app| {
            let (file, needs_setup) = load_or_reset_config(app.handle());

            let quitting = Arc::new(AtomicBool::new(false));
            app.manage(AppState {
                config: Mutex::new(file.gitlab),
                poll_in_flight: Arc::new(AtomicBool::new(false)),
                quitting: quitting.clone(),
            });

            create_settings_window(app.handle(), quitting)?;

            let menu = build_tray_menu(app.handle())?;
            let (rgba, icon_w, icon_h) = badge_rgba();
            let _tray = TrayIconBuilder::with_id(TRAY_ID)
                .icon(Image::new_owned(rgba, icon_w, icon_h))
                .icon_as_template(false)
                .tooltip("GitLab Tasks")
                .show_menu_on_left_click(true)
                .menu(&menu)
                .on_menu_event(move |app, event| match event.id().as_ref() {
                    "configure" => {
                        show_settings(app);
                    }
                    "open_gitlab" => {
                        // Read the url at click time, not menu-build time
                        let url = app.state::<AppState>().config.lock().unwrap().url.clone();
                        match url {
                            Some(url) if !url.is_empty() => {
                                let _ = app.opener().open_url(&url, None::<&str>);
                            }
                            _ => log::warn!("no GitLab url configured, ignoring Open GitLab"),
                        }
                    }
                    "quit" => {
                        app.state::<AppState>()
                            .quitting
                            .store(true, Ordering::SeqCst);
                        app.exit(0);
                    }
                    _ => {}
                })
                .build(app)?;

            if needs_setup {
                show_settings(app.handle());
            }

            // The timer runs for the whole process lifetime; ticks no-op
            // while the config is incomplete
            start_polling_loop(app.handle());

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            get_config,
            save_config,
            refresh_now,
            hide_settings,
        ])
        .build(tauri::generate_context!())
        .expect("error while building tauri application")
        .run(|app_handle, event| {
            // Tray app: keep running when all windows are closed
            if let tauri::RunEvent::ExitRequested { api, code, .. } = event {
                let quitting = app_handle
                    .state::<AppState>()
                    .quitting
                    .load(Ordering::SeqCst);
                if code.is_none() && !quitting {
                    api.prevent_exit();
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn badge_buffer_matches_dimensions() {
        let (rgba, w, h) = badge_rgba();
        assert_eq!(rgba.len(), (w * h * 4) as usize);
    }

    #[test]
    fn badge_is_opaque_at_center_transparent_at_corner() {
        let (rgba, w, _) = badge_rgba();
        let center_idx = (((w / 2) * w + w / 2) * 4) as usize;
        assert_eq!(rgba[center_idx + 3], 255);
        assert_eq!(rgba[3], 0);
    }
}
