use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config;
use crate::controller::PanelController;
use crate::prefs::Prefs;
use crate::remote::{self, PanelService};
use crate::storage::{self, KeyValue};
use crate::ui;
use crate::viewport::Viewport;

pub fn run() -> Result<()> {
    let cfg = config::load(config::LoadOptions::default()).context("load config")?;
    let config_path = config::default_path();
    let display_path = friendly_path(config_path.as_ref());

    let store: Arc<dyn KeyValue> =
        Arc::new(storage::Store::open(storage::Options::default()).context("open storage")?);
    let prefs = Prefs::new(store);

    let status: String;
    let service: Arc<dyn PanelService>;

    if cfg.remote.endpoint.trim().is_empty() {
        service = Arc::new(remote::MockPanelService);
        status = "Offline mode: showing sample threads. Set remote.endpoint to go live.".into();
    } else {
        match remote::Client::new(remote::ClientConfig {
            endpoint: cfg.remote.endpoint.clone(),
            user_agent: cfg.remote.user_agent.clone(),
            timeout: Some(cfg.remote.request_timeout),
            http_client: None,
        }) {
            Ok(client) => {
                service = Arc::new(client);
                status =
                    "Browsing threads. j/k to move, Enter to open a section, q to quit.".into();
            }
            Err(err) => {
                service = Arc::new(remote::UnavailableService);
                status = format!("Could not reach the forum backend: {err}");
            }
        }
    }

    let controller = PanelController::new(
        prefs,
        service,
        Viewport::new(cfg.ui.compact_breakpoint),
    );

    let options = ui::Options {
        controller,
        categories: cfg.ui.categories.clone(),
        status_message: status,
        config_path: display_path,
    };

    let mut model = ui::Model::new(options);
    model.run()
}

fn friendly_path(path: Option<&std::path::PathBuf>) -> String {
    if let Some(path) = path {
        if let Some(home) = dirs::home_dir() {
            if let Ok(stripped) = path.strip_prefix(&home) {
                let mut display = String::from("~");
                if !stripped.as_os_str().is_empty() {
                    display.push_str(&format!("/{}", stripped.display()));
                }
                return display;
            }
        }
        path.display().to_string()
    } else {
        "~/.config/forum-tui/config.yaml".to_string()
    }
}
