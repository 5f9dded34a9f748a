use quick_tabs::bridge::{read_inbound, Bridge, Inbound, StdioHost};
use quick_tabs::events;
use quick_tabs::logging;
use quick_tabs::persistence::JsonFileStore;
use quick_tabs::service::TabService;
use quick_tabs::settings::Settings;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

const SETTINGS_FILE: &str = "settings.json";

fn main() -> anyhow::Result<()> {
    let settings_path = std::env::args().nth(1).unwrap_or_else(|| SETTINGS_FILE.into());
    let settings = Settings::load(&settings_path)?;
    logging::init(settings.debug_logging, settings.log_file.as_ref().map(PathBuf::from));

    let out = Arc::new(Mutex::new(std::io::stdout()));
    let host = StdioHost::new(out);
    let store = JsonFileStore::new(&settings.storage_path);
    tracing::info!(path = %store.path().display(), "tab state file");
    let service = TabService::new(host.clone(), store, settings);

    let (sink, source) = events::channel::<Inbound>();
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        read_inbound(stdin.lock(), sink);
    });

    let mut bridge = Bridge::new(host, service);
    bridge.run(&source, Instant::now);
    tracing::info!("input closed, exiting");
    Ok(())
}
