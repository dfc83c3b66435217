use std::sync::Arc;

use papyrus_debug::{logging, DebugAdapter, DebugServerConfig, DebugSession};
use papyrus_runtime::harness::{MemoryScriptCache, TestVm};

fn main() {
    let config = match std::env::args_os().nth(1) {
        Some(path) => match DebugServerConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("papyrus-debug error: {err:#}");
                std::process::exit(2);
            }
        },
        None => DebugServerConfig::default(),
    }
    .with_env_overrides();
    logging::init(&config);

    // Without a game process the adapter serves an empty in-memory VM.
    tracing::info!(game = ?config.game, "starting papyrus-debug adapter");
    let vm = Arc::new(TestVm::new());
    let scripts = Arc::new(MemoryScriptCache::new());
    let session = DebugSession::new(vm, scripts, config.game);
    let mut adapter = DebugAdapter::with_config(session, &config);
    if let Err(err) = adapter.run_stdio() {
        eprintln!("papyrus-debug error: {err}");
        std::process::exit(1);
    }
}
