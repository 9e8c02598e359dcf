//! CLI smoke entry point.
//!
//! Opens a state under the given data directory (default: a fresh temp
//! directory), stores one brief, reads it back and prints the result.
//! Set `POSTFORGE_LOG_DIR` (absolute) to also write rolling log files.

use postforge_core::{StorageConfig, UniversalState};
use serde_json::json;
use std::process::ExitCode;

fn main() -> ExitCode {
    println!("postforge_core ping={}", postforge_core::ping());
    println!("postforge_core version={}", postforge_core::core_version());

    if let Ok(log_dir) = std::env::var("POSTFORGE_LOG_DIR") {
        let level = std::env::var("POSTFORGE_LOG_LEVEL")
            .unwrap_or_else(|_| postforge_core::default_log_level().to_string());
        if let Err(err) = postforge_core::init_logging(&level, &log_dir) {
            eprintln!("postforge_core logging disabled: {err}");
        }
    }

    let data_dir = std::env::args()
        .nth(1)
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("postforge-smoke"));

    match round_trip(&StorageConfig::under(&data_dir)) {
        Ok(value) => {
            println!("postforge_core round_trip={value}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("postforge_core round_trip failed: {err}");
            ExitCode::FAILURE
        }
    }
}

fn round_trip(config: &StorageConfig) -> postforge_core::StorageResult<serde_json::Value> {
    let mut state = UniversalState::open(config)?;
    state.start_run("smoke");
    state.store(
        "brief",
        "smoke_brief",
        json!({"platform": "linkedin", "tone": "professional"}),
        None,
    )?;
    state.clear_context();
    let loaded = state.retrieve("brief", "smoke_brief")?;
    Ok(loaded.map(|value| value.to_json()).unwrap_or_default())
}
