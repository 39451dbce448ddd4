#![allow(dead_code)]

use anyhow::Result;
use std::path::PathBuf;

pub fn locate_proxy_bin() -> Result<PathBuf> {
    locate("spillway-mcp", option_env!("CARGO_BIN_EXE_spillway-mcp"))
}

pub fn locate_mock_bin() -> Result<PathBuf> {
    locate(
        "spillway-mock-target",
        option_env!("CARGO_BIN_EXE_spillway-mock-target"),
    )
}

fn locate(name: &str, compile_time: Option<&'static str>) -> Result<PathBuf> {
    if let Some(path) = compile_time {
        return Ok(PathBuf::from(path));
    }

    // Cargo does not always expose CARGO_BIN_EXE_* to the test build.
    // Derive it from the test executable location:
    // `.../target/{debug|release}/deps/<test>` -> `.../target/{debug|release}/<name>`
    if let Ok(exe) = std::env::current_exe() {
        if let Some(target_profile_dir) = exe.parent().and_then(|p| p.parent()) {
            let candidate = target_profile_dir.join(name);
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }

    anyhow::bail!("failed to locate {name} binary; build with: cargo build -p spillway-mcp")
}

pub fn tool_args(value: serde_json::Value) -> Option<rmcp::model::JsonObject> {
    value.as_object().cloned()
}
