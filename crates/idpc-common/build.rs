//! Build script for idpc-common.
//!
//! Records the compiler that built the crate as `IDPC_RUSTC_VERSION`, e.g.
//! `rust1.80.0`, for the runtime-version field of the plugin version line.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-env-changed=RUSTC");

    let rustc = std::env::var("RUSTC").unwrap_or_else(|_| "rustc".to_string());
    // `rustc 1.80.0 (051478957 2024-07-21)` -> `1.80.0`
    let version = Command::new(rustc)
        .arg("--version")
        .output()
        .ok()
        .filter(|out| out.status.success())
        .and_then(|out| {
            String::from_utf8_lossy(&out.stdout)
                .split_whitespace()
                .nth(1)
                .map(str::to_string)
        })
        .unwrap_or_else(|| "unknown".to_string());

    println!("cargo:rustc-env=IDPC_RUSTC_VERSION=rust{version}");
}
