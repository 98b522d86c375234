//! Sykli CI pipeline for greetd
//!
//! Run locally: sykli run
//! Or: cargo run --bin sykli --features sykli -- --emit | sykli run -

use sykli::{Pipeline, Template};

fn main() {
    let mut p = Pipeline::new();

    // === RESOURCES ===
    let src = p.dir(".");
    let cargo_registry = p.cache("cargo-registry");
    let cargo_git = p.cache("cargo-git");
    let target_cache = p.cache("target");

    // === TEMPLATE ===
    let rust = Template::new()
        .container("rust:1.85")
        .mount_dir(&src, "/src")
        .mount_cache(&cargo_registry, "/usr/local/cargo/registry")
        .mount_cache(&cargo_git, "/usr/local/cargo/git")
        .mount_cache(&target_cache, "/src/target")
        .workdir("/src");

    // === TASKS ===

    // Unit and endpoint tests (bind to localhost only)
    let _ = p
        .task("test")
        .from(&rust)
        .run("cargo test --all-features")
        .inputs(&["**/*.rs", "Cargo.toml", "Cargo.lock"]);

    let _ = p
        .task("lint")
        .from(&rust)
        .run("cargo clippy --all-targets --all-features -- -D warnings")
        .inputs(&["**/*.rs", "Cargo.toml", "Cargo.lock"]);

    let _ = p
        .task("fmt")
        .from(&rust)
        .run("cargo fmt -- --check")
        .inputs(&["**/*.rs"]);

    // Release binary (depends on test, lint, fmt)
    let _ = p
        .task("build")
        .from(&rust)
        .run("cargo build --release --bin greetd")
        .inputs(&["**/*.rs", "Cargo.toml", "Cargo.lock"])
        .output("binary", "target/release/greetd")
        .after(&["test", "lint", "fmt"]);

    // Smoke test: start the binary, probe it, stop it with SIGTERM
    let _ = p
        .task("smoke-test")
        .from(&rust)
        .run(
            r#"#!/bin/bash
set -e

GREETD_PORT=18080 GREETD_SHUTDOWN_TIMEOUT_SECS=2 RUST_LOG=info \
  ./target/release/greetd 2>&1 | tee /tmp/greetd-log.txt &
sleep 1
PID=$(pgrep -f target/release/greetd)

curl -fsS http://127.0.0.1:18080/readyz
curl -fsS http://127.0.0.1:18080/api/hello/ci | grep -q "Hello, ci!"

kill -TERM "$PID"
sleep 3
if grep -q "greetd shut down" /tmp/greetd-log.txt; then
  echo "smoke test passed"
else
  echo "ERROR: greetd did not shut down cleanly"
  cat /tmp/greetd-log.txt
  exit 1
fi
"#,
        )
        .input_from("build", "binary", "/src/target/release/greetd")
        .timeout(120);

    p.emit();
}
