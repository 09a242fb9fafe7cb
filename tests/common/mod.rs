//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Once;
use tempfile::TempDir;

static TRACING: Once = Once::new();

/// Route library logs to the test harness. Filter with `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Write `content` to `name` inside a fresh temp dir.
///
/// The returned `TempDir` must be kept alive for the file to exist.
pub fn write_config(name: &str, content: &str) -> (TempDir, PathBuf) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join(name);
    std::fs::write(&path, content).unwrap();
    (temp, path)
}

/// Set environment variables for the duration of a test.
///
/// Each test uses its own prefix, so concurrent tests never touch the same
/// variables.
pub struct EnvGuard {
    names: Vec<String>,
}

impl EnvGuard {
    pub fn set(vars: &[(&str, &str)]) -> Self {
        for (name, value) in vars {
            // SAFETY: variables are unique per test and only read through std::env.
            unsafe { std::env::set_var(name, value) };
        }
        Self {
            names: vars.iter().map(|(name, _)| name.to_string()).collect(),
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for name in &self.names {
            // SAFETY: see `EnvGuard::set`.
            unsafe { std::env::remove_var(name) };
        }
    }
}

pub const FULL_YAML: &str = r#"
environment: production
debug: true
settings:
  key1: value1
custom:
  name: test
  enabled: true
"#;
