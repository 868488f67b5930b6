//! Process-wide identity marker stamped on root-level mounted nodes.

use std::env;
use std::sync::OnceLock;

use crate::collections::hash_one;

static TEST_ID: OnceLock<String> = OnceLock::new();

/// Environment variable consulted the first time the marker is read.
pub const TEST_ID_ENV: &str = "ABTEST_TEST_ID";

/// Returns the marker shared by every mount in this process.
///
/// Resolved once: an explicit [`set_test_id`], else `ABTEST_TEST_ID`, else a
/// short hash of the process id.
pub fn get_test_id() -> &'static str {
    TEST_ID.get_or_init(|| {
        env::var(TEST_ID_ENV)
            .ok()
            .filter(|value| !value.is_empty())
            .unwrap_or_else(derived_test_id)
    })
}

/// Fixes the marker before first use. Returns `false` once it is already set.
pub fn set_test_id(id: impl Into<String>) -> bool {
    TEST_ID.set(id.into()).is_ok()
}

fn derived_test_id() -> String {
    format!("{:08x}", hash_one(&std::process::id()) as u32)
}
