//! Tests for environment variable expansion.

use trellis_core::expand_env_vars;

#[test]
fn expands_known_and_drops_unknown() {
    let out = expand_env_vars("key = \"${PATH}\" other = \"${TRELLIS_SURELY_UNSET_VAR}\"");
    let path = std::env::var("PATH").unwrap_or_default();
    assert_eq!(out, format!("key = \"{path}\" other = \"\""));
}

#[test]
fn leaves_plain_dollars() {
    assert_eq!(expand_env_vars("cost $5 {x}"), "cost $5 {x}");
}
