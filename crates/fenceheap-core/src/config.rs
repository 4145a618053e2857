//! Environment-derived configuration, read once and cached.

use std::sync::OnceLock;

/// Whether end-of-process statistics should print.
///
/// Reads `MALLOCVERBOSE`: the literal string `NO` disables printing; any
/// other value, or the variable being unset, enables it.
pub fn verbose_enabled() -> bool {
    static VERBOSE: OnceLock<bool> = OnceLock::new();
    *VERBOSE.get_or_init(|| match std::env::var("MALLOCVERBOSE") {
        Ok(value) if value == "NO" => false,
        _ => true,
    })
}
