//! Compiled regex patterns for scanning agent logs and shell commands.
//!
//! Compiled once on first use. Update these when the agent harness changes its
//! progress line or when new publish commands need gating.

use once_cell::sync::Lazy;
use regex::Regex;

// ═══════════════════════════════════════════════════════════════════════════════
// Log Scanning
// ═══════════════════════════════════════════════════════════════════════════════

/// Coarse loop progress printed by the sandbox harness: `Iteration 3 of 20`.
pub static RE_ITERATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\biteration\s+(\d+)\s+of\s+(\d+)\b").unwrap());

// ═══════════════════════════════════════════════════════════════════════════════
// Publish Commands
// ═══════════════════════════════════════════════════════════════════════════════

/// `git push`, optionally path-qualified, allowing global options such as
/// `-C <dir>` or `--git-dir <dir>` between the words.
pub static RE_GIT_PUSH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?:^|[;&|(]|\s)(?:\S*/)?git",
        r"(?:\s+-[cC]\s+\S+",
        r"|\s+--(?:git-dir|work-tree|namespace|config-env)\s+\S+",
        r"|\s+--\S+)*",
        r"\s+push(?:\s|$)",
    ))
    .unwrap()
});

/// `gh pr create`.
pub static RE_GH_PR_CREATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[;&|(]|\s)gh\s+pr\s+create(?:\s|$)").unwrap());
