//! Pre-publish review gate.
//!
//! Intercepts `git push` and `gh pr create`. When source files have pending
//! changes, publishing requires a review marker younger than
//! [`FRESHNESS_SECS`]. The gate fails open: if it cannot read the diff or the
//! marker, it allows.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::ReviewGateConfig;
use crate::patterns::{RE_GH_PR_CREATE, RE_GIT_PUSH};
use crate::storage::StorageConfig;

pub const FRESHNESS_SECS: i64 = 30 * 60;

const LISTED_FILES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerState {
    Missing,
    Stale,
    Fresh,
}

/// Marker mtimes in the future count as fresh.
pub fn marker_state(exists: bool, mtime: DateTime<Utc>, now: DateTime<Utc>) -> MarkerState {
    if !exists {
        return MarkerState::Missing;
    }
    if now.signed_duration_since(mtime) < Duration::seconds(FRESHNESS_SECS) {
        MarkerState::Fresh
    } else {
        MarkerState::Stale
    }
}

pub fn is_publish_command(command: &str) -> bool {
    RE_GIT_PUSH.is_match(command) || RE_GH_PR_CREATE.is_match(command)
}

/// Source files with pending changes in a worktree.
pub trait ChangeSource {
    fn changed_files(&self, worktree: &Path) -> Result<Vec<String>, String>;
}

/// Union of `git diff --name-only` for the working tree and the index.
///
/// Paths are read NUL-delimited with `core.quotePath` off, so names with
/// non-ASCII bytes or quotes come back verbatim.
#[derive(Debug, Clone, Default)]
pub struct GitChangeSource;

impl GitChangeSource {
    fn diff(worktree: &Path, cached: bool) -> Result<Vec<String>, String> {
        let mut command = Command::new("git");
        command
            .arg("-C")
            .arg(worktree)
            .args(["-c", "core.quotePath=false", "diff", "--name-only", "-z"]);
        if cached {
            command.arg("--cached");
        }
        let output = command
            .output()
            .map_err(|err| format!("Failed to run git diff: {}", err))?;
        if !output.status.success() {
            return Err(format!(
                "git diff failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            ));
        }
        Ok(split_name_list(&output.stdout))
    }
}

fn split_name_list(stdout: &[u8]) -> Vec<String> {
    stdout
        .split(|byte| *byte == 0)
        .filter(|name| !name.is_empty())
        .map(|name| String::from_utf8_lossy(name).into_owned())
        .collect()
}

impl ChangeSource for GitChangeSource {
    fn changed_files(&self, worktree: &Path) -> Result<Vec<String>, String> {
        let mut files: BTreeSet<String> = Self::diff(worktree, false)?.into_iter().collect();
        files.extend(Self::diff(worktree, true)?);
        Ok(files.into_iter().collect())
    }
}

/// Recognized source file outside generated and dependency directories.
pub fn is_reviewable_source(path: &str, config: &ReviewGateConfig) -> bool {
    let path = path.replace('\\', "/");
    if path.ends_with(".d.ts") {
        return false;
    }

    let mut components: Vec<&str> = path.split('/').filter(|part| !part.is_empty()).collect();
    let Some(file_name) = components.pop() else {
        return false;
    };
    if components
        .iter()
        .any(|dir| config.excluded_dirs.iter().any(|excluded| excluded == dir))
    {
        return false;
    }

    match file_name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => config
            .source_extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension)),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AllowReason {
    Disabled,
    NotPublish,
    NoSourceChanges,
    FreshReview,
    GateError(String),
}

/// A publish blocked for lack of a fresh review.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GateBlocked {
    pub marker: MarkerState,
    pub marker_path: PathBuf,
    pub files: Vec<String>,
}

impl GateBlocked {
    pub fn message(&self) -> String {
        let reason = match self.marker {
            MarkerState::Stale => format!(
                "The last review is stale (older than {} minutes).",
                FRESHNESS_SECS / 60
            ),
            _ => "No review has been completed for these changes.".to_string(),
        };

        let mut lines = vec![
            format!("Publishing blocked: review required. {}", reason),
            format!("Changed source files ({}):", self.files.len()),
        ];
        lines.extend(
            self.files
                .iter()
                .take(LISTED_FILES)
                .map(|file| format!("  - {}", file)),
        );
        if self.files.len() > LISTED_FILES {
            lines.push(format!("  +{} more", self.files.len() - LISTED_FILES));
        }
        lines.push(format!(
            "Run a review pass, which refreshes {}, then retry.",
            self.marker_path.display()
        ));
        lines.join("\n")
    }
}

impl std::fmt::Display for GateBlocked {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message())
    }
}

impl std::error::Error for GateBlocked {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    Allow { reason: AllowReason },
    Block(GateBlocked),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow { .. })
    }

    fn allow(reason: AllowReason) -> Self {
        GateDecision::Allow { reason }
    }
}

pub struct ReviewGate<S: ChangeSource = GitChangeSource, C: Clock = SystemClock> {
    config: ReviewGateConfig,
    changes: S,
    clock: C,
}

impl ReviewGate {
    pub fn from_config(config: &ReviewGateConfig) -> Self {
        Self::new(config.clone(), GitChangeSource, SystemClock)
    }
}

impl<S: ChangeSource, C: Clock> ReviewGate<S, C> {
    pub fn new(config: ReviewGateConfig, changes: S, clock: C) -> Self {
        Self {
            config,
            changes,
            clock,
        }
    }

    pub fn evaluate(&self, command: &str, worktree: &Path) -> GateDecision {
        if !self.config.enabled {
            return GateDecision::allow(AllowReason::Disabled);
        }
        if !is_publish_command(command) {
            return GateDecision::allow(AllowReason::NotPublish);
        }

        let files: Vec<String> = match self.changes.changed_files(worktree) {
            Ok(files) => files
                .into_iter()
                .filter(|file| is_reviewable_source(file, &self.config))
                .collect(),
            Err(err) => {
                warn!(worktree = %worktree.display(), error = %err, "Review gate could not diff, allowing");
                return GateDecision::allow(AllowReason::GateError(err));
            }
        };
        if files.is_empty() {
            debug!(worktree = %worktree.display(), "No source changes, allowing publish");
            return GateDecision::allow(AllowReason::NoSourceChanges);
        }

        let marker_path = StorageConfig::worktree_file(worktree, &self.config.marker_path);
        let state = match read_marker(&marker_path) {
            Ok(Some(mtime)) => marker_state(true, mtime, self.clock.now()),
            Ok(None) => MarkerState::Missing,
            Err(err) => {
                warn!(marker = %marker_path.display(), error = %err, "Review gate could not read marker, allowing");
                return GateDecision::allow(AllowReason::GateError(err));
            }
        };

        if state == MarkerState::Fresh {
            return GateDecision::allow(AllowReason::FreshReview);
        }

        info!(
            worktree = %worktree.display(),
            marker = ?state,
            files = files.len(),
            "Publish blocked pending review"
        );
        GateDecision::Block(GateBlocked {
            marker: state,
            marker_path,
            files,
        })
    }
}

fn read_marker(path: &Path) -> Result<Option<DateTime<Utc>>, String> {
    match fs_err::metadata(path) {
        Ok(metadata) => metadata
            .modified()
            .map(|modified| Some(DateTime::<Utc>::from(modified)))
            .map_err(|err| format!("Failed to read marker mtime: {}", err)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use filetime::{set_file_mtime, FileTime};
    use tempfile::tempdir;

    struct FixedChanges(Result<Vec<String>, String>);

    impl ChangeSource for FixedChanges {
        fn changed_files(&self, _: &Path) -> Result<Vec<String>, String> {
            self.0.clone()
        }
    }

    fn changes(files: &[&str]) -> FixedChanges {
        FixedChanges(Ok(files.iter().map(|file| file.to_string()).collect()))
    }

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-04-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn write_marker(worktree: &Path, age_minutes: i64) {
        let path = worktree.join(".kanbot").join("review-complete");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "").unwrap();
        let mtime = now() - Duration::minutes(age_minutes);
        set_file_mtime(&path, FileTime::from_unix_time(mtime.timestamp(), 0)).unwrap();
    }

    fn gate(files: FixedChanges) -> ReviewGate<FixedChanges, FixedClock> {
        ReviewGate::new(ReviewGateConfig::default(), files, FixedClock::new(now()))
    }

    #[test]
    fn marker_states() {
        let now = now();
        assert_eq!(marker_state(false, now, now), MarkerState::Missing);
        assert_eq!(marker_state(true, now - Duration::minutes(10), now), MarkerState::Fresh);
        assert_eq!(marker_state(true, now - Duration::minutes(30), now), MarkerState::Stale);
        assert_eq!(marker_state(true, now + Duration::minutes(5), now), MarkerState::Fresh);
    }

    #[test]
    fn detects_publish_commands() {
        assert!(is_publish_command("git push origin HEAD"));
        assert!(is_publish_command("git -C ../wt push"));
        assert!(is_publish_command("git --git-dir /x/.git push"));
        assert!(is_publish_command("git --work-tree /x push origin"));
        assert!(is_publish_command("git --no-pager -c user.name=x push"));
        assert!(is_publish_command("/usr/bin/git push"));
        assert!(is_publish_command("cd /repo && ./bin/git push --force"));
        assert!(is_publish_command("npm test && git push"));
        assert!(is_publish_command("cd app; gh pr create --fill"));
        assert!(!is_publish_command("git status"));
        assert!(!is_publish_command("git pushd"));
        assert!(!is_publish_command("echo \"git push\""));
        assert!(!is_publish_command("gh pr view"));
        assert!(!is_publish_command("git --git-dir /x status"));
        assert!(!is_publish_command("legit push"));
    }

    #[test]
    fn filters_reviewable_sources() {
        let config = ReviewGateConfig::default();
        assert!(is_reviewable_source("src/app.tsx", &config));
        assert!(is_reviewable_source("core/lib.rs", &config));
        assert!(!is_reviewable_source("types/api.d.ts", &config));
        assert!(!is_reviewable_source("node_modules/pkg/index.js", &config));
        assert!(!is_reviewable_source("web/dist/bundle.js", &config));
        assert!(!is_reviewable_source("README.md", &config));
        assert!(!is_reviewable_source(".ts", &config));
    }

    #[test]
    fn no_source_changes_allows_regardless_of_marker() {
        let dir = tempdir().unwrap();
        let decision = gate(changes(&["README.md", "types/x.d.ts"])).evaluate("git push", dir.path());
        assert_eq!(
            decision,
            GateDecision::Allow {
                reason: AllowReason::NoSourceChanges
            }
        );
    }

    #[test]
    fn stale_marker_blocks() {
        let dir = tempdir().unwrap();
        write_marker(dir.path(), 31);

        match gate(changes(&["src/a.ts"])).evaluate("git push", dir.path()) {
            GateDecision::Block(blocked) => {
                assert_eq!(blocked.marker, MarkerState::Stale);
                assert!(blocked.message().contains("stale"));
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn missing_marker_blocks() {
        let dir = tempdir().unwrap();
        match gate(changes(&["src/a.ts"])).evaluate("gh pr create", dir.path()) {
            GateDecision::Block(blocked) => {
                assert_eq!(blocked.marker, MarkerState::Missing);
                assert!(blocked.message().contains("No review has been completed"));
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn fresh_marker_allows() {
        let dir = tempdir().unwrap();
        write_marker(dir.path(), 10);
        let decision = gate(changes(&["src/a.ts"])).evaluate("git push", dir.path());
        assert_eq!(
            decision,
            GateDecision::Allow {
                reason: AllowReason::FreshReview
            }
        );
    }

    #[test]
    fn block_message_truncates_file_list() {
        let blocked = GateBlocked {
            marker: MarkerState::Missing,
            marker_path: PathBuf::from("/wt/.kanbot/review-complete"),
            files: (1..=8).map(|n| format!("src/f{}.rs", n)).collect(),
        };
        let message = blocked.to_string();
        assert!(message.contains("src/f5.rs"));
        assert!(!message.contains("src/f6.rs"));
        assert!(message.contains("+3 more"));
    }

    #[test]
    fn diff_failure_fails_open() {
        let dir = tempdir().unwrap();
        let decision = gate(FixedChanges(Err("not a git repository".to_string())))
            .evaluate("git push", dir.path());
        assert!(decision.is_allowed());
    }

    #[test]
    fn unreadable_marker_fails_open() {
        let dir = tempdir().unwrap();
        // A regular file where the marker directory should be.
        std::fs::write(dir.path().join(".kanbot"), "").unwrap();

        match gate(changes(&["src/a.ts"])).evaluate("git push", dir.path()) {
            GateDecision::Allow {
                reason: AllowReason::GateError(err),
            } => assert!(!err.is_empty()),
            other => panic!("expected gate error allow, got {:?}", other),
        }
    }

    #[test]
    fn name_list_is_split_on_nul() {
        let stdout = "src/caf\u{e9}.ts\0src/\"quoted\".rs\0".as_bytes();
        assert_eq!(
            split_name_list(stdout),
            vec!["src/caf\u{e9}.ts".to_string(), "src/\"quoted\".rs".to_string()]
        );
        assert!(split_name_list(b"").is_empty());
    }

    fn git(dir: &Path, args: &[&str]) -> bool {
        Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    #[test]
    fn staged_non_ascii_source_blocks() {
        let dir = tempdir().unwrap();
        if !git(dir.path(), &["init", "-q"]) {
            return;
        }
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("src").join("caf\u{e9}.ts"), "export {};\n").unwrap();
        assert!(git(dir.path(), &["add", "src"]));

        let files = GitChangeSource.changed_files(dir.path()).unwrap();
        assert_eq!(files, vec!["src/caf\u{e9}.ts".to_string()]);

        let gate = ReviewGate::new(
            ReviewGateConfig::default(),
            GitChangeSource,
            FixedClock::new(now()),
        );
        match gate.evaluate("git push", dir.path()) {
            GateDecision::Block(blocked) => {
                assert_eq!(blocked.marker, MarkerState::Missing);
                assert_eq!(blocked.files, vec!["src/caf\u{e9}.ts".to_string()]);
            }
            other => panic!("expected block, got {:?}", other),
        }
    }

    #[test]
    fn non_publish_commands_skip_the_diff() {
        let dir = tempdir().unwrap();
        let decision = gate(FixedChanges(Err("unreachable".to_string())))
            .evaluate("cargo fmt", dir.path());
        assert_eq!(
            decision,
            GateDecision::Allow {
                reason: AllowReason::NotPublish
            }
        );
    }

    #[test]
    fn git_source_outside_a_repo_still_allows() {
        let dir = tempdir().unwrap();
        let gate = ReviewGate::new(
            ReviewGateConfig::default(),
            GitChangeSource,
            FixedClock::new(now()),
        );
        assert!(gate.evaluate("git push", dir.path()).is_allowed());
    }
}
