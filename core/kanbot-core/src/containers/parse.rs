//! Parsers for CLI output. Unparseable lines are dropped, never fatal.

use serde::{Deserialize, Serialize};

use super::{ContainerDescriptor, ContainerStats};
use crate::patterns::RE_ITERATION;

/// Latest `Iteration N of M` line seen in a log tail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationProgress {
    pub current: u32,
    pub total: u32,
}

/// Only the most recent match counts; earlier iterations are history.
pub fn parse_iteration_progress(text: &str) -> Option<IterationProgress> {
    RE_ITERATION.captures_iter(text).last().and_then(|captures| {
        let current = captures.get(1)?.as_str().parse().ok()?;
        let total = captures.get(2)?.as_str().parse().ok()?;
        Some(IterationProgress { current, total })
    })
}

/// `{{.Names}}\t{{.State}}\t{{.Status}}` lines from `ps`.
pub(crate) fn parse_ps_output(output: &str) -> Vec<ContainerDescriptor> {
    let mut containers: Vec<ContainerDescriptor> = output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let state = parts.next().map(str::trim).unwrap_or_default();
            let status = parts.next().map(str::trim).unwrap_or_default();
            let is_running =
                state.eq_ignore_ascii_case("running") || status.starts_with("Up ");
            Some(ContainerDescriptor {
                name: name.to_string(),
                is_running,
                state: if state.is_empty() {
                    status.to_string()
                } else {
                    state.to_ascii_lowercase()
                },
            })
        })
        .collect();
    containers.sort_by(|left, right| left.name.cmp(&right.name));
    containers
}

/// `{{.Name}}\t{{.CPUPerc}}\t{{.MemUsage}}` lines from `stats --no-stream`.
pub(crate) fn parse_stats_output(output: &str) -> Vec<ContainerStats> {
    output
        .lines()
        .filter_map(|line| {
            let mut parts = line.split('\t');
            let name = parts.next()?.trim();
            if name.is_empty() {
                return None;
            }
            let cpu_percent = parse_percent(parts.next().unwrap_or_default());
            let (usage, limit) = parts
                .next()
                .and_then(|mem| mem.split_once('/'))
                .unwrap_or(("0B", "0B"));
            Some(ContainerStats {
                container_name: name.to_string(),
                cpu_percent,
                mem_usage_bytes: parse_byte_size(usage).unwrap_or(0),
                mem_limit_bytes: parse_byte_size(limit).unwrap_or(0),
            })
        })
        .collect()
}

fn parse_percent(value: &str) -> f64 {
    value
        .trim()
        .trim_end_matches('%')
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .unwrap_or(0.0)
}

/// Parses human sizes such as `512KiB`, `1.5GiB`, `12.3MB`, `0B`.
pub fn parse_byte_size(value: &str) -> Option<u64> {
    let value = value.trim();
    let split_at = value
        .find(|ch: char| !(ch.is_ascii_digit() || ch == '.'))
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split_at);
    let number: f64 = number.parse().ok()?;

    let multiplier: f64 = match unit.trim() {
        "" | "B" => 1.0,
        "kB" | "KB" | "k" => 1e3,
        "KiB" => 1024.0,
        "MB" | "M" => 1e6,
        "MiB" => 1024.0 * 1024.0,
        "GB" | "G" => 1e9,
        "GiB" => 1024.0 * 1024.0 * 1024.0,
        "TB" | "T" => 1e12,
        "TiB" => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => return None,
    };

    Some((number * multiplier).round() as u64)
}
