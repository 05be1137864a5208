//! Cache warmup (spec.md §4.8): reads a text file of `qname qtype` lines
//! at startup and submits each through the same refresh queue a
//! stale-while-revalidate hit uses, up to `refresh_warmup_limit` entries.

use tracing::warn;

use crate::refresh::RefreshHandle;
use crate::wire::{CacheKey, DNSResourceClass, DNSResourceType};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WarmupStats {
    pub submitted: usize,
    pub invalid: usize,
}

/// Parses `path` and submits up to `limit` valid lines through `handle`.
/// Blank lines and lines starting with `#` are skipped; anything else that
/// isn't exactly `qname qtype` (a recognized IANA mnemonic) counts toward
/// `invalid` and is otherwise ignored, never submitted.
pub async fn load(path: &str, handle: &RefreshHandle, limit: usize) -> WarmupStats {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(c) => c,
        Err(e) => {
            warn!(path, error = %e, "failed to read warmup file");
            return WarmupStats::default();
        }
    };

    let mut stats = WarmupStats::default();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if stats.submitted >= limit {
            break;
        }

        let mut fields = line.split_whitespace();
        let (Some(qname), Some(qtype_str), None) = (fields.next(), fields.next(), fields.next()) else {
            stats.invalid += 1;
            continue;
        };
        let Some(qtype) = DNSResourceType::parse_mnemonic(qtype_str) else {
            stats.invalid += 1;
            continue;
        };

        handle.try_enqueue(CacheKey::new(qname, qtype, DNSResourceClass::IN));
        stats.submitted += 1;
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::metrics::Metrics;
    use std::io::Write;
    use std::sync::Arc;

    #[tokio::test]
    async fn parses_valid_lines_and_counts_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# comment").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "example.com A").unwrap();
        writeln!(file, "example.net AAAA").unwrap();
        writeln!(file, "bad-line-no-type").unwrap();
        writeln!(file, "example.org BOGUS").unwrap();
        file.flush().unwrap();

        let config = Config::default();
        let metrics = Arc::new(Metrics::new().unwrap());
        let (handle, _rx, _inflight) = crate::refresh::new_handle(&config, metrics);

        let stats = load(file.path().to_str().unwrap(), &handle, 100).await;
        assert_eq!(stats.submitted, 2);
        assert_eq!(stats.invalid, 2);
    }

    #[tokio::test]
    async fn respects_submission_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for i in 0..10 {
            writeln!(file, "host{i}.test A").unwrap();
        }
        file.flush().unwrap();

        let config = Config::default();
        let metrics = Arc::new(Metrics::new().unwrap());
        let (handle, _rx, _inflight) = crate::refresh::new_handle(&config, metrics);

        let stats = load(file.path().to_str().unwrap(), &handle, 3).await;
        assert_eq!(stats.submitted, 3);
    }

    #[tokio::test]
    async fn missing_file_returns_empty_stats() {
        let config = Config::default();
        let metrics = Arc::new(Metrics::new().unwrap());
        let (handle, _rx, _inflight) = crate::refresh::new_handle(&config, metrics);
        let stats = load("/nonexistent/warmup.txt", &handle, 10).await;
        assert_eq!(stats, WarmupStats::default());
    }
}
