// Workload reader
// Whitespace-separated byte tokens, one query each. A missing file is an empty workload.
// Tokens are raw bytes: no UTF-8 requirement.

use anyhow::{Context, Result};
use fanout_core::domain::Payload;
use std::io;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct Workload {
    pub queries: Vec<Payload>,
    /// Tokens rejected as invalid (too long)
    pub skipped: usize,
}

/// Read up to `max_queries` valid tokens from `path`
pub fn read_workload(path: &Path, max_queries: usize) -> Result<Workload> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "Workload file not found, nothing to submit");
            return Ok(Workload::default());
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to read workload {}", path.display()))
        }
    };
    Ok(parse_workload(&bytes, max_queries))
}

pub fn parse_workload(bytes: &[u8], max_queries: usize) -> Workload {
    let mut workload = Workload::default();
    let tokens = bytes
        .split(u8::is_ascii_whitespace)
        .filter(|token| !token.is_empty());
    for token in tokens {
        if workload.queries.len() >= max_queries {
            break;
        }
        match Payload::new(token) {
            Ok(payload) => workload.queries.push(payload),
            Err(e) => {
                warn!(error = %e, "Skipping workload token");
                workload.skipped += 1;
            }
        }
    }
    workload
}
