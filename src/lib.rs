// lib.rs
//
// crunge: glitch art by corrupting JPEG scan data
//
// Design goals:
// - Corrupt pixels, never structure: the output opens wherever the input did
// - Streaming: one pass, any chunking, constant extra memory
// - Pluggable per-byte algorithms with injectable randomness

pub mod engine;
pub mod error;
pub mod ops;

pub use engine::{corrupt, corrupt_with, CorruptionConfig, CorruptionStream};
pub use error::{CrungeError, ErrorCategory, Result};
pub use ops::{parse_chain, AlgorithmKind, AlgorithmSpec};

use engine::marker::MarkerKind;
use engine::scanner::SegmentScanner;

/// Crate version.
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Canonical names of every available algorithm.
pub fn supported_algorithms() -> Vec<&'static str> {
    AlgorithmKind::ALL.iter().map(|k| k.name()).collect()
}

/// What a corruption run would touch, without touching anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanSummary {
    pub len: u64,
    pub segments: usize,
    pub scans: usize,
    pub restarts: usize,
    /// Bytes the pipeline would hand to the chain.
    pub eligible: u64,
}

/// Walk `bytes` with the scanner and report its structure.
pub fn inspect(bytes: &[u8], config: &CorruptionConfig) -> ScanSummary {
    let mut scanner = SegmentScanner::recording(config);
    let mut eligible = 0u64;
    for &byte in bytes {
        if scanner.step(byte).is_eligible() {
            eligible += 1;
        }
    }
    let segments = scanner.finish();
    ScanSummary {
        len: bytes.len() as u64,
        segments: segments.len(),
        scans: segments
            .iter()
            .filter(|s| s.kind == MarkerKind::StartOfScan)
            .count(),
        restarts: segments
            .iter()
            .filter(|s| matches!(s.kind, MarkerKind::Restart(_)))
            .count(),
        eligible,
    }
}
