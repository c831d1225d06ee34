// src/engine.rs
//
// The core of crunge. A streaming JPEG scan corrupter that:
// 1. Walks the marker structure one byte at a time (scanner)
// 2. Hands only entropy-coded scan bytes to the algorithm chain (pipeline)
// 3. Leaves every marker, header and escape pair exactly where it was
//
// This file is a facade over the modules in engine/.

// =============================================================================
// CORE
// =============================================================================

pub mod algorithms;
pub mod config;
pub mod marker;
pub mod pipeline;
pub mod scanner;

// =============================================================================
// CALLING LAYER
// =============================================================================

pub mod codec;
pub mod frames;
pub mod io;
pub mod pool;
pub mod tasks;
pub mod verify;

pub use algorithms::{BoxedCorruptor, Corruptor};
pub use config::{CorruptionConfig, HeaderSkip, PeriodicWindow};
pub use marker::MarkerKind;
pub use pipeline::{apply_chain, build_chain, corrupt, corrupt_with, CorruptionStream, StreamStats};
pub use scanner::{classify, segments, ByteRole, ParserState, Segment, SegmentScanner};
pub use tasks::{BatchMode, BatchResult, BatchTask, CorruptTask};
