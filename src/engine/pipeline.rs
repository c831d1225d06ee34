// src/engine/pipeline.rs
//
// Corruption pipeline: drives the segment scanner over the input and routes
// eligible bytes through the algorithm chain. Everything else is copied as-is.

use crate::engine::algorithms::BoxedCorruptor;
use crate::engine::config::CorruptionConfig;
use crate::engine::scanner::SegmentScanner;
use crate::error::CrungeError;
use crate::ops::AlgorithmSpec;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::debug;

// Always surface CrungeError so configuration problems keep their category.
type PipelineResult<T> = std::result::Result<T, CrungeError>;

/// Per-instance seed spread; instance 0 uses the configured seed as-is.
const SEED_STRIDE: u64 = 0x9E37_79B9_7F4A_7C15;

/// Counters for one run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamStats {
    /// Bytes consumed.
    pub bytes: u64,
    /// Bytes handed to the chain.
    pub eligible: u64,
    /// Eligible bytes whose value actually changed.
    pub changed: u64,
}

/// Build one fresh corruptor per spec, each with its own random source.
///
/// With a seed, instance `i` is seeded from `seed` and `i`, so the same seed
/// and chain always yield the same output. Without one, every instance draws
/// from OS entropy.
pub fn build_chain(
    specs: &[AlgorithmSpec],
    seed: Option<u64>,
) -> PipelineResult<Vec<BoxedCorruptor>> {
    if specs.is_empty() {
        return Err(CrungeError::empty_chain());
    }
    Ok(specs
        .iter()
        .enumerate()
        .map(|(i, spec)| {
            let rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed ^ (i as u64).wrapping_mul(SEED_STRIDE)),
                None => StdRng::from_entropy(),
            };
            spec.build(rng)
        })
        .collect())
}

/// Chunk-driven corruption run.
///
/// Feed the input in any number of chunks of any size; the concatenated
/// output is the same as one `corrupt_with` call over the whole buffer with
/// the same seed. Drop the stream to abandon a run; there is no resume.
pub struct CorruptionStream {
    scanner: SegmentScanner,
    chain: Vec<BoxedCorruptor>,
    stats: StreamStats,
}

impl CorruptionStream {
    /// Validate and build the chain, then start a fresh scanner.
    pub fn new(specs: &[AlgorithmSpec], config: &CorruptionConfig) -> PipelineResult<Self> {
        let chain = build_chain(specs, config.seed)?;
        Ok(Self::with_corruptors(chain, config))
    }

    /// Run an already-built chain. An empty chain copies every byte.
    pub fn with_corruptors(chain: Vec<BoxedCorruptor>, config: &CorruptionConfig) -> Self {
        Self {
            scanner: SegmentScanner::new(config),
            chain,
            stats: StreamStats::default(),
        }
    }

    pub fn process(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(chunk.len());
        self.process_into(chunk, &mut out);
        out
    }

    /// Append the transformed chunk to `out`.
    pub fn process_into(&mut self, chunk: &[u8], out: &mut Vec<u8>) {
        out.reserve(chunk.len());
        for &byte in chunk {
            let role = self.scanner.step(byte);
            self.stats.bytes += 1;
            if !role.is_eligible() {
                out.push(byte);
                continue;
            }

            self.stats.eligible += 1;
            let value = self
                .chain
                .iter_mut()
                .fold(byte, |value, corruptor| corruptor.advance(value));
            debug_assert_ne!(value, 0xFF, "corruption chain produced a marker prefix");
            if value != byte {
                self.stats.changed += 1;
            }
            out.push(value);
        }
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Names of the chain, in application order.
    pub fn chain_names(&self) -> Vec<&'static str> {
        self.chain.iter().map(|c| c.name()).collect()
    }

    /// End the run and report what it did.
    pub fn finish(self) -> StreamStats {
        debug!(
            target: "crunge::pipeline",
            chain = ?self.chain_names(),
            bytes = self.stats.bytes,
            eligible = self.stats.eligible,
            changed = self.stats.changed,
            "corruption run finished"
        );
        self.stats
    }
}

/// Corrupt `input` with an already-built chain. Infallible; the input is
/// never mutated and the output has the same length.
pub fn apply_chain(
    input: &[u8],
    chain: Vec<BoxedCorruptor>,
    config: &CorruptionConfig,
) -> (Vec<u8>, StreamStats) {
    let mut stream = CorruptionStream::with_corruptors(chain, config);
    let output = stream.process(input);
    (output, stream.finish())
}

/// Corrupt `input` with the default configuration.
pub fn corrupt(input: &[u8], chain: &[AlgorithmSpec]) -> PipelineResult<Vec<u8>> {
    corrupt_with(input, chain, &CorruptionConfig::default())
}

/// Corrupt `input` honouring `config`.
///
/// Every failure (empty chain, input over the size limit) happens before the
/// first byte is read; there is no partial output.
pub fn corrupt_with(
    input: &[u8],
    chain: &[AlgorithmSpec],
    config: &CorruptionConfig,
) -> PipelineResult<Vec<u8>> {
    config.enforce_source_len(input.len())?;
    let mut stream = CorruptionStream::new(chain, config)?;
    let output = stream.process(input);
    stream.finish();
    Ok(output)
}
