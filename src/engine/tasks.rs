// src/engine/tasks.rs
//
// Calling layer around the core: single-file and batch corruption tasks.
// Reading sources, writing outputs and fanning work out over the pool all
// happen here; the pipeline itself stays pure.

use crate::engine::codec::{JpegCodec, StillImageCodec};
use crate::engine::config::CorruptionConfig;
use crate::engine::io::{ensure_dir, write_atomic, Source};
use crate::engine::pipeline::{CorruptionStream, StreamStats};
use crate::engine::pool;
use crate::engine::verify::verify_structure;
use crate::error::{CrungeError, ErrorCategory};
use crate::ops::{chain_label, AlgorithmSpec};
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

type TaskResult<T> = std::result::Result<T, CrungeError>;

/// One input, one chain, one output.
#[derive(Clone, Debug)]
pub struct CorruptTask {
    pub source: Source,
    pub chain: Vec<AlgorithmSpec>,
    pub config: CorruptionConfig,
    /// Decode and re-encode the result at this JPEG quality.
    pub reencode: Option<u8>,
    /// Check the marker layout survived before returning.
    pub verify: bool,
}

impl CorruptTask {
    pub fn new(source: Source, chain: Vec<AlgorithmSpec>) -> Self {
        Self {
            source,
            chain,
            config: CorruptionConfig::default(),
            reencode: None,
            verify: false,
        }
    }

    pub fn with_config(mut self, config: CorruptionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_reencode(mut self, quality: u8) -> Self {
        self.reencode = Some(quality);
        self
    }

    pub fn with_verify(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Corrupt the source and return the new bytes.
    pub fn run(&self) -> TaskResult<(Vec<u8>, StreamStats)> {
        // Build the chain first so configuration errors win over I/O.
        let mut stream = CorruptionStream::new(&self.chain, &self.config)?;

        let loaded;
        let bytes: &[u8] = match self.source.as_bytes() {
            Some(bytes) => bytes,
            None => {
                loaded = self.source.load()?;
                loaded.as_slice()
            }
        };
        self.config.enforce_source_len(bytes.len())?;

        let corrupted = stream.process(bytes);
        let stats = stream.finish();

        if self.verify {
            verify_structure(bytes, &corrupted)?;
        }

        let output = match self.reencode {
            Some(quality) => JpegCodec.reencode(&corrupted, quality)?,
            None => corrupted,
        };
        Ok((output, stats))
    }

    /// Corrupt the source and write the result atomically to `path`.
    pub fn write_to(&self, path: impl AsRef<Path>) -> TaskResult<StreamStats> {
        let (bytes, stats) = self.run()?;
        write_atomic(path, &bytes)?;
        Ok(stats)
    }
}

/// How a batch spreads its chain over the inputs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BatchMode {
    /// Every file goes through the whole chain.
    #[default]
    Chain,
    /// Files are split into contiguous groups, one algorithm per group.
    Grouped,
}

/// Outcome for one input of a batch.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchResult {
    pub source: String,
    pub success: bool,
    pub error: Option<String>,
    pub output_path: Option<String>,
    pub error_code: Option<String>,
    pub error_category: Option<ErrorCategory>,
    pub stats: Option<StreamStats>,
}

impl BatchResult {
    fn ok(source: &Path, output: &Path, stats: StreamStats) -> Self {
        Self {
            source: source.display().to_string(),
            success: true,
            error: None,
            output_path: Some(output.display().to_string()),
            error_code: None,
            error_category: None,
            stats: Some(stats),
        }
    }

    fn failed(source: &Path, err: &CrungeError) -> Self {
        let source = source.display().to_string();
        Self {
            error: Some(format!("[{}] {}: {}", err.code(), source, err)),
            source,
            success: false,
            output_path: None,
            error_code: Some(err.code().to_string()),
            error_category: Some(err.category()),
            stats: None,
        }
    }
}

/// Group index for each of `files` inputs given `algorithms` groups.
///
/// Groups are contiguous and `max(files / algorithms, 1)` wide; whatever is
/// left over joins the last group.
pub fn assign_groups(files: usize, algorithms: usize) -> Vec<usize> {
    if algorithms == 0 {
        return Vec::new();
    }
    let width = (files / algorithms).max(1);
    (0..files).map(|i| (i / width).min(algorithms - 1)).collect()
}

/// `<stem>.<label><.ext>` for an input file.
pub fn output_name(input: &Path, chain: &[AlgorithmSpec]) -> TaskResult<PathBuf> {
    let stem = input.file_stem().ok_or_else(|| {
        CrungeError::invalid_argument("input", input.display().to_string(), "no file name")
    })?;
    let mut name = stem.to_os_string();
    name.push(".");
    name.push(chain_label(chain));
    if let Some(ext) = input.extension() {
        name.push(".");
        name.push(ext);
    }
    Ok(PathBuf::from(name))
}

/// Many inputs corrupted into one output directory.
#[derive(Clone, Debug)]
pub struct BatchTask {
    pub inputs: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub chain: Vec<AlgorithmSpec>,
    pub mode: BatchMode,
    pub config: CorruptionConfig,
    pub reencode: Option<u8>,
    pub verify: bool,
}

impl BatchTask {
    pub fn new(
        inputs: Vec<PathBuf>,
        output_dir: impl Into<PathBuf>,
        chain: Vec<AlgorithmSpec>,
    ) -> Self {
        Self {
            inputs,
            output_dir: output_dir.into(),
            chain,
            mode: BatchMode::default(),
            config: CorruptionConfig::default(),
            reencode: None,
            verify: false,
        }
    }

    pub fn with_mode(mut self, mode: BatchMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_config(mut self, config: CorruptionConfig) -> Self {
        self.config = config;
        self
    }

    /// The chain each input gets, in input order.
    pub fn plan(&self) -> Vec<&[AlgorithmSpec]> {
        match self.mode {
            BatchMode::Chain => vec![self.chain.as_slice(); self.inputs.len()],
            BatchMode::Grouped => assign_groups(self.inputs.len(), self.chain.len())
                .into_iter()
                .map(|g| std::slice::from_ref(&self.chain[g]))
                .collect(),
        }
    }

    /// Run every input. Fails only when the batch as a whole cannot start;
    /// per-file failures are reported in the matching `BatchResult`.
    pub fn run(&self) -> TaskResult<Vec<BatchResult>> {
        if self.chain.is_empty() {
            return Err(CrungeError::empty_chain());
        }
        ensure_dir(&self.output_dir)?;

        let plan = self.plan();
        info!(
            target: "crunge::batch",
            files = self.inputs.len(),
            mode = ?self.mode,
            chain = %chain_label(&self.chain),
            "starting batch"
        );

        let jobs: Vec<(usize, &Path, &[AlgorithmSpec])> = self
            .inputs
            .iter()
            .zip(plan)
            .enumerate()
            .map(|(index, (input, chain))| (index, input.as_path(), chain))
            .collect();

        let process_one = |(index, input, chain): (usize, &Path, &[AlgorithmSpec])| -> BatchResult {
            let outcome =
                panic::catch_unwind(AssertUnwindSafe(|| self.process_one(index, input, chain)))
                    .unwrap_or_else(|_| Err(CrungeError::internal_panic("corruption panicked")));
            match outcome {
                Ok((output, stats)) => {
                    debug!(
                        target: "crunge::batch",
                        input = %input.display(),
                        output = %output.display(),
                        "finished"
                    );
                    BatchResult::ok(input, &output, stats)
                }
                Err(err) => {
                    warn!(
                        target: "crunge::batch",
                        input = %input.display(),
                        code = err.code(),
                        error = %err,
                        "file failed"
                    );
                    BatchResult::failed(input, &err)
                }
            }
        };

        let results: Vec<BatchResult> = match pool::get_pool() {
            Some(pool) => pool.install(|| jobs.into_par_iter().map(process_one).collect()),
            None => jobs.into_iter().map(process_one).collect(),
        };

        let failed = results.iter().filter(|r| !r.success).count();
        info!(target: "crunge::batch", files = results.len(), failed, "batch complete");
        Ok(results)
    }

    fn process_one(
        &self,
        index: usize,
        input: &Path,
        chain: &[AlgorithmSpec],
    ) -> TaskResult<(PathBuf, StreamStats)> {
        info!(
            target: "crunge::batch",
            input = %input.display(),
            chain = %chain_label(chain),
            "corrupting"
        );

        let output = self.output_dir.join(output_name(input, chain)?);
        let mut config = self.config.clone();
        // Per-file seed so results do not depend on scheduling order.
        config.seed = config.seed.map(|s| s.wrapping_add(index as u64));

        let mut task = CorruptTask::new(Source::open_mapped(input)?, chain.to_vec())
            .with_config(config)
            .with_verify(self.verify);
        task.reencode = self.reencode;
        let stats = task.write_to(&output)?;
        Ok((output, stats))
    }
}
