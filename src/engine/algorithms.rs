// src/engine/algorithms.rs
//
// Byte corruption algorithms.
// Each algorithm is a small state machine: it is built once per run, then fed
// the eligible bytes of the scan in order. Every output is reduced modulo 255
// so no algorithm can ever produce 0xFF and forge a marker.

use crate::error::CrungeError;
use crate::ops::{AlgorithmKind, AlgorithmSpec};
use rand::Rng;
use std::f64::consts::{PI, TAU};

/// A stateful per-byte transform.
pub trait Corruptor: Send {
    fn name(&self) -> &'static str;

    /// Transform the next eligible byte. Never returns 0xFF.
    fn advance(&mut self, byte: u8) -> u8;
}

pub type BoxedCorruptor = Box<dyn Corruptor>;

/// Reduce into 0..=254.
#[inline]
pub fn wrap(value: i64) -> u8 {
    value.rem_euclid(255) as u8
}

/// Truncate toward zero, then reduce. NaN truncates to 0.
#[inline]
fn wrap_f64(value: f64) -> u8 {
    wrap(value as i64)
}

/// Random on/off activation for chunked algorithms.
///
/// While idle, each byte has `start_probability` of opening a chunk. An open
/// chunk covers `size` bytes and always closes on its own; the byte that
/// closes it passes through and cannot open the next chunk.
#[derive(Clone, Debug)]
struct ChunkGate {
    size: usize,
    start_probability: f64,
    active: bool,
    pos: usize,
}

impl ChunkGate {
    fn new(size: usize, start_probability: f64) -> Self {
        Self {
            size: size.max(1),
            start_probability,
            active: false,
            pos: 0,
        }
    }

    /// Returns true when the current byte falls inside a chunk.
    fn tick<R: Rng>(&mut self, rng: &mut R) -> bool {
        if (self.active && self.pos == 0)
            || (!self.active && rng.gen::<f64>() < self.start_probability)
        {
            self.active = !self.active;
        }
        if self.active {
            self.pos = (self.pos + 1) % self.size;
        }
        self.active
    }
}

/// Add a uniform value in 0..255 to every byte.
pub struct Noise<R> {
    rng: R,
}

impl<R: Rng + Send> Noise<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng + Send> Corruptor for Noise<R> {
    fn name(&self) -> &'static str {
        "noise"
    }

    fn advance(&mut self, byte: u8) -> u8 {
        wrap(i64::from(byte) + self.rng.gen_range(0..255))
    }
}

/// Nudge every byte up by a small value in 0..10.
pub struct LessNoise<R> {
    rng: R,
}

impl<R: Rng + Send> LessNoise<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng + Send> Corruptor for LessNoise<R> {
    fn name(&self) -> &'static str {
        "less_noise"
    }

    fn advance(&mut self, byte: u8) -> u8 {
        wrap(i64::from(byte) + self.rng.gen_range(0..10))
    }
}

const PROBABILISTIC_PHASES: [f64; 3] = [0.01, 0.0001, 0.001];
const PROBABILISTIC_PHASE_SHIFT: f64 = 0.001;

/// Occasionally nudge a byte by up to ±10, with the nudge rate cycling
/// between a few regimes over the stream.
pub struct Probabilistic<R> {
    rng: R,
    phase: usize,
}

impl<R: Rng + Send> Probabilistic<R> {
    pub fn new(rng: R) -> Self {
        Self { rng, phase: 0 }
    }
}

impl<R: Rng + Send> Corruptor for Probabilistic<R> {
    fn name(&self) -> &'static str {
        "probabilistic"
    }

    fn advance(&mut self, byte: u8) -> u8 {
        if self.rng.gen::<f64>() < PROBABILISTIC_PHASE_SHIFT {
            self.phase = (self.phase + 1) % PROBABILISTIC_PHASES.len();
        }
        if self.rng.gen::<f64>() < PROBABILISTIC_PHASES[self.phase] {
            wrap(i64::from(byte) + self.rng.gen_range(-10..=10))
        } else {
            wrap(i64::from(byte))
        }
    }
}

const SINUSOIDAL_STEP: f64 = TAU / 1000.0;

/// Add `amplitude * sin(phase + t)`, with `t` stepping by 2π/1000 per byte
/// and the phase drawn once at construction.
pub struct Sinusoidal {
    amplitude: f64,
    phase: f64,
    t: f64,
}

impl Sinusoidal {
    pub fn new<R: Rng>(amplitude: f64, rng: &mut R) -> Self {
        Self {
            amplitude,
            phase: rng.gen::<f64>() * TAU,
            t: 0.0,
        }
    }
}

impl Corruptor for Sinusoidal {
    fn name(&self) -> &'static str {
        "sinusoidal"
    }

    fn advance(&mut self, byte: u8) -> u8 {
        let value = f64::from(byte) + self.amplitude * (self.phase + self.t).sin();
        self.t += SINUSOIDAL_STEP;
        wrap_f64(value)
    }
}

const CHUNKS_START_PROBABILITY: f64 = 0.001;

/// Inside occasional runs of `size` bytes, shift each byte by -1..=1.
pub struct Chunks<R> {
    rng: R,
    gate: ChunkGate,
}

impl<R: Rng + Send> Chunks<R> {
    pub fn new(size: usize, rng: R) -> Self {
        Self {
            rng,
            gate: ChunkGate::new(size, CHUNKS_START_PROBABILITY),
        }
    }
}

impl<R: Rng + Send> Corruptor for Chunks<R> {
    fn name(&self) -> &'static str {
        "chunks"
    }

    fn advance(&mut self, byte: u8) -> u8 {
        if self.gate.tick(&mut self.rng) {
            wrap(i64::from(byte) + self.rng.gen_range(-1..=1))
        } else {
            wrap(i64::from(byte))
        }
    }
}

const CHUNK_START_PROBABILITY: f64 = 0.0005;

/// Overwrite occasional runs of `chunk_size` bytes with a constant.
pub struct Padding<R> {
    rng: R,
    gate: ChunkGate,
    pad_value: u8,
}

impl<R: Rng + Send> Padding<R> {
    /// `pad_value` must be below 0xFF.
    pub fn new(pad_value: u8, chunk_size: usize, rng: R) -> Self {
        Self {
            rng,
            gate: ChunkGate::new(chunk_size, CHUNK_START_PROBABILITY),
            pad_value: wrap(i64::from(pad_value)),
        }
    }
}

impl<R: Rng + Send> Corruptor for Padding<R> {
    fn name(&self) -> &'static str {
        "padding"
    }

    fn advance(&mut self, byte: u8) -> u8 {
        if self.gate.tick(&mut self.rng) {
            self.pad_value
        } else {
            wrap(i64::from(byte))
        }
    }
}

/// Replace each byte with the truncated mean of the last `window_size` inputs.
#[derive(Clone, Debug)]
pub struct MovingAverage {
    window: Vec<u8>,
    capacity: usize,
    next: usize,
    sum: u64,
}

impl MovingAverage {
    pub fn new(window_size: usize) -> Self {
        let capacity = window_size.max(1);
        Self {
            window: Vec::with_capacity(capacity.min(4096)),
            capacity,
            next: 0,
            sum: 0,
        }
    }
}

impl Corruptor for MovingAverage {
    fn name(&self) -> &'static str {
        "moving_average"
    }

    fn advance(&mut self, byte: u8) -> u8 {
        if self.window.len() < self.capacity {
            self.window.push(byte);
        } else {
            self.sum -= u64::from(self.window[self.next]);
            self.window[self.next] = byte;
        }
        self.sum += u64::from(byte);
        self.next = (self.next + 1) % self.capacity;
        wrap((self.sum / self.window.len() as u64) as i64)
    }
}

/// Scale the first `n` bytes by `multiplier`, then pass through.
#[derive(Clone, Debug)]
pub struct FirstNBytes {
    n: u64,
    multiplier: f64,
    seen: u64,
}

impl FirstNBytes {
    pub fn new(n: u64, multiplier: f64) -> Self {
        Self {
            n,
            multiplier,
            seen: 0,
        }
    }
}

impl Corruptor for FirstNBytes {
    fn name(&self) -> &'static str {
        "first_n_bytes"
    }

    fn advance(&mut self, byte: u8) -> u8 {
        let out = if self.seen < self.n {
            wrap_f64(f64::from(byte) * self.multiplier)
        } else {
            wrap(i64::from(byte))
        };
        self.seen = self.seen.saturating_add(1);
        out
    }
}

/// Which inverse trigonometric function a [`InverseTrig`] applies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrigFunction {
    Arccos,
    Arcsin,
    Arctan,
}

impl TrigFunction {
    fn name(self) -> &'static str {
        match self {
            TrigFunction::Arccos => "arccos_chunk",
            TrigFunction::Arcsin => "arcsin_weird",
            TrigFunction::Arctan => "arctan_weird",
        }
    }

    /// Offset drawn once per instance.
    fn draw_offset<R: Rng>(self, rng: &mut R) -> f64 {
        match self {
            TrigFunction::Arccos | TrigFunction::Arcsin => rng.gen::<f64>() - 0.25,
            TrigFunction::Arctan => f64::from(rng.gen_range(0u32..254)),
        }
    }

    fn apply(self, byte: u8, offset: f64) -> u8 {
        match self {
            TrigFunction::Arccos | TrigFunction::Arcsin => {
                let x = (offset + (f64::from(byte) - 128.0) / 128.0) % 2.0;
                let angle = if self == TrigFunction::Arccos {
                    x.acos()
                } else {
                    x.asin()
                };
                // |x| > 1 gives NaN, which truncates to 0.
                wrap_f64(angle * 254.0 / PI)
            }
            TrigFunction::Arctan => {
                let x = (offset + f64::from(byte)) % 254.0;
                let value = ((x.atan() + PI / 2.0) * 254.0 / PI) as i64;
                value.rem_euclid(128) as u8
            }
        }
    }
}

/// Chunk-gated inverse trig transform. Inside a chunk each byte is mapped
/// through the chosen function with an offset fixed at construction.
pub struct InverseTrig<R> {
    function: TrigFunction,
    rng: R,
    gate: ChunkGate,
    offset: f64,
}

impl<R: Rng + Send> InverseTrig<R> {
    pub fn new(function: TrigFunction, chunk_size: usize, mut rng: R) -> Self {
        let offset = function.draw_offset(&mut rng);
        Self {
            function,
            rng,
            gate: ChunkGate::new(chunk_size, CHUNK_START_PROBABILITY),
            offset,
        }
    }
}

impl<R: Rng + Send> Corruptor for InverseTrig<R> {
    fn name(&self) -> &'static str {
        self.function.name()
    }

    fn advance(&mut self, byte: u8) -> u8 {
        if self.gate.tick(&mut self.rng) {
            self.function.apply(byte, self.offset)
        } else {
            wrap(i64::from(byte))
        }
    }
}

const JITTER_FLOOR: u8 = 32;

/// Nudge every byte by -3..=3, never going below 32.
pub struct Jitter<R> {
    rng: R,
}

impl<R: Rng + Send> Jitter<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }
}

impl<R: Rng + Send> Corruptor for Jitter<R> {
    fn name(&self) -> &'static str {
        "jitter"
    }

    fn advance(&mut self, byte: u8) -> u8 {
        wrap(i64::from(byte) + self.rng.gen_range(-3..=3)).max(JITTER_FLOOR)
    }
}

/// Add a sawtooth ramp: the k-th byte gets `k mod 32` added.
#[derive(Clone, Debug, Default)]
pub struct Additive {
    seen: u64,
}

impl Additive {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Corruptor for Additive {
    fn name(&self) -> &'static str {
        "additive"
    }

    fn advance(&mut self, byte: u8) -> u8 {
        let out = wrap(i64::from(byte) + (self.seen % 32) as i64);
        self.seen = self.seen.wrapping_add(1);
        out
    }
}

/// Build a fresh corruptor for a validated spec.
///
/// Algorithms that need randomness take ownership of `rng`, so two instances
/// built from separately seeded generators never share state.
pub fn build<R>(spec: &AlgorithmSpec, mut rng: R) -> BoxedCorruptor
where
    R: Rng + Send + 'static,
{
    let int = |index: usize| spec.param(index) as usize;

    match spec.kind {
        AlgorithmKind::Noise => Box::new(Noise::new(rng)),
        AlgorithmKind::LessNoise => Box::new(LessNoise::new(rng)),
        AlgorithmKind::Probabilistic => Box::new(Probabilistic::new(rng)),
        AlgorithmKind::Sinusoidal => Box::new(Sinusoidal::new(spec.param(0), &mut rng)),
        AlgorithmKind::Chunks => Box::new(Chunks::new(int(0), rng)),
        AlgorithmKind::Padding => Box::new(Padding::new(int(0) as u8, int(1), rng)),
        AlgorithmKind::MovingAverage => Box::new(MovingAverage::new(int(0))),
        AlgorithmKind::FirstNBytes => {
            Box::new(FirstNBytes::new(spec.param(0) as u64, spec.param(1)))
        }
        AlgorithmKind::ArccosChunk => Box::new(InverseTrig::new(TrigFunction::Arccos, int(0), rng)),
        AlgorithmKind::ArcsinWeird => Box::new(InverseTrig::new(TrigFunction::Arcsin, int(0), rng)),
        AlgorithmKind::ArctanWeird => Box::new(InverseTrig::new(TrigFunction::Arctan, int(0), rng)),
        AlgorithmKind::Jitter => Box::new(Jitter::new(rng)),
        AlgorithmKind::Additive => Box::new(Additive::new()),
    }
}

/// Look up `name`, validate `params`, and build a fresh corruptor.
pub fn construct<R>(name: &str, params: &[f64], rng: R) -> Result<BoxedCorruptor, CrungeError>
where
    R: Rng + Send + 'static,
{
    let spec = AlgorithmSpec::named(name, params)?;
    Ok(build(&spec, rng))
}
