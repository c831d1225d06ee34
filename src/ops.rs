// src/ops.rs
//
// Corruption operations as data.
// An AlgorithmSpec is cheap to create, clone and store; the stateful
// corruptor is only built when a run starts (see engine::algorithms).

use crate::engine::algorithms::{self, BoxedCorruptor};
use crate::error::CrungeError;
use rand::Rng;
use std::fmt;

/// Every algorithm the engine knows how to build.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AlgorithmKind {
    Noise,
    LessNoise,
    Probabilistic,
    Sinusoidal,
    Chunks,
    Padding,
    MovingAverage,
    FirstNBytes,
    ArccosChunk,
    ArcsinWeird,
    ArctanWeird,
    Jitter,
    Additive,
}

/// A declared parameter. Parameters without a default are required.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub default: Option<f64>,
}

const fn required(name: &'static str) -> ParamSpec {
    ParamSpec {
        name,
        default: None,
    }
}

const fn optional(name: &'static str, default: f64) -> ParamSpec {
    ParamSpec {
        name,
        default: Some(default),
    }
}

const NO_PARAMS: &[ParamSpec] = &[];
const SINUSOIDAL_PARAMS: &[ParamSpec] = &[optional("amplitude", 5.0)];
const CHUNKS_PARAMS: &[ParamSpec] = &[optional("size", 4.0)];
const PADDING_PARAMS: &[ParamSpec] = &[
    optional("pad_value", 96.0),
    optional("chunk_size", 128.0),
];
const MOVING_AVERAGE_PARAMS: &[ParamSpec] = &[required("window_size")];
const FIRST_N_BYTES_PARAMS: &[ParamSpec] = &[required("n"), required("multiplier")];
const TRIG_PARAMS: &[ParamSpec] = &[optional("chunk_size", 128.0)];

impl AlgorithmKind {
    pub const ALL: [AlgorithmKind; 13] = [
        AlgorithmKind::Noise,
        AlgorithmKind::LessNoise,
        AlgorithmKind::Probabilistic,
        AlgorithmKind::Sinusoidal,
        AlgorithmKind::Chunks,
        AlgorithmKind::Padding,
        AlgorithmKind::MovingAverage,
        AlgorithmKind::FirstNBytes,
        AlgorithmKind::ArccosChunk,
        AlgorithmKind::ArcsinWeird,
        AlgorithmKind::ArctanWeird,
        AlgorithmKind::Jitter,
        AlgorithmKind::Additive,
    ];

    /// Look up an algorithm by name. Older names are accepted as aliases.
    pub fn from_name(name: &str) -> Result<Self, CrungeError> {
        let kind = match name.trim().to_lowercase().as_str() {
            "noise" => AlgorithmKind::Noise,
            "less_noise" | "lessnoise" => AlgorithmKind::LessNoise,
            "probabilistic" => AlgorithmKind::Probabilistic,
            "sinusoidal" => AlgorithmKind::Sinusoidal,
            "chunks" => AlgorithmKind::Chunks,
            "padding" => AlgorithmKind::Padding,
            "moving_average" => AlgorithmKind::MovingAverage,
            "first_n_bytes" | "first_bytes" => AlgorithmKind::FirstNBytes,
            "arccos_chunk" | "sinusoidal_chunk" | "sinusoidal_weird_cos" => {
                AlgorithmKind::ArccosChunk
            }
            "arcsin_weird" | "sinusoidal_weird_sin" => AlgorithmKind::ArcsinWeird,
            "arctan_weird" | "sinusoidal_weird_tan" => AlgorithmKind::ArctanWeird,
            "jitter" => AlgorithmKind::Jitter,
            "additive" => AlgorithmKind::Additive,
            _ => return Err(CrungeError::unknown_algorithm(name.trim().to_string())),
        };
        Ok(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            AlgorithmKind::Noise => "noise",
            AlgorithmKind::LessNoise => "less_noise",
            AlgorithmKind::Probabilistic => "probabilistic",
            AlgorithmKind::Sinusoidal => "sinusoidal",
            AlgorithmKind::Chunks => "chunks",
            AlgorithmKind::Padding => "padding",
            AlgorithmKind::MovingAverage => "moving_average",
            AlgorithmKind::FirstNBytes => "first_n_bytes",
            AlgorithmKind::ArccosChunk => "arccos_chunk",
            AlgorithmKind::ArcsinWeird => "arcsin_weird",
            AlgorithmKind::ArctanWeird => "arctan_weird",
            AlgorithmKind::Jitter => "jitter",
            AlgorithmKind::Additive => "additive",
        }
    }

    pub fn params(self) -> &'static [ParamSpec] {
        match self {
            AlgorithmKind::Noise
            | AlgorithmKind::LessNoise
            | AlgorithmKind::Probabilistic
            | AlgorithmKind::Jitter
            | AlgorithmKind::Additive => NO_PARAMS,
            AlgorithmKind::Sinusoidal => SINUSOIDAL_PARAMS,
            AlgorithmKind::Chunks => CHUNKS_PARAMS,
            AlgorithmKind::Padding => PADDING_PARAMS,
            AlgorithmKind::MovingAverage => MOVING_AVERAGE_PARAMS,
            AlgorithmKind::FirstNBytes => FIRST_N_BYTES_PARAMS,
            AlgorithmKind::ArccosChunk
            | AlgorithmKind::ArcsinWeird
            | AlgorithmKind::ArctanWeird => TRIG_PARAMS,
        }
    }

    fn required_count(self) -> usize {
        self.params().iter().filter(|p| p.default.is_none()).count()
    }

    fn expected_description(self) -> String {
        let total = self.params().len();
        let required = self.required_count();
        if required == total {
            total.to_string()
        } else {
            format!("{required} to {total}")
        }
    }
}

impl fmt::Display for AlgorithmKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated algorithm request: the kind plus its full parameter list,
/// defaults filled in.
#[derive(Clone, Debug, PartialEq)]
pub struct AlgorithmSpec {
    pub kind: AlgorithmKind,
    pub params: Vec<f64>,
}

impl AlgorithmSpec {
    /// Validate the parameter list for `kind`.
    ///
    /// Fails with a configuration error when the count is outside the declared
    /// range or a value is unusable. Nothing is processed before this passes.
    pub fn new(kind: AlgorithmKind, params: &[f64]) -> Result<Self, CrungeError> {
        let declared = kind.params();
        if params.len() < kind.required_count() || params.len() > declared.len() {
            return Err(CrungeError::parameter_count(
                kind.name(),
                kind.expected_description(),
                params.len(),
            ));
        }

        let mut full = Vec::with_capacity(declared.len());
        for (i, spec) in declared.iter().enumerate() {
            let value = match params.get(i) {
                Some(v) => *v,
                // required params are covered by the count check above
                None => spec.default.unwrap_or_default(),
            };
            validate_param(kind, spec, value)?;
            full.push(value);
        }

        Ok(Self { kind, params: full })
    }

    pub fn named(name: &str, params: &[f64]) -> Result<Self, CrungeError> {
        Self::new(AlgorithmKind::from_name(name)?, params)
    }

    /// Parse a single `name p0 p1 ...` entry.
    pub fn parse(entry: &str) -> Result<Self, CrungeError> {
        let mut parts = entry.split_whitespace();
        let name = parts.next().ok_or_else(CrungeError::empty_chain)?;
        let kind = AlgorithmKind::from_name(name)?;
        let params = parts
            .map(|raw| parse_number(kind, raw))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(kind, &params)
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// Build a fresh corruptor that owns `rng`.
    pub fn build<R: Rng + Send + 'static>(&self, rng: R) -> BoxedCorruptor {
        algorithms::build(self, rng)
    }

    /// Parameter value by position, as validated.
    pub(crate) fn param(&self, index: usize) -> f64 {
        self.params.get(index).copied().unwrap_or_default()
    }
}

fn parse_number(kind: AlgorithmKind, raw: &str) -> Result<f64, CrungeError> {
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u64::from_str_radix(hex, 16).ok().map(|v| v as f64),
        None => raw.parse::<f64>().ok(),
    };
    parsed.ok_or_else(|| {
        CrungeError::invalid_parameter(kind.name(), "param", raw.to_string(), "not a number")
    })
}

fn validate_param(kind: AlgorithmKind, spec: &ParamSpec, value: f64) -> Result<(), CrungeError> {
    let reject = |reason: &'static str| {
        Err(CrungeError::invalid_parameter(
            kind.name(),
            spec.name,
            value.to_string(),
            reason,
        ))
    };

    if !value.is_finite() {
        return reject("must be a finite number");
    }

    match (kind, spec.name) {
        (_, "window_size") | (_, "size") | (_, "chunk_size") => {
            if value < 1.0 || value.fract() != 0.0 || value > u32::MAX as f64 {
                return reject("must be a positive integer");
            }
        }
        (_, "n") => {
            if value < 0.0 || value.fract() != 0.0 {
                return reject("must be a non-negative integer");
            }
        }
        (_, "pad_value") => {
            if !(0.0..=254.0).contains(&value) || value.fract() != 0.0 {
                return reject("must be an integer in 0..=254 (0xFF is reserved)");
            }
        }
        _ => {}
    }
    Ok(())
}

/// Parse comma-separated `name p0 p1 ...` entries, in order.
pub fn parse_chain(text: &str) -> Result<Vec<AlgorithmSpec>, CrungeError> {
    if text.trim().is_empty() {
        return Err(CrungeError::empty_chain());
    }
    text.split(',').map(AlgorithmSpec::parse).collect()
}

/// Algorithm names joined with `-`, used to label outputs.
pub fn chain_label(specs: &[AlgorithmSpec]) -> String {
    specs
        .iter()
        .map(|s| s.name())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCategory;

    #[test]
    fn parses_single_and_chained_entries() {
        let chain = parse_chain("noise").unwrap();
        assert_eq!(chain.len(), 1);
        assert_eq!(chain[0].kind, AlgorithmKind::Noise);

        let chain = parse_chain("moving_average 8,  first_n_bytes 3 2 ,padding").unwrap();
        assert_eq!(chain.len(), 3);
        assert_eq!(chain[0].params, vec![8.0]);
        assert_eq!(chain[1].params, vec![3.0, 2.0]);
        assert_eq!(chain[2].params, vec![96.0, 128.0]);
        assert_eq!(chain_label(&chain), "moving_average-first_n_bytes-padding");
    }

    #[test]
    fn defaults_fill_trailing_params() {
        let spec = AlgorithmSpec::parse("padding 0x20").unwrap();
        assert_eq!(spec.params, vec![32.0, 128.0]);
        let spec = AlgorithmSpec::parse("sinusoidal").unwrap();
        assert_eq!(spec.params, vec![5.0]);
        let spec = AlgorithmSpec::parse("sinusoidal 1").unwrap();
        assert_eq!(spec.params, vec![1.0]);
    }

    #[test]
    fn aliases_resolve() {
        assert_eq!(AlgorithmKind::from_name("lessnoise").unwrap(), AlgorithmKind::LessNoise);
        assert_eq!(AlgorithmKind::from_name("first_bytes").unwrap(), AlgorithmKind::FirstNBytes);
        assert_eq!(
            AlgorithmKind::from_name("sinusoidal_chunk").unwrap(),
            AlgorithmKind::ArccosChunk
        );
        for kind in AlgorithmKind::ALL {
            assert_eq!(AlgorithmKind::from_name(kind.name()).unwrap(), kind);
        }
    }

    #[test]
    fn wrong_parameter_count_is_a_configuration_error() {
        let err = AlgorithmSpec::named("moving_average", &[]).unwrap_err();
        assert_eq!(err.category(), ErrorCategory::ConfigurationError);
        assert!(matches!(err, CrungeError::ParameterCount { actual: 0, .. }));

        assert!(AlgorithmSpec::named("first_n_bytes", &[3.0]).is_err());
        assert!(AlgorithmSpec::named("noise", &[1.0]).is_err());
        assert!(AlgorithmSpec::named("padding", &[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(AlgorithmSpec::named("moving_average", &[0.0]).is_err());
        assert!(AlgorithmSpec::named("moving_average", &[2.5]).is_err());
        assert!(AlgorithmSpec::named("padding", &[255.0]).is_err());
        assert!(AlgorithmSpec::named("chunks", &[0.0]).is_err());
        assert!(AlgorithmSpec::named("first_n_bytes", &[-1.0, 2.0]).is_err());
        assert!(AlgorithmSpec::named("sinusoidal", &[f64::NAN]).is_err());
        assert!(AlgorithmSpec::parse("first_n_bytes three 2").is_err());
    }

    #[test]
    fn unknown_and_empty() {
        assert!(matches!(
            parse_chain("noise, glitchify 2").unwrap_err(),
            CrungeError::UnknownAlgorithm { .. }
        ));
        assert!(matches!(parse_chain("   ").unwrap_err(), CrungeError::EmptyChain));
        assert!(matches!(parse_chain("noise,,noise").unwrap_err(), CrungeError::EmptyChain));
    }
}
