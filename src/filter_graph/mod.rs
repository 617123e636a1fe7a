//! Filter graph construction for the external tool.
//!
//! A graph is an ordered list of labeled stages:
//! 1. a mix stage combining every input into `[mixed]`
//! 2. the stages of a mastering preset, each feeding the next
//! 3. a final stage writing the terminal `[out]` label
//!
//! Stem export uses plain single-input chains instead (see [`StemChain`]).

mod presets;
mod stems;

pub use presets::{mastering_presets, MasteringPreset, PresetId, PresetInfo};
pub use stems::{stem_types, StemId, StemProfile, StemTypeInfo};

use std::fmt;
use thiserror::Error;

/// Label produced by the mix stage.
pub const MIX_OUTPUT_LABEL: &str = "mixed";
/// Label every mastering graph ends with.
pub const TERMINAL_LABEL: &str = "out";
/// Sample rate every rendered file is normalised to.
pub const OUTPUT_SAMPLE_RATE: u32 = 48_000;
/// Channel count every rendered file is normalised to.
pub const OUTPUT_CHANNELS: u16 = 2;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterGraphError {
    #[error("Invalid input count: {0}")]
    InvalidInputCount(usize),
}

/// Value of a single filter option.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Number(f64),
    /// Rendered with a `dB` suffix (compressor thresholds).
    Decibels(f64),
    Text(&'static str),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(v) => write!(f, "{}", v),
            ParamValue::Decibels(v) => write!(f, "{}dB", v),
            ParamValue::Text(s) => f.write_str(s),
        }
    }
}

/// One filter invocation: a filter name and its options, in order.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterStage {
    pub name: &'static str,
    pub params: Vec<(&'static str, ParamValue)>,
}

impl FilterStage {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            params: Vec::new(),
        }
    }

    pub fn num(mut self, key: &'static str, value: f64) -> Self {
        self.params.push((key, ParamValue::Number(value)));
        self
    }

    pub fn db(mut self, key: &'static str, value: f64) -> Self {
        self.params.push((key, ParamValue::Decibels(value)));
        self
    }

    pub fn text(mut self, key: &'static str, value: &'static str) -> Self {
        self.params.push((key, ParamValue::Text(value)));
        self
    }

    pub fn param(&self, key: &str) -> Option<&ParamValue> {
        self.params.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Numeric value of an option, regardless of its unit.
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.param(key)? {
            ParamValue::Number(v) | ParamValue::Decibels(v) => Some(*v),
            ParamValue::Text(_) => None,
        }
    }
}

impl fmt::Display for FilterStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)?;
        for (i, (key, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '=' } else { ':' };
            write!(f, "{}{}={}", sep, key, value)?;
        }
        Ok(())
    }
}

/// A stage wired into a graph through input and output pad labels.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledStage {
    pub inputs: Vec<String>,
    pub stage: FilterStage,
    pub output: String,
}

impl fmt::Display for LabeledStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "[{}]", input)?;
        }
        write!(f, "{}[{}]", self.stage, self.output)
    }
}

/// A complete, connected filter graph.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterGraph {
    stages: Vec<LabeledStage>,
}

impl FilterGraph {
    pub fn stages(&self) -> &[LabeledStage] {
        &self.stages
    }

    /// Output label of the last stage.
    pub fn terminal_label(&self) -> Option<&str> {
        self.stages.last().map(|s| s.output.as_str())
    }

    /// Expression for `-filter_complex`.
    pub fn to_filter_complex(&self) -> String {
        self.stages
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(";")
    }
}

/// Stage combining `input_count` tool inputs into [`MIX_OUTPUT_LABEL`].
///
/// A single input is forwarded untouched; several inputs are mixed with
/// equal weights for the duration of the longest one.
pub fn build_mix_stage(input_count: usize) -> Result<LabeledStage, FilterGraphError> {
    if input_count == 0 {
        return Err(FilterGraphError::InvalidInputCount(input_count));
    }

    let inputs: Vec<String> = (0..input_count).map(|i| format!("{}:a", i)).collect();
    let stage = if input_count == 1 {
        FilterStage::new("acopy")
    } else {
        FilterStage::new("amix")
            .num("inputs", input_count as f64)
            .text("duration", "longest")
    };

    Ok(LabeledStage {
        inputs,
        stage,
        output: MIX_OUTPUT_LABEL.to_string(),
    })
}

/// Thread the preset's stages after `mix_output_label`.
///
/// The last stage always writes [`TERMINAL_LABEL`].
pub fn build_preset_chain(preset: &MasteringPreset, mix_output_label: &str) -> Vec<LabeledStage> {
    let count = preset.stages.len();
    let mut previous = mix_output_label.to_string();

    preset
        .stages
        .iter()
        .enumerate()
        .map(|(i, stage)| {
            let output = if i + 1 == count {
                TERMINAL_LABEL.to_string()
            } else {
                format!("{}{}", stage.name, i + 1)
            };
            LabeledStage {
                inputs: vec![std::mem::replace(&mut previous, output.clone())],
                stage: stage.clone(),
                output,
            }
        })
        .collect()
}

/// Mix stage followed by the preset chain.
pub fn build_mastering_graph(
    input_count: usize,
    preset: &MasteringPreset,
) -> Result<FilterGraph, FilterGraphError> {
    let mix = build_mix_stage(input_count)?;
    let mut stages = vec![mix];
    stages.extend(build_preset_chain(preset, MIX_OUTPUT_LABEL));
    Ok(FilterGraph { stages })
}

/// Single-input filter chain for one stem, plus output normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct StemChain {
    pub filters: Vec<FilterStage>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl StemChain {
    /// Expression for `-af`.
    pub fn filter_expr(&self) -> String {
        self.filters
            .iter()
            .map(|s| s.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Output options forcing the common sample rate and stereo.
    pub fn output_args(&self) -> Vec<String> {
        normalisation_args(self.sample_rate, self.channels)
    }
}

pub fn build_stem_chain(profile: &StemProfile) -> StemChain {
    StemChain {
        filters: profile.stages.clone(),
        sample_rate: OUTPUT_SAMPLE_RATE,
        channels: OUTPUT_CHANNELS,
    }
}

pub fn normalisation_args(sample_rate: u32, channels: u16) -> Vec<String> {
    vec![
        "-ar".to_string(),
        sample_rate.to_string(),
        "-ac".to_string(),
        channels.to_string(),
    ]
}
