use super::FilterStage;
use serde::Serialize;
use std::fmt;
use tracing::warn;

/// Known mastering presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PresetId {
    Standard,
    HipHop,
    Rnb,
    Rock,
    Broadcast,
    Clean,
}

impl PresetId {
    pub const ALL: [PresetId; 6] = [
        PresetId::Standard,
        PresetId::HipHop,
        PresetId::Rnb,
        PresetId::Rock,
        PresetId::Broadcast,
        PresetId::Clean,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PresetId::Standard => "standard",
            PresetId::HipHop => "hiphop",
            PresetId::Rnb => "rnb",
            PresetId::Rock => "rock",
            PresetId::Broadcast => "broadcast",
            PresetId::Clean => "clean",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == s)
    }

    /// Like [`PresetId::parse`], but unknown ids map to `standard`.
    pub fn resolve(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|| {
            warn!("Unknown mastering preset '{}', using standard", s);
            PresetId::Standard
        })
    }
}

impl fmt::Display for PresetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable mastering recipe applied after the mix stage.
#[derive(Debug, Clone, PartialEq)]
pub struct MasteringPreset {
    pub id: PresetId,
    pub name: &'static str,
    pub description: &'static str,
    pub stages: Vec<FilterStage>,
}

fn compressor(threshold_db: f64, ratio: f64, attack_ms: f64, release_ms: f64) -> FilterStage {
    FilterStage::new("acompressor")
        .db("threshold", threshold_db)
        .num("ratio", ratio)
        .num("attack", attack_ms)
        .num("release", release_ms)
}

fn loudnorm(integrated_lufs: f64, true_peak_dbtp: f64, loudness_range_lu: f64) -> FilterStage {
    FilterStage::new("loudnorm")
        .num("I", integrated_lufs)
        .num("TP", true_peak_dbtp)
        .num("LRA", loudness_range_lu)
}

fn peaking_eq(freq: f64, width: f64, gain: f64) -> FilterStage {
    FilterStage::new("equalizer")
        .num("f", freq)
        .text("t", "h")
        .num("width", width)
        .num("g", gain)
}

impl MasteringPreset {
    pub fn get(id: PresetId) -> Self {
        let (name, description, stages) = match id {
            PresetId::Standard => (
                "Standard",
                "Balanced mastering for all genres",
                vec![
                    compressor(-12.0, 4.0, 5.0, 50.0),
                    FilterStage::new("highshelf").num("f", 8000.0).num("g", 2.0),
                    loudnorm(-14.0, -1.0, 11.0),
                ],
            ),
            PresetId::HipHop => (
                "Hip-Hop / Trap",
                "Heavy bass, punchy compression",
                vec![
                    compressor(-10.0, 6.0, 3.0, 30.0),
                    FilterStage::new("bass").num("g", 6.0).num("f", 80.0),
                    FilterStage::new("highshelf").num("f", 6000.0).num("g", 3.0),
                    loudnorm(-12.0, -0.5, 9.0),
                ],
            ),
            PresetId::Rnb => (
                "R&B / Soul",
                "Warm, smooth, vocal-forward",
                vec![
                    compressor(-14.0, 3.0, 10.0, 100.0),
                    FilterStage::new("bass").num("g", 4.0).num("f", 100.0),
                    peaking_eq(3000.0, 500.0, 2.0),
                    loudnorm(-14.0, -1.0, 11.0),
                ],
            ),
            PresetId::Rock => (
                "Rock / Pop",
                "Aggressive, mid-focused punch",
                vec![
                    compressor(-8.0, 5.0, 2.0, 20.0),
                    peaking_eq(1000.0, 800.0, 3.0),
                    FilterStage::new("lowpass").num("f", 16000.0),
                    loudnorm(-11.0, -0.5, 8.0),
                ],
            ),
            PresetId::Broadcast => (
                "Broadcast",
                "Broadcast-safe levels (-24 LUFS)",
                vec![
                    compressor(-18.0, 3.0, 20.0, 200.0),
                    FilterStage::new("highpass").num("f", 80.0),
                    FilterStage::new("lowpass").num("f", 15000.0),
                    loudnorm(-24.0, -2.0, 7.0),
                ],
            ),
            PresetId::Clean => (
                "Clean / Podcast",
                "Minimal processing, just normalization",
                vec![loudnorm(-16.0, -1.0, 14.0)],
            ),
        };

        Self {
            id,
            name,
            description,
            stages,
        }
    }

    /// Loudness target of the final normalisation stage, as (I, TP, LRA).
    pub fn loudness_target(&self) -> Option<(f64, f64, f64)> {
        let stage = self.stages.iter().rev().find(|s| s.name == "loudnorm")?;
        Some((stage.number("I")?, stage.number("TP")?, stage.number("LRA")?))
    }
}

/// Catalogue entry for presenting presets to users.
#[derive(Debug, Clone, Serialize)]
pub struct PresetInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub fn mastering_presets() -> Vec<PresetInfo> {
    PresetId::ALL
        .into_iter()
        .map(|id| {
            let preset = MasteringPreset::get(id);
            PresetInfo {
                id: id.as_str(),
                name: preset.name,
                description: preset.description,
            }
        })
        .collect()
}
