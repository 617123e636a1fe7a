use super::FilterStage;
use serde::Serialize;
use std::fmt;

/// Known frequency-isolation stem profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StemId {
    Vocals,
    Instrumental,
    Bass,
    Highs,
    Mids,
    Drums,
}

impl StemId {
    pub const ALL: [StemId; 6] = [
        StemId::Vocals,
        StemId::Instrumental,
        StemId::Bass,
        StemId::Highs,
        StemId::Mids,
        StemId::Drums,
    ];

    /// Stems exported when the caller does not ask for specific ones.
    pub const DEFAULT_EXPORT: [StemId; 4] = [
        StemId::Vocals,
        StemId::Instrumental,
        StemId::Bass,
        StemId::Highs,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StemId::Vocals => "vocals",
            StemId::Instrumental => "instrumental",
            StemId::Bass => "bass",
            StemId::Highs => "highs",
            StemId::Mids => "mids",
            StemId::Drums => "drums",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| id.as_str() == s)
    }
}

impl fmt::Display for StemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filters approximating one stem of a mixed track.
///
/// These are band filters, not source separation.
#[derive(Debug, Clone, PartialEq)]
pub struct StemProfile {
    pub id: StemId,
    pub description: &'static str,
    pub stages: Vec<FilterStage>,
}

fn highpass(freq: f64) -> FilterStage {
    FilterStage::new("highpass").num("f", freq)
}

fn lowpass(freq: f64) -> FilterStage {
    FilterStage::new("lowpass").num("f", freq)
}

impl StemProfile {
    pub fn get(id: StemId) -> Self {
        let (description, stages) = match id {
            StemId::Vocals => (
                "Vocal frequencies (300Hz - 5kHz boosted)",
                vec![
                    highpass(300.0),
                    lowpass(5000.0),
                    FilterStage::new("equalizer")
                        .num("f", 3000.0)
                        .text("t", "h")
                        .num("width", 2000.0)
                        .num("g", 3.0),
                ],
            ),
            StemId::Instrumental => (
                "Instrumental (vocals reduced)",
                vec![
                    highpass(80.0),
                    FilterStage::new("bandreject")
                        .num("f", 3000.0)
                        .num("w", 1500.0),
                ],
            ),
            StemId::Bass => (
                "Bass frequencies (< 250Hz)",
                vec![lowpass(250.0), FilterStage::new("bass").num("g", 3.0)],
            ),
            StemId::Highs => (
                "High frequencies (> 6kHz)",
                vec![highpass(6000.0), FilterStage::new("treble").num("g", 2.0)],
            ),
            StemId::Mids => (
                "Mid frequencies (500Hz - 4kHz)",
                vec![highpass(500.0), lowpass(4000.0)],
            ),
            StemId::Drums => (
                "Drum transients (basic extraction)",
                vec![
                    highpass(60.0),
                    lowpass(8000.0),
                    FilterStage::new("acompressor")
                        .db("threshold", -20.0)
                        .num("ratio", 8.0)
                        .num("attack", 0.5)
                        .num("release", 10.0),
                ],
            ),
        };

        Self {
            id,
            description,
            stages,
        }
    }
}

/// Catalogue entry for presenting stem types to users.
#[derive(Debug, Clone, Serialize)]
pub struct StemTypeInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

pub fn stem_types() -> Vec<StemTypeInfo> {
    StemId::ALL
        .into_iter()
        .map(|id| {
            let (name, description) = match id {
                StemId::Vocals => ("Vocals", "Vocal frequencies (300Hz - 5kHz)"),
                StemId::Instrumental => ("Instrumental", "Everything except vocals"),
                StemId::Bass => ("Bass", "Low frequencies (< 250Hz)"),
                StemId::Highs => ("Highs", "High frequencies (> 6kHz)"),
                StemId::Mids => ("Mids", "Mid frequencies (500Hz - 4kHz)"),
                StemId::Drums => ("Drums", "Drum transients (basic)"),
            };
            StemTypeInfo {
                id: id.as_str(),
                name,
                description,
            }
        })
        .collect()
}
