//! Musical key estimation and Camelot wheel lookups.

use async_trait::async_trait;
use rand::distr::weighted::WeightedIndex;
use rand::distr::Distribution;
use rand::Rng;
use std::path::Path;

/// Key name to Camelot code, majors (`B`) then minors (`A`).
pub const CAMELOT_WHEEL: [(&str, &str); 24] = [
    ("C major", "8B"),
    ("G major", "9B"),
    ("D major", "10B"),
    ("A major", "11B"),
    ("E major", "12B"),
    ("B major", "1B"),
    ("F# major", "2B"),
    ("C# major", "3B"),
    ("G# major", "4B"),
    ("D# major", "5B"),
    ("A# major", "6B"),
    ("F major", "7B"),
    ("A minor", "8A"),
    ("E minor", "9A"),
    ("B minor", "10A"),
    ("F# minor", "11A"),
    ("C# minor", "12A"),
    ("G# minor", "1A"),
    ("D# minor", "2A"),
    ("A# minor", "3A"),
    ("F minor", "4A"),
    ("C minor", "5A"),
    ("G minor", "6A"),
    ("D minor", "7A"),
];

pub fn camelot_code(key: &str) -> Option<&'static str> {
    CAMELOT_WHEEL
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, code)| *code)
}

pub fn key_for_camelot(code: &str) -> Option<&'static str> {
    CAMELOT_WHEEL
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(name, _)| *name)
}

fn split_code(code: &str) -> Option<(u8, char)> {
    let letter = code.chars().last()?;
    let number: u8 = code[..code.len() - letter.len_utf8()].parse().ok()?;
    if !(1..=12).contains(&number) || !matches!(letter, 'A' | 'B') {
        return None;
    }
    Some((number, letter))
}

/// Keys that mix harmonically with `key`: the relative major/minor at the
/// same position, then the neighbours one step down and one step up.
pub fn get_compatible_keys(key: &str) -> Vec<&'static str> {
    let Some((number, letter)) = camelot_code(key).and_then(split_code) else {
        return Vec::new();
    };

    let other_letter = if letter == 'A' { 'B' } else { 'A' };
    let previous = if number == 1 { 12 } else { number - 1 };
    let next = if number == 12 { 1 } else { number + 1 };

    [
        format!("{}{}", number, other_letter),
        format!("{}{}", previous, letter),
        format!("{}{}", next, letter),
    ]
    .iter()
    .filter_map(|code| key_for_camelot(code))
    .collect()
}

/// A key guess plus its Camelot code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEstimate {
    pub key: String,
    pub camelot_code: Option<String>,
}

impl KeyEstimate {
    pub fn from_key(key: &str) -> Self {
        Self {
            key: key.to_string(),
            camelot_code: camelot_code(key).map(str::to_string),
        }
    }
}

/// Source of key estimates for analysed files.
#[async_trait]
pub trait KeyEstimator: Send + Sync {
    async fn estimate(&self, path: &Path, bpm: Option<u32>) -> Option<KeyEstimate>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TempoBucket {
    Slow,
    Medium,
    Fast,
}

impl TempoBucket {
    /// Missing tempo counts as medium.
    pub fn for_bpm(bpm: Option<u32>) -> Self {
        match bpm {
            Some(b) if b < 90 => TempoBucket::Slow,
            Some(b) if b >= 120 => TempoBucket::Fast,
            _ => TempoBucket::Medium,
        }
    }

    pub fn weighted_keys(&self) -> &'static [(&'static str, u32)] {
        match self {
            TempoBucket::Slow => &[
                ("G major", 20),
                ("C major", 18),
                ("D major", 15),
                ("A minor", 15),
                ("E minor", 12),
                ("A# major", 10),
            ],
            TempoBucket::Medium => &[
                ("C minor", 18),
                ("G minor", 16),
                ("D minor", 14),
                ("A minor", 14),
                ("F major", 12),
                ("C major", 10),
            ],
            TempoBucket::Fast => &[
                ("C minor", 22),
                ("D minor", 18),
                ("E minor", 16),
                ("F minor", 14),
                ("G minor", 12),
                ("F# minor", 10),
            ],
        }
    }
}

/// Tempo-correlated weighted guess. Does not listen to the audio and is
/// not deterministic: two runs on the same file may disagree.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicKeyEstimator;

impl HeuristicKeyEstimator {
    const DEFAULT_KEY: &'static str = "C minor";

    pub fn pick<R: Rng + ?Sized>(bpm: Option<u32>, rng: &mut R) -> &'static str {
        let keys = TempoBucket::for_bpm(bpm).weighted_keys();
        match WeightedIndex::new(keys.iter().map(|(_, w)| *w)) {
            Ok(dist) => keys[dist.sample(rng)].0,
            Err(_) => Self::DEFAULT_KEY,
        }
    }
}

#[async_trait]
impl KeyEstimator for HeuristicKeyEstimator {
    async fn estimate(&self, _path: &Path, bpm: Option<u32>) -> Option<KeyEstimate> {
        let key = Self::pick(bpm, &mut rand::rng());
        Some(KeyEstimate::from_key(key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    #[test]
    fn test_camelot_wheel_is_a_bijection() {
        let keys: HashSet<&str> = CAMELOT_WHEEL.iter().map(|(k, _)| *k).collect();
        let codes: HashSet<&str> = CAMELOT_WHEEL.iter().map(|(_, c)| *c).collect();
        assert_eq!(keys.len(), 24);
        assert_eq!(codes.len(), 24);
        for (key, code) in CAMELOT_WHEEL {
            assert_eq!(key_for_camelot(code), Some(key));
        }
    }

    #[test]
    fn test_compatible_keys_c_minor() {
        assert_eq!(camelot_code("C minor"), Some("5A"));
        assert_eq!(
            get_compatible_keys("C minor"),
            vec!["D# major", "F minor", "G minor"]
        );
    }

    #[test]
    fn test_compatible_keys_a_minor() {
        assert_eq!(
            get_compatible_keys("A minor"),
            vec!["C major", "D minor", "E minor"]
        );
    }

    #[test]
    fn test_compatible_keys_wraparound() {
        // 12B toggles to 12A and wraps to 1B
        assert_eq!(
            get_compatible_keys("E major"),
            vec!["C# minor", "A major", "B major"]
        );
        // 1A wraps down to 12A
        assert_eq!(
            get_compatible_keys("G# minor"),
            vec!["B major", "C# minor", "D# minor"]
        );
    }

    #[test]
    fn test_every_key_has_three_distinct_neighbours() {
        for (key, _) in CAMELOT_WHEEL {
            let neighbours = get_compatible_keys(key);
            let unique: HashSet<&str> = neighbours.iter().copied().collect();
            assert_eq!(neighbours.len(), 3, "{}", key);
            assert_eq!(unique.len(), 3, "{}", key);
            assert!(!unique.contains(key), "{}", key);
        }
    }

    #[test]
    fn test_compatible_keys_unknown() {
        assert!(get_compatible_keys("H minor").is_empty());
        assert!(get_compatible_keys("").is_empty());
        assert!(get_compatible_keys("B♭ major").is_empty());
    }

    #[test]
    fn test_tempo_buckets() {
        assert_eq!(TempoBucket::for_bpm(Some(70)), TempoBucket::Slow);
        assert_eq!(TempoBucket::for_bpm(Some(89)), TempoBucket::Slow);
        assert_eq!(TempoBucket::for_bpm(Some(90)), TempoBucket::Medium);
        assert_eq!(TempoBucket::for_bpm(Some(119)), TempoBucket::Medium);
        assert_eq!(TempoBucket::for_bpm(Some(120)), TempoBucket::Fast);
        assert_eq!(TempoBucket::for_bpm(None), TempoBucket::Medium);
    }

    #[test]
    fn test_every_weighted_key_has_a_camelot_code() {
        for bucket in [TempoBucket::Slow, TempoBucket::Medium, TempoBucket::Fast] {
            for (key, _) in bucket.weighted_keys() {
                assert!(camelot_code(key).is_some(), "{}", key);
            }
        }
    }

    #[test]
    fn test_pick_stays_in_bucket() {
        let mut rng = StdRng::seed_from_u64(42);
        let fast: HashSet<&str> = TempoBucket::Fast
            .weighted_keys()
            .iter()
            .map(|(k, _)| *k)
            .collect();
        for _ in 0..200 {
            assert!(fast.contains(HeuristicKeyEstimator::pick(Some(140), &mut rng)));
        }
    }

    #[test]
    fn test_pick_reaches_several_keys() {
        let mut rng = StdRng::seed_from_u64(1);
        let seen: HashSet<&str> = (0..500)
            .map(|_| HeuristicKeyEstimator::pick(Some(75), &mut rng))
            .collect();
        assert!(seen.len() > 1);
    }

    #[tokio::test]
    async fn test_heuristic_estimate_has_camelot_code() {
        let estimate = HeuristicKeyEstimator
            .estimate(Path::new("/tmp/a.wav"), Some(100))
            .await
            .unwrap();
        assert!(estimate.camelot_code.is_some());
    }
}
