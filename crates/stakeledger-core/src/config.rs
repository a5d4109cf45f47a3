//! Network configuration and height-versioned milestones.
//!
//! Milestones are listed in ascending height order. Each entry may omit
//! fields; omitted fields inherit from the previous milestone, so only the
//! first entry must be complete.

use num_bigint::BigInt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::CoreError;

/// Default base unit: 10^8 indivisible units per coin.
pub const DEFAULT_BASE_UNIT: u64 = 100_000_000;

/// Default tolerance between a stake timestamp and the validator clock.
pub const DEFAULT_STAKE_TIMESTAMP_WINDOW: i64 = 120;

/// A stake multiplier, held as fixed-point hundredths.
///
/// JSON carries multipliers as decimals (`1.5`); they are rounded to two
/// places on load so weights stay exact integers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Multiplier(u32);

impl Multiplier {
    pub const fn from_hundredths(hundredths: u32) -> Self {
        Self(hundredths)
    }

    pub const fn whole(n: u32) -> Self {
        Self(n * 100)
    }

    pub const fn hundredths(&self) -> u32 {
        self.0
    }

    /// `amount × multiplier`, floored.
    pub fn apply(&self, amount: &BigInt) -> BigInt {
        amount * BigInt::from(self.0) / 100
    }
}

impl TryFrom<f64> for Multiplier {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        if !value.is_finite() || value <= 0.0 || value > 1_000_000.0 {
            return Err(format!("invalid stake multiplier {value}"));
        }
        Ok(Self((value * 100.0).round() as u32))
    }
}

impl From<Multiplier> for f64 {
    fn from(m: Multiplier) -> f64 {
        m.0 as f64 / 100.0
    }
}

/// Fully resolved consensus parameters effective from `height`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Milestone {
    pub height: u64,
    pub active_delegates: u32,
    pub top_delegates: u32,
    /// Target seconds between blocks.
    pub block_time: u32,
    /// Stake duration in seconds → weight multiplier.
    pub stake_levels: BTreeMap<i64, Multiplier>,
}

impl Milestone {
    pub fn multiplier_for(&self, duration: i64) -> Option<Multiplier> {
        self.stake_levels.get(&duration).copied()
    }
}

/// A milestone as written in configuration: every field but the height is
/// optional.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MilestoneEntry {
    height: u64,
    active_delegates: Option<u32>,
    top_delegates: Option<u32>,
    block_time: Option<u32>,
    stake_levels: Option<BTreeMap<i64, Multiplier>>,
}

/// The resolved milestone table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Milestones {
    entries: Vec<Milestone>,
}

impl Milestones {
    /// Validate and wrap already-resolved milestones.
    pub fn new(entries: Vec<Milestone>) -> Result<Self, CoreError> {
        let first = entries
            .first()
            .ok_or_else(|| CoreError::InvalidMilestones("no milestones".into()))?;
        if first.height != 1 {
            return Err(CoreError::InvalidMilestones(
                "first milestone must start at height 1".into(),
            ));
        }
        for pair in entries.windows(2) {
            if pair[1].height <= pair[0].height {
                return Err(CoreError::InvalidMilestones(format!(
                    "milestone heights not ascending at {}",
                    pair[1].height
                )));
            }
        }
        if let Some(m) = entries.iter().find(|m| m.active_delegates == 0) {
            return Err(CoreError::InvalidMilestones(format!(
                "zero active delegates at height {}",
                m.height
            )));
        }
        Ok(Self { entries })
    }

    fn resolve(raw: Vec<MilestoneEntry>) -> Result<Self, CoreError> {
        let mut entries: Vec<Milestone> = Vec::with_capacity(raw.len());
        for entry in raw {
            let milestone = match entries.last() {
                None => Milestone {
                    height: entry.height,
                    active_delegates: entry.active_delegates.ok_or_else(|| {
                        CoreError::InvalidMilestones("first milestone needs activeDelegates".into())
                    })?,
                    top_delegates: entry.top_delegates.or(entry.active_delegates).unwrap_or(0),
                    block_time: entry.block_time.unwrap_or(8),
                    stake_levels: entry.stake_levels.unwrap_or_default(),
                },
                Some(prev) => Milestone {
                    height: entry.height,
                    active_delegates: entry.active_delegates.unwrap_or(prev.active_delegates),
                    top_delegates: entry.top_delegates.unwrap_or(prev.top_delegates),
                    block_time: entry.block_time.unwrap_or(prev.block_time),
                    stake_levels: entry
                        .stake_levels
                        .unwrap_or_else(|| prev.stake_levels.clone()),
                },
            };
            entries.push(milestone);
        }
        Self::new(entries)
    }

    /// The milestone in effect at `height`.
    pub fn at(&self, height: u64) -> &Milestone {
        let idx = self.entries.partition_point(|m| m.height <= height);
        // Height 0 and below-first lookups fall back to the first entry.
        &self.entries[idx.saturating_sub(1)]
    }

    /// Milestones in ascending height order.
    pub fn iter(&self) -> impl Iterator<Item = &Milestone> {
        self.entries.iter()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawNetworkConfig {
    epoch: i64,
    #[serde(default = "default_base_unit")]
    base_unit: u64,
    #[serde(default = "default_window")]
    stake_timestamp_window: i64,
    milestones: Vec<MilestoneEntry>,
}

fn default_base_unit() -> u64 {
    DEFAULT_BASE_UNIT
}

fn default_window() -> i64 {
    DEFAULT_STAKE_TIMESTAMP_WINDOW
}

/// Network-wide parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkConfig {
    /// Unix seconds of network time zero.
    pub epoch: i64,
    /// Indivisible units per coin; stake amounts must be multiples of it.
    pub base_unit: u64,
    pub stake_timestamp_window: i64,
    pub milestones: Milestones,
}

impl NetworkConfig {
    /// Parse a JSON network configuration.
    pub fn from_json(json: &str) -> Result<Self, CoreError> {
        let raw: RawNetworkConfig = serde_json::from_str(json)?;
        if raw.base_unit == 0 {
            return Err(CoreError::InvalidConfig("baseUnit must be positive".into()));
        }
        if raw.stake_timestamp_window < 0 {
            return Err(CoreError::InvalidConfig(format!(
                "negative stakeTimestampWindow {}",
                raw.stake_timestamp_window
            )));
        }
        Ok(Self {
            epoch: raw.epoch,
            base_unit: raw.base_unit,
            stake_timestamp_window: raw.stake_timestamp_window,
            milestones: Milestones::resolve(raw.milestones)?,
        })
    }

    /// A development network: 51 delegates, quarterly stake levels.
    pub fn devnet() -> Self {
        let stake_levels = BTreeMap::from([
            (7_889_400, Multiplier::from_hundredths(150)),
            (15_778_800, Multiplier::whole(2)),
            (31_557_600, Multiplier::from_hundredths(250)),
            (63_115_200, Multiplier::whole(3)),
        ]);
        Self {
            epoch: 1_577_836_800,
            base_unit: DEFAULT_BASE_UNIT,
            stake_timestamp_window: DEFAULT_STAKE_TIMESTAMP_WINDOW,
            milestones: Milestones {
                entries: vec![Milestone {
                    height: 1,
                    active_delegates: 51,
                    top_delegates: 51,
                    block_time: 8,
                    stake_levels,
                }],
            },
        }
    }

    pub fn milestone(&self, height: u64) -> &Milestone {
        self.milestones.at(height)
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self::devnet()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"{
        "epoch": 1577836800,
        "milestones": [
            { "height": 1, "activeDelegates": 4, "blockTime": 8,
              "stakeLevels": { "60": 1.5, "120": 2 } },
            { "height": 9, "activeDelegates": 6 },
            { "height": 21, "stakeLevels": { "60": 3 } }
        ]
    }"#;

    #[test]
    fn test_from_json_inherits_fields() {
        let config = NetworkConfig::from_json(CONFIG).unwrap();
        assert_eq!(config.base_unit, DEFAULT_BASE_UNIT);
        assert_eq!(config.stake_timestamp_window, 120);

        let m2 = config.milestone(9);
        assert_eq!(m2.active_delegates, 6);
        assert_eq!(m2.block_time, 8);
        assert_eq!(m2.multiplier_for(120), Some(Multiplier::whole(2)));

        let m3 = config.milestone(1_000);
        assert_eq!(m3.active_delegates, 6);
        assert_eq!(m3.multiplier_for(60), Some(Multiplier::whole(3)));
        assert_eq!(m3.multiplier_for(120), None);
    }

    #[test]
    fn test_milestone_lookup_boundaries() {
        let config = NetworkConfig::from_json(CONFIG).unwrap();
        assert_eq!(config.milestone(0).height, 1);
        assert_eq!(config.milestone(8).height, 1);
        assert_eq!(config.milestone(9).height, 9);
        assert_eq!(config.milestone(20).height, 9);
        assert_eq!(config.milestone(21).height, 21);
    }

    #[test]
    fn test_multiplier_is_exact() {
        let m = Multiplier::try_from(1.5).unwrap();
        assert_eq!(m.hundredths(), 150);
        assert_eq!(m.apply(&BigInt::from(100_000_000u64)), BigInt::from(150_000_000u64));
        assert!(Multiplier::try_from(-1.0).is_err());
    }

    #[test]
    fn test_invalid_milestones_rejected() {
        let missing = r#"{ "epoch": 0, "milestones": [ { "height": 1 } ] }"#;
        assert!(matches!(
            NetworkConfig::from_json(missing),
            Err(CoreError::InvalidMilestones(_))
        ));

        let unordered = r#"{ "epoch": 0, "milestones": [
            { "height": 1, "activeDelegates": 4 }, { "height": 1, "activeDelegates": 5 } ] }"#;
        assert!(NetworkConfig::from_json(unordered).is_err());

        assert!(matches!(
            NetworkConfig::from_json("{"),
            Err(CoreError::ConfigParse(_))
        ));
    }

    #[test]
    fn test_degenerate_units_rejected() {
        let zero_unit = r#"{ "epoch": 0, "baseUnit": 0,
            "milestones": [ { "height": 1, "activeDelegates": 4 } ] }"#;
        assert!(matches!(
            NetworkConfig::from_json(zero_unit),
            Err(CoreError::InvalidConfig(_))
        ));

        let negative_window = r#"{ "epoch": 0, "stakeTimestampWindow": -1,
            "milestones": [ { "height": 1, "activeDelegates": 4 } ] }"#;
        assert!(matches!(
            NetworkConfig::from_json(negative_window),
            Err(CoreError::InvalidConfig(_))
        ));
    }
}
