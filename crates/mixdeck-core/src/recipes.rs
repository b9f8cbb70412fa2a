//! Named master-bus recipes and the config schema exposed to callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{CompressorSettings, EqBand, MasterConfig, TrackConfig, TrackRole};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecipeName {
    Default,
    Warm,
    Punchy,
    Bright,
    Streaming,
}

impl RecipeName {
    pub const ALL: [Self; 5] = [
        Self::Default,
        Self::Warm,
        Self::Punchy,
        Self::Bright,
        Self::Streaming,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Warm => "warm",
            Self::Punchy => "punchy",
            Self::Bright => "bright",
            Self::Streaming => "streaming",
        }
    }

    /// Total lookup: anything unregistered resolves to [`RecipeName::Default`].
    #[must_use]
    pub fn parse(name: &str) -> Self {
        let normalized = name.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|recipe| recipe.as_str() == normalized)
            .unwrap_or_else(|| {
                debug!(requested = %name, "unknown recipe, using default");
                Self::Default
            })
    }

    #[must_use]
    pub fn master(self) -> MasterConfig {
        match self {
            Self::Default => MasterConfig {
                eq: vec![
                    EqBand::new(60.0, 1.0, 0.7),
                    EqBand::new(250.0, -1.0, 1.0),
                    EqBand::new(10_000.0, 1.0, 0.7),
                ],
                compressor: compressor(-14.0, 2.0, 10.0, 150.0, 1.0),
                limiter_ceiling_db: -1.0,
                output_gain_db: 0.0,
            },
            Self::Warm => MasterConfig {
                eq: vec![
                    EqBand::new(100.0, 1.5, 0.7),
                    EqBand::new(3_500.0, -1.0, 1.0),
                    EqBand::new(12_000.0, -1.0, 0.7),
                ],
                compressor: compressor(-16.0, 2.5, 20.0, 200.0, 1.5),
                limiter_ceiling_db: -1.0,
                output_gain_db: 0.0,
            },
            Self::Punchy => MasterConfig {
                eq: vec![
                    EqBand::new(70.0, 2.0, 0.8),
                    EqBand::new(1_000.0, -1.0, 1.0),
                    EqBand::new(5_000.0, 1.5, 1.0),
                ],
                compressor: compressor(-12.0, 3.0, 5.0, 80.0, 2.0),
                limiter_ceiling_db: -0.8,
                output_gain_db: 0.5,
            },
            Self::Bright => MasterConfig {
                eq: vec![
                    EqBand::new(200.0, -1.5, 1.0),
                    EqBand::new(8_000.0, 2.0, 0.8),
                    EqBand::new(14_000.0, 1.5, 0.7),
                ],
                compressor: compressor(-14.0, 2.0, 10.0, 120.0, 1.0),
                limiter_ceiling_db: -1.0,
                output_gain_db: 0.0,
            },
            Self::Streaming => MasterConfig {
                eq: vec![EqBand::new(60.0, 0.5, 0.7)],
                compressor: compressor(-18.0, 1.8, 15.0, 180.0, 1.0),
                limiter_ceiling_db: -1.5,
                output_gain_db: -1.0,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MixRecipe {
    pub name: RecipeName,
    pub master: MasterConfig,
}

#[must_use]
pub fn resolve_recipe(name: Option<&str>) -> MixRecipe {
    let name = name.map_or(RecipeName::Default, RecipeName::parse);
    MixRecipe {
        name,
        master: name.master(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigSchema {
    pub roles: Vec<TrackRole>,
    pub recipes: Vec<RecipeName>,
    pub role_presets: BTreeMap<TrackRole, TrackConfig>,
    pub mix_recipes: BTreeMap<RecipeName, MasterConfig>,
}

#[must_use]
pub fn config_schema() -> ConfigSchema {
    ConfigSchema {
        roles: TrackRole::ALL.to_vec(),
        recipes: RecipeName::ALL.to_vec(),
        role_presets: TrackRole::ALL
            .into_iter()
            .map(|role| (role, role.preset()))
            .collect(),
        mix_recipes: RecipeName::ALL
            .into_iter()
            .map(|recipe| (recipe, recipe.master()))
            .collect(),
    }
}

const fn compressor(
    threshold_db: f32,
    ratio: f32,
    attack_ms: f32,
    release_ms: f32,
    makeup_db: f32,
) -> CompressorSettings {
    CompressorSettings {
        threshold_db,
        ratio,
        attack_ms,
        release_ms,
        makeup_db,
    }
}
