//! Archetype - Racer templates and the catalog they are loaded into
//!
//! Each archetype carries a speed profile and exactly one ability.
//! The catalog is immutable once loaded and referenced by index.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::race_server::race::LANE_COUNT;

/// The ten ability behaviors a racer can carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityKind {
    NoAbility,
    PercentProc,
    FixedBoost,
    PositionConditional,
    CircularDrain,
    RankAttack,
    ReverseModeToggle,
    FlatRandomChoice,
    ScaleAllAbilitySpeed,
    ClearNegative,
}

impl AbilityKind {
    /// Kinds in legacy `skl` code order (0..=9, and -10..=-1 from the back)
    const LEGACY_ORDER: [AbilityKind; 10] = [
        AbilityKind::PercentProc,
        AbilityKind::FixedBoost,
        AbilityKind::PositionConditional,
        AbilityKind::CircularDrain,
        AbilityKind::RankAttack,
        AbilityKind::ReverseModeToggle,
        AbilityKind::FlatRandomChoice,
        AbilityKind::ScaleAllAbilitySpeed,
        AbilityKind::ClearNegative,
        AbilityKind::NoAbility,
    ];
}

/// Which half of a frame an ability resolves in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AbilityPhase {
    Positive,
    Negative,
}

/// Decode a legacy signed skill code into its explicit kind and phase.
pub fn decode_skill_code(skl: i32) -> Result<(AbilityKind, AbilityPhase), CatalogError> {
    let (index, phase) = match skl {
        0..=9 => (skl, AbilityPhase::Positive),
        -10..=-1 => (10 + skl, AbilityPhase::Negative),
        _ => return Err(CatalogError::InvalidSkillCode(skl)),
    };
    Ok((AbilityKind::LEGACY_ORDER[index as usize], phase))
}

/// Catalog lookup and load failures
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("unknown archetype id {id} (catalog holds {len})")]
    UnknownArchetype { id: usize, len: usize },

    #[error("invalid legacy skill code {0}")]
    InvalidSkillCode(i32),

    #[error("catalog holds no archetypes")]
    Empty,

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// A named racer template
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archetype {
    pub name: String,
    /// Random component of the per-frame increment
    pub speed_stat: i32,
    /// Flat component of the per-frame increment
    pub base_stat: i32,
    pub description: String,
    pub ability: AbilityKind,
    pub phase: AbilityPhase,
    pub arg1: i32,
    pub arg2: i32,
}

impl Archetype {
    /// Archetype without an ability, resolving in the positive phase
    pub fn plain(name: impl Into<String>, speed_stat: i32, base_stat: i32) -> Self {
        Self {
            name: name.into(),
            speed_stat,
            base_stat,
            description: String::new(),
            ability: AbilityKind::NoAbility,
            phase: AbilityPhase::Positive,
            arg1: 0,
            arg2: 0,
        }
    }

    /// Replace the ability descriptor
    pub fn with_ability(
        mut self,
        ability: AbilityKind,
        phase: AbilityPhase,
        arg1: i32,
        arg2: i32,
    ) -> Self {
        self.ability = ability;
        self.phase = phase;
        self.arg1 = arg1;
        self.arg2 = arg2;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Lobby speed bar: guaranteed part of the profile
    pub fn basic_speed_bar(&self) -> i32 {
        self.speed_stat
            .saturating_mul(2)
            .saturating_add(self.base_stat.saturating_mul(8))
    }

    /// Lobby speed bar: best case of the profile
    pub fn max_speed_bar(&self) -> i32 {
        self.speed_stat
            .saturating_mul(10)
            .saturating_add(self.base_stat.saturating_mul(8))
    }
}

/// On-disk record, either explicit or carrying a legacy `skl` code
#[derive(Debug, Clone, Deserialize)]
struct ArchetypeRecord {
    name: String,
    spd: i32,
    bas: i32,
    #[serde(default)]
    des: String,
    #[serde(default)]
    skl: Option<i32>,
    #[serde(default)]
    ability: Option<AbilityKind>,
    #[serde(default)]
    phase: Option<AbilityPhase>,
    #[serde(default)]
    arg1: i32,
    #[serde(default)]
    arg2: i32,
}

impl TryFrom<ArchetypeRecord> for Archetype {
    type Error = CatalogError;

    fn try_from(record: ArchetypeRecord) -> Result<Self, Self::Error> {
        let (ability, phase) = match (record.ability, record.skl) {
            (Some(kind), _) => (kind, record.phase.unwrap_or(AbilityPhase::Positive)),
            (None, Some(skl)) => decode_skill_code(skl)?,
            (None, None) => (AbilityKind::NoAbility, AbilityPhase::Positive),
        };

        Ok(Self {
            name: record.name,
            speed_stat: record.spd,
            base_stat: record.bas,
            description: record.des,
            ability,
            phase,
            arg1: record.arg1,
            arg2: record.arg2,
        })
    }
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    info: Vec<ArchetypeRecord>,
}

/// Immutable archetype lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Catalog {
    archetypes: Vec<Archetype>,
}

impl Catalog {
    pub fn new(archetypes: Vec<Archetype>) -> Self {
        Self { archetypes }
    }

    /// Load a `{"info": [...]}` catalog document
    pub fn from_json_str(json: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        let archetypes = document
            .info
            .into_iter()
            .map(Archetype::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        log::info!("Loaded archetype catalog with {} entries", archetypes.len());
        Ok(Self::new(archetypes))
    }

    pub fn get(&self, id: usize) -> Result<&Archetype, CatalogError> {
        self.archetypes.get(id).ok_or(CatalogError::UnknownArchetype {
            id,
            len: self.archetypes.len(),
        })
    }

    pub fn len(&self) -> usize {
        self.archetypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archetypes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Archetype> {
        self.archetypes.iter()
    }

    /// Draw a uniformly random lineup; the same archetype may fill several lanes
    pub fn random_lanes<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
    ) -> Result<[usize; LANE_COUNT], CatalogError> {
        if self.archetypes.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut lanes = [0; LANE_COUNT];
        for lane in lanes.iter_mut() {
            *lane = rng.gen_range(0..self.archetypes.len());
        }
        Ok(lanes)
    }
}
