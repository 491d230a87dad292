use crate::model::mods::Mods;
use serde_repr::{Deserialize_repr, Serialize_repr};
use std::{collections::HashMap, convert::TryFrom};

/// Ranked status of a beatmap (the `approved` column).
#[derive(Deserialize_repr, Serialize_repr, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i8)]
pub enum RankedStatus {
    Graveyard = -2,
    Wip = -1,
    Pending = 0,
    Ranked = 1,
    Approved = 2,
    Qualified = 3,
    Loved = 4
}

impl TryFrom<i32> for RankedStatus {
    type Error = ();

    fn try_from(v: i32) -> Result<Self, Self::Error> {
        match v {
            -2 => Ok(RankedStatus::Graveyard),
            -1 => Ok(RankedStatus::Wip),
            0 => Ok(RankedStatus::Pending),
            1 => Ok(RankedStatus::Ranked),
            2 => Ok(RankedStatus::Approved),
            3 => Ok(RankedStatus::Qualified),
            4 => Ok(RankedStatus::Loved),
            _ => Err(())
        }
    }
}

/// Symbolic difficulty attribute names, interned from `osu_difficulty_attribs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DifficultyAttribute {
    Aim,
    Speed,
    Od,
    Ar,
    MaxCombo,
    Strain,
    HitWindow300,
    ScoreMultiplier,
    Flashlight
}

impl DifficultyAttribute {
    pub fn from_name(name: &str) -> Option<DifficultyAttribute> {
        match name {
            "Aim" => Some(DifficultyAttribute::Aim),
            "Speed" => Some(DifficultyAttribute::Speed),
            "OD" => Some(DifficultyAttribute::Od),
            "AR" => Some(DifficultyAttribute::Ar),
            "Max combo" => Some(DifficultyAttribute::MaxCombo),
            "Strain" => Some(DifficultyAttribute::Strain),
            "Hit window 300" => Some(DifficultyAttribute::HitWindow300),
            "Score multiplier" => Some(DifficultyAttribute::ScoreMultiplier),
            "Flashlight" => Some(DifficultyAttribute::Flashlight),
            _ => None
        }
    }
}

/// Maps `attrib_id` values onto [`DifficultyAttribute`]s.
#[derive(Debug, Default)]
pub struct DifficultyAttributeTable {
    by_id: Vec<Option<DifficultyAttribute>>
}

impl DifficultyAttributeTable {
    pub fn new() -> DifficultyAttributeTable {
        DifficultyAttributeTable { by_id: Vec::new() }
    }

    pub fn insert(&mut self, attrib_id: i32, name: &str) {
        let index = attrib_id as usize;
        if self.by_id.len() < index + 1 {
            self.by_id.resize(index + 1, None);
        }

        self.by_id[index] = DifficultyAttribute::from_name(name);
    }

    pub fn resolve(&self, attrib_id: i32) -> Option<DifficultyAttribute> {
        self.by_id.get(attrib_id as usize).copied().flatten()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// A beatmap with its pre-computed difficulty attributes, keyed by the
/// difficulty-relevant part of a mod combination.
#[derive(Debug, Clone)]
pub struct Beatmap {
    id: i32,
    ranked_status: RankedStatus,
    score_version: i32,
    num_hit_circles: i32,
    difficulty: HashMap<Mods, HashMap<DifficultyAttribute, f32>>
}

impl Beatmap {
    pub fn new(id: i32) -> Beatmap {
        Beatmap {
            id,
            ranked_status: RankedStatus::Pending,
            score_version: 1,
            num_hit_circles: 0,
            difficulty: HashMap::new()
        }
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn ranked_status(&self) -> RankedStatus {
        self.ranked_status
    }

    pub fn set_ranked_status(&mut self, ranked_status: RankedStatus) {
        self.ranked_status = ranked_status;
    }

    pub fn score_version(&self) -> i32 {
        self.score_version
    }

    pub fn set_score_version(&mut self, score_version: i32) {
        self.score_version = score_version;
    }

    pub fn num_hit_circles(&self) -> i32 {
        self.num_hit_circles
    }

    pub fn set_num_hit_circles(&mut self, num_hit_circles: i32) {
        self.num_hit_circles = num_hit_circles;
    }

    pub fn set_difficulty_attribute(&mut self, mods: Mods, attribute: DifficultyAttribute, value: f32) {
        self.difficulty
            .entry(mods.difficulty_mask())
            .or_default()
            .insert(attribute, value);
    }

    /// Looks up a pre-computed attribute for the given mod combination.
    /// Attributes that were never stored read as 0.
    pub fn difficulty_attribute(&self, mods: Mods, attribute: DifficultyAttribute) -> f32 {
        self.difficulty
            .get(&mods.difficulty_mask())
            .and_then(|attributes| attributes.get(&attribute))
            .copied()
            .unwrap_or(0.0)
    }
}
