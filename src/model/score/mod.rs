mod catch;
mod mania;
mod standard;
mod taiko;

pub use catch::CatchTheBeatScore;
pub use mania::ManiaScore;
pub use standard::StandardScore;
pub use taiko::TaikoScore;

use crate::model::{beatmap::Beatmap, gamemode::Gamemode, mods::Mods, user::PpRecord};

/// One row of `osu_scores<suffix>_high`, exactly as read from the replica.
#[derive(Debug, Clone)]
pub struct ScoreRow {
    pub score_id: i64,
    pub user_id: i64,
    pub beatmap_id: i32,
    pub score: i32,
    pub max_combo: i32,
    pub num_300: i32,
    pub num_100: i32,
    pub num_50: i32,
    pub num_miss: i32,
    pub num_geki: i32,
    pub num_katu: i32,
    pub mods: Mods,
    pub pp: Option<f32>
}

/// A fully computed score. Construction runs the mode's formulas eagerly;
/// the result is immutable.
#[derive(Debug)]
pub enum Score {
    Standard(StandardScore),
    Taiko(TaikoScore),
    CatchTheBeat(CatchTheBeatScore),
    Mania(ManiaScore)
}

impl Score {
    /// Builds the mode-specific variant so the right formulas run.
    pub fn new(mode: Gamemode, row: ScoreRow, beatmap: &Beatmap) -> Score {
        match mode {
            Gamemode::Standard => Score::Standard(StandardScore::new(row, beatmap)),
            Gamemode::Taiko => Score::Taiko(TaikoScore::new(row, beatmap)),
            Gamemode::CatchTheBeat => Score::CatchTheBeat(CatchTheBeatScore::new(row, beatmap)),
            Gamemode::Mania => Score::Mania(ManiaScore::new(row, beatmap))
        }
    }

    pub fn total_value(&self) -> f32 {
        match self {
            Score::Standard(score) => score.total_value(),
            Score::Taiko(score) => score.total_value(),
            Score::CatchTheBeat(score) => score.total_value(),
            Score::Mania(score) => score.total_value()
        }
    }

    pub fn accuracy(&self) -> f32 {
        match self {
            Score::Standard(score) => score.accuracy(),
            Score::Taiko(score) => score.accuracy(),
            Score::CatchTheBeat(score) => score.accuracy(),
            Score::Mania(score) => score.accuracy()
        }
    }

    pub fn total_hits(&self) -> i32 {
        match self {
            Score::Standard(score) => score.total_hits(),
            Score::Taiko(score) => score.total_hits(),
            Score::CatchTheBeat(score) => score.total_hits(),
            Score::Mania(score) => score.total_hits()
        }
    }

    pub fn total_successful_hits(&self) -> i32 {
        match self {
            Score::Standard(score) => score.total_successful_hits(),
            Score::Taiko(score) => score.total_successful_hits(),
            Score::CatchTheBeat(score) => score.total_successful_hits(),
            Score::Mania(score) => score.total_successful_hits()
        }
    }

    fn row(&self) -> &ScoreRow {
        match self {
            Score::Standard(score) => score.row(),
            Score::Taiko(score) => score.row(),
            Score::CatchTheBeat(score) => score.row(),
            Score::Mania(score) => score.row()
        }
    }

    pub fn score_id(&self) -> i64 {
        self.row().score_id
    }

    pub fn user_id(&self) -> i64 {
        self.row().user_id
    }

    pub fn beatmap_id(&self) -> i32 {
        self.row().beatmap_id
    }

    pub fn pp_record(&self) -> PpRecord {
        PpRecord {
            value: self.total_value(),
            accuracy: self.accuracy()
        }
    }

    /// The `UPDATE` persisting this score's recomputed pp.
    pub fn update_statement(&self, mode: Gamemode) -> String {
        format!(
            "UPDATE osu_scores{}_high SET pp = {} WHERE score_id = {};",
            mode.suffix(),
            self.total_value(),
            self.score_id()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Score;
    use crate::{
        model::{
            beatmap::{DifficultyAttribute, RankedStatus},
            gamemode::Gamemode,
            mods::Mods
        },
        utils::test_utils::{generate_beatmap, generate_score_row}
    };

    #[test]
    fn test_disqualifying_mods_zero_every_mode() {
        let beatmap = generate_beatmap(
            1,
            RankedStatus::Ranked,
            &[
                (DifficultyAttribute::Strain, 3.0),
                (DifficultyAttribute::HitWindow300, 35.0),
                (DifficultyAttribute::Aim, 2.5),
                (DifficultyAttribute::Speed, 2.0),
                (DifficultyAttribute::Od, 9.0),
                (DifficultyAttribute::Ar, 9.5),
                (DifficultyAttribute::MaxCombo, 1500.0),
            ]
        );

        for mode in [Gamemode::Standard, Gamemode::Taiko, Gamemode::CatchTheBeat, Gamemode::Mania] {
            for mods in [Mods::RELAX, Mods::RELAX2, Mods::AUTOPLAY] {
                let row = generate_score_row(1, 1, 1000, 50, 5, 3, mods);
                let score = Score::new(mode, row, &beatmap);
                assert_eq!(score.total_value(), 0.0, "{:?} with {:?} must award no pp", mode, mods);
            }
        }
    }

    #[test]
    fn test_accuracy_range_holds_in_every_mode() {
        let beatmap = generate_beatmap(
            1,
            RankedStatus::Ranked,
            &[
                (DifficultyAttribute::Strain, 3.0),
                (DifficultyAttribute::HitWindow300, 35.0),
                (DifficultyAttribute::Aim, 2.5),
                (DifficultyAttribute::Speed, 2.0),
                (DifficultyAttribute::Od, 9.0),
                (DifficultyAttribute::Ar, 9.5),
                (DifficultyAttribute::MaxCombo, 1500.0),
            ]
        );

        for mode in [Gamemode::Standard, Gamemode::Taiko, Gamemode::CatchTheBeat, Gamemode::Mania] {
            let row = generate_score_row(1, 1, 900, 80, 10, 30, Mods::NONE);
            let score = Score::new(mode, row, &beatmap);
            let accuracy = score.accuracy();
            assert!((0.0..=1.0).contains(&accuracy), "{:?} accuracy {} out of range", mode, accuracy);
        }
    }

    #[test]
    fn test_no_hits_means_zero_accuracy() {
        let beatmap = generate_beatmap(1, RankedStatus::Ranked, &[]);

        for mode in [Gamemode::Standard, Gamemode::Taiko, Gamemode::CatchTheBeat, Gamemode::Mania] {
            let row = generate_score_row(1, 1, 0, 0, 0, 0, Mods::NONE);
            let score = Score::new(mode, row, &beatmap);
            assert_eq!(score.total_hits(), 0);
            assert_eq!(score.accuracy(), 0.0);
        }
    }

    #[test]
    fn test_update_statement_targets_the_mode_table() {
        let beatmap = generate_beatmap(7, RankedStatus::Ranked, &[(DifficultyAttribute::Strain, 3.0)]);
        let row = generate_score_row(42, 7, 100, 0, 0, 0, Mods::NONE);
        let score = Score::new(Gamemode::Taiko, row, &beatmap);

        let statement = score.update_statement(Gamemode::Taiko);
        assert!(statement.starts_with("UPDATE osu_scores_taiko_high SET pp = "));
        assert!(statement.ends_with("WHERE score_id = 42;"));
    }
}
