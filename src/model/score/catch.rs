use crate::model::{
    beatmap::{Beatmap, DifficultyAttribute},
    mods::Mods,
    score::ScoreRow
};

/// Catch the Beat performance model. A single difficulty value derived from
/// the star rating, scaled by length, combo, approach rate and accuracy.
#[derive(Debug)]
pub struct CatchTheBeatScore {
    row: ScoreRow,
    total_value: f32
}

impl CatchTheBeatScore {
    pub fn new(row: ScoreRow, beatmap: &Beatmap) -> CatchTheBeatScore {
        let mut score = CatchTheBeatScore { row, total_value: 0.0 };
        score.compute_total_value(beatmap);
        score
    }

    pub fn row(&self) -> &ScoreRow {
        &self.row
    }

    pub fn total_value(&self) -> f32 {
        self.total_value
    }

    fn compute_total_value(&mut self, beatmap: &Beatmap) {
        // Scores with unranked mods don't award pp
        if self.row.mods.is_disqualifying() {
            self.total_value = 0.0;
            return;
        }

        let stars = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::Aim);
        let mut value = (5.0 * (stars / 0.0049).max(1.0) - 4.0).powi(2) / 100_000.0;

        let total_hits = self.total_hits() as f32;
        let mut length_bonus = 0.95 + 0.3 * (total_hits / 2500.0).min(1.0);
        if total_hits > 2500.0 {
            length_bonus += (total_hits / 2500.0).log10() * 0.475;
        }
        value *= length_bonus;

        value *= 0.97f32.powi(self.row.num_miss);

        let beatmap_max_combo = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::MaxCombo);
        if beatmap_max_combo > 0.0 {
            value *= ((self.row.max_combo as f32).powf(0.8) / beatmap_max_combo.powf(0.8)).min(1.0);
        }

        let approach_rate = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::Ar);
        let mut approach_rate_factor = 1.0f32;
        if approach_rate > 9.0 {
            approach_rate_factor += 0.1 * (approach_rate - 9.0);
        }
        if approach_rate > 10.0 {
            approach_rate_factor += 0.1 * (approach_rate - 10.0);
        } else if approach_rate < 8.0 {
            approach_rate_factor += 0.025 * (8.0 - approach_rate);
        }
        value *= approach_rate_factor;

        if self.row.mods.contains(Mods::HIDDEN) {
            // Low AR reads harder under HD
            if approach_rate <= 10.0 {
                value *= 1.05 + 0.075 * (10.0 - approach_rate);
            } else {
                value *= 1.01 + 0.04 * (11.0 - approach_rate.min(11.0));
            }
        }

        if self.row.mods.contains(Mods::FLASHLIGHT) {
            value *= 1.35 * length_bonus;
        }

        value *= self.accuracy().powf(5.5);

        if self.row.mods.contains(Mods::NO_FAIL) {
            value *= 0.90;
        }

        if self.row.mods.contains(Mods::SPUN_OUT) {
            value *= 0.95;
        }

        self.total_value = value;
    }

    pub fn accuracy(&self) -> f32 {
        if self.total_hits() == 0 {
            return 0.0;
        }

        (self.total_successful_hits() as f32 / self.total_hits() as f32).clamp(0.0, 1.0)
    }

    // Droplet misses (katu) count as hits in catch
    pub fn total_hits(&self) -> i32 {
        self.row.num_50 + self.row.num_100 + self.row.num_300 + self.row.num_miss + self.row.num_katu
    }

    pub fn total_successful_hits(&self) -> i32 {
        self.row.num_50 + self.row.num_100 + self.row.num_300
    }
}

#[cfg(test)]
mod tests {
    use super::CatchTheBeatScore;
    use crate::{
        model::{
            beatmap::{Beatmap, DifficultyAttribute, RankedStatus},
            mods::Mods,
            score::ScoreRow
        },
        utils::test_utils::generate_beatmap
    };
    use approx::assert_abs_diff_eq;

    fn catch_map() -> Beatmap {
        generate_beatmap(
            1,
            RankedStatus::Ranked,
            &[
                (DifficultyAttribute::Aim, 3.2),
                (DifficultyAttribute::Ar, 9.0),
                (DifficultyAttribute::MaxCombo, 1200.0),
            ]
        )
    }

    fn catch_row(num_300: i32, num_miss: i32, num_katu: i32, mods: Mods) -> ScoreRow {
        ScoreRow {
            score_id: 1,
            user_id: 1,
            beatmap_id: 1,
            score: 5_000_000,
            max_combo: num_300,
            num_300,
            num_100: 30,
            num_50: 12,
            num_miss,
            num_geki: 0,
            num_katu,
            mods,
            pp: None
        }
    }

    #[test]
    fn test_droplet_misses_count_into_accuracy() {
        let score = CatchTheBeatScore::new(catch_row(950, 5, 3, Mods::NONE), &catch_map());

        assert_eq!(score.total_hits(), 1000);
        assert_eq!(score.total_successful_hits(), 992);
        // 992 successful out of 1000
        assert_abs_diff_eq!(score.accuracy(), 0.992, epsilon = 1e-6);
    }

    #[test]
    fn test_misses_cost_pp() {
        let clean = CatchTheBeatScore::new(catch_row(955, 0, 3, Mods::NONE), &catch_map());
        let missy = CatchTheBeatScore::new(catch_row(935, 20, 3, Mods::NONE), &catch_map());

        assert!(missy.total_value() < clean.total_value());
    }

    #[test]
    fn test_autoplay_awards_no_pp() {
        let score = CatchTheBeatScore::new(catch_row(950, 5, 3, Mods::AUTOPLAY), &catch_map());
        assert_eq!(score.total_value(), 0.0);
    }
}
