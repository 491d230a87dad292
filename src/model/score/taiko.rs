use crate::model::{
    beatmap::{Beatmap, DifficultyAttribute},
    mods::Mods,
    score::ScoreRow
};

/// Taiko performance model.
#[derive(Debug)]
pub struct TaikoScore {
    row: ScoreRow,
    difficulty_value: f32,
    accuracy_value: f32,
    total_value: f32
}

impl TaikoScore {
    pub fn new(row: ScoreRow, beatmap: &Beatmap) -> TaikoScore {
        let mut score = TaikoScore {
            row,
            difficulty_value: 0.0,
            accuracy_value: 0.0,
            total_value: 0.0
        };

        score.compute_difficulty_value(beatmap);
        score.compute_accuracy_value(beatmap);
        score.compute_total_value();

        score
    }

    pub fn row(&self) -> &ScoreRow {
        &self.row
    }

    pub fn total_value(&self) -> f32 {
        self.total_value
    }

    fn compute_total_value(&mut self) {
        // Scores with unranked mods don't award pp
        if self.row.mods.is_disqualifying() {
            self.total_value = 0.0;
            return;
        }

        let mut multiplier = 1.12f32;

        if self.row.mods.contains(Mods::HIDDEN) {
            multiplier *= 1.075;
        }

        if self.row.mods.contains(Mods::EASY) {
            multiplier *= 0.975;
        }

        self.total_value =
            (self.difficulty_value.powf(1.1) + self.accuracy_value.powf(1.1)).powf(1.0 / 1.1) * multiplier;
    }

    fn compute_difficulty_value(&mut self, beatmap: &Beatmap) {
        let strain = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::Strain);
        self.difficulty_value = (5.0 * (strain / 0.115).max(1.0) - 4.0).powf(2.25) / 1150.0;

        let length_bonus = 1.0 + 0.1 * (self.total_hits() as f32 / 1500.0).min(1.0);
        self.difficulty_value *= length_bonus;

        self.difficulty_value *= 0.986f32.powi(self.row.num_miss);

        if self.row.mods.contains(Mods::EASY) {
            self.difficulty_value *= 0.980;
        }

        if self.row.mods.contains(Mods::HIDDEN) {
            self.difficulty_value *= 1.025;
        }

        if self.row.mods.contains(Mods::FLASHLIGHT) {
            self.difficulty_value *= 1.05 * length_bonus;
        }

        self.difficulty_value *= self.accuracy().powf(1.5);
    }

    fn compute_accuracy_value(&mut self, beatmap: &Beatmap) {
        let hit_window_300 = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::HitWindow300);
        if hit_window_300 <= 0.0 {
            self.accuracy_value = 0.0;
            return;
        }

        self.accuracy_value = (140.0 / hit_window_300).powf(1.1) * self.accuracy().powi(12) * 27.0;

        let length_bonus = (self.total_hits() as f32 / 1500.0).powf(0.3).min(1.15);
        self.accuracy_value *= length_bonus;

        // Slight HDFL bonus for accuracy
        if self.row.mods.contains(Mods::HIDDEN | Mods::FLASHLIGHT) {
            self.accuracy_value *= 1.10 * length_bonus;
        }
    }

    pub fn accuracy(&self) -> f32 {
        if self.total_hits() == 0 {
            return 0.0;
        }

        ((self.row.num_100 * 150 + self.row.num_300 * 300) as f32 / (self.total_hits() * 300) as f32).clamp(0.0, 1.0)
    }

    pub fn total_hits(&self) -> i32 {
        self.row.num_50 + self.row.num_100 + self.row.num_300 + self.row.num_miss
    }

    pub fn total_successful_hits(&self) -> i32 {
        self.row.num_50 + self.row.num_100 + self.row.num_300
    }
}

#[cfg(test)]
mod tests {
    use super::TaikoScore;
    use crate::{
        model::{
            beatmap::{Beatmap, DifficultyAttribute, RankedStatus},
            mods::Mods
        },
        utils::test_utils::{generate_beatmap, generate_score_row}
    };
    use approx::assert_abs_diff_eq;

    fn clean_map() -> Beatmap {
        generate_beatmap(
            1,
            RankedStatus::Ranked,
            &[(DifficultyAttribute::Strain, 3.0), (DifficultyAttribute::HitWindow300, 35.0)]
        )
    }

    #[test]
    fn test_clean_map_without_mods() {
        let row = generate_score_row(1, 1, 1400, 90, 0, 10, Mods::NONE);
        let score = TaikoScore::new(row, &clean_map());

        assert_eq!(score.total_hits(), 1500);
        assert_eq!(score.total_successful_hits(), 1490);
        assert_abs_diff_eq!(score.accuracy(), 0.963_333, epsilon = 1e-5);
        assert_abs_diff_eq!(score.total_value(), 128.2, epsilon = 0.5);
    }

    #[test]
    fn test_relax_awards_no_pp() {
        let row = generate_score_row(1, 1, 1400, 90, 0, 10, Mods::RELAX);
        let score = TaikoScore::new(row, &clean_map());

        assert_eq!(score.total_value(), 0.0);
        // Accuracy is still derived from the hit counts
        assert_abs_diff_eq!(score.accuracy(), 0.963_333, epsilon = 1e-5);
    }

    #[test]
    fn test_missing_hit_window_zeroes_the_accuracy_component() {
        let beatmap = generate_beatmap(1, RankedStatus::Ranked, &[(DifficultyAttribute::Strain, 3.0)]);

        let row = generate_score_row(1, 1, 1400, 90, 0, 10, Mods::NONE);
        let score = TaikoScore::new(row, &beatmap);

        // The difficulty component alone still awards pp
        assert!(score.total_value() > 0.0);
        let with_window = TaikoScore::new(generate_score_row(1, 1, 1400, 90, 0, 10, Mods::NONE), &clean_map());
        assert!(score.total_value() < with_window.total_value());
    }

    #[test]
    fn test_hidden_raises_the_total() {
        let plain = TaikoScore::new(generate_score_row(1, 1, 1400, 90, 0, 10, Mods::NONE), &clean_map());
        let hidden = TaikoScore::new(generate_score_row(1, 1, 1400, 90, 0, 10, Mods::HIDDEN), &clean_map());

        assert!(hidden.total_value() > plain.total_value());
    }

    #[test]
    fn test_misses_lower_the_total() {
        let clean = TaikoScore::new(generate_score_row(1, 1, 1400, 100, 0, 0, Mods::NONE), &clean_map());
        let missy = TaikoScore::new(generate_score_row(1, 1, 1400, 50, 0, 50, Mods::NONE), &clean_map());

        assert!(missy.total_value() < clean.total_value());
    }
}
