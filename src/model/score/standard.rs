use crate::model::{
    beatmap::{Beatmap, DifficultyAttribute},
    mods::Mods,
    score::ScoreRow
};

/// osu!standard performance model: aim, speed, accuracy and flashlight
/// components combined with a shared multiplier.
#[derive(Debug)]
pub struct StandardScore {
    row: ScoreRow,
    aim_value: f32,
    speed_value: f32,
    acc_value: f32,
    flashlight_value: f32,
    effective_miss_count: i32,
    total_value: f32
}

impl StandardScore {
    pub fn new(row: ScoreRow, beatmap: &Beatmap) -> StandardScore {
        let mut score = StandardScore {
            row,
            aim_value: 0.0,
            speed_value: 0.0,
            acc_value: 0.0,
            flashlight_value: 0.0,
            effective_miss_count: 0,
            total_value: 0.0
        };

        score.compute_effective_miss_count(beatmap);

        score.compute_aim_value(beatmap);
        score.compute_speed_value(beatmap);
        score.compute_acc_value(beatmap);
        score.compute_flashlight_value(beatmap);

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

        if self.row.mods.contains(Mods::NO_FAIL) {
            multiplier *= (1.0 - 0.02 * self.effective_miss_count as f32).max(0.9);
        }

        if self.row.mods.contains(Mods::SPUN_OUT) {
            multiplier *= 0.95;
        }

        self.total_value = (self.aim_value.powf(1.1)
            + self.speed_value.powf(1.1)
            + self.acc_value.powf(1.1)
            + self.flashlight_value.powf(1.1))
        .powf(1.0 / 1.1)
            * multiplier;
    }

    // Guesses misses + slider breaks from the combo the player kept. The
    // hit-object count minus hit circles approximates the slider count.
    fn compute_effective_miss_count(&mut self, beatmap: &Beatmap) {
        let mut combo_based_miss_count = 0.0f32;

        let beatmap_max_combo = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::MaxCombo);
        if beatmap_max_combo > 0.0 {
            let full_combo_threshold = beatmap_max_combo - 0.1 * (self.total_hits() - beatmap.num_hit_circles()) as f32;
            if (self.row.max_combo as f32) < full_combo_threshold {
                combo_based_miss_count = full_combo_threshold / (self.row.max_combo as f32).max(1.0);
            }
        }

        // Combo-derived misses can exceed the hit count; clamp before use
        combo_based_miss_count = combo_based_miss_count.min(self.total_hits() as f32);

        self.effective_miss_count = self.row.num_miss.max(combo_based_miss_count as i32);
    }

    fn length_bonus(&self) -> f32 {
        let total_hits = self.total_hits() as f32;
        0.95
            + 0.4 * (total_hits / 2000.0).min(1.0)
            + if total_hits > 2000.0 { (total_hits / 2000.0).log10() * 0.5 } else { 0.0 }
    }

    fn combo_scaling_factor(&self, beatmap: &Beatmap) -> f32 {
        let beatmap_max_combo = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::MaxCombo);
        if beatmap_max_combo > 0.0 {
            ((self.row.max_combo as f32).powf(0.8) / beatmap_max_combo.powf(0.8)).min(1.0)
        } else {
            1.0
        }
    }

    fn compute_aim_value(&mut self, beatmap: &Beatmap) {
        let mut raw_aim = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::Aim);

        if self.row.mods.contains(Mods::TOUCH_DEVICE) {
            raw_aim = raw_aim.powf(0.8);
        }

        self.aim_value = (5.0 * (raw_aim / 0.0675).max(1.0) - 4.0).powi(3) / 100_000.0;

        let length_bonus = self.length_bonus();
        self.aim_value *= length_bonus;

        if self.effective_miss_count > 0 {
            self.aim_value *= 0.97
                * (1.0 - (self.effective_miss_count as f32 / self.total_hits() as f32).powf(0.775))
                    .powi(self.effective_miss_count);
        }

        self.aim_value *= self.combo_scaling_factor(beatmap);

        let approach_rate = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::Ar);
        let mut approach_rate_factor = 0.0f32;
        if approach_rate > 10.33 {
            approach_rate_factor = 0.3 * (approach_rate - 10.33);
        } else if approach_rate < 8.0 {
            approach_rate_factor = 0.1 * (8.0 - approach_rate);
        }

        // Longer maps with extreme AR are worth more
        self.aim_value *= 1.0 + approach_rate_factor * length_bonus;

        // Reading with HD gets harder the lower the AR
        if self.row.mods.contains(Mods::HIDDEN) {
            self.aim_value *= 1.0 + 0.04 * (12.0 - approach_rate);
        }

        let overall_difficulty = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::Od);
        self.aim_value *= 0.5 + self.accuracy() / 2.0;
        self.aim_value *= 0.98 + overall_difficulty * overall_difficulty / 2500.0;
    }

    fn compute_speed_value(&mut self, beatmap: &Beatmap) {
        let raw_speed = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::Speed);
        self.speed_value = (5.0 * (raw_speed / 0.0675).max(1.0) - 4.0).powi(3) / 100_000.0;

        let length_bonus = self.length_bonus();
        self.speed_value *= length_bonus;

        if self.effective_miss_count > 0 {
            self.speed_value *= 0.97
                * (1.0 - (self.effective_miss_count as f32 / self.total_hits() as f32).powf(0.775))
                    .powf((self.effective_miss_count as f32).powf(0.875));
        }

        self.speed_value *= self.combo_scaling_factor(beatmap);

        let approach_rate = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::Ar);
        if approach_rate > 10.33 {
            self.speed_value *= 1.0 + 0.3 * (approach_rate - 10.33) * length_bonus;
        }

        if self.row.mods.contains(Mods::HIDDEN) {
            self.speed_value *= 1.0 + 0.04 * (12.0 - approach_rate);
        }

        let overall_difficulty = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::Od);
        self.speed_value *= (0.95 + overall_difficulty * overall_difficulty / 750.0)
            * self.accuracy().powf((14.5 - overall_difficulty.max(8.0)) / 2.0);

        // Punish mashing: 50s past the expected rate count against speed
        let total_hits = self.total_hits() as f32;
        if self.row.num_50 as f32 >= total_hits / 500.0 {
            self.speed_value *= 0.98f32.powf(self.row.num_50 as f32 - total_hits / 500.0);
        }
    }

    fn compute_acc_value(&mut self, beatmap: &Beatmap) {
        // Only hit circles carry an accuracy window
        let num_hit_objects_with_accuracy = beatmap.num_hit_circles();
        let better_accuracy_percentage = if num_hit_objects_with_accuracy > 0 {
            (((self.row.num_300 - (self.total_hits() - num_hit_objects_with_accuracy)) * 6
                + self.row.num_100 * 2
                + self.row.num_50) as f32
                / (num_hit_objects_with_accuracy * 6) as f32)
                .max(0.0)
        } else {
            0.0
        };

        let overall_difficulty = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::Od);
        self.acc_value = 1.52163f32.powf(overall_difficulty) * better_accuracy_percentage.powi(24) * 2.83;

        self.acc_value *= (num_hit_objects_with_accuracy as f32 / 1000.0).powf(0.3).min(1.15);

        if self.row.mods.contains(Mods::HIDDEN) {
            self.acc_value *= 1.08;
        }

        if self.row.mods.contains(Mods::FLASHLIGHT) {
            self.acc_value *= 1.02;
        }
    }

    fn compute_flashlight_value(&mut self, beatmap: &Beatmap) {
        if !self.row.mods.contains(Mods::FLASHLIGHT) {
            self.flashlight_value = 0.0;
            return;
        }

        let raw_flashlight = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::Flashlight);
        self.flashlight_value = raw_flashlight * raw_flashlight * 25.0;

        if self.row.mods.contains(Mods::HIDDEN) {
            self.flashlight_value *= 1.3;
        }

        if self.effective_miss_count > 0 {
            self.flashlight_value *= 0.97
                * (1.0 - (self.effective_miss_count as f32 / self.total_hits() as f32).powf(0.775))
                    .powf((self.effective_miss_count as f32).powf(0.875));
        }

        self.flashlight_value *= self.combo_scaling_factor(beatmap);

        // Shorter maps spend a larger share of their length at low combo,
        // where the flashlight radius is biggest
        let total_hits = self.total_hits() as f32;
        self.flashlight_value *= 0.7
            + 0.1 * (total_hits / 200.0).min(1.0)
            + if total_hits > 200.0 { 0.2 * ((total_hits - 200.0) / 200.0).min(1.0) } else { 0.0 };

        let overall_difficulty = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::Od);
        self.flashlight_value *= 0.5 + self.accuracy() / 2.0;
        self.flashlight_value *= 0.98 + overall_difficulty * overall_difficulty / 2500.0;
    }

    pub fn accuracy(&self) -> f32 {
        if self.total_hits() == 0 {
            return 0.0;
        }

        ((self.row.num_50 * 50 + self.row.num_100 * 100 + self.row.num_300 * 300) as f32
            / (self.total_hits() * 300) as f32)
            .clamp(0.0, 1.0)
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
    use super::StandardScore;
    use crate::{
        model::{
            beatmap::{Beatmap, DifficultyAttribute, RankedStatus},
            mods::Mods
        },
        utils::test_utils::{generate_beatmap, generate_score_row}
    };
    use approx::assert_abs_diff_eq;

    fn standard_map() -> Beatmap {
        let mut beatmap = generate_beatmap(
            1,
            RankedStatus::Ranked,
            &[
                (DifficultyAttribute::Aim, 2.5),
                (DifficultyAttribute::Speed, 2.2),
                (DifficultyAttribute::Od, 9.0),
                (DifficultyAttribute::Ar, 9.4),
                (DifficultyAttribute::MaxCombo, 1600.0),
            ]
        );
        beatmap.set_num_hit_circles(900);
        beatmap
    }

    #[test]
    fn test_full_combo_awards_finite_pp() {
        let mut row = generate_score_row(1, 1, 1000, 40, 0, 0, Mods::NONE);
        row.max_combo = 1600;
        let score = StandardScore::new(row, &standard_map());

        assert!(score.total_value() > 0.0);
        assert!(score.total_value().is_finite());
    }

    #[test]
    fn test_accuracy_formula() {
        let row = generate_score_row(1, 1, 900, 60, 20, 20, Mods::NONE);
        let score = StandardScore::new(row, &standard_map());

        // (20*50 + 60*100 + 900*300) / (1000 * 300)
        assert_abs_diff_eq!(score.accuracy(), 0.923_333, epsilon = 1e-5);
    }

    #[test]
    fn test_dropped_combo_is_penalized() {
        let mut full = generate_score_row(1, 1, 1000, 40, 0, 0, Mods::NONE);
        full.max_combo = 1600;
        let mut broken = generate_score_row(2, 1, 1000, 40, 0, 0, Mods::NONE);
        broken.max_combo = 400;

        let full = StandardScore::new(full, &standard_map());
        let broken = StandardScore::new(broken, &standard_map());

        assert!(broken.total_value() < full.total_value());
    }

    #[test]
    fn test_flashlight_component_needs_the_mod() {
        let mut beatmap = standard_map();
        beatmap.set_difficulty_attribute(Mods::FLASHLIGHT, DifficultyAttribute::Flashlight, 2.1);
        beatmap.set_difficulty_attribute(Mods::FLASHLIGHT, DifficultyAttribute::Aim, 2.5);
        beatmap.set_difficulty_attribute(Mods::FLASHLIGHT, DifficultyAttribute::Speed, 2.2);
        beatmap.set_difficulty_attribute(Mods::FLASHLIGHT, DifficultyAttribute::Od, 9.0);
        beatmap.set_difficulty_attribute(Mods::FLASHLIGHT, DifficultyAttribute::Ar, 9.4);
        beatmap.set_difficulty_attribute(Mods::FLASHLIGHT, DifficultyAttribute::MaxCombo, 1600.0);

        let mut without = generate_score_row(1, 1, 1000, 40, 0, 0, Mods::NONE);
        without.max_combo = 1600;
        let mut with = generate_score_row(2, 1, 1000, 40, 0, 0, Mods::FLASHLIGHT);
        with.max_combo = 1600;

        let without = StandardScore::new(without, &beatmap);
        let with = StandardScore::new(with, &beatmap);

        assert!(with.total_value() > without.total_value());
    }

    #[test]
    fn test_autopilot_awards_no_pp() {
        let row = generate_score_row(1, 1, 1000, 40, 0, 0, Mods::RELAX2);
        let score = StandardScore::new(row, &standard_map());

        assert_eq!(score.total_value(), 0.0);
    }
}
