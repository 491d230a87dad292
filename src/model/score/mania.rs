use crate::model::{
    beatmap::{Beatmap, DifficultyAttribute},
    mods::Mods,
    score::ScoreRow
};

/// osu!mania performance model. Difficulty is gated by the score the player
/// reached after rescaling away score-reducing mods; accuracy comes from the
/// 300 hit window.
#[derive(Debug)]
pub struct ManiaScore {
    row: ScoreRow,
    strain_value: f32,
    acc_value: f32,
    total_value: f32
}

impl ManiaScore {
    pub fn new(row: ScoreRow, beatmap: &Beatmap) -> ManiaScore {
        let mut score = ManiaScore {
            row,
            strain_value: 0.0,
            acc_value: 0.0,
            total_value: 0.0
        };

        score.compute_strain_value(beatmap);
        score.compute_acc_value(beatmap);
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

        let mut multiplier = 0.8f32;

        if self.row.mods.contains(Mods::NO_FAIL) {
            multiplier *= 0.9;
        }

        if self.row.mods.contains(Mods::SPUN_OUT) {
            multiplier *= 0.95;
        }

        if self.row.mods.contains(Mods::EASY) {
            multiplier *= 0.5;
        }

        self.total_value = (self.strain_value.powf(1.1) + self.acc_value.powf(1.1)).powf(1.0 / 1.1) * multiplier;
    }

    fn compute_strain_value(&mut self, beatmap: &Beatmap) {
        // Rescale to the un-modded million so keymod scores stay comparable
        let mut score_multiplier = 1.0f32;
        if self.row.mods.contains(Mods::NO_FAIL) {
            score_multiplier *= 0.5;
        }
        if self.row.mods.contains(Mods::EASY) {
            score_multiplier *= 0.5;
        }
        if self.row.mods.contains(Mods::HALF_TIME) {
            score_multiplier *= 0.5;
        }

        let scaled_score = (self.row.score as f32 * (1.0 / score_multiplier)) as i32;

        let strain = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::Strain);
        let mut strain_value = (5.0 * (strain / 0.2).max(1.0) - 4.0).powf(2.2) / 135.0;

        strain_value *= 1.0 + 0.1 * (self.total_hits() as f32 / 1500.0).min(1.0);

        if scaled_score <= 500_000 {
            strain_value = 0.0;
        } else if scaled_score <= 600_000 {
            strain_value *= (scaled_score - 500_000) as f32 / 100_000.0 * 0.3;
        } else if scaled_score <= 700_000 {
            strain_value *= 0.25 * ((scaled_score - 600_000) as f32 / 100_000.0) + 0.3;
        } else if scaled_score <= 800_000 {
            strain_value *= 0.20 * ((scaled_score - 700_000) as f32 / 100_000.0) + 0.55;
        } else if scaled_score <= 900_000 {
            strain_value *= 0.15 * ((scaled_score - 800_000) as f32 / 100_000.0) + 0.75;
        } else {
            strain_value *= 0.1 * ((scaled_score - 900_000) as f32 / 100_000.0) + 0.9;
        }

        self.strain_value = strain_value;
    }

    fn compute_acc_value(&mut self, beatmap: &Beatmap) {
        let hit_window_300 = beatmap.difficulty_attribute(self.row.mods, DifficultyAttribute::HitWindow300);
        if hit_window_300 <= 0.0 {
            self.acc_value = 0.0;
            return;
        }

        self.acc_value = (0.2 - (hit_window_300 - 34.0) * 0.006667).max(0.0)
            * ((self.row.score as f32 - 960_000.0).max(0.0) / 40_000.0).powf(1.1);
    }

    pub fn accuracy(&self) -> f32 {
        if self.total_hits() == 0 {
            return 0.0;
        }

        ((self.row.num_50 * 50
            + self.row.num_100 * 100
            + self.row.num_katu * 200
            + (self.row.num_300 + self.row.num_geki) * 300) as f32
            / (self.total_hits() * 300) as f32)
            .clamp(0.0, 1.0)
    }

    // Mania reports all six judgements
    pub fn total_hits(&self) -> i32 {
        self.row.num_50
            + self.row.num_100
            + self.row.num_300
            + self.row.num_miss
            + self.row.num_geki
            + self.row.num_katu
    }

    pub fn total_successful_hits(&self) -> i32 {
        self.row.num_50 + self.row.num_100 + self.row.num_300 + self.row.num_geki + self.row.num_katu
    }
}
