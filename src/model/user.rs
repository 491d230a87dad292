use std::cmp::Ordering;

/// A performance rating paired with its accuracy; used both for single
/// scores and for the user-level aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PpRecord {
    pub value: f32,
    pub accuracy: f32
}

/// Accumulates a user's per-score pp records and folds them into one
/// aggregate rating. Lives only for the duration of one pipeline run.
#[derive(Debug)]
pub struct User {
    user_id: i64,
    score_pp_records: Vec<PpRecord>,
    pp_record: PpRecord
}

impl User {
    pub fn new(user_id: i64) -> User {
        User {
            user_id,
            score_pp_records: Vec::new(),
            pp_record: PpRecord::default()
        }
    }

    pub fn id(&self) -> i64 {
        self.user_id
    }

    pub fn add_score_pp_record(&mut self, record: PpRecord) {
        self.score_pp_records.push(record);
    }

    /// Computes the aggregate rating: scores weighted by 0.95^i in
    /// descending pp order, accuracy as the matching weighted average.
    pub fn compute_pp_record(&mut self) {
        self.score_pp_records
            .sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));

        let mut factor = 1.0f32;
        let mut total_value = 0.0f32;
        let mut total_accuracy = 0.0f32;
        let mut total_weight = 0.0f32;

        for record in &self.score_pp_records {
            total_value += record.value * factor;
            total_accuracy += record.accuracy * factor;
            total_weight += factor;
            factor *= 0.95;
        }

        self.pp_record = if total_weight > 0.0 {
            PpRecord {
                value: total_value,
                accuracy: total_accuracy / total_weight
            }
        } else {
            PpRecord::default()
        };
    }

    pub fn pp_record(&self) -> PpRecord {
        self.pp_record
    }
}

#[cfg(test)]
mod tests {
    use super::{PpRecord, User};
    use approx::assert_abs_diff_eq;

    fn record(value: f32, accuracy: f32) -> PpRecord {
        PpRecord { value, accuracy }
    }

    #[test]
    fn test_empty_user_aggregates_to_zero() {
        let mut user = User::new(1);
        user.compute_pp_record();

        assert_eq!(user.pp_record().value, 0.0);
        assert_eq!(user.pp_record().accuracy, 0.0);
    }

    #[test]
    fn test_weighting_law() {
        let mut user = User::new(1);
        // Deliberately out of order; aggregation sorts by value descending
        user.add_score_pp_record(record(100.0, 0.5));
        user.add_score_pp_record(record(200.0, 1.0));
        user.add_score_pp_record(record(50.0, 0.25));
        user.compute_pp_record();

        // 200 + 100 * 0.95 + 50 * 0.95^2
        assert_abs_diff_eq!(user.pp_record().value, 340.125, epsilon = 1e-3);
        // (1.0 + 0.5 * 0.95 + 0.25 * 0.95^2) / (1 + 0.95 + 0.95^2)
        assert_abs_diff_eq!(user.pp_record().accuracy, 0.596_187, epsilon = 1e-4);
    }

    #[test]
    fn test_adding_a_score_strictly_increases_pp() {
        let mut user = User::new(1);
        user.add_score_pp_record(record(120.0, 0.9));
        user.add_score_pp_record(record(80.0, 0.8));
        user.compute_pp_record();
        let before = user.pp_record().value;

        user.add_score_pp_record(record(10.0, 0.7));
        user.compute_pp_record();

        assert!(user.pp_record().value > before);
    }

    #[test]
    fn test_aggregate_accuracy_stays_in_range() {
        let mut user = User::new(1);
        user.add_score_pp_record(record(300.0, 1.0));
        user.add_score_pp_record(record(250.0, 0.97));
        user.add_score_pp_record(record(10.0, 0.42));
        user.compute_pp_record();

        let accuracy = user.pp_record().accuracy;
        assert!(accuracy > 0.0 && accuracy <= 1.0);
    }
}
