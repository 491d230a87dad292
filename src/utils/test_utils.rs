use crate::model::{
    beatmap::{Beatmap, DifficultyAttribute, RankedStatus},
    mods::Mods,
    score::ScoreRow
};

pub fn generate_beatmap(
    beatmap_id: i32,
    ranked_status: RankedStatus,
    attributes: &[(DifficultyAttribute, f32)]
) -> Beatmap {
    let mut beatmap = Beatmap::new(beatmap_id);
    beatmap.set_ranked_status(ranked_status);
    beatmap.set_score_version(1);

    for (attribute, value) in attributes {
        beatmap.set_difficulty_attribute(Mods::NONE, *attribute, *value);
    }

    beatmap
}

pub fn generate_score_row(
    score_id: i64,
    beatmap_id: i32,
    num_300: i32,
    num_100: i32,
    num_50: i32,
    num_miss: i32,
    mods: Mods
) -> ScoreRow {
    ScoreRow {
        score_id,
        user_id: 1,
        beatmap_id,
        score: 1_000_000,
        max_combo: num_300 + num_100 + num_50,
        num_300,
        num_100,
        num_50,
        num_miss,
        num_geki: 0,
        num_katu: 0,
        mods,
        pp: None
    }
}
