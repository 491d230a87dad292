use crate::{
    database::DbClient,
    model::{
        beatmap::{Beatmap, DifficultyAttributeTable, RankedStatus},
        gamemode::Gamemode,
        mods::Mods
    }
};
use metrics::counter;
use std::{collections::HashMap, convert::TryFrom};
use tokio::sync::RwLock;
use tokio_postgres::Row;

/// In-memory beatmap difficulty cache, lazily populated from the replica.
///
/// Readers hold the read lock for the duration of a user's pipeline run. On
/// a miss they must drop their guard, call [`BeatmapCache::load_single`],
/// re-acquire and re-check membership; another task may have loaded the id
/// in between.
pub struct BeatmapCache {
    mode: Gamemode,
    attributes: DifficultyAttributeTable,
    beatmaps: RwLock<HashMap<i32, Beatmap>>
}

impl BeatmapCache {
    pub fn new(mode: Gamemode, attributes: DifficultyAttributeTable) -> BeatmapCache {
        BeatmapCache {
            mode,
            attributes,
            beatmaps: RwLock::new(HashMap::new())
        }
    }

    pub fn beatmaps(&self) -> &RwLock<HashMap<i32, Beatmap>> {
        &self.beatmaps
    }

    /// Walks the beatmap table in id ranges of 10000 and loads everything
    /// with `approved >= 1`, until a range comes back empty.
    pub async fn preload_all(&self, db_slave: &DbClient) -> Result<(), tokio_postgres::Error> {
        const STEP: i32 = 10_000;

        let mut begin = 0;
        while self.load_range(db_slave, begin, begin + STEP).await? {
            begin += STEP;
        }

        log::info!(
            "Loaded difficulties for a total of {} beatmaps.",
            self.beatmaps.read().await.len()
        );

        Ok(())
    }

    /// Loads every ranked beatmap in `[begin, end)`. Returns whether the
    /// range contained any rows.
    pub async fn load_range(&self, db_slave: &DbClient, begin: i32, end: i32) -> Result<bool, tokio_postgres::Error> {
        let rows = db_slave.query(&self.difficulty_query(&format!(
            "osu_beatmaps.beatmap_id >= {} AND osu_beatmaps.beatmap_id < {}",
            begin, end
        ))).await?;

        let success = !rows.is_empty();
        if success {
            self.populate(&rows).await;
            log::info!("Obtained beatmap difficulties from ID {} to {}.", begin, end - 1);
        }

        Ok(success)
    }

    /// Loads a single beatmap, counting the retrieval outcome. Returns
    /// whether the beatmap is present afterwards.
    pub async fn load_single(&self, db_slave: &DbClient, beatmap_id: i32) -> Result<bool, tokio_postgres::Error> {
        let rows = db_slave
            .query(&self.difficulty_query(&format!("osu_beatmaps.beatmap_id = {}", beatmap_id)))
            .await?;

        if !rows.is_empty() {
            self.populate(&rows).await;
        }

        if !self.beatmaps.read().await.contains_key(&beatmap_id) {
            log::warn!("Couldn't find beatmap /b/{}.", beatmap_id);
            counter!("difficulty.retrieval_not_found", 1, "mode" => self.mode.tag());
            return Ok(false);
        }

        log::info!("Obtained beatmap difficulty of /b/{}.", beatmap_id);
        counter!("difficulty.retrieval_success", 1, "mode" => self.mode.tag());

        Ok(true)
    }

    fn difficulty_query(&self, id_filter: &str) -> String {
        format!(
            "SELECT osu_beatmaps.beatmap_id, countNormal, mods, attrib_id, value, approved, score_version \
             FROM osu_beatmaps \
             JOIN osu_beatmap_difficulty_attribs ON osu_beatmaps.beatmap_id = osu_beatmap_difficulty_attribs.beatmap_id \
             WHERE osu_beatmap_difficulty_attribs.mode = {} AND approved >= 1 AND {}",
            self.mode as u8, id_filter
        )
    }

    /// Folds attribute rows into beatmap entries under the write lock.
    /// Malformed rows are skipped with a warning.
    async fn populate(&self, rows: &[Row]) {
        let mut beatmaps = self.beatmaps.write().await;

        for row in rows {
            if let Err(e) = Self::apply_row(&mut beatmaps, &self.attributes, row) {
                log::warn!("Skipping malformed difficulty row: {}", e);
            }
        }
    }

    fn apply_row(
        beatmaps: &mut HashMap<i32, Beatmap>,
        attributes: &DifficultyAttributeTable,
        row: &Row
    ) -> Result<(), tokio_postgres::Error> {
        let beatmap_id: i32 = row.try_get(0)?;
        let num_hit_circles: Option<i32> = row.try_get(1)?;
        let mods: i32 = row.try_get(2)?;
        let attrib_id: i32 = row.try_get(3)?;
        let value: f32 = row.try_get(4)?;
        let approved: i32 = row.try_get(5)?;
        let score_version: i32 = row.try_get(6)?;

        let beatmap = beatmaps.entry(beatmap_id).or_insert_with(|| Beatmap::new(beatmap_id));

        if let Ok(ranked_status) = RankedStatus::try_from(approved) {
            beatmap.set_ranked_status(ranked_status);
        } else {
            log::warn!("Beatmap /b/{} carries unknown approved value {}.", beatmap_id, approved);
        }

        beatmap.set_score_version(score_version);
        beatmap.set_num_hit_circles(num_hit_circles.unwrap_or(0));

        if let Some(attribute) = attributes.resolve(attrib_id) {
            beatmap.set_difficulty_attribute(Mods::from_bits(mods as u32), attribute, value);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::BeatmapCache;
    use crate::model::{
        beatmap::{Beatmap, DifficultyAttribute, DifficultyAttributeTable, RankedStatus},
        gamemode::Gamemode,
        mods::Mods
    };

    fn cache_with(entries: Vec<Beatmap>) -> BeatmapCache {
        let cache = BeatmapCache::new(Gamemode::Taiko, DifficultyAttributeTable::new());
        {
            let mut beatmaps = cache.beatmaps().blocking_write();
            for beatmap in entries {
                beatmaps.insert(beatmap.id(), beatmap);
            }
        }
        cache
    }

    #[tokio::test]
    async fn test_readers_recheck_after_reacquiring() {
        let cache = BeatmapCache::new(Gamemode::Taiko, DifficultyAttributeTable::new());

        {
            let beatmaps = cache.beatmaps().read().await;
            assert!(!beatmaps.contains_key(&99));
        }

        // Another task populates the entry while no reader holds the lock
        {
            let mut beatmaps = cache.beatmaps().write().await;
            let mut beatmap = Beatmap::new(99);
            beatmap.set_ranked_status(RankedStatus::Ranked);
            beatmap.set_difficulty_attribute(Mods::NONE, DifficultyAttribute::Strain, 3.3);
            beatmaps.insert(99, beatmap);
        }

        let beatmaps = cache.beatmaps().read().await;
        let beatmap = beatmaps.get(&99).unwrap();
        assert_eq!(beatmap.ranked_status(), RankedStatus::Ranked);
        assert_eq!(beatmap.difficulty_attribute(Mods::NONE, DifficultyAttribute::Strain), 3.3);
    }

    #[test]
    fn test_concurrent_readers_never_see_partial_entries() {
        let mut beatmap = Beatmap::new(7);
        beatmap.set_ranked_status(RankedStatus::Approved);
        beatmap.set_num_hit_circles(420);
        beatmap.set_difficulty_attribute(Mods::NONE, DifficultyAttribute::Strain, 2.8);
        let cache = std::sync::Arc::new(cache_with(vec![beatmap]));

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(4)
            .build()
            .unwrap();

        runtime.block_on(async {
            let mut handles = Vec::new();
            for _ in 0..8 {
                let cache = std::sync::Arc::clone(&cache);
                handles.push(tokio::spawn(async move {
                    for _ in 0..100 {
                        let beatmaps = cache.beatmaps().read().await;
                        let beatmap = beatmaps.get(&7).unwrap();
                        // A reader either sees the full entry or nothing
                        assert_eq!(beatmap.ranked_status(), RankedStatus::Approved);
                        assert_eq!(beatmap.num_hit_circles(), 420);
                    }
                }));
            }

            for handle in handles {
                handle.await.unwrap();
            }
        });
    }
}
