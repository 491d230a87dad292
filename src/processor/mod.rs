pub mod cache;

use crate::{
    config::Config,
    database::{DbClient, UpdateBatch},
    error::ProcessorError,
    model::{
        beatmap::DifficultyAttributeTable,
        gamemode::Gamemode,
        mods::Mods,
        score::{Score, ScoreRow},
        user::User
    },
    processor::cache::BeatmapCache,
    utils::progress_utils::progress_bar
};
use chrono::NaiveDateTime;
use metrics::{counter, gauge};
use std::{
    cmp::Ordering as CmpOrdering,
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc
    },
    time::{Duration, Instant}
};
use tokio::sync::mpsc;
use tokio_postgres::Row;

const USER_ID_STEP: i64 = 10_000;
const LAST_SCORE_ID_UPDATE_STEP: u64 = 100;

// A new score only counts as a notable event when it makes up a meaningful
// share of the user's rating and moves it by at least 5pp.
const NOTABLE_EVENT_RATING_THRESHOLD: f32 = 1.0 / 21.5;
const NOTABLE_EVENT_RATING_DIFFERENCE_MINIMUM: f32 = 5.0;

/// Owns everything a processing run needs: configuration, the two
/// connections, the beatmap cache, the blacklist and the shutdown flag.
pub struct Processor {
    mode: Gamemode,
    config: Config,
    db: DbClient,
    db_slave: DbClient,
    cache: BeatmapCache,
    blacklisted_beatmap_ids: HashSet<i32>,
    shutdown: AtomicBool
}

impl Processor {
    pub async fn new(mode: Gamemode, config: Config) -> Result<Arc<Processor>, ProcessorError> {
        log::info!("---------------------------------------------------");
        log::info!("---- pp processor for gamemode {}", mode.name());
        log::info!("---------------------------------------------------");

        counter!("startups", 1, "mode" => mode.tag());

        let db = DbClient::connect(&config.database.connection_str()).await?;
        let db_slave = DbClient::connect(&config.database_slave.connection_str()).await?;

        let blacklisted_beatmap_ids = Self::query_beatmap_blacklist(&db_slave, mode).await?;
        let attributes = Self::query_difficulty_attributes(&db_slave).await?;

        let cache = BeatmapCache::new(mode, attributes);
        cache.preload_all(&db_slave).await?;

        Ok(Arc::new(Processor {
            mode,
            config,
            db,
            db_slave,
            cache,
            blacklisted_beatmap_ids,
            shutdown: AtomicBool::new(false)
        }))
    }

    pub fn request_shutdown(&self) {
        log::info!("Shutdown requested.");
        self.shutdown.store(true, Ordering::Relaxed);
    }

    fn shall_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Relaxed)
    }

    fn last_score_id_key(&self) -> String {
        format!("last_score_id:{}", self.mode.tag())
    }

    fn last_user_id_key(&self) -> String {
        format!("last_user_id:{}", self.mode.tag())
    }

    async fn query_beatmap_blacklist(db_slave: &DbClient, mode: Gamemode) -> Result<HashSet<i32>, ProcessorError> {
        log::info!("Retrieving blacklisted beatmaps.");

        let rows = db_slave
            .query(&format!(
                "SELECT beatmap_id FROM osu_beatmap_performance_blacklist WHERE mode = {}",
                mode as u8
            ))
            .await?;

        let mut blacklist = HashSet::new();
        for row in &rows {
            blacklist.insert(row.try_get::<_, i32>(0)?);
        }

        log::info!("Retrieved {} blacklisted beatmaps.", blacklist.len());

        Ok(blacklist)
    }

    async fn query_difficulty_attributes(db_slave: &DbClient) -> Result<DifficultyAttributeTable, ProcessorError> {
        log::info!("Retrieving difficulty attribute names.");

        let rows = db_slave
            .query("SELECT attrib_id, name FROM osu_difficulty_attribs ORDER BY attrib_id DESC")
            .await?;

        let mut table = DifficultyAttributeTable::new();
        let mut num_entries = 0;
        for row in &rows {
            let attrib_id: i32 = row.try_get(0)?;
            let name: String = row.try_get(1)?;
            table.insert(attrib_id, &name);
            num_entries += 1;
        }

        log::info!(
            "Retrieved {} difficulty attributes, stored in {} entries.",
            num_entries,
            table.len()
        );

        Ok(table)
    }

    /// Continuous mode: polls for new scores and for newly ranked beatmaps
    /// until shutdown is requested.
    pub async fn monitor_new_scores(self: &Arc<Self>) -> Result<(), ProcessorError> {
        let current_score_id = self.db.retrieve_count(&self.last_score_id_key()).await?;

        let row = self
            .db_slave
            .query_opt("SELECT MAX(approved_date) FROM osu_beatmapsets")
            .await?;
        let last_approved_date: NaiveDateTime = row
            .and_then(|row| row.try_get::<_, Option<NaiveDateTime>>(0).ok().flatten())
            .ok_or(ProcessorError::MissingMaxApprovedDate)?;

        let beatmap_poll_task = {
            let processor = Arc::clone(self);
            tokio::spawn(async move { processor.beatmap_poll_loop(last_approved_date).await })
        };

        let score_poll_task = {
            let processor = Arc::clone(self);
            tokio::spawn(async move { processor.score_poll_loop(current_score_id).await })
        };

        if let Err(e) = score_poll_task.await {
            log::error!("score poll task panicked: {}", e);
        }
        if let Err(e) = beatmap_poll_task.await {
            log::error!("beatmap poll task panicked: {}", e);
        }

        Ok(())
    }

    async fn score_poll_loop(self: Arc<Self>, mut current_score_id: i64) {
        let mut last_poll = Instant::now();
        let mut num_scores_since_last_store = 0u64;

        while !self.shall_shutdown() {
            if last_poll.elapsed() < Duration::from_millis(self.config.score_update_interval_ms) {
                tokio::time::sleep(Duration::from_millis(1)).await;
                continue;
            }

            match self
                .poll_and_process_new_scores(&mut current_score_id, &mut num_scores_since_last_store)
                .await
            {
                // Only reset the poll timer when nothing new turned up;
                // otherwise keep draining immediately
                Ok(found_any) => {
                    if !found_any {
                        last_poll = Instant::now();
                    }
                }
                Err(e) => {
                    log::error!("Score poll failed, retrying next tick: {}", e);
                    last_poll = Instant::now();
                }
            }
        }
    }

    async fn poll_and_process_new_scores(
        &self,
        current_score_id: &mut i64,
        num_scores_since_last_store: &mut u64
    ) -> Result<bool, ProcessorError> {
        // Updates should hit the database immediately; the batches exist to
        // conform to the pipeline's interface
        let new_users = UpdateBatch::new(self.db.clone(), 0);
        let new_scores = UpdateBatch::new(self.db.clone(), 0);

        let rows = self
            .db_slave
            .query(&format!(
                "SELECT score_id, user_id, pp FROM osu_scores{}_high WHERE score_id > {} ORDER BY score_id ASC",
                self.mode.suffix(),
                current_score_id
            ))
            .await?;

        gauge!("score.amount_behind_newest", rows.len() as f64, "mode" => self.mode.tag());

        let found_any = !rows.is_empty();

        for row in &rows {
            // Only process scores whose pp is still null
            if row.try_get::<_, Option<f32>>(2)?.is_some() {
                continue;
            }

            let score_id: i64 = row.try_get(0)?;
            let user_id: i64 = row.try_get(1)?;

            *current_score_id = (*current_score_id).max(score_id);

            log::info!("New score {} in mode {} by {}.", score_id, self.mode.name(), user_id);

            self.process_single_user(score_id, &self.db, &self.db_slave, &new_users, &new_scores, user_id)
                .await?;

            *num_scores_since_last_store += 1;
            if *num_scores_since_last_store > LAST_SCORE_ID_UPDATE_STEP {
                self.db.store_count(&self.last_score_id_key(), *current_score_id);
                *num_scores_since_last_store = 0;
            }

            counter!("score.processed_new", 1, "mode" => self.mode.tag());
            gauge!(
                "db.pending_queries",
                self.db.num_pending_queries() as f64,
                "mode" => self.mode.tag(),
                "connection" => "main"
            );
        }

        Ok(found_any)
    }

    async fn beatmap_poll_loop(self: Arc<Self>, mut last_approved_date: NaiveDateTime) {
        let mut last_poll = Instant::now();

        while !self.shall_shutdown() {
            if last_poll.elapsed() < Duration::from_millis(self.config.difficulty_update_interval_ms) {
                tokio::time::sleep(Duration::from_millis(100)).await;
                continue;
            }

            last_poll = Instant::now();

            if let Err(e) = self.poll_and_process_new_beatmap_sets(&mut last_approved_date).await {
                log::error!("Beatmap poll failed, retrying next tick: {}", e);
            }
        }
    }

    async fn poll_and_process_new_beatmap_sets(
        &self,
        last_approved_date: &mut NaiveDateTime
    ) -> Result<(), ProcessorError> {
        log::info!("Retrieving new beatmap sets.");

        let rows = self
            .db_slave
            .query(&format!(
                "SELECT osu_beatmaps.beatmap_id, approved_date \
                 FROM osu_beatmapsets \
                 JOIN osu_beatmaps ON osu_beatmapsets.beatmapset_id = osu_beatmaps.beatmapset_id \
                 WHERE approved_date > '{}' \
                 ORDER BY approved_date ASC",
                last_approved_date
            ))
            .await?;

        log::info!("Retrieved {} new beatmaps.", rows.len());

        for row in &rows {
            let beatmap_id: i32 = row.try_get(0)?;
            *last_approved_date = row.try_get(1)?;

            self.cache.load_single(&self.db_slave, beatmap_id).await?;

            counter!("difficulty.required_retrieval", 1, "mode" => self.mode.tag());
        }

        Ok(())
    }

    /// Full reprocessing over every user, in id steps of 10000, fanned out
    /// over a pool of workers that own their connections and batches. The
    /// checkpoint only advances once a step is fully drained, so a replay
    /// after a crash never skips work.
    pub async fn process_all_users(self: &Arc<Self>, re_process: bool, num_threads: u32) -> Result<(), ProcessorError> {
        let num_threads = num_threads.max(1) as usize;

        let in_flight = Arc::new(AtomicUsize::new(0));
        let mut senders = Vec::with_capacity(num_threads);
        let mut worker_tasks = Vec::with_capacity(num_threads);
        let mut worker_dbs = Vec::with_capacity(num_threads);

        for _ in 0..num_threads {
            let db = DbClient::connect(&self.config.database.connection_str()).await?;
            let db_slave = DbClient::connect(&self.config.database_slave.connection_str()).await?;
            let (sender, receiver) = mpsc::unbounded_channel();

            worker_dbs.push(db.clone());

            let worker = Worker {
                processor: Arc::clone(self),
                new_users: UpdateBatch::new(db.clone(), 10_000),
                new_scores: UpdateBatch::new(db.clone(), 10_000),
                db,
                db_slave,
                in_flight: Arc::clone(&in_flight)
            };

            worker_tasks.push(tokio::spawn(worker.run(receiver)));
            senders.push(sender);
        }

        let mut begin = if re_process {
            // Make sure a restart still does the full process, even if no
            // checkpoint store was triggered before
            self.db.store_count(&self.last_user_id_key(), 0);
            0
        } else {
            self.db.retrieve_count(&self.last_user_id_key()).await?
        };

        // We're done, nothing to reprocess
        if begin == -1 {
            return Ok(());
        }

        log::info!("Querying all scores, starting from user id {}.", begin);

        let row = self
            .db_slave
            .query_opt(&format!(
                "SELECT MAX(user_id) FROM osu_user_stats{}",
                self.mode.suffix()
            ))
            .await?;
        let max_user_id: i64 = row
            .and_then(|row| row.try_get::<_, Option<i64>>(0).ok().flatten())
            .ok_or(ProcessorError::MissingMaxUserId)?;

        let bar = progress_bar(
            ((max_user_id - begin).max(0) as u64).div_ceil(USER_ID_STEP as u64).max(1),
            "Processing user id ranges".to_string()
        );

        let mut current_connection = 0;

        'steps: while begin <= max_user_id {
            let end = begin + USER_ID_STEP;
            log::info!("Updating users {} - {}.", begin, end);

            let rows = self
                .db_slave
                .query(&format!(
                    "SELECT user_id FROM osu_user_stats{} WHERE user_id BETWEEN {} AND {}",
                    self.mode.suffix(),
                    begin,
                    end
                ))
                .await?;

            for row in &rows {
                let user_id: i64 = row.try_get(0)?;

                in_flight.fetch_add(1, Ordering::SeqCst);
                if senders[current_connection].send(user_id).is_err() {
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }

                current_connection = (current_connection + 1) % num_threads;

                // Shut down when requested!
                if self.shall_shutdown() {
                    break 'steps;
                }
            }

            begin += USER_ID_STEP;

            // No user of this step may still be in flight, and no worker
            // connection may have writes pending, before the checkpoint moves
            loop {
                let num_pending_queries: usize = worker_dbs.iter().map(|db| db.num_pending_queries()).sum();

                gauge!(
                    "db.pending_queries",
                    num_pending_queries as f64,
                    "mode" => self.mode.tag(),
                    "connection" => "background"
                );

                if in_flight.load(Ordering::SeqCst) == 0 && num_pending_queries == 0 {
                    break;
                }

                tokio::time::sleep(Duration::from_millis(10)).await;
            }

            self.db.store_count(&self.last_user_id_key(), begin);
            bar.inc(1);
        }

        bar.finish();

        // Closing the channels lets the workers drain and flush
        drop(senders);
        for task in worker_tasks {
            if let Err(e) = task.await {
                log::error!("worker task panicked: {}", e);
            }
        }

        Ok(())
    }

    /// Recomputes an explicit list of users and logs a summary table.
    pub async fn process_users(&self, user_args: &[String]) -> Result<Vec<User>, ProcessorError> {
        let new_users = UpdateBatch::new(self.db.clone(), 10_000);
        let new_scores = UpdateBatch::new(self.db.clone(), 10_000);

        let mut users = Vec::new();
        for arg in user_args {
            let user_id = match arg.parse::<i64>() {
                Ok(user_id) => user_id,
                Err(_) => {
                    // TODO: resolve user names once the stats tables carry them
                    log::warn!("Skipping '{}': only numeric user ids are supported.", arg);
                    continue;
                }
            };

            users.push(
                self.process_single_user(0, &self.db, &self.db_slave, &new_users, &new_scores, user_id)
                    .await?
            );
        }

        new_users.flush().await;
        new_scores.flush().await;

        users.sort_by(|a, b| {
            b.pp_record()
                .value
                .partial_cmp(&a.pp_record().value)
                .unwrap_or(CmpOrdering::Equal)
                .then(b.id().cmp(&a.id()))
        });

        log::info!("============================");
        log::info!("======= USER SUMMARY =======");
        log::info!("============================");
        log::info!("      User    Perf.     Acc.");
        log::info!("----------------------------");

        for user in &users {
            log::info!(
                "{:>10}  {:>5}pp  {:>6.2}%",
                user.id(),
                user.pp_record().value as i32,
                user.pp_record().accuracy * 100.0
            );
        }

        log::info!("=============================");

        Ok(users)
    }

    /// The per-user pipeline: reads the user's high scores, recomputes their
    /// pp against the beatmap cache, stages score updates, emits a notable
    /// event when a selected score materially moves the rating, and commits
    /// the guarded user update.
    ///
    /// Data-level problems (malformed rows, unknown beatmaps) are skipped;
    /// the returned [`User`] may be partial.
    pub async fn process_single_user(
        &self,
        selected_score_id: i64,
        db: &DbClient,
        db_slave: &DbClient,
        new_users: &UpdateBatch,
        new_scores: &UpdateBatch,
        user_id: i64
    ) -> Result<User, ProcessorError> {
        let rows = db_slave
            .query(&format!(
                "SELECT score_id, user_id, beatmap_id, score, maxcombo, count300, count100, count50, \
                 countmiss, countgeki, countkatu, enabled_mods, pp \
                 FROM osu_scores{}_high WHERE user_id = {}",
                self.mode.suffix(),
                user_id
            ))
            .await?;

        let mut user = User::new(user_id);
        let mut scores_that_need_db_update: Vec<Score> = Vec::new();

        {
            let mut beatmaps = self.cache.beatmaps().read().await;

            for row in &rows {
                let score_row = match score_row_from_row(row) {
                    Ok(score_row) => score_row,
                    Err(e) => {
                        log::warn!("Skipping malformed score row of user {}: {}", user_id, e);
                        continue;
                    }
                };

                // Blacklisted maps don't count
                if self.blacklisted_beatmap_ids.contains(&score_row.beatmap_id) {
                    continue;
                }

                if !beatmaps.contains_key(&score_row.beatmap_id) {
                    // Widen to the write path, then re-check; another task
                    // may have populated the id in between
                    drop(beatmaps);
                    if let Err(e) = self.cache.load_single(db_slave, score_row.beatmap_id).await {
                        log::warn!("Lazy load of beatmap /b/{} failed: {}", score_row.beatmap_id, e);
                    }
                    beatmaps = self.cache.beatmaps().read().await;
                }

                // If the beatmap still isn't known, leave the score out
                let beatmap = match beatmaps.get(&score_row.beatmap_id) {
                    Some(beatmap) => beatmap,
                    None => continue
                };

                let ranked_status = beatmap.ranked_status() as i32;
                if ranked_status < self.config.min_ranked_status || ranked_status > self.config.max_ranked_status {
                    continue;
                }

                let stored_pp = score_row.pp;
                let score_id = score_row.score_id;

                let score = Score::new(self.mode, score_row, beatmap);
                user.add_score_pp_record(score.pp_record());

                if score_needs_update(stored_pp, selected_score_id, score_id, score.total_value()) {
                    scores_that_need_db_update.push(score);
                }
            }
        }

        {
            // All of this user's score updates appear atomically to other
            // users of the same batch
            let mut batch = new_scores.lock().await;
            for score in &scores_that_need_db_update {
                batch.append(score.update_statement(self.mode));
            }
        }

        counter!(
            "score.updated",
            scores_that_need_db_update.len() as u64,
            "mode" => self.mode.tag()
        );

        user.compute_pp_record();
        let user_pp_record = user.pp_record();

        // Check for a notable event; only sensible when a single new score
        // triggered this run
        if selected_score_id > 0
            && !scores_that_need_db_update.is_empty()
            && scores_that_need_db_update[0].total_value() > user_pp_record.value * NOTABLE_EVENT_RATING_THRESHOLD
        {
            counter!("score.notable_events", 1, "mode" => self.mode.tag());

            let score = &scores_that_need_db_update[0];

            // Obtain the user's previous rating for the difference
            let rows = db_slave
                .query(&format!(
                    "SELECT {} FROM osu_user_stats{} WHERE user_id = {}",
                    self.config.user_pp_column_name,
                    self.mode.suffix(),
                    user_id
                ))
                .await?;

            for row in &rows {
                let previous: Option<f32> = row.try_get(0)?;
                let previous = match previous {
                    Some(previous) => previous,
                    None => continue
                };

                let rating_change = user_pp_record.value - previous;

                // Events below a mere 5pp aren't worth logging
                if rating_change < NOTABLE_EVENT_RATING_DIFFERENCE_MINIMUM {
                    continue;
                }

                log::info!("Notable event: /b/{} /u/{}", score.beatmap_id(), user_id);

                db.execute_background(format!(
                    "INSERT INTO osu_user_performance_change (user_id, mode, beatmap_id, performance_change, rank) \
                     VALUES ({}, {}, {}, {}, null)",
                    user_id,
                    self.mode as u8,
                    score.beatmap_id(),
                    rating_change
                ));
            }
        }

        new_users
            .append_and_commit(format!(
                "UPDATE osu_user_stats{suffix} \
                 SET {column} = CASE \
                     WHEN CURRENT_DATE > last_played + INTERVAL '3 months' THEN 0 \
                     ELSE {value} \
                 END, \
                 accuracy_new = {accuracy} \
                 WHERE user_id = {user_id} AND ABS({column} - {value}) > 0.01;",
                suffix = self.mode.suffix(),
                column = self.config.user_pp_column_name,
                value = user_pp_record.value,
                accuracy = user_pp_record.accuracy,
                user_id = user_id
            ))
            .await;

        counter!("user.amount_processed", 1, "mode" => self.mode.tag());

        Ok(user)
    }
}

/// One pool worker; owns its connections and batches for its whole lifetime.
struct Worker {
    processor: Arc<Processor>,
    db: DbClient,
    db_slave: DbClient,
    new_users: UpdateBatch,
    new_scores: UpdateBatch,
    in_flight: Arc<AtomicUsize>
}

impl Worker {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<i64>) {
        while let Some(user_id) = receiver.recv().await {
            let result = self
                .processor
                .process_single_user(0, &self.db, &self.db_slave, &self.new_users, &self.new_scores, user_id)
                .await;

            if let Err(e) = result {
                log::error!("Failed to process user {}: {}", user_id, e);
            }

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
        }

        // Channel closed; drain what the batches still hold
        self.new_users.flush().await;
        self.new_scores.flush().await;
    }
}

/// Whether a score row needs its pp column rewritten: it must be selected
/// for update (null pp, full reprocess, or the triggering score) and the
/// recomputed value must actually have moved.
fn score_needs_update(stored_pp: Option<f32>, selected_score_id: i64, score_id: i64, total_value: f32) -> bool {
    if stored_pp.is_none() || selected_score_id == 0 || selected_score_id == score_id {
        match stored_pp {
            None => true,
            Some(stored) => (stored - total_value).abs() > 0.001
        }
    } else {
        false
    }
}

fn score_row_from_row(row: &Row) -> Result<ScoreRow, tokio_postgres::Error> {
    Ok(ScoreRow {
        score_id: row.try_get(0)?,
        user_id: row.try_get(1)?,
        beatmap_id: row.try_get(2)?,
        score: row.try_get(3)?,
        max_combo: row.try_get(4)?,
        num_300: row.try_get(5)?,
        num_100: row.try_get(6)?,
        num_50: row.try_get(7)?,
        num_miss: row.try_get(8)?,
        num_geki: row.try_get(9)?,
        num_katu: row.try_get(10)?,
        mods: Mods::from_bits(row.try_get::<_, i32>(11)? as u32),
        pp: row.try_get(12)?
    })
}

#[cfg(test)]
mod tests {
    use super::score_needs_update;

    #[test]
    fn test_null_pp_always_needs_an_update() {
        assert!(score_needs_update(None, 0, 1, 100.0));
        assert!(score_needs_update(None, 5, 1, 100.0));
    }

    #[test]
    fn test_full_reprocess_updates_moved_values_only() {
        assert!(score_needs_update(Some(99.0), 0, 1, 100.0));
        // Recomputation reproduced the stored value; stay silent
        assert!(!score_needs_update(Some(100.0), 0, 1, 100.0));
        assert!(!score_needs_update(Some(100.0005), 0, 1, 100.0));
    }

    #[test]
    fn test_selected_score_updates_when_moved() {
        assert!(score_needs_update(Some(99.0), 7, 7, 100.0));
        assert!(!score_needs_update(Some(100.0), 7, 7, 100.0));
    }

    #[test]
    fn test_unselected_scores_are_left_alone() {
        assert!(!score_needs_update(Some(50.0), 7, 8, 100.0));
    }
}
