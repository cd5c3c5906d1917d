//! Sled-backed implementation of [`TokenStore`].

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use fail::fail_point;
use parking_lot::{Mutex, RwLock};
use sled::{Batch, Transactional, transaction::ConflictableTransactionError};
use tokenauth_store::{
    Audience, StoreConfig, StoreError, StoreResult, SweepStats, Token, TokenKind, TokenStore,
};

use crate::{
    config::SledOptions,
    error::{Result, SledStoreError},
    keys::{
        AUDIENCES_TREE, SINGLE_IDS_TREE, TOKENS_TREE, audience_info_key, audience_prefix,
        audience_token_key, audience_tokens_prefix, decode_value, token_value_from_index_key,
    },
};

/// Attempts made to acquire the database file lock on open.
const LOCK_ATTEMPTS: u32 = 8;

/// First delay between lock attempts; doubles per attempt.
const LOCK_INITIAL_BACKOFF: Duration = Duration::from_millis(10);

/// Longest delay between lock attempts.
const LOCK_MAX_BACKOFF: Duration = Duration::from_millis(320);

/// How long a closing engine waits for in-flight operations to let go.
const RELEASE_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll period while waiting for in-flight operations.
const RELEASE_POLL: Duration = Duration::from_millis(5);

/// One open database and its three trees.
struct Engine {
    path: PathBuf,
    db: sled::Db,
    audiences: sled::Tree,
    tokens: sled::Tree,
    single_ids: sled::Tree,
    /// Serializes read-modify-write operations so that the keys read while
    /// planning a write cannot change before the write commits.
    writer: Mutex<()>,
}

/// Pending removals and inserts for the three trees.
///
/// Within one batch the last operation on a key wins, so staging a remove
/// followed by an insert of the same key leaves the insert.
#[derive(Default)]
struct WritePlan {
    audiences: Batch,
    tokens: Batch,
    single_ids: Batch,
}

impl WritePlan {
    fn put_token(&mut self, token: &Token) -> Result<()> {
        self.tokens.insert(token.value.as_bytes(), serde_json::to_vec(token)?);
        Ok(())
    }
}

impl Engine {
    fn open(path: PathBuf, options: &SledOptions) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let db = options.to_sled_config(&path).open()?;
        let audiences = db.open_tree(AUDIENCES_TREE)?;
        let tokens = db.open_tree(TOKENS_TREE)?;
        let single_ids = db.open_tree(SINGLE_IDS_TREE)?;
        Ok(Self { path, db, audiences, tokens, single_ids, writer: Mutex::new(()) })
    }

    fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    /// Plans a write under the writer lock and commits it atomically.
    fn write<T>(&self, stage: impl FnOnce(&mut WritePlan) -> StoreResult<T>) -> StoreResult<T> {
        let _writer = self.writer.lock();
        let mut plan = WritePlan::default();
        let out = stage(&mut plan)?;
        self.commit(&plan)?;
        Ok(out)
    }

    fn commit(&self, plan: &WritePlan) -> Result<()> {
        (&self.audiences, &self.tokens, &self.single_ids).transaction(
            |(audiences, tokens, single_ids)| {
                audiences.apply_batch(&plan.audiences)?;
                tokens.apply_batch(&plan.tokens)?;
                single_ids.apply_batch(&plan.single_ids)?;
                Ok::<(), ConflictableTransactionError<()>>(())
            },
        )?;
        Ok(())
    }

    fn load_audience(&self, id: &str) -> Result<Option<Audience>> {
        match self.audiences.get(audience_info_key(id))? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    fn load_token(&self, value: &str) -> Result<Option<Token>> {
        match self.tokens.get(value.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    fn single_occupant(&self, single_id: &str) -> Result<Option<String>> {
        self.single_ids.get(single_id.as_bytes())?.map(|raw| decode_value(&raw)).transpose()
    }

    /// Stages removal of whichever index entry points at `token`.
    fn stage_unindex(&self, plan: &mut WritePlan, token: &Token) -> Result<()> {
        match token.kind() {
            Some(TokenKind::Audience(id)) => {
                plan.audiences.remove(audience_token_key(id, &token.value));
            },
            Some(TokenKind::Single(sid)) => {
                if self.single_occupant(sid)?.as_deref() == Some(token.value.as_str()) {
                    plan.single_ids.remove(sid.as_bytes());
                }
            },
            None => {},
        }
        Ok(())
    }

    /// Stages full removal of the token stored under `value`, if any.
    fn stage_delete_token(&self, plan: &mut WritePlan, value: &str) -> Result<Option<Token>> {
        let Some(token) = self.load_token(value)? else {
            return Ok(None);
        };
        plan.tokens.remove(value.as_bytes());
        self.stage_unindex(plan, &token)?;
        Ok(Some(token))
    }

    /// Stages the cascading delete of an audience bucket.
    fn stage_delete_audience(&self, plan: &mut WritePlan, id: &str) -> Result<usize> {
        let mut dropped = 0;
        for entry in self.audiences.scan_prefix(audience_tokens_prefix(id)).keys() {
            let value = token_value_from_index_key(id, &entry?)?;
            plan.tokens.remove(value.as_bytes());
            dropped += 1;
        }
        for key in self.audiences.scan_prefix(audience_prefix(id)).keys() {
            plan.audiences.remove(key?);
        }
        Ok(dropped)
    }

    fn save_audience(&self, audience: &Audience) -> StoreResult<()> {
        let record = serde_json::to_vec(audience)?;
        let dropped = self.write(|plan| {
            let dropped = self.stage_delete_audience(plan, &audience.id)?;
            plan.audiences.insert(audience_info_key(&audience.id), record);
            Ok(dropped)
        })?;
        if dropped > 0 {
            tracing::debug!(audience = %audience.id, dropped, "audience overwritten");
        }
        Ok(())
    }

    fn delete_audience(&self, id: &str) -> StoreResult<()> {
        let dropped = self.write(|plan| Ok(self.stage_delete_audience(plan, id)?))?;
        tracing::debug!(audience = %id, dropped, "audience deleted");
        Ok(())
    }

    fn save_token(&self, token: &Token, kind: TokenKind<'_>) -> StoreResult<()> {
        self.write(|plan| {
            if let TokenKind::Audience(id) = kind {
                let info_key = audience_info_key(id);
                if !self.audiences.contains_key(info_key).map_err(SledStoreError::from)? {
                    return Err(StoreError::audience_not_found(id));
                }
            }

            // A record with the same value is replaced wholesale.
            self.stage_delete_token(plan, &token.value)?;

            match kind {
                TokenKind::Audience(id) => {
                    plan.audiences.insert(audience_token_key(id, &token.value), &[] as &[u8]);
                },
                TokenKind::Single(sid) => {
                    if let Some(previous) = self.single_occupant(sid)? {
                        if previous != token.value {
                            self.stage_delete_token(plan, &previous)?;
                        }
                    }
                    plan.single_ids.insert(sid.as_bytes(), token.value.as_bytes());
                },
            }
            plan.put_token(token)?;
            Ok(())
        })
    }

    fn delete_token(&self, value: &str) -> StoreResult<()> {
        self.write(|plan| match self.stage_delete_token(plan, value)? {
            Some(_) => Ok(()),
            None => Err(StoreError::token_not_found(value)),
        })
    }

    fn list_audience_tokens(&self, id: &str) -> StoreResult<Vec<Token>> {
        let mut tokens = Vec::new();
        for entry in self.audiences.scan_prefix(audience_tokens_prefix(id)).keys() {
            let entry = entry.map_err(SledStoreError::from)?;
            let value = token_value_from_index_key(id, &entry)?;
            // A concurrent delete may land between the index and record reads.
            if let Some(token) = self.load_token(&value)? {
                tokens.push(token);
            }
        }
        Ok(tokens)
    }

    /// Deletes one expired token, re-checking expiry under the writer lock.
    fn sweep_one(&self, value: &str, now: i64) -> StoreResult<bool> {
        fail_point!("sweep-delete-token", |_| Err(StoreError::internal("injected sweep failure")));
        self.write(|plan| match self.load_token(value)? {
            Some(token) if token.is_expired_at(now) => {
                self.stage_delete_token(plan, value)?;
                Ok(true)
            },
            _ => Ok(false),
        })
    }

    fn delete_expired(&self, now: i64) -> SweepStats {
        let mut stats = SweepStats::default();
        let mut expired = Vec::new();

        for item in self.tokens.iter() {
            stats.scanned += 1;
            let (key, raw) = match item {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to read token record during sweep");
                    stats.skipped += 1;
                    continue;
                },
            };
            match serde_json::from_slice::<Token>(&raw) {
                Ok(token) if token.is_expired_at(now) => expired.push(token.value),
                Ok(_) => {},
                Err(e) => {
                    tracing::warn!(
                        key = %String::from_utf8_lossy(&key),
                        error = %e,
                        "skipping undecodable token record"
                    );
                    stats.skipped += 1;
                },
            }
        }

        for value in expired {
            match self.sweep_one(&value, now) {
                Ok(true) => stats.removed += 1,
                Ok(false) => {},
                Err(e) => {
                    tracing::warn!(error = %e, "failed to delete expired token");
                    stats.skipped += 1;
                },
            }
        }
        stats
    }
}

/// Persistent [`TokenStore`] on the sled embedded database.
///
/// The store starts closed; [`open`](TokenStore::open) attaches it to a
/// location. All engine work runs on the blocking thread pool.
///
/// `open` and `close` are serialized. `close` returns once the database
/// has been flushed and dropped, so the same location can be reopened
/// right away, by this store or another.
///
/// # Example
///
/// ```no_run
/// use tokenauth_store::{StoreConfig, TokenStore};
/// use tokenauth_store_sled::SledTokenStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SledTokenStore::new();
/// store.open(&StoreConfig::from_json(r#"{"path":"./data/tokendb.bolt"}"#)?).await?;
/// assert!(store.get_token("missing").await?.is_none());
/// store.close().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct SledTokenStore {
    options: SledOptions,
    engine: RwLock<Option<Arc<Engine>>>,
    lifecycle: tokio::sync::Mutex<()>,
}

impl std::fmt::Debug for SledTokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SledTokenStore")
            .field("options", &self.options)
            .field("path", &self.path())
            .finish()
    }
}

impl SledTokenStore {
    /// Creates a closed store with default engine options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a closed store with the given engine options.
    #[must_use]
    pub fn with_options(options: SledOptions) -> Self {
        Self { options, engine: RwLock::new(None), lifecycle: tokio::sync::Mutex::new(()) }
    }

    /// Returns the location of the open database, or `None` when closed.
    #[must_use]
    pub fn path(&self) -> Option<PathBuf> {
        self.engine.read().as_ref().map(|engine| engine.path.clone())
    }

    /// Returns `true` while a database is open.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.engine.read().is_some()
    }

    fn engine(&self) -> StoreResult<Arc<Engine>> {
        self.engine.read().clone().ok_or(StoreError::NotOpen)
    }

    /// Runs `op` against the open engine on the blocking thread pool.
    async fn run<T, F>(&self, op: F) -> StoreResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Engine) -> StoreResult<T> + Send + 'static,
    {
        let engine = self.engine()?;
        blocking(move || op(&engine)).await
    }
}

async fn blocking<T, F>(op: F) -> StoreResult<T>
where
    T: Send + 'static,
    F: FnOnce() -> StoreResult<T> + Send + 'static,
{
    tokio::task::spawn_blocking(op)
        .await
        .map_err(|e| StoreError::internal_with_source("blocking task failed", e))?
}

/// Opens the engine at `path`, retrying while a previous handle on the
/// same location still holds the file lock.
async fn open_engine(path: PathBuf, options: SledOptions) -> StoreResult<Arc<Engine>> {
    let mut attempt = 0;
    loop {
        let (target, tuning) = (path.clone(), options.clone());
        let opened = tokio::task::spawn_blocking(move || Engine::open(target, &tuning))
            .await
            .map_err(|e| StoreError::internal_with_source("blocking task failed", e))?;
        match opened {
            Ok(engine) => return Ok(Arc::new(engine)),
            Err(err) if err.is_lock_contention() && attempt + 1 < LOCK_ATTEMPTS => {
                let delay = lock_backoff(attempt);
                tracing::debug!(
                    attempt = attempt + 1,
                    max_attempts = LOCK_ATTEMPTS,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "database locked, retrying after backoff"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            },
            Err(err) => return Err(err.into()),
        }
    }
}

fn lock_backoff(attempt: u32) -> Duration {
    let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
    LOCK_INITIAL_BACKOFF.saturating_mul(factor).min(LOCK_MAX_BACKOFF)
}

/// Flushes `engine`, waits for in-flight operations to drop their handles
/// and drops the database on the blocking pool.
async fn retire(engine: Arc<Engine>) -> StoreResult<()> {
    let flushing = Arc::clone(&engine);
    blocking(move || Ok(flushing.flush()?)).await?;

    let deadline = Instant::now() + RELEASE_TIMEOUT;
    let mut engine = engine;
    loop {
        match Arc::try_unwrap(engine) {
            Ok(owned) => {
                return blocking(move || {
                    drop(owned);
                    Ok(())
                })
                .await;
            },
            Err(shared) if Instant::now() < deadline => {
                engine = shared;
                tokio::time::sleep(RELEASE_POLL).await;
            },
            Err(shared) => {
                tracing::warn!(
                    path = %shared.path.display(),
                    handles = Arc::strong_count(&shared),
                    "database still in use, the last operation will release it"
                );
                return Ok(());
            },
        }
    }
}

fn require_id(id: &str) -> StoreResult<()> {
    if id.is_empty() {
        return Err(StoreError::invalid_audience("audience id is empty"));
    }
    if id.contains('\0') {
        return Err(StoreError::invalid_audience("audience id contains a NUL byte"));
    }
    Ok(())
}

#[async_trait]
impl TokenStore for SledTokenStore {
    #[tracing::instrument(skip_all, fields(path = %config.path().display()))]
    async fn open(&self, config: &StoreConfig) -> StoreResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let path = config.path().to_path_buf();
        if self.path().as_ref() == Some(&path) {
            return Ok(());
        }

        let opened = open_engine(path, self.options.clone()).await?;

        let previous = self.engine.write().take();
        if let Some(previous) = previous {
            let old_path = previous.path.clone();
            if let Err(e) = retire(previous).await {
                tracing::error!(
                    path = %old_path.display(),
                    error = %e,
                    "failed to close previous database"
                );
                drop(opened);
                return Err(e);
            }
            tracing::info!(path = %old_path.display(), "previous database closed");
        }

        *self.engine.write() = Some(opened);
        tracing::info!("token database opened");
        Ok(())
    }

    #[tracing::instrument(skip_all)]
    async fn close(&self) -> StoreResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let previous = self.engine.write().take();
        if let Some(engine) = previous {
            retire(engine).await?;
            tracing::info!("token database closed");
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(audience = %audience.id))]
    async fn save_audience(&self, audience: &Audience) -> StoreResult<()> {
        audience.validate()?;
        let audience = audience.clone();
        self.run(move |engine| engine.save_audience(&audience)).await
    }

    #[tracing::instrument(skip(self))]
    async fn delete_audience(&self, id: &str) -> StoreResult<()> {
        require_id(id)?;
        let id = id.to_owned();
        self.run(move |engine| engine.delete_audience(&id)).await
    }

    #[tracing::instrument(skip(self))]
    async fn get_audience(&self, id: &str) -> StoreResult<Option<Audience>> {
        require_id(id)?;
        let id = id.to_owned();
        self.run(move |engine| Ok(engine.load_audience(&id)?)).await
    }

    #[tracing::instrument(skip_all)]
    async fn save_token(&self, token: &Token) -> StoreResult<()> {
        token.validate_at(unix_now())?;
        let token = token.clone();
        self.run(move |engine| {
            let kind = token.validate_at(unix_now())?;
            engine.save_token(&token, kind)
        })
        .await
    }

    #[tracing::instrument(skip_all)]
    async fn delete_token(&self, value: &str) -> StoreResult<()> {
        if value.is_empty() {
            return Err(StoreError::invalid_token("token value is empty"));
        }
        let value = value.to_owned();
        self.run(move |engine| engine.delete_token(&value)).await
    }

    #[tracing::instrument(skip_all)]
    async fn get_token(&self, value: &str) -> StoreResult<Option<Token>> {
        if value.is_empty() {
            return Ok(None);
        }
        let value = value.to_owned();
        self.run(move |engine| Ok(engine.load_token(&value)?)).await
    }

    #[tracing::instrument(skip(self))]
    async fn list_audience_tokens(&self, id: &str) -> StoreResult<Vec<Token>> {
        require_id(id)?;
        let id = id.to_owned();
        self.run(move |engine| engine.list_audience_tokens(&id)).await
    }

    #[tracing::instrument(skip_all)]
    async fn delete_expired(&self) -> StoreResult<SweepStats> {
        let Ok(engine) = self.engine() else {
            return Ok(SweepStats::default());
        };
        let stats = blocking(move || Ok(engine.delete_expired(unix_now()))).await?;
        tracing::debug!(
            scanned = stats.scanned,
            removed = stats.removed,
            skipped = stats.skipped,
            "expired tokens swept"
        );
        Ok(stats)
    }
}

fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
