//! 游戏存档与统计的持久化：本地优先，可选远端镜像。
//!
//! 读取以本地为准。登录后每次保存都会排队写入远端，`sync` 按“进度多者胜”
//! 对齐同一天的两份存档。
//!
//! 已知限制：规则整份挑选一方。两台设备在两次同步之间玩同一天，
//! 比较中落败一方的猜测会丢失。没有因果顺序，也不合并猜测序列。

use crate::game::GameState;
use crate::mode::{MAX_GUESSES, Mode, StateKey};
use crate::stats::StatsRecord;
use crate::storage::{DocKey, LocalStore, RemoteStore};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// 已登录用户，远端文档按其隔离
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: String,
    pub display_name: Option<String>,
    pub signed_in_at: DateTime<Utc>,
}

impl Identity {
    pub fn new(user_id: impl Into<String>) -> Self {
        Identity {
            user_id: user_id.into(),
            display_name: None,
            signed_in_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Winner {
    Local,
    Remote,
}

/// 猜测多者胜；次数相同时已结束的胜过未结束的；否则保留本地
pub fn reconcile(local: &GameState, remote: &GameState) -> Winner {
    match remote.guesses.len().cmp(&local.guesses.len()) {
        Ordering::Greater => Winner::Remote,
        Ordering::Less => Winner::Local,
        Ordering::Equal
            if remote.game_status.is_terminal() && !local.game_status.is_terminal() =>
        {
            Winner::Remote
        }
        Ordering::Equal => Winner::Local,
    }
}

/// 对局数多者胜，相同则保留本地
pub fn reconcile_stats(local: &StatsRecord, remote: &StatsRecord) -> Winner {
    if remote.played > local.played {
        Winner::Remote
    } else {
        Winner::Local
    }
}

/// 一次同步对单个文档做了什么
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution<T> {
    /// 两边一致，或两边都没有
    Unchanged,
    PushedLocal,
    PulledRemote(T),
    /// 没有远端存储或未登录
    Skipped,
    /// 远端不可达，本地保持不变
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub key: StateKey,
    pub state: Resolution<GameState>,
    pub stats: Resolution<StatsRecord>,
}

impl SyncReport {
    fn skipped(key: StateKey) -> Self {
        SyncReport {
            key,
            state: Resolution::Skipped,
            stats: Resolution::Skipped,
        }
    }

    pub fn pulled_state(&self) -> Option<&GameState> {
        match &self.state {
            Resolution::PulledRemote(state) => Some(state),
            _ => None,
        }
    }
}

enum RemoteCommand {
    Write {
        user: String,
        key: DocKey,
        body: String,
    },
    Remove {
        user: String,
        key: DocKey,
    },
    Flush(oneshot::Sender<()>),
}

struct StoreInner {
    local: Arc<dyn LocalStore>,
    remote: Option<Arc<dyn RemoteStore>>,
    identity: RwLock<Option<Identity>>,
    writer: OnceCell<mpsc::UnboundedSender<RemoteCommand>>,
    in_flight: DashMap<Mode, Shared<BoxFuture<'static, SyncReport>>>,
}

#[derive(Clone)]
pub struct PersistenceStore {
    inner: Arc<StoreInner>,
}

impl PersistenceStore {
    pub fn new(local: Arc<dyn LocalStore>, remote: Option<Arc<dyn RemoteStore>>) -> Self {
        PersistenceStore {
            inner: Arc::new(StoreInner {
                local,
                remote,
                identity: RwLock::new(None),
                writer: OnceCell::new(),
                in_flight: DashMap::new(),
            }),
        }
    }

    pub fn local_only(local: Arc<dyn LocalStore>) -> Self {
        Self::new(local, None)
    }

    pub fn has_remote(&self) -> bool {
        self.inner.remote.is_some()
    }

    pub fn sign_in(&self, identity: Identity) {
        info!(user = %identity.user_id, "用户已登录");
        *self.inner.identity.write().unwrap_or_else(PoisonError::into_inner) = Some(identity);
    }

    pub fn sign_out(&self) {
        *self.inner.identity.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner
            .identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// 先写本地，再把远端写入排队，不等待
    pub fn save_state(&self, key: StateKey, state: &GameState) -> Result<()> {
        let doc = DocKey::State(key);
        let body = serde_json::to_string(state).map_err(|e| Error::Storage(e.to_string()))?;
        self.inner.local.write(&doc, &body)?;
        self.queue_remote(doc, Some(body));
        Ok(())
    }

    /// 读取 `key` 对应的存档。无法解析或日期不符的记录会被删除，按不存在处理
    pub fn load_state(&self, key: StateKey) -> Option<GameState> {
        let doc = DocKey::State(key);
        let body = match self.inner.local.read(&doc) {
            Ok(Some(body)) => body,
            Ok(None) => return None,
            Err(e) => {
                warn!(%key, error = %e, "读取本地存档失败");
                return None;
            }
        };

        match parse_state(key, &body) {
            Ok(state) => Some(state),
            Err(reason) => {
                warn!(%key, %reason, "本地存档已损坏，丢弃");
                self.discard_state(key);
                None
            }
        }
    }

    /// 只删除本地存档，远端副本保持不动；删除失败只记日志
    pub fn discard_state(&self, key: StateKey) {
        if let Err(e) = self.inner.local.remove(&DocKey::State(key)) {
            warn!(%key, error = %e, "删除本地存档失败");
        }
    }

    pub fn remove_state(&self, key: StateKey) -> Result<()> {
        let doc = DocKey::State(key);
        self.inner.local.remove(&doc)?;
        self.queue_remote(doc, None);
        Ok(())
    }

    pub fn save_stats(&self, mode: Mode, stats: &StatsRecord) -> Result<()> {
        let doc = DocKey::Stats(mode);
        let body = serde_json::to_string(stats).map_err(|e| Error::Storage(e.to_string()))?;
        self.inner.local.write(&doc, &body)?;
        self.queue_remote(doc, Some(body));
        Ok(())
    }

    /// 读取 `mode` 的统计，不存在或无法解析时返回新记录
    pub fn load_stats(&self, mode: Mode) -> StatsRecord {
        match self.inner.local.read(&DocKey::Stats(mode)) {
            Ok(Some(body)) => parse_stats(&body).unwrap_or_else(|reason| {
                warn!(%mode, %reason, "统计数据无法解析，重新开始");
                StatsRecord::default()
            }),
            Ok(None) => StatsRecord::default(),
            Err(e) => {
                warn!(%mode, error = %e, "读取统计数据失败");
                StatsRecord::default()
            }
        }
    }

    /// 等待已排队的远端写入全部执行完
    pub async fn flush_remote(&self) {
        let Some(tx) = self.inner.writer.get() else {
            return;
        };
        let (done, wait) = oneshot::channel();
        if tx.send(RemoteCommand::Flush(done)).is_ok() {
            let _ = wait.await;
        }
    }

    /// 对齐 `key` 的本地与远端存档，以及该模式的统计数据。
    ///
    /// 同一模式同一时间只跑一个同步。相同 key 的并发调用共享结果；
    /// 不同日期的调用先等正在进行的同步结束，再为自己的 key 发起一次。
    pub async fn sync(&self, key: StateKey) -> SyncReport {
        let mode = key.mode;
        loop {
            let (sync, owner) = match self.inner.in_flight.entry(mode) {
                Entry::Occupied(running) if running.get().peek().is_none() => {
                    debug!(%key, "同一模式已有同步在进行，等待其完成");
                    (running.get().clone(), false)
                }
                entry => {
                    let sync = self.clone().run_sync(key).boxed().shared();
                    entry.insert(sync.clone());
                    (sync, true)
                }
            };

            let report = sync.await;
            if owner {
                self.inner
                    .in_flight
                    .remove_if(&mode, |_, running| running.peek().is_some());
            }
            if report.key == key {
                return report;
            }
            debug!(%key, done = %report.key, "等到的是其他日期的同步，重新发起");
        }
    }

    async fn run_sync(self, key: StateKey) -> SyncReport {
        let Some(remote) = self.inner.remote.clone() else {
            return SyncReport::skipped(key);
        };
        let Some(identity) = self.identity() else {
            debug!(%key, "未登录，跳过同步");
            return SyncReport::skipped(key);
        };

        let user = identity.user_id.as_str();
        let state = self.sync_state(remote.as_ref(), user, key).await;
        let stats = self.sync_stats(remote.as_ref(), user, key.mode).await;
        info!(
            %key,
            user,
            state = resolution_name(&state),
            stats = resolution_name(&stats),
            "同步完成"
        );

        SyncReport { key, state, stats }
    }

    async fn sync_state(
        &self,
        remote: &dyn RemoteStore,
        user: &str,
        key: StateKey,
    ) -> Resolution<GameState> {
        let doc = DocKey::State(key);
        let local = self.load_state(key);

        let remote_state = match remote.read(user, doc).await {
            Ok(body) => body.and_then(|body| match parse_state(key, &body) {
                Ok(state) => Some(state),
                Err(reason) => {
                    warn!(%key, %reason, "远端存档已损坏，忽略");
                    None
                }
            }),
            Err(e) => {
                warn!(%key, error = %e, "远端存档不可用，保持本地");
                return Resolution::Failed(e.to_string());
            }
        };

        match (local, remote_state) {
            (None, None) => Resolution::Unchanged,
            (Some(local), None) => push(remote, user, doc, &local).await,
            (None, Some(remote_state)) => self.adopt_state(key, remote_state),
            (Some(local), Some(remote_state)) => match reconcile(&local, &remote_state) {
                Winner::Remote => self.adopt_state(key, remote_state),
                Winner::Local if local == remote_state => Resolution::Unchanged,
                Winner::Local => push(remote, user, doc, &local).await,
            },
        }
    }

    /// 把远端副本写入本地，除非同步期间本地进度已经超过它
    fn adopt_state(&self, key: StateKey, remote_state: GameState) -> Resolution<GameState> {
        if let Some(current) = self.load_state(key)
            && reconcile(&current, &remote_state) == Winner::Local
        {
            return Resolution::Unchanged;
        }

        let written = serde_json::to_string(&remote_state)
            .map_err(|e| Error::Storage(e.to_string()))
            .and_then(|body| self.inner.local.write(&DocKey::State(key), &body));
        match written {
            Ok(()) => Resolution::PulledRemote(remote_state),
            Err(e) => {
                warn!(%key, error = %e, "远端存档写入本地失败");
                Resolution::Failed(e.to_string())
            }
        }
    }

    async fn sync_stats(
        &self,
        remote: &dyn RemoteStore,
        user: &str,
        mode: Mode,
    ) -> Resolution<StatsRecord> {
        let doc = DocKey::Stats(mode);
        let local = self.load_stats(mode);

        let remote_stats = match remote.read(user, doc).await {
            Ok(body) => body.and_then(|body| parse_stats(&body).ok()),
            Err(e) => {
                warn!(%mode, error = %e, "远端统计不可用，保持本地");
                return Resolution::Failed(e.to_string());
            }
        };

        match remote_stats {
            None if local == StatsRecord::default() => Resolution::Unchanged,
            None => push(remote, user, doc, &local).await,
            Some(remote_stats) if reconcile_stats(&local, &remote_stats) == Winner::Remote => {
                match self.save_stats_local(mode, &remote_stats) {
                    Ok(()) => Resolution::PulledRemote(remote_stats),
                    Err(e) => Resolution::Failed(e.to_string()),
                }
            }
            Some(remote_stats) if remote_stats == local => Resolution::Unchanged,
            Some(_) => push(remote, user, doc, &local).await,
        }
    }

    fn save_stats_local(&self, mode: Mode, stats: &StatsRecord) -> Result<()> {
        let body = serde_json::to_string(stats).map_err(|e| Error::Storage(e.to_string()))?;
        self.inner.local.write(&DocKey::Stats(mode), &body)
    }

    fn queue_remote(&self, key: DocKey, body: Option<String>) {
        let Some(user) = self.identity().map(|identity| identity.user_id) else {
            return;
        };
        let Some(tx) = self.writer() else {
            return;
        };

        let command = match body {
            Some(body) => RemoteCommand::Write { user, key, body },
            None => RemoteCommand::Remove { user, key },
        };
        if tx.send(command).is_err() {
            warn!(%key, "远端写入任务已停止，改动仅保存在本地");
        }
    }

    /// 懒启动唯一的远端写入任务，按顺序执行
    fn writer(&self) -> Option<&mpsc::UnboundedSender<RemoteCommand>> {
        let remote = self.inner.remote.clone()?;
        self.inner
            .writer
            .get_or_try_init(|| {
                let handle = tokio::runtime::Handle::try_current().map_err(|e| {
                    debug!(error = %e, "没有异步运行时，远端镜像停用");
                })?;
                let (tx, rx) = mpsc::unbounded_channel();
                handle.spawn(run_remote_writer(remote, rx));
                Ok::<_, ()>(tx)
            })
            .ok()
    }
}

async fn run_remote_writer(
    remote: Arc<dyn RemoteStore>,
    mut rx: mpsc::UnboundedReceiver<RemoteCommand>,
) {
    while let Some(command) = rx.recv().await {
        match command {
            RemoteCommand::Write { user, key, body } => {
                if let Err(e) = remote.write(&user, key, body).await {
                    warn!(%key, error = %e, "远端写入失败，保留本地副本");
                }
            }
            RemoteCommand::Remove { user, key } => {
                if let Err(e) = remote.remove(&user, key).await {
                    warn!(%key, error = %e, "远端删除失败");
                }
            }
            RemoteCommand::Flush(done) => {
                let _ = done.send(());
            }
        }
    }
}

async fn push<T: Serialize, R>(
    remote: &dyn RemoteStore,
    user: &str,
    doc: DocKey,
    value: &T,
) -> Resolution<R> {
    let body = match serde_json::to_string(value) {
        Ok(body) => body,
        Err(e) => return Resolution::Failed(e.to_string()),
    };
    match remote.write(user, doc, body).await {
        Ok(()) => Resolution::PushedLocal,
        Err(e) => {
            warn!(key = %doc, error = %e, "推送本地副本失败");
            Resolution::Failed(e.to_string())
        }
    }
}

fn parse_state(key: StateKey, body: &str) -> std::result::Result<GameState, String> {
    let state: GameState = serde_json::from_str(body).map_err(|e| e.to_string())?;
    if state.day_index != key.day {
        return Err(format!("记录属于第 {} 天", state.day_index));
    }
    if state.guesses.len() > MAX_GUESSES {
        return Err(format!("记录了 {} 次猜测", state.guesses.len()));
    }
    if let Some(bad) = state
        .guesses
        .iter()
        .find(|g| g.chars().count() != key.mode.word_length())
    {
        return Err(format!("猜测 {} 长度不对", bad));
    }
    Ok(state)
}

fn parse_stats(body: &str) -> std::result::Result<StatsRecord, String> {
    serde_json::from_str(body).map_err(|e| e.to_string())
}

fn resolution_name<T>(resolution: &Resolution<T>) -> &'static str {
    match resolution {
        Resolution::Unchanged => "unchanged",
        Resolution::PushedLocal => "pushed",
        Resolution::PulledRemote(_) => "pulled",
        Resolution::Skipped => "skipped",
        Resolution::Failed(_) => "failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::GameStatus;
    use crate::storage::{MemoryRemote, MemoryStore};
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;

    const KEY: StateKey = StateKey {
        mode: Mode::Five,
        day: 7,
    };

    fn state(guesses: &[&str], status: GameStatus) -> GameState {
        GameState {
            guesses: guesses.iter().map(|g| g.to_string()).collect(),
            game_status: status,
            ..GameState::new(KEY.day)
        }
    }

    fn stores() -> (PersistenceStore, Arc<MemoryStore>, Arc<MemoryRemote>) {
        let local = Arc::new(MemoryStore::new());
        let remote = Arc::new(MemoryRemote::new());
        let store = PersistenceStore::new(local.clone(), Some(remote.clone()));
        store.sign_in(Identity::new("alice"));
        (store, local, remote)
    }

    fn remote_state(remote: &MemoryRemote) -> Option<GameState> {
        remote
            .get("alice", DocKey::State(KEY))
            .map(|body| serde_json::from_str(&body).unwrap())
    }

    #[test]
    fn reconcile_prefers_more_progress() {
        let one = state(&["CRANE"], GameStatus::InProgress);
        let two = state(&["CRANE", "SLATE"], GameStatus::InProgress);
        let two_won = state(&["CRANE", "SLATE"], GameStatus::Won);

        assert_eq!(reconcile(&one, &two), Winner::Remote);
        assert_eq!(reconcile(&two, &one), Winner::Local);
        assert_eq!(reconcile(&two, &two_won), Winner::Remote);
        assert_eq!(reconcile(&two_won, &two), Winner::Local);
        assert_eq!(reconcile(&two, &two), Winner::Local);
    }

    #[test]
    fn save_then_load_round_trips() {
        let store = PersistenceStore::local_only(Arc::new(MemoryStore::new()));
        let saved = GameState {
            hint_used: true,
            hinted_letter: Some('R'),
            hinted_pos: Some(1),
            ..state(&["CRANE", "SLATE"], GameStatus::InProgress)
        };

        store.save_state(KEY, &saved).unwrap();
        assert_eq!(store.load_state(KEY), Some(saved));
        assert_eq!(store.load_state(StateKey::new(Mode::Six, KEY.day)), None);
    }

    #[test]
    fn corrupt_or_foreign_records_are_discarded() {
        let local = Arc::new(MemoryStore::new());
        let store = PersistenceStore::local_only(local.clone());
        let doc = DocKey::State(KEY);

        local.write(&doc, "{not json").unwrap();
        assert_eq!(store.load_state(KEY), None);
        assert_eq!(local.read(&doc).unwrap(), None);

        let yesterday = GameState::new(KEY.day - 1);
        local.write(&doc, &serde_json::to_string(&yesterday).unwrap()).unwrap();
        assert_eq!(store.load_state(KEY), None);

        local
            .write(&doc, r#"{"dayIndex":7,"guesses":["CRAN"],"gameStatus":"IN_PROGRESS"}"#)
            .unwrap();
        assert_eq!(store.load_state(KEY), None);
    }

    #[test]
    fn unreadable_stats_start_fresh() {
        let local = Arc::new(MemoryStore::new());
        let store = PersistenceStore::local_only(local.clone());
        local.write(&DocKey::Stats(Mode::Five), "[]").unwrap();
        assert_eq!(store.load_stats(Mode::Five), StatsRecord::default());
    }

    #[tokio::test]
    async fn saves_are_mirrored_in_order() {
        let (store, _, remote) = stores();
        store.save_state(KEY, &state(&["CRANE"], GameStatus::InProgress)).unwrap();
        store.save_state(KEY, &state(&["CRANE", "SLATE"], GameStatus::InProgress)).unwrap();
        store.flush_remote().await;

        assert_eq!(remote_state(&remote).unwrap().guesses.len(), 2);

        store.remove_state(KEY).unwrap();
        store.flush_remote().await;
        assert_eq!(remote_state(&remote), None);
    }

    #[tokio::test]
    async fn signed_out_sync_is_skipped() {
        let (store, _, remote) = stores();
        store.sign_out();
        store.save_state(KEY, &state(&["CRANE"], GameStatus::InProgress)).unwrap();
        store.flush_remote().await;

        let report = store.sync(KEY).await;
        assert_eq!(report.state, Resolution::Skipped);
        assert_eq!(remote_state(&remote), None);
    }

    #[tokio::test]
    async fn local_only_copy_is_pushed() {
        let (store, local, remote) = stores();
        let saved = state(&["CRANE"], GameStatus::InProgress);
        local
            .write(&DocKey::State(KEY), &serde_json::to_string(&saved).unwrap())
            .unwrap();

        let report = store.sync(KEY).await;
        assert_eq!(report.state, Resolution::PushedLocal);
        assert_eq!(remote_state(&remote), Some(saved));
    }

    #[tokio::test]
    async fn remote_with_more_guesses_is_pulled() {
        let (store, _, remote) = stores();
        store.sign_out();
        store.save_state(KEY, &state(&["CRANE"], GameStatus::InProgress)).unwrap();
        store.sign_in(Identity::new("alice"));

        let ahead = state(&["CRANE", "SLATE", "ERECT"], GameStatus::Won);
        remote.insert("alice", DocKey::State(KEY), serde_json::to_string(&ahead).unwrap());

        let report = store.sync(KEY).await;
        assert_eq!(report.pulled_state(), Some(&ahead));
        assert_eq!(store.load_state(KEY), Some(ahead));
    }

    #[tokio::test]
    async fn finished_remote_wins_a_tie() {
        let (store, local, remote) = stores();
        let mine = state(&["CRANE", "SLATE"], GameStatus::InProgress);
        let theirs = state(&["CRANE", "SLATE"], GameStatus::Won);
        local
            .write(&DocKey::State(KEY), &serde_json::to_string(&mine).unwrap())
            .unwrap();
        remote.insert("alice", DocKey::State(KEY), serde_json::to_string(&theirs).unwrap());

        let report = store.sync(KEY).await;
        assert_eq!(report.state, Resolution::PulledRemote(theirs));
    }

    #[tokio::test]
    async fn local_with_more_guesses_is_pushed() {
        let (store, local, remote) = stores();
        let mine = state(&["CRANE", "SLATE"], GameStatus::InProgress);
        local
            .write(&DocKey::State(KEY), &serde_json::to_string(&mine).unwrap())
            .unwrap();
        remote.insert(
            "alice",
            DocKey::State(KEY),
            serde_json::to_string(&state(&["TRACE"], GameStatus::InProgress)).unwrap(),
        );

        assert_eq!(store.sync(KEY).await.state, Resolution::PushedLocal);
        assert_eq!(remote_state(&remote), Some(mine));
    }

    #[tokio::test]
    async fn offline_remote_leaves_local_alone() {
        let (store, local, remote) = stores();
        let mine = state(&["CRANE"], GameStatus::InProgress);
        local
            .write(&DocKey::State(KEY), &serde_json::to_string(&mine).unwrap())
            .unwrap();
        remote.set_offline(true);

        let report = store.sync(KEY).await;
        assert!(matches!(report.state, Resolution::Failed(_)));
        assert!(matches!(report.stats, Resolution::Failed(_)));
        assert_eq!(store.load_state(KEY), Some(mine));
    }

    #[tokio::test]
    async fn stats_with_more_games_are_pulled() {
        let (store, _, remote) = stores();
        let mut theirs = StatsRecord::new();
        theirs.record_outcome(true, 4);
        theirs.record_outcome(true, 2);
        remote.insert("alice", DocKey::Stats(Mode::Five), serde_json::to_string(&theirs).unwrap());

        let report = store.sync(KEY).await;
        assert_eq!(report.stats, Resolution::PulledRemote(theirs.clone()));
        assert_eq!(store.load_stats(Mode::Five), theirs);
    }

    struct SlowRemote {
        inner: MemoryRemote,
        reads: AtomicUsize,
    }

    impl RemoteStore for SlowRemote {
        fn read<'a>(
            &'a self,
            user: &'a str,
            key: DocKey,
        ) -> BoxFuture<'a, Result<Option<String>>> {
            self.reads.fetch_add(1, AtomicOrdering::SeqCst);
            async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                self.inner.read(user, key).await
            }
            .boxed()
        }

        fn write<'a>(
            &'a self,
            user: &'a str,
            key: DocKey,
            body: String,
        ) -> BoxFuture<'a, Result<()>> {
            self.inner.write(user, key, body)
        }

        fn remove<'a>(&'a self, user: &'a str, key: DocKey) -> BoxFuture<'a, Result<()>> {
            self.inner.remove(user, key)
        }
    }

    #[tokio::test]
    async fn concurrent_syncs_of_a_mode_are_coalesced() {
        let remote = Arc::new(SlowRemote {
            inner: MemoryRemote::new(),
            reads: AtomicUsize::new(0),
        });
        let store = PersistenceStore::new(Arc::new(MemoryStore::new()), Some(remote.clone()));
        store.sign_in(Identity::new("alice"));

        let (a, b) = tokio::join!(store.sync(KEY), store.sync(KEY));
        assert_eq!(a, b);
        // 一次存档读取加一次统计读取
        assert_eq!(remote.reads.load(AtomicOrdering::SeqCst), 2);

        store.sync(KEY).await;
        assert_eq!(remote.reads.load(AtomicOrdering::SeqCst), 4);
    }

    #[tokio::test]
    async fn sync_of_another_day_waits_then_runs_its_own() {
        let remote = Arc::new(SlowRemote {
            inner: MemoryRemote::new(),
            reads: AtomicUsize::new(0),
        });
        let store = PersistenceStore::new(Arc::new(MemoryStore::new()), Some(remote.clone()));
        store.sign_in(Identity::new("alice"));

        let next_day = StateKey::new(Mode::Five, KEY.day + 1);
        let ahead = GameState {
            guesses: vec!["CRANE".to_string(), "SLATE".to_string()],
            ..GameState::new(next_day.day)
        };
        remote
            .inner
            .insert("alice", DocKey::State(next_day), serde_json::to_string(&ahead).unwrap());

        let (a, b) = tokio::join!(store.sync(KEY), store.sync(next_day));
        assert_eq!(a.key, KEY);
        assert_eq!(b.key, next_day);
        assert_eq!(b.pulled_state(), Some(&ahead));
        assert_eq!(store.load_state(next_day), Some(ahead));
        assert_eq!(remote.reads.load(AtomicOrdering::SeqCst), 4);
    }

    #[tokio::test]
    async fn discarding_a_game_keeps_the_remote_copy() {
        let (store, local, remote) = stores();
        let saved = state(&["CRANE"], GameStatus::InProgress);
        store.save_state(KEY, &saved).unwrap();
        store.flush_remote().await;

        store.discard_state(KEY);
        store.flush_remote().await;
        assert_eq!(local.read(&DocKey::State(KEY)).unwrap(), None);
        assert_eq!(remote_state(&remote), Some(saved));
    }
}
