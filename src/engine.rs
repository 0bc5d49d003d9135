//! 供界面层调用的入口。
//!
//! 引擎不持有对局，宿主保存自己的 `GameSession` 并在调用时传入。
//! 猜测和提示在调用返回前落盘。同步是单独的 future，结果通过 `apply_sync`
//! 合并，同步进行时宿主照常接收输入。

use crate::clock::{DailyClock, DayIndex};
use crate::config::Config;
use crate::game::{GameEvent, GameSession, GuessRejection, HintOutcome};
use crate::mode::{MAX_GUESSES, Mode, StateKey};
use crate::stats::StatsSummary;
use crate::storage::{FileStore, RedisRemote, RemoteStore};
use crate::sync::{Identity, PersistenceStore, SyncReport, Winner, reconcile};
use crate::word_bank::WordBank;
use crate::Result;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct Engine {
    words: Arc<WordBank>,
    clock: DailyClock,
    store: PersistenceStore,
}

impl Engine {
    pub fn new(words: Arc<WordBank>, clock: DailyClock, store: PersistenceStore) -> Self {
        Engine {
            words,
            clock,
            store,
        }
    }

    /// 词库取自 `words.dir`，存档放在 `storage.data_dir`，配置了
    /// `remote.redis_url` 时启用 Redis 镜像；连不上 Redis 则只用本地
    pub async fn from_config(config: &Config) -> Result<Self> {
        let words = Arc::new(WordBank::from_dir(&config.words.dir));
        let local = Arc::new(FileStore::new(&config.storage.data_dir)?);

        let remote: Option<Arc<dyn RemoteStore>> = match &config.remote.redis_url {
            Some(url) => match RedisRemote::new(url, &config.remote.key_prefix).await {
                Ok(remote) => Some(Arc::new(remote)),
                Err(e) => {
                    warn!(error = %e, "远端存储不可用，离线运行");
                    None
                }
            },
            None => None,
        };

        Ok(Engine::new(
            words,
            DailyClock::system(),
            PersistenceStore::new(local, remote),
        ))
    }

    pub fn words(&self) -> &WordBank {
        &self.words
    }

    pub fn clock(&self) -> &DailyClock {
        &self.clock
    }

    pub fn store(&self) -> &PersistenceStore {
        &self.store
    }

    pub fn today(&self) -> DayIndex {
        self.clock.today_index()
    }

    /// `mode` 的今日题目
    pub async fn start(&self, mode: Mode) -> Result<GameSession> {
        self.start_day(mode, self.today()).await
    }

    /// 任意一天的题目，有有效存档时从存档恢复。
    /// 会等待词库加载，加载失败则返回错误
    pub async fn start_day(&self, mode: Mode, day: DayIndex) -> Result<GameSession> {
        let corpus = self.words.load(mode).await?;
        let key = StateKey::new(mode, day);

        let session = match self.store.load_state(key) {
            Some(state) => match GameSession::restore(corpus.clone(), &state) {
                Some(session) => session,
                None => {
                    self.store.discard_state(key);
                    GameSession::new(corpus, day)
                }
            },
            None => GameSession::new(corpus, day),
        };

        info!(
            session = %session.id(),
            %key,
            guesses = session.guesses().len(),
            status = %session.status(),
            "对局开始"
        );
        Ok(session)
    }

    /// 从头重开 `day`，已计入的统计保留
    pub async fn reset(&self, mode: Mode, day: DayIndex) -> Result<GameSession> {
        let key = StateKey::new(mode, day);
        self.store.remove_state(key)?;
        info!(%key, "对局已重置");
        self.start_day(mode, day).await
    }

    pub fn submit_guess(
        &self,
        session: &mut GameSession,
        word: &str,
    ) -> std::result::Result<GameEvent, GuessRejection> {
        let event = session.submit_guess(word)?;
        self.after_guess(session, &event);
        Ok(event)
    }

    pub fn submit_row(
        &self,
        session: &mut GameSession,
    ) -> std::result::Result<GameEvent, GuessRejection> {
        let event = session.submit_row()?;
        self.after_guess(session, &event);
        Ok(event)
    }

    pub fn use_hint(&self, session: &mut GameSession) -> HintOutcome {
        let outcome = session.use_hint();
        if matches!(outcome, HintOutcome::Revealed(_)) {
            self.persist(session);
        }
        outcome
    }

    pub fn stats(&self, mode: Mode) -> StatsSummary {
        self.store.load_stats(mode).summarize()
    }

    /// 只记录身份。登录后应立刻同步，一般直接用 `login`
    pub fn sign_in(&self, identity: Identity) {
        self.store.sign_in(identity);
    }

    /// 登录并同步 `key`，返回的报告交给 `apply_sync`
    pub async fn login(&self, identity: Identity, key: StateKey) -> SyncReport {
        self.sign_in(identity);
        self.sync(key).await
    }

    pub fn sign_out(&self) {
        self.store.sign_out();
    }

    /// 对齐 `key` 的本地存档与远端镜像
    pub async fn sync(&self, key: StateKey) -> SyncReport {
        self.store.sync(key).await
    }

    /// 把同步结果合并进当前对局。其他对局的报告、或已被本局进度超过的报告
    /// 直接丢弃。返回对局是否被替换
    pub fn apply_sync(&self, session: &mut GameSession, report: &SyncReport) -> bool {
        if report.key != session.key() {
            debug!(
                session = %session.key(),
                report = %report.key,
                "同步报告属于其他对局，丢弃"
            );
            return false;
        }
        let Some(remote) = report.pulled_state() else {
            return false;
        };
        if reconcile(&session.state(), remote) != Winner::Remote {
            debug!(key = %report.key, "同步期间对局已有新进度");
            return false;
        }
        let Some(corpus) = self.words.get(session.mode()) else {
            return false;
        };

        match GameSession::restore(corpus, remote) {
            Some(pulled) => {
                info!(
                    key = %report.key,
                    guesses = pulled.guesses().len(),
                    "对局已替换为远端副本"
                );
                *session = pulled;
                true
            }
            None => false,
        }
    }

    fn after_guess(&self, session: &GameSession, event: &GameEvent) {
        self.persist(session);

        let (won, attempts) = match event {
            GameEvent::Won { attempts, .. } => (true, *attempts),
            GameEvent::Lost { .. } => (false, MAX_GUESSES),
            GameEvent::Guessed { .. } => return,
        };

        let mode = session.mode();
        let mut stats = self.store.load_stats(mode);
        if !stats.record_day(session.day(), won, attempts) {
            debug!(key = %session.key(), "该局结果已计入");
            return;
        }
        if let Err(e) = self.store.save_stats(mode, &stats) {
            warn!(%mode, error = %e, "保存统计数据失败");
        }
        info!(key = %session.key(), won, attempts, "对局结束");
    }

    fn persist(&self, session: &GameSession) {
        if let Err(e) = self.store.save_state(session.key(), &session.state()) {
            warn!(key = %session.key(), error = %e, "保存存档失败");
        }
    }
}
