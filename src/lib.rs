pub mod clock;
pub mod codec;
pub mod config;
pub mod engine;
pub mod evaluate;
pub mod game;
pub mod mode;
pub mod stats;
pub mod storage;
pub mod sync;
pub mod word_bank;

pub use clock::{DailyClock, DayIndex};
pub use config::Config;
pub use engine::Engine;
pub use evaluate::{KeyboardState, Verdict, evaluate};
pub use game::{GameEvent, GameSession, GameState, GameStatus, GuessRejection, HintOutcome};
pub use mode::{Mode, StateKey};
pub use stats::{StatsRecord, StatsSummary};
pub use storage::*;
pub use sync::{Identity, PersistenceStore, Resolution, SyncReport};
pub use word_bank::{WordBank, WordCorpus};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{0} 字母词库尚未加载")]
    CorpusNotLoaded(mode::Mode),
    #[error("{mode} 字母词库不可用: {reason}")]
    CorpusUnavailable { mode: mode::Mode, reason: String },
    #[error("编码错误: {0}")]
    Codec(String),
    #[error("存储错误: {0}")]
    Storage(String),
    #[error("远端存储错误: {0}")]
    Remote(String),
    #[error("配置错误: {0}")]
    Config(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
