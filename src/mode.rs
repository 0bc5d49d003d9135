use crate::clock::DayIndex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 每局可猜的次数
pub const MAX_GUESSES: usize = 6;

/// 游戏模式，按单词长度区分
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(try_from = "usize", into = "usize")]
pub enum Mode {
    Four,
    #[default]
    Five,
    Six,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Four, Mode::Five, Mode::Six];

    pub fn word_length(self) -> usize {
        match self {
            Mode::Four => 4,
            Mode::Five => 5,
            Mode::Six => 6,
        }
    }

    pub fn from_length(len: usize) -> Option<Self> {
        match len {
            4 => Some(Mode::Four),
            5 => Some(Mode::Five),
            6 => Some(Mode::Six),
            _ => None,
        }
    }

    /// 混淆后的答案列表文件，如 `sol5.dat`
    pub fn solutions_file(self) -> String {
        format!("sol{}.dat", self.word_length())
    }

    /// 校验哈希数组文件，如 `val5.dat`
    pub fn validation_file(self) -> String {
        format!("val{}.dat", self.word_length())
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.word_length())
    }
}

impl TryFrom<usize> for Mode {
    type Error = String;

    fn try_from(len: usize) -> Result<Self, Self::Error> {
        Mode::from_length(len).ok_or_else(|| format!("不支持的单词长度: {}", len))
    }
}

impl From<Mode> for usize {
    fn from(mode: Mode) -> usize {
        mode.word_length()
    }
}

impl std::str::FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let len: usize = s
            .trim()
            .parse()
            .map_err(|_| format!("不是合法的单词长度: {}", s))?;
        Mode::try_from(len)
    }
}

/// 一局游戏的键：模式 + 日期
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub mode: Mode,
    pub day: DayIndex,
}

impl StateKey {
    pub fn new(mode: Mode, day: DayIndex) -> Self {
        StateKey { mode, day }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "day {} ({} letters)", self.day, self.mode)
    }
}
