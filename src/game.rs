use crate::clock::DayIndex;
use crate::codec;
use crate::evaluate::{KeyboardState, Verdict, evaluate, is_solved};
use crate::mode::{MAX_GUESSES, Mode, StateKey};
use crate::word_bank::WordCorpus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// 一局游戏的状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameStatus {
    #[default]
    InProgress,
    Won,
    Lost,
}

impl GameStatus {
    pub fn is_terminal(self) -> bool {
        self != GameStatus::InProgress
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::InProgress => write!(f, "IN_PROGRESS"),
            GameStatus::Won => write!(f, "WON"),
            GameStatus::Lost => write!(f, "LOST"),
        }
    }
}

/// 持久化的游戏记录，每个模式每天一份
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub day_index: DayIndex,
    pub guesses: Vec<String>,
    pub game_status: GameStatus,
    #[serde(default)]
    pub hint_used: bool,
    #[serde(default)]
    pub hinted_letter: Option<char>,
    #[serde(default)]
    pub hinted_pos: Option<usize>,
}

impl GameState {
    pub fn new(day_index: DayIndex) -> Self {
        GameState {
            day_index,
            guesses: Vec::new(),
            game_status: GameStatus::InProgress,
            hint_used: false,
            hinted_letter: None,
            hinted_pos: None,
        }
    }
}

/// 提示揭示的字母
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hint {
    pub letter: char,
    pub position: usize,
}

/// 猜测被拒绝的原因，被拒时状态不变
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GuessRejection {
    #[error("Not enough letters")]
    TooShort,
    #[error("Not in word list")]
    NotInList,
    #[error("Game is already over")]
    GameOver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintOutcome {
    Revealed(Hint),
    AlreadyUsed,
    NothingToHint,
    GameOver,
}

/// 一次有效猜测带来的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GameEvent {
    Guessed {
        verdicts: Vec<Verdict>,
        attempts_left: usize,
    },
    Won {
        verdicts: Vec<Verdict>,
        attempts: usize,
    },
    Lost {
        verdicts: Vec<Verdict>,
        solution: String,
    },
}

impl GameEvent {
    pub fn verdicts(&self) -> &[Verdict] {
        match self {
            GameEvent::Guessed { verdicts, .. }
            | GameEvent::Won { verdicts, .. }
            | GameEvent::Lost { verdicts, .. } => verdicts,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, GameEvent::Guessed { .. })
    }
}

/// 当前行已输入的字母。
///
/// 提示格被锁定：光标前进后退都会跳过它，也不能覆盖或删除
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowBuffer {
    cells: Vec<Option<char>>,
    locked: Vec<bool>,
    cursor: usize,
}

impl RowBuffer {
    pub fn new(len: usize) -> Self {
        RowBuffer {
            cells: vec![None; len],
            locked: vec![false; len],
            cursor: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Option::is_none)
    }

    /// 下一个待填位置，行满时等于 `len()`
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn cells(&self) -> &[Option<char>] {
        &self.cells
    }

    pub fn is_locked(&self, position: usize) -> bool {
        self.locked.get(position).copied().unwrap_or(false)
    }

    pub fn is_complete(&self) -> bool {
        self.cells.iter().all(Option::is_some)
    }

    pub fn word(&self) -> Option<String> {
        self.cells.iter().copied().collect()
    }

    pub fn push(&mut self, letter: char) -> bool {
        if !letter.is_ascii_alphabetic() || self.cursor >= self.cells.len() {
            return false;
        }
        self.cells[self.cursor] = Some(letter.to_ascii_uppercase());
        self.cursor = self.next_open(self.cursor + 1);
        true
    }

    pub fn pop(&mut self) -> bool {
        let Some(prev) = (0..self.cursor).rev().find(|&i| !self.locked[i]) else {
            return false;
        };
        self.cells[prev] = None;
        self.cursor = prev;
        true
    }

    fn lock(&mut self, position: usize, letter: char) {
        if position >= self.cells.len() {
            return;
        }
        self.cells[position] = Some(letter);
        self.locked[position] = true;
        if self.cursor == position {
            self.cursor = self.next_open(position);
        }
    }

    fn next_open(&self, from: usize) -> usize {
        (from..self.cells.len())
            .find(|&i| !self.locked[i])
            .unwrap_or(self.cells.len())
    }
}

/// 玩家对某一天题目的一局游戏
#[derive(Debug, Clone)]
pub struct GameSession {
    id: Uuid,
    key: StateKey,
    corpus: Arc<WordCorpus>,
    solution: String,
    guesses: Vec<String>,
    verdicts: Vec<Vec<Verdict>>,
    status: GameStatus,
    hint: Option<Hint>,
    row: RowBuffer,
    keyboard: KeyboardState,
}

impl GameSession {
    /// 新开 `day` 的一局。必须传入已加载的词库
    pub fn new(corpus: Arc<WordCorpus>, day: DayIndex) -> Self {
        let mode = corpus.mode();
        let solution = corpus.solution_for_day(day).to_string();

        GameSession {
            id: Uuid::new_v4(),
            key: StateKey::new(mode, day),
            corpus,
            solution,
            guesses: Vec::new(),
            verdicts: Vec::new(),
            status: GameStatus::InProgress,
            hint: None,
            row: RowBuffer::new(mode.word_length()),
            keyboard: KeyboardState::new(),
        }
    }

    /// 重放存档恢复对局。存档对当天答案不成立时返回 `None`
    pub fn restore(corpus: Arc<WordCorpus>, state: &GameState) -> Option<Self> {
        let mut session = GameSession::new(corpus, state.day_index);
        match session.replay(state) {
            Ok(()) => Some(session),
            Err(reason) => {
                warn!(key = %session.key, %reason, "存档无法重放，丢弃");
                None
            }
        }
    }

    fn replay(&mut self, state: &GameState) -> Result<(), String> {
        if state.guesses.len() > MAX_GUESSES {
            return Err(format!("记录了 {} 次猜测", state.guesses.len()));
        }

        if state.hint_used {
            let (Some(letter), Some(position)) = (state.hinted_letter, state.hinted_pos) else {
                return Err("提示标记为已用，但缺少字母或位置".to_string());
            };
            let letter = letter.to_ascii_uppercase();
            if self.solution.chars().nth(position) != Some(letter) {
                return Err(format!("提示 {}@{} 与答案不符", letter, position));
            }
            self.hint = Some(Hint { letter, position });
        }

        for guess in &state.guesses {
            if self.status.is_terminal() {
                return Err("对局结束后仍有猜测记录".to_string());
            }
            let guess = codec::normalize(guess);
            if guess.chars().count() != self.word_length() {
                return Err(format!("猜测 {} 长度不对", guess));
            }
            self.apply(guess);
        }

        if self.status != state.game_status {
            return Err(format!(
                "存档状态为 {}，重放结果为 {}",
                state.game_status, self.status
            ));
        }

        self.row = self.fresh_row();
        Ok(())
    }

    /// 用于持久化的快照
    pub fn state(&self) -> GameState {
        GameState {
            day_index: self.key.day,
            guesses: self.guesses.clone(),
            game_status: self.status,
            hint_used: self.hint.is_some(),
            hinted_letter: self.hint.map(|h| h.letter),
            hinted_pos: self.hint.map(|h| h.position),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn key(&self) -> StateKey {
        self.key
    }

    pub fn mode(&self) -> Mode {
        self.key.mode
    }

    pub fn day(&self) -> DayIndex {
        self.key.day
    }

    pub fn word_length(&self) -> usize {
        self.key.mode.word_length()
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn guesses(&self) -> &[String] {
        &self.guesses
    }

    /// 每次猜测的反馈，按顺序
    pub fn rows(&self) -> &[Vec<Verdict>] {
        &self.verdicts
    }

    pub fn attempts_left(&self) -> usize {
        MAX_GUESSES - self.guesses.len()
    }

    pub fn hint(&self) -> Option<Hint> {
        self.hint
    }

    pub fn row(&self) -> &RowBuffer {
        &self.row
    }

    pub fn keyboard(&self) -> &KeyboardState {
        &self.keyboard
    }

    /// 对局结束后才给出答案
    pub fn solution(&self) -> Option<&str> {
        self.status.is_terminal().then_some(self.solution.as_str())
    }

    pub fn type_letter(&mut self, letter: char) -> bool {
        !self.status.is_terminal() && self.row.push(letter)
    }

    pub fn delete_letter(&mut self) -> bool {
        !self.status.is_terminal() && self.row.pop()
    }

    /// 提交当前行已输入的字母
    pub fn submit_row(&mut self) -> Result<GameEvent, GuessRejection> {
        if self.status.is_terminal() {
            return Err(GuessRejection::GameOver);
        }
        let word = self.row.word().ok_or(GuessRejection::TooShort)?;
        self.submit_guess(&word)
    }

    pub fn submit_guess(&mut self, word: &str) -> Result<GameEvent, GuessRejection> {
        if self.status.is_terminal() {
            return Err(GuessRejection::GameOver);
        }

        let word = codec::normalize(word);
        if word.chars().count() != self.word_length() {
            return Err(GuessRejection::TooShort);
        }
        if !self.corpus.is_valid_guess(&word) {
            return Err(GuessRejection::NotInList);
        }

        let event = self.apply(word);
        self.row = self.fresh_row();
        debug!(session = %self.id, key = %self.key, status = %self.status, "猜测已接受");
        Ok(event)
    }

    /// 揭示第一个还没猜中的位置，每局一次
    pub fn use_hint(&mut self) -> HintOutcome {
        if self.status.is_terminal() {
            return HintOutcome::GameOver;
        }
        if self.hint.is_some() {
            return HintOutcome::AlreadyUsed;
        }

        let solved = |i: usize| self.verdicts.iter().any(|row| row[i] == Verdict::Correct);
        let Some((position, letter)) = self.solution.chars().enumerate().find(|(i, _)| !solved(*i))
        else {
            return HintOutcome::NothingToHint;
        };

        let hint = Hint { letter, position };
        self.hint = Some(hint);
        self.row.lock(position, letter);
        debug!(session = %self.id, key = %self.key, position, "已使用提示");
        HintOutcome::Revealed(hint)
    }

    fn apply(&mut self, word: String) -> GameEvent {
        let verdicts = evaluate(&word, &self.solution);
        self.keyboard.record(&word, &verdicts);
        self.guesses.push(word);
        self.verdicts.push(verdicts.clone());

        if is_solved(&verdicts) {
            self.status = GameStatus::Won;
            GameEvent::Won {
                verdicts,
                attempts: self.guesses.len(),
            }
        } else if self.guesses.len() >= MAX_GUESSES {
            self.status = GameStatus::Lost;
            GameEvent::Lost {
                verdicts,
                solution: self.solution.clone(),
            }
        } else {
            GameEvent::Guessed {
                verdicts,
                attempts_left: self.attempts_left(),
            }
        }
    }

    /// 揭示后每一行都预填提示字母
    fn fresh_row(&self) -> RowBuffer {
        let mut row = RowBuffer::new(self.word_length());
        if let Some(hint) = self.hint
            && !self.status.is_terminal()
        {
            row.lock(hint.position, hint.letter);
        }
        row
    }
}
