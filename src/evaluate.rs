//! 猜测的逐字母反馈

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// 单个位置的反馈，按强弱排序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Absent,
    Present,
    Correct,
}

/// 按位置给出 `guess` 相对 `solution` 的反馈。
///
/// 先认领位置完全匹配的字母，重复字母只有在答案里还有剩余时才标为存在。
/// 两个单词需大小写一致，由调用方先规范化
pub fn evaluate(guess: &str, solution: &str) -> Vec<Verdict> {
    let guess: Vec<char> = guess.chars().collect();
    let solution: Vec<char> = solution.chars().collect();

    let mut remaining: HashMap<char, usize> = HashMap::new();
    for &c in &solution {
        *remaining.entry(c).or_insert(0) += 1;
    }

    let mut verdicts = vec![Verdict::Absent; guess.len()];

    for (i, &c) in guess.iter().enumerate() {
        if solution.get(i) == Some(&c) {
            verdicts[i] = Verdict::Correct;
            if let Some(count) = remaining.get_mut(&c) {
                *count -= 1;
            }
        }
    }

    for (i, &c) in guess.iter().enumerate() {
        if verdicts[i] == Verdict::Correct {
            continue;
        }
        if let Some(count) = remaining.get_mut(&c)
            && *count > 0
        {
            verdicts[i] = Verdict::Present;
            *count -= 1;
        }
    }

    verdicts
}

pub fn is_solved(verdicts: &[Verdict]) -> bool {
    !verdicts.is_empty() && verdicts.iter().all(|v| *v == Verdict::Correct)
}

/// 每个字母迄今最好的反馈，用于给键盘上色
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyboardState {
    letters: BTreeMap<char, Verdict>,
}

impl KeyboardState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 并入一次猜测的结果，字母状态只升不降
    pub fn record(&mut self, guess: &str, verdicts: &[Verdict]) {
        for (c, &v) in guess.chars().zip(verdicts) {
            let entry = self.letters.entry(c).or_insert(v);
            if v > *entry {
                *entry = v;
            }
        }
    }

    pub fn get(&self, letter: char) -> Option<Verdict> {
        self.letters.get(&letter.to_ascii_uppercase()).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (char, Verdict)> + '_ {
        self.letters.iter().map(|(c, v)| (*c, *v))
    }
}
