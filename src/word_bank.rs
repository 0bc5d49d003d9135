use crate::clock::DayIndex;
use crate::codec::{self, XorCodec};
use crate::mode::Mode;
use crate::{Error, Result};
use anyhow::Context;
use dashmap::DashMap;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// 某个模式两个词库文件的原始字节
#[derive(Debug, Clone, Default)]
pub struct CorpusFiles {
    pub solutions: Vec<u8>,
    pub validation: Vec<u8>,
}

impl CorpusFiles {
    /// 编码明文词表，答案总会写进词典
    pub fn encode<S: AsRef<str>>(solutions: &[S], allowed: &[S]) -> Self {
        let solutions: Vec<String> = solutions
            .iter()
            .map(|w| codec::normalize(w.as_ref()))
            .collect();

        let mut hashes: Vec<u32> = solutions
            .iter()
            .map(|w| codec::word_hash(w))
            .chain(allowed.iter().map(|w| codec::word_hash(w.as_ref())))
            .collect();
        hashes.sort_unstable();
        hashes.dedup();

        CorpusFiles {
            solutions: XorCodec::default().encode(&solutions),
            validation: codec::encode_hashes(hashes),
        }
    }
}

/// 词库字节的来源：本地文件、内置数据或 CDN
pub trait CorpusSource: Send + Sync {
    fn fetch(&self, mode: Mode) -> BoxFuture<'_, Result<CorpusFiles>>;
}

/// 从目录读取 `sol<N>.dat` 和 `val<N>.dat`
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        DirectorySource { dir: dir.into() }
    }
}

impl CorpusSource for DirectorySource {
    fn fetch(&self, mode: Mode) -> BoxFuture<'_, Result<CorpusFiles>> {
        async move {
            let solutions_path = self.dir.join(mode.solutions_file());
            let validation_path = self.dir.join(mode.validation_file());

            let solutions = tokio::fs::read(&solutions_path)
                .await
                .with_context(|| format!("无法读取 {}", solutions_path.display()))?;
            let validation = tokio::fs::read(&validation_path)
                .await
                .with_context(|| format!("无法读取 {}", validation_path.display()))?;

            Ok(CorpusFiles {
                solutions,
                validation,
            })
        }
        .boxed()
    }
}

/// 内存中的词库
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    files: HashMap<Mode, CorpusFiles>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_files(mut self, mode: Mode, files: CorpusFiles) -> Self {
        self.files.insert(mode, files);
        self
    }

    pub fn with_words(self, mode: Mode, solutions: &[&str], allowed: &[&str]) -> Self {
        self.with_files(mode, CorpusFiles::encode(solutions, allowed))
    }
}

impl CorpusSource for MemorySource {
    fn fetch(&self, mode: Mode) -> BoxFuture<'_, Result<CorpusFiles>> {
        let files = self.files.get(&mode).cloned();
        async move {
            files.ok_or_else(|| Error::CorpusUnavailable {
                mode,
                reason: "未内置该模式的词库".to_string(),
            })
        }
        .boxed()
    }
}

/// 解码后的单模式词库，构建后不可变
#[derive(Debug, Clone)]
pub struct WordCorpus {
    mode: Mode,
    validation: HashSet<u32>,
    solutions: Vec<String>,
}

impl WordCorpus {
    /// 解码两个文件，并保证每个答案都是合法猜测
    pub fn from_files(mode: Mode, files: &CorpusFiles) -> Result<Self> {
        let decoded = XorCodec::default().decode(&files.solutions)?;
        let total = decoded.len();

        let solutions: Vec<String> = decoded
            .into_iter()
            .map(|w| codec::normalize(&w))
            .filter(|w| {
                w.chars().count() == mode.word_length()
                    && w.chars().all(|c| c.is_ascii_alphabetic())
            })
            .collect();

        if solutions.len() < total {
            warn!(%mode, dropped = total - solutions.len(), "答案列表中有格式不对的单词");
        }
        if solutions.is_empty() {
            return Err(Error::CorpusUnavailable {
                mode,
                reason: "答案列表为空".to_string(),
            });
        }

        let mut validation: HashSet<u32> = codec::decode_hashes(&files.validation)?
            .into_iter()
            .collect();

        let mut missing = 0usize;
        for word in &solutions {
            if validation.insert(codec::word_hash(word)) {
                missing += 1;
            }
        }
        if missing > 0 {
            warn!(%mode, missing, "已补入校验数据中缺失的答案");
        }

        Ok(WordCorpus {
            mode,
            validation,
            solutions,
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    pub fn dictionary_size(&self) -> usize {
        self.validation.len()
    }

    /// 只查哈希集合，不扫描答案列表
    pub fn is_valid_guess(&self, word: &str) -> bool {
        let word = codec::normalize(word);
        word.chars().count() == self.mode.word_length()
            && self.validation.contains(&codec::word_hash(&word))
    }

    /// 纪元之前的日期靠 `rem_euclid` 保持在 `[0, N)` 内
    pub fn solution_index(&self, day: DayIndex) -> usize {
        day.rem_euclid(self.solutions.len() as i64) as usize
    }

    pub fn solution_for_day(&self, day: DayIndex) -> &str {
        &self.solutions[self.solution_index(day)]
    }

    pub fn solutions(&self) -> &[String] {
        &self.solutions
    }

    pub fn audit(&self) -> CorpusAudit {
        let plurals: Vec<String> = self
            .solutions
            .iter()
            .filter(|w| codec::is_plural_candidate(w))
            .cloned()
            .collect();

        CorpusAudit {
            mode: self.mode,
            total_words: self.solutions.len(),
            dictionary_size: self.validation.len(),
            plural_count: plurals.len(),
            plural_sample: plurals.into_iter().take(15).collect(),
        }
    }
}

/// 答案列表的整理报告
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusAudit {
    pub mode: Mode,
    pub total_words: usize,
    pub dictionary_size: usize,
    pub plural_count: usize,
    pub plural_sample: Vec<String>,
}

/// 按模式懒加载的词库，进程内常驻
pub struct WordBank {
    source: Arc<dyn CorpusSource>,
    corpora: DashMap<Mode, Arc<OnceCell<Arc<WordCorpus>>>>,
}

impl WordBank {
    pub fn new(source: Arc<dyn CorpusSource>) -> Self {
        WordBank {
            source,
            corpora: DashMap::new(),
        }
    }

    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(DirectorySource::new(dir)))
    }

    /// 每个模式只加载一次，并发调用等待同一次加载；
    /// 加载失败不缓存，下次调用会重试
    pub async fn load(&self, mode: Mode) -> Result<Arc<WordCorpus>> {
        let cell = self.corpora.entry(mode).or_default().clone();

        let loaded = cell
            .get_or_try_init(|| async {
                info!(%mode, "开始加载词库");
                let files = self.source.fetch(mode).await.map_err(|e| match e {
                    Error::CorpusUnavailable { .. } => e,
                    other => Error::CorpusUnavailable {
                        mode,
                        reason: other.to_string(),
                    },
                })?;
                let corpus = WordCorpus::from_files(mode, &files)?;
                info!(
                    %mode,
                    solutions = corpus.len(),
                    dictionary = corpus.dictionary_size(),
                    "词库加载完成"
                );
                Ok::<_, Error>(Arc::new(corpus))
            })
            .await;

        match loaded {
            Ok(corpus) => Ok(corpus.clone()),
            Err(e) => {
                warn!(%mode, error = %e, "词库加载失败");
                Err(e)
            }
        }
    }

    /// 已加载的词库，不等待
    pub fn get(&self, mode: Mode) -> Option<Arc<WordCorpus>> {
        self.corpora.get(&mode).and_then(|cell| cell.get().cloned())
    }

    pub fn is_loaded(&self, mode: Mode) -> bool {
        self.get(mode).is_some()
    }

    pub fn is_valid_guess(&self, word: &str, mode: Mode) -> Result<bool> {
        let corpus = self.get(mode).ok_or(Error::CorpusNotLoaded(mode))?;
        Ok(corpus.is_valid_guess(word))
    }

    pub fn select_solution(&self, day: DayIndex, mode: Mode) -> Result<String> {
        let corpus = self.get(mode).ok_or(Error::CorpusNotLoaded(mode))?;
        debug!(%mode, day, "选取当日答案");
        Ok(corpus.solution_for_day(day).to_string())
    }
}
