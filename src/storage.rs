use crate::mode::{Mode, StateKey};
use crate::{Error, Result};
use dashmap::DashMap;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::fmt;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;
use tracing::debug;

/// 存储文档的键。
///
/// 只在存储边界渲染为 `state_<day>_m<mode>` 或 `mode_<mode>`，上层都用类型化的键
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocKey {
    State(StateKey),
    Stats(Mode),
}

impl DocKey {
    pub fn mode(&self) -> Mode {
        match self {
            DocKey::State(key) => key.mode,
            DocKey::Stats(mode) => *mode,
        }
    }
}

impl From<StateKey> for DocKey {
    fn from(key: StateKey) -> Self {
        DocKey::State(key)
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocKey::State(key) => write!(f, "state_{}_m{}", key.day, key.mode),
            DocKey::Stats(mode) => write!(f, "mode_{}", mode),
        }
    }
}

/// 设备本地存储。调用返回前即完成，写入对之后同键的读取立即可见
pub trait LocalStore: Send + Sync {
    fn read(&self, key: &DocKey) -> Result<Option<String>>;
    fn write(&self, key: &DocKey, body: &str) -> Result<()>;
    fn remove(&self, key: &DocKey) -> Result<()>;
}

/// 每个文档一个 JSON 文件
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .map_err(|e| Error::Storage(format!("无法创建 {}: {}", dir.display(), e)))?;
        Ok(FileStore { dir })
    }

    fn path(&self, key: &DocKey) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl LocalStore for FileStore {
    fn read(&self, key: &DocKey) -> Result<Option<String>> {
        let path = self.path(key);
        match std::fs::read_to_string(&path) {
            Ok(body) => Ok(Some(body)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Storage(format!("无法读取 {}: {}", path.display(), e))),
        }
    }

    fn write(&self, key: &DocKey, body: &str) -> Result<()> {
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body)
            .and_then(|_| std::fs::rename(&tmp, &path))
            .map_err(|e| Error::Storage(format!("无法写入 {}: {}", path.display(), e)))
    }

    fn remove(&self, key: &DocKey) -> Result<()> {
        let path = self.path(key);
        match std::fs::remove_file(&path) {
            Err(e) if e.kind() != ErrorKind::NotFound => {
                Err(Error::Storage(format!("无法删除 {}: {}", path.display(), e)))
            }
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    docs: DashMap<DocKey, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStore for MemoryStore {
    fn read(&self, key: &DocKey) -> Result<Option<String>> {
        Ok(self.docs.get(key).map(|doc| doc.value().clone()))
    }

    fn write(&self, key: &DocKey, body: &str) -> Result<()> {
        self.docs.insert(*key, body.to_string());
        Ok(())
    }

    fn remove(&self, key: &DocKey) -> Result<()> {
        self.docs.remove(key);
        Ok(())
    }
}

/// 本地文档的远端镜像，按用户隔离，只存取不透明字符串
pub trait RemoteStore: Send + Sync {
    fn read<'a>(&'a self, user: &'a str, key: DocKey) -> BoxFuture<'a, Result<Option<String>>>;
    fn write<'a>(&'a self, user: &'a str, key: DocKey, body: String) -> BoxFuture<'a, Result<()>>;
    fn remove<'a>(&'a self, user: &'a str, key: DocKey) -> BoxFuture<'a, Result<()>>;
}

/// 文档以 Redis 字符串存放在 `<prefix>:<user>:<doc>` 下
#[derive(Clone)]
pub struct RedisRemote {
    manager: Arc<Mutex<ConnectionManager>>,
    prefix: String,
}

impl RedisRemote {
    pub async fn new(redis_url: &str, prefix: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| Error::Remote(e.to_string()))?;
        let manager = ConnectionManager::new(client)
            .await
            .map_err(|e| Error::Remote(e.to_string()))?;
        Ok(RedisRemote {
            manager: Arc::new(Mutex::new(manager)),
            prefix: prefix.to_string(),
        })
    }

    fn redis_key(&self, user: &str, key: DocKey) -> String {
        format!("{}:{}:{}", self.prefix, user, key)
    }
}

impl RemoteStore for RedisRemote {
    fn read<'a>(&'a self, user: &'a str, key: DocKey) -> BoxFuture<'a, Result<Option<String>>> {
        async move {
            let redis_key = self.redis_key(user, key);
            let mut conn = self.manager.lock().await;
            let body: Option<String> = conn
                .get(&redis_key)
                .await
                .map_err(|e| Error::Remote(e.to_string()))?;
            Ok(body)
        }
        .boxed()
    }

    fn write<'a>(&'a self, user: &'a str, key: DocKey, body: String) -> BoxFuture<'a, Result<()>> {
        async move {
            let redis_key = self.redis_key(user, key);
            let mut conn = self.manager.lock().await;
            conn.set::<_, _, ()>(&redis_key, body)
                .await
                .map_err(|e| Error::Remote(e.to_string()))?;
            debug!(key = %redis_key, "远端文档已写入");
            Ok(())
        }
        .boxed()
    }

    fn remove<'a>(&'a self, user: &'a str, key: DocKey) -> BoxFuture<'a, Result<()>> {
        async move {
            let redis_key = self.redis_key(user, key);
            let mut conn = self.manager.lock().await;
            conn.del::<_, ()>(&redis_key)
                .await
                .map_err(|e| Error::Remote(e.to_string()))?;
            Ok(())
        }
        .boxed()
    }
}

/// 进程内远端，可切换离线以测试失败路径
#[derive(Debug, Default)]
pub struct MemoryRemote {
    docs: DashMap<(String, DocKey), String>,
    offline: AtomicBool,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn get(&self, user: &str, key: DocKey) -> Option<String> {
        self.docs
            .get(&(user.to_string(), key))
            .map(|doc| doc.value().clone())
    }

    pub fn insert(&self, user: &str, key: DocKey, body: impl Into<String>) {
        self.docs.insert((user.to_string(), key), body.into());
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Remote("远端存储离线".to_string()));
        }
        Ok(())
    }
}

impl RemoteStore for MemoryRemote {
    fn read<'a>(&'a self, user: &'a str, key: DocKey) -> BoxFuture<'a, Result<Option<String>>> {
        async move {
            self.check_online()?;
            Ok(self.get(user, key))
        }
        .boxed()
    }

    fn write<'a>(&'a self, user: &'a str, key: DocKey, body: String) -> BoxFuture<'a, Result<()>> {
        async move {
            self.check_online()?;
            self.insert(user, key, body);
            Ok(())
        }
        .boxed()
    }

    fn remove<'a>(&'a self, user: &'a str, key: DocKey) -> BoxFuture<'a, Result<()>> {
        async move {
            self.check_online()?;
            self.docs.remove(&(user.to_string(), key));
            Ok(())
        }
        .boxed()
    }
}
