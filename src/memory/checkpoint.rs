//! 会话检查点存储
//!
//! 每个会话 ID 对应一份 ConversationState 快照。回合结束时整体写入，回合开始时读取；
//! 回合中途失败或被取消时不写入，保证快照总是回合边界上的一致状态。

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::core::AgentError;
use crate::memory::ConversationState;

/// 某个会话在回合边界上的快照
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub session_id: String,
    /// 已完成的回合数
    pub turn: u64,
    pub saved_at: DateTime<Utc>,
    pub state: ConversationState,
}

impl Checkpoint {
    pub fn new(session_id: impl Into<String>, turn: u64, state: ConversationState) -> Self {
        Self {
            session_id: session_id.into(),
            turn,
            saved_at: Utc::now(),
            state,
        }
    }
}

/// 检查点存储接口
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// 读取会话快照；不存在时返回 None
    async fn load(&self, session_id: &str) -> Result<Option<Checkpoint>, AgentError>;

    /// 写入（覆盖）会话快照
    async fn save(&self, checkpoint: Checkpoint) -> Result<(), AgentError>;

    /// 删除会话快照，返回是否存在过
    async fn delete(&self, session_id: &str) -> Result<bool, AgentError>;

    async fn list_sessions(&self) -> Result<Vec<String>, AgentError>;
}

/// 进程内存储（进程退出即丢失）
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    inner: RwLock<HashMap<String, Checkpoint>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, session_id: &str) -> Result<Option<Checkpoint>, AgentError> {
        Ok(self.inner.read().await.get(session_id).cloned())
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), AgentError> {
        self.inner
            .write()
            .await
            .insert(checkpoint.session_id.clone(), checkpoint);
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, AgentError> {
        Ok(self.inner.write().await.remove(session_id).is_some())
    }

    async fn list_sessions(&self) -> Result<Vec<String>, AgentError> {
        let mut ids: Vec<String> = self.inner.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// 文件存储：目录下每个会话一个 JSON 文件，先写临时文件再 rename
#[derive(Debug)]
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(session_id)))
    }
}

/// 会话 ID 可能来自外部输入：字母数字与 '-' 原样保留，其余字节编码为 `_XX`（含 '_' 本身），
/// 保证不同 ID 不会映射到同一文件
fn file_stem(session_id: &str) -> String {
    let mut stem = String::with_capacity(session_id.len());
    for byte in session_id.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(byte as char);
        } else {
            stem.push_str(&format!("_{byte:02x}"));
        }
    }
    stem
}

fn io_err(action: &str, path: &Path, e: impl std::fmt::Display) -> AgentError {
    AgentError::Checkpoint(format!("{} {}: {}", action, path.display(), e))
}

#[async_trait]
impl CheckpointStore for FileCheckpointStore {
    async fn load(&self, session_id: &str) -> Result<Option<Checkpoint>, AgentError> {
        let path = self.path_for(session_id);
        let data = match tokio::fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(io_err("read", &path, e)),
        };
        let checkpoint: Checkpoint =
            serde_json::from_str(&data).map_err(|e| io_err("decode", &path, e))?;
        // 以文件内容为准再校验一次
        if checkpoint.session_id != session_id {
            return Ok(None);
        }
        Ok(Some(checkpoint))
    }

    async fn save(&self, checkpoint: Checkpoint) -> Result<(), AgentError> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| io_err("create", &self.dir, e))?;
        let path = self.path_for(&checkpoint.session_id);
        let tmp = path.with_extension("json.tmp");
        let data = serde_json::to_string_pretty(&checkpoint)
            .map_err(|e| io_err("encode", &path, e))?;
        tokio::fs::write(&tmp, data)
            .await
            .map_err(|e| io_err("write", &tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| io_err("rename", &path, e))?;
        tracing::debug!(session_id = %checkpoint.session_id, turn = checkpoint.turn, "checkpoint saved");
        Ok(())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, AgentError> {
        let path = self.path_for(session_id);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err("remove", &path, e)),
        }
    }

    async fn list_sessions(&self) -> Result<Vec<String>, AgentError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io_err("list", &self.dir, e)),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| io_err("list", &self.dir, e))?
        {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Ok(data) = tokio::fs::read_to_string(&path).await else {
                continue;
            };
            match serde_json::from_str::<Checkpoint>(&data) {
                Ok(cp) => ids.push(cp.session_id),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable checkpoint"),
            }
        }
        ids.sort();
        Ok(ids)
    }
}

/// 按配置创建存储：给出目录时落盘，否则使用内存存储
pub fn create_checkpoint_store(dir: Option<&Path>) -> Arc<dyn CheckpointStore> {
    match dir {
        Some(dir) => {
            tracing::info!(dir = %dir.display(), "using file checkpoint store");
            Arc::new(FileCheckpointStore::new(dir))
        }
        None => {
            tracing::info!("using in-memory checkpoint store");
            Arc::new(InMemoryCheckpointStore::new())
        }
    }
}
