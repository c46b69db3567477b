//! 记忆层：对话历史、会话状态、检查点持久化

pub mod checkpoint;
pub mod conversation;
pub mod state;

pub use checkpoint::{
    create_checkpoint_store, Checkpoint, CheckpointStore, FileCheckpointStore,
    InMemoryCheckpointStore,
};
pub use conversation::{ConversationMemory, Message, Role, ToolCall};
pub use state::{ConversationState, DEFAULT_LANGUAGE};
