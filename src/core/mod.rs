//! 核心编排层：错误类型、回合阶段、会话监管、回合控制器

pub mod error;
pub mod session_supervisor;
pub mod state;
pub mod turn;

pub use error::AgentError;
pub use session_supervisor::{SessionSupervisor, TurnGuard};
pub use state::TurnPhase;
pub use turn::{next_phase, TurnController, TurnOutcome, TurnRequest, DEFAULT_MAX_STEPS};
