//! 核心编排层：会话存储、状态机主控、响应生成、错误与超时守卫、关键词回退

pub mod error;
pub mod fallback;
pub mod gazetteer;
pub mod guard;
pub mod orchestrator;
pub mod response;
pub mod session;

pub use error::{GuideError, ServiceError};
pub use fallback::KeywordRouter;
pub use gazetteer::Gazetteer;
pub use guard::CallGuard;
pub use orchestrator::{Collaborators, Orchestrator, OrchestratorSettings};
pub use response::{DispatchResponse, ResponseComposer, ResponseKind};
pub use session::{LastResults, MemorySessionStore, Preferences, Session, SessionStore};
