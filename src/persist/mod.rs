//! 剪贴板内容持久化
//!
//! - `engine`：异步保存与单次完成票据
//! - `materialize`：各保存策略的同步实现（解码、编码、写盘）

pub mod engine;
pub mod materialize;

pub use engine::{PersistConfig, PersistenceEngine, SaveTicket, SavedFile};
