//! 成就处理器
//!
//! 每个成就通过 `processor` 字段引用一个已注册的处理器，由处理器判断
//! 某个身份当前是否满足成就条件。
//!
//! - `contract`: 处理器 trait 与输入上下文
//! - `registry`: 按名称索引的处理器注册表

mod contract;
mod registry;

pub use contract::{AchievementProcessor, EventContext, FnProcessor, ProcessorInput};
pub use registry::ProcessorRegistry;
