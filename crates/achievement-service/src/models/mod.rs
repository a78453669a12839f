//! 领域模型定义
//!
//! - `achievement`: 成就定义及其输入形态
//! - `earned`: 已获得成就记录与身份

mod achievement;
mod earned;

pub use achievement::*;
pub use earned::*;
