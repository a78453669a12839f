//! 派生视图缓存
//!
//! 整个进程共享一个缓存区域。任何成就定义或已获得记录的变更都会
//! 同步清空整个区域，读取方在下次访问时重新计算。

mod invalidation;
mod region;

pub use invalidation::{InvalidationCoordinator, InvalidationReason};
pub use region::{CacheRegion, MemoryCacheRegion, RedisCacheRegion};
