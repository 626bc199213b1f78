//! Copyright (c) 2025, Kirky.X
//!
//! MIT License
//!
//! 该模块定义了缓存的同步机制：待写日志与周期性事务刷新。

pub mod pending;
pub mod synchronizer;

pub use pending::PendingLog;
pub use synchronizer::{FlushOutcome, Synchronizer};
