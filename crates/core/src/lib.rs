//! # Fleet Core
//!
//! 抓取Worker协调引擎的核心库：数据模型、统一错误类型、配置模型以及存储抽象。
//!
//! - [`models`] - 任务、Worker、条目与统计快照
//! - [`traits`] - `TaskQueue` / `ItemStore` 存储接口
//! - [`config`] - `AppConfig` 及各配置段
//! - [`errors`] - `SchedulerError`

pub mod config;
pub mod errors;
pub mod models;
pub mod traits;

pub use config::AppConfig;
pub use errors::*;
pub use models::{
    DiscoveredItem, ItemCategory, Task, TaskDescriptor, TaskKind, TaskStatus, Worker,
    WorkerStatus,
};
pub use traits::{ItemStore, TaskQueue};

/// 统一的Result类型
pub type SchedulerResult<T> = std::result::Result<T, SchedulerError>;
