//! # 数据模型
//!
//! 定义抓取Worker协调系统的核心数据结构：任务、Worker、发现的条目以及统计快照。
//!
//! ## 核心模型
//!
//! ### Task - 远程抓取任务
//! 分为发现任务（DISCOVER）和详情任务（DETAIL），记录分配、重试和耗时信息。
//!
//! ### Worker - 远程代理
//! 运行在终端用户浏览器中的扩展进程，只保存在内存中，依靠轮询刷新存活时间。
//!
//! ### DiscoveredItem - 发现的条目
//! 发现任务批量产出、详情任务补全的结构化记录，入库时按关键词归类。
//!
//! ## 状态流转
//!
//! ### 任务状态
//! ```text
//! PENDING → PROCESSING → COMPLETED
//!    ↑          ↓
//!    └──────────┤ (失败未达上限 / 失联回收)
//!               ↓
//!             FAILED
//! ```
//!
//! ### Worker状态
//! ```text
//! IDLE ⇄ PROCESSING
//! ```
//!
//! ## 序列化
//!
//! 所有模型实现 `serde::Serialize` 和 `serde::Deserialize`，枚举值使用大写字符串，
//! 时间字段统一使用 `DateTime<Utc>`。

pub mod item;
pub mod query;
pub mod stats;
pub mod task;
pub mod worker;

pub use item::*;
pub use query::*;
pub use stats::*;
pub use task::*;
pub use worker::*;
