//! # Fleet Dispatcher
//!
//! 协调引擎的核心组件，依赖顺序（叶子在前）：
//!
//! - [`item_store`] - 内存条目库与关键词分类
//! - [`task_queue`] - 内存任务队列，负责分配、重试与历史
//! - [`result_collector`] - 结果解释、派生任务与滚动统计
//! - [`worker_registry`] - Worker存活跟踪与在途任务回收
//! - [`query_service`] - 面向看板的只读门面
//!
//! 后台只有两个周期任务：[`worker_failure_detector`] 存活清扫和 [`stats_rotator`] 小时桶轮转，
//! 两者各自持有取消句柄。[`engine::FleetEngine`] 负责按依赖顺序装配上述组件。

pub mod engine;
pub mod item_store;
pub mod metrics_collector;
pub mod query_service;
pub mod result_collector;
pub mod scheduled_job;
pub mod statistics;
pub mod stats_rotator;
pub mod task_queue;
pub mod worker_failure_detector;
pub mod worker_registry;

pub use engine::FleetEngine;
pub use item_store::{categorize, InMemoryItemStore};
pub use metrics_collector::MetricsCollector;
pub use query_service::{FleetOverview, FleetQueryService, ItemFilter, WorkerSummary, WorkerView};
pub use result_collector::{CollectOutcome, ResultCollector};
pub use scheduled_job::{spawn_periodic, spawn_periodic_after, JobHandle};
pub use statistics::{RollingStats, WINDOW_HOURS};
pub use stats_rotator::StatsRotator;
pub use task_queue::InMemoryTaskQueue;
pub use worker_failure_detector::WorkerFailureDetector;
pub use worker_registry::{SweepReport, WorkerRegistry};
