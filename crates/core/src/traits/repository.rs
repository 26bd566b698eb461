//! 存储层接口定义
//!
//! 此模块定义了协调引擎中各个存储的抽象接口：
//! - 任务队列接口 (TaskQueue)
//! - 条目库接口 (ItemStore)
//!
//! ## 设计原则
//!
//! ### 单一所有者
//! 每个存储只能通过自身的方法修改，其他组件不直接访问其内部状态。
//! 当前实现保存在进程内存中，同一接口将来可以由持久化存储实现，调用方无需改动。
//!
//! ### 原子分配
//! `TaskQueue::assign` 在一次加锁内完成"挑选 + 标记处理中"，
//! 同一任务不会同时分配给两个Worker。
//!
//! ### 异步设计
//! 所有操作都是异步的，返回 `SchedulerResult<T>` 统一错误处理，
//! 并实现 `Send + Sync` 以便以 `Arc<dyn Trait>` 共享。

use async_trait::async_trait;

use crate::models::{
    DiscoveredItem, ItemCategory, ItemStoreStats, Task, TaskHistoryQuery, TaskPage,
    TaskQueueStats,
};
use crate::SchedulerResult;

/// 任务队列：持有全部非终止任务，向轮询的Worker分配有界批次
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// 新建一个待处理的发现任务
    async fn enqueue_discover(
        &self,
        source: &str,
        params: serde_json::Value,
        priority: i32,
    ) -> SchedulerResult<Task>;

    /// 新建详情任务；相同ID的非终止任务已存在时返回 `None`
    async fn enqueue_detail(
        &self,
        source: &str,
        item_id: &str,
        locator: &str,
        priority: i32,
    ) -> SchedulerResult<Option<Task>>;

    /// 按 (priority desc, created_at asc) 选出最多 `max_batch` 个待处理任务并分配给Worker
    async fn assign(&self, worker_id: &str, max_batch: usize) -> SchedulerResult<Vec<Task>>;

    /// 标记任务完成并移入历史
    ///
    /// 任务必须处于处理中且分配给 `worker_id`，否则返回 `TaskNotOwned`。
    async fn complete(&self, task_id: &str, worker_id: &str) -> SchedulerResult<Task>;

    /// 记录一次失败；未达上限时回到待处理，否则标记失败并移入历史
    ///
    /// 与 `complete` 相同，只接受当前持有该任务的Worker。
    async fn fail(&self, task_id: &str, worker_id: &str, error: &str) -> SchedulerResult<Task>;

    /// 无条件把处理中的任务放回待处理，不增加尝试次数
    async fn reclaim(&self, task_id: &str) -> SchedulerResult<Task>;

    /// 查询活跃任务
    async fn get(&self, task_id: &str) -> SchedulerResult<Option<Task>>;

    /// 当前分配给指定Worker的任务
    async fn assigned_to(&self, worker_id: &str) -> SchedulerResult<Vec<Task>>;

    /// 所有活跃任务（待处理 + 处理中），按分配顺序排列
    async fn active_tasks(&self) -> SchedulerResult<Vec<Task>>;

    /// 历史任务分页查询，最新的在前
    async fn query_history(&self, query: &TaskHistoryQuery) -> SchedulerResult<TaskPage>;

    /// 按状态、来源、种类统计
    async fn stats(&self) -> SchedulerResult<TaskQueueStats>;
}

/// 条目库：发现条目的规范存储，带分类与检索
#[async_trait]
pub trait ItemStore: Send + Sync {
    /// 按ID插入或替换，并重新计算分类
    async fn upsert(&self, item: DiscoveredItem) -> SchedulerResult<DiscoveredItem>;

    /// 用详情结果合并已有条目；条目不存在时直接插入
    async fn merge(&self, item: DiscoveredItem) -> SchedulerResult<DiscoveredItem>;

    async fn get(&self, id: &str) -> SchedulerResult<Option<DiscoveredItem>>;

    async fn all(&self) -> SchedulerResult<Vec<DiscoveredItem>>;

    async fn by_category(&self, category: ItemCategory) -> SchedulerResult<Vec<DiscoveredItem>>;

    async fn search(&self, query: &str) -> SchedulerResult<Vec<DiscoveredItem>>;

    async fn stats(&self) -> SchedulerResult<ItemStoreStats>;

    /// 清空条目库，返回删除的数量
    async fn clear(&self) -> SchedulerResult<usize>;
}
