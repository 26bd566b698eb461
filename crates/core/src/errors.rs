use thiserror::Error;

/// 调度器错误类型定义
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("任务未找到: {id}")]
    TaskNotFound { id: String },

    #[error("Worker未找到: {id}")]
    WorkerNotFound { id: String },

    #[error("无效的Worker标识: {0}")]
    InvalidWorkerId(String),

    #[error("条目未找到: {id}")]
    ItemNotFound { id: String },

    #[error("任务 {id} 状态无效: 期望 {expected}, 实际 {actual}")]
    InvalidTaskState {
        id: String,
        expected: String,
        actual: String,
    },

    #[error("任务 {id} 未分配给Worker {worker_id}")]
    TaskNotOwned { id: String, worker_id: String },

    #[error("无效的结果载荷: {0}")]
    InvalidResultPayload(String),

    #[error("无效的任务参数: {0}")]
    InvalidTaskParams(String),

    #[error("序列化错误: {0}")]
    Serialization(String),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for SchedulerError {
    fn from(err: serde_json::Error) -> Self {
        SchedulerError::Serialization(err.to_string())
    }
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, SchedulerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_task_state_display() {
        let err = SchedulerError::InvalidTaskState {
            id: "detail:indeed:42".to_string(),
            expected: "PROCESSING".to_string(),
            actual: "PENDING".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("detail:indeed:42"));
        assert!(msg.contains("PROCESSING"));
        assert!(msg.contains("PENDING"));
    }

    #[test]
    fn test_from_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("{not json").unwrap_err();
        let err: SchedulerError = json_err.into();
        assert!(matches!(err, SchedulerError::Serialization(_)));
    }
}
