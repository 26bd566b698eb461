use serde::{Deserialize, Serialize};

/// 任务调度配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// 任务最大尝试次数
    pub max_attempts: u32,
    /// 终止任务历史容量，超出后淘汰最旧记录
    pub history_capacity: usize,
    pub default_discover_priority: i32,
    /// 派生详情任务的最低优先级
    pub detail_priority: i32,
    /// 单次轮询可分配的最大任务数
    pub max_batch_size: usize,
    /// 轮询未指定批次大小时使用的默认值
    pub default_batch_size: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            history_capacity: 1000,
            default_discover_priority: 1,
            detail_priority: 2,
            max_batch_size: 10,
            default_batch_size: 1,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_attempts == 0 {
            return Err(anyhow::anyhow!("最大尝试次数必须大于0"));
        }

        if self.history_capacity == 0 {
            return Err(anyhow::anyhow!("历史容量必须大于0"));
        }

        if self.detail_priority <= self.default_discover_priority {
            return Err(anyhow::anyhow!(
                "详情任务优先级({})必须高于发现任务默认优先级({})",
                self.detail_priority,
                self.default_discover_priority
            ));
        }

        if self.max_batch_size == 0 || self.default_batch_size == 0 {
            return Err(anyhow::anyhow!("批次大小必须大于0"));
        }

        if self.default_batch_size > self.max_batch_size {
            return Err(anyhow::anyhow!("默认批次大小不能超过最大批次大小"));
        }

        Ok(())
    }

    /// 把请求的批次大小限制在允许范围内
    pub fn clamp_batch(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_batch_size)
            .clamp(1, self.max_batch_size)
    }
}

/// Worker注册表配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// 存活超时时间（秒）
    pub liveness_timeout_seconds: i64,
    /// 存活扫描间隔（秒）
    pub sweep_interval_seconds: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            liveness_timeout_seconds: 300, // 5分钟
            sweep_interval_seconds: 60,
        }
    }
}

impl RegistryConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.liveness_timeout_seconds <= 0 {
            return Err(anyhow::anyhow!("存活超时时间必须大于0"));
        }

        if self.sweep_interval_seconds == 0 {
            return Err(anyhow::anyhow!("扫描间隔必须大于0"));
        }

        Ok(())
    }
}

/// 滚动统计配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// 最近任务耗时环形缓冲区大小
    pub duration_buffer_size: usize,
    /// 小时桶轮转间隔（秒）
    pub rotation_interval_seconds: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            duration_buffer_size: 100,
            rotation_interval_seconds: 3600,
        }
    }
}

impl StatsConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.duration_buffer_size == 0 {
            return Err(anyhow::anyhow!("耗时缓冲区大小必须大于0"));
        }

        if self.rotation_interval_seconds == 0 {
            return Err(anyhow::anyhow!("统计轮转间隔必须大于0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SchedulerConfig::default().validate().is_ok());
        assert!(RegistryConfig::default().validate().is_ok());
        assert!(StatsConfig::default().validate().is_ok());
    }

    #[test]
    fn test_detail_priority_must_exceed_discover() {
        let config = SchedulerConfig {
            detail_priority: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_clamp_batch() {
        let config = SchedulerConfig::default();
        assert_eq!(config.clamp_batch(None), 1);
        assert_eq!(config.clamp_batch(Some(0)), 1);
        assert_eq!(config.clamp_batch(Some(5)), 5);
        assert_eq!(config.clamp_batch(Some(500)), 10);
    }

    #[test]
    fn test_registry_validation() {
        let config = RegistryConfig {
            liveness_timeout_seconds: 0,
            sweep_interval_seconds: 60,
        };
        assert!(config.validate().is_err());
    }
}
