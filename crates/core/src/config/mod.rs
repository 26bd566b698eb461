//! 配置管理
//!
//! 配置按以下顺序合并，后者覆盖前者：
//!
//! 1. 内置默认值（各配置段的 `Default` 实现）
//! 2. TOML 配置文件（`-c` 指定，或默认搜索路径）
//! 3. 环境变量（前缀 `FLEET_`，嵌套键用 `__` 分隔，如 `FLEET_REGISTRY__LIVENESS_TIMEOUT_SECONDS=120`）
//!
//! 所有配置段都提供 `validate()`，无效配置在启动阶段即被拒绝。
//!
//! ```toml
//! [scheduler]
//! max_attempts = 3
//! history_capacity = 1000
//! default_discover_priority = 1
//! detail_priority = 2
//! max_batch_size = 10
//! default_batch_size = 1
//!
//! [registry]
//! liveness_timeout_seconds = 300
//! sweep_interval_seconds = 60
//!
//! [api]
//! bind_address = "0.0.0.0:8080"
//! cors_enabled = true
//! request_timeout_seconds = 30
//!
//! [api.auth]
//! enabled = true
//! worker_api_keys = ["change-me"]
//! ```

pub mod models;

pub use models::*;
