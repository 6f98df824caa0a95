//! 驱动层模块
//!
//! 本模块提供 PiRacer 底盘的设备驱动功能，包括：
//! - IO 线程管理（CAN 收发、挡位状态机、LED 回执）
//! - 轮速估计线程（霍尔边沿去抖与周期重算）
//! - 状态同步（ArcSwap 无锁读取）
//! - 连接监控与性能指标
//!
//! # 使用场景
//!
//! 适用于需要直接对接 CAN 总线与事件源的场景。上层控制回路见
//! `piracer-control`，统一入口见 `piracer-sdk`。

pub mod dashboard;
mod error;
pub mod gear;
pub mod metrics;
pub mod monitor;
pub mod pipeline;
pub mod speed;
pub mod state;
mod vehicle;

pub use dashboard::{DashboardConfig, DashboardSink, dashboard_loop};
pub use error::DriverError;
pub use gear::{GearLadder, GearOutcome, GearRequest};
pub use metrics::{MetricsSnapshot, PiracerMetrics};
pub use monitor::{ConnectionMonitor, monotonic_micros};
pub use pipeline::{PipelineConfig, io_loop};
pub use speed::{EdgeEvent, EstimatorConfig, PulseEstimator, estimator_loop};
pub use state::*;
pub use vehicle::{EdgeSender, GearRequester, Piracer, PiracerConfig};
