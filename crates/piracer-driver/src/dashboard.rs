//! 仪表盘刷新回路
//!
//! 以固定节拍从共享状态采样 `VehicleSnapshot` 并交给渲染后端。
//! 渲染本身由调用方实现（CLI 提供终端打印后端），本模块只负责
//! 节拍与快照采集，因此渲染耗时不会阻塞行车数据路径。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::warn;

use crate::error::DriverError;
use crate::state::{PiracerContext, VehicleSnapshot};

/// 默认刷新周期（20 Hz）
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_millis(50);

/// 仪表盘配置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardConfig {
    /// 刷新周期
    pub refresh_interval: Duration,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
        }
    }
}

/// 仪表盘渲染后端
///
/// # Example
///
/// ```
/// use piracer_driver::{DashboardSink, DriverError, VehicleSnapshot};
///
/// struct StdoutSink;
///
/// impl DashboardSink for StdoutSink {
///     fn render(&mut self, snapshot: &VehicleSnapshot) -> Result<(), DriverError> {
///         println!("{:.2} km/h [{}]", snapshot.velocity.kmh(), snapshot.gear.position);
///         Ok(())
///     }
/// }
/// ```
pub trait DashboardSink {
    /// 渲染一帧快照
    fn render(&mut self, snapshot: &VehicleSnapshot) -> Result<(), DriverError>;
}

/// 仪表盘刷新回路（运行直到 `is_running` 置 false）
///
/// 节拍采用绝对锚点：每轮把锚点推进一个周期，渲染结束后用
/// `spin_sleep` 睡到锚点，自动扣除渲染耗时；渲染超过一个周期时
/// 重置锚点，不追帧。
///
/// 渲染失败只告警不终止：仪表盘是观测面，不应反噬行车功能。
pub fn dashboard_loop(
    mut sink: impl DashboardSink,
    ctx: PiracerContext,
    config: DashboardConfig,
    is_running: Arc<AtomicBool>,
) {
    let period = config.refresh_interval;
    let mut next_tick = Instant::now() + period;

    // Acquire: 观察到 false 时能看到关停方此前的全部写入
    while is_running.load(Ordering::Acquire) {
        let snapshot = ctx.snapshot();
        if let Err(e) = sink.render(&snapshot) {
            warn!("Dashboard render failed: {}", e);
        }

        let now = Instant::now();
        if next_tick > now {
            spin_sleep::sleep(next_tick - now);
        } else {
            next_tick = now;
        }
        next_tick += period;
    }
}
