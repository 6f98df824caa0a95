//! 驱动共享状态结构定义
//!
//! 车辆状态按字段组划分：每个字段组由一个 `ArcSwap` 槽位承载，
//! 发布方构造完整的新值后整体替换，读取方永远看不到撕裂的中间态。
//! 不同字段组之间没有全局事务性：速度与挡位可能来自相邻的两个
//! 总线周期，这对仪表盘与控制回路都是可接受的。

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

use arc_swap::ArcSwap;
use piracer_protocol::{DriveMode, GearPosition, VelocityReading};

use crate::monitor::ConnectionMonitor;

/// 速度等级下限
pub const SPEED_LEVEL_MIN: u8 = 1;
/// 速度等级上限
pub const SPEED_LEVEL_MAX: u8 = 4;

/// 挡位快照（字段组同步）
///
/// 挡位状态机每完成一次切换就发布一个新快照；`timestamp_us` 是
/// 触发该切换的事件时间戳（单调时钟）。上电初始值为 `Unknown`。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GearSnapshot {
    /// 当前绝对挡位
    pub position: GearPosition,

    /// 最近一次切换的时间戳（微秒，单调时钟；0 表示尚未发生切换）
    pub timestamp_us: u64,
}

impl GearSnapshot {
    /// 派生驾驶模式标签
    pub fn drive_mode(&self) -> DriveMode {
        self.position.drive_mode()
    }
}

/// 车辆状态快照（跨线程读取用）
///
/// 各字段组在读取瞬间分别加载，组内一致、组间不保证同周期。
#[derive(Debug, Clone, Copy)]
pub struct VehicleSnapshot {
    /// 最近一次速度观测
    pub velocity: VelocityReading,

    /// 当前挡位
    pub gear: GearSnapshot,

    /// 当前速度等级（1..=4）
    pub speed_level: u8,

    /// 链路是否活跃（最近 1s 内收到过有效帧）
    pub connected: bool,
}

/// PiRacer 上下文（所有共享状态的聚合）
///
/// IO 线程、估计线程与控制回路各持有一份克隆；字段级 `Arc` 共享，
/// 克隆本身只是引用计数操作。
#[derive(Debug, Clone)]
pub struct PiracerContext {
    /// 速度字段组（总线遥测或本地估计，整体替换）
    pub velocity: Arc<ArcSwap<VelocityReading>>,

    /// 挡位字段组（状态机发布，整体替换）
    pub gear: Arc<ArcSwap<GearSnapshot>>,

    /// 速度等级（1..=4，控制回路写，仪表盘读）
    pub speed_level: Arc<AtomicU8>,

    /// 链路健康监控
    pub connection: ConnectionMonitor,
}

impl PiracerContext {
    /// 创建新的上下文
    ///
    /// 初始状态：速度 0、挡位 `Unknown`、速度等级 1、链路未连接。
    ///
    /// # Example
    ///
    /// ```
    /// use piracer_driver::PiracerContext;
    /// use piracer_protocol::GearPosition;
    ///
    /// let ctx = PiracerContext::new();
    /// assert_eq!(ctx.gear.load().position, GearPosition::Unknown);
    /// assert!(ctx.velocity.load().is_standstill());
    /// ```
    pub fn new() -> Self {
        Self {
            velocity: Arc::new(ArcSwap::from_pointee(VelocityReading::default())),
            gear: Arc::new(ArcSwap::from_pointee(GearSnapshot::default())),
            speed_level: Arc::new(AtomicU8::new(SPEED_LEVEL_MIN)),
            connection: ConnectionMonitor::new(),
        }
    }

    /// 发布新的速度观测（整体替换）
    pub fn publish_velocity(&self, reading: VelocityReading) {
        self.velocity.store(Arc::new(reading));
    }

    /// 发布新的挡位快照（整体替换）
    pub fn publish_gear(&self, snapshot: GearSnapshot) {
        self.gear.store(Arc::new(snapshot));
    }

    /// 读取当前速度等级，越界值折算回有效区间
    pub fn speed_level(&self) -> u8 {
        self.speed_level
            .load(Ordering::Relaxed)
            .clamp(SPEED_LEVEL_MIN, SPEED_LEVEL_MAX)
    }

    /// 设置速度等级（写入前截断到 1..=4）
    pub fn set_speed_level(&self, level: u8) {
        self.speed_level.store(
            level.clamp(SPEED_LEVEL_MIN, SPEED_LEVEL_MAX),
            Ordering::Relaxed,
        );
    }

    /// 采集一份完整的车辆状态快照
    pub fn snapshot(&self) -> VehicleSnapshot {
        VehicleSnapshot {
            velocity: **self.velocity.load(),
            gear: **self.gear.load(),
            speed_level: self.speed_level(),
            connected: self
                .connection
                .is_connected(std::time::Duration::from_secs(1)),
        }
    }
}

impl Default for PiracerContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use piracer_protocol::GearPosition;

    #[test]
    fn test_context_initial_state() {
        let ctx = PiracerContext::new();
        assert!(ctx.velocity.load().is_standstill());
        assert_eq!(ctx.gear.load().position, GearPosition::Unknown);
        assert_eq!(ctx.speed_level(), SPEED_LEVEL_MIN);

        let snapshot = ctx.snapshot();
        assert!(!snapshot.connected);
        assert_eq!(snapshot.gear.drive_mode(), DriveMode::Unknown);
    }

    #[test]
    fn test_publish_velocity_replaces_whole_reading() {
        let ctx = PiracerContext::new();
        ctx.publish_velocity(VelocityReading::from_kmh(12.5, 1_000));

        let reading = ctx.velocity.load();
        assert_eq!(reading.kmh_centi, 1250);
        assert_eq!(reading.timestamp_us, 1_000);
    }

    #[test]
    fn test_publish_gear() {
        let ctx = PiracerContext::new();
        ctx.publish_gear(GearSnapshot {
            position: GearPosition::Manual(3),
            timestamp_us: 5_000,
        });

        let gear = ctx.gear.load();
        assert_eq!(gear.position, GearPosition::Manual(3));
        assert_eq!(gear.drive_mode(), DriveMode::Manual);
        assert_eq!(gear.timestamp_us, 5_000);
    }

    #[test]
    fn test_speed_level_clamped() {
        let ctx = PiracerContext::new();
        ctx.set_speed_level(0);
        assert_eq!(ctx.speed_level(), SPEED_LEVEL_MIN);
        ctx.set_speed_level(9);
        assert_eq!(ctx.speed_level(), SPEED_LEVEL_MAX);
        ctx.set_speed_level(3);
        assert_eq!(ctx.speed_level(), 3);
    }

    #[test]
    fn test_clone_shares_slots() {
        let ctx = PiracerContext::new();
        let clone = ctx.clone();

        ctx.publish_velocity(VelocityReading::from_kmh(7.0, 99));
        ctx.set_speed_level(2);

        assert_eq!(clone.velocity.load().kmh_centi, 700);
        assert_eq!(clone.speed_level(), 2);
    }

    #[test]
    fn test_snapshot_reflects_connection() {
        let ctx = PiracerContext::new();
        assert!(!ctx.snapshot().connected);
        ctx.connection.register_feedback();
        assert!(ctx.snapshot().connected);
    }
}
