//! PiRacer 驱动性能指标模块
//!
//! 提供零开销的原子计数器，用于监控 IO 链路、档位状态机和速度估计的健康状态。
//! 所有计数器都使用原子操作，可以在任何线程安全地读取，不会引入锁竞争。

use std::sync::atomic::{AtomicU64, Ordering};

/// PiRacer 驱动实时指标
///
/// 用于监控 IO 链路的健康状态和性能。所有计数器都使用原子操作，
/// 可以在任何线程安全地读取，不会引入锁竞争。
///
/// # 使用示例
///
/// ```rust
/// use piracer_driver::PiracerMetrics;
/// use std::sync::Arc;
/// use std::sync::atomic::Ordering;
///
/// let metrics = Arc::new(PiracerMetrics::default());
///
/// // 在 IO 线程中更新指标
/// metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);
///
/// // 在主线程中读取快照
/// let snapshot = metrics.snapshot();
/// println!("Total RX frames: {}", snapshot.rx_frames_total);
/// ```
#[derive(Debug, Default)]
pub struct PiracerMetrics {
    /// RX 接收的总帧数（包括被忽略的回显帧与未知 ID）
    pub rx_frames_total: AtomicU64,

    /// RX 有效帧数（成功解码并分发的帧）
    pub rx_frames_valid: AtomicU64,

    /// RX 忽略的自发回显帧数（LED 指令 ID 出现在接收方向）
    pub rx_echo_filtered: AtomicU64,

    /// RX 未知 ID 帧数
    pub rx_unknown_ids: AtomicU64,

    /// RX 超时次数（正常现象，总线空闲时会超时）
    pub rx_timeouts: AtomicU64,

    /// 校验和错误次数
    ///
    /// 如果这个值快速增长，说明总线上存在干扰或对端校验算法不一致。
    pub checksum_errors: AtomicU64,

    /// 长度或布局错误的帧数
    pub malformed_frames: AtomicU64,

    /// 按滚动计数器判定的重复事件数（已静默丢弃）
    pub duplicate_events: AtomicU64,

    /// 档位状态机实际发生的切换次数
    pub gear_transitions: AtomicU64,

    /// TX 发送的总帧数
    pub tx_frames_total: AtomicU64,

    /// 已发送的 LED 指示帧数（切换触发 + 周期刷新）
    pub led_frames_sent: AtomicU64,

    /// 速度读数发布次数（总线来源 + 本地估计）
    pub velocity_updates: AtomicU64,

    /// 接受的霍尔脉冲沿总数
    pub edge_events_total: AtomicU64,

    /// 被去抖窗口丢弃的脉冲沿数
    pub edges_debounced: AtomicU64,

    /// CAN 设备错误次数（致命错误会同时终止 IO 线程）
    pub device_errors: AtomicU64,
}

impl PiracerMetrics {
    /// 创建新的指标实例（所有计数器初始化为 0）
    pub fn new() -> Self {
        Self::default()
    }

    /// 获取人类可读的指标快照
    ///
    /// 使用 `Ordering::Relaxed`，性能最优，适合监控场景。
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            rx_frames_total: self.rx_frames_total.load(Ordering::Relaxed),
            rx_frames_valid: self.rx_frames_valid.load(Ordering::Relaxed),
            rx_echo_filtered: self.rx_echo_filtered.load(Ordering::Relaxed),
            rx_unknown_ids: self.rx_unknown_ids.load(Ordering::Relaxed),
            rx_timeouts: self.rx_timeouts.load(Ordering::Relaxed),
            checksum_errors: self.checksum_errors.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            duplicate_events: self.duplicate_events.load(Ordering::Relaxed),
            gear_transitions: self.gear_transitions.load(Ordering::Relaxed),
            tx_frames_total: self.tx_frames_total.load(Ordering::Relaxed),
            led_frames_sent: self.led_frames_sent.load(Ordering::Relaxed),
            velocity_updates: self.velocity_updates.load(Ordering::Relaxed),
            edge_events_total: self.edge_events_total.load(Ordering::Relaxed),
            edges_debounced: self.edges_debounced.load(Ordering::Relaxed),
            device_errors: self.device_errors.load(Ordering::Relaxed),
        }
    }

    /// 将所有计数器重置为 0。使用 `Ordering::Relaxed`，性能最优。
    pub fn reset(&self) {
        self.rx_frames_total.store(0, Ordering::Relaxed);
        self.rx_frames_valid.store(0, Ordering::Relaxed);
        self.rx_echo_filtered.store(0, Ordering::Relaxed);
        self.rx_unknown_ids.store(0, Ordering::Relaxed);
        self.rx_timeouts.store(0, Ordering::Relaxed);
        self.checksum_errors.store(0, Ordering::Relaxed);
        self.malformed_frames.store(0, Ordering::Relaxed);
        self.duplicate_events.store(0, Ordering::Relaxed);
        self.gear_transitions.store(0, Ordering::Relaxed);
        self.tx_frames_total.store(0, Ordering::Relaxed);
        self.led_frames_sent.store(0, Ordering::Relaxed);
        self.velocity_updates.store(0, Ordering::Relaxed);
        self.edge_events_total.store(0, Ordering::Relaxed);
        self.edges_debounced.store(0, Ordering::Relaxed);
        self.device_errors.store(0, Ordering::Relaxed);
    }
}

/// 指标快照（不可变，用于读取）
///
/// 包含所有计数器的当前值，用于一次性读取所有指标，避免多次原子操作。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// RX 接收的总帧数
    pub rx_frames_total: u64,
    /// RX 有效帧数
    pub rx_frames_valid: u64,
    /// RX 忽略的回显帧数
    pub rx_echo_filtered: u64,
    /// RX 未知 ID 帧数
    pub rx_unknown_ids: u64,
    /// RX 超时次数
    pub rx_timeouts: u64,
    /// 校验和错误次数
    pub checksum_errors: u64,
    /// 长度或布局错误的帧数
    pub malformed_frames: u64,
    /// 重复事件数
    pub duplicate_events: u64,
    /// 档位切换次数
    pub gear_transitions: u64,
    /// TX 发送的总帧数
    pub tx_frames_total: u64,
    /// 已发送的 LED 指示帧数
    pub led_frames_sent: u64,
    /// 速度读数发布次数
    pub velocity_updates: u64,
    /// 接受的脉冲沿总数
    pub edge_events_total: u64,
    /// 被去抖丢弃的脉冲沿数
    pub edges_debounced: u64,
    /// 设备错误次数
    pub device_errors: u64,
}

impl MetricsSnapshot {
    /// 计算有效帧率（百分比）
    ///
    /// 返回 0.0 到 100.0 之间的值。如果 `rx_frames_total` 为 0，返回 0.0。
    pub fn valid_frame_rate(&self) -> f64 {
        if self.rx_frames_total == 0 {
            return 0.0;
        }
        (self.rx_frames_valid as f64 / self.rx_frames_total as f64) * 100.0
    }

    /// 计算校验和错误率（百分比）
    ///
    /// 返回 0.0 到 100.0 之间的值。如果 `rx_frames_total` 为 0，返回 0.0。
    pub fn checksum_error_rate(&self) -> f64 {
        if self.rx_frames_total == 0 {
            return 0.0;
        }
        (self.checksum_errors as f64 / self.rx_frames_total as f64) * 100.0
    }

    /// 计算脉冲去抖率（百分比）
    ///
    /// 返回 0.0 到 100.0 之间的值。如果没有任何脉冲沿，返回 0.0。
    pub fn debounce_rate(&self) -> f64 {
        let raw_edges = self.edge_events_total + self.edges_debounced;
        if raw_edges == 0 {
            return 0.0;
        }
        (self.edges_debounced as f64 / raw_edges as f64) * 100.0
    }
}
