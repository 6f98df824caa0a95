//! 脉冲-速度估计器
//!
//! 轮毂霍尔传感器的边沿事件经由通道送入估计线程，两个触发源协作：
//!
//! - 边沿事件：去抖后累加脉冲计数；
//! - 周期重算（默认 1s）：把窗口内的计数换算为 RPM 与 km/h，清零
//!   计数并发布新的 [`VelocityReading`]。
//!
//! 互斥只覆盖脉冲计数窗口本身，换算与发布都在锁外进行。边沿接受
//! 与清零不能交错，否则重算瞬间到达的脉冲会丢失或被计入两个窗口。
//!
//! 速度槽的另一个写入方是总线遥测帧（0x100）。同一实例通常只有
//! 其中一个来源真实存在，所以估计器在接受第一个边沿之前保持静默。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use piracer_protocol::VelocityReading;
use tracing::{debug, info};

use crate::metrics::PiracerMetrics;
use crate::monitor::monotonic_micros;
use crate::state::PiracerContext;

/// 默认去抖窗口：700 微秒内的二次边沿按电气抖动丢弃
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_micros(700);

/// 默认重算周期
pub const DEFAULT_RECOMPUTE_INTERVAL: Duration = Duration::from_secs(1);

/// 默认每转脉冲数（轮毂磁极数）
pub const DEFAULT_PULSES_PER_REVOLUTION: u32 = 40;

/// 默认轮径（毫米）
pub const DEFAULT_WHEEL_DIAMETER_MM: f64 = 64.0;

/// 估计线程单次等待上限，保证关停信号及时生效
const MAX_WAIT_SLICE: Duration = Duration::from_millis(50);

/// 一次霍尔边沿事件
///
/// 时间戳来自单调时钟，在事件源处打点（而非入队或出队时刻），
/// 去抖窗口据此计算事件间隔。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEvent {
    /// 边沿时间戳（微秒，单调时钟）
    pub timestamp_us: u64,
}

impl EdgeEvent {
    /// 以当前单调时钟打点构造事件
    pub fn now() -> Self {
        Self {
            timestamp_us: monotonic_micros(),
        }
    }
}

/// 估计器配置
#[derive(Debug, Clone, Copy)]
pub struct EstimatorConfig {
    /// 每转脉冲数
    pub pulses_per_revolution: u32,

    /// 轮径（毫米）
    pub wheel_diameter_mm: f64,

    /// 去抖窗口：与上一个被接受边沿的间隔小于该值的边沿被丢弃
    pub debounce: Duration,

    /// 重算周期
    pub recompute_interval: Duration,
}

impl EstimatorConfig {
    /// 轮周长（米）
    pub fn wheel_circumference_m(&self) -> f64 {
        self.wheel_diameter_mm * 1e-3 * std::f64::consts::PI
    }
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            pulses_per_revolution: DEFAULT_PULSES_PER_REVOLUTION,
            wheel_diameter_mm: DEFAULT_WHEEL_DIAMETER_MM,
            debounce: DEFAULT_DEBOUNCE,
            recompute_interval: DEFAULT_RECOMPUTE_INTERVAL,
        }
    }
}

/// 脉冲计数窗口（互斥临界区）
#[derive(Debug, Default)]
struct PulseWindow {
    /// 当前窗口内接受的脉冲数
    count: u32,

    /// 最近一次被接受边沿的时间戳（跨窗口保留，去抖不随清零复位）
    last_accepted_us: Option<u64>,
}

/// 脉冲-速度估计器
///
/// 边沿接受（[`on_edge`](Self::on_edge)）与重算清零
/// （[`recompute`](Self::recompute)）可以来自不同线程，二者只在
/// 计数窗口上互斥。
#[derive(Debug)]
pub struct PulseEstimator {
    config: EstimatorConfig,
    window: Mutex<PulseWindow>,
}

impl PulseEstimator {
    /// 创建估计器
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config,
            window: Mutex::new(PulseWindow::default()),
        }
    }

    /// 配置
    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// 当前窗口内已接受的脉冲数（诊断用）
    pub fn pending_edges(&self) -> u32 {
        self.window.lock().count
    }

    /// 处理一次边沿事件，返回是否被接受
    ///
    /// 与上一个被接受边沿间隔不足去抖窗口（或时间戳回退）的边沿
    /// 被丢弃。首个边沿总是被接受。
    pub fn on_edge(&self, event: EdgeEvent) -> bool {
        let debounce_us = self.config.debounce.as_micros() as u64;
        let mut window = self.window.lock();
        if let Some(last) = window.last_accepted_us {
            if event.timestamp_us.saturating_sub(last) < debounce_us {
                return false;
            }
        }
        window.count += 1;
        window.last_accepted_us = Some(event.timestamp_us);
        true
    }

    /// 重算并清零当前窗口，返回新的速度观测
    ///
    /// 速度只在这里被换算：`rpm = count / ppr × (60 / 窗口秒数)`，
    /// `kmh = rpm × 轮周长(m) × 60 / 1000`。默认 1s 窗口下即
    /// `rpm = 60 × count / ppr`。窗口内没有任何脉冲时严格输出 0，
    /// 而不是保留上一次的非零读数。
    ///
    /// 从未接受过任何边沿的估计器返回 `None`：速度槽与总线遥测
    /// 共用，没接霍尔传感器的实例不得用常零覆盖遥测值。
    pub fn recompute(&self, now_us: u64) -> Option<VelocityReading> {
        let count = {
            let mut window = self.window.lock();
            if window.last_accepted_us.is_none() {
                return None;
            }
            std::mem::take(&mut window.count)
        };

        if count == 0 {
            return Some(VelocityReading {
                kmh_centi: 0,
                timestamp_us: now_us,
            });
        }

        let window_secs = self.config.recompute_interval.as_secs_f64();
        let rpm = count as f64 / self.config.pulses_per_revolution as f64 * 60.0 / window_secs;
        let kmh = rpm * self.config.wheel_circumference_m() * 60.0 / 1000.0;
        Some(VelocityReading::from_kmh(kmh, now_us))
    }
}

/// 速度估计线程主循环
///
/// 在边沿通道上以截止时间等待，到达重算时刻就换算并发布一次速度。
/// 等待被切成不超过 50ms 的分片，`is_running` 清零后最迟一个分片
/// 内退出；边沿通道断开（所有发送端被丢弃）同样触发退出。
pub fn estimator_loop(
    estimator: Arc<PulseEstimator>,
    edge_rx: Receiver<EdgeEvent>,
    ctx: PiracerContext,
    is_running: Arc<AtomicBool>,
    metrics: Arc<PiracerMetrics>,
) {
    info!(
        interval_ms = estimator.config().recompute_interval.as_millis() as u64,
        "Velocity estimator thread started"
    );

    let interval = estimator.config().recompute_interval;
    let mut next_tick = Instant::now() + interval;

    while is_running.load(Ordering::Acquire) {
        let deadline = next_tick.min(Instant::now() + MAX_WAIT_SLICE);
        match edge_rx.recv_deadline(deadline) {
            Ok(event) => {
                if estimator.on_edge(event) {
                    metrics.edge_events_total.fetch_add(1, Ordering::Relaxed);
                } else {
                    metrics.edges_debounced.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                debug!("Edge channel disconnected, estimator thread exiting");
                break;
            }
        }

        if Instant::now() >= next_tick {
            if let Some(reading) = estimator.recompute(monotonic_micros()) {
                ctx.publish_velocity(reading);
                metrics.velocity_updates.fetch_add(1, Ordering::Relaxed);
            }

            next_tick += interval;
            // 长时间调度停顿后不补发积压的 tick
            let now = Instant::now();
            if next_tick < now {
                next_tick = now + interval;
            }
        }
    }

    info!("Velocity estimator thread stopped");
}
