//! IO 线程主循环
//!
//! 单个线程双向拥有 CAN 适配器：接收方向按 ID 分发（速度遥测、
//! 拨杆事件、底盘保活），发送方向只有挡位 LED 应答一种帧。手柄
//! 路径的绝对挡位请求经通道汇入本线程，与拨杆事件串行通过同一个
//! 梯级状态机，因此挡位只有一个写者。任何锁都不跨越阻塞 IO。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, TryRecvError};
use piracer_can::{CanAdapter, CanError, PiracerFrame};
use piracer_protocol::{
    GearPosition, ProtocolError, decode_velocity, encode_led_frame, ids, next_counter,
    verify_and_decode_lever_frame,
};
use tracing::{error, trace, warn};

use crate::gear::{GearLadder, GearOutcome, GearRequest};
use crate::metrics::PiracerMetrics;
use crate::monitor::monotonic_micros;
use crate::state::{GearSnapshot, PiracerContext};

/// Pipeline 配置
///
/// 控制 IO 线程的行为，包括接收超时与 LED 刷新周期。
///
/// # Example
///
/// ```
/// use piracer_driver::PipelineConfig;
///
/// // 使用默认配置（2ms 接收超时，100ms LED 刷新）
/// let config = PipelineConfig::default();
///
/// // 自定义配置
/// let config = PipelineConfig {
///     receive_timeout_ms: 5,
///     led_refresh_interval_ms: 200,
/// };
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// CAN 接收超时（毫秒）
    ///
    /// 超时决定 IO 线程在总线空闲时的唤醒频率，进而决定挡位请求
    /// 排空、LED 刷新与关停检查的最大延迟。
    pub receive_timeout_ms: u64,

    /// LED 应答刷新周期（毫秒）
    ///
    /// 挡位变更即时发送一帧之外，以该周期重发当前挡位，防止拨杆
    /// 侧指示灯因超时熄灭。
    pub led_refresh_interval_ms: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            receive_timeout_ms: 2,
            led_refresh_interval_ms: 100,
        }
    }
}

/// LED 应答调度
///
/// 持有发送方向的滚动计数器：每成功发出一帧步进一次，发送失败时
/// 保留当前值供重试。计数器跨越「变更触发」与「周期刷新」两条
/// 发送路径，接收端据此识别新帧。
struct LedScheduler {
    counter: u8,
    last_sent: Instant,
    interval: Duration,
}

impl LedScheduler {
    fn new(interval: Duration) -> Self {
        Self {
            counter: 0,
            last_sent: Instant::now(),
            interval,
        }
    }

    /// 立即发送当前挡位的 LED 应答
    fn send(&mut self, can: &mut impl CanAdapter, position: GearPosition, metrics: &PiracerMetrics) {
        let frame = match encode_led_frame(position, self.counter) {
            Ok(frame) => frame,
            // Unknown 挡位没有 LED 码，跳过本次发送
            Err(_) => return,
        };

        match can.send(frame) {
            Ok(()) => {
                self.counter = next_counter(self.counter);
                self.last_sent = Instant::now();
                metrics.led_frames_sent.fetch_add(1, Ordering::Relaxed);
                metrics.tx_frames_total.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                metrics.device_errors.fetch_add(1, Ordering::Relaxed);
                error!("Failed to send LED frame: {}", e);
            }
        }
    }

    /// 距上次发送超过刷新周期时重发当前挡位
    fn maybe_refresh(
        &mut self,
        can: &mut impl CanAdapter,
        position: GearPosition,
        metrics: &PiracerMetrics,
    ) {
        if position == GearPosition::Unknown {
            return;
        }
        if self.last_sent.elapsed() >= self.interval {
            self.send(can, position, metrics);
        }
    }
}

/// 发布一次挡位切换：更新共享状态并立即应答 LED
fn publish_shift(
    can: &mut impl CanAdapter,
    ctx: &PiracerContext,
    led: &mut LedScheduler,
    metrics: &PiracerMetrics,
    position: GearPosition,
    timestamp_us: u64,
) {
    ctx.publish_gear(GearSnapshot {
        position,
        timestamp_us,
    });
    metrics.gear_transitions.fetch_add(1, Ordering::Relaxed);
    trace!(gear = %position, "Gear shifted");
    led.send(can, position, metrics);
}

/// 排空手柄路径的挡位请求（带时间预算）
///
/// 非阻塞地取出积压的绝对挡位请求并逐个通过状态机。单次最多处理
/// 32 个请求、占用 500µs，避免请求洪峰拖慢 RX。
///
/// 返回是否检测到通道已断开（所有请求发送端被丢弃）。
fn drain_gear_requests(
    can: &mut impl CanAdapter,
    request_rx: &Receiver<GearRequest>,
    ladder: &mut GearLadder,
    ctx: &PiracerContext,
    led: &mut LedScheduler,
    metrics: &PiracerMetrics,
) -> bool {
    const MAX_DRAIN_PER_CYCLE: usize = 32;
    const TIME_BUDGET: Duration = Duration::from_micros(500);

    let start = Instant::now();

    for _ in 0..MAX_DRAIN_PER_CYCLE {
        if start.elapsed() > TIME_BUDGET {
            trace!(
                "Request drain budget exhausted, deferred {} requests",
                request_rx.len()
            );
            break;
        }

        match request_rx.try_recv() {
            Ok(request) => match ladder.apply_request(&request) {
                GearOutcome::Shifted(position) => {
                    publish_shift(can, ctx, led, metrics, position, request.timestamp_us);
                }
                GearOutcome::Clamped => {}
                GearOutcome::Duplicate => {
                    metrics.duplicate_events.fetch_add(1, Ordering::Relaxed);
                }
            },
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => return true,
        }
    }

    false
}

/// 按 CAN ID 分发一帧
fn dispatch_frame(
    frame: &PiracerFrame,
    can: &mut impl CanAdapter,
    ladder: &mut GearLadder,
    ctx: &PiracerContext,
    led: &mut LedScheduler,
    metrics: &PiracerMetrics,
) {
    match frame.id {
        ids::VELOCITY_FRAME_ID => match decode_velocity(frame) {
            Ok(reading) => {
                ctx.publish_velocity(reading);
                ctx.connection.register_feedback();
                metrics.rx_frames_valid.fetch_add(1, Ordering::Relaxed);
                metrics.velocity_updates.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => {
                metrics.malformed_frames.fetch_add(1, Ordering::Relaxed);
                warn!("Malformed velocity frame: {}", e);
            }
        },
        ids::LEVER_FRAME_ID => match verify_and_decode_lever_frame(frame) {
            Ok(event) => {
                ctx.connection.register_feedback();
                metrics.rx_frames_valid.fetch_add(1, Ordering::Relaxed);
                match ladder.apply_toggle(&event) {
                    GearOutcome::Shifted(position) => {
                        publish_shift(can, ctx, led, metrics, position, frame.timestamp_us);
                    }
                    GearOutcome::Clamped => {
                        trace!(gear = %ladder.position(), "Toggle clamped at ladder end");
                    }
                    GearOutcome::Duplicate => {
                        metrics.duplicate_events.fetch_add(1, Ordering::Relaxed);
                    }
                }
            }
            // 共享总线上偶发误码是预期内的：静默丢帧，不升级告警
            Err(ProtocolError::ChecksumMismatch { .. }) => {
                metrics.checksum_errors.fetch_add(1, Ordering::Relaxed);
                trace!("Lever frame checksum mismatch, dropped");
            }
            Err(e) => {
                metrics.malformed_frames.fetch_add(1, Ordering::Relaxed);
                warn!("Malformed lever frame: {}", e);
            }
        },
        ids::KEEPALIVE_FRAME_ID => {
            ctx.connection.register_feedback();
            metrics.rx_frames_valid.fetch_add(1, Ordering::Relaxed);
        }
        ids::LED_FRAME_ID => {
            // 本机是 LED 帧的唯一发送方，接收方向出现即为回显
            metrics.rx_echo_filtered.fetch_add(1, Ordering::Relaxed);
        }
        other => {
            metrics.rx_unknown_ids.fetch_add(1, Ordering::Relaxed);
            trace!("Unknown CAN id 0x{:X}, ignored", other);
        }
    }
}

/// IO 线程主循环
///
/// 每轮迭代：检查运行标志 → 排空挡位请求 → 带超时接收一帧并分发
/// → LED 周期刷新检查。接收超时是正常现象（总线空闲），致命 CAN
/// 错误（设备消失、总线关闭、缓冲溢出）清除运行标志并退出，联动
/// 其余线程关停。
///
/// # 参数
/// - `can`: CAN 适配器（本线程独占）
/// - `request_rx`: 手柄路径挡位请求通道
/// - `ctx`: 共享状态上下文
/// - `config`: Pipeline 配置
/// - `is_running`: 运行标志（协作式关停）
/// - `metrics`: 性能指标
pub fn io_loop(
    mut can: impl CanAdapter,
    request_rx: Receiver<GearRequest>,
    ctx: PiracerContext,
    config: PipelineConfig,
    is_running: Arc<AtomicBool>,
    metrics: Arc<PiracerMetrics>,
) {
    can.set_receive_timeout(Duration::from_millis(config.receive_timeout_ms));

    let mut ladder = GearLadder::new();
    let mut led = LedScheduler::new(Duration::from_millis(config.led_refresh_interval_ms));

    loop {
        // Acquire：看到 false 时必须同时看到其他线程在此之前的全部写入
        if !is_running.load(Ordering::Acquire) {
            trace!("IO thread: is_running flag is false, exiting");
            break;
        }

        if drain_gear_requests(&mut can, &request_rx, &mut ladder, &ctx, &mut led, &metrics) {
            trace!("IO thread: gear request channel disconnected, exiting");
            break;
        }

        let frame = match can.receive() {
            Ok(frame) => {
                metrics.rx_frames_total.fetch_add(1, Ordering::Relaxed);
                frame
            }
            Err(CanError::Timeout) => {
                // 超时是正常情况：总线空闲时的唤醒点
                metrics.rx_timeouts.fetch_add(1, Ordering::Relaxed);
                led.maybe_refresh(&mut can, ladder.position(), &metrics);
                continue;
            }
            Err(e) => {
                metrics.device_errors.fetch_add(1, Ordering::Relaxed);

                let is_fatal = matches!(e, CanError::BusOff | CanError::BufferOverflow)
                    || matches!(&e, CanError::Device(d) if d.is_fatal());
                if is_fatal {
                    error!("IO thread: fatal CAN error, shutting down: {}", e);
                    // Release：此前的全部写入对看到 false 的线程可见
                    is_running.store(false, Ordering::Release);
                    break;
                }

                warn!("IO thread: CAN receive error: {}", e);
                continue;
            }
        };

        // 接收侧统一打点：适配器层不产生时间戳
        let frame = if frame.timestamp_us == 0 {
            frame.with_timestamp(monotonic_micros())
        } else {
            frame
        };

        dispatch_frame(&frame, &mut can, &mut ladder, &ctx, &mut led, &metrics);

        // 高帧率下不会走超时分支，刷新检查在这里兜底
        led.maybe_refresh(&mut can, ladder.position(), &metrics);
    }

    trace!("IO thread: loop exited");
}
