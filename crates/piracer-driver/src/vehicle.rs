//! 车辆驱动对外 API
//!
//! 提供对外的 `Piracer` 结构体，封装 IO 线程与速度估计线程的
//! 生命周期、事件注入端（挡位请求、霍尔边沿）与共享状态读取。

use std::mem::ManuallyDrop;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::thread::{JoinHandle, spawn};
use std::time::Duration;

use crossbeam_channel::{Sender, TrySendError};
use piracer_can::CanAdapter;
use piracer_protocol::{COUNTER_MODULO, GearPosition};
use tracing::error;

use crate::error::DriverError;
use crate::gear::GearRequest;
use crate::metrics::{MetricsSnapshot, PiracerMetrics};
use crate::monitor::monotonic_micros;
use crate::pipeline::{PipelineConfig, io_loop};
use crate::speed::{EdgeEvent, EstimatorConfig, PulseEstimator, estimator_loop};
use crate::state::{PiracerContext, VehicleSnapshot};

/// 判定链路活跃的反馈窗口
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(1);

/// 挡位请求队列容量（按钮事件低频，小队列即可）
const REQUEST_QUEUE_CAPACITY: usize = 10;

/// 边沿事件队列容量（高转速下可达数 kHz）
const EDGE_QUEUE_CAPACITY: usize = 1024;

/// 带超时的线程 join 扩展
trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: std::marker::Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        use std::sync::mpsc;

        // 看门狗线程执行真正的 join，自己在通道上带超时等待结果
        let (tx, rx) = mpsc::channel();
        spawn(move || {
            let result = self.join();
            let _ = tx.send(result);
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result.map(|_| ()),
            Err(mpsc::RecvTimeoutError::Timeout) => {
                // 超时后看门狗线程继续挂着，进程退出时由操作系统回收
                Err(Box::new(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "Thread join timeout",
                )))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(Box::new(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "Thread panicked during join",
            ))),
        }
    }
}

/// 驱动配置（Pipeline + 估计器）
#[derive(Debug, Clone, Default)]
pub struct PiracerConfig {
    /// IO 线程配置
    pub pipeline: PipelineConfig,

    /// 速度估计器配置
    pub estimator: EstimatorConfig,
}

/// 挡位请求注入端
///
/// 手柄等输入源通过它向 IO 线程发出绝对挡位请求。滚动计数器由
/// 全部克隆共享：无论请求来自哪个克隆，相邻请求的计数器都不同，
/// 不会被按来源去重误杀。
#[derive(Debug, Clone)]
pub struct GearRequester {
    tx: Sender<GearRequest>,
    counter: Arc<AtomicU8>,
}

impl GearRequester {
    /// 发出一个绝对挡位请求（非阻塞）
    ///
    /// # 错误
    /// - `DriverError::ChannelFull`: 请求队列已满
    /// - `DriverError::ChannelClosed`: IO 线程已退出
    pub fn request(&self, target: GearPosition) -> Result<(), DriverError> {
        let counter = self.counter.fetch_add(1, Ordering::Relaxed) % COUNTER_MODULO;
        let request = GearRequest {
            target,
            counter,
            timestamp_us: monotonic_micros(),
        };
        self.tx.try_send(request).map_err(|e| match e {
            TrySendError::Full(_) => DriverError::ChannelFull,
            TrySendError::Disconnected(_) => DriverError::ChannelClosed,
        })
    }
}

/// 霍尔边沿注入端
///
/// GPIO 回调等事件源通过它向估计线程投递边沿。
#[derive(Debug, Clone)]
pub struct EdgeSender {
    tx: Sender<EdgeEvent>,
}

impl EdgeSender {
    /// 以当前单调时钟打点并注入一次边沿
    ///
    /// 队列满时静默丢弃：估计值轻微偏低好过阻塞事件源。
    pub fn record_edge(&self) {
        let _ = self.tx.try_send(EdgeEvent::now());
    }

    /// 注入一个带外部时间戳的边沿（非阻塞）
    pub fn send(&self, event: EdgeEvent) -> Result<(), DriverError> {
        self.tx.try_send(event).map_err(|e| match e {
            TrySendError::Full(_) => DriverError::ChannelFull,
            TrySendError::Disconnected(_) => DriverError::ChannelClosed,
        })
    }
}

/// PiRacer 车辆驱动（对外 API）
///
/// 构造时启动两个后台线程：IO 线程独占 CAN 适配器，估计线程消费
/// 边沿事件；Drop 时按「清标志 → 关通道 → 限时 join」的顺序协作
/// 关停。
pub struct Piracer {
    /// 挡位请求发送端
    ///
    /// Drop 时必须 **先于 join 真正关闭**，否则 `io_loop` 的排空
    /// 分支可能收不到 `Disconnected`。
    request_tx: ManuallyDrop<Sender<GearRequest>>,

    /// 边沿事件发送端（同上，先于 join 关闭）
    edge_tx: ManuallyDrop<Sender<EdgeEvent>>,

    /// 手柄路径滚动计数器（全部 `GearRequester` 克隆共享）
    request_counter: Arc<AtomicU8>,

    /// 共享状态上下文
    ctx: PiracerContext,

    /// IO 线程句柄（Drop 时 join）
    io_thread: Option<JoinHandle<()>>,

    /// 估计线程句柄（Drop 时 join）
    estimator_thread: Option<JoinHandle<()>>,

    /// 运行标志（线程生命周期联动）
    is_running: Arc<AtomicBool>,

    /// 性能指标（原子计数器）
    metrics: Arc<PiracerMetrics>,
}

impl Piracer {
    /// 创建新的驱动实例并启动后台线程
    ///
    /// # 参数
    /// - `can`: CAN 适配器（移动进 IO 线程独占）
    /// - `config`: 驱动配置（`None` 使用默认值）
    pub fn new(can: impl CanAdapter + Send + 'static, config: Option<PiracerConfig>) -> Self {
        let config = config.unwrap_or_default();

        let (request_tx, request_rx) = crossbeam_channel::bounded(REQUEST_QUEUE_CAPACITY);
        let (edge_tx, edge_rx) = crossbeam_channel::bounded(EDGE_QUEUE_CAPACITY);

        let ctx = PiracerContext::new();
        let is_running = Arc::new(AtomicBool::new(true));
        let metrics = Arc::new(PiracerMetrics::new());

        let io_thread = {
            let ctx = ctx.clone();
            let is_running = Arc::clone(&is_running);
            let metrics = Arc::clone(&metrics);
            let pipeline_config = config.pipeline.clone();
            spawn(move || {
                io_loop(can, request_rx, ctx, pipeline_config, is_running, metrics);
            })
        };

        let estimator_thread = {
            let estimator = Arc::new(PulseEstimator::new(config.estimator));
            let ctx = ctx.clone();
            let is_running = Arc::clone(&is_running);
            let metrics = Arc::clone(&metrics);
            spawn(move || {
                estimator_loop(estimator, edge_rx, ctx, is_running, metrics);
            })
        };

        Self {
            request_tx: ManuallyDrop::new(request_tx),
            edge_tx: ManuallyDrop::new(edge_tx),
            request_counter: Arc::new(AtomicU8::new(0)),
            ctx,
            io_thread: Some(io_thread),
            estimator_thread: Some(estimator_thread),
            is_running,
            metrics,
        }
    }

    /// 共享状态句柄（克隆给控制回路 / 仪表盘等消费方）
    pub fn context(&self) -> PiracerContext {
        self.ctx.clone()
    }

    /// 采集一份车辆状态快照
    pub fn snapshot(&self) -> VehicleSnapshot {
        self.ctx.snapshot()
    }

    /// 创建一个挡位请求注入端
    pub fn gear_requester(&self) -> GearRequester {
        GearRequester {
            tx: Sender::clone(&self.request_tx),
            counter: Arc::clone(&self.request_counter),
        }
    }

    /// 创建一个边沿事件注入端
    pub fn edge_sender(&self) -> EdgeSender {
        EdgeSender {
            tx: Sender::clone(&self.edge_tx),
        }
    }

    /// 获取性能指标快照
    pub fn get_metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// 检查后台线程健康状态
    ///
    /// # 返回
    /// - `(io_alive, estimator_alive)`
    pub fn check_health(&self) -> (bool, bool) {
        let io_alive = self.io_thread.as_ref().is_some_and(|h| !h.is_finished());
        let estimator_alive = self
            .estimator_thread
            .as_ref()
            .is_some_and(|h| !h.is_finished());
        (io_alive, estimator_alive)
    }

    /// 两个后台线程是否都在运行
    pub fn is_healthy(&self) -> bool {
        let (io_alive, estimator_alive) = self.check_health();
        io_alive && estimator_alive
    }

    /// 车辆链路是否仍在响应
    ///
    /// 最近 1s 内收到过有效总线帧即视为连接正常，可用于检测断电、
    /// 线缆脱落或对端固件挂死。
    pub fn is_connected(&self) -> bool {
        self.ctx.connection.is_connected(CONNECTION_TIMEOUT)
    }

    /// 距最近一次总线反馈经过的时长（从未收到反馈时为 `None`）
    pub fn connection_age(&self) -> Option<Duration> {
        self.ctx.connection.last_feedback_age()
    }

    /// 阻塞等待第一帧有效总线反馈
    ///
    /// # 错误
    /// - `DriverError::Timeout`: 窗口内未收到任何反馈
    pub fn wait_for_feedback(&self, timeout: Duration) -> Result<(), DriverError> {
        let start = std::time::Instant::now();
        loop {
            if self.ctx.connection.last_feedback_age().is_some() {
                return Ok(());
            }
            if start.elapsed() >= timeout {
                return Err(DriverError::Timeout);
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    /// 协作式关停（幂等，`Drop` 自动调用）
    ///
    /// 顺序：清运行标志 → 关闭两个发送端 → 限时 join 两个线程。
    pub fn shutdown(&mut self) {
        // 线程句柄已被取走说明关停流程走过一遍，发送端也已释放
        if self.io_thread.is_none() && self.estimator_thread.is_none() {
            return;
        }

        // Release：通知所有线程退出，此前写入对它们可见
        self.is_running.store(false, Ordering::Release);

        // 在 join 之前真正关闭两个发送端，确保接收端能看到 Disconnected
        unsafe {
            ManuallyDrop::drop(&mut self.request_tx);
            ManuallyDrop::drop(&mut self.edge_tx);
        }

        let join_timeout = Duration::from_secs(2);

        if let Some(handle) = self.io_thread.take()
            && let Err(e) = handle.join_timeout(join_timeout)
        {
            error!("IO thread failed to join: {:?}", e);
        }

        if let Some(handle) = self.estimator_thread.take()
            && let Err(e) = handle.join_timeout(join_timeout)
        {
            error!("Estimator thread failed to join: {:?}", e);
        }
    }
}

impl Drop for Piracer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use piracer_can::MockCanAdapter;
    use std::time::Instant;

    fn wait_until(what: &str, predicate: impl Fn() -> bool) {
        let deadline = Instant::now() + Duration::from_secs(2);
        while !predicate() {
            assert!(Instant::now() < deadline, "timed out waiting for {}", what);
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_new_spawns_healthy_threads() {
        let piracer = Piracer::new(MockCanAdapter::new(), None);
        assert!(piracer.is_healthy());
        assert!(!piracer.is_connected());
        assert_eq!(piracer.get_metrics().gear_transitions, 0);
    }

    #[test]
    fn test_drop_shuts_down_cleanly() {
        let piracer = Piracer::new(MockCanAdapter::new(), None);
        let start = Instant::now();
        drop(piracer);
        // 协作式关停应远快于 2s 的 join 超时
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_gear_request_roundtrip() {
        let piracer = Piracer::new(MockCanAdapter::new(), None);
        let ctx = piracer.context();

        piracer
            .gear_requester()
            .request(GearPosition::Drive)
            .unwrap();
        wait_until("gear shift", || {
            ctx.gear.load().position == GearPosition::Drive
        });
    }

    #[test]
    fn test_requester_clones_share_counter() {
        let piracer = Piracer::new(MockCanAdapter::new(), None);
        let ctx = piracer.context();
        let first = piracer.gear_requester();
        let second = piracer.gear_requester();

        // 相邻请求来自不同克隆，计数器依然互不相同，两次都生效
        first.request(GearPosition::Drive).unwrap();
        second.request(GearPosition::Reverse).unwrap();

        wait_until("both shifts", || {
            piracer.get_metrics().gear_transitions == 2
        });
        assert_eq!(ctx.gear.load().position, GearPosition::Reverse);
    }

    #[test]
    fn test_edge_events_produce_velocity() {
        let config = PiracerConfig {
            estimator: EstimatorConfig {
                recompute_interval: Duration::from_millis(50),
                ..EstimatorConfig::default()
            },
            ..PiracerConfig::default()
        };
        let piracer = Piracer::new(MockCanAdapter::new(), Some(config));
        let edges = piracer.edge_sender();

        for i in 0..20u64 {
            edges
                .send(EdgeEvent {
                    timestamp_us: i * 10_000,
                })
                .unwrap();
        }

        let ctx = piracer.context();
        wait_until("velocity estimate", || ctx.velocity.load().kmh_centi > 0);
        wait_until("all edges counted", || {
            piracer.get_metrics().edge_events_total == 20
        });
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut piracer = Piracer::new(MockCanAdapter::new(), None);
        piracer.shutdown();
        assert!(!piracer.is_healthy());
        // 第二次关停与随后的 Drop 都不应触碰已释放的发送端
        piracer.shutdown();
        drop(piracer);
    }

    #[test]
    fn test_injectors_fail_closed_after_drop() {
        let piracer = Piracer::new(MockCanAdapter::new(), None);
        let requester = piracer.gear_requester();
        let edges = piracer.edge_sender();
        drop(piracer);

        assert!(matches!(
            requester.request(GearPosition::Drive),
            Err(DriverError::ChannelClosed)
        ));
        assert!(matches!(
            edges.send(EdgeEvent { timestamp_us: 0 }),
            Err(DriverError::ChannelClosed)
        ));
    }
}
