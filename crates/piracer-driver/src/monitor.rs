//! 连接监控
//!
//! 通过记录最近一次收到底盘保活帧的单调时间戳来判断链路健康。
//! IO 线程在收到任意有效帧时调用 [`ConnectionMonitor::register_feedback`]，
//! 上层通过 [`ConnectionMonitor::is_connected`] 查询链路是否仍然活跃。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// 进程启动时刻，作为单调时钟的零点。
static APP_START: OnceLock<Instant> = OnceLock::new();

/// 返回自进程启动以来的单调微秒数。
///
/// 首次调用会初始化零点，之后的调用全部相对同一零点，
/// 因此不同线程拿到的时间戳可以直接比较。
pub fn monotonic_micros() -> u64 {
    let start = APP_START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}

/// 链路健康监控器。
///
/// 内部只有一个原子时间戳，注册与查询都是无锁操作，可以在
/// IO 线程与应用线程之间自由共享。
#[derive(Debug, Clone)]
pub struct ConnectionMonitor {
    /// 最近一次收到反馈的单调微秒时间戳（0 表示从未收到）
    last_feedback_us: Arc<AtomicU64>,
}

impl ConnectionMonitor {
    /// 创建监控器，初始状态为"从未收到反馈"。
    pub fn new() -> Self {
        Self {
            last_feedback_us: Arc::new(AtomicU64::new(0)),
        }
    }

    /// 记录一次反馈（由 IO 线程在收到有效帧时调用）。
    pub fn register_feedback(&self) {
        self.last_feedback_us
            .store(monotonic_micros().max(1), Ordering::Release);
    }

    /// 查询在 `timeout` 窗口内是否收到过反馈。
    ///
    /// 从未收到过任何反馈时返回 `false`。
    pub fn is_connected(&self, timeout: Duration) -> bool {
        match self.last_feedback_age() {
            Some(age) => age <= timeout,
            None => false,
        }
    }

    /// 距最近一次反馈经过的时长，从未收到反馈时返回 `None`。
    pub fn last_feedback_age(&self) -> Option<Duration> {
        let last = self.last_feedback_us.load(Ordering::Acquire);
        if last == 0 {
            return None;
        }
        let now = monotonic_micros();
        Some(Duration::from_micros(now.saturating_sub(last)))
    }
}

impl Default for ConnectionMonitor {
    fn default() -> Self {
        Self::new()
    }
}
