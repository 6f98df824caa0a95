//! Mock CAN 适配器（测试与仿真用）
//!
//! 无硬件依赖的 [`CanAdapter`] 实现：测试通过 [`MockCanHandle`]
//! 向接收队列注入帧、取回已发送帧，适配器本体交给被测代码
//! （通常会被移入 IO 线程）。
//!
//! ## 特性
//!
//! - `receive()` 是真阻塞语义：队列为空时等待至超时，不忙等
//! - 句柄与适配器可分处两个线程，测试可在 IO 循环运行期间注入帧
//! - 发送帧按顺序记录，`take_sent_frames()` 一次性取走
//!
//! ## 示例
//!
//! ```
//! use piracer_can::{CanAdapter, MockCanAdapter, PiracerFrame};
//!
//! let mut adapter = MockCanAdapter::new();
//! let handle = adapter.handle();
//!
//! handle.queue_frame(PiracerFrame::new_standard(0x100, &[0; 8]));
//! let frame = adapter.receive().unwrap();
//! assert_eq!(frame.id, 0x100);
//!
//! adapter.send(PiracerFrame::new_standard(0x3FD, &[0; 8])).unwrap();
//! assert_eq!(handle.take_sent_frames().len(), 1);
//! ```

use crate::{CanAdapter, CanError, PiracerFrame};
use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// Mock 适配器默认接收超时（与 SocketCAN 默认值对齐）
const DEFAULT_MOCK_TIMEOUT: Duration = Duration::from_millis(2);

/// Mock CAN 适配器
pub struct MockCanAdapter {
    /// 注入端的保活克隆：句柄全部 Drop 后接收语义退化为超时而非断连
    rx_seed: Sender<PiracerFrame>,
    rx_queue: Receiver<PiracerFrame>,
    sent_sink: Sender<PiracerFrame>,
    sent_taken: Receiver<PiracerFrame>,
    receive_timeout: Duration,
}

impl Default for MockCanAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl MockCanAdapter {
    /// 创建新的 Mock 适配器
    pub fn new() -> Self {
        let (rx_seed, rx_queue) = unbounded();
        let (sent_sink, sent_taken) = unbounded();
        Self {
            rx_seed,
            rx_queue,
            sent_sink,
            sent_taken,
            receive_timeout: DEFAULT_MOCK_TIMEOUT,
        }
    }

    /// 获取测试句柄（可多次调用，句柄可跨线程）
    pub fn handle(&self) -> MockCanHandle {
        MockCanHandle {
            rx_seed: self.rx_seed.clone(),
            sent_taken: self.sent_taken.clone(),
        }
    }
}

impl CanAdapter for MockCanAdapter {
    fn send(&mut self, frame: PiracerFrame) -> Result<(), CanError> {
        self.sent_sink
            .send(frame)
            .map_err(|_| CanError::Device("mock TX sink closed".into()))
    }

    fn receive(&mut self) -> Result<PiracerFrame, CanError> {
        match self.rx_queue.recv_timeout(self.receive_timeout) {
            Ok(frame) => Ok(frame),
            Err(RecvTimeoutError::Timeout) => Err(CanError::Timeout),
            Err(RecvTimeoutError::Disconnected) => {
                Err(CanError::Device("mock RX queue closed".into()))
            },
        }
    }

    fn set_receive_timeout(&mut self, timeout: Duration) {
        self.receive_timeout = timeout;
    }
}

/// Mock 测试句柄
///
/// 持有接收队列的注入端和发送记录的取出端。
/// 适配器移入被测线程之后，测试侧继续用句柄驱动场景。
#[derive(Clone)]
pub struct MockCanHandle {
    rx_seed: Sender<PiracerFrame>,
    sent_taken: Receiver<PiracerFrame>,
}

impl MockCanHandle {
    /// 向接收队列注入一帧
    pub fn queue_frame(&self, frame: PiracerFrame) {
        // 接收端随适配器 Drop 后注入自然落空
        let _ = self.rx_seed.send(frame);
    }

    /// 取走到目前为止记录的全部已发送帧
    pub fn take_sent_frames(&self) -> Vec<PiracerFrame> {
        self.sent_taken.try_iter().collect()
    }

    /// 已发送帧计数（不消费记录队列）
    pub fn sent_frame_count(&self) -> usize {
        self.sent_taken.len()
    }
}
