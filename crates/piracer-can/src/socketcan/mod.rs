//! SocketCAN 适配器实现
//!
//! Linux 平台下基于内核 SocketCAN 子系统的 CAN 通讯接口。
//!
//! ## 特性
//!
//! - 基于 Linux SocketCAN 子系统，内核级收发
//! - 支持标准帧和扩展帧
//! - 自动过滤错误帧，并把 Bus-Off / 缓冲溢出上报为可分类错误
//!
//! ## 依赖
//!
//! - `socketcan` crate (版本 3.5)
//! - CAN 接口必须已配置（通过 `ip link` 命令）
//!
//! ## 限制
//!
//! - **仅限 Linux 平台**：SocketCAN 是 Linux 内核特性
//! - **接口配置**：波特率（本车总线为 500 kbit/s）由系统工具
//!   （`ip link`）完成，不在应用层设置
//! - **回环**：内核默认不把本 socket 发出的帧回读给自己
//!   （`CAN_RAW_RECV_OWN_MSGS=0`），但同接口上其他进程发出的
//!   帧都会进入接收队列，上层需按帧 ID 过滤无关帧

use crate::{CanAdapter, CanError, PiracerFrame};
use socketcan::{
    BlockingCan, CanError as SocketCanError, CanErrorFrame, CanFrame, CanSocket, EmbeddedFrame,
    ExtendedId, Frame, Socket, StandardId,
};
use std::time::Duration;
use tracing::{error, trace, warn};

mod interface_check;

use interface_check::check_interface_status;

/// 默认读超时
///
/// 与驱动层 `PipelineConfig` 的默认值一致：足够短，保证 io_loop
/// 在空闲总线上也能及时轮询命令通道和退出信号。
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(2);

/// PiracerFrame → socketcan 帧
fn to_can_frame(frame: PiracerFrame) -> Result<CanFrame, CanError> {
    let payload = &frame.data[..frame.len as usize];
    let can_frame = if frame.is_extended {
        ExtendedId::new(frame.id).and_then(|id| CanFrame::new(id, payload))
    } else {
        StandardId::new(frame.id as u16).and_then(|id| CanFrame::new(id, payload))
    };
    can_frame.ok_or_else(|| {
        CanError::Device(format!("Failed to create CAN frame with ID 0x{:X}", frame.id).into())
    })
}

/// socketcan 帧 → PiracerFrame
///
/// 时间戳留空（0）：本适配层不提取内核时间戳，接收时刻由驱动层
/// 用单调时钟补打，保证全系统时间轴一致。
fn from_can_frame(can_frame: &CanFrame) -> PiracerFrame {
    let mut data = [0u8; 8];
    let frame_data = can_frame.data();
    let len = frame_data.len().min(8);
    data[..len].copy_from_slice(&frame_data[..len]);

    let id = if can_frame.is_extended() {
        can_frame.raw_id() & 0x1FFF_FFFF
    } else {
        can_frame.raw_id() & 0x7FF
    };

    PiracerFrame {
        id,
        data,
        len: len as u8,
        is_extended: can_frame.is_extended(),
        timestamp_us: 0,
    }
}

/// 错误帧分类结果
enum ErrorFrameAction {
    /// 致命总线状况，向上抛错
    Fail(CanError),
    /// 可忽略，继续接收下一帧
    Ignore,
}

/// 分类一个 CAN 错误帧
///
/// Bus-Off 和缓冲溢出会让 IO 循环停机，其余错误帧仅记日志后忽略。
fn classify_error_frame(can_frame: CanFrame) -> ErrorFrameAction {
    match CanErrorFrame::try_from(can_frame) {
        Ok(error_frame) => {
            let socketcan_error = SocketCanError::from(error_frame);
            match &socketcan_error {
                SocketCanError::BusOff => {
                    error!("CAN Bus Off error detected");
                    ErrorFrameAction::Fail(CanError::BusOff)
                },
                SocketCanError::ControllerProblem(problem) => {
                    let problem_str = format!("{}", problem);
                    if problem_str.contains("overflow") || problem_str.contains("Overflow") {
                        error!("CAN Buffer Overflow detected: {}", problem);
                        ErrorFrameAction::Fail(CanError::BufferOverflow)
                    } else {
                        warn!("CAN Controller Problem: {}, ignoring", problem);
                        ErrorFrameAction::Ignore
                    }
                },
                _ => {
                    warn!("CAN Error Frame received: {}, ignoring", socketcan_error);
                    ErrorFrameAction::Ignore
                },
            }
        },
        Err(_) => {
            warn!("Received CAN error frame but failed to parse, ignoring");
            ErrorFrameAction::Ignore
        },
    }
}

/// SocketCAN 适配器
///
/// 实现 [`CanAdapter`] trait，提供 Linux 平台下的 SocketCAN 支持。
///
/// # 示例
///
/// ```no_run
/// use piracer_can::{CanAdapter, SocketCanAdapter, PiracerFrame};
///
/// let mut adapter = SocketCanAdapter::new("can0").unwrap();
///
/// let frame = PiracerFrame::new_standard(0x100, &[0, 0, 0, 0, 0, 0, 0, 0]);
/// adapter.send(frame).unwrap();
///
/// let rx_frame = adapter.receive().unwrap();
/// ```
#[derive(Debug)]
pub struct SocketCanAdapter {
    /// SocketCAN socket
    socket: CanSocket,
    /// 接口名称（如 "can0"）
    interface: String,
    /// 是否已启动（SocketCAN 打开即启动）
    started: bool,
    /// 读超时时间
    read_timeout: Duration,
}

impl SocketCanAdapter {
    /// 创建新的 SocketCAN 适配器
    ///
    /// 在打开 socket 之前，会检查接口是否存在且已启动（UP 状态）。
    /// 如果接口不存在或未启动，会返回清晰的错误信息，指导用户如何修复。
    ///
    /// # 参数
    /// - `interface`: CAN 接口名称（如 "can0" 或 "vcan0"）
    ///
    /// # 错误
    /// - `CanError::Device`: 接口不存在、未启动或无法打开
    /// - `CanError::Io`: IO 错误（如权限不足、系统调用失败）
    pub fn new(interface: impl Into<String>) -> Result<Self, CanError> {
        let interface = interface.into();

        // 1. 检查接口状态（仅检查，不自动配置）
        match check_interface_status(&interface) {
            Ok(true) => {
                trace!(
                    "CAN interface '{}' is UP, proceeding with initialization",
                    interface
                );
            },
            Ok(false) => {
                return Err(CanError::Device(
                    format!(
                        "CAN interface '{}' exists but is not UP. Please start it first:\n  sudo ip link set up {}",
                        interface, interface
                    )
                    .into(),
                ));
            },
            Err(e) => {
                // 接口不存在或其他错误，直接返回
                return Err(e);
            },
        }

        // 2. 打开 SocketCAN 接口
        let socket = CanSocket::open(&interface).map_err(|e| {
            CanError::Device(format!("Failed to open CAN interface '{}': {}", interface, e).into())
        })?;

        // 3. 设置读超时
        socket
            .set_read_timeout(DEFAULT_READ_TIMEOUT)
            .map_err(CanError::Io)?;

        trace!("SocketCAN interface '{}' opened", interface);

        Ok(Self {
            socket,
            interface,
            started: true, // SocketCAN 打开即启动，无需额外配置
            read_timeout: DEFAULT_READ_TIMEOUT,
        })
    }

    /// 获取接口名称
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// 获取读超时时间
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// 检查是否已启动
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// 设置读超时
    pub fn set_read_timeout(&mut self, timeout: Duration) -> Result<(), CanError> {
        self.socket.set_read_timeout(timeout).map_err(CanError::Io)?;
        self.read_timeout = timeout;
        Ok(())
    }

    /// 配置接口（可选，通常由系统工具配置）
    ///
    /// SocketCAN 的波特率由 `ip link set can0 type can bitrate 500000`
    /// 配置；这里只留日志痕迹，不做任何修改。
    pub fn configure(&mut self, _bitrate: u32) -> Result<(), CanError> {
        trace!(
            "SocketCAN interface '{}' configured (bitrate set externally)",
            self.interface
        );
        Ok(())
    }
}

impl Drop for SocketCanAdapter {
    fn drop(&mut self) {
        trace!(
            "[Auto-Drop] SocketCAN interface '{}' closed",
            self.interface
        );
        // socket 随所有权释放自动关闭
    }
}

impl CanAdapter for SocketCanAdapter {
    /// 发送帧（Fire-and-Forget）
    ///
    /// # 错误
    /// - `CanError::NotStarted`: 适配器未启动
    /// - `CanError::Device`: 创建帧失败（如 ID 无效）
    /// - `CanError::Io`: 发送失败（如总线错误）
    fn send(&mut self, frame: PiracerFrame) -> Result<(), CanError> {
        if !self.started {
            return Err(CanError::NotStarted);
        }

        let can_frame = to_can_frame(frame)?;
        self.socket.transmit(&can_frame).map_err(|e| {
            CanError::Io(std::io::Error::other(format!(
                "SocketCAN transmit error: {}",
                e
            )))
        })?;

        trace!("Sent CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
        Ok(())
    }

    /// 接收帧（阻塞直到收到有效数据帧或超时）
    ///
    /// **关键**：自动过滤错误帧，只返回有效数据帧。
    ///
    /// # 错误
    /// - `CanError::NotStarted`: 适配器未启动
    /// - `CanError::Timeout`: 读取超时（可重试）
    /// - `CanError::BusOff` / `CanError::BufferOverflow`: 总线故障
    fn receive(&mut self) -> Result<PiracerFrame, CanError> {
        if !self.started {
            return Err(CanError::NotStarted);
        }

        loop {
            let can_frame = match self.socket.read_frame() {
                Ok(frame) => frame,
                Err(e)
                    if e.kind() == std::io::ErrorKind::WouldBlock
                        || e.kind() == std::io::ErrorKind::TimedOut =>
                {
                    return Err(CanError::Timeout);
                },
                Err(e) => return Err(CanError::Io(e)),
            };

            if can_frame.is_error_frame() {
                match classify_error_frame(can_frame) {
                    ErrorFrameAction::Fail(e) => return Err(e),
                    ErrorFrameAction::Ignore => continue,
                }
            }

            let frame = from_can_frame(&can_frame);
            trace!("Received CAN frame: ID=0x{:X}, len={}", frame.id, frame.len);
            return Ok(frame);
        }
    }

    /// 设置接收超时
    fn set_receive_timeout(&mut self, timeout: Duration) {
        if let Err(e) = self.set_read_timeout(timeout) {
            warn!("Failed to set receive timeout: {}", e);
        }
    }

    /// 带超时的接收
    fn receive_timeout(&mut self, timeout: Duration) -> Result<PiracerFrame, CanError> {
        let old_timeout = self.read_timeout;
        self.set_read_timeout(timeout)?;
        let result = self.receive();
        let _ = self.set_read_timeout(old_timeout);
        result
    }

    /// 非阻塞接收
    ///
    /// 用 1µs 超时模拟非阻塞（`SO_RCVTIMEO` 为零表示永久阻塞，不可用）。
    fn try_receive(&mut self) -> Result<Option<PiracerFrame>, CanError> {
        match self.receive_timeout(Duration::from_micros(1)) {
            Ok(frame) => Ok(Some(frame)),
            Err(CanError::Timeout) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::process::Command;

    /// 检查 CAN 接口是否存在
    fn can_interface_exists(interface: &str) -> bool {
        let output = Command::new("ip").args(["link", "show", interface]).output();

        output.is_ok() && output.unwrap().status.success()
    }

    /// 宏：要求 vcan0 接口存在，如果不存在则跳过测试
    macro_rules! require_vcan0 {
        () => {{
            if !can_interface_exists("vcan0") {
                eprintln!("Skipping test: vcan0 interface not available");
                return;
            }
            "vcan0"
        }};
    }

    #[test]
    fn test_frame_conversion_roundtrip() {
        let frame = PiracerFrame::new_standard(0x197, &[0x01, 0x05, 0, 0, 0, 0, 0, 0x3C]);
        let can_frame = to_can_frame(frame).unwrap();
        let back = from_can_frame(&can_frame);
        assert_eq!(back.id, 0x197);
        assert_eq!(back.len, 8);
        assert_eq!(back.data, frame.data);
        assert!(!back.is_extended);
    }

    #[test]
    fn test_frame_conversion_extended() {
        let frame = PiracerFrame::new_extended(0x12345, &[0xAA, 0xBB]);
        let can_frame = to_can_frame(frame).unwrap();
        let back = from_can_frame(&can_frame);
        assert_eq!(back.id, 0x12345);
        assert!(back.is_extended);
        assert_eq!(back.data_slice(), &[0xAA, 0xBB]);
    }

    #[test]
    #[serial]
    fn test_socketcan_adapter_new_success() {
        // 注意：需要 vcan0 接口存在
        let interface = require_vcan0!();
        let adapter = SocketCanAdapter::new(interface);
        assert!(adapter.is_ok());
    }

    #[test]
    fn test_socketcan_adapter_new_invalid_interface() {
        let result = SocketCanAdapter::new("nonexistent_can99");
        assert!(result.is_err());
        if let Err(CanError::Device(msg)) = result {
            assert!(msg.message.contains("nonexistent_can99"));
        } else {
            panic!("Expected Device error");
        }
    }

    #[test]
    #[serial]
    fn test_socketcan_adapter_stores_interface_and_timeout() {
        let interface = require_vcan0!();
        let adapter = SocketCanAdapter::new(interface).unwrap();
        assert_eq!(adapter.interface(), "vcan0");
        assert_eq!(adapter.read_timeout(), DEFAULT_READ_TIMEOUT);
        assert!(adapter.is_started());
    }

    #[test]
    #[serial]
    fn test_socketcan_adapter_send_and_receive() {
        // vcan 把 TX 帧回环给同接口上的其他 socket
        let interface = require_vcan0!();
        let mut tx = SocketCanAdapter::new(interface).unwrap();
        let mut rx = SocketCanAdapter::new(interface).unwrap();
        rx.set_read_timeout(Duration::from_millis(100)).unwrap();

        // 清空缓冲区
        loop {
            match rx.receive_timeout(Duration::from_millis(1)) {
                Ok(_) => continue,
                Err(CanError::Timeout) => break,
                Err(e) => panic!("Unexpected error while clearing: {:?}", e),
            }
        }
        rx.set_read_timeout(Duration::from_millis(100)).unwrap();

        let frame = PiracerFrame::new_standard(0x100, &[0x01, 0xF4, 0, 0, 0, 0, 0, 0]);
        tx.send(frame).unwrap();

        let received = rx.receive().unwrap();
        assert_eq!(received.id, 0x100);
        assert_eq!(received.data_slice(), frame.data_slice());
    }

    #[test]
    #[serial]
    fn test_socketcan_adapter_receive_timeout_on_silent_bus() {
        let interface = require_vcan0!();
        let mut adapter = SocketCanAdapter::new(interface).unwrap();

        // 清空缓冲区
        loop {
            match adapter.receive_timeout(Duration::from_millis(1)) {
                Ok(_) => continue,
                Err(CanError::Timeout) => break,
                Err(e) => panic!("Unexpected error while clearing: {:?}", e),
            }
        }

        let start = std::time::Instant::now();
        let result = adapter.receive_timeout(Duration::from_millis(10));
        let elapsed = start.elapsed();

        assert!(matches!(result, Err(CanError::Timeout)));
        assert!(elapsed >= Duration::from_millis(5));
        assert!(elapsed < Duration::from_millis(100));
    }

    #[test]
    #[serial]
    fn test_socketcan_adapter_does_not_receive_own_frames() {
        // CAN_RAW_RECV_OWN_MSGS 默认关闭：自己发出的帧不会回读
        let interface = require_vcan0!();
        let mut adapter = SocketCanAdapter::new(interface).unwrap();

        // 清空缓冲区
        loop {
            match adapter.receive_timeout(Duration::from_millis(1)) {
                Ok(_) => continue,
                Err(CanError::Timeout) => break,
                Err(e) => panic!("Unexpected error while clearing: {:?}", e),
            }
        }

        let frame = PiracerFrame::new_standard(0x3FD, &[0x80, 0x02, 0, 0, 0, 0, 0, 0x11]);
        adapter.send(frame).unwrap();

        let result = adapter.receive_timeout(Duration::from_millis(20));
        assert!(matches!(result, Err(CanError::Timeout)));
    }
}
