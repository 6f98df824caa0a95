//! # PiRacer Protocol
//!
//! 车载 CAN 总线协议定义（无硬件依赖）
//!
//! ## 模块
//!
//! - `ids`: CAN ID 常量定义
//! - `checksum`: 厂商校验和引擎（CRC-8 + 滚动计数器）
//! - `velocity`: 速度遥测帧编解码
//! - `lever`: 换挡拨杆帧校验与解码
//! - `led`: 挡位 LED 应答帧构建
//! - `gear`: 挡位与驾驶模式枚举
//!
//! ## 字节序
//!
//! 协议使用 Motorola (MSB) 高位在前（大端字节序）。
//! 本模块提供了字节序转换工具函数。

pub mod checksum;
pub mod gear;
pub mod ids;
pub mod led;
pub mod lever;
pub mod velocity;

// 重新导出常用类型
pub use checksum::{COUNTER_MODULO, compute_checksum, next_counter, seed_for_id};
pub use gear::{DriveMode, GearPosition, MANUAL_GEAR_MAX};
pub use led::{LedCode, decode_led_frame, encode_led_frame};
pub use lever::{ToggleDirection, ToggleEvent, encode_lever_frame, verify_and_decode_lever_frame};
pub use velocity::{VelocityReading, decode_velocity, encode_velocity};

/// CAN 2.0 标准帧的统一抽象
///
/// # 设计目的
///
/// `PiracerFrame` 是协议层和硬件层之间的中间抽象，提供：
/// - **层次解耦**：协议层不依赖底层 CAN 实现（SocketCAN/Mock）
/// - **统一接口**：上层通过 `CanAdapter` trait 使用统一的帧类型
/// - **类型安全**：编译时保证帧格式正确，避免原始字节操作错误
///
/// # 设计特性
///
/// - **Copy trait**：零成本复制，车载总线帧率（~100Hz）下无分配压力
/// - **固定 8 字节**：本协议所有帧均为 8 字节定长载荷
/// - **时间戳支持**：`timestamp_us` 字段记录接收时刻，供遥测快照使用
///
/// # 转换示例
///
/// ```rust
/// use piracer_protocol::PiracerFrame;
///
/// let frame = PiracerFrame::new_standard(0x100, &[0x00, 0x2D, 0, 0, 0, 0, 0, 0]);
///
/// assert_eq!(frame.id(), 0x100);
/// assert_eq!(frame.data_slice().len(), 8);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PiracerFrame {
    /// CAN ID（标准帧或扩展帧）
    pub id: u32,

    /// 帧数据（固定 8 字节，未使用部分为 0）
    pub data: [u8; 8],

    /// 有效数据长度 (0-8)
    pub len: u8,

    /// 是否为扩展帧（29-bit ID）
    pub is_extended: bool,

    /// 接收时间戳（微秒），0 表示不可用
    pub timestamp_us: u64,
}

impl PiracerFrame {
    /// 创建标准帧
    pub fn new_standard(id: u16, data: &[u8]) -> Self {
        Self::new(id as u32, data, false)
    }

    /// 创建扩展帧
    pub fn new_extended(id: u32, data: &[u8]) -> Self {
        Self::new(id, data, true)
    }

    /// 通用构造器
    fn new(id: u32, data: &[u8], is_extended: bool) -> Self {
        let mut fixed_data = [0u8; 8];
        let len = data.len().min(8);
        fixed_data[..len].copy_from_slice(&data[..len]);

        Self {
            id,
            data: fixed_data,
            len: len as u8,
            is_extended,
            timestamp_us: 0, // 默认无时间戳
        }
    }

    /// 附加接收时间戳（微秒）
    pub fn with_timestamp(mut self, timestamp_us: u64) -> Self {
        self.timestamp_us = timestamp_us;
        self
    }

    /// 获取数据切片（只包含有效数据）
    pub fn data_slice(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// 获取 CAN ID
    pub fn id(&self) -> u32 {
        self.id
    }

    /// 获取完整数据（8字节固定数组）
    pub fn data(&self) -> &[u8; 8] {
        &self.data
    }
}

use thiserror::Error;

/// 协议解析错误类型
///
/// 所有变体均为局部可恢复：坏帧被丢弃，不产生任何状态变更，
/// 下一个周期帧会重新携带正确数据。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// 载荷长度不符合 8 字节定长约定
    #[error("Malformed frame: expected {expected} bytes, got {actual}")]
    MalformedFrame { expected: usize, actual: usize },

    /// 帧 ID 与调用的编解码器不匹配（调用方违反分发契约）
    #[error("Unexpected CAN ID: 0x{id:X}")]
    UnexpectedId { id: u32 },

    /// 校验和重算结果与帧尾字节不一致
    #[error("Checksum mismatch on 0x{id:X}: expected 0x{expected:02X}, got 0x{actual:02X}")]
    ChecksumMismatch { id: u32, expected: u8, actual: u8 },

    /// 字段值超出协议定义的取值范围
    #[error("Invalid value for field {field}: {value}")]
    InvalidValue { field: String, value: u8 },
}

/// 字节序转换工具函数
///
/// 协议使用 Motorola (MSB) 高位在前（大端字节序），
/// 这些函数用于在协议层进行字节序转换。
///
/// 大端字节序转 u16
pub fn bytes_to_u16_be(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

/// u16 转大端字节序
pub fn u16_to_bytes_be(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}
