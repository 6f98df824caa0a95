//! CAN ID 常量定义
//!
//! 车载总线上本核心关心的全部帧 ID。其余 ID 的帧在驱动层
//! 被计数后忽略，不进入任何解码路径。

/// 速度遥测帧（发送端 ~5Hz 周期广播）
pub const VELOCITY_FRAME_ID: u32 = 0x100;

/// 换挡拨杆控制帧（拨杆 → 主机，含校验和与滚动计数器）
pub const LEVER_FRAME_ID: u32 = 0x197;

/// 挡位 LED 应答帧（主机 → 拨杆）
pub const LED_FRAME_ID: u32 = 0x3FD;

/// 拨杆心跳帧（拨杆 → 主机，周期性存活信号，无载荷语义）
pub const KEEPALIVE_FRAME_ID: u32 = 0x55E;

/// 总线标称比特率（bit/s）
///
/// 仅作文档用途：比特率由外部 `ip link` 配置，适配器不设置也不校验。
pub const BUS_BITRATE: u32 = 500_000;

/// 协议帧定长载荷字节数
pub const FRAME_PAYLOAD_LEN: usize = 8;
