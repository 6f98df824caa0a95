//! 控制层错误类型

use thiserror::Error;

/// 控制回路错误
#[derive(Error, Debug)]
pub enum ControlError {
    /// 输入/输出设备丢失（拔线、蓝牙断开、HID 读写失败）
    #[error("Device lost: {reason}")]
    DeviceLost { reason: String },

    /// 挡位请求通道已关闭（驱动已关停）
    #[error("Gear request channel closed")]
    ChannelClosed,

    /// 配置非法
    #[error("Invalid control config: {0}")]
    InvalidConfig(String),
}
