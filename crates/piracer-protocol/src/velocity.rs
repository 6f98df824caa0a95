//! 速度遥测帧编解码
//!
//! ID `0x100`，8 字节载荷：byte0..2 为大端 u16，单位 km/h × 100，
//! 其余字节保留置零。发送端 ~5Hz 周期广播。

use crate::{PiracerFrame, ProtocolError, bytes_to_u16_be, ids, u16_to_bytes_be};

/// 可表示的速度上限（u16 定点，km/h）
pub const MAX_VELOCITY_KMH: f64 = 655.35;

/// 一次速度观测
///
/// 定点存储（km/h × 100），创建后不可变；新的观测整体替换旧值，
/// 绝不原地修改。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct VelocityReading {
    /// 速度，单位 0.01 km/h
    pub kmh_centi: u16,

    /// 观测时间戳（微秒，单调时钟）
    pub timestamp_us: u64,
}

impl VelocityReading {
    /// 由浮点 km/h 构造：截断到 [0, 655.35]，再就近取整到 0.01
    pub fn from_kmh(kmh: f64, timestamp_us: u64) -> Self {
        let clamped = kmh.clamp(0.0, MAX_VELOCITY_KMH);
        Self {
            kmh_centi: (clamped * 100.0).round() as u16,
            timestamp_us,
        }
    }

    /// 速度值（km/h）
    pub fn kmh(&self) -> f64 {
        self.kmh_centi as f64 / 100.0
    }

    /// 是否为静止观测
    pub fn is_standstill(&self) -> bool {
        self.kmh_centi == 0
    }
}

/// 解码速度遥测帧
///
/// 载荷长度必须为 8（`MalformedFrame`），ID 必须为 0x100
/// （`UnexpectedId`）。时间戳沿用帧的接收时间戳。
pub fn decode_velocity(frame: &PiracerFrame) -> Result<VelocityReading, ProtocolError> {
    if frame.id != ids::VELOCITY_FRAME_ID {
        return Err(ProtocolError::UnexpectedId { id: frame.id });
    }
    if frame.len as usize != ids::FRAME_PAYLOAD_LEN {
        return Err(ProtocolError::MalformedFrame {
            expected: ids::FRAME_PAYLOAD_LEN,
            actual: frame.len as usize,
        });
    }

    Ok(VelocityReading {
        kmh_centi: bytes_to_u16_be([frame.data[0], frame.data[1]]),
        timestamp_us: frame.timestamp_us,
    })
}

/// 编码速度遥测帧
///
/// `decode_velocity` 的逆操作；保留字节写零。
pub fn encode_velocity(reading: &VelocityReading) -> PiracerFrame {
    let mut payload = [0u8; 8];
    payload[..2].copy_from_slice(&u16_to_bytes_be(reading.kmh_centi));
    PiracerFrame::new_standard(ids::VELOCITY_FRAME_ID as u16, &payload)
        .with_timestamp(reading.timestamp_us)
}
