//! 挡位 LED 应答帧构建
//!
//! ID `0x3FD`，主机 → 拨杆方向，用于点亮拨杆上的挡位指示灯：
//!
//! | 字节 | 含义                       |
//! |------|----------------------------|
//! | 0    | LED 码（见 [`LedCode`]）   |
//! | 1    | 滚动计数器（低 4 位有效）  |
//! | 2..6 | 保留，置零                 |
//! | 7    | 尾部校验和                 |
//!
//! 发送端在每次挡位变更后立即发送一帧，并以 10Hz 周期性刷新，
//! 防止拨杆侧指示灯因超时熄灭。

use crate::{GearPosition, PiracerFrame, ProtocolError, checksum, ids};

/// 挡位指示 LED 码
///
/// 全部手动挡共用 `Manual` 码；`GearPosition::Unknown` 没有对应
/// 的 LED 码（不发送应答帧）。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum LedCode {
    Park = 0x20,
    Reverse = 0x40,
    Neutral = 0x60,
    Drive = 0x80,
    Manual = 0x81,
}

impl LedCode {
    /// 由挡位查 LED 码；`Unknown` 无码返回 `None`
    pub fn for_position(position: GearPosition) -> Option<Self> {
        match position {
            GearPosition::Park => Some(LedCode::Park),
            GearPosition::Reverse => Some(LedCode::Reverse),
            GearPosition::Neutral => Some(LedCode::Neutral),
            GearPosition::Drive => Some(LedCode::Drive),
            GearPosition::Manual(_) => Some(LedCode::Manual),
            GearPosition::Unknown => None,
        }
    }
}

impl TryFrom<u8> for LedCode {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x20 => Ok(LedCode::Park),
            0x40 => Ok(LedCode::Reverse),
            0x60 => Ok(LedCode::Neutral),
            0x80 => Ok(LedCode::Drive),
            0x81 => Ok(LedCode::Manual),
            _ => Err(ProtocolError::InvalidValue {
                field: "led_code".to_string(),
                value,
            }),
        }
    }
}

/// 提取参与校验的内容字节
fn checksum_content(data: &[u8; 8]) -> [u8; 6] {
    [data[0], data[2], data[3], data[4], data[5], data[6]]
}

/// 构建挡位 LED 应答帧
///
/// `Unknown` 挡位没有 LED 码，返回 `InvalidValue`；调用方应跳过
/// 本次发送而不是视为故障。
pub fn encode_led_frame(position: GearPosition, counter: u8) -> Result<PiracerFrame, ProtocolError> {
    let code = LedCode::for_position(position).ok_or_else(|| ProtocolError::InvalidValue {
        field: "led_code".to_string(),
        value: 0xFF,
    })?;

    let mut data = [0u8; 8];
    data[0] = code as u8;
    data[1] = counter & 0x0F;
    data[7] =
        checksum::compute_checksum(ids::LED_FRAME_ID, &checksum_content(&data), counter & 0x0F);
    Ok(PiracerFrame::new_standard(ids::LED_FRAME_ID as u16, &data))
}

/// 校验并解码 LED 应答帧（离线工具与回环测试用）
pub fn decode_led_frame(frame: &PiracerFrame) -> Result<(LedCode, u8), ProtocolError> {
    if frame.id != ids::LED_FRAME_ID {
        return Err(ProtocolError::UnexpectedId { id: frame.id });
    }
    if frame.len as usize != ids::FRAME_PAYLOAD_LEN {
        return Err(ProtocolError::MalformedFrame {
            expected: ids::FRAME_PAYLOAD_LEN,
            actual: frame.len as usize,
        });
    }

    let counter = frame.data[1] & 0x0F;
    let expected = checksum::compute_checksum(frame.id, &checksum_content(&frame.data), counter);
    if expected != frame.data[7] {
        return Err(ProtocolError::ChecksumMismatch {
            id: frame.id,
            expected,
            actual: frame.data[7],
        });
    }

    Ok((LedCode::try_from(frame.data[0])?, counter))
}
