//! 换挡拨杆帧校验与解码
//!
//! ID `0x197`，8 字节载荷：
//!
//! | 字节 | 含义                                         |
//! |------|----------------------------------------------|
//! | 0    | 标志位：bit0 = 拨动方向（1=UP），bit1 = 驻车按钮 |
//! | 1    | 滚动计数器（低 4 位有效）                     |
//! | 2..6 | 保留，置零                                    |
//! | 7    | 尾部校验和（见 [`crate::checksum`]）           |
//!
//! 拨杆以固定周期重发当前状态：只有新的物理事件才会步进计数器，
//! 重发帧携带相同计数器，由状态机层按来源去重。校验失败的帧在
//! 本层静默丢弃，绝不向上传递陈旧的解码结果。

use crate::{PiracerFrame, ProtocolError, checksum, ids};

/// 标志位 bit0：拨动方向（置位 = UP）
const FLAG_DIRECTION_UP: u8 = 0x01;
/// 标志位 bit1：驻车按钮按下
const FLAG_PARK_BUTTON: u8 = 0x02;

/// 拨动方向
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ToggleDirection {
    Up,
    Down,
}

/// 一次拨杆事件
///
/// 瞬态值：被状态机消费一次后即丢弃，不存入任何容器。
/// `raw` 保留原始载荷，供诊断日志与离线解码工具使用。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ToggleEvent {
    /// 拨动方向
    pub direction: ToggleDirection,

    /// 驻车按钮是否按下（按下时方向位无语义）
    pub park_button: bool,

    /// 帧内滚动计数器（0..=15）
    pub counter: u8,

    /// 原始 8 字节载荷
    pub raw: [u8; 8],
}

/// 提取参与校验的内容字节（标志位 + 保留区，不含计数器与校验和本身）
fn checksum_content(data: &[u8; 8]) -> [u8; 6] {
    [data[0], data[2], data[3], data[4], data[5], data[6]]
}

/// 校验并解码拨杆帧
///
/// 先按载荷内嵌的计数器半字节重算校验和并与帧尾比对：不一致时
/// 返回 `ChecksumMismatch`，调用方丢弃该帧即可，不重试，下一个
/// 周期帧要么正确要么再次被验证。比对通过后按位提取方向与按钮。
pub fn verify_and_decode_lever_frame(frame: &PiracerFrame) -> Result<ToggleEvent, ProtocolError> {
    if frame.id != ids::LEVER_FRAME_ID {
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
    let actual = frame.data[7];
    if expected != actual {
        return Err(ProtocolError::ChecksumMismatch {
            id: frame.id,
            expected,
            actual,
        });
    }

    let flags = frame.data[0];
    Ok(ToggleEvent {
        direction: if flags & FLAG_DIRECTION_UP != 0 {
            ToggleDirection::Up
        } else {
            ToggleDirection::Down
        },
        park_button: flags & FLAG_PARK_BUTTON != 0,
        counter,
        raw: frame.data,
    })
}

/// 构建拨杆帧（测试与离线工具用，发送端签名的逆向参考实现）
pub fn encode_lever_frame(
    direction: ToggleDirection,
    park_button: bool,
    counter: u8,
) -> PiracerFrame {
    let mut data = [0u8; 8];
    if direction == ToggleDirection::Up {
        data[0] |= FLAG_DIRECTION_UP;
    }
    if park_button {
        data[0] |= FLAG_PARK_BUTTON;
    }
    data[1] = counter & 0x0F;
    data[7] = checksum::compute_checksum(
        ids::LEVER_FRAME_ID,
        &checksum_content(&data),
        counter & 0x0F,
    );
    PiracerFrame::new_standard(ids::LEVER_FRAME_ID as u16, &data)
}
