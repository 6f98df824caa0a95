//! 离线帧解码
//!
//! 台架调试工具：把 candump 抄下来的一帧（ID + 十六进制载荷）按
//! 协议解码成人类可读的描述，不需要任何硬件。校验和不匹配是
//! 这个工具最常回答的问题，所以它作为解码结果输出而不是报错。

use anyhow::{Context, Result, bail};
use clap::Args;

use piracer_sdk::protocol::{
    PiracerFrame, ProtocolError, decode_led_frame, decode_velocity, ids,
    verify_and_decode_lever_frame,
};

/// 解码参数
#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// CAN ID（`0x` 前缀十六进制或十进制）
    #[arg(long)]
    pub id: String,

    /// 8 字节载荷（十六进制串，如 04D2000000000000）
    #[arg(long)]
    pub data: String,
}

impl DecodeArgs {
    pub fn execute(&self) -> Result<()> {
        let id = parse_can_id(&self.id)?;
        let payload = hex::decode(self.data.trim()).context("载荷不是合法的十六进制串")?;
        println!("{}", describe_frame(id, &payload)?);
        Ok(())
    }
}

/// 解析 CAN ID 文本（`0x` 前缀十六进制或十进制）
pub(crate) fn parse_can_id(text: &str) -> Result<u32> {
    let text = text.trim();
    if let Some(digits) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        u32::from_str_radix(digits, 16).with_context(|| format!("非法十六进制 CAN ID: {text}"))
    } else {
        text.parse()
            .with_context(|| format!("非法 CAN ID: {text}"))
    }
}

/// 按 ID 分发解码并生成单行描述
pub(crate) fn describe_frame(id: u32, payload: &[u8]) -> Result<String> {
    if payload.len() != ids::FRAME_PAYLOAD_LEN {
        bail!(
            "载荷必须为 {} 字节，实际 {} 字节",
            ids::FRAME_PAYLOAD_LEN,
            payload.len()
        );
    }
    let frame = if id <= 0x7FF {
        PiracerFrame::new_standard(id as u16, payload)
    } else {
        PiracerFrame::new_extended(id, payload)
    };

    let description = match id {
        ids::VELOCITY_FRAME_ID => {
            let reading = decode_velocity(&frame)?;
            format!("速度遥测: {:.2} km/h（{} centi）", reading.kmh(), reading.kmh_centi)
        }
        ids::LEVER_FRAME_ID => match verify_and_decode_lever_frame(&frame) {
            Ok(event) if event.park_button => {
                format!("拨杆事件: 驻车键按下，计数器 {}", event.counter)
            }
            Ok(event) => {
                format!("拨杆事件: 方向 {:?}，计数器 {}", event.direction, event.counter)
            }
            Err(e @ ProtocolError::ChecksumMismatch { .. }) => {
                format!("拨杆帧校验失败: {e}")
            }
            Err(e) => return Err(e.into()),
        },
        ids::LED_FRAME_ID => {
            let (code, counter) = decode_led_frame(&frame)?;
            format!("LED 应答: {:?}（0x{:02X}），计数器 {}", code, code as u8, counter)
        }
        ids::KEEPALIVE_FRAME_ID => "拨杆心跳帧（载荷无语义）".to_string(),
        other => format!(
            "未知 ID 0x{:03X}，载荷 {}",
            other,
            hex::encode_upper(payload)
        ),
    };
    Ok(description)
}
