//! 手柄输入源
//!
//! 真实手柄的 HID 解码（hidraw / 蓝牙）由部署环境提供，接入方式
//! 是实现 `GamepadSource` 并替换这里的装配。二进制默认装配一个
//! 恒定中位的输入源，便于在没有手柄的台架上验证整条链路：
//! 挡位仍可由物理拨杆切换，仪表盘照常刷新。

use piracer_sdk::control::{ControlError, GamepadSample, GamepadSource};

/// 恒定中位的手柄源（摇杆回中、无按键按下）
#[derive(Debug, Default)]
pub struct NeutralGamepad;

impl GamepadSource for NeutralGamepad {
    fn poll(&mut self) -> Result<GamepadSample, ControlError> {
        Ok(GamepadSample::default())
    }
}
