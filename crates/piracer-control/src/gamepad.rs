//! 手柄输入源抽象
//!
//! 控制回路通过 [`GamepadSource`] 拉取输入，不关心底层是 hidraw、
//! 蓝牙还是测试脚本。轴值约定由外层 HID 驱动归一化到 [-1, 1]：
//! 本层只做钳位与混合，不做标定。

use std::collections::VecDeque;

use crate::error::ControlError;

/// 一次手柄采样
///
/// 布尔字段是电平（当前是否按下），上升沿检测在控制回路内完成。
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GamepadSample {
    /// 左摇杆 X 轴（转向），[-1, 1]
    pub steering_axis: f64,

    /// 右摇杆 Y 轴（节流），[-1, 1]，正值前推
    pub throttle_axis: f64,

    /// A 键（请求空挡）
    pub btn_a: bool,

    /// B 键（请求前进挡）
    pub btn_b: bool,

    /// X 键（请求倒挡）
    pub btn_x: bool,

    /// Y 键（请求驻车）
    pub btn_y: bool,

    /// L2 扳机（速度挡降一级）
    pub l2: bool,

    /// R2 扳机（速度挡升一级）
    pub r2: bool,
}

/// 手柄输入源
///
/// `poll` 是非阻塞采样：设备不可用时返回
/// [`ControlError::DeviceLost`]，控制回路据此进入失效安全输出。
pub trait GamepadSource {
    /// 拉取当前手柄状态
    fn poll(&mut self) -> Result<GamepadSample, ControlError>;
}

/// 按脚本回放采样序列的测试输入源
///
/// 每次 `poll` 消费一个脚本步；脚本耗尽后持续返回最后一个成功
/// 采样（等价于摇杆保持不动）。`Err` 步模拟设备丢失。
///
/// # Example
///
/// ```
/// use piracer_control::{GamepadSample, GamepadSource, ScriptedGamepad};
///
/// let mut pad = ScriptedGamepad::new()
///     .then(GamepadSample { throttle_axis: 0.5, ..Default::default() })
///     .then_loss("unplugged")
///     .then(GamepadSample::default());
///
/// assert!(pad.poll().is_ok());
/// assert!(pad.poll().is_err());
/// assert!(pad.poll().is_ok());
/// ```
#[derive(Debug, Default)]
pub struct ScriptedGamepad {
    steps: VecDeque<Result<GamepadSample, String>>,
    hold: GamepadSample,
}

impl ScriptedGamepad {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个正常采样步
    pub fn then(mut self, sample: GamepadSample) -> Self {
        self.steps.push_back(Ok(sample));
        self
    }

    /// 连续追加 `count` 个相同采样步
    pub fn then_repeated(mut self, sample: GamepadSample, count: usize) -> Self {
        for _ in 0..count {
            self.steps.push_back(Ok(sample));
        }
        self
    }

    /// 追加一个设备丢失步
    pub fn then_loss(mut self, reason: &str) -> Self {
        self.steps.push_back(Err(reason.to_string()));
        self
    }

    /// 剩余未消费的脚本步数
    pub fn remaining(&self) -> usize {
        self.steps.len()
    }
}

impl GamepadSource for ScriptedGamepad {
    fn poll(&mut self) -> Result<GamepadSample, ControlError> {
        match self.steps.pop_front() {
            Some(Ok(sample)) => {
                self.hold = sample;
                Ok(sample)
            },
            Some(Err(reason)) => Err(ControlError::DeviceLost { reason }),
            None => Ok(self.hold),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_replays_in_order() {
        let mut pad = ScriptedGamepad::new()
            .then(GamepadSample {
                steering_axis: 0.1,
                ..Default::default()
            })
            .then(GamepadSample {
                steering_axis: 0.2,
                ..Default::default()
            });

        assert_eq!(pad.poll().unwrap().steering_axis, 0.1);
        assert_eq!(pad.poll().unwrap().steering_axis, 0.2);
    }

    #[test]
    fn test_scripted_holds_last_sample_when_exhausted() {
        let mut pad = ScriptedGamepad::new().then(GamepadSample {
            throttle_axis: 0.7,
            ..Default::default()
        });

        pad.poll().unwrap();
        assert_eq!(pad.remaining(), 0);
        // 脚本耗尽后相当于摇杆保持原位
        assert_eq!(pad.poll().unwrap().throttle_axis, 0.7);
        assert_eq!(pad.poll().unwrap().throttle_axis, 0.7);
    }

    #[test]
    fn test_scripted_loss_and_recovery() {
        let mut pad = ScriptedGamepad::new()
            .then_loss("bluetooth out of range")
            .then(GamepadSample::default());

        match pad.poll() {
            Err(ControlError::DeviceLost { reason }) => {
                assert_eq!(reason, "bluetooth out of range");
            },
            other => panic!("expected DeviceLost, got {:?}", other.map(|_| ())),
        }
        assert!(pad.poll().is_ok());
    }

    #[test]
    fn test_empty_script_returns_neutral_sample() {
        let mut pad = ScriptedGamepad::new();
        let sample = pad.poll().unwrap();
        assert_eq!(sample, GamepadSample::default());
        assert!(!sample.btn_a && !sample.r2);
    }
}
