//! 控制层模块
//!
//! 本模块提供 PiRacer 底盘的手柄控制功能，包括：
//! - 手柄输入源抽象（含脚本化测试输入源）
//! - 驱动输出端抽象（含空实现与记录实现）
//! - 固定节拍控制回路（轴混合、挡位门控、速度挡、失效安全）
//!
//! # 使用场景
//!
//! 适用于把手柄事件流转换为底盘输出的场合。底层总线驱动见
//! `piracer-driver`，统一入口见 `piracer-sdk`。

mod error;
pub mod gamepad;
pub mod output;
pub mod pilot;

pub use error::ControlError;
pub use gamepad::{GamepadSample, GamepadSource, ScriptedGamepad};
pub use output::{DriveCommand, DriveOutput, NullOutput, RecordingHandle, RecordingOutput};
pub use pilot::{ControlConfig, ControlStats, SPEED_LEVEL_STEP, control_loop};
