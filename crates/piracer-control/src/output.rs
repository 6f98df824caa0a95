//! 驱动输出端抽象
//!
//! 控制回路每个周期产出一条 [`DriveCommand`]，由 [`DriveOutput`]
//! 落到实际执行器（PWM 桥、仿真器）或测试记录器。

use crossbeam_channel::{Receiver, Sender, unbounded};

use crate::error::ControlError;
use piracer_protocol::GearPosition;

/// 一个控制周期的最终输出
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriveCommand {
    /// 节流 [-1, 1]，正值前进（已按挡位门控并按速度挡缩放）
    pub throttle: f64,

    /// 转向 [-1, 1]，正值右转
    pub steering: f64,

    /// 计算本条命令时的挡位（执行端可据此做自己的保护）
    pub gear: GearPosition,
}

impl DriveCommand {
    /// 全零安全输出（设备丢失时使用）
    pub fn safe_stop(gear: GearPosition) -> Self {
        Self {
            throttle: 0.0,
            steering: 0.0,
            gear,
        }
    }
}

/// 驱动输出端
pub trait DriveOutput {
    /// 施加一条命令
    fn apply(&mut self, command: &DriveCommand) -> Result<(), ControlError>;
}

/// 丢弃一切输出的空实现（monitor 只读模式）
#[derive(Debug, Default)]
pub struct NullOutput;

impl DriveOutput for NullOutput {
    fn apply(&mut self, _command: &DriveCommand) -> Result<(), ControlError> {
        Ok(())
    }
}

/// 记录每条命令的测试输出端
///
/// 输出端本体移入控制回路后，测试侧继续用 [`RecordingHandle`]
/// 取回命令序列。
#[derive(Debug)]
pub struct RecordingOutput {
    sink: Sender<DriveCommand>,
    taken: Receiver<DriveCommand>,
}

impl Default for RecordingOutput {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingOutput {
    pub fn new() -> Self {
        let (sink, taken) = unbounded();
        Self { sink, taken }
    }

    /// 获取取回句柄（可多次调用，句柄可跨线程）
    pub fn handle(&self) -> RecordingHandle {
        RecordingHandle {
            taken: self.taken.clone(),
        }
    }
}

impl DriveOutput for RecordingOutput {
    fn apply(&mut self, command: &DriveCommand) -> Result<(), ControlError> {
        // 接收端由本体与句柄共同持有，发送不会落空
        let _ = self.sink.send(*command);
        Ok(())
    }
}

/// 命令记录的取回句柄
#[derive(Debug, Clone)]
pub struct RecordingHandle {
    taken: Receiver<DriveCommand>,
}

impl RecordingHandle {
    /// 取走到目前为止记录的全部命令
    pub fn take_commands(&self) -> Vec<DriveCommand> {
        self.taken.try_iter().collect()
    }

    /// 已记录命令数（不消费记录队列）
    pub fn command_count(&self) -> usize {
        self.taken.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_output_accepts_everything() {
        let mut out = NullOutput;
        let cmd = DriveCommand {
            throttle: 1.0,
            steering: -1.0,
            gear: GearPosition::Drive,
        };
        assert!(out.apply(&cmd).is_ok());
    }

    #[test]
    fn test_recording_output_preserves_order() {
        let mut out = RecordingOutput::new();
        let handle = out.handle();

        for i in 0..3 {
            out.apply(&DriveCommand {
                throttle: f64::from(i) * 0.1,
                steering: 0.0,
                gear: GearPosition::Drive,
            })
            .unwrap();
        }

        let commands = handle.take_commands();
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[2].throttle, 0.2);
        // 取走后记录清空
        assert!(handle.take_commands().is_empty());
    }

    #[test]
    fn test_safe_stop_is_all_zero() {
        let cmd = DriveCommand::safe_stop(GearPosition::Reverse);
        assert_eq!(cmd.throttle, 0.0);
        assert_eq!(cmd.steering, 0.0);
        assert_eq!(cmd.gear, GearPosition::Reverse);
    }
}
