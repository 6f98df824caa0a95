//! 手柄控制回路
//!
//! 固定节拍把手柄采样混合成驱动输出：
//! - 转向：左摇杆 X 轴钳位后直通
//! - 节流：右摇杆 Y 轴钳位 → 按挡位门控 → 按速度挡缩放 → 再钳位
//! - R2/L2 上升沿调整速度挡（1..=4），B/A/X/Y 上升沿发出绝对挡位请求
//! - 手柄丢失期间每个周期输出全零，恢复后首帧只作按键基线
//!
//! 节流门控规则：前进挡/手动挡只放行正值，倒挡只放行负值，
//! 驻车/空挡/未知一律置零。转向不受挡位门控。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use spin_sleep::SpinSleeper;
use tracing::{debug, error, info, warn};

use piracer_driver::{
    DriverError, GearRequester, PiracerContext, SPEED_LEVEL_MAX, SPEED_LEVEL_MIN,
};
use piracer_protocol::GearPosition;

use crate::error::ControlError;
use crate::gamepad::{GamepadSample, GamepadSource};
use crate::output::{DriveCommand, DriveOutput};

/// 每级速度挡对应的节流系数
pub const SPEED_LEVEL_STEP: f64 = 0.25;

/// 连续输出失败容忍次数，超过即终止回路
const MAX_CONSECUTIVE_OUTPUT_FAILURES: u32 = 3;

/// 控制回路配置
#[derive(Debug, Clone)]
pub struct ControlConfig {
    /// 控制频率（Hz）
    pub frequency_hz: f64,

    /// 最大迭代次数（None 表示无限循环，测试用）
    pub max_iterations: Option<usize>,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 20.0,
            max_iterations: None,
        }
    }
}

/// 控制回路运行统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ControlStats {
    /// 执行的周期数
    pub iterations: u64,

    /// 手柄采样失败的周期数
    pub device_loss_ticks: u64,

    /// 设备丢失段数（一段连续失败记一次）
    pub device_outages: u64,

    /// 发出的绝对挡位请求数
    pub gear_requests: u64,

    /// 速度挡实际变化次数
    pub level_shifts: u64,

    /// 输出端失败次数（含被容忍的瞬时失败）
    pub output_errors: u64,
}

/// 轴混合：钳位 → 挡位门控 → 速度挡缩放 → 再钳位
fn mix_axes(sample: &GamepadSample, gear: GearPosition, speed_level: u8) -> (f64, f64) {
    let steering = sample.steering_axis.clamp(-1.0, 1.0);
    let throttle = sample.throttle_axis.clamp(-1.0, 1.0);

    let gated = match gear {
        GearPosition::Drive | GearPosition::Manual(_) => throttle.max(0.0),
        GearPosition::Reverse => throttle.min(0.0),
        GearPosition::Park | GearPosition::Neutral | GearPosition::Unknown => 0.0,
    };

    let scaled = gated * (f64::from(speed_level) * SPEED_LEVEL_STEP);
    (scaled.clamp(-1.0, 1.0), steering)
}

/// 带容忍的输出施加：瞬时失败跳过本帧，连续失败终止
fn apply_with_tolerance(
    output: &mut impl DriveOutput,
    command: &DriveCommand,
    consecutive_failures: &mut u32,
    stats: &mut ControlStats,
) -> Result<(), ControlError> {
    match output.apply(command) {
        Ok(()) => {
            *consecutive_failures = 0;
            Ok(())
        },
        Err(e) => {
            *consecutive_failures += 1;
            stats.output_errors += 1;
            if *consecutive_failures > MAX_CONSECUTIVE_OUTPUT_FAILURES {
                error!(
                    "Consecutive output failures ({}): {}. Stopping control loop.",
                    *consecutive_failures, e
                );
                Err(e)
            } else {
                warn!(
                    "Transient output failure ({}): {}, skipping frame",
                    *consecutive_failures, e
                );
                Ok(())
            }
        },
    }
}

/// 运行手柄控制回路
///
/// 阻塞直到 `is_running` 置 false、达到 `max_iterations`，或发生
/// 不可恢复错误（驱动关停、输出端连续失败）。
///
/// # 参数
///
/// - `gamepad`: 手柄输入源
/// - `output`: 驱动输出端
/// - `ctx`: 驱动共享状态（读挡位、读写速度挡）
/// - `requester`: 绝对挡位请求注入端
///
/// # 返回
///
/// - `Ok(ControlStats)`: 正常结束
/// - `Err(ControlError)`: 配置非法、驱动已关停或输出端持续失败
pub fn control_loop(
    mut gamepad: impl GamepadSource,
    mut output: impl DriveOutput,
    ctx: PiracerContext,
    requester: GearRequester,
    config: ControlConfig,
    is_running: Arc<AtomicBool>,
) -> Result<ControlStats, ControlError> {
    if config.frequency_hz <= 0.0 {
        return Err(ControlError::InvalidConfig(format!(
            "frequency_hz must be > 0, got {}",
            config.frequency_hz
        )));
    }
    if config.frequency_hz > 1000.0 {
        warn!(
            "Very high control frequency: {} Hz. This may cause performance issues.",
            config.frequency_hz
        );
    }

    let period = Duration::from_secs_f64(1.0 / config.frequency_hz);
    let sleeper = SpinSleeper::default();

    let mut stats = ControlStats::default();
    let mut prev = GamepadSample::default();
    let mut device_lost = false;
    let mut output_failures: u32 = 0;

    // Acquire: 观察到 false 时能看到关停方此前的全部写入
    while is_running.load(Ordering::Acquire) {
        if let Some(max) = config.max_iterations
            && stats.iterations >= max as u64
        {
            break;
        }
        stats.iterations += 1;

        let gear = ctx.gear.load().position;

        let sample = match gamepad.poll() {
            Ok(sample) => {
                if device_lost {
                    info!("Gamepad recovered");
                    device_lost = false;
                    // 恢复后的首帧只作基线：丢失期间被按住的键不算上升沿
                    prev = sample;
                }
                sample
            },
            Err(e) => {
                if !device_lost {
                    warn!("Gamepad lost, failing safe: {}", e);
                    device_lost = true;
                    stats.device_outages += 1;
                }
                stats.device_loss_ticks += 1;
                apply_with_tolerance(
                    &mut output,
                    &DriveCommand::safe_stop(gear),
                    &mut output_failures,
                    &mut stats,
                )?;
                sleeper.sleep(period);
                continue;
            },
        };

        // R2/L2 上升沿：速度挡升降（边界处幂等）
        if sample.r2 && !prev.r2 {
            let level = ctx.speed_level();
            if level < SPEED_LEVEL_MAX {
                ctx.set_speed_level(level + 1);
                stats.level_shifts += 1;
                debug!(level = level + 1, "Speed level up");
            }
        }
        if sample.l2 && !prev.l2 {
            let level = ctx.speed_level();
            if level > SPEED_LEVEL_MIN {
                ctx.set_speed_level(level - 1);
                stats.level_shifts += 1;
                debug!(level = level - 1, "Speed level down");
            }
        }

        // B/A/X/Y 上升沿：绝对挡位请求
        let request_targets = [
            (sample.btn_b && !prev.btn_b, GearPosition::Drive),
            (sample.btn_a && !prev.btn_a, GearPosition::Neutral),
            (sample.btn_x && !prev.btn_x, GearPosition::Reverse),
            (sample.btn_y && !prev.btn_y, GearPosition::Park),
        ];
        for (rising, target) in request_targets {
            if !rising {
                continue;
            }
            match requester.request(target) {
                Ok(()) => {
                    stats.gear_requests += 1;
                    debug!(gear = %target, "Absolute gear request");
                },
                Err(DriverError::ChannelFull) => {
                    warn!("Gear request queue full, dropping request for {}", target);
                },
                Err(_) => return Err(ControlError::ChannelClosed),
            }
        }

        let speed_level = ctx.speed_level();
        let (throttle, steering) = mix_axes(&sample, gear, speed_level);
        apply_with_tolerance(
            &mut output,
            &DriveCommand {
                throttle,
                steering,
                gear,
            },
            &mut output_failures,
            &mut stats,
        )?;

        prev = sample;
        sleeper.sleep(period);
    }

    Ok(stats)
}
