//! 终端仪表盘后端
//!
//! 单行覆盖刷新（`\r` 回车不换行），适合 20Hz 级别的状态展示。

use std::io::Write;

use piracer_sdk::driver::{DashboardSink, DriverError, VehicleSnapshot};

/// 把快照格式化成单行状态文本
pub fn format_status(snapshot: &VehicleSnapshot) -> String {
    let link = if snapshot.connected { "LINK" } else { "----" };
    format!(
        "{:>6.2} km/h | 挡位 {:>2} | 速度挡 L{} | {}",
        snapshot.velocity.kmh(),
        // GearPosition 的 Display 不处理宽度参数，先转成 String 让 {:>2} 生效
        snapshot.gear.position.to_string(),
        snapshot.speed_level,
        link,
    )
}

/// 单行刷新的终端仪表盘
#[derive(Debug, Default)]
pub struct TerminalSink;

impl DashboardSink for TerminalSink {
    fn render(&mut self, snapshot: &VehicleSnapshot) -> Result<(), DriverError> {
        // 终端写失败（管道关闭等）不值得让仪表盘回路退出
        print!("\r{}", format_status(snapshot));
        let _ = std::io::stdout().flush();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use piracer_sdk::protocol::{GearPosition, VelocityReading};

    fn snapshot(kmh_centi: u16, gear: GearPosition, level: u8, connected: bool) -> VehicleSnapshot {
        VehicleSnapshot {
            velocity: VelocityReading {
                kmh_centi,
                timestamp_us: 0,
            },
            gear: piracer_sdk::driver::GearSnapshot {
                position: gear,
                ..Default::default()
            },
            speed_level: level,
            connected,
        }
    }

    #[test]
    fn test_format_status_contents() {
        let line = format_status(&snapshot(1234, GearPosition::Drive, 2, true));
        assert!(line.contains("12.34 km/h"), "line: {line}");
        assert!(line.contains("挡位  D"), "line: {line}");
        assert!(line.contains("L2"), "line: {line}");
        assert!(line.contains("LINK"), "line: {line}");
    }

    #[test]
    fn test_format_status_disconnected_marker() {
        let line = format_status(&snapshot(0, GearPosition::Unknown, 1, false));
        assert!(line.contains("0.00 km/h"), "line: {line}");
        assert!(line.contains("--"), "line: {line}");
        assert!(line.ends_with("----"), "line: {line}");
    }

    #[test]
    fn test_format_status_manual_gear() {
        let line = format_status(&snapshot(500, GearPosition::Manual(3), 4, true));
        assert!(line.contains("M3"), "line: {line}");
        assert!(line.contains("L4"), "line: {line}");
    }
}
