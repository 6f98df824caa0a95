//! 车辆配置文件
//!
//! 所有字段都可省略，缺省值与各层默认一致。完整示例：
//!
//! ```toml
//! interface = "can0"
//! debounce_us = 700
//! pulses_per_revolution = 40
//! wheel_diameter_mm = 64.0
//! recompute_interval_ms = 1000
//! control_rate_hz = 20.0
//! display_rate_hz = 20.0
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use piracer_sdk::control::ControlConfig;
use piracer_sdk::driver::{DashboardConfig, EstimatorConfig, PiracerConfig};

/// 车辆配置
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VehicleConfig {
    /// CAN 接口名
    pub interface: String,

    /// 霍尔边沿去抖窗口（微秒）
    pub debounce_us: u64,

    /// 每转脉冲数
    pub pulses_per_revolution: u32,

    /// 轮径（毫米）
    pub wheel_diameter_mm: f64,

    /// 速度重算周期（毫秒）
    pub recompute_interval_ms: u64,

    /// 控制回路频率（Hz）
    pub control_rate_hz: f64,

    /// 仪表盘刷新频率（Hz）
    pub display_rate_hz: f64,
}

impl Default for VehicleConfig {
    fn default() -> Self {
        let estimator = EstimatorConfig::default();
        Self {
            interface: "can0".to_string(),
            debounce_us: estimator.debounce.as_micros() as u64,
            pulses_per_revolution: estimator.pulses_per_revolution,
            wheel_diameter_mm: estimator.wheel_diameter_mm,
            recompute_interval_ms: estimator.recompute_interval.as_millis() as u64,
            control_rate_hz: 20.0,
            display_rate_hz: 20.0,
        }
    }
}

impl VehicleConfig {
    /// 从 TOML 文件加载并校验
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("读取配置文件失败: {}", path.display()))?;
        let config: Self = toml::from_str(&text)
            .with_context(|| format!("解析配置文件失败: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// 取值范围校验
    ///
    /// 频率与物理参数必须为正，零频率会让节拍器除零。
    pub fn validate(&self) -> Result<()> {
        if self.interface.is_empty() {
            bail!("interface 不能为空");
        }
        if self.pulses_per_revolution == 0 {
            bail!("pulses_per_revolution 必须大于 0");
        }
        if self.wheel_diameter_mm <= 0.0 {
            bail!("wheel_diameter_mm 必须大于 0，当前 {}", self.wheel_diameter_mm);
        }
        if self.recompute_interval_ms == 0 {
            bail!("recompute_interval_ms 必须大于 0");
        }
        if self.control_rate_hz <= 0.0 {
            bail!("control_rate_hz 必须大于 0，当前 {}", self.control_rate_hz);
        }
        if self.display_rate_hz <= 0.0 {
            bail!("display_rate_hz 必须大于 0，当前 {}", self.display_rate_hz);
        }
        Ok(())
    }

    /// 驱动线程组配置
    pub fn piracer_config(&self) -> PiracerConfig {
        PiracerConfig {
            estimator: EstimatorConfig {
                pulses_per_revolution: self.pulses_per_revolution,
                wheel_diameter_mm: self.wheel_diameter_mm,
                debounce: Duration::from_micros(self.debounce_us),
                recompute_interval: Duration::from_millis(self.recompute_interval_ms),
            },
            ..PiracerConfig::default()
        }
    }

    /// 控制回路配置
    pub fn control_config(&self) -> ControlConfig {
        ControlConfig {
            frequency_hz: self.control_rate_hz,
            max_iterations: None,
        }
    }

    /// 仪表盘配置
    pub fn dashboard_config(&self) -> DashboardConfig {
        DashboardConfig {
            refresh_interval: Duration::from_secs_f64(1.0 / self.display_rate_hz),
        }
    }
}
