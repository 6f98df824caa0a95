//! 只读监控模式
//!
//! 只装配驱动线程组和仪表盘回路，不装配控制回路：不产生换挡
//! 请求，也没有驱动输出。协议要求的 LED 应答仍由驱动层发送，
//! 物理拨杆换挡在监控模式下照常生效并可见。

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::config::VehicleConfig;

/// 监控模式参数
#[derive(Args, Debug)]
pub struct MonitorArgs {
    /// CAN 接口名（覆盖配置文件中的 interface）
    #[arg(short, long)]
    pub interface: Option<String>,

    /// 刷新频率 Hz（覆盖配置文件中的 display_rate_hz）
    #[arg(short, long)]
    pub frequency: Option<f64>,

    /// TOML 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

impl MonitorArgs {
    /// 配置合成：文件（缺省则默认值）+ 命令行覆盖
    fn load_config(&self) -> Result<VehicleConfig> {
        let mut config = match &self.config {
            Some(path) => VehicleConfig::load(path)?,
            None => VehicleConfig::default(),
        };
        if let Some(interface) = &self.interface {
            config.interface = interface.clone();
        }
        if let Some(frequency) = self.frequency {
            config.display_rate_hz = frequency;
        }
        config.validate()?;
        Ok(config)
    }

    #[cfg(target_os = "linux")]
    pub fn execute(&self) -> Result<()> {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        use anyhow::Context;
        use piracer_sdk::can::SocketCanAdapter;
        use piracer_sdk::driver::{Piracer, dashboard_loop};

        use crate::terminal::TerminalSink;

        let config = self.load_config()?;

        let adapter = SocketCanAdapter::new(config.interface.as_str())
            .with_context(|| format!("打开 CAN 接口 {} 失败", config.interface))?;
        let mut piracer = Piracer::new(adapter, Some(config.piracer_config()));

        println!("👀 PiRacer 监控模式，接口 {}（Ctrl+C 退出）", config.interface);

        let app_running = Arc::new(AtomicBool::new(true));
        {
            let app_running = Arc::clone(&app_running);
            ctrlc::set_handler(move || {
                app_running.store(false, Ordering::Release);
            })
            .context("安装 Ctrl+C 处理器失败")?;
        }

        // 仪表盘直接跑在主线程，Ctrl+C 置位后自然返回
        dashboard_loop(
            TerminalSink,
            piracer.context(),
            config.dashboard_config(),
            Arc::clone(&app_running),
        );

        piracer.shutdown();

        let metrics = piracer.get_metrics();
        println!();
        println!(
            "✅ 已退出：有效帧 {}，校验和错误 {}，换挡 {} 次",
            metrics.rx_frames_valid, metrics.checksum_errors, metrics.gear_transitions
        );
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub fn execute(&self) -> Result<()> {
        self.load_config()?;
        anyhow::bail!("monitor 模式依赖 Linux SocketCAN，请在车载主机上运行")
    }
}
