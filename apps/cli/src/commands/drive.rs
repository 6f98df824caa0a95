//! 驾驶模式
//!
//! 完整装配：SocketCAN 适配器 → 驱动线程组（IO + 估计），外加两个
//! 应用回路。控制回路（手柄 → 换挡请求/驱动输出）跑在主线程，
//! 仪表盘回路跑在独立线程。Ctrl+C 通过共享运行标志协作关停全部回路。

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::config::VehicleConfig;

/// 驾驶模式参数
#[derive(Args, Debug)]
pub struct DriveArgs {
    /// CAN 接口名（覆盖配置文件中的 interface）
    #[arg(short, long)]
    pub interface: Option<String>,

    /// TOML 配置文件路径
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// 把控制命令落到 trace 日志的驱动输出端
///
/// 真实的 PWM/电调桥接由部署方实现 `DriveOutput` 注入；默认装配
/// 只记录日志，在没接功率级的台架上也能安全跑完整条链路。
#[cfg(target_os = "linux")]
struct TracingOutput;

#[cfg(target_os = "linux")]
impl piracer_sdk::control::DriveOutput for TracingOutput {
    fn apply(
        &mut self,
        command: &piracer_sdk::control::DriveCommand,
    ) -> Result<(), piracer_sdk::control::ControlError> {
        tracing::trace!(
            throttle = command.throttle,
            steering = command.steering,
            gear = %command.gear,
            "Drive command"
        );
        Ok(())
    }
}

impl DriveArgs {
    /// 配置合成：文件（缺省则默认值）+ 命令行覆盖
    fn load_config(&self) -> Result<VehicleConfig> {
        let mut config = match &self.config {
            Some(path) => VehicleConfig::load(path)?,
            None => VehicleConfig::default(),
        };
        if let Some(interface) = &self.interface {
            config.interface = interface.clone();
        }
        config.validate()?;
        Ok(config)
    }

    #[cfg(target_os = "linux")]
    pub fn execute(&self) -> Result<()> {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::thread;
        use std::time::Duration;

        use anyhow::Context;
        use piracer_sdk::can::SocketCanAdapter;
        use piracer_sdk::control::control_loop;
        use piracer_sdk::driver::{Piracer, dashboard_loop};

        use crate::input::NeutralGamepad;
        use crate::terminal::TerminalSink;

        let config = self.load_config()?;

        let adapter = SocketCanAdapter::new(config.interface.as_str())
            .with_context(|| format!("打开 CAN 接口 {} 失败", config.interface))?;
        let mut piracer = Piracer::new(adapter, Some(config.piracer_config()));

        println!("🚗 PiRacer 驾驶模式，接口 {}（Ctrl+C 退出）", config.interface);

        if piracer.wait_for_feedback(Duration::from_secs(2)).is_err() {
            tracing::warn!("No bus feedback within 2s, continuing to listen");
        }

        let app_running = Arc::new(AtomicBool::new(true));
        {
            let app_running = Arc::clone(&app_running);
            ctrlc::set_handler(move || {
                // Release: 各回路观察到 false 时能看到此前的全部写入
                app_running.store(false, Ordering::Release);
            })
            .context("安装 Ctrl+C 处理器失败")?;
        }

        let dashboard_thread = {
            let ctx = piracer.context();
            let running = Arc::clone(&app_running);
            let dashboard_config = config.dashboard_config();
            thread::spawn(move || dashboard_loop(TerminalSink, ctx, dashboard_config, running))
        };

        let result = control_loop(
            NeutralGamepad,
            TracingOutput,
            piracer.context(),
            piracer.gear_requester(),
            config.control_config(),
            Arc::clone(&app_running),
        );

        // 控制回路退出后（Ctrl+C 或错误）统一停掉仪表盘，再关驱动
        app_running.store(false, Ordering::Release);
        if dashboard_thread.join().is_err() {
            tracing::error!("Dashboard thread panicked");
        }
        piracer.shutdown();

        let stats = result?;
        println!();
        println!(
            "✅ 已退出：{} 个控制周期，{} 次换挡请求，{} 段设备丢失",
            stats.iterations, stats.gear_requests, stats.device_outages
        );
        Ok(())
    }

    #[cfg(not(target_os = "linux"))]
    pub fn execute(&self) -> Result<()> {
        // 配置解析在任何平台都可用，便于在开发机上检查 TOML
        self.load_config()?;
        anyhow::bail!("drive 模式依赖 Linux SocketCAN，请在车载主机上运行")
    }
}
