//! # PiRacer CLI
//!
//! PiRacer 底盘的命令行工具：实车驾驶、只读监控、离线帧解码。
//!
//! ```bash
//! # 驾驶模式（控制回路 + 终端仪表盘）
//! piracer-cli drive --interface can0
//!
//! # 只读监控车辆状态
//! piracer-cli monitor --interface can0 --frequency 10
//!
//! # 台架调试：离线解码一帧总线数据
//! piracer-cli decode --id 0x100 --data 04D2000000000000
//! ```
//!
//! 日志级别通过 `RUST_LOG` 控制，默认 `piracer_cli=info`。

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod config;
mod input;
mod terminal;

use commands::{DecodeArgs, DriveArgs, MonitorArgs};

/// PiRacer CLI：车载总线命令行工具
#[derive(Parser, Debug)]
#[command(name = "piracer-cli")]
#[command(about = "Command-line interface for the PiRacer vehicle bus", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 驾驶模式（手柄控制回路 + 终端仪表盘）
    Drive {
        #[command(flatten)]
        args: DriveArgs,
    },

    /// 只读监控车辆状态（无控制回路）
    Monitor {
        #[command(flatten)]
        args: MonitorArgs,
    },

    /// 离线解码一帧总线数据
    Decode {
        #[command(flatten)]
        args: DecodeArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("piracer_cli=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Drive { args } => args.execute(),
        Commands::Monitor { args } => args.execute(),
        Commands::Decode { args } => args.execute(),
    }
}
