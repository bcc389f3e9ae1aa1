use clap::Parser;

use infrastructure::config::{LogFormat, LogLevel};
use infrastructure::constants::DEFAULT_CONFIG_PATH;

#[derive(Parser, Debug)]
#[command(
    name = "flowgate-agent",
    about = "Stateful IPv4 packet filter with source NAT",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to the YAML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    pub config: String,

    /// Log level override (takes precedence over the config file)
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Log format: json (production) or text (development)
    #[arg(long)]
    pub log_format: Option<LogFormat>,

    /// Control-socket path override
    #[arg(long, env = "FLOWGATE_CONTROL_SOCKET")]
    pub control_socket: Option<String>,
}

pub fn parse() -> Cli {
    Cli::parse()
}
