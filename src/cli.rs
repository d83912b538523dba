//! Shared CLI scaffolding for the three binaries (spec §7.3): a common
//! debug-level flag, each binary's own argument struct, and a
//! `simple_logger` initializer.

use std::net::{IpAddr, Ipv4Addr};
use std::path::PathBuf;

use clap::{Args, Parser, ValueEnum};
use simple_logger::SimpleLogger;

use crate::config::{DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_MS};

pub const DEFAULT_PORT: u16 = 69;

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum DebugLevel {
	Off,
	Error,

	#[default]
	Warn,
	Info,
	Debug,
	Trace,
}

impl From<DebugLevel> for log::LevelFilter {
	fn from(value: DebugLevel) -> Self {
		match value {
			DebugLevel::Off => Self::Off,
			DebugLevel::Error => Self::Error,
			DebugLevel::Warn => Self::Warn,
			DebugLevel::Info => Self::Info,
			DebugLevel::Debug => Self::Debug,
			DebugLevel::Trace => Self::Trace,
		}
	}
}

pub fn init_logger(level: DebugLevel) {
	SimpleLogger::new().with_level(level.into()).env().init().unwrap();
}

/// `simple_server -H <addr> -P <port> -W <workdir>`
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct ServerOpts {
	#[arg(value_enum, short, long, default_value_t = DebugLevel::Warn, global = true)]
	pub debug: DebugLevel,

	#[arg(short = 'H', long = "host", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
	pub bind: IpAddr,

	#[arg(short = 'P', long = "port", default_value_t = DEFAULT_PORT)]
	pub port: u16,

	#[arg(short = 'W', long = "workdir", default_value = ".")]
	pub root_dir: PathBuf,
}

#[derive(Debug, Args)]
pub struct TransferOpts {
	#[arg(long, default_value_t = DEFAULT_TIMEOUT_MS)]
	pub timeout_ms: u64,

	#[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
	pub max_retries: u8,
}

/// `simple_client -H <addr> -P <port> -W <workdir> -D <file> | -U <file>`
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct ClientOpts {
	#[arg(value_enum, short, long, default_value_t = DebugLevel::Warn, global = true)]
	pub debug: DebugLevel,

	#[arg(short = 'H', long = "host")]
	pub server: IpAddr,

	#[arg(short = 'P', long = "port", default_value_t = DEFAULT_PORT)]
	pub port: u16,

	#[arg(short = 'W', long = "workdir", default_value = ".")]
	pub local_dir: PathBuf,

	#[arg(short = 'D', long = "download", conflicts_with = "upload", help = "Download this remote file")]
	pub download: Option<PathBuf>,

	#[arg(short = 'U', long = "upload", help = "Upload this local file")]
	pub upload: Option<PathBuf>,

	#[command(flatten)]
	pub transfer: TransferOpts,
}

/// `client <config.json>` — sequential batch runner.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct BatchOpts {
	#[arg(value_enum, short, long, default_value_t = DebugLevel::Warn, global = true)]
	pub debug: DebugLevel,

	pub config: PathBuf,

	#[command(flatten)]
	pub transfer: TransferOpts,
}
