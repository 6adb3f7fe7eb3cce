use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "kubedeck",
    version,
    about = "A live-refreshing Kubernetes resource table browser."
)]
pub struct CliArgs {
    /// Refresh interval in milliseconds (at least 500, default 2000)
    #[arg(long)]
    pub refresh_ms: Option<u64>,

    /// Start in a specific namespace
    #[arg(short, long)]
    pub namespace: Option<String>,

    /// Start with all namespaces selected
    #[arg(short = 'A', long)]
    pub all_namespaces: bool,

    /// Resource alias to open first (po, deploy, svc, ns, ...)
    #[arg(short, long, default_value = "po")]
    pub command: String,

    /// Disable destructive actions
    #[arg(long)]
    pub readonly: bool,

    /// Path to a YAML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// tracing filter (for example: info,debug,trace)
    #[arg(long, default_value = "info")]
    pub log_filter: String,

    /// Write logs to this file instead of discarding them
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}
