use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "script-exec-server",
    version,
    about = "HTTP service that runs scripts in a bounded interpreter process"
)]
pub(crate) struct Args {
    #[arg(long, default_value = "127.0.0.1:3001")]
    pub(crate) listen_addr: String,
    /// Optional TOML file; built-in defaults apply when omitted.
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
    /// Also write JSON logs to a daily rolling file in this directory.
    #[arg(long)]
    pub(crate) log_dir: Option<PathBuf>,
    #[arg(long, default_value_t = false)]
    pub(crate) log_to_stderr: bool,
}
