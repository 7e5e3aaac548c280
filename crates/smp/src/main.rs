use anyhow::Result;
use tracing_subscriber::EnvFilter;

use smp::config::PlayerConfig;
use smp::input::CrlfWriter;
use smp::{cli, runtime};

fn main() -> Result<()> {
    let args = cli::parse_args();
    tracing_subscriber::fmt()
        .with_writer(|| CrlfWriter(std::io::stderr()))
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,smp=info")),
        )
        .init();

    if args.list_devices {
        return runtime::list_devices();
    }
    let config = PlayerConfig::from_env(&args)?;
    if args.list {
        return runtime::list_playlists(&config);
    }
    let name = args.playlist.as_deref().unwrap_or_default();
    runtime::run_player(config, name)
}
