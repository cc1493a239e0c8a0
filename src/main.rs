mod cli;

use anyhow::Context;
use log::{info, warn};
use power_monitor::config::Config;
use power_monitor::{http, monitor};
use std::time::Duration;

#[tokio::main(flavor = "current_thread")] // requests are strictly sequential
async fn main() -> anyhow::Result<()> {
    let cmd = cli::build_cli();
    let matches = cmd.get_matches();
    let log_level = matches.get_one::<String>("log-level").cloned();
    let version_flag = matches.get_flag("version");
    let watch = matches.get_flag("watch");
    let interval = matches.get_one::<u64>("interval").copied();

    cli::init_logging(log_level.as_deref());

    if version_flag {
        println!("power-monitor {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Variables already present in the environment take precedence over .env.
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            warn!("Ignoring unreadable .env file: {}", e);
        }
    }
    let cfg = Config::from_env().context("configuration error")?;
    let client = http::build_client(&cfg).context("failed to build HTTP client")?;
    info!("Power monitor starting against {}", cfg.api_url);

    let mut out = std::io::stdout();
    if watch {
        let interval = interval
            .map(Duration::from_secs)
            .unwrap_or_else(|| cfg.poll_interval());
        monitor::watch(&client, &cfg, interval, &mut out, monitor::ctrl_c()).await
    } else {
        monitor::report(&client, &cfg, &mut out).await?;
        println!("\nAPI client is ready!");
        Ok(())
    }
}
