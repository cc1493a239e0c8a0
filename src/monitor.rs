use crate::api;
use crate::config::Config;
use crate::echonet::{decode_appliance, MeterSnapshot};
use crate::http::{self, rate_limit_wait, ErrorInfo};
use crate::types::{Appliance, Device, EchonetAppliance, RateMeta};
use anyhow::{bail, Context};
use log::{error, info, warn};
use reqwest::Client;
use std::future::Future;
use std::io::Write;
use std::time::Duration;

pub fn render_devices<W: Write>(out: &mut W, devices: &[Device]) -> std::io::Result<()> {
    writeln!(out, "Found {} device(s)", devices.len())?;
    for d in devices {
        writeln!(out, "  - Device: {} (ID: {})", display_name(&d.name), d.id)?;
    }
    Ok(())
}

pub fn render_appliances<W: Write>(out: &mut W, appliances: &[Appliance]) -> std::io::Result<()> {
    writeln!(out, "Found {} appliance(s)", appliances.len())?;
    for a in appliances {
        writeln!(out, "  - {} (Type: {})", display_name(&a.nickname), a.kind)?;
    }
    Ok(())
}

pub fn render_echonet<W: Write>(
    out: &mut W,
    appliances: &[EchonetAppliance],
) -> std::io::Result<()> {
    if appliances.is_empty() {
        return writeln!(out, "No ECHONET Lite appliances found");
    }
    writeln!(out, "Found {} ECHONET Lite appliance(s)", appliances.len())?;
    for a in appliances {
        writeln!(out, "\n  Appliance: {} (Type: {})", display_name(&a.nickname), a.kind)?;
        if a.properties.is_empty() {
            continue;
        }
        writeln!(out, "  Electricity Data:")?;
        for (prop, reading) in decode_appliance(a) {
            match reading {
                Ok(r) => writeln!(out, "    {} (updated: {})", r, prop.updated_at)?,
                Err(e) => writeln!(out, "    {}", e)?,
            }
        }
        let snap = MeterSnapshot::from_appliance(a);
        if let Some(kwh) = snap.normal_kwh() {
            writeln!(out, "    Cumulative Energy (normal): {:.3} kWh", kwh)?;
        }
        if let Some(kwh) = snap.reverse_kwh() {
            writeln!(out, "    Cumulative Energy (reverse): {:.3} kWh", kwh)?;
        }
    }
    Ok(())
}

/// One line per meter for watch mode.
pub fn render_sample<W: Write>(
    out: &mut W,
    at: &str,
    appliances: &[EchonetAppliance],
) -> std::io::Result<()> {
    for a in appliances {
        let snap = MeterSnapshot::from_appliance(a);
        let Some(watts) = snap.power_watts else {
            continue;
        };
        write!(out, "{} {}: {} W", at, display_name(&a.nickname), watts)?;
        if let Some(kwh) = snap.normal_kwh() {
            write!(out, " | {:.3} kWh", kwh)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

fn display_name(nickname: &str) -> &str {
    if nickname.is_empty() {
        "Unknown"
    } else {
        nickname
    }
}

/// Delay before the next poll: the interval, stretched to the reset time
/// when the window is exhausted.
pub fn next_delay(interval: Duration, rate: &RateMeta, now_epoch: i64) -> Duration {
    match (rate.remaining, rate.reset_at) {
        (Some(0), Some(_)) => interval.max(rate_limit_wait(rate, now_epoch)),
        _ => interval,
    }
}

/// One-shot report: connection check, appliances, ECHONET Lite readings.
pub async fn report<W: Write>(client: &Client, cfg: &Config, out: &mut W) -> anyhow::Result<()> {
    writeln!(out, "Testing API connection...")?;
    let user = api::get_user(client, cfg)
        .await
        .context("failed to connect to the Nature API")?
        .value;
    writeln!(out, "Connected as {}", display_name(&user.nickname))?;
    let devices = api::get_devices(client, cfg)
        .await
        .context("failed to list devices")?
        .value;
    if devices.is_empty() {
        bail!("connected, but no devices are registered to this account");
    }
    render_devices(out, &devices)?;

    writeln!(out, "\nFetching appliances...")?;
    match api::get_appliances(client, cfg).await {
        Ok(ok) => render_appliances(out, &ok.value)?,
        Err(e) => warn!("Could not list appliances: {}", e),
    }

    writeln!(out, "\nFetching ECHONET Lite appliances (for electricity monitoring)...")?;
    let echonet = api::get_echonetlite_appliances(client, cfg)
        .await
        .context("failed to list ECHONET Lite appliances")?
        .value;
    render_echonet(out, &echonet)?;
    Ok(())
}

/// Delay before the next poll after a failed one. A rate-limited poll waits
/// for the reset the server reported with the 429.
pub fn delay_after_error(interval: Duration, err: &ErrorInfo, now_epoch: i64) -> Duration {
    if err.is_rate_limited() {
        let rate = err.rate.clone().unwrap_or_default();
        interval.max(rate_limit_wait(&rate, now_epoch))
    } else {
        interval
    }
}

/// One watch iteration: fetch, print, and report how long to wait before the
/// next one. Only a rejected token is fatal.
pub async fn poll_once<W: Write>(
    client: &Client,
    cfg: &Config,
    interval: Duration,
    out: &mut W,
) -> anyhow::Result<Duration> {
    let delay = match api::get_echonetlite_appliances(client, cfg).await {
        Ok(ok) => {
            let at = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
            render_sample(out, &at, &ok.value)?;
            out.flush()?;
            next_delay(interval, &ok.rate, http::now_epoch())
        }
        Err(e) if e.is_unauthorized() => {
            return Err(e).context("access token rejected");
        }
        Err(e) => {
            error!("Poll failed: {}", e);
            delay_after_error(interval, &e, http::now_epoch())
        }
    };
    if delay > interval {
        warn!("Rate limit window exhausted; next poll in {:?}", delay);
    }
    Ok(delay)
}

/// Poll ECHONET Lite appliances until `shutdown` resolves or the token is
/// rejected. `shutdown` is raced against requests, retries and sleeps alike.
pub async fn watch<W, F>(
    client: &Client,
    cfg: &Config,
    interval: Duration,
    out: &mut W,
    shutdown: F,
) -> anyhow::Result<()>
where
    W: Write,
    F: Future<Output = ()>,
{
    info!("Watching electricity usage every {:?}", interval);
    tokio::pin!(shutdown);
    loop {
        let step = async {
            let delay = poll_once(client, cfg, interval, &mut *out).await?;
            tokio::time::sleep(delay).await;
            anyhow::Ok(())
        };
        tokio::select! {
            res = step => res?,
            _ = &mut shutdown => {
                info!("Interrupted; stopping");
                return Ok(());
            }
        }
    }
}

/// Resolves on the first Ctrl-C. The handler is installed once, on first poll.
pub async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
