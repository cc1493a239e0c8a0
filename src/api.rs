//! Typed Nature Remo cloud endpoints.

use crate::config::Config;
use crate::http::{self, ErrorInfo, RestResponse};
use crate::types::{Appliance, Device, EchonetAppliance, EchonetAppliancesBody, RateMeta, User};
use log::info;
use reqwest::Client;

pub const USER_PATH: &str = "/1/users/me";
pub const DEVICES_PATH: &str = "/1/devices";
pub const APPLIANCES_PATH: &str = "/1/appliances";
pub const ECHONET_APPLIANCES_PATH: &str = "/1/echonetlite/appliances";

/// A successful response together with the rate limit state it reported.
#[derive(Debug, Clone)]
pub struct ApiOk<T> {
    pub value: T,
    pub rate: RateMeta,
}

fn into_result<T>(resp: RestResponse<T>) -> Result<ApiOk<T>, ErrorInfo> {
    match (resp.value, resp.error) {
        (Some(value), None) => Ok(ApiOk {
            value,
            rate: resp.rate.unwrap_or_default(),
        }),
        (_, Some(err)) => Err(err),
        (None, None) => Err(ErrorInfo {
            code: "server_error".into(),
            message: format!("empty response (HTTP {})", resp.status),
            retriable: false,
            rate: resp.rate,
        }),
    }
}

pub async fn get_user(client: &Client, cfg: &Config) -> Result<ApiOk<User>, ErrorInfo> {
    into_result(http::rest_get_json(client, cfg, USER_PATH).await)
}

pub async fn get_devices(client: &Client, cfg: &Config) -> Result<ApiOk<Vec<Device>>, ErrorInfo> {
    info!("Fetching devices...");
    let ok = into_result(http::rest_get_json::<Vec<Device>>(client, cfg, DEVICES_PATH).await)?;
    info!("Found {} device(s)", ok.value.len());
    Ok(ok)
}

pub async fn get_appliances(
    client: &Client,
    cfg: &Config,
) -> Result<ApiOk<Vec<Appliance>>, ErrorInfo> {
    info!("Fetching appliances...");
    let ok =
        into_result(http::rest_get_json::<Vec<Appliance>>(client, cfg, APPLIANCES_PATH).await)?;
    info!("Found {} appliance(s)", ok.value.len());
    Ok(ok)
}

pub async fn get_echonetlite_appliances(
    client: &Client,
    cfg: &Config,
) -> Result<ApiOk<Vec<EchonetAppliance>>, ErrorInfo> {
    info!("Fetching ECHONET Lite appliances...");
    let ok = into_result(
        http::rest_get_json::<EchonetAppliancesBody>(client, cfg, ECHONET_APPLIANCES_PATH).await,
    )?;
    let appliances = ok.value.into_appliances();
    info!("Found {} ECHONET Lite appliance(s)", appliances.len());
    Ok(ApiOk {
        value: appliances,
        rate: ok.rate,
    })
}
