use serde::Deserialize;

// Rate limit state reported by the X-Rate-Limit-* response headers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RateMeta {
    pub limit: Option<u32>,
    pub remaining: Option<u32>,
    /// Epoch seconds at which the window resets.
    pub reset_at: Option<i64>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub nickname: String,
}

/// A Nature Remo unit (Remo, Remo Lite, ...).
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Device {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub firmware_version: Option<String>,
    #[serde(default)]
    pub serial_number: Option<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct Appliance {
    pub id: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub device: Option<Device>,
}

/// An ECHONET Lite appliance such as a smart electricity meter.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct EchonetAppliance {
    pub id: String,
    #[serde(default)]
    pub nickname: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub properties: Vec<EchonetProperty>,
}

#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct EchonetProperty {
    pub epc: String,
    #[serde(default)]
    pub val: String,
    #[serde(default)]
    pub updated_at: String,
}

// The ECHONET endpoint has been seen returning both shapes.
#[derive(Debug, Deserialize, Clone)]
#[serde(untagged)]
pub enum EchonetAppliancesBody {
    List(Vec<EchonetAppliance>),
    Wrapped { appliances: Vec<EchonetAppliance> },
}

impl EchonetAppliancesBody {
    pub fn into_appliances(self) -> Vec<EchonetAppliance> {
        match self {
            EchonetAppliancesBody::Wrapped { appliances } => appliances,
            EchonetAppliancesBody::List(list) => list,
        }
    }
}
