//! Device operations against the cloud API.

use std::collections::HashMap;

use log::{debug, error, info};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::access::ApiAccessLayer;
use crate::device::{Command, Device, DeviceList, DeviceState, RawDeviceState};
use crate::errors::Error;
use crate::transport::{ApiRequest, Transport};
use crate::types::{Brightness, Color, PowerMode};

type Result<T> = std::result::Result<T, Error>;

const DEVICES_PATH: &str = "/v1/devices";
const STATE_PATH: &str = "/v1/devices/state";
const CONTROL_PATH: &str = "/v1/devices/control";
const CODE_OK: u16 = 200;

/// Every JSON body the API returns is wrapped in this envelope.
#[derive(Debug, Deserialize)]
struct Envelope<D> {
    code: u16,
    #[serde(default)]
    message: String,
    data: Option<D>,
}

fn parse_envelope<D: DeserializeOwned>(body: &str) -> Result<Envelope<D>> {
    let envelope: Envelope<D> = serde_json::from_str(body).map_err(Error::JsonLoad)?;
    if envelope.code != CODE_OK {
        return Err(Error::api(envelope.code, &envelope.message));
    }
    Ok(envelope)
}

fn require_data<D>(envelope: Envelope<D>) -> Result<D> {
    let code = envelope.code;
    envelope
        .data
        .ok_or_else(|| Error::api(code, "response carried no data"))
}

/// A Govee account: device discovery, state queries and control commands,
/// all routed through one [`ApiAccessLayer`].
///
/// Device models are needed for state and control calls, so the client keeps
/// the most recent device listing. Call [`GoveeClient::devices`] before
/// addressing a device by id.
///
/// # Example
///
/// ```no_run
/// use govee_lights_rs::{ApiAccessLayer, GoveeClient, HttpTransport, QuotaConfig};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let transport = HttpTransport::new("my-api-key")?;
/// let client = GoveeClient::new(ApiAccessLayer::new(transport, QuotaConfig::default())?);
///
/// for device in client.devices().await? {
///     client.turn_on(&device.device).await?;
/// }
/// println!("next poll in {}s", client.api().current_polling_interval().await);
/// # Ok(())
/// # }
/// ```
pub struct GoveeClient<T> {
    api: ApiAccessLayer<T>,
    devices: Mutex<HashMap<String, Device>>,
}

impl<T: Transport> GoveeClient<T> {
    pub fn new(api: ApiAccessLayer<T>) -> Self {
        Self {
            api,
            devices: Mutex::new(HashMap::new()),
        }
    }

    /// The access layer, for usage figures and the polling interval.
    pub fn api(&self) -> &ApiAccessLayer<T> {
        &self.api
    }

    /// List the account's devices and refresh the cached listing.
    ///
    /// The device count feeds the adaptive polling interval.
    pub async fn devices(&self) -> Result<Vec<Device>> {
        let body = self
            .api
            .execute(&ApiRequest::get(DEVICES_PATH))
            .await
            .into_result()?;
        let list: DeviceList = parse_envelope(&body)
            .and_then(require_data)
            .inspect_err(|e| error!("failed to get devices: {}", e))?;

        let count = u32::try_from(list.devices.len()).unwrap_or(u32::MAX);
        {
            let mut cache = self.devices.lock().await;
            cache.clear();
            cache.extend(list.devices.iter().map(|d| (d.device.clone(), d.clone())));
        }
        self.api.set_device_count(count).await;
        self.api.log_status().await;
        Ok(list.devices)
    }

    /// A device from the cached listing.
    pub async fn device(&self, device_id: &str) -> Option<Device> {
        self.devices.lock().await.get(device_id).cloned()
    }

    /// Query the cloud for a device's current state.
    pub async fn device_state(&self, device_id: &str) -> Result<DeviceState> {
        let device = self.known(device_id).await?;
        let path = format!(
            "{}?device={}&model={}",
            STATE_PATH, device.device, device.model
        );
        let body = self.api.execute(&ApiRequest::get(path)).await.into_result()?;
        let raw: RawDeviceState = parse_envelope(&body)
            .and_then(require_data)
            .inspect_err(|e| error!("failed to get state of {}: {}", device_id, e))?;
        Ok(DeviceState::from(raw))
    }

    /// Send a control command to a device.
    pub async fn control(&self, device_id: &str, command: Command) -> Result<()> {
        let device = self.known(device_id).await?;
        let cmd = serde_json::to_value(command).map_err(Error::JsonDump)?;
        debug!("sending {} to {}", command.name(), device.name());

        let body = json!({
            "device": device.device,
            "model": device.model,
            "cmd": cmd,
        });
        let response = self
            .api
            .execute(&ApiRequest::put(CONTROL_PATH, body))
            .await
            .into_result()?;
        parse_envelope::<Value>(&response)
            .inspect_err(|e| error!("failed to control {}: {}", device_id, e))?;
        info!("{} accepted {}", device.name(), command.name());
        Ok(())
    }

    pub async fn turn_on(&self, device_id: &str) -> Result<()> {
        self.control(device_id, Command::Turn(PowerMode::On)).await
    }

    pub async fn turn_off(&self, device_id: &str) -> Result<()> {
        self.control(device_id, Command::Turn(PowerMode::Off)).await
    }

    pub async fn set_brightness(&self, device_id: &str, brightness: Brightness) -> Result<()> {
        self.control(device_id, Command::Brightness(brightness)).await
    }

    pub async fn set_color(&self, device_id: &str, color: Color) -> Result<()> {
        self.control(device_id, Command::Color(color)).await
    }

    async fn known(&self, device_id: &str) -> Result<Device> {
        self.device(device_id)
            .await
            .ok_or_else(|| Error::DeviceNotFound(device_id.to_string()))
    }
}
