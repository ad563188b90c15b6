use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, instrument, warn};

use super::{
    CourierGateway, GatewayError, ShipmentPackage, ShipmentRequest, ShipmentResponse,
    ShipmentScan, TrackingData, TrackingResponse, ensure_success,
};

const SERVICE: &str = "delhivery";

#[derive(Clone)]
pub struct DelhiveryConfig {
    pub api_token: String,
    pub base_url: String,
}

impl std::fmt::Debug for DelhiveryConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelhiveryConfig")
            .field("api_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[derive(Clone)]
pub struct DelhiveryGateway {
    config: DelhiveryConfig,
    client: reqwest::Client,
}

#[derive(Deserialize)]
struct PinCodeReply {
    #[serde(default)]
    delivery_codes: Vec<DeliveryCode>,
}

#[derive(Deserialize)]
struct DeliveryCode {
    postal_code: PostalCode,
}

#[derive(Deserialize)]
struct PostalCode {
    #[serde(default)]
    pre_paid: Option<String>,
    #[serde(default)]
    remarks: Option<String>,
}

#[derive(Deserialize)]
struct ManifestReply {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    packages: Vec<ManifestPackage>,
    #[serde(default)]
    rmk: Option<String>,
}

#[derive(Deserialize)]
struct ManifestPackage {
    #[serde(default)]
    waybill: Option<String>,
    #[serde(default)]
    refnum: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    serviceable: Option<bool>,
    #[serde(default)]
    remarks: Vec<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrackReply {
    #[serde(default)]
    shipment_data: Vec<TrackEnvelope>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrackEnvelope {
    shipment: TrackShipment,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrackShipment {
    status: TrackStatus,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TrackStatus {
    status: String,
    #[serde(default)]
    status_type: Option<String>,
    #[serde(default)]
    status_location: Option<String>,
    #[serde(default)]
    status_date_time: Option<String>,
    #[serde(default)]
    instructions: Option<String>,
}

impl DelhiveryGateway {
    pub fn new(config: DelhiveryConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn token(&self) -> String {
        format!("Token {}", self.config.api_token)
    }
}

impl From<ManifestPackage> for ShipmentPackage {
    fn from(pkg: ManifestPackage) -> Self {
        let mut message = pkg.remarks.join("; ");
        if message.is_empty() {
            message = pkg.status.clone().unwrap_or_default();
        }
        let failed = pkg
            .status
            .as_deref()
            .is_some_and(|s| s.eq_ignore_ascii_case("fail"));
        ShipmentPackage {
            waybill: pkg.waybill.unwrap_or_default(),
            refnum: pkg.refnum.unwrap_or_default(),
            serviceable: pkg.serviceable.unwrap_or(!failed),
            message,
        }
    }
}

impl From<TrackStatus> for ShipmentScan {
    fn from(status: TrackStatus) -> Self {
        let delivered_at = match status.status_type.as_deref() {
            Some("DL") => status.status_date_time.clone(),
            _ => None,
        };
        ShipmentScan {
            current_status: status.status,
            current_status_type: status.status_type,
            current_status_location: status.status_location,
            current_status_time: status.status_date_time,
            instructions: status.instructions,
            delivered_at,
        }
    }
}

#[async_trait]
impl CourierGateway for DelhiveryGateway {
    fn carrier(&self) -> &'static str {
        "Delhivery"
    }

    #[instrument(skip(self))]
    async fn check_serviceability(&self, postal_code: &str) -> Result<bool, GatewayError> {
        let response = self
            .client
            .get(self.url("/c/api/pin-codes/json/"))
            .header(AUTHORIZATION, self.token())
            .query(&[("filter_codes", postal_code)])
            .send()
            .await?;
        let reply: PinCodeReply = ensure_success(SERVICE, response).await?.json().await?;

        let serviceable = reply.delivery_codes.iter().any(|code| {
            let prepaid = code
                .postal_code
                .pre_paid
                .as_deref()
                .is_some_and(|v| v.eq_ignore_ascii_case("y"));
            let embargoed = code
                .postal_code
                .remarks
                .as_deref()
                .is_some_and(|r| r.eq_ignore_ascii_case("embargo"));
            prepaid && !embargoed
        });
        Ok(serviceable)
    }

    #[instrument(skip(self, request), fields(shipments = request.shipments.len()))]
    async fn create_shipment(
        &self,
        request: ShipmentRequest,
    ) -> Result<ShipmentResponse, GatewayError> {
        let data = serde_json::to_string(&request)
            .map_err(|e| GatewayError::Decode(format!("manifest body: {e}")))?;
        let response = self
            .client
            .post(self.url("/api/cmu/create.json"))
            .header(AUTHORIZATION, self.token())
            .form(&[("format", "json"), ("data", data.as_str())])
            .send()
            .await?;
        let raw: Value = ensure_success(SERVICE, response).await?.json().await?;
        let reply: ManifestReply = serde_json::from_value(raw)
            .map_err(|e| GatewayError::Decode(format!("delhivery manifest: {e}")))?;

        if !reply.success {
            warn!(remark = ?reply.rmk, "delhivery rejected manifest");
        } else {
            info!(packages = reply.packages.len(), "delhivery manifest accepted");
        }

        Ok(ShipmentResponse {
            success: reply.success,
            packages: reply.packages.into_iter().map(ShipmentPackage::from).collect(),
            message: reply.rmk,
        })
    }

    #[instrument(skip(self))]
    async fn track_shipment(&self, tracking_number: &str) -> Result<TrackingResponse, GatewayError> {
        let response = self
            .client
            .get(self.url("/api/v1/packages/json/"))
            .header(AUTHORIZATION, self.token())
            .query(&[("waybill", tracking_number)])
            .send()
            .await?;
        let reply: TrackReply = ensure_success(SERVICE, response).await?.json().await?;

        let scans: Vec<ShipmentScan> = reply
            .shipment_data
            .into_iter()
            .map(|envelope| ShipmentScan::from(envelope.shipment.status))
            .collect();
        Ok(TrackingResponse {
            success: !scans.is_empty(),
            tracking_data: Some(TrackingData {
                shipment_data: scans,
            }),
        })
    }
}
