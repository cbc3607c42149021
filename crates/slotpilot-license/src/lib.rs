//! # SlotPilot License
//!
//! Client for the hosted license service. An installation runs the
//! automation only while its code checks out as active and unexpired; an
//! empty code disables the gate entirely.

use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use slotpilot_core::config::LicenseConfig;
use slotpilot_core::error::{Result, SlotPilotError};

/// State of a license code as reported by the service.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LicenseStatus {
    pub active: bool,
    /// `YYYY-MM-DD`, or absent for codes without an expiry.
    #[serde(default)]
    pub expiry_date: Option<String>,
}

/// The check endpoint answers with plain `false` for unknown codes and a
/// status object for known ones.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum CheckResponse {
    Known(LicenseStatus),
    Unknown(bool),
}

/// Whether a reported status permits running today.
pub fn status_is_valid(status: &LicenseStatus, today: NaiveDate) -> bool {
    if !status.active {
        return false;
    }
    match status.expiry_date.as_deref() {
        None => true,
        Some(raw) => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(expiry) => today <= expiry,
            // An unreadable expiry counts as expired rather than eternal.
            Err(_) => false,
        },
    }
}

pub struct LicenseClient {
    client: reqwest::Client,
    config: LicenseConfig,
}

impl LicenseClient {
    pub fn new(config: LicenseConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(15))
            .build()?;
        Ok(Self { client, config })
    }

    /// Look up the status of the configured code.
    pub async fn check(&self) -> Result<Option<LicenseStatus>> {
        let url = format!("{}/check/{}", self.config.endpoint, self.config.code);
        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(SlotPilotError::License(format!(
                "License check returned {}",
                resp.status()
            )));
        }
        match resp.json::<CheckResponse>().await? {
            CheckResponse::Known(status) => Ok(Some(status)),
            CheckResponse::Unknown(_) => Ok(None),
        }
    }

    /// Gate for startup: `Ok(())` only when the installation may run.
    /// An empty code skips the service round trip.
    pub async fn verify(&self) -> Result<()> {
        if self.config.code.is_empty() {
            tracing::debug!("No license code configured, skipping verification");
            return Ok(());
        }
        let status = self
            .check()
            .await?
            .ok_or_else(|| SlotPilotError::License("Unknown license code".into()))?;
        if !status_is_valid(&status, Utc::now().date_naive()) {
            return Err(SlotPilotError::License(
                "License is inactive or expired".into(),
            ));
        }
        tracing::info!(
            "🔑 License verified, expires {}",
            status.expiry_date.as_deref().unwrap_or("never")
        );
        Ok(())
    }

    /// Register a new code with the service. Admin operation, authenticated
    /// with the shared admin key.
    pub async fn add(&self, code: &str, expiry_date: Option<&str>) -> Result<()> {
        if self.config.admin_key.is_empty() {
            return Err(SlotPilotError::License("No admin key configured".into()));
        }
        let url = format!("{}/add", self.config.endpoint);
        let resp = self
            .client
            .post(&url)
            .header("x-api-key", &self.config.admin_key)
            .json(&serde_json::json!({
                "code": code,
                "active": true,
                "expiry_date": expiry_date,
            }))
            .send()
            .await?;
        match resp.status() {
            status if status.is_success() => Ok(()),
            reqwest::StatusCode::CONFLICT => {
                Err(SlotPilotError::License(format!("Code {code} already exists")))
            }
            status => Err(SlotPilotError::License(format!(
                "Adding code returned {status}"
            ))),
        }
    }
}
