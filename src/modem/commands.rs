//! Modem Command Set
//!
//! Typed helpers for the AT commands the tracker uses. Each helper is one
//! transaction on the shared [`Modem`].

use super::connection::Modem;
use regex::Regex;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tracker_shared::{AtRequest, ProtocolError};
use tracing::{debug, info};

static SMS_SENT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r".*\+CMGS: \d+").unwrap());

static SMS_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^.*?\+CMGR: "[^"]*","([^"]+)","[^"]*","[^"]*"(.*)$"#).unwrap()
});

static GPS_POWER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+CGPSPWR: ?([01])").unwrap());

static GPS_STATUS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+CGPSSTATUS: ?(.*?)(OK)?$").unwrap());

static GNSS_INFO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+CGNSINF: ?\d,").unwrap());

static NETWORK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\+CSPN: "([^"]*)""#).unwrap());

/// A stored SMS
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    pub sender: String,
    pub body: String,
}

/// GNSS status as reported by `AT+CGPSSTATUS?`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GpsStatus {
    /// Status text without the prefix, e.g. "Location 3D Fix"
    pub text: String,
}

impl GpsStatus {
    pub fn has_fix(&self) -> bool {
        !self.text.contains("Not Fix") && !self.text.contains("Unknown")
    }
}

/// Sends AT commands to the modem
#[derive(Clone)]
pub struct AtCommandSender {
    modem: Arc<Modem>,
    sms_settle: Duration,
}

impl AtCommandSender {
    /// Create a new command sender
    pub fn new(modem: Arc<Modem>, sms_settle: Duration) -> Self {
        Self { modem, sms_settle }
    }

    /// Send a text message, then pause for the modem to settle
    pub async fn send_sms(&self, number: &str, text: &str) -> Result<(), ProtocolError> {
        info!("[MODEM] Sending SMS to {}: {:?}", number, text);

        let request = AtRequest::new(format!("AT+CMGS=\"{}\"", number))
            .expect(&SMS_SENT)
            .with_payload(text);
        self.modem.execute(&request).await?;

        tokio::time::sleep(self.sms_settle).await;
        Ok(())
    }

    /// Read the message stored at `index`
    pub async fn read_sms(&self, index: u32) -> Result<IncomingMessage, ProtocolError> {
        let request = AtRequest::new(format!("AT+CMGR={}", index)).expect(&SMS_HEADER);
        let reply = self.modem.execute(&request).await?;

        let captures = SMS_HEADER
            .captures(&reply)
            .ok_or_else(|| ProtocolError::UnexpectedReply {
                command: request.command().to_string(),
                reply: reply.clone(),
            })?;

        Ok(IncomingMessage {
            sender: captures[1].to_string(),
            body: captures[2].to_string(),
        })
    }

    /// Delete every stored message
    pub async fn delete_all_messages(&self) -> Result<(), ProtocolError> {
        self.modem.execute(&AtRequest::new("AT+CMGD=1,4")).await?;
        Ok(())
    }

    /// Whether the GNSS receiver is powered
    pub async fn gps_powered(&self) -> Result<bool, ProtocolError> {
        let reply = self
            .modem
            .execute(&AtRequest::new("AT+CGPSPWR?").expect(&GPS_POWER))
            .await?;

        Ok(GPS_POWER
            .captures(&reply)
            .is_some_and(|c| &c[1] == "1"))
    }

    /// Power the receiver on and warm-restart it
    pub async fn start_gps(&self) -> Result<(), ProtocolError> {
        debug!("[MODEM] Powering GNSS on");
        self.modem.execute(&AtRequest::new("AT+CGNSPWR=1")).await?;
        self.modem.execute(&AtRequest::new("AT+CGPSRST=2")).await?;
        Ok(())
    }

    pub async fn stop_gps(&self) -> Result<(), ProtocolError> {
        debug!("[MODEM] Powering GNSS off");
        self.modem.execute(&AtRequest::new("AT+CGNSPWR=0")).await?;
        self.modem.execute(&AtRequest::new("AT+CGPSPWR=0")).await?;
        Ok(())
    }

    pub async fn gps_status(&self) -> Result<GpsStatus, ProtocolError> {
        let reply = self
            .modem
            .execute(&AtRequest::new("AT+CGPSSTATUS?").expect(&GPS_STATUS))
            .await?;

        let text = GPS_STATUS
            .captures(&reply)
            .map(|c| c[1].trim().to_string())
            .unwrap_or(reply);
        Ok(GpsStatus { text })
    }

    /// Raw position record: the `+CGNSINF` fields with spaces removed
    pub async fn gnss_info(&self) -> Result<String, ProtocolError> {
        let request = AtRequest::new("AT+CGNSINF")
            .expect(&GNSS_INFO)
            .replace("OK", "");
        let reply = self.modem.execute(&request).await?;

        let fields = reply.split_once(':').map_or(reply.as_str(), |(_, rest)| rest);
        Ok(fields.replace(' ', ""))
    }

    /// Start a voice call; does not wait for it to be answered
    pub async fn dial(&self, number: &str) -> Result<(), ProtocolError> {
        info!("[MODEM] Dialing {}", number);
        self.modem
            .execute(&AtRequest::new(format!("ATD{};", number)))
            .await?;
        Ok(())
    }

    /// Name of the registered network operator
    pub async fn network_operator(&self) -> Result<String, ProtocolError> {
        let reply = self
            .modem
            .execute(&AtRequest::new("AT+CSPN?").expect(&NETWORK))
            .await?;

        Ok(NETWORK
            .captures(&reply)
            .map(|c| c[1].to_string())
            .unwrap_or_default())
    }

    /// Echo off, verbose errors, service center, text mode
    pub async fn configure(&self, service_center: &str) -> Result<(), ProtocolError> {
        for command in [
            "ATE0".to_string(),
            "AT+CMEE=2".to_string(),
            format!("AT+CSCA=\"{}\"", service_center),
            "AT+CMGF=1".to_string(),
        ] {
            self.modem.execute(&AtRequest::new(command)).await?;
        }
        info!("[MODEM] Modem configured");
        Ok(())
    }
}
