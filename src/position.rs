//! Position Engine
//!
//! Runs the "current fix" query sequence against the GNSS receiver and keeps
//! the fix history in [`AlarmState`] up to date.

use crate::alarm::AlarmState;
use crate::modem::AtCommandSender;
use std::sync::Arc;
use std::time::Duration;
use tracker_shared::{parse_report, Fix, ProtocolError};
use tracing::{debug, info, warn};

/// Queries the receiver for the current fix
#[derive(Clone)]
pub struct PositionEngine {
    at: AtCommandSender,
    state: Arc<AlarmState>,
    warmup: Duration,
}

impl PositionEngine {
    pub fn new(at: AtCommandSender, state: Arc<AlarmState>, warmup: Duration) -> Self {
        Self { at, state, warmup }
    }

    /// Current fix, or `None` if the receiver has none
    ///
    /// Powers the receiver on first if needed. A malformed report counts as
    /// no fix.
    pub async fn current_fix(&self) -> Result<Option<Fix>, ProtocolError> {
        if !self.at.gps_powered().await? {
            info!("[GPS] Receiver off, powering on");
            self.at.start_gps().await?;
            tokio::time::sleep(self.warmup).await;
        }

        let status = self.at.gps_status().await?;
        if !status.has_fix() {
            debug!("[GPS] No fix: {}", status.text);
            return Ok(None);
        }

        let raw = self.at.gnss_info().await?;
        let fix = match parse_report(&raw).and_then(|report| report.to_fix()) {
            Ok(fix) => fix,
            Err(e) => {
                warn!("[GPS] Unusable position report {:?}: {}", raw, e);
                return Ok(None);
            }
        };

        self.state.record_fix(fix).await;
        debug!("[GPS] Fix {}", fix);
        Ok(Some(fix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModemConfig;
    use crate::modem::fake::{self, FakeModem, GnssScript};
    use tokio::time::Instant;

    fn engine(at: AtCommandSender, state: Arc<AlarmState>) -> PositionEngine {
        PositionEngine::new(at, state, Duration::from_secs(15))
    }

    #[tokio::test(start_paused = true)]
    async fn test_fix_is_recorded() {
        let script = GnssScript::new().fix(45.0, 25.0).fix(45.5, 25.5);
        let (modem, _urcs, _fake) = FakeModem::scripted(&ModemConfig::default(), script);
        let state = Arc::new(AlarmState::new());
        let position = engine(AtCommandSender::new(modem, Duration::ZERO), state.clone());

        assert_eq!(position.current_fix().await.unwrap(), Some(Fix::new(45.0, 25.0)));
        assert_eq!(position.current_fix().await.unwrap(), Some(Fix::new(45.5, 25.5)));

        let fixes = state.fixes().await;
        assert_eq!(fixes.last_known, Some(Fix::new(45.0, 25.0)));
        assert_eq!(fixes.current, Some(Fix::new(45.5, 25.5)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_powered_off_receiver_is_started() {
        let script = GnssScript::new().powered(false).fix(45.0, 25.0);
        let (modem, _urcs, fake) = FakeModem::scripted(&ModemConfig::default(), script);
        let position = engine(
            AtCommandSender::new(modem, Duration::ZERO),
            Arc::new(AlarmState::new()),
        );

        let started = Instant::now();
        assert!(position.current_fix().await.unwrap().is_some());
        assert!(started.elapsed() >= Duration::from_secs(15));
        assert_eq!(fake.count("AT+CGNSPWR=1"), 1);
        assert_eq!(fake.count("AT+CGPSRST=2"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_fix_skips_report() {
        let script = GnssScript::new().no_fix();
        let (modem, _urcs, fake) = FakeModem::scripted(&ModemConfig::default(), script);
        let state = Arc::new(AlarmState::new());
        let position = engine(AtCommandSender::new(modem, Duration::ZERO), state.clone());

        assert_eq!(position.current_fix().await.unwrap(), None);
        assert_eq!(fake.count("AT+CGNSINF"), 0);
        assert!(state.latest_fix().await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_malformed_report_is_no_fix() {
        let (modem, _urcs, _fake) = FakeModem::spawn(&ModemConfig::default(), |command| match command {
            "AT+CGPSPWR?" => fake::ok("+CGPSPWR: 1"),
            "AT+CGPSSTATUS?" => fake::ok("+CGPSSTATUS: Location 3D Fix"),
            "AT+CGNSINF" => fake::ok("+CGNSINF: 1,1,20240101120000.000,45.0"),
            _ => fake::ok(""),
        });
        let position = engine(
            AtCommandSender::new(modem, Duration::ZERO),
            Arc::new(AlarmState::new()),
        );

        assert_eq!(position.current_fix().await.unwrap(), None);
    }
}
