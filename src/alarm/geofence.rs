//! Geofence Alarm
//!
//! Long-running task that takes a reference fix, then samples the position
//! every cadence window and calls the requester on signal loss or when the
//! tracker leaves the threshold radius. Transitions are decided by
//! [`GeofenceStateMachine`]; this task performs the I/O.
//!
//! Alerts (dial-out, signal loss SMS) run as tasks in a [`JoinSet`] owned by
//! the instance. They are reaped every cycle and awaited before the instance
//! exits, so an aborted instance takes its alerts down with it.

use super::AlarmState;
use crate::config::AlarmConfig;
use crate::modem::AtCommandSender;
use crate::position::PositionEngine;
use crate::replies;
use futures::future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinSet};
use tokio::time::sleep;
use tracker_shared::state_machine::{
    AlarmEvent, AlarmPhase, Escalation, GeofenceStateMachine, Sample, TransitionResult,
};
use tracker_shared::ProtocolError;
use tracing::{debug, error, info, warn};

/// Each alert action with its outcome
type AlertOutcome = Vec<(&'static str, Result<(), ProtocolError>)>;

/// One armed alarm instance
pub struct GeofenceAlarm {
    at: AtCommandSender,
    position: PositionEngine,
    state: Arc<AlarmState>,
    fsm: GeofenceStateMachine,
    cadence: Duration,
    breach_settle: Duration,
    /// Receives replies and dial-outs
    requester: String,
    alerts: JoinSet<AlertOutcome>,
}

impl GeofenceAlarm {
    pub fn new(
        at: AtCommandSender,
        position: PositionEngine,
        state: Arc<AlarmState>,
        config: &AlarmConfig,
        requester: impl Into<String>,
    ) -> Self {
        Self {
            at,
            position,
            state,
            fsm: GeofenceStateMachine::new(config.threshold),
            cadence: config.cadence(),
            breach_settle: config.breach_settle(),
            requester: requester.into(),
            alerts: JoinSet::new(),
        }
    }

    /// Run until disabled, until no reference can be taken or until sampling fails
    pub async fn run(mut self) {
        let mut enabled = self.state.subscribe();

        let reference = match self.position.current_fix().await {
            Ok(fix) => fix,
            Err(e) => {
                warn!("[ALARM] Reference fix failed: {}", e);
                None
            }
        };

        let event = match reference {
            Some(fix) => AlarmEvent::ReferenceAcquired(fix),
            None => AlarmEvent::ReferenceUnavailable,
        };
        match self.fsm.process_event(event) {
            TransitionResult::Success(AlarmPhase::Armed) => {
                info!("[ALARM] Armed for {} at {:?}", self.requester, reference);
                self.reply(replies::ALARM_ACTIVATED).await;
            }
            TransitionResult::Stopped(reason) => {
                info!("[ALARM] Not armed: {:?}", reason);
                self.reply(replies::ALARM_NOT_ACTIVATED).await;
                return;
            }
            other => {
                error!("[ALARM] Unexpected start transition: {:?}", other);
                return;
            }
        }

        loop {
            self.reap();

            if !self.state.is_enabled() {
                self.deactivate().await;
                return;
            }

            let sample = self.sample().await;

            // A disarm that arrived while sampling wins over any escalation
            if !self.state.is_enabled() {
                self.deactivate().await;
                return;
            }

            match self.fsm.process_event(AlarmEvent::Sampled(sample)) {
                TransitionResult::Success(_) => {}
                TransitionResult::Escalate { escalation, then } => {
                    warn!("[ALARM] Escalating: {:?}", escalation);
                    self.escalate(&escalation).await;
                    if then == AlarmPhase::Stopped {
                        error!("[ALARM] Stopped after sampling failure");
                        self.finish_alerts().await;
                        return;
                    }
                    self.fsm.process_event(AlarmEvent::EscalationHandled);
                }
                other => {
                    error!("[ALARM] Unexpected transition: {:?}", other);
                    return;
                }
            }

            tokio::select! {
                _ = sleep(self.cadence) => {}
                _ = enabled.wait_for(|on| !*on) => {
                    debug!("[ALARM] Woken by disarm");
                }
            }
        }
    }

    async fn sample(&self) -> Sample {
        match self.position.current_fix().await {
            Ok(Some(fix)) => Sample::Fix(fix),
            Ok(None) => Sample::NoFix,
            Err(e) => {
                warn!("[ALARM] Sampling failed: {}", e);
                Sample::Failed
            }
        }
    }

    /// Start the alert actions without waiting for them
    async fn escalate(&mut self, escalation: &Escalation) {
        let at = self.at.clone();
        let number = self.requester.clone();

        match escalation {
            Escalation::Breach { distance } => {
                info!("[ALARM] Breach: distance {:.5}", distance);
                self.alerts.spawn(async move { vec![("dial-out", at.dial(&number).await)] });
                sleep(self.breach_settle).await;
            }
            Escalation::SignalLost | Escalation::SamplingFailed => {
                self.alerts.spawn(async move {
                    let (dial, sms) = future::join(
                        at.dial(&number),
                        at.send_sms(&number, replies::NO_SIGNAL),
                    )
                    .await;
                    vec![("dial-out", dial), ("signal loss SMS", sms)]
                });
            }
        }
    }

    /// Log alerts that already finished
    fn reap(&mut self) {
        while let Some(joined) = self.alerts.try_join_next() {
            log_alert(joined);
        }
    }

    /// Wait for every alert still in flight
    async fn finish_alerts(&mut self) {
        while let Some(joined) = self.alerts.join_next().await {
            log_alert(joined);
        }
    }

    async fn deactivate(&mut self) {
        self.fsm.process_event(AlarmEvent::Disabled);
        info!("[ALARM] Deactivated");
        self.reply(replies::ALARM_DEACTIVATED).await;
        self.finish_alerts().await;
    }

    async fn reply(&self, text: &str) {
        if let Err(e) = self.at.send_sms(&self.requester, text).await {
            error!("[ALARM] Reply to {} failed: {}", self.requester, e);
        }
    }
}

fn log_alert(joined: Result<AlertOutcome, JoinError>) {
    match joined {
        Ok(outcome) => {
            for (action, result) in outcome {
                match result {
                    Ok(()) => debug!("[ALARM] Alert {} done", action),
                    Err(e) => error!("[ALARM] Alert {} failed: {}", action, e),
                }
            }
        }
        Err(e) => error!("[ALARM] Alert task failed: {}", e),
    }
}
