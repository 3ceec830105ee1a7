//! Geofence Alarm State Machine
//!
//! Defines valid alarm phase transitions and when an escalation is due.

use crate::geofence::BREACH_THRESHOLD;
use crate::position::Fix;

/// Alarm phases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmPhase {
    /// Waiting for a reference fix
    Starting,
    /// Guarding the reference fix
    Armed,
    /// An escalation is in progress
    Escalating,
    /// Terminal
    Stopped,
}

/// Result of one position sample
#[derive(Debug, Clone, PartialEq)]
pub enum Sample {
    Fix(Fix),
    NoFix,
    /// The modem did not answer
    Failed,
}

/// Events that can trigger phase transitions
#[derive(Debug, Clone, PartialEq)]
pub enum AlarmEvent {
    /// Reference fix captured
    ReferenceAcquired(Fix),
    /// No reference fix could be captured
    ReferenceUnavailable,
    /// A position sample was taken
    Sampled(Sample),
    /// Escalation actions were started
    EscalationHandled,
    /// Alarm switched off by a user
    Disabled,
}

/// Why the alarm escalates
#[derive(Debug, Clone, PartialEq)]
pub enum Escalation {
    /// No fix available
    SignalLost,
    /// Fix is farther from the reference than the threshold
    Breach { distance: f64 },
    /// Sampling failed; the alarm cannot keep guarding
    SamplingFailed,
}

/// Why the alarm stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    NoReference,
    Disabled,
    SamplingFailed,
}

/// Result of a transition attempt
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionResult {
    /// Transition was valid and the phase is now the given one
    Success(AlarmPhase),
    /// Escalation actions must be started; the phase is now `then`
    Escalate {
        escalation: Escalation,
        then: AlarmPhase,
    },
    /// The alarm is now stopped
    Stopped(StopReason),
    /// Transition was invalid from current phase
    Invalid { from: AlarmPhase, event: AlarmEvent },
}

/// The geofence alarm state machine
#[derive(Debug)]
pub struct GeofenceStateMachine {
    phase: AlarmPhase,
    reference: Option<Fix>,
    threshold: f64,
    escalations: u32,
}

impl Default for GeofenceStateMachine {
    fn default() -> Self {
        Self::new(BREACH_THRESHOLD)
    }
}

impl GeofenceStateMachine {
    /// Create a new state machine in Starting phase
    pub fn new(threshold: f64) -> Self {
        Self {
            phase: AlarmPhase::Starting,
            reference: None,
            threshold,
            escalations: 0,
        }
    }

    pub fn phase(&self) -> AlarmPhase {
        self.phase
    }

    pub fn reference(&self) -> Option<Fix> {
        self.reference
    }

    /// Number of escalations since start
    pub fn escalations(&self) -> u32 {
        self.escalations
    }

    pub fn is_stopped(&self) -> bool {
        self.phase == AlarmPhase::Stopped
    }

    /// Process an event and return the transition result
    pub fn process_event(&mut self, event: AlarmEvent) -> TransitionResult {
        use AlarmPhase::*;

        match (self.phase, event) {
            (Stopped, event) => TransitionResult::Invalid {
                from: Stopped,
                event,
            },

            // Deactivation wins over anything else
            (_, AlarmEvent::Disabled) => self.stop(StopReason::Disabled),

            (Starting, AlarmEvent::ReferenceAcquired(fix)) => {
                self.reference = Some(fix);
                self.phase = Armed;
                TransitionResult::Success(Armed)
            }
            (Starting, AlarmEvent::ReferenceUnavailable) => self.stop(StopReason::NoReference),

            (Armed, AlarmEvent::Sampled(sample)) => self.evaluate(sample),

            (Escalating, AlarmEvent::EscalationHandled) => {
                self.phase = Armed;
                TransitionResult::Success(Armed)
            }

            (from, event) => TransitionResult::Invalid { from, event },
        }
    }

    /// Decide what an Armed sample means
    fn evaluate(&mut self, sample: Sample) -> TransitionResult {
        let escalation = match sample {
            Sample::NoFix => Escalation::SignalLost,
            Sample::Failed => Escalation::SamplingFailed,
            Sample::Fix(current) => {
                let reference = match self.reference {
                    Some(reference) => reference,
                    None => return self.stop(StopReason::NoReference),
                };
                let distance = current.distance_to(&reference);
                if distance <= self.threshold {
                    return TransitionResult::Success(AlarmPhase::Armed);
                }
                Escalation::Breach { distance }
            }
        };

        self.escalations += 1;
        let then = match escalation {
            Escalation::SamplingFailed => AlarmPhase::Stopped,
            _ => AlarmPhase::Escalating,
        };
        self.phase = then;

        TransitionResult::Escalate { escalation, then }
    }

    fn stop(&mut self, reason: StopReason) -> TransitionResult {
        self.phase = AlarmPhase::Stopped;
        TransitionResult::Stopped(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed_at(reference: Fix) -> GeofenceStateMachine {
        let mut fsm = GeofenceStateMachine::default();
        let result = fsm.process_event(AlarmEvent::ReferenceAcquired(reference));
        assert_eq!(result, TransitionResult::Success(AlarmPhase::Armed));
        fsm
    }

    #[test]
    fn test_initial_phase() {
        let fsm = GeofenceStateMachine::default();
        assert_eq!(fsm.phase(), AlarmPhase::Starting);
        assert!(fsm.reference().is_none());
    }

    #[test]
    fn test_no_reference_stops() {
        let mut fsm = GeofenceStateMachine::default();
        let result = fsm.process_event(AlarmEvent::ReferenceUnavailable);
        assert_eq!(result, TransitionResult::Stopped(StopReason::NoReference));
        assert!(fsm.is_stopped());
    }

    #[test]
    fn test_breach_escalates_once() {
        let mut fsm = armed_at(Fix::new(45.000, 25.000));

        let result = fsm.process_event(AlarmEvent::Sampled(Sample::Fix(Fix::new(45.002, 25.000))));
        match result {
            TransitionResult::Escalate {
                escalation: Escalation::Breach { distance },
                then: AlarmPhase::Escalating,
            } => assert!(distance > BREACH_THRESHOLD),
            other => panic!("expected breach, got {:?}", other),
        }
        assert_eq!(fsm.escalations(), 1);

        // A second sample before the escalation is handled is not accepted
        let result = fsm.process_event(AlarmEvent::Sampled(Sample::NoFix));
        assert!(matches!(result, TransitionResult::Invalid { .. }));
        assert_eq!(fsm.escalations(), 1);

        let result = fsm.process_event(AlarmEvent::EscalationHandled);
        assert_eq!(result, TransitionResult::Success(AlarmPhase::Armed));
    }

    #[test]
    fn test_small_drift_stays_armed() {
        let mut fsm = armed_at(Fix::new(45.000, 25.000));

        let result =
            fsm.process_event(AlarmEvent::Sampled(Sample::Fix(Fix::new(45.0001, 25.0001))));
        assert_eq!(result, TransitionResult::Success(AlarmPhase::Armed));
        assert_eq!(fsm.escalations(), 0);
    }

    #[test]
    fn test_signal_loss_escalates() {
        let mut fsm = armed_at(Fix::new(45.0, 25.0));

        let result = fsm.process_event(AlarmEvent::Sampled(Sample::NoFix));
        assert_eq!(
            result,
            TransitionResult::Escalate {
                escalation: Escalation::SignalLost,
                then: AlarmPhase::Escalating,
            }
        );
    }

    #[test]
    fn test_sampling_failure_escalates_then_stops() {
        let mut fsm = armed_at(Fix::new(45.0, 25.0));

        let result = fsm.process_event(AlarmEvent::Sampled(Sample::Failed));
        assert_eq!(
            result,
            TransitionResult::Escalate {
                escalation: Escalation::SamplingFailed,
                then: AlarmPhase::Stopped,
            }
        );
        assert!(fsm.is_stopped());
    }

    #[test]
    fn test_disable_from_any_live_phase() {
        let mut fsm = GeofenceStateMachine::default();
        assert_eq!(
            fsm.process_event(AlarmEvent::Disabled),
            TransitionResult::Stopped(StopReason::Disabled)
        );

        let mut fsm = armed_at(Fix::new(45.0, 25.0));
        fsm.process_event(AlarmEvent::Sampled(Sample::NoFix));
        assert_eq!(fsm.phase(), AlarmPhase::Escalating);
        assert_eq!(
            fsm.process_event(AlarmEvent::Disabled),
            TransitionResult::Stopped(StopReason::Disabled)
        );
    }

    #[test]
    fn test_stopped_is_terminal() {
        let mut fsm = GeofenceStateMachine::default();
        fsm.process_event(AlarmEvent::Disabled);

        let result = fsm.process_event(AlarmEvent::ReferenceAcquired(Fix::new(1.0, 1.0)));
        assert!(matches!(
            result,
            TransitionResult::Invalid {
                from: AlarmPhase::Stopped,
                ..
            }
        ));
    }
}
