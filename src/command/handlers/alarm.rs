//! Alarm switch handlers
//!
//! Both run inline in the dispatcher so a disarm can never overtake the arm
//! queued before it.

use super::HandlerContext;
use crate::alarm::GeofenceAlarm;
use crate::command::CommandResult;
use crate::replies;
use tracing::info;

/// Enable the alarm and start a fresh instance for `sender`
pub async fn handle_alarm_on(ctx: &HandlerContext, sender: &str) -> CommandResult {
    if ctx.alarm.is_running().await {
        info!("[DISPATCH] Re-arming alarm for {}, replacing running instance", sender);
    } else {
        info!("[DISPATCH] Arming alarm for {}", sender);
    }
    let alarm = GeofenceAlarm::new(
        ctx.at.clone(),
        ctx.position.clone(),
        ctx.state.clone(),
        &ctx.alarm_config,
        sender,
    );
    ctx.alarm.arm(alarm).await;
    CommandResult::Pending
}

pub fn handle_alarm_off(ctx: &HandlerContext) -> CommandResult {
    let was_enabled = ctx.alarm.disarm();
    info!("[DISPATCH] Alarm disarmed (was enabled: {})", was_enabled);
    CommandResult::Completed {
        message: replies::COMMAND_RECEIVED.into(),
    }
}
