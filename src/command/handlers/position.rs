//! Position request handler

use super::HandlerContext;
use crate::command::CommandResult;
use crate::replies;
use tracker_shared::ProtocolError;
use tracing::info;

/// Reply with a map link to the current fix
///
/// Without a fix the sender is told so, then gets the most recent known fix.
pub async fn handle_position(
    ctx: &HandlerContext,
    sender: &str,
) -> Result<CommandResult, ProtocolError> {
    if let Some(fix) = ctx.position.current_fix().await? {
        return Ok(CommandResult::Completed {
            message: fix.map_link(),
        });
    }

    info!("[DISPATCH] No fix for {}, falling back to last known", sender);
    ctx.at.send_sms(sender, replies::NO_SIGNAL_LAST_KNOWN).await?;

    let message = match ctx.state.latest_fix().await {
        Some(fix) => fix.map_link(),
        None => replies::NO_POSITION.into(),
    };
    Ok(CommandResult::Completed { message })
}
