//! Status report handler

use super::HandlerContext;
use crate::command::CommandResult;
use crate::replies::on_off;
use tracker_shared::ProtocolError;

/// Summarize GNSS power, fix status, network and alarm in one message
pub async fn handle_status(ctx: &HandlerContext) -> Result<CommandResult, ProtocolError> {
    let powered = ctx.at.gps_powered().await?;
    let status = ctx.at.gps_status().await?;
    let network = ctx.at.network_operator().await?;

    let message = format!(
        "GPS: {}\nstatus locatie: {}\nNetwork {}\nAlarm status: {}",
        on_off(powered),
        status.text,
        network,
        on_off(ctx.state.is_enabled()),
    );
    Ok(CommandResult::Completed { message })
}
