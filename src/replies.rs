//! SMS reply texts

pub const STARTED: &str = "Modem started successfully";

pub const LOGGED_IN: &str = "Sunteti logat.";
pub const ALREADY_LOGGED_IN: &str = "Sunteti deja logat.";
pub const UNKNOWN_COMMAND: &str = "Comanda nu exista";
pub const COMMAND_RECEIVED: &str = "comanda primita";
pub const COMMAND_FAILED: &str = "Comanda nu a putut fi executata.";

pub const GPS_ON: &str = "GPS pornit.";
pub const GPS_OFF: &str = "GPS oprit.";

pub const NO_SIGNAL: &str = "No GPS signal.";
pub const NO_SIGNAL_LAST_KNOWN: &str = "No GPS signal. Last known location is:";
pub const NO_POSITION: &str = "No position found.";

pub const ALARM_ACTIVATED: &str = "Alarm activated.";
pub const ALARM_NOT_ACTIVATED: &str = "No GPS signal. Alarm not activated.";
pub const ALARM_DEACTIVATED: &str = "Alarm deactivated.";

/// ON/OFF rendering used in status reports
pub fn on_off(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}
