//! Position reports and fix arithmetic
//!
//! A position report is the comma separated tail of a `+CGNSINF` reply:
//! ```text
//! 1,1,20240315120000.000,45.123456,25.654321,310.2,0.00,0.0,1,,1.1,1.4,0.9,,10,7,2,,38,,
//! ```

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of fields in a `+CGNSINF` record
pub const REPORT_FIELD_COUNT: usize = 21;

/// Scale applied to the planar distance
pub const DISTANCE_SCALE: f64 = 6.371;

/// Field indices of a position report
pub mod field {
    pub const RUN_STATUS: usize = 0;
    pub const FIX_STATUS: usize = 1;
    pub const UTC_DATE_TIME: usize = 2;
    pub const LATITUDE: usize = 3;
    pub const LONGITUDE: usize = 4;
    pub const MSL_ALTITUDE: usize = 5;
    pub const SPEED_OVER_GROUND: usize = 6;
    pub const COURSE_OVER_GROUND: usize = 7;
    pub const FIX_MODE: usize = 8;
    pub const HDOP: usize = 10;
    pub const PDOP: usize = 11;
    pub const VDOP: usize = 12;
    pub const GPS_SATELLITES_IN_VIEW: usize = 14;
    pub const GNSS_SATELLITES_USED: usize = 15;
    pub const GLONASS_SATELLITES_IN_VIEW: usize = 16;
    pub const CN0_MAX: usize = 18;
    pub const HPA: usize = 19;
    pub const VPA: usize = 20;
}

/// Errors raised while turning a report into a fix
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReportError {
    #[error("Malformed position report: expected {REPORT_FIELD_COUNT} fields, got {0}")]
    FieldCount(usize),

    #[error("Position not fixed (fix status {0:?})")]
    NotFixed(String),

    #[error("Invalid {field}: {value:?}")]
    InvalidCoordinate { field: &'static str, value: String },
}

/// A resolved latitude/longitude reading in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fix {
    pub latitude: f64,
    pub longitude: f64,
}

impl Fix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Distance from this fix to `other`, see [`distance`]
    pub fn distance_to(&self, other: &Fix) -> f64 {
        distance(self, other)
    }

    /// Map link for this fix
    pub fn map_link(&self) -> String {
        format!(
            "http://www.google.com/maps/place/{},{}",
            self.latitude, self.longitude
        )
    }
}

impl fmt::Display for Fix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.6}, {:.6})", self.latitude, self.longitude)
    }
}

/// Planar distance between two fixes
///
/// First-order flat-earth approximation. The cosine takes the mean latitude
/// as is (no degree to radian conversion) and the result is scaled by
/// [`DISTANCE_SCALE`]. The geofence threshold is calibrated against exactly
/// this formula, so it must not be replaced by a geodesic one.
pub fn distance(a: &Fix, b: &Fix) -> f64 {
    let dx = (b.longitude - a.longitude) * ((a.latitude + b.latitude) / 2.0).cos();
    let dy = b.latitude - a.latitude;
    (dx * dx + dy * dy).sqrt() * DISTANCE_SCALE
}

/// A tokenized `+CGNSINF` record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionReport {
    fields: Vec<String>,
}

impl PositionReport {
    /// Raw field by index
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// All fields in report order
    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn fix_status(&self) -> &str {
        &self.fields[field::FIX_STATUS]
    }

    pub fn is_fixed(&self) -> bool {
        self.fix_status() == "1"
    }

    /// Convert to a fix
    pub fn to_fix(&self) -> Result<Fix, ReportError> {
        if !self.is_fixed() {
            return Err(ReportError::NotFixed(self.fix_status().to_string()));
        }

        let latitude = self.coordinate(field::LATITUDE, "latitude")?;
        let longitude = self.coordinate(field::LONGITUDE, "longitude")?;
        Ok(Fix::new(latitude, longitude))
    }

    fn coordinate(&self, index: usize, name: &'static str) -> Result<f64, ReportError> {
        let raw = &self.fields[index];
        raw.trim()
            .parse()
            .map_err(|_| ReportError::InvalidCoordinate {
                field: name,
                value: raw.clone(),
            })
    }
}

impl FromStr for PositionReport {
    type Err = ReportError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_report(raw)
    }
}

/// Split a raw report into its fields
///
/// Only the field count is checked here; field contents are validated by
/// [`PositionReport::to_fix`].
pub fn parse_report(raw: &str) -> Result<PositionReport, ReportError> {
    let fields: Vec<String> = raw.split(',').map(str::to_string).collect();

    if fields.len() != REPORT_FIELD_COUNT {
        return Err(ReportError::FieldCount(fields.len()));
    }

    Ok(PositionReport { fields })
}
