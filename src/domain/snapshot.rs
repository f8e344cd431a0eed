//! Race snapshot domain types.
//!
//! A `Snapshot` is one complete description of race state as pushed by the
//! live feed: event name, lap indicator, optional session metadata, and the
//! ordered driver list. Snapshots are decoded and validated as a whole and
//! replaced wholesale; nothing in this module mutates a published snapshot.
//!
//! Wire names follow the feed's camelCase JSON (`lapTime`, `winProbability`,
//! `totalLaps`, `pitStops`). Optional fields are omitted on re-serialization
//! so `/snapshot` echoes the original shape.

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Driver identifier as sent by the feed (e.g. `"max_verstappen"`).
pub type DriverId = String;

/// Reasons an inbound payload is rejected.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DecodeError {
    /// Not JSON, or JSON not matching the snapshot shape (including missing
    /// mandatory fields).
    #[error("malformed snapshot payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("driver id '{id}' appears more than once")]
    DuplicateDriver { id: DriverId },

    #[error("driver '{id}' has position 0; positions are 1-based")]
    ZeroPosition { id: DriverId },

    #[error("position {position} is held by more than one driver")]
    DuplicatePosition { position: u32 },

    #[error("driver '{id}' win probability {value} is outside 0..=100")]
    WinProbabilityOutOfRange { id: DriverId, value: f64 },
}

/// Current lap as reported by the feed: a lap number, or a free-text label
/// such as `"FINISHED"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LapIndicator {
    Number(u32),
    Label(String),
}

impl fmt::Display for LapIndicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Label(label) => f.write_str(label),
        }
    }
}

/// Track weather reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Weather {
    /// Human-readable condition (e.g. "Clear").
    pub condition: String,
    /// Air temperature in degrees Celsius.
    pub temp: f64,
}

/// Per-sector timing triple, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sectors {
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
}

impl Sectors {
    /// Sum of the three sectors.
    pub fn total(&self) -> f64 {
        self.s1 + self.s2 + self.s3
    }
}

/// Normalized 2D position on the schematic track map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
}

/// One driver's entry in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Driver {
    /// Unique identifier within the snapshot.
    pub id: DriverId,
    /// Three-letter display code (e.g. "VER").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Team identifier (e.g. "red_bull").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team: Option<String>,
    /// 1-based race position, unique per snapshot.
    pub position: u32,
    /// Lap time or gap, already formatted for display.
    pub lap_time: String,
    /// Estimated win probability in percent (0–100).
    pub win_probability: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sectors: Option<Sectors>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pit_stops: Option<u32>,
    /// Tyre compound label (e.g. "MEDIUM").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tyre: Option<String>,
}

impl Driver {
    /// Display code, falling back to the first three characters of the id
    /// upper-cased when the feed omits `code`.
    pub fn display_code(&self) -> String {
        match &self.code {
            Some(code) if !code.is_empty() => code.clone(),
            _ => self.id.chars().take(3).collect::<String>().to_uppercase(),
        }
    }
}

/// Complete race state at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Event name (e.g. "Las Vegas Grand Prix").
    pub race: String,
    pub lap: LapIndicator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_laps: Option<u32>,
    /// Session status (e.g. "RACE", "QUALIFYING").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather: Option<Weather>,
    /// Drivers in feed order.
    pub drivers: Vec<Driver>,
}

impl Snapshot {
    /// Decode and validate one text frame.
    ///
    /// # Errors
    /// Returns `DecodeError` when the payload is not a well-formed snapshot
    /// or violates a structural invariant (unique ids, unique 1-based
    /// positions, win probability in range).
    pub fn from_json(text: &str) -> Result<Self, DecodeError> {
        let snapshot: Self = serde_json::from_str(text)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check the invariants serde cannot express.
    ///
    /// # Errors
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), DecodeError> {
        let mut ids = HashSet::with_capacity(self.drivers.len());
        let mut positions = HashSet::with_capacity(self.drivers.len());

        for driver in &self.drivers {
            if !ids.insert(driver.id.as_str()) {
                return Err(DecodeError::DuplicateDriver {
                    id: driver.id.clone(),
                });
            }
            if driver.position == 0 {
                return Err(DecodeError::ZeroPosition {
                    id: driver.id.clone(),
                });
            }
            if !positions.insert(driver.position) {
                return Err(DecodeError::DuplicatePosition {
                    position: driver.position,
                });
            }
            if !(0.0..=100.0).contains(&driver.win_probability) {
                return Err(DecodeError::WinProbabilityOutOfRange {
                    id: driver.id.clone(),
                    value: driver.win_probability,
                });
            }
        }

        Ok(())
    }

    /// Driver currently in position 1.
    pub fn leader(&self) -> Option<&Driver> {
        self.drivers.iter().find(|d| d.position == 1)
    }

    /// Look up a driver by identifier.
    pub fn driver(&self, id: &str) -> Option<&Driver> {
        self.drivers.iter().find(|d| d.id == id)
    }

    /// One-line summary for logs: `race | lap n/total | status | P1 CODE`.
    pub fn summary(&self) -> String {
        let mut out = format!("{} | lap {}", self.race, self.lap);
        if let Some(total) = self.total_laps {
            out.push_str(&format!("/{total}"));
        }
        if let Some(status) = &self.status {
            out.push_str(&format!(" | {status}"));
        }
        match self.leader() {
            Some(leader) => out.push_str(&format!(" | P1 {}", leader.display_code())),
            None => out.push_str(" | no classification"),
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LEADER_PAYLOAD: &str = r#"{"race":"Test GP","lap":1,"drivers":[{"id":"max_verstappen","code":"VER","team":"red_bull","position":1,"lapTime":"1:20.000","winProbability":90}]}"#;

    const SECTORS_PAYLOAD: &str = r#"{"race":"Test GP","lap":1,"drivers":[{"id":"verstappen","position":1,"lapTime":"1:20.000","winProbability":90,"sectors":{"s1":21.5,"s2":30.0,"s3":22.0}}]}"#;

    #[test]
    fn test_decode_leader_payload() {
        let snapshot = Snapshot::from_json(LEADER_PAYLOAD).unwrap();
        let first = &snapshot.drivers[0];
        assert_eq!(first.code.as_deref(), Some("VER"));
        assert_eq!(first.position, 1);
        assert_eq!(first.team.as_deref(), Some("red_bull"));
        assert_eq!(snapshot.lap, LapIndicator::Number(1));
        assert!(snapshot.weather.is_none());
        assert!(first.sectors.is_none());
    }

    #[test]
    fn test_sectors_round_trip_exactly() {
        let snapshot = Snapshot::from_json(SECTORS_PAYLOAD).unwrap();
        let sectors = snapshot.drivers[0].sectors.unwrap();
        assert_eq!(sectors.s1, 21.5);
        assert_eq!(sectors.s2, 30.0);
        assert_eq!(sectors.s3, 22.0);
        assert_eq!(sectors.total(), 73.5);
    }

    #[test]
    fn test_display_code_falls_back_to_id() {
        let snapshot = Snapshot::from_json(SECTORS_PAYLOAD).unwrap();
        assert_eq!(snapshot.drivers[0].display_code(), "VER");
    }

    #[test]
    fn test_full_payload_with_optional_fields() {
        let text = r#"{
            "race": "Las Vegas Grand Prix",
            "lap": 42,
            "totalLaps": 50,
            "status": "RACE",
            "weather": {"condition": "Clear", "temp": 21.0},
            "drivers": [
                {"id": "max_verstappen", "code": "VER", "team": "red_bull", "position": 1,
                 "lapTime": "LEAD", "winProbability": 100.0,
                 "sectors": {"s1": 31.73, "s2": 32.69, "s3": 31.73},
                 "coordinates": {"x": 90.0, "y": 50.0},
                 "pitStops": 2, "tyre": "HARD"},
                {"id": "charles_leclerc", "code": "LEC", "team": "ferrari", "position": 2,
                 "lapTime": "+1.234", "winProbability": 50.0}
            ]
        }"#;

        let snapshot = Snapshot::from_json(text).unwrap();
        assert_eq!(snapshot.total_laps, Some(50));
        assert_eq!(snapshot.weather.as_ref().unwrap().condition, "Clear");
        assert_eq!(snapshot.drivers[0].pit_stops, Some(2));
        assert_eq!(snapshot.drivers[0].tyre.as_deref(), Some("HARD"));
        assert_eq!(snapshot.driver("charles_leclerc").unwrap().position, 2);
        assert_eq!(
            snapshot.summary(),
            "Las Vegas Grand Prix | lap 42/50 | RACE | P1 VER"
        );
    }

    #[test]
    fn test_lap_label_accepted() {
        let text = r#"{"race":"Test GP","lap":"FINISHED","drivers":[]}"#;
        let snapshot = Snapshot::from_json(text).unwrap();
        assert_eq!(snapshot.lap, LapIndicator::Label("FINISHED".to_string()));
        assert_eq!(snapshot.summary(), "Test GP | lap FINISHED | no classification");
    }

    #[test]
    fn test_unknown_fields_ignored() {
        let text = r#"{"race":"Test GP","lap":3,"source":"scraper","drivers":[]}"#;
        assert!(Snapshot::from_json(text).is_ok());
    }

    #[test]
    fn test_non_json_rejected() {
        let err = Snapshot::from_json("not json at all").unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_missing_mandatory_driver_field_rejected() {
        let text = r#"{"race":"Test GP","lap":1,"drivers":[{"id":"verstappen","position":1,"winProbability":90}]}"#;
        let err = Snapshot::from_json(text).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
        assert!(err.to_string().contains("lapTime"));
    }

    #[test]
    fn test_missing_drivers_rejected() {
        let err = Snapshot::from_json(r#"{"race":"Test GP","lap":1}"#).unwrap_err();
        assert!(matches!(err, DecodeError::Malformed(_)));
    }

    #[test]
    fn test_duplicate_position_rejected() {
        let text = r#"{"race":"Test GP","lap":1,"drivers":[
            {"id":"a","position":1,"lapTime":"1:20.000","winProbability":50},
            {"id":"b","position":1,"lapTime":"1:20.100","winProbability":50}]}"#;
        let err = Snapshot::from_json(text).unwrap_err();
        assert!(matches!(err, DecodeError::DuplicatePosition { position: 1 }));
    }

    #[test]
    fn test_duplicate_driver_rejected() {
        let text = r#"{"race":"Test GP","lap":1,"drivers":[
            {"id":"a","position":1,"lapTime":"1:20.000","winProbability":50},
            {"id":"a","position":2,"lapTime":"1:20.100","winProbability":50}]}"#;
        let err = Snapshot::from_json(text).unwrap_err();
        assert!(matches!(err, DecodeError::DuplicateDriver { .. }));
    }

    #[test]
    fn test_zero_position_rejected() {
        let text = r#"{"race":"Test GP","lap":1,"drivers":[
            {"id":"a","position":0,"lapTime":"","winProbability":0}]}"#;
        let err = Snapshot::from_json(text).unwrap_err();
        assert!(matches!(err, DecodeError::ZeroPosition { .. }));
    }

    #[test]
    fn test_win_probability_out_of_range_rejected() {
        let text = r#"{"race":"Test GP","lap":1,"drivers":[
            {"id":"a","position":1,"lapTime":"LEAD","winProbability":120.5}]}"#;
        let err = Snapshot::from_json(text).unwrap_err();
        assert!(matches!(err, DecodeError::WinProbabilityOutOfRange { .. }));
    }

    #[test]
    fn test_serialize_omits_absent_optionals() {
        let snapshot = Snapshot::from_json(LEADER_PAYLOAD).unwrap();
        let json = serde_json::to_string(&snapshot).unwrap();
        assert!(json.contains("\"lapTime\":\"1:20.000\""));
        assert!(!json.contains("sectors"));
        assert!(!json.contains("totalLaps"));
    }
}
