//! Data models for the school-management API.
//!
//! This module contains the typed views of the backend's JSON bodies:
//!
//! - `StudentProfile`, `NewStudent`: student records
//! - `ScoreEntry`, `FormattedScore`: marks and the per-sitting pivot
//! - `AttendanceEntry`, `AttendanceSummary`: daily attendance
//! - `Event`, `NewEvent`: calendar events
//!
//! The backend returns ids as numbers in some places and strings in others;
//! all ids are exposed as strings.

pub mod attendance;
pub mod event;
pub mod score;
pub mod student;

use serde::{Deserialize, Deserializer};

pub use attendance::{AttendanceEntry, AttendanceResponse, AttendanceStatus, AttendanceSummary, NewAttendance};
pub use event::{Event, EventsResponse, NewEvent};
pub use score::{FormattedScore, ScoreEntry, ScoresResponse, TestType};
pub use student::{AddStudentResponse, Gender, NewStudent, StudentProfile, StudentsResponse};

/// Acknowledgement body returned by write endpoints
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Int(i64),
    Float(f64),
}

impl From<RawId> for String {
    fn from(raw: RawId) -> Self {
        match raw {
            RawId::Text(s) => s,
            RawId::Int(n) => n.to_string(),
            RawId::Float(f) => f.to_string(),
        }
    }
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    RawId::deserialize(deserializer).map(String::from)
}

pub(crate) fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<RawId>::deserialize(deserializer).map(|raw| raw.map(String::from))
}
