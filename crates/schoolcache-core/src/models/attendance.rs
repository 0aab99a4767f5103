use serde::{Deserialize, Serialize};

use super::string_or_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum AttendanceStatus {
    #[serde(rename = "P")]
    Present,
    #[serde(rename = "A")]
    Absent,
}

impl std::str::FromStr for AttendanceStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "P" | "PRESENT" => Ok(AttendanceStatus::Present),
            "A" | "ABSENT" => Ok(AttendanceStatus::Absent),
            other => Err(format!("unknown attendance status '{}', expected P or A", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AttendanceEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub attendance_id: String,
    #[serde(deserialize_with = "string_or_number")]
    pub student_id: String,
    pub attendance_date: String,
    pub attendance_remarks: AttendanceStatus,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AttendanceResponse {
    #[serde(rename = "Attendance", default)]
    pub attendance: Vec<AttendanceEntry>,
}

/// Body of `/add_attendance`
#[derive(Debug, Clone, Serialize)]
pub struct NewAttendance {
    pub student_id: String,
    pub attendance_date: String,
    pub attendance_status: AttendanceStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AttendanceSummary {
    pub total_days: usize,
    pub present_days: usize,
    pub absent_days: usize,
    /// Percentage of days present, 0 when nothing is recorded
    pub present_rate: f64,
}

impl AttendanceSummary {
    pub fn from_entries(entries: &[AttendanceEntry]) -> Self {
        let total_days = entries.len();
        let present_days = entries
            .iter()
            .filter(|e| e.attendance_remarks == AttendanceStatus::Present)
            .count();
        let present_rate = if total_days == 0 {
            0.0
        } else {
            present_days as f64 * 100.0 / total_days as f64
        };
        Self {
            total_days,
            present_days,
            absent_days: total_days - present_days,
            present_rate,
        }
    }

    pub fn absent_rate(&self) -> f64 {
        if self.total_days == 0 {
            0.0
        } else {
            100.0 - self.present_rate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let json = r#"{"Attendance": [
            {"attendance_id": 1, "student_id": 3, "attendance_date": "2025-02-03", "attendance_remarks": "P"},
            {"attendance_id": 2, "student_id": 3, "attendance_date": "2025-02-04", "attendance_remarks": "P"},
            {"attendance_id": 3, "student_id": 3, "attendance_date": "2025-02-05", "attendance_remarks": "P"},
            {"attendance_id": 4, "student_id": 3, "attendance_date": "2025-02-06", "attendance_remarks": "A"}
        ]}"#;
        let resp: AttendanceResponse = serde_json::from_str(json).unwrap();
        let summary = AttendanceSummary::from_entries(&resp.attendance);
        assert_eq!(summary.total_days, 4);
        assert_eq!(summary.present_days, 3);
        assert_eq!(summary.absent_days, 1);
        assert_eq!(summary.present_rate, 75.0);
        assert_eq!(summary.absent_rate(), 25.0);
    }

    #[test]
    fn test_empty_summary() {
        let summary = AttendanceSummary::from_entries(&[]);
        assert_eq!(summary.present_rate, 0.0);
        assert_eq!(summary.absent_rate(), 0.0);
    }

    #[test]
    fn test_status_from_str() {
        assert_eq!("p".parse::<AttendanceStatus>(), Ok(AttendanceStatus::Present));
        assert_eq!("Absent".parse::<AttendanceStatus>(), Ok(AttendanceStatus::Absent));
        assert!("late".parse::<AttendanceStatus>().is_err());
    }
}
