use serde::{Deserialize, Serialize};

use super::string_or_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum TestType {
    Midterm,
    Final,
}

impl std::fmt::Display for TestType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TestType::Midterm => write!(f, "Midterm"),
            TestType::Final => write!(f, "Final"),
        }
    }
}

/// One mark for one subject. Also the body of `/add_score`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ScoreEntry {
    #[serde(deserialize_with = "string_or_number")]
    pub student_id: String,
    pub subject: String,
    pub marks: f64,
    pub test_date: String,
    pub test_type: TestType,
}

impl ScoreEntry {
    pub fn validate(&self) -> Result<(), String> {
        if !(0.0..=100.0).contains(&self.marks) {
            return Err(format!("marks must be between 0 and 100, got {}", self.marks));
        }
        if chrono::NaiveDate::parse_from_str(&self.test_date, "%Y-%m-%d").is_err() {
            return Err(format!("test_date must be YYYY-MM-DD, got '{}'", self.test_date));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct ScoresResponse {
    #[serde(rename = "Scores", default)]
    pub scores: Vec<ScoreEntry>,
}

/// Marks for one sitting (date and test type), one column per subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct FormattedScore {
    pub date: String,
    #[serde(rename = "testType")]
    pub test_type: TestType,
    #[serde(rename = "Math")]
    pub math: Option<f64>,
    #[serde(rename = "Science")]
    pub science: Option<f64>,
    #[serde(rename = "English")]
    pub english: Option<f64>,
    #[serde(rename = "History")]
    pub history: Option<f64>,
}

impl FormattedScore {
    fn empty(date: &str, test_type: TestType) -> Self {
        Self {
            date: date.to_string(),
            test_type,
            math: None,
            science: None,
            english: None,
            history: None,
        }
    }

    fn slot(&mut self, subject: &str) -> Option<&mut Option<f64>> {
        match subject.trim().to_ascii_lowercase().as_str() {
            "math" | "maths" | "mathematics" => Some(&mut self.math),
            "science" => Some(&mut self.science),
            "english" => Some(&mut self.english),
            "history" => Some(&mut self.history),
            _ => None,
        }
    }

    /// Pivot entries into one row per (date, test type), ordered by date.
    /// Subjects outside the four charted ones are dropped; a repeated
    /// subject in the same sitting keeps the last mark.
    pub fn from_entries(entries: &[ScoreEntry]) -> Vec<FormattedScore> {
        let mut rows: Vec<FormattedScore> = Vec::new();
        for entry in entries {
            let idx = match rows
                .iter()
                .position(|r| r.date == entry.test_date && r.test_type == entry.test_type)
            {
                Some(idx) => idx,
                None => {
                    rows.push(Self::empty(&entry.test_date, entry.test_type));
                    rows.len() - 1
                }
            };
            if let Some(slot) = rows[idx].slot(&entry.subject) {
                *slot = Some(entry.marks);
            }
        }
        rows.sort_by(|a, b| a.date.cmp(&b.date).then(a.test_type.cmp(&b.test_type)));
        rows
    }

    /// Mean of the subjects present in this row
    pub fn average(&self) -> Option<f64> {
        let marks: Vec<f64> = [self.math, self.science, self.english, self.history]
            .into_iter()
            .flatten()
            .collect();
        if marks.is_empty() {
            None
        } else {
            Some(marks.iter().sum::<f64>() / marks.len() as f64)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(subject: &str, marks: f64, date: &str, test_type: TestType) -> ScoreEntry {
        ScoreEntry {
            student_id: "1".to_string(),
            subject: subject.to_string(),
            marks,
            test_date: date.to_string(),
            test_type,
        }
    }

    #[test]
    fn test_parse_scores_response() {
        let json = r#"{"Scores": [{"student_id": 1, "subject": "Math", "marks": 88, "test_date": "2025-02-01", "test_type": "Midterm"}]}"#;
        let resp: ScoresResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.scores[0].student_id, "1");
        assert_eq!(resp.scores[0].marks, 88.0);
        assert_eq!(resp.scores[0].test_type, TestType::Midterm);
    }

    #[test]
    fn test_pivot_groups_by_sitting() {
        let entries = vec![
            entry("English", 70.0, "2025-03-01", TestType::Final),
            entry("Math", 85.0, "2025-02-01", TestType::Midterm),
            entry("Science", 78.0, "2025-02-01", TestType::Midterm),
            entry("Mathematics", 90.0, "2025-03-01", TestType::Final),
            entry("Art", 99.0, "2025-03-01", TestType::Final),
        ];
        let rows = FormattedScore::from_entries(&entries);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "2025-02-01");
        assert_eq!(rows[0].math, Some(85.0));
        assert_eq!(rows[0].science, Some(78.0));
        assert_eq!(rows[0].english, None);
        assert_eq!(rows[1].math, Some(90.0));
        assert_eq!(rows[1].english, Some(70.0));
        assert_eq!(rows[1].average(), Some(80.0));
    }

    #[test]
    fn test_validate_marks_range() {
        assert!(entry("Math", 100.0, "2025-02-01", TestType::Final).validate().is_ok());
        assert!(entry("Math", 101.0, "2025-02-01", TestType::Final).validate().is_err());
        assert!(entry("Math", 50.0, "Feb 1", TestType::Final).validate().is_err());
    }

    #[test]
    fn test_formatted_wire_names() {
        let row = FormattedScore::empty("2025-02-01", TestType::Final);
        let value = serde_json::to_value(&row).unwrap();
        assert_eq!(value["testType"], "Final");
        assert!(value.get("Math").is_some());
    }
}
