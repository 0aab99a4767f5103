use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::{opt_string_or_number, string_or_number};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Gender::Male => write!(f, "Male"),
            Gender::Female => write!(f, "Female"),
            Gender::Other => write!(f, "Other"),
        }
    }
}

/// A student record as returned by `/get_all_students` and
/// `/get_students_profile`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(default)]
pub struct StudentProfile {
    #[serde(deserialize_with = "string_or_number")]
    pub student_id: String,
    pub name: String,
    pub dob: String,
    #[serde(deserialize_with = "string_or_number")]
    pub class_id: String,
    pub class_teacher: String,
    pub guardian_name: String,
    #[serde(deserialize_with = "string_or_number")]
    pub guardian_mob: String,
    pub guardian_mail: String,
    pub student_gender: String,
    #[serde(rename = "Remark")]
    pub remark: Option<String>,
}

impl StudentProfile {
    pub fn from_new(student_id: impl Into<String>, student: &NewStudent) -> Self {
        let mut profile = Self {
            student_id: student_id.into(),
            ..Default::default()
        };
        profile.apply(student);
        profile
    }

    /// Overwrite the editable fields with those of `student`
    pub fn apply(&mut self, student: &NewStudent) {
        self.name = student.name.clone();
        self.dob = student.dob.clone();
        self.class_id = student.class_id.clone();
        self.class_teacher = student.class_teacher.clone();
        self.guardian_name = student.guardian_name.clone();
        self.guardian_mob = student.guardian_mob.clone();
        self.guardian_mail = student.guardian_mail.clone();
        self.student_gender = student.student_gender.to_string();
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct StudentsResponse {
    #[serde(rename = "Students", default)]
    pub students: Vec<StudentProfile>,
}

/// Body for creating or modifying a student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewStudent {
    pub name: String,
    /// YYYY-MM-DD
    pub dob: String,
    pub class_id: String,
    pub class_teacher: String,
    pub guardian_name: String,
    pub guardian_mob: String,
    pub guardian_mail: String,
    pub student_gender: Gender,
}

impl NewStudent {
    /// Check the constraints the backend enforces, so obviously bad input
    /// never leaves the client.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name must not be empty".to_string());
        }
        if NaiveDate::parse_from_str(&self.dob, "%Y-%m-%d").is_err() {
            return Err(format!("dob must be YYYY-MM-DD, got '{}'", self.dob));
        }
        if self.class_id.is_empty() || !self.class_id.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("class_id must be numeric, got '{}'", self.class_id));
        }
        let mob = &self.guardian_mob;
        if mob.len() != 10 || !mob.chars().all(|c| c.is_ascii_digit()) || mob.starts_with('0') {
            return Err(format!("guardian_mob must be a 10-digit number, got '{}'", mob));
        }
        match self.guardian_mail.split_once('@') {
            Some((user, domain)) if !user.is_empty() && domain.contains('.') => {}
            _ => return Err(format!("guardian_mail is not an email address: '{}'", self.guardian_mail)),
        }
        Ok(())
    }
}

/// Acknowledgement returned by `/add_student`. Newer backends include the
/// id of the created record.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AddStudentResponse {
    pub message: Option<String>,
    #[serde(deserialize_with = "opt_string_or_number")]
    pub student_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> NewStudent {
        NewStudent {
            name: "Asha Rao".to_string(),
            dob: "2012-04-09".to_string(),
            class_id: "6".to_string(),
            class_teacher: "Mrs. Iyer".to_string(),
            guardian_name: "Ravi Rao".to_string(),
            guardian_mob: "9876543210".to_string(),
            guardian_mail: "ravi@example.com".to_string(),
            student_gender: Gender::Female,
        }
    }

    #[test]
    fn test_parse_backend_row() {
        let json = r#"{"student_id": 12, "name": "Asha Rao", "dob": "2012-04-09", "class_id": 6,
            "class_teacher": "Mrs. Iyer", "guardian_name": "Ravi Rao", "guardian_mob": 9876543210,
            "guardian_mail": "ravi@example.com", "student_gender": "Female", "Remark": null}"#;
        let student: StudentProfile = serde_json::from_str(json).expect("Failed to parse student JSON");
        assert_eq!(student.student_id, "12");
        assert_eq!(student.class_id, "6");
        assert_eq!(student.guardian_mob, "9876543210");
        assert_eq!(student.remark, None);
    }

    #[test]
    fn test_parse_students_response() {
        let json = r#"{"Students": [{"student_id": "1", "name": "A"}, {"student_id": 2, "name": "B", "Remark": "Good"}]}"#;
        let resp: StudentsResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.students.len(), 2);
        assert_eq!(resp.students[1].student_id, "2");
        assert_eq!(resp.students[1].remark.as_deref(), Some("Good"));
    }

    #[test]
    fn test_from_new_and_apply() {
        let new = sample();
        let mut profile = StudentProfile::from_new("5", &new);
        assert_eq!(profile.student_id, "5");
        assert_eq!(profile.student_gender, "Female");

        profile.remark = Some("Keep it up".to_string());
        let mut changed = new.clone();
        changed.class_id = "7".to_string();
        profile.apply(&changed);
        assert_eq!(profile.class_id, "7");
        // Remark is not part of the editable fields
        assert_eq!(profile.remark.as_deref(), Some("Keep it up"));
    }

    #[test]
    fn test_validate() {
        assert!(sample().validate().is_ok());

        let mut bad = sample();
        bad.dob = "09-04-2012".to_string();
        assert!(bad.validate().unwrap_err().contains("dob"));

        let mut bad = sample();
        bad.guardian_mob = "12345".to_string();
        assert!(bad.validate().unwrap_err().contains("guardian_mob"));

        let mut bad = sample();
        bad.guardian_mail = "ravi.example.com".to_string();
        assert!(bad.validate().unwrap_err().contains("guardian_mail"));

        let mut bad = sample();
        bad.class_id = "six".to_string();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_add_student_response_without_id() {
        let resp: AddStudentResponse =
            serde_json::from_str(r#"{"message": "Student added successfully"}"#).unwrap();
        assert_eq!(resp.student_id, None);

        let resp: AddStudentResponse = serde_json::from_str(r#"{"student_id": 41}"#).unwrap();
        assert_eq!(resp.student_id.as_deref(), Some("41"));
    }
}
