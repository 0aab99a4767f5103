//! API client for the school-management REST backend.
//!
//! This module provides the `ApiClient` struct, which sends requests,
//! caches GET bodies, and serves a cached body when a GET fails.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::cache::CacheManager;
use crate::connectivity::{Connectivity, ConnectivityState};
use crate::models::{
    AddStudentResponse, AttendanceEntry, AttendanceResponse, AttendanceStatus, Event,
    EventsResponse, MessageResponse, NewAttendance, NewEvent, NewStudent, ScoreEntry,
    ScoresResponse, StudentProfile, StudentsResponse,
};

use super::{ApiError, Method, RequestConfig};

// ============================================================================
// Constants
// ============================================================================

/// Backend used when nothing else is configured
pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

/// HTTP request timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 10_000;

const STUDENTS_PATH: &str = "/get_all_students";
const EVENTS_PATH: &str = "/get_events";

fn profile_path(student_id: &str) -> String {
    format!("/get_students_profile/{}", student_id)
}

fn scores_path(student_id: &str) -> String {
    format!("/get_student_score/{}", student_id)
}

fn attendance_path(student_id: &str) -> String {
    format!("/get_student_attendance/{}", student_id)
}

/// Whether a raw student row carries `student_id`, which the backend may
/// send as a number or a string
fn row_has_id(row: &Value, student_id: &str) -> bool {
    match row.get("student_id") {
        Some(Value::String(id)) => id == student_id,
        Some(Value::Number(id)) => id.to_string() == student_id,
        _ => false,
    }
}

/// API client for the school backend.
/// Clone is cheap - the HTTP client, cache and connectivity are shared.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    cache: Arc<CacheManager>,
    connectivity: Arc<Connectivity>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str, timeout: Duration, cache: CacheManager) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::from_transport)?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            cache: Arc::new(cache),
            connectivity: Arc::new(Connectivity::new()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn is_online(&self) -> bool {
        self.connectivity.is_online()
    }

    /// Send a request, falling back to the cached body for a failed GET.
    ///
    /// A GET first looks up a valid cache entry and keeps it aside. If the
    /// live call succeeds, its body replaces the entry and is returned. If it
    /// fails, the kept entry (if any) is returned as though the call had
    /// succeeded; otherwise the error propagates. Writes never touch the
    /// cache here. Cache failures are logged and read as misses.
    pub async fn request<T: DeserializeOwned>(&self, config: RequestConfig) -> Result<T, ApiError> {
        config.validate()?;

        let key = CacheManager::key_for(config.method, &config.path);
        let fallback = if config.uses_cache() {
            self.cache.load(&key)
        } else {
            None
        };

        match self.send(&config).await {
            Ok(payload) => {
                self.connectivity.set(ConnectivityState::Online);
                if config.uses_cache() {
                    if let Err(e) = self.cache.save(&key, &payload) {
                        warn!(key = %key, error = %e, "Failed to cache response");
                    }
                }
                serde_json::from_value(payload).map_err(|e| {
                    ApiError::InvalidResponse(format!(
                        "Failed to parse response from {}: {}",
                        config.path, e
                    ))
                })
            }
            Err(err) => {
                self.connectivity.set(ConnectivityState::Offline);
                let Some(entry) = fallback else {
                    return Err(err);
                };
                match serde_json::from_value(entry.data) {
                    Ok(data) => {
                        warn!(key = %key, error = %err, "Serving from cache due to error");
                        Ok(data)
                    }
                    Err(e) => {
                        debug!(key = %key, error = %e, "Cached body does not match the expected shape");
                        Err(err)
                    }
                }
            }
        }
    }

    /// Perform the live call and return the body as JSON.
    ///
    /// An empty body reads as `null`; a body that is not JSON is returned
    /// as a JSON string.
    async fn send(&self, config: &RequestConfig) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, config.path);
        debug!(method = %config.method, url = %url, "Sending request");

        let mut request = self.client.request(config.method.into(), &url);
        if !config.params.is_empty() {
            request = request.query(&config.params);
        }
        if let Some(ref body) = config.body {
            request = request.json(body);
        }
        if let Some(timeout) = config.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await.map_err(ApiError::from_transport)?;
        let response = Self::check_response(response).await?;
        let text = response.text().await.map_err(ApiError::from_transport)?;

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    // ===== Convenience Methods =====

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(RequestConfig::get(path)).await
    }

    pub async fn get_with_params<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, &str)],
    ) -> Result<T, ApiError> {
        let config = params
            .iter()
            .fold(RequestConfig::get(path), |config, (k, v)| config.param(*k, v));
        self.request(config).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.request(RequestConfig::post(path).json(body)?).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, ApiError> {
        self.request(RequestConfig::put(path).json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(RequestConfig::delete(path)).await
    }

    /// Remove every cached response. Returns how many entries were removed.
    pub fn clear_cache(&self) -> usize {
        self.cache.clear_all()
    }

    // ===== Cache Maintenance Helpers =====

    fn invalidate(&self, path: &str) {
        let key = CacheManager::key_for(Method::Get, path);
        if let Err(e) = self.cache.invalidate(&key) {
            warn!(key = %key, error = %e, "Failed to invalidate cache entry");
        }
    }

    /// Rewrite the cached student list in place. `patch` works on the raw
    /// rows so fields this client does not model survive, and returns
    /// whether it changed the list. An entry without a `Students` array is
    /// dropped.
    fn patch_cached_students<F>(&self, patch: F)
    where
        F: FnOnce(&mut Vec<Value>) -> bool,
    {
        let key = CacheManager::key_for(Method::Get, STUDENTS_PATH);
        let mut unreadable = false;
        let result = self.cache.update(&key, |data| {
            match data.get_mut("Students").and_then(Value::as_array_mut) {
                Some(rows) => patch(rows),
                None => {
                    unreadable = true;
                    false
                }
            }
        });

        match result {
            Ok(true) => debug!("Patched cached student list"),
            Ok(false) if unreadable => self.invalidate(STUDENTS_PATH),
            Ok(false) => {}
            Err(e) => {
                warn!(error = %e, "Failed to patch cached student list");
                self.invalidate(STUDENTS_PATH);
            }
        }
    }

    /// Merge `fields` into every cached row for `student_id`
    fn merge_cached_student(&self, student_id: &str, fields: Map<String, Value>) {
        self.patch_cached_students(|rows| {
            let mut changed = false;
            for row in rows.iter_mut().filter(|r| row_has_id(r, student_id)) {
                if let Some(existing) = row.as_object_mut() {
                    existing.extend(fields.clone());
                    changed = true;
                }
            }
            changed
        });
    }

    // ===== Data Fetching Methods =====

    /// Fetch every student record
    pub async fn fetch_students(&self) -> Result<Vec<StudentProfile>, ApiError> {
        let response: StudentsResponse = self.get(STUDENTS_PATH).await?;
        Ok(response.students)
    }

    /// Look up the student a guardian is registered for.
    ///
    /// The query parameters are not part of the cache key, so every lookup
    /// shares one cache slot.
    pub async fn fetch_student_profile(&self, guardian_mob: &str, dob: &str) -> Result<StudentProfile, ApiError> {
        self.get_with_params(
            "/get_students_profile",
            &[("guardian_mob", guardian_mob), ("dob", dob)],
        )
        .await
    }

    pub async fn fetch_student_scores(&self, student_id: &str) -> Result<Vec<ScoreEntry>, ApiError> {
        let response: ScoresResponse = self.get(&scores_path(student_id)).await?;
        Ok(response.scores)
    }

    pub async fn fetch_student_attendance(&self, student_id: &str) -> Result<Vec<AttendanceEntry>, ApiError> {
        let response: AttendanceResponse = self.get(&attendance_path(student_id)).await?;
        Ok(response.attendance)
    }

    pub async fn fetch_events(&self) -> Result<Vec<Event>, ApiError> {
        let response: EventsResponse = self.get(EVENTS_PATH).await?;
        Ok(response.events)
    }

    // ===== Write Methods =====

    /// Create a student and add it to the cached student list.
    ///
    /// When the backend does not report the new id the cached list is
    /// dropped instead, so the next read fetches it fresh.
    pub async fn add_student(&self, student: &NewStudent) -> Result<AddStudentResponse, ApiError> {
        student.validate().map_err(ApiError::InvalidRequest)?;
        let response: AddStudentResponse = self.post("/add_student", student).await?;

        match response.student_id {
            Some(ref id) => match serde_json::to_value(StudentProfile::from_new(id.clone(), student)) {
                Ok(row) => self.patch_cached_students(|rows| {
                    rows.push(row);
                    true
                }),
                Err(_) => self.invalidate(STUDENTS_PATH),
            },
            None => self.invalidate(STUDENTS_PATH),
        }
        Ok(response)
    }

    /// Update a student and merge the new fields into the cached list.
    pub async fn modify_student(&self, student_id: &str, student: &NewStudent) -> Result<MessageResponse, ApiError> {
        student.validate().map_err(ApiError::InvalidRequest)?;
        let response: MessageResponse = self
            .put(&format!("/modify_student/{}", student_id), student)
            .await?;

        match serde_json::to_value(student) {
            Ok(Value::Object(fields)) => self.merge_cached_student(student_id, fields),
            _ => self.invalidate(STUDENTS_PATH),
        }
        self.invalidate(&profile_path(student_id));
        Ok(response)
    }

    pub async fn modify_remark(&self, student_id: &str, remark: &str) -> Result<MessageResponse, ApiError> {
        let config = RequestConfig::put(format!("/modify_remark/{}", student_id)).param("remark", remark);
        let response: MessageResponse = self.request(config).await?;

        let mut fields = Map::new();
        fields.insert("Remark".to_string(), Value::String(remark.to_string()));
        self.merge_cached_student(student_id, fields);
        Ok(response)
    }

    /// Delete a student, dropping every cached response about them.
    pub async fn delete_student(&self, student_id: &str) -> Result<MessageResponse, ApiError> {
        let response: MessageResponse = self
            .delete(&format!("/delete_student/{}", student_id))
            .await?;

        self.invalidate(&scores_path(student_id));
        self.invalidate(&attendance_path(student_id));
        self.invalidate(&profile_path(student_id));
        self.patch_cached_students(|rows| {
            let before = rows.len();
            rows.retain(|r| !row_has_id(r, student_id));
            rows.len() != before
        });
        Ok(response)
    }

    pub async fn add_score(&self, score: &ScoreEntry) -> Result<MessageResponse, ApiError> {
        score.validate().map_err(ApiError::InvalidRequest)?;
        let response: MessageResponse = self.post("/add_score", score).await?;
        self.invalidate(&scores_path(&score.student_id));
        Ok(response)
    }

    pub async fn add_attendance(
        &self,
        student_id: &str,
        date: &str,
        status: AttendanceStatus,
    ) -> Result<Value, ApiError> {
        let body = NewAttendance {
            student_id: student_id.to_string(),
            attendance_date: date.to_string(),
            attendance_status: status,
        };
        let response: Value = self.post("/add_attendance", &body).await?;
        self.invalidate(&attendance_path(student_id));
        Ok(response)
    }

    pub async fn add_event(&self, event: &NewEvent) -> Result<MessageResponse, ApiError> {
        let response: MessageResponse = self.post("/add_event", event).await?;
        self.invalidate(EVENTS_PATH);
        Ok(response)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn offline_client() -> ApiClient {
        // Port 9 (discard) on localhost refuses connections
        ApiClient::new(
            "http://127.0.0.1:9/",
            Duration::from_millis(500),
            CacheManager::new(MemoryStore::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        assert_eq!(offline_client().base_url(), "http://127.0.0.1:9");
    }

    #[test]
    fn test_row_has_id() {
        assert!(row_has_id(&serde_json::json!({"student_id": 4}), "4"));
        assert!(row_has_id(&serde_json::json!({"student_id": "4"}), "4"));
        assert!(!row_has_id(&serde_json::json!({"student_id": 41}), "4"));
        assert!(!row_has_id(&serde_json::json!({"name": "x"}), "4"));
    }

    #[test]
    fn test_paths() {
        assert_eq!(scores_path("4"), "/get_student_score/4");
        assert_eq!(attendance_path("4"), "/get_student_attendance/4");
        assert_eq!(profile_path("4"), "/get_students_profile/4");
    }

    #[tokio::test]
    async fn test_invalid_path_rejected_before_io() {
        let client = offline_client();
        let err = client.get::<Value>("students").await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
        // Never reached the network, so connectivity is untouched
        assert!(client.is_online());
    }

    #[tokio::test]
    async fn test_invalid_student_rejected_before_io() {
        let client = offline_client();
        let student = NewStudent {
            name: String::new(),
            dob: "2012-01-01".into(),
            class_id: "1".into(),
            class_teacher: "T".into(),
            guardian_name: "G".into(),
            guardian_mob: "9876543210".into(),
            guardian_mail: "g@example.com".into(),
            student_gender: crate::models::Gender::Other,
        };
        let err = client.add_student(&student).await.unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_goes_offline() {
        let client = offline_client();
        let err = client.get::<Value>("/get_events").await.unwrap_err();
        assert!(err.is_transport());
        assert!(!client.is_online());
    }
}
