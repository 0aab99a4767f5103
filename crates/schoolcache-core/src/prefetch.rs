//! Warm the response cache ahead of going offline.
//!
//! Fetches the student list and events, then every student's scores and
//! attendance with limited concurrency. Each successful GET lands in the
//! cache through the normal request path, so later reads can fall back to
//! it while the backend is unreachable.

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, ApiError};

/// Students fetched concurrently per batch
const MAX_CONCURRENT: usize = 5;

#[derive(Debug, Default)]
pub struct PrefetchReport {
    pub students: usize,
    /// Number of responses that completed successfully
    pub fetched: usize,
    /// (what, error) for each fetch that failed
    pub failed: Vec<(String, String)>,
    /// Connectivity once everything has finished
    pub online: bool,
}

/// Fetch everything the CLI can display. Fails only if the student list
/// itself cannot be fetched.
pub async fn prefetch_all(client: &ApiClient) -> Result<PrefetchReport, ApiError> {
    info!("Prefetching data for offline use");

    let students = client.fetch_students().await?;
    let mut report = PrefetchReport {
        students: students.len(),
        fetched: 1,
        ..Default::default()
    };

    match client.fetch_events().await {
        Ok(events) => {
            debug!(count = events.len(), "Events fetched");
            report.fetched += 1;
        }
        Err(e) => {
            warn!(error = %e, "Failed to fetch events");
            report.failed.push(("events".to_string(), e.to_string()));
        }
    }

    let ids: Vec<&str> = students.iter().map(|s| s.student_id.as_str()).collect();
    for chunk in ids.chunks(MAX_CONCURRENT) {
        let futures: Vec<_> = chunk
            .iter()
            .map(|&id| {
                let client = client.clone();
                async move {
                    let scores = client.fetch_student_scores(id).await.map(|s| s.len());
                    let attendance = client.fetch_student_attendance(id).await.map(|a| a.len());
                    (id, scores, attendance)
                }
            })
            .collect();

        for (id, scores, attendance) in join_all(futures).await {
            match scores {
                Ok(count) => {
                    debug!(student_id = id, count, "Scores fetched");
                    report.fetched += 1;
                }
                Err(e) => report.failed.push((format!("scores for {}", id), e.to_string())),
            }
            match attendance {
                Ok(count) => {
                    debug!(student_id = id, count, "Attendance fetched");
                    report.fetched += 1;
                }
                Err(e) => report.failed.push((format!("attendance for {}", id), e.to_string())),
            }
        }
    }

    report.online = client.is_online();
    info!(
        students = report.students,
        fetched = report.fetched,
        failed = report.failed.len(),
        "Prefetch complete"
    );
    Ok(report)
}
