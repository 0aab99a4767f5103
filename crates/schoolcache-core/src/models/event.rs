use serde::{Deserialize, Serialize};

use super::string_or_number;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(default)]
pub struct Event {
    #[serde(alias = "id", deserialize_with = "string_or_number")]
    pub event_id: String,
    pub title: String,
    #[serde(alias = "description")]
    pub event_desc: String,
    /// YYYY-MM-DD
    pub date: String,
    /// HH:MM
    pub time: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct EventsResponse {
    #[serde(rename = "Events", default)]
    pub events: Vec<Event>,
}

impl EventsResponse {
    /// Events on or after `date` (YYYY-MM-DD), soonest first
    pub fn upcoming(&self, date: &str) -> Vec<&Event> {
        let mut events: Vec<&Event> = self
            .events
            .iter()
            .filter(|e| e.date.as_str() >= date)
            .collect();
        events.sort_by(|a, b| (a.date.as_str(), a.time.as_str()).cmp(&(b.date.as_str(), b.time.as_str())));
        events
    }
}

/// Body of `/add_event`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct NewEvent {
    pub title: String,
    pub event_desc: String,
    pub date: String,
    pub time: String,
}
