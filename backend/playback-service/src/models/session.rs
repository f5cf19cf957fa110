/// Playback session and progress models
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Live state of one (user, content) playback, held in the cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: String,
    pub user_id: String,
    pub content_id: String,
    pub start_time: DateTime<Utc>,
    pub last_update_time: DateTime<Utc>,
    pub current_position: f64,
    pub duration: f64,
    pub progress: f64,
    pub quality: Option<String>,
    pub provider: Option<String>,
    pub is_active: bool,
}

impl Session {
    pub fn start(user_id: &str, content_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id(user_id, content_id, now),
            user_id: user_id.to_string(),
            content_id: content_id.to_string(),
            start_time: now,
            last_update_time: now,
            current_position: 0.0,
            duration: 0.0,
            progress: 0.0,
            quality: None,
            provider: None,
            is_active: true,
        }
    }

    pub fn to_progress(&self) -> ProgressRecord {
        ProgressRecord {
            user_id: self.user_id.clone(),
            content_id: self.content_id.clone(),
            current_position: self.current_position,
            duration: self.duration,
            progress_percent: self.progress,
            last_update_time: self.last_update_time,
        }
    }
}

/// `{userId}_{contentId}_{startMillis}`
pub fn session_id(user_id: &str, content_id: &str, started: DateTime<Utc>) -> String {
    format!("{}_{}_{}", user_id, content_id, started.timestamp_millis())
}

/// Durable projection of a session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressRecord {
    pub user_id: String,
    pub content_id: String,
    pub current_position: f64,
    pub duration: f64,
    pub progress_percent: f64,
    pub last_update_time: DateTime<Utc>,
}

/// Body of a progress report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    pub current_time: f64,
    pub duration: f64,
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

impl ProgressUpdate {
    pub fn new(current_time: f64, duration: f64) -> Self {
        Self {
            current_time,
            duration,
            progress: None,
            quality: None,
            provider: None,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if !self.current_time.is_finite() || self.current_time < 0.0 {
            return Err("currentTime must be a non-negative number".to_string());
        }
        if !self.duration.is_finite() || self.duration <= 0.0 {
            return Err("duration must be a positive number".to_string());
        }
        if let Some(progress) = self.progress {
            if !progress.is_finite() || !(0.0..=100.0).contains(&progress) {
                return Err("progress must be between 0 and 100".to_string());
            }
        }
        Ok(())
    }

    /// Client-supplied percentage, else derived from position and duration
    pub fn progress_percent(&self) -> f64 {
        self.progress
            .unwrap_or_else(|| (self.current_time / self.duration * 100.0).clamp(0.0, 100.0))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub user_id: String,
    pub content_id: String,
    #[serde(default)]
    pub quality: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndSessionRequest {
    pub user_id: String,
    pub content_id: String,
}

/// Session plus its remaining cache lifetime
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    #[serde(flatten)]
    pub session: Session,
    pub expires_in_seconds: Option<u64>,
}

/// One row of a user's watch history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchHistoryEntry {
    pub content_id: String,
    pub last_position: f64,
    pub duration: f64,
    pub progress: f64,
    pub last_watched: DateTime<Utc>,
}

/// Content ranked by distinct recent viewers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PopularContent {
    pub content_id: String,
    pub viewers: i64,
}
