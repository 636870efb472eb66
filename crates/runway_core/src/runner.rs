use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Online,
    Offline,
}

/// A worker registered with the registration service by the runner process on an instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    pub id: String,
    pub name: String,
    pub status: RegistrationStatus,
    pub busy: bool,
    pub labels: Vec<String>,
}

impl Registration {
    pub fn is_online(&self) -> bool {
        self.status == RegistrationStatus::Online
    }

    /// True if this registration carries every label in `labels`.
    pub fn has_labels(&self, labels: &[String]) -> bool {
        labels.iter().all(|l| self.labels.iter().any(|own| own == l))
    }
}

/// Short-lived token a runner uses to register itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}
