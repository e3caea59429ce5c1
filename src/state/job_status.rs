/// Job state definitions for the crawl queue
///
/// Transitions: `queued -> running -> {completed | failed}`,
/// `scheduled -> queued` once the scheduled time passes, and a user stop
/// moves `running -> queued`.
use std::fmt;

/// Represents the current state of a crawl job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobStatus {
    // ===== Waiting States =====
    /// Job holds a queue position and waits for promotion
    Queued,

    /// Job waits for its scheduled time; it has no queue position
    Scheduled,

    // ===== Active State =====
    /// Job is being crawled by a live worker
    Running,

    // ===== Terminal States =====
    /// Crawl finished and at least one site was crawled
    Completed,

    /// Crawl failed, every site failed, or the job was reclaimed as stale
    Failed,
}

impl JobStatus {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the job holds (or waits for) a slot in the queue
    pub fn is_waiting(&self) -> bool {
        matches!(self, Self::Queued | Self::Scheduled)
    }

    /// Returns true if "run now" may promote a job in this state
    ///
    /// Failed jobs can be retried explicitly; completed jobs must be cloned.
    pub fn can_start(&self) -> bool {
        matches!(self, Self::Queued | Self::Scheduled | Self::Failed)
    }

    /// Converts the job status to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Scheduled => "scheduled",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// Parses a job status from its database string representation
    ///
    /// Returns None if the string doesn't match any known status.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(Self::Queued),
            "scheduled" => Some(Self::Scheduled),
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Returns all job statuses in lifecycle order
    pub fn all_statuses() -> Vec<Self> {
        vec![
            Self::Queued,
            Self::Scheduled,
            Self::Running,
            Self::Completed,
            Self::Failed,
        ]
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_terminal() {
        assert!(!JobStatus::Queued.is_terminal());
        assert!(!JobStatus::Scheduled.is_terminal());
        assert!(!JobStatus::Running.is_terminal());

        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn test_can_start() {
        assert!(JobStatus::Queued.can_start());
        assert!(JobStatus::Scheduled.can_start());
        assert!(JobStatus::Failed.can_start());

        assert!(!JobStatus::Running.can_start());
        assert!(!JobStatus::Completed.can_start());
    }

    #[test]
    fn test_is_waiting() {
        assert!(JobStatus::Queued.is_waiting());
        assert!(JobStatus::Scheduled.is_waiting());
        assert!(!JobStatus::Running.is_waiting());
    }

    #[test]
    fn test_db_string_roundtrip() {
        for status in JobStatus::all_statuses() {
            let parsed = JobStatus::from_db_string(status.to_db_string());
            assert_eq!(parsed, Some(status));
        }
    }

    #[test]
    fn test_from_db_string_invalid() {
        assert_eq!(JobStatus::from_db_string("paused"), None);
        assert_eq!(JobStatus::from_db_string("RUNNING"), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", JobStatus::Running), "running");
    }
}
