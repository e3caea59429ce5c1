use crate::sink::SinkError;

/// One progress report from a running crawl
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub job_id: Option<i64>,
    pub sites_done: usize,
    pub sites_total: usize,
    pub message: String,
}

impl ProgressUpdate {
    /// Completed share of seed sites, 0..=100
    pub fn percent(&self) -> u8 {
        if self.sites_total == 0 {
            return 100;
        }
        let done = self.sites_done.min(self.sites_total);
        ((done * 100) / self.sites_total) as u8
    }
}

/// Receives progress reports during crawling
pub trait ProgressSink: Send + Sync {
    fn report(&self, update: &ProgressUpdate) -> Result<(), SinkError>;
}

/// Progress sink that only logs
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn report(&self, update: &ProgressUpdate) -> Result<(), SinkError> {
        tracing::info!(
            "[{}%] {} ({}/{} sites)",
            update.percent(),
            update.message,
            update.sites_done,
            update.sites_total
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(done: usize, total: usize) -> ProgressUpdate {
        ProgressUpdate {
            job_id: None,
            sites_done: done,
            sites_total: total,
            message: "crawled".to_string(),
        }
    }

    #[test]
    fn test_percent() {
        assert_eq!(update(0, 4).percent(), 0);
        assert_eq!(update(1, 3).percent(), 33);
        assert_eq!(update(4, 4).percent(), 100);
        assert_eq!(update(9, 4).percent(), 100);
        assert_eq!(update(0, 0).percent(), 100);
    }

    #[test]
    fn test_tracing_progress_never_fails() {
        assert!(TracingProgress.report(&update(1, 2)).is_ok());
    }
}
