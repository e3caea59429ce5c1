//! Crawler coordinator - multi-site crawl orchestration
//!
//! This module fans one crawl job out across its seed sites:
//! - Resolving seed sites (configured, or via the auxiliary search)
//! - Running one `SiteCrawler` per seed on a bounded worker pool
//! - Isolating per-site failures and panics
//! - Reporting progress and aggregating a `CrawlSummary`

use crate::config::{Config, CrawlerConfig, JobSpec};
use crate::crawler::fetcher::build_http_client;
use crate::crawler::site::{CrawlLimits, SiteCrawler, SiteReport, StopSignal};
use crate::filter::{FilterRules, HttpSizeProbe, SizeProbe};
use crate::search::{DuckDuckGoSearch, SearchProvider};
use crate::sink::{DiscoveryNotifier, NoopNotifier, ProgressSink, ProgressUpdate, TracingProgress};
use crate::storage::{BatchWriter, SharedStorage};
use crate::url::{extract_domain, seed_url, site_root};
use crate::ScoutError;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use url::Url;

/// Everything a coordinator needs to crawl one job
#[derive(Debug, Clone, PartialEq)]
pub struct CrawlPlan {
    pub job_id: Option<i64>,
    /// Configured seed sites; empty means "resolve via search"
    pub sites: Vec<String>,
    /// Keyword string for seed discovery
    pub query: String,
    pub rules: FilterRules,
    pub limits: CrawlLimits,
}

impl CrawlPlan {
    /// Builds the plan for a job definition
    pub fn from_job(job_id: Option<i64>, spec: &JobSpec, crawler: &CrawlerConfig) -> Self {
        Self {
            job_id,
            sites: spec.sites.clone(),
            query: spec.search_query(),
            rules: FilterRules::from_job(spec),
            limits: CrawlLimits {
                max_depth: spec.max_depth,
                follow_links: spec.follow_links,
                max_links_per_page: crawler.max_links_per_page,
            },
        }
    }
}

/// Aggregate result of a multi-site crawl
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CrawlSummary {
    /// One report per seed, in seed order
    pub reports: Vec<SiteReport>,
    /// Rows inserted across all sites (post-dedup)
    pub persisted: usize,
    /// Candidates accepted across all sites (pre-dedup)
    pub emitted: usize,
}

impl CrawlSummary {
    fn from_reports(reports: Vec<SiteReport>) -> Self {
        let persisted = reports.iter().map(|r| r.persisted).sum();
        let emitted = reports.iter().map(|r| r.emitted).sum();
        Self {
            reports,
            persisted,
            emitted,
        }
    }

    /// Sites whose seed could not be crawled
    pub fn failed_sites(&self) -> impl Iterator<Item = &SiteReport> {
        self.reports.iter().filter(|r| r.failed())
    }

    /// True when there was at least one site and every site failed
    pub fn all_failed(&self) -> bool {
        !self.reports.is_empty() && self.reports.iter().all(SiteReport::failed)
    }

    /// True when any site abandoned its traversal because of a stop
    pub fn stopped(&self) -> bool {
        self.reports.iter().any(|r| r.stopped)
    }

    /// One-line summary for logs and the job's result field
    pub fn describe(&self) -> String {
        let failed = self.failed_sites().count();
        let mut text = format!(
            "{} sites crawled, {} failed, {} files accepted, {} new",
            self.reports.len(),
            failed,
            self.emitted,
            self.persisted
        );
        if failed > 0 {
            let errors: Vec<&str> = self
                .failed_sites()
                .filter_map(|r| r.error.as_deref())
                .collect();
            text.push_str(&format!(" (errors: {})", errors.join("; ")));
        }
        text
    }
}

/// Runs crawl plans across their seed sites
#[derive(Clone)]
pub struct Coordinator {
    client: Client,
    storage: SharedStorage,
    search: Arc<dyn SearchProvider>,
    probe: Arc<dyn SizeProbe>,
    notifier: Arc<dyn DiscoveryNotifier>,
    progress: Arc<dyn ProgressSink>,
    max_site_workers: usize,
    batch_size: usize,
}

impl Coordinator {
    /// Creates a coordinator with the HTTP collaborators described by the
    /// configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The loaded configuration
    /// * `storage` - Store receiving discovered files and ledger updates
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(ScoutError)` - The HTTP client or search endpoint is invalid
    pub fn new(config: &Config, storage: SharedStorage) -> Result<Self, ScoutError> {
        let client = build_http_client(&config.crawler, &config.user_agent)?;
        let search = DuckDuckGoSearch::new(client.clone(), &config.search)?;
        let probe = HttpSizeProbe::new(
            client.clone(),
            Duration::from_secs(config.crawler.size_probe_timeout_secs),
        );

        Ok(Self {
            client,
            storage,
            search: Arc::new(search),
            probe: Arc::new(probe),
            notifier: Arc::new(NoopNotifier),
            progress: Arc::new(TracingProgress),
            max_site_workers: config.crawler.max_site_workers,
            batch_size: config.crawler.batch_size,
        })
    }

    pub fn with_search(mut self, search: Arc<dyn SearchProvider>) -> Self {
        self.search = search;
        self
    }

    pub fn with_size_probe(mut self, probe: Arc<dyn SizeProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn DiscoveryNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Resolves the seed URLs of a plan
    ///
    /// Configured sites are used as given (`https://` is assumed when no
    /// scheme is present). With no configured sites, one search is issued
    /// and the distinct result domains, in result order, become
    /// `scheme://domain/` seeds; excluded sites are dropped.
    pub async fn resolve_seeds(&self, plan: &CrawlPlan) -> Result<Vec<Url>, ScoutError> {
        if !plan.sites.is_empty() {
            let mut seeds = Vec::with_capacity(plan.sites.len());
            for site in &plan.sites {
                match seed_url(site) {
                    Ok(url) => seeds.push(url),
                    Err(e) => tracing::warn!("Skipping seed site '{}': {}", site, e),
                }
            }
            return Ok(seeds);
        }

        if plan.query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let results = self.search.search(&plan.query).await?;
        let mut seen = HashSet::new();
        let mut seeds = Vec::new();

        for result in results {
            let Some(domain) = extract_domain(&result) else {
                continue;
            };
            if !seen.insert(domain.clone()) {
                continue;
            }
            if plan.rules.is_excluded_domain(&domain) {
                tracing::debug!("Dropping excluded search result site {}", domain);
                continue;
            }
            if let Some(root) = site_root(&result) {
                seeds.push(root);
            }
        }

        tracing::info!(
            "Search for '{}' yielded {} seed sites",
            plan.query,
            seeds.len()
        );
        Ok(seeds)
    }

    /// Crawls every seed of the plan and waits for all of them
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlSummary)` - Every worker terminated; per-site failures are
    ///   recorded in the reports
    /// * `Err(ScoutError)` - Seed resolution failed or produced no seeds
    pub async fn run(
        &self,
        plan: CrawlPlan,
        stop: Arc<dyn StopSignal>,
    ) -> Result<CrawlSummary, ScoutError> {
        let seeds = self.resolve_seeds(&plan).await?;
        if seeds.is_empty() {
            return Err(ScoutError::NoSeedSites { query: plan.query });
        }

        let total = seeds.len();
        let workers = self.max_site_workers.clamp(1, total);
        tracing::info!("Crawling {} seed sites with {} workers", total, workers);

        let semaphore = Arc::new(Semaphore::new(workers));
        let crawler = SiteCrawler::new(
            self.client.clone(),
            Arc::new(plan.rules),
            self.probe.clone(),
            stop,
            plan.limits,
            plan.job_id,
        );

        let mut tasks = JoinSet::new();
        for (index, seed) in seeds.into_iter().enumerate() {
            let semaphore = semaphore.clone();
            let crawler = crawler.clone();
            let writer = BatchWriter::new(
                self.storage.clone(),
                self.notifier.clone(),
                plan.job_id,
                self.batch_size,
            );

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                let report = run_isolated(crawler, seed, writer).await;
                (index, report)
            });
        }

        let mut reports: Vec<(usize, SiteReport)> = Vec::with_capacity(total);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, report)) => {
                    self.report_progress(plan.job_id, reports.len() + 1, total, &report);
                    reports.push((index, report));
                }
                Err(e) => tracing::error!("Site worker could not be joined: {}", e),
            }
        }

        reports.sort_by_key(|(index, _)| *index);
        let summary = CrawlSummary::from_reports(reports.into_iter().map(|(_, r)| r).collect());
        tracing::info!("Crawl finished: {}", summary.describe());
        Ok(summary)
    }

    fn report_progress(&self, job_id: Option<i64>, done: usize, total: usize, report: &SiteReport) {
        let message = match &report.error {
            Some(error) => format!("Failed {}: {}", report.seed, error),
            None => format!("Completed {}: {} new files", report.seed, report.persisted),
        };
        let update = ProgressUpdate {
            job_id,
            sites_done: done,
            sites_total: total,
            message,
        };
        if let Err(e) = self.progress.report(&update) {
            tracing::debug!("Progress sink error ignored: {}", e);
        }
    }
}

/// Runs one site crawl on its own task so a panic becomes a site error
async fn run_isolated(crawler: SiteCrawler, seed: Url, writer: BatchWriter) -> SiteReport {
    let fallback = SiteReport::new(&seed);
    match tokio::spawn(async move { crawler.crawl(seed, writer).await }).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!("Site worker for {} failed: {}", fallback.seed, e);
            SiteReport {
                error: Some(format!("worker failed: {}", e)),
                ..fallback
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::NeverStop;
    use crate::filter::NoSizeProbe;
    use crate::search::SearchError;
    use crate::sink::SinkError;
    use crate::storage::{shared, SqliteStorage};
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FixedSearch(Vec<&'static str>);

    #[async_trait]
    impl SearchProvider for FixedSearch {
        async fn search(&self, _query: &str) -> Result<Vec<Url>, SearchError> {
            Ok(self.0.iter().map(|u| Url::parse(u).unwrap()).collect())
        }
    }

    struct FailingProgress(Mutex<usize>);

    impl ProgressSink for FailingProgress {
        fn report(&self, _update: &ProgressUpdate) -> Result<(), SinkError> {
            *self.0.lock().unwrap() += 1;
            Err(SinkError::Closed)
        }
    }

    fn config() -> Config {
        toml::from_str(
            r#"
            [user-agent]
            crawler-name = "TestScout"
            crawler-version = "1.0"
            contact-url = "https://example.com/about"
            contact-email = "admin@example.com"

            [output]
            database-path = ":memory:"
            "#,
        )
        .unwrap()
    }

    fn coordinator(search: Vec<&'static str>) -> Coordinator {
        let storage = shared(SqliteStorage::new_in_memory().unwrap());
        Coordinator::new(&config(), storage)
            .unwrap()
            .with_search(Arc::new(FixedSearch(search)))
            .with_size_probe(Arc::new(NoSizeProbe))
    }

    fn plan(sites: &[&str], query: &str) -> CrawlPlan {
        let mut spec = JobSpec::new("test");
        spec.sites = sites.iter().map(|s| s.to_string()).collect();
        spec.query = Some(query.to_string());
        spec.exclude_sites = vec!["ebay".to_string()];
        CrawlPlan::from_job(Some(1), &spec, &CrawlerConfig::default())
    }

    #[tokio::test]
    async fn test_configured_sites_get_scheme() {
        let coordinator = coordinator(vec![]);
        let seeds = coordinator
            .resolve_seeds(&plan(&["manuals.example", "http://other.example/atv"], ""))
            .await
            .unwrap();
        let seeds: Vec<&str> = seeds.iter().map(Url::as_str).collect();
        assert_eq!(
            seeds,
            vec!["https://manuals.example/", "http://other.example/atv"]
        );
    }

    #[tokio::test]
    async fn test_search_seeds_distinct_roots_without_excluded() {
        let coordinator = coordinator(vec![
            "https://a.example/manuals/x",
            "https://www.ebay.com/itm/1",
            "https://a.example/other",
            "http://b.example:8080/y",
        ]);
        let seeds = coordinator
            .resolve_seeds(&plan(&[], "service manual"))
            .await
            .unwrap();
        let seeds: Vec<&str> = seeds.iter().map(Url::as_str).collect();
        assert_eq!(seeds, vec!["https://a.example/", "http://b.example:8080/"]);
    }

    #[tokio::test]
    async fn test_no_seeds_is_job_error() {
        let coordinator = coordinator(vec![]);
        let result = coordinator
            .run(plan(&[], "service manual"), Arc::new(NeverStop))
            .await;
        assert!(matches!(result, Err(ScoutError::NoSeedSites { .. })));
    }

    #[tokio::test]
    async fn test_unreachable_sites_all_fail_and_progress_errors_swallowed() {
        let progress = Arc::new(FailingProgress(Mutex::new(0)));
        let coordinator = coordinator(vec![]).with_progress(progress.clone());

        let summary = coordinator
            .run(
                plan(&["http://127.0.0.1:1/", "http://127.0.0.1:1/b/"], ""),
                Arc::new(NeverStop),
            )
            .await
            .unwrap();

        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.reports[0].seed, "http://127.0.0.1:1/");
        assert!(summary.all_failed());
        assert_eq!(summary.persisted, 0);
        assert_eq!(*progress.0.lock().unwrap(), 2);
        assert!(summary.describe().contains("2 failed"));
    }

    #[test]
    fn test_all_failed_needs_reports() {
        assert!(!CrawlSummary::default().all_failed());
    }
}
