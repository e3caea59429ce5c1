//! Depth-bounded crawl of one seed site
//!
//! Traversal is an explicit DFS stack over `(url, depth)` pairs with a
//! `CrawlContext` that lives exactly as long as one seed's crawl.

use crate::crawler::fetcher::{fetch_page, FetchError};
use crate::crawler::metadata::{candidate_title, infer_metadata};
use crate::crawler::parser::{extract_links, FileLink};
use crate::filter::{FilterRules, SizeProbe};
use crate::storage::{BatchWriter, NewDiscoveredFile};
use crate::url::extract_domain;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use url::Url;

/// Cooperative stop check consulted before every fetch
pub trait StopSignal: Send + Sync {
    fn is_stopped(&self) -> bool;
}

/// Stop signal for crawls that are never stopped externally
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverStop;

impl StopSignal for NeverStop {
    fn is_stopped(&self) -> bool {
        false
    }
}

/// Traversal limits shared by every site of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrawlLimits {
    pub max_depth: u32,
    pub follow_links: bool,
    pub max_links_per_page: usize,
}

/// Per-seed traversal state
#[derive(Debug, Default)]
pub struct CrawlContext {
    visited: HashSet<String>,
    emitted: HashSet<String>,
}

impl CrawlContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks a URL visited; returns false if it already was
    pub fn mark_visited(&mut self, url: &Url) -> bool {
        self.visited.insert(url.as_str().to_string())
    }

    pub fn is_visited(&self, url: &Url) -> bool {
        self.visited.contains(url.as_str())
    }

    pub fn was_emitted(&self, url: &Url) -> bool {
        self.emitted.contains(url.as_str())
    }

    fn mark_emitted(&mut self, url: &Url) {
        self.emitted.insert(url.as_str().to_string());
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

/// Outcome of crawling one seed site
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteReport {
    pub seed: String,
    pub pages_fetched: usize,
    /// Candidates accepted by the filters (pre-dedup)
    pub emitted: usize,
    /// Rows actually inserted into the store (post-dedup)
    pub persisted: usize,
    /// Pages flagged as file directories
    pub directories: usize,
    /// Traversal was abandoned because the job was stopped
    pub stopped: bool,
    /// Set when the seed page could not be crawled at all
    pub error: Option<String>,
}

impl SiteReport {
    pub fn new(seed: &Url) -> Self {
        Self {
            seed: seed.to_string(),
            ..Self::default()
        }
    }

    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Crawls one seed site, applying filter rules and handing accepted files
/// to a `BatchWriter`
#[derive(Clone)]
pub struct SiteCrawler {
    client: Client,
    rules: Arc<FilterRules>,
    probe: Arc<dyn SizeProbe>,
    stop: Arc<dyn StopSignal>,
    limits: CrawlLimits,
    job_id: Option<i64>,
}

impl SiteCrawler {
    pub fn new(
        client: Client,
        rules: Arc<FilterRules>,
        probe: Arc<dyn SizeProbe>,
        stop: Arc<dyn StopSignal>,
        limits: CrawlLimits,
        job_id: Option<i64>,
    ) -> Self {
        Self {
            client,
            rules,
            probe,
            stop,
            limits,
            job_id,
        }
    }

    /// Crawls from `seed`, flushing the writer before returning
    ///
    /// # Traversal
    ///
    /// 1. Skip URLs already visited; mark the URL visited
    /// 2. A URL matching an accepted extension is a file candidate and is
    ///    never fetched as a page
    /// 3. Fetch and parse; a failed fetch contributes nothing (a failure on
    ///    the seed itself becomes the site's error)
    /// 4. Evaluate every file link on the page
    /// 5. If following links and `depth < max_depth`, push the first
    ///    `max_links_per_page` same-site page links at `depth + 1`
    pub async fn crawl(&self, seed: Url, mut writer: BatchWriter) -> SiteReport {
        let mut report = SiteReport::new(&seed);
        let mut ctx = CrawlContext::new();
        let mut site_domain = extract_domain(&seed);
        let mut stack: Vec<(Url, u32)> = vec![(seed.clone(), 0)];

        tracing::info!("Crawling site {}", seed);

        while let Some((url, depth)) = stack.pop() {
            if self.stop.is_stopped() {
                tracing::info!("Stop requested; abandoning crawl of {}", seed);
                report.stopped = true;
                break;
            }

            if !ctx.mark_visited(&url) {
                continue;
            }

            if self.rules.matches_extension(&url) {
                let link = FileLink {
                    url: url.clone(),
                    text: String::new(),
                };
                self.consider_file(&mut ctx, &mut writer, &mut report, link, &url, depth)
                    .await;
                continue;
            }

            tracing::debug!("Fetching {} (depth {})", url, depth);
            let page = match fetch_page(&self.client, &url).await {
                Ok(page) => page,
                Err(e) => {
                    self.record_fetch_error(&mut report, &url, depth, &e);
                    continue;
                }
            };
            report.pages_fetched += 1;

            // A redirected seed defines the site (e.g. example.com -> www.example.com)
            if depth == 0 {
                site_domain = extract_domain(&page.final_url);
                ctx.mark_visited(&page.final_url);
                if let Some(domain) = &site_domain {
                    writer.record_visit(domain);
                }
            }

            let links = extract_links(&page.body, &page.final_url, &self.rules);
            if links.is_directory {
                report.directories += 1;
                tracing::debug!(
                    "Detected file directory at {} ({} file links)",
                    url,
                    links.file_links.len()
                );
            }

            for link in links.file_links {
                self.consider_file(&mut ctx, &mut writer, &mut report, link, &url, depth + 1)
                    .await;
            }

            if self.limits.follow_links && depth < self.limits.max_depth {
                let children: Vec<Url> = links
                    .page_links
                    .into_iter()
                    .filter(|link| extract_domain(link) == site_domain)
                    .take(self.limits.max_links_per_page)
                    .collect();

                // Reversed so the first link on the page is crawled first
                for child in children.into_iter().rev() {
                    if !ctx.is_visited(&child) {
                        stack.push((child, depth + 1));
                    }
                }
            }
        }

        report.persisted = writer.finish();

        tracing::info!(
            "Finished {}: {} pages, {} accepted, {} new",
            seed,
            report.pages_fetched,
            report.emitted,
            report.persisted
        );

        report
    }

    async fn consider_file(
        &self,
        ctx: &mut CrawlContext,
        writer: &mut BatchWriter,
        report: &mut SiteReport,
        link: FileLink,
        source_page: &Url,
        depth: u32,
    ) {
        if ctx.was_emitted(&link.url) {
            return;
        }

        let title = candidate_title(&link.text, &link.url);
        if let Err(rejection) = self
            .rules
            .evaluate(&link.url, &title, self.probe.as_ref())
            .await
        {
            tracing::debug!("Rejected {}: {}", link.url, rejection);
            return;
        }

        let Some(domain) = extract_domain(&link.url) else {
            return;
        };

        ctx.mark_emitted(&link.url);
        report.emitted += 1;
        tracing::debug!("Accepted {} (\"{}\")", link.url, title);

        writer.push(NewDiscoveredFile {
            url: link.url.to_string(),
            domain,
            source_page: source_page.to_string(),
            depth,
            metadata: infer_metadata(&link.url, &title),
            title,
            job_id: self.job_id,
        });
    }

    fn record_fetch_error(&self, report: &mut SiteReport, url: &Url, depth: u32, error: &FetchError) {
        if depth == 0 {
            tracing::warn!("Seed {} could not be fetched: {}", url, error);
            report.error = Some(format!("{}: {}", url, error));
        } else {
            tracing::debug!("Skipping {}: {}", url, error);
        }
    }
}
