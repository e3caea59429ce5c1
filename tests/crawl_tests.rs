//! Integration tests for the crawler
//!
//! These tests use wiremock to serve small manual sites and run complete
//! crawls against them.

mod common;

use common::{
    html_page, job, memory_storage, mount_page, mount_slow_page, server_domain, test_config,
};
use manual_scout::crawler::{crawl, Coordinator, CrawlPlan, NeverStop};
use manual_scout::storage::{lock, Storage};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_exclude_terms_filter_candidates() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html_page(
            "Honda manuals",
            &[
                ("/files/trx450-service.pdf", "TRX450 Service Manual"),
                ("/files/trx450-qs.pdf", "TRX450 Quick Start Guide"),
                ("/files/crf250-shop.pdf", "CRF250 Shop Manual"),
            ],
        ),
    )
    .await;

    let config = test_config(":memory:", "");
    let storage = memory_storage();
    let mut spec = job("honda", &[server.uri()]);
    spec.exclude_terms = vec!["quick start".to_string()];

    let summary = crawl(&config, &spec, storage.clone()).await.unwrap();

    assert_eq!(summary.reports.len(), 1);
    assert_eq!(summary.emitted, 2);
    assert_eq!(summary.persisted, 2);

    let storage = lock(&storage).unwrap();
    assert_eq!(storage.count_files().unwrap(), 2);

    let service = storage
        .get_file_by_url(&format!("{}/files/trx450-service.pdf", server.uri()))
        .unwrap()
        .expect("service manual stored");
    assert_eq!(service.title, "TRX450 Service Manual");
    assert_eq!(service.source_page, format!("{}/", server.uri()));
    assert_eq!(service.depth, 1);
    assert!(storage
        .get_file_by_url(&format!("{}/files/trx450-qs.pdf", server.uri()))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_recrawl_adds_no_duplicates() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html_page(
            "Manuals",
            &[
                ("/a.pdf", "Yamaha Grizzly Service Manual"),
                ("/b.pdf#page=2", "Polaris Sportsman Repair Manual"),
                ("/b.pdf", "Polaris Sportsman Repair Manual"),
            ],
        ),
    )
    .await;

    let config = test_config(":memory:", "");
    let storage = memory_storage();
    let spec = job("repeat", &[server.uri()]);

    let first = crawl(&config, &spec, storage.clone()).await.unwrap();
    assert_eq!(first.emitted, 2);
    assert_eq!(first.persisted, 2);

    let second = crawl(&config, &spec, storage.clone()).await.unwrap();
    assert_eq!(second.emitted, 2);
    assert_eq!(second.persisted, 0);

    let storage = lock(&storage).unwrap();
    assert_eq!(storage.count_files().unwrap(), 2);
    let site = storage.get_site(&server_domain(&server)).unwrap().unwrap();
    assert_eq!(site.crawl_count, 2);
}

#[tokio::test]
async fn test_concurrent_runs_store_shared_file_once() {
    let server = MockServer::start().await;
    mount_slow_page(
        &server,
        "/",
        html_page("Manuals", &[("/shared.pdf", "Arctic Cat 400 Service Manual")]),
        Duration::from_millis(200),
    )
    .await;

    let config = test_config(":memory:", "");
    let storage = memory_storage();
    let left = Coordinator::new(&config, storage.clone()).unwrap();
    let right = Coordinator::new(&config, storage.clone()).unwrap();
    let left_plan = CrawlPlan::from_job(None, &job("left", &[server.uri()]), &config.crawler);
    let right_plan = CrawlPlan::from_job(None, &job("right", &[server.uri()]), &config.crawler);

    let (left, right) = tokio::join!(
        left.run(left_plan, Arc::new(NeverStop)),
        right.run(right_plan, Arc::new(NeverStop))
    );
    let (left, right) = (left.unwrap(), right.unwrap());

    assert_eq!(left.emitted, 1);
    assert_eq!(right.emitted, 1);
    assert_eq!(left.persisted + right.persisted, 1);

    let storage = lock(&storage).unwrap();
    assert_eq!(storage.count_files().unwrap(), 1);
    assert!(storage
        .get_file_by_url(&format!("{}/shared.pdf", server.uri()))
        .unwrap()
        .is_some());
    let site = storage.get_site(&server_domain(&server)).unwrap().unwrap();
    assert_eq!(site.crawl_count, 2);
}

#[tokio::test]
async fn test_seed_without_files_is_recorded_in_ledger() {
    let server = MockServer::start().await;
    mount_page(&server, "/", html_page("Nothing here", &[])).await;

    let config = test_config(":memory:", "");
    let storage = memory_storage();
    let summary = crawl(&config, &job("empty", &[server.uri()]), storage.clone())
        .await
        .unwrap();
    assert_eq!(summary.persisted, 0);

    let storage = lock(&storage).unwrap();
    assert_eq!(storage.count_files().unwrap(), 0);
    let site = storage.get_site(&server_domain(&server)).unwrap().unwrap();
    assert_eq!(site.crawl_count, 1);
}

#[tokio::test]
async fn test_depth_bound_limits_page_hops() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html_page("Root", &[("/level1", "Next"), ("/root.pdf", "Root Manual")]),
    )
    .await;
    mount_page(
        &server,
        "/level1",
        html_page("Level 1", &[("/level2", "Next"), ("/one.pdf", "One Manual")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/level2"))
        .respond_with(ResponseTemplate::new(200).set_body_string(html_page(
            "Level 2",
            &[("/two.pdf", "Two Manual")],
        )))
        .expect(0)
        .mount(&server)
        .await;

    let config = test_config(":memory:", "");
    let storage = memory_storage();
    let mut spec = job("depth", &[server.uri()]);
    spec.max_depth = 1;

    let summary = crawl(&config, &spec, storage.clone()).await.unwrap();

    assert_eq!(summary.reports[0].pages_fetched, 2);
    assert_eq!(summary.persisted, 2);

    let storage = lock(&storage).unwrap();
    assert!(storage
        .get_file_by_url(&format!("{}/one.pdf", server.uri()))
        .unwrap()
        .is_some());
    assert!(storage
        .get_file_by_url(&format!("{}/two.pdf", server.uri()))
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_no_follow_crawls_seed_page_only() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html_page("Root", &[("/more", "More"), ("/root.pdf", "Root Manual")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/more"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = test_config(":memory:", "");
    let mut spec = job("flat", &[server.uri()]);
    spec.follow_links = false;

    let summary = crawl(&config, &spec, memory_storage()).await.unwrap();
    assert_eq!(summary.reports[0].pages_fetched, 1);
    assert_eq!(summary.persisted, 1);
}

#[tokio::test]
async fn test_files_on_other_domains_are_kept_but_their_pages_are_not_crawled() {
    let site = MockServer::start().await;
    let cdn = MockServer::start().await;

    let other_page = format!("{}/other", cdn.uri());
    let cdn_file = format!("{}/files/kawasaki.pdf", cdn.uri());
    mount_page(
        &site,
        "/",
        html_page(
            "Mirror list",
            &[
                (other_page.as_str(), "Other site"),
                (cdn_file.as_str(), "Kawasaki Brute Force Manual"),
            ],
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/other"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&cdn)
        .await;

    let config = test_config(":memory:", "");
    let storage = memory_storage();
    let summary = crawl(&config, &job("mirror", &[site.uri()]), storage.clone())
        .await
        .unwrap();

    assert_eq!(summary.reports[0].pages_fetched, 1);
    assert_eq!(summary.persisted, 1);

    let storage = lock(&storage).unwrap();
    let file = storage
        .get_file_by_url(&format!("{}/files/kawasaki.pdf", cdn.uri()))
        .unwrap()
        .expect("cross-domain file stored");
    assert_eq!(file.domain, server_domain(&cdn));
    assert_eq!(file.metadata.manufacturer.as_deref(), Some("Kawasaki"));
    assert!(storage.get_site(&server_domain(&cdn)).unwrap().is_some());
}

#[tokio::test]
async fn test_link_cap_limits_followed_pages() {
    let server = MockServer::start().await;
    let links: Vec<(String, String)> = (1..=5)
        .map(|i| (format!("/p{}", i), format!("Page {}", i)))
        .collect();
    let link_refs: Vec<(&str, &str)> = links
        .iter()
        .map(|(href, text)| (href.as_str(), text.as_str()))
        .collect();
    mount_page(&server, "/", html_page("Index", &link_refs)).await;

    for i in 1..=5 {
        let file = format!("/p{}.pdf", i);
        mount_page(
            &server,
            &format!("/p{}", i),
            html_page("Page", &[(file.as_str(), "Service Manual")]),
        )
        .await;
    }

    let config = test_config(":memory:", "[crawler]\nmax-links-per-page = 2");
    let storage = memory_storage();
    let summary = crawl(&config, &job("capped", &[server.uri()]), storage.clone())
        .await
        .unwrap();

    assert_eq!(summary.reports[0].pages_fetched, 3);
    assert_eq!(summary.persisted, 2);

    let storage = lock(&storage).unwrap();
    for (i, expected) in [(1, true), (2, true), (3, false), (5, false)] {
        let found = storage
            .get_file_by_url(&format!("{}/p{}.pdf", server.uri(), i))
            .unwrap()
            .is_some();
        assert_eq!(found, expected, "p{}.pdf", i);
    }
}

#[tokio::test]
async fn test_directory_pages_are_counted() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        html_page(
            "Index of /manuals",
            &[
                ("/manuals/a.pdf", "a.pdf"),
                ("/manuals/b.pdf", "b.pdf"),
                ("/manuals/c.pdf", "c.pdf"),
            ],
        ),
    )
    .await;

    let config = test_config(":memory:", "");
    let summary = crawl(&config, &job("dir", &[server.uri()]), memory_storage())
        .await
        .unwrap();

    assert_eq!(summary.reports[0].directories, 1);
    assert_eq!(summary.persisted, 3);
}

#[tokio::test]
async fn test_one_failing_site_does_not_fail_the_crawl() {
    let good = MockServer::start().await;
    mount_page(
        &good,
        "/",
        html_page("Manuals", &[("/x.pdf", "Suzuki King Quad Manual")]),
    )
    .await;

    let bad = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&bad)
        .await;

    let config = test_config(":memory:", "");
    let summary = crawl(
        &config,
        &job("mixed", &[bad.uri(), good.uri()]),
        memory_storage(),
    )
    .await
    .unwrap();

    assert_eq!(summary.reports.len(), 2);
    assert!(summary.reports[0].failed());
    assert!(!summary.reports[1].failed());
    assert!(!summary.all_failed());
    assert_eq!(summary.persisted, 1);
}
