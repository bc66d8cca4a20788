//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and drive the real
//! HTTP fetcher, HTML parser and controller end-to-end.

use spider_discovery::config::{
    Backpressure, Config, CrawlerConfig, HeaderEntry, SeedEntry, UserAgentConfig,
};
use spider_discovery::crawler::{
    crawl, crawl_until, CrawlController, Fetcher, HtmlLinkParser, HttpFetcher, ParserChain,
};
use spider_discovery::{ConfigError, RecordState, SpiderError};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a test configuration crawling from the mock server's root
fn create_test_config(base_url: &str) -> Config {
    Config {
        crawler: CrawlerConfig {
            max_depth: 5,
            max_outstanding_tasks: 16,
            worker_pool_size: 4,
            politeness_delay_ms: 0,
            backpressure: Backpressure::Block,
            allowed_hosts: vec![],
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        request_headers: vec![],
        seeds: vec![SeedEntry {
            uri: format!("{}/", base_url),
            method: "GET".to_string(),
            body: String::new(),
        }],
    }
}

fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(
        format!("<html><body>{}</body></html>", body),
        "text/html",
    )
}

fn controller_for(config: &Config) -> CrawlController {
    let fetcher: Arc<dyn Fetcher> =
        Arc::new(HttpFetcher::new(&config.user_agent).expect("Failed to build client"));
    let parsers =
        ParserChain::new().with(HtmlLinkParser::with_request_headers(config.request_header_fields()));
    CrawlController::new(&config.crawler, fetcher, parsers)
}

#[tokio::test]
async fn test_full_crawl_fetches_each_page_once() {
    let mock_server = MockServer::start().await;
    let config = create_test_config(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="/page1">1</a><a href="/page2">2</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page1"))
        .respond_with(html_page(r#"<a href="/">home</a><a href="/page2">2</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/page2"))
        .respond_with(html_page(
            r#"<a href="/page1#intro">1</a><a href="mailto:team@example.com">mail</a>"#,
        ))
        .expect(1)
        .mount(&mock_server)
        .await;

    let stats = crawl(config).await.expect("Crawl failed");

    assert_eq!(stats.dispatched, 3);
    assert_eq!(stats.succeeded, 3);
    assert_eq!(stats.failed, 0);
    assert_eq!(stats.ignored, 1);
    assert_eq!(stats.unique_keys, 3);
    assert!(stats.dropped >= 3);
}

#[tokio::test]
async fn test_configured_headers_reach_discovered_pages() {
    let mock_server = MockServer::start().await;
    let mut config = create_test_config(&mock_server.uri());
    config.request_headers = vec![HeaderEntry {
        name: "X-Customer-Header".to_string(),
        value: "xyz".to_string(),
    }];

    Mock::given(method("GET"))
        .and(path("/"))
        .and(header("x-customer-header", "xyz"))
        .respond_with(html_page(r#"<a href="/next">next</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/next"))
        .and(header("x-customer-header", "xyz"))
        .respond_with(html_page(""))
        .expect(1)
        .mount(&mock_server)
        .await;

    let controller = controller_for(&config);
    controller.seed(&config).await;
    let stats = controller.run_until_idle().await;

    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.failed, 0);
}

#[tokio::test]
async fn test_http_errors_are_isolated_to_their_task() {
    let mock_server = MockServer::start().await;
    let config = create_test_config(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="/missing">gone</a><a href="/ok">ok</a>"#))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(html_page(""))
        .expect(1)
        .mount(&mock_server)
        .await;

    let controller = controller_for(&config);
    controller.seed(&config).await;
    let stats = controller.run_until_idle().await;

    assert_eq!(stats.dispatched, 3);
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.failed, 1);
}

#[tokio::test]
async fn test_post_form_is_submitted_with_its_fields() {
    let mock_server = MockServer::start().await;
    let config = create_test_config(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            r#"<form action="/login" method="post">
                <input name="user" value="alice">
                <input type="checkbox" name="remember" checked>
                <input type="submit" value="Sign in">
            </form>
            <form action="/login" method="post">
                <input name="user" value="alice">
                <input type="checkbox" name="remember" checked>
            </form>"#,
        ))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/login"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string("user=alice&remember=on"))
        .respond_with(html_page("welcome"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let controller = controller_for(&config);
    controller.seed(&config).await;
    let stats = controller.run_until_idle().await;

    assert_eq!(stats.dispatched, 2);
    assert_eq!(stats.dropped, 1);
    assert_eq!(stats.succeeded, 2);
}

#[tokio::test]
async fn test_depth_limit_stops_the_crawl() {
    let mock_server = MockServer::start().await;
    let mut config = create_test_config(&mock_server.uri());
    config.crawler.max_depth = 1;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="/a">a</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html_page(r#"<a href="/b">b</a>"#))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/b"))
        .respond_with(html_page(""))
        .expect(0)
        .mount(&mock_server)
        .await;

    let controller = controller_for(&config);
    controller.seed(&config).await;
    let stats = controller.run_until_idle().await;

    assert_eq!(stats.dispatched, 2);
    assert_eq!(stats.rejected, 1);
}

#[tokio::test]
async fn test_out_of_scope_hosts_are_not_fetched() {
    let mock_server = MockServer::start().await;
    let base_url = mock_server.uri();
    let port = url::Url::parse(&base_url)
        .expect("Failed to parse base URL")
        .port()
        .expect("Mock server has no port");

    let mut config = create_test_config(&base_url);
    config.crawler.allowed_hosts = vec!["127.0.0.1".to_string()];

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(&format!(
            r#"<a href="/inside">in</a><a href="http://localhost:{}/outside">out</a>"#,
            port
        )))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/inside"))
        .respond_with(html_page(""))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/outside"))
        .respond_with(html_page(""))
        .expect(0)
        .mount(&mock_server)
        .await;

    let controller = controller_for(&config);
    let seeded = controller.seed(&config).await;
    assert_eq!(seeded[0].state, RecordState::Dispatched);

    let stats = controller.run_until_idle().await;
    assert_eq!(stats.succeeded, 2);
    assert_eq!(stats.rejected, 1);
}

#[tokio::test]
async fn test_invalid_config_is_refused_before_crawling() {
    let mock_server = MockServer::start().await;
    let mut config = create_test_config(&mock_server.uri());
    config.crawler.worker_pool_size = 0;

    Mock::given(method("GET"))
        .respond_with(html_page(""))
        .expect(0)
        .mount(&mock_server)
        .await;

    let result = crawl(config).await;
    assert!(matches!(
        result,
        Err(SpiderError::Config(ConfigError::Validation(_)))
    ));
}

#[tokio::test]
async fn test_stop_signal_ends_the_crawl_early() {
    let mock_server = MockServer::start().await;
    let config = create_test_config(&mock_server.uri());

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(r#"<a href="/next">next</a>"#).set_delay(Duration::from_millis(300)))
        .expect(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/next"))
        .respond_with(html_page(""))
        .expect(0)
        .mount(&mock_server)
        .await;

    let stats = crawl_until(config, tokio::time::sleep(Duration::from_millis(50)))
        .await
        .expect("Crawl failed");

    assert_eq!(stats.dispatched, 1);
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.rejected, 1);
}
