//! HttpScraper tests against a mocked web server.

use research_loop::tools::{HttpScraper, ScrapeError, ScrapeService};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn scraper() -> HttpScraper {
    HttpScraper::new(Duration::from_secs(2), 8_000).unwrap()
}

async fn serve(server: &MockServer, route: &str, response: ResponseTemplate) -> String {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(response)
        .mount(server)
        .await;
    format!("{}{}", server.uri(), route)
}

#[tokio::test]
async fn test_fetch_extracts_article() {
    let server = MockServer::start().await;
    let html = r#"<html><head><title>Battery News</title><script>track()</script></head>
        <body><nav>Menu</nav><article><p>Solid-state cells are improving quickly.</p></article></body></html>"#;
    let url = serve(
        &server,
        "/news",
        ResponseTemplate::new(200).set_body_raw(html, "text/html; charset=utf-8"),
    )
    .await;

    let page = scraper().fetch(&url).await.unwrap();
    assert_eq!(page.url, url);
    assert_eq!(page.title, "Battery News");
    assert_eq!(page.text, "Solid-state cells are improving quickly.");
    assert_eq!(page.word_count, 5);
}

#[tokio::test]
async fn test_missing_title_falls_back_to_url() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/untitled",
        ResponseTemplate::new(200).set_body_raw("<html><body><main>Body text</main></body></html>", "text/html"),
    )
    .await;

    let page = scraper().fetch(&url).await.unwrap();
    assert_eq!(page.title, url);
}

#[tokio::test]
async fn test_http_error_status() {
    let server = MockServer::start().await;
    let url = serve(&server, "/gone", ResponseTemplate::new(404)).await;

    let err = scraper().fetch(&url).await.unwrap_err();
    assert_eq!(err, ScrapeError::Http { status: 404 });
}

#[tokio::test]
async fn test_non_html_is_rejected() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/paper.pdf",
        ResponseTemplate::new(200).set_body_raw(vec![0x25u8, 0x50, 0x44, 0x46], "application/pdf"),
    )
    .await;

    let err = scraper().fetch(&url).await.unwrap_err();
    assert!(matches!(err, ScrapeError::NotHtml { content_type } if content_type == "application/pdf"));
}

#[tokio::test]
async fn test_slow_response_times_out() {
    let server = MockServer::start().await;
    let url = serve(
        &server,
        "/slow",
        ResponseTemplate::new(200)
            .set_body_raw("<html><body>late</body></html>", "text/html")
            .set_delay(Duration::from_millis(1500)),
    )
    .await;

    let scraper = HttpScraper::new(Duration::from_millis(200), 8_000).unwrap();
    let err = scraper.fetch(&url).await.unwrap_err();
    assert_eq!(err, ScrapeError::Timeout);
}
