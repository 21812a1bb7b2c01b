use archiver_engine::{FailureKind, FetchSettings, Fetcher, ReqwestFetcher, RetryPolicy};
use pretty_assertions::assert_eq;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fetcher(attempts: u32) -> ReqwestFetcher {
    let settings = FetchSettings {
        retry: RetryPolicy::immediate(attempts),
        ..FetchSettings::default()
    };
    ReqwestFetcher::new(settings).expect("client builds")
}

async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.unwrap_or_default().len()
}

#[tokio::test]
async fn fetch_returns_body_and_metadata() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/s/abc"))
        .and(header_exists("user-agent"))
        .respond_with(
            ResponseTemplate::new(200).set_body_raw("<html>ok</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let url = format!("{}/s/abc", server.uri());
    let output = fetcher(3).fetch(&url).await.expect("fetch ok");

    assert_eq!(output.bytes, b"<html>ok</html>");
    assert_eq!(output.metadata.original_url, url);
    assert_eq!(output.metadata.final_url, url);
    assert_eq!(output.metadata.attempts, 1);
    assert_eq!(output.metadata.byte_len, 15);
    assert!(output.metadata.content_type.unwrap().starts_with("text/html"));
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string("finally"))
        .mount(&server)
        .await;

    let output = fetcher(5)
        .fetch(&format!("{}/flaky", server.uri()))
        .await
        .expect("third attempt succeeds");

    assert_eq!(output.bytes, b"finally");
    assert_eq!(output.metadata.attempts, 3);
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn fetch_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let err = fetcher(4)
        .fetch(&format!("{}/down", server.uri()))
        .await
        .unwrap_err();

    assert_eq!(err.kind, FailureKind::RetriesExhausted { attempts: 4 });
    assert!(err.message.contains("500"));
    assert_eq!(request_count(&server).await, 4);
}

#[tokio::test]
async fn invalid_url_is_not_retried() {
    let err = fetcher(10).fetch("not a url").await.unwrap_err();
    assert_eq!(err.kind, FailureKind::InvalidUrl);
}

#[tokio::test]
async fn oversized_response_is_rejected_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("0123456789"))
        .mount(&server)
        .await;

    let settings = FetchSettings {
        max_bytes: 4,
        retry: RetryPolicy::immediate(5),
        ..FetchSettings::default()
    };
    let err = ReqwestFetcher::new(settings)
        .unwrap()
        .fetch(&format!("{}/big", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err.kind, FailureKind::TooLarge { max_bytes: 4, .. }));
    assert_eq!(request_count(&server).await, 1);
}

#[tokio::test]
async fn fetch_text_honours_declared_charset() {
    let server = MockServer::start().await;
    // "中文" in GBK
    let body = vec![0xD6, 0xD0, 0xCE, 0xC4];
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/html; charset=gbk"))
        .mount(&server)
        .await;

    let text = fetcher(1)
        .fetch_text(&format!("{}/gbk", server.uri()))
        .await
        .unwrap();
    assert_eq!(text, "中文");
}

#[tokio::test]
async fn download_writes_file_and_creates_directories() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/img/a.png"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(vec![0x89, b'P', b'N', b'G'], "image/png"))
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let destination = dir.path().join("images").join("2859b116").join("1.png");
    let saved = fetcher(2)
        .download(&format!("{}/img/a.png", server.uri()), &destination)
        .await;

    assert!(saved);
    assert_eq!(std::fs::read(&destination).unwrap(), vec![0x89, b'P', b'N', b'G']);
}

#[tokio::test]
async fn download_reports_false_after_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::TempDir::new().unwrap();
    let destination = dir.path().join("1.png");
    let saved = fetcher(3)
        .download(&format!("{}/gone.png", server.uri()), &destination)
        .await;

    assert!(!saved);
    assert!(!destination.exists());
    assert_eq!(request_count(&server).await, 3);
}

#[tokio::test]
async fn fetch_goes_through_configured_proxy() {
    let proxy = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("host", "origin.invalid"))
        .and(path("/s/abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("via proxy"))
        .expect(1)
        .mount(&proxy)
        .await;

    let settings = FetchSettings {
        proxy: Some(proxy.uri()),
        retry: RetryPolicy::immediate(1),
        ..FetchSettings::default()
    };
    let fetcher = ReqwestFetcher::new(settings).expect("client builds");
    let output = fetcher
        .fetch("http://origin.invalid/s/abc")
        .await
        .expect("proxy answers for the origin");

    assert_eq!(output.bytes, b"via proxy");
    let requests = proxy.received_requests().await.unwrap_or_default();
    assert_eq!(requests[0].url.as_str(), "http://origin.invalid/s/abc");
}

#[tokio::test]
async fn without_proxy_requests_go_direct() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/direct"))
        .respond_with(ResponseTemplate::new(200).set_body_string("direct"))
        .mount(&server)
        .await;

    let url = format!("{}/direct", server.uri());
    let output = fetcher(1).fetch(&url).await.expect("direct fetch");

    assert_eq!(output.bytes, b"direct");
    assert_eq!(output.metadata.final_url, url);
}
