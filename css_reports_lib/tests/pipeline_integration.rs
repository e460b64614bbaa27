use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use css_reports_lib::guild_portal::PortalClient;
use css_reports_lib::{
    validate_report_query, ErrorKind, FailureState, HeaderLines, RawReportQuery, RefreshSummary,
    ReportPipeline, ReportRequest, TokenRefresher, TokenStore,
};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ORG: &str = "6531";
const TOKEN: &str = "secret-token";
const EXPORT_PATH: &str = "/Reserved.ReportViewerWebControl.axd";

fn fixture(name: &str) -> String {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../guild_portal/tests/fixtures")
        .join(name);
    std::fs::read_to_string(dir).unwrap()
}

fn reports_path() -> String {
    format!("/organisation/salesreports/{}/", ORG)
}

fn request(product: &str) -> ReportRequest {
    validate_report_query(&RawReportQuery {
        auth_cookie: Some(TOKEN.to_string()),
        organisation_id: Some(ORG.to_string()),
        product_name: Some(product.to_string()),
        ..RawReportQuery::default()
    })
    .unwrap()
}

fn pipeline(server: &MockServer, dir: &Path) -> ReportPipeline {
    let portal = PortalClient::with_base_url(&server.uri()).unwrap();
    ReportPipeline::from_parts(portal, dir.to_path_buf(), HeaderLines::default())
}

fn entries(dir: &Path) -> usize {
    std::fs::read_dir(dir).unwrap().count()
}

async fn mount_context(server: &MockServer, page: &str) {
    Mock::given(method("GET"))
        .and(path(reports_path()))
        .respond_with(
            ResponseTemplate::new(200)
                .append_header("set-cookie", "ASP.NET_SessionId=sess123; path=/")
                .set_body_string(fixture(page)),
        )
        .mount(server)
        .await;
}

async fn mount_postback(server: &MockServer, page: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(reports_path()))
        .and(body_string_contains("lbCustomisations"))
        .respond_with(ResponseTemplate::new(200).set_body_string(fixture(page)))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_export(server: &MockServer, response: ResponseTemplate, expected_calls: u64) {
    Mock::given(method("GET"))
        .and(path(EXPORT_PATH))
        .and(query_param("Format", "CSV"))
        .and(header(
            "cookie",
            ".ASPXAUTH=secret-token; ASP.NET_SessionId=sess123",
        ))
        .respond_with(response)
        .expect(expected_calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn run_filters_export_to_product_rows() {
    let server = MockServer::start().await;
    mount_context(&server, "sales_reports.html").await;
    mount_postback(&server, "report_viewer.html", 1).await;
    mount_export(
        &server,
        ResponseTemplate::new(200).set_body_string(fixture("customisations.csv")),
        1,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let artifact = pipeline(&server, dir.path())
        .run(&request("Ball 2024"))
        .await
        .unwrap();

    let stats = artifact.stats();
    assert_eq!((stats.header, stats.kept, stats.dropped), (4, 3, 2));

    let mut out = Vec::new();
    artifact.deliver(&mut out).await.unwrap();
    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Customisations Report");
    assert_eq!(lines[3], "Product,Customisation,Quantity,Total");
    assert!(lines[4..].iter().all(|l| l.starts_with("Ball 2024")));
    assert!(!text.contains("Hoodie"));
    assert_eq!(entries(dir.path()), 0);
}

#[tokio::test]
async fn login_page_stops_before_postback() {
    let server = MockServer::start().await;
    mount_context(&server, "login.html").await;
    mount_postback(&server, "report_viewer.html", 0).await;

    let dir = tempfile::tempdir().unwrap();
    let err = pipeline(&server, dir.path())
        .run(&request("Ball 2024"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Authentication);
    assert_eq!(err.kind().terminal_state(), Some(FailureState::AuthFailed));
    assert_eq!(entries(dir.path()), 0);
}

#[tokio::test]
async fn no_transactions_skips_download() {
    let server = MockServer::start().await;
    mount_context(&server, "sales_reports.html").await;
    mount_postback(&server, "no_transactions.html", 1).await;
    mount_export(&server, ResponseTemplate::new(200), 0).await;

    let dir = tempfile::tempdir().unwrap();
    let err = pipeline(&server, dir.path())
        .run(&request("Ball 2024"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NoData);
    assert_eq!(entries(dir.path()), 0);
}

#[tokio::test]
async fn empty_viewer_is_render_error() {
    let server = MockServer::start().await;
    mount_context(&server, "sales_reports.html").await;
    mount_postback(&server, "empty_viewer.html", 1).await;

    let dir = tempfile::tempdir().unwrap();
    let err = pipeline(&server, dir.path())
        .run(&request("Ball 2024"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ReportRender);
    assert_eq!(err.kind().terminal_state(), Some(FailureState::PortalRejected));
}

#[tokio::test]
async fn failed_download_is_transport_error_and_leaves_no_file() {
    let server = MockServer::start().await;
    mount_context(&server, "sales_reports.html").await;
    mount_postback(&server, "report_viewer.html", 1).await;
    mount_export(&server, ResponseTemplate::new(500), 1).await;

    let dir = tempfile::tempdir().unwrap();
    let err = pipeline(&server, dir.path())
        .run(&request("Ball 2024"))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Transport);
    assert!(err.kind().is_retryable());
    assert_eq!(entries(dir.path()), 0);
}

#[tokio::test]
async fn identical_requests_produce_identical_reports() {
    let server = MockServer::start().await;
    mount_context(&server, "sales_reports.html").await;
    mount_postback(&server, "report_viewer.html", 2).await;
    mount_export(
        &server,
        ResponseTemplate::new(200).set_body_string(fixture("customisations.csv")),
        2,
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline(&server, dir.path());
    let mut first = Vec::new();
    let mut second = Vec::new();
    pipeline
        .run(&request("Hoodie"))
        .await
        .unwrap()
        .deliver(&mut first)
        .await
        .unwrap();
    pipeline
        .run(&request("Hoodie"))
        .await
        .unwrap()
        .deliver(&mut second)
        .await
        .unwrap();
    assert_eq!(first, second);
    assert!(String::from_utf8(first).unwrap().contains("Hoodie,Size: L"));
}

// -- Token refresher --

async fn mount_refresh(server: &MockServer, token: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(reports_path()))
        .and(header("cookie", format!(".ASPXAUTH={}", token).as_str()))
        .respond_with(response)
        .mount(server)
        .await;
}

fn refresher(server: &MockServer, store: Arc<TokenStore>) -> TokenRefresher {
    let dir = std::env::temp_dir();
    TokenRefresher::new(
        Arc::new(pipeline(server, &dir)),
        store,
        Duration::from_secs(60),
    )
}

#[tokio::test]
async fn refresh_rotates_issued_token() {
    let server = MockServer::start().await;
    mount_refresh(
        &server,
        TOKEN,
        ResponseTemplate::new(200)
            .append_header("set-cookie", ".ASPXAUTH=fresh-token; path=/")
            .set_body_string(fixture("sales_reports.html")),
    )
    .await;

    let store = Arc::new(TokenStore::new());
    store.put(ORG, TOKEN);
    let summary = refresher(&server, Arc::clone(&store)).refresh_once().await;

    assert_eq!(
        summary,
        RefreshSummary {
            rotated: 1,
            ..RefreshSummary::default()
        }
    );
    let pair = store.get(ORG).unwrap();
    assert_eq!(pair.original, TOKEN);
    assert_eq!(pair.effective, "fresh-token");
    assert_eq!(store.effective_token(ORG, TOKEN), "fresh-token");
}

#[tokio::test]
async fn refresh_keeps_unrotated_token() {
    let server = MockServer::start().await;
    mount_refresh(
        &server,
        TOKEN,
        ResponseTemplate::new(200).set_body_string(fixture("sales_reports.html")),
    )
    .await;

    let store = Arc::new(TokenStore::new());
    store.put(ORG, TOKEN);
    let summary = refresher(&server, Arc::clone(&store)).refresh_once().await;

    assert_eq!(summary.unchanged, 1);
    assert_eq!(store.get(ORG).unwrap().effective, TOKEN);
}

#[tokio::test]
async fn refresh_removes_expired_session() {
    let server = MockServer::start().await;
    mount_refresh(
        &server,
        TOKEN,
        ResponseTemplate::new(200).set_body_string(fixture("login.html")),
    )
    .await;

    let store = Arc::new(TokenStore::new());
    store.put(ORG, TOKEN);
    let summary = refresher(&server, Arc::clone(&store)).refresh_once().await;

    assert_eq!(summary.removed, 1);
    assert!(store.get(ORG).is_none());
}

#[tokio::test]
async fn refresh_keeps_entry_on_transport_error() {
    let server = MockServer::start().await;
    mount_refresh(&server, TOKEN, ResponseTemplate::new(503)).await;

    let store = Arc::new(TokenStore::new());
    store.put(ORG, TOKEN);
    let summary = refresher(&server, Arc::clone(&store)).refresh_once().await;

    assert_eq!(summary.failed, 1);
    assert_eq!(store.len(), 1);
}
