//! Web server for submitting scrape batches.
//!
//! A batch is posted to `/spider`, then its progress is streamed as
//! server-sent events from `/spider/:task_id`. The accumulated workbook can
//! be downloaded from `/spider/download`.

mod handlers;
mod routes;
mod tasks;

pub use handlers::FINISHED_MESSAGE;
pub use routes::create_router;
pub use tasks::{TaskStore, DEFAULT_TASK_TTL};

use std::net::SocketAddr;
use std::sync::Arc;

use crate::browser::{BrowserLauncher, ChromeLauncher};
use crate::config::Settings;
use crate::services::SpiderService;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub spider: Arc<SpiderService>,
    pub tasks: Arc<TaskStore>,
}

impl AppState {
    pub fn new(settings: &Settings, launcher: Arc<dyn BrowserLauncher>) -> Self {
        let spider = SpiderService::new(
            launcher,
            Arc::new(settings.workbook_sink()),
            settings.spider_config(),
        );
        Self {
            spider: Arc::new(spider),
            tasks: Arc::new(TaskStore::with_ttl(settings.task_ttl())),
        }
    }
}

/// Start the web server.
pub async fn serve(settings: &Settings, addr: SocketAddr) -> anyhow::Result<()> {
    settings.ensure_directories()?;
    let state = AppState::new(settings, Arc::new(ChromeLauncher::new()));
    let app = create_router(state);

    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tempfile::tempdir;
    use tower::ServiceExt;

    use crate::browser::SnapshotLauncher;

    const PRODUCT_URL: &str = "https://www.amazon.co.uk/dp/B0TESTTEST";
    const STORE_URL: &str = "https://www.amazon.co.uk/stores/page/ABC";

    fn product_page() -> String {
        r#"<html><body>
            <span id="productTitle"> Ceramic Coffee Mug </span>
            <div id="feature-bullets"><ul><li>Holds 350ml of coffee, tea or soup</li></ul></div>
            <table id="productDetails_techSpec_section_1">
              <tr><th class="prodDetSectionEntry">Colour</th><td class="prodDetAttrValue">Blue</td></tr>
            </table>
        </body></html>"#
            .to_string()
    }

    fn store_page() -> String {
        r#"<html><body>
            <a href="/dp/B0AAAAAAA1?ref=x">One</a>
            <a href="https://www.amazon.co.uk/gp/product/B0BBBBBBB2">Two</a>
            <a href="/dp/B0AAAAAAA1">One again</a>
            <a href="/help">Help</a>
        </body></html>"#
            .to_string()
    }

    fn write_template(dir: &std::path::Path) {
        let mut book = umya_spreadsheet::new_file();
        book.get_sheet_mut(&0)
            .unwrap()
            .get_cell_mut((2, 1))
            .set_value_string("Title");
        umya_spreadsheet::writer::xlsx::write(&book, dir.join("template.xlsx")).unwrap();
    }

    fn setup_test_app() -> (axum::Router, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        write_template(dir.path());

        let mut settings = Settings::with_output_dir(dir.path().to_path_buf());
        settings.settle_delay_ms = 0;
        let launcher = SnapshotLauncher::new()
            .with_page(PRODUCT_URL, product_page())
            .with_page(STORE_URL, store_page());

        let state = AppState::new(&settings, Arc::new(launcher));
        (create_router(state), dir)
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _dir) = setup_test_app();
        let response = app.oneshot(get("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_submit_rejects_bad_requests() {
        let (app, _dir) = setup_test_app();

        let response = app
            .clone()
            .oneshot(post_json(
                "/spider",
                serde_json::json!({ "urls": [], "headless": true, "sleepSecond": 0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert!(json["error"].is_string());

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/spider")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let (app, _dir) = setup_test_app();
        let response = app.oneshot(get("/spider/does-not-exist")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_full_run_streams_log_and_fills_workbook() {
        let (app, _dir) = setup_test_app();

        let response = app.clone().oneshot(get("/spider/download")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app
            .clone()
            .oneshot(post_json(
                "/spider",
                serde_json::json!({ "urls": [PRODUCT_URL], "headless": true, "sleepSecond": 0 }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        let task_id = json["taskId"].as_str().unwrap().to_string();

        let uri = format!("/spider/{}", task_id);
        let response = app.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-type").unwrap(),
            "text/event-stream"
        );
        let body = body_text(response).await;
        assert!(body.contains("data: Browser launched successfully\n"));
        assert!(body.contains("data: Excel processing complete.\n"));
        assert!(body
            .trim_end()
            .ends_with(&format!("data: {}", FINISHED_MESSAGE)));

        // tasks are single use
        let response = app.clone().oneshot(get(&uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app.oneshot(get("/spider/download")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response
            .headers()
            .get("content-disposition")
            .unwrap()
            .to_str()
            .unwrap()
            .contains("output.xlsx"));
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        // xlsx files are zip archives
        assert_eq!(&body[..2], b"PK");
    }

    #[tokio::test]
    async fn test_store_asins() {
        let (app, _dir) = setup_test_app();
        let response = app
            .oneshot(post_json("/spider/asin", serde_json::json!({ "url": STORE_URL })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body_text(response).await).unwrap();
        assert_eq!(json["asins"], serde_json::json!(["B0AAAAAAA1", "B0BBBBBBB2"]));
    }

    #[tokio::test]
    async fn test_store_asins_rejects_bad_url() {
        let (app, _dir) = setup_test_app();
        let response = app
            .oneshot(post_json("/spider/asin", serde_json::json!({ "url": "not a url" })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
