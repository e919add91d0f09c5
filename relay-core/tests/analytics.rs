// Analytics lookups against a fake Data API.

use poem::listener::TcpAcceptor;
use poem::web::{Json, Query};
use poem::{get, handler, Route, Server};
use serde::Deserialize;
use serde_json::{json, Value};

use transcript_relay::AnalyticsClient;

#[derive(Deserialize)]
struct ListParams {
    id: String,
    key: String,
}

#[handler]
fn videos(Query(params): Query<ListParams>) -> Json<Value> {
    assert_eq!(params.key, "test-key");
    if params.id != "abc123" {
        return Json(json!({ "items": [] }));
    }
    Json(json!({
        "items": [{
            "statistics": { "viewCount": "1500", "likeCount": "42", "commentCount": "7" },
            "snippet": { "title": "Rust in 100 seconds", "channelId": "chan-1" },
            "contentDetails": { "duration": "PT1M40S" }
        }]
    }))
}

#[handler]
fn channels(Query(params): Query<ListParams>) -> Json<Value> {
    if params.id != "chan-1" {
        return Json(json!({ "items": [] }));
    }
    Json(json!({
        "items": [{
            "statistics": { "subscriberCount": "900", "viewCount": "100000", "videoCount": "12" },
            "snippet": { "title": "Ferris Talks", "description": "Systems programming" }
        }]
    }))
}

async fn start_api() -> String {
    let app = Route::new()
        .at("/videos", get(videos))
        .at("/channels", get(channels));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let acceptor = TcpAcceptor::from_tokio(listener).unwrap();
    tokio::spawn(Server::new_with_acceptor(acceptor).run(app));

    format!("http://{}", addr)
}

#[tokio::test]
async fn test_report_for_watch_page() {
    let client = AnalyticsClient::new(start_api().await, "test-key");

    let report = client
        .fetch_report("https://www.youtube.com/watch?v=abc123")
        .await
        .unwrap();

    assert_eq!(report.channel_name, "Ferris Talks");
    assert_eq!(report.subscriber_count.as_deref(), Some("900"));
    assert_eq!(report.video_title, "Rust in 100 seconds");
    assert_eq!(report.video_duration.as_deref(), Some("PT1M40S"));
    assert!(report.to_string().contains("Video Like Count: 42"));
}

#[tokio::test]
async fn test_unknown_video() {
    let client = AnalyticsClient::new(start_api().await, "test-key");

    let err = client
        .fetch_report("https://www.youtube.com/watch?v=missing")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No video data found");
}

#[tokio::test]
async fn test_url_without_video_id() {
    let client = AnalyticsClient::new("http://127.0.0.1:9", "test-key");

    let err = client
        .fetch_report("https://www.youtube.com/feed/subscriptions")
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "No video ID found in the URL");
}
