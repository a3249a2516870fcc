use std::thread;

use crossbeam_channel::{unbounded, Receiver};
use tiny_http::{Header, Response, Server};

use reels_tui::api::{Client, ClientConfig};
use reels_tui::auth::{Session, SessionCookie, SESSION_COOKIE};
use reels_tui::error::FeedError;

#[derive(Debug)]
struct Seen {
    method: String,
    url: String,
    cookie: Option<String>,
}

/// Answers each request with the next canned (status, body) pair.
fn serve(replies: Vec<(u16, &'static str)>) -> (String, Receiver<Seen>) {
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let (tx, rx) = unbounded();
    thread::spawn(move || {
        for (status, body) in replies {
            let Ok(request) = server.recv() else {
                return;
            };
            let cookie = request
                .headers()
                .iter()
                .find(|header| header.field.equiv("Cookie"))
                .map(|header| header.value.as_str().to_string());
            let _ = tx.send(Seen {
                method: request.method().to_string(),
                url: request.url().to_string(),
                cookie,
            });
            let json = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]).unwrap();
            let _ = request.respond(
                Response::from_string(body)
                    .with_status_code(status)
                    .with_header(json),
            );
        }
    });
    (format!("http://{addr}"), rx)
}

fn client(base: &str) -> Client {
    Client::new(ClientConfig {
        base_url: base.to_string(),
        user_agent: "reels-tui-test".into(),
        ..ClientConfig::default()
    })
    .unwrap()
}

fn session() -> Session {
    Session {
        user_id: "u1".into(),
        email: "sam@example.com".into(),
        cookie: SessionCookie {
            name: SESSION_COOKIE.into(),
            value: "tok123".into(),
        },
        expires_at: chrono::Utc::now() + chrono::Duration::days(1),
    }
}

#[test]
fn loads_a_page_with_pagination() {
    let (base, seen) = serve(vec![(
        200,
        r#"{"videos":[{"_id":"v1","title":"First","videoUrl":"https://cdn.test/v1.mp4","likes":3}],
            "pagination":{"total":11,"limit":10,"offset":10,"hasMore":false}}"#,
    )]);
    let page = client(&base).videos(10, 10).unwrap();
    assert_eq!(page.videos.len(), 1);
    assert_eq!(page.videos[0].likes, 3);
    assert!(!page.has_more());

    let request = seen.recv().unwrap();
    assert_eq!(request.method, "GET");
    assert_eq!(request.url, "/api/videos?limit=10&offset=10");
    assert_eq!(request.cookie, None);
}

#[test]
fn error_bodies_map_to_feed_errors() {
    let (base, _seen) = serve(vec![
        (404, r#"{"error":"Video not found"}"#),
        (401, r#"{"error":"Unauthorized"}"#),
    ]);
    let api = client(&base);

    let err = api.comments("missing").unwrap_err();
    assert_eq!(
        FeedError::from_api(&err),
        FeedError::NotFound("Video not found".into())
    );

    let err = api.toggle_like(&session(), "v1").unwrap_err();
    assert_eq!(FeedError::from_api(&err), FeedError::Unauthorized);
}

#[test]
fn toggle_like_sends_session_cookie() {
    let (base, seen) = serve(vec![(200, r#"{"liked":true,"likes":8}"#)]);
    let toggle = client(&base).toggle_like(&session(), "v1").unwrap();
    assert!(toggle.liked);
    assert_eq!(toggle.likes, 8);

    let request = seen.recv().unwrap();
    assert_eq!(request.method, "POST");
    assert_eq!(request.url, "/api/videos/v1/like");
    assert_eq!(
        request.cookie.as_deref(),
        Some(format!("{SESSION_COOKIE}=tok123").as_str())
    );
}

#[test]
fn posted_comment_carries_text() {
    let (base, seen) = serve(vec![(
        201,
        r#"{"_id":"c1","text":"nice","userId":{"_id":"u1","email":"sam@example.com"}}"#,
    )]);
    let comment = client(&base)
        .post_comment(&session(), "v1", "nice")
        .unwrap();
    assert_eq!(comment.text, "nice");
    assert_eq!(seen.recv().unwrap().url, "/api/videos/v1/comments");
}
