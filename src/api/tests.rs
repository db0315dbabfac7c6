//! Router-level tests for the page handlers

use super::*;
use crate::db::repositories::{
    SqlxChoiceRepository, SqlxQuestionRepository, SqlxSessionRepository, SqlxUserRepository,
    SqlxVoteRepository,
};
use crate::db::{create_test_pool, migrations};
use crate::hooks::HookManager;
use crate::models::{CreateChoiceInput, CreateQuestionInput, CreateUserInput, Question};
use crate::services::{
    AuthEventLogger, AuthLogLevel, AuthLogRecord, AuthLogSink, LoginInput, PollService,
    UserService, VotingService,
};
use crate::templates::TemplateEngine;
use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use chrono::{Duration, Utc};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

#[derive(Default)]
struct MemorySink {
    records: Mutex<Vec<AuthLogRecord>>,
}

impl AuthLogSink for MemorySink {
    fn write(&self, record: &AuthLogRecord) {
        self.records.lock().unwrap().push(record.clone());
    }
}

struct TestApp {
    router: Router,
    state: AppState,
    logs: Arc<MemorySink>,
}

async fn setup() -> TestApp {
    let pool = create_test_pool().await.expect("Failed to create test pool");
    migrations::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let hooks = Arc::new(HookManager::new());
    let logs = Arc::new(MemorySink::default());
    Arc::new(AuthEventLogger::new(logs.clone())).subscribe(&hooks);

    let question_repo = SqlxQuestionRepository::boxed(pool.clone());
    let choice_repo = SqlxChoiceRepository::boxed(pool.clone());

    let state = AppState {
        poll_service: Arc::new(PollService::new(question_repo.clone(), choice_repo.clone())),
        voting_service: Arc::new(VotingService::new(
            question_repo,
            choice_repo,
            SqlxVoteRepository::boxed(pool.clone()),
        )),
        user_service: Arc::new(
            UserService::new(
                SqlxUserRepository::boxed(pool.clone()),
                SqlxSessionRepository::boxed(pool),
            )
            .with_hooks(hooks),
        ),
        templates: Arc::new(TemplateEngine::new(None).expect("Failed to load templates")),
    };

    TestApp {
        router: build_router(state.clone()),
        state,
        logs,
    }
}

impl TestApp {
    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn get(&self, uri: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::empty()).unwrap()).await
    }

    async fn post_form(&self, uri: &str, body: &str, cookie: Option<&str>) -> Response {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.send(builder.body(Body::from(body.to_string())).unwrap()).await
    }

    /// Question published `days` from now, open for `duration` days, with the given choices
    async fn question(&self, text: &str, days: i64, duration: i64, choices: &[&str]) -> (Question, Vec<i64>) {
        let pub_date = Utc::now() + Duration::days(days);
        let question = self
            .state
            .poll_service
            .create_question(CreateQuestionInput {
                question_text: text.to_string(),
                pub_date,
                end_date: pub_date + Duration::days(duration),
            })
            .await
            .unwrap();

        let mut ids = Vec::new();
        for choice in choices {
            let created = self
                .state
                .poll_service
                .add_choice(CreateChoiceInput {
                    question_id: question.id,
                    choice_text: choice.to_string(),
                })
                .await
                .unwrap();
            ids.push(created.id);
        }
        (question, ids)
    }

    async fn user(&self, username: &str, password: &str) {
        self.state
            .user_service
            .create_user(CreateUserInput {
                username: username.to_string(),
                password: password.to_string(),
            })
            .await
            .unwrap();
    }

    /// Create a user and return a `Cookie` header for a fresh session
    async fn logged_in(&self, username: &str) -> String {
        self.user(username, "secret").await;
        let session = self
            .state
            .user_service
            .login(LoginInput::new(username, "secret"))
            .await
            .unwrap();
        format!("session={}", session.id)
    }

    async fn votes(&self, question_id: i64) -> Vec<i64> {
        self.state
            .poll_service
            .get_results(question_id)
            .await
            .unwrap()
            .choices
            .iter()
            .map(|c| c.votes)
            .collect()
    }
}

async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn location(response: &Response) -> &str {
    response.headers()[header::LOCATION].to_str().unwrap()
}

fn set_cookies(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect()
}

/// `name=value` part of the Set-Cookie header for `name`
fn cookie_pair(response: &Response, name: &str) -> Option<String> {
    set_cookies(response)
        .into_iter()
        .find(|c| c.starts_with(&format!("{}=", name)))
        .and_then(|c| c.split(';').next().map(str::to_string))
}

#[tokio::test]
async fn test_root_redirects_to_index() {
    let app = setup().await;
    let response = app.get("/", None).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/polls/");
}

#[tokio::test]
async fn test_index_without_questions() {
    let app = setup().await;
    let response = app.get("/polls/", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("No polls are available."));
}

#[tokio::test]
async fn test_index_lists_only_published_newest_first() {
    let app = setup().await;
    app.question("Past question 1.", -30, 1, &[]).await;
    app.question("Past question 2.", -5, 1, &[]).await;
    app.question("Future question.", 30, 1, &[]).await;

    let body = body_text(app.get("/polls/", None).await).await;

    let first = body.find("Past question 2.").unwrap();
    let second = body.find("Past question 1.").unwrap();
    assert!(first < second);
    assert!(!body.contains("Future question."));
    assert!(!body.contains("No polls are available."));
}

#[tokio::test]
async fn test_detail_future_question_404() {
    let app = setup().await;
    let (q, _) = app.question("Future question.", 5, 1, &[]).await;

    let response = app.get(&format!("/polls/{}/", q.id), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Not Found"));
}

#[tokio::test]
async fn test_detail_past_question_shows_text() {
    let app = setup().await;
    let (q, ids) = app.question("Past Question.", -5, 10, &["Yes"]).await;

    let response = app.get(&format!("/polls/{}/", q.id), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.contains("Past Question."));
    assert!(body.contains(&format!(r#"value="{}""#, ids[0])));
}

#[tokio::test]
async fn test_unknown_route_and_bad_id_404() {
    let app = setup().await;

    for uri in ["/nope/", "/polls/abc/", "/polls/abc/results/", "/polls/999/results/"] {
        let response = app.get(uri, None).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
    }
}

#[tokio::test]
async fn test_results_ignore_publish_date() {
    let app = setup().await;
    let (q, _) = app.question("Future question.", 5, 1, &["Only"]).await;

    let response = app.get(&format!("/polls/{}/results/", q.id), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.contains("Only -- 0 votes"));
    // The detail page would 404, so there is nothing to vote on yet
    assert!(!body.contains("Vote again?"));
}

#[tokio::test]
async fn test_published_results_link_back_to_voting() {
    let app = setup().await;
    let (q, _) = app.question("Past question.", -1, 2, &["Only"]).await;

    let response = app.get(&format!("/polls/{}/results/", q.id), None).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_text(response).await;
    assert!(body.contains(&format!("<a href=\"/polls/{}/\">Vote again?</a>", q.id)));
}

#[tokio::test]
async fn test_error_page_shows_and_clears_flash() {
    let app = setup().await;
    let stored = messages::store_cookie(&[FlashMessage::warning("Pending notice")]);
    let flash = stored.split(';').next().unwrap();

    let response = app.get("/nope/", Some(flash)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(cookie_pair(&response, "messages").as_deref(), Some("messages="));
    assert!(body_text(response).await.contains("Pending notice"));
}

#[tokio::test]
async fn test_error_page_without_flash_sets_no_cookie() {
    let app = setup().await;

    let response = app.get("/nope/", None).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(set_cookies(&response).is_empty());
}

#[tokio::test]
async fn test_anonymous_vote_redirects_to_login() {
    let app = setup().await;
    let (q, ids) = app.question("Vote?", -1, 2, &["A"]).await;

    let response = app
        .post_form(&format!("/polls/{}/vote/", q.id), &format!("choice={}", ids[0]), None)
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), format!("/accounts/login/?next=/polls/{}/", q.id));
    assert_eq!(app.votes(q.id).await, vec![0]);
}

#[tokio::test]
async fn test_vote_counts_and_redirects_to_results() {
    let app = setup().await;
    let (q, ids) = app.question("Vote?", -1, 2, &["A", "B"]).await;
    let cookie = app.logged_in("alice").await;

    let response = app
        .post_form(
            &format!("/polls/{}/vote/", q.id),
            &format!("choice={}", ids[1]),
            Some(&cookie),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), format!("/polls/{}/results/", q.id));
    assert_eq!(app.votes(q.id).await, vec![0, 1]);

    let body = body_text(app.get(&format!("/polls/{}/results/", q.id), None).await).await;
    assert!(body.contains("B -- 1 vote<"));
}

#[tokio::test]
async fn test_vote_without_choice_rerenders_detail() {
    let app = setup().await;
    let (q, _) = app.question("Vote?", -1, 2, &["A"]).await;
    let cookie = app.logged_in("alice").await;
    let uri = format!("/polls/{}/vote/", q.id);

    for body in ["", "choice=", "choice=abc", "choice=999"] {
        let response = app.post_form(&uri, body, Some(&cookie)).await;
        assert_eq!(response.status(), StatusCode::OK, "{:?}", body);

        let html = body_text(response).await;
        assert!(html.contains("You didn&#x27;t select a choice."));
        assert!(html.contains("Vote?"));
    }

    assert_eq!(app.votes(q.id).await, vec![0]);
}

#[tokio::test]
async fn test_vote_get_never_counts() {
    let app = setup().await;
    let (q, ids) = app.question("Vote?", -1, 2, &["A"]).await;
    let cookie = app.logged_in("alice").await;

    let response = app
        .get(&format!("/polls/{}/vote/?choice={}", q.id, ids[0]), Some(&cookie))
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("You didn&#x27;t select a choice."));
    assert_eq!(app.votes(q.id).await, vec![0]);
}

#[tokio::test]
async fn test_vote_missing_question_404() {
    let app = setup().await;
    let cookie = app.logged_in("alice").await;

    let response = app.post_form("/polls/42/vote/", "choice=1", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_closed_vote_flashes_message_once() {
    let app = setup().await;
    let (q, ids) = app.question("Closed", -10, 1, &["Late"]).await;
    let cookie = app.logged_in("alice").await;

    let response = app
        .post_form(
            &format!("/polls/{}/vote/", q.id),
            &format!("choice={}", ids[0]),
            Some(&cookie),
        )
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/polls/");
    assert_eq!(app.votes(q.id).await, vec![0]);

    let flash = cookie_pair(&response, "messages").expect("flash cookie set");
    let response = app.get("/polls/", Some(&format!("{}; {}", cookie, flash))).await;
    let cleared = cookie_pair(&response, "messages").expect("flash cookie cleared");
    assert_eq!(cleared, "messages=");
    assert!(body_text(response).await.contains("Voting is not allowed."));
}

#[tokio::test]
async fn test_second_vote_refused() {
    let app = setup().await;
    let (q, ids) = app.question("Once", -1, 2, &["A", "B"]).await;
    let cookie = app.logged_in("alice").await;
    let uri = format!("/polls/{}/vote/", q.id);

    app.post_form(&uri, &format!("choice={}", ids[0]), Some(&cookie)).await;
    let response = app
        .post_form(&uri, &format!("choice={}", ids[1]), Some(&cookie))
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), format!("/polls/{}/results/", q.id));
    assert!(cookie_pair(&response, "messages").is_some());
    assert_eq!(app.votes(q.id).await, vec![1, 0]);
}

#[tokio::test]
async fn test_login_form_renders() {
    let app = setup().await;
    let response = app.get("/accounts/login/?next=/polls/3/", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_text(response).await;
    assert!(body.contains(r#"name="username""#));
    assert!(body.contains(r#"name="next""#));
}

#[tokio::test]
async fn test_login_success_sets_session_and_logs() {
    let app = setup().await;
    app.user("alice", "secret").await;

    let request = Request::builder()
        .method("POST")
        .uri("/accounts/login/")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header("x-forwarded-for", "203.0.113.9")
        .body(Body::from("username=alice&password=secret&next=%2Fpolls%2F3%2F"))
        .unwrap();
    let response = app.send(request).await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/polls/3/");

    let session = cookie_pair(&response, "session").expect("session cookie set");
    let page = body_text(app.get("/polls/", Some(&session)).await).await;
    assert!(page.contains("Signed in as alice"));

    let records = app.logs.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level, AuthLogLevel::Info);
    assert_eq!(records[0].message, "You have successfully logged in.");
    assert_eq!(records[0].username.as_deref(), Some("alice"));
    assert_eq!(records[0].ip.as_deref(), Some("203.0.113.9"));
}

#[tokio::test]
async fn test_login_failure_rerenders_form_and_logs_warning() {
    let app = setup().await;
    app.user("alice", "secret").await;

    let response = app
        .post_form("/accounts/login/", "username=alice&password=wrong", None)
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(set_cookies(&response).is_empty());
    assert!(body_text(response)
        .await
        .contains("Please enter a correct username and password."));

    let records = app.logs.records.lock().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].level, AuthLogLevel::Warning);
    assert_eq!(records[0].message, "You have unsuccessfully logged in.");
}

#[tokio::test]
async fn test_login_rejects_offsite_next() {
    let app = setup().await;
    app.user("alice", "secret").await;

    let response = app
        .post_form(
            "/accounts/login/",
            "username=alice&password=secret&next=https%3A%2F%2Fevil.example%2F",
            None,
        )
        .await;

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/polls/");
}

#[tokio::test]
async fn test_logout_ends_session_and_logs() {
    let app = setup().await;
    let cookie = app.logged_in("alice").await;

    let response = app.post_form("/accounts/logout/", "", Some(&cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/polls/");
    assert_eq!(cookie_pair(&response, "session").as_deref(), Some("session="));

    let page = body_text(app.get("/polls/", Some(&cookie)).await).await;
    assert!(!page.contains("Signed in as alice"));

    let records = app.logs.records.lock().unwrap();
    let last = records.last().unwrap();
    assert_eq!(last.message, "You have successfully logged out.");
    assert_eq!(last.username.as_deref(), Some("alice"));
}

#[tokio::test]
async fn test_logout_without_session_still_redirects() {
    let app = setup().await;

    let response = app.get("/accounts/logout/", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/polls/");
}
