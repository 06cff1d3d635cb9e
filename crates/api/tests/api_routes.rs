use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Map, Value, json};
use services::{AppServices, Clock, SeedOutcome, ServicesConfig, seed_sample_content};
use storage::repository::Storage;
use tower::ServiceExt;
use training_core::model::{SectionId, UserId, UserProfile};
use training_core::time::fixed_now;

struct Harness {
    app: Router,
    services: AppServices,
}

async fn harness(name: &str) -> Harness {
    let storage = Storage::sqlite(&format!("sqlite:file:memdb_api_{name}?mode=memory&cache=shared"))
        .await
        .expect("connect sqlite");
    let services = AppServices::from_storage(
        &storage,
        Clock::fixed(fixed_now()),
        ServicesConfig::default(),
    )
    .expect("wire services");
    let app = api::router(api::AppState::new(services.clone(), false));
    Harness { app, services }
}

impl Harness {
    async fn sign_in(&self, sub: &str) -> String {
        self.services
            .auth()
            .login(UserProfile {
                id: UserId::new(sub),
                email: format!("{sub}@corp.test"),
                first_name: Some("Grace".into()),
                last_name: Some("Hopper".into()),
                profile_image_url: None,
            })
            .await
            .expect("login")
            .session
            .token
    }

    async fn sign_in_admin(&self, sub: &str) -> String {
        let token = self.sign_in(sub).await;
        self.services
            .auth()
            .promote(&format!("{sub}@corp.test"))
            .await
            .expect("promote");
        token
    }

    async fn seed(&self) -> SectionId {
        match seed_sample_content(
            &self.services.sections(),
            &self.services.modules(),
            &self.services.assessments(),
        )
        .await
        .expect("seed")
        {
            SeedOutcome::Inserted { section_id, .. } | SeedOutcome::AlreadyPresent(section_id) => {
                section_id
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<String>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::COOKIE, format!("{}={token}", api::SESSION_COOKIE));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body)),
            None => builder.body(Body::empty()),
        }
        .expect("request");
        self.app.clone().oneshot(request).await.expect("response")
    }

    async fn start(&self, token: &str, section: SectionId) -> axum::response::Response {
        self.send(
            Method::POST,
            &format!("/api/sections/{section}/assessment/start"),
            Some(token),
            None,
        )
        .await
    }

    /// Starts an attempt and submits either the answer key or one wrong pick per question.
    async fn sit(&self, token: &str, section: SectionId, all_correct: bool) -> Value {
        assert_eq!(self.start(token, section).await.status(), StatusCode::OK);
        let questions = self
            .services
            .assessments()
            .questions_for_section(section)
            .await
            .expect("questions");
        let answers: Map<String, Value> = questions
            .iter()
            .map(|q| {
                let key = q.answer_key.index();
                let pick = if all_correct { key } else { (key + 1) % q.options.len() };
                (q.id.to_string(), json!(pick))
            })
            .collect();
        let submitted = self
            .send(
                Method::POST,
                "/api/assessment/results",
                Some(token),
                Some(json!({ "sectionId": section, "answers": answers }).to_string()),
            )
            .await;
        assert_eq!(submitted.status(), StatusCode::OK);
        body_json(submitted).await
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn health_reports_ok() {
    let h = harness("health").await;
    let response = h.send(Method::GET, "/health", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await, json!({ "status": "ok" }));
}

#[tokio::test]
async fn protected_routes_need_a_session() {
    let h = harness("unauth").await;
    for uri in ["/api/sections", "/api/auth/user", "/api/progress"] {
        let response = h.send(Method::GET, uri, None, None).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }

    let response = h
        .send(Method::GET, "/api/sections", Some("not-a-session"), None)
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_json(response).await["message"].is_string());
}

#[tokio::test]
async fn current_user_is_returned_in_camel_case() {
    let h = harness("me").await;
    let token = h.sign_in("emp-me").await;
    let response = h.send(Method::GET, "/api/auth/user", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let me = body_json(response).await;
    assert_eq!(me["id"], "emp-me");
    assert_eq!(me["firstName"], "Grace");
    assert_eq!(me["role"], "employee");
}

#[tokio::test]
async fn content_writes_are_admin_only() {
    let h = harness("admin_only").await;
    let employee = h.sign_in("emp-writer").await;
    let admin = h.sign_in_admin("boss").await;
    let body = json!({ "title": "Phishing", "description": "Spot the bait", "order": 1 }).to_string();

    let refused = h
        .send(Method::POST, "/api/sections", Some(&employee), Some(body.clone()))
        .await;
    assert_eq!(refused.status(), StatusCode::FORBIDDEN);

    let created = h
        .send(Method::POST, "/api/sections", Some(&admin), Some(body))
        .await;
    assert_eq!(created.status(), StatusCode::OK);
    let section = body_json(created).await;
    assert_eq!(section["title"], "Phishing");

    let listed = h.send(Method::GET, "/api/sections", Some(&employee), None).await;
    let sections = body_json(listed).await;
    assert_eq!(sections.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn malformed_json_is_a_bad_request_with_message() {
    let h = harness("bad_json").await;
    let admin = h.sign_in_admin("boss-json").await;
    let response = h
        .send(Method::POST, "/api/sections", Some(&admin), Some("{\"title\":".into()))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["message"].is_string());
}

#[tokio::test]
async fn missing_module_is_not_found() {
    let h = harness("missing_module").await;
    let token = h.sign_in("emp-404").await;
    let response = h.send(Method::GET, "/api/modules/9999", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["message"], "Module not found");
}

#[tokio::test]
async fn answer_key_is_hidden_from_employees() {
    let h = harness("redaction").await;
    let section = h.seed().await;
    let employee = h.sign_in("emp-peek").await;
    let admin = h.sign_in_admin("boss-peek").await;
    let uri = format!("/api/sections/{section}/assessment/questions");

    let seen = body_json(h.send(Method::GET, &uri, Some(&employee), None).await).await;
    let questions = seen.as_array().expect("array");
    assert_eq!(questions.len(), 5);
    assert!(questions.iter().all(|q| q.get("correctAnswer").is_none()));

    let keyed = body_json(h.send(Method::GET, &uri, Some(&admin), None).await).await;
    assert_eq!(keyed[0]["correctAnswer"], "2");
}

#[tokio::test]
async fn passing_submission_yields_a_certificate_download() {
    let h = harness("certificate").await;
    let section = h.seed().await;
    let token = h.sign_in("emp-cert").await;

    let started = h
        .send(
            Method::POST,
            &format!("/api/sections/{section}/assessment/start"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(started.status(), StatusCode::OK);
    assert_eq!(body_json(started).await["questionCount"], 5);

    let questions = h
        .services
        .assessments()
        .questions_for_section(section)
        .await
        .expect("questions");
    let answers: Map<String, Value> = questions
        .iter()
        .map(|q| (q.id.to_string(), json!(q.answer_key.index())))
        .collect();
    let submitted = h
        .send(
            Method::POST,
            "/api/assessment/results",
            Some(&token),
            Some(json!({ "sectionId": section, "answers": answers }).to_string()),
        )
        .await;
    assert_eq!(submitted.status(), StatusCode::OK);
    let result = body_json(submitted).await;
    assert_eq!(result["score"], 100);
    assert_eq!(result["passed"], true);

    let id = result["id"].as_u64().expect("result id");
    let download = h
        .send(Method::GET, &format!("/api/certificate/{id}"), Some(&token), None)
        .await;
    assert_eq!(download.status(), StatusCode::OK);
    let headers = download.headers();
    assert_eq!(headers[header::CONTENT_TYPE], "text/html; charset=utf-8");
    let disposition = headers[header::CONTENT_DISPOSITION]
        .to_str()
        .expect("ascii header");
    assert!(disposition.starts_with("attachment;"));
    assert!(disposition.contains("certificate-"));

    let stranger = h.sign_in("emp-stranger").await;
    let refused = h
        .send(Method::GET, &format!("/api/certificate/{id}"), Some(&stranger), None)
        .await;
    assert_eq!(refused.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn login_without_oauth_credentials_is_unavailable() {
    let h = harness("no_oauth").await;
    let response = h.send(Method::GET, "/api/login", None, None).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn callback_with_mismatched_state_redirects_with_error() {
    let h = harness("bad_state").await;
    let response = h
        .send(
            Method::GET,
            "/api/auth/callback/google?code=abc&state=forged",
            None,
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(response.headers()[header::LOCATION], "/?error=auth_failed");
}

#[tokio::test]
async fn logout_clears_the_session() {
    let h = harness("logout").await;
    let token = h.sign_in("emp-bye").await;
    let response = h.send(Method::GET, "/api/logout", Some(&token), None).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let after = h.send(Method::GET, "/api/auth/user", Some(&token), None).await;
    assert_eq!(after.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn failed_result_has_no_certificate() {
    let h = harness("failed_certificate").await;
    let section = h.seed().await;
    let token = h.sign_in("emp-fail").await;

    let result = h.sit(&token, section, false).await;
    assert_eq!(result["passed"], false);
    let id = result["id"].as_u64().expect("result id");

    let response = h
        .send(Method::GET, &format!("/api/certificate/{id}"), Some(&token), None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["message"],
        "Certificate only available for passed assessments"
    );
}

#[tokio::test]
async fn admin_reset_unlocks_a_passed_section() {
    let h = harness("admin_reset").await;
    let section = h.seed().await;
    let token = h.sign_in("emp-reset").await;
    let admin = h.sign_in_admin("boss-reset").await;

    assert_eq!(h.sit(&token, section, true).await["passed"], true);
    assert_eq!(h.start(&token, section).await.status(), StatusCode::CONFLICT);

    let refused = h
        .send(
            Method::DELETE,
            &format!("/api/admin/assessment/results/emp-reset?sectionId={section}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(refused.status(), StatusCode::FORBIDDEN);

    let reset = h
        .send(
            Method::DELETE,
            &format!("/api/admin/assessment/results/emp-reset?sectionId={section}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(reset.status(), StatusCode::OK);
    assert_eq!(body_json(reset).await["removed"], 1);

    let mine = body_json(
        h.send(Method::GET, "/api/assessment/results", Some(&token), None)
            .await,
    )
    .await;
    let section_value = json!(section);
    assert!(
        mine.as_array()
            .expect("array")
            .iter()
            .all(|r| r["sectionId"] != section_value)
    );

    assert_eq!(h.start(&token, section).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn admin_reset_rejects_a_malformed_section_filter() {
    let h = harness("reset_bad_query").await;
    let admin = h.sign_in_admin("boss-query").await;
    let response = h
        .send(
            Method::DELETE,
            "/api/admin/assessment/results/emp-any?sectionId=abc",
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
