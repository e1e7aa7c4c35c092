use std::sync::Arc;

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use form_service::FormService;
use form_spec::{Field, FieldType, Form, FormStatus, NewField, NewForm};
use form_store::{FailurePoint, FormStore, MemoryStore};
use form_web::auth::{SESSION_COOKIE, hash_password};
use form_web::{AppState, Settings, build_router};
use serde_json::{Value, json};
use tower::ServiceExt;

const ADMIN_EMAIL: &str = "admin@example.com";
const ADMIN_PASSWORD: &str = "correct horse";

struct Harness {
    app: Router,
    state: AppState,
    memory: Arc<MemoryStore>,
    exports: tempfile::TempDir,
}

fn harness() -> Harness {
    let memory = Arc::new(MemoryStore::new());
    let store: Arc<dyn FormStore> = memory.clone();
    let mut settings = Settings::default();
    settings.geocoding.enabled = false;
    settings.admin.email = ADMIN_EMAIL.to_string();
    settings.admin.password_hash = Some(hash_password(ADMIN_PASSWORD).expect("hash"));
    let exports = tempfile::tempdir().expect("export dir");
    settings.export.directory = exports.path().join("exports");
    let state = AppState::new(
        FormService::new(store, settings.geocoding.clone()),
        settings,
    );
    Harness {
        app: build_router(state.clone()),
        state,
        memory,
        exports,
    }
}

impl Harness {
    async fn send(&self, request: Request<Body>) -> Response {
        self.app.clone().oneshot(request).await.expect("response")
    }

    async fn form_with_fields(&self, slug: &str, status: FormStatus) -> (Form, Vec<Field>) {
        let editor = self.state.service.editor();
        let form = editor
            .create_form(NewForm {
                name: "Housing Survey".into(),
                public_url: Some(slug.to_string()),
                status,
                ..NewForm::default()
            })
            .await
            .expect("form");
        let email = editor
            .add_field(form.id, NewField::new("Email", FieldType::Email).required())
            .await
            .expect("email");
        let wanted = editor
            .add_field(
                form.id,
                NewField::new("Wanted", FieldType::Checkbox)
                    .with_options(["Apartment", "House", "Land"]),
            )
            .await
            .expect("checkbox");
        (form, vec![email, wanted])
    }

    async fn sign_in(&self) -> String {
        let response = self
            .send(
                Request::post("/auth/login")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(
                        "email=Admin%40Example.com&password=correct+horse&redirect=%2Fadmin%2Fapi%2Fdashboard",
                    ))
                    .expect("request"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/admin/api/dashboard");
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .expect("session cookie");
        cookie
            .split(';')
            .next()
            .expect("cookie pair")
            .to_string()
    }
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|value| value.to_str().ok())
        .expect("location header")
}

async fn body_text(response: Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body");
    String::from_utf8(bytes.to_vec()).expect("utf-8 body")
}

async fn body_json(response: Response) -> Value {
    serde_json::from_str(&body_text(response).await).expect("json body")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request")
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

#[tokio::test]
async fn draft_form_page_is_not_found() {
    let harness = harness();
    harness.form_with_fields("x", FormStatus::Draft).await;

    let response = harness.send(get("/form/x")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(body_text(response).await.contains("Form not found"));

    let response = harness.send(get("/api/forms/x")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"]["code"], "not_found");

    for slug in ["x", "missing"] {
        let response = harness
            .send(
                Request::post(format!("/api/forms/{slug}/submissions"))
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("anything=1"))
                    .expect("request"),
            )
            .await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let html = body_text(response).await;
        assert!(html.contains("Form not found"), "{slug}: {html}");
    }
}

#[tokio::test]
async fn active_form_renders_enabled_fields() {
    let harness = harness();
    let (_, fields) = harness.form_with_fields("survey", FormStatus::Active).await;

    let response = harness.send(get("/form/survey")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains("<h1>Housing Survey</h1>"));
    assert!(html.contains(&format!("name=\"{}\"", fields[0].id)));

    let response = harness.send(get("/api/forms/survey")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["fields"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn invalid_json_submission_is_rejected_with_field_errors() {
    let harness = harness();
    let (_, fields) = harness.form_with_fields("survey", FormStatus::Active).await;

    let response = harness
        .send(json_request(
            "POST",
            "/api/forms/survey/submissions",
            json!({ fields[0].id.to_string(): "not-an-email" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert_eq!(body["error"]["code"], "validation_failed");
    assert_eq!(body["data"]["errors"][0]["kind"], "invalid_email");
    assert_eq!(
        body["data"]["errors"][0]["field_id"],
        fields[0].id.to_string()
    );
    assert_eq!(
        harness.memory.count_submissions(None).await.expect("count"),
        0
    );

    let response = harness
        .send(json_request(
            "POST",
            "/api/forms/survey/submissions",
            json!({ fields[0].id.to_string(): "someone@example.com" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["data"]["values"].as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn html_form_post_joins_checkbox_choices() {
    let harness = harness();
    let (form, fields) = harness.form_with_fields("survey", FormStatus::Active).await;
    let body = format!(
        "{email}=a%40b.co&{wanted}=Apartment&{wanted}=Land",
        email = fields[0].id,
        wanted = fields[1].id
    );

    let response = harness
        .send(
            Request::post("/api/forms/survey/submissions")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(body))
                .expect("request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/form/survey");

    let submissions = harness
        .memory
        .list_submissions(Some(form.id))
        .await
        .expect("list");
    let values = harness
        .memory
        .list_values(&[submissions[0].id])
        .await
        .expect("values");
    let wanted = values
        .iter()
        .find(|value| value.field_id == fields[1].id)
        .expect("checkbox answer");
    assert_eq!(wanted.value, "Apartment, Land");

    let response = harness
        .send(
            Request::post("/api/forms/survey/submissions")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(format!("{}=nope", fields[0].id)))
                .expect("request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(
        body_text(response)
            .await
            .contains("Please enter a valid email address")
    );
}

#[tokio::test]
async fn answer_preview_reports_visible_fields() {
    let harness = harness();
    let (form, fields) = harness.form_with_fields("survey", FormStatus::Active).await;
    let other = harness
        .state
        .service
        .editor()
        .add_field(
            form.id,
            NewField::new("Other", FieldType::Text).shown_when(fields[1].id, "Land"),
        )
        .await
        .expect("conditional");

    let response = harness
        .send(json_request(
            "POST",
            "/api/forms/survey/answers",
            json!({
                "answers": {
                    fields[1].id.to_string(): "Land",
                    other.id.to_string(): "plot",
                },
                "field_id": fields[1].id,
                "value": "House",
            }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["cleared"], json!([other.id]));
    assert_eq!(body["data"]["visible"], json!([fields[0].id, fields[1].id]));

    let response = harness.send(get("/form/survey")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(html.contains(&format!(
        "data-field-id=\"{}\" data-depends-on=\"{}\" data-show-when=\"Land\" hidden>",
        other.id, fields[1].id
    )));
    assert!(html.contains(&format!("name=\"{}\" type=\"text\"", other.id)));
}

#[tokio::test]
async fn admin_routes_redirect_to_login_without_session() {
    let harness = harness();

    let response = harness.send(get("/admin/api/forms?page=2")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        "/auth/login?redirect=%2Fadmin%2Fapi%2Fforms%3Fpage%3D2"
    );

    let response = harness.send(get("/admin")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/auth/login?redirect=%2Fadmin");

    let response = harness.send(get("/auth/login?redirect=/admin/api/forms")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(body_text(response).await.contains("value=\"/admin/api/forms\""));

    let response = harness
        .send(get("/auth/login?redirect=%2Fadmin%22%3E%3Cscript%3Ealert(1)%3C%2Fscript%3E"))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response).await;
    assert!(!html.contains("<script>alert(1)"));
    assert!(html.contains("/admin&quot;&gt;&lt;script&gt;"));
}

#[tokio::test]
async fn login_flow_grants_and_revokes_admin_access() {
    let harness = harness();

    let response = harness
        .send(
            Request::post("/auth/login")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("email=admin%40example.com&password=wrong"))
                .expect("request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_text(response).await.contains("Invalid email or password"));

    let cookie = harness.sign_in().await;
    assert!(cookie.starts_with(&format!("{SESSION_COOKIE}=")));

    let response = harness
        .send(
            Request::get("/admin/api/dashboard")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["total_forms"], 0);

    let response = harness
        .send(
            Request::get("/auth/login?redirect=https://elsewhere.example")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/admin");

    let response = harness
        .send(
            Request::post("/auth/logout")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);

    let response = harness
        .send(
            Request::get("/admin/api/dashboard")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn admin_editing_and_confirmed_deletes() {
    let harness = harness();
    let cookie = harness.sign_in().await;
    let admin = |method: &str, uri: &str, body: Value| {
        let mut request = json_request(method, uri, body);
        request
            .headers_mut()
            .insert(header::COOKIE, cookie.parse().expect("cookie header"));
        request
    };

    let response = harness
        .send(admin("POST", "/admin/api/forms", json!({ "name": "Survey", "status": "active" })))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    let form_id = created["data"]["id"].as_str().expect("id").to_string();
    let slug = created["data"]["public_url"].as_str().expect("slug").to_string();
    assert_eq!(slug.len(), 26);
    assert!(created["data"]["link"]
        .as_str()
        .is_some_and(|link| link.ends_with(&format!("/form/{slug}"))));

    let response = harness
        .send(admin(
            "POST",
            &format!("/admin/api/forms/{form_id}/fields"),
            json!({ "label": "Pick", "type": "select" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let mut ids = Vec::new();
    for label in ["First", "Second", "Third"] {
        let response = harness
            .send(admin(
                "POST",
                &format!("/admin/api/forms/{form_id}/fields"),
                json!({ "label": label, "type": "text" }),
            ))
            .await;
        assert_eq!(response.status(), StatusCode::CREATED);
        ids.push(body_json(response).await["data"]["id"].as_str().expect("id").to_string());
    }

    let response = harness
        .send(admin(
            "POST",
            &format!("/admin/api/fields/{}/move", ids[1]),
            json!({ "direction": "up" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let labels = body_json(response).await["data"]
        .as_array()
        .expect("fields")
        .iter()
        .map(|field| field["label"].as_str().unwrap_or_default().to_string())
        .collect::<Vec<_>>();
    assert_eq!(labels, vec!["Second", "First", "Third"]);

    let response = harness
        .send(admin("DELETE", &format!("/admin/api/forms/{form_id}"), Value::Null))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(
        body_json(response).await["error"]["code"],
        "confirmation_required"
    );

    let response = harness
        .send(admin(
            "DELETE",
            &format!("/admin/api/forms/{form_id}?confirm=true"),
            Value::Null,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(harness.memory.count_forms(None).await.expect("count"), 0);
}

#[tokio::test]
async fn export_downloads_a_csv_attachment() {
    let harness = harness();
    let (_, fields) = harness.form_with_fields("survey", FormStatus::Active).await;
    harness
        .state
        .service
        .intake()
        .submit(
            "survey",
            [(fields[0].id, "a@b.co".to_string())].into_iter().collect(),
        )
        .await
        .expect("submit");
    let cookie = harness.sign_in().await;

    let response = harness
        .send(
            Request::get("/admin/api/submissions/export?search=b.co")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let disposition = response
        .headers()
        .get(header::CONTENT_DISPOSITION)
        .and_then(|value| value.to_str().ok())
        .expect("disposition")
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"submissions-all-"));
    let csv = body_text(response).await;
    assert!(csv.starts_with('\u{feff}'));
    assert!(csv.contains("Submission ID,Form,Date,Email,Wanted"));
    assert!(csv.contains("a@b.co"));

    let response = harness
        .send(
            Request::post("/admin/api/submissions/export")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let saved = body_json(response).await;
    let path = std::path::PathBuf::from(saved["data"]["path"].as_str().expect("path"));
    assert!(path.starts_with(harness.exports.path()));
    let written = std::fs::read_to_string(&path).expect("saved export");
    assert!(written.contains("a@b.co"));
}

#[tokio::test]
async fn dashboard_degrades_when_backend_is_down() {
    let harness = harness();
    harness.form_with_fields("survey", FormStatus::Active).await;
    let cookie = harness.sign_in().await;
    harness.memory.fail(FailurePoint::Reads);

    let response = harness
        .send(
            Request::get("/admin")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .expect("request"),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"]["dashboard"]["total_forms"], 0);
    assert_eq!(body["data"]["forms"], json!([]));

    let response = harness.send(get("/form/survey")).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"]["code"], "backend_unavailable");
}

#[tokio::test]
async fn geocode_always_returns_the_coordinate() {
    let harness = harness();

    let response = harness.send(get("/api/geocode/reverse?lat=36.8&lng=10.2")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"], json!({ "lat": 36.8, "lng": 10.2 }));

    let response = harness.send(get("/api/geocode/reverse?lat=95&lng=10.2")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn manifest_and_health() {
    let harness = harness();

    let response = harness.send(get("/manifest.json")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok()),
        Some("application/manifest+json")
    );
    let manifest = body_json(response).await;
    assert_eq!(manifest["start_url"], "/admin");
    assert_eq!(manifest["theme_color"], "#2563eb");

    let response = harness.send(get("/health")).await;
    assert_eq!(body_json(response).await["status"], "ok");
}
