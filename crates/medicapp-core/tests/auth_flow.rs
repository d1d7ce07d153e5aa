//! End-to-end checks of credential attachment, silent refresh and forced
//! logout, against an in-process stub of the clinic API.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use serde_json::{json, Value};

use medicapp_core::auth::{FileSessionStore, GuardDecision, RouteGuard, SessionData};
use medicapp_core::models::{
    AdminRegistration, AdminVerification, NewCategory, NewDoctor, NewPatient, TokenPair,
};
use medicapp_core::{ApiClient, ApiError, NavigationLog, PendingRequest, RefreshPolicy, Session, ViewerRole};

const VALID_REFRESH: &str = "refresh-1";
const REFRESHED_ACCESS: &str = "access-2";

#[derive(Default)]
struct StubState {
    valid_access: Mutex<String>,
    refresh_rejects: AtomicBool,
    always_unauthorized: AtomicBool,
    refresh_calls: AtomicUsize,
    refresh_saw_bearer: AtomicBool,
    patient_calls: AtomicUsize,
    seen_auth: Mutex<Vec<Option<String>>>,
    writes: Mutex<Vec<RecordedWrite>>,
}

/// A write call as the API received it.
#[derive(Debug, Clone)]
struct RecordedWrite {
    method: Method,
    path: String,
    auth: Option<String>,
    body: Value,
}

type Stub = Arc<StubState>;

fn auth_header(headers: &HeaderMap) -> Option<String> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

fn unauthorized() -> axum::response::Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "detail": "Given token not valid for any token type" })),
    )
        .into_response()
}

async fn patients(State(stub): State<Stub>, headers: HeaderMap) -> axum::response::Response {
    stub.patient_calls.fetch_add(1, Ordering::SeqCst);
    let auth = auth_header(&headers);
    stub.seen_auth.lock().unwrap().push(auth.clone());

    let expected = format!("Bearer {}", stub.valid_access.lock().unwrap());
    if stub.always_unauthorized.load(Ordering::SeqCst) || auth.as_deref() != Some(expected.as_str()) {
        return unauthorized();
    }

    Json(json!({
        "patients": [
            {"id": 1, "PatID": 100, "FName": "Amina", "MName": "", "SName": "Otieno", "Age": 34.0,
             "DOB": "1990-05-17T00:00:00Z", "city": "Kisumu",
             "categories": [{"id": 1, "name": "TB", "description": ""}],
             "created_at": "2024-02-01T10:00:00Z"},
            {"id": 2, "PatID": 101, "FName": "Juma", "MName": "K", "SName": "Mwangi", "Age": 51.0,
             "DOB": "1973-01-09T00:00:00Z", "city": "Nakuru",
             "categories": [{"id": 1, "name": "TB", "description": ""}, {"id": 2, "name": "HIV", "description": ""}],
             "created_at": "2024-02-03T10:00:00Z"}
        ]
    }))
    .into_response()
}

async fn refresh(State(stub): State<Stub>, headers: HeaderMap, Json(body): Json<Value>) -> axum::response::Response {
    stub.refresh_calls.fetch_add(1, Ordering::SeqCst);
    if headers.contains_key("authorization") {
        stub.refresh_saw_bearer.store(true, Ordering::SeqCst);
    }

    if stub.refresh_rejects.load(Ordering::SeqCst) || body["refresh"] != VALID_REFRESH {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "detail": "Token is invalid or expired", "code": "token_not_valid" })),
        )
            .into_response();
    }

    *stub.valid_access.lock().unwrap() = REFRESHED_ACCESS.to_string();
    Json(json!({ "access": REFRESHED_ACCESS })).into_response()
}

async fn login(Json(body): Json<Value>) -> axum::response::Response {
    match (body["username"].as_str(), body["password"].as_str()) {
        (Some("admin"), Some("s3cret")) => {
            Json(json!({ "access": "access-1", "refresh": VALID_REFRESH })).into_response()
        }
        (Some("silent"), _) => StatusCode::UNAUTHORIZED.into_response(),
        _ => (StatusCode::BAD_REQUEST, Json(json!({ "error": "Wrong username or password" }))).into_response(),
    }
}

async fn categories(State(stub): State<Stub>, headers: HeaderMap) -> Json<Value> {
    stub.seen_auth.lock().unwrap().push(auth_header(&headers));
    Json(json!([
        {"id": 1, "name": "TB", "description": "Tuberculosis program"},
        {"id": 2, "name": "HIV", "description": "ART clinic"},
        {"id": 3, "name": "Maternal", "description": "ANC"}
    ]))
}

async fn delete_category(Path(id): Path<i64>) -> StatusCode {
    if id == 3 {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Records every write. Admin verification and forgot-password answer 401;
/// category writes echo the body back with an id.
async fn record_write(
    State(stub): State<Stub>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> axum::response::Response {
    let path = uri.path().to_string();
    stub.writes.lock().unwrap().push(RecordedWrite {
        method: method.clone(),
        path: path.clone(),
        auth: auth_header(&headers),
        body: body.clone(),
    });

    match (method.as_str(), path.as_str()) {
        (_, "/backendapi/verify-admin/") | (_, "/forgot-password/") => unauthorized(),
        ("POST", "/backendapi/categories/") => {
            let mut created = body;
            created["id"] = json!(4);
            (StatusCode::CREATED, Json(created)).into_response()
        }
        ("PUT", _) => {
            let id = path
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .and_then(|segment| segment.parse::<i64>().ok())
                .unwrap_or_default();
            let mut updated = body;
            updated["id"] = json!(id);
            Json(updated).into_response()
        }
        _ => (StatusCode::CREATED, Json(json!({ "message": "ok" }))).into_response(),
    }
}

async fn doctor_stats() -> Json<Value> {
    Json(json!({ "total_doctors": 7, "active_doctors": 5, "specializations": 3 }))
}

async fn spawn_stub(stub: Stub) -> String {
    let app = Router::new()
        .route("/backendapi/login/", post(login))
        .route("/backendapi/token/refresh/", post(refresh))
        .route("/backendapi/verify-admin/", post(record_write))
        .route("/backendapi/register/", post(record_write))
        .route("/backendapi/register-doc/", post(record_write))
        .route("/forgot-password/", post(record_write))
        .route("/backendapi/patient/", get(patients).post(record_write))
        .route("/backendapi/patient/{pat_id}/credentials/", post(record_write))
        .route("/backendapi/categories/", get(categories).post(record_write))
        .route(
            "/backendapi/categories/{id}/",
            delete(delete_category).put(record_write),
        )
        .route("/backendapi/doctors/stats/", get(doctor_stats))
        .route("/backendapi/send-email/", post(record_write))
        .with_state(stub);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

struct Harness {
    stub: Stub,
    api: ApiClient,
    navigation: Arc<NavigationLog>,
}

impl Harness {
    async fn new(valid_access: &str) -> Self {
        Self::with_session(valid_access, Session::in_memory()).await
    }

    async fn with_session(valid_access: &str, session: Session) -> Self {
        let stub: Stub = Arc::new(StubState::default());
        *stub.valid_access.lock().unwrap() = valid_access.to_string();
        let base = spawn_stub(stub.clone()).await;

        let navigation = Arc::new(NavigationLog::new());
        let api = ApiClient::new(base, session, navigation.clone()).unwrap();
        Self { stub, api, navigation }
    }

    fn sign_in(&self, access: &str, role: ViewerRole) {
        let tokens = TokenPair {
            access: access.to_string(),
            refresh: VALID_REFRESH.to_string(),
        };
        self.api.session().establish(&tokens, role).unwrap();
    }

    fn seen_auth(&self) -> Vec<Option<String>> {
        self.stub.seen_auth.lock().unwrap().clone()
    }

    fn writes(&self) -> Vec<RecordedWrite> {
        self.stub.writes.lock().unwrap().clone()
    }
}

fn sample_patient() -> NewPatient {
    NewPatient {
        first_name: "Amina".to_string(),
        middle_name: String::new(),
        surname: "Otieno".to_string(),
        pat_id: 100,
        date_of_birth: NaiveDate::from_ymd_opt(1990, 5, 17).unwrap(),
        city: "Kisumu".to_string(),
        category_ids: vec![1, 2],
    }
}

fn sample_doctor() -> NewDoctor {
    NewDoctor {
        first_name: "Grace".to_string(),
        last_name: "Wanjiru".to_string(),
        employee_id: "EMP-009".to_string(),
        email: "g.wanjiru@clinic.example".to_string(),
    }
}

#[tokio::test]
async fn test_stored_credential_is_attached_as_bearer() {
    let h = Harness::new("access-1").await;
    h.sign_in("access-1", ViewerRole::Regular);

    let patients = h.api.list_patients().await.unwrap();
    assert_eq!(patients.len(), 2);
    assert_eq!(h.seen_auth(), vec![Some("Bearer access-1".to_string())]);
    assert_eq!(h.stub.refresh_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_no_credential_means_no_authorization_header() {
    let h = Harness::new("access-1").await;

    let categories = h.api.list_categories().await.unwrap();
    assert_eq!(categories.len(), 3);
    assert_eq!(h.seen_auth(), vec![None]);
}

#[tokio::test]
async fn test_expired_access_is_refreshed_and_retried_once() {
    let h = Harness::new("access-1").await;
    h.sign_in("stale", ViewerRole::Regular);

    let patients = h.api.list_patients().await.unwrap();
    assert_eq!(patients.len(), 2);

    assert_eq!(h.stub.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.stub.patient_calls.load(Ordering::SeqCst), 2);
    assert_eq!(
        h.seen_auth(),
        vec![
            Some("Bearer stale".to_string()),
            Some(format!("Bearer {}", REFRESHED_ACCESS)),
        ]
    );
    assert!(!h.stub.refresh_saw_bearer.load(Ordering::SeqCst));
    assert_eq!(h.api.session().access_token().as_deref(), Some(REFRESHED_ACCESS));
    assert_eq!(h.api.session().refresh_token().as_deref(), Some(VALID_REFRESH));
    assert!(h.navigation.history().is_empty());
}

#[tokio::test]
async fn test_failed_refresh_clears_session_and_sends_admin_to_master() {
    let h = Harness::new("access-1").await;
    h.stub.refresh_rejects.store(true, Ordering::SeqCst);
    h.sign_in("stale", ViewerRole::SystemAdmin);

    let err = h.api.send(PendingRequest::get("/backendapi/patient/")).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));

    assert_eq!(h.stub.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.stub.patient_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.api.session().snapshot(), SessionData::default());
    assert_eq!(h.navigation.history(), vec!["/master".to_string()]);
}

#[tokio::test]
async fn test_failed_refresh_sends_regular_viewer_to_root() {
    let h = Harness::new("access-1").await;
    h.stub.refresh_rejects.store(true, Ordering::SeqCst);
    h.sign_in("stale", ViewerRole::Regular);

    let err = h.api.list_patients().await.unwrap_err();
    let api_err = err.downcast_ref::<ApiError>().expect("ApiError in chain");
    assert!(api_err.is_unauthorized());

    assert!(!h.api.session().is_authenticated());
    assert_eq!(h.navigation.last().as_deref(), Some("/"));

    let guard = RouteGuard::new(h.api.session().clone());
    assert_eq!(guard.check("/dashboard"), GuardDecision::Redirect("/"));
}

#[tokio::test]
async fn test_missing_refresh_credential_skips_refresh_call() {
    let h = Harness::new("access-1").await;

    let err = h.api.send(PendingRequest::get("/backendapi/patient/")).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    assert_eq!(h.seen_auth(), vec![None]);
    assert_eq!(h.stub.refresh_calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.navigation.last().as_deref(), Some("/"));
}

#[tokio::test]
async fn test_second_unauthorized_is_not_retried() {
    let h = Harness::new("access-1").await;
    h.stub.always_unauthorized.store(true, Ordering::SeqCst);
    h.sign_in("stale", ViewerRole::Regular);

    let err = h.api.send(PendingRequest::get("/backendapi/patient/")).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));

    assert_eq!(h.stub.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.stub.patient_calls.load(Ordering::SeqCst), 2);
    // The refresh itself worked, so the session survives.
    assert_eq!(h.api.session().access_token().as_deref(), Some(REFRESHED_ACCESS));
    assert!(h.navigation.history().is_empty());
}

#[tokio::test]
async fn test_already_retried_request_propagates_unauthorized() {
    let h = Harness::new("access-1").await;
    h.sign_in("stale", ViewerRole::Regular);

    let mut request = PendingRequest::get("/backendapi/patient/");
    request.attempt = 1;
    let err = h.api.send(request).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    assert_eq!(h.stub.refresh_calls.load(Ordering::SeqCst), 0);
    assert!(h.api.session().is_authenticated());
}

#[tokio::test]
async fn test_concurrent_failures_refresh_independently_by_default() {
    let h = Harness::new("access-1").await;
    h.sign_in("stale", ViewerRole::Regular);

    let (a, b) = tokio::join!(h.api.list_patients(), h.api.list_patients());
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(h.stub.refresh_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_single_flight_coalesces_concurrent_refreshes() {
    let h = Harness::new("access-1").await;
    h.sign_in("stale", ViewerRole::Regular);
    let api = h.api.clone().with_refresh_policy(RefreshPolicy::SingleFlight);

    let (a, b) = tokio::join!(api.list_patients(), api.list_patients());
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(h.stub.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.stub.patient_calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_admin_login_establishes_session() {
    let h = Harness::new("access-1").await;

    let landing = h.api.login("admin", "s3cret", ViewerRole::SystemAdmin).await.unwrap();
    assert_eq!(landing, "/admin");
    assert_eq!(h.navigation.last().as_deref(), Some("/admin"));

    let data = h.api.session().snapshot();
    assert!(data.has_valid_session());
    assert_eq!(data.role, ViewerRole::SystemAdmin);
    assert_eq!(data.access_token.as_deref(), Some("access-1"));

    let guard = RouteGuard::new(h.api.session().clone());
    assert_eq!(guard.check("/admin/doctors"), GuardDecision::Render);
}

#[tokio::test]
async fn test_rejected_login_reports_server_message() {
    let h = Harness::new("access-1").await;

    let err = h.api.login("admin", "wrong", ViewerRole::Regular).await.unwrap_err();
    assert_eq!(err.to_string(), "Request rejected: Wrong username or password");
    assert!(!h.api.session().is_authenticated());

    let err = h.api.login("silent", "x", ViewerRole::Regular).await.unwrap_err();
    assert_eq!(err.to_string(), "Request rejected: Invalid credentials");
    assert_eq!(h.stub.refresh_calls.load(Ordering::SeqCst), 0);
    assert!(h.navigation.history().is_empty());
}

#[tokio::test]
async fn test_admin_overview_aggregates_three_endpoints() {
    let h = Harness::new("access-1").await;
    h.sign_in("access-1", ViewerRole::SystemAdmin);

    let overview = h.api.admin_overview().await.unwrap();
    assert_eq!(overview.patients.total_patients, 2);
    assert_eq!(overview.patients.patients_by_category.get("TB"), Some(&2));
    assert_eq!(overview.patients.patients_by_category.get("HIV"), Some(&1));
    assert_eq!(overview.total_doctors, 7);
    assert_eq!(overview.doctor_stats.active_doctors, 5);
    assert_eq!(overview.total_categories, 3);
}

#[tokio::test]
async fn test_other_errors_pass_through_untouched() {
    let h = Harness::new("access-1").await;
    h.sign_in("access-1", ViewerRole::SystemAdmin);

    h.api.delete_category(3).await.unwrap();

    let err = h.api.delete_category(9).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::NotFound(_))));
    assert_eq!(h.stub.refresh_calls.load(Ordering::SeqCst), 0);
    assert!(h.api.session().is_authenticated());
}

#[tokio::test]
async fn test_failed_refresh_redirects_admin_even_when_clear_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = FileSessionStore::open(dir.path()).unwrap();
    let file = store.path().to_path_buf();
    let h = Harness::with_session("access-1", Session::new(Arc::new(store))).await;
    h.stub.refresh_rejects.store(true, Ordering::SeqCst);
    h.sign_in("stale", ViewerRole::SystemAdmin);

    std::fs::remove_file(&file).unwrap();
    std::fs::create_dir(&file).unwrap();

    let err = h.api.send(PendingRequest::get("/backendapi/patient/")).await.unwrap_err();
    assert!(matches!(err, ApiError::Unauthorized));
    assert_eq!(h.navigation.history(), vec!["/master".to_string()]);
}

#[tokio::test]
async fn test_single_flight_ends_session_once_when_refresh_fails() {
    let h = Harness::new("access-1").await;
    h.stub.refresh_rejects.store(true, Ordering::SeqCst);
    h.sign_in("stale", ViewerRole::SystemAdmin);
    let api = h.api.clone().with_refresh_policy(RefreshPolicy::SingleFlight);

    let (a, b) = tokio::join!(api.list_patients(), api.list_patients());
    assert!(a.is_err() && b.is_err());
    assert_eq!(h.stub.refresh_calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.navigation.history(), vec!["/master".to_string()]);
}

#[tokio::test]
async fn test_public_calls_skip_credentials_and_refresh() {
    let h = Harness::new("access-1").await;
    h.sign_in("access-1", ViewerRole::SystemAdmin);

    let verification = AdminVerification {
        employee_id: "EMP-001".to_string(),
        email: "root@clinic.example".to_string(),
    };
    let err = h.api.verify_admin(&verification).await.unwrap_err();
    assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized)));

    let err = h.api.forgot_password("root@clinic.example").await.unwrap_err();
    assert!(matches!(err.downcast_ref::<ApiError>(), Some(ApiError::Unauthorized)));

    let writes = h.writes();
    assert_eq!(writes.len(), 2);
    assert!(writes.iter().all(|w| w.auth.is_none()));
    assert_eq!(writes[0].body["employee_id"], "EMP-001");
    assert_eq!(writes[1].body["email"], "root@clinic.example");

    assert_eq!(h.stub.refresh_calls.load(Ordering::SeqCst), 0);
    assert!(h.navigation.history().is_empty());
    assert!(h.api.session().is_authenticated());
}

#[tokio::test]
async fn test_registration_lands_on_entry_screens() {
    let h = Harness::new("access-1").await;
    h.sign_in("access-1", ViewerRole::Regular);

    let registration = AdminRegistration {
        employee_id: "EMP-001".to_string(),
        email: "root@clinic.example".to_string(),
        password: "n3w-pass".to_string(),
    };
    assert_eq!(h.api.register_admin(&registration).await.unwrap(), "/master");
    assert_eq!(h.api.register_doctor(&sample_doctor()).await.unwrap(), "/");

    let writes = h.writes();
    assert_eq!(writes[0].path, "/backendapi/register/");
    assert_eq!(writes[0].body["password"], "n3w-pass");
    assert_eq!(writes[1].path, "/backendapi/register-doc/");
    assert_eq!(writes[1].body["firstName"], "Grace");
    assert!(writes.iter().all(|w| w.auth.is_none()));
    assert_eq!(h.navigation.history(), vec!["/master".to_string(), "/".to_string()]);
}

#[tokio::test]
async fn test_patient_writes_carry_bearer_and_api_field_names() {
    let h = Harness::new("access-1").await;
    h.sign_in("access-1", ViewerRole::Regular);

    h.api.create_patient(&sample_patient()).await.unwrap();
    h.api.update_patient(100, &sample_patient()).await.unwrap();

    let writes = h.writes();
    assert_eq!(writes[0].method, Method::POST);
    assert_eq!(writes[0].path, "/backendapi/patient/");
    assert_eq!(writes[1].method, Method::POST);
    assert_eq!(writes[1].path, "/backendapi/patient/100/credentials/");
    for write in &writes {
        assert_eq!(write.auth.as_deref(), Some("Bearer access-1"));
        assert_eq!(write.body["FName"], "Amina");
        assert_eq!(write.body["PatID"], 100);
        assert_eq!(write.body["DOB"], "1990-05-17");
        assert_eq!(write.body["category_ids"], json!([1, 2]));
    }
}

#[tokio::test]
async fn test_category_create_and_update_return_saved_record() {
    let h = Harness::new("access-1").await;
    h.sign_in("access-1", ViewerRole::SystemAdmin);

    let created = h
        .api
        .create_category(&NewCategory {
            name: "Diabetes".to_string(),
            description: "Chronic care".to_string(),
        })
        .await
        .unwrap();
    assert_eq!(created.id, 4);
    assert_eq!(created.name, "Diabetes");

    let updated = h
        .api
        .update_category(
            2,
            &NewCategory {
                name: "HIV/AIDS".to_string(),
                description: "ART clinic".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.id, 2);
    assert_eq!(updated.name, "HIV/AIDS");

    let writes = h.writes();
    assert_eq!(writes[0].method, Method::POST);
    assert_eq!(writes[0].path, "/backendapi/categories/");
    assert_eq!(writes[1].method, Method::PUT);
    assert_eq!(writes[1].path, "/backendapi/categories/2/");
    assert_eq!(writes[1].body["description"], "ART clinic");
}

#[tokio::test]
async fn test_doctor_admin_writes() {
    let h = Harness::new("access-1").await;
    h.sign_in("access-1", ViewerRole::SystemAdmin);

    h.api.add_doctor(&sample_doctor()).await.unwrap();
    h.api
        .send_password_reset("EMP-009", "g.wanjiru@clinic.example")
        .await
        .unwrap();

    let writes = h.writes();
    assert_eq!(writes[0].path, "/backendapi/register-doc/");
    assert_eq!(writes[0].body["employee_id"], "EMP-009");
    assert_eq!(writes[1].path, "/backendapi/send-email/");
    assert_eq!(
        writes[1].body,
        json!({ "employee_id": "EMP-009", "email": "g.wanjiru@clinic.example" })
    );
    assert!(writes
        .iter()
        .all(|w| w.auth.as_deref() == Some("Bearer access-1")));
    assert!(h.navigation.history().is_empty());
}
