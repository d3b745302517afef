//! # API REST
//!
//! REST API implementation for the clinic portal.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - Session-context extraction from request headers, including lab-admin
//!   "view as clinic" impersonation
//! - Mapping domain errors onto HTTP statuses
//!
//! Uses `portal-api-shared` for the request/response bodies. The handlers are
//! thin: every business rule lives in `portal-core`, and every handler follows
//! the same shape (extract session, convert the body, call one core service,
//! convert the result).

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{HeaderMap, StatusCode},
    response::Json,
    routing::{get, post, put},
    Router,
};
use portal_api_shared::auth::{self, AuthError};
use portal_api_shared::{
    CaseRes, ConsentRes, ErrorRes, FileUpload, HealthRes, HealthService, KitOrderReq, KitOrderRes,
    ListCasesRes, ListConsentsRes, PersonRes, SubmitRequisitionReq, UpdateStatusReq,
    UploadReportReq, UploadReportRes,
};
use portal_core::{
    CaseError, CaseFilter, CaseLifecycleService, CaseStatus, CaseStore, ConsentStore, CoreConfig,
    DocumentStore, KitOrderService, KitOrderStore, Notifier, RecordId, ReferenceDirectory,
    ReportService, RequisitionService, SessionContext,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

type ErrorResponse = (StatusCode, Json<ErrorRes>);

/// Application state shared across REST API handlers.
///
/// Holds one instance of each core service plus the reference directory used
/// for session resolution.
#[derive(Clone)]
pub struct AppState {
    requisitions: RequisitionService,
    lifecycle: CaseLifecycleService,
    reports: ReportService,
    orders: KitOrderService,
    directory: Arc<dyn ReferenceDirectory>,
}

impl AppState {
    /// Wires the core services from their collaborators.
    pub fn new(
        cfg: Arc<CoreConfig>,
        cases: Arc<dyn CaseStore>,
        consents: Arc<dyn ConsentStore>,
        kit_orders: Arc<dyn KitOrderStore>,
        directory: Arc<dyn ReferenceDirectory>,
        documents: Arc<dyn DocumentStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            requisitions: RequisitionService::new(
                cases.clone(),
                consents.clone(),
                documents.clone(),
                directory.clone(),
            ),
            lifecycle: CaseLifecycleService::new(cases.clone(), consents),
            reports: ReportService::new(cases, documents, directory.clone(), notifier.clone()),
            orders: KitOrderService::new(cfg, kit_orders, directory.clone(), notifier),
            directory,
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        submit_case,
        list_cases,
        get_case,
        update_status,
        upload_report,
        list_consents,
        place_kit_order,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        FileUpload,
        PersonRes,
        SubmitRequisitionReq,
        CaseRes,
        ListCasesRes,
        ConsentRes,
        ListConsentsRes,
        UpdateStatusReq,
        UploadReportReq,
        UploadReportRes,
        KitOrderReq,
        KitOrderRes,
    ))
)]
struct ApiDoc;

/// Builds the portal's REST router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/cases", post(submit_case))
        .route("/cases", get(list_cases))
        .route("/cases/:id", get(get_case))
        .route("/cases/:id/status", put(update_status))
        .route("/cases/:id/report", post(upload_report))
        .route("/cases/:id/consents", get(list_consents))
        .route("/kit-orders", post(place_kit_order))
        .merge(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Binds `addr` and serves the router until the process is stopped.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails while
/// running.
pub async fn serve(addr: &str, state: AppState) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await
}

/// Maps a domain error onto an HTTP response.
///
/// Business-rule violations surface their message verbatim at 422 so the
/// clinic form can display them; backend failures are logged in full and
/// surface only a generic 500.
fn error_response(err: CaseError) -> ErrorResponse {
    let (status, message) = match &err {
        CaseError::Validation(_) | CaseError::ProviderNotAvailable => {
            (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        CaseError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        CaseError::DuplicateConsent => (StatusCode::CONFLICT, err.to_string()),
        CaseError::NoClinicContext | CaseError::InvalidId(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        CaseError::ImpersonationNotPermitted => (StatusCode::FORBIDDEN, err.to_string()),
        CaseError::Backend(_) | CaseError::DocumentStorage(_) | CaseError::Notification(_) => {
            tracing::error!("backend error: {err:?}");
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".into())
        }
    };
    (status, Json(ErrorRes { error: message }))
}

fn bad_request(message: impl ToString) -> ErrorResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorRes {
            error: message.to_string(),
        }),
    )
}

fn unauthorised(message: &str) -> ErrorResponse {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorRes {
            error: message.to_owned(),
        }),
    )
}

fn forbidden(message: &str) -> ErrorResponse {
    (
        StatusCode::FORBIDDEN,
        Json(ErrorRes {
            error: message.to_owned(),
        }),
    )
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Resolves the acting user from the request headers.
///
/// Expects `x-api-key` (shared key), `x-user-id` (canonical identifier,
/// resolved through the reference directory) and optionally
/// `x-act-as-clinic` for lab admins viewing the portal as a clinic.
fn session_from_headers(
    headers: &HeaderMap,
    directory: &Arc<dyn ReferenceDirectory>,
) -> Result<SessionContext, ErrorResponse> {
    let api_key = header_str(headers, "x-api-key").unwrap_or_default();
    match auth::validate_api_key(api_key) {
        Ok(()) => {}
        Err(AuthError::InvalidKey) => return Err(unauthorised("Invalid API key")),
        Err(AuthError::KeyNotConfigured) => {
            tracing::error!("API_KEY not configured");
            return Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorRes {
                    error: "Internal error".into(),
                }),
            ));
        }
    }

    let user_id = header_str(headers, "x-user-id")
        .ok_or_else(|| unauthorised("Missing x-user-id header"))?;
    let user_id = RecordId::parse(user_id).map_err(bad_request)?;

    let user = match directory.fetch_user(user_id) {
        Ok(user) => user,
        Err(CaseError::NotFound { .. }) => return Err(unauthorised("Unknown user")),
        Err(other) => return Err(error_response(other)),
    };
    if !user.is_active {
        return Err(unauthorised("User is deactivated"));
    }

    match header_str(headers, "x-act-as-clinic") {
        Some(clinic) => {
            let clinic_id = RecordId::parse(clinic).map_err(bad_request)?;
            SessionContext::acting_as_clinic(user, clinic_id).map_err(error_response)
        }
        None => Ok(SessionContext::new(user)),
    }
}

fn require_lab_admin(session: &SessionContext) -> Result<(), ErrorResponse> {
    if session.is_lab_admin() {
        Ok(())
    } else {
        Err(forbidden("Lab admin role required"))
    }
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint, used for monitoring and load balancer checks.
#[axum::debug_handler]
async fn health() -> Json<HealthRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/cases",
    request_body = SubmitRequisitionReq,
    responses(
        (status = 201, description = "Case created with its consent records", body = CaseRes),
        (status = 400, description = "Malformed field", body = ErrorRes),
        (status = 422, description = "Business rule violated", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Submit a requisition, creating a case and its consent record(s)
///
/// Validates the cross-field business rules before any write. On success the
/// case is created with status `consent_pending`; a patient consent is always
/// created and a partner consent when partner information was required.
#[axum::debug_handler]
async fn submit_case(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<SubmitRequisitionReq>,
) -> Result<(StatusCode, Json<CaseRes>), ErrorResponse> {
    let session = session_from_headers(&headers, &state.directory)?;
    let draft = req.into_draft().map_err(bad_request)?;
    let case = state
        .requisitions
        .submit(&session, draft)
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(CaseRes::from(&case))))
}

/// Query filters for the case listing.
#[derive(Debug, Deserialize, utoipa::IntoParams)]
struct ListCasesQuery {
    /// Restrict to one status (snake_case name).
    status: Option<String>,
    /// Restrict to one clinic (lab admins only; clinic users are always
    /// scoped to their own clinic).
    clinic_id: Option<String>,
}

#[utoipa::path(
    get,
    path = "/cases",
    params(ListCasesQuery),
    responses(
        (status = 200, description = "Cases, newest first", body = ListCasesRes),
        (status = 400, description = "Malformed filter", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// List cases, scoped to the session's clinic
///
/// Clinic users always see their own clinic's cases. Lab admins see all
/// cases, one clinic's via the `clinic_id` filter, or a clinic's via the
/// impersonation header.
#[axum::debug_handler]
async fn list_cases(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<ListCasesQuery>,
) -> Result<Json<ListCasesRes>, ErrorResponse> {
    let session = session_from_headers(&headers, &state.directory)?;

    let clinic_id = if session.is_lab_admin() {
        match session.effective_clinic() {
            Some(clinic) => Some(clinic),
            None => query
                .clinic_id
                .as_deref()
                .map(RecordId::parse)
                .transpose()
                .map_err(bad_request)?,
        }
    } else {
        Some(session.require_clinic().map_err(error_response)?)
    };
    let status = query
        .status
        .as_deref()
        .map(str::parse::<CaseStatus>)
        .transpose()
        .map_err(bad_request)?;

    let cases = state
        .lifecycle
        .list_cases(&CaseFilter { clinic_id, status })
        .map_err(error_response)?;
    Ok(Json(ListCasesRes {
        cases: cases.iter().map(CaseRes::from).collect(),
    }))
}

/// Loads a case and enforces the session's clinic scope, hiding other
/// clinics' cases as not-found.
fn fetch_scoped_case(
    state: &AppState,
    session: &SessionContext,
    id: &str,
) -> Result<portal_core::Case, ErrorResponse> {
    let case_id = RecordId::parse(id).map_err(bad_request)?;
    let case = state.lifecycle.fetch_case(case_id).map_err(error_response)?;

    if !session.is_lab_admin() && session.effective_clinic() != Some(case.clinic_id) {
        return Err((
            StatusCode::NOT_FOUND,
            Json(ErrorRes {
                error: format!("case not found: {case_id}"),
            }),
        ));
    }
    Ok(case)
}

#[utoipa::path(
    get,
    path = "/cases/{id}",
    responses(
        (status = 200, description = "The case", body = CaseRes),
        (status = 404, description = "No such case", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Fetch one case by id (clinic-scoped)
#[axum::debug_handler]
async fn get_case(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<CaseRes>, ErrorResponse> {
    let session = session_from_headers(&headers, &state.directory)?;
    let case = fetch_scoped_case(&state, &session, &id)?;
    Ok(Json(CaseRes::from(&case)))
}

#[utoipa::path(
    put,
    path = "/cases/{id}/status",
    request_body = UpdateStatusReq,
    responses(
        (status = 200, description = "Refreshed case", body = CaseRes),
        (status = 400, description = "Unknown status name", body = ErrorRes),
        (status = 403, description = "Lab admin role required", body = ErrorRes),
        (status = 404, description = "No such case", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Set a case's status (lab side)
///
/// Any status can be written over any other; operators use this to correct
/// mistakes as well as to advance cases.
#[axum::debug_handler]
async fn update_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<UpdateStatusReq>,
) -> Result<Json<CaseRes>, ErrorResponse> {
    let session = session_from_headers(&headers, &state.directory)?;
    require_lab_admin(&session)?;

    let case_id = RecordId::parse(&id).map_err(bad_request)?;
    let target = req.status.parse::<CaseStatus>().map_err(bad_request)?;
    let case = state
        .lifecycle
        .set_status(case_id, target)
        .map_err(error_response)?;
    Ok(Json(CaseRes::from(&case)))
}

#[utoipa::path(
    post,
    path = "/cases/{id}/report",
    request_body = UploadReportReq,
    responses(
        (status = 200, description = "Refreshed case and notification count", body = UploadReportRes),
        (status = 400, description = "Malformed body", body = ErrorRes),
        (status = 403, description = "Lab admin role required", body = ErrorRes),
        (status = 404, description = "No such case", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Upload a finished report for a case (lab side)
///
/// Stores the file, records its reference on the case, forces the status to
/// `report_ready` and notifies the clinic's active users. Notification
/// failure does not fail the upload.
#[axum::debug_handler]
async fn upload_report(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<UploadReportReq>,
) -> Result<Json<UploadReportRes>, ErrorResponse> {
    let session = session_from_headers(&headers, &state.directory)?;
    require_lab_admin(&session)?;

    let case_id = RecordId::parse(&id).map_err(bad_request)?;
    let bytes = req.decode_bytes().map_err(bad_request)?;
    let outcome = state
        .reports
        .upload_report(case_id, &req.file_name, &bytes)
        .map_err(error_response)?;
    Ok(Json(UploadReportRes {
        case: CaseRes::from(&outcome.case),
        notified_users: outcome.notified_users,
    }))
}

#[utoipa::path(
    get,
    path = "/cases/{id}/consents",
    responses(
        (status = 200, description = "Consent records for the case", body = ListConsentsRes),
        (status = 404, description = "No such case", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// List a case's consent records (clinic-scoped)
#[axum::debug_handler]
async fn list_consents(
    State(state): State<AppState>,
    headers: HeaderMap,
    AxumPath(id): AxumPath<String>,
) -> Result<Json<ListConsentsRes>, ErrorResponse> {
    let session = session_from_headers(&headers, &state.directory)?;
    let case = fetch_scoped_case(&state, &session, &id)?;

    let consents = state
        .lifecycle
        .consents_for_case(case.id)
        .map_err(error_response)?;
    Ok(Json(ListConsentsRes {
        consents: consents.iter().map(ConsentRes::from).collect(),
    }))
}

#[utoipa::path(
    post,
    path = "/kit-orders",
    request_body = KitOrderReq,
    responses(
        (status = 201, description = "Order placed", body = KitOrderRes),
        (status = 400, description = "No clinic in session", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Place a supply order for the session's clinic
///
/// The lab is notified of the order; a notification failure never loses the
/// order.
#[axum::debug_handler]
async fn place_kit_order(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<KitOrderReq>,
) -> Result<(StatusCode, Json<KitOrderRes>), ErrorResponse> {
    let session = session_from_headers(&headers, &state.directory)?;
    let order = state
        .orders
        .place_order(&session, req.into_form())
        .map_err(error_response)?;
    Ok((StatusCode::CREATED, Json(KitOrderRes::from(&order))))
}
