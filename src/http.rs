use {
    rocket::{
        Build,
        Request,
        Rocket,
        State,
        http::Status,
        request::{
            self,
            FromRequest,
        },
        response::{
            self,
            Responder,
        },
        serde::json::{
            self,
            Json,
        },
    },
    crate::{
        error::DataFetchError,
        leaderboard::{
            self,
            LeaderboardEntry,
        },
        phase,
        prelude::*,
        status::{
            self,
            BatchReport,
        },
    },
};

pub(crate) type DynStore = Arc<dyn Store>;
pub(crate) type DynProvider = Arc<dyn BracketProvider>;

/// Key expected in the `Authorization: Bearer` header of admin requests.
struct AdminApiKey(Option<String>);

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl ErrorBody {
    fn new(error: impl ToString) -> Json<Self> {
        Json(Self { success: false, error: error.to_string() })
    }
}

impl<'r> Responder<'r, 'static> for Error {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = match self {
            Self::NotFound(_) => Status::NotFound,
            Self::MalformedBracketUrl(_) | Self::InvalidTournamentState(..) => Status::BadRequest,
            Self::DataFetch(DataFetchError::StartGG(_)) => Status::BadGateway,
            Self::DataFetch(DataFetchError::Store(_)) => Status::InternalServerError,
        };
        if status.class().is_server_error() {
            log::error!("responded with {status} to request to {}: {self} ({self:?})", request.uri());
        }
        (status, ErrorBody::new(self)).respond_to(request)
    }
}

/// Request guard for the admin endpoints.
pub(crate) struct Admin;

#[rocket::async_trait]
impl<'r> FromRequest<'r> for Admin {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> request::Outcome<Self, ()> {
        let Some(AdminApiKey(Some(key))) = request.rocket().state::<AdminApiKey>() else { return request::Outcome::Error((Status::Forbidden, ())) };
        let token = request.headers().get_one("Authorization")
            .and_then(|header| header.trim().split_once(' '))
            .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("Bearer"))
            .map(|(_, token)| token.trim());
        match token {
            Some(token) if keys_match(token, key) => request::Outcome::Success(Self),
            Some(_) => request::Outcome::Error((Status::Forbidden, ())),
            None => request::Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

/// Compares without short-circuiting on the first differing byte.
fn keys_match(given: &str, expected: &str) -> bool {
    given.len() == expected.len() && given.bytes().zip(expected.bytes()).fold(0, |diff, (a, b)| diff | (a ^ b)) == 0
}

#[derive(Serialize)]
pub(crate) struct LeaderboardResponse {
    leaderboard: Vec<LeaderboardEntry>,
}

#[rocket::get("/tournaments/<id>/leaderboard")]
pub(crate) async fn get_leaderboard(store: &State<DynStore>, id: TournamentId) -> Result<Json<LeaderboardResponse>, Error> {
    Ok(Json(LeaderboardResponse {
        leaderboard: leaderboard::leaderboard(store.inner().as_ref(), id).await?,
    }))
}

#[derive(Serialize)]
pub(crate) struct StatusResponse {
    status: TournamentStatus,
    warnings: Vec<Warning>,
}

#[rocket::get("/tournaments/<id>/status")]
pub(crate) async fn get_status(store: &State<DynStore>, id: TournamentId) -> Result<Json<StatusResponse>, Error> {
    let Warned { value, warnings } = status::current_status(store.inner().as_ref(), id, Utc::now()).await?;
    Ok(Json(StatusResponse { status: value, warnings }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PhaseStatusResponse {
    success: bool,
    #[serde(flatten)]
    phase: PhaseStatus,
    warnings: Vec<Warning>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PhaseStatusRequest {
    #[serde(default)]
    bracket_url: Option<String>,
}

async fn phase_status(store: &DynStore, provider: &DynProvider, id: TournamentId, override_url: Option<&str>) -> Result<Json<PhaseStatusResponse>, Error> {
    let Warned { value, warnings } = phase::refresh(store.as_ref(), provider.as_ref(), id, override_url, Utc::now()).await?;
    Ok(Json(PhaseStatusResponse { success: true, phase: value, warnings }))
}

#[rocket::get("/tournaments/<id>/phase-status")]
pub(crate) async fn get_phase_status(store: &State<DynStore>, provider: &State<DynProvider>, id: TournamentId) -> Result<Json<PhaseStatusResponse>, Error> {
    phase_status(store, provider, id, None).await
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum PhaseStatusError {
    #[error(transparent)] Core(#[from] Error),
    #[error("invalid request body: {0}")]
    Body(String),
}

impl<'r> Responder<'r, 'static> for PhaseStatusError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        match self {
            Self::Core(e) => e.respond_to(request),
            Self::Body(_) => (Status::BadRequest, ErrorBody::new(self)).respond_to(request),
        }
    }
}

/// Like [`get_phase_status`], but the body may name a bracket URL to use instead of the stored one.
///
/// An empty body means no override. A body that is present but not a valid request is rejected.
#[rocket::post("/tournaments/<id>/phase-status", data = "<body>")]
pub(crate) async fn post_phase_status(store: &State<DynStore>, provider: &State<DynProvider>, id: TournamentId, body: Result<Json<PhaseStatusRequest>, json::Error<'_>>) -> Result<Json<PhaseStatusResponse>, PhaseStatusError> {
    let override_url = match body {
        Ok(Json(PhaseStatusRequest { bracket_url })) => bracket_url,
        Err(json::Error::Parse(raw, _)) if raw.trim().is_empty() => None,
        Err(e) => return Err(PhaseStatusError::Body(e.to_string())),
    };
    Ok(phase_status(store, provider, id, override_url.as_deref()).await?)
}

#[rocket::post("/admin/fix-statuses")]
pub(crate) async fn fix_statuses(_admin: Admin, store: &State<DynStore>) -> Result<Json<BatchReport>, Error> {
    let report = status::reconcile_all(store.inner().as_ref(), Utc::now()).await?;
    log::info!("status fix requested: {report}");
    Ok(Json(report))
}

#[rocket::catch(default)]
fn default_catcher(status: Status, _: &Request<'_>) -> (Status, Json<ErrorBody>) {
    (status, ErrorBody::new(status.reason_lossy()))
}

pub(crate) fn rocket(store: DynStore, provider: DynProvider, admin_api_key: Option<String>, port: u16) -> Rocket<Build> {
    rocket::custom(rocket::Config::figment()
        .merge(("port", port))
        .merge(("log_level", "critical"))
    )
    .mount("/", rocket::routes![
        get_leaderboard,
        get_status,
        get_phase_status,
        post_phase_status,
        fix_statuses,
    ])
    .register("/", rocket::catchers![default_catcher])
    .manage(store)
    .manage(provider)
    .manage(AdminApiKey(admin_api_key))
}
