use std::{panic, sync::Arc, time::Duration};

use axum::{
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use derive_more::From;
use serde::Deserialize;
use tokio::{sync::Mutex, task, time};

use crate::{
    api,
    store::{
        self,
        board::{self, Record},
        ticket::{self, ContentPatch, NewTicket, Submitter},
    },
    view::{self, StatusFilter},
    Store,
};

/// Leaves room for a base64 photo of [`ticket::MAX_IMAGE_BYTES`].
const BODY_LIMIT: usize = 16 * 1024 * 1024;

pub type SharedAppState = Arc<AppState>;

pub struct AppState {
    pub store: Mutex<Store>,
}

impl AppState {
    pub fn new(store: Store) -> SharedAppState {
        Arc::new(Self {
            store: Mutex::new(store),
        })
    }
}

/// Runs `f` against the locked store on the blocking pool, as store
/// operations do synchronous storage I/O.
async fn with_store<R, F>(state: &SharedAppState, f: F) -> R
where
    F: FnOnce(&mut Store) -> R + Send + 'static,
    R: Send + 'static,
{
    let state = Arc::clone(state);
    task::spawn_blocking(move || f(&mut state.store.blocking_lock()))
        .await
        .unwrap_or_else(|e| panic::resume_unwind(e.into_panic()))
}

pub fn router(state: SharedAppState) -> Router {
    Router::new()
        .route("/tickets", get(list_tickets).post(add_ticket))
        .route("/tickets/counts", get(count_tickets))
        .route("/tickets/:id", get(get_ticket).patch(edit_ticket))
        .nest("/announcements", records::<board::Announcement>())
        .nest("/events", records::<board::Event>())
        .nest("/clubs", records::<board::Club>())
        .nest("/elections", records::<board::Election>())
        .nest("/achievements", records::<board::Achievement>())
        .nest("/polls", records::<board::Poll>())
        .nest("/surveys", records::<board::Survey>())
        .nest("/users", records::<board::User>())
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .with_state(state)
}

/// Picks up snapshots written by other processes sharing the storage.
pub async fn watch_storage(state: SharedAppState, period: Duration) {
    let mut ticker = time::interval(period);
    loop {
        ticker.tick().await;
        match with_store(&state, |store| store.refresh()).await {
            Ok(true) => tracing::info!("reloaded tickets from storage"),
            Ok(false) => {}
            Err(e) => tracing::error!(error = %e, "failed to refresh store"),
        }
    }
}

impl IntoResponse for store::Error {
    fn into_response(self) -> Response {
        use store::Error as E;

        match self {
            E::NotFound(_) => StatusCode::NOT_FOUND,
            E::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
            E::StaleSnapshot => StatusCode::CONFLICT,
            E::Storage(e) => {
                tracing::error!(error = %e, "storage failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
        .into_response()
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddTicketInput {
    #[serde(default)]
    anonymous: bool,
    student_name: Option<String>,
    email: Option<String>,
    department: String,
    #[serde(rename = "type")]
    category: String,
    subject: String,
    description: String,
    image: Option<String>,
}

async fn add_ticket(
    State(state): State<SharedAppState>,
    Json(input): Json<AddTicketInput>,
) -> Result<Json<api::Ticket>, AddTicketError> {
    use AddTicketError as E;

    let submitter = if input.anonymous {
        Submitter::Anonymous
    } else {
        match (input.student_name, input.email) {
            (Some(name), Some(email)) => Submitter::Named { name, email },
            _ => return Err(E::SubmitterUnknown),
        }
    };
    let new = NewTicket {
        submitter,
        department: input.department,
        category: input.category,
        subject: input.subject,
        description: input.description,
        image: input.image,
    };
    new.validate()?;

    let ticket = with_store(&state, move |store| {
        let id = store.create_ticket(new)?;
        store
            .get_ticket_by_id(&id)
            .cloned()
            .ok_or_else(|| store::Error::NotFound(id.to_string()))
    })
    .await?;

    Ok(Json(ticket))
}

#[derive(Debug, From)]
pub enum AddTicketError {
    #[from]
    Invalid(ticket::ValidationError),
    #[from]
    Store(store::Error),
    SubmitterUnknown,
}

impl IntoResponse for AddTicketError {
    fn into_response(self) -> Response {
        match self {
            Self::Invalid(e) => (StatusCode::BAD_REQUEST, e.to_string())
                .into_response(),
            Self::SubmitterUnknown => StatusCode::BAD_REQUEST.into_response(),
            Self::Store(e) => e.into_response(),
        }
    }
}

#[derive(Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
enum Sort {
    Votes,
    Recent,
}

#[derive(Deserialize)]
struct ListTicketsInput {
    #[serde(default)]
    status: StatusFilter,
    #[serde(default)]
    search: String,
    sort: Option<Sort>,
}

async fn list_tickets(
    State(state): State<SharedAppState>,
    Query(ListTicketsInput {
        status,
        search,
        sort,
    }): Query<ListTicketsInput>,
) -> Json<api::ticket::List> {
    let list = with_store(&state, move |store| {
        let tickets = view::filter_by_status(store.tickets(), status);
        let tickets = view::search(tickets, &search);
        let tickets = match sort {
            Some(Sort::Votes) => view::sort_by_votes_desc(tickets),
            Some(Sort::Recent) => view::sort_by_recent(tickets),
            None => tickets,
        };

        api::ticket::List {
            total_count: tickets.len(),
            tickets: tickets.into_iter().cloned().collect(),
        }
    })
    .await;

    Json(list)
}

async fn count_tickets(
    State(state): State<SharedAppState>,
) -> Json<api::ticket::Counts> {
    Json(
        with_store(&state, |store| view::StatusCounts::of(store.tickets()))
            .await,
    )
}

async fn get_ticket(
    State(state): State<SharedAppState>,
    Path(id): Path<api::ticket::Id>,
) -> Result<Json<api::Ticket>, store::Error> {
    with_store(&state, move |store| {
        store
            .get_ticket_by_id(&id)
            .cloned()
            .map(Json)
            .ok_or_else(|| store::Error::NotFound(id.to_string()))
    })
    .await
}

#[derive(Deserialize)]
#[serde(content = "data", rename_all = "camelCase", tag = "op")]
enum EditTicketInput {
    UpdateStatus {
        status: ticket::Status,
        note: Option<String>,
    },
    EditContent(ContentPatch),
    #[serde(rename_all = "camelCase")]
    Assign {
        staff_name: String,
    },
    #[serde(rename_all = "camelCase")]
    Upvote {
        voter_id: String,
    },
}

async fn edit_ticket(
    State(state): State<SharedAppState>,
    Path(id): Path<api::ticket::Id>,
    Json(op): Json<EditTicketInput>,
) -> Result<Json<api::Ticket>, EditTicketError> {
    with_store(&state, move |store| edit(store, &id, op))
        .await
        .map(Json)
}

fn edit(
    store: &mut Store,
    id: &api::ticket::Id,
    op: EditTicketInput,
) -> Result<api::Ticket, EditTicketError> {
    use EditTicketError as E;
    use EditTicketInput as Op;

    let ticket = match op {
        Op::UpdateStatus { status, note } => {
            store.update_ticket_status(id, status, note)?
        }
        Op::EditContent(patch) => {
            let ticket = store
                .get_ticket_by_id(id)
                .ok_or_else(|| store::Error::NotFound(id.to_string()))?;
            if !ticket.status.is_editable() {
                return Err(E::TicketCannotBeModified);
            }
            patch.validate(ticket)?;
            store.update_ticket_content(id, patch)?
        }
        Op::Assign { staff_name } => store.assign_ticket(id, &staff_name)?,
        Op::Upvote { voter_id } => store.upvote_ticket(id, &voter_id)?,
    };

    Ok(ticket)
}

#[derive(Debug, From)]
pub enum EditTicketError {
    #[from]
    Invalid(ticket::ValidationError),
    #[from]
    Store(store::Error),
    TicketCannotBeModified,
}

impl IntoResponse for EditTicketError {
    fn into_response(self) -> Response {
        match self {
            Self::Invalid(e) => (StatusCode::BAD_REQUEST, e.to_string())
                .into_response(),
            Self::TicketCannotBeModified => {
                StatusCode::BAD_REQUEST.into_response()
            }
            Self::Store(e) => e.into_response(),
        }
    }
}

fn records<T>() -> Router<SharedAppState>
where
    T: Record,
{
    Router::new()
        .route("/", get(list_records::<T>).post(add_record::<T>))
        .route(
            "/:id",
            get(get_record::<T>)
                .put(replace_record::<T>)
                .delete(delete_record::<T>),
        )
}

async fn list_records<T: Record>(
    State(state): State<SharedAppState>,
) -> Result<Json<Vec<T>>, store::Error> {
    with_store(&state, |store| store.records::<T>()).await.map(Json)
}

async fn add_record<T: Record>(
    State(state): State<SharedAppState>,
    Json(record): Json<T>,
) -> Result<Json<T>, store::Error> {
    with_store(&state, move |store| store.create_record(record))
        .await
        .map(Json)
}

async fn get_record<T: Record>(
    State(state): State<SharedAppState>,
    Path(id): Path<board::Id>,
) -> Result<Json<T>, store::Error> {
    with_store(&state, move |store| store.record::<T>(id)).await.map(Json)
}

async fn replace_record<T: Record>(
    State(state): State<SharedAppState>,
    Path(id): Path<board::Id>,
    Json(record): Json<T>,
) -> Result<Json<T>, store::Error> {
    with_store(&state, move |store| store.update_record(id, record))
        .await
        .map(Json)
}

async fn delete_record<T: Record>(
    State(state): State<SharedAppState>,
    Path(id): Path<board::Id>,
) -> Result<Json<T>, store::Error> {
    with_store(&state, move |store| store.delete_record::<T>(id))
        .await
        .map(Json)
}
