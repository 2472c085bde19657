use std::str::FromStr;

use derive_more::Display;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use super::{Error, Store};

/// Upper bound for a decoded submission photo.
pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// First timeline entry of every ticket.
pub const RECEIVED: &str = "Received";

pub const ASSIGNED: &str = "Assigned";

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: Id,
    pub student_name: String,
    pub email: String,
    pub department: String,
    #[serde(rename = "type")]
    pub category: String,
    pub subject: String,
    pub description: String,
    pub priority: Priority,
    pub status: Status,
    pub assigned_to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    pub votes: u32,
    pub voted_by: Vec<String>,
    pub timeline: Vec<TimelineEntry>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Ticket {
    /// Whether the ticket was submitted as [`Submitter::Anonymous`].
    pub fn is_anonymous(&self) -> bool {
        self.student_name == Submitter::ANONYMOUS_NAME
            && self.email == Submitter::ANONYMOUS_EMAIL
    }
}

/// Ticket identifier of the `<PREFIX>-<YEAR>-<NNN>` form.
#[derive(
    Clone, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
#[serde(transparent)]
pub struct Id(String);

impl Id {
    fn new(prefix: &str, year: u16, sequence: u32) -> Self {
        Self(format!("{prefix}-{year}-{sequence:03}"))
    }

    /// Ordinal part of the identifier.
    pub fn sequence(&self) -> Option<u32> {
        self.0.rsplit_once('-')?.1.parse().ok()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Id {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for Id {
    fn from(value: String) -> Self {
        Self(value)
    }
}

#[derive(
    Clone, Copy, Debug, Deserialize, Display, Eq, Hash, PartialEq, Serialize,
)]
pub enum Status {
    /// Submitted, nobody looked at it yet.
    Pending,

    /// Claimed by staff.
    #[serde(rename = "In Review")]
    #[display("In Review")]
    InReview,

    #[serde(rename = "In Progress")]
    #[display("In Progress")]
    InProgress,

    Completed,

    Rejected,
}

impl Status {
    pub const ALL: [Self; 5] = [
        Self::Pending,
        Self::InReview,
        Self::InProgress,
        Self::Completed,
        Self::Rejected,
    ];

    /// Transition table consulted when transitions are enforced.
    pub fn can_transition_to(self, to: Self) -> bool {
        use Status as S;

        matches!(
            (self, to),
            (S::Pending, S::InReview | S::InProgress | S::Rejected)
                | (
                    S::InReview,
                    S::Pending | S::InProgress | S::Completed | S::Rejected
                )
                | (S::InProgress, S::InReview | S::Completed | S::Rejected)
                | (S::Completed, S::InProgress)
                | (S::Rejected, S::InReview)
        )
    }

    /// Whether the submitter may still edit the ticket content.
    pub fn is_editable(self) -> bool {
        self == Self::Pending
    }
}

impl FromStr for Status {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.to_string().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownStatus(s.to_owned()))
    }
}

#[derive(Clone, Debug, Display, PartialEq, derive_more::Error)]
#[display("unknown status `{_0}`")]
pub struct UnknownStatus(#[error(not(source))] String);

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, PartialEq, Serialize,
)]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TimelineEntry {
    /// A [`Status`] label, or [`RECEIVED`] / [`ASSIGNED`].
    pub status: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub completed: bool,
    pub description: String,
}

impl TimelineEntry {
    fn done(status: impl Into<String>, description: String) -> Self {
        Self {
            status: status.into(),
            date: OffsetDateTime::now_utc(),
            completed: true,
            description,
        }
    }
}

/// Who submitted a ticket.
#[derive(Clone, Debug, PartialEq)]
pub enum Submitter {
    Named { name: String, email: String },
    Anonymous,
}

impl Submitter {
    pub const ANONYMOUS_NAME: &'static str = "Anonymous";

    pub const ANONYMOUS_EMAIL: &'static str = "anonymous@council.local";

    /// Name and email as stored on the ticket.
    pub fn into_identity(self) -> (String, String) {
        match self {
            Self::Named { name, email } => (name, email),
            Self::Anonymous => (
                Self::ANONYMOUS_NAME.to_owned(),
                Self::ANONYMOUS_EMAIL.to_owned(),
            ),
        }
    }
}

/// Everything a submitter provides when creating a ticket.
#[derive(Clone, Debug)]
pub struct NewTicket {
    pub submitter: Submitter,
    pub department: String,
    pub category: String,
    pub subject: String,
    pub description: String,
    pub image: Option<String>,
}

impl NewTicket {
    /// Submission form checks. [`Store::create_ticket`] does not call this.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for (field, value) in [
            ("department", &self.department),
            ("subject", &self.subject),
            ("description", &self.description),
        ] {
            require(field, value)?;
        }
        check_image(self.image.as_deref())
    }
}

fn require(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

fn check_image(image: Option<&str>) -> Result<(), ValidationError> {
    match image.map(decoded_len) {
        Some(size) if size > MAX_IMAGE_BYTES => {
            Err(ValidationError::ImageTooLarge(size))
        }
        _ => Ok(()),
    }
}

/// Approximate decoded size of a base64 payload or data URL.
fn decoded_len(image: &str) -> usize {
    let payload = image
        .split_once(";base64,")
        .map_or(image, |(_, payload)| payload);
    let padding = payload.bytes().rev().take_while(|&b| b == b'=').count();
    (payload.len() * 3 / 4).saturating_sub(padding)
}

#[derive(Clone, Debug, Display, PartialEq, derive_more::Error)]
pub enum ValidationError {
    #[display("`{_0}` is required")]
    MissingField(#[error(not(source))] &'static str),

    #[display("image is {_0} bytes, at most {} allowed", MAX_IMAGE_BYTES)]
    ImageTooLarge(#[error(not(source))] usize),

    #[display("anonymous tickets cannot carry a name or email")]
    IdentityOnAnonymous,
}

/// Content fields a submitter may change. Absent fields stay as they are.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentPatch {
    pub student_name: Option<String>,
    pub email: Option<String>,
    pub department: Option<String>,
    #[serde(rename = "type")]
    pub category: Option<String>,
    pub subject: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub image: Option<String>,
}

impl ContentPatch {
    /// Edit form checks against the ticket being edited. Provided fields
    /// obey the submission rules, and an anonymous ticket stays anonymous.
    /// [`Store::update_ticket_content`] does not call this.
    pub fn validate(&self, ticket: &Ticket) -> Result<(), ValidationError> {
        for (field, value) in [
            ("department", &self.department),
            ("subject", &self.subject),
            ("description", &self.description),
        ] {
            if let Some(value) = value {
                require(field, value)?;
            }
        }
        check_image(self.image.as_deref())?;

        let sets_identity = self.student_name.is_some() || self.email.is_some();
        if sets_identity && ticket.is_anonymous() {
            return Err(ValidationError::IdentityOnAnonymous);
        }
        Ok(())
    }
}

impl Store {
    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn get_ticket_by_id(&self, id: &Id) -> Option<&Ticket> {
        self.tickets.iter().find(|t| &t.id == id)
    }

    /// Registers a new ticket in front of the collection.
    pub fn create_ticket(&mut self, new: NewTicket) -> Result<Id, Error> {
        self.check_fresh()?;

        let id = Id::new(
            &self.config.id_prefix,
            self.config.id_year,
            self.sequence,
        );
        let (student_name, email) = new.submitter.into_identity();
        let now = OffsetDateTime::now_utc();
        let received = TimelineEntry {
            status: RECEIVED.to_owned(),
            date: now,
            completed: true,
            description: "Ticket created successfully".to_owned(),
        };

        let mut tickets = Vec::with_capacity(self.tickets.len() + 1);
        tickets.push(Ticket {
            id: id.clone(),
            student_name,
            email,
            department: new.department,
            category: new.category,
            subject: new.subject,
            description: new.description,
            priority: Priority::default(),
            status: Status::Pending,
            assigned_to: None,
            image: new.image,
            votes: 0,
            voted_by: Vec::new(),
            timeline: vec![received],
            created_at: now,
            updated_at: now,
        });
        tickets.extend_from_slice(&self.tickets);
        self.commit_tickets(tickets, self.sequence + 1)?;

        tracing::info!(%id, "ticket created");
        Ok(id)
    }

    /// Moves the ticket to `status`, recording one timeline entry.
    pub fn update_ticket_status(
        &mut self,
        id: &Id,
        status: Status,
        note: Option<String>,
    ) -> Result<Ticket, Error> {
        let strict = self.config.strict_transitions;
        self.modify_ticket(id, |ticket| {
            if strict && !ticket.status.can_transition_to(status) {
                return Err(Error::InvalidTransition {
                    from: ticket.status,
                    to: status,
                });
            }
            let description =
                note.unwrap_or_else(|| format!("Status updated to {status}"));
            ticket
                .timeline
                .push(TimelineEntry::done(status.to_string(), description));
            ticket.status = status;
            ticket.updated_at = OffsetDateTime::now_utc();
            Ok(())
        })
    }

    /// Merges the provided fields. Leaves status and timeline untouched.
    pub fn update_ticket_content(
        &mut self,
        id: &Id,
        patch: ContentPatch,
    ) -> Result<Ticket, Error> {
        self.modify_ticket(id, |ticket| {
            let ContentPatch {
                student_name,
                email,
                department,
                category,
                subject,
                description,
                priority,
                image,
            } = patch;
            if let Some(v) = student_name {
                ticket.student_name = v;
            }
            if let Some(v) = email {
                ticket.email = v;
            }
            if let Some(v) = department {
                ticket.department = v;
            }
            if let Some(v) = category {
                ticket.category = v;
            }
            if let Some(v) = subject {
                ticket.subject = v;
            }
            if let Some(v) = description {
                ticket.description = v;
            }
            if let Some(v) = priority {
                ticket.priority = v;
            }
            if image.is_some() {
                ticket.image = image;
            }
            ticket.updated_at = OffsetDateTime::now_utc();
            Ok(())
        })
    }

    /// Hands the ticket to `staff`, taking a pending one into review.
    pub fn assign_ticket(
        &mut self,
        id: &Id,
        staff: &str,
    ) -> Result<Ticket, Error> {
        self.modify_ticket(id, |ticket| {
            ticket.assigned_to = Some(staff.to_owned());
            if ticket.status == Status::Pending {
                ticket.status = Status::InReview;
            }
            let description = format!("Assigned to {staff}");
            ticket
                .timeline
                .push(TimelineEntry::done(ASSIGNED, description));
            ticket.updated_at = OffsetDateTime::now_utc();
            Ok(())
        })
    }

    /// Counts one vote per `voter`. Repeated votes change nothing.
    ///
    /// Votes leave `updated_at` as it is.
    pub fn upvote_ticket(
        &mut self,
        id: &Id,
        voter: &str,
    ) -> Result<Ticket, Error> {
        self.check_fresh()?;

        let ticket = self
            .get_ticket_by_id(id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        if ticket.voted_by.iter().any(|v| v == voter) {
            return Ok(ticket.clone());
        }
        self.modify_ticket(id, |ticket| {
            ticket.voted_by.push(voter.to_owned());
            ticket.votes += 1;
            Ok(())
        })
    }

    /// Applies `edit` to a copy of the collection and commits it once
    /// persisted. On any error the store keeps its previous state.
    fn modify_ticket(
        &mut self,
        id: &Id,
        edit: impl FnOnce(&mut Ticket) -> Result<(), Error>,
    ) -> Result<Ticket, Error> {
        self.check_fresh()?;

        let mut tickets = self.tickets.clone();
        let ticket = tickets
            .iter_mut()
            .find(|t| &t.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        edit(ticket)?;
        let ticket = ticket.clone();

        self.commit_tickets(tickets, self.sequence)?;
        Ok(ticket)
    }
}
