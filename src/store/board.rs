//! Council board collections: flat records with whole-record replacement.

use derive_more::Display;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::storage;

use super::{Change, Error, Store};

#[derive(
    Clone, Copy, Debug, Default, Deserialize, Display, Eq, Hash, PartialEq,
    Serialize,
)]
pub struct Id(Uuid);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl From<u128> for Id {
    fn from(value: u128) -> Self {
        Self(Uuid::from_u128(value))
    }
}

/// Which collection a record belongs to.
#[derive(Clone, Copy, Debug, Display, Eq, Hash, PartialEq)]
pub enum Kind {
    #[display("announcements")]
    Announcement,
    #[display("events")]
    Event,
    #[display("clubs")]
    Club,
    #[display("elections")]
    Election,
    #[display("achievements")]
    Achievement,
    #[display("polls")]
    Poll,
    #[display("surveys")]
    Survey,
    #[display("users")]
    User,
}

impl Kind {
    /// Storage key of the collection.
    pub fn key(self) -> &'static str {
        match self {
            Self::Announcement => "announcements",
            Self::Event => "events",
            Self::Club => "clubs",
            Self::Election => "elections",
            Self::Achievement => "achievements",
            Self::Poll => "polls",
            Self::Survey => "surveys",
            Self::User => "users",
        }
    }
}

pub trait Record:
    Clone + DeserializeOwned + Send + Serialize + 'static
{
    const KIND: Kind;

    fn id(&self) -> Id;

    fn set_id(&mut self, id: Id);
}

/// Implements [`Record`] for types carrying an `id: Id` field.
macro_rules! impl_record {
    ($($t:ty => $k:ident),* $(,)?) => {
        $(
            impl Record for $t {
                const KIND: Kind = Kind::$k;

                #[inline]
                fn id(&self) -> Id {
                    self.id
                }

                #[inline]
                fn set_id(&mut self, id: Id) {
                    self.id = id;
                }
            }
        )*
    };
}

impl_record! {
    Announcement => Announcement,
    Event => Event,
    Club => Club,
    Election => Election,
    Achievement => Achievement,
    Poll => Poll,
    Survey => Survey,
    User => User,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    #[serde(default)]
    pub id: Id,
    pub title: String,
    pub content: String,
    pub author: String,
    #[serde(default)]
    pub important: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub published_at: OffsetDateTime,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    #[serde(default)]
    pub id: Id,
    pub title: String,
    pub description: String,
    pub location: String,
    pub organizer: String,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(default)]
    pub registrations: u32,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Club {
    #[serde(default)]
    pub id: Id,
    pub name: String,
    pub description: String,
    pub category: String,
    pub president: String,
    #[serde(default)]
    pub members: u32,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Election {
    #[serde(default)]
    pub id: Id,
    pub title: String,
    pub position: String,
    pub candidates: Vec<Candidate>,
    pub status: ElectionStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub starts_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub name: String,
    pub manifesto: String,
    #[serde(default)]
    pub votes: u32,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum ElectionStatus {
    Upcoming,
    Active,
    Closed,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Achievement {
    #[serde(default)]
    pub id: Id,
    pub title: String,
    pub student_name: String,
    pub description: String,
    pub category: String,
    #[serde(with = "time::serde::rfc3339")]
    pub achieved_at: OffsetDateTime,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Poll {
    #[serde(default)]
    pub id: Id,
    pub question: String,
    pub options: Vec<PollOption>,
    #[serde(default)]
    pub voted_by: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub ends_at: OffsetDateTime,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct PollOption {
    pub text: String,
    #[serde(default)]
    pub votes: u32,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Survey {
    #[serde(default)]
    pub id: Id,
    pub title: String,
    pub description: String,
    pub questions: Vec<String>,
    #[serde(default)]
    pub responses: u32,
    #[serde(default)]
    pub active: bool,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(default)]
    pub id: Id,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: String,
}

/// Dashboard a user lands on.
#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Student,
    Council,
    President,
    Admin,
}

impl Store {
    pub fn records<T: Record>(&self) -> Result<Vec<T>, Error> {
        Ok(storage::load(&*self.storage, T::KIND.key())?)
    }

    pub fn record<T: Record>(&self, id: Id) -> Result<T, Error> {
        self.records::<T>()?
            .into_iter()
            .find(|r| r.id() == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    /// Stores `record` under a freshly generated id.
    pub fn create_record<T: Record>(
        &mut self,
        mut record: T,
    ) -> Result<T, Error> {
        let mut records = self.records::<T>()?;
        record.set_id(Id::new());
        records.push(record.clone());
        self.persist_records(&records)?;
        Ok(record)
    }

    /// Replaces the record stored under `id` as a whole.
    pub fn update_record<T: Record>(
        &mut self,
        id: Id,
        mut record: T,
    ) -> Result<T, Error> {
        let mut records = self.records::<T>()?;
        let slot = records
            .iter_mut()
            .find(|r| r.id() == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        record.set_id(id);
        *slot = record.clone();
        self.persist_records(&records)?;
        Ok(record)
    }

    pub fn delete_record<T: Record>(&mut self, id: Id) -> Result<T, Error> {
        let mut records = self.records::<T>()?;
        let index = records
            .iter()
            .position(|r| r.id() == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let removed = records.remove(index);
        self.persist_records(&records)?;
        Ok(removed)
    }

    fn persist_records<T: Record>(
        &mut self,
        records: &[T],
    ) -> Result<(), Error> {
        storage::save(&*self.storage, T::KIND.key(), records)?;
        self.notify(Change::Board(T::KIND));
        Ok(())
    }
}
