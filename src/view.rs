//! Read-only projections over a ticket collection.

use std::str::FromStr;

use derive_more::Display;
use itertools::Itertools as _;
use serde::{Deserialize, Serialize};

use crate::store::ticket::{Status, Ticket, UnknownStatus};

/// Status filter where `All` lets every ticket through.
#[derive(Clone, Copy, Debug, Default, Display, Eq, PartialEq)]
pub enum StatusFilter {
    #[default]
    #[display("All")]
    All,
    #[display("{_0}")]
    Only(Status),
}

impl StatusFilter {
    pub fn matches(self, ticket: &Ticket) -> bool {
        match self {
            Self::All => true,
            Self::Only(status) => ticket.status == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        s.parse().map(Self::Only)
    }
}

impl<'de> Deserialize<'de> for StatusFilter {
    fn deserialize<D>(d: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

pub fn filter_by_status<'a>(
    tickets: impl IntoIterator<Item = &'a Ticket>,
    filter: StatusFilter,
) -> Vec<&'a Ticket> {
    tickets.into_iter().filter(|t| filter.matches(t)).collect()
}

/// Case-insensitive substring search over id, category and description.
/// An empty term matches everything.
pub fn search<'a>(
    tickets: impl IntoIterator<Item = &'a Ticket>,
    term: &str,
) -> Vec<&'a Ticket> {
    let term = term.trim().to_lowercase();
    tickets
        .into_iter()
        .filter(|t| {
            term.is_empty()
                || [
                    t.id.as_str(),
                    t.category.as_str(),
                    t.description.as_str(),
                ]
                .iter()
                .any(|field| field.to_lowercase().contains(&term))
        })
        .collect()
}

/// Most voted first. Equal counts keep their input order.
pub fn sort_by_votes_desc<'a>(
    tickets: impl IntoIterator<Item = &'a Ticket>,
) -> Vec<&'a Ticket> {
    tickets
        .into_iter()
        .sorted_by(|a, b| b.votes.cmp(&a.votes))
        .collect()
}

/// Newest first. Equal timestamps keep their input order.
pub fn sort_by_recent<'a>(
    tickets: impl IntoIterator<Item = &'a Ticket>,
) -> Vec<&'a Ticket> {
    tickets
        .into_iter()
        .sorted_by(|a, b| b.created_at.cmp(&a.created_at))
        .collect()
}

pub fn count_by_status<'a>(
    tickets: impl IntoIterator<Item = &'a Ticket>,
    status: Status,
) -> usize {
    tickets.into_iter().filter(|t| t.status == status).count()
}

/// Dashboard badge numbers.
#[derive(
    Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize,
)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub total: usize,
    pub pending: usize,
    pub in_review: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub rejected: usize,
}

impl StatusCounts {
    pub fn of<'a>(tickets: impl IntoIterator<Item = &'a Ticket>) -> Self {
        tickets.into_iter().fold(Self::default(), |mut c, t| {
            c.total += 1;
            match t.status {
                Status::Pending => c.pending += 1,
                Status::InReview => c.in_review += 1,
                Status::InProgress => c.in_progress += 1,
                Status::Completed => c.completed += 1,
                Status::Rejected => c.rejected += 1,
            }
            c
        })
    }
}
