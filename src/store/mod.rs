pub mod board;
pub mod ticket;

use std::io;

use derive_more::{Display, From};
use tokio::sync::broadcast;

use crate::{
    config,
    storage::{self, Storage},
};

pub use self::{
    board::{Kind, Record},
    ticket::Ticket,
};

/// Capacity of the change channel. Lagging subscribers skip older changes
/// and should re-read the store.
const CHANGES_CAPACITY: usize = 64;

#[derive(Debug, Display, derive_more::Error, From)]
pub enum Error {
    #[display("`{_0}` not found")]
    NotFound(#[error(not(source))] String),

    #[display("status cannot change from {from} to {to}")]
    InvalidTransition {
        from: ticket::Status,
        to: ticket::Status,
    },

    #[display("snapshot is stale, reloaded from storage")]
    StaleSnapshot,

    #[display("storage failed: {_0}")]
    #[from]
    Storage(io::Error),
}

/// Notification broadcast after every mutation of a [`Store`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Change {
    Tickets,
    Board(Kind),
    /// Snapshot was replaced by another writer's one.
    Reloaded,
}

/// Single source of truth for the tickets and the board collections.
///
/// Every operation runs to completion synchronously. Independent stores may
/// share one [`Storage`]; see [`Store::refresh`].
pub struct Store {
    storage: Box<dyn Storage>,
    config: config::Tickets,
    reject_stale_writes: bool,
    tickets: Vec<Ticket>,
    sequence: u32,
    revision: u64,
    changes: broadcast::Sender<Change>,
}

impl Store {
    pub fn open(
        storage: impl Storage + 'static,
        config: config::Tickets,
    ) -> Result<Self, Error> {
        let (changes, _) = broadcast::channel(CHANGES_CAPACITY);
        let mut store = Self {
            storage: Box::new(storage),
            config,
            reject_stale_writes: false,
            tickets: Vec::new(),
            sequence: 0,
            revision: 0,
            changes,
        };
        store.reload()?;
        Ok(store)
    }

    /// Makes mutations against an outdated snapshot fail with
    /// [`Error::StaleSnapshot`] instead of overwriting the newer one.
    pub fn reject_stale_writes(mut self, reject: bool) -> Self {
        self.reject_stale_writes = reject;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Picks up the snapshot persisted by another writer, if any.
    ///
    /// Returns whether anything changed.
    pub fn refresh(&mut self) -> Result<bool, Error> {
        if self.stored_revision()? == self.revision {
            return Ok(false);
        }
        self.reload()?;
        self.notify(Change::Reloaded);
        Ok(true)
    }

    fn reload(&mut self) -> Result<(), Error> {
        self.tickets = storage::load(&*self.storage, &self.config.key)?;
        self.revision = self.stored_revision()?;

        // Collections written without a counter still must not reuse ids.
        let next_free = self
            .tickets
            .iter()
            .filter_map(|t| t.id.sequence())
            .map(|n| n + 1)
            .max()
            .unwrap_or(0);
        self.sequence = self
            .stored_sequence()?
            .max(next_free)
            .max(self.config.first_sequence);
        Ok(())
    }

    fn stored_revision(&self) -> Result<u64, Error> {
        let key = format!("{}.revision", self.config.key);
        Ok(storage::load_value(&*self.storage, &key)?.unwrap_or(0))
    }

    fn stored_sequence(&self) -> Result<u32, Error> {
        let key = format!("{}.sequence", self.config.key);
        Ok(storage::load_value(&*self.storage, &key)?.unwrap_or(0))
    }

    /// Runs before every ticket mutation.
    fn check_fresh(&mut self) -> Result<(), Error> {
        let stored = self.stored_revision()?;
        if stored == self.revision {
            return Ok(());
        }
        if self.reject_stale_writes {
            self.reload()?;
            self.notify(Change::Reloaded);
            return Err(Error::StaleSnapshot);
        }
        tracing::warn!(
            key = %self.config.key,
            ours = self.revision,
            theirs = stored,
            "overwriting newer snapshot"
        );
        self.revision = stored;
        // Ids handed out by the other writer stay taken.
        self.sequence = self.sequence.max(self.stored_sequence()?);
        Ok(())
    }

    /// Persists `tickets` and adopts them once the payload is stored.
    ///
    /// Counters go first, so a failed payload write leaves other writers
    /// reloading the unchanged collection and no id handed out twice.
    fn commit_tickets(
        &mut self,
        tickets: Vec<Ticket>,
        sequence: u32,
    ) -> Result<(), Error> {
        let key = &self.config.key;
        storage::save_value(
            &*self.storage,
            &format!("{key}.sequence"),
            &sequence,
        )?;
        self.sequence = sequence;
        let revision = self.revision + 1;
        storage::save_value(
            &*self.storage,
            &format!("{key}.revision"),
            &revision,
        )?;
        self.revision = revision;
        storage::save(&*self.storage, key, &tickets)?;

        self.tickets = tickets;
        self.notify(Change::Tickets);
        Ok(())
    }

    fn notify(&self, change: Change) {
        // No subscribers is not an error.
        let _ = self.changes.send(change);
    }
}
