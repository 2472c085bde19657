use serde::{Deserialize, Serialize};

pub use crate::{
    store::ticket::{
        Id, Priority, Status, Submitter, Ticket, TimelineEntry,
        MAX_IMAGE_BYTES,
    },
    view::StatusCounts as Counts,
};

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct List {
    pub tickets: Vec<Ticket>,
    pub total_count: usize,
}
