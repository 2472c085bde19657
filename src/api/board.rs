pub use crate::store::board::{
    Achievement, Announcement, Candidate, Club, Election, ElectionStatus,
    Event, Id, Poll, PollOption, Role, Survey, User,
};
