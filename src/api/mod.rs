//! Types exchanged over HTTP.

pub mod board;
pub mod ticket;

pub use self::ticket::Ticket;
