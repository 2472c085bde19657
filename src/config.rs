use std::{net, path::PathBuf, time};

use serde::Deserialize;

#[derive(Deserialize)]
pub struct Config {
    pub http: Http,
    pub storage: Storage,
    #[serde(default)]
    pub tickets: Tickets,
}

#[derive(Deserialize)]
pub struct Http {
    pub server: Server,
    pub cors: Cors,
}

#[derive(Deserialize)]
pub struct Server {
    pub addr: net::SocketAddr,
}

#[derive(Deserialize)]
pub struct Cors {
    pub allowed_origins: Vec<String>,
}

#[derive(Deserialize)]
pub struct Storage {
    /// Directory holding one JSON file per storage key.
    pub dir: PathBuf,
    #[serde(with = "humantime_serde")]
    pub reload_interval: time::Duration,
    #[serde(default)]
    pub reject_stale_writes: bool,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Tickets {
    pub key: String,
    pub id_prefix: String,
    /// Year baked into every ticket id. It is not derived from the clock.
    pub id_year: u16,
    pub first_sequence: u32,
    pub strict_transitions: bool,
}

impl Default for Tickets {
    fn default() -> Self {
        Self {
            key: "complaints".to_owned(),
            id_prefix: "CMP".to_owned(),
            id_year: 2025,
            first_sequence: 100,
            strict_transitions: false,
        }
    }
}
