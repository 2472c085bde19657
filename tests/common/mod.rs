use council_desk::{
    api, config,
    http::{self, AppState},
    storage::MemoryStorage,
    Store,
};
use reqwest::StatusCode;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tokio::net::TcpListener;

pub struct Client {
    inner: reqwest::Client,
    base_url: String,
}

impl Client {
    /// Serves a fresh in-memory store on an ephemeral port.
    pub async fn spawn() -> Self {
        Self::spawn_with(config::Tickets::default()).await
    }

    pub async fn spawn_with(config: config::Tickets) -> Self {
        let store = Store::open(MemoryStorage::new(), config)
            .expect("failed to open store");
        let app = http::router(AppState::new(store));

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind");
        let addr = listener.local_addr().expect("no local address");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("server failed");
        });

        Self {
            inner: reqwest::Client::new(),
            base_url: format!("http://{addr}"),
        }
    }

    pub async fn add_ticket(
        &self,
        subject: &str,
        description: &str,
    ) -> Result<api::Ticket, StatusCode> {
        self.add_ticket_raw(json!({
            "studentName": "Asha",
            "email": "asha@college.edu",
            "department": "Hostel",
            "type": "Facilities",
            "subject": subject,
            "description": description,
        }))
        .await
    }

    pub async fn add_ticket_raw(
        &self,
        body: Value,
    ) -> Result<api::Ticket, StatusCode> {
        self.send(self.inner.post(self.url("/tickets")).json(&body))
            .await
    }

    pub async fn get_tickets(
        &self,
        query: &[(&str, &str)],
    ) -> Result<api::ticket::List, StatusCode> {
        self.send(self.inner.get(self.url("/tickets")).query(query))
            .await
    }

    pub async fn count_tickets(
        &self,
    ) -> Result<api::ticket::Counts, StatusCode> {
        self.send(self.inner.get(self.url("/tickets/counts"))).await
    }

    pub async fn get_ticket(
        &self,
        id: &api::ticket::Id,
    ) -> Result<api::Ticket, StatusCode> {
        self.send(self.inner.get(self.url(&format!("/tickets/{id}"))))
            .await
    }

    pub async fn update_status(
        &self,
        id: &api::ticket::Id,
        status: api::ticket::Status,
        note: Option<&str>,
    ) -> Result<api::Ticket, StatusCode> {
        self.edit_ticket(
            id,
            json!({
                "op": "updateStatus",
                "data": {
                    "status": status,
                    "note": note,
                }
            }),
        )
        .await
    }

    pub async fn edit_content(
        &self,
        id: &api::ticket::Id,
        data: Value,
    ) -> Result<api::Ticket, StatusCode> {
        self.edit_ticket(id, json!({ "op": "editContent", "data": data }))
            .await
    }

    pub async fn assign(
        &self,
        id: &api::ticket::Id,
        staff_name: &str,
    ) -> Result<api::Ticket, StatusCode> {
        self.edit_ticket(
            id,
            json!({
                "op": "assign",
                "data": { "staffName": staff_name }
            }),
        )
        .await
    }

    pub async fn upvote(
        &self,
        id: &api::ticket::Id,
        voter_id: &str,
    ) -> Result<api::Ticket, StatusCode> {
        self.edit_ticket(
            id,
            json!({
                "op": "upvote",
                "data": { "voterId": voter_id }
            }),
        )
        .await
    }

    async fn edit_ticket(
        &self,
        id: &api::ticket::Id,
        body: Value,
    ) -> Result<api::Ticket, StatusCode> {
        let url = self.url(&format!("/tickets/{id}"));
        self.send(self.inner.patch(url).json(&body)).await
    }

    pub async fn list_records<T: DeserializeOwned>(
        &self,
        collection: &str,
    ) -> Result<Vec<T>, StatusCode> {
        self.send(self.inner.get(self.url(&format!("/{collection}"))))
            .await
    }

    pub async fn add_record<T: DeserializeOwned + Serialize>(
        &self,
        collection: &str,
        record: &T,
    ) -> Result<T, StatusCode> {
        let url = self.url(&format!("/{collection}"));
        self.send(self.inner.post(url).json(record)).await
    }

    pub async fn get_record<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: api::board::Id,
    ) -> Result<T, StatusCode> {
        let url = self.url(&format!("/{collection}/{id}"));
        self.send(self.inner.get(url)).await
    }

    pub async fn replace_record<T: DeserializeOwned + Serialize>(
        &self,
        collection: &str,
        id: api::board::Id,
        record: &T,
    ) -> Result<T, StatusCode> {
        let url = self.url(&format!("/{collection}/{id}"));
        self.send(self.inner.put(url).json(record)).await
    }

    pub async fn delete_record<T: DeserializeOwned>(
        &self,
        collection: &str,
        id: api::board::Id,
    ) -> Result<T, StatusCode> {
        let url = self.url(&format!("/{collection}/{id}"));
        self.send(self.inner.delete(url)).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        req: reqwest::RequestBuilder,
    ) -> Result<T, StatusCode> {
        Ok(req
            .send()
            .await
            .expect("failed to send a request")
            .error_for_status()
            .map_err(|e| e.status().expect("status error"))?
            .json::<T>()
            .await
            .expect("failed to get a response"))
    }
}
