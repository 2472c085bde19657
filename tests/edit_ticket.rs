pub mod common;

use council_desk::{api, config};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn updates_status_with_timeline_entry() {
    let client = common::Client::spawn().await;
    let ticket = client.add_ticket("No water", "Taps dry").await.unwrap();

    let ticket = client
        .update_status(&ticket.id, api::ticket::Status::InProgress, None)
        .await
        .unwrap();
    assert_eq!(ticket.status, api::ticket::Status::InProgress);
    assert_eq!(ticket.timeline.len(), 2);
    assert_eq!(ticket.timeline[1].description, "Status updated to In Progress");

    let ticket = client
        .update_status(
            &ticket.id,
            api::ticket::Status::Rejected,
            Some("Duplicate of CMP-2025-090"),
        )
        .await
        .unwrap();
    assert_eq!(ticket.status, api::ticket::Status::Rejected);
    assert_eq!(ticket.timeline[2].description, "Duplicate of CMP-2025-090");
}

#[tokio::test]
async fn cant_update_unknown_ticket() {
    let client = common::Client::spawn().await;
    client.add_ticket("No water", "Taps dry").await.unwrap();

    let status = client
        .update_status(
            &api::ticket::Id::from("CMP-2025-999"),
            api::ticket::Status::Completed,
            None,
        )
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::NOT_FOUND);

    let list = client.get_tickets(&[]).await.unwrap();
    assert_eq!(list.tickets[0].status, api::ticket::Status::Pending);
    assert_eq!(list.tickets[0].timeline.len(), 1);
}

#[tokio::test]
async fn cant_skip_review_when_strict() {
    let client = common::Client::spawn_with(config::Tickets {
        strict_transitions: true,
        ..config::Tickets::default()
    })
    .await;
    let ticket = client.add_ticket("No water", "Taps dry").await.unwrap();

    let status = client
        .update_status(&ticket.id, api::ticket::Status::Completed, None)
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn edits_content_without_timeline_entry() {
    let client = common::Client::spawn().await;
    let ticket = client.add_ticket("No water", "Taps dry").await.unwrap();

    let edited = client
        .edit_content(
            &ticket.id,
            json!({ "description": "Taps dry on floors 2 and 3" }),
        )
        .await
        .unwrap();
    assert_eq!(edited.description, "Taps dry on floors 2 and 3");
    assert_eq!(edited.subject, "No water");
    assert_eq!(edited.status, api::ticket::Status::Pending);
    assert_eq!(edited.timeline, ticket.timeline);
}

#[tokio::test]
async fn cant_edit_content_once_assigned() {
    let client = common::Client::spawn().await;
    let ticket = client.add_ticket("No water", "Taps dry").await.unwrap();
    client.assign(&ticket.id, "Ravi").await.unwrap();

    let status = client
        .edit_content(&ticket.id, json!({ "subject": "No hot water" }))
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cant_blank_out_required_fields() {
    let client = common::Client::spawn().await;
    let ticket = client.add_ticket("No water", "Taps dry").await.unwrap();

    for field in ["subject", "description", "department"] {
        let status = client
            .edit_content(&ticket.id, json!({ field: "  " }))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST, "blank {field}");
    }

    let stored = client.get_ticket(&ticket.id).await.unwrap();
    assert_eq!(stored, ticket);
}

#[tokio::test]
async fn cant_attach_oversized_image_on_edit() {
    let client = common::Client::spawn().await;
    let ticket = client.add_ticket("No water", "Taps dry").await.unwrap();

    let huge = "A".repeat(api::ticket::MAX_IMAGE_BYTES / 3 * 4 + 8);
    let status = client
        .edit_content(
            &ticket.id,
            json!({ "image": format!("data:image/png;base64,{huge}") }),
        )
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stored = client.get_ticket(&ticket.id).await.unwrap();
    assert_eq!(stored.image, None);
}

#[tokio::test]
async fn anonymous_ticket_stays_anonymous() {
    let client = common::Client::spawn().await;
    let ticket = client
        .add_ticket_raw(json!({
            "anonymous": true,
            "department": "Hostel",
            "type": "Facilities",
            "subject": "Ragging",
            "description": "Seniors in block C",
        }))
        .await
        .unwrap();

    let status = client
        .edit_content(
            &ticket.id,
            json!({ "studentName": "Asha", "email": "asha@college.edu" }),
        )
        .await
        .unwrap_err();
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let stored = client.get_ticket(&ticket.id).await.unwrap();
    assert_eq!(stored.student_name, "Anonymous");
    assert_eq!(stored.email, api::ticket::Submitter::ANONYMOUS_EMAIL);

    let edited = client
        .edit_content(&ticket.id, json!({ "subject": "Ragging in block C" }))
        .await
        .unwrap();
    assert_eq!(edited.subject, "Ragging in block C");
}

#[tokio::test]
async fn assigns_ticket() {
    let client = common::Client::spawn().await;
    let ticket = client.add_ticket("No water", "Taps dry").await.unwrap();

    let ticket = client.assign(&ticket.id, "Ravi").await.unwrap();
    assert_eq!(ticket.assigned_to.as_deref(), Some("Ravi"));
    assert_eq!(ticket.status, api::ticket::Status::InReview);
    assert_eq!(ticket.timeline.len(), 2);
    assert_eq!(ticket.timeline[1].status, "Assigned");
}

#[tokio::test]
async fn counts_each_voter_once() {
    let client = common::Client::spawn().await;
    let ticket = client.add_ticket("No water", "Taps dry").await.unwrap();

    client.upvote(&ticket.id, "voter-a").await.unwrap();
    let ticket = client.upvote(&ticket.id, "voter-a").await.unwrap();
    assert_eq!(ticket.votes, 1);

    let ticket = client.upvote(&ticket.id, "voter-b").await.unwrap();
    assert_eq!(ticket.votes, 2);
    assert_eq!(ticket.voted_by, ["voter-a", "voter-b"]);
}
