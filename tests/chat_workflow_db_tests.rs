//! Chat workflow tests against a live database.
//!
//! Run with a migrated database:
//!   DATABASE_URL=postgres://... cargo test -- --ignored

use std::sync::Arc;
use std::time::Duration;

use sqlx::PgPool;
use uuid::Uuid;

use velvet_backend::cache::SystemClock;
use velvet_backend::config::SupportConfig;
use velvet_backend::database::chat_repository::ChatRepository;
use velvet_backend::services::chats::ChatService;

async fn test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for db tests");
    velvet_backend::database::init_pool(&url, None)
        .await
        .expect("pool init should succeed")
}

async fn insert_user(pool: &PgPool) -> Uuid {
    let email = format!("{}@test.example", Uuid::new_v4());
    sqlx::query_scalar::<_, Uuid>("INSERT INTO users (email) VALUES ($1) RETURNING id")
        .bind(email)
        .fetch_one(pool)
        .await
        .expect("user insert should succeed")
}

fn service(pool: &PgPool, support_user_id: Uuid) -> ChatService {
    ChatService::new(
        ChatRepository::new(pool.clone()),
        SupportConfig {
            support_user_id,
            welcome_message: "Welcome! A member of our support team will reply here.".to_string(),
        },
        Duration::from_secs(30),
        Arc::new(SystemClock),
    )
}

#[tokio::test]
#[ignore] // Requires database running
async fn opening_the_same_pair_twice_returns_the_same_chat() {
    let pool = test_pool().await;
    let a = insert_user(&pool).await;
    let b = insert_user(&pool).await;
    let service = service(&pool, insert_user(&pool).await);

    let first = service.open_chat(a, b).await.expect("open should succeed");
    assert!(first.request.is_some());

    // Same pair from the other side: same chat, no second request.
    let second = service.open_chat(b, a).await.expect("open should succeed");
    assert_eq!(first.chat.id, second.chat.id);
    assert!(second.request.is_none());
}

#[tokio::test]
#[ignore] // Requires database running
async fn messages_are_gated_until_acceptance_and_update_the_preview() {
    let pool = test_pool().await;
    let a = insert_user(&pool).await;
    let b = insert_user(&pool).await;
    let service = service(&pool, insert_user(&pool).await);

    let opening = service.open_chat(a, b).await.unwrap();
    let request = opening.request.unwrap();

    // Unaccepted chat refuses messages.
    let err = service
        .send_message(opening.chat.id, a, "hello")
        .await
        .expect_err("send before acceptance must fail");
    assert_eq!(err.status_code(), 409);

    // Only the receiver may accept; the sender gets the same 404 a
    // stranger would.
    let err = service
        .accept_request(request.id, a)
        .await
        .expect_err("sender cannot accept");
    assert_eq!(err.status_code(), 404);

    service
        .accept_request(request.id, b)
        .await
        .expect("receiver accept should succeed");

    // Accepting twice is a state conflict.
    let err = service
        .accept_request(request.id, b)
        .await
        .expect_err("second accept must fail");
    assert_eq!(err.status_code(), 409);

    // The identical send now succeeds and refreshes the preview.
    let message = service
        .send_message(opening.chat.id, a, "hello")
        .await
        .expect("send after acceptance should succeed");
    assert!(!message.read);

    let chats = service.list_chats(a).await.unwrap();
    let chat = chats.iter().find(|c| c.id == opening.chat.id).unwrap();
    assert_eq!(chat.last_message_text.as_deref(), Some("hello"));
    assert_eq!(chat.last_message_at, Some(message.created_at));
}

#[tokio::test]
#[ignore] // Requires database running
async fn rejection_deletes_the_chat_and_is_terminal() {
    let pool = test_pool().await;
    let a = insert_user(&pool).await;
    let b = insert_user(&pool).await;
    let service = service(&pool, insert_user(&pool).await);

    let opening = service.open_chat(a, b).await.unwrap();
    let request = opening.request.unwrap();

    service
        .reject_request(request.id, b)
        .await
        .expect("reject should succeed");

    // The chat row is gone entirely.
    let repo = ChatRepository::new(pool.clone());
    assert!(repo.find_chat(opening.chat.id).await.unwrap().is_none());

    // A later accept of the same request is a state conflict.
    let err = service
        .accept_request(request.id, b)
        .await
        .expect_err("accept after reject must fail");
    assert_eq!(err.status_code(), 409);
}

#[tokio::test]
#[ignore] // Requires database running
async fn mark_read_flips_only_the_other_partys_messages() {
    let pool = test_pool().await;
    let a = insert_user(&pool).await;
    let b = insert_user(&pool).await;
    let service = service(&pool, insert_user(&pool).await);

    let opening = service.open_chat(a, b).await.unwrap();
    let request = opening.request.unwrap();
    service.accept_request(request.id, b).await.unwrap();

    service.send_message(opening.chat.id, a, "one").await.unwrap();
    service.send_message(opening.chat.id, a, "two").await.unwrap();
    service.send_message(opening.chat.id, b, "reply").await.unwrap();

    // B reads the chat: exactly A's two messages flip.
    let flipped = service.mark_read(opening.chat.id, b).await.unwrap();
    assert_eq!(flipped, 2);

    let messages = service.list_messages(opening.chat.id, b).await.unwrap();
    for message in &messages {
        if message.sender_id == a {
            assert!(message.read);
        } else {
            assert!(!message.read, "B's own message must stay unread");
        }
    }

    // Display order is oldest first.
    let contents: Vec<_> = messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["one", "two", "reply"]);
}

#[tokio::test]
#[ignore] // Requires database running
async fn support_chat_is_born_accepted_with_a_welcome_message() {
    let pool = test_pool().await;
    let user = insert_user(&pool).await;
    let support_user = insert_user(&pool).await;
    let service = service(&pool, support_user);

    let chat = service.open_support_chat(user).await.unwrap();
    assert!(chat.is_accepted);
    assert!(chat.is_support);
    assert!(chat.last_message_text.is_some());

    // The user can reply immediately; no accept step exists for support.
    service
        .send_message(chat.id, user, "I need help")
        .await
        .expect("support chat accepts messages immediately");

    // Create-or-get: a second bootstrap returns the same chat.
    let again = service.open_support_chat(user).await.unwrap();
    assert_eq!(chat.id, again.id);
}

#[tokio::test]
#[ignore] // Requires database running
async fn unread_summary_counts_requests_and_messages() {
    let pool = test_pool().await;
    let a = insert_user(&pool).await;
    let b = insert_user(&pool).await;
    let c = insert_user(&pool).await;
    let service = service(&pool, insert_user(&pool).await);

    // One pending request from A, one accepted chat with unread messages
    // from C.
    service.open_chat(a, b).await.unwrap();
    let opening = service.open_chat(c, b).await.unwrap();
    service
        .accept_request(opening.request.unwrap().id, b)
        .await
        .unwrap();
    service.send_message(opening.chat.id, c, "ping").await.unwrap();

    let summary = service.unread_summary(b).await.unwrap();
    assert_eq!(summary.pending_requests, 1);
    assert_eq!(summary.unread_messages, 1);
    assert_eq!(summary.total, 2);
}
