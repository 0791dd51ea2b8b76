//! End-to-end payment lifecycle tests against a live database.
//!
//! Run with a migrated database:
//!   DATABASE_URL=postgres://... cargo test -- --ignored

use std::str::FromStr;

use bigdecimal::BigDecimal;
use sqlx::PgPool;
use uuid::Uuid;

use velvet_backend::database::activity_log_repository::ActivityLogRepository;
use velvet_backend::database::payment_repository::PaymentRepository;
use velvet_backend::database::user_repository::UserRepository;
use velvet_backend::gateway::types::{PaymentCallback, PaymentStatus};
use velvet_backend::services::webhooks::WebhookService;

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

fn paid_callback(order_id: Uuid) -> PaymentCallback {
    PaymentCallback {
        track_id: Some("777".to_string()),
        order_id: order_id.to_string(),
        status: "Paid".to_string(),
        amount: Some("50".to_string()),
        currency: Some("USD".to_string()),
        pay_amount: None,
        pay_currency: None,
        tx_id: None,
        network: None,
        date: None,
    }
}

#[tokio::test]
#[ignore] // Requires database running
async fn paid_webhook_completes_payment_and_grants_vip_once() {
    let pool = test_pool().await;
    let user_id = insert_user(&pool).await;

    let payments = PaymentRepository::new(pool.clone());
    let payment = payments
        .create(
            user_id,
            BigDecimal::from_str("50").unwrap(),
            "USD",
            "vip_upgrade",
            "crypto_invoice",
            Some("VIP membership"),
            serde_json::json!({}),
        )
        .await
        .expect("payment create should succeed");
    assert_eq!(payment.status, "pending");
    assert!(payment.transaction_id.is_none());

    payments
        .attach_provider_reference(payment.id, "777", serde_json::json!({"track_id": "777"}))
        .await
        .expect("attach should succeed")
        .expect("row should still be pending with no track id");

    let service = WebhookService::new(
        PaymentRepository::new(pool.clone()),
        UserRepository::new(pool.clone()),
        ActivityLogRepository::new(pool.clone()),
    );

    let outcome = service
        .process_callback(paid_callback(payment.id))
        .await
        .expect("first delivery should succeed");
    assert!(outcome.success);
    assert_eq!(outcome.status, PaymentStatus::Completed);

    let users = UserRepository::new(pool.clone());
    let user = users.find_by_id(user_id).await.unwrap().unwrap();
    assert!(user.is_vip);
    assert!(user.vip_until.is_none());

    // Identical retry: converges, no error, no second grant.
    let outcome = service
        .process_callback(paid_callback(payment.id))
        .await
        .expect("duplicate delivery should succeed");
    assert!(outcome.success);
    assert_eq!(outcome.status, PaymentStatus::Completed);

    let log_count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM activity_logs WHERE action = 'payment_completed'
         AND details->>'order_id' = $1",
    )
    .bind(payment.id.to_string())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(log_count, 1, "duplicate delivery must not double-log");
}

#[tokio::test]
#[ignore] // Requires database running
async fn stale_expiry_does_not_overwrite_a_completed_payment() {
    let pool = test_pool().await;
    let user_id = insert_user(&pool).await;

    let payments = PaymentRepository::new(pool.clone());
    let payment = payments
        .create(
            user_id,
            BigDecimal::from_str("50").unwrap(),
            "USD",
            "vip_upgrade",
            "crypto_invoice",
            None,
            serde_json::json!({}),
        )
        .await
        .unwrap();

    let service = WebhookService::new(
        PaymentRepository::new(pool.clone()),
        UserRepository::new(pool.clone()),
        ActivityLogRepository::new(pool.clone()),
    );

    service
        .process_callback(paid_callback(payment.id))
        .await
        .expect("paid delivery should succeed");

    let mut expired = paid_callback(payment.id);
    expired.status = "Expired".to_string();
    let outcome = service
        .process_callback(expired)
        .await
        .expect("stale delivery should not error");

    // The conditional write leaves the terminal status untouched.
    assert_eq!(outcome.status, PaymentStatus::Completed);
}

#[tokio::test]
#[ignore] // Requires database running
async fn webhook_for_unknown_order_is_not_found_and_wrong_purpose_is_rejected() {
    let pool = test_pool().await;
    let user_id = insert_user(&pool).await;

    let service = WebhookService::new(
        PaymentRepository::new(pool.clone()),
        UserRepository::new(pool.clone()),
        ActivityLogRepository::new(pool.clone()),
    );

    // Unknown order: a webhook never creates a payment.
    let err = service
        .process_callback(paid_callback(Uuid::new_v4()))
        .await
        .expect_err("unknown order must fail");
    assert_eq!(err.status_code(), 404);

    // Wrong purpose tag: rejected, and no user mutation happens.
    let payments = PaymentRepository::new(pool.clone());
    let tip = payments
        .create(
            user_id,
            BigDecimal::from_str("5").unwrap(),
            "USD",
            "tip",
            "crypto_invoice",
            None,
            serde_json::json!({}),
        )
        .await
        .unwrap();

    let err = service
        .process_callback(paid_callback(tip.id))
        .await
        .expect_err("wrong purpose must fail");
    assert_eq!(err.status_code(), 400);

    let users = UserRepository::new(pool.clone());
    assert!(!users.find_by_id(user_id).await.unwrap().unwrap().is_vip);
}
