//! Reconciliation state machine properties, exercised at the crate surface.

use velvet_backend::gateway::types::{map_provider_status, PaymentCallback, PaymentStatus};
use velvet_backend::services::webhooks::{reconcile, Reconciliation};

#[test]
fn status_mapping_is_exact_over_the_known_vocabulary() {
    let expectations = [
        ("Paid", PaymentStatus::Completed),
        ("Waiting", PaymentStatus::Pending),
        ("Confirming", PaymentStatus::Pending),
        ("Expired", PaymentStatus::Failed),
        ("Failed", PaymentStatus::Failed),
    ];

    for (raw, expected) in expectations {
        assert_eq!(map_provider_status(raw), expected, "raw status: {}", raw);
    }
}

#[test]
fn status_mapping_fails_open_on_unknown_vocabulary() {
    for raw in ["", "Refunding", "PAID", "paid", "Settled", "??"] {
        assert_eq!(
            map_provider_status(raw),
            PaymentStatus::Pending,
            "raw status: {}",
            raw
        );
    }
}

#[test]
fn pending_paid_callback_grants_vip_exactly_once() {
    // First delivery: pending payment + "Paid" => complete and grant.
    assert_eq!(
        reconcile(PaymentStatus::Pending, "Paid"),
        Reconciliation::Complete { grant_vip: true }
    );

    // Identical second delivery: the payment is now completed, so the
    // verdict carries no side effects at all.
    assert_eq!(
        reconcile(PaymentStatus::Completed, "Paid"),
        Reconciliation::AlreadyFinal
    );
}

#[test]
fn out_of_order_expiry_cannot_undo_a_completed_payment() {
    assert_eq!(
        reconcile(PaymentStatus::Completed, "Expired"),
        Reconciliation::AlreadyFinal
    );
    assert_eq!(
        reconcile(PaymentStatus::Completed, "Failed"),
        Reconciliation::AlreadyFinal
    );
}

#[test]
fn failed_payments_stay_failed() {
    assert_eq!(
        reconcile(PaymentStatus::Failed, "Paid"),
        Reconciliation::AlreadyFinal
    );
    assert_eq!(
        reconcile(PaymentStatus::Failed, "Expired"),
        Reconciliation::AlreadyFinal
    );
}

#[test]
fn intermediate_and_unknown_statuses_never_transition() {
    for raw in ["Waiting", "Confirming", "New", ""] {
        assert_eq!(
            reconcile(PaymentStatus::Pending, raw),
            Reconciliation::StillPending,
            "raw status: {}",
            raw
        );
    }
}

#[test]
fn provider_callback_shape_parses() {
    let body = serde_json::json!({
        "trackId": "777",
        "orderId": "7b1c36ff-41cc-4f62-b08b-6e3f70c7f81a",
        "status": "Paid",
        "amount": "50",
        "currency": "USD",
        "payAmount": "0.00081",
        "payCurrency": "BTC",
        "txID": "f4a9",
        "network": "bitcoin",
        "date": "1754400000"
    });

    let callback: PaymentCallback = serde_json::from_value(body).expect("should parse");
    assert_eq!(callback.order_id, "7b1c36ff-41cc-4f62-b08b-6e3f70c7f81a");
    assert_eq!(callback.track_id.as_deref(), Some("777"));

    // The end-to-end expectation for this payload: completion with a grant.
    assert_eq!(
        reconcile(PaymentStatus::Pending, &callback.status),
        Reconciliation::Complete { grant_vip: true }
    );
}
