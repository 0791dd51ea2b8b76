//! Chat pairing and cache key rules, exercised at the crate surface.

use uuid::Uuid;
use velvet_backend::cache::keys::chat as chat_keys;
use velvet_backend::database::chat_repository::canonical_pair;

#[test]
fn the_same_unordered_pair_always_maps_to_one_storage_key() {
    let a = Uuid::parse_str("11111111-1111-1111-1111-111111111111").unwrap();
    let b = Uuid::parse_str("22222222-2222-2222-2222-222222222222").unwrap();

    // Whoever initiates, the lookup and the unique constraint see the same
    // (member_one, member_two) tuple, which is what makes create-or-get
    // return the same chat id both times.
    assert_eq!(canonical_pair(a, b), canonical_pair(b, a));
}

#[test]
fn cache_invalidation_prefix_covers_all_of_a_users_keys() {
    let user = Uuid::new_v4();
    let other = Uuid::new_v4();
    let prefix = chat_keys::user_prefix(user);

    assert!(chat_keys::ChatListKey::new(user).to_string().starts_with(&prefix));
    assert!(chat_keys::UnreadSummaryKey::new(user)
        .to_string()
        .starts_with(&prefix));
    assert!(!chat_keys::ChatListKey::new(other)
        .to_string()
        .starts_with(&prefix));
}
