//! Retention policy properties

use dumptruck::storage::select_for_deletion;
use rstest::rstest;
use test_utils::sample_artifacts;

#[rstest]
#[case(5, 0, 5)]
#[case(5, 1, 4)]
#[case(5, 3, 2)]
#[case(5, 5, 0)]
#[case(5, 9, 0)]
#[case(0, 2, 0)]
fn test_delete_count(#[case] existing: u32, #[case] keep: usize, #[case] deleted: usize) {
    let listing = sample_artifacts("orders", existing);
    assert_eq!(select_for_deletion(&listing, "orders.", keep).len(), deleted);
}

#[test]
fn test_survivors_are_the_newest() {
    let mut listing = sample_artifacts("orders", 6);
    listing.reverse();

    let to_delete = select_for_deletion(&listing, "orders.", 2);

    let mut survivors: Vec<&String> = listing.iter().filter(|o| !to_delete.contains(o)).collect();
    survivors.sort();
    assert_eq!(
        survivors,
        vec!["orders.20240105-0300.gz.enc", "orders.20240106-0300.gz.enc"]
    );
}

#[test]
fn test_other_sources_untouched() {
    let mut listing = sample_artifacts("orders", 3);
    listing.extend(sample_artifacts("orders_archive", 3));
    listing.extend(sample_artifacts("billing", 3));

    let to_delete = select_for_deletion(&listing, "orders.", 0);

    assert_eq!(to_delete.len(), 3);
    assert!(to_delete.iter().all(|o| o.starts_with("orders.2024")));
}
