//! Retention policy for remote artifacts

/// Select the objects to delete so that at most `keep` artifacts remain
///
/// Only names starting with `prefix` are considered, so objects of other
/// sources sharing the target are never touched. Matching names are sorted
/// ascending (byte order, which is chronological for artifact names) and all
/// but the last `keep` are returned, oldest first. `keep == 0` selects every
/// matching object.
pub fn select_for_deletion<S: AsRef<str>>(listing: &[S], prefix: &str, keep: usize) -> Vec<String> {
    let mut matching: Vec<&str> = listing
        .iter()
        .map(|name| name.as_ref())
        .filter(|name| name.starts_with(prefix))
        .collect();

    matching.sort_unstable();

    let excess = matching.len().saturating_sub(keep);
    matching
        .into_iter()
        .take(excess)
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn listing() -> Vec<String> {
        vec![
            "orders.20240103-0200.gz.enc",
            "customers.20240101-0200.gz.enc",
            "orders.20240101-0200.gz.enc",
            "orders_archive.20230101-0200.gz.enc",
            "orders.20240102-0200.gz.enc",
            "",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    #[rstest]
    #[case(0, vec!["orders.20240101-0200.gz.enc", "orders.20240102-0200.gz.enc", "orders.20240103-0200.gz.enc"])]
    #[case(1, vec!["orders.20240101-0200.gz.enc", "orders.20240102-0200.gz.enc"])]
    #[case(2, vec!["orders.20240101-0200.gz.enc"])]
    #[case(3, vec![])]
    #[case(10, vec![])]
    fn test_keep_counts(#[case] keep: usize, #[case] expected: Vec<&str>) {
        assert_eq!(select_for_deletion(&listing(), "orders.", keep), expected);
    }

    #[test]
    fn test_other_sources_untouched() {
        let deleted = select_for_deletion(&listing(), "orders.", 0);
        assert!(deleted.iter().all(|name| name.starts_with("orders.")));
        assert!(!deleted.iter().any(|name| name.contains("archive")));
        assert!(!deleted.iter().any(|name| name.starts_with("customers")));
    }

    #[test]
    fn test_keeps_lexicographically_greatest() {
        let objects = [
            "db.20241001-0000.gz.enc",
            "db.20240930-2359.gz.enc",
            "db.20240101-0000.ravendbdump.enc",
        ];
        let deleted = select_for_deletion(&objects, "db.", 1);
        assert_eq!(
            deleted,
            vec!["db.20240101-0000.ravendbdump.enc", "db.20240930-2359.gz.enc"]
        );
    }

    #[test]
    fn test_empty_listing() {
        let objects: [&str; 0] = [];
        assert!(select_for_deletion(&objects, "db.", 0).is_empty());
    }
}
