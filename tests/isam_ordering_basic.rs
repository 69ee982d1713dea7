use ordered_store::isam::Index;
use test_log::test;

/// `spec.md` §8, scenario 1: `(block_capacity=1, overflow_capacity=2)`,
/// insert `5, 2, 4` -- iteration yields ascending `(key, "key")` pairs.
#[test]
fn degenerate_single_entry_blocks() {
    let mut index = Index::<i32, String, _>::new(1, 2);
    index.insert(5, "5".to_owned());
    index.insert(2, "2".to_owned());
    index.insert(4, "4".to_owned());

    let items: Vec<_> = index.iter().collect();
    assert_eq!(
        items,
        vec![
            (2, "2".to_owned()),
            (4, "4".to_owned()),
            (5, "5".to_owned()),
        ]
    );
}

/// `spec.md` §8, scenario 2: negative and positive keys, block_capacity=2.
/// Every lookup returns the string form; iteration is fully ascending.
#[test]
fn negative_and_positive_keys_round_trip() {
    let mut index = Index::<i32, String, _>::new(2, 2);
    for k in [5, 2, 4, -1, -2, -4, 1000] {
        index.insert(k, k.to_string());
    }

    for k in [5, 2, 4, -1, -2, -4, 1000] {
        assert_eq!(index.get(&k), k.to_string());
    }

    let keys: Vec<i32> = index.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, vec![-4, -2, -1, 2, 4, 5, 1000]);
}

/// `spec.md` §8, scenario 3: ascending insertion order, then a fresh
/// instance with descending insertion order -- both converge to ascending
/// iteration.
#[test]
fn ascending_and_descending_insertion_both_sort() {
    let mut ascending = Index::<i32, i32, _>::new(2, 2);
    for i in 0..1000 {
        ascending.insert(i, i);
    }
    let keys: Vec<i32> = ascending.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, (0..1000).collect::<Vec<_>>());

    let mut descending = Index::<i32, i32, _>::new(2, 2);
    for i in (1..1000).rev() {
        descending.insert(i, i);
    }
    let keys: Vec<i32> = descending.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, (1..1000).collect::<Vec<_>>());
}
