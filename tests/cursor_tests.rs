use arbor::{Cursor, MapError, OrderFn, RedBlackTree};
use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::thread_rng;

#[test]
fn test_empty_map_has_coincident_ends() {
    let map = RedBlackTree::<u64, String>::new();
    assert_eq!(map.len(), 0);
    assert!(map.is_empty());
    assert_eq!(map.begin(), map.end());
    assert_eq!(map.next(map.end()), Err(MapError::InvalidCursor));
    assert_eq!(map.prev(map.end()), Err(MapError::InvalidCursor));
    assert_eq!(map.get_at(map.end()), Err(MapError::InvalidCursor));
}

#[test]
fn test_single_entry_walk() {
    let mut map = RedBlackTree::<u64, String>::new();
    *map.get_or_insert(7) = "a".to_string();
    assert_eq!(map.len(), 1);

    let begin = map.begin();
    assert_eq!(map.get_at(begin), Ok((&7, &"a".to_string())));
    assert_eq!(map.next(begin), Ok(map.end()));
    assert_eq!(map.prev(map.end()), Ok(begin));
    assert_eq!(map.prev(begin), Err(MapError::InvalidCursor));
}

#[test]
fn test_ordered_walk_forward_and_reverse() {
    let mut map = RedBlackTree::<u64, u64>::new();
    for k in [5, 3, 8, 1, 4, 7, 9] {
        map.insert(k, k * k);
    }
    let expected = vec![(1, 1), (3, 9), (4, 16), (5, 25), (7, 49), (8, 64), (9, 81)];

    let forward: Vec<(u64, u64)> = map.iter().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(forward, expected);
    let reverse: Vec<(u64, u64)> = map.iter().rev().map(|(k, v)| (*k, *v)).collect();
    assert_eq!(
        reverse,
        expected.iter().rev().cloned().collect::<Vec<_>>()
    );

    // The same walks through cursors.
    let mut walked = vec![];
    let mut at = map.begin();
    while at != map.end() {
        let (k, v) = map.get_at(at).unwrap();
        walked.push((*k, *v));
        at = map.next(at).unwrap();
    }
    assert_eq!(walked, expected);

    let mut walked_back = vec![];
    let mut at = map.end();
    while at != map.begin() {
        at = map.prev(at).unwrap();
        let (k, v) = map.get_at(at).unwrap();
        walked_back.push((*k, *v));
    }
    assert_eq!(
        walked_back,
        expected.iter().rev().cloned().collect::<Vec<_>>()
    );
}

#[test]
fn test_insert_collision_keeps_first_value() {
    let mut map = RedBlackTree::<u64, &str>::new();
    let (first, inserted) = map.insert(2, "x");
    assert!(inserted);
    let (second, inserted) = map.insert(2, "y");
    assert!(!inserted);
    assert_eq!(first, second);
    assert_eq!(map.get(&2), Ok(&"x"));
    assert_eq!(map.len(), 1);
}

#[test]
fn test_remove_then_reinsert() {
    let mut map = RedBlackTree::<u64, String>::new();
    for k in 1..=100 {
        map.insert(k, format!("value-{}", k));
    }
    assert!(map.is_valid_red_black_tree());

    assert_eq!(map.remove(&50), Some("value-50".to_string()));
    assert!(map.is_valid_red_black_tree());
    assert_eq!(map.count(&50), 0);
    assert!(!map.contains(&50));
    assert_eq!(map.len(), 99);

    map.insert(50, "v".to_string());
    assert!(map.is_valid_red_black_tree());
    assert_eq!(map.get(&50), Ok(&"v".to_string()));
    assert_eq!(map.count(&50), 1);
    assert_eq!(map.len(), 100);
}

#[test]
fn test_cursor_survives_unrelated_surgery() {
    let mut map = RedBlackTree::<u64, String>::new();
    for k in 0..100 {
        map.insert(k, "filler".to_string());
    }
    *map.get_or_insert(42) = "original".to_string();
    let at = map.find(&42);

    for k in 1000..2000 {
        map.insert(k, "churn".to_string());
    }
    for k in 1000..2000 {
        assert!(map.remove(&k).is_some());
    }
    for k in (0..100).filter(|k| *k != 42) {
        assert!(map.remove(&k).is_some());
    }
    assert!(map.is_valid_red_black_tree());

    assert_eq!(map.get_at(at), Ok((&42, &"original".to_string())));
    assert_eq!(map.find(&42), at);
}

#[test]
fn test_removing_the_entry_invalidates_its_cursor() {
    let mut map = RedBlackTree::<u64, u64>::new();
    for k in 0..10 {
        map.insert(k, k);
    }
    let doomed = map.find(&4);
    let bystander = map.find(&5);

    assert_eq!(map.remove_at(doomed), Ok((4, 4)));
    assert_eq!(map.get_at(doomed), Err(MapError::InvalidCursor));
    assert_eq!(map.next(doomed), Err(MapError::InvalidCursor));
    assert_eq!(map.remove_at(doomed), Err(MapError::InvalidCursor));

    // Only the removed entry's cursor died.
    assert_eq!(map.get_at(bystander), Ok((&5, &5)));
}

#[test]
fn test_foreign_and_singular_cursors_are_rejected() {
    let mut left = RedBlackTree::<u64, u64>::new();
    let mut right = RedBlackTree::<u64, u64>::new();
    left.insert(1, 10);
    right.insert(1, 10);

    let stranger = right.find(&1);
    assert_eq!(left.get_at(stranger), Err(MapError::InvalidCursor));
    assert_eq!(left.next(stranger), Err(MapError::InvalidCursor));
    assert_eq!(left.prev(stranger), Err(MapError::InvalidCursor));
    assert_eq!(left.remove_at(stranger), Err(MapError::InvalidCursor));
    assert_ne!(left.find(&1), stranger);
    assert_ne!(left.end(), right.end());

    let singular = Cursor::default();
    assert_eq!(left.get_at(singular), Err(MapError::InvalidCursor));
    assert_eq!(left.next(singular), Err(MapError::InvalidCursor));
    assert_eq!(left.remove_at(singular), Err(MapError::InvalidCursor));

    // The foreign map is untouched by all of the rejected calls.
    assert_eq!(left.len(), 1);
    assert_eq!(left.get(&1), Ok(&10));
}

#[test]
fn test_end_cursor_cannot_be_removed_or_dereferenced() {
    let mut map = RedBlackTree::<u64, u64>::new();
    map.insert(1, 1);
    assert_eq!(map.remove_at(map.end()), Err(MapError::InvalidCursor));
    assert_eq!(map.get_at(map.end()), Err(MapError::InvalidCursor));
    assert_eq!(map.len(), 1);
}

#[test]
fn test_stepping_back_from_end_reaches_the_maximum() {
    let mut map = RedBlackTree::<u64, u64>::new();
    for k in [10, 30, 20] {
        map.insert(k, k);
    }
    let last = map.prev(map.end()).unwrap();
    assert_eq!(map.get_at(last), Ok((&30, &30)));
}

#[test]
fn test_clone_is_independent() {
    let mut original = RedBlackTree::<u64, String>::new();
    for k in 0..50 {
        original.insert(k, format!("v{}", k));
    }
    let at = original.find(&25);

    let mut copy = original.clone();
    assert_eq!(copy.len(), original.len());
    assert!(copy.is_valid_red_black_tree());
    assert!(original
        .iter()
        .zip(copy.iter())
        .all(|((k1, v1), (k2, v2))| k1 == k2 && v1 == v2));

    // Cursors do not cross between a map and its copy.
    assert_eq!(copy.get_at(at), Err(MapError::InvalidCursor));

    // Mutating one side leaves the other alone.
    copy.remove(&25);
    *copy.get_or_insert(500) = "only-in-copy".to_string();
    assert_eq!(original.get(&25), Ok(&"v25".to_string()));
    assert!(!original.contains(&500));
    assert_eq!(original.get_at(at), Ok((&25, &"v25".to_string())));
    assert!(copy.is_valid_red_black_tree());
    assert!(original.is_valid_red_black_tree());
}

#[test]
fn test_custom_comparator_reverses_iteration() {
    let mut map = RedBlackTree::with_comparator(OrderFn(|a: &u64, b: &u64| b < a));
    for k in [5u64, 1, 9, 3, 7] {
        map.insert(k, ());
    }
    assert!(map.is_valid_red_black_tree());
    let keys: Vec<u64> = map.iter().map(|(k, _)| *k).collect();
    assert_eq!(keys, vec![9, 7, 5, 3, 1]);
    assert_eq!(map.get_at(map.begin()).unwrap().0, &9);
}

#[test]
fn test_get_or_insert_defaults_and_roundtrip() {
    let mut map = RedBlackTree::<String, u64>::new();
    assert_eq!(*map.get_or_insert("hits".to_string()), 0);
    *map.get_or_insert("hits".to_string()) += 1;
    *map.get_or_insert("hits".to_string()) += 1;
    assert_eq!(map.get(&"hits".to_string()), Ok(&2));
    assert_eq!(map.len(), 1);
    assert_eq!(
        map.get(&"misses".to_string()),
        Err(MapError::KeyOutOfBound)
    );
}

#[test]
fn test_index_access() {
    let mut map = RedBlackTree::<u64, String>::new();
    map.insert(3, "three".to_string());
    assert_eq!(map[&3], "three");
    map[&3].push_str("!");
    assert_eq!(map[&3], "three!");
}

#[test]
#[should_panic]
fn test_index_access_panics_on_missing_key() {
    let map = RedBlackTree::<u64, String>::new();
    let _ = &map[&3];
}

#[test]
fn test_remove_all_permutations() {
    let keys = [3u64, 1, 4, 0, 2];
    for insert_order in keys.iter().permutations(keys.len()) {
        for remove_order in keys.iter().permutations(keys.len()) {
            let mut map = RedBlackTree::<u64, u64>::new();
            for k in insert_order.iter() {
                assert!(map.insert(**k, **k * 10).1);
                assert!(map.is_valid_red_black_tree());
            }
            for k in remove_order {
                assert_eq!(map.remove(k), Some(*k * 10));
                assert!(map.is_valid_red_black_tree());
            }
            assert!(map.is_empty());
            assert_eq!(map.begin(), map.end());
        }
    }
}

#[test]
fn test_iteration_is_insertion_order_independent() {
    let mut rng = thread_rng();
    let mut keys: Vec<u64> = (0..500).map(|k| k * 7 % 500).collect();

    let mut first = RedBlackTree::<u64, u64>::new();
    keys.shuffle(&mut rng);
    for k in keys.iter() {
        first.insert(*k, k + 1);
    }

    let mut second = RedBlackTree::<u64, u64>::new();
    keys.shuffle(&mut rng);
    for k in keys.iter() {
        second.insert(*k, k + 1);
    }

    assert!(first
        .iter()
        .zip(second.iter())
        .all(|((k1, v1), (k2, v2))| k1 == k2 && v1 == v2));
    assert_eq!(first.len(), second.len());
}

#[test]
fn test_clear_releases_everything() {
    let mut map = RedBlackTree::<u64, String>::new();
    for k in 0..100 {
        map.insert(k, k.to_string());
    }
    let stale = map.find(&10);
    map.clear();

    assert!(map.is_empty());
    assert_eq!(map.begin(), map.end());
    assert_eq!(map.get_at(stale), Err(MapError::InvalidCursor));
    assert_eq!(map.get(&10), Err(MapError::KeyOutOfBound));

    // The map is reusable after clearing.
    map.insert(1, "back".to_string());
    assert_eq!(map.len(), 1);
    assert!(map.is_valid_red_black_tree());
}

#[test]
fn test_get_at_mut_writes_in_place() {
    let mut map = RedBlackTree::<u64, u64>::new();
    for k in 0..10 {
        map.insert(k, 0);
    }
    let at = map.find(&6);
    {
        let (k, v) = map.get_at_mut(at).unwrap();
        assert_eq!(*k, 6);
        *v = 99;
    }
    assert_eq!(map.get(&6), Ok(&99));
    assert_eq!(map.get_at(at), Ok((&6, &99)));
}

#[test]
fn test_find_miss_is_end_not_an_error() {
    let mut map = RedBlackTree::<u64, u64>::new();
    map.insert(1, 1);
    assert_eq!(map.find(&2), map.end());
}
