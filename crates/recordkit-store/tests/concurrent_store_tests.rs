//! MemoryStore under parallel writers.

use rayon::prelude::*;
use recordkit_schema::AttributeValue;
use recordkit_store::{MemoryStore, RecordStore};

#[test]
fn parallel_inserts_get_distinct_ids() {
    let store = MemoryStore::new();
    let ids: Vec<_> = (0..256)
        .into_par_iter()
        .map(|i| {
            let id = store.insert(if i % 2 == 0 { "Even" } else { "Odd" }).unwrap();
            store
                .set_attribute(id, "n", Some(AttributeValue::Integer(i)))
                .unwrap();
            id
        })
        .collect();

    let mut raw: Vec<u32> = ids.iter().map(|id| id.raw()).collect();
    raw.sort_unstable();
    raw.dedup();
    assert_eq!(raw.len(), 256);
    assert_eq!(store.records_of("Even").len(), 128);
    assert_eq!(store.records_of("Odd").len(), 128);

    for id in ids {
        let view = store.view(id).unwrap();
        let n = view.attributes["n"].as_i64().unwrap();
        assert_eq!(view.entity, if n % 2 == 0 { "Even" } else { "Odd" });
    }
}

#[test]
fn parallel_adds_to_one_collection_do_not_duplicate() {
    let store = MemoryStore::new();
    let tag = store.insert("Tag").unwrap();
    let posts: Vec<_> = (0..32).map(|_| store.insert("Post").unwrap()).collect();

    // Every post is added four times from different threads.
    posts
        .par_iter()
        .flat_map(|p| vec![*p; 4])
        .for_each(|p| {
            store.add_to_many(tag, "posts", p).unwrap();
        });

    let members = store.to_many(tag, "posts").unwrap();
    assert_eq!(members.len(), posts.len());
}
