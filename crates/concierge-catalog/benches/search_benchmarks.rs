//! Catalog search benchmarks.
//!
//! Measures the raw index scan and the full `CatalogStore::search` path
//! (query embedding, scan, record lookup) with the hashing embedding.
//! Set `BENCH_LARGE_CATALOG=1` to index 10,000 items instead of 1,000.

use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion};

use concierge_catalog::embedding::{EmbeddingService, HashingEmbedding};
use concierge_catalog::store::{CatalogStore, VectorCatalog};
use concierge_core::CatalogItem;

const DEFAULT_ITEM_COUNT: usize = 1_000;
const LARGE_ITEM_COUNT: usize = 10_000;

const CATEGORIES: [&str; 5] = ["Adventure", "Relaxation", "Culture", "Nature", "Romantic"];
const LOCATIONS: [&str; 6] = ["Goa", "Kerala", "Himachal", "Rajasthan", "Mumbai", "Delhi"];

fn item_count() -> usize {
    if std::env::var("BENCH_LARGE_CATALOG").is_ok() {
        LARGE_ITEM_COUNT
    } else {
        DEFAULT_ITEM_COUNT
    }
}

fn generate_item(i: usize) -> CatalogItem {
    let category = CATEGORIES[i % CATEGORIES.len()];
    let location = LOCATIONS[i % LOCATIONS.len()];
    CatalogItem {
        id: i.to_string(),
        title: format!("{} {} Experience {}", location, category, i),
        description: format!(
            "A curated {} experience in {} with local guides, meals, transfers \
             and time to explore at your own pace. Package number {}.",
            category.to_lowercase(),
            location,
            i
        ),
        category: category.to_string(),
        location: location.to_string(),
        price: 2_000 + (i as u64 % 40) * 500,
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("Failed to build tokio runtime")
}

fn build_catalog(rt: &tokio::runtime::Runtime, count: usize) -> VectorCatalog {
    let items = (0..count).map(generate_item).collect();
    rt.block_on(VectorCatalog::build(items, Box::new(HashingEmbedding::new())))
        .expect("catalog build failed")
}

fn bench_catalog_search(c: &mut Criterion) {
    let count = item_count();
    let rt = runtime();
    let catalog = build_catalog(&rt, count);
    assert_eq!(catalog.len(), count);

    let mut group = c.benchmark_group("catalog_search");
    group.sample_size(100);
    group.measurement_time(Duration::from_secs(10));

    group.bench_function(format!("top3_{}items", count), |b| {
        b.iter(|| {
            let hits = rt
                .block_on(catalog.search("beach relaxation in goa under 5000", 3))
                .expect("search failed");
            assert_eq!(hits.len(), 3);
            hits
        });
    });

    group.finish();
}

fn bench_query_embedding(c: &mut Criterion) {
    let rt = runtime();
    let embedder = HashingEmbedding::new();

    c.bench_function("hashing_embed_query", |b| {
        b.iter(|| {
            rt.block_on(embedder.embed("suggest an adventure trek in himachal for two"))
                .expect("embed failed")
        });
    });
}

criterion_group!(benches, bench_catalog_search, bench_query_embedding);
criterion_main!(benches);
