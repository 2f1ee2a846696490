//! Benchmark suite for the record hot path
//!
//! Measures filtering and summarizing of in-memory charge records with the
//! divan benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//! ```
//!
//! # Benchmark Inputs
//!
//! Records are generated per run: 100, 10,000 and 100,000 charges spread over
//! five owners, a third of them closed.

use folio_fines_engine::core::{summarize, FilterEngine, NamedConfig};
use folio_fines_engine::io::DatasetStore;
use folio_fines_engine::types::{Record, RuleConfig};
use serde_json::json;

fn main() {
    divan::main();
}

const SIZES: &[usize] = &[100, 10_000, 100_000];

fn charges(count: usize) -> Vec<Record> {
    (0..count)
        .filter_map(|i| {
            Record::from_value(json!({
                "id": i.to_string(),
                "userId": format!("user-{}", i % 997),
                "amount": (i % 50) as f64 + 0.25,
                "remaining": (i % 50) as f64,
                "status": {"name": if i % 3 == 0 { "Closed" } else { "Open" }},
                "owner_data": {"FeeFineOwner": format!("Owner {}", i % 5)}
            }))
        })
        .collect()
}

fn rules() -> Vec<RuleConfig> {
    serde_json::from_value(json!([
        {"name": "openOnly", "filter_field": "status.name", "filter_operator": "EQUALS",
         "filter_value": "Open", "log_error": true, "error_message": "not open"},
        {"name": "large", "filter_field": "remaining", "filter_operator": "LONGER_THAN",
         "filter_value": 10}
    ]))
    .expect("valid rules")
}

/// Two filters over the generated charges
#[divan::bench(args = SIZES)]
fn filter_charges(bencher: divan::Bencher, count: usize) {
    let rules = rules();
    let vars = NamedConfig::new();
    bencher
        .with_inputs(|| charges(count))
        .bench_values(|records| {
            let mut datasets = DatasetStore::default();
            let mut engine = FilterEngine::new();
            let mut records = records;
            for rule in &rules {
                records = engine
                    .apply(records, rule, &vars, &mut datasets)
                    .expect("filter failed");
            }
            records
        });
}

/// Grand and per-owner totals over the generated charges
#[divan::bench(args = SIZES)]
fn summarize_charges(bencher: divan::Bencher, count: usize) {
    let records = charges(count);
    bencher.bench(|| summarize(divan::black_box(&records), "charge"));
}
