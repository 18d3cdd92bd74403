use std::collections::BTreeMap;
use std::io;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use datalink::{
    ComparatorSpec, ContainsString, DatasetDefinition, DecodedRecord, EntityRecords, ExactString,
    Jaro, Matcher, DEFAULT_MATCH_PREDICATE,
};

const NAME: &str = "http://xmlns.com/foaf/0.1/name";
const LABEL: &str = "http://www.w3.org/2000/01/rdf-schema#label";

fn record(id: &str, name: &str, label: &str) -> DecodedRecord {
    let mut attributes = BTreeMap::new();
    attributes.insert(NAME.to_string(), name.to_string());
    attributes.insert(LABEL.to_string(), label.to_string());
    DecodedRecord {
        entity_id: id.to_string(),
        attributes,
    }
}

fn make_matcher() -> Matcher {
    let left = DatasetDefinition::new("left", "?resource a <http://xmlns.com/foaf/0.1/Person>")
        .unwrap();
    let right = DatasetDefinition::new("right", "?resource a <http://dbpedia.org/ontology/Astronaut>")
        .unwrap();
    let jaro = Jaro::new(0.9).unwrap();

    Matcher::new(
        &left,
        &right,
        vec![
            ComparatorSpec::new(ExactString, NAME, NAME, 10.0),
            ComparatorSpec::new(ContainsString, NAME, NAME, 2.0),
            ComparatorSpec::new(jaro, NAME, NAME, 1.0),
            ComparatorSpec::new(ExactString, NAME, LABEL, 5.0),
            ComparatorSpec::new(jaro, NAME, LABEL, 1.0),
        ],
    )
    .unwrap()
}

fn bench_match_entities(c: &mut Criterion) {
    let matcher = make_matcher();

    // 100 x 500 pairs, names drawn from a small vocabulary so some pairs hit.
    let left: Vec<EntityRecords> = (0..100u32)
        .map(|i| {
            let id = format!("http://space.example/person/{i}");
            EntityRecords {
                entity_id: id.clone(),
                records: vec![record(&id, &format!("astronaut number {}", i % 37), "")],
                missing: Vec::new(),
            }
        })
        .collect();
    let right: Vec<DecodedRecord> = (0..500u32)
        .map(|i| {
            record(
                &format!("http://dbpedia.example/resource/{i}"),
                &format!("astronaut number {}", i % 53),
                &format!("astronaut {i}"),
            )
        })
        .collect();

    let mut group = c.benchmark_group("matcher");
    group.throughput(Throughput::Elements((left.len() * right.len()) as u64));
    group.bench_function("match_entities_100x500", |b| {
        b.iter(|| {
            let outcomes = matcher
                .match_entities(
                    black_box(&left),
                    black_box(&right),
                    DEFAULT_MATCH_PREDICATE,
                    &mut io::sink(),
                )
                .unwrap();
            black_box(outcomes)
        });
    });
    group.finish();
}

fn bench_score_pair(c: &mut Criterion) {
    let matcher = make_matcher();
    let a = record("http://a/1", "neil armstrong", "");
    let b = record("http://b/1", "neil alden armstrong", "neil armstrong");

    c.bench_function("matcher/score_pair", |bench| {
        bench.iter(|| matcher.score_pair(black_box(&a), black_box(&b)).unwrap());
    });
}

criterion_group!(benches, bench_match_entities, bench_score_pair);
criterion_main!(benches);
