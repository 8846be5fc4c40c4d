use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use crabdepict::{depict, parse_smiles, Layout, LayoutOptions, RingSystem};

const CAFFEINE: &str = "Cn1cnc2c1c(=O)n(C)c(=O)n2C";
const ADAMANTANE: &str = "C1C2CC3CC1CC(C2)C3";
const ATORVASTATIN: &str =
    "CC(C)c1c(C(=O)Nc2ccccc2)c(-c2ccccc2)c(-c2ccc(F)cc2)n1CC[C@@H](O)C[C@@H](O)CC(=O)O";
const TAXOL: &str = "CC1=C2[C@@]([C@]([C@H]([C@@H]3[C@]4([C@H](OC4)C[C@@H]([C@]3(C(=O)[C@@H]2OC(=O)C)C)O)OC(=O)C)OC(=O)c5ccccc5)(C[C@@H]1OC(=O)[C@@H](O)[C@@H](NC(=O)c6ccccc6)c7ccccc7)O)(C)C";

const MOLECULES: &[(&str, &str)] = &[
    ("caffeine", CAFFEINE),
    ("adamantane", ADAMANTANE),
    ("atorvastatin", ATORVASTATIN),
    ("taxol", TAXOL),
];

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");
    for &(name, smiles) in MOLECULES {
        group.bench_function(name, |b| {
            b.iter(|| black_box(parse_smiles(black_box(smiles)).unwrap()))
        });
    }
    group.finish();
}

fn bench_rings(c: &mut Criterion) {
    let mut group = c.benchmark_group("rings");
    for &(name, smiles) in MOLECULES {
        let graph = parse_smiles(smiles).unwrap();
        group.bench_function(name, |b| {
            b.iter_batched(
                || graph.clone(),
                |mut g| black_box(RingSystem::perceive(&mut g)),
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    for &(name, smiles) in MOLECULES {
        let mut graph = parse_smiles(smiles).unwrap();
        let rings = RingSystem::perceive(&mut graph);
        group.bench_function(name, |b| {
            b.iter_batched(
                || Layout::new(graph.clone(), rings.clone(), LayoutOptions::default()),
                |mut layout| {
                    layout.run();
                    black_box(layout)
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_depict(c: &mut Criterion) {
    let options = LayoutOptions::default();
    c.bench_function("depict_taxol", |b| {
        b.iter(|| black_box(depict(black_box(TAXOL), &options).unwrap()))
    });
}

criterion_group!(benches, bench_parse, bench_rings, bench_layout, bench_depict);
criterion_main!(benches);
