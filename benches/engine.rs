use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};

use netdiffuse::{generators, Condition, LayeredGraph, RandomSource, SimulationEngine, TransitionModel};

const LAYERS: [(&str, &[&str]); 5] = [
    ("illness", &["S", "I", "R"]),
    ("awareness", &["UA", "A"]),
    ("vaccination", &["UV", "V"]),
    ("quarantine", &["F", "Q"]),
    ("mobility", &["L", "H"]),
];

fn five_process_model() -> TransitionModel {
    let mut model = TransitionModel::new();
    for (name, compartments) in LAYERS {
        model.add_layer(name, compartments.iter().copied()).unwrap();
    }
    for vacc in ["UV", "V"] {
        for aware in ["UA", "A"] {
            for mobility in ["L", "H"] {
                let condition = Condition::from_pairs([
                    ("vaccination", vacc),
                    ("awareness", aware),
                    ("quarantine", "F"),
                    ("mobility", mobility),
                ])
                .unwrap();
                let weight = match (vacc, aware, mobility) {
                    ("V", _, _) => 0.01,
                    (_, "A", "L") => 0.05,
                    (_, "A", "H") => 0.1,
                    (_, _, "L") => 0.15,
                    _ => 0.3,
                };
                model.declare_rule("illness", "S", "I", &condition, weight).unwrap();
            }
        }
    }
    model.declare_rule("illness", "I", "R", &Condition::unconditional(), 0.1).unwrap();
    model
        .declare_rule_qualified("awareness.UA", "awareness.A", &["illness.I"], 0.4)
        .unwrap();
    model
        .declare_rule_qualified("vaccination.UV", "vaccination.V", &["awareness.A"], 0.2)
        .unwrap();
    model
        .declare_rule_qualified("quarantine.F", "quarantine.Q", &["illness.I"], 0.5)
        .unwrap();
    model
        .declare_rule_qualified("quarantine.Q", "quarantine.F", &["illness.R"], 0.5)
        .unwrap();
    model
        .declare_rule_qualified("mobility.H", "mobility.L", &["awareness.A"], 0.2)
        .unwrap();
    model
}

fn bench_compile(c: &mut Criterion) {
    c.bench_function("compile/five_processes", |b| {
        b.iter_batched(
            five_process_model,
            |mut model| {
                model.compile(black_box(0.01)).unwrap();
                model
            },
            BatchSize::SmallInput,
        );
    });
}

fn bench_epochs(c: &mut Criterion) {
    const NODES: usize = 2_000;
    const EPOCHS: usize = 20;

    let mut model = five_process_model();
    model.compile(0.01).unwrap();
    let model = Arc::new(model);
    let network = generators::barabasi_albert(NODES, 3, &mut RandomSource::seeded(0)).unwrap();

    let mut group = c.benchmark_group("engine");
    group.throughput(Throughput::Elements((NODES * LAYERS.len() * EPOCHS) as u64));
    group.bench_function("run/five_processes_2000_nodes", |b| {
        b.iter_batched(
            || {
                let mut graph = LayeredGraph::new();
                for (name, compartments) in LAYERS {
                    graph.add_layer(name, &network, compartments.iter().copied()).unwrap();
                }
                let mut engine = SimulationEngine::new(graph, Arc::clone(&model), RandomSource::seeded(1)).unwrap();
                engine.set_initial_distribution("illness", &[NODES - 20, 20, 0]).unwrap();
                engine.set_initial_distribution("awareness", &[NODES, 0]).unwrap();
                engine.set_initial_distribution("vaccination", &[NODES, 0]).unwrap();
                engine.set_initial_distribution("quarantine", &[NODES, 0]).unwrap();
                engine.set_initial_distribution("mobility", &[NODES / 2, NODES / 2]).unwrap();
                engine
            },
            |mut engine| {
                engine.run(EPOCHS).unwrap();
                engine.into_log()
            },
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, bench_compile, bench_epochs);
criterion_main!(benches);
