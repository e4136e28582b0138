extern crate hopmc;

mod common;

use common::*;
use hopmc::geometry::Vector;
use hopmc::graph::SiteGraph;
use hopmc::kmc::{AliasScheduler, ExactScheduler, KmcEngine, Phase, PhaseTargets, Scheduler};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn transported(graph: &SiteGraph) -> Vector {
    graph
        .all_edges()
        .iter()
        .map(|e| e.displacement * e.transitions as f64)
        .sum()
}

fn check_stepping<S: Scheduler>(scheduler: S, seed: u64) {
    let graph = random_graph(seed, [6, 6, 6], 2.0, rates(0.5, 0.6, 0.2));
    let mut engine = KmcEngine::new(graph, scheduler, 12);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    engine.place_carriers(&mut rng).unwrap();
    assert!(engine.verify_occupancy());
    engine.relax(200, &mut rng).unwrap();
    assert_eq!(engine.phase(), Phase::Measuring);
    assert_eq!(engine.hops(), 0);

    let mut hops = 0;
    let mut last_time = engine.time();
    while hops < 2000 {
        let before: Vec<Vector> = engine.carriers().iter().map(|c| c.displacement).collect();
        let hopped = engine.step(&mut rng).unwrap();
        assert!(engine.verify_occupancy());
        assert!(engine.time() >= last_time);
        last_time = engine.time();

        let moved = engine
            .carriers()
            .iter()
            .zip(before.iter())
            .filter(|(c, b)| c.displacement != **b)
            .count();
        if hopped {
            hops += 1;
            assert!(moved <= 1);
        } else {
            assert_eq!(moved, 0);
        }
    }
    engine.finish();
    assert_eq!(engine.phase(), Phase::Done);
    assert_eq!(engine.hops(), 2000);

    let carried: Vector = engine.carriers().iter().map(|c| c.displacement).sum();
    let along_edges = transported(engine.graph());
    assert!((carried - along_edges).norm() < 1e-8);
    let carrier_hops: u64 = engine.carriers().iter().map(|c| c.hops).sum();
    assert_eq!(carrier_hops, 2000);

    let occupied: f64 = engine
        .graph()
        .sites()
        .iter()
        .map(|s| s.total_occupation_time)
        .sum();
    assert!((occupied - 12.0 * engine.time()).abs() <= 1e-9 * occupied.max(1.0));
}

#[test]
fn exact_stepping_keeps_invariants() {
    check_stepping(ExactScheduler::new(), 21);
}

#[test]
fn alias_stepping_keeps_invariants() {
    let graph = random_graph(22, [6, 6, 6], 2.0, rates(0.5, 0.6, 0.2));
    check_stepping(AliasScheduler::new(&graph).unwrap(), 22);
}

#[test]
fn reruns_accumulate_measured_time() {
    let graph = random_graph(4, [6, 6, 6], 2.0, rates(0.5, 1.0, 0.1));
    let mut engine = KmcEngine::new(graph, ExactScheduler::new(), 5);
    let mut rng = ChaCha8Rng::seed_from_u64(4);
    let targets = PhaseTargets {
        relaxation_hops: 100,
        simulation_hops: 500,
        max_simulation_time: None,
    };
    engine.rerun(&targets, &mut rng).unwrap();
    let first = engine.time();
    engine.rerun(&targets, &mut rng).unwrap();
    assert_eq!(engine.reruns(), 2);
    assert_eq!(engine.hops(), 1000);
    assert!(engine.time() > first);

    let obs = engine.observables();
    assert_eq!(obs.hops, 1000);
    assert_eq!(obs.simulation_time, engine.time());
    assert!(obs.diffusivity > 0.0);
    assert!(obs.mobility.is_finite());
}

fn mobility<S: Scheduler>(graph: SiteGraph, scheduler: S, seed: u64) -> f64 {
    let mut engine = KmcEngine::new(graph, scheduler, 16);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let targets = PhaseTargets {
        relaxation_hops: 5_000,
        simulation_hops: 50_000,
        max_simulation_time: None,
    };
    engine.rerun(&targets, &mut rng).unwrap();
    engine.observables().mobility
}

#[test]
fn exact_and_alias_agree() {
    let graph = random_graph(8, [8, 8, 8], 2.0, rates(0.5, 2.0, 0.3));
    let alias = AliasScheduler::new(&graph).unwrap();
    let exact = mobility(graph.clone(), ExactScheduler::new(), 1);
    let sampled = mobility(graph, alias, 2);
    assert!(exact > 0.0);
    assert!(
        (exact - sampled).abs() < 0.3 * exact,
        "exact {} alias {}",
        exact,
        sampled
    );
}
