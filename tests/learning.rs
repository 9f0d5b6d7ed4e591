//! Online sampler integration tests.
//!
//! Covers the uniform fallback guarantee, the doubling rebuild schedule and
//! concurrent deposits from many threads.

use guidetree::{OnlineSampler, Point, SamplerParams, ScalarValue};

use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use rayon::prelude::*;
use rstest::rstest;

type Sampler = OnlineSampler<ScalarValue, 2, 4>;

fn corner_value(x: &Point<2>) -> ScalarValue {
    if x[0] < 0.1 && x[1] < 0.1 {
        ScalarValue(1.0)
    } else {
        ScalarValue(0.0)
    }
}

// =============================================================================
// Uniform Fallback
// =============================================================================

#[rstest]
#[case(0.25)]
#[case(0.5)]
#[case(0.75)]
fn pdf_never_drops_below_the_uniform_weight(#[case] uniform_prob: f32) {
    let sampler = Sampler::with_params(SamplerParams {
        uniform_prob,
        ..Default::default()
    });

    let mut rng = Xoshiro256PlusPlus::seed_from_u64(101);

    // Holds before any training...
    for _ in 0..200 {
        let x = Point::uniform(&mut rng);
        assert!(sampler.pdf(&x) >= uniform_prob);
    }

    // ...and after the distribution concentrated.
    for _ in 0..4000 {
        let x = Point::uniform(&mut rng);
        sampler.splat(&x, &corner_value(&x), 1.0);
    }

    let max_tree_pdf = sampler
        .sampling()
        .nodes()
        .iter()
        .filter(|n| n.is_leaf())
        .map(|n| n.density())
        .fold(0.0f32, f32::max);

    for _ in 0..200 {
        let x = Point::uniform(&mut rng);
        let pdf = sampler.pdf(&x);
        assert!(pdf >= uniform_prob);
        assert!(pdf <= uniform_prob + (1.0 - uniform_prob) * max_tree_pdf + 1e-5);
    }
}

#[test]
fn sample_pdf_matches_query_pdf() {
    let sampler = Sampler::new();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(103);
    for _ in 0..3000 {
        let x = Point::uniform(&mut rng);
        sampler.splat(&x, &corner_value(&x), 1.0);
    }

    for _ in 0..1000 {
        let (x, pdf) = sampler.sample_rng(&mut rng);
        assert!(x.in_unit_cube());
        let diff = (sampler.pdf(&x) - pdf).abs();
        assert!(diff <= 1e-4 * pdf.max(1.0), "pdf mismatch: {diff}");
    }
}

// =============================================================================
// Rebuild Schedule
// =============================================================================

#[test]
fn rebuilds_happen_at_doubling_milestones() {
    let sampler = Sampler::new();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(107);

    let mut rebuild_points = Vec::new();
    let mut last_milestone = sampler.next_milestone();
    for _ in 0..5000 {
        let x = Point::uniform(&mut rng);
        sampler.splat(&x, &ScalarValue(1.0), 1.0);

        let milestone = sampler.next_milestone();
        if milestone != last_milestone {
            rebuild_points.push(sampler.samples_so_far());
            last_milestone = milestone;
        }
    }

    assert_eq!(rebuild_points, vec![1024, 2048, 4096]);
    assert_eq!(sampler.next_milestone(), 8192);
}

#[test]
fn deposits_become_visible_only_after_a_rebuild() {
    let sampler = Sampler::new();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(109);

    for _ in 0..1023 {
        let x = Point::uniform(&mut rng);
        sampler.splat(&x, &ScalarValue(2.0), 1.0);
    }
    // Still the untouched uniform snapshot.
    assert_eq!(sampler.sampling().estimate().load(), ScalarValue(0.0));

    let x = Point::uniform(&mut rng);
    sampler.splat(&x, &ScalarValue(2.0), 1.0);
    // The milestone rebuild published the learned mean.
    let estimate = sampler.sampling().estimate().load();
    assert!((estimate.0 - 2.0).abs() < 1e-3, "estimate was {}", estimate.0);
}

// =============================================================================
// Concurrency
// =============================================================================

#[test]
fn concurrent_deposits_are_all_counted() {
    let sampler = Sampler::new();

    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 5000;

    (0..THREADS).into_par_iter().for_each(|thread| {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(113 + thread);
        for _ in 0..PER_THREAD {
            let x = Point::uniform(&mut rng);
            sampler.splat(&x, &corner_value(&x), 1.0);
        }
    });

    assert_eq!(sampler.samples_so_far(), THREADS * PER_THREAD);
    // 40000 deposits cross the milestones up to 32768.
    assert_eq!(sampler.next_milestone(), 65536);

    // The published snapshot is a valid distribution.
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(127);
    for _ in 0..500 {
        let (x, pdf) = sampler.sample_rng(&mut rng);
        assert!(x.in_unit_cube());
        assert!(pdf >= sampler.params().uniform_prob);
    }
}

#[test]
fn reset_clears_learning_state() {
    let sampler = Sampler::new();
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(131);
    for _ in 0..3000 {
        let x = Point::uniform(&mut rng);
        sampler.splat(&x, &corner_value(&x), 1.0);
    }
    assert!(sampler.samples_so_far() > 0);

    sampler.reset();
    assert_eq!(sampler.samples_so_far(), 0);
    assert_eq!(sampler.next_milestone(), 1024);
    assert_eq!(sampler.sampling().num_nodes(), 1);
    let x = Point::from([0.5, 0.5]);
    assert_eq!(sampler.pdf(&x), 1.0);
}
