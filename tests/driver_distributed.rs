mod util;
use util::*;

use halo_sor::algs::communicator::{Communicator, LocalComm};
use halo_sor::algs::driver::{SorDriver, relax};
use halo_sor::config::SorConfig;
use halo_sor::data::grid::Grid;
use halo_sor::report::{MinMaxTimings, ProgressLog};
use halo_sor::sor_error::SorError;

/// Run the driver on a `q`×`p` world over blocks of `global` and reassemble.
fn distributed(global: &Grid<f64>, p: usize, q: usize, cfg: SorConfig) -> (Grid<f64>, Vec<usize>) {
    let (nb, mb) = (cfg.nb, cfg.mb);
    let outs = run_ranks(p * q, |comm| {
        let (row, col) = (comm.rank() / p, comm.rank() % p);
        let block = global.block(nb, mb, row, col).unwrap();
        let out = relax(&comm, cfg.clone(), block).unwrap();
        (row, col, out)
    });
    let mut assembled = global.clone();
    let mut iterations = Vec::new();
    for (row, col, out) in outs {
        assembled.insert_block(&out.grid, row, col).unwrap();
        iterations.push(out.iterations);
    }
    (assembled, iterations)
}

#[test]
fn two_by_two_matches_block_schedule() {
    let global = pattern_field(8, 6, 2.0);
    let cfg = SorConfig::new(4, 3, 2).with_max_iter(6);
    let (got, iters) = distributed(&global, 2, 2, cfg);
    assert_eq!(iters, vec![6; 4]);
    assert_eq!(got, emulate_blocks(&global, 2, 2, 6));
}

#[test]
fn strips_match_block_schedule() {
    let global = pattern_field(9, 8, -3.0);
    let (rows, _) = distributed(&global, 1, 4, SorConfig::new(9, 2, 1).with_max_iter(5));
    assert_eq!(rows, emulate_blocks(&global, 1, 4, 5));
    let (cols, _) = distributed(&global, 3, 1, SorConfig::new(3, 8, 3).with_max_iter(5));
    assert_eq!(cols, emulate_blocks(&global, 3, 1, 5));
}

#[test]
fn three_by_two_matches_block_schedule() {
    let global = pattern_field(9, 4, 0.5);
    let (got, _) = distributed(&global, 3, 2, SorConfig::new(3, 2, 3).with_max_iter(7));
    assert_eq!(got, emulate_blocks(&global, 3, 2, 7));
}

#[test]
fn every_rank_sees_the_same_global_norm() {
    let global = pattern_field(6, 6, 1.0);
    let cfg = SorConfig::new(3, 3, 2).with_max_iter(3);
    let norms = run_ranks(4, |comm| {
        let block = global.block(3, 3, comm.rank() / 2, comm.rank() % 2).unwrap();
        relax(&comm, cfg.clone(), block).unwrap().global_sq_norm.unwrap()
    });
    assert!(norms.iter().all(|&n| n == norms[0]));
}

#[test]
fn early_exit_is_collective() {
    let global = Grid::<f64>::try_with_border(8, 8, 1.0, 0.0).unwrap();
    let cfg = SorConfig::new(4, 4, 2)
        .with_max_iter(5_000)
        .with_epsilon(1e-4)
        .with_early_exit();
    let (_, iters) = distributed(&global, 2, 2, cfg);
    assert!(iters[0] < 5_000);
    assert!(iters.iter().all(|&n| n == iters[0]));
}

#[test]
fn transfers_count_neighbours() {
    // 2x2: every rank has one vertical and one horizontal neighbour,
    // so 2 receives + 2 sends per iteration.
    let global = pattern_field(4, 4, 0.0);
    let posted = run_ranks(4, |comm| {
        let block = global.block(2, 2, comm.rank() / 2, comm.rank() % 2).unwrap();
        relax(&comm, SorConfig::new(2, 2, 2).with_max_iter(3), block)
            .unwrap()
            .transfers
    });
    assert_eq!(posted, vec![12; 4]);
}

#[test]
fn leader_alone_reports_progress_and_timings_reach_everyone() {
    let global = pattern_field(4, 2, 1.0);
    let results = run_ranks(2, |comm| {
        let block = global.block(2, 2, 0, comm.rank()).unwrap();
        let mut progress = ProgressLog::default();
        let mut timings = MinMaxTimings::new(1);
        SorDriver::new(&comm, SorConfig::new(2, 2, 2).with_max_iter(3).with_leader(1))
            .with_progress(&mut progress)
            .with_timings(&mut timings)
            .run(block)
            .unwrap();
        (progress.entries.len(), timings.last)
    });
    assert_eq!(results[0].0, 0);
    assert_eq!(results[1].0, 3);
    let (min, max) = results[0].1.unwrap();
    assert!(min <= max);
    assert_eq!(results[0].1, results[1].1);
}

#[test]
fn indivisible_topology_fails_before_any_transfer() {
    let comm = ScriptedComm::new(0, 3, &[]);
    let err = relax(&comm, SorConfig::new(2, 2, 2), Grid::<f64>::try_zeroed(2, 2).unwrap()).unwrap_err();
    assert!(matches!(err, SorError::Topology { size: 3, p: 2 }));
    assert_eq!(comm.posted.get(), 0);
    assert_eq!(comm.splits.get(), 0);

    // Same through a real world: every rank fails on its own.
    let errs = run_ranks(3, |comm: LocalComm| {
        relax(&comm, SorConfig::new(2, 2, 2), Grid::<f64>::try_zeroed(2, 2).unwrap()).is_err()
    });
    assert_eq!(errs, vec![true; 3]);
}

#[test]
fn lost_neighbour_aborts_the_run() {
    let comm = ScriptedComm::new(0, 2, &[(0, 1), (0, 2)]);
    let err = relax(&comm, SorConfig::new(2, 2, 2).with_max_iter(4), Grid::<f64>::try_zeroed(2, 2).unwrap())
        .unwrap_err();
    assert!(matches!(err, SorError::Comm { neighbor: 1, .. }));
    // One exchange attempted, then nothing more.
    assert_eq!(comm.posted.get(), 2);
}
