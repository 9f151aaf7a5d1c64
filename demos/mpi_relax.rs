// Relax a square plate whose west edge is held at 20 and the rest of the
// boundary at -20, split over every MPI rank.
//
//     mpirun -n 4 cargo run --example mpi_relax --features mpi-support -- 2 64 64 500 [frames-dir]
//
// Arguments: P (processes per row), NB, MB, iterations, optional frame directory.
#[cfg(feature = "mpi-support")]
fn main() {
    use halo_sor::prelude::*;

    struct Stdout;
    impl ProgressReporter for Stdout {
        fn iteration(&mut self, iteration: usize, norm: f64, epsilon: f64) {
            if iteration % 50 == 0 {
                println!("iteration {iteration}: diff_norm = {norm:.6}, epsilon = {epsilon:.6}");
            }
        }
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    let arg = |i: usize, default: usize| {
        args.get(i)
            .and_then(|s| s.parse().ok())
            .unwrap_or(default)
    };

    let comm = match MpiComm::new() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    };
    let p = arg(0, 1);
    let (nb, mb, iters) = (arg(1, 64), arg(2, 64), arg(3, 500));
    let cfg = SorConfig::new(nb, mb, p)
        .with_max_iter(iters)
        .with_save_output(args.len() > 4);

    let grid = match ProcessGrid::new(comm.rank(), comm.size(), p) {
        Ok(pg) => {
            let mut g = Grid::<f64>::try_with_border(nb, mb, 0.0, -20.0).unwrap_or_else(|e| {
                eprintln!("rank {}: {e}", comm.rank());
                std::process::exit(1);
            });
            if pg.col == 0 {
                g.unpack_ghost_col(Side::West, &vec![20.0; mb]);
            }
            g
        }
        Err(e) => {
            if comm.rank() == 0 {
                eprintln!("{e}");
            }
            std::process::exit(1);
        }
    };

    let mut frames = PngExporter::new(args.get(4).cloned().unwrap_or_else(|| "frames".into()));
    let mut timings = MinMaxTimings::new(0);
    let mut progress = Stdout;
    let result = SorDriver::new(&comm, cfg)
        .with_exporter(&mut frames)
        .with_timings(&mut timings)
        .with_progress(&mut progress)
        .run(grid);

    match result {
        Ok(out) => {
            if comm.rank() == 0 {
                println!(
                    "{} iterations, final diff_norm = {:.6}",
                    out.iterations,
                    out.global_norm().unwrap_or(0.0)
                );
                if let Some((min, max)) = timings.last {
                    println!("timings: min {:.2} ms, max {:.2} ms", min * 1e3, max * 1e3);
                }
            }
        }
        Err(e) => {
            eprintln!("rank {}: {e}", comm.rank());
            std::process::exit(1);
        }
    }
}

#[cfg(not(feature = "mpi-support"))]
fn main() {
    eprintln!("build with --features mpi-support");
}
