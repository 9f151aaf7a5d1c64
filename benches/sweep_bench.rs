use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use halo_sor::algs::communicator::NoComm;
use halo_sor::algs::driver::relax;
use halo_sor::algs::stencil::sor_sweep;
use halo_sor::config::SorConfig;
use halo_sor::data::grid::Grid;

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sor_sweep");
    for &n in &[64usize, 256, 1024] {
        let current = Grid::<f64>::try_with_border(n, n, 1.0, 10.0).unwrap();
        let mut next = Grid::<f64>::try_with_border(n, n, 0.0, 10.0).unwrap();
        group.bench_with_input(BenchmarkId::new("f64", n), &n, |b, _| {
            b.iter(|| sor_sweep(black_box(&mut next), black_box(&current)).unwrap())
        });
    }
    group.finish();
}

fn bench_serial_run(c: &mut Criterion) {
    let start = Grid::<f64>::try_with_border(128, 128, 0.0, 10.0).unwrap();
    c.bench_function("relax_128x128_20_iters", |b| {
        b.iter(|| {
            relax(
                &NoComm,
                SorConfig::new(128, 128, 1).with_max_iter(20),
                black_box(start.clone()),
            )
            .unwrap()
        })
    });
}

criterion_group!(benches, bench_sweep, bench_serial_run);
criterion_main!(benches);
