//! Reference oracle benchmarks
//!
//! Times the pieces of a configuration run that never touch the toolchain:
//! input generation, the reference matmul and the tolerance comparison.
//!
//! Run with: `cargo bench --bench oracle_bench`

use std::hint::black_box;
use std::time::{Duration, Instant};

use kernelcheck::tensor::matmul::{compare_within_tolerance, reference_matmul};
use kernelcheck::{cpu_matmul_f32, InputSet, RandomSeed, ShapeTriple, Tolerance};

struct Benchmark {
    name: String,
    iterations: usize,
    warmup_iterations: usize,
}

impl Benchmark {
    fn new(name: &str, iterations: usize) -> Self {
        Benchmark {
            name: name.to_string(),
            iterations,
            warmup_iterations: iterations.min(10),
        }
    }

    fn run_time<F, R>(&self, mut f: F) -> BenchmarkResult
    where
        F: FnMut() -> R,
    {
        for _ in 0..self.warmup_iterations {
            black_box(f());
        }

        let mut durations = Vec::with_capacity(self.iterations);
        for _ in 0..self.iterations {
            let start = Instant::now();
            black_box(f());
            durations.push(start.elapsed());
        }

        BenchmarkResult {
            name: self.name.clone(),
            durations,
        }
    }
}

struct BenchmarkResult {
    name: String,
    durations: Vec<Duration>,
}

impl BenchmarkResult {
    fn avg(&self) -> Duration {
        let total: Duration = self.durations.iter().sum();
        total / self.durations.len().max(1) as u32
    }

    fn report(&self) {
        let mut sorted = self.durations.clone();
        sorted.sort();
        let (Some(min), Some(max)) = (sorted.first(), sorted.last()) else {
            return;
        };
        let p50 = sorted[sorted.len() / 2];
        let p95 = sorted[(sorted.len() * 95) / 100];
        let avg = self.avg();

        println!("\n=== {} ===", self.name);
        println!("Iterations: {}", sorted.len());
        println!("Average: {:?} ({:.3} ms)", avg, avg.as_secs_f64() * 1000.0);
        println!("Min:     {:?}", min);
        println!("Max:     {:?}", max);
        println!("P50:     {:?}", p50);
        println!("P95:     {:?}", p95);
    }

    fn report_with_gflops(&self, shape: ShapeTriple) {
        self.report();
        let flops = 2.0 * shape.i() as f64 * shape.j() as f64 * shape.k() as f64;
        let gflops = flops / self.avg().as_secs_f64() / 1e9;
        println!("GFLOPS: {:.2}", gflops);
    }
}

fn shape(i: usize, j: usize, k: usize) -> ShapeTriple {
    match ShapeTriple::new(i, j, k) {
        Ok(shape) => shape,
        Err(e) => panic!("bad benchmark shape: {}", e),
    }
}

fn benchmark_reference_matmul() {
    println!("\n[Reference matmul]");
    let seed = RandomSeed::new(42);

    for s in [shape(4, 1, 14), shape(8, 8, 8), shape(50, 1, 50), shape(50, 50, 50)] {
        let inputs = InputSet::generate(s, seed);
        let bench = Benchmark::new(&format!("reference_matmul {}", s), 200);
        bench
            .run_time(|| reference_matmul(&inputs))
            .report_with_gflops(s);
    }

    let big = shape(256, 256, 256);
    let inputs = InputSet::generate(big, seed);
    Benchmark::new("cpu_matmul_f32 256^3", 10)
        .run_time(|| cpu_matmul_f32(inputs.a(), inputs.b(), 256, 256, 256))
        .report_with_gflops(big);
}

fn benchmark_input_generation() {
    println!("\n[Input generation]");
    let seed = RandomSeed::new(7);
    for s in [shape(8, 8, 8), shape(50, 50, 50)] {
        Benchmark::new(&format!("InputSet::generate {}", s), 200)
            .run_time(|| InputSet::generate(s, seed))
            .report();
    }
}

fn benchmark_comparison() {
    println!("\n[Tolerance comparison]");
    let s = shape(50, 50, 50);
    let inputs = InputSet::generate(s, RandomSeed::new(3));
    let expected = reference_matmul(&inputs);
    let actual = expected.clone();

    Benchmark::new("compare_within_tolerance 2500 elements", 1000)
        .run_time(|| compare_within_tolerance(&actual, &expected, Tolerance::default()).is_ok())
        .report();
}

fn main() {
    println!("kernelcheck oracle benchmarks");
    benchmark_reference_matmul();
    benchmark_input_generation();
    benchmark_comparison();
}
