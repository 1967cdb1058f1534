//! Benchmarks for the signing programs.
//!
//! Run with: cargo bench -p sigfault-rsa --bench sign_bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use num_bigint::{BigUint, RandBigInt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sigfault_copro::FaultSpec;
use sigfault_rsa::{KeyPair, SignMode, Signer, SignerConfig};

fn bench_sign_modes(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0x51650);
    let mut group = c.benchmark_group("rsa-sign");

    for bit_width in [512u64, 1024] {
        let key = KeyPair::generate(bit_width, &mut rng).expect("keygen");
        let m = rng.gen_biguint_below(&key.n);

        for (name, mode) in [
            ("noncrt", SignMode::NonCrt),
            ("crt-direct", SignMode::CrtDirect),
            ("crt-shamir", SignMode::CrtShamir),
        ] {
            let config = SignerConfig {
                mode,
                bit_width,
                ..Default::default()
            };
            let mut signer = Signer::seeded(key.clone(), config, 1).expect("signer");
            let msg = m.clone();

            group.throughput(Throughput::Elements(1));
            group.bench_with_input(
                BenchmarkId::new(name, bit_width),
                &msg,
                move |b, msg: &BigUint| {
                    b.iter(|| {
                        signer
                            .sign(black_box(msg), FaultSpec::default())
                            .expect("sign")
                    })
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_sign_modes);
criterion_main!(benches);
