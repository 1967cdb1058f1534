//! Integration tests for the signing programs: round trips, mode agreement
//! and cycle determinism.

use num_bigint::{BigUint, RandBigInt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sigfault_copro::{FaultBranch, FaultSpec};
use sigfault_rsa::{KeyPair, SignMode, Signer, SignerConfig};

const BIT_WIDTH: u64 = 128;

fn config(mode: SignMode) -> SignerConfig {
    SignerConfig {
        mode,
        bit_width: BIT_WIDTH,
        blinding_bits: 16,
        blinding: None,
    }
}

fn test_key(seed: u64) -> KeyPair {
    let mut rng = StdRng::seed_from_u64(seed);
    KeyPair::generate(128, &mut rng).expect("keygen")
}

#[test]
fn test_round_trip_all_modes() {
    let key = test_key(11);
    let mut rng = StdRng::seed_from_u64(12);
    for mode in [SignMode::NonCrt, SignMode::CrtDirect, SignMode::CrtShamir] {
        let mut signer = Signer::seeded(key.clone(), config(mode), 13).unwrap();
        for _ in 0..5 {
            let m = rng.gen_biguint_below(&key.n);
            let sig = signer.sign(&m, FaultSpec::default()).unwrap();
            assert_eq!(
                sig.value.modpow(&key.e, &key.n),
                m,
                "{mode:?} signature must verify"
            );
        }
    }
}

#[test]
fn test_crt_modes_agree_on_clean_runs() {
    let key = test_key(21);
    let mut rng = StdRng::seed_from_u64(22);
    let mut direct = Signer::seeded(key.clone(), config(SignMode::CrtDirect), 23).unwrap();
    let mut shamir = Signer::seeded(key.clone(), config(SignMode::CrtShamir), 24).unwrap();
    for _ in 0..10 {
        let m = rng.gen_biguint_below(&key.n);
        let c1 = direct.sign(&m, FaultSpec::default()).unwrap();
        let c2 = shamir.sign(&m, FaultSpec::default()).unwrap();
        assert_eq!(c1.value, c2.value);
    }
}

#[test]
fn test_cycle_count_invariant_across_keys_and_messages() {
    let mut rng = StdRng::seed_from_u64(31);
    for (mode, expected) in [
        (SignMode::NonCrt, BIT_WIDTH + 6),
        (SignMode::CrtDirect, 4 * BIT_WIDTH + 25),
        (SignMode::CrtShamir, 4 * BIT_WIDTH + 35),
    ] {
        for key_seed in [41, 42] {
            let key = test_key(key_seed);
            let mut signer = Signer::seeded(key.clone(), config(mode), 43).unwrap();
            for _ in 0..3 {
                let m = rng.gen_biguint_below(&key.n);
                let sig = signer.sign(&m, FaultSpec::default()).unwrap();
                assert_eq!(sig.cycles, expected, "{mode:?} cycle count");
            }
        }
    }
}

#[test]
fn test_edge_messages_round_trip() {
    let key = test_key(51);
    let mut signer = Signer::seeded(key.clone(), config(SignMode::CrtDirect), 52).unwrap();
    for m in [BigUint::from(0u32), BigUint::from(1u32), &key.n - 1u32] {
        let sig = signer.sign(&m, FaultSpec::default()).unwrap();
        assert_eq!(sig.value.modpow(&key.e, &key.n), m);
    }
}

/// Textbook scenario: p=61, q=53, N=3233, exponent pair {17, 2753}; signing
/// 65 with exponent 17 yields 2790, which verifies under 2753.
#[test]
fn test_concrete_textbook_scenario() {
    let key = KeyPair {
        p: BigUint::from(61u32),
        q: BigUint::from(53u32),
        n: BigUint::from(3233u32),
        e: BigUint::from(2753u32),
        d: BigUint::from(17u32),
    };
    let m = BigUint::from(65u32);
    let cfg = SignerConfig {
        mode: SignMode::CrtDirect,
        bit_width: 512,
        ..Default::default()
    };

    let mut signer = Signer::seeded(key.clone(), cfg, 61).unwrap();
    let clean = signer.sign(&m, FaultSpec::default()).unwrap();
    assert_eq!(clean.value, BigUint::from(2790u32));
    assert_eq!(clean.value.modpow(&key.e, &key.n), m);

    // Fault the final instruction of the S_p branch: the signature changes
    // and no longer verifies.
    let fault_cycle = clean.branch_p.unwrap().end;
    let faulty = signer.sign(&m, FaultSpec::at_cycle(fault_cycle)).unwrap();
    assert_ne!(faulty.value, clean.value);
    assert_ne!(faulty.value.modpow(&key.e, &key.n), m);
}

#[test]
fn test_branch_fault_corrupts_exactly_one_residue() {
    let key = test_key(71);
    let mut signer = Signer::seeded(key.clone(), config(SignMode::CrtDirect), 72).unwrap();
    let m = BigUint::from(0xC0FFEEu32);
    let clean = signer.sign(&m, FaultSpec::default()).unwrap();

    for branch in [FaultBranch::P, FaultBranch::Q] {
        let faulty = signer.sign(&m, FaultSpec::in_branch(branch)).unwrap();
        assert_ne!(faulty.value, clean.value);
        // The untouched branch residue survives the corruption.
        let (same, changed) = match branch {
            FaultBranch::P => (&key.q, &key.p),
            _ => (&key.p, &key.q),
        };
        assert_eq!(&faulty.value % same, &clean.value % same);
        assert_ne!(&faulty.value % changed, &clean.value % changed);
    }
}
