//! Property tests for key splitting and reconstruction

use paperlock::Error;
use paperlock::codec;
use paperlock::domain::SplitConfig;
use paperlock::keys::{KEY_LENGTH, KeyManager, SecretKey};
use quickcheck::{Arbitrary, Gen};
use quickcheck_macros::quickcheck;
use rand::seq::SliceRandom;

/// Random 32-byte content key
#[derive(Clone, Debug)]
struct RandomKey([u8; KEY_LENGTH]);

impl Arbitrary for RandomKey {
    fn arbitrary(g: &mut Gen) -> Self {
        let mut bytes = [0u8; KEY_LENGTH];
        for byte in &mut bytes {
            *byte = u8::arbitrary(g);
        }
        RandomKey(bytes)
    }
}

impl RandomKey {
    fn secret(&self) -> SecretKey {
        SecretKey::from_bytes(&self.0).unwrap()
    }
}

/// Wrapper for valid threshold and share count pairs
#[derive(Clone, Copy, Debug)]
struct ValidSplitParams {
    threshold: u8,
    num_shares: u8,
}

impl Arbitrary for ValidSplitParams {
    fn arbitrary(g: &mut Gen) -> Self {
        let num_shares = (u8::arbitrary(g) % 19) + 2; // 2..=20
        let threshold = (u8::arbitrary(g) % (num_shares - 1)) + 2; // 2..=num_shares

        ValidSplitParams {
            threshold,
            num_shares,
        }
    }
}

/// Every 2-of-3 subset, carried through hex as guardians hold them, rebuilds the key
#[quickcheck]
fn prop_every_pair_of_three_recovers_key(key: RandomKey) -> bool {
    let manager = KeyManager::new(SplitConfig::default());
    let Ok(shares) = manager.split_key(&key.secret()) else {
        return false;
    };
    let carried: Vec<_> = shares
        .iter()
        .map(|share| codec::decode_share(&codec::encode_share(share)).unwrap())
        .collect();

    [(0, 1), (0, 2), (1, 2), (1, 0), (2, 0), (2, 1)]
        .iter()
        .all(|&(a, b)| {
            let pair = [carried[a].clone(), carried[b].clone()];
            matches!(manager.reconstruct_key(&pair), Ok(k) if k.as_bytes() == &key.0)
        })
}

/// A single share never reaches quorum
#[quickcheck]
fn prop_single_share_is_quorum_error(key: RandomKey, pick: u8) -> bool {
    let manager = KeyManager::new(SplitConfig::default());
    let shares = manager.split_key(&key.secret()).unwrap();
    let single = [shares[usize::from(pick % 3)].clone()];

    matches!(
        manager.reconstruct_key(&single),
        Err(Error::Quorum { needed: 2, got: 1 })
    )
}

/// Repeating one share does not count towards quorum
#[quickcheck]
fn prop_duplicate_share_is_not_a_second_share(key: RandomKey) -> bool {
    let manager = KeyManager::new(SplitConfig::default());
    let shares = manager.split_key(&key.secret()).unwrap();
    let doubled = [shares[0].clone(), shares[0].clone()];

    matches!(manager.reconstruct_key(&doubled), Err(Error::Quorum { .. }))
}

/// Any random selection of `threshold` shares works for wider splits
#[quickcheck]
fn prop_random_share_selection_works(key: RandomKey, params: ValidSplitParams) -> bool {
    let config = SplitConfig::from_raw(params.threshold, params.num_shares).unwrap();
    let manager = KeyManager::new(config);
    let mut shares = manager.split_key(&key.secret()).unwrap();
    if shares.len() != params.num_shares as usize {
        return false;
    }

    shares.shuffle(&mut rand::thread_rng());
    shares.truncate(params.threshold as usize);

    matches!(manager.reconstruct_key(&shares), Ok(k) if k.as_bytes() == &key.0)
}

/// One share short of the threshold always fails
#[quickcheck]
fn prop_insufficient_shares_fail(key: RandomKey, params: ValidSplitParams) -> bool {
    let config = SplitConfig::from_raw(params.threshold, params.num_shares).unwrap();
    let manager = KeyManager::new(config);
    let shares = manager.split_key(&key.secret()).unwrap();

    let short = &shares[..(params.threshold - 1) as usize];
    matches!(manager.reconstruct_key(short), Err(Error::Quorum { .. }))
}
