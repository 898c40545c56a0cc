//! Property tests for the content cipher

use paperlock::Error;
use paperlock::cipher::{decrypt, encrypt};
use paperlock::keys::KEY_LENGTH;
use quickcheck::{Arbitrary, Gen, TestResult};
use quickcheck_macros::quickcheck;

const MAX_CHARS: usize = 10_000;

/// A few multi-byte characters so non-ASCII text is covered too
const EXTRA: [char; 6] = ['é', 'ß', 'Ω', '東', '→', '🚀'];

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

/// Printable text of 0..=10,000 characters
#[derive(Clone, Debug)]
struct PrintableText(String);

impl Arbitrary for PrintableText {
    fn arbitrary(g: &mut Gen) -> Self {
        let len = usize::arbitrary(g) % (MAX_CHARS + 1);
        let text = (0..len)
            .map(|_| {
                let roll = u8::arbitrary(g);
                if roll % 16 == 0 {
                    EXTRA[usize::from(roll / 16) % EXTRA.len()]
                } else {
                    char::from(0x20 + roll % 95)
                }
            })
            .collect();
        PrintableText(text)
    }

    fn shrink(&self) -> Box<dyn Iterator<Item = Self>> {
        let half: String = self.0.chars().take(self.0.chars().count() / 2).collect();
        if half.len() == self.0.len() {
            Box::new(std::iter::empty())
        } else {
            Box::new(std::iter::once(PrintableText(half)))
        }
    }
}

/// decrypt(encrypt(text, key), key) == text
#[quickcheck]
fn prop_round_trip(key: RandomKey, text: PrintableText) -> bool {
    let Ok(sealed) = encrypt(&text.0, &key.0) else {
        return false;
    };
    matches!(decrypt(&sealed, &key.0), Ok(plain) if plain == text.0)
}

/// Same plaintext and key always give the same ciphertext
#[quickcheck]
fn prop_encryption_is_deterministic(key: RandomKey, text: PrintableText) -> bool {
    encrypt(&text.0, &key.0).unwrap() == encrypt(&text.0, &key.0).unwrap()
}

/// A wrong key yields a crypto error or the same garbled text every time
#[quickcheck]
fn prop_wrong_key_is_error_or_deterministic(
    key: RandomKey,
    wrong: RandomKey,
    text: PrintableText,
) -> TestResult {
    if key.0 == wrong.0 {
        return TestResult::discard();
    }
    let sealed = encrypt(&text.0, &key.0).unwrap();

    let consistent = match (decrypt(&sealed, &wrong.0), decrypt(&sealed, &wrong.0)) {
        (Err(Error::Crypto(_)), Err(Error::Crypto(_))) => true,
        (Ok(first), Ok(second)) => first == second,
        _ => false,
    };
    TestResult::from_bool(consistent)
}

/// Short key blobs are padded, so a share-sized blob still keys the cipher
#[quickcheck]
fn prop_short_keys_are_padded_consistently(blob: Vec<u8>, text: PrintableText) -> bool {
    let blob: Vec<u8> = blob.into_iter().take(KEY_LENGTH).collect();
    let mut padded = blob.clone();
    padded.resize(KEY_LENGTH, 0);

    let sealed = encrypt(&text.0, &blob).unwrap();
    matches!(decrypt(&sealed, &padded), Ok(plain) if plain == text.0)
}
