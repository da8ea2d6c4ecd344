use rand::Rng;

/// Alphabet for visitor codes: uppercase alphanumeric with the glyphs
/// security staff most often misread over the phone removed (I, L, O, 0, 1).
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";

pub const CODE_LENGTH: usize = 6;

/// Strategy for producing visitor codes. The code format is the only part
/// of issuance expected to change (gate hardware constraints, phone-only
/// entry), so it sits behind a trait with one default implementation.
pub trait CodeGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Default generator: 6 characters from [`CODE_ALPHABET`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ShortCodeGenerator;

impl CodeGenerator for ShortCodeGenerator {
    fn generate(&self) -> String {
        let mut rng = rand::thread_rng();
        (0..CODE_LENGTH)
            .map(|_| {
                let idx = rng.gen_range(0..CODE_ALPHABET.len());
                CODE_ALPHABET[idx] as char
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_have_expected_length_and_alphabet() {
        let generator = ShortCodeGenerator;
        for _ in 0..200 {
            let code = generator.generate();
            assert_eq!(code.len(), CODE_LENGTH);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn codes_vary_between_calls() {
        let generator = ShortCodeGenerator;
        let codes: std::collections::HashSet<String> =
            (0..100).map(|_| generator.generate()).collect();
        // 31^6 possibilities; 100 draws collapsing to one value would mean
        // the RNG is broken.
        assert!(codes.len() > 1);
    }
}
