use rand::{distr::Alphanumeric, rng, Rng};

/// Length of generated short codes
pub const CODE_LENGTH: usize = 6;

/// Length of invite bearer tokens
pub const TOKEN_LENGTH: usize = 64;

/// Generates a random identifier from `[A-Za-z0-9]`
pub fn generate_id(length: usize) -> String {
    rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

pub fn generate_code() -> String {
    generate_id(CODE_LENGTH)
}

pub fn generate_token() -> String {
    generate_id(TOKEN_LENGTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_lengths() {
        assert_eq!(generate_code().len(), CODE_LENGTH);
        assert_eq!(generate_token().len(), TOKEN_LENGTH);
    }

    #[test]
    fn test_generated_ids_are_alphanumeric() {
        for _ in 0..100 {
            assert!(generate_token().chars().all(|c| c.is_ascii_alphanumeric()));
        }
    }

    #[test]
    fn test_generated_tokens_differ() {
        assert_ne!(generate_token(), generate_token());
    }
}
