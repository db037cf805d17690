use std::fmt::{Display, Formatter};

use rand::distributions::Alphanumeric;
use rand::Rng;

const SUFFIX_LEN: usize = 10;

/// Idempotency token for one logical transactional iteration.
///
/// Built as `{run_start_unix}_{worker}_{iteration}_{random}`. A worker creates one
/// per iteration and hands the same value to every retry of that iteration, so the
/// store can recognise a resubmission of a transaction it already committed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClientRequestToken(String);

impl ClientRequestToken {
    pub fn generate(run_started_unix: i64, worker_id: u32, iteration: u32) -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(SUFFIX_LEN)
            .map(char::from)
            .collect();
        Self(format!(
            "{}_{}_{}_{}",
            run_started_unix, worker_id, iteration, suffix
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ClientRequestToken {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn token_layout() {
        let token = ClientRequestToken::generate(1_700_000_000, 3, 12);
        let parts: Vec<&str> = token.as_str().split('_').collect();
        assert_eq!(parts.len(), 4);
        assert_eq!(&parts[..3], &["1700000000", "3", "12"]);
        assert_eq!(parts[3].len(), SUFFIX_LEN);
        assert!(parts[3].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn tokens_are_unique_across_workers_and_iterations() {
        let mut seen = HashSet::new();
        for worker in 1..=4 {
            for iteration in 1..=50 {
                assert!(seen.insert(ClientRequestToken::generate(42, worker, iteration)));
            }
        }
        // same coordinates still differ by suffix
        assert_ne!(
            ClientRequestToken::generate(42, 1, 1),
            ClientRequestToken::generate(42, 1, 1)
        );
    }
}
