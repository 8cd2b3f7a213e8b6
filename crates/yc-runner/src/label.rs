use std::fmt;

use rand::Rng;

const ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const LEN: usize = 5;

/// Random tag that identifies one runner among all runners of the repository.
///
/// The runner id is only known after the VM has registered itself, so the
/// label is what ties the created VM to its runner entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunnerLabel(String);

impl RunnerLabel {
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let label = (0..LEN)
            .map(|_| ALPHABET[rng.random_range(0..ALPHABET.len())] as char)
            .collect();
        Self(label)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for RunnerLabel {
    fn from(label: &str) -> Self {
        Self(label.to_string())
    }
}

impl fmt::Display for RunnerLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
