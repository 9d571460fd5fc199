use sha2::{Digest, Sha256};

use crate::Hash256;

pub fn sha256(data: &[u8]) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn sha256d(data: &[u8]) -> Hash256 {
    sha256(&sha256(data))
}
