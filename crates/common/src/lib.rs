mod env;

pub use env::EnvVars;

pub fn get_current_timestamp() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs() as i64
}

/// Hex digest of `data`, used to derive short opaque codes from UUID seeds.
pub fn blake3_hex(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blake3_hex_is_stable() {
        let a = blake3_hex(b"aula");
        let b = blake3_hex(b"aula");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }
}
