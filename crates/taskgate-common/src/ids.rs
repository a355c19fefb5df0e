use rand::RngCore;

/// Random lowercase hex string built from `n_bytes` random bytes.
pub fn rand_hex(n_bytes: usize) -> String {
    let mut buf = vec![0u8; n_bytes];
    rand::thread_rng().fill_bytes(&mut buf);
    buf.iter().map(|b| format!("{b:02x}")).collect()
}

/// Envelope identifier: 16 random bytes.
pub fn envelope_id() -> String {
    rand_hex(16)
}
