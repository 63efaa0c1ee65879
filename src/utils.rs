//! Identifier minting helpers

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Mint an identifier under a known-good prefix (`req_`, `act_`, ...).
/// Prefixes are compile-time constants, so encoding cannot fail in practice.
pub fn mint_id(prefix: &str) -> String {
    let hrp = bech32::Hrp::parse_unchecked(prefix);
    bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .expect("failed to encode uuid7 as a bech32m identifier")
}
