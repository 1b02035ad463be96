//! `user-key = base64url(HMAC_SHA256(pepper, phone))` stripped of padding
//! (spec.md §6 Logs, §8 "non-invertible without the pepper").

use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Derive the stable, non-reversible identifier used everywhere a phone
/// number would otherwise appear: logs, audit records, store keys.
///
/// Deterministic for a fixed pepper: same phone always yields the same key,
/// and the key cannot be inverted back to the phone without the pepper.
pub fn derive_user_key(pepper: &str, phone_e164: &str) -> String {
    let mut mac = HmacSha256::new_from_slice(pepper.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(phone_e164.as_bytes());
    let digest = mac.finalize().into_bytes();
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_phone_same_pepper_is_deterministic() {
        let a = derive_user_key("pepper", "+5511999999999");
        let b = derive_user_key("pepper", "+5511999999999");
        assert_eq!(a, b);
    }

    #[test]
    fn different_pepper_changes_the_key() {
        let a = derive_user_key("pepper-a", "+5511999999999");
        let b = derive_user_key("pepper-b", "+5511999999999");
        assert_ne!(a, b);
    }

    #[test]
    fn key_has_no_padding_characters() {
        let key = derive_user_key("pepper", "+5511999999999");
        assert!(!key.contains('='));
    }
}
