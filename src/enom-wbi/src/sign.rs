use std::time::{SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};

use crate::encode::scalar_to_string;
use crate::mixin::mixin_key;
use crate::{Params, WbiKeys};

const RESERVED_CHARS: [char; 5] = ['!', '\'', '(', ')', '*'];

/// Remove the characters the upstream drops before verifying a signature.
pub fn strip_reserved(value: &str) -> String {
    value.chars().filter(|c| !RESERVED_CHARS.contains(c)).collect()
}

/// Sign `params` with the current Unix time.
pub fn sign(params: &Params, keys: &WbiKeys) -> String {
    let wts = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    sign_at(params, keys, wts)
}

/// Sign `params` at a fixed timestamp.
///
/// Output is `k1=v1&k2=v2&wts={wts}&w_rid={md5}` with keys sorted ascending
/// and reserved characters stripped from string values before encoding.
pub fn sign_at(params: &Params, keys: &WbiKeys, wts: u64) -> String {
    let mixin = mixin_key(&format!("{}{}", keys.img_key, keys.sub_key));

    let mut entries: Vec<(&String, &serde_json::Value)> = params.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let query = entries
        .into_iter()
        .map(|(key, value)| {
            let value = match value {
                serde_json::Value::String(s) => strip_reserved(s),
                other => scalar_to_string(other),
            };
            format!("{}={}", urlencoding::encode(key), urlencoding::encode(&value))
        })
        .collect::<Vec<_>>()
        .join("&");

    let signed = format!("{query}&wts={wts}");
    let w_rid = Md5::digest(format!("{signed}{mixin}").as_bytes());
    format!("{signed}&w_rid={w_rid:x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn reference_keys() -> WbiKeys {
        WbiKeys::new(
            "7cd084941338484aae1ad9425b84077c",
            "4932caff0ff746eab6f01bf08b70ac45",
        )
    }

    fn params(pairs: &[(&str, serde_json::Value)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    fn w_rid(signed: &str) -> &str {
        signed.rsplit("&w_rid=").next().unwrap()
    }

    #[test]
    fn test_sign_golden() {
        let p = params(&[("foo", json!("114")), ("bar", json!("514")), ("zab", json!(1919810))]);
        assert_eq!(
            sign_at(&p, &reference_keys(), 1702204169),
            "bar=514&foo=114&zab=1919810&wts=1702204169&w_rid=2c59c7b4ee066a5b35a17330fd23cf4b"
        );
    }

    #[test]
    fn test_sign_is_deterministic() {
        let p = params(&[("keyword", json!("lofi")), ("page", json!(1))]);
        let a = sign_at(&p, &reference_keys(), 1700000000);
        let b = sign_at(&p, &reference_keys(), 1700000000);
        assert_eq!(a, b);
    }

    #[test]
    fn test_any_input_change_changes_signature() {
        let p = params(&[("keyword", json!("lofi")), ("page", json!(1))]);
        let base = sign_at(&p, &reference_keys(), 1700000000);

        let changed_param = params(&[("keyword", json!("lofj")), ("page", json!(1))]);
        let changed_img = WbiKeys::new(
            "8cd084941338484aae1ad9425b84077c",
            "4932caff0ff746eab6f01bf08b70ac45",
        );
        let changed_sub = WbiKeys::new(
            "7cd084941338484aae1ad9425b84077c",
            "4932caff0ff746eab6f01bf08b70ac46",
        );

        let base_rid = w_rid(&base);
        assert_ne!(
            base_rid,
            w_rid(&sign_at(&changed_param, &reference_keys(), 1700000000))
        );
        assert_ne!(base_rid, w_rid(&sign_at(&p, &changed_img, 1700000000)));
        assert_ne!(base_rid, w_rid(&sign_at(&p, &changed_sub, 1700000000)));
        assert_ne!(base_rid, w_rid(&sign_at(&p, &reference_keys(), 1700000001)));
    }

    #[test]
    fn test_keys_sorted_regardless_of_insertion_order() {
        let ba = params(&[("b", json!(1)), ("a", json!(2))]);
        let ab = params(&[("a", json!(2)), ("b", json!(1))]);
        let signed_ba = sign_at(&ba, &reference_keys(), 1700000000);
        let signed_ab = sign_at(&ab, &reference_keys(), 1700000000);
        assert!(signed_ba.starts_with("a=2&b=1&wts=1700000000&w_rid="));
        assert_eq!(signed_ba, signed_ab);
    }

    #[test]
    fn test_reserved_characters_stripped_other_punctuation_encoded() {
        let p = params(&[("keyword", json!("Hello! World (&) Co*'")), ("page", json!(1))]);
        assert_eq!(
            sign_at(&p, &reference_keys(), 1700000000),
            "keyword=Hello%20World%20%26%20Co&page=1&wts=1700000000&w_rid=aaf8c82e74be58d6a63d09c556591d1c"
        );
    }

    #[test]
    fn test_empty_values_are_kept_when_signing() {
        let p = params(&[("keyword", json!("")), ("mid", json!(0))]);
        let signed = sign_at(&p, &reference_keys(), 1);
        assert!(signed.starts_with("keyword=&mid=0&wts=1&w_rid="));
    }

    #[test]
    fn test_w_rid_is_32_hex_chars() {
        let signed = sign(&Params::new(), &reference_keys());
        let rid = w_rid(&signed);
        assert_eq!(rid.len(), 32);
        assert!(rid.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
