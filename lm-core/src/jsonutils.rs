use serde_json as json;
use sha2::{
    Digest,
    Sha256,
};

// serde_json keeps object keys sorted, so the serialized form of a Value is canonical and we can
// hash it directly to get a stable content fingerprint.
pub fn fingerprint(v: &json::Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(v.to_string().as_bytes());
    hex(&hasher.finalize())
}

pub fn short_fingerprint(s: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(s.as_bytes());
    hex(&hasher.finalize()[..4])
}

// Look up a dotted path like `.status.state` or `status.conditions.0.type`; numeric segments
// index into arrays.
pub fn lookup_path<'a>(v: &'a json::Value, path: &str) -> Option<&'a json::Value> {
    path.trim_start_matches('.')
        .split('.')
        .filter(|segment| !segment.is_empty())
        .try_fold(v, |cur, segment| match cur {
            json::Value::Object(map) => map.get(segment),
            json::Value::Array(vec) => segment.parse::<usize>().ok().and_then(|idx| vec.get(idx)),
            _ => None,
        })
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod test {
    use rstest::*;
    use serde_json::json;

    use super::*;

    #[rstest]
    fn test_fingerprint_ignores_key_order() {
        let a: json::Value = serde_json::from_str(r#"{"name": "foo", "version": "1.0.0"}"#).unwrap();
        let b: json::Value = serde_json::from_str(r#"{"version": "1.0.0", "name": "foo"}"#).unwrap();
        assert_eq!(fingerprint(&a), fingerprint(&b));
        assert_ne!(fingerprint(&a), fingerprint(&json!({"name": "foo", "version": "1.0.1"})));
    }

    #[rstest]
    fn test_short_fingerprint_is_stable() {
        assert_eq!(short_fingerprint("kyma-project.io/module/skr-module").len(), 8);
        assert_eq!(short_fingerprint("foo"), short_fingerprint("foo"));
    }

    #[rstest]
    #[case::dotted(".status.state", Some(json!("Ready")))]
    #[case::no_leading_dot("status.state", Some(json!("Ready")))]
    #[case::array_index(".status.conditions.1.type", Some(json!("Installed")))]
    #[case::missing(".status.phase", None)]
    #[case::bad_index(".status.conditions.x", None)]
    fn test_lookup_path(#[case] path: &str, #[case] expected: Option<json::Value>) {
        let obj = json!({
            "status": {
                "state": "Ready",
                "conditions": [{"type": "Available"}, {"type": "Installed"}],
            },
        });
        assert_eq!(lookup_path(&obj, path).cloned(), expected);
    }
}
