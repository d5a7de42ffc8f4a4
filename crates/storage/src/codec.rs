//! On-disk encoding of node specs.
//!
//! A stored value is one format version byte followed by the postcard
//! encoding of the [`NodeSpec`].

use p2pd_primitives::{NodeId, NodeSpec};

use crate::{StoreError, StoreResult};

/// Current on-disk format version.
pub const SPEC_FORMAT_VERSION: u8 = 1;

/// Encode a spec for storage.
pub fn encode_spec(spec: &NodeSpec) -> StoreResult<Vec<u8>> {
    let mut buf = vec![SPEC_FORMAT_VERSION];
    buf.extend(postcard::to_allocvec(spec)?);
    Ok(buf)
}

/// Decode a stored spec, checking it belongs to `id`.
pub fn decode_spec(id: &NodeId, value: &[u8]) -> StoreResult<NodeSpec> {
    let Some((&version, body)) = value.split_first() else {
        return Err(StoreError::Codec("empty value".to_string()));
    };
    if version != SPEC_FORMAT_VERSION {
        return Err(StoreError::UnsupportedVersion { found: version });
    }

    let spec: NodeSpec = postcard::from_bytes(body)?;
    if &spec.id != id {
        return Err(StoreError::Codec(format!(
            "spec stored under {id} belongs to {}",
            spec.id
        )));
    }
    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn spec(id: &str) -> NodeSpec {
        NodeSpec {
            id: NodeId::new(id).unwrap(),
            private_key: vec![1, 2, 3, 4],
            listen_addrs: vec![
                "/ip4/127.0.0.1/tcp/4001".to_string(),
                "/ip4/127.0.0.1/tcp/4002".to_string(),
            ],
        }
    }

    #[test]
    fn test_roundtrip_preserves_order() {
        let original = spec("a");
        let encoded = encode_spec(&original).unwrap();
        assert_eq!(encoded[0], SPEC_FORMAT_VERSION);

        let decoded = decode_spec(&original.id, &encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn test_unknown_version_rejected() {
        let original = spec("a");
        let mut encoded = encode_spec(&original).unwrap();
        encoded[0] = 99;
        assert_matches!(
            decode_spec(&original.id, &encoded),
            Err(StoreError::UnsupportedVersion { found: 99 })
        );
    }

    #[test]
    fn test_mismatched_id_rejected() {
        let encoded = encode_spec(&spec("a")).unwrap();
        let other = NodeId::new("b").unwrap();
        assert_matches!(decode_spec(&other, &encoded), Err(StoreError::Codec(_)));
    }

    #[test]
    fn test_empty_value_rejected() {
        let id = NodeId::new("a").unwrap();
        assert_matches!(decode_spec(&id, &[]), Err(StoreError::Codec(_)));
    }
}
