//! Record codec
//!
//! Structural validation, signable payloads and content hashes. Every byte
//! string that is signed or hashed comes out of this module, so signers and
//! verifiers can never disagree on what was covered.

use serde_json::{Map, Value};

use crate::canon::canonicalize;
use crate::constants::MAX_RECORD_TYPE_LENGTH;
use crate::error::{CoreError, CoreResult};
use crate::types::{split_record_type, validate_scope, ProtocolVersion, Record, RecordHash, SignerRole};

/// Which stage of its life a record is validated for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStage {
    /// Owner-signed, not yet witnessed
    Submission,
    /// Witnessed and sealed
    Entry,
}

/// Record codec
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordCodec;

impl RecordCodec {
    /// Fields a record must carry at the given stage
    pub fn required_fields(protocol: ProtocolVersion, stage: RecordStage) -> &'static [&'static str] {
        match stage {
            RecordStage::Submission => protocol.submission_fields(),
            RecordStage::Entry => protocol.entry_fields(),
        }
    }

    /// Check a raw JSON record and parse it
    ///
    /// The protocol tag is read first; a missing or unknown tag fails before
    /// any other field is looked at.
    pub fn decode(value: &Value, stage: RecordStage) -> CoreResult<Record> {
        let obj = value
            .as_object()
            .ok_or_else(|| CoreError::MalformedRecord("record is not an object".to_string()))?;

        let protocol = obj
            .get("protocol")
            .and_then(Value::as_str)
            .ok_or_else(|| CoreError::MalformedRecord("missing field 'protocol'".to_string()))?
            .parse::<ProtocolVersion>()?;

        for field in Self::required_fields(protocol, stage) {
            if !obj.contains_key(*field) {
                return Err(CoreError::MalformedRecord(format!("missing field '{}'", field)));
            }
        }

        let record: Record = serde_json::from_value(value.clone())
            .map_err(|e| CoreError::MalformedRecord(e.to_string()))?;
        Self::validate(&record, stage)?;
        Ok(record)
    }

    /// Structural invariants of a typed record
    pub fn validate(record: &Record, stage: RecordStage) -> CoreResult<()> {
        let protocol = record.protocol_version()?;

        validate_scope(&record.scope)?;
        if record.nonce.is_empty() {
            return Err(CoreError::MalformedRecord("empty nonce".to_string()));
        }
        if record.record_type.is_empty() || record.record_type.len() > MAX_RECORD_TYPE_LENGTH {
            return Err(CoreError::MalformedRecord(format!(
                "record_type must be 1..={} characters",
                MAX_RECORD_TYPE_LENGTH
            )));
        }

        let needs_previous = stage == RecordStage::Entry || protocol.client_chained();
        if needs_previous {
            let previous = record.previous_hash.as_deref().ok_or_else(|| {
                CoreError::MalformedRecord("missing field 'previous_hash'".to_string())
            })?;
            match (record.is_genesis(), previous.is_empty()) {
                (true, false) => {
                    return Err(CoreError::MalformedRecord(
                        "genesis must have an empty previous_hash".to_string(),
                    ))
                }
                (false, true) => {
                    return Err(CoreError::MalformedRecord(
                        "only genesis may have an empty previous_hash".to_string(),
                    ))
                }
                _ => {}
            }
        }

        let owners = record
            .signatures
            .iter()
            .filter(|s| s.role == SignerRole::Owner)
            .count();
        if owners > 1 {
            return Err(CoreError::MalformedRecord(format!(
                "{} owner signatures, expected one",
                owners
            )));
        }

        if stage == RecordStage::Entry {
            if record.at.as_deref().map_or(true, str::is_empty) {
                return Err(CoreError::MalformedRecord("missing field 'at'".to_string()));
            }
            if !record.is_sealed() {
                return Err(CoreError::MalformedRecord("missing field 'current_hash'".to_string()));
            }
        }
        Ok(())
    }

    /// The owner-signed payload, pinned by protocol version
    pub fn signable(record: &Record) -> CoreResult<Value> {
        let protocol = record.protocol_version()?;
        let full = record.to_value()?;
        let mut out = Map::new();
        for field in protocol.signable_fields() {
            let value = match *field {
                "previous_hash" => Value::String(record.previous_hash_str().to_string()),
                name => full.get(name).cloned().unwrap_or(Value::Null),
            };
            out.insert((*field).to_string(), value);
        }
        Ok(Value::Object(out))
    }

    /// Canonical bytes of [`RecordCodec::signable`]
    pub fn signable_bytes(record: &Record) -> CoreResult<Vec<u8>> {
        Ok(canonicalize(&Self::signable(record)?))
    }

    /// Bytes signed by the co-signer whose entry sits at `index`
    ///
    /// The whole record except `current_hash`, with the signature list cut
    /// after that entry and the entry's own signature value removed. Each
    /// co-signer therefore covers the owner and every co-signer before it.
    pub fn cosign_bytes(record: &Record, index: usize) -> CoreResult<Vec<u8>> {
        if index >= record.signatures.len() {
            return Err(CoreError::MalformedRecord(format!(
                "no signature entry at position {}",
                index
            )));
        }
        let mut stripped = record.clone();
        stripped.current_hash = None;
        stripped.signatures.truncate(index + 1);
        stripped.signatures[index].signature = None;
        Ok(canonicalize(&stripped.to_value()?))
    }

    /// Canonical bytes of the whole record except `current_hash`
    pub fn hash_bytes(record: &Record) -> CoreResult<Vec<u8>> {
        let mut value = record.to_value()?;
        if let Value::Object(map) = &mut value {
            map.remove("current_hash");
        }
        Ok(canonicalize(&value))
    }

    /// Content hash of a record
    pub fn hash(record: &Record) -> CoreResult<RecordHash> {
        Ok(RecordHash::sha256(&Self::hash_bytes(record)?))
    }

    /// Check that `current_hash` matches the content
    pub fn verify_hash(record: &Record) -> CoreResult<RecordHash> {
        let claimed = record
            .current_hash
            .as_deref()
            .ok_or_else(|| CoreError::MalformedRecord("missing field 'current_hash'".to_string()))?;
        let claimed = RecordHash::from_base64(claimed)?;
        let computed = Self::hash(record)?;
        if claimed != computed {
            return Err(CoreError::MalformedRecord(format!(
                "current_hash {} does not match content hash {}",
                claimed, computed
            )));
        }
        Ok(computed)
    }

    /// Canonical size of a record as submitted
    pub fn canonical_size(value: &Value) -> usize {
        canonicalize(value).len()
    }

    /// Split a record type into `(category, action)`
    pub fn dispatch_type(record_type: &str) -> (&str, &str) {
        split_record_type(record_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignatureEntry;
    use serde_json::json;

    fn submission() -> Value {
        json!({
            "protocol": "v1",
            "scope": "self",
            "nonce": "abc",
            "record_type": "key:grant",
            "data": {"key": "pk", "roles": ["writer"]},
            "signatures": [{"fingerprint": "owner", "type": "owner", "signature": "sig"}]
        })
    }

    #[test]
    fn test_decode_submission() {
        let record = RecordCodec::decode(&submission(), RecordStage::Submission).unwrap();
        assert_eq!(record.scope, "self");
        assert_eq!(record.owner_fingerprint(), Some("owner"));
    }

    #[test]
    fn test_missing_field() {
        let mut value = submission();
        value.as_object_mut().unwrap().remove("nonce");
        let err = RecordCodec::decode(&value, RecordStage::Submission).unwrap_err();
        assert_eq!(err, CoreError::MalformedRecord("missing field 'nonce'".to_string()));
    }

    #[test]
    fn test_unknown_protocol() {
        let mut value = submission();
        value["protocol"] = json!("v9");
        assert!(matches!(
            RecordCodec::decode(&value, RecordStage::Submission),
            Err(CoreError::UnknownProtocol(_))
        ));
    }

    #[test]
    fn test_client_chained_needs_previous_hash() {
        let mut value = submission();
        value["protocol"] = json!("v1.1");
        assert!(RecordCodec::decode(&value, RecordStage::Submission).is_err());

        value["previous_hash"] = json!("47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=");
        assert!(RecordCodec::decode(&value, RecordStage::Submission).is_ok());
    }

    #[test]
    fn test_entry_requires_witness_fields() {
        let mut value = submission();
        value["previous_hash"] = json!("47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=");
        assert!(RecordCodec::decode(&value, RecordStage::Entry).is_err());

        value["at"] = json!("42");
        let mut record: Record = serde_json::from_value(value.clone()).unwrap();
        record.current_hash = Some(RecordCodec::hash(&record).unwrap().to_base64());
        let value = record.to_value().unwrap();
        assert!(RecordCodec::decode(&value, RecordStage::Entry).is_ok());
    }

    #[test]
    fn test_single_owner_signature() {
        let mut value = submission();
        value["signatures"] = json!([
            {"fingerprint": "owner", "type": "owner", "signature": "sig"},
            {"fingerprint": "owner", "type": "owner", "signature": "sig"}
        ]);
        assert!(matches!(
            RecordCodec::decode(&value, RecordStage::Submission),
            Err(CoreError::MalformedRecord(_))
        ));
    }

    #[test]
    fn test_genesis_previous_hash_rules() {
        let mut record =
            Record::new(ProtocolVersion::V1_1, "self", "n", "key:grant", json!({})).with_previous_hash("");
        assert!(RecordCodec::validate(&record, RecordStage::Submission).is_err());

        record.record_type = "genesis".to_string();
        assert!(RecordCodec::validate(&record, RecordStage::Submission).is_ok());

        record.previous_hash = Some("x".to_string());
        assert!(RecordCodec::validate(&record, RecordStage::Submission).is_err());
    }

    #[test]
    fn test_signable_excludes_signatures_and_witness_fields() {
        let mut record = RecordCodec::decode(&submission(), RecordStage::Submission).unwrap();
        record.at = Some("1".to_string());
        record.previous_hash = Some("prev".to_string());

        let signable = RecordCodec::signable(&record).unwrap();
        let obj = signable.as_object().unwrap();
        assert_eq!(obj.len(), 5);
        assert!(!obj.contains_key("signatures"));
        assert!(!obj.contains_key("previous_hash"));
        assert!(!obj.contains_key("at"));

        // v1.1 covers previous_hash
        record.protocol = "v1.1".to_string();
        let signable = RecordCodec::signable(&record).unwrap();
        assert_eq!(signable["previous_hash"], json!("prev"));
    }

    #[test]
    fn test_signable_ignores_key_order() {
        let a = json!({"protocol": "v1", "scope": "s", "nonce": "n", "record_type": "t:a",
                       "data": {"b": 1, "a": 2}, "signatures": []});
        let b = json!({"signatures": [], "data": {"a": 2, "b": 1}, "record_type": "t:a",
                       "nonce": "n", "scope": "s", "protocol": "v1"});
        let ra = RecordCodec::decode(&a, RecordStage::Submission).unwrap();
        let rb = RecordCodec::decode(&b, RecordStage::Submission).unwrap();
        assert_eq!(
            RecordCodec::signable_bytes(&ra).unwrap(),
            RecordCodec::signable_bytes(&rb).unwrap()
        );
    }

    #[test]
    fn test_hash_excludes_current_hash() {
        let mut record = RecordCodec::decode(&submission(), RecordStage::Submission).unwrap();
        let before = RecordCodec::hash(&record).unwrap();
        record.current_hash = Some(before.to_base64());
        assert_eq!(RecordCodec::hash(&record).unwrap(), before);
        assert_eq!(RecordCodec::verify_hash(&record).unwrap(), before);

        record.data["roles"] = json!(["admin"]);
        assert!(RecordCodec::verify_hash(&record).is_err());
    }

    #[test]
    fn test_cosign_bytes_cover_earlier_entries_only() {
        let mut record = RecordCodec::decode(&submission(), RecordStage::Submission).unwrap();
        record
            .signatures
            .push(SignatureEntry::unsigned("usher-pk", SignerRole::Usher));
        let unsigned = RecordCodec::cosign_bytes(&record, 1).unwrap();

        // own signature value, later entries and current_hash are not covered
        record.signatures[1].signature = Some("usher-sig".to_string());
        record
            .signatures
            .push(SignatureEntry::new("q", SignerRole::Quorum, "q-sig"));
        record.current_hash = Some("whatever".to_string());
        assert_eq!(RecordCodec::cosign_bytes(&record, 1).unwrap(), unsigned);

        // the owner's signature is
        record.signatures[0].signature = Some("other".to_string());
        assert_ne!(RecordCodec::cosign_bytes(&record, 1).unwrap(), unsigned);

        assert!(RecordCodec::cosign_bytes(&record, 7).is_err());
    }
}
