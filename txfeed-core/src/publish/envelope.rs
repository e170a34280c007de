//! Wire payload for the bridge's JSON records API.

use crate::record::Record;
use serde::{Deserialize, Serialize};

/// Content type the bridge expects for JSON-valued records.
pub const KAFKA_JSON_V2: &str = "application/vnd.kafka.json.v2+json";

/// `{"records": [{"value": "<json>"}, ...]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchEnvelope {
    pub records: Vec<EnvelopeRecord>,
}

/// One entry; `value` is the record serialized as a JSON string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeRecord {
    pub value: String,
}

impl BatchEnvelope {
    pub fn from_records<'a>(
        records: impl IntoIterator<Item = Record<'a>>,
    ) -> serde_json::Result<Self> {
        let records = records
            .into_iter()
            .map(|r| r.to_json().map(|value| EnvelopeRecord { value }))
            .collect::<serde_json::Result<Vec<_>>>()?;
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Request body bytes.
    pub fn to_body(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{Dataset, FieldValue};

    #[test]
    fn values_are_json_strings() {
        let mut ds = Dataset::new(vec!["TRANSACTION_ID".into(), "TX_AMOUNT".into()]);
        ds.push_row(vec![FieldValue::Int(1), FieldValue::Float(57.16)]).unwrap();
        ds.push_row(vec![FieldValue::Int(2), FieldValue::Float(0.0)]).unwrap();

        let envelope = BatchEnvelope::from_records(ds.records()).unwrap();
        let body = String::from_utf8(envelope.to_body().unwrap()).unwrap();

        assert_eq!(
            body,
            r#"{"records":[{"value":"{\"TRANSACTION_ID\":1,\"TX_AMOUNT\":57.16}"},{"value":"{\"TRANSACTION_ID\":2,\"TX_AMOUNT\":0.0}"}]}"#
        );
    }
}
