use bytes::Bytes;
use serde::Serialize;

use crate::record::Record;

/// Mapping type sent in every action line. Elasticsearch 6+ allows a single
/// type per index, so the metric kind travels in the document's `type`.
pub const DOCUMENT_TYPE: &str = "statsd";

#[derive(Serialize)]
struct IndexAction<'a> {
    index: ActionMeta<'a>,
}

#[derive(Serialize)]
struct ActionMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type")]
    doc_type: &'a str,
}

/// Newline-delimited bulk request body: one action line and one document
/// line per record, terminated by a blank line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkBody {
    payload: String,
    documents: usize,
}

impl BulkBody {
    /// Returns `None` when there are no records to send.
    pub fn build<'r>(
        index: &str,
        records: impl IntoIterator<Item = &'r Record>,
    ) -> Result<Option<Self>, serde_json::Error> {
        let action = serde_json::to_string(&IndexAction {
            index: ActionMeta {
                index,
                doc_type: DOCUMENT_TYPE,
            },
        })?;

        let mut lines = Vec::new();
        for record in records {
            lines.push(action.clone());
            lines.push(serde_json::to_string(record)?);
        }

        if lines.is_empty() {
            return Ok(None);
        }

        let documents = lines.len() / 2;
        lines.push("\n".to_owned());

        Ok(Some(Self {
            payload: lines.join("\n"),
            documents,
        }))
    }

    pub fn as_str(&self) -> &str {
        &self.payload
    }

    /// Length in bytes, as sent in `Content-Length`.
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    pub fn documents(&self) -> usize {
        self.documents
    }

    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.payload)
    }
}
