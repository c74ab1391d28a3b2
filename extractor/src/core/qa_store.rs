//! File-scoped, insertion-ordered collection of extracted QA records.

use serde::{Deserialize, Serialize};

/// One extracted question/answer pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaRecord {
    pub qa_index: u64,
    pub question: String,
    pub answer: String,
}

/// Ordered QA records with unique `qa_index` values.
///
/// Storage is a plain vector: lookup by index is a linear scan, and the
/// serialized form is a JSON array in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QaStore {
    records: Vec<QaRecord>,
}

impl QaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[QaRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// `max(qa_index) + 1`, or `0` for an empty store.
    pub fn next_index(&self) -> u64 {
        self.records
            .iter()
            .map(|record| record.qa_index + 1)
            .max()
            .unwrap_or(0)
    }

    /// Append a record at [`Self::next_index`] and return the assigned index.
    pub fn push_new(&mut self, question: String, answer: String) -> u64 {
        let qa_index = self.next_index();
        self.records.push(QaRecord {
            qa_index,
            question,
            answer,
        });
        qa_index
    }

    pub fn find_mut(&mut self, qa_index: u64) -> Option<&mut QaRecord> {
        self.records
            .iter_mut()
            .find(|record| record.qa_index == qa_index)
    }

    pub fn into_records(self) -> Vec<QaRecord> {
        self.records
    }
}
