//! Evaluation audit trail
//!
//! Every recorded evaluation keeps hashes of its input and its bundle so a
//! stored record can later be checked for tampering. The log is bounded;
//! the oldest record is dropped once capacity is reached.

use crate::models::{DataRecord, EvaluationBundle};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::VecDeque;
use std::io::Write;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub audit_id: Uuid,
    pub regulator: String,
    pub input_hash: String,
    pub bundle_hash: String,
    pub bundle: EvaluationBundle,
    pub created_at: DateTime<Utc>,
}

pub struct AuditLog {
    capacity: usize,
    records: RwLock<VecDeque<EvaluationRecord>>,
}

impl AuditLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: RwLock::new(VecDeque::new()),
        }
    }

    /// Store an evaluation and return its audit id
    pub fn record(&self, input: &DataRecord, bundle: &EvaluationBundle) -> Uuid {
        let record = EvaluationRecord {
            audit_id: Uuid::new_v4(),
            regulator: bundle.regulator.clone(),
            input_hash: compute_hash(input),
            bundle_hash: compute_hash(bundle),
            bundle: bundle.clone(),
            created_at: Utc::now(),
        };
        let audit_id = record.audit_id;

        let mut records = self.records.write();
        if records.len() == self.capacity {
            if let Some(evicted) = records.pop_front() {
                debug!(audit_id = %evicted.audit_id, "Audit record evicted");
            }
        }
        records.push_back(record);

        audit_id
    }

    pub fn get(&self, audit_id: Uuid) -> Option<EvaluationRecord> {
        self.records
            .read()
            .iter()
            .find(|record| record.audit_id == audit_id)
            .cloned()
    }

    /// Audit ids for one regulator, oldest first
    pub fn list_for_regulator(&self, regulator: &str) -> Vec<Uuid> {
        self.records
            .read()
            .iter()
            .filter(|record| record.regulator.eq_ignore_ascii_case(regulator))
            .map(|record| record.audit_id)
            .collect()
    }

    /// Whether the stored bundle still matches the hash taken when recorded.
    /// Unknown ids report `false`.
    pub fn verify_integrity(&self, audit_id: Uuid) -> bool {
        self.records
            .read()
            .iter()
            .find(|record| record.audit_id == audit_id)
            .map(|record| compute_hash(&record.bundle) == record.bundle_hash)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Hex SHA-256 of a value's JSON form, streamed into the hasher
pub fn compute_hash<T: Serialize + ?Sized>(value: &T) -> String {
    let mut hasher = Sha256::new();

    if serde_json::to_writer(&mut HashWriter(&mut hasher), value).is_err() {
        return String::new();
    }

    hex::encode(hasher.finalize())
}

/// Adapter to allow writing into Sha256 via std::io::Write
struct HashWriter<'a, H: Digest>(&'a mut H);

impl<'a, H: Digest> Write for HashWriter<'a, H> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
