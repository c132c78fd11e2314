use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use agora_crypto::{generate_id, SignatureVerifier, Signer};
use agora_types::{Clock, NodeId, Timestamp};
use serde::{Deserialize, Serialize};

use crate::entry::{ChainVerification, EntryType, LedgerEntry, GENESIS_HASH};
use crate::error::LedgerError;
use crate::payload::LedgerPayload;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LedgerStats {
    pub total_entries: usize,
    pub unique_nodes: usize,
    pub unique_tasks: usize,
    pub verified_entries: usize,
    pub by_type: BTreeMap<EntryType, usize>,
}

/// The append-only, hash-chained event log of one node.
pub struct SignedLedger {
    entries: Vec<LedgerEntry>,
    by_id: HashMap<String, usize>,
    /// Author and target node ids → entry positions.
    by_node: HashMap<NodeId, Vec<usize>>,
    by_task: HashMap<String, Vec<usize>>,
    signer: Option<Arc<dyn Signer>>,
    verifier: Option<Arc<dyn SignatureVerifier>>,
    clock: Arc<dyn Clock>,
}

impl SignedLedger {
    /// An empty ledger that neither signs nor checks signatures.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Vec::new(),
            by_id: HashMap::new(),
            by_node: HashMap::new(),
            by_task: HashMap::new(),
            signer: None,
            verifier: None,
            clock,
        }
    }

    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn with_verifier(mut self, verifier: Arc<dyn SignatureVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    // ── Appending ───────────────────────────────────────────────────────

    /// Append an event authored by `node_id`.
    ///
    /// With a signer configured, `node_id` must be the signer's node: the
    /// signature is later checked against the author id.
    pub fn add_entry(
        &mut self,
        node_id: &NodeId,
        payload: &LedgerPayload,
    ) -> Result<LedgerEntry, LedgerError> {
        if let Some(signer) = &self.signer {
            let signer_id = signer.node_id();
            if &signer_id != node_id {
                return Err(LedgerError::SignerMismatch {
                    signer: signer_id.to_string(),
                    author: node_id.to_string(),
                });
            }
        }

        let related = payload.related_ids();
        let mut entry = LedgerEntry {
            id: generate_id("entry"),
            entry_type: payload.entry_type(),
            timestamp: self.clock.now(),
            node_id: node_id.clone(),
            target_node_id: related.target_node_id,
            task_id: related.task_id,
            data: payload.to_json()?,
            prev_hash: self
                .entries
                .last()
                .map_or_else(|| GENESIS_HASH.to_string(), |e| e.hash.clone()),
            hash: String::new(),
            signature: String::new(),
            verified: false,
            witnesses: Vec::new(),
        };
        entry.hash = entry.compute_hash();
        if let Some(signer) = &self.signer {
            entry.signature = hex::encode(signer.sign(entry.hash.as_bytes())?);
        }

        tracing::debug!(
            entry = %entry.id,
            kind = %entry.entry_type,
            task = ?entry.task_id,
            "ledger entry appended"
        );
        self.push_indexed(entry.clone());
        Ok(entry)
    }

    /// Record `witness_id` on an entry. Repeats are ignored; the hash is unchanged.
    pub fn add_witness(&mut self, entry_id: &str, witness_id: &NodeId) -> Result<(), LedgerError> {
        let entry = self.entry_mut(entry_id)?;
        if !entry.witnesses.contains(witness_id) {
            entry.witnesses.push(witness_id.clone());
        }
        Ok(())
    }

    pub fn mark_verified(&mut self, entry_id: &str) -> Result<(), LedgerError> {
        self.entry_mut(entry_id)?.verified = true;
        Ok(())
    }

    // ── Verification ────────────────────────────────────────────────────

    /// Check one entry's hash, payload-derived ids and (when present) signature.
    pub fn verify_entry(&self, entry: &LedgerEntry) -> Result<(), String> {
        if entry.compute_hash() != entry.hash {
            return Err("hash mismatch".into());
        }
        let payload = LedgerPayload::decode(entry.entry_type, &entry.data)
            .map_err(|e| format!("undecodable payload: {e}"))?;
        let related = payload.related_ids();
        if related.task_id != entry.task_id || related.target_node_id != entry.target_node_id {
            return Err("indexed ids do not match payload".into());
        }
        if let Some(verifier) = &self.verifier {
            if entry.is_signed() {
                let signature =
                    hex::decode(&entry.signature).map_err(|_| "signature is not hex".to_string())?;
                if !verifier.verify(&entry.node_id, entry.hash.as_bytes(), &signature) {
                    return Err(format!("bad signature for {}", entry.node_id));
                }
            }
        }
        Ok(())
    }

    /// Walk the whole chain, stopping at the first broken link or entry.
    pub fn verify_chain(&self) -> ChainVerification {
        let mut prev_hash: &str = GENESIS_HASH;
        for (index, entry) in self.entries.iter().enumerate() {
            if entry.prev_hash != prev_hash {
                return ChainVerification::Broken {
                    index,
                    reason: "previous hash does not link".into(),
                };
            }
            if let Err(reason) = self.verify_entry(entry) {
                return ChainVerification::Broken { index, reason };
            }
            prev_hash = entry.hash.as_str();
        }
        ChainVerification::Valid {
            entries: self.entries.len(),
        }
    }

    // ── Queries ─────────────────────────────────────────────────────────

    pub fn get_entry(&self, entry_id: &str) -> Result<&LedgerEntry, LedgerError> {
        self.by_id
            .get(entry_id)
            .map(|&i| &self.entries[i])
            .ok_or_else(|| LedgerError::EntryNotFound(entry_id.to_string()))
    }

    /// Entries authored by or targeting `node_id`, oldest first.
    pub fn node_entries(&self, node_id: &NodeId) -> Vec<&LedgerEntry> {
        self.positions(self.by_node.get(node_id))
    }

    pub fn task_entries(&self, task_id: &str) -> Vec<&LedgerEntry> {
        self.positions(self.by_task.get(task_id))
    }

    pub fn entries_by_type(&self, entry_type: EntryType) -> Vec<&LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| e.entry_type == entry_type)
            .collect()
    }

    /// Entries with `start <= timestamp <= end`.
    pub fn entries_in_range(&self, start: Timestamp, end: Timestamp) -> Vec<&LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .collect()
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn latest_entry(&self) -> Option<&LedgerEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> LedgerStats {
        let mut by_type = BTreeMap::new();
        for entry in &self.entries {
            *by_type.entry(entry.entry_type).or_default() += 1;
        }
        LedgerStats {
            total_entries: self.entries.len(),
            unique_nodes: self.by_node.len(),
            unique_tasks: self.by_task.len(),
            verified_entries: self.entries.iter().filter(|e| e.verified).count(),
            by_type,
        }
    }

    // ── Snapshots ───────────────────────────────────────────────────────

    pub fn export_state(&self) -> Vec<LedgerEntry> {
        self.entries.clone()
    }

    /// Replace all entries and rebuild the indices. The chain itself is not
    /// checked here; call [`verify_chain`](Self::verify_chain) afterwards.
    pub fn import_state(&mut self, entries: Vec<LedgerEntry>) -> Result<(), LedgerError> {
        let mut seen = std::collections::HashSet::with_capacity(entries.len());
        if let Some(dup) = entries.iter().find(|e| !seen.insert(e.id.as_str())) {
            return Err(LedgerError::InvalidSnapshot(format!(
                "duplicate entry id {}",
                dup.id
            )));
        }
        self.entries.clear();
        self.by_id.clear();
        self.by_node.clear();
        self.by_task.clear();
        for entry in entries {
            self.push_indexed(entry);
        }
        tracing::info!(entries = self.entries.len(), "ledger imported");
        Ok(())
    }

    pub fn export_json(&self) -> Result<String, LedgerError> {
        Ok(serde_json::to_string(&self.entries)?)
    }

    pub fn import_json(&mut self, json: &str) -> Result<(), LedgerError> {
        let entries: Vec<LedgerEntry> = serde_json::from_str(json)?;
        self.import_state(entries)
    }

    // ── Internals ───────────────────────────────────────────────────────

    fn push_indexed(&mut self, entry: LedgerEntry) {
        let position = self.entries.len();
        self.by_id.insert(entry.id.clone(), position);
        self.by_node
            .entry(entry.node_id.clone())
            .or_default()
            .push(position);
        if let Some(target) = &entry.target_node_id {
            if target != &entry.node_id {
                self.by_node.entry(target.clone()).or_default().push(position);
            }
        }
        if let Some(task) = &entry.task_id {
            self.by_task.entry(task.clone()).or_default().push(position);
        }
        self.entries.push(entry);
    }

    fn entry_mut(&mut self, entry_id: &str) -> Result<&mut LedgerEntry, LedgerError> {
        let position = *self
            .by_id
            .get(entry_id)
            .ok_or_else(|| LedgerError::EntryNotFound(entry_id.to_string()))?;
        Ok(&mut self.entries[position])
    }

    fn positions(&self, positions: Option<&Vec<usize>>) -> Vec<&LedgerEntry> {
        positions
            .into_iter()
            .flatten()
            .map(|&i| &self.entries[i])
            .collect()
    }
}
