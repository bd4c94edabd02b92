//! Submission history: processed-signature cache and the submission log.
//!
//! A signature can land at most once. The cache and the log are both bounded
//! with FIFO eviction so a long-running local ledger keeps predictable memory.

use std::collections::{HashSet, VecDeque};

use escrowflow_types::{Blockhash, Signature, TransactionError};

use super::faults::InstructionKind;

/// Signatures that have landed (or were accepted and expired).
#[derive(Debug, Clone)]
pub(crate) struct ProcessedSignatures {
    seen: HashSet<Signature>,
    order: VecDeque<Signature>,
    max_size: usize,
}

impl ProcessedSignatures {
    pub fn new(max_size: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(max_size),
            order: VecDeque::with_capacity(max_size),
            max_size: max_size.max(1),
        }
    }

    /// Cache `signature`, returning the entry evicted to make room.
    ///
    /// # Errors
    /// [`TransactionError::AlreadyProcessed`] if `signature` is already cached.
    pub fn mark(&mut self, signature: Signature) -> Result<Option<Signature>, TransactionError> {
        if self.seen.contains(&signature) {
            return Err(TransactionError::AlreadyProcessed);
        }
        let mut evicted = None;
        if self.seen.len() >= self.max_size {
            evicted = self.order.pop_front();
            if let Some(oldest) = &evicted {
                self.seen.remove(oldest);
            }
        }
        self.seen.insert(signature);
        self.order.push_back(signature);
        Ok(evicted)
    }

    pub fn contains(&self, signature: &Signature) -> bool {
        self.seen.contains(signature)
    }
}

/// How a submission ended from the node's point of view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// Executed and committed.
    Committed,
    /// Landed with an error (preflight skipped); fee charged, state unchanged.
    FailedOnLedger(TransactionError),
    /// Rejected by simulation; nothing landed.
    PreflightRejected(TransactionError),
    /// Refused before simulation (bad signature, stale blockhash, duplicate,
    /// or an injected rejection).
    Refused(String),
    /// Accepted but never landed.
    Expired,
}

/// One entry of the submission log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub signature: Option<Signature>,
    /// Blockhash the transaction was signed against.
    pub recent_blockhash: Blockhash,
    /// Kind of each instruction, in order.
    pub kinds: Vec<Option<InstructionKind>>,
    pub outcome: SubmissionOutcome,
    /// The transaction landed but its confirmation is withheld.
    pub confirmation_dropped: bool,
}

impl SubmissionRecord {
    #[must_use]
    pub fn contains(&self, kind: InstructionKind) -> bool {
        self.kinds.contains(&Some(kind))
    }

    /// Whether the transaction changed ledger state.
    #[must_use]
    pub fn committed(&self) -> bool {
        self.outcome == SubmissionOutcome::Committed
    }
}

/// Most recent submissions, oldest evicted first.
#[derive(Debug, Clone)]
pub(crate) struct SubmissionLog {
    records: VecDeque<SubmissionRecord>,
    max_size: usize,
}

impl SubmissionLog {
    pub fn new(max_size: usize) -> Self {
        Self {
            records: VecDeque::new(),
            max_size: max_size.max(1),
        }
    }

    pub fn push(&mut self, record: SubmissionRecord) {
        if self.records.len() >= self.max_size {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    pub fn iter(&self) -> impl Iterator<Item = &SubmissionRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }
}
