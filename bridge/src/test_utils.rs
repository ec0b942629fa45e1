// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Shared fakes for unit tests: a programmable block source, a recording
//! observer, and stub implementations of the chain-facing traits.

use crate::error::{BridgeError, BridgeResult};
use crate::eth_client::{MintReceipt, WncgMinter};
use crate::monitor::{BlockSource, EventObserver};
use crate::ncg_transfer::NcgTransfer;
use crate::nine_client::NineNode;
use crate::remote_signer::TxSigner;
use crate::types::{BridgeEvent, EventEnvelope, NcgAddress, NcgAmount, NcgTransferredEvent};
use async_trait::async_trait;
use ethers::types::{Address as EthAddress, H256, U256};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

// ============================================================================
// Monitor fakes
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestEvent {
    pub tx_id: String,
    pub block: u64,
}

impl BridgeEvent for TestEvent {
    fn tx_id(&self) -> String {
        self.tx_id.clone()
    }
}

/// Block source backed by a hash map of pre-seeded blocks.
pub struct MockSource {
    tip: AtomicU64,
    blocks: Mutex<HashMap<u64, (String, Vec<TestEvent>)>>,
    by_hash: Mutex<HashMap<String, u64>>,
}

impl MockSource {
    pub fn new(tip: u64) -> Self {
        Self {
            tip: AtomicU64::new(tip),
            blocks: Mutex::new(HashMap::new()),
            by_hash: Mutex::new(HashMap::new()),
        }
    }

    pub fn put_block(&self, index: u64, hash: &str, events: Vec<TestEvent>) {
        self.blocks
            .lock()
            .unwrap()
            .insert(index, (hash.to_string(), events));
        self.by_hash.lock().unwrap().insert(hash.to_string(), index);
    }

    pub fn set_tip(&self, tip: u64) {
        self.tip.store(tip, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlockSource for MockSource {
    type Event = TestEvent;

    fn name(&self) -> &'static str {
        "mock"
    }

    async fn tip_index(&self) -> BridgeResult<u64> {
        Ok(self.tip.load(Ordering::SeqCst))
    }

    async fn block_hash(&self, index: u64) -> BridgeResult<String> {
        self.blocks
            .lock()
            .unwrap()
            .get(&index)
            .map(|(hash, _)| hash.clone())
            .ok_or_else(|| BridgeError::ProviderError(format!("no block at {}", index)))
    }

    async fn block_index(&self, block_hash: &str) -> BridgeResult<u64> {
        self.by_hash
            .lock()
            .unwrap()
            .get(block_hash)
            .copied()
            .ok_or_else(|| BridgeError::ProviderError(format!("unknown block {}", block_hash)))
    }

    async fn events_in(&self, index: u64) -> BridgeResult<Vec<TestEvent>> {
        Ok(self
            .blocks
            .lock()
            .unwrap()
            .get(&index)
            .map(|(_, events)| events.clone())
            .unwrap_or_default())
    }
}

/// Observer that remembers every envelope it is handed.
#[derive(Default)]
pub struct RecordingObserver {
    seen: Mutex<Vec<EventEnvelope<TestEvent>>>,
}

impl RecordingObserver {
    pub fn envelopes(&self) -> Vec<EventEnvelope<TestEvent>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventObserver<TestEvent> for RecordingObserver {
    async fn observe(&self, envelope: &EventEnvelope<TestEvent>) -> BridgeResult<()> {
        self.seen.lock().unwrap().push(envelope.clone());
        Ok(())
    }
}

#[async_trait]
impl EventObserver<TestEvent> for Arc<RecordingObserver> {
    async fn observe(&self, envelope: &EventEnvelope<TestEvent>) -> BridgeResult<()> {
        self.as_ref().observe(envelope).await
    }
}

// ============================================================================
// Chain-N fakes
// ============================================================================

/// Programmable node for the transfer path: builds deterministic unsigned
/// bytes, records staged payloads and can be told to refuse or fail
/// staging. Tracks how many unsigned-tx builds overlap.
pub struct FakeNineNode {
    name: String,
    staged: Mutex<Vec<String>>,
    refuse_stage: AtomicBool,
    fail_stage: AtomicBool,
    builds_in_flight: AtomicUsize,
    pub max_concurrent_builds: AtomicUsize,
    next_nonce: AtomicU64,
}

impl FakeNineNode {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            staged: Mutex::new(Vec::new()),
            refuse_stage: AtomicBool::new(false),
            fail_stage: AtomicBool::new(false),
            builds_in_flight: AtomicUsize::new(0),
            max_concurrent_builds: AtomicUsize::new(0),
            next_nonce: AtomicU64::new(0),
        }
    }

    pub fn refuse_staging(&self) {
        self.refuse_stage.store(true, Ordering::SeqCst);
    }

    pub fn fail_staging(&self) {
        self.fail_stage.store(true, Ordering::SeqCst);
    }

    pub fn staged_payloads(&self) -> Vec<String> {
        self.staged.lock().unwrap().clone()
    }
}

#[async_trait]
impl NineNode for FakeNineNode {
    fn endpoint(&self) -> &str {
        &self.name
    }

    async fn tip_index(&self) -> BridgeResult<u64> {
        Ok(0)
    }

    async fn block_hash(&self, index: u64) -> BridgeResult<String> {
        Ok(format!("fake-hash-{}", index))
    }

    async fn block_index(&self, block_hash: &str) -> BridgeResult<u64> {
        Err(BridgeError::ProviderError(format!(
            "unknown block {}",
            block_hash
        )))
    }

    async fn transfer_events(
        &self,
        _block_hash: &str,
        _recipient: &NcgAddress,
    ) -> BridgeResult<Vec<NcgTransferredEvent>> {
        Ok(vec![])
    }

    async fn create_unsigned_transaction(
        &self,
        plain_value_base64: &str,
        public_key_base64: &str,
    ) -> BridgeResult<Vec<u8>> {
        let in_flight = self.builds_in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_concurrent_builds
            .fetch_max(in_flight, Ordering::SeqCst);
        // keep the build window open long enough for overlapping callers to
        // show up as concurrency
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        self.builds_in_flight.fetch_sub(1, Ordering::SeqCst);

        let nonce = self.next_nonce.fetch_add(1, Ordering::SeqCst);
        let mut unsigned = nonce.to_be_bytes().to_vec();
        unsigned.extend_from_slice(plain_value_base64.as_bytes());
        unsigned.extend_from_slice(public_key_base64.as_bytes());
        Ok(unsigned)
    }

    async fn attach_signature(
        &self,
        unsigned_tx: &[u8],
        signature: &[u8],
    ) -> BridgeResult<Vec<u8>> {
        let mut signed = unsigned_tx.to_vec();
        signed.extend_from_slice(signature);
        Ok(signed)
    }

    async fn stage_transaction(&self, signed_tx_base64: &str) -> BridgeResult<bool> {
        if self.fail_stage.load(Ordering::SeqCst) {
            return Err(BridgeError::TransientProviderError(format!(
                "{} is unreachable",
                self.name
            )));
        }
        if self.refuse_stage.load(Ordering::SeqCst) {
            return Ok(false);
        }
        self.staged
            .lock()
            .unwrap()
            .push(signed_tx_base64.to_string());
        Ok(true)
    }
}

/// Signer answering with a hash-derived signature for a fixed address.
pub struct FakeSigner {
    address: NcgAddress,
}

impl FakeSigner {
    pub fn new(address: NcgAddress) -> Self {
        Self { address }
    }
}

#[async_trait]
impl TxSigner for FakeSigner {
    async fn public_key(&self) -> BridgeResult<Vec<u8>> {
        Ok(vec![0x02; 33])
    }

    async fn address(&self) -> BridgeResult<NcgAddress> {
        Ok(self.address)
    }

    async fn sign(&self, unsigned_tx: &[u8]) -> BridgeResult<Vec<u8>> {
        Ok(Sha256::digest(unsigned_tx).to_vec())
    }
}

// ============================================================================
// Counter-chain fakes for observer tests
// ============================================================================

#[derive(Default)]
pub struct FakeMinter {
    minted: Mutex<Vec<(EthAddress, U256)>>,
    fail_next: AtomicBool,
}

impl FakeMinter {
    pub fn minted(&self) -> Vec<(EthAddress, U256)> {
        self.minted.lock().unwrap().clone()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl WncgMinter for FakeMinter {
    async fn mint(&self, recipient: EthAddress, amount: U256) -> BridgeResult<MintReceipt> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(BridgeError::ProviderError("mint reverted".into()));
        }
        let mut minted = self.minted.lock().unwrap();
        minted.push((recipient, amount));
        Ok(MintReceipt {
            tx_hash: H256::repeat_byte(minted.len() as u8),
            block_number: 100 + minted.len() as u64,
        })
    }
}

#[derive(Default)]
pub struct FakeTransfer {
    transfers: Mutex<Vec<(NcgAddress, NcgAmount, Option<String>)>>,
    fail_next: AtomicBool,
}

impl FakeTransfer {
    pub fn transfers(&self) -> Vec<(NcgAddress, NcgAmount, Option<String>)> {
        self.transfers.lock().unwrap().clone()
    }

    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl NcgTransfer for FakeTransfer {
    async fn transfer(
        &self,
        recipient: NcgAddress,
        amount: NcgAmount,
        memo: Option<String>,
    ) -> BridgeResult<String> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(BridgeError::StageFailed("all endpoints down".into()));
        }
        let mut transfers = self.transfers.lock().unwrap();
        transfers.push((recipient, amount, memo));
        Ok(format!("{:064x}", transfers.len()))
    }
}
