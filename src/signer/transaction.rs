//! Value-transfer transaction signing
//!
//! Transactions use the legacy format with EIP-155 replay protection: the
//! chain id is part of the signing preimage and of `v`, so a signature is
//! valid on exactly one network.

use crate::crypto::{keccak256, parse_address, Address, KeyPair};
use crate::errors::{Result, WalletError};
use crate::ledger::LedgerClient;
use rlp::RlpStream;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Largest chain id whose EIP-155 `v` (`recid + 35 + 2 * chain_id`) fits in 64 bits
pub const MAX_CHAIN_ID: u64 = (u64::MAX - 36) / 2;

fn u128_to_be_bytes_trimmed(value: u128) -> Vec<u8> {
    if value == 0 {
        return vec![];
    }
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(16);
    bytes[start..].to_vec()
}

fn u64_to_be_bytes_trimmed(value: u64) -> Vec<u8> {
    u128_to_be_bytes_trimmed(value as u128)
}

/// Parse a transfer amount in wei
///
/// Accepts a non-negative decimal integer that fits in 128 bits.
pub fn parse_amount(raw: &str) -> Result<u128> {
    let raw = raw.trim();
    if raw.starts_with('-') {
        return Err(WalletError::InvalidAmount(
            "value must not be negative".to_string(),
        ));
    }
    if raw.is_empty() || !raw.chars().all(|c| c.is_ascii_digit()) {
        return Err(WalletError::InvalidAmount(format!(
            "value {:?} is not a decimal integer",
            raw
        )));
    }
    raw.parse::<u128>()
        .map_err(|_| WalletError::InvalidAmount("value exceeds 128 bits".to_string()))
}

/// A validated transfer request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub to: Address,
    pub value: u128,
}

impl TransferRequest {
    /// Validate the recipient and value. No key or network access happens here.
    pub fn parse(to: &str, value: &str) -> Result<Self> {
        let to = parse_address(to)?;
        let value = parse_amount(value)?;
        Ok(Self { to, value })
    }
}

/// Unsigned legacy transaction bound to a chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyTransaction {
    pub nonce: u64,
    pub gas_price: u128,
    pub gas_limit: u64,
    pub to: Address,
    pub value: u128,
    pub data: Vec<u8>,
    pub chain_id: u64,
}

impl LegacyTransaction {
    /// A plain value transfer with an empty payload
    pub fn transfer(
        nonce: u64,
        gas_price: u128,
        gas_limit: u64,
        request: &TransferRequest,
        chain_id: u64,
    ) -> Self {
        Self {
            nonce,
            gas_price,
            gas_limit,
            to: request.to,
            value: request.value,
            data: Vec::new(),
            chain_id,
        }
    }

    fn append_fields(&self, stream: &mut RlpStream) {
        stream.append(&u64_to_be_bytes_trimmed(self.nonce).as_slice());
        stream.append(&u128_to_be_bytes_trimmed(self.gas_price).as_slice());
        stream.append(&u64_to_be_bytes_trimmed(self.gas_limit).as_slice());
        stream.append(&self.to.as_bytes().as_slice());
        stream.append(&u128_to_be_bytes_trimmed(self.value).as_slice());
        stream.append(&self.data);
    }

    /// RLP encode for signing (EIP-155)
    pub fn rlp_unsigned(&self) -> Vec<u8> {
        let mut stream = RlpStream::new_list(9);
        self.append_fields(&mut stream);
        stream.append(&u64_to_be_bytes_trimmed(self.chain_id).as_slice());
        stream.append_empty_data();
        stream.append_empty_data();
        stream.out().to_vec()
    }

    /// Hash that gets signed
    pub fn signing_hash(&self) -> [u8; 32] {
        keccak256(&self.rlp_unsigned())
    }

    /// Sign with `keypair`, producing an immutable signed transaction
    pub fn sign(self, keypair: &KeyPair) -> Result<SignedTransaction> {
        let signature = keypair.sign_hash(&self.signing_hash())?;
        let v = signature.v_eip155(self.chain_id)?;
        let raw = encode_signed(&self, v, &signature.r, &signature.s);
        let hash = keccak256(&raw);

        Ok(SignedTransaction {
            tx: self,
            v,
            r: signature.r,
            s: signature.s,
            raw,
            hash,
        })
    }
}

fn encode_signed(tx: &LegacyTransaction, v: u64, r: &[u8; 32], s: &[u8; 32]) -> Vec<u8> {
    let mut stream = RlpStream::new_list(9);
    tx.append_fields(&mut stream);
    stream.append(&u64_to_be_bytes_trimmed(v).as_slice());
    // r and s are integers in RLP, so leading zeros are dropped
    stream.append(&trim_leading_zeros(r));
    stream.append(&trim_leading_zeros(s));
    stream.out().to_vec()
}

fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

/// Signed legacy transaction
///
/// Fields are private so the encoding and hash cannot drift from the
/// signature once it has been computed.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    tx: LegacyTransaction,
    v: u64,
    r: [u8; 32],
    s: [u8; 32],
    raw: Vec<u8>,
    hash: [u8; 32],
}

impl SignedTransaction {
    pub fn transaction(&self) -> &LegacyTransaction {
        &self.tx
    }

    pub fn v(&self) -> u64 {
        self.v
    }

    pub fn r(&self) -> &[u8; 32] {
        &self.r
    }

    pub fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// Network encoding, ready for `eth_sendRawTransaction`
    pub fn rlp_signed(&self) -> &[u8] {
        &self.raw
    }

    pub fn tx_hash(&self) -> [u8; 32] {
        self.hash
    }

    pub fn tx_hash_hex(&self) -> String {
        format!("0x{}", hex::encode(self.hash))
    }

    pub fn raw_tx_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }
}

/// Builds, signs and submits transfers using network parameters from a
/// ledger client
pub struct TransactionSigner {
    ledger: Arc<dyn LedgerClient>,
    gas_limit: u64,
    timeout: Duration,
}

impl TransactionSigner {
    pub fn new(ledger: Arc<dyn LedgerClient>, gas_limit: u64, timeout: Duration) -> Self {
        Self {
            ledger,
            gas_limit,
            timeout,
        }
    }

    async fn bounded<T>(&self, what: &str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(WalletError::NetworkUnavailable(msg))) => Err(WalletError::NetworkUnavailable(msg)),
            Ok(Err(other)) => Err(WalletError::NetworkUnavailable(format!("{}: {}", what, other))),
            Err(_) => Err(WalletError::NetworkUnavailable(format!(
                "{} timed out after {:?}",
                what, self.timeout
            ))),
        }
    }

    /// Fetch nonce, gas price and chain id and assemble the unsigned transfer
    pub async fn prepare(&self, from: &Address, request: &TransferRequest) -> Result<LegacyTransaction> {
        let (nonce, gas_price, chain_id) = self
            .bounded("fetching network parameters", async {
                tokio::try_join!(
                    self.ledger.pending_nonce(from),
                    self.ledger.suggested_gas_price(),
                    self.ledger.chain_id(),
                )
            })
            .await?;

        if chain_id > MAX_CHAIN_ID {
            warn!("Ledger reported unusable chain id {}", chain_id);
            return Err(WalletError::NetworkUnavailable(format!(
                "ledger reported chain id {} outside the EIP-155 range",
                chain_id
            )));
        }

        debug!(
            "Network parameters for {}: nonce={}, gas_price={}, chain_id={}",
            from, nonce, gas_price, chain_id
        );

        Ok(LegacyTransaction::transfer(
            nonce,
            gas_price,
            self.gas_limit,
            request,
            chain_id,
        ))
    }

    /// Broadcast a signed transaction. Returns the hash reported by the node.
    pub async fn submit(&self, signed: &SignedTransaction) -> Result<String> {
        match tokio::time::timeout(self.timeout, self.ledger.broadcast(signed.rlp_signed())).await {
            Ok(result) => result,
            Err(_) => Err(WalletError::NetworkUnavailable(format!(
                "broadcast timed out after {:?}",
                self.timeout
            ))),
        }
    }

    /// Prepare, sign and broadcast a transfer from `keypair`
    pub async fn send(&self, keypair: &KeyPair, request: &TransferRequest) -> Result<SignedTransaction> {
        let from = keypair.address();
        let tx = self.prepare(&from, request).await?;
        let signed = tx.sign(keypair)?;

        let reported = self.submit(&signed).await?;
        if !reported.eq_ignore_ascii_case(&signed.tx_hash_hex()) {
            debug!(
                "Node reported hash {} for locally computed {}",
                reported,
                signed.tx_hash_hex()
            );
        }

        info!(
            "Sent transfer from {} to {}: value={}, nonce={}, tx={}",
            from,
            request.to,
            request.value,
            signed.transaction().nonce,
            signed.tx_hash_hex()
        );
        Ok(signed)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Ledger double that records how often it was asked for anything
    pub(crate) struct MockLedger {
        pub nonce: u64,
        pub gas_price: u128,
        pub chain_id: u64,
        pub fail: bool,
        pub calls: AtomicUsize,
        pub broadcasts: Mutex<Vec<Vec<u8>>>,
    }

    impl MockLedger {
        pub(crate) fn new(chain_id: u64) -> Self {
            Self {
                nonce: 9,
                gas_price: 20_000_000_000,
                chain_id,
                fail: false,
                calls: AtomicUsize::new(0),
                broadcasts: Mutex::new(Vec::new()),
            }
        }

        pub(crate) fn failing() -> Self {
            Self {
                fail: true,
                ..Self::new(1)
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn record(&self) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(WalletError::NetworkUnavailable("mock ledger down".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl LedgerClient for MockLedger {
        async fn pending_nonce(&self, _address: &Address) -> Result<u64> {
            self.record()?;
            Ok(self.nonce)
        }

        async fn suggested_gas_price(&self) -> Result<u128> {
            self.record()?;
            Ok(self.gas_price)
        }

        async fn chain_id(&self) -> Result<u64> {
            self.record()?;
            Ok(self.chain_id)
        }

        async fn broadcast(&self, raw_transaction: &[u8]) -> Result<String> {
            self.record()?;
            self.broadcasts.lock().unwrap().push(raw_transaction.to_vec());
            Ok(format!("0x{}", hex::encode(keccak256(raw_transaction))))
        }
    }

    /// Ledger double that never answers
    struct StalledLedger;

    #[async_trait]
    impl LedgerClient for StalledLedger {
        async fn pending_nonce(&self, _address: &Address) -> Result<u64> {
            std::future::pending().await
        }

        async fn suggested_gas_price(&self) -> Result<u128> {
            std::future::pending().await
        }

        async fn chain_id(&self) -> Result<u64> {
            std::future::pending().await
        }

        async fn broadcast(&self, _raw_transaction: &[u8]) -> Result<String> {
            std::future::pending().await
        }
    }

    fn eip155_example() -> LegacyTransaction {
        LegacyTransaction {
            nonce: 9,
            gas_price: 20_000_000_000,
            gas_limit: 21000,
            to: Address::from_bytes([0x35; 20]),
            value: 1_000_000_000_000_000_000,
            data: vec![],
            chain_id: 1,
        }
    }

    #[test]
    fn test_eip155_signing_preimage() {
        // Example from the EIP-155 text
        let tx = eip155_example();
        assert_eq!(
            hex::encode(tx.rlp_unsigned()),
            "ec098504a817c800825208943535353535353535353535353535353535353535880de0b6b3a764000080018080"
        );
        assert_eq!(
            hex::encode(tx.signing_hash()),
            "daf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53"
        );
    }

    #[test]
    fn test_signed_transaction_recovers_sender() {
        let keypair = KeyPair::from_bytes(&[0x46; 32]).unwrap();
        let tx = eip155_example();
        let hash = tx.signing_hash();
        let signed = tx.sign(&keypair).unwrap();

        assert!(signed.v() == 37 || signed.v() == 38);

        let decoded = rlp::Rlp::new(signed.rlp_signed());
        assert_eq!(decoded.item_count().unwrap(), 9);
        let v: u64 = decoded.val_at(6).unwrap();
        assert_eq!(v, signed.v());

        let sig = crate::crypto::RecoverableSignature {
            r: *signed.r(),
            s: *signed.s(),
            v: (v - 35 - 2) as u8,
        };
        assert_eq!(sig.recover_address(&hash).unwrap(), keypair.address());
        assert_eq!(signed.tx_hash(), keccak256(signed.rlp_signed()));
    }

    #[test]
    fn test_signing_is_deterministic() {
        let keypair = KeyPair::from_bytes(&[0x46; 32]).unwrap();
        let a = eip155_example().sign(&keypair).unwrap();
        let b = eip155_example().sign(&keypair).unwrap();
        assert_eq!(a.rlp_signed(), b.rlp_signed());
        assert_eq!(a.tx_hash_hex(), b.tx_hash_hex());
    }

    #[test]
    fn test_chain_id_changes_signature() {
        let keypair = KeyPair::from_bytes(&[0x46; 32]).unwrap();
        let mainnet = eip155_example();
        let goerli = LegacyTransaction {
            chain_id: 5,
            ..eip155_example()
        };

        let a = mainnet.sign(&keypair).unwrap();
        let b = goerli.sign(&keypair).unwrap();
        assert_ne!((a.r(), a.s()), (b.r(), b.s()));
        assert_ne!(a.v(), b.v());
        assert_ne!(a.tx_hash(), b.tx_hash());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("0").unwrap(), 0);
        assert_eq!(parse_amount(" 1000000000000000000 ").unwrap(), 1_000_000_000_000_000_000);
        assert!(matches!(parse_amount("-1"), Err(WalletError::InvalidAmount(_))));
        assert!(matches!(parse_amount("1.5"), Err(WalletError::InvalidAmount(_))));
        assert!(matches!(parse_amount(""), Err(WalletError::InvalidAmount(_))));
        assert!(matches!(parse_amount("+5"), Err(WalletError::InvalidAmount(_))));
        assert!(matches!(
            parse_amount("340282366920938463463374607431768211456"),
            Err(WalletError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_transfer_request_validation() {
        assert!(matches!(
            TransferRequest::parse("0x1234", "1"),
            Err(WalletError::InvalidAddress(_))
        ));
        assert!(matches!(
            TransferRequest::parse("0x3535353535353535353535353535353535353535", "-1"),
            Err(WalletError::InvalidAmount(_))
        ));
        let ok = TransferRequest::parse("0x3535353535353535353535353535353535353535", "5").unwrap();
        assert_eq!(ok.value, 5);
    }

    #[tokio::test]
    async fn test_send_uses_network_parameters() {
        let ledger = Arc::new(MockLedger::new(5));
        let signer = TransactionSigner::new(ledger.clone(), 21000, Duration::from_secs(1));
        let keypair = KeyPair::generate();
        let request = TransferRequest::parse("0x3535353535353535353535353535353535353535", "42").unwrap();

        let signed = signer.send(&keypair, &request).await.unwrap();
        let tx = signed.transaction();
        assert_eq!(tx.nonce, 9);
        assert_eq!(tx.gas_price, 20_000_000_000);
        assert_eq!(tx.chain_id, 5);
        assert_eq!(tx.gas_limit, 21000);
        assert!(tx.data.is_empty());
        assert!(signed.v() == 45 || signed.v() == 46);

        let broadcasts = ledger.broadcasts.lock().unwrap();
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(broadcasts[0], signed.rlp_signed());
    }

    #[tokio::test]
    async fn test_ledger_failure_is_network_unavailable() {
        let ledger = Arc::new(MockLedger::failing());
        let signer = TransactionSigner::new(ledger.clone(), 21000, Duration::from_secs(1));
        let request = TransferRequest::parse("0x3535353535353535353535353535353535353535", "1").unwrap();

        let result = signer.send(&KeyPair::generate(), &request).await;
        assert!(matches!(result, Err(WalletError::NetworkUnavailable(_))));
        assert!(ledger.broadcasts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stalled_ledger_times_out() {
        let signer = TransactionSigner::new(Arc::new(StalledLedger), 21000, Duration::from_millis(50));
        let request = TransferRequest::parse("0x3535353535353535353535353535353535353535", "1").unwrap();

        let result = signer.send(&KeyPair::generate(), &request).await;
        match result {
            Err(WalletError::NetworkUnavailable(msg)) => assert!(msg.contains("timed out")),
            other => panic!("expected timeout, got {:?}", other.map(|s| s.tx_hash_hex())),
        }
    }

    #[tokio::test]
    async fn test_out_of_range_chain_id_is_rejected() {
        let ledger = Arc::new(MockLedger::new(u64::MAX));
        let signer = TransactionSigner::new(ledger.clone(), 21000, Duration::from_secs(1));
        let request = TransferRequest::parse("0x3535353535353535353535353535353535353535", "1").unwrap();

        let result = signer.send(&KeyPair::generate(), &request).await;
        assert!(matches!(result, Err(WalletError::NetworkUnavailable(_))));
        assert!(ledger.broadcasts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_largest_chain_id_signs() {
        let ledger = Arc::new(MockLedger::new(MAX_CHAIN_ID));
        let signer = TransactionSigner::new(ledger.clone(), 21000, Duration::from_secs(1));
        let request = TransferRequest::parse("0x3535353535353535353535353535353535353535", "1").unwrap();

        let signed = signer.send(&KeyPair::generate(), &request).await.unwrap();
        assert!(signed.v() >= MAX_CHAIN_ID * 2 + 35);
    }

    #[test]
    fn test_sign_rejects_overflowing_chain_id() {
        let mut tx = eip155_example();
        tx.chain_id = u64::MAX;
        let keypair = KeyPair::from_bytes(&[0x46; 32]).unwrap();
        assert!(matches!(tx.sign(&keypair), Err(WalletError::SigningFailed(_))));
    }
}
