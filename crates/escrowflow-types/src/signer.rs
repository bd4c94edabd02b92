//! Opaque signing capability.
//!
//! Key custody lives outside the orchestrator: it only ever sees a
//! [`TransactionSigner`] borrowed for the duration of one call.

use ed25519_dalek::{Signer as _, SigningKey};

use crate::{Address, Signature};

/// Something that can sign transaction messages on behalf of an address.
pub trait TransactionSigner: Send + Sync {
    /// The address whose signature this signer produces.
    fn address(&self) -> Address;

    /// Sign the canonical message bytes of a transaction.
    fn sign_message(&self, message: &[u8]) -> Signature;
}

/// An in-memory ed25519 keypair. Used for parties in local runs and for
/// freshly generated asset-class accounts, which must co-sign their creation.
pub struct Keypair(SigningKey);

impl Keypair {
    #[must_use]
    pub fn generate() -> Self {
        Self(SigningKey::generate(&mut rand::rngs::OsRng))
    }

    #[must_use]
    pub fn from_secret_bytes(secret: [u8; 32]) -> Self {
        Self(SigningKey::from_bytes(&secret))
    }

    #[must_use]
    pub fn address(&self) -> Address {
        Address::new(self.0.verifying_key().to_bytes())
    }
}

impl TransactionSigner for Keypair {
    fn address(&self) -> Address {
        Keypair::address(self)
    }

    fn sign_message(&self, message: &[u8]) -> Signature {
        Signature(self.0.sign(message).to_bytes())
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Keypair({})", self.address().short())
    }
}

/// A party's wallet as the orchestrator sees it: either connected with a
/// signer, or not connected at all.
///
/// Any [`TransactionSigner`] can back a connected wallet, so keys may live
/// in memory, behind a remote signing service or on a hardware device.
#[derive(Default)]
pub struct Wallet {
    signer: Option<Box<dyn TransactionSigner>>,
}

impl Wallet {
    #[must_use]
    pub fn connected(signer: impl TransactionSigner + 'static) -> Self {
        Self {
            signer: Some(Box::new(signer)),
        }
    }

    #[must_use]
    pub fn disconnected() -> Self {
        Self { signer: None }
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.signer.is_some()
    }

    #[must_use]
    pub fn address(&self) -> Option<Address> {
        self.signer().map(TransactionSigner::address)
    }

    /// The signing capability, if connected.
    #[must_use]
    pub fn signer(&self) -> Option<&dyn TransactionSigner> {
        self.signer.as_deref()
    }
}

impl std::fmt::Debug for Wallet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.address() {
            Some(address) => write!(f, "Wallet({})", address.short()),
            None => f.write_str("Wallet(disconnected)"),
        }
    }
}

/// Check an ed25519 signature against an address used as a public key.
#[must_use]
pub fn verify_signature(address: &Address, message: &[u8], signature: &Signature) -> bool {
    use ed25519_dalek::{Verifier as _, VerifyingKey};

    let Ok(key) = VerifyingKey::from_bytes(address.as_bytes()) else {
        return false;
    };
    key.verify(message, &ed25519_dalek::Signature::from_bytes(signature.as_bytes()))
        .is_ok()
}
