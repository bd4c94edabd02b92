//! Program-derived addresses.
//!
//! A derived address is `sha256(seed_0 || .. || seed_n || program_id ||
//! "ProgramDerivedAddress")`, accepted only if the digest does **not** decode
//! to a point on the ed25519 curve. Off-curve addresses have no private key,
//! so only the owning program can authorize on their behalf.
//!
//! [`find_program_address`] walks the bump seed from 255 down to 0 and returns
//! the first off-curve result.

use ed25519_dalek::VerifyingKey;
use escrowflow_types::{Address, EscrowFlowError, Result, constants};
use sha2::{Digest, Sha256};

/// Whether `address` decodes to a valid ed25519 point (i.e. could have a
/// private key).
#[must_use]
pub fn is_on_curve(address: &Address) -> bool {
    VerifyingKey::from_bytes(address.as_bytes()).is_ok()
}

fn check_seeds(seeds: &[&[u8]], max_count: usize) -> Result<()> {
    if seeds.len() > max_count {
        return Err(EscrowFlowError::InvalidSeeds {
            reason: format!("{} seeds exceeds limit of {max_count}", seeds.len()),
        });
    }
    if let Some(seed) = seeds.iter().find(|s| s.len() > constants::MAX_SEED_LEN) {
        return Err(EscrowFlowError::InvalidSeeds {
            reason: format!(
                "seed of {} bytes exceeds limit of {}",
                seed.len(),
                constants::MAX_SEED_LEN
            ),
        });
    }
    Ok(())
}

fn hash_seeds(seeds: &[&[u8]], program_id: &Address) -> Address {
    let mut hasher = Sha256::new();
    for seed in seeds {
        hasher.update(seed);
    }
    hasher.update(program_id.as_bytes());
    hasher.update(constants::PDA_MARKER);
    Address::new(hasher.finalize().into())
}

/// Derive the address for an exact seed list (bump included).
///
/// # Errors
/// [`EscrowFlowError::InvalidSeeds`] if the seeds exceed the limits or the
/// digest lands on the curve.
pub fn create_program_address(seeds: &[&[u8]], program_id: &Address) -> Result<Address> {
    check_seeds(seeds, constants::MAX_SEEDS)?;
    let address = hash_seeds(seeds, program_id);
    if is_on_curve(&address) {
        return Err(EscrowFlowError::InvalidSeeds {
            reason: "derived address is on curve".into(),
        });
    }
    Ok(address)
}

/// Find the canonical derived address and its bump.
///
/// # Errors
/// [`EscrowFlowError::InvalidSeeds`] if the seeds exceed the limits (one slot
/// is reserved for the bump), [`EscrowFlowError::NoViableBump`] if every bump
/// lands on the curve.
pub fn find_program_address(seeds: &[&[u8]], program_id: &Address) -> Result<(Address, u8)> {
    check_seeds(seeds, constants::MAX_SEEDS - 1)?;
    for bump in (0..=u8::MAX).rev() {
        let bump_seed = [bump];
        let mut with_bump = seeds.to_vec();
        with_bump.push(&bump_seed);
        let address = hash_seeds(&with_bump, program_id);
        if !is_on_curve(&address) {
            return Ok((address, bump));
        }
    }
    Err(EscrowFlowError::NoViableBump(*program_id))
}
