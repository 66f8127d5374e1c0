// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use crate::common::error::AppError;
use crate::infrastructure::network::endpoint::ChainEndpoint;
use alloy::primitives::{Address, B256, U256, keccak256};
use alloy::signers::local::PrivateKeySigner;
use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Default)]
struct AccountState {
    next_nonce: u64,
    balance: U256,
}

/// A signing account with a locally cached nonce and balance.
///
/// The cache is authoritative between syncs: nonces are handed out from
/// `reserve_nonce` and the balance moves with confirmed spends and top-ups.
pub struct Account {
    address: Address,
    signer: PrivateKeySigner,
    chain_id: u64,
    state: Mutex<AccountState>,
}

impl Account {
    pub fn new(signer: PrivateKeySigner, chain_id: u64) -> Self {
        Self {
            address: signer.address(),
            signer,
            chain_id,
            state: Mutex::new(AccountState::default()),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Returns the next nonce and advances the allocation point.
    pub fn reserve_nonce(&self) -> u64 {
        let mut state = self.lock_state();
        let nonce = state.next_nonce;
        state.next_nonce += 1;
        nonce
    }

    pub fn next_nonce(&self) -> u64 {
        self.lock_state().next_nonce
    }

    pub fn balance(&self) -> U256 {
        self.lock_state().balance
    }

    /// Subtracts a confirmed spend; saturates at zero rather than wrapping.
    pub fn debit(&self, amount: U256) -> U256 {
        let mut state = self.lock_state();
        state.balance = state.balance.saturating_sub(amount);
        state.balance
    }

    pub fn credit(&self, amount: U256) -> U256 {
        let mut state = self.lock_state();
        state.balance = state.balance.saturating_add(amount);
        state.balance
    }

    pub fn set_state(&self, next_nonce: u64, balance: U256) {
        let mut state = self.lock_state();
        state.next_nonce = next_nonce;
        state.balance = balance;
    }

    /// Reads pending nonce and balance from the chain and overwrites the cache.
    pub async fn sync(&self, endpoint: &dyn ChainEndpoint) -> Result<(), AppError> {
        let nonce = endpoint.nonce_of(self.address).await?;
        let balance = endpoint.balance_of(self.address).await?;
        self.set_state(nonce, balance);
        tracing::debug!(
            target: "wallet",
            address = %self.address,
            nonce,
            balance = %balance,
            rpc = %endpoint.name(),
            "Account synced"
        );
        Ok(())
    }

    /// Re-reads only the nonce, e.g. after a send failure left a gap.
    pub async fn resync_nonce(&self, endpoint: &dyn ChainEndpoint) -> Result<u64, AppError> {
        let nonce = endpoint.nonce_of(self.address).await?;
        self.lock_state().next_nonce = nonce;
        tracing::info!(target: "wallet", address = %self.address, nonce, "Nonce resynced");
        Ok(nonce)
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, AccountState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("Account")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("next_nonce", &state.next_nonce)
            .field("balance", &state.balance)
            .finish()
    }
}

/// Derives worker key `index` from the funding key and a run seed.
/// The same (key, seed, index) always yields the same account.
pub fn derive_worker_signer(
    root: &PrivateKeySigner,
    seed: &str,
    index: u64,
) -> Result<PrivateKeySigner, AppError> {
    let mut material = Vec::with_capacity(32 + seed.len() + 8);
    material.extend_from_slice(root.to_bytes().as_slice());
    material.extend_from_slice(seed.as_bytes());
    material.extend_from_slice(&index.to_be_bytes());
    let key: B256 = keccak256(material);
    PrivateKeySigner::from_bytes(&key)
        .map_err(|e| AppError::Signing(format!("Worker key {index} derivation failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn signer(byte: u8) -> PrivateKeySigner {
        PrivateKeySigner::from_bytes(&B256::repeat_byte(byte)).unwrap()
    }

    #[test]
    fn debit_saturates_and_credit_adds() {
        let account = Account::new(signer(0x11), 1337);
        account.set_state(0, U256::from(100u64));
        assert_eq!(account.debit(U256::from(30u64)), U256::from(70u64));
        assert_eq!(account.credit(U256::from(5u64)), U256::from(75u64));
        assert_eq!(account.debit(U256::from(1_000u64)), U256::ZERO);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_nonce_reservations_are_unique_and_gapless() {
        let account = Arc::new(Account::new(signer(0x22), 1337));
        account.set_state(40, U256::ZERO);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let account = account.clone();
            handles.push(tokio::spawn(async move {
                let mut got = Vec::with_capacity(250);
                for _ in 0..250 {
                    got.push(account.reserve_nonce());
                    tokio::task::yield_now().await;
                }
                got
            }));
        }

        let mut all = Vec::new();
        for handle in handles {
            let per_task = handle.await.unwrap();
            assert!(per_task.windows(2).all(|w| w[0] < w[1]));
            all.extend(per_task);
        }
        let unique: HashSet<u64> = all.iter().copied().collect();
        assert_eq!(unique.len(), 2_000);
        all.sort_unstable();
        assert_eq!(all.first(), Some(&40));
        assert_eq!(all.last(), Some(&2_039));
        assert_eq!(account.next_nonce(), 2_040);
    }

    #[test]
    fn worker_derivation_is_stable_and_seed_dependent() {
        let root = signer(0x33);
        let a = derive_worker_signer(&root, "seed", 0).unwrap();
        let again = derive_worker_signer(&root, "seed", 0).unwrap();
        let next = derive_worker_signer(&root, "seed", 1).unwrap();
        let other_seed = derive_worker_signer(&root, "other", 0).unwrap();
        assert_eq!(a.address(), again.address());
        assert_ne!(a.address(), next.address());
        assert_ne!(a.address(), other_seed.address());
        assert_ne!(a.address(), root.address());
    }
}
