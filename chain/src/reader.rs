//! Read-only contract calls.

use stakeview_types::{Address, Amount, ContractInfo, UserDetails};

use crate::abi::{self, Decoder, Token, Word};
use crate::error::ChainError;
use crate::rpc::{RpcClient, RpcError};

const BALANCE_OF: &str = "balanceOf(address)";
const ALLOWANCE: &str = "allowance(address,address)";
const TOTAL_STAKED: &str = "totalStaked()";
const CURRENT_REWARD_RATE: &str = "currentRewardRate()";
const MIN_LOCK_DURATION: &str = "minLockDuration()";
const EMERGENCY_WITHDRAW_PENALTY: &str = "emergencyWithdrawPenalty()";
const INITIAL_APR: &str = "initialApr()";
const APR_REDUCTION_PER_THOUSAND: &str = "aprReductionPerThousand()";
const PAUSED: &str = "paused()";
const GET_USER_DETAILS: &str = "getUserDetails(address)";
const GET_PENDING_REWARDS: &str = "getPendingRewards(address)";
const GET_TIME_UNTIL_UNLOCK: &str = "getTimeUntilUnlock(address)";

/// Typed read access to the token and staking contracts.
///
/// Calls are independent; callers that combine several results join them
/// and only use the combination once all have resolved.
#[allow(async_fn_in_trait)]
pub trait ChainReader {
    async fn token_balance(&self, owner: &Address) -> Result<Amount, ChainError>;

    async fn token_allowance(&self, owner: &Address, spender: &Address)
        -> Result<Amount, ChainError>;

    async fn contract_info(&self) -> Result<ContractInfo, ChainError>;

    async fn user_details(&self, user: &Address) -> Result<UserDetails, ChainError>;

    async fn pending_rewards(&self, user: &Address) -> Result<Amount, ChainError>;

    /// Seconds until the user's stake unlocks.
    async fn time_until_unlock(&self, user: &Address) -> Result<u64, ChainError>;
}

/// [`ChainReader`] backed by `eth_call`.
#[derive(Clone)]
pub struct RpcChainReader {
    rpc: RpcClient,
    staking_contract: Address,
    token_contract: Address,
}

impl RpcChainReader {
    pub fn new(rpc: RpcClient, staking_contract: Address, token_contract: Address) -> Self {
        Self {
            rpc,
            staking_contract,
            token_contract,
        }
    }

    pub fn staking_contract(&self) -> Address {
        self.staking_contract
    }

    /// Call `signature` on `contract` with `args` and return the raw result words.
    pub async fn call(
        &self,
        contract: &Address,
        signature: &str,
        args: &[Token],
    ) -> Result<Vec<Word>, ChainError> {
        let data = abi::encode_call(signature, args);
        let output = self
            .rpc
            .call(None, contract, &data, "latest")
            .await
            .map_err(RpcError::into_read_error)?;
        abi::words(&output)
    }

    async fn call_one<T>(
        &self,
        contract: &Address,
        signature: &str,
        args: &[Token],
        decode: impl FnOnce(&Decoder<'_>) -> Result<T, ChainError>,
    ) -> Result<T, ChainError> {
        let words = self.call(contract, signature, args).await?;
        let decoder = Decoder::new(&words, 1, signature)?;
        decode(&decoder)
    }

    async fn staking_amount(&self, signature: &str) -> Result<Amount, ChainError> {
        self.call_one(&self.staking_contract, signature, &[], |d| d.amount(0))
            .await
    }

    async fn staking_u64(&self, signature: &str) -> Result<u64, ChainError> {
        self.call_one(&self.staking_contract, signature, &[], |d| d.u64(0))
            .await
    }
}

impl ChainReader for RpcChainReader {
    async fn token_balance(&self, owner: &Address) -> Result<Amount, ChainError> {
        self.call_one(&self.token_contract, BALANCE_OF, &[(*owner).into()], |d| {
            d.amount(0)
        })
        .await
    }

    async fn token_allowance(
        &self,
        owner: &Address,
        spender: &Address,
    ) -> Result<Amount, ChainError> {
        self.call_one(
            &self.token_contract,
            ALLOWANCE,
            &[(*owner).into(), (*spender).into()],
            |d| d.amount(0),
        )
        .await
    }

    async fn contract_info(&self) -> Result<ContractInfo, ChainError> {
        let (
            total_staked,
            current_reward_rate,
            min_lock_duration,
            emergency_withdraw_penalty,
            initial_apr,
            apr_reduction_per_thousand,
            paused,
        ) = tokio::try_join!(
            self.staking_amount(TOTAL_STAKED),
            self.call_one(&self.staking_contract, CURRENT_REWARD_RATE, &[], |d| d.uint(0)),
            self.staking_u64(MIN_LOCK_DURATION),
            self.staking_u64(EMERGENCY_WITHDRAW_PENALTY),
            self.staking_amount(INITIAL_APR),
            self.staking_amount(APR_REDUCTION_PER_THOUSAND),
            self.call_one(&self.staking_contract, PAUSED, &[], |d| d.bool(0)),
        )?;

        Ok(ContractInfo {
            total_staked,
            current_reward_rate,
            min_lock_duration,
            emergency_withdraw_penalty,
            initial_apr,
            apr_reduction_per_thousand,
            paused,
        })
    }

    async fn user_details(&self, user: &Address) -> Result<UserDetails, ChainError> {
        let words = self
            .call(&self.staking_contract, GET_USER_DETAILS, &[(*user).into()])
            .await?;
        let d = Decoder::new(&words, 5, GET_USER_DETAILS)?;
        Ok(UserDetails {
            staked_amount: d.amount(0)?,
            last_stake_timestamp: d.timestamp(1)?,
            pending_rewards: d.amount(2)?,
            time_until_unlock: d.u64(3)?,
            can_withdraw: d.bool(4)?,
        })
    }

    async fn pending_rewards(&self, user: &Address) -> Result<Amount, ChainError> {
        self.call_one(
            &self.staking_contract,
            GET_PENDING_REWARDS,
            &[(*user).into()],
            |d| d.amount(0),
        )
        .await
    }

    async fn time_until_unlock(&self, user: &Address) -> Result<u64, ChainError> {
        self.call_one(
            &self.staking_contract,
            GET_TIME_UNTIL_UNLOCK,
            &[(*user).into()],
            |d| d.u64(0),
        )
        .await
    }
}
