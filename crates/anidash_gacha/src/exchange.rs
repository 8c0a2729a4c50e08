//! # Shard Exchange
//!
//! Converts shards into roll tokens at a fixed rate, capped per UTC day.
//! The daily counter resets lazily: the first exchange on a new date starts
//! from zero before the cap is checked.

use chrono::NaiveDate;
use serde::Serialize;

use crate::account::GachaAccount;
use crate::config::EconomyConfig;
use crate::error::{Currency, GachaError, GachaResult};
use crate::ledger;

/// Result of an exchange.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExchangeResult {
    /// Tokens bought.
    pub tokens_bought: u64,
    /// Shards charged.
    pub shards_spent: u64,
    /// Tokens held afterwards.
    pub tokens: u64,
    /// Shards held afterwards.
    pub shards: u64,
    /// Exchanges counted today.
    pub daily_exchanges: u32,
    /// Exchanges still allowed today.
    pub remaining_today: u32,
}

/// Buys `count` tokens with shards.
///
/// # Errors
///
/// - `Validation` for `count == 0`, the daily limit, or the token cap
/// - `InsufficientCurrency` if shards don't cover `count * shards_per_token`
pub fn exchange(
    account: &mut GachaAccount,
    count: u32,
    config: &EconomyConfig,
    today: NaiveDate,
) -> GachaResult<ExchangeResult> {
    if count == 0 {
        return Err(GachaError::validation("exchange at least one token"));
    }

    let used = account.exchanges_on(today);
    let after = used
        .checked_add(count)
        .filter(|total| *total <= config.max_tokens_per_day)
        .ok_or_else(|| {
            GachaError::Validation(format!(
                "daily exchange limit reached: {used} of {} used, {count} requested",
                config.max_tokens_per_day
            ))
        })?;

    let tokens_bought = u64::from(count);
    let price = tokens_bought
        .checked_mul(config.shards_per_token)
        .ok_or_else(|| GachaError::BoundsViolation("exchange price overflow".to_string()))?;
    let shards = ledger::debit(account.shards, price, Currency::Shards)?;

    let tokens = ledger::credit_exact(account.tokens, tokens_bought, config.max_tokens, Currency::Tokens)
        .map_err(|_| {
            GachaError::Validation(format!(
                "exchange would exceed the token cap of {}",
                config.max_tokens
            ))
        })?;

    account.shards = shards;
    account.tokens = tokens;
    account.daily_exchanges = after;
    account.last_exchange_date = Some(today);

    Ok(ExchangeResult {
        tokens_bought,
        shards_spent: price,
        tokens,
        shards,
        daily_exchanges: after,
        remaining_today: config.max_tokens_per_day - after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()
    }

    fn account(tokens: u64, shards: u64) -> (GachaAccount, EconomyConfig) {
        let config = EconomyConfig::default();
        let now = Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap();
        let mut account = GachaAccount::new(&config, now);
        account.tokens = tokens;
        account.shards = shards;
        (account, config)
    }

    #[test]
    fn test_exchange_rate() {
        let (mut account, config) = account(0, 500);
        let result = exchange(&mut account, 3, &config, today()).unwrap();
        assert_eq!(result.tokens, 3);
        assert_eq!(result.shards, 350);
        assert_eq!(result.remaining_today, 7);
        assert_eq!(account.last_exchange_date, Some(today()));
    }

    #[test]
    fn test_daily_cap_boundary() {
        let (mut account, config) = account(0, 10_000);
        account.daily_exchanges = 9;
        account.last_exchange_date = Some(today());

        let result = exchange(&mut account, 1, &config, today()).unwrap();
        assert_eq!(result.daily_exchanges, 10);
        assert_eq!(result.remaining_today, 0);

        let before = account.clone();
        assert!(matches!(
            exchange(&mut account, 1, &config, today()),
            Err(GachaError::Validation(_))
        ));
        assert_eq!(account, before);
    }

    #[test]
    fn test_rollover_resets_counter() {
        let (mut account, config) = account(0, 1_000);
        account.daily_exchanges = 10;
        account.last_exchange_date = Some(today());

        let tomorrow = today().succ_opt().unwrap();
        let result = exchange(&mut account, 2, &config, tomorrow).unwrap();
        assert_eq!(result.daily_exchanges, 2);
        assert_eq!(account.last_exchange_date, Some(tomorrow));
    }

    #[test]
    fn test_insufficient_shards() {
        let (mut account, config) = account(0, 99);
        assert!(matches!(
            exchange(&mut account, 2, &config, today()),
            Err(GachaError::InsufficientCurrency { required: 100, available: 99, .. })
        ));
        assert_eq!(account.shards, 99);
        assert_eq!(account.daily_exchanges, 0);
    }

    #[test]
    fn test_zero_and_token_cap() {
        let (mut account, config) = account(999, 1_000);
        assert!(matches!(
            exchange(&mut account, 0, &config, today()),
            Err(GachaError::Validation(_))
        ));
        assert!(matches!(
            exchange(&mut account, 2, &config, today()),
            Err(GachaError::Validation(_))
        ));
        assert_eq!(account.tokens, 999);
        exchange(&mut account, 1, &config, today()).unwrap();
        assert_eq!(account.tokens, 1_000);
    }
}
