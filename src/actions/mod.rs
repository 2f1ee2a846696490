//! Financial action framework
//!
//! - `balance` - pay, refund, transfer and waive
//! - `block` - create and remove manual patron blocks
//! - `driver` - [`BuildActions`], which sequences configured actions over the
//!   charge and credit pools
//!
//! [`build_action`] turns one [`ActionConfig`] into a boxed
//! [`FinancialAction`], selecting the variant through [`ActionType::lookup`].

pub mod balance;
pub mod block;
pub mod driver;

pub use balance::BalanceAction;
pub use block::{BlockAction, RemoveBlockAction};
pub use driver::{ActionOutput, ActionPools, ActionResults, BuildActions};

use crate::core::traits::FinancialAction;
use crate::types::{ActionConfig, ActionType, Result};

/// Instantiate the action variant named by `config.action_type`
///
/// # Errors
///
/// Returns `UnknownActionType` if the name is not in the dispatch table.
pub fn build_action(
    config: &ActionConfig,
    transactions_active: bool,
) -> Result<Box<dyn FinancialAction>> {
    let kind = ActionType::lookup(&config.action_type, &config.name)?;
    Ok(match kind {
        ActionType::Pay | ActionType::Refund | ActionType::Transfer | ActionType::Waive => {
            Box::new(BalanceAction::new(config, kind, transactions_active))
        }
        ActionType::Block => Box::new(BlockAction::new(config, transactions_active)),
        ActionType::RemoveBlock => Box::new(RemoveBlockAction::new(config, transactions_active)),
    })
}
