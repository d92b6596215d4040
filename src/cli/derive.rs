//! Address derivation command

use super::Session;
use crate::address::{
    derive_owner_asset_account, derive_sub_address, Address, MarketAddresses, SubAddressTag,
};
use clap::{Args, Subcommand};
use serde::Serialize;

#[derive(Args, Debug)]
pub struct DeriveArgs {
    #[command(subcommand)]
    pub target: DeriveTarget,
}

#[derive(Subcommand, Debug)]
pub enum DeriveTarget {
    /// Market address and its sub-addresses from creation inputs
    Market {
        creator: Address,
        asset: Address,
        /// Expiry as unix seconds
        expiry: i64,
    },
    /// Share-token mints and vault of a known market
    Accounts { market: Address },
    /// An owner's standard sub-account for an asset
    OwnerAccount { owner: Address, asset: Address },
}

#[derive(Serialize)]
struct Derived {
    market: Option<Address>,
    bump: Option<u8>,
    yes_mint: Option<Address>,
    no_mint: Option<Address>,
    vault: Option<Address>,
    owner_account: Option<Address>,
}

impl DeriveArgs {
    pub fn execute(&self, session: &Session) -> anyhow::Result<()> {
        let program_id = session.config.network.program_id;
        let derived = match &self.target {
            DeriveTarget::Market {
                creator,
                asset,
                expiry,
            } => {
                let a = MarketAddresses::derive(creator, asset, *expiry, &program_id)?;
                Derived {
                    market: Some(a.market),
                    bump: Some(a.market_bump),
                    yes_mint: Some(a.yes_mint),
                    no_mint: Some(a.no_mint),
                    vault: Some(a.vault),
                    owner_account: None,
                }
            }
            DeriveTarget::Accounts { market } => {
                let sub = |tag| derive_sub_address(tag, market, &program_id).map(|(a, _)| a);
                Derived {
                    market: Some(*market),
                    bump: None,
                    yes_mint: Some(sub(SubAddressTag::YesMint)?),
                    no_mint: Some(sub(SubAddressTag::NoMint)?),
                    vault: Some(sub(SubAddressTag::Vault)?),
                    owner_account: None,
                }
            }
            DeriveTarget::OwnerAccount { owner, asset } => Derived {
                market: None,
                bump: None,
                yes_mint: None,
                no_mint: None,
                vault: None,
                owner_account: Some(derive_owner_asset_account(owner, asset)),
            },
        };

        session.emit(&derived, |d| {
            let rows = [
                ("Market", d.market),
                ("YES mint", d.yes_mint),
                ("NO mint", d.no_mint),
                ("Vault", d.vault),
                ("Owner account", d.owner_account),
            ];
            for (label, value) in rows {
                if let Some(address) = value {
                    println!("{label:<14} {address}");
                }
            }
            if let Some(bump) = d.bump {
                println!("{:<14} {bump}", "Bump");
            }
        })
    }
}
