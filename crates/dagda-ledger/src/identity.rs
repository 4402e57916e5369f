//! Player identity resolution

use serde::{Deserialize, Serialize};

use crate::{LedgerError, Result};

/// Farcaster profile of a signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialProfile {
    pub fid: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl SocialProfile {
    pub fn new(fid: u64) -> Self {
        Self {
            fid,
            username: None,
            display_name: None,
        }
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }
}

/// Whatever the front end knows about the current user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    #[serde(default)]
    pub wallet_address: Option<String>,
    #[serde(default)]
    pub social: Option<SocialProfile>,
}

/// Resolved player key used by every store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Player {
    pub user_id: String,
    pub username: String,
    /// Verified social profile present: bonus grant and higher daily caps
    pub bonus_tier: bool,
}

impl PlayerIdentity {
    pub fn wallet(address: impl Into<String>) -> Self {
        Self {
            wallet_address: Some(address.into()),
            social: None,
        }
    }

    pub fn social(profile: SocialProfile) -> Self {
        Self {
            wallet_address: None,
            social: Some(profile),
        }
    }

    /// Wallet address wins over the social profile; neither is an error
    pub fn resolve(&self) -> Result<Player> {
        let bonus_tier = self.social.is_some();

        let wallet = self
            .wallet_address
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty());

        if let Some(address) = wallet {
            let prefix: String = address.chars().take(6).collect();
            return Ok(Player {
                user_id: address.to_lowercase(),
                username: format!("Player_{prefix}"),
                bonus_tier,
            });
        }

        if let Some(profile) = &self.social {
            let username = profile
                .username
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| format!("User-{}", profile.fid));
            return Ok(Player {
                user_id: format!("fid-{}", profile.fid),
                username,
                bonus_tier,
            });
        }

        Err(LedgerError::Unidentified)
    }
}

/// Source of the signed-in social profile
pub trait IdentityProvider {
    fn current_profile(&self) -> Option<SocialProfile>;
}

/// Provider returning a fixed profile (or none)
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    profile: Option<SocialProfile>,
}

impl StaticIdentity {
    pub fn new(profile: Option<SocialProfile>) -> Self {
        Self { profile }
    }

    pub fn anonymous() -> Self {
        Self::default()
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_profile(&self) -> Option<SocialProfile> {
        self.profile.clone()
    }
}

/// Build an identity from an optional wallet and the provider's profile
pub fn identify(wallet_address: Option<String>, provider: &dyn IdentityProvider) -> PlayerIdentity {
    PlayerIdentity {
        wallet_address,
        social: provider.current_profile(),
    }
}
