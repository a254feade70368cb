//! Builds the configured signing backend.

use karaoke_settle::{SettlementSigner, ThresholdSigner};
use karaoke_settle_evm::LocalKeyShareSigner;
use karaoke_settle_http::RemoteSigner;

use crate::config::{ActionConfig, SignerConfig};
use crate::error::ActionError;
use crate::timeout::TimeoutSigner;

/// The signer type served by the action.
pub type DynSigner = Box<dyn ThresholdSigner>;

/// Constructs the settlement signer described by `config`.
///
/// Local key shares whose `$VAR` reference did not resolve are skipped with a
/// warning rather than failing startup.
///
/// # Errors
///
/// Returns [`ActionError::Keyring`] if a resolved key is not a valid secp256k1
/// private key.
pub fn settlement_signer(config: &ActionConfig) -> Result<SettlementSigner<DynSigner>, ActionError> {
    let backend: DynSigner = match &config.signer {
        SignerConfig::Local { keys } => {
            let resolved = keys.iter().filter(|k| {
                let unresolved = k.is_unresolved();
                if unresolved {
                    tracing::warn!("Skipping key share: private_key not resolved (missing env var?)");
                }
                !unresolved
            });
            let keyring = LocalKeyShareSigner::from_private_keys(resolved.map(|k| k.private_key.as_str()))?;
            if keyring.is_empty() {
                tracing::warn!("No key shares configured; every settlement will fail to sign");
            }
            for pkp in keyring.addresses() {
                tracing::info!(pkp = %pkp, "Registered local key share");
            }
            Box::new(TimeoutSigner::new(keyring, config.signing_timeout()))
        }
        SignerConfig::Remote { url } => {
            tracing::info!(url = %url, "Using remote signing node");
            let remote = RemoteSigner::new(url.clone()).with_timeout(config.signing_timeout());
            Box::new(TimeoutSigner::new(remote, config.signing_timeout()))
        }
    };
    Ok(SettlementSigner::new(backend).with_sig_name(config.sig_name.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_signer_skips_unresolved_keys() {
        let config = ActionConfig::from_toml_str(
            r#"
            sig_name = "creditsSig"

            [signer]
            kind = "local"

            [[signer.keys]]
            private_key = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318"

            [[signer.keys]]
            private_key = "$UNSET_KEY"
            "#,
            |_| None,
        )
        .unwrap();
        let signer = settlement_signer(&config).unwrap();
        assert_eq!(signer.sig_name(), "creditsSig");
    }

    #[test]
    fn test_invalid_local_key_fails_startup() {
        let config = ActionConfig::from_toml_str(
            "[signer]\nkind = \"local\"\n\n[[signer.keys]]\nprivate_key = \"0x1234\"\n",
            |_| None,
        )
        .unwrap();
        assert!(matches!(settlement_signer(&config), Err(ActionError::Keyring(_))));
    }
}
