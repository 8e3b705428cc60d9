//! The wallet bridge: an injected signer the client never holds keys for.

use async_trait::async_trait;
use billr_core::{SessionStore, WalletSession};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{ChainError, Result};
use crate::strkey;
use crate::transaction::PendingTransaction;

/// Marker in wallet errors caused by a message-passing failure in the
/// extension rather than a refusal.
const CLONE_ERROR_MARKER: &str = "could not be cloned";

/// Opaque wallet failure text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct WalletError(pub String);

impl From<&str> for WalletError {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Signing hints passed to the wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOptions {
    pub address: String,
    pub network_passphrase: String,
}

/// An external wallet capable of holding keys and signing envelopes.
#[async_trait]
pub trait WalletBridge: Send + Sync {
    /// Stable identifier of the wallet implementation (e.g. `"freighter"`).
    fn id(&self) -> &str;

    async fn get_address(&self) -> Result<String, WalletError>;

    /// Sign a base64 envelope and return the signed base64 envelope.
    async fn sign_transaction(
        &self,
        xdr: &str,
        options: Option<&SignOptions>,
    ) -> Result<String, WalletError>;

    async fn disconnect(&self) -> Result<(), WalletError>;
}

/// Have `wallet` sign `pending` for `wallet_address`.
///
/// A clone failure is retried once without options; a second failure is
/// reported as a communication error. Anything else is returned as is.
pub async fn sign_pending(
    wallet: &dyn WalletBridge,
    pending: &PendingTransaction,
    wallet_address: &str,
    network_passphrase: &str,
) -> Result<String> {
    let options = SignOptions {
        address: wallet_address.to_string(),
        network_passphrase: network_passphrase.to_string(),
    };

    match wallet
        .sign_transaction(&pending.envelope_xdr, Some(&options))
        .await
    {
        Ok(signed) => Ok(signed),
        Err(e) if e.0.contains(CLONE_ERROR_MARKER) => {
            warn!(wallet = wallet.id(), error = %e, "Signing failed to clone request, retrying without options");
            wallet
                .sign_transaction(&pending.envelope_xdr, None)
                .await
                .map_err(|retry_err| {
                    ChainError::SigningFailed(format!(
                        "Wallet communication error. Please try reconnecting your wallet. ({retry_err})"
                    ))
                })
        }
        Err(e) => Err(ChainError::SigningFailed(e.0)),
    }
}

/// Ask the wallet for its address and persist it as the current session.
pub async fn connect_wallet(wallet: &dyn WalletBridge, store: &SessionStore) -> Result<WalletSession> {
    let address = wallet
        .get_address()
        .await
        .map_err(|e| ChainError::SigningFailed(format!("Wallet did not share an address: {e}")))?;
    if !strkey::is_valid_address(&address) {
        return Err(ChainError::InvalidInput(format!(
            "wallet returned an invalid address: {address}"
        )));
    }

    let session = WalletSession::new(address, wallet.id().to_string());
    store
        .save(&session)
        .map_err(|e| ChainError::Session(format!("{e:#}")))?;
    info!(wallet = wallet.id(), address = %session.wallet_address, "Wallet connected");
    Ok(session)
}

/// Disconnect the wallet and drop the persisted session. A wallet that fails
/// to disconnect does not keep the session alive.
pub async fn disconnect_wallet(wallet: &dyn WalletBridge, store: &SessionStore) -> Result<()> {
    if let Err(e) = wallet.disconnect().await {
        warn!(wallet = wallet.id(), error = %e, "Wallet disconnect failed");
    }
    store
        .clear()
        .map_err(|e| ChainError::Session(format!("{e:#}")))?;
    info!(wallet = wallet.id(), "Wallet disconnected");
    Ok(())
}

/// The session left by a previous connect, if any.
pub fn restore_session(store: &SessionStore) -> Option<WalletSession> {
    match store.load() {
        Ok(session) => session,
        Err(e) => {
            warn!(error = %e, "Failed to read wallet session");
            None
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::rpc::SimulationResult;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    pub(crate) const WALLET_ADDRESS: &str = "GA7QYNF7SOWQ3GLR2BGMZEHXAVIRZA4KVWLTJJFC7MGXUA74P7UJVSGZ";
    const PASSPHRASE: &str = "Test SDF Network ; September 2015";

    /// Wallet double that replays scripted signing results and records
    /// whether each call carried options.
    pub(crate) struct ScriptedWallet {
        address: Result<String, WalletError>,
        sign_results: Mutex<VecDeque<Result<String, WalletError>>>,
        pub(crate) sign_calls: Mutex<Vec<Option<SignOptions>>>,
        pub(crate) disconnect_result: Result<(), WalletError>,
    }

    impl ScriptedWallet {
        pub(crate) fn new(sign_results: Vec<Result<String, WalletError>>) -> Self {
            Self {
                address: Ok(WALLET_ADDRESS.to_string()),
                sign_results: Mutex::new(sign_results.into()),
                sign_calls: Mutex::new(Vec::new()),
                disconnect_result: Ok(()),
            }
        }

        pub(crate) fn signing(signed: &str) -> Self {
            Self::new(vec![Ok(signed.to_string())])
        }
    }

    #[async_trait]
    impl WalletBridge for ScriptedWallet {
        fn id(&self) -> &str {
            "scripted"
        }

        async fn get_address(&self) -> Result<String, WalletError> {
            self.address.clone()
        }

        async fn sign_transaction(
            &self,
            _xdr: &str,
            options: Option<&SignOptions>,
        ) -> Result<String, WalletError> {
            self.sign_calls.lock().unwrap().push(options.cloned());
            self.sign_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err("no scripted result".into()))
        }

        async fn disconnect(&self) -> Result<(), WalletError> {
            self.disconnect_result.clone()
        }
    }

    fn pending() -> PendingTransaction {
        PendingTransaction {
            envelope_xdr: "AAAA".into(),
            hash: "00".into(),
            simulation: SimulationResult::default(),
        }
    }

    #[tokio::test]
    async fn signs_with_options() {
        let wallet = ScriptedWallet::signing("SIGNED");
        let signed = sign_pending(&wallet, &pending(), WALLET_ADDRESS, PASSPHRASE)
            .await
            .unwrap();
        assert_eq!(signed, "SIGNED");

        let calls = wallet.sign_calls.lock().unwrap();
        assert_eq!(
            calls.as_slice(),
            &[Some(SignOptions {
                address: WALLET_ADDRESS.into(),
                network_passphrase: PASSPHRASE.into(),
            })]
        );
    }

    #[tokio::test]
    async fn clone_error_retries_once_without_options() {
        let wallet = ScriptedWallet::new(vec![
            Err("DataCloneError: object could not be cloned".into()),
            Ok("SIGNED".into()),
        ]);
        let signed = sign_pending(&wallet, &pending(), WALLET_ADDRESS, PASSPHRASE)
            .await
            .unwrap();
        assert_eq!(signed, "SIGNED");

        let calls = wallet.sign_calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].is_some());
        assert!(calls[1].is_none());
    }

    #[tokio::test]
    async fn second_clone_failure_is_communication_error() {
        let wallet = ScriptedWallet::new(vec![
            Err("could not be cloned".into()),
            Err("could not be cloned".into()),
        ]);
        let err = sign_pending(&wallet, &pending(), WALLET_ADDRESS, PASSPHRASE)
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::SigningFailed(msg) if msg.starts_with("Wallet communication error")));
        assert_eq!(wallet.sign_calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn other_wallet_errors_propagate_unchanged() {
        let wallet = ScriptedWallet::new(vec![Err("User declined access".into())]);
        let err = sign_pending(&wallet, &pending(), WALLET_ADDRESS, PASSPHRASE)
            .await
            .unwrap_err();
        assert_eq!(err, ChainError::SigningFailed("User declined access".into()));
        assert_eq!(wallet.sign_calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn connect_overwrites_and_disconnect_removes_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::at(dir.path().join("session.json"));
        store
            .save(&WalletSession::new("GOLD".into(), "old-wallet".into()))
            .unwrap();

        let wallet = ScriptedWallet::signing("unused");
        let session = connect_wallet(&wallet, &store).await.unwrap();
        assert_eq!(session.wallet_address, WALLET_ADDRESS);

        let restored = restore_session(&store).unwrap();
        assert_eq!(restored.wallet_address, WALLET_ADDRESS);
        assert_eq!(restored.wallet_id, "scripted");

        disconnect_wallet(&wallet, &store).await.unwrap();
        assert!(!store.path().exists());
        assert!(restore_session(&store).is_none());
    }

    #[tokio::test]
    async fn disconnect_clears_session_even_if_wallet_fails() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::at(dir.path().join("session.json"));
        let mut wallet = ScriptedWallet::signing("unused");
        connect_wallet(&wallet, &store).await.unwrap();

        wallet.disconnect_result = Err("extension gone".into());
        disconnect_wallet(&wallet, &store).await.unwrap();
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn connect_reports_address_refusal_without_saving() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::at(dir.path().join("session.json"));
        let mut wallet = ScriptedWallet::signing("unused");
        wallet.address = Err("User rejected the request".into());

        let err = connect_wallet(&wallet, &store).await.unwrap_err();
        assert_eq!(
            err,
            ChainError::SigningFailed("Wallet did not share an address: User rejected the request".into())
        );
        assert!(wallet.sign_calls.lock().unwrap().is_empty());
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn connect_rejects_invalid_address() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::at(dir.path().join("session.json"));
        let mut wallet = ScriptedWallet::signing("unused");
        wallet.address = Ok("not-an-address".into());

        let err = connect_wallet(&wallet, &store).await.unwrap_err();
        assert!(matches!(err, ChainError::InvalidInput(_)));
        assert!(!store.path().exists());
    }
}
