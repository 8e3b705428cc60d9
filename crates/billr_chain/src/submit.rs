//! Submission of signed envelopes with retry.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ChainError, Result};
use crate::retry::{RetryPolicy, retry};
use crate::rpc::LedgerRpc;

/// What the node said about an accepted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub hash: String,
    pub status: String,
}

/// Send `signed_envelope` via `sendTransaction`, retrying HTTP failures,
/// RPC error objects and rejected statuses alike.
pub async fn submit<R>(rpc: &R, signed_envelope: &str, policy: &RetryPolicy) -> Result<SubmitReceipt>
where
    R: LedgerRpc + ?Sized,
{
    let receipt = retry(policy, "sendTransaction", || async {
        let resp = rpc.send_transaction(signed_envelope).await?;
        if resp.is_accepted() {
            Ok(SubmitReceipt {
                hash: resp.hash,
                status: resp.status,
            })
        } else {
            let detail = resp
                .error_result_xdr
                .map(|xdr| format!(" ({xdr})"))
                .unwrap_or_default();
            Err(ChainError::Rpc(format!(
                "transaction rejected with status {}{detail}",
                resp.status
            )))
        }
    })
    .await
    .map_err(|exhausted| ChainError::SubmissionFailed {
        attempts: exhausted.attempts,
        last_error: exhausted.last_error.to_string(),
    })?;

    info!(hash = %receipt.hash, status = %receipt.status, "Transaction submitted");
    Ok(receipt)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::SendTransactionResponse;
    use crate::test_support::{FakeLedger, accepted};
    use tokio::time::Instant;

    #[tokio::test(start_paused = true)]
    async fn accepted_on_first_attempt() {
        let ledger = FakeLedger::default().send_results(vec![Ok(accepted("abc"))]);
        let receipt = submit(&ledger, "SIGNED", &RetryPolicy::default()).await.unwrap();
        assert_eq!(receipt.hash, "abc");
        assert_eq!(receipt.status, "PENDING");
        assert_eq!(ledger.sent.lock().unwrap().as_slice(), &["SIGNED".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn always_failing_node_exhausts_retries() {
        let failures = (0..4)
            .map(|i| Err(ChainError::Transport(format!("HTTP 503 attempt {i}"))))
            .collect();
        let ledger = FakeLedger::default().send_results(failures);
        let start = Instant::now();

        let err = submit(&ledger, "SIGNED", &RetryPolicy::default())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ChainError::SubmissionFailed {
                attempts: 4,
                last_error: "Transport error: HTTP 503 attempt 3".into(),
            }
        );
        assert_eq!(ledger.sent.lock().unwrap().len(), 4);
        assert_eq!(start.elapsed().as_secs(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_status_is_retried() {
        let ledger = FakeLedger::default().send_results(vec![
            Ok(SendTransactionResponse {
                hash: "abc".into(),
                status: "TRY_AGAIN_LATER".into(),
                error_result_xdr: None,
            }),
            Err(ChainError::Rpc("invalid transaction (code -32602)".into())),
            Ok(accepted("abc")),
        ]);
        let receipt = submit(&ledger, "SIGNED", &RetryPolicy::default()).await.unwrap();
        assert_eq!(receipt.hash, "abc");
        assert_eq!(ledger.sent.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn error_status_carries_result_xdr() {
        let rejected = || {
            Ok(SendTransactionResponse {
                hash: "abc".into(),
                status: "ERROR".into(),
                error_result_xdr: Some("AAAAAAAAAGT////7AAAAAA==".into()),
            })
        };
        let ledger = FakeLedger::default().send_results(vec![rejected(), rejected()]);
        let policy = RetryPolicy {
            max_retries: 1,
            ..RetryPolicy::default()
        };
        let err = submit(&ledger, "SIGNED", &policy).await.unwrap_err();
        let ChainError::SubmissionFailed { attempts, last_error } = err else {
            panic!("expected SubmissionFailed, got {err:?}");
        };
        assert_eq!(attempts, 2);
        assert!(last_error.contains("status ERROR"));
        assert!(last_error.contains("AAAAAAAAAGT////7AAAAAA=="));
    }
}
