//! Deadline for signing rounds.

use std::time::Duration;

use alloy_primitives::Signature;
use karaoke_settle::{SignRequest, SigningError, ThresholdSigner};

/// Wraps a [`ThresholdSigner`] and fails rounds that outlive `timeout`.
///
/// An expired round is reported as [`SigningError::Timeout`]; the inner
/// future is dropped and never retried.
#[derive(Debug, Clone)]
pub struct TimeoutSigner<S> {
    inner: S,
    timeout: Duration,
}

impl<S> TimeoutSigner<S> {
    /// Wraps `inner` with the given deadline.
    pub const fn new(inner: S, timeout: Duration) -> Self {
        Self { inner, timeout }
    }

    /// The configured deadline.
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait::async_trait]
impl<S: ThresholdSigner> ThresholdSigner for TimeoutSigner<S> {
    async fn sign(&self, request: &SignRequest) -> Result<Signature, SigningError> {
        tokio::time::timeout(self.timeout, self.inner.sign(request))
            .await
            .map_err(|_| SigningError::Timeout(self.timeout))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{B256, U256};

    struct SlowSigner(Duration);

    #[async_trait::async_trait]
    impl ThresholdSigner for SlowSigner {
        async fn sign(&self, _request: &SignRequest) -> Result<Signature, SigningError> {
            tokio::time::sleep(self.0).await;
            Ok(Signature::new(U256::from(1), U256::from(1), false))
        }
    }

    fn request() -> SignRequest {
        SignRequest {
            to_sign: B256::repeat_byte(0x11),
            public_key: "0x044e3b81af9c2234cad09d679ce6035ed1392347ce64ce405f5dcd36228a25de6e47fd35c4215d1edf53e6f83de344615ce719bdb0fd878f6ed76f06dd277956de"
                .parse()
                .unwrap(),
            sig_name: "settlementSig".into(),
        }
    }

    #[tokio::test]
    async fn test_slow_round_times_out() {
        let signer = TimeoutSigner::new(SlowSigner(Duration::from_millis(500)), Duration::from_millis(20));
        let err = signer.sign(&request()).await.unwrap_err();
        assert_eq!(err, SigningError::Timeout(Duration::from_millis(20)));
        assert_eq!(err.to_string(), "signing timed out after 20ms");
    }

    #[tokio::test]
    async fn test_fast_round_passes_through() {
        let signer = TimeoutSigner::new(SlowSigner(Duration::ZERO), Duration::from_secs(5));
        assert!(signer.sign(&request()).await.is_ok());
    }
}
