use async_trait::async_trait;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Failure of the upstream credential exchange. Cloneable so a single failed
/// refresh can be fanned out to every caller that was waiting on it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CredentialError {
    #[error("credential exchange failed: {0}")]
    Exchange(String),
}

impl From<CredentialError> for crate::errors::ServiceError {
    fn from(err: CredentialError) -> Self {
        crate::errors::ServiceError::AuthError(err.to_string())
    }
}

/// Token plus its upstream-declared lifetime, as returned by the exchange.
#[derive(Debug, Clone)]
pub struct IssuedCredential {
    pub access_token: String,
    pub expires_in: Duration,
}

/// The OAuth-style client-credentials call that yields a bearer token.
/// Narrow by design so tests can substitute a fake.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    async fn exchange(&self) -> Result<IssuedCredential, CredentialError>;
}

#[derive(Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

type RefreshHandle = Shared<BoxFuture<'static, Result<CachedToken, CredentialError>>>;

struct Inner {
    cached: Option<CachedToken>,
    /// Generation of the refresh that produced `cached`; an older refresh
    /// finishing late must not overwrite a newer token.
    cached_generation: u64,
    /// Refresh generation and shared future of the in-flight exchange, if any.
    /// The generation distinguishes "our" refresh from a newer one when
    /// clearing the handle after completion.
    in_flight: Option<(u64, RefreshHandle)>,
    generation: u64,
}

/// Process-wide cache for the distributor access token.
///
/// A fresh token is served without any I/O. When the token is absent or
/// stale, exactly one exchange is started and every concurrent caller awaits
/// that same in-flight refresh, receiving its token or its failure. Nothing
/// is persisted across restarts; a cold start simply re-fetches.
pub struct CredentialCache {
    exchange: Arc<dyn CredentialExchange>,
    safety_margin: Duration,
    inner: Mutex<Inner>,
}

impl CredentialCache {
    /// `safety_margin` is subtracted from each token's declared lifetime so a
    /// token is never handed out moments before it expires mid-flight.
    pub fn new(exchange: Arc<dyn CredentialExchange>, safety_margin: Duration) -> Self {
        Self {
            exchange,
            safety_margin,
            inner: Mutex::new(Inner {
                cached: None,
                cached_generation: 0,
                in_flight: None,
                generation: 0,
            }),
        }
    }

    pub async fn get_token(&self) -> Result<String, CredentialError> {
        let (generation, handle) = {
            let mut inner = self.inner.lock().expect("credential cache lock poisoned");

            if let Some(cached) = &inner.cached {
                if cached.is_fresh() {
                    return Ok(cached.token.clone());
                }
                debug!("cached distributor token is stale, refreshing");
            }

            match &inner.in_flight {
                Some((generation, handle)) => (*generation, handle.clone()),
                None => {
                    let exchange = Arc::clone(&self.exchange);
                    let margin = self.safety_margin;
                    let fut: BoxFuture<'static, Result<CachedToken, CredentialError>> =
                        async move {
                            let issued = exchange.exchange().await?;
                            // A lifetime shorter than the margin yields an
                            // already-stale token: degenerate but correct, the
                            // next call refreshes again.
                            let expires_at =
                                Instant::now() + issued.expires_in.saturating_sub(margin);
                            Ok(CachedToken {
                                token: issued.access_token,
                                expires_at,
                            })
                        }
                        .boxed();
                    let handle = fut.shared();
                    inner.generation += 1;
                    inner.in_flight = Some((inner.generation, handle.clone()));
                    (inner.generation, handle)
                }
            }
        };

        let result = handle.await;
        self.commit_refresh(generation, result)
    }

    /// Records the outcome of the refresh `generation` and hands the result to
    /// the waiter. Only the refresh that was actually awaited is retired, and
    /// the cache is written only if no newer refresh has filled it since.
    fn commit_refresh(
        &self,
        generation: u64,
        result: Result<CachedToken, CredentialError>,
    ) -> Result<String, CredentialError> {
        let mut inner = self.inner.lock().expect("credential cache lock poisoned");
        if inner
            .in_flight
            .as_ref()
            .is_some_and(|(current, _)| *current == generation)
        {
            inner.in_flight = None;
        }

        match result {
            Ok(token) => {
                if generation > inner.cached_generation {
                    info!("distributor access token refreshed");
                    inner.cached = Some(token.clone());
                    inner.cached_generation = generation;
                }
                Ok(token.token)
            }
            Err(err) => {
                warn!(error = %err, "distributor token refresh failed");
                Err(err)
            }
        }
    }
}
