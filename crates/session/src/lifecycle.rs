//! Background token lifecycle: periodic anti-forgery renewal and the
//! durable-storage tamper watch.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Instant;

use anvilhr_client::IdentityApi;

use crate::events::{SecurityEvent, TerminationReason};
use crate::manager::SessionManager;
use crate::session::Transition;
use crate::vault::SessionVault;

/// Background worker that keeps an authenticated session alive.
///
/// Two independent cadences run on one task:
/// - renewal: rotates the anti-forgery token every `renew_interval`,
///   terminating the session after `renew_max_retries` consecutive
///   failures;
/// - tamper watch: polls the vault every `storage_watch_interval` and
///   treats a vanished token entry as external interference.
pub struct TokenLifecycle<A, V> {
    manager: SessionManager<A, V>,
    shutdown: Arc<tokio::sync::Notify>,
}

/// Handle to a running [`TokenLifecycle`].
pub struct LifecycleHandle {
    shutdown: Arc<tokio::sync::Notify>,
    handle: tokio::task::JoinHandle<()>,
}

impl LifecycleHandle {
    /// Request shutdown without waiting for the task to finish.
    pub fn shutdown_now(&self) {
        self.shutdown.notify_one();
    }

    /// Request shutdown and wait for the task to drain.
    pub async fn shutdown(self) {
        self.shutdown.notify_one();
        let _ = self.handle.await;
    }
}

impl<A, V> TokenLifecycle<A, V>
where
    A: IdentityApi + 'static,
    V: SessionVault + 'static,
{
    pub fn new(manager: SessionManager<A, V>) -> Self {
        Self {
            manager,
            shutdown: Arc::new(tokio::sync::Notify::new()),
        }
    }

    /// Start the background task.
    pub fn start(self) -> LifecycleHandle {
        let shutdown = self.shutdown.clone();
        let manager = self.manager;

        let handle = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                tracing::info!("token lifecycle started");

                let config = manager.config.clone();

                // When the session last became authenticated. Fed by a store
                // listener so the first renewal honours the initial delay;
                // cleared whenever the session ends.
                let auth_since: Arc<StdMutex<Option<Instant>>> =
                    Arc::new(StdMutex::new(None));
                let _auth_watch = {
                    let auth_since = auth_since.clone();
                    manager.store.subscribe(move |session| {
                        let mut slot = auth_since
                            .lock()
                            .unwrap_or_else(PoisonError::into_inner);
                        if session.is_authenticated() {
                            if slot.is_none() {
                                *slot = Some(Instant::now());
                            }
                        } else {
                            *slot = None;
                        }
                    })
                };
                // A session restored before the worker started never fires
                // the listener; count its delay from now.
                if manager.store.snapshot().is_authenticated() {
                    let mut slot = auth_since
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner);
                    if slot.is_none() {
                        *slot = Some(Instant::now());
                    }
                }

                let mut renew_interval = tokio::time::interval(config.renew_interval);
                renew_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

                let mut watch_interval = tokio::time::interval(config.storage_watch_interval);
                watch_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

                let mut consecutive_failures = 0u32;
                let mut token_was_present = false;

                loop {
                    tokio::select! {
                        _ = shutdown.notified() => {
                            tracing::info!("token lifecycle received shutdown signal");
                            break;
                        }
                        _ = renew_interval.tick() => {
                            renew_tick(&manager, &auth_since, &mut consecutive_failures).await;
                        }
                        _ = watch_interval.tick() => {
                            watch_tick(&manager, &mut token_was_present).await;
                        }
                    }
                }

                tracing::info!("token lifecycle stopped");
            }
        });

        LifecycleHandle { shutdown, handle }
    }
}

async fn renew_tick<A, V>(
    manager: &SessionManager<A, V>,
    auth_since: &Arc<StdMutex<Option<Instant>>>,
    consecutive_failures: &mut u32,
) where
    A: IdentityApi,
    V: SessionVault,
{
    let snapshot = manager.store.snapshot();
    if !snapshot.is_authenticated() {
        *consecutive_failures = 0;
        return;
    }
    let Some(token) = snapshot.token else {
        return;
    };

    let since = {
        let mut slot = auth_since.lock().unwrap_or_else(PoisonError::into_inner);
        match *slot {
            Some(instant) => instant,
            None => {
                let now = Instant::now();
                *slot = Some(now);
                now
            }
        }
    };
    if since.elapsed() < manager.config.renew_initial_delay {
        tracing::debug!("skipping renewal, session authenticated too recently");
        return;
    }

    // Never renew concurrently with a validation-triggered renewal.
    let Ok(_renewing) = manager.renewal_gate.try_lock() else {
        tracing::debug!("skipping renewal, another renewal is in flight");
        return;
    };

    match manager.api.renew_token(&token).await {
        Ok(fresh) => {
            *consecutive_failures = 0;
            manager.adopt_rotated_token(Some(fresh)).await;
            tracing::debug!("anti-forgery token renewed");
        }
        Err(e) => {
            *consecutive_failures += 1;
            let max = manager.config.renew_max_retries;
            tracing::warn!(
                error = %e,
                attempt = *consecutive_failures,
                max,
                "token renewal failed"
            );
            manager.events.publish(SecurityEvent::RenewalFailed {
                attempt: *consecutive_failures,
                max,
            });

            if *consecutive_failures >= max {
                tracing::warn!("renewal retries exhausted, terminating session");
                manager.store.dispatch(Transition::RenewalExhausted);
                if let Err(e) = manager.vault.clear().await {
                    tracing::error!(error = %e, "failed to clear session vault after renewal exhaustion");
                }
                manager.events.publish(SecurityEvent::SessionTerminated {
                    reason: TerminationReason::RenewalExhausted,
                });
                *consecutive_failures = 0;
            }
        }
    }
}

async fn watch_tick<A, V>(manager: &SessionManager<A, V>, token_was_present: &mut bool)
where
    A: IdentityApi,
    V: SessionVault,
{
    let snapshot = manager.store.snapshot();
    if !snapshot.is_authenticated() {
        *token_was_present = false;
        return;
    }

    match manager.vault.token_present().await {
        Ok(present) => {
            if *token_was_present && !present {
                // The entry existed earlier in this session's lifetime and
                // is gone now. Tear down locally; no remote logout with a
                // token someone may have stolen.
                tracing::warn!("durable token entry vanished, treating as tampering");
                manager.events.publish(SecurityEvent::TamperDetected);
                manager.store.dispatch(Transition::Logout);
                if let Err(e) = manager.vault.clear().await {
                    tracing::error!(error = %e, "failed to clear session vault after tampering");
                }
                manager.events.publish(SecurityEvent::SessionTerminated {
                    reason: TerminationReason::Tampering,
                });
                *token_was_present = false;
            } else {
                *token_was_present = present;
            }
        }
        Err(e) => {
            // A transient read failure is not evidence of tampering.
            tracing::debug!(error = %e, "storage watch read failed");
        }
    }
}
