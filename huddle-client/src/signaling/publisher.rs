use crate::config::RetryPolicy;
use crate::signaling::signaling_channel::SignalingChannel;
use huddle_core::{CallError, PeerId, Result, RoomId, SignalMessage};
use std::sync::Arc;
use tracing::warn;

/// Publishes signaling messages, retrying transient backend failures.
#[derive(Clone)]
pub struct Publisher {
    channel: Arc<dyn SignalingChannel>,
    policy: RetryPolicy,
}

impl Publisher {
    pub fn new(channel: Arc<dyn SignalingChannel>, policy: RetryPolicy) -> Self {
        Self { channel, policy }
    }

    /// Delete what `from` still has waiting for `to`.
    pub async fn withdraw(&self, room: &RoomId, from: &PeerId, to: &PeerId) -> Result<()> {
        self.channel.purge_between(room, from, to).await
    }

    pub async fn publish(&self, message: SignalMessage) -> Result<()> {
        let mut attempt = 0;

        loop {
            match self.channel.publish(message.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    attempt += 1;
                    if attempt >= self.policy.max_attempts.max(1) {
                        return Err(CallError::SignalingPublishFailed(format!(
                            "{:?} to {:?} after {} attempts: {}",
                            message.kind(),
                            message.to,
                            attempt,
                            e
                        )));
                    }

                    let delay = self.policy.backoff(attempt);
                    warn!(
                        "Publishing {:?} to {:?} failed ({}), retrying in {:?}",
                        message.kind(),
                        message.to,
                        e,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}
