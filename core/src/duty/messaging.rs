//! Messaging maintenance duty
//!
//! One broker session per cycle: connect, drain the outbound queue,
//! (re)subscribe, hand received messages to the inbox, disconnect. The
//! cycle only runs while the clock is synced and the identity is known.

use embedded_hal_async::delay::DelayNs;
use hal_abstractions::{MemoryProbe, MessagingTransport, QoS, SessionParams, TransportError};

use super::Shared;
use crate::error::Error;
use crate::messaging::{drain_outbound, DrainReport, Inbox, QUEUE_DEPTH};
use crate::status::MessagingPhase;
use crate::supervisor::Heartbeat;

/// Acknowledging a queued message waits for the broker's PUBACK
const PUBLISH_QOS: QoS = QoS::AtLeastOnce;
const SUBSCRIBE_QOS: QoS = QoS::AtLeastOnce;

/// What a cycle did when it did not fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CycleOutcome {
    /// Clock or identity not ready, nothing attempted
    Gated,
    Completed {
        drained: DrainReport,
        subscribed: bool,
        received: usize,
    },
}

pub struct MessagingDuty<'a, T, P, D> {
    shared: Shared<'a>,
    transport: T,
    inbox: Inbox<'a, P, QUEUE_DEPTH>,
    delay: D,
}

impl<'a, T, P, D> MessagingDuty<'a, T, P, D>
where
    T: MessagingTransport,
    P: MemoryProbe,
    D: DelayNs,
{
    pub fn new(shared: Shared<'a>, transport: T, probe: P, delay: D) -> Self {
        Self {
            shared,
            transport,
            inbox: Inbox::new(shared.inbound, probe),
            delay,
        }
    }

    pub async fn run(&mut self, heartbeat: Heartbeat<'_>) -> ! {
        info!("Messaging duty starting");
        let pause = self.shared.config.supervisor.messaging_pass_ms;
        loop {
            if let Err(e) = self.cycle().await {
                debug!("Messaging cycle ended early: {}", e);
            }
            heartbeat.beat();
            self.delay.delay_ms(pause).await;
        }
    }

    pub async fn cycle(&mut self) -> Result<CycleOutcome, Error> {
        let status = self.shared.status;
        if !status.connectivity().time_ready() {
            status.set_messaging(MessagingPhase::Disconnected);
            return Ok(CycleOutcome::Gated);
        }
        let client_id = match self.shared.identity.get() {
            Ok(id) => id,
            Err(e) => {
                debug!("Messaging held: {}", e);
                return Ok(CycleOutcome::Gated);
            }
        };

        let cfg = &self.shared.config.messaging;
        let params = SessionParams {
            host: cfg.broker_host,
            port: cfg.port,
            client_id: client_id.as_str(),
            timeout_ms: cfg.connect_timeout_ms,
            keep_alive_secs: cfg.keep_alive_secs,
            username: cfg.username,
            password: cfg.password,
        };
        if let Err(e) = self.transport.open(&params).await {
            warn!("Connect to {} failed: {}", cfg.broker_host, e);
            status.set_messaging(match e {
                TransportError::Network => MessagingPhase::NetworkError,
                _ => MessagingPhase::ConnectError,
            });
            return Err(Error::TransportConnectFailure);
        }
        status.set_messaging(MessagingPhase::ConnectSucceeded);

        let result = self.session().await;
        self.transport.close().await;
        result
    }

    async fn session(&mut self) -> Result<CycleOutcome, Error> {
        let status = self.shared.status;
        let cfg = &self.shared.config.messaging;

        status.set_messaging(MessagingPhase::Active);
        let drained = if self.shared.outbound.is_empty() {
            DrainReport::default()
        } else {
            status.set_messaging(MessagingPhase::Publishing);
            self.delay.delay_ms(cfg.publish_settle_ms).await;
            match drain_outbound(self.shared.outbound, &mut self.transport, PUBLISH_QOS, cfg.max_retry).await {
                Ok(report) => report,
                Err(e) => {
                    status.set_messaging(if self.transport.is_connected() {
                        MessagingPhase::PublishFailed
                    } else {
                        MessagingPhase::Disconnected
                    });
                    status.request_error_blink();
                    return Err(e);
                }
            }
        };
        if drained.is_partial() {
            warn!("{} queued messages were rejected", drained.rejected);
            status.set_messaging(MessagingPhase::PublishFailed);
            status.request_error_blink();
        } else {
            status.set_messaging(MessagingPhase::ConnectSucceeded);
        }

        let subscribed = self.subscribe().await;
        if !subscribed && !self.transport.is_connected() {
            status.set_messaging(MessagingPhase::Disconnected);
        }

        let received = match self.transport.poll_inbound(&self.inbox).await {
            Ok(n) => n,
            Err(e) => {
                warn!("Inbound poll failed: {}", e);
                0
            }
        };

        Ok(CycleOutcome::Completed {
            drained,
            subscribed,
            received,
        })
    }

    /// Subscribe with at most `max_retry` attempts; success means the
    /// broker granted the requested QoS
    async fn subscribe(&mut self) -> bool {
        let cfg = &self.shared.config.messaging;
        for attempt in 1..=cfg.max_retry {
            match self.transport.subscribe(cfg.subscribe_topic, SUBSCRIBE_QOS).await {
                Ok(granted) if granted == SUBSCRIBE_QOS => return true,
                Ok(granted) => warn!("Subscribe granted {:?}, wanted {:?}", granted, SUBSCRIBE_QOS),
                Err(TransportError::NotConnected) | Err(TransportError::Network) => {
                    warn!("Subscribe to {} lost the session", cfg.subscribe_topic);
                    return false;
                }
                Err(e) => warn!("Subscribe attempt {}/{} failed: {}", attempt, cfg.max_retry, e),
            }
            self.delay.delay_ms(cfg.subscribe_retry_ms).await;
        }
        false
    }
}
