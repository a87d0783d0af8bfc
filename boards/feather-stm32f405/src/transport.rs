#![deny(unsafe_code)]
#![deny(warnings)]
//! MQTT v5.0 transport over plain TCP
//!
//! One broker session per messaging cycle. The client lives in
//! [`MqttTransport`] between `open` and `close`; its buffers come from
//! [`crate::session_buffers`].

use core::future::Future;

use defmt::{debug, info, warn, Debug2Format};
use embassy_futures::select::{select, Either};
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::Stack;
use embassy_time::{Duration, Timer};
use hal_abstractions::{InboundSink, MessagingTransport, QoS, SessionParams, TransportError};
use rust_mqtt::client::client::MqttClient;
use rust_mqtt::client::client_config::{ClientConfig, MqttVersion};
use rust_mqtt::packet::v5::publish_packet::QualityOfService;
use rust_mqtt::packet::v5::reason_codes::ReasonCode;
use rust_mqtt::utils::rng_generator::CountingRng;

use crate::session_buffers::{self, PACKET_BUF_LEN};

const MAX_PROPERTIES: usize = 5;

/// Fixed header, topic length prefix, packet id and property length
const PUBLISH_OVERHEAD: usize = 16;

/// How long a poll waits for each inbound message
const POLL_WINDOW_MS: u64 = 50;

/// Messages taken per poll before handing control back
const MAX_INBOUND_PER_POLL: usize = 4;

type Session = MqttClient<'static, TcpSocket<'static>, MAX_PROPERTIES, CountingRng>;

fn to_mqtt(qos: QoS) -> QualityOfService {
    match qos {
        QoS::AtMostOnce => QualityOfService::QoS0,
        QoS::AtLeastOnce => QualityOfService::QoS1,
        QoS::ExactlyOnce => QualityOfService::QoS2,
    }
}

/// Await `f` for at most `timeout`
async fn bounded<F: Future>(timeout: Duration, f: F) -> Option<F::Output> {
    match select(f, Timer::after(timeout)).await {
        Either::First(output) => Some(output),
        Either::Second(()) => None,
    }
}

pub struct MqttTransport {
    stack: Stack<'static>,
    session: Option<Session>,
    timeout: Duration,
    /// Packet identifier seed, advanced per session
    seed: u64,
    /// Local sequence for inbound messages; the client does not expose
    /// broker packet ids, so a DUP redelivery is queued again
    received: u16,
}

impl MqttTransport {
    pub fn new(stack: Stack<'static>, seed: u64) -> Self {
        Self {
            stack,
            session: None,
            timeout: Duration::from_secs(5),
            seed,
            received: 0,
        }
    }

    /// Drop the session after a socket failure
    fn lost(&mut self, reason: ReasonCode) -> TransportError {
        warn!("Broker session lost: {}", Debug2Format(&reason));
        self.session = None;
        TransportError::Network
    }
}

impl MessagingTransport for MqttTransport {
    async fn open(&mut self, params: &SessionParams<'_>) -> Result<(), TransportError> {
        // Releases the session buffers
        self.session = None;
        self.timeout = Duration::from_millis(params.timeout_ms as u64);

        let address = self
            .stack
            .dns_query(params.host, DnsQueryType::A)
            .await
            .map_err(|_| TransportError::Network)?
            .first()
            .copied()
            .ok_or(TransportError::Network)?;

        // SAFETY: the previous session, the only other holder, was dropped above
        #[allow(unsafe_code)]
        let buffers = unsafe { session_buffers::session_buffers() };

        let mut socket = TcpSocket::new(self.stack, buffers.socket_rx, buffers.socket_tx);
        socket.set_timeout(Some(self.timeout));
        socket
            .connect((address, params.port))
            .await
            .map_err(|_| TransportError::Network)?;
        debug!("TCP connected to {}:{}", params.host, params.port);

        self.seed = self.seed.wrapping_add(1);
        let mut config = ClientConfig::new(MqttVersion::MQTTv5, CountingRng(self.seed));
        config.add_max_subscribe_qos(QualityOfService::QoS1);
        config.keep_alive = params.keep_alive_secs;
        config.max_packet_size = PACKET_BUF_LEN as u32;
        let client_id = session_buffers::hold(buffers.client_id, params.client_id)
            .ok_or(TransportError::Protocol)?;
        config.add_client_id(client_id);
        if let Some(username) = params.username {
            let username = session_buffers::hold(buffers.username, username)
                .ok_or(TransportError::Protocol)?;
            config.add_username(username);
        }
        if let Some(password) = params.password {
            let password = session_buffers::hold(buffers.password, password)
                .ok_or(TransportError::Protocol)?;
            config.add_password(password);
        }

        let mut client = MqttClient::<_, MAX_PROPERTIES, _>::new(
            socket,
            buffers.packet_tx,
            PACKET_BUF_LEN,
            buffers.packet_rx,
            PACKET_BUF_LEN,
            config,
        );
        match bounded(self.timeout, client.connect_to_broker()).await {
            Some(Ok(())) => {
                info!("MQTT session open as {}", client_id);
                self.session = Some(client);
                Ok(())
            }
            Some(Err(reason)) => {
                warn!("CONNECT refused: {}", Debug2Format(&reason));
                Err(TransportError::Protocol)
            }
            None => {
                warn!("CONNACK timed out");
                Err(TransportError::Network)
            }
        }
    }

    async fn publish(
        &mut self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), TransportError> {
        if topic.len() + payload.len() + PUBLISH_OVERHEAD > PACKET_BUF_LEN {
            return Err(TransportError::Rejected);
        }
        let timeout = self.timeout;
        let session = self.session.as_mut().ok_or(TransportError::NotConnected)?;
        match bounded(timeout, session.send_message(topic, payload, to_mqtt(qos), retain)).await {
            Some(Ok(())) => Ok(()),
            Some(Err(ReasonCode::NetworkError)) => Err(self.lost(ReasonCode::NetworkError)),
            Some(Err(reason)) => {
                debug!("PUBLISH failed: {}", Debug2Format(&reason));
                Err(TransportError::Publish)
            }
            None => Err(TransportError::Publish),
        }
    }

    /// Subscriptions are requested at QoS 1; asking for more is refused
    async fn subscribe(&mut self, topic: &str, qos: QoS) -> Result<QoS, TransportError> {
        if qos > QoS::AtLeastOnce {
            return Err(TransportError::Rejected);
        }
        let timeout = self.timeout;
        let session = self.session.as_mut().ok_or(TransportError::NotConnected)?;
        // The client reports a grant below the requested level as an error
        // carrying the granted code
        match bounded(timeout, session.subscribe_to_topic(topic)).await {
            Some(Ok(())) => Ok(QoS::AtLeastOnce),
            Some(Err(ReasonCode::Success)) => Ok(QoS::AtMostOnce),
            Some(Err(ReasonCode::NetworkError)) => Err(self.lost(ReasonCode::NetworkError)),
            Some(Err(reason)) => {
                debug!("SUBSCRIBE failed: {}", Debug2Format(&reason));
                Err(TransportError::Subscribe)
            }
            None => Err(TransportError::Subscribe),
        }
    }

    async fn poll_inbound<S: InboundSink>(&mut self, sink: &S) -> Result<usize, TransportError> {
        let window = Duration::from_millis(POLL_WINDOW_MS);
        let mut delivered = 0;
        while delivered < MAX_INBOUND_PER_POLL {
            let session = self.session.as_mut().ok_or(TransportError::NotConnected)?;
            match bounded(window, session.receive_message()).await {
                Some(Ok((topic, payload))) => {
                    self.received = self.received.wrapping_add(1);
                    sink.on_message(topic, payload, self.received);
                    delivered += 1;
                }
                Some(Err(ReasonCode::NetworkError)) => {
                    return Err(self.lost(ReasonCode::NetworkError))
                }
                Some(Err(reason)) => {
                    debug!("Receive failed: {}", Debug2Format(&reason));
                    return Err(TransportError::Protocol);
                }
                None => break,
            }
        }
        Ok(delivered)
    }

    fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    async fn close(&mut self) {
        if let Some(mut session) = self.session.take() {
            if bounded(self.timeout, session.disconnect()).await.is_none() {
                debug!("DISCONNECT timed out, dropping the socket");
            }
        }
    }
}
