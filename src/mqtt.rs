use std::future::Future;
use std::time::Duration;

use rumqttc::{AsyncClient, ConnectionError, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::error::{BusError, ConnectError};

const REQUEST_CHANNEL_CAPACITY: usize = 10;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

const DISCONNECT_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub host: String,

    pub port: u16,

    pub client_id: String,

    pub username: Option<String>,

    pub password: Option<String>,

    pub keep_alive: Duration,

    /// Consecutive failures tolerated before the first successful connect.
    pub connect_attempts: u32,
}

/// What the dispatcher sees of the message bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusEvent {
    Connected,
    MessageReceived { topic: String, payload: Vec<u8> },
    Disconnected,
}

pub trait Bus {
    fn next_event(&mut self) -> impl Future<Output = Result<BusEvent, BusError>>;

    fn subscribe(&self, filter: &str) -> impl Future<Output = Result<(), BusError>>;

    fn disconnect(&mut self) -> impl Future<Output = Result<(), BusError>>;
}

/// rumqttc client and event loop driven from a single task.
pub struct MqttBus {
    client: AsyncClient,
    eventloop: EventLoop,
    host: String,
    port: u16,
    connect_attempts: u32,
    failed_attempts: u32,
    ever_connected: bool,
    reconnect_pending: bool,
}

impl MqttBus {
    pub fn new(config: MqttConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(config.keep_alive);
        options.set_clean_session(true);
        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.as_deref().unwrap_or_default());
        }

        let (client, eventloop) = AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY);

        Self {
            client,
            eventloop,
            host: config.host,
            port: config.port,
            connect_attempts: config.connect_attempts.max(1),
            failed_attempts: 0,
            ever_connected: false,
            reconnect_pending: false,
        }
    }

    fn on_poll_error(&mut self, err: ConnectionError) -> Result<Option<BusEvent>, BusError> {
        if matches!(err, ConnectionError::RequestsDone) {
            return Err(BusError::Closed);
        }

        if self.ever_connected {
            warn!("MQTT connection lost: {err}");
            self.reconnect_pending = true;
            return Ok(Some(BusEvent::Disconnected));
        }

        self.failed_attempts += 1;
        if self.failed_attempts >= self.connect_attempts {
            return Err(ConnectError::BrokerUnavailable {
                host: self.host.clone(),
                port: self.port,
                attempts: self.failed_attempts,
                source: err,
            }
            .into());
        }

        warn!(
            attempt = self.failed_attempts,
            "failed to connect to MQTT broker {}:{}: {err}", self.host, self.port
        );
        self.reconnect_pending = true;
        Ok(None)
    }
}

impl Bus for MqttBus {
    async fn next_event(&mut self) -> Result<BusEvent, BusError> {
        loop {
            if self.reconnect_pending {
                self.reconnect_pending = false;
                sleep(RECONNECT_DELAY).await;
            }

            match self.eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    debug!(?ack, "MQTT ConnAck");
                    self.ever_connected = true;
                    self.failed_attempts = 0;
                    return Ok(BusEvent::Connected);
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    return Ok(BusEvent::MessageReceived {
                        topic: publish.topic,
                        payload: publish.payload.to_vec(),
                    });
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    info!("MQTT broker closed the session");
                    return Ok(BusEvent::Disconnected);
                }
                Ok(_) => {}
                Err(err) => {
                    if let Some(event) = self.on_poll_error(err)? {
                        return Ok(event);
                    }
                }
            }
        }
    }

    async fn subscribe(&self, filter: &str) -> Result<(), BusError> {
        self.client.subscribe(filter, QoS::AtMostOnce).await?;
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), BusError> {
        self.client.disconnect().await?;

        // The Disconnect packet only leaves once the event loop is polled.
        let flushed = timeout(DISCONNECT_FLUSH_TIMEOUT, async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        })
        .await;

        if flushed.is_err() {
            debug!("timed out flushing MQTT disconnect");
        }

        Ok(())
    }
}
