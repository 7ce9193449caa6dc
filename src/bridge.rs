//! Message-to-point pipeline and the event loop that drives it.
//!
//! Every inbound message is handled on its own: decode the topic, convert the
//! payload, build a point and write it. A failure at any stage drops that one
//! message and is logged; only bus-level errors end the loop.

use std::future::Future;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::error::{BusError, DecodeError, ProcessError};
use crate::influx::PointSink;
use crate::mqtt::{Bus, BusEvent};
use crate::point::{Point, build_point};
use crate::sensor::{convert, decode_topic, topic_filters};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    Disconnected,
    Connecting,
    Connected,
}

/// Result of handling a single bus event.
#[derive(Debug)]
pub enum Outcome {
    Subscribed(usize),
    Written(Point),
    Dropped(ProcessError),
    Ignored,
    Disconnected,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub written: u64,
    pub dropped: u64,
}

pub struct Dispatcher<W> {
    sink: W,
    state: BridgeState,
    stats: Stats,
}

impl<W: PointSink> Dispatcher<W> {
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            state: BridgeState::Disconnected,
            stats: Stats::default(),
        }
    }

    pub fn sink(&self) -> &W {
        &self.sink
    }

    pub fn state(&self) -> BridgeState {
        self.state
    }

    pub fn stats(&self) -> Stats {
        self.stats
    }

    pub fn mark_connecting(&mut self) {
        self.state = BridgeState::Connecting;
    }

    pub fn mark_disconnected(&mut self) {
        self.state = BridgeState::Disconnected;
    }

    /// Advances the state machine by one event.
    ///
    /// Only a failed subscribe is returned as an error; per-message failures
    /// come back as [`Outcome::Dropped`].
    pub async fn handle<B: Bus>(&mut self, event: BusEvent, bus: &B) -> Result<Outcome, BusError> {
        match event {
            BusEvent::Connected => {
                info!("connected to MQTT broker");
                self.state = BridgeState::Connected;

                let filters = topic_filters();
                let count = filters.len();
                for filter in filters {
                    bus.subscribe(filter).await?;
                    info!(filter, "subscribed");
                }

                Ok(Outcome::Subscribed(count))
            }
            BusEvent::MessageReceived { topic, payload } => {
                if self.state != BridgeState::Connected {
                    debug!(%topic, state = ?self.state, "ignoring message outside a session");
                    return Ok(Outcome::Ignored);
                }

                match self.process(&topic, &payload, Utc::now()).await {
                    Ok(point) => {
                        self.stats.written += 1;
                        Ok(Outcome::Written(point))
                    }
                    Err(err) => {
                        self.stats.dropped += 1;
                        log_dropped(&topic, &err);
                        Ok(Outcome::Dropped(err))
                    }
                }
            }
            BusEvent::Disconnected => {
                warn!("disconnected from MQTT broker, waiting for reconnect");
                self.state = BridgeState::Connecting;
                Ok(Outcome::Disconnected)
            }
        }
    }

    async fn process(
        &self,
        topic: &str,
        payload: &[u8],
        received_at: DateTime<Utc>,
    ) -> Result<Point, ProcessError> {
        let decoded = decode_topic(topic)?;
        let reading = convert(decoded.sensor_type, payload)?;

        let spec = decoded.sensor_type.spec();
        info!(
            "{} for {}: {}{}",
            spec.label, decoded.sensor_name, reading.value, reading.unit
        );

        let point = build_point(&decoded, &reading).with_timestamp(received_at);
        self.sink.write(&point).await?;

        Ok(point)
    }
}

fn log_dropped(topic: &str, err: &ProcessError) {
    match err {
        ProcessError::Decode(DecodeError::UnexpectedFormat(_)) => warn!("{err}"),
        ProcessError::Decode(DecodeError::UnknownCategory(_)) => {
            info!(%topic, "dropping message: {err}")
        }
        ProcessError::Convert(_) => error!(%topic, "failed to convert reading: {err}"),
        ProcessError::Write(_) => error!(%topic, "failed to write point: {err}"),
    }
}

/// Pumps bus events through the dispatcher until `shutdown` resolves.
///
/// Shutdown is only observed between events, so a message already being
/// processed is always finished. The bus is disconnected on every exit path.
pub async fn run<B, W, F>(
    bus: &mut B,
    dispatcher: &mut Dispatcher<W>,
    shutdown: F,
) -> Result<Stats, BusError>
where
    B: Bus,
    W: PointSink,
    F: Future<Output = ()>,
{
    dispatcher.mark_connecting();
    tokio::pin!(shutdown);

    let result = loop {
        let event = tokio::select! {
            biased;
            () = &mut shutdown => {
                info!("shutdown requested");
                break Ok(());
            }
            event = bus.next_event() => event,
        };

        let event = match event {
            Ok(event) => event,
            Err(err) => break Err(err),
        };

        if let Err(err) = dispatcher.handle(event, &*bus).await {
            break Err(err);
        }
    };

    dispatcher.mark_disconnected();
    if let Err(err) = bus.disconnect().await {
        warn!("failed to disconnect from MQTT broker: {err}");
    }

    let stats = dispatcher.stats();
    info!(written = stats.written, dropped = stats.dropped, "bridge stopped");

    result.map(|()| stats)
}
