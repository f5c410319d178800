//! Request/response session over the raw transport.
//!
//! The session enforces the protocol's central simplification: exactly
//! one request is in flight at a time.  Requests are queued FIFO; a
//! single worker dequeues one, writes it, and — unless it is
//! fire-and-forget — waits for the correlated response before touching
//! the queue again.  The peer processes requests strictly in order, so
//! no request-id correlation is needed.
//!
//! ```text
//! callers ──send──▶ ┌───────────────┐        ┌───────────────┐
//!                   │ request queue │──────▶ │ worker task   │──▶ transport
//! caller ◀─signal── └───────────────┘        │  (one at a    │◀── packets
//!                                            │   time)       │
//! events  ◀──────────────────────────────────┴───────────────┘
//! ```
//!
//! While the worker waits for a response, inbound frames carrying the
//! reserved event function id are routed to the event queue; everything
//! else feeds the reassembler.  Once reassembly of a multi-packet
//! response has begun, every packet is a continuation — the packet
//! count is the wire's only delimiter.
//!
//! A transport disconnect fails the in-flight request and drains the
//! queue with `NotConnected`; the worker then parks until the link
//! reports `Connected` again.  Nothing is retried here — reissuing
//! requests after a reconnect is the caller's decision.

use std::sync::Arc;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::{Duration, Instant, with_timeout};
use log::{debug, warn};

use crate::config::LinkConfig;
use crate::error::{Error, Result};
use crate::transport::{ConnectionState, LinkTransport, Packet};
use crate::wire::bytes::ByteWriter;
use crate::wire::frame::{self, ControllerEvent, FunctionId};
use crate::wire::reassemble::Reassembler;

/// Pending requests the queue will hold before enqueueing backpressures.
const REQUEST_QUEUE_DEPTH: usize = 32;

/// Undelivered controller events held for the consumer.
const EVENT_QUEUE_DEPTH: usize = 16;

type Completion = Arc<Signal<CriticalSectionRawMutex, Result<Vec<u8>>>>;

struct Request {
    function: FunctionId,
    body: Vec<u8>,
    completion: Completion,
    expects_response: bool,
}

impl Request {
    fn complete(self, result: Result<Vec<u8>>) {
        self.completion.signal(result);
    }
}

struct Shared {
    requests: Channel<CriticalSectionRawMutex, Request, REQUEST_QUEUE_DEPTH>,
    events: Channel<CriticalSectionRawMutex, ControllerEvent, EVENT_QUEUE_DEPTH>,
    request_timeout: Duration,
}

/// Handle to the session.  Cheap to clone; all clones share the same
/// queue and worker.
#[derive(Clone)]
pub struct Session {
    shared: Arc<Shared>,
}

impl Session {
    pub fn new(config: &LinkConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                requests: Channel::new(),
                events: Channel::new(),
                request_timeout: config.request_timeout(),
            }),
        }
    }

    /// Issue a request and wait for the response body.
    ///
    /// Completion is guaranteed: success, a typed failure, or a timeout
    /// bounded by the configured request budget.
    pub async fn request(
        &self,
        function: FunctionId,
        write_body: impl FnOnce(&mut ByteWriter),
    ) -> Result<Vec<u8>> {
        self.submit(function, write_body, true).await
    }

    /// Issue a fire-and-forget request: completes as soon as the write
    /// has been handed to the transport.
    pub async fn request_no_response(
        &self,
        function: FunctionId,
        write_body: impl FnOnce(&mut ByteWriter),
    ) -> Result<()> {
        self.submit(function, write_body, false).await.map(|_| ())
    }

    async fn submit(
        &self,
        function: FunctionId,
        write_body: impl FnOnce(&mut ByteWriter),
        expects_response: bool,
    ) -> Result<Vec<u8>> {
        let mut w = ByteWriter::new();
        write_body(&mut w);
        let completion: Completion = Arc::new(Signal::new());
        self.shared
            .requests
            .send(Request {
                function,
                body: w.into_inner(),
                completion: completion.clone(),
                expects_response,
            })
            .await;
        completion.wait().await
    }

    /// Next unsolicited controller event, in arrival order.
    pub async fn next_event(&self) -> ControllerEvent {
        self.shared.events.receive().await
    }

    /// Non-blocking event poll.
    pub fn try_next_event(&self) -> Option<ControllerEvent> {
        self.shared.events.try_receive().ok()
    }

    /// The worker loop.  Runs for the life of the session: parks until
    /// the transport connects, serves requests until it drops, drains
    /// the queue, repeats.
    pub async fn run<T: LinkTransport>(&self, transport: &T) {
        let mut link = transport.state().watch();
        loop {
            link.until(|s| *s == ConnectionState::Connected).await;
            debug!("session: link up");
            self.serve(transport).await;
            debug!("session: link down, failing queued requests");
            while let Ok(request) = self.shared.requests.try_receive() {
                request.complete(Err(Error::NotConnected));
            }
        }
    }

    /// Serve requests until the transport fails.
    async fn serve<T: LinkTransport>(&self, transport: &T) {
        let mut reassembler = Reassembler::new();
        loop {
            enum Wakeup {
                Request(Request),
                Inbound(Result<Packet>),
            }

            let wakeup = futures_lite::future::or(
                async { Wakeup::Request(self.shared.requests.receive().await) },
                async { Wakeup::Inbound(transport.receive().await) },
            )
            .await;

            match wakeup {
                Wakeup::Inbound(Err(e)) => {
                    debug!("session: receive failed while idle: {e}");
                    return;
                }
                Wakeup::Inbound(Ok(packet)) => self.route_unsolicited(&packet),
                Wakeup::Request(request) => {
                    if !self.execute(transport, request, &mut reassembler).await {
                        return;
                    }
                }
            }
        }
    }

    /// Write one request and settle its completion.  Returns `false`
    /// when the transport failed and the serve loop must end.
    async fn execute<T: LinkTransport>(
        &self,
        transport: &T,
        request: Request,
        reassembler: &mut Reassembler,
    ) -> bool {
        let message = frame::build_request(request.function, |w| w.put_bytes(&request.body));

        if let Err(e) = transport.send(&message).await {
            warn!("session: write failed: {e}");
            request.complete(Err(e));
            return false;
        }

        if !request.expects_response {
            request.complete(Ok(Vec::new()));
            return true;
        }

        reassembler.reset();
        let deadline = Instant::now() + self.shared.request_timeout;

        loop {
            let now = Instant::now();
            let remaining = if now >= deadline {
                Duration::from_ticks(0)
            } else {
                deadline - now
            };
            let packet = match with_timeout(remaining, transport.receive()).await {
                Err(_) => {
                    let (received, expected) = reassembler.progress();
                    let error = if received == 0 {
                        Error::NoResponse
                    } else {
                        Error::PacketLoss { received, expected }
                    };
                    warn!("session: {:?} request failed: {error}", request.function);
                    reassembler.reset();
                    request.complete(Err(error));
                    return true;
                }
                Ok(Err(e)) => {
                    request.complete(Err(e));
                    return false;
                }
                Ok(Ok(packet)) => packet,
            };

            // Events can interleave ahead of the response, but never
            // inside a multi-packet body.
            if !reassembler.is_active() && frame::is_event(&packet) {
                self.route_unsolicited(&packet);
                continue;
            }

            match reassembler.feed(&packet) {
                Err(e) => {
                    request.complete(Err(e));
                    return true;
                }
                Ok(None) => {}
                Ok(Some(response)) => {
                    if response.function != request.function as u8 {
                        // Correlation is positional; a mismatched id means
                        // the streams slipped, but the body still answers
                        // the only request that can be pending.
                        warn!(
                            "session: response function {} for request {:?}",
                            response.function, request.function
                        );
                    }
                    if response.status == 0 {
                        request.complete(Ok(response.body));
                    } else {
                        let message = String::from_utf8_lossy(&response.body).into_owned();
                        request.complete(Err(Error::Remote {
                            status: response.status,
                            message,
                        }));
                    }
                    return true;
                }
            }
        }
    }

    fn route_unsolicited(&self, packet: &Packet) {
        if frame::is_event(packet) {
            match frame::parse_event(packet) {
                Ok(event) => {
                    if self.shared.events.try_send(event).is_err() {
                        warn!("session: event queue full, dropping {event:?}");
                    }
                }
                Err(e) => warn!("session: bad event frame: {e}"),
            }
        } else {
            warn!(
                "session: stray frame while idle (function {:?})",
                packet.first()
            );
        }
    }
}
