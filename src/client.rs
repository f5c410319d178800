//! The client core — wires transport, session, sync engine, and the
//! state machine together, and exposes the outward surface the UI layer
//! consumes.
//!
//! ```text
//!                    ┌──────────────────────────────────────────┐
//!  connect() ───────▶│ commands ─▶ state driver ─▶ transport    │
//!  set_value() ─────▶│             │        │                   │
//!                    │             ▼        ▼                   │
//!  app/device state ◀│  StateCells  sync ─▶ session ─▶ worker   │
//!  property lists   ◀│              ▲          │                │
//!                    │              └── event pump ◀────────────│
//!                    └──────────────────────────────────────────┘
//! ```
//!
//! All protocol work happens on one dedicated worker thread running a
//! small cooperative executor with three tasks: the session worker, the
//! state driver, and the event pump.  Callers interact through
//! channels, signals, and observable cells, so every public method is
//! safe from any thread.

use std::rc::Rc;
use std::sync::Arc;
use std::thread::JoinHandle;

use edge_executor::LocalExecutor;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use embassy_time::Timer;
use futures_lite::future;
use log::{debug, info, warn};

use crate::config::LinkConfig;
use crate::error::{Error, Result};
use crate::fsm::{ApplicationState, DeviceState, Input, device_state, transition};
use crate::observe::StateCell;
use crate::ports::{ConnectivityFeed, Notice, NoticeSink};
use crate::props::sync::{FetchOutcome, GroupContent, SyncEngine};
use crate::props::{GroupId, PropertyUpdate};
use crate::session::Session;
use crate::transport::{ConnectionState, LinkTransport};
use crate::wire::frame::{ControllerEvent, FunctionId};

/// Commands from the embedding application to the state driver.
enum Command {
    Connect(String),
    Disconnect,
}

const COMMAND_QUEUE_DEPTH: usize = 8;

struct ClientShared {
    config: LinkConfig,
    session: Session,
    sync: SyncEngine,
    app_state: StateCell<ApplicationState>,
    device_state: StateCell<DeviceState>,
    commands: Channel<CriticalSectionRawMutex, Command, COMMAND_QUEUE_DEPTH>,
    stop: Signal<CriticalSectionRawMutex, ()>,
}

struct WorkerCtx<T> {
    shared: Arc<ClientShared>,
    transport: T,
    connectivity: Arc<StateCell<bool>>,
    sink: Arc<dyn NoticeSink>,
}

/// Handle to one controller session.
///
/// Dropping the client stops the worker thread; in-flight requests fail
/// and observers see the last published state.
pub struct ControllerClient {
    shared: Arc<ClientShared>,
    worker: Option<JoinHandle<()>>,
}

impl ControllerClient {
    /// Start the client: spawns the worker thread and begins in
    /// `WaitingForConnectivity`.
    pub fn spawn<T: LinkTransport>(
        transport: T,
        config: LinkConfig,
        connectivity: &ConnectivityFeed,
        sink: impl NoticeSink,
    ) -> Result<Self> {
        config.validate()?;

        let session = Session::new(&config);
        let shared = Arc::new(ClientShared {
            sync: SyncEngine::new(session.clone()),
            session,
            app_state: StateCell::new(ApplicationState::WaitingForConnectivity),
            device_state: StateCell::new(DeviceState::Disconnected),
            commands: Channel::new(),
            stop: Signal::new(),
            config,
        });

        let ctx = WorkerCtx {
            shared: shared.clone(),
            transport,
            connectivity: connectivity.cell(),
            sink: Arc::new(sink),
        };
        let worker = std::thread::spawn(move || run_worker(ctx));

        Ok(Self {
            shared,
            worker: Some(worker),
        })
    }

    // ── Commands ──────────────────────────────────────────────

    /// Ask the driver to connect to the peripheral at `address`.
    /// Progress is reported through the application state cell.
    pub fn connect(&self, address: &str) {
        if self
            .shared
            .commands
            .try_send(Command::Connect(address.to_owned()))
            .is_err()
        {
            warn!("client: command queue full, connect dropped");
        }
    }

    /// Ask the driver to tear the session down.
    pub fn disconnect(&self) {
        if self.shared.commands.try_send(Command::Disconnect).is_err() {
            warn!("client: command queue full, disconnect dropped");
        }
    }

    /// Round-trip liveness probe.
    pub async fn ping(&self) -> Result<()> {
        self.shared
            .session
            .request(FunctionId::Ping, |_| {})
            .await
            .map(|_| ())
    }

    /// Apply a user edit to a property and push it to the controller.
    pub async fn set_property_value(
        &self,
        group: GroupId,
        id: i32,
        update: PropertyUpdate,
    ) -> Result<()> {
        self.shared.sync.set_value(group, id, update).await
    }

    /// Manually refetch a group (one bulk round-trip).
    pub async fn refresh(&self, group: GroupId) -> Result<FetchOutcome> {
        self.shared.sync.fetch(group).await
    }

    /// Manually refetch a group id-by-id with loading progress.
    pub async fn refresh_itemized(&self, group: GroupId) -> Result<FetchOutcome> {
        self.shared.sync.fetch_with_progress(group).await
    }

    // ── Observables ───────────────────────────────────────────

    pub fn application_state(&self) -> ApplicationState {
        self.shared.app_state.get()
    }

    pub fn device_state(&self) -> DeviceState {
        self.shared.device_state.get()
    }

    /// Observable application state for watchers.
    pub fn application_states(&self) -> &StateCell<ApplicationState> {
        &self.shared.app_state
    }

    /// Observable device-link state for watchers.
    pub fn device_states(&self) -> &StateCell<DeviceState> {
        &self.shared.device_state
    }

    /// Observable property list of a group.
    pub fn properties(&self, group: GroupId) -> &StateCell<GroupContent> {
        self.shared.sync.content(group)
    }

    /// Stop the worker thread.  Equivalent to dropping the client.
    pub fn shutdown(self) {}
}

impl Drop for ControllerClient {
    fn drop(&mut self) {
        self.shared.stop.signal(());
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Worker thread
// ───────────────────────────────────────────────────────────────

fn run_worker<T: LinkTransport>(ctx: WorkerCtx<T>) {
    let executor: LocalExecutor<'_, 8> = LocalExecutor::new();
    let ctx = Rc::new(ctx);

    executor.spawn(session_task(ctx.clone())).detach();
    executor.spawn(drive(ctx.clone())).detach();
    executor.spawn(pump_events(ctx.clone())).detach();

    info!("client: worker started");
    future::block_on(executor.run(ctx.shared.stop.wait()));
    info!("client: worker stopped");
}

async fn session_task<T: LinkTransport>(ctx: Rc<WorkerCtx<T>>) {
    ctx.shared.session.run(&ctx.transport).await;
}

/// Event pump: every "properties changed" notification triggers exactly
/// one refetch of the named group.
async fn pump_events<T: LinkTransport>(ctx: Rc<WorkerCtx<T>>) {
    loop {
        let ControllerEvent::PropertiesChanged(group) = ctx.shared.session.next_event().await;
        info!("client: controller reports {group:?} changed, refetching");
        match ctx.shared.sync.fetch(group).await {
            Ok(_) => {}
            // A stale event racing a disconnect is not worth a notice.
            Err(Error::NotConnected) => debug!("client: resync skipped, link down"),
            Err(error) => ctx.sink.notice(&Notice::SyncFailed { group, error }),
        }
    }
}

// ───────────────────────────────────────────────────────────────
// State driver
// ───────────────────────────────────────────────────────────────

fn publish(shared: &ClientShared, state: ApplicationState) {
    shared.app_state.set(state);
    shared.device_state.set_if_changed(device_state(state));
}

/// Drives the application state machine: waits for the input each state
/// can produce, performs the side effects, and feeds the pure transition
/// table.
async fn drive<T: LinkTransport>(ctx: Rc<WorkerCtx<T>>) {
    let mut state = ApplicationState::WaitingForConnectivity;
    let mut target: Option<String> = None;
    publish(&ctx.shared, state);

    loop {
        let input = next_input(&ctx, state, &mut target).await;
        match transition(state, input) {
            Some(next) => {
                info!("app: {state:?} --{input:?}--> {next:?}");
                state = next;
                publish(&ctx.shared, state);
            }
            None => debug!("app: {input:?} ignored in {state:?}"),
        }
    }
}

async fn next_input<T: LinkTransport>(
    ctx: &Rc<WorkerCtx<T>>,
    state: ApplicationState,
    target: &mut Option<String>,
) -> Input {
    match state {
        ApplicationState::WaitingForConnectivity => {
            ctx.connectivity.watch().until(|on| *on).await;
            Input::ConnectivityEnabled
        }

        ApplicationState::Disconnected => {
            future::or(
                async {
                    loop {
                        match ctx.shared.commands.receive().await {
                            Command::Connect(address) => {
                                *target = Some(address);
                                return Input::DevicePicked;
                            }
                            Command::Disconnect => {}
                        }
                    }
                },
                async {
                    ctx.connectivity.watch().until(|on| !*on).await;
                    Input::ConnectivityDisabled
                },
            )
            .await
        }

        ApplicationState::Connecting => {
            let Some(address) = target.clone() else {
                return Input::Disconnected;
            };
            match ctx.transport.connect(&address).await {
                Ok(()) => Input::Connected,
                Err(error) => {
                    warn!("app: connect to {address} failed: {error}");
                    let input = if error == Error::TransportUnavailable {
                        Input::ConnectivityDisabled
                    } else {
                        Input::Disconnected
                    };
                    ctx.sink.notice(&Notice::ConnectFailed { error });
                    input
                }
            }
        }

        ApplicationState::Syncing => {
            enum SyncEnd {
                Done(core::result::Result<(), (GroupId, Error)>),
                LinkDown,
            }
            let end = future::or(
                async { SyncEnd::Done(sync_all(ctx).await) },
                async {
                    ctx.transport
                        .state()
                        .watch()
                        .until(|s| *s != ConnectionState::Connected)
                        .await;
                    SyncEnd::LinkDown
                },
            )
            .await;

            match end {
                SyncEnd::Done(Ok(())) => Input::Synced,
                SyncEnd::Done(Err((group, error))) => {
                    // A fetch that failed because the link went down is a
                    // disconnect, not a sync failure.
                    if ctx.transport.state().get() != ConnectionState::Connected {
                        Input::Disconnected
                    } else {
                        ctx.sink.notice(&Notice::SyncFailed { group, error });
                        ctx.transport.disconnect();
                        Input::SyncFailed
                    }
                }
                SyncEnd::LinkDown => Input::Disconnected,
            }
        }

        ApplicationState::Ready => {
            future::or(
                async {
                    loop {
                        match ctx.shared.commands.receive().await {
                            Command::Disconnect => {
                                ctx.transport.disconnect();
                                return Input::Disconnected;
                            }
                            Command::Connect(_) => {
                                warn!("app: already connected; disconnect first");
                            }
                        }
                    }
                },
                future::or(
                    async {
                        ctx.transport
                            .state()
                            .watch()
                            .until(|s| *s != ConnectionState::Connected)
                            .await;
                        Input::ConnectionLost
                    },
                    async {
                        ctx.connectivity.watch().until(|on| !*on).await;
                        Input::ConnectivityDisabled
                    },
                ),
            )
            .await
        }

        ApplicationState::Reconnecting => reconnect(ctx, target.as_deref()).await,
    }
}

/// Fetch every group, stopping at the first failure.
async fn sync_all<T: LinkTransport>(
    ctx: &Rc<WorkerCtx<T>>,
) -> core::result::Result<(), (GroupId, Error)> {
    for group in GroupId::ALL {
        if let Err(e) = ctx.shared.sync.fetch(group).await {
            return Err((group, e));
        }
    }
    Ok(())
}

/// Bounded reconnection: fixed delay between attempts, one notice on
/// exhaustion, never one per attempt.
async fn reconnect<T: LinkTransport>(ctx: &Rc<WorkerCtx<T>>, target: Option<&str>) -> Input {
    let Some(address) = target else {
        return Input::Disconnected;
    };
    let attempts = ctx.shared.config.reconnect_attempts;

    for attempt in 1..=attempts {
        Timer::after(ctx.shared.config.reconnect_delay()).await;
        if !ctx.connectivity.get() {
            return Input::ConnectivityDisabled;
        }
        match ctx.transport.connect(address).await {
            Ok(()) => {
                info!("app: reconnected on attempt {attempt}/{attempts}");
                return Input::Connected;
            }
            Err(e) => debug!("app: reconnect attempt {attempt}/{attempts} failed: {e}"),
        }
    }

    ctx.sink.notice(&Notice::ReconnectExhausted { attempts });
    Input::Disconnected
}
