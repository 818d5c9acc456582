use std::{
    any::Any,
    io,
    net::SocketAddr,
    panic::AssertUnwindSafe,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;

use crate::{
    contract,
    messages::{CallRequest, Failure, Reply},
    protocol::CallChannel,
    service_tasks::{ServiceTaskGuard, ServiceTasks},
    traits::{DispatchTable, MethodKey},
    EndpointAddress, RemoteInterface, RemoteInterfaceDescriptor, RmiError, RmiErrorKind,
};

/// How long one accept waits before the listening task checks for a stop
/// request again.
const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Error policy of a [`Skeleton`].
///
/// Every method has a default, so an implementation only overrides what it
/// wants to change. Hooks run on the skeleton's own tasks.
#[async_trait]
pub trait SkeletonHooks: Send + Sync + 'static {
    /// Called once each time the listening task exits, with the error that
    /// ended it, or `None` after a call to `stop`. The listening socket is
    /// already closed at this point.
    ///
    /// The default waits until every outstanding service task has finished,
    /// so that nothing is using the server object once it returns. An
    /// override that wants the same guarantee should call
    /// [`ServiceTasks::wait_all`].
    async fn stopped(&self, _cause: Option<RmiError>, tasks: &ServiceTasks) {
        tasks.wait_all().await;
    }

    /// Called when accepting a connection fails. Returns whether the
    /// listening task should keep accepting; the default gives up. The same
    /// error is handed to `stopped` if the task exits because of it.
    fn listen_error(&self, _error: &RmiError) -> bool {
        false
    }

    /// Called when a service task hits an RMI failure: the request could not
    /// be read or resolved, or the reply could not be written. Whatever could
    /// be reported to the caller already has been.
    fn service_error(&self, _error: RmiError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultHooks;

impl SkeletonHooks for DefaultHooks {}

/// Where the listening task gets its connections from.
#[async_trait]
trait Acceptor: Send + Sync + 'static {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
}

#[async_trait]
impl Acceptor for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }
}

struct Shared<I: ?Sized, H> {
    interface: RemoteInterfaceDescriptor,
    server: Arc<I>,
    dispatch: DispatchTable<I>,
    hooks: H,
    tasks: ServiceTasks,
    address: Mutex<Option<EndpointAddress>>,
}

/// One run of the listening task, from `start` until `stopped` returns.
struct Run {
    stop: CancellationToken,
    finished: CancellationToken,
}

impl Run {
    fn is_alive(&self) -> bool {
        !self.finished.is_cancelled()
    }
}

/// RMI skeleton: serves the methods of remote interface `I`, implemented by
/// one server object, to stubs connecting over TCP.
///
/// A listening task accepts connections; every accepted connection gets its
/// own service task, which runs a single call against the server object.
/// Stopping ends the listening task but lets service tasks finish.
///
/// Dropping a skeleton signals it to stop.
pub struct Skeleton<I: RemoteInterface + ?Sized, H: SkeletonHooks = DefaultHooks> {
    shared: Arc<Shared<I, H>>,
    run: Mutex<Option<Run>>,
}

impl<I: RemoteInterface + ?Sized> Skeleton<I> {
    /// Creates a skeleton whose address is picked by the system on `start`.
    ///
    /// # Panics
    ///
    /// Panics if `I` is not a valid remote interface.
    #[must_use]
    pub fn new(server: Arc<I>) -> Self {
        Self::with_hooks(server, None, DefaultHooks)
    }

    /// Creates a skeleton that will listen on `address`. Use this when the
    /// port has to be known in advance.
    ///
    /// # Panics
    ///
    /// Panics if `I` is not a valid remote interface.
    #[must_use]
    pub fn with_address(server: Arc<I>, address: EndpointAddress) -> Self {
        Self::with_hooks(server, Some(address), DefaultHooks)
    }
}

impl<I: RemoteInterface + ?Sized, H: SkeletonHooks> Skeleton<I, H> {
    /// # Panics
    ///
    /// Panics if `I` is not a valid remote interface.
    #[must_use]
    pub fn with_hooks(server: Arc<I>, address: Option<EndpointAddress>, hooks: H) -> Self {
        let shared = Shared::new(server, address, hooks);
        contract::enforce(&shared.interface);
        Self {
            shared: Arc::new(shared),
            run: Mutex::new(None),
        }
    }

    /// The address stubs should connect to. Unset until `start` if none was
    /// given at construction; after that, it is the bound address.
    #[must_use]
    pub fn address(&self) -> Option<EndpointAddress> {
        lock(&self.shared.address).clone()
    }

    #[must_use]
    pub fn descriptor(&self) -> &RemoteInterfaceDescriptor {
        &self.shared.interface
    }

    #[must_use]
    pub fn hooks(&self) -> &H {
        &self.shared.hooks
    }

    /// Service tasks currently running.
    #[must_use]
    pub fn service_tasks(&self) -> &ServiceTasks {
        &self.shared.tasks
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.run).as_ref().map_or(false, Run::is_alive)
    }

    /// Binds the listening socket and launches the listening task. Returns
    /// once the task is spawned, without waiting for connections.
    ///
    /// # Errors
    ///
    /// `AlreadyRunning` if the skeleton has been started and the previous run
    /// has not finished stopping yet, `Bind` if the socket cannot be bound.
    pub async fn start(&self) -> Result<(), RmiError> {
        if self.is_running() {
            return Err(already_running());
        }

        let configured = self.address();
        let listener = match &configured {
            Some(address) => TcpListener::bind((address.host(), address.port())).await,
            None => TcpListener::bind(SocketAddr::from(([0, 0, 0, 0], 0))).await,
        }
        .map_err(|e| RmiError::from_io(RmiErrorKind::Bind, e))?;
        let local = listener
            .local_addr()
            .map_err(|e| RmiError::from_io(RmiErrorKind::Bind, e))?;

        let mut run = lock(&self.run);
        if run.as_ref().map_or(false, Run::is_alive) {
            return Err(already_running());
        }
        let bound = match configured {
            Some(address) if address.port() != 0 => address,
            Some(address) => EndpointAddress::new(address.host(), local.port()),
            None => EndpointAddress::from(local),
        };
        *lock(&self.shared.address) = Some(bound.clone());

        let stop = CancellationToken::new();
        let finished = CancellationToken::new();
        tokio::spawn(listen(
            self.shared.clone(),
            listener,
            bound,
            stop.clone(),
            finished.clone(),
        ));
        *run = Some(Run { stop, finished });
        Ok(())
    }

    /// Asks the listening task to exit. Returns immediately; the task notices
    /// within one poll interval, stops accepting, and calls `stopped`.
    /// Connections already accepted are served to completion.
    pub fn stop(&self) {
        if let Some(run) = lock(&self.run).as_ref() {
            run.stop.cancel();
        }
    }

    /// Waits until the current run, if any, has exited and `stopped` has
    /// returned.
    pub async fn join(&self) {
        let finished = lock(&self.run).as_ref().map(|run| run.finished.clone());
        if let Some(finished) = finished {
            finished.cancelled().await;
        }
    }
}

impl<I: RemoteInterface + ?Sized, H: SkeletonHooks> Drop for Skeleton<I, H> {
    fn drop(&mut self) {
        self.stop();
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn already_running() -> RmiError {
    RmiError::new(RmiErrorKind::AlreadyRunning, "skeleton is already running")
}

async fn listen<I: RemoteInterface + ?Sized, H: SkeletonHooks, A: Acceptor>(
    shared: Arc<Shared<I, H>>,
    listener: A,
    address: EndpointAddress,
    stop: CancellationToken,
    finished: CancellationToken,
) {
    // Marks the run finished even if a hook panics.
    let _finished = finished.drop_guard();

    tracing::info!("{} listening on {address}", shared.interface.name);
    let cause = accept_loop(&shared, &listener, &stop).await;
    drop(listener);
    match &cause {
        Some(error) => tracing::warn!("{} stopped listening: {error}", shared.interface.name),
        None => tracing::info!("{} stopped listening", shared.interface.name),
    }

    shared.hooks.stopped(cause, &shared.tasks).await;
}

async fn accept_loop<I: RemoteInterface + ?Sized, H: SkeletonHooks, A: Acceptor>(
    shared: &Arc<Shared<I, H>>,
    listener: &A,
    stop: &CancellationToken,
) -> Option<RmiError> {
    while !stop.is_cancelled() {
        match tokio::time::timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
            Err(_elapsed) => continue,
            Ok(Ok((stream, peer))) => {
                let guard = shared.tasks.register();
                tokio::spawn(serve(shared.clone(), stream, peer, guard));
            }
            Ok(Err(e)) => {
                let error = RmiError::from_io(RmiErrorKind::Listen, e);
                tracing::warn!("accept failed: {error}");
                if !shared.hooks.listen_error(&error) {
                    return Some(error);
                }
            }
        }
    }
    None
}

async fn serve<I: RemoteInterface + ?Sized, H: SkeletonHooks>(
    shared: Arc<Shared<I, H>>,
    stream: TcpStream,
    peer: SocketAddr,
    _guard: ServiceTaskGuard,
) {
    let mut channel = CallChannel::new(stream);

    let request = match channel.read_request().await {
        Ok(request) => request,
        Err(e) => {
            let error = RmiError::transport(e);
            tracing::warn!("bad request from {peer}: {error}");
            // Best effort; the peer may well be gone.
            let _ = channel.send_reply(&Reply::rmi_failure(error.clone())).await;
            shared.hooks.service_error(error);
            return;
        }
    };
    tracing::debug!("{peer} calls {}::{}", shared.interface.name, request.method);

    let reply = shared.dispatch(request).await;
    if let Reply::Failure(Failure::Rmi(error)) = &reply {
        tracing::warn!("call from {peer} failed: {error}");
        shared.hooks.service_error(error.clone());
    }

    match channel.send_reply(&reply).await {
        Ok(()) => {
            let _ = channel.close().await;
        }
        Err(e) => {
            let error = RmiError::transport(e);
            tracing::warn!("reply to {peer} lost: {error}");
            shared.hooks.service_error(error);
        }
    }
}

impl<I: RemoteInterface + ?Sized, H> Shared<I, H> {
    fn new(server: Arc<I>, address: Option<EndpointAddress>, hooks: H) -> Self {
        Self {
            interface: I::descriptor(),
            server,
            dispatch: I::dispatch_table(),
            hooks,
            tasks: ServiceTasks::new(),
            address: Mutex::new(address),
        }
    }

    async fn dispatch(&self, request: CallRequest) -> Reply {
        let key = MethodKey::new(request.method, request.parameter_types);
        let handler = match self.dispatch.get(&key) {
            Some(handler) => handler,
            None => {
                return Reply::rmi_failure(RmiError::new(
                    RmiErrorKind::MethodNotFound,
                    format!(
                        "{} has no method {}({})",
                        self.interface.name,
                        key.name,
                        key.parameter_types.join(", ")
                    ),
                ))
            }
        };

        let call = handler(self.server.clone(), request.arguments);
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(reply) => reply,
            Err(panic) => Reply::rmi_failure(RmiError::other(format!(
                "{}::{} panicked: {}",
                self.interface.name,
                key.name,
                panic_message(&*panic)
            ))),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    trait Idle: Send + Sync + 'static {}

    impl RemoteInterface for dyn Idle {
        fn descriptor() -> RemoteInterfaceDescriptor {
            RemoteInterfaceDescriptor::new("Idle", vec![])
        }

        fn dispatch_table() -> DispatchTable<Self> {
            DispatchTable::new()
        }
    }

    struct Nothing;

    impl Idle for Nothing {}

    /// Fails every accept, and asks for a stop once `stop_after` have failed.
    struct FailingAcceptor {
        attempts: AtomicUsize,
        stop_after: usize,
        stop: CancellationToken,
    }

    #[async_trait]
    impl Acceptor for FailingAcceptor {
        async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
            if self.attempts.fetch_add(1, Ordering::SeqCst) + 1 >= self.stop_after {
                self.stop.cancel();
            }
            Err(io::Error::new(io::ErrorKind::Other, "too many open files"))
        }
    }

    struct ListenPolicy {
        keep_accepting: bool,
        listen_errors: AtomicUsize,
        stopped_with: Mutex<Vec<Option<RmiError>>>,
    }

    #[async_trait]
    impl SkeletonHooks for ListenPolicy {
        async fn stopped(&self, cause: Option<RmiError>, tasks: &ServiceTasks) {
            tasks.wait_all().await;
            self.stopped_with.lock().unwrap().push(cause);
        }

        fn listen_error(&self, _error: &RmiError) -> bool {
            self.listen_errors.fetch_add(1, Ordering::SeqCst);
            self.keep_accepting
        }
    }

    async fn run_listener(
        keep_accepting: bool,
        stop_after: usize,
    ) -> Arc<Shared<dyn Idle, ListenPolicy>> {
        let hooks = ListenPolicy {
            keep_accepting,
            listen_errors: AtomicUsize::new(0),
            stopped_with: Mutex::new(Vec::new()),
        };
        let server: Arc<dyn Idle> = Arc::new(Nothing);
        let shared = Arc::new(Shared::new(server, None, hooks));

        let stop = CancellationToken::new();
        let finished = CancellationToken::new();
        let acceptor = FailingAcceptor {
            attempts: AtomicUsize::new(0),
            stop_after,
            stop: stop.clone(),
        };
        listen(
            shared.clone(),
            acceptor,
            EndpointAddress::new("127.0.0.1", 0),
            stop,
            finished.clone(),
        )
        .await;
        assert!(finished.is_cancelled());
        shared
    }

    #[tokio::test]
    async fn test_listen_error_keeps_accepting() {
        let shared = run_listener(true, 3).await;
        assert_eq!(shared.hooks.listen_errors.load(Ordering::SeqCst), 3);
        assert_eq!(*shared.hooks.stopped_with.lock().unwrap(), [None]);
    }

    #[tokio::test]
    async fn test_listen_error_ends_loop() {
        let shared = run_listener(false, usize::MAX).await;
        assert_eq!(shared.hooks.listen_errors.load(Ordering::SeqCst), 1);

        let stopped_with = shared.hooks.stopped_with.lock().unwrap().clone();
        assert_eq!(stopped_with.len(), 1);
        let cause = stopped_with[0].as_ref().unwrap();
        assert_eq!(cause.kind, RmiErrorKind::Listen);
        assert_eq!(cause.message, "too many open files");
    }

    #[test]
    fn test_panic_message() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("boom")), "boom");
        assert_eq!(panic_message(&42), "unknown panic");
    }
}
