//! Shared interrupt lines.
//!
//! Expander chips signal pending input changes by pulling an interrupt line low.  Several chips
//! are commonly wired to the same host GPIO, so the host side of a line is registered once in an
//! [`InterruptBridge`] and reference-counted by every [`Expander`](crate::Expander) using it.
//!
//! The bridge does not detect edges itself.  Whatever watches the GPIO (an edge-detection
//! callback, an ISR, a thread waiting on a character device) calls [`InterruptBridge::signal()`]
//! for each falling edge.  Every expander waiting in
//! [`service_interrupt()`](crate::Expander::service_interrupt) on that line is then woken and
//! polls its chip.
//!
//! ```ignore
//! // edge callback
//! BRIDGE.signal(17);
//!
//! // one task per expander
//! loop {
//!     let _ = expander.service_interrupt().await;
//! }
//! ```

use core::cell::RefCell;
use core::task::{Context, Poll, Waker};
use critical_section::Mutex;
use heapless::{LinearMap, Vec};
use log::{debug, trace, warn};

/// Identifier of a host GPIO line.
pub type LineId = u32;

/// Maximum number of registrations of one line, enough for every address of two 8-address chip
/// families on the same line.
pub const MAX_USERS_PER_LINE: usize = 16;

/// Host facility watching GPIO lines for falling edges.
pub trait EdgeSource {
    /// Handle of one watched line.
    type Handle;
    type Error: core::fmt::Debug;

    /// Export `line` as an input and start watching it for falling edges.
    fn watch(&mut self, line: LineId) -> Result<Self::Handle, Self::Error>;

    /// Stop delivering edges for a watched line.
    fn unwatch(&mut self, handle: &mut Self::Handle) -> Result<(), Self::Error>;

    /// Release the GPIO resource of a line.
    fn unexport(&mut self, handle: Self::Handle) -> Result<(), Self::Error>;
}

/// Errors from registering or releasing a shared interrupt line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("failed to watch GPIO line {0}")]
    Watch(LineId),
    #[error("failed to release GPIO line {0}")]
    Release(LineId),
    #[error("GPIO line {0} is not registered")]
    NotRegistered(LineId),
    #[error("no free slot to register GPIO line {0}")]
    Full(LineId),
}

/// One reference to a registered line, returned by [`InterruptBridge::register()`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Registration {
    line: LineId,
    user: u32,
    edges: u32,
}

impl Registration {
    pub fn line(&self) -> LineId {
        self.line
    }

    /// Edge count of the line at the time of registration.
    pub fn edges(&self) -> u32 {
        self.edges
    }
}

/// A registration and the waker of the task waiting for its next edge.
struct User {
    id: u32,
    waker: Option<Waker>,
}

struct Line<H> {
    handle: H,
    /// Number of edges seen since the line was watched, wrapping.
    edges: u32,
    next_user: u32,
    users: Vec<User, MAX_USERS_PER_LINE>,
}

/// Reference-counted registry of interrupt lines, shared by any number of expanders.
///
/// `N` is the number of distinct lines the bridge can hold.  Each line takes up to
/// [`MAX_USERS_PER_LINE`] registrations.
pub struct InterruptBridge<S: EdgeSource, const N: usize = 4> {
    source: Mutex<RefCell<S>>,
    lines: Mutex<RefCell<LinearMap<LineId, Line<S::Handle>, N>>>,
}

impl<S: EdgeSource, const N: usize> InterruptBridge<S, N> {
    pub fn new(source: S) -> Self {
        Self {
            source: Mutex::new(RefCell::new(source)),
            lines: Mutex::new(RefCell::new(LinearMap::new())),
        }
    }

    /// Add a reference to `line`, watching it if it was not registered yet.
    pub fn register(&self, line: LineId) -> Result<Registration, BridgeError> {
        critical_section::with(|cs| {
            let mut lines = self.lines.borrow_ref_mut(cs);
            if let Some(entry) = lines.get_mut(&line) {
                let id = entry.next_user;
                entry
                    .users
                    .push(User { id, waker: None })
                    .map_err(|_| BridgeError::Full(line))?;
                entry.next_user = id.wrapping_add(1);
                debug!("GPIO line {} now has {} users", line, entry.users.len());
                return Ok(Registration {
                    line,
                    user: id,
                    edges: entry.edges,
                });
            }
            if lines.len() == lines.capacity() {
                return Err(BridgeError::Full(line));
            }

            let mut source = self.source.borrow_ref_mut(cs);
            let handle = source.watch(line).map_err(|e| {
                warn!("watching GPIO line {} failed: {:?}", line, e);
                BridgeError::Watch(line)
            })?;
            let mut users = Vec::new();
            // capacity is at least one
            let _ = users.push(User { id: 0, waker: None });
            let entry = Line {
                handle,
                edges: 0,
                next_user: 1,
                users,
            };
            if let Err((_, entry)) = lines.insert(line, entry) {
                release(&mut *source, line, entry.handle)?;
                return Err(BridgeError::Full(line));
            }
            debug!("watching GPIO line {} for falling edges", line);
            Ok(Registration {
                line,
                user: 0,
                edges: 0,
            })
        })
    }

    /// Drop a reference to a line, releasing the GPIO once nobody uses it anymore.
    ///
    /// A task waiting for an edge through `registration` is woken.
    pub fn unregister(&self, registration: Registration) -> Result<(), BridgeError> {
        let line = registration.line;
        critical_section::with(|cs| {
            let mut lines = self.lines.borrow_ref_mut(cs);
            let entry = lines
                .get_mut(&line)
                .ok_or(BridgeError::NotRegistered(line))?;
            let pos = entry
                .users
                .iter()
                .position(|u| u.id == registration.user)
                .ok_or(BridgeError::NotRegistered(line))?;
            let user = entry.users.swap_remove(pos);
            if let Some(waker) = user.waker {
                waker.wake();
            }
            if !entry.users.is_empty() {
                debug!("GPIO line {} now has {} users", line, entry.users.len());
                return Ok(());
            }

            match lines.remove(&line) {
                Some(entry) => {
                    debug!("releasing GPIO line {}", line);
                    release(&mut *self.source.borrow_ref_mut(cs), line, entry.handle)
                }
                None => Ok(()),
            }
        })
    }

    /// Record a falling edge on `line`.
    pub fn signal(&self, line: LineId) {
        critical_section::with(|cs| {
            let mut lines = self.lines.borrow_ref_mut(cs);
            match lines.get_mut(&line) {
                Some(entry) => {
                    entry.edges = entry.edges.wrapping_add(1);
                    trace!("edge {} on GPIO line {}", entry.edges, line);
                    for waker in entry.users.iter_mut().filter_map(|u| u.waker.take()) {
                        waker.wake();
                    }
                }
                None => trace!("ignoring edge on unregistered GPIO line {}", line),
            }
        })
    }

    /// Number of registrations of `line`.
    pub fn refcount(&self, line: LineId) -> usize {
        critical_section::with(|cs| {
            self.lines
                .borrow_ref(cs)
                .get(&line)
                .map_or(0, |entry| entry.users.len())
        })
    }

    pub fn is_registered(&self, line: LineId) -> bool {
        self.refcount(line) > 0
    }
}

fn release<S: EdgeSource>(
    source: &mut S,
    line: LineId,
    mut handle: S::Handle,
) -> Result<(), BridgeError> {
    let unwatched = source.unwatch(&mut handle);
    let unexported = source.unexport(handle);
    match (unwatched, unexported) {
        (Ok(()), Ok(())) => Ok(()),
        (Err(e), _) | (_, Err(e)) => {
            warn!("releasing GPIO line {} failed: {:?}", line, e);
            Err(BridgeError::Release(line))
        }
    }
}

/// Bridge operations an expander needs, independent of the edge source type.
pub(crate) trait LineHub {
    fn attach(&self, line: LineId) -> Result<Registration, BridgeError>;
    fn detach(&self, registration: Registration) -> Result<(), BridgeError>;

    /// Ready with the new edge count once it differs from `seen`, or with `None` once
    /// `registration` is gone.
    ///
    /// Each registration keeps the waker of one task.  A second task polling the same
    /// registration takes over and the first one is woken to re-register.
    fn poll_edge(
        &self,
        registration: &Registration,
        seen: u32,
        cx: &mut Context<'_>,
    ) -> Poll<Option<u32>>;
}

impl<S: EdgeSource, const N: usize> LineHub for InterruptBridge<S, N> {
    fn attach(&self, line: LineId) -> Result<Registration, BridgeError> {
        self.register(line)
    }

    fn detach(&self, registration: Registration) -> Result<(), BridgeError> {
        self.unregister(registration)
    }

    fn poll_edge(
        &self,
        registration: &Registration,
        seen: u32,
        cx: &mut Context<'_>,
    ) -> Poll<Option<u32>> {
        critical_section::with(|cs| {
            let mut lines = self.lines.borrow_ref_mut(cs);
            let Some(entry) = lines.get_mut(&registration.line) else {
                return Poll::Ready(None);
            };
            let edges = entry.edges;
            let Some(user) = entry.users.iter_mut().find(|u| u.id == registration.user) else {
                return Poll::Ready(None);
            };
            if edges != seen {
                return Poll::Ready(Some(edges));
            }
            let registered = user
                .waker
                .as_ref()
                .is_some_and(|w| w.will_wake(cx.waker()));
            if !registered {
                if let Some(previous) = user.waker.replace(cx.waker().clone()) {
                    previous.wake();
                }
            }
            Poll::Pending
        })
    }
}
