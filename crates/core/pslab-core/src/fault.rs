//! Protected scopes for multi-step hardware bring-up.
//!
//! Initializing a peripheral is a chain of steps (claim the instance,
//! configure the mechanism, bind buffers, enable the interrupt), any of which
//! can fail. Instead of checking a status code after each step, the chain
//! runs inside [`FaultDomain::protect`] and a failing step calls
//! [`FaultDomain::raise`]. The returned [`Fault`] travels up with `?` to the
//! nearest enclosing `protect`, which hands the fault kind to the recovery
//! clause:
//!
//! ```ignore
//! let outcome = ctx.faults().protect(|| {
//!     let uart = StreamPort::init(&ctx, cfg, mech, rx, tx)?;
//!     uart.start()?;
//!     Ok(uart)
//! });
//! let uart = outcome.recover(|kind| log_error!("uart: {kind}"));
//! ```
//!
//! # Rules
//!
//! - Scopes nest; the innermost active scope receives the fault.
//! - At most one fault is outstanding per domain. Raising a second one
//!   before the first reached its recovery clause is fatal.
//! - Raising with no active scope, or from interrupt context (see
//!   [`FaultDomain::enter_interrupt`]), is fatal.
//!
//! Fatal conditions are logged and handed to the handler registered with
//! [`set_fatal_fn`]. The default handler panics, which the firmware's panic
//! handler turns into a reset.

use core::fmt;
use core::sync::atomic::{AtomicPtr, AtomicU8, AtomicU32, Ordering};

use crate::error::Error;
use crate::{log_debug, log_fatal, log_warn};

// ---------------------------------------------------------------------------
// Fatal escalation
// ---------------------------------------------------------------------------

/// Why a raise could not be delivered to a recovery clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    /// Raised with no active protected scope.
    Unscoped(Error),
    /// Raised from interrupt context.
    InterruptContext(Error),
    /// Raised while an earlier fault was still unhandled.
    Unhandled {
        /// The fault still waiting for its recovery clause.
        pending: Error,
        /// The fault that was raised on top of it.
        raised: Error,
    },
    /// A raw status code that maps to no known fault kind.
    UnknownCode(u8),
}

impl fmt::Display for Escalation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unscoped(kind) => write!(f, "fault outside protected scope: {kind}"),
            Self::InterruptContext(kind) => write!(f, "fault raised in interrupt context: {kind}"),
            Self::Unhandled { pending, raised } => {
                write!(f, "fault {raised} raised while {pending} is unhandled")
            }
            Self::UnknownCode(code) => write!(f, "unknown fault code {code:#04x}"),
        }
    }
}

/// The signature of the fatal handler.
pub type FatalFn = fn(Escalation) -> !;

fn default_fatal(reason: Escalation) -> ! {
    panic!("{reason}");
}

static FATAL_FN: AtomicPtr<()> = AtomicPtr::new(default_fatal as *mut ());

/// Registers the handler that receives unrecoverable faults.
///
/// Firmware normally installs a handler that records the reason and resets
/// the board.
pub fn set_fatal_fn(f: FatalFn) {
    FATAL_FN.store(f as *mut (), Ordering::Release);
}

#[inline]
fn load_fatal_fn() -> FatalFn {
    let ptr = FATAL_FN.load(Ordering::Acquire);
    // SAFETY: Only valid `FatalFn` pointers (or the initial `default_fatal`)
    // are ever stored into FATAL_FN.
    unsafe { core::mem::transmute::<*mut (), FatalFn>(ptr) }
}

#[cold]
fn escalate(reason: Escalation) -> ! {
    log_fatal!("{reason}");
    load_fatal_fn()(reason)
}

// ---------------------------------------------------------------------------
// Fault token and outcome
// ---------------------------------------------------------------------------

/// A raised fault on its way to the nearest recovery clause.
///
/// Only [`FaultDomain::raise`] produces one. Propagate it with `?`.
#[must_use = "a raised fault must propagate to its protected scope"]
#[derive(Debug, PartialEq, Eq)]
pub struct Fault {
    kind: Error,
}

impl Fault {
    /// Returns the fault kind.
    #[must_use]
    pub fn kind(&self) -> Error {
        self.kind
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.kind, f)
    }
}

/// The result of a protected scope.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome<T> {
    /// The body ran to completion.
    Completed(T),
    /// The body raised; this is the fault kind.
    Recovered(Error),
}

impl<T> Outcome<T> {
    /// Runs `clause` if the scope recovered from a fault.
    ///
    /// Returns the body's value if it completed.
    pub fn recover(self, clause: impl FnOnce(Error)) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Recovered(kind) => {
                clause(kind);
                None
            }
        }
    }

    /// Returns the body's value, discarding the fault kind.
    pub fn ok(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Recovered(_) => None,
        }
    }

    /// Returns the fault kind if the scope recovered.
    #[must_use]
    pub fn fault(&self) -> Option<Error> {
        match self {
            Self::Completed(_) => None,
            Self::Recovered(kind) => Some(*kind),
        }
    }

    /// Returns `true` if the scope recovered from a fault.
    #[must_use]
    pub fn is_recovered(&self) -> bool {
        matches!(self, Self::Recovered(_))
    }

    /// Converts into a plain `Result`.
    ///
    /// # Errors
    ///
    /// Returns the fault kind if the scope recovered.
    pub fn into_result(self) -> Result<T, Error> {
        match self {
            Self::Completed(value) => Ok(value),
            Self::Recovered(kind) => Err(kind),
        }
    }
}

// ---------------------------------------------------------------------------
// FaultDomain
// ---------------------------------------------------------------------------

const NO_FAULT: u8 = 0;

/// The fault state of one execution context.
#[derive(Debug)]
pub struct FaultDomain {
    depth: AtomicU32,
    irq_depth: AtomicU32,
    pending: AtomicU8,
}

impl FaultDomain {
    /// Creates a domain with no active scope.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            depth: AtomicU32::new(0),
            irq_depth: AtomicU32::new(0),
            pending: AtomicU8::new(NO_FAULT),
        }
    }

    /// Returns the number of active protected scopes.
    #[must_use]
    pub fn scope_depth(&self) -> u32 {
        self.depth.load(Ordering::Relaxed)
    }

    /// Returns `true` while an interrupt entry point is running.
    #[must_use]
    pub fn in_interrupt(&self) -> bool {
        self.irq_depth.load(Ordering::Relaxed) > 0
    }

    fn take_pending(&self) -> Option<Error> {
        Error::from_code(self.pending.swap(NO_FAULT, Ordering::AcqRel))
    }

    /// Runs `body` as a protected scope.
    ///
    /// A fault raised inside `body` and propagated with `?` makes this return
    /// [`Outcome::Recovered`] with the fault kind; the fault is then handled
    /// and the domain is clear again.
    pub fn protect<T>(&self, body: impl FnOnce() -> Result<T, Fault>) -> Outcome<T> {
        let _scope = ScopeGuard::enter(self);
        let result = body();
        let pending = self.take_pending();
        match (result, pending) {
            (Ok(value), None) => Outcome::Completed(value),
            (Ok(_), Some(kind)) => {
                log_warn!("fault: {kind} raised but not propagated, recovering anyway");
                Outcome::Recovered(kind)
            }
            (Err(fault), pending) => Outcome::Recovered(pending.unwrap_or(fault.kind)),
        }
    }

    /// Raises `kind` in the innermost active scope.
    ///
    /// Always returns `Err`; the `T` lets it sit in any `?` chain.
    ///
    /// # Errors
    ///
    /// Returns the [`Fault`] token to propagate. Escalates instead of
    /// returning when there is no active scope, when called from interrupt
    /// context, or when a fault is already pending.
    pub fn raise<T>(&self, kind: Error) -> Result<T, Fault> {
        if self.in_interrupt() {
            escalate(Escalation::InterruptContext(kind));
        }
        if self.scope_depth() == 0 {
            escalate(Escalation::Unscoped(kind));
        }
        if let Err(prev) =
            self.pending
                .compare_exchange(NO_FAULT, kind.code(), Ordering::AcqRel, Ordering::Acquire)
        {
            match Error::from_code(prev) {
                Some(pending) => escalate(Escalation::Unhandled {
                    pending,
                    raised: kind,
                }),
                None => escalate(Escalation::UnknownCode(prev)),
            }
        }
        log_debug!("fault: raised {kind} at scope depth {}", self.scope_depth());
        Err(Fault { kind })
    }

    /// Raises from a raw status code.
    ///
    /// # Errors
    ///
    /// Same as [`raise`](Self::raise). An unrecognized code is escalated.
    pub fn raise_code<T>(&self, code: u8) -> Result<T, Fault> {
        match Error::from_code(code) {
            Some(kind) => self.raise(kind),
            None => escalate(Escalation::UnknownCode(code)),
        }
    }

    /// Raises the error of a steady-state result, passing `Ok` through.
    ///
    /// # Errors
    ///
    /// Raises `Err(kind)` as [`raise`](Self::raise) does.
    pub fn check<T>(&self, result: Result<T, Error>) -> Result<T, Fault> {
        match result {
            Ok(value) => Ok(value),
            Err(kind) => self.raise(kind),
        }
    }

    /// Marks interrupt context until the returned guard is dropped.
    ///
    /// Interrupt entry points hold this guard so that a raise from inside
    /// them is caught instead of unwinding into the interrupted scope.
    pub fn enter_interrupt(&self) -> InterruptGuard<'_> {
        self.irq_depth.fetch_add(1, Ordering::Relaxed);
        InterruptGuard { domain: self }
    }
}

impl Default for FaultDomain {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a protected scope open; closing it on drop keeps the depth correct
/// when a fatal handler unwinds.
struct ScopeGuard<'a> {
    domain: &'a FaultDomain,
}

impl<'a> ScopeGuard<'a> {
    fn enter(domain: &'a FaultDomain) -> Self {
        domain.depth.fetch_add(1, Ordering::Relaxed);
        Self { domain }
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.domain.depth.fetch_sub(1, Ordering::Relaxed);
    }
}

/// RAII marker for interrupt context. See [`FaultDomain::enter_interrupt`].
#[must_use = "interrupt context ends when the guard is dropped"]
pub struct InterruptGuard<'a> {
    domain: &'a FaultDomain,
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        self.domain.irq_depth.fetch_sub(1, Ordering::Relaxed);
    }
}
