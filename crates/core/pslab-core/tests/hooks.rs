//! Registered fatal handler and log sink.
//!
//! Both hooks are process-wide, so they live in their own test binary and
//! every test holds `SERIAL` while it touches them.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Mutex, MutexGuard, PoisonError};

use pslab_core::fault::{Escalation, set_fatal_fn};
use pslab_core::log::{LogLevel, max_level, set_log_fn, set_max_level};
use pslab_core::{Error, FaultDomain, log_info, log_trace};

static SERIAL: Mutex<()> = Mutex::new(());
static LOGS: Mutex<Vec<(LogLevel, String)>> = Mutex::new(Vec::new());
static FATAL: Mutex<Vec<Escalation>> = Mutex::new(Vec::new());

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

fn capture(level: LogLevel, args: std::fmt::Arguments<'_>) {
    lock(&LOGS).push((level, args.to_string()));
}

fn record_and_reset(reason: Escalation) -> ! {
    lock(&FATAL).push(reason);
    panic!("board reset: {reason}");
}

fn install() -> MutexGuard<'static, ()> {
    let guard = lock(&SERIAL);
    set_log_fn(capture);
    set_fatal_fn(record_and_reset);
    set_max_level(LogLevel::Trace);
    lock(&LOGS).clear();
    lock(&FATAL).clear();
    guard
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<String>()
        .cloned()
        .unwrap_or_default()
}

#[test]
fn unscoped_raise_reaches_registered_handler() {
    let _serial = install();
    let domain = FaultDomain::new();

    let payload = catch_unwind(AssertUnwindSafe(|| {
        let _ = domain.raise::<()>(Error::Timeout);
    }))
    .expect_err("escalation diverges");

    assert_eq!(*lock(&FATAL), [Escalation::Unscoped(Error::Timeout)]);
    assert_eq!(
        panic_message(payload.as_ref()),
        "board reset: fault outside protected scope: operation timed out"
    );
    // The reason is logged at fatal level before the handler runs.
    let logs = lock(&LOGS);
    let fatal: Vec<_> = logs.iter().filter(|(l, _)| *l == LogLevel::Fatal).collect();
    assert_eq!(fatal.len(), 1);
    assert_eq!(fatal[0].1, "fault outside protected scope: operation timed out");
}

#[test]
fn interrupt_raise_reaches_registered_handler() {
    let _serial = install();
    let domain = FaultDomain::new();

    let result = catch_unwind(AssertUnwindSafe(|| {
        let _ = domain.protect(|| {
            let _irq = domain.enter_interrupt();
            domain.raise::<()>(Error::HardwareFault)
        });
    }));

    assert!(result.is_err());
    assert_eq!(
        *lock(&FATAL),
        [Escalation::InterruptContext(Error::HardwareFault)]
    );
    // Guards unwound with the handler's panic.
    assert_eq!(domain.scope_depth(), 0);
    assert!(!domain.in_interrupt());
}

#[test]
fn unknown_code_reaches_registered_handler() {
    let _serial = install();
    let domain = FaultDomain::new();

    let result = catch_unwind(AssertUnwindSafe(|| {
        let _ = domain.protect(|| domain.raise_code::<()>(0xEE));
    }));

    assert!(result.is_err());
    assert_eq!(*lock(&FATAL), [Escalation::UnknownCode(0xEE)]);
}

#[test]
fn max_level_filters_sink() {
    let _serial = install();

    set_max_level(LogLevel::Info);
    assert_eq!(max_level(), LogLevel::Info);
    log_trace!("isr tick");
    log_info!("uart{} up", 0);
    set_max_level(LogLevel::Trace);
    log_trace!("isr tick again");

    assert_eq!(
        *lock(&LOGS),
        [
            (LogLevel::Info, "uart0 up".to_string()),
            (LogLevel::Trace, "isr tick again".to_string()),
        ]
    );
}
