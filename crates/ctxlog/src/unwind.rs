//! Quiet panic containment.
//!
//! A log call runs user `Serialize`, `Debug` and `Display` impls and
//! user-supplied frame sources, any of which may panic. [`catch_quietly`]
//! contains such a panic and keeps the panic hook from printing it.
//!
//! The first call wraps the process panic hook once. The wrapper stays
//! silent only while the panicking thread is inside `catch_quietly`, and
//! defers to the previous hook everywhere else. A hook installed later with
//! `std::panic::set_hook` replaces the wrapper, and guarded panics are then
//! reported by that hook.

use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Once;

thread_local! {
    static QUIET: Cell<bool> = const { Cell::new(false) };
}

static INSTALL_HOOK: Once = Once::new();

fn install_hook() {
    INSTALL_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if !QUIET.try_with(Cell::get).unwrap_or(false) {
                previous(info);
            }
        }));
    });
}

/// Restores the thread's quiet flag, including while unwinding.
struct QuietScope {
    previous: bool,
}

impl QuietScope {
    fn enter() -> Self {
        Self {
            previous: QUIET.with(|flag| flag.replace(true)),
        }
    }
}

impl Drop for QuietScope {
    fn drop(&mut self) {
        QUIET.with(|flag| flag.set(self.previous));
    }
}

/// Run `f`, returning `None` if it panicked. The panic is not printed.
pub(crate) fn catch_quietly<T>(f: impl FnOnce() -> T) -> Option<T> {
    install_hook();
    let _scope = QuietScope::enter();
    panic::catch_unwind(AssertUnwindSafe(f)).ok()
}

/// Whether panics on this thread are currently silenced.
#[cfg(test)]
fn is_quiet() -> bool {
    QUIET.with(Cell::get)
}
