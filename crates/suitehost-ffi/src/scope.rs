//! The session a plugin callback reaches.
//!
//! Callback tables are plain function pointers with no context argument,
//! so every trampoline finds its session through a per-thread stack of
//! entered sessions. The top of the stack is the active one. A session is
//! only ever on the stack while something guarantees it is alive:
//!
//! - inside [`SessionScope::enter`], which borrows the session for the
//!   duration of the closure, or
//! - between `suitehost_session_enter` and `suitehost_session_exit` for
//!   a boxed session that `suitehost_session_destroy` refuses to drop
//!   while it is anywhere on the stack.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::ptr;

use suitehost_host::{CallError, HostSession};

thread_local! {
    static ENTERED: RefCell<Vec<*const HostSession>> = const { RefCell::new(Vec::new()) };
}

/// Scoped activation of a session for plugin callbacks on this thread.
///
/// Scopes nest: leaving one restores whatever was active before, also
/// when the closure unwinds.
pub struct SessionScope<'a> {
    depth: usize,
    _session: PhantomData<&'a HostSession>,
}

impl SessionScope<'_> {
    /// Make `session` the one plugin callbacks reach while `f` runs.
    pub fn enter<R>(session: &HostSession, f: impl FnOnce() -> R) -> R {
        let depth = ENTERED.with_borrow_mut(|stack| {
            stack.push(session);
            stack.len() - 1
        });
        let _scope = SessionScope {
            depth,
            _session: PhantomData,
        };
        f()
    }

    /// Whether `session` is the one callbacks currently reach.
    pub fn is_active(session: &HostSession) -> bool {
        ptr::eq(active_ptr(), session)
    }
}

impl Drop for SessionScope<'_> {
    fn drop(&mut self) {
        ENTERED.with_borrow_mut(|stack| stack.truncate(self.depth));
    }
}

pub(crate) fn active_ptr() -> *const HostSession {
    ENTERED.with_borrow(|stack| stack.last().copied().unwrap_or(ptr::null()))
}

/// Whether `session` is entered anywhere on this thread, shadowed or not.
pub(crate) fn is_entered(session: *const HostSession) -> bool {
    ENTERED.with_borrow(|stack| stack.iter().any(|&entered| ptr::eq(entered, session)))
}

/// Install a session owned by the session table. Returns `false` if a
/// session is already entered on this thread.
pub(crate) fn install(session: *const HostSession) -> bool {
    ENTERED.with_borrow_mut(|stack| {
        if stack.is_empty() {
            stack.push(session);
            true
        } else {
            false
        }
    })
}

/// Clear an installed session. Returns `false` unless `session` is the
/// only one entered.
pub(crate) fn uninstall(session: *const HostSession) -> bool {
    ENTERED.with_borrow_mut(|stack| {
        if matches!(stack.as_slice(), [only] if ptr::eq(*only, session)) {
            stack.clear();
            true
        } else {
            false
        }
    })
}

/// Run `f` against the active session, if there is one.
#[allow(unsafe_code)]
pub(crate) fn with_active<R>(f: impl FnOnce(&HostSession) -> R) -> Option<R> {
    let session = active_ptr();
    if session.is_null() {
        tracing::warn!("plugin callback with no active session");
        return None;
    }
    // SAFETY: the slot is non-null only while the session is kept alive
    // (see the module docs), and sessions never move while active.
    Some(f(unsafe { &*session }))
}

/// Run a session call against the active session. With no active session
/// the call fails as if the session were torn down.
pub(crate) fn in_session<T, E>(
    f: impl FnOnce(&HostSession) -> Result<T, CallError<E>>,
) -> Result<T, CallError<E>> {
    with_active(f).unwrap_or(Err(CallError::TornDown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use suitehost_host::SessionConfig;

    fn named(name: &str) -> HostSession {
        HostSession::new(SessionConfig {
            plugin_name: name.to_owned(),
            ..SessionConfig::default()
        })
        .unwrap()
    }

    fn active_name() -> Result<String, CallError<Infallible>> {
        in_session(|s| Ok(s.config().plugin_name.clone()))
    }

    #[test]
    fn no_session_reads_as_torn_down() {
        assert_eq!(active_name(), Err(CallError::TornDown));
    }

    #[test]
    fn scopes_nest_and_restore() {
        let outer = named("outer");
        let inner = named("inner");
        SessionScope::enter(&outer, || {
            assert_eq!(active_name().unwrap(), "outer");
            SessionScope::enter(&inner, || {
                assert!(SessionScope::is_active(&inner));
                assert_eq!(active_name().unwrap(), "inner");
            });
            assert_eq!(active_name().unwrap(), "outer");
        });
        assert!(active_ptr().is_null());
    }

    #[test]
    fn unwinding_restores_previous() {
        let session = named("p");
        let caught = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            SessionScope::enter(&session, || panic!("plugin blew up"));
        }));
        assert!(caught.is_err());
        assert!(active_ptr().is_null());
    }

    #[test]
    fn install_refuses_second_session() {
        let a = named("a");
        let b = named("b");
        assert!(install(&a));
        assert!(!install(&b));
        assert!(!uninstall(&b));
        assert!(uninstall(&a));
        assert!(active_ptr().is_null());
    }

    #[test]
    fn shadowed_session_stays_entered() {
        let installed = named("installed");
        let nested = named("nested");
        assert!(install(&installed));
        SessionScope::enter(&nested, || {
            assert!(SessionScope::is_active(&nested));
            assert!(is_entered(&installed));
            assert!(!uninstall(&installed));
        });
        assert!(SessionScope::is_active(&installed));
        assert!(!is_entered(&nested));
        assert!(uninstall(&installed));
        assert!(!is_entered(&installed));
    }
}
