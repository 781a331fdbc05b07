//! The per-session host context.
//!
//! [`HostSession`] owns the memory arena and every component drawing from
//! it. Components sit behind their own `RefCell` so that a plugin calling
//! back into the host from inside a suite callback reaches a different
//! component without conflict; a genuinely conflicting call is reported as
//! [`CallError::Busy`] instead of panicking.
//!
//! A fatal arena error latches the session: every later call fails with
//! [`CallError::Faulted`] until the host discards the session.

use std::cell::{Cell, RefCell};
use std::convert::Infallible;
use std::error::Error;
use std::fmt;
use std::rc::Rc;

use suitehost_arena::{
    ArenaError, BufferAllocator, FatalFault, HeapProvider, MemoryArena, SystemHeap,
};
use suitehost_core::{NoStrings, StringResolver, SuiteKey, ZStringRef};

use crate::blocks::BlockTable;
use crate::catalog::{SuiteCatalog, SuiteKind};
use crate::config::{ConfigError, SessionConfig};
use crate::error_channel::{ErrorChannel, ErrorChannelError};
use crate::facade::SuiteFacade;
use crate::handles::ArenaHandles;
use crate::registry::{BrokerError, SuitePtr, SuiteRegistry};
use crate::resource::{CollectionRole, ResourceCollection};

/// Why a session call did not reach or complete its operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CallError<E> {
    /// The operation itself failed.
    Op(E),
    /// The component is already in use further up the call stack.
    Busy {
        /// Which component was busy.
        component: &'static str,
    },
    /// The session has latched a fatal arena fault.
    Faulted(ArenaError),
    /// The session has been torn down.
    TornDown,
}

impl<E: fmt::Display> fmt::Display for CallError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Op(e) => write!(f, "{e}"),
            Self::Busy { component } => write!(f, "{component} is busy in an outer call"),
            Self::Faulted(e) => write!(f, "session faulted: {e}"),
            Self::TornDown => write!(f, "session has been torn down"),
        }
    }
}

impl<E: Error + 'static> Error for CallError<E> {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Op(e) => Some(e),
            Self::Faulted(e) => Some(e),
            _ => None,
        }
    }
}

/// What session teardown released.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// Buffers the plugin never freed.
    pub buffers_released: usize,
    /// Handles the plugin never disposed.
    pub handles_released: usize,
    /// Suites still referenced, freed by force.
    pub suites_forced: usize,
    /// Buffer suite blocks the plugin never disposed.
    pub suite_buffers_released: usize,
    /// Basic suite blocks the plugin never freed.
    pub blocks_released: usize,
    /// Resource entries dropped across both collections.
    pub resources_cleared: usize,
    /// Arena blocks still outstanding after every component released.
    pub leaked_blocks: usize,
    /// Arena faults hit along the way.
    pub faults: Vec<ArenaError>,
}

impl TeardownReport {
    /// Whether teardown hit no faults and leaked nothing.
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty() && self.leaked_blocks == 0
    }
}

fn settle(result: Result<usize, ArenaError>, faults: &mut Vec<ArenaError>) -> usize {
    result.unwrap_or_else(|e| {
        faults.push(e);
        0
    })
}

/// Everything one plugin invocation can reach.
///
/// Strictly single-threaded: the session is `!Send`.
pub struct HostSession {
    config: SessionConfig,
    arena: Rc<MemoryArena>,
    buffers: RefCell<BufferAllocator>,
    handles: RefCell<ArenaHandles>,
    blocks: RefCell<BlockTable>,
    resources: RefCell<ResourceCollection>,
    pseudo_resources: RefCell<ResourceCollection>,
    errors: RefCell<ErrorChannel>,
    registry: RefCell<SuiteRegistry>,
    facade: RefCell<SuiteFacade>,
    fault: RefCell<Option<ArenaError>>,
    torn_down: Cell<bool>,
}

impl HostSession {
    /// Create a session over the global allocator.
    pub fn new(config: SessionConfig) -> Result<Self, ConfigError> {
        Self::with_heap(config, SystemHeap)
    }

    /// Create a session over an explicit heap provider.
    pub fn with_heap(
        config: SessionConfig,
        heap: impl HeapProvider + 'static,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let arena = Rc::new(MemoryArena::new(heap, config.arena_config()));
        let session = Self {
            buffers: RefCell::new(BufferAllocator::new(Rc::clone(&arena))),
            handles: RefCell::new(ArenaHandles::new(Rc::clone(&arena))),
            blocks: RefCell::new(BlockTable::new(Rc::clone(&arena))),
            resources: RefCell::new(ResourceCollection::new(
                CollectionRole::Primary,
                config.max_resource_bytes,
            )),
            pseudo_resources: RefCell::new(ResourceCollection::new(
                CollectionRole::Pseudo,
                config.max_resource_bytes,
            )),
            errors: RefCell::new(ErrorChannel::new()),
            registry: RefCell::new(SuiteRegistry::new(Rc::clone(&arena))),
            facade: RefCell::new(SuiteFacade::new(
                Rc::clone(&arena),
                config.main_window,
                config.plugin_name.as_str(),
            )),
            fault: RefCell::new(None),
            torn_down: Cell::new(false),
            arena,
            config,
        };
        tracing::debug!(plugin = %session.config.plugin_name, "host session created");
        Ok(session)
    }

    /// The configuration this session was created with.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The session arena.
    pub fn arena(&self) -> &Rc<MemoryArena> {
        &self.arena
    }

    /// The latched fatal fault, if any.
    pub fn fault(&self) -> Option<ArenaError> {
        self.fault.borrow().clone()
    }

    /// Whether [`teardown`](Self::teardown) has run.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.get()
    }

    /// Latch a fatal fault. Only the first fault is kept.
    pub fn latch_fault(&self, fault: ArenaError) {
        let mut slot = self.fault.borrow_mut();
        if slot.is_none() {
            tracing::error!(%fault, "session latched fatal fault");
            *slot = Some(fault);
        }
    }

    fn ensure_usable<E>(&self) -> Result<(), CallError<E>> {
        if self.torn_down.get() {
            return Err(CallError::TornDown);
        }
        match self.fault.borrow().as_ref() {
            Some(fault) => Err(CallError::Faulted(fault.clone())),
            None => Ok(()),
        }
    }

    fn classify<E: FatalFault>(&self, e: E) -> CallError<E> {
        match e.fatal_fault() {
            Some(fatal) => {
                let fatal = fatal.clone();
                self.latch_fault(fatal.clone());
                CallError::Faulted(fatal)
            }
            None => CallError::Op(e),
        }
    }

    fn call<C, T, E: FatalFault>(
        &self,
        cell: &RefCell<C>,
        component: &'static str,
        f: impl FnOnce(&mut C) -> Result<T, E>,
    ) -> Result<T, CallError<E>> {
        self.ensure_usable::<E>()?;
        let mut guard = cell
            .try_borrow_mut()
            .map_err(|_| CallError::<E>::Busy { component })?;
        let result = f(&mut guard);
        drop(guard);
        result.map_err(|e| self.classify(e))
    }

    /// Run `f` against the buffer allocator.
    pub fn buffers<T, E: FatalFault>(
        &self,
        f: impl FnOnce(&mut BufferAllocator) -> Result<T, E>,
    ) -> Result<T, CallError<E>> {
        self.call(&self.buffers, "buffer allocator", f)
    }

    /// Run `f` against the handle allocator.
    pub fn handles<T, E: FatalFault>(
        &self,
        f: impl FnOnce(&mut ArenaHandles) -> Result<T, E>,
    ) -> Result<T, CallError<E>> {
        self.call(&self.handles, "handle allocator", f)
    }

    /// Run `f` against the basic suite's raw blocks.
    pub fn blocks<T, E: FatalFault>(
        &self,
        f: impl FnOnce(&mut BlockTable) -> Result<T, E>,
    ) -> Result<T, CallError<E>> {
        self.call(&self.blocks, "block table", f)
    }

    /// Run `f` against the resource collection serving `role`.
    pub fn resources<T, E: FatalFault>(
        &self,
        role: CollectionRole,
        f: impl FnOnce(&mut ResourceCollection) -> Result<T, E>,
    ) -> Result<T, CallError<E>> {
        match role {
            CollectionRole::Primary => self.call(&self.resources, "resources", f),
            CollectionRole::Pseudo => self.call(&self.pseudo_resources, "pseudo resources", f),
        }
    }

    /// Run `f` against the error channel.
    pub fn errors<T, E: FatalFault>(
        &self,
        f: impl FnOnce(&mut ErrorChannel) -> Result<T, E>,
    ) -> Result<T, CallError<E>> {
        self.call(&self.errors, "error channel", f)
    }

    /// Run `f` against the suite registry.
    pub fn registry<T, E: FatalFault>(
        &self,
        f: impl FnOnce(&mut SuiteRegistry) -> Result<T, E>,
    ) -> Result<T, CallError<E>> {
        self.call(&self.registry, "suite registry", f)
    }

    /// Run `f` against the suite facade.
    pub fn facade<T, E: FatalFault>(
        &self,
        f: impl FnOnce(&mut SuiteFacade) -> Result<T, E>,
    ) -> Result<T, CallError<E>> {
        self.call(&self.facade, "suite facade", f)
    }

    /// Acquire the suite published under `key`.
    ///
    /// An Active key gains a reference. Otherwise the suite's state is
    /// built and `catalog` supplies its table. Unknown keys fail with
    /// [`BrokerError::NotFound`].
    pub fn acquire_suite(
        &self,
        key: SuiteKey,
        catalog: &dyn SuiteCatalog,
    ) -> Result<SuitePtr, CallError<BrokerError>> {
        self.ensure_usable::<BrokerError>()?;
        let mut registry = self
            .registry
            .try_borrow_mut()
            .map_err(|_| CallError::<BrokerError>::Busy {
                component: "suite registry",
            })?;
        if registry.is_loaded(&key) {
            return registry.add_ref(&key).map_err(|e| self.classify(e));
        }
        let Some(kind) = SuiteKind::resolve(&key) else {
            tracing::warn!(suite = %key, "plugin requested unknown suite");
            return Err(CallError::Op(BrokerError::NotFound { key }));
        };
        if kind.has_state() {
            self.facade
                .try_borrow_mut()
                .map_err(|_| CallError::<BrokerError>::Busy {
                    component: "suite facade",
                })?
                .prepare(kind);
        }
        tracing::debug!(suite = %key, "suite acquired");
        catalog
            .publish(kind, key, &mut registry)
            .map_err(|e| self.classify(e))
    }

    /// Drop one reference to the suite under `key`. Returns `true` when
    /// its table was freed.
    pub fn release_suite(&self, key: &SuiteKey) -> Result<bool, CallError<ArenaError>> {
        self.registry(|registry| registry.remove_ref(key))
    }

    /// Record an error message given as a string-table reference.
    ///
    /// Before the string table is built no reference can resolve.
    pub fn set_error_from_zstring(
        &self,
        reference: ZStringRef,
    ) -> Result<(), CallError<ErrorChannelError>> {
        self.ensure_usable::<ErrorChannelError>()?;
        let facade = self.facade.try_borrow().map_err(|_| CallError::<ErrorChannelError>::Busy {
            component: "suite facade",
        })?;
        let resolver: &dyn StringResolver = match facade.zstrings_if_built() {
            Some(table) => table,
            None => &NoStrings,
        };
        self.errors(|errors| errors.set_from_opaque_ref(reference, resolver))
    }

    /// A new string-table reference holding the plugin name.
    pub fn plugin_name_zstring(&self) -> Result<ZStringRef, CallError<Infallible>> {
        self.facade(|facade| {
            let name = facade.ui_hooks().plugin_name().to_owned();
            Ok(facade.zstrings().make_from_str(&name))
        })
    }

    /// The plugin's reported error message, if any. Host side only.
    ///
    /// Reads as `None` while the error channel is mid-call.
    pub fn error_message(&self) -> Option<String> {
        self.errors.try_borrow().ok()?.message().map(str::to_owned)
    }

    /// Remove and return the plugin's reported error message.
    pub fn take_error_message(&mut self) -> Option<String> {
        self.errors.get_mut().take()
    }

    /// Release everything the session owns and retire the arena.
    ///
    /// Runs every step even when earlier steps fault. A second call
    /// returns an empty report.
    pub fn teardown(&mut self) -> TeardownReport {
        if self.torn_down.replace(true) {
            return TeardownReport::default();
        }
        let mut faults = Vec::new();
        let buffers_released = settle(self.buffers.get_mut().release_all(), &mut faults);
        let handles_released = settle(self.handles.get_mut().release_all(), &mut faults);
        let suites_forced = settle(self.registry.get_mut().dispose(), &mut faults);
        let suite_buffers_released = settle(self.facade.get_mut().teardown(), &mut faults);
        let blocks_released = settle(self.blocks.get_mut().release_all(), &mut faults);
        let resources_cleared =
            self.resources.get_mut().clear() + self.pseudo_resources.get_mut().clear();
        self.errors.get_mut().take();
        let leaked_blocks = self.arena.teardown();

        let report = TeardownReport {
            buffers_released,
            handles_released,
            suites_forced,
            suite_buffers_released,
            blocks_released,
            resources_cleared,
            leaked_blocks,
            faults,
        };
        if report.is_clean() {
            tracing::debug!(?report, "host session torn down");
        } else {
            tracing::warn!(?report, "host session torn down with faults or leaks");
        }
        report
    }
}

impl Drop for HostSession {
    fn drop(&mut self) {
        if !self.torn_down.get() {
            tracing::warn!(
                plugin = %self.config.plugin_name,
                "host session dropped without teardown"
            );
            self.teardown();
        }
    }
}
