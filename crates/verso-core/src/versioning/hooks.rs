//! Before/after notifications around versioning operations.
//!
//! Subscribers are plain closures run synchronously in registration order.
//! A before-hook receives the value by ownership and hands back a [`Flow`]:
//! either the value to continue with (the same one or a substitute) or a
//! cancellation. The first cancellation stops the chain. An error from any
//! hook aborts the operation and is returned to the caller unchanged.

use crate::error::VersoResult;
use crate::types::Record;

/// Decision returned by a before-hook.
#[derive(Debug, Clone, PartialEq)]
pub enum Flow<T> {
    /// Continue with this value.
    Proceed(T),
    /// Stop the operation. Carries the value as this hook saw it.
    Cancel(T),
}

impl<T> Flow<T> {
    pub fn is_cancel(&self) -> bool {
        matches!(self, Flow::Cancel(_))
    }

    /// The carried value, whatever the decision.
    pub fn into_inner(self) -> T {
        match self {
            Flow::Proceed(v) | Flow::Cancel(v) => v,
        }
    }
}

/// Both sides of a replace operation, as seen by before-replace hooks.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplacePair {
    /// Record whose content is about to be overwritten.
    pub current: Record,
    /// Record whose content will be copied.
    pub replacement: Record,
}

type BeforeHook<T> = Box<dyn Fn(T) -> VersoResult<Flow<T>> + Send + Sync>;
type AfterHook = Box<dyn Fn(&Record) -> VersoResult<()> + Send + Sync>;

/// Registered subscribers for the four versioning notifications.
#[derive(Default)]
pub struct VersionHooks {
    before_save: Vec<BeforeHook<Record>>,
    after_save: Vec<AfterHook>,
    before_replace: Vec<BeforeHook<ReplacePair>>,
    after_replace: Vec<AfterHook>,
}

impl VersionHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run before a snapshot is taken. May cancel or substitute the record.
    pub fn on_before_save<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(Record) -> VersoResult<Flow<Record>> + Send + Sync + 'static,
    {
        self.before_save.push(Box::new(hook));
        self
    }

    /// Run with the persisted snapshot.
    pub fn on_after_save<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&Record) -> VersoResult<()> + Send + Sync + 'static,
    {
        self.after_save.push(Box::new(hook));
        self
    }

    /// Run before content is replaced. May cancel or substitute either side.
    pub fn on_before_replace<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(ReplacePair) -> VersoResult<Flow<ReplacePair>> + Send + Sync + 'static,
    {
        self.before_replace.push(Box::new(hook));
        self
    }

    /// Run with the replacement record once the overwrite is persisted.
    pub fn on_after_replace<F>(&mut self, hook: F) -> &mut Self
    where
        F: Fn(&Record) -> VersoResult<()> + Send + Sync + 'static,
    {
        self.after_replace.push(Box::new(hook));
        self
    }

    pub fn len(&self) -> usize {
        self.before_save.len()
            + self.after_save.len()
            + self.before_replace.len()
            + self.after_replace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn before_save(&self, record: Record) -> VersoResult<Flow<Record>> {
        run_before(&self.before_save, record)
    }

    pub(crate) fn after_save(&self, snapshot: &Record) -> VersoResult<()> {
        run_after(&self.after_save, snapshot)
    }

    pub(crate) fn before_replace(&self, pair: ReplacePair) -> VersoResult<Flow<ReplacePair>> {
        run_before(&self.before_replace, pair)
    }

    pub(crate) fn after_replace(&self, replacement: &Record) -> VersoResult<()> {
        run_after(&self.after_replace, replacement)
    }
}

fn run_before<T>(hooks: &[BeforeHook<T>], value: T) -> VersoResult<Flow<T>> {
    let mut value = value;
    for hook in hooks {
        match hook(value)? {
            Flow::Proceed(next) => value = next,
            cancelled @ Flow::Cancel(_) => return Ok(cancelled),
        }
    }
    Ok(Flow::Proceed(value))
}

fn run_after(hooks: &[AfterHook], record: &Record) -> VersoResult<()> {
    for hook in hooks {
        hook(record)?;
    }
    Ok(())
}
