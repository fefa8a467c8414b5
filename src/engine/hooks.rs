use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use super::EntityRecord;

/// Named phases of a save operation, fired in sequence by the engine.
///
/// The *-ing* phases are vetoable: a hook answering `Abort` there aborts the
/// whole operation before any further write of that phase. The past-tense
/// phases are notifications only; by then the phase's writes sit in the open
/// transaction and are committed or rolled back together at its end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecyclePhase {
    Creating,
    CreatingMain,
    CreatedMain,
    Created,
    Updating,
    UpdatingMain,
    UpdatedMain,
    Updated,
}

impl LifecyclePhase {
    pub fn is_vetoable(&self) -> bool {
        matches!(
            self,
            Self::Creating | Self::CreatingMain | Self::Updating | Self::UpdatingMain
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creating => "creating",
            Self::CreatingMain => "creating.main",
            Self::CreatedMain => "created.main",
            Self::Created => "created",
            Self::Updating => "updating",
            Self::UpdatingMain => "updating.main",
            Self::UpdatedMain => "updated.main",
            Self::Updated => "updated",
        }
    }
}

impl fmt::Display for LifecyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hook's answer at a vetoable phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookDecision {
    Proceed,
    Abort(String),
}

/// A registered lifecycle observer. Hooks run synchronously, in registration
/// order; the first `Abort` wins and later hooks are not consulted.
#[async_trait]
pub trait LifecycleHook: Send + Sync {
    async fn observe(&self, phase: LifecyclePhase, record: &EntityRecord) -> HookDecision;
}

/// Adapter for plain closures, the common case in tests and simple callers.
pub struct FnHook<F>(pub F);

#[async_trait]
impl<F> LifecycleHook for FnHook<F>
where
    F: Fn(LifecyclePhase, &EntityRecord) -> HookDecision + Send + Sync,
{
    async fn observe(&self, phase: LifecyclePhase, record: &EntityRecord) -> HookDecision {
        (self.0)(phase, record)
    }
}

/// Ordered list of hooks shared by one engine.
#[derive(Default)]
pub struct HookChain {
    hooks: Vec<Arc<dyn LifecycleHook>>,
}

impl HookChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, hook: Arc<dyn LifecycleHook>) {
        self.hooks.push(hook);
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Run the chain for a phase. For non-vetoable phases the hooks are
    /// still consulted (they may observe), but their answers are ignored.
    pub async fn fire(&self, phase: LifecyclePhase, record: &EntityRecord) -> HookDecision {
        for hook in &self.hooks {
            if let HookDecision::Abort(reason) = hook.observe(phase, record).await {
                if phase.is_vetoable() {
                    return HookDecision::Abort(reason);
                }
            }
        }
        HookDecision::Proceed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_first_abort_wins() {
        let mut chain = HookChain::new();
        chain.register(Arc::new(FnHook(|_, _: &EntityRecord| HookDecision::Proceed)));
        chain.register(Arc::new(FnHook(|_, _: &EntityRecord| {
            HookDecision::Abort("first".into())
        })));
        chain.register(Arc::new(FnHook(|_, _: &EntityRecord| {
            HookDecision::Abort("second".into())
        })));

        let record = EntityRecord::new("product");
        let decision = chain.fire(LifecyclePhase::Creating, &record).await;
        assert_eq!(decision, HookDecision::Abort("first".into()));
    }

    #[tokio::test]
    async fn test_abort_ignored_on_notification_phase() {
        let mut chain = HookChain::new();
        chain.register(Arc::new(FnHook(|_, _: &EntityRecord| {
            HookDecision::Abort("too late".into())
        })));

        let record = EntityRecord::new("product");
        let decision = chain.fire(LifecyclePhase::Created, &record).await;
        assert_eq!(decision, HookDecision::Proceed);
    }
}
