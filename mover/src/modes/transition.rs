use crate::sim::{InputCmd, SimBlackboard, SyncState, TimeStep};

/// What a transition may look at when deciding.
pub struct TransitionContext<'a> {
    pub time_step: &'a TimeStep,
    pub state: &'a SyncState,
    pub input: &'a InputCmd,
    pub current_mode: Option<&'a str>,
    pub blackboard: &'a SimBlackboard,
}

/// A rule that may switch the agent to another mode.
pub trait Transition: Send + Sync {
    /// The mode to switch to, if this transition fires.
    fn evaluate(&self, ctx: &TransitionContext<'_>) -> Option<String>;

    /// Fire even when the target is already the current mode.
    fn allow_mode_reentry(&self) -> bool {
        false
    }

    fn on_trigger(&self, _ctx: &TransitionContext<'_>) {}

    /// Statically known target, for configuration validation.
    fn target_hint(&self) -> Option<&str> {
        None
    }
}

type Predicate = Box<dyn Fn(&TransitionContext<'_>) -> bool + Send + Sync>;

/// Fires toward a fixed target whenever its predicate holds.
pub struct ConditionTransition {
    target: String,
    allow_reentry: bool,
    predicate: Predicate,
}

impl ConditionTransition {
    pub fn new(
        target: impl Into<String>,
        predicate: impl Fn(&TransitionContext<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            target: target.into(),
            allow_reentry: false,
            predicate: Box::new(predicate),
        }
    }

    pub fn with_reentry(mut self) -> Self {
        self.allow_reentry = true;
        self
    }
}

impl std::fmt::Debug for ConditionTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConditionTransition")
            .field("target", &self.target)
            .field("allow_reentry", &self.allow_reentry)
            .finish()
    }
}

impl Transition for ConditionTransition {
    fn evaluate(&self, ctx: &TransitionContext<'_>) -> Option<String> {
        (self.predicate)(ctx).then(|| self.target.clone())
    }

    fn allow_mode_reentry(&self) -> bool {
        self.allow_reentry
    }

    fn target_hint(&self) -> Option<&str> {
        Some(&self.target)
    }
}
