//! Modifier reconciliation for agents that are interpolated rather than simulated.
//!
//! A proxy never runs movement ticks, so modifiers only appear and disappear as replicated
//! states arrive. Comparing two consecutive states by match key recovers the start and end
//! hooks the proxy would otherwise miss.

use crate::layered::{ModifierContext, ModifierHandle, MovementModifier};
use crate::sim::{SyncState, TimeStep};

use super::{FrameState, Mover};

/// Modifiers that started or ended between two proxy states.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProxyModifierChanges {
    pub started: Vec<ModifierHandle>,
    pub ended: Vec<ModifierHandle>,
}

fn contains_match(list: &[Box<dyn MovementModifier>], modifier: &dyn MovementModifier) -> bool {
    list.iter().any(|m| m.matches(modifier))
}

/// Fire modifier hooks for the step from `cached` to `new`.
///
/// Modifiers only in `new` get `on_start`, every active modifier in `new` gets the pre and post
/// movement hooks, and modifiers only in `cached` get `on_end` on a throwaway copy.
pub fn sync_proxy_modifiers(time_step: &TimeStep, cached: &SyncState, new: &mut SyncState) -> ProxyModifierChanges {
    let mut changes = ProxyModifierChanges::default();
    let mut modifiers = std::mem::take(&mut new.modifiers);
    {
        let ctx = ModifierContext {
            time_step,
            state: &*new,
        };
        let cached_active = cached.modifiers.active();
        for m in modifiers.active_mut().iter_mut() {
            if !contains_match(cached_active, m.as_ref()) {
                m.on_start(&ctx);
                changes.started.push(m.base().handle);
            }
        }
        for m in modifiers.active_mut().iter_mut() {
            m.on_pre_movement(&ctx);
            m.on_post_movement(&ctx);
        }
        for m in cached_active {
            if !contains_match(modifiers.active(), m.as_ref()) {
                let mut ending = m.clone();
                ending.on_end(&ctx);
                changes.ended.push(m.base().handle);
            }
        }
    }
    new.modifiers = modifiers;
    changes
}

impl Mover {
    /// Show an interpolated state on a proxy agent and reconcile its modifiers.
    pub fn tick_interpolated_sim_proxy(&mut self, time_step: &TimeStep, cached: &SyncState, new: &SyncState) -> ProxyModifierChanges {
        let mut shown = new.clone();
        let changes = sync_proxy_modifiers(time_step, cached, &mut shown);
        if !changes.started.is_empty() || !changes.ended.is_empty() {
            log::debug!(
                "proxy modifiers: {} started, {} ended",
                changes.started.len(),
                changes.ended.len()
            );
        }
        self.body.set_transform(shown.transform());
        let aux = self.aux_state().clone();
        self.buffer.publish(FrameState { sync: shown, aux });
        changes
    }
}
