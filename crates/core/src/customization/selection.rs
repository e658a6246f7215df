use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::customization::rules::RulesEngineResult;
use crate::domain::customization::{setting_ids, CustomizationState};

/// Where an effective selection came from, lowest priority first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionSource {
    User,
    Proposed,
    SpecialCase,
    Auto,
}

/// Competing writers for one evaluation tick. Later layers in
/// [`SelectionSource`] order overwrite earlier ones.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectionLayers {
    pub user: CustomizationState,
    pub proposed: BTreeMap<String, String>,
    pub special_case: BTreeMap<String, String>,
    pub auto: BTreeMap<String, String>,
}

impl SelectionLayers {
    pub fn from_engine(user: CustomizationState, result: &RulesEngineResult) -> Self {
        Self {
            special_case: special_case_selections(&user),
            user,
            proposed: result.proposed_selections.clone(),
            auto: result.auto_selections.clone(),
        }
    }

    /// Folds a later rules pass into the engine layers. Values from the later
    /// pass win within each layer.
    pub fn absorb(&mut self, result: &RulesEngineResult) {
        self.proposed.extend(result.proposed_selections.clone());
        self.auto.extend(result.auto_selections.clone());
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSelections {
    pub state: CustomizationState,
    pub sources: BTreeMap<String, SelectionSource>,
}

impl ResolvedSelections {
    pub fn source_of(&self, setting_id: &str) -> Option<SelectionSource> {
        self.sources.get(setting_id).copied()
    }
}

/// Merges the layers with a fixed priority: auto-select, then component
/// special cases, then proposed selections, then direct user input.
pub fn resolve_selections(layers: &SelectionLayers) -> ResolvedSelections {
    let mut resolved = ResolvedSelections::default();

    let mut write = |setting_id: &str, value: &str, source: SelectionSource| {
        resolved.state.set(setting_id, value);
        resolved.sources.insert(setting_id.to_string(), source);
    };

    for (setting_id, value) in layers.user.iter() {
        write(setting_id, value, SelectionSource::User);
    }
    for (setting_id, value) in &layers.proposed {
        write(setting_id, value, SelectionSource::Proposed);
    }
    for (setting_id, value) in &layers.special_case {
        write(setting_id, value, SelectionSource::SpecialCase);
    }
    for (setting_id, value) in &layers.auto {
        write(setting_id, value, SelectionSource::Auto);
    }

    resolved
}

/// Simple host contract: auto selections always overwrite, proposed selections
/// overwrite whenever they differ. Returns the settings whose value changed.
pub fn apply_engine_selections(
    state: &mut CustomizationState,
    result: &RulesEngineResult,
) -> Vec<String> {
    let mut changed = Vec::new();

    for (setting_id, option_id) in result.auto_selections.iter().chain(&result.proposed_selections)
    {
        if state.get(setting_id) != Some(option_id.as_str()) {
            state.set(setting_id.clone(), option_id.clone());
            if !changed.contains(setting_id) {
                changed.push(setting_id.clone());
            }
        }
    }

    changed
}

pub const BLACK_ONYX: &str = "black_onyx";
pub const BLACK_LEATHER: &str = "black_leather";

/// Component-level pairings that do not live in the rule table. Black onyx
/// as first stone pairs with a black leather cord while the chain is unset.
pub fn special_case_selections(state: &CustomizationState) -> BTreeMap<String, String> {
    let mut selections = BTreeMap::new();

    if state.get(setting_ids::FIRST_STONE) == Some(BLACK_ONYX)
        && state.get(setting_ids::CHAIN_TYPE).is_none()
    {
        selections.insert(setting_ids::CHAIN_TYPE.to_string(), BLACK_LEATHER.to_string());
    }

    selections
}
