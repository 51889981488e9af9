use std::sync::{Arc, Mutex};

use indexmap::IndexMap;
use tracing::{debug, warn};

use crate::api::{unwrap_page, BackendClient};
use crate::error::Result;
use crate::models::{HierarchyLevel, LevelOption, RawLevelOption};

const LEVEL_COUNT: usize = HierarchyLevel::ORDERED.len();

#[derive(Default)]
struct ResolverState {
    selection: [Option<String>; LEVEL_COUNT],
    options: [Vec<LevelOption>; LEVEL_COUNT],
    // Bumped whenever a level's options are (re)requested or its ancestry
    // changes; a fetch applies only if its captured generation is still
    // current, so stale results are discarded rather than raced.
    generation: [u64; LEVEL_COUNT],
}

impl ResolverState {
    fn clear_below(&mut self, level: HierarchyLevel) {
        for below in level.descendants() {
            let i = below.index();
            self.selection[i] = None;
            self.options[i].clear();
            self.generation[i] += 1;
        }
    }
}

/// Maintains the cascading education-level → grade-level → section →
/// classroom selection and the option sets it implies. Selecting a level
/// clears everything below it and fetches the next level's options; failed
/// or empty fetches degrade to a synthesized fallback set so a dropdown is
/// never left unusably empty.
pub struct HierarchyResolver {
    backend: Arc<dyn BackendClient>,
    state: Mutex<ResolverState>,
}

impl HierarchyResolver {
    pub fn new(backend: Arc<dyn BackendClient>) -> Self {
        Self {
            backend,
            state: Mutex::new(ResolverState::default()),
        }
    }

    /// Current selection as (level, value) pairs; unset levels are omitted.
    pub fn selection(&self) -> IndexMap<HierarchyLevel, String> {
        let state = self.state.lock().unwrap();
        HierarchyLevel::ORDERED
            .iter()
            .filter_map(|&level| {
                state.selection[level.index()]
                    .clone()
                    .map(|value| (level, value))
            })
            .collect()
    }

    pub fn selected(&self, level: HierarchyLevel) -> Option<String> {
        self.state.lock().unwrap().selection[level.index()].clone()
    }

    pub fn options_for(&self, level: HierarchyLevel) -> Vec<LevelOption> {
        self.state.lock().unwrap().options[level.index()].clone()
    }

    /// Set or clear the selection at one level. Every level strictly below
    /// is cleared along with its cached options, and any fetch still in
    /// flight for those levels becomes stale. A non-empty value triggers a
    /// fetch of the next level's options scoped by it.
    pub async fn set_level_selection(&self, level: HierarchyLevel, value: Option<&str>) {
        {
            let mut state = self.state.lock().unwrap();
            state.selection[level.index()] = value.map(str::to_string);
            state.clear_below(level);
        }

        if let (Some(value), Some(child)) = (value, level.child()) {
            self.load_options_for(child, Some(value)).await;
        }
    }

    /// Populate one level's option set, scoped by its parent's chosen value
    /// (the top level is unscoped). A failed fetch or an empty result is
    /// never surfaced as an error: the option set degrades to the
    /// deterministic fallback for the parent's education category, and the
    /// user re-driving the parent selection is the retry path.
    pub async fn load_options_for(&self, level: HierarchyLevel, parent_value: Option<&str>) {
        let generation = {
            let mut state = self.state.lock().unwrap();
            state.generation[level.index()] += 1;
            state.generation[level.index()]
        };

        let options = match self.fetch_options(level, parent_value).await {
            Ok(options) if !options.is_empty() => options,
            Ok(_) => {
                debug!(?level, ?parent_value, "backend returned no options, synthesizing fallback");
                self.synthesize(level, parent_value)
            }
            Err(err) => {
                warn!(?level, ?parent_value, error = %err, "option fetch degraded, synthesizing fallback");
                self.synthesize(level, parent_value)
            }
        };

        let mut state = self.state.lock().unwrap();
        if state.generation[level.index()] != generation {
            debug!(?level, ?parent_value, "discarding stale option fetch");
            return;
        }

        // A previously selected value no longer on offer is dropped, along
        // with everything that depended on it.
        if let Some(current) = state.selection[level.index()].clone() {
            if !options.iter().any(|option| option.id == current) {
                state.selection[level.index()] = None;
                state.clear_below(level);
            }
        }
        state.options[level.index()] = options;
    }

    async fn fetch_options(
        &self,
        level: HierarchyLevel,
        parent_value: Option<&str>,
    ) -> Result<Vec<LevelOption>> {
        let mut query: Vec<(&str, &str)> = Vec::new();
        if let (Some(param), Some(parent)) = (level.scope_param(), parent_value) {
            query.push((param, parent));
        }
        let raw = self.backend.get(level.endpoint(), &query).await?;
        let records: Vec<RawLevelOption> = unwrap_page(level.endpoint(), raw)?;
        Ok(records.into_iter().map(RawLevelOption::into_option).collect())
    }

    fn synthesize(&self, level: HierarchyLevel, parent_value: Option<&str>) -> Vec<LevelOption> {
        // Grade levels are scoped by the education level directly; lower
        // levels fall back on whatever education level is currently
        // selected to pick the category.
        let category_hint = match level {
            HierarchyLevel::GradeLevel => parent_value.map(str::to_string),
            _ => self.selected(HierarchyLevel::EducationLevel),
        };
        fallback_options(level, category_hint.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EducationCategory {
    Primary,
    Junior,
    Senior,
}

impl EducationCategory {
    fn from_hint(hint: Option<&str>) -> Self {
        let hint = hint.unwrap_or("").to_ascii_uppercase();
        if hint.contains("SENIOR") || hint.starts_with("SS") {
            EducationCategory::Senior
        } else if hint.contains("JUNIOR") || hint.starts_with("JS") {
            EducationCategory::Junior
        } else {
            EducationCategory::Primary
        }
    }
}

fn numbered(names: &[&str]) -> Vec<LevelOption> {
    names
        .iter()
        .enumerate()
        .map(|(i, name)| LevelOption::new((i + 1).to_string(), *name))
        .collect()
}

/// Deterministic placeholder options used when the backend yields no real
/// options for a level. Synthesized entries carry sequential ids starting
/// at 1; the top level keeps its well-known codes as ids.
pub fn fallback_options(level: HierarchyLevel, category_hint: Option<&str>) -> Vec<LevelOption> {
    let category = EducationCategory::from_hint(category_hint);
    match level {
        HierarchyLevel::EducationLevel => vec![
            LevelOption::new("PRIMARY", "Primary"),
            LevelOption::new("JUNIOR_SECONDARY", "Junior Secondary"),
            LevelOption::new("SENIOR_SECONDARY", "Senior Secondary"),
        ],
        HierarchyLevel::GradeLevel => match category {
            EducationCategory::Senior => numbered(&["SS 1", "SS 2", "SS 3"]),
            EducationCategory::Junior => numbered(&["JS 1", "JS 2", "JS 3"]),
            EducationCategory::Primary => numbered(&[
                "Primary 1",
                "Primary 2",
                "Primary 3",
                "Primary 4",
                "Primary 5",
                "Primary 6",
            ]),
        },
        HierarchyLevel::Section => match category {
            EducationCategory::Senior => numbered(&["Science", "Arts", "Commercial"]),
            EducationCategory::Junior => numbered(&["A", "B", "C"]),
            EducationCategory::Primary => numbered(&["A", "B"]),
        },
        HierarchyLevel::Classroom => match category {
            EducationCategory::Senior => {
                numbered(&["Mathematics", "English Language", "Biology", "Economics"])
            }
            EducationCategory::Junior => {
                numbered(&["Mathematics", "English Studies", "Basic Science"])
            }
            EducationCategory::Primary => numbered(&["Numeracy", "Literacy"]),
        },
    }
}
