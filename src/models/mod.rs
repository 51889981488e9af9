use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{Error, PartitionFailure, Result};

// ============================================================================
// Academic Hierarchy
// ============================================================================

/// One tier of the fixed academic classification chain. Each level's valid
/// option set depends on the selected value of the level above it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HierarchyLevel {
    EducationLevel,
    GradeLevel,
    Section,
    Classroom,
}

impl HierarchyLevel {
    pub const ORDERED: [HierarchyLevel; 4] = [
        HierarchyLevel::EducationLevel,
        HierarchyLevel::GradeLevel,
        HierarchyLevel::Section,
        HierarchyLevel::Classroom,
    ];

    pub fn index(self) -> usize {
        match self {
            HierarchyLevel::EducationLevel => 0,
            HierarchyLevel::GradeLevel => 1,
            HierarchyLevel::Section => 2,
            HierarchyLevel::Classroom => 3,
        }
    }

    pub fn parent(self) -> Option<HierarchyLevel> {
        match self.index() {
            0 => None,
            i => Some(Self::ORDERED[i - 1]),
        }
    }

    pub fn child(self) -> Option<HierarchyLevel> {
        Self::ORDERED.get(self.index() + 1).copied()
    }

    /// Levels strictly below this one, in order.
    pub fn descendants(self) -> &'static [HierarchyLevel] {
        &Self::ORDERED[self.index() + 1..]
    }

    /// Backend listing endpoint for this level's options.
    pub fn endpoint(self) -> &'static str {
        match self {
            HierarchyLevel::EducationLevel => "/api/education-levels/",
            HierarchyLevel::GradeLevel => "/api/grade-levels/",
            HierarchyLevel::Section => "/api/sections/",
            HierarchyLevel::Classroom => "/api/classrooms/",
        }
    }

    /// Query parameter that scopes this level's listing by its parent's
    /// selected value. The top level is unscoped.
    pub fn scope_param(self) -> Option<&'static str> {
        match self {
            HierarchyLevel::EducationLevel => None,
            HierarchyLevel::GradeLevel => Some("education_level"),
            HierarchyLevel::Section => Some("grade_level"),
            HierarchyLevel::Classroom => Some("section"),
        }
    }
}

/// One selectable entry of a level's option set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelOption {
    pub id: String,
    pub name: String,
}

impl LevelOption {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// The backend's loose record shape for hierarchy options. Different
/// endpoints label the display name differently; some records carry none.
#[derive(Debug, Clone, Deserialize)]
pub struct RawLevelOption {
    pub id: Value,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub classroom_name: Option<String>,
}

impl RawLevelOption {
    /// Display name resolution prefers `name`, then `title`, then
    /// `classroom_name`, finally a synthesized "Classroom {id}" label.
    pub fn into_option(self) -> LevelOption {
        let id = match self.id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        let name = [self.name, self.title, self.classroom_name]
            .into_iter()
            .flatten()
            .find(|candidate| !candidate.trim().is_empty())
            .unwrap_or_else(|| format!("Classroom {}", id));
        LevelOption { id, name }
    }
}

// ============================================================================
// Term Reports (leaf entities)
// ============================================================================

/// One student's report card for a term. `education_level` is the partition
/// key batch operations must group by.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TermReport {
    pub id: i64,
    pub student_name: String,
    pub education_level: String,
    #[serde(default)]
    pub grade_level: Option<String>,
    #[serde(default)]
    pub teacher_remark: Option<String>,
    #[serde(default)]
    pub signature_url: Option<String>,
    #[serde(default)]
    pub stamp_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

// ============================================================================
// Batch Application
// ============================================================================

/// Which kind of image asset an upload carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Signature,
    Stamp,
}

impl AssetKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AssetKind::Signature => "signature",
            AssetKind::Stamp => "stamp",
        }
    }
}

/// Reference to an already-uploaded signature or stamp image.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AssetRef {
    pub id: i64,
    pub url: String,
}

/// A bulk action to apply to the selected term reports.
#[derive(Debug, Clone)]
pub enum BatchAction {
    ApplySignature(AssetRef),
    ApplyStamp(AssetRef),
    SetRemark(String),
}

impl BatchAction {
    pub fn kind(&self) -> &'static str {
        match self {
            BatchAction::ApplySignature(_) => "signature",
            BatchAction::ApplyStamp(_) => "stamp",
            BatchAction::SetRemark(_) => "remark",
        }
    }

    /// Precondition check, resolved locally before any network call.
    pub fn validate(&self) -> Result<()> {
        match self {
            BatchAction::ApplySignature(asset) | BatchAction::ApplyStamp(asset) => {
                if asset.url.trim().is_empty() {
                    return Err(Error::Validation(
                        "no uploaded image to apply; upload a signature or stamp first".to_string(),
                    ));
                }
            }
            BatchAction::SetRemark(text) => {
                if text.trim().is_empty() {
                    return Err(Error::Validation("remark text is empty".to_string()));
                }
            }
        }
        Ok(())
    }

    /// Action-specific fields of the batch request body.
    pub fn body_fields(&self) -> Value {
        match self {
            BatchAction::ApplySignature(asset) => {
                json!({ "action": "signature", "asset_url": asset.url })
            }
            BatchAction::ApplyStamp(asset) => {
                json!({ "action": "stamp", "asset_url": asset.url })
            }
            BatchAction::SetRemark(text) => {
                json!({ "action": "remark", "remark": text })
            }
        }
    }
}

/// Per-partition reply from the bulk-apply endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchApplyResponse {
    #[serde(default)]
    pub updated_count: u64,
}

/// Aggregate result of one batch operation across partitions.
#[derive(Debug, Clone, Default)]
pub struct ApplyOutcome {
    pub updated_total: u64,
    pub succeeded_partitions: Vec<String>,
    pub failed_partitions: Vec<PartitionFailure>,
}

impl ApplyOutcome {
    /// Some partitions landed while others failed.
    pub fn is_partial(&self) -> bool {
        !self.succeeded_partitions.is_empty() && !self.failed_partitions.is_empty()
    }

    /// User-facing one-line summary.
    pub fn summary(&self) -> String {
        if self.is_partial() {
            format!(
                "Updated {} report(s); {} group(s) could not be updated",
                self.updated_total,
                self.failed_partitions.len()
            )
        } else {
            format!("Updated {} report(s)", self.updated_total)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hierarchy_order_and_links() {
        assert_eq!(HierarchyLevel::EducationLevel.parent(), None);
        assert_eq!(
            HierarchyLevel::Section.parent(),
            Some(HierarchyLevel::GradeLevel)
        );
        assert_eq!(
            HierarchyLevel::EducationLevel.child(),
            Some(HierarchyLevel::GradeLevel)
        );
        assert_eq!(HierarchyLevel::Classroom.child(), None);
        assert_eq!(
            HierarchyLevel::GradeLevel.descendants(),
            &[HierarchyLevel::Section, HierarchyLevel::Classroom]
        );
        assert!(HierarchyLevel::Classroom.descendants().is_empty());
    }

    #[test]
    fn display_name_falls_back_through_fields() {
        let named: RawLevelOption =
            serde_json::from_value(json!({ "id": 4, "name": "JS 1", "title": "ignored" }))
                .unwrap();
        assert_eq!(named.into_option(), LevelOption::new("4", "JS 1"));

        let titled: RawLevelOption =
            serde_json::from_value(json!({ "id": 4, "name": "", "title": "Blue House" })).unwrap();
        assert_eq!(titled.into_option(), LevelOption::new("4", "Blue House"));

        let classroom_named: RawLevelOption =
            serde_json::from_value(json!({ "id": 4, "classroom_name": "SS 2 Science" })).unwrap();
        assert_eq!(
            classroom_named.into_option(),
            LevelOption::new("4", "SS 2 Science")
        );

        let bare: RawLevelOption = serde_json::from_value(json!({ "id": 17 })).unwrap();
        assert_eq!(bare.into_option(), LevelOption::new("17", "Classroom 17"));
    }

    #[test]
    fn string_ids_pass_through_unquoted() {
        let raw: RawLevelOption =
            serde_json::from_value(json!({ "id": "SENIOR_SECONDARY", "name": "Senior Secondary" }))
                .unwrap();
        assert_eq!(raw.into_option().id, "SENIOR_SECONDARY");
    }

    #[test]
    fn batch_action_validation() {
        let blank = BatchAction::ApplySignature(AssetRef {
            id: 0,
            url: String::new(),
        });
        assert!(matches!(blank.validate(), Err(Error::Validation(_))));

        let ready = BatchAction::ApplyStamp(AssetRef {
            id: 3,
            url: "https://uploads.example.com/stamp.png".to_string(),
        });
        assert!(ready.validate().is_ok());

        assert!(matches!(
            BatchAction::SetRemark("   ".to_string()).validate(),
            Err(Error::Validation(_))
        ));
    }
}
