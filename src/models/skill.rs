use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

pub const MAX_USER_SKILLS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Skill {
    pub id: i64,
    pub name: String,
}

/// Replaces the caller's whole skill set.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSkillsRequest {
    #[validate(length(max = 50, message = "Too many skills"))]
    pub skill_ids: Vec<i64>,
}

impl UpdateSkillsRequest {
    /// Skill ids with duplicates removed, in first-seen order.
    pub fn unique_ids(&self) -> Vec<i64> {
        let mut seen = std::collections::HashSet::new();
        self.skill_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkillQuery {
    /// Case-insensitive substring of the skill name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub q: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}
