pub mod experience;
pub mod follow;
pub mod skill;
pub mod user;

use serde::{Deserialize, Serialize};

pub use experience::{EmploymentType, Experience, ExperienceInput, LocationType};
pub use follow::{FollowRequest, UnfollowRequest};
pub use skill::{Skill, SkillQuery, UpdateSkillsRequest};
pub use user::{NewUser, PublicUserResponse, User, UserResponse, UserSummary};

pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

/// `?limit=&offset=` query parameters for list endpoints.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Page {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<i64>,
}

impl Page {
    pub fn limit(&self) -> i64 {
        self.limit
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE)
    }

    pub fn offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_bounds() {
        let page = Page::default();
        assert_eq!(page.limit(), DEFAULT_PAGE_SIZE);
        assert_eq!(page.offset(), 0);

        let page = Page {
            limit: Some(10_000),
            offset: Some(-5),
        };
        assert_eq!(page.limit(), MAX_PAGE_SIZE);
        assert_eq!(page.offset(), 0);

        let page = Page {
            limit: Some(0),
            offset: Some(40),
        };
        assert_eq!(page.limit(), 1);
        assert_eq!(page.offset(), 40);
    }
}
