use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::{Store, StoreError};
use crate::models::{Experience, ExperienceInput, NewUser, Page, Skill, User, UserSummary};

/// Skill catalogue shipped with the service. Kept in sync with the initial migration.
pub const DEFAULT_SKILLS: &[&str] = &[
    "Docker",
    "Go",
    "JavaScript",
    "Kubernetes",
    "PostgreSQL",
    "Python",
    "React",
    "Rust",
    "TypeScript",
    "Vue",
];

#[derive(Default)]
struct Inner {
    users: BTreeMap<i64, User>,
    next_user_id: i64,
    /// (follower, followed) -> insertion sequence
    follows: HashMap<(i64, i64), u64>,
    next_follow_seq: u64,
    experiences: BTreeMap<i64, Experience>,
    next_experience_id: i64,
    skills: BTreeMap<i64, Skill>,
    user_skills: HashMap<i64, BTreeSet<i64>>,
}

impl Inner {
    fn summary(&self, id: i64) -> Option<UserSummary> {
        self.users.get(&id).map(|user| UserSummary {
            id: user.id,
            username: user.username.clone(),
        })
    }

    fn sorted_skills(&self, ids: impl Iterator<Item = i64>) -> Vec<Skill> {
        let mut skills: Vec<Skill> = ids.filter_map(|id| self.skills.get(&id).cloned()).collect();
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        skills
    }
}

/// In-process store guarded by a single mutex.
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    /// An empty store with the default skill catalogue.
    pub fn new() -> Self {
        let mut inner = Inner::default();
        for (index, name) in DEFAULT_SKILLS.iter().enumerate() {
            let id = index as i64 + 1;
            inner.skills.insert(
                id,
                Skill {
                    id,
                    name: name.to_string(),
                },
            );
        }
        Self {
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Database("memory store lock poisoned".into()))
    }

    fn edges<F>(&self, page: Page, select: F) -> Result<Vec<UserSummary>, StoreError>
    where
        F: Fn(&(i64, i64)) -> Option<i64>,
    {
        let inner = self.lock()?;
        let mut edges: Vec<(u64, i64)> = inner
            .follows
            .iter()
            .filter_map(|(edge, seq)| select(edge).map(|other| (*seq, other)))
            .collect();
        edges.sort_by(|a, b| b.0.cmp(&a.0));

        Ok(edges
            .into_iter()
            .skip(page.offset() as usize)
            .take(page.limit() as usize)
            .filter_map(|(_, id)| inner.summary(id))
            .collect())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> Result<User, StoreError> {
        let mut inner = self.lock()?;
        if inner.users.values().any(|u| u.email == new_user.email) {
            return Err(StoreError::Conflict("email"));
        }
        if inner.users.values().any(|u| u.username == new_user.username) {
            return Err(StoreError::Conflict("username"));
        }

        inner.next_user_id += 1;
        let now = Utc::now();
        let user = User {
            id: inner.next_user_id,
            email: new_user.email,
            username: new_user.username,
            password_hash: new_user.password_hash,
            is_verified: false,
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn delete_unverified_user(&self, email: &str) -> Result<u64, StoreError> {
        let pending = {
            let inner = self.lock()?;
            inner
                .users
                .values()
                .find(|u| u.email == email && !u.is_verified)
                .map(|u| u.id)
        };
        match pending {
            Some(id) => Ok(self.delete_user(id).await? as u64),
            None => Ok(0),
        }
    }

    async fn find_user_by_id(&self, id: i64) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_user_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        let email = login.to_lowercase();
        Ok(self
            .lock()?
            .users
            .values()
            .find(|u| u.email == email || u.username == login)
            .cloned())
    }

    async fn mark_user_verified(&self, id: i64) -> Result<Option<User>, StoreError> {
        let mut inner = self.lock()?;
        Ok(inner.users.get_mut(&id).map(|user| {
            user.is_verified = true;
            user.updated_at = Utc::now();
            user.clone()
        }))
    }

    async fn update_password(&self, id: i64, password_hash: &str) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        Ok(match inner.users.get_mut(&id) {
            Some(user) => {
                user.password_hash = password_hash.to_string();
                user.updated_at = Utc::now();
                true
            }
            None => false,
        })
    }

    async fn delete_user(&self, id: i64) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        if inner.users.remove(&id).is_none() {
            return Ok(false);
        }
        inner
            .follows
            .retain(|(follower, followed), _| *follower != id && *followed != id);
        inner.experiences.retain(|_, e| e.user_id != id);
        inner.user_skills.remove(&id);
        Ok(true)
    }

    async fn follow(&self, follower_id: i64, followed_id: i64) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        if !inner.users.contains_key(&follower_id) || !inner.users.contains_key(&followed_id) {
            return Err(StoreError::Database("follow references a missing user".into()));
        }
        if inner.follows.contains_key(&(follower_id, followed_id)) {
            return Ok(false);
        }
        inner.next_follow_seq += 1;
        let seq = inner.next_follow_seq;
        inner.follows.insert((follower_id, followed_id), seq);
        Ok(true)
    }

    async fn unfollow(&self, follower_id: i64, followed_id: i64) -> Result<bool, StoreError> {
        Ok(self
            .lock()?
            .follows
            .remove(&(follower_id, followed_id))
            .is_some())
    }

    async fn is_following(&self, follower_id: i64, followed_id: i64) -> Result<bool, StoreError> {
        Ok(self
            .lock()?
            .follows
            .contains_key(&(follower_id, followed_id)))
    }

    async fn follower_count(&self, user_id: i64) -> Result<i64, StoreError> {
        Ok(self
            .lock()?
            .follows
            .keys()
            .filter(|(_, followed)| *followed == user_id)
            .count() as i64)
    }

    async fn following_count(&self, user_id: i64) -> Result<i64, StoreError> {
        Ok(self
            .lock()?
            .follows
            .keys()
            .filter(|(follower, _)| *follower == user_id)
            .count() as i64)
    }

    async fn followers(&self, user_id: i64, page: Page) -> Result<Vec<UserSummary>, StoreError> {
        self.edges(page, |(follower, followed)| {
            (*followed == user_id).then_some(*follower)
        })
    }

    async fn following(&self, user_id: i64, page: Page) -> Result<Vec<UserSummary>, StoreError> {
        self.edges(page, |(follower, followed)| {
            (*follower == user_id).then_some(*followed)
        })
    }

    async fn create_experience(
        &self,
        user_id: i64,
        input: &ExperienceInput,
    ) -> Result<Experience, StoreError> {
        let mut inner = self.lock()?;
        inner.next_experience_id += 1;
        let experience = Experience::new(inner.next_experience_id, user_id, input);
        inner.experiences.insert(experience.id, experience.clone());
        Ok(experience)
    }

    async fn update_experience(
        &self,
        id: i64,
        user_id: i64,
        input: &ExperienceInput,
    ) -> Result<Option<Experience>, StoreError> {
        let mut inner = self.lock()?;
        match inner.experiences.get_mut(&id) {
            Some(existing) if existing.user_id == user_id => {
                *existing = Experience::new(id, user_id, input);
                Ok(Some(existing.clone()))
            }
            _ => Ok(None),
        }
    }

    async fn delete_experience(&self, id: i64, user_id: i64) -> Result<bool, StoreError> {
        let mut inner = self.lock()?;
        let owned = inner
            .experiences
            .get(&id)
            .map_or(false, |existing| existing.user_id == user_id);
        if owned {
            inner.experiences.remove(&id);
        }
        Ok(owned)
    }

    async fn experiences_for_user(&self, user_id: i64) -> Result<Vec<Experience>, StoreError> {
        let inner = self.lock()?;
        let mut entries: Vec<Experience> = inner
            .experiences
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.id.cmp(&a.id)));
        Ok(entries)
    }

    async fn search_skills(
        &self,
        query: Option<&str>,
        limit: i64,
    ) -> Result<Vec<Skill>, StoreError> {
        let inner = self.lock()?;
        let needle = query.map(str::to_lowercase);
        let mut skills = inner.sorted_skills(inner.skills.keys().copied());
        skills.retain(|skill| match &needle {
            Some(needle) => skill.name.to_lowercase().contains(needle.as_str()),
            None => true,
        });
        skills.truncate(limit.max(0) as usize);
        Ok(skills)
    }

    async fn user_skills(&self, user_id: i64) -> Result<Vec<Skill>, StoreError> {
        let inner = self.lock()?;
        Ok(match inner.user_skills.get(&user_id) {
            Some(ids) => inner.sorted_skills(ids.iter().copied()),
            None => Vec::new(),
        })
    }

    async fn replace_user_skills(
        &self,
        user_id: i64,
        skill_ids: &[i64],
    ) -> Result<Vec<Skill>, StoreError> {
        let mut inner = self.lock()?;
        if let Some(unknown) = skill_ids.iter().find(|id| !inner.skills.contains_key(*id)) {
            return Err(StoreError::UnknownSkill(*unknown));
        }
        let ids: BTreeSet<i64> = skill_ids.iter().copied().collect();
        let skills = inner.sorted_skills(ids.iter().copied());
        inner.user_skills.insert(user_id, ids);
        Ok(skills)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EmploymentType, LocationType};
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn new_user(name: &str) -> NewUser {
        NewUser {
            email: format!("{}@example.com", name),
            username: name.to_string(),
            password_hash: "hash".to_string(),
        }
    }

    fn experience(days_ago: i64) -> ExperienceInput {
        ExperienceInput {
            company_name: format!("Company {}", days_ago),
            occupation: "Engineer".to_string(),
            location_name: None,
            location_type: LocationType::Remote,
            employment_type: EmploymentType::Contract,
            start_date: Utc::now() - Duration::days(days_ago),
            end_date: None,
            is_current: false,
            description: "Work".to_string(),
        }
    }

    #[actix_rt::test]
    async fn test_unique_email_and_username() {
        let store = MemoryStore::new();
        store.create_user(new_user("alice")).await.unwrap();

        let mut same_email = new_user("bob");
        same_email.email = "alice@example.com".to_string();
        assert_eq!(
            store.create_user(same_email).await.unwrap_err(),
            StoreError::Conflict("email")
        );

        let mut same_name = new_user("alice");
        same_name.email = "other@example.com".to_string();
        assert_eq!(
            store.create_user(same_name).await.unwrap_err(),
            StoreError::Conflict("username")
        );
    }

    #[actix_rt::test]
    async fn test_login_matches_email_or_username() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("alice")).await.unwrap();

        let by_name = store.find_user_by_login("alice").await.unwrap().unwrap();
        let by_email = store
            .find_user_by_login("Alice@Example.com")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_name.id, user.id);
        assert_eq!(by_email.id, user.id);
        assert!(store.find_user_by_login("nobody").await.unwrap().is_none());
    }

    #[actix_rt::test]
    async fn test_delete_unverified_only() {
        let store = MemoryStore::new();
        let pending = store.create_user(new_user("pending")).await.unwrap();
        let verified = store.create_user(new_user("verified")).await.unwrap();
        store.mark_user_verified(verified.id).await.unwrap();

        assert_eq!(store.delete_unverified_user(&verified.email).await.unwrap(), 0);
        assert_eq!(store.delete_unverified_user(&pending.email).await.unwrap(), 1);
        assert!(store.find_user_by_id(pending.id).await.unwrap().is_none());
        assert!(store.find_user_by_id(verified.id).await.unwrap().is_some());
    }

    #[actix_rt::test]
    async fn test_follow_graph_and_cascade() {
        let store = MemoryStore::new();
        let a = store.create_user(new_user("alice")).await.unwrap();
        let b = store.create_user(new_user("bob")).await.unwrap();
        let c = store.create_user(new_user("carol")).await.unwrap();

        assert!(store.follow(b.id, a.id).await.unwrap());
        assert!(!store.follow(b.id, a.id).await.unwrap());
        assert!(store.follow(c.id, a.id).await.unwrap());
        assert!(store.follow(a.id, c.id).await.unwrap());

        assert_eq!(store.follower_count(a.id).await.unwrap(), 2);
        assert_eq!(store.following_count(a.id).await.unwrap(), 1);
        assert!(store.is_following(b.id, a.id).await.unwrap());
        assert!(!store.is_following(a.id, b.id).await.unwrap());

        let followers = store.followers(a.id, Page::default()).await.unwrap();
        let names: Vec<&str> = followers.iter().map(|u| u.username.as_str()).collect();
        assert_eq!(names, vec!["carol", "bob"]);

        let second_page = store
            .followers(
                a.id,
                Page {
                    limit: Some(1),
                    offset: Some(1),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            second_page,
            vec![UserSummary {
                id: b.id,
                username: "bob".into()
            }]
        );

        assert!(store.delete_user(c.id).await.unwrap());
        assert_eq!(store.follower_count(a.id).await.unwrap(), 1);
        assert_eq!(store.following_count(a.id).await.unwrap(), 0);
    }

    #[actix_rt::test]
    async fn test_experience_ownership_and_order() {
        let store = MemoryStore::new();
        let owner = store.create_user(new_user("owner")).await.unwrap();
        let other = store.create_user(new_user("other")).await.unwrap();

        let old = store.create_experience(owner.id, &experience(900)).await.unwrap();
        let recent = store.create_experience(owner.id, &experience(30)).await.unwrap();

        let listed = store.experiences_for_user(owner.id).await.unwrap();
        assert_eq!(listed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![recent.id, old.id]);

        assert!(store
            .update_experience(old.id, other.id, &experience(10))
            .await
            .unwrap()
            .is_none());
        assert!(!store.delete_experience(old.id, other.id).await.unwrap());
        assert!(store.delete_experience(old.id, owner.id).await.unwrap());
        assert_eq!(store.experiences_for_user(owner.id).await.unwrap().len(), 1);
    }

    #[actix_rt::test]
    async fn test_skills_search_and_replace() {
        let store = MemoryStore::new();
        let user = store.create_user(new_user("alice")).await.unwrap();

        let found = store.search_skills(Some("SCRIPT"), 10).await.unwrap();
        let names: Vec<&str> = found.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["JavaScript", "TypeScript"]);
        assert_eq!(store.search_skills(None, 3).await.unwrap().len(), 3);

        let rust = store.search_skills(Some("rust"), 1).await.unwrap()[0].clone();
        let go = store.search_skills(Some("go"), 1).await.unwrap()[0].clone();
        let saved = store
            .replace_user_skills(user.id, &[rust.id, go.id])
            .await
            .unwrap();
        assert_eq!(saved, vec![go.clone(), rust.clone()]);

        assert_eq!(
            store.replace_user_skills(user.id, &[rust.id, 9999]).await,
            Err(StoreError::UnknownSkill(9999))
        );
        assert_eq!(store.user_skills(user.id).await.unwrap(), vec![go, rust]);
    }
}
