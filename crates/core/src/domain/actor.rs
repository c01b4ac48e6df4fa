use serde::{Deserialize, Serialize};

pub const MANAGER_ROLE: &str = "manager";

/// The caller on whose behalf an operation runs. Passed explicitly to every
/// authorization check; nothing in the engine looks a session up on its own.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: String,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), role: role.into() }
    }

    pub fn manager(user_id: impl Into<String>) -> Self {
        Self::new(user_id, MANAGER_ROLE)
    }

    pub fn is_manager(&self) -> bool {
        self.role.trim().eq_ignore_ascii_case(MANAGER_ROLE)
    }
}

#[cfg(test)]
mod tests {
    use super::Actor;

    #[test]
    fn manager_role_is_matched_case_insensitively() {
        assert!(Actor::manager("u-1").is_manager());
        assert!(Actor::new("u-2", " Manager ").is_manager());
        assert!(!Actor::new("u-3", "staff").is_manager());
        assert!(!Actor::new("u-4", "").is_manager());
    }
}
