use std::collections::HashSet;

use shared::domain::UserId;

/// Static allow-list of privileged identities, fixed for the process lifetime.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    admins: HashSet<UserId>,
}

impl AccessPolicy {
    pub fn new(admins: impl IntoIterator<Item = UserId>) -> Self {
        Self {
            admins: admins.into_iter().collect(),
        }
    }

    pub fn is_privileged(&self, user_id: UserId) -> bool {
        self.admins.contains(&user_id)
    }

    pub fn admin_count(&self) -> usize {
        self.admins.len()
    }
}
