use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    api::form::check_length,
    common::GroupRole,
    db::group::{Group, Membership, NewGroup},
    mongodb::Id,
};

const MAX_NAME_LENGTH: usize = 100;
const MAX_DESCRIPTION_LENGTH: usize = 500;

/// A request to create a group with some initial members.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewGroupRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub member_ids: Vec<Id>,
}

impl NewGroupRequest {
    /// Validate this request, producing a group created by the caller and
    /// its initial member IDs.
    pub fn into_group(self, owner: Id) -> Result<(NewGroup, Vec<Id>)> {
        let mut problems = Vec::new();
        check_length("name", &self.name, MAX_NAME_LENGTH, &mut problems);
        if self.description.chars().count() > MAX_DESCRIPTION_LENGTH {
            problems.push(format!(
                "description must be at most {MAX_DESCRIPTION_LENGTH} characters"
            ));
        }
        if !problems.is_empty() {
            return Err(Error::validation(problems));
        }

        Ok((
            NewGroup::new(self.name, self.description, owner),
            self.member_ids,
        ))
    }
}

/// A request to add users to a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddMembersRequest {
    pub user_ids: Vec<Id>,
    #[serde(default)]
    pub role: Option<GroupRole>,
}

/// A request to remove a user from a group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoveMemberRequest {
    pub user_id: Id,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembersAdded {
    pub added: u64,
}

/// An API-friendly group description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDescription {
    pub id: Id,
    pub name: String,
    pub description: String,
    pub created_by: Id,
    pub size: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Group> for GroupDescription {
    fn from(group: Group) -> Self {
        Self {
            id: group.id,
            name: group.group.name,
            description: group.group.description,
            created_by: group.group.created_by,
            size: group.group.size,
            created_at: group.group.created_at,
            updated_at: group.group.updated_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberDescription {
    pub user_id: Id,
    pub role: GroupRole,
    pub joined_at: DateTime<Utc>,
}

impl From<Membership> for MemberDescription {
    fn from(membership: Membership) -> Self {
        Self {
            user_id: membership.user_id,
            role: membership.role,
            joined_at: membership.joined_at,
        }
    }
}

/// A group together with its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupDetail {
    pub group: GroupDescription,
    pub members: Vec<MemberDescription>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupList {
    pub groups: Vec<GroupDescription>,
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl NewGroupRequest {
        pub fn example(member_ids: Vec<Id>) -> Self {
            Self {
                name: "Class A".to_string(),
                description: "Morning cohort".to_string(),
                member_ids,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_and_description_limits() {
        let owner = Id::new();
        let (group, members) = NewGroupRequest::example(vec![owner])
            .into_group(owner)
            .unwrap();
        assert_eq!(group.size, 0);
        assert_eq!(members, vec![owner]);

        let mut request = NewGroupRequest::example(Vec::new());
        request.name = "n".repeat(101);
        request.description = "d".repeat(501);
        let err = request.into_group(owner).unwrap_err();
        assert_eq!(
            err.public_message(),
            "name must be between 1 and 100 characters, description must be at most 500 characters"
        );
    }
}
