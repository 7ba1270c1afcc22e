use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::{
    bson::{self, doc, serde_helpers::chrono_datetime_as_bson_datetime},
    options::FindOptions,
    Client, ClientSession, Database,
};
use rocket::futures::TryStreamExt;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{
    common::GroupRole,
    mongodb::{ids_from_bson, is_duplicate_key_error, retry_transient, unique_ids, Coll, Id},
};

/// Core group data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupCore {
    pub name: String,
    pub description: String,
    pub created_by: Id,
    /// Number of members. Only ever written from a fresh count of the
    /// memberships, in the same transaction that changed them.
    pub size: u32,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl GroupCore {
    /// A new group, initially without members.
    pub fn new(name: String, description: String, created_by: Id) -> Self {
        let now = Utc::now();
        Self {
            name,
            description,
            created_by,
            size: 0,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A group without an ID.
pub type NewGroup = GroupCore;

/// A group from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub group: GroupCore,
}

impl Deref for Group {
    type Target = GroupCore;

    fn deref(&self) -> &Self::Target {
        &self.group
    }
}

impl DerefMut for Group {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.group
    }
}

/// A user's membership of a group. At most one per (group, user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub group_id: Id,
    pub user_id: Id,
    pub role: GroupRole,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub joined_at: DateTime<Utc>,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
}

impl Membership {
    pub fn new(group_id: Id, user_id: Id, role: GroupRole) -> Self {
        let now = Utc::now();
        Self {
            group_id,
            user_id,
            role,
            joined_at: now,
            updated_at: now,
        }
    }
}

impl Group {
    /// Create a group with an initial set of members. Repeated member IDs
    /// are only added once.
    pub async fn create_with_members(
        db: &Database,
        db_client: &Client,
        new_group: NewGroup,
        member_ids: Vec<Id>,
    ) -> Result<Group> {
        let member_ids = &unique_ids(member_ids);
        let new_group = &new_group;
        retry_transient("group creation", move || {
            Self::create_once(db, db_client, new_group, member_ids)
        })
        .await
    }

    async fn create_once(
        db: &Database,
        db_client: &Client,
        new_group: &NewGroup,
        member_ids: &[Id],
    ) -> Result<Group> {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        let id: Id = Coll::<NewGroup>::from_db(db)
            .insert_one_with_session(new_group, None, &mut session)
            .await?
            .inserted_id
            .as_object_id()
            .unwrap() // Valid because the ID comes directly from the DB
            .into();

        if !member_ids.is_empty() {
            let memberships = member_ids
                .iter()
                .map(|user_id| Membership::new(id, *user_id, GroupRole::Member))
                .collect::<Vec<_>>();
            Coll::<Membership>::from_db(db)
                .insert_many_with_session(memberships, None, &mut session)
                .await?;
        }
        let size = Self::recount_size(db, id, &mut session).await?;

        session.commit_transaction().await?;
        info!("Created group {id} \"{}\" with {size} members", new_group.name);

        Ok(Group {
            id,
            group: GroupCore {
                size,
                ..new_group.clone()
            },
        })
    }

    /// Get a group by ID.
    pub async fn find(db: &Database, group_id: Id) -> Result<Group> {
        Coll::<Group>::from_db(db)
            .find_one(group_id.as_doc(), None)
            .await?
            .ok_or_else(|| Error::not_found(format!("Group {group_id}")))
    }

    /// All groups, most recently created first.
    pub async fn list(db: &Database) -> Result<Vec<Group>> {
        let newest_first = FindOptions::builder()
            .sort(doc! { "created_at": -1, "_id": -1 })
            .build();
        let groups = Coll::<Group>::from_db(db)
            .find(None, newest_first)
            .await?
            .try_collect()
            .await?;
        Ok(groups)
    }

    /// The memberships of this group, in the order members joined.
    pub async fn members(&self, db: &Database) -> Result<Vec<Membership>> {
        let by_join = FindOptions::builder()
            .sort(doc! { "joined_at": 1, "user_id": 1 })
            .build();
        let members = Coll::<Membership>::from_db(db)
            .find(doc! { "group_id": self.id }, by_join)
            .await?
            .try_collect()
            .await?;
        Ok(members)
    }

    /// Add the given users to a group, skipping those already in it.
    /// Returns how many were added.
    pub async fn add_members(
        db: &Database,
        db_client: &Client,
        group_id: Id,
        user_ids: Vec<Id>,
        role: GroupRole,
    ) -> Result<u64> {
        let user_ids = &unique_ids(user_ids);
        retry_transient("adding group members", move || {
            Self::add_members_once(db, db_client, group_id, user_ids, role)
        })
        .await
    }

    async fn add_members_once(
        db: &Database,
        db_client: &Client,
        group_id: Id,
        user_ids: &[Id],
        role: GroupRole,
    ) -> Result<u64> {
        let memberships = Coll::<Membership>::from_db(db);

        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        Self::exists_with_session(db, group_id, &mut session).await?;

        let existing = memberships
            .distinct_with_session(
                "user_id",
                doc! { "group_id": group_id },
                None,
                &mut session,
            )
            .await?;
        let existing = ids_from_bson(existing);
        let new_members = user_ids
            .iter()
            .filter(|user_id| !existing.contains(*user_id))
            .map(|user_id| Membership::new(group_id, *user_id, role))
            .collect::<Vec<_>>();
        if new_members.is_empty() {
            debug!("No new members for group {group_id}");
            return Err(Error::Conflict(format!(
                "All users are already members of group {group_id}"
            )));
        }

        let added = match memberships
            .insert_many_with_session(&new_members, None, &mut session)
            .await
        {
            Ok(result) => result.inserted_ids.len() as u64,
            // Added by a transaction that committed after our snapshot.
            Err(e) if is_duplicate_key_error(&e) => {
                return Err(Error::Conflict(format!(
                    "Some users were concurrently added to group {group_id}"
                )))
            }
            Err(e) => return Err(e.into()),
        };
        let size = Self::recount_size(db, group_id, &mut session).await?;

        session.commit_transaction().await?;
        info!("Added {added} members to group {group_id}, now {size}");
        Ok(added)
    }

    /// Remove a user from a group. Removing a non-member changes nothing.
    pub async fn remove_member(
        db: &Database,
        db_client: &Client,
        group_id: Id,
        user_id: Id,
    ) -> Result<()> {
        retry_transient("removing a group member", || {
            Self::remove_member_once(db, db_client, group_id, user_id)
        })
        .await
    }

    async fn remove_member_once(
        db: &Database,
        db_client: &Client,
        group_id: Id,
        user_id: Id,
    ) -> Result<()> {
        let mut session = db_client.start_session(None).await?;
        session.start_transaction(None).await?;

        Self::exists_with_session(db, group_id, &mut session).await?;

        let filter = doc! { "group_id": group_id, "user_id": user_id };
        let removed = Coll::<Membership>::from_db(db)
            .delete_one_with_session(filter, None, &mut session)
            .await?
            .deleted_count;
        let size = Self::recount_size(db, group_id, &mut session).await?;

        session.commit_transaction().await?;
        if removed == 0 {
            debug!("User {user_id} was not a member of group {group_id}");
        } else {
            info!("Removed user {user_id} from group {group_id}, now {size}");
        }
        Ok(())
    }

    async fn exists_with_session(
        db: &Database,
        group_id: Id,
        session: &mut ClientSession,
    ) -> Result<()> {
        Coll::<Group>::from_db(db)
            .find_one_with_session(group_id.as_doc(), None, session)
            .await?
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("Group {group_id}")))
    }

    /// Set the size of a group from a fresh count of its memberships.
    async fn recount_size(db: &Database, group_id: Id, session: &mut ClientSession) -> Result<u32> {
        let count = Coll::<Membership>::from_db(db)
            .count_documents_with_session(doc! { "group_id": group_id }, None, session)
            .await?;
        let size = u32::try_from(count).unwrap_or(u32::MAX);

        let update = doc! {
            "$set": {
                "size": size,
                "updated_at": bson::DateTime::now(),
            }
        };
        Coll::<Group>::from_db(db)
            .update_one_with_session(group_id.as_doc(), update, None, session)
            .await?;
        Ok(size)
    }
}
