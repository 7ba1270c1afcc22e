use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// A request to assign a form to some groups.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssignRequest {
    pub form_id: Id,
    pub group_ids: Vec<Id>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignResult {
    pub assigned_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignedGroups {
    pub group_ids: Vec<Id>,
}
