use serde::{Deserialize, Serialize};

/// Build request state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestState {
    New,
    Review,
    Accepted,
    Declined,
    Superseded,
    Revoked,
}

impl RequestState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestState::New => "new",
            RequestState::Review => "review",
            RequestState::Accepted => "accepted",
            RequestState::Declined => "declined",
            RequestState::Superseded => "superseded",
            RequestState::Revoked => "revoked",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(RequestState::New),
            "review" => Some(RequestState::Review),
            "accepted" => Some(RequestState::Accepted),
            "declined" => Some(RequestState::Declined),
            "superseded" => Some(RequestState::Superseded),
            "revoked" => Some(RequestState::Revoked),
            _ => None,
        }
    }

    /// Accepted, declined, superseded and revoked requests no longer change
    pub fn is_final(&self) -> bool {
        !matches!(self, RequestState::New | RequestState::Review)
    }
}

/// Review state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReviewState {
    New,
    Accepted,
    Declined,
}

impl ReviewState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewState::New => "new",
            ReviewState::Accepted => "accepted",
            ReviewState::Declined => "declined",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new" => Some(ReviewState::New),
            "accepted" => Some(ReviewState::Accepted),
            "declined" => Some(ReviewState::Declined),
            _ => None,
        }
    }
}

/// Build request targeting a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BsRequest {
    pub id: Option<i64>,
    pub description: String,
    pub state: RequestState,
    pub target_project_id: i64,
    pub staging_project_id: Option<i64>,
    pub creator: String,
    pub created_ts: i64,
    pub modified_ts: i64,
}

impl BsRequest {
    /// Create a new request in the `new` state
    pub fn new(description: String, target_project_id: i64, creator: String) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            id: None,
            description,
            state: RequestState::New,
            target_project_id,
            staging_project_id: None,
            creator,
            created_ts: now,
            modified_ts: now,
        }
    }

    pub fn is_staged(&self) -> bool {
        self.staging_project_id.is_some()
    }
}

/// Review on a build request, assigned to a group or a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub id: Option<i64>,
    pub bs_request_id: i64,
    pub state: ReviewState,
    pub by_group: Option<String>,
    pub by_user: Option<String>,
    /// Author of the review
    pub user_id: Option<i64>,
    pub created_ts: i64,
    pub modified_ts: i64,
}
