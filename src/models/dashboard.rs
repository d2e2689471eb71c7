use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::property::PropertyStatus;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub properties: u64,
    pub users: u64,
    pub transactions: u64,
    pub reviews: u64,
    pub agents: u64,
    pub sellers: u64,
    pub clients: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TotalViews {
    #[serde(rename = "totalViews")]
    pub total_views: i64,
}

/// Views recorded on one calendar day (UTC).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DayViews {
    pub date: NaiveDate,
    pub views: u64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct CompletedTransactions {
    pub count: u64,
    #[serde(rename = "totalValue")]
    pub total_value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusCount {
    pub status: PropertyStatus,
    pub count: u64,
}
