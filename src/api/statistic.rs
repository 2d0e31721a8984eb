use serde::{Deserialize, Serialize};

use crate::db;

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct",
    "Nov", "Dec",
];

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct CategoryTickets {
    pub category: String,
    pub count: u64,
}

impl From<db::statistic::CategoryTickets> for CategoryTickets {
    fn from(stat: db::statistic::CategoryTickets) -> Self {
        Self {
            category: stat.category,
            count: stat.count,
        }
    }
}

/// Revenue per month of one year, ready to be charted.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct MonthlyRevenue {
    pub year: i32,
    pub labels: Vec<String>,
    pub data: Vec<f64>,
}

impl MonthlyRevenue {
    pub fn new(year: i32, revenue: [f64; 12]) -> Self {
        Self {
            year,
            labels: MONTHS.iter().map(|m| m.to_string()).collect(),
            data: revenue.to_vec(),
        }
    }
}
