use chrono::{DateTime, Utc};
use mongodb::bson::{to_bson, Document};
use serde::{Deserialize, Serialize};

use super::property::PropertyRef;
use super::user::UserSummary;
use super::{string_enum, Validation};
use crate::error::{ApiError, ApiResult};

string_enum!(TransactionStatus {
    Pending => "pending",
    Completed => "completed",
    Cancelled => "cancelled",
});

string_enum!(DealType {
    Sale => "sale",
    Rent => "rent",
});

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    #[serde(rename = "_id")]
    pub id: String,
    pub date: DateTime<Utc>,
    pub sale_price: f64,
    pub status: TransactionStatus,
    pub deal_type: DealType,
    pub property: String,
    pub seller: String,
    pub buyer: String,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionView {
    #[serde(rename = "_id")]
    pub id: String,
    pub date: DateTime<Utc>,
    pub sale_price: f64,
    pub status: TransactionStatus,
    pub deal_type: DealType,
    #[serde(default)]
    pub property: Option<PropertyRef>,
    #[serde(default)]
    pub seller: Option<UserSummary>,
    #[serde(default)]
    pub buyer: Option<UserSummary>,
    #[serde(default)]
    pub agent: Option<UserSummary>,
    #[serde(rename = "createdAt")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "updatedAt")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TransactionRequest {
    pub date: Option<DateTime<Utc>>,
    pub sale_price: Option<f64>,
    pub status: Option<String>,
    pub deal_type: Option<String>,
    pub property: Option<String>,
    pub seller: Option<String>,
    pub buyer: Option<String>,
    pub agent: Option<String>,
}

impl TransactionRequest {
    fn enums(&self, v: &mut Validation) -> (Option<TransactionStatus>, Option<DealType>) {
        let status = self
            .status
            .as_deref()
            .and_then(|raw| v.parse_enum::<TransactionStatus>("status", raw.trim()));
        let deal_type = self
            .deal_type
            .as_deref()
            .and_then(|raw| v.parse_enum::<DealType>("deal_type", raw.trim()));
        (status, deal_type)
    }

    pub fn into_transaction(self, id: String, now: DateTime<Utc>) -> ApiResult<Transaction> {
        let mut v = Validation::new("Transaction");
        let sale_price = v.required("sale_price", self.sale_price);
        if let Some(p) = sale_price {
            v.min_f64("sale_price", p, 0.0);
        }
        let (status, deal_type) = self.enums(&mut v);
        let deal_type = v.required("deal_type", deal_type);
        let property = v.required_text("property", self.property.as_deref());
        let seller = v.required_text("seller", self.seller.as_deref());
        let buyer = v.required_text("buyer", self.buyer.as_deref());
        v.finish()?;

        let (Some(sale_price), Some(deal_type), Some(property), Some(seller), Some(buyer)) =
            (sale_price, deal_type, property, seller, buyer)
        else {
            return Err(ApiError::Internal("transaction fields missing after validation".into()));
        };

        Ok(Transaction {
            id,
            date: self.date.unwrap_or(now),
            sale_price,
            status: status.unwrap_or(TransactionStatus::Pending),
            deal_type,
            property,
            seller,
            buyer,
            agent: self.agent.filter(|a| !a.trim().is_empty()),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn changes(&self) -> ApiResult<Document> {
        let mut v = Validation::new("Transaction");
        let mut set = Document::new();
        if let Some(p) = self.sale_price {
            v.min_f64("sale_price", p, 0.0);
            set.insert("sale_price", p);
        }
        let (status, deal_type) = self.enums(&mut v);
        if let Some(s) = status {
            set.insert("status", s.as_str());
        }
        if let Some(d) = deal_type {
            set.insert("deal_type", d.as_str());
        }
        for (path, value) in [
            ("property", &self.property),
            ("seller", &self.seller),
            ("buyer", &self.buyer),
            ("agent", &self.agent),
        ] {
            if let Some(value) = value.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
                set.insert(path, value);
            }
        }
        v.finish()?;
        if let Some(date) = &self.date {
            set.insert("date", to_bson(date)?);
        }
        Ok(set)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> TransactionRequest {
        TransactionRequest {
            sale_price: Some(500_000.0),
            deal_type: Some("sale".into()),
            property: Some("p1".into()),
            seller: Some("s1".into()),
            buyer: Some("b1".into()),
            ..Default::default()
        }
    }

    #[test]
    fn new_deals_start_pending() {
        let t = request().into_transaction("t1".into(), Utc::now()).unwrap();
        assert_eq!(t.status, TransactionStatus::Pending);
        assert_eq!(t.deal_type, DealType::Sale);
        assert_eq!(t.agent, None);
    }

    #[test]
    fn status_must_be_known() {
        let req = TransactionRequest {
            status: Some("refunded".into()),
            ..request()
        };
        let msg = req.into_transaction("t1".into(), Utc::now()).unwrap_err().to_string();
        assert!(msg.contains("`refunded` is not a valid enum value for path `status`."));
    }

    #[test]
    fn edit_sets_only_sent_fields() {
        let req = TransactionRequest {
            status: Some("completed".into()),
            ..Default::default()
        };
        let set = req.changes().unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get_str("status").unwrap(), "completed");
    }
}
