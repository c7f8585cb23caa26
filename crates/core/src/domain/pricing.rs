use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuery {
    pub service_code: String,
    pub region: String,
    #[serde(default)]
    pub filters: BTreeMap<String, String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRecord {
    pub service_code: String,
    pub region: String,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
    pub unit: String,
    pub price_per_unit_usd: Decimal,
    #[serde(default)]
    pub description: String,
}

impl PriceRecord {
    /// Service and region match exactly and every filter is present with an equal
    /// value (case-insensitive).
    pub fn satisfies(&self, query: &PriceQuery) -> bool {
        if !self.service_code.eq_ignore_ascii_case(query.service_code.trim())
            || !self.region.eq_ignore_ascii_case(query.region.trim())
        {
            return false;
        }

        query.filters.iter().all(|(key, expected)| {
            self.attributes
                .get(key)
                .map(|actual| actual.eq_ignore_ascii_case(expected.trim()))
                .unwrap_or(false)
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PriceLookup {
    Found { record: PriceRecord },
    NotFound { query: PriceQuery },
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rust_decimal::Decimal;

    use super::{PriceQuery, PriceRecord};

    fn s3_standard() -> PriceRecord {
        PriceRecord {
            service_code: "AmazonS3".to_owned(),
            region: "us-east-1".to_owned(),
            attributes: BTreeMap::from([("storageClass".to_owned(), "General Purpose".to_owned())]),
            unit: "GB-Mo".to_owned(),
            price_per_unit_usd: Decimal::new(23, 3),
            description: "S3 Standard storage".to_owned(),
        }
    }

    #[test]
    fn record_satisfies_matching_filters() {
        let query = PriceQuery {
            service_code: "amazons3".to_owned(),
            region: "US-EAST-1".to_owned(),
            filters: BTreeMap::from([("storageClass".to_owned(), "general purpose".to_owned())]),
        };

        assert!(s3_standard().satisfies(&query));
    }

    #[test]
    fn record_rejects_missing_attribute_or_other_region() {
        let missing_attribute = PriceQuery {
            service_code: "AmazonS3".to_owned(),
            region: "us-east-1".to_owned(),
            filters: BTreeMap::from([("volumeType".to_owned(), "gp3".to_owned())]),
        };
        let other_region = PriceQuery {
            service_code: "AmazonS3".to_owned(),
            region: "eu-west-1".to_owned(),
            filters: BTreeMap::new(),
        };

        assert!(!s3_standard().satisfies(&missing_attribute));
        assert!(!s3_standard().satisfies(&other_region));
    }
}
