//! Request bodies

use serde::{Deserialize, Serialize};

/// Body of `/predict` and `/info`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientRequest {
    /// Client identifier
    #[serde(rename = "SK_ID_CURR")]
    pub sk_id_curr: i64,
}

/// Body of `/distribution`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DistributionRequest {
    #[serde(rename = "SK_ID_CURR")]
    pub sk_id_curr: i64,

    /// Column of the feature table
    pub feature: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        let req: DistributionRequest =
            serde_json::from_str(r#"{"SK_ID_CURR": 100004, "feature": "INCOME_PER_PERSON"}"#)
                .unwrap();
        assert_eq!(req.sk_id_curr, 100004);
        assert_eq!(req.feature, "INCOME_PER_PERSON");

        assert!(serde_json::from_str::<ClientRequest>(r#"{"sk_id_curr": 1}"#).is_err());
        assert!(serde_json::from_str::<ClientRequest>(r#"{"SK_ID_CURR": "100004"}"#).is_err());
    }
}
