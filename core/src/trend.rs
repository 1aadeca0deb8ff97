use serde::{Deserialize, Serialize};

/// One bucket of a trend series. `ratio` is relative volume (0-100), not a count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSeriesPoint {
    /// Bucket label; a date, week start or month depending on the time unit
    pub period: String,
    pub ratio: f64,
}

/// Series for one requested category/keyword group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendResult {
    /// Echo of the group `name` from the request
    pub title: String,
    /// Echoed category codes (category queries)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Vec<String>>,
    /// Echoed keywords (keyword queries)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<Vec<String>>,
    /// Chronological data points
    #[serde(default)]
    pub data: Vec<TrendSeriesPoint>,
}

/// Normalized upstream response; `results` is aligned with the request groups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendResponse {
    pub start_date: String,
    pub end_date: String,
    pub time_unit: String,
    #[serde(default)]
    pub results: Vec<TrendResult>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::TrendResponse;

    #[test]
    fn deserializes_upstream_body_with_optional_echoes() {
        let body = json!({
            "startDate": "2023-01-01",
            "endDate": "2023-03-01",
            "timeUnit": "month",
            "results": [
                {
                    "title": "패션의류",
                    "category": ["50000000"],
                    "data": [
                        { "period": "2023-01-01", "ratio": 100 },
                        { "period": "2023-02-01", "ratio": 87.5 }
                    ]
                },
                { "title": "니트", "keyword": ["니트"], "data": [] }
            ]
        });

        let response: TrendResponse = serde_json::from_value(body).unwrap();
        assert_eq!(response.time_unit, "month");
        assert_eq!(response.results.len(), 2);
        assert_eq!(response.results[0].data[0].ratio, 100.0);
        assert_eq!(
            response.results[0].category.as_deref(),
            Some(&["50000000".to_string()][..])
        );
        assert!(response.results[0].keyword.is_none());
        assert!(response.results[1].data.is_empty());
    }

    #[test]
    fn missing_required_fields_fail_to_decode() {
        let body = json!({ "endDate": "2023-03-01", "timeUnit": "month", "results": [] });
        assert!(serde_json::from_value::<TrendResponse>(body).is_err());
    }
}
