use shopping_insight_core::trend::TrendResponse;

pub const REPORT_HEADER: &str = "[네이버 쇼핑인사이트 분석 결과]";

/// Renders a trend response as the plain-text report returned to agents.
/// Ratios use fixed two-decimal formatting; results keep request order.
pub fn format_trend_report(response: &TrendResponse) -> String {
    let mut text = format!("{REPORT_HEADER}\n");
    text.push_str(&format!(
        "조회 기간: {} ~ {}\n",
        response.start_date, response.end_date
    ));
    text.push_str(&format!("시간 단위: {}\n\n", response.time_unit));

    for result in &response.results {
        text.push_str(&format!("항목: {}\n", result.title));
        if let Some(category) = &result.category {
            text.push_str(&format!("카테고리: {}\n", category.join(", ")));
        }
        if let Some(keyword) = &result.keyword {
            text.push_str(&format!("키워드: {}\n", keyword.join(", ")));
        }
        text.push_str("데이터:\n");
        for point in &result.data {
            text.push_str(&format!("  - {}: {:.2}\n", point.period, point.ratio));
        }
        text.push('\n');
    }

    text
}
