//! Post text shared by every platform.

use deathwatch_common::PublishPayload;

/// Dashboard page describing the metric.
pub const SOURCE_URL: &str =
    "https://coronavirus.data.gov.uk/details/whats-new/record/4d64ce27-f18c-4908-b204-23c11da2da9c";

/// Hashtags closing every post.
pub const HASHTAGS: &str = "#COVID19 #rustlang";

/// Lines of the message reused as image alt text.
const DESCRIPTION_LINES: usize = 4;

/// Formats the post text for a payload.
pub fn format_message(payload: &PublishPayload) -> String {
    [
        "Deaths within 28 days for COVID-19 in England".to_string(),
        format!("Weekly deaths = {}", payload.weekly_deaths),
        format!("7-day average = {}", payload.seven_day_average),
        format!("Last updated on {}", payload.last_update_date),
        SOURCE_URL.to_string(),
        HASHTAGS.to_string(),
    ]
    .join("\n")
}

/// Alt text for the chart: the figures without the link and hashtags.
pub fn media_description(message: &str) -> String {
    message
        .lines()
        .take(DESCRIPTION_LINES)
        .collect::<Vec<_>>()
        .join("\n")
}
