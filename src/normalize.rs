use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::error::{PipelineError, PipelineResult};
use crate::models::{
    Month, RawRecord, ReportRecord, FIELD_AMOUNT_SPENT, FIELD_APP_INSTALLS, FIELD_CAMPAIGN_NAME,
    FIELD_IMPRESSIONS, FIELD_PURCHASES, FIELD_REGISTRATIONS, FIELD_REPORTING_ENDS,
    FIELD_REVENUE_PER_PURCHASE, FIELD_UNIQUE_PURCHASES,
};

const DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d.%m.%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Types every raw row. The first malformed row aborts the whole batch.
pub fn normalize_records(raw: &[RawRecord]) -> PipelineResult<Vec<ReportRecord>> {
    raw.iter()
        .enumerate()
        .map(|(index, record)| normalize_record(index + 1, record))
        .collect()
}

pub fn normalize_record(row: usize, raw: &RawRecord) -> PipelineResult<ReportRecord> {
    let field = |name: &str| {
        raw.get(name).ok_or_else(|| PipelineError::MalformedInput {
            row,
            field: name.to_string(),
        })
    };

    let reporting_raw = field(FIELD_REPORTING_ENDS)?;
    let reporting_ends = parse_date(reporting_raw).ok_or_else(|| PipelineError::MalformedDate {
        row,
        value: reporting_raw.to_string(),
    })?;

    let campaign = field(FIELD_CAMPAIGN_NAME)?.to_string();
    let purchases = parse_number(field(FIELD_PURCHASES)?);
    let revenue_per_purchase = parse_number(field(FIELD_REVENUE_PER_PURCHASE)?);

    Ok(ReportRecord {
        reporting_ends,
        month: Month::of(reporting_ends),
        country: country_of(&campaign),
        campaign,
        impressions: parse_number(field(FIELD_IMPRESSIONS)?),
        app_installs: parse_number(field(FIELD_APP_INSTALLS)?),
        registrations: parse_number(field(FIELD_REGISTRATIONS)?),
        purchases,
        unique_purchases: parse_number(field(FIELD_UNIQUE_PURCHASES)?),
        amount_spent: parse_number(field(FIELD_AMOUNT_SPENT)?),
        revenue_per_purchase,
        revenue: purchases.zip(revenue_per_purchase).map(|(p, r)| p * r),
    })
}

/// Empty, unparseable and non-finite text all coerce to missing.
pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
                .map(|value| value.date())
        })
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|value| value.date_naive())
        })
}

/// Text before the first comma of a campaign name, trimmed.
pub fn country_of(campaign: &str) -> String {
    campaign.split(',').next().unwrap_or_default().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_row(date: &str, campaign: &str) -> RawRecord {
        RawRecord::new()
            .with(FIELD_REPORTING_ENDS, date)
            .with(FIELD_CAMPAIGN_NAME, campaign)
            .with(FIELD_IMPRESSIONS, "1000")
            .with(FIELD_APP_INSTALLS, "20")
            .with(FIELD_REGISTRATIONS, "")
            .with(FIELD_PURCHASES, "4")
            .with(FIELD_UNIQUE_PURCHASES, "n/a")
            .with(FIELD_AMOUNT_SPENT, "12.5")
            .with(FIELD_REVENUE_PER_PURCHASE, "7.25")
    }

    #[test]
    fn extracts_country_before_first_comma() {
        assert_eq!(country_of("Germany, Summer Sale"), "Germany");
        assert_eq!(country_of("  Spain  "), "Spain");
        assert_eq!(country_of("France, Promo, Q3"), "France");
    }

    #[test]
    fn coerces_bad_numbers_to_missing() {
        assert_eq!(parse_number(" 42 "), Some(42.0));
        assert_eq!(parse_number("3.5"), Some(3.5));
        assert_eq!(parse_number(""), None);
        assert_eq!(parse_number("abc"), None);
        assert_eq!(parse_number("NaN"), None);
        assert_eq!(parse_number("inf"), None);
    }

    #[test]
    fn accepts_common_date_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 31);
        assert_eq!(parse_date("2024-03-31"), expected);
        assert_eq!(parse_date("2024/03/31"), expected);
        assert_eq!(parse_date("03/31/2024"), expected);
        assert_eq!(parse_date("31.03.2024"), expected);
        assert_eq!(parse_date("2024-03-31 23:59:59"), expected);
        assert_eq!(parse_date("2024-03-31T10:00:00+02:00"), expected);
        assert_eq!(parse_date("last tuesday"), None);
    }

    #[test]
    fn derives_month_country_and_revenue() {
        let record = normalize_record(1, &sample_row("2024-03-31", "Germany, Summer Sale"))
            .expect("row should normalize");
        assert_eq!(record.month.to_string(), "2024-03");
        assert_eq!(record.country, "Germany");
        assert_eq!(record.revenue, Some(29.0));
        assert_eq!(record.registrations, None);
        assert_eq!(record.unique_purchases, None);
    }

    #[test]
    fn missing_purchases_leave_revenue_missing() {
        let raw = sample_row("2024-03-31", "Spain").with(FIELD_PURCHASES, "");
        let record = normalize_record(1, &raw).expect("row should normalize");
        assert_eq!(record.revenue, None);
    }

    #[test]
    fn unparseable_date_is_fatal() {
        let rows = vec![
            sample_row("2024-03-31", "Spain"),
            sample_row("soon", "Spain"),
        ];
        match normalize_records(&rows) {
            Err(PipelineError::MalformedDate { row, value }) => {
                assert_eq!(row, 2);
                assert_eq!(value, "soon");
            }
            other => panic!("expected malformed date, got {other:?}"),
        }
    }

    #[test]
    fn absent_field_is_fatal() {
        let raw = RawRecord::new()
            .with(FIELD_REPORTING_ENDS, "2024-03-31")
            .with(FIELD_CAMPAIGN_NAME, "Spain");
        match normalize_record(7, &raw) {
            Err(PipelineError::MalformedInput { row, field }) => {
                assert_eq!(row, 7);
                assert_eq!(field, FIELD_PURCHASES);
            }
            other => panic!("expected malformed input, got {other:?}"),
        }
    }
}
