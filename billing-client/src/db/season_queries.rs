use std::collections::HashMap;

use sqlx::PgPool;

use crate::calendar::SeasonalCalendar;
use crate::domain::{DayType, Season, TariffLevel};
use crate::error::{BillingError, BillingResult};

#[derive(Debug, Clone, sqlx::FromRow)]
struct SeasonRow {
    id: i32,
    season_key: String,
    season_name: String,
    start_month: i32,
    end_month: i32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct TariffLevelRow {
    season_id: i32,
    level: i32,
    hour: i32,
    day_type: String,
}

fn to_u8(value: i32, what: &str) -> BillingResult<u8> {
    u8::try_from(value).map_err(|_| BillingError::InvalidRecord(format!("{what} {value} out of range")))
}

impl TryFrom<SeasonRow> for Season {
    type Error = BillingError;

    fn try_from(row: SeasonRow) -> Result<Self, Self::Error> {
        Season::new(
            row.id,
            row.season_key,
            row.season_name,
            to_u8(row.start_month, "start_month")?,
            to_u8(row.end_month, "end_month")?,
        )
    }
}

impl TryFrom<&TariffLevelRow> for TariffLevel {
    type Error = BillingError;

    fn try_from(row: &TariffLevelRow) -> Result<Self, Self::Error> {
        let day_type: DayType = row.day_type.parse()?;
        TariffLevel::new(to_u8(row.level, "level")?, to_u8(row.hour, "hour")?, day_type)
    }
}

/// Load every configured season together with its hourly level rows.
pub async fn load_seasons(pool: &PgPool) -> BillingResult<Vec<Season>> {
    let season_rows = sqlx::query_as::<_, SeasonRow>(
        r#"
        SELECT id, season_key, season_name, start_month, end_month
        FROM config_electricity_seasons
        ORDER BY id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let level_rows = sqlx::query_as::<_, TariffLevelRow>(
        r#"
        SELECT
            l.electricity_season_id AS season_id,
            l.level,
            l.hour,
            l.day_type::text        AS day_type
        FROM config_hourly_block_levels l
        ORDER BY l.electricity_season_id, l.day_type, l.level, l.hour
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut seasons = Vec::with_capacity(season_rows.len());
    let mut index = HashMap::with_capacity(season_rows.len());
    for row in season_rows {
        index.insert(row.id, seasons.len());
        seasons.push(Season::try_from(row)?);
    }

    for row in &level_rows {
        let Some(&pos) = index.get(&row.season_id) else {
            tracing::warn!(season_id = row.season_id, "tariff level references unknown season, skipping");
            continue;
        };
        seasons[pos].push_level(TariffLevel::try_from(row)?);
    }

    Ok(seasons)
}

pub async fn load_calendar(pool: &PgPool) -> BillingResult<SeasonalCalendar> {
    let calendar = SeasonalCalendar::new(load_seasons(pool).await?);
    tracing::info!(seasons = calendar.seasons().len(), "seasonal tariff calendar loaded");
    Ok(calendar)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn season_row_derives_wrapping_flag() {
        let row = SeasonRow {
            id: 4,
            season_key: "lower".to_string(),
            season_name: "Lower season".to_string(),
            start_month: 11,
            end_month: 2,
        };
        let season = Season::try_from(row).unwrap();
        assert!(season.crosses_calendar_year());
    }

    #[test]
    fn level_row_rejects_out_of_range_hour() {
        let row = TariffLevelRow {
            season_id: 1,
            level: 2,
            hour: 24,
            day_type: "WORKDAY".to_string(),
        };
        assert!(matches!(
            TariffLevel::try_from(&row),
            Err(BillingError::InvalidTariffLevel(_))
        ));
    }

    #[test]
    fn level_row_rejects_negative_values() {
        let row = TariffLevelRow {
            season_id: 1,
            level: -1,
            hour: 3,
            day_type: "OFFDAY".to_string(),
        };
        assert!(matches!(
            TariffLevel::try_from(&row),
            Err(BillingError::InvalidRecord(_))
        ));
    }
}
