//! Daily bars are tracked per calendar year: SPY 1D for 2023-01-03..05 from
//! "Yahoo" marks the 2023 chunk only once 2023 is over.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use stx_calendar::BarSize;
use stx_testkit::{daily_bars, temp_cache, us_session};

fn et(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
    chrono_tz::US::Eastern
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
}

fn spy_first_week() -> Vec<stx_cache::Bar> {
    daily_bars(
        &us_session(),
        NaiveDate::from_ymd_opt(2023, 1, 3).unwrap(),
        NaiveDate::from_ymd_opt(2023, 1, 5).unwrap(),
    )
}

#[tokio::test]
async fn finished_year_is_recorded_for_yahoo() {
    let tc = temp_cache(chrono_tz::US::Pacific).await.expect("temp cache");
    let bars = spy_first_week();
    assert_eq!(bars.len(), 3);

    let now = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
    let report = tc
        .cache
        .add_data_as_of("SPY", BarSize::D1, &bars, "Yahoo", now)
        .await
        .expect("add_data");
    assert_eq!(report.chunks_marked, 1);

    let chunks = tc.cache.cached_chunks("SPY", BarSize::D1).await.expect("chunks");
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].start, et(2023, 1, 1, 0, 0));
    assert_eq!(chunks[0].data_source.as_deref(), Some("Yahoo"));

    let missing = tc
        .cache
        .get_missing_range("SPY", BarSize::D1, et(2023, 1, 1, 0, 0), et(2023, 1, 10, 0, 0))
        .await
        .expect("missing range");
    assert_eq!(missing, None);

    // A range reaching into 2024 misses exactly the 2024 chunk.
    let missing = tc
        .cache
        .get_missing_range("SPY", BarSize::D1, et(2023, 6, 1, 0, 0), et(2024, 2, 1, 0, 0))
        .await
        .expect("missing range")
        .expect("2024 missing");
    assert_eq!(missing.start, et(2024, 1, 1, 0, 0));
    assert_eq!(missing.end, et(2025, 1, 1, 0, 0));
}

#[tokio::test]
async fn current_year_is_missing_from_its_year_boundary() {
    let tc = temp_cache(chrono_tz::US::Pacific).await.expect("temp cache");
    let now = Utc.with_ymd_and_hms(2023, 1, 6, 12, 0, 0).unwrap();
    let report = tc
        .cache
        .add_data_as_of("SPY", BarSize::D1, &spy_first_week(), "Yahoo", now)
        .await
        .expect("add_data");
    assert_eq!(report.chunks_marked, 0);
    assert_eq!(report.chunks_in_progress, 1);

    let missing = tc
        .cache
        .get_missing_range("SPY", BarSize::D1, et(2023, 1, 1, 0, 0), et(2023, 1, 10, 0, 0))
        .await
        .expect("missing range")
        .expect("2023 still in progress");
    assert_eq!(missing.start, et(2023, 1, 1, 0, 0));
    assert_eq!(missing.end, et(2024, 1, 1, 0, 0));

    // Rows are served in the display zone regardless.
    let rows = tc
        .cache
        .get_data("SPY", BarSize::D1, et(2023, 1, 1, 0, 0), et(2023, 1, 10, 0, 0))
        .await
        .expect("get_data");
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[0].ts.timezone(), chrono_tz::US::Pacific);
    assert_eq!(rows[0].ts, et(2023, 1, 3, 0, 0));
}
