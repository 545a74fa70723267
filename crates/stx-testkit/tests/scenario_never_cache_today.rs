//! The chunk that is still in progress is never recorded, so it is always
//! reported missing until a write lands after it has ended.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use stx_calendar::{BarSize, TradingOffset};
use stx_testkit::{session_bars, temp_cache, us_session};

fn et(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
    chrono_tz::US::Eastern
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
}

#[tokio::test]
async fn todays_chunk_stays_missing() {
    let tc = temp_cache(chrono_tz::US::Eastern).await.expect("temp cache");
    let offset = TradingOffset::new(BarSize::M1, us_session()).expect("offset");
    let today = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
    let now = et(2024, 3, 5, 15, 0).with_timezone(&Utc);

    let so_far: Vec<_> = session_bars(&offset, today)
        .into_iter()
        .filter(|b| b.ts.with_timezone(&Utc) < now)
        .collect();
    assert!(!so_far.is_empty());

    let report = tc
        .cache
        .add_data_as_of("SPY", BarSize::M1, &so_far, "A", now)
        .await
        .expect("add_data");
    assert_eq!(report.rows_upserted, so_far.len());
    assert_eq!(report.chunks_marked, 0);
    assert_eq!(report.chunks_in_progress, 1);

    let missing = tc
        .cache
        .get_missing_range("SPY", BarSize::M1, et(2024, 3, 5, 4, 0), et(2024, 3, 5, 14, 0))
        .await
        .expect("missing range")
        .expect("today is missing");
    assert_eq!(missing.start, et(2024, 3, 5, 0, 0));

    // The rows themselves are served even though the chunk is not recorded.
    let rows = tc
        .cache
        .get_data("SPY", BarSize::M1, et(2024, 3, 5, 4, 0), et(2024, 3, 5, 14, 59))
        .await
        .expect("get_data");
    assert_eq!(rows.len(), so_far.len());
}

#[tokio::test]
async fn yesterday_is_recorded_when_the_batch_runs_into_today() {
    let tc = temp_cache(chrono_tz::US::Eastern).await.expect("temp cache");
    let offset = TradingOffset::new(BarSize::M30, us_session()).expect("offset");
    let now = et(2024, 3, 6, 10, 0).with_timezone(&Utc);

    let mut bars = session_bars(&offset, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    bars.extend(
        session_bars(&offset, NaiveDate::from_ymd_opt(2024, 3, 6).unwrap())
            .into_iter()
            .filter(|b| b.ts.with_timezone(&Utc) < now),
    );

    let report = tc
        .cache
        .add_data_as_of("SPY", BarSize::M30, &bars, "A", now)
        .await
        .expect("add_data");
    assert_eq!(report.chunks_marked, 1);
    assert_eq!(report.chunks_in_progress, 1);

    let missing = tc
        .cache
        .get_missing_range("SPY", BarSize::M30, et(2024, 3, 5, 0, 0), et(2024, 3, 6, 9, 0))
        .await
        .expect("missing range")
        .expect("today is missing");
    assert_eq!(missing.start, et(2024, 3, 6, 0, 0));

    // Once the day is over, the same rows complete the chunk.
    let after_close = et(2024, 3, 7, 1, 0).with_timezone(&Utc);
    let full_day = session_bars(&offset, NaiveDate::from_ymd_opt(2024, 3, 6).unwrap());
    tc.cache
        .add_data_as_of("SPY", BarSize::M30, &full_day, "B", after_close)
        .await
        .expect("add_data");
    let missing = tc
        .cache
        .get_missing_range("SPY", BarSize::M30, et(2024, 3, 5, 0, 0), et(2024, 3, 6, 23, 0))
        .await
        .expect("missing range");
    assert_eq!(missing, None);
}
