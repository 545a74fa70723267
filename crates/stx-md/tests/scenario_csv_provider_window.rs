use std::io::Write;

use chrono::{DateTime, TimeZone};
use chrono_tz::Tz;
use stx_calendar::BarSize;
use stx_md::{CsvProvider, FetchRequest, HistoricalProvider, ProviderError};

fn et(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Tz> {
    chrono_tz::US::Eastern
        .with_ymd_and_hms(y, m, d, h, min, 0)
        .unwrap()
}

#[tokio::test]
async fn fetch_returns_only_the_half_open_window() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("spy.csv");
    let mut f = std::fs::File::create(&path).unwrap();
    writeln!(f, "symbol,date,open,high,low,close,volume").unwrap();
    for (sym, day) in [("SPY", 4), ("SPY", 5), ("SPY", 6), ("QQQ", 5)] {
        writeln!(f, "{sym},2024-03-0{day} 09:30,1,2,0.5,1.5,10").unwrap();
    }
    drop(f);

    let provider = CsvProvider::new(&path, chrono_tz::US::Eastern).with_source_name("Yahoo");
    assert_eq!(provider.source_name(), "Yahoo");

    let req = FetchRequest {
        symbol: "SPY".to_string(),
        bar_size: BarSize::M1,
        start: et(2024, 3, 5, 0, 0),
        end: et(2024, 3, 6, 0, 0),
    };
    let bars = provider.fetch_bars(&req).await.expect("fetch");
    assert_eq!(bars.len(), 1);
    assert_eq!(bars[0].ts, et(2024, 3, 5, 9, 30));
}

#[tokio::test]
async fn missing_file_is_a_transport_error() {
    let provider = CsvProvider::new("/definitely/not/here.csv", chrono_tz::US::Eastern);
    let req = FetchRequest {
        symbol: "SPY".to_string(),
        bar_size: BarSize::D1,
        start: et(2024, 1, 1, 0, 0),
        end: et(2025, 1, 1, 0, 0),
    };
    let err = provider.fetch_bars(&req).await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<ProviderError>(),
        Some(ProviderError::Transport(_))
    ));
}

#[tokio::test]
async fn file_without_price_columns_is_a_decode_error() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("broken.csv");
    std::fs::write(&path, "date,open,high,low\n2024-03-05 09:30,1,2,0.5\n").unwrap();

    let provider = CsvProvider::new(&path, chrono_tz::US::Eastern);
    let req = FetchRequest {
        symbol: "SPY".to_string(),
        bar_size: BarSize::M1,
        start: et(2024, 3, 5, 0, 0),
        end: et(2024, 3, 6, 0, 0),
    };
    let err = provider.fetch_bars(&req).await.unwrap_err();
    match err.downcast_ref::<ProviderError>() {
        Some(ProviderError::Decode(msg)) => assert!(msg.contains("close"), "{msg}"),
        other => panic!("expected decode error, got {other:?}"),
    }
}
