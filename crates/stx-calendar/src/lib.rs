//! stx-calendar
//!
//! Trading-calendar offset engine. Deterministic, pure logic: no IO, no
//! wall-clock reads, no randomness.
//!
//! - [`BarSize`]: supported bar sizes and their tags.
//! - [`BusinessCalendar`]: weekday calendars with rule-generated NYSE holidays.
//! - [`SessionDefinition`]: session zone, daily boundaries, and calendar.
//! - [`TradingOffset`]: bar-grid rounding and stepping plus the continuous
//!   trading-time coordinate used for gapless chart layout.
//! - [`PrePostMarketOffset`]: steps through session boundaries and lists the
//!   extended-hours windows of a range.

pub mod bar_size;
pub mod business_day;
pub mod error;
pub mod pre_post;
pub mod session;
pub mod trading_offset;

pub use bar_size::{infer_bar_size, BarSize};
pub use business_day::BusinessCalendar;
pub use error::CalendarError;
pub use pre_post::{PrePostMarketOffset, SessionWindow, WindowKind, MAX_WINDOW_SPAN_DAYS};
pub use session::{localize, parse_timestamp, parse_timezone, MarketHours, SessionDefinition};
pub use trading_offset::{SessionBounds, TradingOffset};
