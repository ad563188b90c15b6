use chrono::{DateTime, Datelike, Duration, Utc, Weekday};
use rand::Rng;

/// Time and transit-time source for shipment estimates.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Business days a new parcel is expected to spend in transit.
    fn transit_days(&self) -> u32;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn transit_days(&self) -> u32 {
        rand::thread_rng().gen_range(3..=7)
    }
}

/// A clock pinned to one instant with a fixed transit time.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    pub now: DateTime<Utc>,
    pub transit_days: u32,
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn transit_days(&self) -> u32 {
        self.transit_days
    }
}

/// Skips Saturdays and Sundays.
pub fn add_business_days(from: DateTime<Utc>, days: u32) -> DateTime<Utc> {
    let mut date = from;
    let mut remaining = days;
    while remaining > 0 {
        date += Duration::days(1);
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            remaining -= 1;
        }
    }
    date
}

pub fn estimated_delivery(clock: &dyn Clock) -> DateTime<Utc> {
    add_business_days(clock.now(), clock.transit_days())
}
