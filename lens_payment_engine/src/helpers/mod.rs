mod dates;

pub use dates::{add_days, days_remaining, SECONDS_PER_DAY};
