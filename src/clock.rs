use chrono::NaiveDate;

/// Source of "today" for anything that falls back to the current date.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Local calendar date of the machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        chrono::Local::now().date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}
