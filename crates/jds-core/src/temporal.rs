//! Calendar values without a chrono counterpart
//!
//! All three are persisted as their ISO-8601 text form.

use crate::errors::ModelError;
use std::fmt;
use std::str::FromStr;

fn invalid(kind: &str, input: &str) -> ModelError {
    ModelError::InvalidTemporal {
        kind: kind.to_string(),
        input: input.to_string(),
    }
}

/// A date-based amount of time, e.g. `P1Y2M3D`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Period {
    pub years: i32,
    pub months: i32,
    pub days: i32,
}

impl Period {
    pub const fn new(years: i32, months: i32, days: i32) -> Self {
        Self {
            years,
            months,
            days,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.years == 0 && self.months == 0 && self.days == 0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("P0D");
        }
        f.write_str("P")?;
        if self.years != 0 {
            write!(f, "{}Y", self.years)?;
        }
        if self.months != 0 {
            write!(f, "{}M", self.months)?;
        }
        if self.days != 0 {
            write!(f, "{}D", self.days)?;
        }
        Ok(())
    }
}

impl FromStr for Period {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s
            .strip_prefix('P')
            .or_else(|| s.strip_prefix('p'))
            .filter(|b| !b.is_empty())
            .ok_or_else(|| invalid("period", s))?;

        let mut period = Period::default();
        let mut digits = String::new();
        for c in body.chars() {
            if c.is_ascii_digit() || (c == '-' && digits.is_empty()) || (c == '+' && digits.is_empty()) {
                digits.push(c);
                continue;
            }
            let amount: i32 = digits.parse().map_err(|_| invalid("period", s))?;
            digits.clear();
            match c.to_ascii_uppercase() {
                'Y' => period.years = amount,
                'M' => period.months = amount,
                'W' => period.days += amount * 7,
                'D' => period.days += amount,
                _ => return Err(invalid("period", s)),
            }
        }
        if !digits.is_empty() {
            return Err(invalid("period", s));
        }
        Ok(period)
    }
}

/// A month of a specific year, e.g. `2024-05`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct YearMonth {
    year: i32,
    month: u32,
}

impl YearMonth {
    /// Returns `None` when `month` is outside 1..=12
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }
}

impl Default for YearMonth {
    fn default() -> Self {
        Self {
            year: 1970,
            month: 1,
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s.rsplit_once('-').ok_or_else(|| invalid("year-month", s))?;
        let year: i32 = year.parse().map_err(|_| invalid("year-month", s))?;
        let month: u32 = month.parse().map_err(|_| invalid("year-month", s))?;
        YearMonth::new(year, month).ok_or_else(|| invalid("year-month", s))
    }
}

/// A day of a month without a year, e.g. `--05-17`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MonthDay {
    month: u32,
    day: u32,
}

const DAYS_IN_MONTH: [u32; 12] = [31, 29, 31, 30, 31, 30, 31, 31, 30, 31, 30, 31];

impl MonthDay {
    /// Returns `None` for impossible combinations; February 29 is allowed
    pub fn new(month: u32, day: u32) -> Option<Self> {
        if !(1..=12).contains(&month) {
            return None;
        }
        let max = DAYS_IN_MONTH[(month - 1) as usize];
        (1..=max).contains(&day).then_some(Self { month, day })
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }
}

impl Default for MonthDay {
    fn default() -> Self {
        Self { month: 1, day: 1 }
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "--{:02}-{:02}", self.month, self.day)
    }
}

impl FromStr for MonthDay {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.strip_prefix("--").ok_or_else(|| invalid("month-day", s))?;
        let (month, day) = body.split_once('-').ok_or_else(|| invalid("month-day", s))?;
        let month: u32 = month.parse().map_err(|_| invalid("month-day", s))?;
        let day: u32 = day.parse().map_err(|_| invalid("month-day", s))?;
        MonthDay::new(month, day).ok_or_else(|| invalid("month-day", s))
    }
}
