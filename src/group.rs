//! Calendar grouping of media records
//!
//! Records are partitioned once into year → month → day buckets, plus a
//! leftover bucket for records without a capture time. The grouping owns the
//! records and hands them on exactly once through [`DateBuckets::into_placements`].

use crate::time::MediaRecord;
use chrono::{Datelike, Month};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Folder for records whose capture time could not be determined
pub const NO_METADATA_FOLDER: &str = "Not enough metadata";

type Days = BTreeMap<u32, Vec<MediaRecord>>;
type Months = BTreeMap<u32, Days>;

/// A calendar day
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

impl DayKey {
    /// Relative folder for this day: `Year 2022/September/Day 23`
    pub fn folder(&self) -> PathBuf {
        let month = u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| m.name().to_string())
            .unwrap_or_else(|| format!("Month {}", self.month));

        [format!("Year {}", self.year), month, format!("Day {}", self.day)]
            .iter()
            .collect()
    }
}

/// Where one record should be copied
#[derive(Debug, Clone)]
pub struct Placement {
    /// Folder relative to the destination root
    pub folder: PathBuf,
    pub record: MediaRecord,
    /// Mark the copied name with the uncertain-metadata suffix
    pub tag_uncertain: bool,
}

/// Records bucketed by capture date
#[derive(Debug, Default)]
pub struct DateBuckets {
    years: BTreeMap<i32, Months>,
    leftover: Vec<MediaRecord>,
}

impl DateBuckets {
    /// Partition records by calendar day, keeping input order within a day
    pub fn group<I>(records: I) -> Self
    where
        I: IntoIterator<Item = MediaRecord>,
    {
        let mut buckets = Self::default();

        for record in records {
            match record.capture_time() {
                Some(time) => buckets
                    .years
                    .entry(time.year())
                    .or_default()
                    .entry(time.month())
                    .or_default()
                    .entry(time.day())
                    .or_default()
                    .push(record),
                None => buckets.leftover.push(record),
            }
        }

        buckets
    }

    /// Records of one day, in input order
    #[cfg(test)]
    pub fn get(&self, year: i32, month: u32, day: u32) -> Option<&[MediaRecord]> {
        self.years
            .get(&year)?
            .get(&month)?
            .get(&day)
            .map(Vec::as_slice)
    }

    /// Non-empty days in calendar order
    pub fn days(&self) -> impl Iterator<Item = (DayKey, &[MediaRecord])> {
        self.years.iter().flat_map(|(&year, months)| {
            months.iter().flat_map(move |(&month, days)| {
                days.iter()
                    .map(move |(&day, records)| (DayKey { year, month, day }, records.as_slice()))
            })
        })
    }

    /// Records without a capture time
    pub fn leftover(&self) -> &[MediaRecord] {
        &self.leftover
    }

    /// Number of records with a capture time
    pub fn dated_len(&self) -> usize {
        self.days().map(|(_, records)| records.len()).sum()
    }

    /// Total number of records, dated and leftover
    pub fn len(&self) -> usize {
        self.dated_len() + self.leftover.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the grouping into copy placements: days in calendar order,
    /// then the leftover records
    pub fn into_placements(self) -> Vec<Placement> {
        let mut placements = Vec::with_capacity(self.len());

        for (year, months) in self.years {
            for (month, days) in months {
                for (day, records) in days {
                    let folder = DayKey { year, month, day }.folder();
                    placements.extend(records.into_iter().map(|record| Placement {
                        folder: folder.clone(),
                        tag_uncertain: record.is_uncertain(),
                        record,
                    }));
                }
            }
        }

        placements.extend(self.leftover.into_iter().map(|record| Placement {
            folder: PathBuf::from(NO_METADATA_FOLDER),
            record,
            tag_uncertain: false,
        }));

        placements
    }
}

/// Stable sort by capture time; records without one go last
pub fn sort_by_time(records: &mut [MediaRecord]) {
    records.sort_by_key(|r| (r.capture_time().is_none(), r.capture_time()));
}
