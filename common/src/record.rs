use csv::StringRecord;

use crate::error::{ParseError, ParseErrorReason};

/// Rows shorter than this cannot carry every keyed column.
pub const MIN_FIELDS: usize = 8;

const SERIES_ID: usize = 0;
const RANK_COUNT: usize = 2;
const METRIC_ID: usize = 3;
const ELAPSED_SECONDS: usize = 4;
const SUB_SERIES_ID: usize = 6;
const FILTER_KEY: usize = 7;

/// One data row of the benchmark output.
///
/// Columns 1 and 5 (chunks per rank and an unused slot) are not read.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Workload name, ie. `scale_type`
    pub series_id: String,
    pub rank_count: u32,
    /// Timer tag
    pub metric_id: String,
    pub elapsed_seconds: f64,
    /// IO participation mode
    pub sub_series_id: String,
    pub filter_key: String,
}

impl Record {
    pub fn parse(fields: &StringRecord, line: u64) -> Result<Self, ParseError> {
        let fail = |reason| ParseError { line, reason };
        if fields.len() < MIN_FIELDS {
            return Err(fail(ParseErrorReason::MissingFields {
                expected: MIN_FIELDS,
                found: fields.len(),
            }));
        }

        let rank_count = &fields[RANK_COUNT];
        let rank_count = rank_count
            .trim()
            .parse::<u32>()
            .map_err(|_| fail(ParseErrorReason::InvalidRankCount(rank_count.to_owned())))?;
        if rank_count == 0 {
            return Err(fail(ParseErrorReason::ZeroRankCount));
        }

        let elapsed = &fields[ELAPSED_SECONDS];
        let elapsed_seconds = match elapsed.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            _ => return Err(fail(ParseErrorReason::InvalidElapsed(elapsed.to_owned()))),
        };
        if elapsed_seconds < 0.0 {
            return Err(fail(ParseErrorReason::NegativeElapsed(elapsed_seconds)));
        }

        Ok(Self {
            series_id: fields[SERIES_ID].to_owned(),
            rank_count,
            metric_id: fields[METRIC_ID].to_owned(),
            elapsed_seconds,
            sub_series_id: fields[SUB_SERIES_ID].to_owned(),
            filter_key: fields[FILTER_KEY].to_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(line: &str) -> StringRecord {
        StringRecord::from(line.split(',').collect::<Vec<_>>())
    }

    #[test]
    fn parses_keyed_columns() {
        let record = Record::parse(&row("A,x,4,t1,1.5,y,io1,f1"), 2).unwrap();
        assert_eq!(
            record,
            Record {
                series_id: "A".to_owned(),
                rank_count: 4,
                metric_id: "t1".to_owned(),
                elapsed_seconds: 1.5,
                sub_series_id: "io1".to_owned(),
                filter_key: "f1".to_owned(),
            }
        );
    }

    #[test]
    fn ignores_unkeyed_and_trailing_columns() {
        let a = Record::parse(&row("A,x,4,t1,1.5,y,io1,f1"), 2).unwrap();
        let b = Record::parse(&row("A,noise,4,t1,1.5,other,io1,f1,extra,more"), 2).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn trims_numeric_fields_only() {
        let record = Record::parse(&row(" A ,x, 16 ,t1, 0.25 ,y,io1,f1"), 3).unwrap();
        assert_eq!(record.rank_count, 16);
        assert_eq!(record.elapsed_seconds, 0.25);
        assert_eq!(record.series_id, " A ");
    }

    #[test]
    fn short_row() {
        let err = Record::parse(&row("A,x,4,t1,1.5"), 7).unwrap_err();
        assert_eq!(err.line, 7);
        assert_eq!(
            err.reason,
            ParseErrorReason::MissingFields {
                expected: 8,
                found: 5
            }
        );
    }

    #[test]
    fn bad_rank_count() {
        for value in ["four", "-4", "1.5", ""] {
            let line = format!("A,x,{value},t1,1.5,y,io1,f1");
            let err = Record::parse(&row(&line), 2).unwrap_err();
            assert_eq!(
                err.reason,
                ParseErrorReason::InvalidRankCount(value.to_owned())
            );
        }
        let err = Record::parse(&row("A,x,0,t1,1.5,y,io1,f1"), 2).unwrap_err();
        assert_eq!(err.reason, ParseErrorReason::ZeroRankCount);
    }

    #[test]
    fn bad_elapsed_seconds() {
        for value in ["slow", "inf", "NaN", ""] {
            let line = format!("A,x,4,t1,{value},y,io1,f1");
            let err = Record::parse(&row(&line), 2).unwrap_err();
            assert_eq!(err.reason, ParseErrorReason::InvalidElapsed(value.to_owned()));
        }
        let err = Record::parse(&row("A,x,4,t1,-0.5,y,io1,f1"), 2).unwrap_err();
        assert_eq!(err.reason, ParseErrorReason::NegativeElapsed(-0.5));
    }
}
