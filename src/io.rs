//! Loading tabular data files.
//!
//! Each row of a file is one sample and each column one variable. Columns
//! are separated by blanks, commas or semicolons. Blank lines and anything
//! after `#` or `%` are ignored. The loaded table is transposed so that row
//! `k` of the result holds column `k` of the file.

use ndarray::{Array1, Array2};
use nom::{
    branch::alt,
    character::complete::{char, space0, space1},
    combinator::{all_consuming, value},
    multi::separated_list1,
    number::complete::double,
    sequence::delimited,
    IResult, Parser,
};
use std::path::Path;

use crate::error::{FitError, Result};

/// Column separator: a comma or semicolon with optional padding, or a run
/// of blanks.
fn separator(input: &str) -> IResult<&str, ()> {
    alt((
        value((), delimited(space0, alt((char(','), char(';'))), space0)),
        value((), space1),
    ))
    .parse(input)
}

/// One row of numbers.
fn row(input: &str) -> IResult<&str, Vec<f64>> {
    delimited(space0, separated_list1(separator, double), space0).parse(input)
}

/// Parse numeric columns from text. Row `k` of the result is column `k`.
pub fn parse_columns(text: &str) -> Result<Array2<f64>> {
    let mut rows: Vec<Vec<f64>> = Vec::new();

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.split(['#', '%']).next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        let (_, values) = all_consuming(row).parse(line).map_err(|_| FitError::Parse {
            line: line_no,
            message: format!("expected numeric columns, found {:?}", line),
        })?;

        if let Some(first) = rows.first() {
            if first.len() != values.len() {
                return Err(FitError::Parse {
                    line: line_no,
                    message: format!("expected {} columns, found {}", first.len(), values.len()),
                });
            }
        }
        rows.push(values);
    }

    let ncols = match rows.first() {
        Some(first) => first.len(),
        None => return Err(FitError::EmptyData),
    };
    Ok(Array2::from_shape_fn((ncols, rows.len()), |(c, r)| rows[r][c]))
}

/// Read and parse a data file.
pub fn load_columns<P: AsRef<Path>>(path: P) -> Result<Array2<f64>> {
    let text = std::fs::read_to_string(path)?;
    parse_columns(&text)
}

/// A dataset split into named series.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub x: Array1<f64>,
    pub y: Array1<f64>,
    pub y_err: Option<Array1<f64>>,
    pub x_err: Option<Array1<f64>>,
}

impl Dataset {
    /// Interpret loaded columns as `x, y[, y_err[, x_err]]`.
    pub fn from_columns(columns: &Array2<f64>) -> Result<Self> {
        let n = columns.nrows();
        if !(2..=4).contains(&n) {
            return Err(FitError::InvalidInput(format!(
                "expected 2 to 4 columns (x, y, y_err, x_err), found {}",
                n
            )));
        }

        let column = |k: usize| columns.row(k).to_owned();
        Ok(Self {
            x: column(0),
            y: column(1),
            y_err: (n > 2).then(|| column(2)),
            x_err: (n > 3).then(|| column(3)),
        })
    }

    /// Load a data file and split its columns.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_columns(&load_columns(path)?)
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_parse_whitespace_columns() {
        let text = "# position amplitude\n-1.0  0.5\n 0.0\t2.0 \n\n1.5e0 0.25\n";
        let data = parse_columns(text).unwrap();
        assert_eq!(data, array![[-1.0, 0.0, 1.5], [0.5, 2.0, 0.25]]);
    }

    #[test]
    fn test_parse_mixed_separators_and_comments() {
        let text = "% header\n1, 2; 3\n4 ,5 ,6 # trailing note\n7;8,9\n";
        let data = parse_columns(text).unwrap();
        assert_eq!(data.shape(), &[3, 3]);
        assert_eq!(data.row(0), array![1.0, 4.0, 7.0]);
        assert_eq!(data.row(2), array![3.0, 6.0, 9.0]);
    }

    #[test]
    fn test_ragged_rows_report_line() {
        match parse_columns("1 2\n3 4\n5\n") {
            Err(FitError::Parse { line: 3, .. }) => (),
            other => panic!("Expected parse error on line 3, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_field() {
        match parse_columns("1 2\n3 abc\n") {
            Err(FitError::Parse { line: 2, message }) => assert!(message.contains("abc")),
            other => panic!("Expected parse error on line 2, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(parse_columns("# nothing\n\n"), Err(FitError::EmptyData)));
    }

    #[test]
    fn test_dataset_from_columns() {
        let columns = array![[0.0, 1.0], [2.0, 3.0], [0.1, 0.2]];
        let data = Dataset::from_columns(&columns).unwrap();
        assert_eq!(data.len(), 2);
        assert_eq!(data.y, array![2.0, 3.0]);
        assert_eq!(data.y_err, Some(array![0.1, 0.2]));
        assert!(data.x_err.is_none());

        let single = array![[0.0, 1.0]];
        assert!(matches!(
            Dataset::from_columns(&single),
            Err(FitError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        match load_columns("/nonexistent/curvefit/data.txt") {
            Err(FitError::Io(_)) => (),
            other => panic!("Expected Io error, got {:?}", other),
        }
    }
}
