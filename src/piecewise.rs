use crate::api::FunctionRow;
use crate::error::{Error, Result};
use crate::expression::Expr;

pub const NO_FUNCTIONS: &str = "No functions provided";
pub const NO_VALID_PAIRS: &str = "No valid function/domain pairs found";
pub const NO_VALID_SEGMENTS: &str = "No valid segments to discretize";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Domain {
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DomainError {
    #[error("expected two comma separated numbers")]
    Format,

    #[error("start must be less than end")]
    Empty,
}

impl Domain {
    /// Parse `"start,end"`
    pub fn parse(s: &str) -> std::result::Result<Self, DomainError> {
        let mut parts = s.split(',');
        let (Some(a), Some(b), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(DomainError::Format);
        };

        let start = a.trim().parse::<f64>().map_err(|_| DomainError::Format)?;
        let end = b.trim().parse::<f64>().map_err(|_| DomainError::Format)?;
        if !start.is_finite() || !end.is_finite() {
            return Err(DomainError::Format);
        }
        if start >= end {
            return Err(DomainError::Empty);
        }

        Ok(Self { start, end })
    }

    pub fn len(&self) -> f64 {
        self.end - self.start
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t <= self.end
    }

    /// `n` evenly spaced points including both ends
    pub fn linspace(self, n: usize) -> impl Iterator<Item = f64> {
        linspace(self.start, self.end, n)
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{},{}", self.start, self.end)
    }
}

pub fn linspace(start: f64, end: f64, n: usize) -> impl Iterator<Item = f64> {
    let step = if n > 1 {
        (end - start) / (n - 1) as f64
    } else {
        0.0
    };
    (0..n).map(move |i| {
        if i + 1 == n && n > 1 {
            end
        } else {
            start + step * i as f64
        }
    })
}

#[derive(Debug, Clone)]
pub struct Piece {
    /// 1-based row number in the submitted list
    pub row: usize,
    pub source: String,
    pub domain_text: String,
    pub expr: Expr,
    pub domain: Domain,
}

impl Piece {
    pub fn eval(&self, t: f64) -> f64 {
        self.expr.eval(t)
    }
}

#[derive(Debug, Clone)]
pub struct Piecewise {
    pieces: Vec<Piece>,
}

impl Piecewise {
    /// Build from user rows. Incomplete rows are skipped, but the rows that
    /// remain keep their position in `rows` for error messages.
    /// `empty_message` is reported when nothing usable is left.
    pub fn from_rows(rows: &[FunctionRow], empty_message: &str) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::validation(NO_FUNCTIONS));
        }

        let mut pieces = vec![];
        for (idx, row) in rows.iter().enumerate() {
            let row_no = idx + 1;
            if !row.is_complete() {
                continue;
            }
            let FunctionRow { function, domain } = row.trimmed();

            let parsed_domain = Domain::parse(&domain).map_err(|e| {
                tracing::debug!("row {}: domain {:?}: {}", row_no, domain, e);
                Error::validation(format!("Invalid domain on row {row_no}. Use start,end"))
            })?;

            let expr = Expr::parse(&function).map_err(|e| {
                tracing::debug!("row {}: expression {:?}: {}", row_no, function, e);
                Error::validation(format!("Invalid expression on row {row_no}: {function}"))
            })?;

            pieces.push(Piece {
                row: row_no,
                source: function,
                domain_text: domain,
                expr,
                domain: parsed_domain,
            });
        }

        if pieces.is_empty() {
            return Err(Error::validation(empty_message));
        }

        Ok(Self { pieces })
    }

    pub fn pieces(&self) -> &[Piece] {
        &self.pieces
    }

    /// Smallest domain covering all pieces
    pub fn span(&self) -> Domain {
        self.pieces.iter().skip(1).fold(self.pieces[0].domain, |acc, p| Domain {
            start: acc.start.min(p.domain.start),
            end: acc.end.max(p.domain.end),
        })
    }

    /// First piece containing `t` wins. In a gap the last value of the latest
    /// finished piece is held, before everything the first start value is used.
    pub fn eval(&self, t: f64) -> f64 {
        if let Some(piece) = self.pieces.iter().find(|p| p.domain.contains(t)) {
            return piece.eval(t);
        }

        let finished = self
            .pieces
            .iter()
            .filter(|p| p.domain.end < t)
            .max_by(|a, b| a.domain.end.total_cmp(&b.domain.end));

        match finished {
            Some(piece) => piece.eval(piece.domain.end),
            None => {
                let first = self
                    .pieces
                    .iter()
                    .min_by(|a, b| a.domain.start.total_cmp(&b.domain.start))
                    .unwrap_or(&self.pieces[0]);
                first.eval(first.domain.start)
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn rows(r: &[(&str, &str)]) -> Vec<FunctionRow> {
        r.iter().map(|(f, d)| FunctionRow::new(*f, *d)).collect()
    }

    fn message(e: Error) -> String {
        match e {
            Error::Validation(m) => m,
            other => panic!("not a validation error: {:?}", other),
        }
    }

    #[test]
    fn test_domain_parse() {
        assert_eq!(
            Domain::parse("0,10"),
            Ok(Domain {
                start: 0.0,
                end: 10.0
            })
        );
        assert_eq!(
            Domain::parse(" -1.5 , 2e1 "),
            Ok(Domain {
                start: -1.5,
                end: 20.0
            })
        );
        assert_eq!(Domain::parse("0"), Err(DomainError::Format));
        assert_eq!(Domain::parse("0,1,2"), Err(DomainError::Format));
        assert_eq!(Domain::parse("a,1"), Err(DomainError::Format));
        assert_eq!(Domain::parse("5,1"), Err(DomainError::Empty));
        assert_eq!(Domain::parse("1,1"), Err(DomainError::Empty));
    }

    #[test]
    fn test_linspace() {
        let v = linspace(0.0, 1.0, 5).collect::<Vec<_>>();
        assert_eq!(v, vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(linspace(3.0, 4.0, 1).collect::<Vec<_>>(), vec![3.0]);
        assert_eq!(linspace(3.0, 4.0, 0).count(), 0);
    }

    #[test]
    fn test_skips_incomplete_rows_keeping_numbers() {
        let pw = Piecewise::from_rows(
            &rows(&[("", "0,1"), ("x", ""), ("2*x", "0,1")]),
            NO_VALID_PAIRS,
        )
        .unwrap();
        assert_eq!(pw.pieces().len(), 1);
        assert_eq!(pw.pieces()[0].row, 3);

        let err = Piecewise::from_rows(&rows(&[("", ""), ("x", "0;1")]), NO_VALID_PAIRS)
            .unwrap_err();
        assert_eq!(message(err), "Invalid domain on row 2. Use start,end");
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            message(Piecewise::from_rows(&[], NO_VALID_PAIRS).unwrap_err()),
            NO_FUNCTIONS
        );
        assert_eq!(
            message(Piecewise::from_rows(&rows(&[("", "")]), NO_VALID_SEGMENTS).unwrap_err()),
            NO_VALID_SEGMENTS
        );
        assert_eq!(
            message(
                Piecewise::from_rows(&rows(&[("x", "0,1"), (" sin( ", "1,2")]), NO_VALID_PAIRS)
                    .unwrap_err()
            ),
            "Invalid expression on row 2: sin("
        );
    }

    #[test]
    fn test_span_and_eval() {
        let pw = Piecewise::from_rows(
            &rows(&[("x", "0,2"), ("2", "2,4"), ("x", "6,8")]),
            NO_VALID_PAIRS,
        )
        .unwrap();

        assert_eq!(
            pw.span(),
            Domain {
                start: 0.0,
                end: 8.0
            }
        );
        assert_eq!(pw.eval(1.0), 1.0);
        // boundary belongs to the first piece
        assert_eq!(pw.eval(2.0), 2.0);
        assert_eq!(pw.eval(3.0), 2.0);
        // gap holds last value
        assert_eq!(pw.eval(5.0), 2.0);
        assert_eq!(pw.eval(7.0), 7.0);
        assert_eq!(pw.eval(-1.0), 0.0);
    }
}
