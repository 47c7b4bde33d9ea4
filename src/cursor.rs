use crate::{Error, Result};
use mysql::Value;
use std::{borrow::Cow, fmt::Display, str::FromStr, sync::Arc};

/// Shared column name list, captured once per result set.
pub type FieldNames = Arc<[String]>;

/// A result set fully fetched into client memory, or the affected-row
/// count of a statement that produces none. The two are mutually
/// exclusive.
#[derive(Debug)]
enum Payload {
    Rows {
        names: FieldNames,
        rows: Vec<Box<[Value]>>,
        /// `None` before the first `next()`, `Some(rows.len())` once
        /// exhausted; a current row exists only for `Some(i)` with
        /// `i < rows.len()`.
        position: Option<usize>,
    },
    Affected(u64),
}

/// Forward-only, restartable view over one materialized query result.
///
/// Produced by [`Session::execute_query`](crate::Session::execute_query).
/// The storage is independent of the session handle: iterating stays
/// valid while the session runs further statements or closes. Move-only,
/// a cursor owns its rows and releases them exactly once.
///
/// ```no_run
/// # fn demo(session: &berth::Session) -> berth::Result<()> {
/// let mut result = session.execute_query("SELECT id, name FROM users")?;
/// while result.next() {
///     println!("{} {}", result.get_long(0)?, result.get_string("name")?);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ResultCursor {
    payload: Payload,
}

impl ResultCursor {
    pub(crate) fn from_rows(names: FieldNames, rows: Vec<Box<[Value]>>) -> Self {
        log::debug!(
            "materialized result set with {} rows, {} fields",
            rows.len(),
            names.len()
        );
        Self {
            payload: Payload::Rows {
                names,
                rows,
                position: None,
            },
        }
    }

    pub(crate) fn from_affected(affected: u64) -> Self {
        log::debug!("result for non-query statement, {affected} rows affected");
        Self {
            payload: Payload::Affected(affected),
        }
    }

    /// Advances to the next row. Returns `false`, leaving no current row,
    /// once the result set is exhausted or when there is none at all.
    pub fn next(&mut self) -> bool {
        let Payload::Rows { rows, position, .. } = &mut self.payload else {
            return false;
        };
        let advanced = match *position {
            None => 0,
            Some(i) => (i + 1).min(rows.len()),
        };
        *position = Some(advanced);
        advanced < rows.len()
    }

    /// Rewinds to before the first row. Returns `false` when there is no
    /// result set to rewind.
    pub fn reset(&mut self) -> bool {
        let Payload::Rows { position, .. } = &mut self.payload else {
            return false;
        };
        *position = None;
        true
    }

    pub fn field_count(&self) -> usize {
        match &self.payload {
            Payload::Rows { names, .. } => names.len(),
            Payload::Affected(_) => 0,
        }
    }

    pub fn row_count(&self) -> u64 {
        match &self.payload {
            Payload::Rows { rows, .. } => rows.len() as u64,
            Payload::Affected(_) => 0,
        }
    }

    /// Rows changed by a non-query statement, 0 for result sets.
    pub fn affected_rows(&self) -> u64 {
        match &self.payload {
            Payload::Rows { .. } => 0,
            Payload::Affected(affected) => *affected,
        }
    }

    /// Ordered field names, case-sensitive, captured at construction.
    pub fn field_names(&self) -> &[String] {
        match &self.payload {
            Payload::Rows { names, .. } => names,
            Payload::Affected(_) => &[],
        }
    }

    /// True only for a result set with zero rows.
    pub fn is_empty(&self) -> bool {
        matches!(&self.payload, Payload::Rows { rows, .. } if rows.is_empty())
    }

    /// Distinguishes "no rows" from "not a result-producing statement".
    pub fn has_result_set(&self) -> bool {
        matches!(&self.payload, Payload::Rows { .. })
    }

    /// Field value as text. Server NULL yields the empty string,
    /// non-UTF-8 bytes are replaced lossily.
    pub fn get_string(&self, field: impl FieldSelector) -> Result<String> {
        let cell = self.cell(field)?;
        Ok(match cell {
            Value::NULL => String::new(),
            other => text_of(other).into_owned(),
        })
    }

    /// Field value as `i32`. Server NULL yields 0; unparseable text
    /// degrades to 0 with a warning instead of failing the iteration.
    pub fn get_int(&self, field: impl FieldSelector) -> Result<i32> {
        self.parse_cell(field)
    }

    /// Field value as `i64`, same NULL and parse policy as [`get_int`](Self::get_int).
    pub fn get_long(&self, field: impl FieldSelector) -> Result<i64> {
        self.parse_cell(field)
    }

    /// Field value as `f64`, same NULL and parse policy as [`get_int`](Self::get_int).
    pub fn get_double(&self, field: impl FieldSelector) -> Result<f64> {
        self.parse_cell(field)
    }

    /// Whether the field holds the server NULL marker on the current row.
    pub fn is_null(&self, field: impl FieldSelector) -> Result<bool> {
        Ok(matches!(self.cell(field)?, Value::NULL))
    }

    fn cell(&self, field: impl FieldSelector) -> Result<&Value> {
        let index = field.resolve(self.field_names())?;
        let row = self.current_row().ok_or(Error::NoCurrentRow)?;
        Ok(&row[index])
    }

    fn current_row(&self) -> Option<&[Value]> {
        match &self.payload {
            Payload::Rows {
                rows,
                position: Some(i),
                ..
            } => rows.get(*i).map(|row| &row[..]),
            _ => None,
        }
    }

    fn parse_cell<T>(&self, field: impl FieldSelector) -> Result<T>
    where
        T: FromStr + Default + Display,
    {
        let cell = self.cell(field)?;
        if matches!(cell, Value::NULL) {
            return Ok(T::default());
        }
        let text = text_of(cell);
        Ok(text.trim().parse().unwrap_or_else(|_| {
            let fallback = T::default();
            log::warn!(
                "failed to parse `{text}` as {}, returning {fallback}",
                std::any::type_name::<T>()
            );
            fallback
        }))
    }
}

/// Text rendering of a raw cell. The text protocol delivers every
/// non-NULL value as `Bytes`; the typed variants only appear with the
/// binary protocol and are rendered the way the server would print them.
fn text_of(value: &Value) -> Cow<'_, str> {
    match value {
        Value::NULL => Cow::Borrowed(""),
        Value::Bytes(bytes) => String::from_utf8_lossy(bytes),
        Value::Int(v) => Cow::Owned(v.to_string()),
        Value::UInt(v) => Cow::Owned(v.to_string()),
        Value::Float(v) => Cow::Owned(v.to_string()),
        Value::Double(v) => Cow::Owned(v.to_string()),
        Value::Date(year, month, day, hour, minute, second, micros) => {
            let mut text = format!("{year:04}-{month:02}-{day:02}");
            if (*hour, *minute, *second, *micros) != (0, 0, 0, 0) {
                text += &format!(" {hour:02}:{minute:02}:{second:02}");
                if *micros > 0 {
                    text += &format!(".{micros:06}");
                }
            }
            Cow::Owned(text)
        }
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let mut text = format!(
                "{}{:02}:{minutes:02}:{seconds:02}",
                if *negative { "-" } else { "" },
                u32::from(*hours) + days * 24,
            );
            if *micros > 0 {
                text += &format!(".{micros:06}");
            }
            Cow::Owned(text)
        }
    }
}

/// Selects a field of the current row either by zero-based index or by
/// case-sensitive name. Name-based access resolves to the name's position
/// in [`ResultCursor::field_names`], so both forms always agree.
pub trait FieldSelector {
    fn resolve(&self, names: &[String]) -> Result<usize>;
}

impl FieldSelector for usize {
    fn resolve(&self, names: &[String]) -> Result<usize> {
        if *self < names.len() {
            Ok(*self)
        } else {
            Err(Error::FieldIndex {
                index: *self,
                count: names.len(),
            })
        }
    }
}

impl FieldSelector for &str {
    fn resolve(&self, names: &[String]) -> Result<usize> {
        names
            .iter()
            .position(|name| name == self)
            .ok_or_else(|| Error::FieldName {
                name: (*self).to_string(),
            })
    }
}
