use crate::error::DataError;
use crate::fieldset::{FieldKind, FieldTemplate};
use crate::series::parse_tags;

/// Column layout of the stress table.
///
/// Integer fields become `INT`, floats `FLOAT` and strings `CHAR(64)`
/// columns; tags become `CHAR(32)` columns. An auto-increment `id` and an
/// indexed `create_time` column frame the generated columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    name: String,
    fields: FieldTemplate,
    tags: Vec<(String, String)>,
}

impl TableLayout {
    pub fn new(measurement: &str, tags: &str, fields: &str) -> Result<Self, DataError> {
        let name = measurement.trim();
        if name.is_empty() {
            return Err(DataError::EmptyMeasurement);
        }
        Ok(Self {
            name: name.to_string(),
            fields: FieldTemplate::parse(fields)?,
            tags: parse_tags(tags)?,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &FieldTemplate {
        &self.fields
    }

    pub fn tags(&self) -> &[(String, String)] {
        &self.tags
    }

    pub fn create_statement(&self) -> String {
        let mut columns: Vec<String> = self
            .fields
            .fields()
            .iter()
            .map(|f| {
                let ty = match f.kind {
                    FieldKind::Int => "INT",
                    FieldKind::Float => "FLOAT",
                    FieldKind::Str => "CHAR(64)",
                };
                format!("{} {ty}", f.key)
            })
            .collect();
        columns.extend(self.tags.iter().map(|(k, _)| format!("{k} CHAR(32)")));

        format!(
            "CREATE TABLE IF NOT EXISTS {} (id INT AUTO_INCREMENT PRIMARY KEY, {}, \
             create_time TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP, INDEX time (create_time));",
            self.name,
            columns.join(", ")
        )
    }

    /// One `VALUES` tuple: null id, generated columns, then `now()`.
    pub(crate) fn row_values(&self, int_value: i64, float_value: f64, text: &str, row: usize) -> String {
        let mut cols = Vec::with_capacity(self.fields.len() + self.tags.len());
        for f in self.fields.fields() {
            cols.push(match f.kind {
                FieldKind::Int => int_value.to_string(),
                FieldKind::Float => format!("{float_value:.1}"),
                FieldKind::Str => format!("'{text}'"),
            });
        }
        for (_, value) in &self.tags {
            cols.push(format!("'{value}-{row}'"));
        }
        format!("(null,{},now())", cols.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_statement() {
        let layout = TableLayout::new("cpu", "host=server", "n=0i,f=1.0,s=xstr").unwrap();
        assert_eq!(
            layout.create_statement(),
            "CREATE TABLE IF NOT EXISTS cpu (id INT AUTO_INCREMENT PRIMARY KEY, n INT, f FLOAT, \
             s CHAR(64), host CHAR(32), create_time TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP, \
             INDEX time (create_time));"
        );
    }

    #[test]
    fn test_row_values() {
        let layout = TableLayout::new("cpu", "host=server", "n=0i,f=1.0,s=xstr").unwrap();
        assert_eq!(
            layout.row_values(3, 0.5, "abc", 7),
            "(null,3,0.5,'abc','server-7',now())"
        );
    }

    #[test]
    fn test_rejects_empty_name() {
        assert_eq!(
            TableLayout::new(" ", "a=b", "n=1i").unwrap_err(),
            DataError::EmptyMeasurement
        );
    }
}
