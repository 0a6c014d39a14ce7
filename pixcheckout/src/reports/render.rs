//! CSV and HTML rendering of report tables.

use minijinja::{Environment, context};

use crate::errors::{Error, Result};

/// A rendered report: summary figures followed by one detail table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportTable {
    pub title: String,
    pub summary: Vec<(String, String)>,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

fn csv_field(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\"\""))
}

fn csv_line<S: AsRef<str>>(fields: &[S]) -> String {
    fields.iter().map(|f| csv_field(f.as_ref())).collect::<Vec<_>>().join(",")
}

/// Every field is quoted. Summary pairs come first, then a blank line, then the table.
pub fn to_csv(table: &ReportTable) -> String {
    let mut lines = Vec::with_capacity(table.summary.len() + table.rows.len() + 3);
    for (label, value) in &table.summary {
        lines.push(csv_line(&[label, value]));
    }
    if !table.summary.is_empty() {
        lines.push(String::new());
    }
    lines.push(csv_line(&table.headers));
    lines.extend(table.rows.iter().map(|row| csv_line(row)));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

const HTML_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<title>{{ title }}</title>
<style>
body { font-family: Arial, sans-serif; margin: 24px; }
table { border-collapse: collapse; width: 100%; margin-top: 16px; }
th, td { border: 1px solid #ddd; padding: 8px; text-align: left; }
th { background: #f3f4f6; }
</style>
</head>
<body>
<h1>{{ title }}</h1>
<dl>
{%- for item in summary %}
<dt>{{ item[0] }}</dt><dd>{{ item[1] }}</dd>
{%- endfor %}
</dl>
<table>
<thead><tr>{% for header in headers %}<th>{{ header }}</th>{% endfor %}</tr></thead>
<tbody>
{%- for row in rows %}
<tr>{% for cell in row %}<td>{{ cell }}</td>{% endfor %}</tr>
{%- endfor %}
</tbody>
</table>
</body>
</html>
"#;

/// Standalone HTML page. Cell values are escaped.
pub fn to_html(table: &ReportTable) -> Result<String> {
    let mut env = Environment::new();
    // The `.html` name turns on auto-escaping
    env.add_template("report.html", HTML_TEMPLATE).map_err(|e| Error::Internal {
        operation: format!("compile report template: {e}"),
    })?;

    env.get_template("report.html")
        .and_then(|t| {
            t.render(context! {
                title => &table.title,
                summary => &table.summary,
                headers => &table.headers,
                rows => &table.rows,
            })
        })
        .map_err(|e| Error::Internal {
            operation: format!("render report: {e}"),
        })
}
