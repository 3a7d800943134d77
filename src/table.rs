//! Column-aligned table output for `list`-style commands.

pub struct TableColumn {
    pub header: String,
    pub rows: Vec<String>,
}

impl TableColumn {
    pub fn new(header: &str) -> Self {
        Self {
            header: header.to_string(),
            rows: Vec::new(),
        }
    }

    pub fn push(&mut self, value: impl Into<String>) {
        self.rows.push(value.into());
    }
}

pub fn render(columns: &[TableColumn]) -> String {
    let widths: Vec<usize> = columns
        .iter()
        .map(|col| {
            col.rows
                .iter()
                .map(String::len)
                .chain(std::iter::once(col.header.len()))
                .max()
                .unwrap_or(0)
        })
        .collect();
    let row_count = columns.iter().map(|col| col.rows.len()).max().unwrap_or(0);

    let mut out = String::new();
    for (col, &width) in columns.iter().zip(&widths) {
        out.push_str(&format!("{:<width$}   ", col.header));
    }
    out.push('\n');
    for row in 0..row_count {
        for (col, &width) in columns.iter().zip(&widths) {
            let cell = col.rows.get(row).map(String::as_str).unwrap_or("");
            out.push_str(&format!("{cell:<width$}   "));
        }
        out.push('\n');
    }
    out
}

pub fn print(columns: &[TableColumn]) {
    print!("{}", render(columns));
}
