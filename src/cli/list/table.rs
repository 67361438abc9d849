use std::fmt::{self, Write};

pub(crate) struct Row {
    cells: Vec<String>,
}

impl Row {
    fn is_awk_safe(&self) -> bool {
        self.cells
            .iter()
            .all(|cell| !cell.contains(|c: char| c.is_whitespace()))
    }

    fn columns(&self) -> usize {
        self.cells.len()
    }
}

pub(crate) trait IntoRow: Into<Row> + Sized {
    fn into_row(self) -> Row {
        self.into()
    }
}

impl<T> IntoRow for T where T: Into<Row> + Sized {}

impl From<Vec<String>> for Row {
    fn from(value: Vec<String>) -> Self {
        Row { cells: value }
    }
}

impl From<Vec<&str>> for Row {
    fn from(value: Vec<&str>) -> Self {
        let value: Vec<String> = value.into_iter().map(|s| s.to_owned()).collect();

        value.into()
    }
}

/// Number of characters a cell occupies on the terminal. ANSI escape sequences
/// (as emitted by `nu_ansi_term`) take no space.
fn display_width(cell: &str) -> usize {
    let mut width = 0;
    let mut chars = cell.chars();

    while let Some(c) = chars.next() {
        if c == '\x1b' {
            // CSI: ESC '[' params final-byte
            for c in chars.by_ref() {
                if ('@'..='~').contains(&c) && c != '[' {
                    break;
                }
            }
        } else {
            width += 1;
        }
    }

    width
}

/// A whitespace-aligned table, suitable for both humans and `awk`.
pub(crate) struct Table {
    body: Vec<Row>,
    header: Option<Row>,
    num_columns: Option<usize>,
    print_header: bool,
}

impl Table {
    pub(crate) fn new() -> Table {
        Table {
            body: Vec::new(),
            header: None,
            num_columns: None,
            print_header: true,
        }
    }

    fn expect_num_columns(&mut self, num_columns: usize) {
        match self.num_columns {
            Some(prev_num_columns) => assert_eq!(
                prev_num_columns, num_columns,
                "table has {} columns but a row with {} columns was inserted",
                prev_num_columns, num_columns
            ),
            None => self.num_columns = Some(num_columns),
        }
    }

    pub(crate) fn print_header(&mut self, print_header: bool) {
        self.print_header = print_header;
    }

    pub(crate) fn add_row<S: IntoRow>(&mut self, row: S) {
        let row = row.into_row();

        self.expect_num_columns(row.columns());

        self.body.push(row);
    }

    pub(crate) fn set_header<S: IntoRow>(&mut self, header: S) {
        let header = header.into_row();

        self.expect_num_columns(header.columns());

        assert!(
            header.is_awk_safe(),
            "table header is not awk safe, contains whitespace"
        );

        self.header.replace(header);
    }

    fn visible_rows(&self) -> impl Iterator<Item = &Row> {
        let header = match self.print_header {
            true => self.header.as_ref(),
            false => None,
        };

        header.into_iter().chain(self.body.iter())
    }

    fn column_widths(&self) -> Vec<usize> {
        let mut widths = vec![0usize; self.num_columns.unwrap_or(0)];

        for row in self.visible_rows() {
            for (i, cell) in row.cells.iter().enumerate() {
                widths[i] = widths[i].max(display_width(cell));
            }
        }

        widths
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let widths = self.column_widths();

        for row in self.visible_rows() {
            let last = row.cells.len().saturating_sub(1);

            for (i, cell) in row.cells.iter().enumerate() {
                f.write_str(cell)?;

                if i != last {
                    let padding = widths[i] - display_width(cell);

                    write!(f, "{:padding$}  ", "", padding = padding)?;
                }
            }

            f.write_char('\n')?;
        }

        Ok(())
    }
}

pub(crate) trait IntoTable: Into<Table> + Sized {
    fn into_table(self) -> Table {
        self.into()
    }
}

impl<T> IntoTable for T where T: Into<Table> + Sized {}
