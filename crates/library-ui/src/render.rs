//! HTML table rows and plain-text tables for the catalog and the ledger.

use std::fmt::Write;

use time::macros::format_description;
use time::OffsetDateTime;

use crate::selection::Selection;
use crate::view::{BookRow, CatalogView, LedgerRow, LedgerView};

const CATALOG_COLUMNS: usize = 9;
const LEDGER_COLUMNS: usize = 8;

pub fn escape_html(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn date(value: OffsetDateTime) -> String {
    value
        .format(format_description!("[year]-[month]-[day]"))
        .unwrap_or_else(|_| "N/A".to_string())
}

fn year(row: &BookRow) -> String {
    row.book
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "N/A".to_string())
}

fn disabled(enabled: bool) -> &'static str {
    if enabled {
        ""
    } else {
        " disabled"
    }
}

fn placeholder_row(columns: usize, message: &str) -> String {
    format!(r#"<tr><td colspan="{columns}">{}</td></tr>"#, escape_html(message))
}

pub fn catalog_row_html(row: &BookRow, selected: bool) -> String {
    let book = &row.book;
    let id = escape_html(&book.id);
    let status = escape_html(&book.status);
    let checked = if selected { " checked" } else { "" };

    format!(
        concat!(
            r#"<tr data-id="{id}" data-title="{title}" data-class="{class}">"#,
            r#"<td><input type="checkbox" class="library-select-checkbox" data-id="{id}"{checked}></td>"#,
            "<td>{title}</td><td>{author}</td><td>{year}</td><td>{genre}</td>",
            r#"<td class="status-{status}">{status}</td>"#,
            "<td>{copies}</td><td>{available}</td>",
            r#"<td class="actions-cell">"#,
            r#"<button class="btn btn-sm edit-book-btn" data-id="{id}"{edit}>Edit</button>"#,
            r#"<button class="btn btn-sm issue-book-btn" data-id="{id}" data-available="{available}"{issue}>Issue</button>"#,
            r#"<button class="btn btn-sm delete-book-btn" data-id="{id}"{delete}>Delete</button>"#,
            "</td></tr>"
        ),
        id = id,
        title = escape_html(&book.title),
        class = escape_html(&book.class_name),
        author = escape_html(&book.author),
        year = escape_html(&year(row)),
        genre = escape_html(&book.genre),
        status = status,
        copies = book.copies,
        available = book.available,
        checked = checked,
        edit = disabled(row.can_edit),
        issue = disabled(row.can_issue),
        delete = disabled(row.can_delete),
    )
}

pub fn catalog_html(view: &CatalogView, selection: &Selection) -> String {
    if view.is_empty() {
        return placeholder_row(CATALOG_COLUMNS, "No books found in the library.");
    }
    view.rows
        .iter()
        .map(|row| catalog_row_html(row, selection.contains(&row.book.id)))
        .collect()
}

pub fn ledger_row_html(row: &LedgerRow) -> String {
    let record = &row.record;
    let id = escape_html(&record.id);
    let overdue = if row.overdue {
        r#" <span class="overdue">Overdue</span>"#
    } else {
        ""
    };
    let action = if row.can_return {
        format!(r#"<button class="btn btn-sm return-book-btn" data-issueid="{id}">Return</button>"#)
    } else {
        String::new()
    };

    format!(
        r#"<tr data-issueid="{id}"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}{overdue}</td><td>{}</td><td>{}</td><td>{action}</td></tr>"#,
        escape_html(&record.title),
        escape_html(&record.borrower_name),
        escape_html(&record.class_name),
        date(record.issue_date),
        date(record.due_date),
        row.status_label(),
        escape_html(&row.fine_label()),
    )
}

pub fn ledger_html(view: &LedgerView) -> String {
    if view.is_empty() {
        return placeholder_row(LEDGER_COLUMNS, "No issued books found.");
    }
    view.rows.iter().map(ledger_row_html).collect()
}

fn push_line<'a>(out: &mut String, widths: &[usize], cells: impl Iterator<Item = &'a str>) {
    let mut text = String::new();
    for (i, (cell, &width)) in cells.zip(widths).enumerate() {
        if i > 0 {
            text.push_str("  ");
        }
        let _ = write!(text, "{cell:<width$}");
    }
    out.push_str(text.trim_end());
    out.push('\n');
}

/// Left-aligned columns padded to the widest cell, separated by two spaces.
fn text_table(header: &[&str], rows: Vec<Vec<String>>) -> String {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    push_line(&mut out, &widths, header.iter().copied());
    for row in &rows {
        push_line(&mut out, &widths, row.iter().map(String::as_str));
    }
    out
}

pub fn catalog_text(view: &CatalogView, selection: &Selection) -> String {
    if view.is_empty() {
        return "No books found in the library.\n".to_string();
    }
    let rows = view
        .rows
        .iter()
        .map(|row| {
            let book = &row.book;
            vec![
                if selection.contains(&book.id) { "*" } else { "" }.to_string(),
                book.id.clone(),
                book.title.clone(),
                book.author.clone(),
                year(row),
                book.class_name.clone(),
                book.status.clone(),
                format!("{}/{}", book.available, book.copies),
            ]
        })
        .collect();
    text_table(
        &["", "ID", "TITLE", "AUTHOR", "YEAR", "CLASS", "STATUS", "AVAILABLE"],
        rows,
    )
}

pub fn ledger_text(view: &LedgerView) -> String {
    if view.is_empty() {
        return "No issued books found.\n".to_string();
    }
    let rows = view
        .rows
        .iter()
        .map(|row| {
            let record = &row.record;
            let status = if row.overdue {
                "Overdue".to_string()
            } else {
                row.status_label().to_string()
            };
            vec![
                record.id.clone(),
                record.title.clone(),
                record.borrower_name.clone(),
                record.class_name.clone(),
                date(record.issue_date),
                date(record.due_date),
                status,
                row.fine_label(),
            ]
        })
        .collect();
    text_table(
        &["ISSUE ID", "TITLE", "BORROWER", "CLASS", "ISSUED", "DUE", "STATUS", "FINE"],
        rows,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::fixtures::{book, issued};
    use rust_decimal::Decimal;
    use time::macros::datetime;

    #[test]
    fn html_is_escaped() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & Jerry's</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; Jerry&#39;s&lt;/b&gt;"
        );

        let view = CatalogView::from_books(vec![book("b1", "<script>alert(1)</script>", 1)]);
        let html = catalog_html(&view, &Selection::new());
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));
    }

    #[test]
    fn catalog_row_reflects_actions_and_selection() {
        let view = CatalogView::from_books(vec![book("b1", "Gone", 0), book("b2", "Here", 2)]);
        let mut selection = Selection::new();
        selection.set("b2", true);

        let html = catalog_html(&view, &selection);
        let (gone, here) = html.split_at(html.find(r#"<tr data-id="b2""#).unwrap());

        assert!(gone.contains(r#"data-available="0" disabled>Issue"#));
        assert!(!gone.contains(" checked"));
        assert!(here.contains(r#"data-available="2">Issue"#));
        assert!(here.contains(r#"data-id="b2" checked>"#));
        assert!(here.contains(r#"edit-book-btn" data-id="b2" disabled>Edit"#));
    }

    #[test]
    fn empty_views_render_placeholders() {
        assert_eq!(
            catalog_html(&CatalogView::default(), &Selection::new()),
            r#"<tr><td colspan="9">No books found in the library.</td></tr>"#
        );
        assert_eq!(
            ledger_html(&LedgerView::default()),
            r#"<tr><td colspan="8">No issued books found.</td></tr>"#
        );
    }

    #[test]
    fn ledger_row_shows_overdue_and_return_action() {
        let view = LedgerView::from_records(
            vec![issued("r1", false, Decimal::ZERO), issued("r2", true, Decimal::from(30))],
            datetime!(2026-03-20 08:00 UTC),
        );
        let html = ledger_html(&view);

        assert!(html.contains("<td>2026-03-16 <span class=\"overdue\">Overdue</span></td>"));
        assert!(html.contains(r#"data-issueid="r1">Return</button>"#));
        assert!(!html.contains(r#"data-issueid="r2">Return"#));
        assert!(html.contains("<td>Ksh 30.00</td>"));
    }

    #[test]
    fn text_tables_align_columns() {
        let view = LedgerView::from_records(
            vec![issued("r1", false, Decimal::ZERO)],
            datetime!(2026-03-20 08:00 UTC),
        );
        let text = ledger_text(&view);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("ISSUE ID  TITLE"));
        assert!(lines[1].starts_with("r1        The Promised Land"));
        assert!(lines[1].contains("Overdue"));

        let catalog = catalog_text(&CatalogView::from_books(vec![book("b1", "Gone", 0)]), &Selection::new());
        assert!(catalog.lines().nth(1).unwrap().ends_with("0/3"));
    }
}
