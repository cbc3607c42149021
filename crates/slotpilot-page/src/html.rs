//! Tolerant HTML extraction for the portal's calendar list.
//!
//! Deliberately naive string scanning tailored to the calendar markup: the
//! active slide holds a list table whose `<tr>` rows are either day headings
//! or activity items. Anything that does not match is skipped, and a page
//! without the expected structure yields an empty snapshot.

use crate::snapshot::{PageRow, PageSnapshot};

/// Class names of the calendar markup this extraction understands.
const ACTIVE_SLIDE: &str = "swiper-slide-active";
const LIST_TABLE: &str = "fc-list-table";
const HEADING_CLASS: &str = "fc-list-heading";
const HEADING_LABEL_CLASS: &str = "fc-list-heading-main";
const ITEM_CLASS: &str = "fc-list-item";
const TIME_CLASS: &str = "fc-list-item-time";
const TITLE_CLASS: &str = "fc-list-item-title";
const BOOK_BUTTON_CLASS: &str = "btn-success";

/// Parse a whole profile page into calendar rows.
pub fn parse_snapshot(html: &str) -> PageSnapshot {
    let Some(table) = active_list_table(html) else {
        tracing::warn!("📄 No active calendar table on page, snapshot is empty");
        return PageSnapshot::default();
    };
    let mut rows = Vec::new();
    let mut from = 0;
    while let Some((start, end)) = next_block(table, "<tr", "</tr>", from) {
        if let Some(row) = parse_row(&table[start..end]) {
            rows.push(row);
        }
        from = end;
    }
    PageSnapshot::new(rows)
}

/// The list table inside the active slide, or `None` when the page does not
/// carry one.
fn active_list_table(html: &str) -> Option<&str> {
    let slide = html.find(ACTIVE_SLIDE)?;
    let rest = &html[slide..];
    let table_at = rest.find(LIST_TABLE)?;
    let after = &rest[table_at..];
    let open_end = after.find('>')? + 1;
    let close = after[open_end..].find("</table>")?;
    Some(&after[open_end..open_end + close])
}

fn parse_row(block: &str) -> Option<PageRow> {
    let open = open_tag(block);
    let classes = attr_value(open, "class").unwrap_or_default();
    if classes.contains(HEADING_CLASS) {
        let date = attr_value(open, "data-date").unwrap_or_default();
        let label = class_text(block, HEADING_LABEL_CLASS).unwrap_or_default();
        return Some(PageRow::Heading { date, label });
    }
    if classes.contains(ITEM_CLASS) {
        let time_text = class_text(block, TIME_CLASS)?;
        let title = class_text(block, TITLE_CLASS)?;
        let color = row_background(block, open);
        let (bookable, event_id) = booking_control(block);
        return Some(PageRow::Item {
            time_text,
            title,
            color,
            bookable,
            event_id,
        });
    }
    None
}

/// The inline background color of the row, falling back to any
/// `background-color` declaration inside the block.
fn row_background(block: &str, open: &str) -> String {
    let style = attr_value(open, "style").unwrap_or_default();
    if let Some(color) = style_property(&style, "background-color") {
        return color;
    }
    block
        .find("background-color:")
        .map(|at| {
            let rest = &block[at + "background-color:".len()..];
            let end = rest.find([';', '"', '\'']).unwrap_or(rest.len());
            rest[..end].trim().to_string()
        })
        .unwrap_or_default()
}

/// Whether the row exposes an enabled booking control, and its event id.
fn booking_control(block: &str) -> (bool, Option<String>) {
    let Some(at) = block.find(BOOK_BUTTON_CLASS) else {
        return (false, None);
    };
    let tag_start = block[..at].rfind('<').unwrap_or(0);
    let tag_end = block[tag_start..]
        .find('>')
        .map(|i| tag_start + i + 1)
        .unwrap_or(block.len());
    let tag = &block[tag_start..tag_end];
    let enabled = !tag.contains("disabled");
    (enabled, attr_value(tag, "data-event"))
}

/// The opening tag of a block, `<tr ...>` included.
fn open_tag(block: &str) -> &str {
    match block.find('>') {
        Some(end) => &block[..end + 1],
        None => block,
    }
}

/// Locate the next `<tag ...>...</tag>` block at or after `from`.
/// Returns the byte range covering the whole block.
fn next_block(s: &str, open: &str, close: &str, from: usize) -> Option<(usize, usize)> {
    let start = s.get(from..)?.find(open)? + from;
    let open_end = s[start..].find('>')? + start + 1;
    let close_at = s[open_end..].find(close)?;
    Some((start, open_end + close_at + close.len()))
}

/// Text content of the first element carrying the given class, tags
/// stripped and whitespace collapsed.
fn class_text(block: &str, class: &str) -> Option<String> {
    let at = block.find(class)?;
    let content_start = block[at..].find('>')? + at + 1;
    let tag_start = block[..at].rfind('<')?;
    let tag_name: String = block[tag_start + 1..]
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect();
    let close = format!("</{tag_name}>");
    let content_end = block[content_start..]
        .find(&close)
        .map(|i| content_start + i)
        .unwrap_or(block.len());
    let text = strip_tags(&block[content_start..content_end]);
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Value of an attribute inside an opening tag; handles double-quoted,
/// single-quoted and bare values.
fn attr_value(tag: &str, name: &str) -> Option<String> {
    let pat = format!("{name}=");
    let at = tag.find(&pat)? + pat.len();
    let rest = &tag[at..];
    let mut chars = rest.chars();
    match chars.next()? {
        quote @ ('"' | '\'') => {
            let end = rest[1..].find(quote)?;
            Some(rest[1..1 + end].to_string())
        }
        _ => {
            let end = rest.find([' ', '>', '/']).unwrap_or(rest.len());
            Some(rest[..end].to_string())
        }
    }
}

/// The value of one declaration inside an inline `style` attribute.
fn style_property(style: &str, property: &str) -> Option<String> {
    for declaration in style.split(';') {
        let Some((name, value)) = declaration.split_once(':') else {
            continue;
        };
        if name.trim() == property {
            let value = value.trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

/// Remove tags, decode the common entities and collapse whitespace.
fn strip_tags(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_tag = false;
    for ch in s.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    let decoded = out.replace("&nbsp;", " ").replace("&amp;", "&");
    let mut collapsed = String::with_capacity(decoded.len());
    let mut prev_space = false;
    for ch in decoded.chars() {
        if ch.is_whitespace() {
            if !prev_space {
                collapsed.push(' ');
                prev_space = true;
            }
        } else {
            collapsed.push(ch);
            prev_space = false;
        }
    }
    collapsed.trim().to_string()
}
