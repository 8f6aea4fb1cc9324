//! Lightweight HTML to typst markup translation.
//!
//! Covers the structure exported pages usually carry: headings, paragraphs,
//! emphasis, lists, preformatted text and tables. Anything else contributes
//! its text.

use std::borrow::Cow;

use scraper::ElementRef;

use crate::{
    dom::{self, GridCell},
    error::ExportError,
};

const SKIPPED: &[&str] = &[
    "head", "script", "style", "title", "meta", "link", "template", "noscript", "img", "svg",
    "canvas", "iframe",
];

const BLOCKS: &[&str] = &[
    "html",
    "body",
    "p",
    "div",
    "section",
    "article",
    "main",
    "header",
    "footer",
    "nav",
    "aside",
    "blockquote",
    "figure",
    "figcaption",
    "form",
    "fieldset",
    "address",
    "caption",
    "dl",
    "dt",
    "dd",
];

/// Translates `el` (including `el` itself) into typst markup.
pub fn to_typst(el: ElementRef<'_>) -> Result<String, ExportError> {
    let mut out = String::new();
    render_element(el, &mut out)?;
    Ok(tidy(&out))
}

/// Places `content` into a template carrying a `{{content}}` placeholder.
pub fn inject_content(template: &str, content: &str) -> String {
    template.replacen("{{content}}", content, 1)
}

fn render_children(el: ElementRef<'_>, out: &mut String) -> Result<(), ExportError> {
    for child in el.children() {
        if let Some(text) = dom::node_text(child.value()) {
            out.push_str(&escape_text(&dom::collapse_keep_edges(text)));
        } else if let Some(child) = ElementRef::wrap(child) {
            render_element(child, out)?;
        }
    }
    Ok(())
}

fn render_element(el: ElementRef<'_>, out: &mut String) -> Result<(), ExportError> {
    let name = dom::tag_name(&el);
    if SKIPPED.contains(&name) {
        return Ok(());
    }

    match name {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let depth = name[1..].parse::<usize>().unwrap_or(1);
            let text = escape_text(&dom::inner_text(el)).into_owned();
            if !text.is_empty() {
                out.push_str(&format!("\n\n{} {text}\n\n", "=".repeat(depth)));
            }
        }
        "br" => out.push_str(" \\\n"),
        "hr" => out.push_str("\n\n#line(length: 100%)\n\n"),
        "strong" | "b" => wrap_call("strong", el, out)?,
        "em" | "i" => wrap_call("emph", el, out)?,
        "u" | "ins" => wrap_call("underline", el, out)?,
        "s" | "del" | "strike" => wrap_call("strike", el, out)?,
        "sub" => wrap_call("sub", el, out)?,
        "sup" => wrap_call("super", el, out)?,
        "code" | "kbd" | "samp" => {
            out.push_str(&format!("#raw(\"{}\");", escape_string(&dom::text_content(el))));
        }
        "pre" => {
            out.push_str(&format!(
                "\n\n#raw(block: true, \"{}\");\n\n",
                escape_string(&dom::text_content(el))
            ));
        }
        "ul" | "ol" => render_list(el, name == "ol", out)?,
        "table" => render_table(el, out)?,
        _ if BLOCKS.contains(&name) => {
            out.push_str("\n\n");
            render_children(el, out)?;
            out.push_str("\n\n");
        }
        _ => render_children(el, out)?,
    }
    Ok(())
}

fn wrap_call(func: &str, el: ElementRef<'_>, out: &mut String) -> Result<(), ExportError> {
    out.push('#');
    out.push_str(func);
    out.push('[');
    render_children(el, out)?;
    // the semicolon ends the embedded expression
    out.push_str("];");
    Ok(())
}

fn render_list(el: ElementRef<'_>, ordered: bool, out: &mut String) -> Result<(), ExportError> {
    let marker = if ordered { "+" } else { "-" };
    out.push_str("\n\n");
    for item in dom::child_elements(el).filter(|c| dom::is_tag(c, "li")) {
        let mut item_buf = String::new();
        render_children(item, &mut item_buf)?;
        let item_buf = tidy(&item_buf);
        // nested content stays inside the item by indentation
        let body = item_buf.replace('\n', "\n  ");
        out.push_str(&format!("{marker} {body}\n"));
    }
    out.push('\n');
    Ok(())
}

fn render_table(el: ElementRef<'_>, out: &mut String) -> Result<(), ExportError> {
    let grid = dom::table_grid(el);
    let columns = grid.iter().map(|c| c.col + c.col_span).max().unwrap_or(0);
    if columns == 0 {
        return Ok(());
    }

    out.push_str(&format!("\n\n#table(\n  columns: {columns},\n"));
    for cell in &grid {
        out.push_str("  ");
        out.push_str(&table_cell(cell));
        out.push_str(",\n");
    }
    out.push_str(");\n\n");
    Ok(())
}

fn table_cell(cell: &GridCell) -> String {
    let mut args = format!("x: {}, y: {}", cell.col, cell.row);
    if cell.col_span > 1 {
        args.push_str(&format!(", colspan: {}", cell.col_span));
    }
    if cell.row_span > 1 {
        args.push_str(&format!(", rowspan: {}", cell.row_span));
    }

    let text = escape_text(&cell.text);
    if cell.header {
        format!("table.cell({args})[#strong[{text}];]")
    } else {
        format!("table.cell({args})[{text}]")
    }
}

// Backslash escapes any character in typst markup.
fn escape_text(s: &str) -> Cow<'_, str> {
    const SPECIAL: &[char] = &[
        '\\', '#', '$', '*', '_', '`', '<', '>', '@', '[', ']', '{', '}', '~', '=', '-', '+',
        '/', '.', '\'', '"', ':',
    ];
    if s.contains(SPECIAL) {
        let mut out = String::with_capacity(s.len() + 8);
        for ch in s.chars() {
            if SPECIAL.contains(&ch) {
                out.push('\\');
            }
            out.push(ch);
        }
        Cow::Owned(out)
    } else {
        Cow::Borrowed(s)
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => {}
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out
}

/// Squeezes runs of blank lines and trims the edges.
fn tidy(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut blank_run = 0;
    for line in s.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run == 1 {
                out.push('\n');
            }
        } else {
            blank_run = 0;
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::{Document, Page};

    fn typst_of(html: &str, id: &str) -> String {
        let doc = Document::parse(&Page::from_html(html));
        to_typst(doc.require_element(id).unwrap()).unwrap()
    }

    #[test]
    fn test_escape_text() {
        assert_eq!(escape_text("plain"), "plain");
        assert_eq!(escape_text("#1 *x*"), "\\#1 \\*x\\*");
        assert_eq!(escape_text("a//b"), "a\\/\\/b");
    }

    #[test]
    fn test_heading_and_paragraph() {
        let out = typst_of(
            "<div id='d'><h2>Title</h2><p>Hello <b>big</b> world</p></div>",
            "d",
        );
        assert!(out.contains("== Title"));
        assert!(out.contains("Hello #strong[big]; world"));
    }

    #[test]
    fn test_table_cells_are_positioned() {
        let out = typst_of(
            "<table id='t'><tr><th>Name</th><th>Age</th></tr>\
             <tr><td>Bob</td><td>30</td></tr></table>",
            "t",
        );
        assert!(out.starts_with("#table("));
        assert!(out.contains("columns: 2"));
        assert!(out.contains("table.cell(x: 0, y: 0)[#strong[Name];]"));
        assert!(out.contains("table.cell(x: 1, y: 1)[30]"));
    }

    #[test]
    fn test_lists() {
        let out = typst_of("<ol id='l'><li>one</li><li>two</li></ol>", "l");
        assert_eq!(out, "+ one\n+ two");
    }

    #[test]
    fn test_inject_content() {
        assert_eq!(inject_content("a {{content}} b", "X"), "a X b");
    }

    #[test]
    fn test_code_is_raw_string() {
        let out = typst_of("<pre id='p'>let x = \"y\";\n</pre>", "p");
        assert_eq!(out, "#raw(block: true, \"let x = \\\"y\\\";\\n\");");
    }
}
