use quick_xml::escape::escape;

use crate::{
    dom::{self, Document},
    error::ExportError,
    export_config::ExportConfig,
    exporter::{Export, Exported},
};

const XML_MIME: &'static str = "text/xml";
const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8"?><Root><Classes>"#;
const XML_FOOTER: &str = "</Classes></Root>";

/// Every row becomes a `<Class>` named by its first cell, holding the
/// remaining cells as `<data>` children.
pub struct XmlExporter;

impl XmlExporter {
    pub fn new() -> Self {
        Self {}
    }

    pub fn render(&self, document: &Document, id: &str) -> Result<String, ExportError> {
        let element = document.require_element(id)?;
        let rows = dom::selector("tr")?;

        let mut xml = String::from(XML_HEADER);
        for row in element.select(&rows) {
            let cells = dom::row_cells(row);
            let Some((name, data)) = cells.split_first() else {
                continue;
            };

            xml.push_str(&format!(
                "<Class name=\"{}\">\n",
                escape(dom::text_content(*name).as_str())
            ));
            for cell in data {
                xml.push_str(&format!(
                    "\t<data>{}</data>\n",
                    escape(dom::text_content(*cell).as_str())
                ));
            }
            xml.push_str("</Class>\n");
        }
        xml.push_str(XML_FOOTER);

        Ok(xml)
    }
}

impl Export for XmlExporter {
    fn export(&self, document: &Document, config: &ExportConfig) -> Result<Exported, ExportError> {
        let xml = self.render(document, &config.element_id_or_content)?;
        Ok(Exported::new(xml.into(), XML_MIME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Page;

    fn render(html: &str) -> String {
        XmlExporter::new()
            .render(&Document::parse(&Page::from_html(html)), "t")
            .unwrap()
    }

    #[test]
    fn test_class_per_row() {
        let out = render("<table id='t'><tr><td>Cat1</td><td>x</td><td>y</td></tr></table>");
        assert_eq!(
            out,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><Root><Classes>\
             <Class name=\"Cat1\">\n\t<data>x</data>\n\t<data>y</data>\n</Class>\n\
             </Classes></Root>"
        );
    }

    #[test]
    fn test_text_is_escaped() {
        let out = render("<table id='t'><tr><td>a&amp;b</td><td>&lt;c&gt;</td></tr></table>");
        assert!(out.contains("<Class name=\"a&amp;b\">"));
        assert!(out.contains("<data>&lt;c&gt;</data>"));
    }

    #[test]
    fn test_empty_rows_are_skipped() {
        let out = render("<table id='t'><tr></tr></table>");
        assert_eq!(out, format!("{XML_HEADER}{XML_FOOTER}"));
    }
}
