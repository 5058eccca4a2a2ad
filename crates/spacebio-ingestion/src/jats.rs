//! JATS full-text XML → canonical `Document`.
//!
//! Pure transform, no I/O. The XML is loaded into a small element tree
//! first (JATS extraction needs arbitrary-depth subtree flattening), then
//! walked: front matter for metadata, body for sections, back for
//! references, plus figures and table wraps anywhere in the article.
//! Malformed XML fails fast; there is no partial recovery.

use quick_xml::events::Event;
use quick_xml::Reader;
use spacebio_common::text::sanitize_text;
use thiserror::Error;

use crate::models::{
    derive_full_text, normalize_section_title, push_section, Author, Document, Figure, Metadata,
    Reference, Section, Table,
};

const ARTICLE_BINARY_BASE: &str = "https://www.ncbi.nlm.nih.gov/pmc/articles";

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed JATS XML: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("malformed JATS XML: {0}")]
    Structure(String),
}

// ── Element tree ──────────────────────────────────────────────────────────────

#[derive(Debug)]
enum XmlNode {
    Element(XmlElement),
    Text(String),
}

#[derive(Debug)]
struct XmlElement {
    name: String,
    attrs: Vec<(String, String)>,
    children: Vec<XmlNode>,
}

impl XmlElement {
    fn new(name: String, attrs: Vec<(String, String)>) -> Self {
        Self { name, attrs, children: Vec::new() }
    }

    /// Attribute by local name (`id`, `href`) ignoring any namespace prefix.
    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name || k.ends_with(&format!(":{name}")))
            .map(|(_, v)| v.as_str())
    }

    fn elements(&self) -> impl Iterator<Item = &XmlElement> {
        self.children.iter().filter_map(|n| match n {
            XmlNode::Element(e) => Some(e),
            XmlNode::Text(_) => None,
        })
    }

    /// First descendant with the given tag name, depth-first.
    fn find(&self, name: &str) -> Option<&XmlElement> {
        for child in self.elements() {
            if child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find(name) {
                return Some(found);
            }
        }
        None
    }

    /// All descendants with the given tag name, depth-first encounter order.
    fn find_all<'a>(&'a self, name: &str) -> Vec<&'a XmlElement> {
        let mut out = Vec::new();
        self.collect_named(name, &mut out);
        out
    }

    fn collect_named<'a>(&'a self, name: &str, out: &mut Vec<&'a XmlElement>) {
        for child in self.elements() {
            if child.name == name {
                out.push(child);
            }
            child.collect_named(name, out);
        }
    }

    fn find_with_attr(&self, name: &str, attr: &str, value: &str) -> Option<&XmlElement> {
        self.find_all(name)
            .into_iter()
            .find(|e| e.attr(attr) == Some(value))
    }

    fn find_all_with_attr<'a>(&'a self, name: &str, attr: &str, value: &str) -> Vec<&'a XmlElement> {
        self.find_all(name)
            .into_iter()
            .filter(|e| e.attr(attr) == Some(value))
            .collect()
    }

    /// First direct text node, trimmed. None when absent or empty.
    fn first_text(&self) -> Option<String> {
        self.children.iter().find_map(|n| match n {
            XmlNode::Text(t) => {
                let t = t.trim();
                (!t.is_empty()).then(|| t.to_string())
            }
            XmlNode::Element(_) => None,
        })
    }

    /// Flatten the whole subtree: all non-empty trimmed text nodes joined
    /// with single spaces, independent of nesting depth. Whitespace runs
    /// inside a text node collapse too.
    fn flatten(&self) -> String {
        let mut parts = Vec::new();
        self.collect_text(&mut parts);
        sanitize_text(&parts.join(" "))
    }

    fn collect_text(&self, out: &mut Vec<String>) {
        for child in &self.children {
            match child {
                XmlNode::Text(t) => {
                    let t = t.trim();
                    if !t.is_empty() {
                        out.push(t.to_string());
                    }
                }
                XmlNode::Element(e) => e.collect_text(out),
            }
        }
    }
}

/// Load an XML string into a synthetic-root element tree.
fn parse_tree(xml: &str) -> Result<XmlElement, ParseError> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<XmlElement> = vec![XmlElement::new(String::new(), Vec::new())];

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let element = XmlElement::new(local_name(e.name().as_ref()), read_attrs(&e)?);
                stack.push(element);
            }
            Event::Empty(e) => {
                let element = XmlElement::new(local_name(e.name().as_ref()), read_attrs(&e)?);
                attach(&mut stack, XmlNode::Element(element))?;
            }
            Event::Text(e) => {
                // Undefined entities are a structural error, not droppable text.
                let text = e.unescape()?.to_string();
                attach(&mut stack, XmlNode::Text(text))?;
            }
            Event::CData(e) => {
                let text = String::from_utf8_lossy(&e.into_inner()).to_string();
                attach(&mut stack, XmlNode::Text(text))?;
            }
            Event::End(_) => {
                // Mismatched end tags are rejected by the reader itself.
                let element = stack
                    .pop()
                    .ok_or_else(|| ParseError::Structure("unexpected end tag".to_string()))?;
                attach(&mut stack, XmlNode::Element(element))?;
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if stack.len() != 1 {
        return Err(ParseError::Structure("unclosed element at end of input".to_string()));
    }
    let root = stack.remove(0);
    if root.elements().next().is_none() {
        return Err(ParseError::Structure("no root element".to_string()));
    }
    Ok(root)
}

fn local_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);
    match name.rsplit_once(':') {
        Some((_, local)) => local.to_string(),
        None => name.to_string(),
    }
}

fn read_attrs(e: &quick_xml::events::BytesStart<'_>) -> Result<Vec<(String, String)>, ParseError> {
    let mut attrs = Vec::new();
    for attr in e.attributes() {
        let attr = attr.map_err(|err| ParseError::Structure(err.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        let value = attr
            .unescape_value()
            .map_err(|err| ParseError::Structure(err.to_string()))?
            .to_string();
        attrs.push((key, value));
    }
    Ok(attrs)
}

fn attach(stack: &mut Vec<XmlElement>, node: XmlNode) -> Result<(), ParseError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(node);
            Ok(())
        }
        None => Err(ParseError::Structure("content outside root element".to_string())),
    }
}

// ── Article extraction ────────────────────────────────────────────────────────

/// Parse a PMC efetch JATS payload into a canonical `Document`.
pub fn parse_article(xml: &str, pmc_id: &str) -> Result<Document, ParseError> {
    let root = parse_tree(xml)?;

    let metadata = root
        .find("front")
        .map(parse_metadata)
        .unwrap_or_default();
    let sections = root.find("body").map(parse_sections).unwrap_or_default();
    let references = root.find("back").map(parse_references).unwrap_or_default();
    let figures = parse_figures(&root, pmc_id);
    let tables = parse_tables(&root);
    let full_text = derive_full_text(metadata.abstract_text.as_deref(), &sections);

    Ok(Document {
        pmc_id: pmc_id.to_string(),
        metadata,
        sections,
        references,
        figures,
        tables,
        full_text,
    })
}

fn parse_metadata(front: &XmlElement) -> Metadata {
    let mut metadata = Metadata {
        title: front.find("article-title").map(|t| t.flatten()),
        journal: front.find("journal-title").and_then(|t| t.first_text()),
        abstract_text: front.find("abstract").map(|a| a.flatten()),
        ..Metadata::default()
    };

    for contrib in front.find_all_with_attr("contrib", "contrib-type", "author") {
        let surname = contrib.find("surname").and_then(|e| e.first_text());
        let given = contrib.find("given-names").and_then(|e| e.first_text());
        if surname.is_none() && given.is_none() {
            continue;
        }
        metadata.authors.push(Author {
            first_name: given.unwrap_or_default(),
            last_name: surname.unwrap_or_default(),
        });
    }

    for aff in front.find_all("aff") {
        let id = aff.attr("id").unwrap_or("default").to_string();
        metadata.affiliations.insert(id, aff.flatten());
    }

    // Electronic publication date preferred over print and other kinds.
    let pub_date = front
        .find_with_attr("pub-date", "pub-type", "epub")
        .or_else(|| front.find("pub-date"));
    metadata.publication_date = pub_date.and_then(parse_pub_date);

    metadata.doi = front
        .find_with_attr("article-id", "pub-id-type", "doi")
        .and_then(|e| e.first_text());
    metadata.pmid = front
        .find_with_attr("article-id", "pub-id-type", "pmid")
        .and_then(|e| e.first_text());

    for kwd in front.find_all("kwd") {
        if let Some(text) = kwd.first_text() {
            metadata.keywords.push(text);
        }
    }

    metadata
}

/// Assemble `YYYY[-MM[-DD]]`; months and days are zero-padded. A date
/// without a year is treated as absent.
fn parse_pub_date(pub_date: &XmlElement) -> Option<String> {
    let year = pub_date.find("year").and_then(|e| e.first_text())?;
    let mut parts = vec![year];
    if let Some(month) = pub_date.find("month").and_then(|e| e.first_text()) {
        parts.push(format!("{month:0>2}"));
        if let Some(day) = pub_date.find("day").and_then(|e| e.first_text()) {
            parts.push(format!("{day:0>2}"));
        }
    }
    Some(parts.join("-"))
}

fn parse_sections(body: &XmlElement) -> Vec<Section> {
    let mut sections = Vec::new();
    for sec in body.find_all("sec") {
        let Some(title) = sec.find("title").and_then(|t| t.first_text()) else {
            continue;
        };
        let key = normalize_section_title(&title);
        push_section(&mut sections, key, sec.flatten());
    }
    sections
}

fn parse_references(back: &XmlElement) -> Vec<Reference> {
    let Some(ref_list) = back.find("ref-list") else {
        return Vec::new();
    };
    ref_list
        .find_all("ref")
        .into_iter()
        .map(|r| Reference {
            id: r.attr("id").unwrap_or_default().to_string(),
            citation: r.find("mixed-citation").map(|c| c.flatten()),
            pmid: r
                .find_with_attr("pub-id", "pub-id-type", "pmid")
                .and_then(|e| e.first_text()),
            doi: r
                .find_with_attr("pub-id", "pub-id-type", "doi")
                .and_then(|e| e.first_text()),
        })
        .collect()
}

fn parse_figures(root: &XmlElement, pmc_id: &str) -> Vec<Figure> {
    root.find_all("fig")
        .into_iter()
        .map(|fig| {
            let caption = fig.find("caption");
            Figure {
                id: fig.attr("id").unwrap_or_default().to_string(),
                label: fig.find("label").and_then(|l| l.first_text()),
                title: caption
                    .and_then(|c| c.find("title"))
                    .and_then(|t| t.first_text()),
                caption: caption.map(|c| c.flatten()),
                image_url: fig
                    .find("graphic")
                    .and_then(|g| g.attr("href"))
                    .map(|href| format!("{ARTICLE_BINARY_BASE}/{pmc_id}/bin/{href}")),
            }
        })
        .collect()
}

fn parse_tables(root: &XmlElement) -> Vec<Table> {
    root.find_all("table-wrap")
        .into_iter()
        .map(|wrap| {
            let mut table = Table {
                id: wrap.attr("id").unwrap_or_default().to_string(),
                label: wrap.find("label").and_then(|l| l.first_text()),
                caption: wrap.find("caption").map(|c| c.flatten()),
                ..Table::default()
            };
            if let Some(inner) = wrap.find("table") {
                parse_table_grid(inner, &mut table);
            }
            table
        })
        .collect()
}

fn parse_table_grid(table_el: &XmlElement, table: &mut Table) {
    if let Some(thead) = table_el.find("thead") {
        for tr in thead.find_all("tr") {
            let row: Vec<String> = tr.find_all("th").into_iter().map(|th| th.flatten()).collect();
            if !row.is_empty() {
                table.headers = row;
            }
        }
    }
    if let Some(tbody) = table_el.find("tbody") {
        for tr in tbody.find_all("tr") {
            let row: Vec<String> = tr.find_all("td").into_iter().map(|td| td.flatten()).collect();
            if !row.is_empty() {
                table.rows.push(row);
            }
        }
    }
}
