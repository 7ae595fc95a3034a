use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use thiserror::Error;

use crate::storage::{Feed, NewFeed};

/// SEC-003: Maximum nesting depth for `<outline>` elements.
const MAX_OPML_DEPTH: usize = 50;

const EXPORT_TITLE: &str = "Feeds";
const EXPORT_VERSION: &str = "1.1";

#[derive(Debug, Error)]
pub enum OpmlError {
    /// SEC-003: outline nesting exceeds the safety limit.
    #[error("OPML nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),

    #[error("XML parse error: {0}")]
    XmlParse(String),

    #[error("Not an OPML document")]
    NotOpml,

    #[error("Failed to write OPML: {0}")]
    Write(#[from] std::io::Error),
}

impl From<quick_xml::Error> for OpmlError {
    fn from(e: quick_xml::Error) -> Self {
        OpmlError::XmlParse(e.to_string())
    }
}

/// One subscription `<outline>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpmlOutline {
    pub title: String,
    pub text: String,
    pub xml_url: String,
}

impl OpmlOutline {
    /// `title`, else `text`, else the feed URL
    pub fn display_name(&self) -> &str {
        [&self.title, &self.text]
            .into_iter()
            .find(|s| !s.is_empty())
            .unwrap_or(&self.xml_url)
    }
}

/// A subscription list. Only outlines carrying `xmlUrl` are kept, flattened
/// in document order; folder outlines contribute nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpmlDocument {
    pub title: String,
    pub version: String,
    pub outlines: Vec<OpmlOutline>,
}

impl OpmlDocument {
    /// Export shape: one outline per feed, named on both `title` and `text`.
    pub fn from_feeds(feeds: &[Feed]) -> Self {
        Self {
            title: EXPORT_TITLE.to_string(),
            version: EXPORT_VERSION.to_string(),
            outlines: feeds
                .iter()
                .map(|f| OpmlOutline {
                    title: f.name.clone(),
                    text: f.name.clone(),
                    xml_url: f.url.clone(),
                })
                .collect(),
        }
    }

    pub fn to_new_feeds(&self) -> Vec<NewFeed> {
        self.outlines
            .iter()
            .map(|o| NewFeed {
                name: o.display_name().to_string(),
                url: o.xml_url.clone(),
            })
            .collect()
    }
}

/// Parse OPML bytes.
///
/// The character set comes from the BOM or the XML declaration's `encoding`
/// (quick-xml `encoding` feature), so Latin-1 or Windows-1252 exports from
/// older readers decode correctly. Any XML error rejects the whole document.
///
/// SEC-002: quick-xml never expands `<!ENTITY>` declarations; a custom entity
/// reference in an attribute is an unescape error, not an expansion.
pub fn parse_opml(bytes: &[u8]) -> Result<OpmlDocument, OpmlError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut doc = OpmlDocument {
        title: String::new(),
        version: String::new(),
        outlines: Vec::new(),
    };
    let mut buf = Vec::new();
    let mut seen_root = false;
    let mut open_elements: usize = 0;
    // SEC-003
    let mut outline_depth: usize = 0;
    let mut in_head_title = false;

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                open_elements += 1;
                match e.name().as_ref() {
                    b"opml" => {
                        seen_root = true;
                        doc.version = attribute(&e, &reader, b"version")?.unwrap_or_default();
                    }
                    b"title" if !seen_root => return Err(OpmlError::NotOpml),
                    b"title" => in_head_title = true,
                    b"outline" => {
                        outline_depth += 1;
                        if outline_depth > MAX_OPML_DEPTH {
                            return Err(OpmlError::MaxDepthExceeded(MAX_OPML_DEPTH));
                        }
                        push_outline(&mut doc, &e, &reader)?;
                    }
                    _ if !seen_root => return Err(OpmlError::NotOpml),
                    _ => {}
                }
            }
            Event::Empty(e) => match e.name().as_ref() {
                b"outline" => push_outline(&mut doc, &e, &reader)?,
                b"opml" => seen_root = true,
                _ => {}
            },
            Event::Text(t) if in_head_title => {
                doc.title.push_str(&t.unescape()?);
            }
            Event::End(e) => {
                open_elements = open_elements.saturating_sub(1);
                match e.name().as_ref() {
                    b"outline" => outline_depth = outline_depth.saturating_sub(1),
                    b"title" => in_head_title = false,
                    _ => {}
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !seen_root {
        return Err(OpmlError::NotOpml);
    }
    if open_elements != 0 {
        return Err(OpmlError::XmlParse("unexpected end of document".to_string()));
    }

    Ok(doc)
}

fn decode(attr: &Attribute<'_>, reader: &Reader<&[u8]>) -> Result<String, OpmlError> {
    Ok(attr.decode_and_unescape_value(reader.decoder())?.into_owned())
}

fn attribute(
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
    key: &[u8],
) -> Result<Option<String>, OpmlError> {
    for attr in e.attributes() {
        let attr = attr.map_err(|e| OpmlError::XmlParse(e.to_string()))?;
        if attr.key.as_ref() == key {
            return decode(&attr, reader).map(Some);
        }
    }
    Ok(None)
}

/// Record `e` if it is a subscription (has `xmlUrl`).
fn push_outline(
    doc: &mut OpmlDocument,
    e: &BytesStart<'_>,
    reader: &Reader<&[u8]>,
) -> Result<(), OpmlError> {
    let mut title = String::new();
    let mut text = String::new();
    let mut xml_url = None;

    for attr in e.attributes() {
        let attr = attr.map_err(|e| OpmlError::XmlParse(e.to_string()))?;
        match attr.key.as_ref() {
            b"title" => title = decode(&attr, reader)?,
            b"text" => text = decode(&attr, reader)?,
            b"xmlUrl" => xml_url = Some(decode(&attr, reader)?),
            _ => {}
        }
    }

    if let Some(xml_url) = xml_url.filter(|u| !u.trim().is_empty()) {
        doc.outlines.push(OpmlOutline {
            title,
            text,
            xml_url: xml_url.trim().to_string(),
        });
    }
    Ok(())
}

/// Serialize `doc` as UTF-8 OPML.
pub fn write_opml(doc: &OpmlDocument) -> Result<Vec<u8>, OpmlError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut opml = BytesStart::new("opml");
    opml.push_attribute(("version", doc.version.as_str()));
    writer.write_event(Event::Start(opml))?;

    writer.write_event(Event::Start(BytesStart::new("head")))?;
    writer.write_event(Event::Start(BytesStart::new("title")))?;
    writer.write_event(Event::Text(BytesText::new(&doc.title)))?;
    writer.write_event(Event::End(BytesEnd::new("title")))?;
    writer.write_event(Event::End(BytesEnd::new("head")))?;

    writer.write_event(Event::Start(BytesStart::new("body")))?;
    for outline in &doc.outlines {
        let mut e = BytesStart::new("outline");
        e.push_attribute(("title", outline.title.as_str()));
        e.push_attribute(("text", outline.text.as_str()));
        e.push_attribute(("xmlUrl", outline.xml_url.as_str()));
        writer.write_event(Event::Empty(e))?;
    }
    writer.write_event(Event::End(BytesEnd::new("body")))?;
    writer.write_event(Event::End(BytesEnd::new("opml")))?;

    Ok(writer.into_inner())
}
