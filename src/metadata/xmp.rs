//! XMP packet codec
//!
//! XMP is an RDF/XML packet wrapped in `<?xpacket?>` processing
//! instructions. The JP2 rewriter treats the packet as the unit of
//! exchange, so the store here is deliberately flat: an ordered list of
//! properties that can be parsed out of a packet and serialized back into
//! one, with no schema interpretation.

use crate::core::error::{MetaError, MetaResult};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::io::Cursor;

/// Well-known namespace prefixes emitted in serialized packets.
const KNOWN_NAMESPACES: &[(&str, &str)] = &[
    ("dc", "http://purl.org/dc/elements/1.1/"),
    ("xmp", "http://ns.adobe.com/xap/1.0/"),
    ("xmpMM", "http://ns.adobe.com/xap/1.0/mm/"),
    ("exif", "http://ns.adobe.com/exif/1.0/"),
    ("tiff", "http://ns.adobe.com/tiff/1.0/"),
    ("photoshop", "http://ns.adobe.com/photoshop/1.0/"),
];

/// Value of an XMP property.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XmpValue {
    Text(String),
    /// Items of an rdf:Bag, rdf:Seq or rdf:Alt container.
    Array(Vec<String>),
}

/// XMP metadata: an ordered list of `prefix:Name` properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmpStore {
    properties: Vec<(String, XmpValue)>,
}

impl XmpStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn clear(&mut self) {
        self.properties.clear();
    }

    /// Insert or replace a property, preserving first-set order.
    pub fn set(&mut self, name: impl Into<String>, value: XmpValue) {
        let name = name.into();
        match self.properties.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.properties.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&XmpValue> {
        self.properties
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn properties(&self) -> &[(String, XmpValue)] {
        &self.properties
    }

    /// Replace this store with the result of decoding a raw packet.
    ///
    /// Used when a packet arrives embedded in another stream (TIFF tag 700).
    pub fn set_packet_bytes(&mut self, bytes: &[u8]) -> MetaResult<()> {
        let packet = String::from_utf8_lossy(bytes);
        *self = XmpCodec::decode(&packet)?;
        Ok(())
    }
}

/// Codec between an XMP packet string and an [`XmpStore`].
pub struct XmpCodec;

impl XmpCodec {
    /// Parse a packet into a store.
    ///
    /// The `<?xpacket?>` wrapper and the `x:xmpmeta` envelope are optional;
    /// bare `rdf:RDF` content is accepted as well.
    pub fn decode(packet: &str) -> MetaResult<XmpStore> {
        let body = extract_packet_body(packet)?;

        let mut reader = Reader::from_reader(body.as_bytes());
        reader.config_mut().trim_text(true);

        let mut store = XmpStore::new();
        let mut buf = Vec::new();
        // One property is open at a time; arrays additionally collect li
        // items until their container closes.
        let mut current: Option<String> = None;
        let mut text = String::new();
        let mut array_items: Option<Vec<String>> = None;
        let mut in_li = false;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    match Self::classify(&e) {
                        ElementKind::Description => {
                            collect_description_attributes(&e, &mut store)?;
                        }
                        ElementKind::Container => {
                            if current.is_some() {
                                array_items = Some(Vec::new());
                            }
                        }
                        ElementKind::ListItem => in_li = true,
                        ElementKind::Envelope => {}
                        ElementKind::Property => {
                            if current.is_none() {
                                current = Some(name);
                                text.clear();
                                array_items = None;
                            }
                        }
                    }
                }
                Ok(Event::Empty(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    match Self::classify(&e) {
                        ElementKind::Description => {
                            collect_description_attributes(&e, &mut store)?;
                        }
                        // A self-closing property element is an empty value.
                        ElementKind::Property if current.is_none() => {
                            store.set(name, XmpValue::Text(String::new()));
                        }
                        _ => {}
                    }
                }
                Ok(Event::Text(e)) => {
                    let raw = String::from_utf8_lossy(e.as_ref()).to_string();
                    let value = unescape(&raw)
                        .map(|v| v.to_string())
                        .unwrap_or(raw);
                    if in_li {
                        if let Some(items) = array_items.as_mut() {
                            items.push(value);
                        }
                    } else if current.is_some() {
                        text.push_str(&value);
                    }
                }
                Ok(Event::End(e)) => {
                    let name = String::from_utf8_lossy(e.name().as_ref()).to_string();
                    if name == "rdf:li" {
                        in_li = false;
                    } else if Some(&name) == current.as_ref() {
                        let value = match array_items.take() {
                            Some(items) => XmpValue::Array(items),
                            None => XmpValue::Text(std::mem::take(&mut text)),
                        };
                        store.set(current.take().unwrap_or_default(), value);
                    }
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(_) => return Err(MetaError::CorruptedMetadata),
            }
            buf.clear();
        }
        Ok(store)
    }

    /// Serialize a store as a complete `<?xpacket?>`-wrapped packet.
    ///
    /// `decode` maps the result back to an equal store.
    pub fn encode(store: &XmpStore) -> MetaResult<String> {
        let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

        let mut meta_start = BytesStart::new("x:xmpmeta");
        meta_start.push_attribute(("xmlns:x", "adobe:ns:meta/"));
        writer.write_event(Event::Start(meta_start))?;

        let mut rdf_start = BytesStart::new("rdf:RDF");
        rdf_start.push_attribute(("xmlns:rdf", "http://www.w3.org/1999/02/22-rdf-syntax-ns#"));
        for prefix in used_prefixes(store) {
            let uri = KNOWN_NAMESPACES
                .iter()
                .find(|(p, _)| *p == prefix)
                .map(|(_, uri)| (*uri).to_string())
                .unwrap_or_else(|| format!("urn:jp2kit:ns:{prefix}"));
            rdf_start.push_attribute((format!("xmlns:{prefix}").as_str(), uri.as_str()));
        }
        writer.write_event(Event::Start(rdf_start))?;

        let mut desc_start = BytesStart::new("rdf:Description");
        desc_start.push_attribute(("rdf:about", ""));
        writer.write_event(Event::Start(desc_start))?;

        for (name, value) in store.properties() {
            match value {
                XmpValue::Text(text) => {
                    writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
                    writer.write_event(Event::Text(BytesText::new(text)))?;
                    writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
                }
                XmpValue::Array(items) => {
                    writer.write_event(Event::Start(BytesStart::new(name.as_str())))?;
                    writer.write_event(Event::Start(BytesStart::new("rdf:Bag")))?;
                    for item in items {
                        writer.write_event(Event::Start(BytesStart::new("rdf:li")))?;
                        writer.write_event(Event::Text(BytesText::new(item)))?;
                        writer.write_event(Event::End(BytesEnd::new("rdf:li")))?;
                    }
                    writer.write_event(Event::End(BytesEnd::new("rdf:Bag")))?;
                    writer.write_event(Event::End(BytesEnd::new(name.as_str())))?;
                }
            }
        }

        writer.write_event(Event::End(BytesEnd::new("rdf:Description")))?;
        writer.write_event(Event::End(BytesEnd::new("rdf:RDF")))?;
        writer.write_event(Event::End(BytesEnd::new("x:xmpmeta")))?;

        let body = String::from_utf8(writer.into_inner().into_inner())
            .map_err(|_| MetaError::CorruptedMetadata)?;
        Ok(format!(
            "<?xpacket begin=\"\u{FEFF}\" id=\"W5M0MpCehiHzreSzNTczkc9d\"?>\n{body}\n<?xpacket end=\"w\"?>"
        ))
    }

    fn classify(e: &BytesStart) -> ElementKind {
        match e.name().as_ref() {
            b"rdf:Description" => ElementKind::Description,
            b"rdf:Bag" | b"rdf:Seq" | b"rdf:Alt" => ElementKind::Container,
            b"rdf:li" => ElementKind::ListItem,
            b"x:xmpmeta" | b"rdf:RDF" => ElementKind::Envelope,
            _ => ElementKind::Property,
        }
    }
}

enum ElementKind {
    Description,
    Container,
    ListItem,
    Envelope,
    Property,
}

/// Extract the RDF body from between the `<?xpacket?>` instructions.
fn extract_packet_body(packet: &str) -> MetaResult<String> {
    let content = match packet.find("<?xpacket") {
        Some(start) => {
            let after_pi = match packet[start..].find("?>") {
                Some(end) => start + end + 2,
                None => return Err(MetaError::CorruptedMetadata),
            };
            match packet[after_pi..].find("<?xpacket end") {
                Some(close) => &packet[after_pi..after_pi + close],
                None => &packet[after_pi..],
            }
        }
        None => packet,
    };
    let trimmed = content.trim();
    if trimmed.is_empty() || !trimmed.starts_with('<') {
        return Err(MetaError::CorruptedMetadata);
    }
    Ok(trimmed.to_string())
}

/// Collect `rdf:Description` attributes as text properties.
fn collect_description_attributes(e: &BytesStart, store: &mut XmpStore) -> MetaResult<()> {
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_string();
        if key.starts_with("xmlns") || key == "rdf:about" {
            continue;
        }
        let value = attr
            .unescape_value()
            .map_err(|_| MetaError::CorruptedMetadata)?
            .to_string();
        store.set(key, XmpValue::Text(value));
    }
    Ok(())
}

/// Namespace prefixes referenced by the store's property names, in order of
/// first use.
fn used_prefixes(store: &XmpStore) -> Vec<String> {
    let mut prefixes = Vec::new();
    for (name, _) in store.properties() {
        if let Some((prefix, _)) = name.split_once(':') {
            if !prefixes.iter().any(|p| p == prefix) {
                prefixes.push(prefix.to_string());
            }
        }
    }
    prefixes
}
