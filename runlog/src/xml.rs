//! Minimal namespace-aware XML document tree for activity exports.

use quick_xml::events::{BytesStart, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::reader::NsReader;

use crate::{Format, RunlogError};

/// One parsed element: local name, resolved namespace URI, attributes in
/// document order, trimmed character data and child elements.
#[derive(Clone, Debug, Default)]
pub(crate) struct Element {
    pub(crate) name: String,
    pub(crate) namespace: Option<String>,
    pub(crate) attributes: Vec<(String, String)>,
    pub(crate) text: String,
    pub(crate) children: Vec<Element>,
}

fn malformed(format: Format, detail: String) -> RunlogError {
    RunlogError::MalformedDocument { format, detail }
}

/// Parse a whole document in one pass and return its root element.
pub(crate) fn parse_document(xml: &str, format: Format) -> Result<Element, RunlogError> {
    let mut reader = NsReader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        let (resolve, event) = reader
            .read_resolved_event()
            .map_err(|e| malformed(format, e.to_string()))?;
        match event {
            Event::Start(start) => {
                stack.push(element_from_start(format, &resolve, &start)?);
            }
            Event::Empty(start) => {
                let element = element_from_start(format, &resolve, &start)?;
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| malformed(format, "closing tag without opener".to_string()))?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                if let Some(open) = stack.last_mut() {
                    let unescaped = text.unescape().map_err(|e| malformed(format, e.to_string()))?;
                    open.text.push_str(unescaped.trim());
                }
            }
            Event::CData(data) => {
                if let Some(open) = stack.last_mut() {
                    let bytes = data.into_inner();
                    open.text.push_str(String::from_utf8_lossy(&bytes).trim());
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(malformed(format, "unexpected end of document".to_string()));
    }
    root.ok_or_else(|| malformed(format, "no root element".to_string()))
}

fn element_from_start(
    format: Format,
    resolve: &ResolveResult,
    start: &BytesStart,
) -> Result<Element, RunlogError> {
    let name = String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
    let namespace = match resolve {
        ResolveResult::Bound(Namespace(uri)) => Some(String::from_utf8_lossy(uri).into_owned()),
        _ => None,
    };
    let mut attributes = Vec::new();
    for attr in start.attributes() {
        let attr = attr.map_err(|e| malformed(format, e.to_string()))?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr
            .unescape_value()
            .map_err(|e| malformed(format, e.to_string()))?
            .into_owned();
        attributes.push((key, value));
    }
    Ok(Element {
        name,
        namespace,
        attributes,
        text: String::new(),
        children: Vec::new(),
    })
}

fn attach(stack: &mut Vec<Element>, root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

impl Element {
    // Namespace gate for lookups: an unqualified element always matches, a
    // qualified one must live in one of the format's namespaces.
    fn in_table(&self, format: Format) -> bool {
        match self.namespace.as_deref() {
            Some(uri) => format.namespaces().contains(&uri),
            None => true,
        }
    }

    fn content(&self) -> Option<&str> {
        if self.text.is_empty() {
            None
        } else {
            Some(self.text.as_str())
        }
    }

    pub(crate) fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub(crate) fn attr_f64(&self, format: Format, name: &str) -> Result<Option<f64>, RunlogError> {
        parse_real(format, name, self.attr(name))
    }

    /// First match for a `/`-separated path of direct-child hops, in
    /// document order.
    pub(crate) fn find(&self, format: Format, path: &str) -> Option<&Element> {
        let mut layer: Vec<&Element> = vec![self];
        for segment in path.split('/') {
            let mut next = Vec::new();
            for element in layer {
                next.extend(
                    element
                        .children
                        .iter()
                        .filter(|c| c.in_table(format) && c.name == segment),
                );
            }
            if next.is_empty() {
                return None;
            }
            layer = next;
        }
        layer.into_iter().next()
    }

    /// First matching descendant anywhere below this element, preorder.
    pub(crate) fn find_descendant(&self, format: Format, name: &str) -> Option<&Element> {
        for child in &self.children {
            if child.in_table(format) && child.name == name {
                return Some(child);
            }
            if let Some(found) = child.find_descendant(format, name) {
                return Some(found);
            }
        }
        None
    }

    pub(crate) fn find_all_descendants(&self, format: Format, name: &str) -> Vec<&Element> {
        let mut out = Vec::new();
        self.collect_descendants(format, name, &mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, format: Format, name: &str, out: &mut Vec<&'a Element>) {
        for child in &self.children {
            if child.in_table(format) && child.name == name {
                out.push(child);
            }
            child.collect_descendants(format, name, out);
        }
    }

    pub(crate) fn children_named(&self, format: Format, name: &str) -> Vec<&Element> {
        self.children
            .iter()
            .filter(|c| c.in_table(format) && c.name == name)
            .collect()
    }

    pub(crate) fn find_text(&self, format: Format, path: &str) -> Option<&str> {
        self.find(format, path).and_then(Element::content)
    }

    pub(crate) fn find_f64(&self, format: Format, path: &str) -> Result<Option<f64>, RunlogError> {
        parse_real(format, path, self.find_text(format, path))
    }

    pub(crate) fn descendant_text(&self, format: Format, name: &str) -> Option<&str> {
        self.find_descendant(format, name).and_then(Element::content)
    }

    pub(crate) fn descendant_f64(
        &self,
        format: Format,
        name: &str,
    ) -> Result<Option<f64>, RunlogError> {
        parse_real(format, name, self.descendant_text(format, name))
    }
}

// A missing value is Ok(None); a present value that does not read as a real
// is a malformed document, never a silent default.
fn parse_real(format: Format, name: &str, value: Option<&str>) -> Result<Option<f64>, RunlogError> {
    match value {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<f64>().map(Some).map_err(|_| {
            malformed(
                format,
                format!("element {:?} has non-numeric value {:?}", name, raw),
            )
        }),
    }
}
