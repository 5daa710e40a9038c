//! Owned element tree for structured tool output

use std::str::FromStr;

use crate::backend::Error;

/// XML element with its text and child elements
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Element {
    /// Tag name
    pub name: String,
    /// Trimmed text content, empty if none
    pub text: String,
    /// Child elements, in document order
    pub children: Vec<Element>,
}

impl FromStr for Element {
    type Err = roxmltree::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let doc = roxmltree::Document::parse(s.trim())?;
        Ok(Self::from_node(doc.root_element()))
    }
}

impl Element {
    /// Convert a parsed node and its descendants
    fn from_node(node: roxmltree::Node<'_, '_>) -> Self {
        Self {
            name: node.tag_name().name().to_owned(),
            text: node.text().map(str::trim).unwrap_or_default().to_owned(),
            children: node
                .children()
                .filter(roxmltree::Node::is_element)
                .map(Self::from_node)
                .collect(),
        }
    }

    /// First child element with a given name
    pub(crate) fn find(&self, name: &str) -> Option<&Self> {
        self.children.iter().find(|c| c.name == name)
    }

    /// Container child element, which must be present
    pub(crate) fn section(&self, name: &'static str) -> Result<&Self, Error> {
        self.find(name).ok_or(Error::MissingSection(name))
    }

    /// Text of a child element, which must be present
    pub(crate) fn field(&self, name: &str) -> Result<&str, Error> {
        self.find(name)
            .map(|c| c.text.as_str())
            .ok_or_else(|| self.invalid_field(name))
    }

    /// Parsed text of a child element
    pub(crate) fn parse_field<T: FromStr>(&self, name: &str) -> Result<T, Error> {
        self.field(name)?
            .parse()
            .map_err(|_| self.invalid_field(name))
    }

    /// Error for a missing or unparsable child
    fn invalid_field(&self, name: &str) -> Error {
        Error::InvalidField {
            record: self.name.clone(),
            field: name.to_owned(),
        }
    }
}
