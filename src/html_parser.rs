use std::io;

use html5ever::serialize::{serialize, SerializeOpts};
use html5ever::tendril::{StrTendril, TendrilSink};
use html5ever::{parse_document, Attribute, ParseOpts};
use markup5ever_rcdom::{Handle, NodeData, RcDom, SerializableHandle};
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::naming;
use crate::origin;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ResourceType {
    CSS,
    JavaScript,
    Image,
    Link,
}

/// A same-origin reference found in the page, already rewritten in the tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRef {
    /// Absolute URL to download, without fragment.
    pub url: Url,
    /// File name inside the resources directory.
    pub local_file_name: String,
    /// Relative path now stored in the element, `<resources dir>/<file name>`.
    pub local_path: String,
    pub resource_type: ResourceType,
    /// Which element/attribute pair pointed at the resource.
    pub tag: &'static str,
    pub attribute: &'static str,
    /// Attribute value as it appeared in the fetched markup.
    pub original_value: String,
}

/// A parsed page that can be rewritten and rendered back to markup.
pub struct HtmlPage {
    dom: RcDom,
}

impl HtmlPage {
    pub fn parse(html: &str) -> Self {
        let dom = parse_document(RcDom::default(), ParseOpts::default()).one(html);
        Self { dom }
    }

    pub fn to_html(&self) -> io::Result<String> {
        let mut out = Vec::new();
        let document: SerializableHandle = self.dom.document.clone().into();
        serialize(&mut out, &document, SerializeOpts::default())?;
        String::from_utf8(out).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    /// Element nodes in document order.
    fn elements(&self) -> Vec<Handle> {
        let mut found = Vec::new();
        let mut stack = vec![self.dom.document.clone()];

        while let Some(node) = stack.pop() {
            if matches!(node.data, NodeData::Element { .. }) {
                found.push(node.clone());
            }
            let children = node.children.borrow();
            stack.extend(children.iter().rev().cloned());
        }

        found
    }
}

/// Finds same-origin resources in a page and points them at the local copies.
#[derive(Clone)]
pub struct HtmlParser {
    base_url: Url,
    resources_dir_name: String,
    include_links: bool,
}

impl HtmlParser {
    pub fn new(base_url: Url, resources_dir_name: impl Into<String>) -> Self {
        Self {
            base_url,
            resources_dir_name: resources_dir_name.into(),
            include_links: false,
        }
    }

    /// Also collect `<a href>` targets on the page's origin.
    pub fn with_links(mut self, include_links: bool) -> Self {
        self.include_links = include_links;
        self
    }

    /// Walks the page in document order, rewriting every eligible attribute to
    /// `<resources dir>/<local name>` and returning one [`ResourceRef`] per
    /// rewritten element.
    pub fn extract_resources(&self, page: &mut HtmlPage) -> Vec<ResourceRef> {
        let mut resources = Vec::new();

        for element in page.elements() {
            let NodeData::Element { ref name, ref attrs, .. } = element.data else {
                continue;
            };

            let mut attrs = attrs.borrow_mut();
            let Some((resource_type, tag, attribute)) = self.classify(&name.local, &attrs) else {
                continue;
            };

            let Some(slot) = attrs.iter_mut().find(|a| &*a.name.local == attribute) else {
                continue;
            };
            let original_value = slot.value.to_string();

            let Some(resource) = self.create_resource_ref(&original_value, resource_type, tag, attribute)
            else {
                continue;
            };

            debug!(
                tag,
                from = %original_value,
                to = %resource.local_path,
                "rewriting reference"
            );
            slot.value = StrTendril::from_slice(&resource.local_path);
            resources.push(resource);
        }

        debug!(count = resources.len(), "local resources found");
        resources
    }

    fn classify(
        &self,
        local_name: &str,
        attrs: &[Attribute],
    ) -> Option<(ResourceType, &'static str, &'static str)> {
        match local_name {
            "img" => Some((ResourceType::Image, "img", "src")),
            "script" => Some((ResourceType::JavaScript, "script", "src")),
            "link" => {
                let is_stylesheet = attr_value(attrs, "rel")
                    .map(|rel| {
                        rel.split_ascii_whitespace()
                            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
                    })
                    .unwrap_or(false);
                is_stylesheet.then_some((ResourceType::CSS, "link", "href"))
            }
            "a" if self.include_links => Some((ResourceType::Link, "a", "href")),
            _ => None,
        }
    }

    fn create_resource_ref(
        &self,
        raw: &str,
        resource_type: ResourceType,
        tag: &'static str,
        attribute: &'static str,
    ) -> Option<ResourceRef> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || (resource_type == ResourceType::Link && trimmed.starts_with('#')) {
            return None;
        }

        let mut url = match self.base_url.join(trimmed) {
            Ok(url) => url,
            Err(e) => {
                debug!(reference = %raw, error = %e, "skipping unresolvable reference");
                return None;
            }
        };

        if !origin::is_same_origin(&url, &self.base_url) {
            debug!(%url, "skipping foreign reference");
            return None;
        }
        url.set_fragment(None);

        let local_file_name = naming::resource_file_name(&url);
        let local_path = format!("{}/{}", self.resources_dir_name, local_file_name);

        Some(ResourceRef {
            url,
            local_file_name,
            local_path,
            resource_type,
            tag,
            attribute,
            original_value: raw.to_string(),
        })
    }
}

fn attr_value<'a>(attrs: &'a [Attribute], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|a| &*a.name.local == name)
        .map(|a| &*a.value)
}
