use scraper::{ElementRef, Html};
use textlens_core::document::{ElementTree, NodeId};
use textlens_core::traits::MarkupParser;

/// HTML parser backed by `scraper` (html5ever).
///
/// The parsed DOM is converted into an owned [`ElementTree`] so documents are
/// `Send` and independent of the parser. Childless elements such as `img`
/// keep their serialized markup.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlParser;

impl HtmlParser {
    pub fn new() -> Self {
        Self
    }
}

impl MarkupParser for HtmlParser {
    type Document = ElementTree;

    fn parse(&self, markup: &str) -> ElementTree {
        let html = Html::parse_document(markup);
        let tree = convert(html.root_element());
        tracing::debug!(elements = tree.len(), "Parsed HTML document");
        tree
    }
}

fn convert(root: ElementRef<'_>) -> ElementTree {
    let mut tree = ElementTree::new();
    let mut stack: Vec<(ElementRef<'_>, Option<NodeId>)> = vec![(root, None)];

    while let Some((element, parent)) = stack.pop() {
        let value = element.value();
        let attributes: Vec<(&str, &str)> = value.attrs().collect();
        let id = tree.push(parent, value.name(), &attributes);

        let children: Vec<ElementRef<'_>> =
            element.children().filter_map(ElementRef::wrap).collect();
        if children.is_empty() {
            tree.set_markup(id, element.html());
        }
        // Reversed so siblings are appended to `id` in document order.
        stack.extend(children.into_iter().rev().map(|child| (child, Some(id))));
    }
    tree
}
