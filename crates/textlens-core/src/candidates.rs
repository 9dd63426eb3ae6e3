//! Selects image candidates from a parsed page and computes their locators.

use std::collections::{HashMap, HashSet};

use url::Url;

use crate::cache::{CacheStore, Namespace};
use crate::document::{Document, NodeId};
use crate::models::Candidate;

/// Locator returned when an element's position cannot be computed.
pub const LOCATOR_ERROR: &str = "xpath_error";

const IMAGE_TAG: &str = "img";
/// Responsive-image group whose `img` children are addressed by ordinal.
const GROUP_TAG: &str = "picture";
/// Guards against malformed trees whose parent links loop.
const MAX_DEPTH: usize = 4096;

/// Extracts [`Candidate`]s from documents, caching the result per page URL.
#[derive(Debug, Clone, Default)]
pub struct CandidateExtractor {
    cache: Option<CacheStore>,
}

impl CandidateExtractor {
    pub fn new() -> Self {
        Self { cache: None }
    }

    pub fn with_cache(cache: CacheStore) -> Self {
        Self { cache: Some(cache) }
    }

    /// Candidates for `page_url`, from the cache when a fresh list exists.
    pub fn extract_candidates<D: Document + ?Sized>(
        &self,
        page_url: &str,
        document: &D,
    ) -> Vec<Candidate> {
        if let Some(cache) = &self.cache {
            if let Some(cached) =
                cache.get_json::<Vec<Candidate>>(Namespace::CandidateList, page_url)
            {
                tracing::info!(
                    url = %page_url,
                    count = cached.len(),
                    "Using cached candidate list"
                );
                return cached;
            }
        }

        let candidates = select_candidates(page_url, document);
        tracing::info!(url = %page_url, count = candidates.len(), "Extracted image candidates");

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.put_json(Namespace::CandidateList, page_url, &candidates) {
                tracing::warn!(url = %page_url, error = %e, "Failed to cache candidate list");
            }
        }
        candidates
    }
}

/// Walks every `img` in document order and builds candidates.
///
/// Inside a `picture` group, an `img` whose raw `src` repeats one already kept
/// from the same group is dropped. Images without a usable `src` are skipped.
pub fn select_candidates<D: Document + ?Sized>(page_url: &str, document: &D) -> Vec<Candidate> {
    let mut group_sources: HashMap<NodeId, HashSet<String>> = HashMap::new();
    let mut candidates = Vec::new();

    for node in document.elements_by_tag(IMAGE_TAG) {
        let src = document.attribute(node, "src").unwrap_or_default();

        if let Some(group) = document.parent(node).filter(|p| is_group(document, *p)) {
            if !group_sources.entry(group).or_default().insert(src.to_string()) {
                tracing::debug!(%src, "Skipping duplicate source in picture group");
                continue;
            }
        }

        if src.trim().is_empty() {
            tracing::warn!(url = %page_url, node, "Image has no src attribute, skipping");
            continue;
        }

        let Some(absolute_url) = resolve_url(page_url, src.trim()) else {
            tracing::warn!(url = %page_url, %src, "Could not resolve image URL, skipping");
            continue;
        };

        candidates.push(Candidate {
            source_page_url: page_url.to_string(),
            raw_markup: document.markup(node).unwrap_or_default(),
            absolute_url,
            alt_text: document.attribute(node, "alt").unwrap_or_default().to_string(),
            locator: structural_locator(document, node),
        });
    }

    candidates
}

/// Resolves a possibly relative reference against the page URL.
pub fn resolve_url(base: &str, reference: &str) -> Option<String> {
    let resolved = match Url::parse(base) {
        Ok(base) => base.join(reference),
        Err(_) => Url::parse(reference),
    };
    resolved.ok().map(|u| u.to_string())
}

/// Path-like locator for an element, e.g. `/html/body/div[2]/img`.
///
/// Each ancestor contributes its tag name, suffixed with a 1-based index when
/// its parent has several children with that tag. An `img` directly inside a
/// `picture` is addressed through the group instead: `.../picture/img[2]`.
/// Returns [`LOCATOR_ERROR`] if the tree cannot be walked.
pub fn structural_locator<D: Document + ?Sized>(document: &D, node: NodeId) -> String {
    match try_locator(document, node) {
        Some(locator) => locator,
        None => {
            tracing::error!(node, "Failed to compute structural locator");
            LOCATOR_ERROR.to_string()
        }
    }
}

fn try_locator<D: Document + ?Sized>(document: &D, node: NodeId) -> Option<String> {
    let is_grouped_image = document.tag_name(node)? == IMAGE_TAG
        && document
            .parent(node)
            .is_some_and(|p| is_group(document, p));

    let mut components = Vec::new();
    let mut current = Some(node);
    let mut depth = 0;

    while let Some(id) = current {
        depth += 1;
        if depth > MAX_DEPTH {
            return None;
        }

        let tag = document.tag_name(id)?;
        let parent = document.parent(id);

        if id == node && is_grouped_image {
            // Emitted by the group level below.
        } else if is_grouped_image && Some(id) == document.parent(node) {
            let images = document.children(id, Some(IMAGE_TAG));
            let ordinal = images.iter().position(|c| *c == node)? + 1;
            let group = sibling_component(document, id, tag, parent)?;
            components.push(format!("{group}/{IMAGE_TAG}[{ordinal}]"));
        } else {
            components.push(sibling_component(document, id, tag, parent)?);
        }

        current = parent;
    }

    components.reverse();
    Some(format!("/{}", components.join("/")))
}

fn sibling_component<D: Document + ?Sized>(
    document: &D,
    id: NodeId,
    tag: &str,
    parent: Option<NodeId>,
) -> Option<String> {
    let siblings = match parent {
        Some(p) => document.children(p, Some(tag)),
        None => return Some(tag.to_string()),
    };
    if siblings.len() > 1 {
        let index = siblings.iter().position(|s| *s == id)? + 1;
        Some(format!("{tag}[{index}]"))
    } else if siblings.contains(&id) {
        Some(tag.to_string())
    } else {
        None
    }
}

fn is_group<D: Document + ?Sized>(document: &D, node: NodeId) -> bool {
    document.tag_name(node) == Some(GROUP_TAG)
}
