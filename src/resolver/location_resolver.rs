//! Maps human-supplied locality names to provider locations.
//!
//! Resolution runs in two passes. The exact-name pass asks the catalog for each
//! target by name. Targets still without a match then fall back to a scan of the
//! whole country catalog, matching on the words of the target.
//!
//! The scan reads the catalog to its end (or the page cap) so that every
//! ambiguous match is kept and the `(target, id)` pairs do not depend on catalog
//! order. Stopping once every target has a match is available through
//! [`CatalogScope::stop_when_all_matched`], at the cost of that guarantee.

use crate::pagination::reader::{Cursor, PageRequest, ResourceReader};
use crate::resolver::resolution::Resolution;
use crate::transport::backend::HttpBackend;
use crate::transport::retry::ResourceKind;
use crate::transport::throttled::ThrottledTransport;
use crate::types::location::Location;
use crate::types::raw::RawLocation;
use futures_util::{pin_mut, StreamExt};
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashSet};

const LOCATIONS_ENDPOINT: &str = "locations";

/// The slice of the catalog a resolver searches.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogScope {
    /// ISO 3166-1 alpha-2 code sent as `iso` and compared against each entry.
    pub country_code: String,
    /// Numeric provider country id, sent as `countries_id` when present.
    pub country_id: Option<i64>,
    pub page_size: usize,
    /// Upper bound on pages read per catalog query.
    pub max_catalog_pages: u32,
    /// End the fallback scan after the first page on which every target has a
    /// match. Later matches are then missed and the result depends on catalog order.
    pub stop_when_all_matched: bool,
}

impl CatalogScope {
    fn country_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("iso".to_string(), self.country_code.clone())];
        if let Some(id) = self.country_id {
            params.push(("countries_id".to_string(), id.to_string()));
        }
        params
    }

    fn matches_country(&self, raw: &RawLocation) -> bool {
        raw.country_code()
            .is_some_and(|code| code.eq_ignore_ascii_case(&self.country_code))
    }
}

pub struct LocationResolver<'a, B> {
    reader: ResourceReader<'a, B>,
    scope: CatalogScope,
}

/// Accepted locations per target plus the `(id, target)` pairs already taken.
#[derive(Default)]
struct Accepted {
    by_target: BTreeMap<String, Vec<Location>>,
    pairs: HashSet<(i64, String)>,
}

impl Accepted {
    fn accept(&mut self, raw: &RawLocation, target: &str) -> bool {
        if !self.pairs.insert((raw.id, target.to_string())) {
            return false;
        }
        self.by_target
            .entry(target.to_string())
            .or_default()
            .push(Location::from_raw(raw, target));
        true
    }

    fn has_match(&self, target: &str) -> bool {
        self.by_target.get(target).is_some_and(|l| !l.is_empty())
    }

    fn ids(&self) -> HashSet<i64> {
        self.pairs.iter().map(|(id, _)| *id).collect()
    }
}

impl<'a, B: HttpBackend> LocationResolver<'a, B> {
    pub fn new(transport: &'a ThrottledTransport<B>, scope: CatalogScope) -> Self {
        Self {
            reader: ResourceReader::new(transport),
            scope,
        }
    }

    /// Resolves `targets` against the catalog.
    ///
    /// Blank and repeated targets are ignored. A target whose lookup fails is
    /// treated like one that found nothing. Resolving the same targets against an
    /// unchanged catalog yields the same `(target, id)` pairs.
    pub async fn resolve<S: AsRef<str>>(&self, targets: &[S]) -> Resolution {
        let targets = normalize_targets(targets);
        let mut accepted = Accepted::default();

        for target in &targets {
            let found = self.exact_name_pass(target, &mut accepted).await;
            info!("Exact-name pass for '{}': {} location(s)", target, found);
        }

        let pending: Vec<&String> = targets.iter().filter(|t| !accepted.has_match(t)).collect();
        if !pending.is_empty() {
            info!(
                "Scanning catalog for {} unresolved target(s): {:?}",
                pending.len(),
                pending
            );
            self.catalog_scan(&targets, &pending, &mut accepted).await;
        }

        let unresolved: Vec<String> = targets
            .iter()
            .filter(|t| !accepted.has_match(t))
            .cloned()
            .collect();
        for target in &unresolved {
            warn!("No location found for '{}'", target);
        }

        Resolution {
            matches: accepted.by_target,
            unresolved,
        }
    }

    async fn exact_name_pass(&self, target: &str, accepted: &mut Accepted) -> usize {
        let mut params = vec![("name".to_string(), target.to_string())];
        params.extend(self.scope.country_params());
        let request = self.catalog_request(params);

        let pages = self.reader.read_all::<RawLocation>(request);
        pin_mut!(pages);
        let mut found = 0;
        while let Some(page) = pages.next().await {
            match page {
                Ok(page) => {
                    for raw in page.results.iter().filter(|r| self.scope.matches_country(r)) {
                        if accepted.accept(raw, target) {
                            found += 1;
                        }
                    }
                }
                Err(e) => {
                    warn!("Name lookup for '{}' failed: {}", target, e);
                    break;
                }
            }
        }
        found
    }

    async fn catalog_scan(&self, targets: &[String], pending: &[&String], accepted: &mut Accepted) {
        let tokens: Vec<(&String, Vec<String>)> = pending
            .iter()
            .map(|target| (*target, match_tokens(target)))
            .collect();
        for (target, words) in &tokens {
            if words.is_empty() {
                debug!("'{}' has no words long enough to scan for", target);
            }
        }
        let exact_ids = accepted.ids();

        let request = self.catalog_request(self.scope.country_params());
        let pages = self.reader.read_all::<RawLocation>(request);
        pin_mut!(pages);
        let mut scanned = 0usize;
        while let Some(page) = pages.next().await {
            let page = match page {
                Ok(page) => page,
                Err(e) => {
                    warn!("Catalog scan stopped after {} locations: {}", scanned, e);
                    break;
                }
            };
            scanned += page.raw_len;

            for raw in &page.results {
                if exact_ids.contains(&raw.id) || !self.scope.matches_country(raw) {
                    continue;
                }
                let Some(name) = raw.name.as_deref() else {
                    continue;
                };
                let name = name.to_lowercase();
                for (target, words) in &tokens {
                    if words.iter().any(|w| name.contains(w.as_str())) && accepted.accept(raw, target) {
                        debug!("'{}' matched '{}' ({})", target, name, raw.id);
                    }
                }
            }

            if self.scope.stop_when_all_matched && targets.iter().all(|t| accepted.has_match(t)) {
                debug!("Every target matched after {} scanned locations", scanned);
                break;
            }
        }
        info!("Catalog scan read {} locations", scanned);
    }

    fn catalog_request(&self, params: Vec<(String, String)>) -> PageRequest {
        PageRequest::builder()
            .kind(ResourceKind::Locations)
            .endpoint(LOCATIONS_ENDPOINT)
            .params(params)
            .cursor(Cursor::Offset)
            .limit(self.scope.page_size)
            .max_pages(self.scope.max_catalog_pages)
            .build()
    }
}

/// Trims, drops blanks and repeats, keeping first-seen order.
fn normalize_targets<S: AsRef<str>>(targets: &[S]) -> Vec<String> {
    let mut seen = HashSet::new();
    targets
        .iter()
        .map(|t| t.as_ref().trim().to_string())
        .filter(|t| !t.is_empty() && seen.insert(t.clone()))
        .collect()
}

/// Lowercased words of a target longer than two characters.
fn match_tokens(target: &str) -> Vec<String> {
    target
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}
