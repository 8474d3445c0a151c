use log::debug;
use quick_xml::events::Event;
use quick_xml::name::ResolveResult;
use quick_xml::NsReader;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::geometric::heritage::HeritageSite;

/// W3C Basic Geo (WGS84 lat/long) vocabulary holding the `lat` and `long` elements
pub const GEO_NAMESPACE: &str = "http://www.w3.org/2003/01/geo/wgs84_pos#";

/// Fatal errors raised while reading a GeoRSS feed.
/// Per-item coordinate problems are not errors, see [`SkipReason`].
#[derive(Debug, Error)]
pub enum GeoRssError {
    #[error("failed to read GeoRSS file {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed GeoRSS XML near byte {position}")]
    Xml {
        position: usize,
        #[source]
        source: quick_xml::Error,
    },
    #[error("unexpected end of GeoRSS document")]
    UnexpectedEof,
    #[error("GeoRSS document has no root element")]
    NoRootElement,
    #[error("item {index} has no title element")]
    MissingTitle { index: usize },
}

/// Why a feed item was left out of the site list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// `lat` or `long` is absent or blank
    MissingCoordinates,
    /// `lat` or `long` is not a finite number
    InvalidCoordinates,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingCoordinates => f.write_str("Missing coordinates"),
            SkipReason::InvalidCoordinates => f.write_str("Invalid coordinates"),
        }
    }
}

/// A feed item dropped from the result set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSite {
    pub site_name: String,
    pub reason: SkipReason,
}

impl fmt::Display for SkippedSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} for {}, skipping...", self.reason, self.site_name)
    }
}

/// Result of reading one feed item
#[derive(Debug, Clone, PartialEq)]
pub enum ItemOutcome {
    Parsed(HeritageSite),
    Skipped(SkippedSite),
}

impl ItemOutcome {
    fn skipped(site_name: String, reason: SkipReason) -> Self {
        ItemOutcome::Skipped(SkippedSite { site_name, reason })
    }
}

/// Outcomes of every `item` in the feed, in document order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoRssReport {
    pub outcomes: Vec<ItemOutcome>,
}

impl GeoRssReport {
    /// Sites with valid coordinates
    pub fn sites(&self) -> impl Iterator<Item = &HeritageSite> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            ItemOutcome::Parsed(site) => Some(site),
            ItemOutcome::Skipped(_) => None,
        })
    }

    /// Items dropped because of missing or invalid coordinates
    pub fn skipped(&self) -> impl Iterator<Item = &SkippedSite> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            ItemOutcome::Skipped(skipped) => Some(skipped),
            ItemOutcome::Parsed(_) => None,
        })
    }

    pub fn into_sites(self) -> Vec<HeritageSite> {
        self.outcomes
            .into_iter()
            .filter_map(|outcome| match outcome {
                ItemOutcome::Parsed(site) => Some(site),
                ItemOutcome::Skipped(_) => None,
            })
            .collect()
    }
}

/// Read and parse a GeoRSS feed from disk
pub fn parse_georss(path: impl AsRef<Path>) -> Result<GeoRssReport, GeoRssError> {
    let path = path.as_ref();
    let xml = std::fs::read_to_string(path).map_err(|source| GeoRssError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let report = parse_georss_str(&xml)?;
    debug!(
        "Parsed {} GeoRSS items from {:?}",
        report.outcomes.len(),
        path
    );
    Ok(report)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NsKind {
    Unbound,
    Geo,
    Other,
}

fn classify(ns: &ResolveResult) -> NsKind {
    match ns {
        ResolveResult::Unbound => NsKind::Unbound,
        ResolveResult::Bound(ns) if ns.as_ref() == GEO_NAMESPACE.as_bytes() => NsKind::Geo,
        _ => NsKind::Other,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Lat,
    Long,
}

fn field_for(ns: NsKind, local: &[u8]) -> Option<Field> {
    match (ns, local) {
        (NsKind::Unbound, b"title") => Some(Field::Title),
        (NsKind::Geo, b"lat") => Some(Field::Lat),
        (NsKind::Geo, b"long") => Some(Field::Long),
        _ => None,
    }
}

/// Child values collected while inside an `item`; the first occurrence of each wins
#[derive(Debug, Default)]
struct PendingItem {
    title: Option<String>,
    lat: Option<String>,
    long: Option<String>,
}

impl PendingItem {
    fn slot(&mut self, field: Field) -> &mut Option<String> {
        match field {
            Field::Title => &mut self.title,
            Field::Lat => &mut self.lat,
            Field::Long => &mut self.long,
        }
    }
}

/// Parse GeoRSS feed content.
///
/// Every unqualified `item` element is read, wherever it sits in the document.
/// Its direct `title` child gives the site name and its direct `lat`/`long`
/// children in [`GEO_NAMESPACE`] give the coordinates. Items whose coordinates
/// are absent, blank or not numbers are reported as skipped; an item without
/// a `title` aborts the whole parse.
///
/// The title text is kept verbatim, surrounding whitespace included.
/// Coordinates are trimmed before parsing, and `NaN` or infinite values are
/// reported as [`SkipReason::InvalidCoordinates`] even though they parse as
/// `f64`: no map position can be drawn from them.
pub fn parse_georss_str(xml: &str) -> Result<GeoRssReport, GeoRssError> {
    let mut reader = NsReader::from_str(xml);

    let mut depth = 0usize;
    let mut seen_root = false;
    let mut item_count = 0usize;
    // (depth of the open item element, values collected so far)
    let mut item: Option<(usize, PendingItem)> = None;
    // (field being captured, depth of its element)
    let mut capture: Option<(Field, usize)> = None;
    let mut outcomes = Vec::new();

    loop {
        let position = reader.buffer_position();
        let (ns, event) = reader
            .read_resolved_event()
            .map_err(|source| GeoRssError::Xml { position, source })?;
        let ns = classify(&ns);

        match event {
            Event::Start(e) => {
                depth += 1;
                seen_root = true;
                let local = e.local_name();
                match item.as_mut() {
                    None => {
                        if ns == NsKind::Unbound && local.as_ref() == b"item" {
                            item_count += 1;
                            item = Some((depth, PendingItem::default()));
                        }
                    }
                    Some((item_depth, pending)) => {
                        if depth == *item_depth + 1 {
                            if let Some(field) = field_for(ns, local.as_ref()) {
                                let slot = pending.slot(field);
                                if slot.is_none() {
                                    *slot = Some(String::new());
                                    capture = Some((field, depth));
                                }
                            }
                        }
                    }
                }
            }
            Event::Empty(e) => {
                seen_root = true;
                let local = e.local_name();
                match item.as_mut() {
                    None => {
                        if ns == NsKind::Unbound && local.as_ref() == b"item" {
                            item_count += 1;
                            outcomes.push(finish_item(item_count, PendingItem::default())?);
                        }
                    }
                    Some((item_depth, pending)) => {
                        if depth == *item_depth {
                            if let Some(field) = field_for(ns, local.as_ref()) {
                                let slot = pending.slot(field);
                                if slot.is_none() {
                                    *slot = Some(String::new());
                                }
                            }
                        }
                    }
                }
            }
            Event::Text(t) => {
                if let (Some((field, capture_depth)), Some((_, pending))) =
                    (capture, item.as_mut())
                {
                    if capture_depth == depth {
                        let text = t.unescape().map_err(|source| GeoRssError::Xml {
                            position,
                            source,
                        })?;
                        if let Some(value) = pending.slot(field) {
                            value.push_str(&text);
                        }
                    }
                }
            }
            Event::CData(c) => {
                if let (Some((field, capture_depth)), Some((_, pending))) =
                    (capture, item.as_mut())
                {
                    if capture_depth == depth {
                        let bytes = c.into_inner();
                        if let Some(value) = pending.slot(field) {
                            value.push_str(&String::from_utf8_lossy(&bytes));
                        }
                    }
                }
            }
            Event::End(_) => {
                if matches!(capture, Some((_, capture_depth)) if capture_depth == depth) {
                    capture = None;
                }
                if matches!(item, Some((item_depth, _)) if item_depth == depth) {
                    if let Some((_, pending)) = item.take() {
                        outcomes.push(finish_item(item_count, pending)?);
                    }
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => {
                if depth != 0 {
                    return Err(GeoRssError::UnexpectedEof);
                }
                if !seen_root {
                    return Err(GeoRssError::NoRootElement);
                }
                break;
            }
            _ => {}
        }
    }

    Ok(GeoRssReport { outcomes })
}

fn finish_item(index: usize, item: PendingItem) -> Result<ItemOutcome, GeoRssError> {
    let site_name = item
        .title
        .ok_or(GeoRssError::MissingTitle { index })?;

    let lat = item.lat.as_deref().map(str::trim).unwrap_or_default();
    let long = item.long.as_deref().map(str::trim).unwrap_or_default();
    if lat.is_empty() || long.is_empty() {
        return Ok(ItemOutcome::skipped(
            site_name,
            SkipReason::MissingCoordinates,
        ));
    }

    match (parse_coordinate(lat), parse_coordinate(long)) {
        (Some(latitude), Some(longitude)) => Ok(ItemOutcome::Parsed(HeritageSite::new(
            site_name, latitude, longitude,
        ))),
        _ => Ok(ItemOutcome::skipped(
            site_name,
            SkipReason::InvalidCoordinates,
        )),
    }
}

fn parse_coordinate(text: &str) -> Option<f64> {
    text.parse::<f64>().ok().filter(|value| value.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn feed(items: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:geo="http://www.w3.org/2003/01/geo/wgs84_pos#">
  <channel>
    <title>World Heritage List</title>
    {}
  </channel>
</rss>"#,
            items
        )
    }

    #[test]
    fn test_parses_valid_item() {
        let xml = feed(
            r#"<item>
                 <title>Stonehenge, Avebury and Associated Sites</title>
                 <geo:lat>51.17889</geo:lat>
                 <geo:long>-1.82611</geo:long>
               </item>"#,
        );
        let report = parse_georss_str(&xml).unwrap();
        let sites: Vec<_> = report.sites().collect();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].site_name, "Stonehenge, Avebury and Associated Sites");
        assert_eq!(sites[0].latitude, 51.17889);
        assert_eq!(sites[0].longitude, -1.82611);
        assert_eq!(report.skipped().count(), 0);
    }

    #[test]
    fn test_coordinates_round_trip_exactly() {
        let lat = 53.123456789012345_f64;
        let long = -2.987654321098765_f64;
        let xml = feed(&format!(
            "<item><title>Site</title><geo:lat>{}</geo:lat><geo:long>{}</geo:long></item>",
            lat, long
        ));
        let sites = parse_georss_str(&xml).unwrap().into_sites();
        assert_eq!(sites[0].latitude, lat);
        assert_eq!(sites[0].longitude, long);
    }

    #[test]
    fn test_absent_coordinate_is_missing() {
        let xml = feed("<item><title>No Long</title><geo:lat>51.0</geo:lat></item>");
        let report = parse_georss_str(&xml).unwrap();
        assert_eq!(report.sites().count(), 0);
        let skipped: Vec<_> = report.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].site_name, "No Long");
        assert_eq!(skipped[0].reason, SkipReason::MissingCoordinates);
    }

    #[test]
    fn test_blank_coordinate_is_missing() {
        let xml = feed(
            r#"<item><title>Blank</title><geo:lat>   </geo:lat><geo:long>-1.0</geo:long></item>
               <item><title>Empty</title><geo:lat>51.0</geo:lat><geo:long/></item>"#,
        );
        let report = parse_georss_str(&xml).unwrap();
        let reasons: Vec<_> = report
            .skipped()
            .map(|s| (s.site_name.as_str(), s.reason))
            .collect();
        assert_eq!(
            reasons,
            vec![
                ("Blank", SkipReason::MissingCoordinates),
                ("Empty", SkipReason::MissingCoordinates),
            ]
        );
    }

    #[test]
    fn test_non_numeric_coordinate_is_invalid() {
        let xml = feed(
            "<item><title>Bad</title><geo:lat>51.5</geo:lat><geo:long>west</geo:long></item>",
        );
        let report = parse_georss_str(&xml).unwrap();
        let skipped: Vec<_> = report.skipped().collect();
        assert_eq!(skipped.len(), 1);
        assert_eq!(skipped[0].reason, SkipReason::InvalidCoordinates);
        assert_eq!(
            skipped[0].to_string(),
            "Invalid coordinates for Bad, skipping..."
        );
    }

    #[test]
    fn test_non_finite_coordinate_is_invalid() {
        let xml = feed(
            "<item><title>NaN Site</title><geo:lat>NaN</geo:lat><geo:long>inf</geo:long></item>",
        );
        let report = parse_georss_str(&xml).unwrap();
        assert_eq!(
            report.skipped().next().map(|s| s.reason),
            Some(SkipReason::InvalidCoordinates)
        );
    }

    #[test]
    fn test_missing_checked_before_invalid() {
        let xml = feed(
            "<item><title>Both</title><geo:lat></geo:lat><geo:long>abc</geo:long></item>",
        );
        let report = parse_georss_str(&xml).unwrap();
        assert_eq!(
            report.skipped().next().map(|s| s.reason),
            Some(SkipReason::MissingCoordinates)
        );
    }

    #[test]
    fn test_lat_long_outside_geo_namespace_are_ignored() {
        let xml = feed(
            r#"<item xmlns:other="http://example.com/other">
                 <title>Wrong Namespace</title>
                 <other:lat>51.0</other:lat>
                 <lat>51.0</lat>
                 <other:long>-1.0</other:long>
               </item>"#,
        );
        let report = parse_georss_str(&xml).unwrap();
        assert_eq!(
            report.skipped().next().map(|s| s.reason),
            Some(SkipReason::MissingCoordinates)
        );
    }

    #[test]
    fn test_any_prefix_bound_to_geo_namespace() {
        let xml = r#"<rss xmlns:ns0="http://www.w3.org/2003/01/geo/wgs84_pos#"><channel>
            <item><title>Prefixed</title><ns0:lat>55.9</ns0:lat><ns0:long>-3.19</ns0:long></item>
        </channel></rss>"#;
        let sites = parse_georss_str(xml).unwrap().into_sites();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].latitude, 55.9);
    }

    #[test]
    fn test_entities_and_cdata_in_title() {
        let xml = feed(
            r#"<item><title>Durham Castle &amp; Cathedral</title><geo:lat>54.77</geo:lat><geo:long>-1.57</geo:long></item>
               <item><title><![CDATA[Kew <Royal> Gardens]]></title><geo:lat>51.47</geo:lat><geo:long>-0.29</geo:long></item>"#,
        );
        let names: Vec<_> = parse_georss_str(&xml)
            .unwrap()
            .into_sites()
            .into_iter()
            .map(|s| s.site_name)
            .collect();
        assert_eq!(names, vec!["Durham Castle & Cathedral", "Kew <Royal> Gardens"]);
    }

    #[test]
    fn test_document_order_is_preserved() {
        let xml = feed(
            r#"<item><title>B</title><geo:lat>1</geo:lat><geo:long>1</geo:long></item>
               <item><title>A</title><geo:lat>2</geo:lat><geo:long>2</geo:long></item>
               <item><title>C</title><geo:lat>3</geo:lat><geo:long>3</geo:long></item>"#,
        );
        let names: Vec<_> = parse_georss_str(&xml)
            .unwrap()
            .into_sites()
            .into_iter()
            .map(|s| s.site_name)
            .collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[test]
    fn test_channel_title_is_not_a_site() {
        let xml = feed("");
        let report = parse_georss_str(&xml).unwrap();
        assert!(report.outcomes.is_empty());
    }

    // An item with no title aborts the parse instead of being skipped
    #[test]
    fn test_missing_title_is_fatal() {
        let xml = feed(
            r#"<item><title>Fine</title><geo:lat>1</geo:lat><geo:long>1</geo:long></item>
               <item><geo:lat>51.0</geo:lat><geo:long>-1.0</geo:long></item>"#,
        );
        match parse_georss_str(&xml) {
            Err(GeoRssError::MissingTitle { index }) => assert_eq!(index, 2),
            other => panic!("expected MissingTitle, got {:?}", other),
        }
    }

    #[test]
    fn test_title_whitespace_is_kept() {
        let xml = feed(
            "<item><title>  City of Bath  </title><geo:lat>51.38</geo:lat><geo:long>-2.36</geo:long></item>",
        );
        let sites = parse_georss_str(&xml).unwrap().into_sites();
        assert_eq!(sites[0].site_name, "  City of Bath  ");
    }

    #[test]
    fn test_empty_title_gives_empty_name() {
        let xml = feed("<item><title/><geo:lat>51.0</geo:lat><geo:long>-1.0</geo:long></item>");
        let sites = parse_georss_str(&xml).unwrap().into_sites();
        assert_eq!(sites[0].site_name, "");
    }

    #[test]
    fn test_malformed_xml_is_fatal() {
        let result = parse_georss_str("<rss><channel><item></channel></rss>");
        assert!(matches!(result, Err(GeoRssError::Xml { .. })));
    }

    #[test]
    fn test_truncated_document_is_fatal() {
        let result = parse_georss_str("<rss><channel><item><title>Cut</title>");
        assert!(matches!(
            result,
            Err(GeoRssError::UnexpectedEof) | Err(GeoRssError::Xml { .. })
        ));
    }

    #[test]
    fn test_empty_document_is_fatal() {
        assert!(matches!(
            parse_georss_str(""),
            Err(GeoRssError::NoRootElement)
        ));
    }

    #[test]
    fn test_three_item_feed() {
        let xml = feed(
            r#"<item><title>Canterbury Cathedral</title><geo:lat>51.2798</geo:lat><geo:long>1.0828</geo:long></item>
               <item><title>Giant's Causeway</title><geo:lat></geo:lat><geo:long>-6.5116</geo:long></item>
               <item><title>Blenheim Palace</title><geo:lat>51.8414</geo:lat><geo:long>not-a-number</geo:long></item>"#,
        );
        let report = parse_georss_str(&xml).unwrap();

        let sites: Vec<_> = report.sites().collect();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].site_name, "Canterbury Cathedral");

        let messages: Vec<_> = report.skipped().map(|s| s.to_string()).collect();
        assert_eq!(
            messages,
            vec![
                "Missing coordinates for Giant's Causeway, skipping...",
                "Invalid coordinates for Blenheim Palace, skipping...",
            ]
        );
    }

    #[test]
    fn test_parse_georss_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "{}",
            feed("<item><title>Bath</title><geo:lat>51.38</geo:lat><geo:long>-2.36</geo:long></item>")
        )
        .unwrap();
        let report = parse_georss(file.path()).unwrap();
        assert_eq!(report.sites().count(), 1);
    }

    #[test]
    fn test_parse_georss_missing_file() {
        let result = parse_georss("/nonexistent/whcgeorss-en.xml");
        assert!(matches!(result, Err(GeoRssError::Io { .. })));
    }
}
