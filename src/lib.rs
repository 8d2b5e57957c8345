//! filtersmith - a declarative builder for Gmail filter rule sets
//!
//! This crate compiles rule definitions written through a small closure-based
//! DSL into the two artifacts Gmail-style importers consume: an Atom/XML feed
//! document and a pretty-printed structured JSON document.
//!
//! ```
//! let mut set = filtersmith::FilterSet::new();
//! set.rules(|d| {
//!     d.labels(["mailing-lists"]);
//!     d.filter(|f| {
//!         f.list("dev@lists.example.com").label("dev").archive();
//!     });
//! });
//!
//! let feed = set.render_feed().unwrap();
//! let document = set.render_structured().unwrap();
//! assert!(feed.contains("<title>Mail Filters</title>"));
//! assert!(document.contains("\"version\": \"v1alpha3\""));
//! ```

pub mod document;
pub mod filter;
pub mod filterset;
pub mod logging;
mod xml;

pub use filter::{Filter, FilterError, MailFilter};
pub use filterset::{Author, Delegate, FilterRef, FilterSet, FilterSetBuilder, RenderError};
pub use logging::{LogSink, TracingSink};

/// Builds a filter set with default options and runs one definition block.
///
/// Convenience for the common case; use [`FilterSet::builder`] when the
/// author, identity, or logging sink needs configuring.
pub fn rules<F>(block: F) -> FilterSet
where
    F: FnOnce(&mut Delegate),
{
    let mut set = FilterSet::new();
    set.rules(block);
    set
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_level_rules_builds_a_populated_set() {
        let set = rules(|d| {
            d.filter(|f| {
                f.from("a@example.com").archive();
            });
        });

        assert_eq!(set.filters().len(), 1);
        assert_eq!(set.me(), "me");
    }
}
