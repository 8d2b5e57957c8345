//! Filter-set aggregate: DSL execution and document rendering.
//!
//! A [`FilterSet`] owns the ordered filter collection and the declared label
//! list, runs rule-definition blocks against a short-lived [`Delegate`], and
//! renders the collection into the two wire formats: the Atom feed Gmail's
//! filter importer consumes, and the pretty-printed structured JSON document
//! for the JSON import path.

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use thiserror::Error;

use crate::document::{LabelEntry, StructuredDocument};
use crate::filter::{Filter, FilterError, MailFilter};
use crate::logging::{default_sink, LogSink};
use crate::xml;

const DEFAULT_ME: &str = "me";
const DEFAULT_AUTHOR_NAME: &str = "Andreas Fuchs";
const DEFAULT_AUTHOR_EMAIL: &str = "asf@boinkor.net";

const FEED_TITLE: &str = "Mail Filters";
const FEED_ID: &str = "tag:mail.google.com,2008:filters:";
const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
const APPS_NS: &str = "http://schemas.google.com/apps/2006";

/// Errors that can occur while rendering a filter set.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to render filter: {0}")]
    Filter(#[from] FilterError),

    #[error("Failed to encode structured document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for render operations.
pub type Result<T> = std::result::Result<T, RenderError>;

/// Author of the feed document (name and email in the Atom header).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    /// Author display name.
    pub name: String,
    /// Author email address.
    pub email: String,
}

impl Default for Author {
    fn default() -> Self {
        Self {
            name: DEFAULT_AUTHOR_NAME.to_string(),
            email: DEFAULT_AUTHOR_EMAIL.to_string(),
        }
    }
}

/// Configures and constructs a [`FilterSet`].
///
/// Every field is optional; construction never fails. Author sub-fields
/// default independently, so setting only the name keeps the default email.
#[derive(Default)]
pub struct FilterSetBuilder {
    me: Option<String>,
    author_name: Option<String>,
    author_email: Option<String>,
    sink: Option<Arc<dyn LogSink>>,
}

impl FilterSetBuilder {
    /// Sets the identity string for the rule-set owner's own address(es).
    pub fn me(mut self, me: impl Into<String>) -> Self {
        self.me = Some(me.into());
        self
    }

    /// Sets the feed author's name.
    pub fn author_name(mut self, name: impl Into<String>) -> Self {
        self.author_name = Some(name.into());
        self
    }

    /// Sets the feed author's email.
    pub fn author_email(mut self, email: impl Into<String>) -> Self {
        self.author_email = Some(email.into());
        self
    }

    /// Injects the diagnostic sink. Defaults to the `tracing`-backed sink.
    pub fn logger(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Builds the filter set, filling in documented defaults.
    pub fn build(self) -> FilterSet {
        FilterSet {
            filters: Vec::new(),
            labels: Vec::new(),
            me: self.me.unwrap_or_else(|| DEFAULT_ME.to_string()),
            author: Author {
                name: self
                    .author_name
                    .unwrap_or_else(|| DEFAULT_AUTHOR_NAME.to_string()),
                email: self
                    .author_email
                    .unwrap_or_else(|| DEFAULT_AUTHOR_EMAIL.to_string()),
            },
            sink: self.sink.unwrap_or_else(default_sink),
        }
    }
}

/// The rule-set aggregate: filters, labels, and both serialization paths.
pub struct FilterSet {
    filters: Vec<Box<dyn Filter>>,
    labels: Vec<String>,
    me: String,
    author: Author,
    sink: Arc<dyn LogSink>,
}

impl FilterSet {
    /// Creates a filter set with all defaults.
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Returns a builder for custom configuration.
    pub fn builder() -> FilterSetBuilder {
        FilterSetBuilder::default()
    }

    /// Runs a rule-definition block against a fresh [`Delegate`].
    ///
    /// The block may declare filters and labels any number of times, with
    /// arbitrary control flow. Filters append in call order; calling `rules`
    /// again appends further filters rather than resetting.
    pub fn rules<F>(&mut self, block: F)
    where
        F: FnOnce(&mut Delegate),
    {
        let mut delegate = Delegate { set: self };
        block(&mut delegate);
    }

    /// Filters in declaration order.
    pub fn filters(&self) -> &[Box<dyn Filter>] {
        &self.filters
    }

    /// The declared label list (before merging filter-derived labels).
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// The rule-set owner's identity string.
    pub fn me(&self) -> &str {
        &self.me
    }

    /// The feed author.
    pub fn author(&self) -> &Author {
        &self.author
    }

    /// Renders the Atom feed document for Gmail's filter importer.
    ///
    /// The `updated` element carries the render-time UTC timestamp, so two
    /// renders are not byte-identical; everything else is deterministic.
    pub fn render_feed(&self) -> Result<String> {
        let mut out = String::from("<?xml version='1.0' encoding='utf-8'?>\n");
        out.push_str(&format!(
            "<feed xmlns='{ATOM_NS}' xmlns:apps='{APPS_NS}'>\n"
        ));
        xml::text_element(&mut out, "  ", "title", FEED_TITLE);
        xml::text_element(&mut out, "  ", "id", FEED_ID);
        xml::text_element(
            &mut out,
            "  ",
            "updated",
            &Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        out.push_str("  <author>\n");
        xml::text_element(&mut out, "    ", "name", &self.author.name);
        xml::text_element(&mut out, "    ", "email", &self.author.email);
        out.push_str("  </author>\n");
        for filter in &self.filters {
            out.push_str(&filter.to_xml()?);
        }
        out.push_str("</feed>\n");
        Ok(out)
    }

    /// Renders the pretty-printed structured JSON document.
    ///
    /// The label list is the union of the declared labels and every filter
    /// record's `actions.labels`, deduplicated and sorted; it is recomputed
    /// on every call so it always reflects the current filter collection.
    /// The document's author is a fixed placeholder by design; the JSON
    /// import path fills in its own author.
    pub fn render_structured(&self) -> Result<String> {
        let mut labels = self.labels.clone();
        let mut rules = Vec::with_capacity(self.filters.len());

        for filter in &self.filters {
            let record = filter.to_record()?;
            if let Some(derived) = record.pointer("/actions/labels").and_then(Value::as_array) {
                labels.extend(
                    derived
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string),
                );
            }
            rules.push(record);
        }

        labels.sort();
        labels.dedup();

        let mut doc = StructuredDocument::new();
        if !labels.is_empty() {
            doc.labels = Some(labels.into_iter().map(LabelEntry::from).collect());
        }
        if !rules.is_empty() {
            doc.rules = Some(rules);
        }
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Appends a finished filter and emits diagnostics.
    fn register(&mut self, filter: MailFilter) {
        if filter.has_no_conditions() {
            self.sink.warn(&format!(
                "filter {} has no conditions and will match all mail",
                filter.id_millis()
            ));
        }
        self.filters.push(Box::new(filter));
        self.sink
            .debug(&format!("registered filter ({} total)", self.filters.len()));
    }
}

impl Default for FilterSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Execution context handed to a rule-definition block.
///
/// Holds a mutable borrow of the owning [`FilterSet`] for exactly the
/// duration of one [`FilterSet::rules`] call, so it cannot outlive the call
/// that created it.
pub struct Delegate<'a> {
    set: &'a mut FilterSet,
}

impl Delegate<'_> {
    /// Builds and registers a new filter, returning a handle for chaining.
    pub fn filter<F>(&mut self, build: F) -> FilterRef<'_>
    where
        F: FnOnce(&mut MailFilter),
    {
        let mut filter = MailFilter::new(self.set.me.clone());
        build(&mut filter);
        let snapshot = filter.clone();
        self.set.register(filter);
        FilterRef {
            set: &mut *self.set,
            filter: snapshot,
        }
    }

    /// Declares the label list, replacing any earlier declaration verbatim.
    pub fn labels<I, S>(&mut self, labels: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set.labels = labels.into_iter().map(Into::into).collect();
    }

    /// The rule-set owner's identity string.
    pub fn me(&self) -> &str {
        &self.set.me
    }
}

/// Handle to the most recently registered filter, used to chain follow-up
/// filters off its conditions.
pub struct FilterRef<'a> {
    set: &'a mut FilterSet,
    filter: MailFilter,
}

impl<'a> FilterRef<'a> {
    /// Registers a new filter that matches only mail the previous filter in
    /// the chain did *not* match: the previous filter's positive conditions
    /// are negated into the new filter's query.
    pub fn otherwise<F>(self, build: F) -> FilterRef<'a>
    where
        F: FnOnce(&mut MailFilter),
    {
        let mut filter = MailFilter::new(self.set.me.clone());
        if let Some(query) = self.filter.conjunction_query() {
            filter.negate_atom(query);
        }
        build(&mut filter);
        let snapshot = filter.clone();
        self.set.register(filter);
        FilterRef {
            set: self.set,
            filter: snapshot,
        }
    }

    /// Registers a new filter inheriting the previous filter's conditions,
    /// typically to apply further actions to the same mail.
    pub fn also<F>(self, build: F) -> FilterRef<'a>
    where
        F: FnOnce(&mut MailFilter),
    {
        let mut filter = MailFilter::new(self.set.me.clone());
        filter.inherit_conditions(&self.filter);
        build(&mut filter);
        let snapshot = filter.clone();
        self.set.register(filter);
        FilterRef {
            set: self.set,
            filter: snapshot,
        }
    }
}
