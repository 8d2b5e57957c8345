//! Filter capability trait and the concrete mail-filter builder.
//!
//! A filter set stores its rules behind the [`Filter`] trait so that the
//! serialization paths stay independent of any one filter kind: the feed
//! render consumes the XML fragment, the structured render consumes an opaque
//! JSON record and only peeks at `actions.labels` for the label merge.
//!
//! [`MailFilter`] is the filter kind the DSL builds: a set of Gmail search
//! conditions plus the actions to apply to matching mail.

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::xml;

/// Errors that can occur while rendering a single filter.
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Failed to encode filter record: {0}")]
    Record(#[from] serde_json::Error),
}

/// Result type for filter rendering.
pub type Result<T> = std::result::Result<T, FilterError>;

/// One mail-handling rule, renderable into both output formats.
pub trait Filter {
    /// Renders the Atom `<entry>` fragment embedded in the feed document.
    ///
    /// The fragment is indented for embedding one level below the feed root.
    fn to_xml(&self) -> Result<String>;

    /// Returns the structured record for the JSON document.
    ///
    /// The shape is polymorphic across filter kinds; the only field the
    /// filter set interprets is `actions.labels`, which feeds the merged
    /// label list.
    fn to_record(&self) -> Result<Value>;
}

/// Search conditions of a mail filter.
#[derive(Debug, Clone, Default)]
struct Conditions {
    from: Vec<String>,
    to: Vec<String>,
    cc: Vec<String>,
    lists: Vec<String>,
    subject: Option<String>,
    has: Vec<String>,
    has_not: Vec<String>,
    has_attachment: bool,
}

impl Conditions {
    fn is_empty(&self) -> bool {
        self.from.is_empty()
            && self.to.is_empty()
            && self.cc.is_empty()
            && self.lists.is_empty()
            && self.subject.is_none()
            && self.has.is_empty()
            && self.has_not.is_empty()
            && !self.has_attachment
    }

    /// Query atoms that have no dedicated property in either output format.
    ///
    /// `cc:` and `list:` only exist as search operators, so they travel in
    /// the full-text query alongside explicit `has` terms.
    fn query_atoms(&self) -> Vec<String> {
        let mut atoms = self.has.clone();
        if let Some(cc) = or_group("cc", &self.cc) {
            atoms.push(cc);
        }
        if let Some(list) = or_group("list", &self.lists) {
            atoms.push(list);
        }
        atoms
    }

    /// Every positive condition as a self-contained query atom, used when a
    /// chained filter needs to negate this filter's match.
    fn positive_atoms(&self) -> Vec<String> {
        let mut atoms = Vec::new();
        if let Some(from) = or_group("from", &self.from) {
            atoms.push(from);
        }
        if let Some(to) = or_group("to", &self.to) {
            atoms.push(to);
        }
        if let Some(subject) = &self.subject {
            atoms.push(format!("subject:({subject})"));
        }
        atoms.extend(self.query_atoms());
        if self.has_attachment {
            atoms.push("has:attachment".to_string());
        }
        atoms
    }
}

/// `field:(a OR b)`, or `None` when no values are set.
fn or_group(field: &str, values: &[String]) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        Some(format!("{field}:({})", values.join(" OR ")))
    }
}

/// Space-joins values for properties that carry their own OR semantics.
fn join_or(values: &[String]) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        Some(values.join(" OR "))
    }
}

fn join_space(values: &[String]) -> Option<String> {
    if values.is_empty() {
        None
    } else {
        Some(values.join(" "))
    }
}

/// Actions a mail filter applies to matching mail.
#[derive(Debug, Clone, Default)]
struct Actions {
    labels: Vec<String>,
    archive: bool,
    mark_read: bool,
    star: bool,
    mark_important: bool,
    never_mark_important: bool,
    never_spam: bool,
    delete: bool,
    forward_to: Option<String>,
}

impl Actions {
    fn is_empty(&self) -> bool {
        self.labels.is_empty()
            && !self.archive
            && !self.mark_read
            && !self.star
            && !self.mark_important
            && !self.never_mark_important
            && !self.never_spam
            && !self.delete
            && self.forward_to.is_none()
    }
}

/// Condition block of the structured record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ConditionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    negated_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    has_attachment: Option<bool>,
}

/// Action block of the structured record.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionRecord {
    #[serde(skip_serializing_if = "Option::is_none")]
    labels: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    archive: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mark_read: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    star: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    mark_important: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    never_mark_important: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    no_spam: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    delete: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    forward: Option<String>,
}

fn flag(value: bool) -> Option<bool> {
    if value {
        Some(true)
    } else {
        None
    }
}

/// The concrete filter kind built by the DSL.
///
/// Condition methods accumulate (address fields OR-combine, `has` terms
/// AND-combine); action methods switch behaviors on. All methods return
/// `&mut Self` so a definition block can chain calls.
#[derive(Debug, Clone)]
pub struct MailFilter {
    me: String,
    id_millis: i64,
    conditions: Conditions,
    actions: Actions,
}

impl MailFilter {
    /// Creates an empty filter bound to the rule-set owner's identity.
    ///
    /// The entry id is tagged with the creation time in milliseconds, the
    /// same scheme Gmail's own filter exports use.
    pub(crate) fn new(me: String) -> Self {
        Self {
            me,
            id_millis: Utc::now().timestamp_millis(),
            conditions: Conditions::default(),
            actions: Actions::default(),
        }
    }

    /// The rule-set owner's identity string, for use in condition values.
    pub fn me(&self) -> &str {
        &self.me
    }

    // --- Conditions ---

    /// Matches mail from this sender. Repeated calls OR-combine.
    pub fn from(&mut self, address: impl Into<String>) -> &mut Self {
        self.conditions.from.push(address.into());
        self
    }

    /// Matches mail addressed to this recipient. Repeated calls OR-combine.
    pub fn to(&mut self, address: impl Into<String>) -> &mut Self {
        self.conditions.to.push(address.into());
        self
    }

    /// Matches mail cc'd to this recipient. Repeated calls OR-combine.
    pub fn cc(&mut self, address: impl Into<String>) -> &mut Self {
        self.conditions.cc.push(address.into());
        self
    }

    /// Matches mail sent through this mailing list. Repeated calls
    /// OR-combine.
    pub fn list(&mut self, list: impl Into<String>) -> &mut Self {
        self.conditions.lists.push(list.into());
        self
    }

    /// Matches mail with this subject. A second call replaces the first.
    pub fn subject(&mut self, subject: impl Into<String>) -> &mut Self {
        self.conditions.subject = Some(subject.into());
        self
    }

    /// Matches mail containing this query term. Repeated calls AND-combine.
    pub fn has(&mut self, term: impl Into<String>) -> &mut Self {
        self.conditions.has.push(term.into());
        self
    }

    /// Matches mail *not* containing this query term.
    pub fn has_not(&mut self, term: impl Into<String>) -> &mut Self {
        self.conditions.has_not.push(term.into());
        self
    }

    /// Matches mail carrying an attachment.
    pub fn has_attachment(&mut self) -> &mut Self {
        self.conditions.has_attachment = true;
        self
    }

    // --- Actions ---

    /// Applies a label to matching mail.
    pub fn label(&mut self, name: impl Into<String>) -> &mut Self {
        self.actions.labels.push(name.into());
        self
    }

    /// Archives matching mail (skips the inbox).
    pub fn archive(&mut self) -> &mut Self {
        self.actions.archive = true;
        self
    }

    /// Marks matching mail as read.
    pub fn mark_read(&mut self) -> &mut Self {
        self.actions.mark_read = true;
        self
    }

    /// Stars matching mail.
    pub fn star(&mut self) -> &mut Self {
        self.actions.star = true;
        self
    }

    /// Always marks matching mail as important.
    pub fn mark_important(&mut self) -> &mut Self {
        self.actions.mark_important = true;
        self
    }

    /// Never marks matching mail as important.
    pub fn never_mark_important(&mut self) -> &mut Self {
        self.actions.never_mark_important = true;
        self
    }

    /// Exempts matching mail from the spam folder.
    pub fn never_spam(&mut self) -> &mut Self {
        self.actions.never_spam = true;
        self
    }

    /// Deletes matching mail.
    pub fn delete(&mut self) -> &mut Self {
        self.actions.delete = true;
        self
    }

    /// Forwards matching mail to this address.
    pub fn forward_to(&mut self, address: impl Into<String>) -> &mut Self {
        self.actions.forward_to = Some(address.into());
        self
    }

    // --- Introspection used by the filter set ---

    /// True when the filter has no conditions at all (it would match every
    /// message).
    pub(crate) fn has_no_conditions(&self) -> bool {
        self.conditions.is_empty()
    }

    pub(crate) fn id_millis(&self) -> i64 {
        self.id_millis
    }

    /// All positive conditions as one query string, parenthesized when the
    /// filter has more than one, for negation by a chained filter.
    pub(crate) fn conjunction_query(&self) -> Option<String> {
        let atoms = self.conditions.positive_atoms();
        match atoms.as_slice() {
            [] => None,
            [one] => Some(one.clone()),
            many => Some(format!("({})", many.join(" "))),
        }
    }

    /// Adds an already-composed negated query atom (chaining support).
    pub(crate) fn negate_atom(&mut self, atom: String) {
        self.conditions.has_not.push(atom);
    }

    /// Copies another filter's conditions into this one (chaining support).
    ///
    /// Address-ish fields extend; the subject is inherited only when this
    /// filter has not set its own.
    pub(crate) fn inherit_conditions(&mut self, other: &MailFilter) {
        let theirs = &other.conditions;
        self.conditions.from.extend(theirs.from.iter().cloned());
        self.conditions.to.extend(theirs.to.iter().cloned());
        self.conditions.cc.extend(theirs.cc.iter().cloned());
        self.conditions.lists.extend(theirs.lists.iter().cloned());
        if self.conditions.subject.is_none() {
            self.conditions.subject = theirs.subject.clone();
        }
        self.conditions.has.extend(theirs.has.iter().cloned());
        self.conditions.has_not.extend(theirs.has_not.iter().cloned());
        self.conditions.has_attachment |= theirs.has_attachment;
    }

    fn condition_record(&self) -> Option<ConditionRecord> {
        if self.conditions.is_empty() {
            return None;
        }
        Some(ConditionRecord {
            from: join_or(&self.conditions.from),
            to: join_or(&self.conditions.to),
            subject: self.conditions.subject.clone(),
            query: join_space(&self.conditions.query_atoms()),
            negated_query: join_space(&self.conditions.has_not),
            has_attachment: flag(self.conditions.has_attachment),
        })
    }

    fn action_record(&self) -> Option<ActionRecord> {
        if self.actions.is_empty() {
            return None;
        }
        Some(ActionRecord {
            labels: if self.actions.labels.is_empty() {
                None
            } else {
                Some(self.actions.labels.clone())
            },
            archive: flag(self.actions.archive),
            mark_read: flag(self.actions.mark_read),
            star: flag(self.actions.star),
            mark_important: flag(self.actions.mark_important),
            never_mark_important: flag(self.actions.never_mark_important),
            no_spam: flag(self.actions.never_spam),
            delete: flag(self.actions.delete),
            forward: self.actions.forward_to.clone(),
        })
    }
}

impl Filter for MailFilter {
    fn to_xml(&self) -> Result<String> {
        let mut out = String::new();
        out.push_str("  <entry>\n");
        out.push_str("    <category term='filter'/>\n");
        xml::text_element(&mut out, "    ", "title", "Mail Filter");
        xml::text_element(
            &mut out,
            "    ",
            "id",
            &format!("tag:mail.google.com,2008:filter:{}", self.id_millis),
        );
        xml::text_element(
            &mut out,
            "    ",
            "updated",
            &Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        );
        out.push_str("    <content/>\n");

        let indent = "    ";
        if let Some(from) = join_or(&self.conditions.from) {
            xml::apps_property(&mut out, indent, "from", &from);
        }
        if let Some(to) = join_or(&self.conditions.to) {
            xml::apps_property(&mut out, indent, "to", &to);
        }
        if let Some(subject) = &self.conditions.subject {
            xml::apps_property(&mut out, indent, "subject", subject);
        }
        if let Some(query) = join_space(&self.conditions.query_atoms()) {
            xml::apps_property(&mut out, indent, "hasTheWord", &query);
        }
        if let Some(negated) = join_space(&self.conditions.has_not) {
            xml::apps_property(&mut out, indent, "doesNotHaveTheWord", &negated);
        }
        if self.conditions.has_attachment {
            xml::apps_property(&mut out, indent, "hasAttachment", "true");
        }

        for label in &self.actions.labels {
            xml::apps_property(&mut out, indent, "label", label);
        }
        if self.actions.archive {
            xml::apps_property(&mut out, indent, "shouldArchive", "true");
        }
        if self.actions.mark_read {
            xml::apps_property(&mut out, indent, "shouldMarkAsRead", "true");
        }
        if self.actions.star {
            xml::apps_property(&mut out, indent, "shouldStar", "true");
        }
        if self.actions.mark_important {
            xml::apps_property(&mut out, indent, "shouldAlwaysMarkAsImportant", "true");
        }
        if self.actions.never_mark_important {
            xml::apps_property(&mut out, indent, "shouldNeverMarkAsImportant", "true");
        }
        if self.actions.never_spam {
            xml::apps_property(&mut out, indent, "shouldNeverSpam", "true");
        }
        if self.actions.delete {
            xml::apps_property(&mut out, indent, "shouldTrash", "true");
        }
        if let Some(forward) = &self.actions.forward_to {
            xml::apps_property(&mut out, indent, "forwardTo", forward);
        }

        out.push_str("  </entry>\n");
        Ok(out)
    }

    fn to_record(&self) -> Result<Value> {
        let mut record = serde_json::Map::new();
        if let Some(conditions) = self.condition_record() {
            record.insert("conditions".to_string(), serde_json::to_value(conditions)?);
        }
        if let Some(actions) = self.action_record() {
            record.insert("actions".to_string(), serde_json::to_value(actions)?);
        }
        Ok(Value::Object(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn filter() -> MailFilter {
        MailFilter::new("me".to_string())
    }

    #[test]
    fn xml_emits_gmail_property_names() {
        let mut f = filter();
        f.from("alerts@example.com")
            .subject("deploy finished")
            .label("ops")
            .archive()
            .mark_read();

        let xml = f.to_xml().unwrap();
        assert!(xml.contains("<category term='filter'/>"));
        assert!(xml.contains("<title>Mail Filter</title>"));
        assert!(xml.contains("<apps:property name='from' value='alerts@example.com'/>"));
        assert!(xml.contains("<apps:property name='subject' value='deploy finished'/>"));
        assert!(xml.contains("<apps:property name='label' value='ops'/>"));
        assert!(xml.contains("<apps:property name='shouldArchive' value='true'/>"));
        assert!(xml.contains("<apps:property name='shouldMarkAsRead' value='true'/>"));
        assert!(xml.contains(&format!(
            "<id>tag:mail.google.com,2008:filter:{}</id>",
            f.id_millis()
        )));
    }

    #[test]
    fn xml_escapes_condition_values() {
        let mut f = filter();
        f.subject("offers <50% & \"free\">");

        let xml = f.to_xml().unwrap();
        assert!(xml.contains("value='offers &lt;50% &amp; &quot;free&quot;&gt;'"));
    }

    #[test]
    fn repeated_from_calls_or_combine() {
        let mut f = filter();
        f.from("a@example.com").from("b@example.com");

        let xml = f.to_xml().unwrap();
        assert!(xml.contains("name='from' value='a@example.com OR b@example.com'"));

        let record = f.to_record().unwrap();
        assert_eq!(
            record["conditions"]["from"],
            "a@example.com OR b@example.com"
        );
    }

    #[test]
    fn cc_and_list_travel_in_the_query() {
        let mut f = filter();
        f.cc("team@example.com").list("dev@lists.example.com").has("urgent");

        let xml = f.to_xml().unwrap();
        assert!(xml.contains(
            "name='hasTheWord' value='urgent cc:(team@example.com) list:(dev@lists.example.com)'"
        ));

        let record = f.to_record().unwrap();
        assert_eq!(
            record["conditions"]["query"],
            "urgent cc:(team@example.com) list:(dev@lists.example.com)"
        );
    }

    #[test]
    fn record_omits_empty_blocks() {
        let mut only_actions = filter();
        only_actions.archive();
        let record = only_actions.to_record().unwrap();
        assert!(record.get("conditions").is_none());
        assert_eq!(record["actions"]["archive"], true);

        let mut only_conditions = filter();
        only_conditions.from("a@example.com");
        let record = only_conditions.to_record().unwrap();
        assert!(record.get("actions").is_none());

        let empty = filter();
        let record = empty.to_record().unwrap();
        assert_eq!(record, serde_json::json!({}));
    }

    #[test]
    fn record_uses_camel_case_action_keys() {
        let mut f = filter();
        f.from("hr@example.com")
            .label("hr")
            .mark_read()
            .never_mark_important()
            .never_spam()
            .forward_to("archive@example.com");

        let record = f.to_record().unwrap();
        let actions = &record["actions"];
        assert_eq!(actions["labels"], serde_json::json!(["hr"]));
        assert_eq!(actions["markRead"], true);
        assert_eq!(actions["neverMarkImportant"], true);
        assert_eq!(actions["noSpam"], true);
        assert_eq!(actions["forward"], "archive@example.com");
    }

    #[test]
    fn negated_terms_render_in_both_formats() {
        let mut f = filter();
        f.has("invoice").has_not("draft").delete();

        let xml = f.to_xml().unwrap();
        assert!(xml.contains("name='doesNotHaveTheWord' value='draft'"));
        assert!(xml.contains("name='shouldTrash' value='true'"));

        let record = f.to_record().unwrap();
        assert_eq!(record["conditions"]["negatedQuery"], "draft");
        assert_eq!(record["actions"]["delete"], true);
    }

    #[test]
    fn conjunction_query_parenthesizes_multiple_atoms() {
        let mut f = filter();
        assert_eq!(f.conjunction_query(), None);

        f.from("a@example.com");
        assert_eq!(f.conjunction_query().as_deref(), Some("from:(a@example.com)"));

        f.subject("report").has_attachment();
        assert_eq!(
            f.conjunction_query().as_deref(),
            Some("(from:(a@example.com) subject:(report) has:attachment)")
        );
    }

    #[test]
    fn inherit_conditions_extends_and_keeps_own_subject() {
        let mut base = filter();
        base.from("a@example.com").subject("weekly").has("report");

        let mut child = filter();
        child.subject("daily");
        child.inherit_conditions(&base);

        let record = child.to_record().unwrap();
        assert_eq!(record["conditions"]["from"], "a@example.com");
        assert_eq!(record["conditions"]["subject"], "daily");
        assert_eq!(record["conditions"]["query"], "report");
    }

    #[test]
    fn me_exposes_the_owner_identity() {
        let mut f = MailFilter::new("me@example.com".to_string());
        let me = f.me().to_string();
        f.to(me);

        let record = f.to_record().unwrap();
        assert_eq!(record["conditions"]["to"], "me@example.com");
    }

    #[test]
    fn has_no_conditions_accounts_for_every_field() {
        assert!(filter().has_no_conditions());

        let mut f = filter();
        f.has_not("noise");
        assert!(!f.has_no_conditions());

        let mut f = filter();
        f.has_attachment();
        assert!(!f.has_no_conditions());
    }
}
