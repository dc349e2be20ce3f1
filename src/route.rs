//! The Extracted Route Sequence: the parser's sole output artifact.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The flight-rules regime in force at a [`RouteElement`].
///
/// Only these four regimes are ever stored: `GAT` and `IFPSTART` are
/// `BREAK_END` sub-kinds, not distinct rules — closing a break with
/// either one resolves the regime to `IFR` (see SPEC_FULL.md §9, open
/// question 2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rules {
    Ifr,
    Vfr,
    Oat,
    Ifps,
}

impl fmt::Display for Rules {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Rules::Ifr => "IFR",
            Rules::Vfr => "VFR",
            Rules::Oat => "OAT",
            Rules::Ifps => "IFPS",
        };
        write!(f, "{s}")
    }
}

/// A source span, half-open `[start, end)` byte offsets into the
/// original Field 15 string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

/// One row of the Extracted Route Sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteElement {
    point_name: String,
    rules: Rules,
    speed: String,
    level: String,
    break_text: Option<String>,
    span: Span,
}

impl RouteElement {
    pub(crate) fn new(point_name: impl Into<String>, rules: Rules, speed: &str, level: &str, span: Span) -> Self {
        RouteElement {
            point_name: point_name.into(),
            rules,
            speed: speed.to_string(),
            level: level.to_string(),
            break_text: None,
            span,
        }
    }

    pub(crate) fn sentinel(point_name: &str, rules: Rules, span: Span) -> Self {
        RouteElement {
            point_name: point_name.to_string(),
            rules,
            speed: String::new(),
            level: String::new(),
            break_text: None,
            span,
        }
    }

    pub fn point_name(&self) -> &str {
        &self.point_name
    }

    pub fn rules(&self) -> Rules {
        self.rules
    }

    pub fn speed(&self) -> &str {
        &self.speed
    }

    pub fn level(&self) -> &str {
        &self.level
    }

    pub fn break_text(&self) -> Option<&str> {
        self.break_text.as_deref()
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub(crate) fn set_rules(&mut self, rules: Rules) {
        self.rules = rules;
    }

    pub(crate) fn set_speed_level(&mut self, speed: &str, level: &str) {
        self.speed = speed.to_string();
        self.level = level.to_string();
    }

    /// Append `text` to this element's break-text buffer, space-joined
    /// with whatever is already there.
    pub(crate) fn push_break_text(&mut self, text: &str) {
        match &mut self.break_text {
            Some(existing) => {
                existing.push(' ');
                existing.push_str(text);
            }
            None => self.break_text = Some(text.to_string()),
        }
    }
}

impl fmt::Display for RouteElement {
    /// `POINT_NAME RULES SPEED LEVEL [BREAK_TEXT]`; the sentinel
    /// `ADEP`/`ADES` elements print as `POINT_NAME RULES` with no
    /// speed/level.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.speed.is_empty() && self.level.is_empty() {
            write!(f, "{} {}", self.point_name, self.rules)
        } else {
            write!(f, "{} {} {} {}", self.point_name, self.rules, self.speed, self.level)?;
            if let Some(text) = &self.break_text {
                write!(f, " {text}")?;
            }
            Ok(())
        }
    }
}

/// A diagnostic: a human-readable message plus the source span of the
/// offending token (or a synthesized position for whole-field errors).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    message: String,
    span: Span,
}

impl Diagnostic {
    pub(crate) fn new(message: impl Into<String>, span: Span) -> Self {
        Diagnostic {
            message: message.into(),
            span,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn span(&self) -> Span {
        self.span
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// The parser's sole output: an append-only ordered list of
/// [`RouteElement`]s bracketed by synthetic `ADEP`/`ADES` sentinels, plus
/// an append-only ordered list of [`Diagnostic`]s.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractedRouteSequence {
    elements: Vec<RouteElement>,
    errors: Vec<Diagnostic>,
}

impl ExtractedRouteSequence {
    /// A fresh ERS with just the `ADEP`/`ADES` sentinels, both defaulted
    /// to IFR until the parser overwrites them.
    pub(crate) fn new() -> Self {
        ExtractedRouteSequence {
            elements: vec![
                RouteElement::sentinel("ADEP", Rules::Ifr, Span { start: 0, end: 0 }),
                RouteElement::sentinel("ADES", Rules::Ifr, Span { start: 0, end: 0 }),
            ],
            errors: Vec::new(),
        }
    }

    /// Append a RouteElement immediately before the trailing ADES
    /// sentinel.
    pub(crate) fn append_element(&mut self, element: RouteElement) {
        let ades_index = self.elements.len() - 1;
        self.elements.insert(ades_index, element);
    }

    pub(crate) fn append_error(&mut self, message: impl Into<String>, span: Span) {
        self.errors.push(Diagnostic::new(message, span));
    }

    pub(crate) fn adep_mut(&mut self) -> &mut RouteElement {
        self.elements.first_mut().expect("ADEP sentinel always present")
    }

    pub(crate) fn ades_mut(&mut self) -> &mut RouteElement {
        self.elements.last_mut().expect("ADES sentinel always present")
    }

    pub(crate) fn element_mut(&mut self, index: usize) -> &mut RouteElement {
        &mut self.elements[index]
    }

    pub(crate) fn len_including_sentinels(&self) -> usize {
        self.elements.len()
    }

    pub fn elements(&self) -> &[RouteElement] {
        &self.elements
    }

    pub fn first_element(&self) -> &RouteElement {
        &self.elements[0]
    }

    pub fn element_at(&self, index: usize) -> Option<&RouteElement> {
        self.elements.get(index)
    }

    pub fn last_element(&self) -> &RouteElement {
        self.elements.last().expect("ADES sentinel always present")
    }

    pub fn number_of_elements(&self) -> usize {
        self.elements.len()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn number_of_errors(&self) -> usize {
        self.errors.len()
    }
}

impl fmt::Display for ExtractedRouteSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for element in &self.elements {
            writeln!(f, "{element}")?;
        }
        for error in &self.errors {
            writeln!(f, "ERROR: {error}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ers_brackets_adep_ades() {
        let ers = ExtractedRouteSequence::new();
        assert_eq!(ers.number_of_elements(), 2);
        assert_eq!(ers.first_element().point_name(), "ADEP");
        assert_eq!(ers.last_element().point_name(), "ADES");
        assert_eq!(format!("{}", ers.first_element()), "ADEP IFR");
    }

    #[test]
    fn append_element_lands_before_ades() {
        let mut ers = ExtractedRouteSequence::new();
        ers.append_element(RouteElement::new(
            "PNT",
            Rules::Ifr,
            "N0450",
            "F350",
            Span { start: 0, end: 3 },
        ));
        assert_eq!(ers.number_of_elements(), 3);
        assert_eq!(ers.element_at(1).unwrap().point_name(), "PNT");
        assert_eq!(ers.last_element().point_name(), "ADES");
        assert_eq!(format!("{}", ers.element_at(1).unwrap()), "PNT IFR N0450 F350");
    }

    #[test]
    fn break_text_accumulates_space_joined() {
        let mut element = RouteElement::new("VFR", Rules::Vfr, "N0450", "F050", Span { start: 0, end: 3 });
        element.push_break_text("THIS");
        element.push_break_text("IS");
        element.push_break_text("TEXT");
        assert_eq!(element.break_text(), Some("THIS IS TEXT"));
        assert_eq!(format!("{element}"), "VFR VFR N0450 F050 THIS IS TEXT");
    }
}
