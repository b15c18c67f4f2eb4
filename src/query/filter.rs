use crate::statement::{PlaceholderStyle, quote_identifier};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Comparison {
    Equal,
    GreaterThan,
    GreaterOrEqual,
    LowerThan,
    LowerOrEqual,
}

impl Comparison {
    pub fn symbol(&self) -> &'static str {
        match self {
            Comparison::Equal => "=",
            Comparison::GreaterThan => ">",
            Comparison::GreaterOrEqual => ">=",
            Comparison::LowerThan => "<",
            Comparison::LowerOrEqual => "<=",
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// `column <comparison> placeholder`, with a 1-based placeholder index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Predicate {
    pub column: String,
    pub comparison: Comparison,
    pub placeholder: usize,
}

/// A boolean tree of predicates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Filter {
    Predicate(Predicate),
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
}

impl Filter {
    pub fn predicate(column: impl Into<String>, comparison: Comparison, placeholder: usize) -> Self {
        Filter::Predicate(Predicate {
            column: column.into(),
            comparison,
            placeholder,
        })
    }

    pub fn and(self, other: Filter) -> Self {
        Filter::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: Filter) -> Self {
        Filter::Or(Box::new(self), Box::new(other))
    }

    /// Leaves in left-to-right order.
    pub fn predicates(&self) -> Vec<&Predicate> {
        let mut out = Vec::new();
        self.collect_predicates(&mut out);
        out
    }

    fn collect_predicates<'a>(&'a self, out: &mut Vec<&'a Predicate>) {
        match self {
            Filter::Predicate(predicate) => out.push(predicate),
            Filter::And(left, right) | Filter::Or(left, right) => {
                left.collect_predicates(out);
                right.collect_predicates(out);
            }
        }
    }

    /// Renders the tree with columns qualified by `table`.
    ///
    /// A nested OR under an AND (and vice versa) is parenthesized.
    pub fn render(&self, table: &str, style: PlaceholderStyle) -> String {
        match self {
            Filter::Predicate(p) => format!(
                "{}.{} {} {}",
                quote_identifier(table),
                quote_identifier(&p.column),
                p.comparison,
                style.placeholder(p.placeholder)
            ),
            Filter::And(left, right) => format!(
                "{} AND {}",
                left.render_operand(table, style, false),
                right.render_operand(table, style, false)
            ),
            Filter::Or(left, right) => format!(
                "{} OR {}",
                left.render_operand(table, style, true),
                right.render_operand(table, style, true)
            ),
        }
    }

    fn render_operand(&self, table: &str, style: PlaceholderStyle, parent_is_or: bool) -> String {
        let needs_parens = match self {
            Filter::Predicate(_) => false,
            Filter::And(..) => parent_is_or,
            Filter::Or(..) => !parent_is_or,
        };
        let rendered = self.render(table, style);
        if needs_parens { format!("({})", rendered) } else { rendered }
    }
}
