use super::filter::{Comparison, Filter};
use super::{Operator, OrderBy, Pagination, QueryParameters, QueryValue};
use crate::core::{RequestError, Result, Value};
use crate::schema::{ColumnDefinition, TableSchema};
use tracing::{Level, event};

/// Filter tree, bound parameters, ordering and window for one query.
///
/// `parameters[i]` binds placeholder `i + 1`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct TranslatedQuery {
    pub filter: Option<Filter>,
    pub parameters: Vec<Value>,
    pub order: Vec<OrderBy>,
    pub page: Option<Pagination>,
}

pub fn translate(
    params: &QueryParameters,
    schema: &TableSchema,
    max_page_size: Option<u64>,
) -> Result<TranslatedQuery> {
    if params.is_empty() {
        return Err(RequestError::query(
            "Could not extract values for Query Parameters",
        ));
    }

    let mut builder = FilterBuilder::default();
    for column in &schema.columns {
        let Some(value) = params.get(&column.name) else {
            continue;
        };
        if !value.is_filter() {
            continue;
        }
        let leaf = builder.leaf(column, value)?;
        builder.and(leaf);
    }

    let mut order = Vec::new();
    let mut page = None;
    for (name, value) in params.iter() {
        match value {
            QueryValue::OrderBy(direction) => {
                if schema.column(name).is_some() {
                    order.push(OrderBy {
                        column: name.to_string(),
                        direction: *direction,
                    });
                } else {
                    event!(Level::DEBUG, column = name, table = %schema.table_name, "ordering on unknown column skipped");
                }
            }
            QueryValue::Page { limit, offset } => {
                if let Some(max) = max_page_size {
                    if *limit > max {
                        return Err(RequestError::query(format!(
                            "Requested page size {} exceeds the maximum of {}",
                            limit, max
                        )));
                    }
                }
                page = Some(Pagination {
                    limit: *limit,
                    offset: *offset,
                });
            }
            _ => {}
        }
    }

    if builder.filter.is_none() && order.is_empty() && page.is_none() {
        return Err(RequestError::query(
            "Query parameters found but none usable",
        ));
    }

    Ok(TranslatedQuery {
        filter: builder.filter,
        parameters: builder.parameters,
        order,
        page,
    })
}

/// Builds only the filter part, for statements that cannot order or page.
pub fn translate_filter(params: &QueryParameters, schema: &TableSchema) -> Result<(Filter, Vec<Value>)> {
    let translated = translate(params, schema, None)?;
    match translated.filter {
        Some(filter) => Ok((filter, translated.parameters)),
        None => Err(RequestError::query(
            "Query parameters contain no filter for any column",
        )),
    }
}

#[derive(Default)]
struct FilterBuilder {
    filter: Option<Filter>,
    parameters: Vec<Value>,
}

impl FilterBuilder {
    fn and(&mut self, leaf: Filter) {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(leaf),
            None => leaf,
        });
    }

    fn bind(&mut self, column: &ColumnDefinition, comparison: Comparison, value: Value) -> Filter {
        self.parameters.push(coerce(column, value));
        Filter::predicate(&column.name, comparison, self.parameters.len())
    }

    fn leaf(&mut self, column: &ColumnDefinition, value: &QueryValue) -> Result<Filter> {
        match value {
            QueryValue::Equals(v) => Ok(self.bind(column, Comparison::Equal, v.clone())),
            QueryValue::Compare(operator, v) => self.compare(column, *operator, v),
            QueryValue::Range { low, high, inclusive } => {
                Ok(self.range(column, low.clone(), high.clone(), *inclusive))
            }
            QueryValue::OneOf(values) => self.one_of(column, values.clone()),
            QueryValue::OrderBy(_) | QueryValue::Page { .. } => Err(RequestError::internal(format!(
                "'{}' does not carry a filter value",
                column.name
            ))),
        }
    }

    fn compare(&mut self, column: &ColumnDefinition, operator: Operator, value: &Value) -> Result<Filter> {
        let comparison = match operator {
            Operator::Equal => Comparison::Equal,
            Operator::GreaterThan => Comparison::GreaterThan,
            Operator::GreaterOrEqual => Comparison::GreaterOrEqual,
            Operator::LowerThan => Comparison::LowerThan,
            Operator::LowerOrEqual => Comparison::LowerOrEqual,
            Operator::InclusiveRange | Operator::ExclusiveRange => {
                let (low, high) = split_bounds(column, value)?;
                return Ok(self.range(column, low, high, operator == Operator::InclusiveRange));
            }
            Operator::OneOf => {
                let values = match value {
                    Value::Text(text) => split_list(column, text)?,
                    other => vec![other.clone()],
                };
                return self.one_of(column, values);
            }
        };
        Ok(self.bind(column, comparison, value.clone()))
    }

    fn range(&mut self, column: &ColumnDefinition, low: Value, high: Value, inclusive: bool) -> Filter {
        let (lower, upper) = if inclusive {
            (Comparison::GreaterOrEqual, Comparison::LowerOrEqual)
        } else {
            (Comparison::GreaterThan, Comparison::LowerThan)
        };
        let low = self.bind(column, lower, low);
        let high = self.bind(column, upper, high);
        low.and(high)
    }

    fn one_of(&mut self, column: &ColumnDefinition, values: Vec<Value>) -> Result<Filter> {
        let mut values = values.into_iter();
        let first = values.next().ok_or_else(|| {
            RequestError::query(format!("Empty list of values for '{}'", column.name))
        })?;
        let mut filter = self.bind(column, Comparison::Equal, first);
        for value in values {
            let leaf = self.bind(column, Comparison::Equal, value);
            filter = filter.or(leaf);
        }
        Ok(filter)
    }
}

fn split_bounds(column: &ColumnDefinition, value: &Value) -> Result<(Value, Value)> {
    let invalid = || RequestError::query("Could not extract values for Query Parameters")
        .context(format!("range on '{}'", column.name));

    let text = value.as_str().ok_or_else(invalid)?;
    let mut bounds = split_list(column, text)?;
    match (bounds.pop(), bounds.pop(), bounds.is_empty()) {
        (Some(high), Some(low), true) => Ok((low, high)),
        _ => Err(invalid()),
    }
}

/// Splits comma-separated text; every piece must be non-blank.
fn split_list(column: &ColumnDefinition, text: &str) -> Result<Vec<Value>> {
    text.split(',')
        .map(|part| {
            if part.trim().is_empty() {
                Err(RequestError::query("Could not extract values for Query Parameters")
                    .context(format!("empty value in '{}' for '{}'", text, column.name)))
            } else {
                Ok(Value::Text(part.to_string()))
            }
        })
        .collect()
}

fn coerce(column: &ColumnDefinition, value: Value) -> Value {
    match value {
        Value::Text(text) => column.sql_type.coerce_text(&text),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ErrorKind, SqlType};
    use crate::query::Direction;
    use crate::statement::PlaceholderStyle;
    use std::collections::HashSet;

    fn persons() -> TableSchema {
        TableSchema::new(
            "Persons",
            vec![
                ColumnDefinition::new("id", SqlType::BigInt).identity(),
                ColumnDefinition::new("name", SqlType::Text).not_null(),
                ColumnDefinition::new("age", SqlType::BigInt).not_null(),
            ],
        )
    }

    #[test]
    fn equality_filters_cover_exactly_the_supplied_columns() {
        let params = QueryParameters::new().equals("age", 38).equals("name", "Joe");
        let translated = translate(&params, &persons(), None).unwrap();
        let filter = translated.filter.unwrap();

        let columns = filter
            .predicates()
            .iter()
            .map(|p| p.column.as_str())
            .collect::<HashSet<_>>();
        assert_eq!(columns, HashSet::from(["name", "age"]));
        assert!(filter.predicates().iter().all(|p| p.comparison == Comparison::Equal));

        // Column declaration order, not insertion order.
        assert_eq!(
            translated.parameters,
            vec![Value::Text("Joe".into()), Value::Integer(38)]
        );
        assert_eq!(
            filter.render("Persons", PlaceholderStyle::Numbered),
            r#""Persons"."name" = ?1 AND "Persons"."age" = ?2"#
        );
    }

    #[test]
    fn range_text_needs_exactly_two_bounds() {
        let params = QueryParameters::new().compare("age", Operator::InclusiveRange, "18,65");
        let translated = translate(&params, &persons(), None).unwrap();
        let filter = translated.filter.unwrap();
        let comparisons = filter.predicates().iter().map(|p| p.comparison).collect::<Vec<_>>();
        assert_eq!(comparisons, vec![Comparison::GreaterOrEqual, Comparison::LowerOrEqual]);
        assert_eq!(translated.parameters, vec![Value::Integer(18), Value::Integer(65)]);

        for bad in ["18", "18,30,65", "18,", ",65", ",", " ,65"] {
            let params = QueryParameters::new().compare("age", Operator::ExclusiveRange, bad);
            let err = translate(&params, &persons(), None).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::QueryError);
        }
    }

    #[test]
    fn exclusive_range_uses_strict_comparisons() {
        let params = QueryParameters::new().range("age", 18, 65, false);
        let filter = translate(&params, &persons(), None).unwrap().filter.unwrap();
        let comparisons = filter.predicates().iter().map(|p| p.comparison).collect::<Vec<_>>();
        assert_eq!(comparisons, vec![Comparison::GreaterThan, Comparison::LowerThan]);
    }

    #[test]
    fn one_of_becomes_an_or_of_equals() {
        let params = QueryParameters::new().one_of("name", ["Joe", "Ann", "Sue"]);
        let translated = translate(&params, &persons(), None).unwrap();
        let filter = translated.filter.unwrap();
        assert!(matches!(filter, Filter::Or(..)));
        assert_eq!(filter.predicates().len(), 3);
        assert_eq!(translated.parameters.len(), 3);

        let single = QueryParameters::new().compare("age", Operator::OneOf, "42");
        let filter = translate(&single, &persons(), None).unwrap().filter.unwrap();
        assert!(matches!(filter, Filter::Predicate(_)));

        let gap = QueryParameters::new().compare("age", Operator::OneOf, "1,,2");
        let err = translate(&gap, &persons(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryError);

        let empty = QueryParameters::new().one_of("name", Vec::<String>::new());
        let err = translate(&empty, &persons(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryError);
    }

    #[test]
    fn ordering_keeps_insertion_order_and_skips_unknown_columns() {
        let params = QueryParameters::new()
            .order_by("age", Direction::Descending)
            .order_by("height", Direction::Ascending)
            .order_by("name", Direction::Ascending)
            .paginate(10, 0)
            .paginate(5, 20);
        let translated = translate(&params, &persons(), None).unwrap();

        assert!(translated.filter.is_none());
        let columns = translated.order.iter().map(|o| o.column.as_str()).collect::<Vec<_>>();
        assert_eq!(columns, vec!["age", "name"]);
        assert_eq!(translated.page, Some(Pagination { limit: 5, offset: 20 }));
    }

    #[test]
    fn empty_or_unusable_parameters_are_rejected() {
        let err = translate(&QueryParameters::new(), &persons(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryError);
        assert_eq!(err.reason(), Some("Could not extract values for Query Parameters"));

        let params = QueryParameters::new().equals("height", 180);
        let err = translate(&params, &persons(), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryError);
    }

    #[test]
    fn page_size_is_capped() {
        let params = QueryParameters::new().paginate(500, 0);
        let err = translate(&params, &persons(), Some(100)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryError);
        assert!(translate(&params, &persons(), Some(500)).is_ok());
    }

    #[test]
    fn filter_only_translation_requires_a_filter() {
        let params = QueryParameters::new().paginate(5, 0);
        let err = translate_filter(&params, &persons()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::QueryError);

        let params = QueryParameters::new().equals("name", "Joe");
        let (filter, parameters) = translate_filter(&params, &persons()).unwrap();
        assert_eq!(filter.predicates().len(), 1);
        assert_eq!(parameters, vec![Value::Text("Joe".into())]);
    }
}
